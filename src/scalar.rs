use rand::distributions::uniform::SampleUniform;
use num_traits::{ NumAssignOps, Num, NumCast };


/// All types that may be used in a [Tensor](crate::Tensor).
///
/// This trait gets implemented automatically for all types
/// that satisfy its dependent traits.

pub trait Inner: PartialEq + Clone + Copy + Send + Sync + std::fmt::Debug + 'static {}
impl<T: PartialEq + Clone + Copy + Send + Sync + std::fmt::Debug + 'static> Inner for T {}


/// All numeric types.
///
/// This trait gets implemented automatically for all types
/// that satisfy its dependent traits.

pub trait Numeric: Inner + PartialOrd + Num + NumCast + NumAssignOps + std::iter::Sum {}
impl<T: Inner + PartialOrd + Num + NumCast + NumAssignOps + std::iter::Sum> Numeric for T {}


/// All signed numeric types.

pub trait Signed: Numeric + num_traits::Signed {}
impl<T: Numeric + num_traits::Signed> Signed for T {}


/// Dense matrix product of two row-major matrices
/// `[m, k] x [k, n] -> [m, n]`.
///
/// Implemented for `f32` and `f64`.

pub trait Gemm: Sized {
  fn gemm(m: usize, k: usize, n: usize, lhs: &[Self], rhs: &[Self]) -> Vec<Self>;
}


/// All continuous numeric types that gradients can be computed for.
///
/// This trait gets implemented automatically for all types
/// that satisfy its dependent traits.

pub trait Real: Signed + num_traits::real::Real + SampleUniform + Gemm {}
impl<T: Signed + num_traits::real::Real + SampleUniform + Gemm> Real for T {}
