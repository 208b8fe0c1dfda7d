use num_traits::NumOps;

use crate::internal::*;
use crate::Shape;
use crate::scalar::{ Inner, Numeric, Real };


/// Differentiable mid-level operations that are also implemented
/// for non-differentiable [Inner] types.

pub trait BaseOps<I: Inner>: Clone {
  fn scalar(item: I) -> Self;
  fn shape(&self) -> &Shape;
  fn broadcast(&self, shape: &Shape) -> Self;
  fn reshape(&self, dims: &[usize]) -> Self;
  fn transpose(&self, dim1: isize, dim2: isize) -> Self;
  fn narrow(&self, dim: isize, start: usize, len: usize) -> Self;
  fn concat(&self, rhs: &Self, dim: isize) -> Self;

  /// Gather rows of a 2-D table.
  fn look_up(&self, indices: &[usize]) -> Self;

  /// Take one element per row of a 2-D tensor.
  fn pick(&self, indices: &[usize]) -> Self;

  fn dim(&self, dim: isize) -> usize {
    self.shape()[dim]
  }

  fn unsqueeze(&self, dim: isize) -> Self {
    self.reshape(&self.shape().unsqueeze(dim).dims)
  }
}


/// Differentiable mid-level operations that are also implemented
/// for non-differentiable [Numeric] inner types.
///
/// Reductions collapse `dim` and every dimension behind it.

pub trait NumericOps<I: Numeric>: Sized {
  fn sum(&self, dim: isize) -> Self;
  fn max(&self, dim: isize) -> Self;
}


/// Differentiable mid-level operations.

pub trait RealOps<I: Real>: Sized {
  fn mm(&self, rhs: &Self) -> Self;
  fn pow(&self, rhs: &Self) -> Self;
  fn exp(&self) -> Self;
  fn log(&self) -> Self;
  fn tanh(&self) -> Self;
  fn sigmoid(&self) -> Self;
  fn relu(&self) -> Self;
}


/// High-level operations, implemented exclusively on top of
/// mid-level ops and other Hops. As a result, these are all
/// differentiable when called on a [Variable](crate::Variable).

pub trait Hops<I>: BaseOps<I> + NumericOps<I> + RealOps<I> + NumOps + NumOps<I, Self>
where
  I: Real,
  for<'a> &'a Self: NumOps<&'a Self, Self> + NumOps<I, Self>,
{
  fn powf(&self, exp: I) -> Self {
    self.pow(&Self::scalar(exp))
  }

  fn sqr(&self) -> Self {
    self * self
  }

  fn sqrt(&self) -> Self {
    self.powf(cast(0.5))
  }

  fn mean(&self, dim: isize) -> Self {
    let udim = negative_index(dim, self.shape().rank(), false);
    let n: usize = self.shape().dims[udim..].iter().product();
    self.sum(dim) / cast::<I>(n as f64)
  }

  fn softmax(&self, dim: isize) -> Self {
    let exp = (self - &self.max(dim).unsqueeze(-1)).exp();
    &exp / &exp.sum(dim).unsqueeze(-1)
  }

  fn log_softmax(&self, dim: isize) -> Self {
    let shifted = self - &self.max(dim).unsqueeze(-1);
    &shifted - &shifted.exp().sum(dim).log().unsqueeze(-1)
  }

  /// Mean negative log likelihood of `targets` under
  /// the row-wise softmax of these `[batch, classes]` logits.

  fn cross_entropy(&self, targets: &[usize]) -> Self {
    self.log_softmax(-1).pick(targets).mean(0) * -I::one()
  }
}


#[cfg(test)]
mod tests {
  use super::*;
  use crate::Tensor;

  #[test]
  fn mean() {
    let a = Tensor::new(&[3,2], vec![1., 2., 3., 4., 5., 6.]).trained();
    assert_eq!(a.mean(0).tensor(), &Tensor::scalar(3.5));
    assert_eq!(a.mean(-1).tensor(), &Tensor::vec(&[1.5, 3.5, 5.5]));
  }

  #[test]
  fn softmax() {
    let a = Tensor::arrange(&[3,2], 1.0, 1.0).softmax(-1);
    for row in a.iter() {
      assert!((row.sum(0).item() - 1.0f64).abs() < 1e-12);
    }
  }

  #[test]
  fn log_softmax_matches_softmax() {
    let a = Tensor::<f64>::randn(&[4,5]);
    let log = a.log_softmax(-1);
    let reference = a.softmax(-1).log();
    for (x, y) in log.to_vec().into_iter().zip(reference.to_vec()) {
      assert!((x - y).abs() < 1e-9);
    }
  }

  #[test]
  fn cross_entropy_of_uniform_logits() {
    let logits = Tensor::<f64>::zeros(&[2,4]);
    let loss = logits.cross_entropy(&[0, 3]).item();
    assert!((loss - 4f64.ln()).abs() < 1e-12);
  }

  #[test]
  fn cross_entropy_prefers_target() {
    let logits = Tensor::new(&[1,3], vec![0.0, 8.0, 0.0]);
    assert!(logits.cross_entropy(&[1]).item() < 0.01);
    assert!(logits.cross_entropy(&[0]).item() > 7.0);
  }
}
