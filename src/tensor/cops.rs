use crate::scalar::{ Gemm, Numeric };


/// Reference triple loop, used when the `unsafe` feature is disabled.

#[cfg(any(test, not(feature = "unsafe")))]
fn naive_gemm<T: Numeric>(m: usize, k: usize, n: usize, lhs: &[T], rhs: &[T]) -> Vec<T> {
  let mut data = vec![T::zero(); m * n];
  for i in 0..m {
    for p in 0..k {
      let a = lhs[i * k + p];
      for j in 0..n {
        data[i * n + j] += a * rhs[p * n + j];
      }
    }
  }
  data
}

macro_rules! impl_gemm {
  ($t:ty, $kernel:ident) => {
    impl Gemm for $t {
      #[cfg(feature = "unsafe")]
      fn gemm(m: usize, k: usize, n: usize, lhs: &[$t], rhs: &[$t]) -> Vec<$t> {
        assert_eq!(lhs.len(), m * k);
        assert_eq!(rhs.len(), k * n);
        let mut data = vec![0.0; m * n];
        if m == 0 || n == 0 { return data }
        unsafe {
          matrixmultiply::$kernel(
            m,
            k,
            n,
            1.0,
            lhs.as_ptr(),
            k as isize,
            1,
            rhs.as_ptr(),
            n as isize,
            1,
            0.0,
            data.as_mut_ptr(),
            n as isize,
            1,
          );
        }
        data
      }

      #[cfg(not(feature = "unsafe"))]
      fn gemm(m: usize, k: usize, n: usize, lhs: &[$t], rhs: &[$t]) -> Vec<$t> {
        naive_gemm(m, k, n, lhs, rhs)
      }
    }
  };
}

impl_gemm!(f32, sgemm);
impl_gemm!(f64, dgemm);


#[cfg(test)]
mod tests {
  use super::*;
  use crate::{ Tensor, ops::RealOps };

  #[test]
  fn matmul() {
    let x = Tensor::new(&[2,3], vec![1., 2., 3., 4., 5., 6.]);
    let y = Tensor::new(&[3,2], vec![1., 2., 3., 4., 5., 6.]);
    assert_eq!(x.mm(&y), Tensor::new(&[2,2], vec![22., 28., 49., 64.]));
  }

  #[test]
  fn matmul_vector() {
    let x = Tensor::new(&[2,3], vec![1f32, 2., 3., 4., 5., 6.]);
    let y = Tensor::new(&[3,1], vec![1., 2., 3.]);
    assert_eq!(x.mm(&y), Tensor::new(&[2,1], vec![14., 32.]));
  }

  #[test]
  fn naive_matches_kernel() {
    let x = Tensor::<f64>::randn(&[4,5]);
    let y = Tensor::<f64>::randn(&[5,3]);
    let kernel = f64::gemm(4, 5, 3, &x.raw(), &y.raw());
    let naive = naive_gemm(4, 5, 3, &x.raw(), &y.raw());
    for (a, b) in kernel.iter().zip(&naive) {
      assert!((a - b).abs() < 1e-12);
    }
  }
}
