use crate::{
  internal::*,
  shape::Shape,
  tensor::Tensor,
  scalar::{ Inner, Numeric, Signed, Real },
  ops::{ BaseOps, NumericOps, RealOps },
};


impl<T: Inner> BaseOps<T> for Tensor<T> {
  fn scalar(item: T) -> Self {
    Self::new(&[], vec![item])
  }

  fn shape(&self) -> &Shape {
    &self.shape
  }

  fn broadcast(&self, shape: &Shape) -> Self {
    if self.shape == *shape { return self.clone() }
    self.gather(shape.clone(), self.shape.broadcast_iter(shape))
  }

  fn reshape(&self, dims: &[usize]) -> Self {
    Self { shape: self.shape.view(dims), data: self.data.clone() }
  }

  fn transpose(&self, dim1: isize, dim2: isize) -> Self {
    let shape = self.shape.transpose(dim1, dim2);
    self.gather(shape, self.shape.transpose_iter(dim1, dim2))
  }

  fn narrow(&self, dim: isize, start: usize, len: usize) -> Self {
    let shape = self.shape.narrow(dim, start, len);
    self.gather(shape, self.shape.narrow_iter(dim, start, len))
  }

  fn concat(&self, rhs: &Self, dim: isize) -> Self {
    let d = negative_index(dim, self.rank(), false);
    assert_eq!(self.rank(), rhs.rank(),
      "Cannot concat {} & {} tensors", self.shape, rhs.shape);
    let mut dims = self.shape.dims.clone();
    dims[d] += rhs.shape.dims[d];
    let mut dims_r = rhs.shape.dims.clone();
    dims_r[d] += self.shape.dims[d];
    assert_eq!(dims, dims_r,
      "Cannot concat {} & {} tensors. Shapes may only differ in dim {}",
      self.shape, rhs.shape, d);

    let outer: usize = self.shape.dims[..d].iter().product();
    let inner_l: usize = self.shape.dims[d..].iter().product();
    let inner_r: usize = rhs.shape.dims[d..].iter().product();
    let mut data = Vec::with_capacity(self.size() + rhs.size());
    {
      let raw_l = self.raw();
      let raw_r = rhs.raw();
      for i in 0..outer {
        data.extend_from_slice(&raw_l[i * inner_l..(i + 1) * inner_l]);
        data.extend_from_slice(&raw_r[i * inner_r..(i + 1) * inner_r]);
      }
    }
    Self::new(&dims, data)
  }

  fn look_up(&self, indices: &[usize]) -> Self {
    assert_eq!(self.rank(), 2, "Can only look up rows of a matrix, got {}", self.shape);
    let rows = self.shape.dims[0];
    let width = self.shape.dims[1];
    let mut data = Vec::with_capacity(indices.len() * width);
    {
      let raw = self.raw();
      for &i in indices {
        assert!(i < rows, "Index {} out of range for {}", i, self.shape);
        data.extend_from_slice(&raw[i * width..(i + 1) * width]);
      }
    }
    Self::new(&[indices.len(), width], data)
  }

  fn pick(&self, indices: &[usize]) -> Self {
    assert_eq!(self.rank(), 2, "Can only pick from a matrix, got {}", self.shape);
    let rows = self.shape.dims[0];
    let cols = self.shape.dims[1];
    assert_eq!(rows, indices.len(), "Need one index per row of {}", self.shape);
    let data = {
      let raw = self.raw();
      indices.iter()
        .enumerate()
        .map(|(r, &c)| {
          assert!(c < cols, "Index {} out of range for {}", c, self.shape);
          raw[r * cols + c]
        })
        .collect()
    };
    Self::new(&[rows], data)
  }
}

impl<T: Numeric> NumericOps<T> for Tensor<T> {
  fn sum(&self, dim: isize) -> Self {
    self.collapse(dim, |values| values.iter().copied().sum() )
  }

  fn max(&self, dim: isize) -> Self {
    self.collapse(dim, |values| {
      values[1..].iter().fold(values[0], |max, &v| if v > max { v } else { max })
    })
  }
}

impl<T: Real> RealOps<T> for Tensor<T> {
  fn mm(&self, rhs: &Self) -> Self {
    assert!(self.rank() == 2 && rhs.rank() == 2,
      "Can only multiply matrices, got {} & {}", self.shape, rhs.shape);
    let (m, k) = (self.shape.dims[0], self.shape.dims[1]);
    let n = rhs.shape.dims[1];
    assert_eq!(k, rhs.shape.dims[0],
      "Could not multiply {} & {}", self.shape, rhs.shape);
    let data = T::gemm(m, k, n, &self.raw(), &rhs.raw());
    Self::new(&[m, n], data)
  }

  fn pow(&self, rhs: &Self) -> Self {
    self.zip(rhs, |(a, b)| a.powf(b) )
  }

  fn exp(&self) -> Self {
    self.vectorize(|a| a.exp() )
  }

  fn log(&self) -> Self {
    self.vectorize(|a| a.ln() )
  }

  fn tanh(&self) -> Self {
    self.vectorize(|a| a.tanh() )
  }

  fn sigmoid(&self) -> Self {
    self.vectorize(|a| if a >= T::zero() {
      T::one() / (T::one() + (-a).exp())
    } else {
      let e = a.exp();
      e / (T::one() + e)
    })
  }

  fn relu(&self) -> Self {
    self.vectorize(|a| if a > T::zero() { a } else { T::zero() })
  }
}

impl<T: Signed> std::ops::Neg for &Tensor<T> {
  type Output = Tensor<T>;

  fn neg(self) -> Self::Output {
    self.vectorize(|a| -a )
  }
}

impl<T: Signed> std::ops::Neg for Tensor<T> {
  type Output = Tensor<T>;

  fn neg(self) -> Self::Output {
    -&self
  }
}

macro_rules! add_operator {
  ($trait:ident, $meth:ident, $symbol:tt) => {
    impl<T: Numeric> std::ops::$trait for &Tensor<T> { // &tensor * &other
      type Output = Tensor<T>;

      fn $meth(self, rhs: Self) -> Tensor<T> {
        self.zip(rhs, |(a, b)| a $symbol b )
      }
    }

    impl<T: Numeric> std::ops::$trait for Tensor<T> { // tensor * other
      type Output = Tensor<T>;

      fn $meth(self, rhs: Self) -> Tensor<T> {
        &self $symbol &rhs
      }
    }

    impl<T: Numeric> std::ops::$trait<Tensor<T>> for &Tensor<T> { // &tensor * other
      type Output = Tensor<T>;

      fn $meth(self, rhs: Tensor<T>) -> Tensor<T> {
        self $symbol &rhs
      }
    }

    impl<T: Numeric> std::ops::$trait<&Tensor<T>> for Tensor<T> { // tensor * &other
      type Output = Tensor<T>;

      fn $meth(self, rhs: &Tensor<T>) -> Tensor<T> {
        &self $symbol rhs
      }
    }

    impl<T: Numeric> std::ops::$trait<T> for &Tensor<T> { // &tensor * T
      type Output = Tensor<T>;

      fn $meth(self, rhs: T) -> Tensor<T> {
        self.vectorize(|a| a $symbol rhs )
      }
    }

    impl<T: Numeric> std::ops::$trait<T> for Tensor<T> { // tensor * T
      type Output = Tensor<T>;

      fn $meth(self, rhs: T) -> Tensor<T> {
        &self $symbol rhs
      }
    }

    impl std::ops::$trait<&Tensor<f32>> for f32 { // f32 * &tensor
      type Output = Tensor<f32>;

      fn $meth(self, tensor: &Tensor<f32>) -> Tensor<f32> {
        tensor.vectorize(|a| self $symbol a )
      }
    }

    impl std::ops::$trait<Tensor<f32>> for f32 { // f32 * tensor
      type Output = Tensor<f32>;

      fn $meth(self, tensor: Tensor<f32>) -> Tensor<f32> {
        self $symbol &tensor
      }
    }

    impl std::ops::$trait<&Tensor<f64>> for f64 { // f64 * &tensor
      type Output = Tensor<f64>;

      fn $meth(self, tensor: &Tensor<f64>) -> Tensor<f64> {
        tensor.vectorize(|a| self $symbol a )
      }
    }

    impl std::ops::$trait<Tensor<f64>> for f64 { // f64 * tensor
      type Output = Tensor<f64>;

      fn $meth(self, tensor: Tensor<f64>) -> Tensor<f64> {
        self $symbol &tensor
      }
    }
  };
}

add_operator!(Add, add, +);
add_operator!(Sub, sub, -);
add_operator!(Mul, mul, *);
add_operator!(Div, div, /);
add_operator!(Rem, rem, %);


#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn sum() {
    let a = Tensor::new(&[3,2], vec![1, 2, 3, 4, 5, 6]);
    assert_eq!(a.sum(0), Tensor::new(&[], vec![21]));
    assert_eq!(a.sum(-1), Tensor::new(&[3], vec![3, 7, 11]));
  }

  #[test]
  fn max() {
    let a = Tensor::new(&[2,3], vec![-1, 5, 2, 0, -7, -3]);
    assert_eq!(a.max(-1), Tensor::vec(&[5, 0]));
    assert_eq!(a.max(0).item(), 5);
  }

  #[test]
  fn concat() {
    let a = Tensor::new(&[2,3], vec![1, 2, 3, 4, 5, 6]);
    let b = Tensor::new(&[2,3], vec![7, 8, 9, 10, 11, 12]);
    assert_eq!(a.concat(&b, 1), Tensor::new(&[2,6], vec![1, 2, 3, 7, 8, 9, 4, 5, 6, 10, 11, 12]));
    assert_eq!(a.concat(&b, 0), Tensor::new(&[4,3], vec![1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12]));

    let b = Tensor::new(&[2,4], vec![7, 8, 9, 10, 11, 12, 13, 14]);
    assert_eq!(a.concat(&b, -1), Tensor::new(&[2,7], vec![1, 2, 3, 7, 8, 9, 10, 4, 5, 6, 11, 12, 13, 14]));
  }

  #[test]
  fn narrow() {
    let a = Tensor::new(&[2,4], vec![1, 2, 3, 4, 5, 6, 7, 8]);
    assert_eq!(a.narrow(-1, 1, 2), Tensor::new(&[2,2], vec![2, 3, 6, 7]));
    assert_eq!(a.narrow(0, 1, 1), Tensor::new(&[1,4], vec![5, 6, 7, 8]));
  }

  #[test]
  fn transpose() {
    let a = Tensor::new(&[2,3], vec![1, 2, 3, 4, 5, 6]);
    assert_eq!(a.transpose(0, 1), Tensor::new(&[3,2], vec![1, 4, 2, 5, 3, 6]));
  }

  #[test]
  fn reshape_shares_storage() {
    let a = Tensor::new(&[2,3], vec![1, 2, 3, 4, 5, 6]);
    let b = a.reshape(&[6]);
    assert!(a.shared_with(&b));
    assert_eq!(b.shape().dims, vec![6]);
  }

  #[test]
  fn look_up() {
    let table = Tensor::new(&[3,2], vec![0, 1, 10, 11, 20, 21]);
    assert_eq!(table.look_up(&[2, 0, 2]), Tensor::new(&[3,2], vec![20, 21, 0, 1, 20, 21]));
  }

  #[test]
  fn pick() {
    let a = Tensor::new(&[2,3], vec![1, 2, 3, 4, 5, 6]);
    assert_eq!(a.pick(&[2, 0]), Tensor::vec(&[3, 4]));
  }

  #[test]
  fn sigmoid_is_stable() {
    let a = Tensor::vec(&[-1000.0f64, 0.0, 1000.0]).sigmoid();
    assert_eq!(a, Tensor::vec(&[0.0, 0.5, 1.0]));
  }

  #[test]
  fn scalar_operators() {
    let a = Tensor::vec(&[1.0f32, 2.0]);
    assert_eq!(&a * 2.0, Tensor::vec(&[2.0, 4.0]));
    assert_eq!(1.0 - &a, Tensor::vec(&[0.0, -1.0]));
    assert_eq!(-a, Tensor::vec(&[-1.0, -2.0]));
  }
}
