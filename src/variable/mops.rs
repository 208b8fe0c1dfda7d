use crate::{
  internal::*,
  shape::Shape,
  tensor::Tensor,
  variable::{ Variable, BinaryOp, UnaryOp },
  scalar::Real,
  ops::{ BaseOps, NumericOps, RealOps, Hops },
};


impl<T: Real> Hops<T> for Variable<T> {}

impl<T: Real> BaseOps<T> for Variable<T> {
  fn scalar(item: T) -> Self {
    Self::from_tensor(Tensor::scalar(item), false)
  }

  fn shape(&self) -> &Shape {
    self.node.data.shape()
  }

  fn broadcast(&self, shape: &Shape) -> Self {
    if self.shape() == shape { return self.clone() }
    self.unary_op(Broadcast { shape: shape.clone() })
  }

  fn reshape(&self, dims: &[usize]) -> Self {
    if self.shape().dims == dims { return self.clone() }
    self.unary_op(Reshape { dims: dims.to_vec() })
  }

  fn transpose(&self, dim1: isize, dim2: isize) -> Self {
    self.unary_op(Transpose { dim1, dim2 })
  }

  fn narrow(&self, dim: isize, start: usize, len: usize) -> Self {
    self.unary_op(Narrow { dim, start, len })
  }

  fn concat(&self, rhs: &Self, dim: isize) -> Self {
    self.binary_op(Concat { dim }, rhs)
  }

  fn look_up(&self, indices: &[usize]) -> Self {
    self.embed(indices, None)
  }

  fn pick(&self, indices: &[usize]) -> Self {
    self.unary_op(Pick { indices: indices.to_vec() })
  }
}

impl<T: Real> Variable<T> {
  /// Look up rows of this `[vocabulary, width]` table.
  ///
  /// The `padding` row never receives gradient.

  pub fn embed(&self, indices: &[usize], padding: Option<usize>) -> Self {
    self.unary_op(LookUp { indices: indices.to_vec(), padding })
  }
}

impl<T: Real> NumericOps<T> for Variable<T> {
  fn sum(&self, dim: isize) -> Self {
    self.unary_op(Sum { dim })
  }

  fn max(&self, dim: isize) -> Self {
    self.unary_op(Max { dim })
  }
}

impl<T: Real> RealOps<T> for Variable<T> {
  fn mm(&self, rhs: &Self) -> Self {
    self.binary_op(MatMul, rhs)
  }

  fn pow(&self, rhs: &Self) -> Self {
    let (lhs, rhs) = broadcast_pair(self, rhs);
    lhs.binary_op(Pow, &rhs)
  }

  fn exp(&self) -> Self {
    self.unary_op(Exp)
  }

  fn log(&self) -> Self {
    self.unary_op(Log)
  }

  fn tanh(&self) -> Self {
    self.unary_op(Tanh)
  }

  fn sigmoid(&self) -> Self {
    self.unary_op(Sigmoid)
  }

  fn relu(&self) -> Self {
    self.unary_op(ReLU)
  }
}

fn broadcast_pair<T: Real>(lhs: &Variable<T>, rhs: &Variable<T>) -> (Variable<T>, Variable<T>) {
  if lhs.shape() == rhs.shape() { return (lhs.clone(), rhs.clone()) }
  let shape = lhs.shape().broadcast(rhs.shape());
  (lhs.broadcast(&shape), rhs.broadcast(&shape))
}

impl<T: Real> std::ops::Neg for &Variable<T> {
  type Output = Variable<T>;

  fn neg(self) -> Self::Output {
    self * -T::one()
  }
}

impl<T: Real> std::ops::Neg for Variable<T> {
  type Output = Variable<T>;

  fn neg(self) -> Self::Output {
    -&self
  }
}

macro_rules! add_operator {
  ($op:ident, $meth:ident, $symbol:tt) => {
    impl<T: Real> std::ops::$op for &Variable<T> { // &var * &other
      type Output = Variable<T>;

      fn $meth(self, rhs: Self) -> Variable<T> {
        let (lhs, rhs) = broadcast_pair(self, rhs);
        lhs.binary_op($op, &rhs)
      }
    }

    impl<T: Real> std::ops::$op for Variable<T> { // var * other
      type Output = Variable<T>;

      fn $meth(self, rhs: Self) -> Variable<T> {
        &self $symbol &rhs
      }
    }

    impl<T: Real> std::ops::$op<Variable<T>> for &Variable<T> { // &var * other
      type Output = Variable<T>;

      fn $meth(self, rhs: Variable<T>) -> Variable<T> {
        self $symbol &rhs
      }
    }

    impl<T: Real> std::ops::$op<&Variable<T>> for Variable<T> { // var * &other
      type Output = Variable<T>;

      fn $meth(self, rhs: &Variable<T>) -> Variable<T> {
        &self $symbol rhs
      }
    }

    impl<T: Real> std::ops::$op<T> for &Variable<T> { // &var * T
      type Output = Variable<T>;

      fn $meth(self, rhs: T) -> Variable<T> {
        self $symbol &Variable::scalar(rhs)
      }
    }

    impl<T: Real> std::ops::$op<T> for Variable<T> { // var * T
      type Output = Variable<T>;

      fn $meth(self, rhs: T) -> Variable<T> {
        &self $symbol &Variable::scalar(rhs)
      }
    }

    impl std::ops::$op<&Variable<f32>> for f32 { // f32 * &var
      type Output = Variable<f32>;

      fn $meth(self, rhs: &Variable<f32>) -> Variable<f32> {
        &Variable::scalar(self) $symbol rhs
      }
    }

    impl std::ops::$op<Variable<f32>> for f32 { // f32 * var
      type Output = Variable<f32>;

      fn $meth(self, rhs: Variable<f32>) -> Variable<f32> {
        &Variable::scalar(self) $symbol &rhs
      }
    }

    impl std::ops::$op<&Variable<f64>> for f64 { // f64 * &var
      type Output = Variable<f64>;

      fn $meth(self, rhs: &Variable<f64>) -> Variable<f64> {
        &Variable::scalar(self) $symbol rhs
      }
    }

    impl std::ops::$op<Variable<f64>> for f64 { // f64 * var
      type Output = Variable<f64>;

      fn $meth(self, rhs: Variable<f64>) -> Variable<f64> {
        &Variable::scalar(self) $symbol &rhs
      }
    }
  };
}

add_operator!(Add, add, +);
add_operator!(Sub, sub, -);
add_operator!(Mul, mul, *);
add_operator!(Div, div, /);
add_operator!(Rem, rem, %);


#[derive(Debug, Clone)]
pub struct Add;

impl<T: Real> BinaryOp<T> for Add {
  fn run(&self, lhs: &Tensor<T>, rhs: &Tensor<T>) -> Tensor<T> {
    lhs + rhs
  }

  fn derive(&self, _lhs: &Tensor<T>, _rhs: &Tensor<T>, grad: &Tensor<T>) -> (Tensor<T>, Tensor<T>)
  {(
    grad.clone(),
    grad.clone(),
  )}
}


#[derive(Debug, Clone)]
pub struct Sub;

impl<T: Real> BinaryOp<T> for Sub {
  fn run(&self, lhs: &Tensor<T>, rhs: &Tensor<T>) -> Tensor<T> {
    lhs - rhs
  }

  fn derive(&self, _lhs: &Tensor<T>, _rhs: &Tensor<T>, grad: &Tensor<T>) -> (Tensor<T>, Tensor<T>)
  {(
    grad.clone(),
    -grad,
  )}
}


#[derive(Debug, Clone)]
pub struct Mul;

impl<T: Real> BinaryOp<T> for Mul {
  fn run(&self, lhs: &Tensor<T>, rhs: &Tensor<T>) -> Tensor<T> {
    lhs * rhs
  }

  fn derive(&self, lhs: &Tensor<T>, rhs: &Tensor<T>, grad: &Tensor<T>) -> (Tensor<T>, Tensor<T>)
  {(
    grad * rhs,
    grad * lhs,
  )}
}


#[derive(Debug, Clone)]
pub struct Div;

impl<T: Real> BinaryOp<T> for Div {
  fn run(&self, lhs: &Tensor<T>, rhs: &Tensor<T>) -> Tensor<T> {
    lhs / rhs
  }

  fn derive(&self, lhs: &Tensor<T>, rhs: &Tensor<T>, grad: &Tensor<T>) -> (Tensor<T>, Tensor<T>)
  {(
    grad / rhs,
    -grad * lhs / rhs / rhs,
  )}
}


#[derive(Debug, Clone)]
pub struct Rem;

impl<T: Real> BinaryOp<T> for Rem {
  fn run(&self, lhs: &Tensor<T>, rhs: &Tensor<T>) -> Tensor<T> {
    lhs % rhs
  }

  fn derive(&self, lhs: &Tensor<T>, rhs: &Tensor<T>, grad: &Tensor<T>) -> (Tensor<T>, Tensor<T>)
  {(
    grad.clone(),
    -grad * (lhs / rhs).vectorize(|a| a.floor() ),
  )}
}


#[derive(Debug, Clone)]
pub struct MatMul;

impl<T: Real> BinaryOp<T> for MatMul {
  fn run(&self, lhs: &Tensor<T>, rhs: &Tensor<T>) -> Tensor<T> {
    lhs.mm(rhs)
  }

  fn derive(&self, lhs: &Tensor<T>, rhs: &Tensor<T>, grad: &Tensor<T>) -> (Tensor<T>, Tensor<T>)
  {(
    grad.mm(&rhs.transpose(0, 1)),
    lhs.transpose(0, 1).mm(grad),
  )}
}


#[derive(Debug, Clone)]
pub struct Pow;

impl<T: Real> BinaryOp<T> for Pow {
  fn run(&self, lhs: &Tensor<T>, rhs: &Tensor<T>) -> Tensor<T> {
    lhs.pow(rhs)
  }

  fn derive(&self, lhs: &Tensor<T>, rhs: &Tensor<T>, grad: &Tensor<T>) -> (Tensor<T>, Tensor<T>)
  {(
    grad * rhs * lhs.pow(&(rhs - T::one())),
    grad * lhs.pow(rhs) * lhs.log(),
  )}
}


#[derive(Debug, Clone)]
pub struct Broadcast {
  shape: Shape,
}

impl<T: Real> UnaryOp<T> for Broadcast {
  fn run(&self, lhs: &Tensor<T>) -> Tensor<T> {
    lhs.broadcast(&self.shape)
  }

  fn derive(&self, lhs: &Tensor<T>, grad: &Tensor<T>) -> Tensor<T> {
    grad.sum_to(lhs.shape())
  }
}


#[derive(Debug, Clone)]
pub struct Reshape {
  dims: Vec<usize>,
}

impl<T: Real> UnaryOp<T> for Reshape {
  fn run(&self, lhs: &Tensor<T>) -> Tensor<T> {
    lhs.reshape(&self.dims)
  }

  fn derive(&self, lhs: &Tensor<T>, grad: &Tensor<T>) -> Tensor<T> {
    grad.reshape(&lhs.shape().dims)
  }
}


#[derive(Debug, Clone)]
pub struct Transpose {
  dim1: isize,
  dim2: isize,
}

impl<T: Real> UnaryOp<T> for Transpose {
  fn run(&self, lhs: &Tensor<T>) -> Tensor<T> {
    lhs.transpose(self.dim1, self.dim2)
  }

  fn derive(&self, _lhs: &Tensor<T>, grad: &Tensor<T>) -> Tensor<T> {
    grad.transpose(self.dim1, self.dim2)
  }
}


#[derive(Debug, Clone)]
pub struct Narrow {
  dim: isize,
  start: usize,
  len: usize,
}

impl<T: Real> UnaryOp<T> for Narrow {
  fn run(&self, lhs: &Tensor<T>) -> Tensor<T> {
    lhs.narrow(self.dim, self.start, self.len)
  }

  fn derive(&self, lhs: &Tensor<T>, grad: &Tensor<T>) -> Tensor<T> {
    let out = Tensor::zeros(&lhs.shape().dims);
    {
      let mut raw = out.raw_mut();
      let grad = grad.raw();
      for (k, i) in lhs.shape().narrow_iter(self.dim, self.start, self.len).enumerate() {
        raw[i] = grad[k];
      }
    }
    out
  }
}


#[derive(Debug, Clone)]
pub struct Concat {
  dim: isize,
}

impl<T: Real> BinaryOp<T> for Concat {
  fn run(&self, lhs: &Tensor<T>, rhs: &Tensor<T>) -> Tensor<T> {
    lhs.concat(rhs, self.dim)
  }

  fn derive(&self, lhs: &Tensor<T>, rhs: &Tensor<T>, grad: &Tensor<T>) -> (Tensor<T>, Tensor<T>) {
    let size_l = lhs.dim(self.dim);
    let size_r = rhs.dim(self.dim);
    (grad.narrow(self.dim, 0, size_l), grad.narrow(self.dim, size_l, size_r))
  }
}


#[derive(Debug, Clone)]
pub struct LookUp {
  indices: Vec<usize>,
  padding: Option<usize>,
}

impl<T: Real> UnaryOp<T> for LookUp {
  fn run(&self, lhs: &Tensor<T>) -> Tensor<T> {
    lhs.look_up(&self.indices)
  }

  fn derive(&self, lhs: &Tensor<T>, grad: &Tensor<T>) -> Tensor<T> {
    let width = lhs.dim(-1);
    let out = Tensor::zeros(&lhs.shape().dims);
    {
      let mut raw = out.raw_mut();
      let grad = grad.raw();
      for (row, &i) in self.indices.iter().enumerate() {
        if Some(i) == self.padding { continue }
        for j in 0..width {
          raw[i * width + j] += grad[row * width + j];
        }
      }
    }
    out
  }
}


#[derive(Debug, Clone)]
pub struct Pick {
  indices: Vec<usize>,
}

impl<T: Real> UnaryOp<T> for Pick {
  fn run(&self, lhs: &Tensor<T>) -> Tensor<T> {
    lhs.pick(&self.indices)
  }

  fn derive(&self, lhs: &Tensor<T>, grad: &Tensor<T>) -> Tensor<T> {
    let cols = lhs.dim(-1);
    let out = Tensor::zeros(&lhs.shape().dims);
    {
      let mut raw = out.raw_mut();
      let grad = grad.raw();
      for (row, &i) in self.indices.iter().enumerate() {
        raw[row * cols + i] += grad[row];
      }
    }
    out
  }
}


#[derive(Debug, Clone)]
pub struct Sum {
  dim: isize,
}

impl<T: Real> UnaryOp<T> for Sum {
  fn run(&self, lhs: &Tensor<T>) -> Tensor<T> {
    lhs.sum(self.dim)
  }

  fn derive(&self, lhs: &Tensor<T>, grad: &Tensor<T>) -> Tensor<T> {
    uncollapse(self.dim, lhs, grad)
  }
}

// Spread a collapsed tensor back over the shape it was collapsed from.
fn uncollapse<T: Real>(dim: isize, tensor: &Tensor<T>, grad: &Tensor<T>) -> Tensor<T> {
  let rank = tensor.rank();
  let dim = negative_index(dim, rank, false);
  let mut dims = tensor.shape().dims[..dim].to_vec();
  dims.resize(rank, 1);
  grad.reshape(&dims).broadcast(tensor.shape())
}


#[derive(Debug, Clone)]
pub struct Max {
  dim: isize,
}

impl<T: Real> UnaryOp<T> for Max {
  fn run(&self, lhs: &Tensor<T>) -> Tensor<T> {
    lhs.max(self.dim)
  }

  fn derive(&self, lhs: &Tensor<T>, grad: &Tensor<T>) -> Tensor<T> {
    let max = uncollapse(self.dim, lhs, &lhs.max(self.dim));
    uncollapse(self.dim, lhs, grad) * lhs.equal(&max).numeric::<T>()
  }
}


#[derive(Debug, Clone)]
pub struct Exp;

impl<T: Real> UnaryOp<T> for Exp {
  fn run(&self, lhs: &Tensor<T>) -> Tensor<T> {
    lhs.exp()
  }

  fn derive(&self, lhs: &Tensor<T>, grad: &Tensor<T>) -> Tensor<T> {
    grad * lhs.exp()
  }
}


#[derive(Debug, Clone)]
pub struct Log;

impl<T: Real> UnaryOp<T> for Log {
  fn run(&self, lhs: &Tensor<T>) -> Tensor<T> {
    lhs.log()
  }

  fn derive(&self, lhs: &Tensor<T>, grad: &Tensor<T>) -> Tensor<T> {
    grad / lhs
  }
}


#[derive(Debug, Clone)]
pub struct Tanh;

impl<T: Real> UnaryOp<T> for Tanh {
  fn run(&self, lhs: &Tensor<T>) -> Tensor<T> {
    lhs.tanh()
  }

  fn derive(&self, lhs: &Tensor<T>, grad: &Tensor<T>) -> Tensor<T> {
    let result = lhs.tanh();
    grad * (Tensor::scalar(T::one()) - &result * &result)
  }
}


#[derive(Debug, Clone)]
pub struct Sigmoid;

impl<T: Real> UnaryOp<T> for Sigmoid {
  fn run(&self, lhs: &Tensor<T>) -> Tensor<T> {
    lhs.sigmoid()
  }

  fn derive(&self, lhs: &Tensor<T>, grad: &Tensor<T>) -> Tensor<T> {
    let result = lhs.sigmoid();
    grad * (&result * (Tensor::scalar(T::one()) - &result))
  }
}


#[derive(Debug, Clone)]
pub struct ReLU;

impl<T: Real> UnaryOp<T> for ReLU {
  fn run(&self, lhs: &Tensor<T>) -> Tensor<T> {
    lhs.relu()
  }

  fn derive(&self, lhs: &Tensor<T>, grad: &Tensor<T>) -> Tensor<T> {
    grad * lhs.gt(&Tensor::scalar(T::zero())).numeric::<T>()
  }
}


#[cfg(test)]
mod tests {
  use super::*;

  const THRESHOLD: f64 = 1e-3;

  #[test]
  fn arithmetic_gradients() {
    assert!(Variable::<f64>::check_gradients(&[2,3], |x| x * x ) < THRESHOLD);
    assert!(Variable::<f64>::check_gradients(&[2,3], |x| x - &(x * 3.0) ) < THRESHOLD);
    assert!(Variable::<f64>::check_gradients(&[3], |x| 1.0 / &(x.sqr() + 1.0) ) < THRESHOLD);
    assert!(Variable::<f64>::check_gradients(&[3], |x| (x.sqr() + 2.0).powf(1.5) ) < THRESHOLD);
  }

  #[test]
  fn broadcast_gradients() {
    let rows = Tensor::<f64>::randn(&[4,3]).tracked();
    assert!(Variable::<f64>::check_gradients(&[3], |x| &rows * x ) < THRESHOLD);
    assert!(Variable::<f64>::check_gradients(&[4,1], |x| &rows + x ) < THRESHOLD);
  }

  #[test]
  fn matmul_gradients() {
    let w = Tensor::<f64>::randn(&[3,2]).tracked();
    let v = Tensor::<f64>::randn(&[4,2]).tracked();
    assert!(Variable::<f64>::check_gradients(&[4,3], |x| x.mm(&w) ) < THRESHOLD);
    assert!(Variable::<f64>::check_gradients(&[2,3], |x| v.mm(x) ) < THRESHOLD);
  }

  #[test]
  fn activation_gradients() {
    assert!(Variable::<f64>::check_gradients(&[2,3], |x| x.tanh() ) < THRESHOLD);
    assert!(Variable::<f64>::check_gradients(&[2,3], |x| x.sigmoid() ) < THRESHOLD);
    assert!(Variable::<f64>::check_gradients(&[2,3], |x| (x * 0.5).exp() ) < THRESHOLD);
    assert!(Variable::<f64>::check_gradients(&[2,3], |x| (x.sqr() + 1.0).log() ) < THRESHOLD);
  }

  #[test]
  fn relu_gradient() {
    let x = Tensor::vec(&[-1.0, 2.0]).trained();
    let y = x.relu().sum(0);
    y.backward();
    assert_eq!(x.grad(), Some(&Tensor::vec(&[0.0, 1.0])));
  }

  #[test]
  fn layout_gradients() {
    let other = Tensor::<f64>::randn(&[2,2]).tracked();
    assert!(Variable::<f64>::check_gradients(&[2,3], |x| x.transpose(0, 1) * 2.0 ) < THRESHOLD);
    assert!(Variable::<f64>::check_gradients(&[2,4], |x| x.narrow(-1, 1, 2).sqr() ) < THRESHOLD);
    assert!(Variable::<f64>::check_gradients(&[2,3], |x| x.concat(&other, -1).sqr() ) < THRESHOLD);
    assert!(Variable::<f64>::check_gradients(&[2,3], |x| other.concat(x, 1).sqr() ) < THRESHOLD);
    assert!(Variable::<f64>::check_gradients(&[6], |x| x.reshape(&[3,2]).sqr() ) < THRESHOLD);
  }

  #[test]
  fn reduction_gradients() {
    assert!(Variable::<f64>::check_gradients(&[2,3], |x| x.sum(-1).sqr() ) < THRESHOLD);
    assert!(Variable::<f64>::check_gradients(&[2,3], |x| x.mean(0) * 3.0 ) < THRESHOLD);
    assert!(Variable::<f64>::check_gradients(&[3,4], |x| x.softmax(-1).sqr() ) < THRESHOLD);
    assert!(Variable::<f64>::check_gradients(&[3,4], |x| x.cross_entropy(&[0, 3, 1]) ) < THRESHOLD);
  }

  #[test]
  fn max_gradient() {
    let x = Tensor::new(&[2,2], vec![1.0, 3.0, 4.0, 2.0]).trained();
    let y = x.max(-1).sum(0);
    y.backward();
    assert_eq!(x.grad(), Some(&Tensor::new(&[2,2], vec![0.0, 1.0, 1.0, 0.0])));
  }

  #[test]
  fn look_up_gradient() {
    let table = Tensor::<f64>::arrange(&[3,2], 0.0, 1.0).trained();
    let rows = table.embed(&[2, 0, 2], Some(0));
    assert_eq!(rows.tensor(), &Tensor::new(&[3,2], vec![4.0, 5.0, 0.0, 1.0, 4.0, 5.0]));
    rows.sum(0).backward();
    assert_eq!(table.grad(), Some(&Tensor::new(&[3,2], vec![0.0, 0.0, 0.0, 0.0, 2.0, 2.0])));
  }

  #[test]
  fn pick_gradient() {
    assert!(Variable::<f64>::check_gradients(&[3,4], |x| x.pick(&[1, 1, 3]).sqr() ) < THRESHOLD);
  }

  #[test]
  fn rem_gradient() {
    let x = Tensor::vec(&[5.5]).trained();
    let y = Tensor::vec(&[2.0]).trained();
    let z = (&x % &y).sum(0);
    assert_eq!(z.item(), 1.5);
    z.backward();
    assert_eq!(x.grad(), Some(&Tensor::vec(&[1.0])));
    assert_eq!(y.grad(), Some(&Tensor::vec(&[-2.0])));
  }
}
