use std::rc::Rc;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::fmt::Debug;

mod mops;
pub mod layer;

use crate::{
  internal::*,
  tensor::Tensor,
  scalar::Real,
  ops::{ BaseOps, NumericOps },
};


fn make_id() -> usize {
  static LAST_ID: AtomicUsize = AtomicUsize::new(0);
  LAST_ID.fetch_add(1, Ordering::Relaxed)
}


/// Unary computational operation that can also compute its derivative.

pub trait UnaryOp<T: Real>: Debug {
  fn run(&self, lhs: &Tensor<T>) -> Tensor<T>;
  fn derive(&self, lhs: &Tensor<T>, grad: &Tensor<T>) -> Tensor<T>;
}


/// Binary computational operation that can also compute its derivative.

pub trait BinaryOp<T: Real>: Debug {
  fn run(&self, lhs: &Tensor<T>, rhs: &Tensor<T>) -> Tensor<T>;
  fn derive(&self, lhs: &Tensor<T>, rhs: &Tensor<T>, grad: &Tensor<T>) -> (Tensor<T>, Tensor<T>);
}


#[derive(Debug)]
enum Op<T: Real> {
  Unary(Box<dyn UnaryOp<T>>),
  Binary(Box<dyn BinaryOp<T>>),
}


/// Node in a computation graph, containing a [Variable]'s data and gradient,
/// as well as the operation used to create it.

#[derive(Debug)]
struct Node<T: Real> {
  id: usize,
  data: Tensor<T>,
  grad: Option<Tensor<T>>,
  op: Option<Op<T>>,
  previous: Vec<Rc<Node<T>>>,
  trainable: bool,
}

impl<T: Real> Node<T> {
  fn reset_gradient(&self, filler: T) {
    if let Some(grad) = &self.grad {
      grad.refill(filler);
    }
  }

  fn backward(&self) {
    let (op, grad) = match (&self.op, &self.grad) {
      (Some(op), Some(grad)) => (op, grad),
      _ => return,
    };
    let lhs = &self.previous[0];
    let changes = match op {
      Op::Unary(op) => vec![op.derive(&lhs.data, grad)],
      Op::Binary(op) => {
        let rhs = &self.previous[1];
        let (l, r) = op.derive(&lhs.data, &rhs.data, grad);
        vec![l, r]
      },
    };
    for (change, prev) in changes.iter().zip(&self.previous) {
      if let Some(grad) = &prev.grad {
        grad.accumulate(change);
      }
    }
  }
}

// Unroll long chains manually, so recurrent graphs
// don't overflow the stack when they get dropped.
impl<T: Real> Drop for Node<T> {
  fn drop(&mut self) {
    let mut stack = std::mem::take(&mut self.previous);
    while let Some(node) = stack.pop() {
      if let Ok(mut node) = Rc::try_unwrap(node) {
        stack.append(&mut node.previous);
      }
    }
  }
}


/// Variables track the computational operations used to create them and allow
/// for computing their gradient with respect to all input variables involved.
///
/// They get created by calling [tracked](Tensor::tracked) or
/// [trained](Tensor::trained) on any differentiable [Tensor] type.
///
/// Variables dereference to their underlying [Tensor] automatically for
/// non-differentiable operations. Differentiable operations, on the other hand,
/// will always return another Variable.

#[derive(Debug, Clone)]
pub struct Variable<T: Real> {
  node: Rc<Node<T>>,
}

impl<T: Real> std::ops::Deref for Variable<T> {
  type Target = Tensor<T>;

  fn deref(&self) -> &Self::Target {
    &self.node.data
  }
}

impl<T: Real> PartialEq for Variable<T> {
  fn eq(&self, rhs: &Self) -> bool {
    self.node.data == rhs.node.data
  }
}

impl<T: Real> From<T> for Variable<T> {
  fn from(value: T) -> Self {
    Self::scalar(value)
  }
}

impl<T: Real> Variable<T> {
  pub(crate) fn from_tensor(tensor: Tensor<T>, trainable: bool) -> Self {
    Self {
      node: Rc::new(Node {
        id: make_id(),
        grad: trainable.then(|| Tensor::zeros(&tensor.shape().dims) ),
        data: tensor,
        op: None,
        previous: vec![],
        trainable,
      }),
    }
  }

  fn operation(op: Op<T>, data: Tensor<T>, previous: Vec<Rc<Node<T>>>) -> Self {
    let needs_grad = previous.iter().any(|prev| prev.grad.is_some() );
    Self {
      node: Rc::new(Node {
        id: make_id(),
        grad: needs_grad.then(|| Tensor::zeros(&data.shape().dims) ),
        data,
        op: Some(op),
        previous,
        trainable: false,
      }),
    }
  }

  pub fn id(&self) -> usize {
    self.node.id
  }

  pub fn tensor(&self) -> &Tensor<T> {
    &self.node.data
  }

  pub fn grad(&self) -> Option<&Tensor<T>> {
    self.node.grad.as_ref()
  }

  pub fn is_trainable(&self) -> bool {
    self.node.trainable
  }

  /// Untracked copy of this Variable's data, cut off from its graph.

  pub fn detached(&self) -> Self {
    self.node.data.detach().tracked()
  }

  pub fn unary_op(&self, op: impl UnaryOp<T> + 'static) -> Self {
    let data = op.run(&self.node.data);
    Self::operation(Op::Unary(Box::new(op)), data, vec![self.node.clone()])
  }

  pub fn binary_op(&self, op: impl BinaryOp<T> + 'static, rhs: &Self) -> Self {
    let data = op.run(&self.node.data, &rhs.node.data);
    Self::operation(
      Op::Binary(Box::new(op)),
      data,
      vec![self.node.clone(), rhs.node.clone()],
    )
  }

  /// Compute gradients across this Variable's entire graph.

  pub fn backward(&self) {
    if self.grad().is_none() { panic!("Cannot compute gradients for constant {self}") }
    self.node.reset_gradient(T::one());
    for node in self.history().iter().rev() {
      node.backward();
    }
  }

  /// List all trainable parameters in this Variable's graph.

  pub fn parameters(&self) -> Vec<Self> {
    self.history()
      .into_iter()
      .filter(|node| node.trainable )
      .map(|node| Self { node } )
      .collect()
  }

  /// Set gradients to zero for this Variable's entire graph.

  pub fn reset(&self) {
    for node in self.history() {
      node.reset_gradient(T::zero());
    }
  }

  // Nodes are created after their inputs, so
  // ordering by id yields a topological sort.
  fn history(&self) -> Vec<Rc<Node<T>>> {
    let mut visited = HashSet::new();
    let mut history = vec![];
    let mut stack = vec![self.node.clone()];
    while let Some(node) = stack.pop() {
      if !visited.insert(node.id) { continue }
      for prev in &node.previous {
        if !visited.contains(&prev.id) {
          stack.push(prev.clone());
        }
      }
      history.push(node);
    }
    history.sort_by_key(|node| node.id );
    history
  }

  /// Compute a function's gradient with respect to a generated
  /// input numerically and compare it to the automatically derived
  /// solution.
  ///
  /// Supply any function to check that it gets differentiated correctly.
  /// Returns the mean absolute difference between both gradients.

  pub fn check_gradients<F>(shape: &[usize], generator: F) -> T
  where
    F: Fn(&Self) -> Self
  {
    let eps: T = cast(0.01);
    let two: T = cast(2.0);
    let input = Tensor::randn(shape);
    let var = input.trained();
    let output = generator(&var).sum(0);
    output.reset();
    output.backward();
    let grad = var.grad()
      .map(|grad| grad.detach() )
      .unwrap_or_else(|| Tensor::zeros(shape) );
    let len = input.size();
    let mut error = T::zero();
    for i in 0..len {
      let epst = Tensor::hot_encode(i, len).reshape(shape) * eps;
      let prev = generator(&(&input - &epst).tracked()).sum(0);
      let next = generator(&(&input + &epst).tracked()).sum(0);
      let numeric = (next.item() - prev.item()) / (two * eps);
      let diff = grad.raw()[i] - numeric;
      error += if diff < T::zero() { -diff } else { diff };
    }
    error / cast(len as f64)
  }

  /// Count nodes, operations and trainable parameters in this Variable's graph.

  pub fn statistics(&self) -> (usize, usize, usize) {
    let history = self.history();
    let num_ops = history.iter().filter(|node| node.op.is_some() ).count();
    let num_params = history.iter()
      .filter(|node| node.trainable )
      .map(|node| node.data.size() )
      .sum();
    (history.len(), num_ops, num_params)
  }
}

impl<T: Real> std::fmt::Display for Variable<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
    let title = if self.node.trainable {
      "Trainable"
    } else if self.node.grad.is_some() {
      "Computed"
    } else {
      "Tracked"
    };
    write!(f, "{title} {}", self.tensor())
  }
}
