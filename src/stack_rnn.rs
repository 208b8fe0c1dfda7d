//! Recurrent cell augmented with a differentiable stack memory.
//!
//! At every step the top layer's hidden state decides, softly, whether to
//! push a new value onto the stack, pop the top element or leave the stack
//! as it is. The stack's new top element is fed into the GRU together with
//! the embedded input token.

use tracing::trace;

use crate::{
  config::VaeParams,
  error::{ Result, VaeError },
  internal::*,
  ops::*,
  scalar::Real,
  tensor::Tensor,
  variable::{ Variable, layer::{ Module, Linear, Embedding, Gru, prefixed } },
};


/// Hidden states of all GRU layers, each `[batch, hidden_size]`.

#[derive(Debug, Clone)]
pub struct Hidden<T: Real> {
  pub layers: Vec<Variable<T>>,
}

impl<T: Real> Hidden<T> {
  pub fn zeros(num_layers: usize, batch: usize, hidden_size: usize) -> Self {
    let layers = (0..num_layers)
      .map(|_| Tensor::zeros(&[batch, hidden_size]).tracked() )
      .collect();
    Self { layers }
  }

  /// Use the same state for every layer.

  pub fn repeated(state: &Variable<T>, num_layers: usize) -> Self {
    Self { layers: vec![state.clone(); num_layers] }
  }

  /// Hidden state of the last layer.

  pub fn top(&self) -> &Variable<T> {
    &self.layers[self.layers.len() - 1]
  }

  pub fn batch_size(&self) -> usize {
    self.layers[0].dim(0)
  }

  pub fn detached(&self) -> Self {
    Self { layers: self.layers.iter().map(|layer| layer.detached() ).collect() }
  }
}


/// Differentiable stack of `depth` elements of `width` values
/// for every batch entry. Element 0 is the top.
///
/// Stored flat as `[batch, depth * width]`.

#[derive(Debug, Clone)]
pub struct Stack<T: Real> {
  pub memory: Variable<T>,
  depth: usize,
  width: usize,
}

impl<T: Real> Stack<T> {
  pub fn zeros(batch: usize, depth: usize, width: usize) -> Self {
    Self {
      memory: Tensor::zeros(&[batch, depth * width]).tracked(),
      depth,
      width,
    }
  }

  /// Wrap a `[batch, depth, width]` tensor.

  pub fn from_tensor(tensor: &Tensor<T>) -> Self {
    let dims = &tensor.shape().dims;
    assert_eq!(dims.len(), 3, "Stack must be [batch, depth, width], got {}", tensor.shape());
    Self {
      memory: tensor.reshape(&[dims[0], dims[1] * dims[2]]).tracked(),
      depth: dims[1],
      width: dims[2],
    }
  }

  pub fn depth(&self) -> usize {
    self.depth
  }

  pub fn width(&self) -> usize {
    self.width
  }

  pub fn batch_size(&self) -> usize {
    self.memory.dim(0)
  }

  /// Top element, `[batch, width]`.

  pub fn top(&self) -> Variable<T> {
    self.memory.narrow(-1, 0, self.width)
  }

  /// Apply soft `[batch, 3]` push/pop/no-op `controls`, pushing `value`.

  pub fn augment(&self, controls: &Variable<T>, value: &Variable<T>) -> Self {
    let (d, w) = (self.depth, self.width);
    let push = controls.narrow(-1, 0, 1);
    let pop = controls.narrow(-1, 1, 1);
    let no_op = controls.narrow(-1, 2, 1);

    let empty = Tensor::zeros(&[self.batch_size(), w]).tracked();
    let (up, down) = if d == 1 {
      (value.clone(), empty)
    } else {
      let rest = (d - 1) * w;
      (
        value.concat(&self.memory.narrow(-1, 0, rest), -1),
        self.memory.narrow(-1, w, rest).concat(&empty, -1),
      )
    };

    let memory = no_op * &self.memory + push * up + pop * down;
    Self { memory, depth: d, width: w }
  }

  /// Copy of the stack as `[batch, depth, width]`.

  pub fn to_tensor(&self) -> Tensor<T> {
    self.memory.tensor().detach().reshape(&[self.batch_size(), self.depth, self.width])
  }

  pub fn detached(&self) -> Self {
    Self { memory: self.memory.detached(), depth: self.depth, width: self.width }
  }
}


#[derive(Debug, Clone)]
struct StackGates<T: Real> {
  controls: Linear<T>,
  input: Linear<T>,
}


/// Multi-layer GRU whose input gets augmented with the top of a [Stack].

#[derive(Debug, Clone)]
pub struct StackGru<T: Real> {
  pub embedding: Embedding<T>,
  stack: Option<StackGates<T>>,
  pub gru: Gru<T>,
  pub output: Linear<T>,
  stack_depth: usize,
  stack_width: usize,
  training: bool,
}

impl<T: Real> StackGru<T> {
  pub fn new(params: &VaeParams) -> Result<Self> {
    params.validate()?;
    let hidden = params.rnn_cell_size;
    let stack = params.use_stack.then(|| StackGates {
      controls: Linear::new(hidden, 3),
      input: Linear::new(hidden, params.stack_width),
    });
    let input_size = params.embedding_size + if params.use_stack { params.stack_width } else { 0 };
    Ok(Self {
      embedding: Embedding::new(params.vocab_size, params.embedding_size, Some(params.padding_index)),
      stack,
      gru: Gru::new(input_size, hidden, params.n_layers, cast(params.dropout)),
      output: Linear::new(hidden, params.output_size()),
      stack_depth: params.stack_depth,
      stack_width: params.stack_width,
      training: true,
    })
  }

  pub fn hidden_size(&self) -> usize {
    self.output.inputs()
  }

  pub fn output_size(&self) -> usize {
    self.output.outputs()
  }

  pub fn vocab_size(&self) -> usize {
    self.embedding.vocab_size()
  }

  pub fn num_layers(&self) -> usize {
    self.gru.num_layers()
  }

  pub fn uses_stack(&self) -> bool {
    self.stack.is_some()
  }

  pub fn init_hidden(&self, batch: usize) -> Hidden<T> {
    Hidden::zeros(self.num_layers(), batch, self.hidden_size())
  }

  pub fn init_stack(&self, batch: usize) -> Stack<T> {
    Stack::zeros(batch, self.stack_depth, self.stack_width)
  }

  pub fn set_training(&mut self, training: bool) {
    self.training = training;
  }

  pub fn is_training(&self) -> bool {
    self.training
  }

  /// Feed one token per batch entry, returning output
  /// logits `[batch, output_size]` and the updated state.

  pub fn step(&self, tokens: &[usize], hidden: &Hidden<T>, stack: &Stack<T>) -> Result<(Variable<T>, Hidden<T>, Stack<T>)> {
    let batch = tokens.len();
    if batch == 0 { return Err(VaeError::empty("token batch")) }
    if let Some(&token) = tokens.iter().find(|&&t| t >= self.vocab_size() ) {
      return Err(VaeError::token_out_of_range(token, self.vocab_size()))
    }
    if hidden.layers.len() != self.num_layers() {
      return Err(VaeError::shape_mismatch("hidden layers", &[self.num_layers()], &[hidden.layers.len()]))
    }
    for layer in &hidden.layers {
      let expected = [batch, self.hidden_size()];
      if layer.shape().dims != expected {
        return Err(VaeError::shape_mismatch("hidden state", &expected, &layer.shape().dims))
      }
    }
    if stack.batch_size() != batch || stack.depth() != self.stack_depth || stack.width() != self.stack_width {
      return Err(VaeError::shape_mismatch(
        "stack",
        &[batch, self.stack_depth, self.stack_width],
        &[stack.batch_size(), stack.depth(), stack.width()],
      ))
    }

    let embedded = self.embedding.forward(tokens);
    let (input, stack) = match &self.stack {
      Some(gates) => {
        let top = hidden.top();
        let controls = gates.controls.forward(top).softmax(-1);
        let value = gates.input.forward(top).tanh();
        let stack = stack.augment(&controls, &value);
        (embedded.concat(&stack.top(), -1), stack)
      },
      None => (embedded, stack.clone()),
    };

    let layers = self.gru.step(&input, &hidden.layers, self.training);
    let hidden = Hidden { layers };
    let output = self.output.forward(hidden.top());
    trace!(batch, "Stack GRU step");
    Ok((output, hidden, stack))
  }
}

impl<T: Real> Module<T> for StackGru<T> {
  fn named_parameters(&self) -> Vec<(String, Variable<T>)> {
    let mut params = prefixed("embedding", &self.embedding);
    if let Some(gates) = &self.stack {
      params.extend(prefixed("stack_controls", &gates.controls));
      params.extend(prefixed("stack_input", &gates.input));
    }
    params.extend(prefixed("gru", &self.gru));
    params.extend(prefixed("output", &self.output));
    params
  }
}


#[cfg(test)]
mod tests {
  use super::*;

  fn stack() -> Stack<f64> {
    Stack::from_tensor(&Tensor::new(&[1,3,2], vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]))
  }

  fn controls(push: f64, pop: f64, no_op: f64) -> Variable<f64> {
    Tensor::new(&[1,3], vec![push, pop, no_op]).tracked()
  }

  #[test]
  fn push() {
    let value = Tensor::new(&[1,2], vec![9.0, 8.0]).tracked();
    let pushed = stack().augment(&controls(1.0, 0.0, 0.0), &value);
    assert_eq!(pushed.to_tensor(), Tensor::new(&[1,3,2], vec![9.0, 8.0, 1.0, 2.0, 3.0, 4.0]));
    assert_eq!(pushed.top().tensor(), &Tensor::new(&[1,2], vec![9.0, 8.0]));
  }

  #[test]
  fn pop() {
    let value = Tensor::new(&[1,2], vec![9.0, 8.0]).tracked();
    let popped = stack().augment(&controls(0.0, 1.0, 0.0), &value);
    assert_eq!(popped.to_tensor(), Tensor::new(&[1,3,2], vec![3.0, 4.0, 5.0, 6.0, 0.0, 0.0]));
  }

  #[test]
  fn no_op() {
    let value = Tensor::new(&[1,2], vec![9.0, 8.0]).tracked();
    let kept = stack().augment(&controls(0.0, 0.0, 1.0), &value);
    assert_eq!(kept.to_tensor(), stack().to_tensor());
  }

  #[test]
  fn soft_mixture() {
    let value = Tensor::new(&[1,2], vec![10.0, 10.0]).tracked();
    let mixed = stack().augment(&controls(0.5, 0.25, 0.25), &value);
    // 0.25 * [1, 2] + 0.5 * [10, 10] + 0.25 * [3, 4]
    assert_eq!(mixed.top().tensor(), &Tensor::new(&[1,2], vec![6.0, 6.5]));
  }

  #[test]
  fn depth_one() {
    let stack = Stack::from_tensor(&Tensor::new(&[1,1,2], vec![1.0, 2.0]));
    let value = Tensor::new(&[1,2], vec![9.0, 8.0]).tracked();
    assert_eq!(stack.augment(&controls(1.0, 0.0, 0.0), &value).to_tensor(),
      Tensor::new(&[1,1,2], vec![9.0, 8.0]));
    assert_eq!(stack.augment(&controls(0.0, 1.0, 0.0), &value).to_tensor(),
      Tensor::new(&[1,1,2], vec![0.0, 0.0]));
  }

  fn params() -> VaeParams {
    VaeParams {
      embedding_size: 4,
      rnn_cell_size: 6,
      stack_width: 3,
      stack_depth: 5,
      n_layers: 2,
      ..VaeParams::new(7)
    }
  }

  #[test]
  fn step_shapes() {
    let rnn = StackGru::<f64>::new(&params()).unwrap();
    let hidden = rnn.init_hidden(2);
    let stack = rnn.init_stack(2);
    let (output, hidden, stack) = rnn.step(&[4, 5], &hidden, &stack).unwrap();
    assert_eq!(output.shape().dims, vec![2, 7]);
    assert_eq!(hidden.layers.len(), 2);
    assert_eq!(hidden.top().shape().dims, vec![2, 6]);
    assert_eq!(stack.to_tensor().shape().dims, vec![2, 5, 3]);
  }

  #[test]
  fn without_stack() {
    let rnn = StackGru::<f32>::new(&VaeParams { use_stack: false, ..params() }).unwrap();
    assert!(!rnn.uses_stack());
    assert!(rnn.named_parameters().iter().all(|(name, _)| !name.starts_with("stack") ));
    let (output, _, _) = rnn.step(&[1], &rnn.init_hidden(1), &rnn.init_stack(1)).unwrap();
    assert_eq!(output.shape().dims, vec![1, 7]);
  }

  #[test]
  fn step_errors() {
    let rnn = StackGru::<f64>::new(&params()).unwrap();
    let hidden = rnn.init_hidden(2);
    let stack = rnn.init_stack(2);
    assert!(matches!(rnn.step(&[4, 7], &hidden, &stack), Err(VaeError::TokenOutOfRange { token: 7, .. })));
    assert!(matches!(rnn.step(&[4], &hidden, &stack), Err(VaeError::ShapeMismatch { .. })));
    assert!(matches!(rnn.step(&[4, 4], &hidden, &rnn.init_stack(3)), Err(VaeError::ShapeMismatch { .. })));
    assert!(matches!(rnn.step(&[], &hidden, &stack), Err(VaeError::EmptyInput { .. })));
  }

  #[test]
  fn parameter_names() {
    let rnn = StackGru::<f32>::new(&params()).unwrap();
    let names: Vec<_> = rnn.named_parameters().into_iter().map(|(name, _)| name ).collect();
    assert_eq!(names[0], "embedding.weight");
    assert!(names.contains(&"stack_controls.weight".to_string()));
    assert!(names.contains(&"gru.1.hidden.bias".to_string()));
    assert_eq!(names.last().map(String::as_str), Some("output.bias"));
  }

  #[test]
  fn stack_gradients() {
    let controls = Tensor::new(&[2,3], vec![0.2, 0.5, 0.3, 0.6, 0.1, 0.3]).tracked();
    let value = Tensor::<f64>::randn(&[2,2]).tracked();
    let error = Variable::<f64>::check_gradients(&[2,6], |memory| {
      let stack = Stack { memory: memory.clone(), depth: 3, width: 2 };
      stack.augment(&controls, &value).memory.sqr()
    });
    assert!(error < 1e-3);
  }
}
