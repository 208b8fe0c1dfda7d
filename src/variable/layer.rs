use crate::{
  internal::*,
  ops::*,
  scalar::Real,
  tensor::Tensor,
  variable::Variable,
};


/// Collection of trainable parameters, addressable by name.

pub trait Module<T: Real> {
  fn named_parameters(&self) -> Vec<(String, Variable<T>)>;

  fn parameters(&self) -> Vec<Variable<T>> {
    self.named_parameters()
      .into_iter()
      .map(|(_, param)| param )
      .collect()
  }

  fn num_parameters(&self) -> usize {
    self.parameters().iter().map(|param| param.size() ).sum()
  }
}

/// Prefix all names of a submodule's parameters.

pub fn prefixed<T: Real>(prefix: &str, module: &impl Module<T>) -> Vec<(String, Variable<T>)> {
  module.named_parameters()
    .into_iter()
    .map(|(name, param)| (format!("{prefix}.{name}"), param) )
    .collect()
}


impl<T: Real> Variable<T> {
  /// Zero out random elements with the given `probability`
  /// and rescale the rest, when training.

  pub fn dropout(&self, probability: T, train: bool) -> Self {
    if !train || probability <= T::zero() { return self.clone() }
    let keep = T::one() - probability;
    let mask = Tensor::fill(&self.shape().dims, keep).bernoulli::<T>() / keep;
    self * &mask.tracked()
  }
}


/// Fully connected layer computing `x * weight + bias`.

#[derive(Debug, Clone)]
pub struct Linear<T: Real> {
  pub weight: Variable<T>,
  pub bias: Variable<T>,
}

impl<T: Real> Linear<T> {
  pub fn new(inputs: usize, outputs: usize) -> Self {
    let bound: T = cast(1.0 / (inputs.max(1) as f64).sqrt());
    Self {
      weight: Tensor::uniform(&[inputs, outputs], -bound, bound).trained(),
      bias: Tensor::uniform(&[outputs], -bound, bound).trained(),
    }
  }

  pub fn inputs(&self) -> usize {
    self.weight.dim(0)
  }

  pub fn outputs(&self) -> usize {
    self.weight.dim(1)
  }

  pub fn forward(&self, input: &Variable<T>) -> Variable<T> {
    input.mm(&self.weight) + &self.bias
  }
}

impl<T: Real> Module<T> for Linear<T> {
  fn named_parameters(&self) -> Vec<(String, Variable<T>)> {
    vec![
      ("weight".to_string(), self.weight.clone()),
      ("bias".to_string(), self.bias.clone()),
    ]
  }
}


/// Trainable lookup table from token indices to dense vectors.

#[derive(Debug, Clone)]
pub struct Embedding<T: Real> {
  pub weight: Variable<T>,
  pub padding: Option<usize>,
}

impl<T: Real> Embedding<T> {
  pub fn new(vocab_size: usize, width: usize, padding: Option<usize>) -> Self {
    let table = Tensor::randn(&[vocab_size, width]);
    if let Some(padding) = padding {
      if padding < vocab_size {
        let mut raw = table.raw_mut();
        for value in &mut raw[padding * width..(padding + 1) * width] {
          *value = T::zero();
        }
      }
    }
    Self { weight: table.trained(), padding }
  }

  pub fn vocab_size(&self) -> usize {
    self.weight.dim(0)
  }

  pub fn width(&self) -> usize {
    self.weight.dim(1)
  }

  pub fn forward(&self, tokens: &[usize]) -> Variable<T> {
    self.weight.embed(tokens, self.padding)
  }
}

impl<T: Real> Module<T> for Embedding<T> {
  fn named_parameters(&self) -> Vec<(String, Variable<T>)> {
    vec![("weight".to_string(), self.weight.clone())]
  }
}


/// Single GRU layer, gated the same way as cuDNN.

#[derive(Debug, Clone)]
pub struct GruLayer<T: Real> {
  pub input: Linear<T>,
  pub hidden: Linear<T>,
  hidden_size: usize,
}

impl<T: Real> GruLayer<T> {
  pub fn new(input_size: usize, hidden_size: usize) -> Self {
    Self {
      input: Linear::new(input_size, hidden_size * 3),
      hidden: Linear::new(hidden_size, hidden_size * 3),
      hidden_size,
    }
  }

  pub fn hidden_size(&self) -> usize {
    self.hidden_size
  }

  pub fn step(&self, input: &Variable<T>, hidden: &Variable<T>) -> Variable<T> {
    let size = self.hidden_size;
    let gi = self.input.forward(input);
    let gh = self.hidden.forward(hidden);
    let chunk = |gates: &Variable<T>, i: usize| gates.narrow(-1, i * size, size);

    let reset = (chunk(&gi, 0) + chunk(&gh, 0)).sigmoid();
    let update = (chunk(&gi, 1) + chunk(&gh, 1)).sigmoid();
    let candidate = (chunk(&gi, 2) + reset * chunk(&gh, 2)).tanh();

    &candidate + update * (hidden - &candidate)
  }
}

impl<T: Real> Module<T> for GruLayer<T> {
  fn named_parameters(&self) -> Vec<(String, Variable<T>)> {
    [prefixed("input", &self.input), prefixed("hidden", &self.hidden)].concat()
  }
}


/// Stack of GRU layers, with dropout applied between layers.

#[derive(Debug, Clone)]
pub struct Gru<T: Real> {
  pub layers: Vec<GruLayer<T>>,
  pub dropout: T,
}

impl<T: Real> Gru<T> {
  pub fn new(input_size: usize, hidden_size: usize, num_layers: usize, dropout: T) -> Self {
    let layers = (0..num_layers.max(1))
      .map(|l| GruLayer::new(if l == 0 { input_size } else { hidden_size }, hidden_size) )
      .collect();
    Self { layers, dropout }
  }

  pub fn num_layers(&self) -> usize {
    self.layers.len()
  }

  /// Advance all layers by one time step, returning their new hidden states.

  pub fn step(&self, input: &Variable<T>, hidden: &[Variable<T>], train: bool) -> Vec<Variable<T>> {
    assert_eq!(hidden.len(), self.layers.len(),
      "Expected {} hidden states, got {}", self.layers.len(), hidden.len());
    let mut states = Vec::with_capacity(self.layers.len());
    for (l, (layer, h)) in self.layers.iter().zip(hidden).enumerate() {
      let state = if l == 0 {
        layer.step(input, h)
      } else {
        let below: &Variable<T> = &states[l - 1];
        layer.step(&below.dropout(self.dropout, train), h)
      };
      states.push(state);
    }
    states
  }
}

impl<T: Real> Module<T> for Gru<T> {
  fn named_parameters(&self) -> Vec<(String, Variable<T>)> {
    self.layers.iter()
      .enumerate()
      .flat_map(|(l, layer)| prefixed(&l.to_string(), layer) )
      .collect()
  }
}
