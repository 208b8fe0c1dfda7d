use std::path::Path;

use serde::{ Serialize, Deserialize };

use crate::{
  batch::SpecialTokens,
  error::{ Result, VaeError },
  optimize::{ Strategy, Sgd, Momentum, Nesterov, Adam, Adadelta },
  scalar::Real,
};


/// Optimization strategy used for training.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OptimizerKind {
  #[default]
  Adadelta,
  Adam,
  #[serde(rename = "SGD", alias = "Sgd")]
  Sgd,
  Momentum,
  Nesterov,
}

impl OptimizerKind {
  pub fn strategy<R: Real>(self) -> Box<dyn Strategy<R>> {
    match self {
      Self::Adadelta => Box::new(Adadelta::default()),
      Self::Adam => Box::new(Adam::default()),
      Self::Sgd => Box::new(Sgd),
      Self::Momentum => Box::new(Momentum::default()),
      Self::Nesterov => Box::new(Nesterov::default()),
    }
  }
}


/// Hyperparameters shared by encoder, decoder and training loop.
///
/// Every field has a default, except for `vocab_size`
/// which must always be given.

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VaeParams {
  pub vocab_size: usize,
  /// Number of output logits, defaults to `vocab_size`.
  pub output_size: Option<usize>,
  pub embedding_size: usize,
  pub rnn_cell_size: usize,
  pub latent_dim: usize,
  pub stack_width: usize,
  pub stack_depth: usize,
  pub n_layers: usize,
  pub dropout: f64,
  pub batch_size: usize,
  pub learning_rate: f64,
  pub optimizer: OptimizerKind,
  pub clip_grad: Option<f64>,
  pub padding_index: usize,
  pub dropout_index: usize,
  pub start_index: usize,
  pub end_index: usize,
  /// Probability of keeping a decoder input token during training.
  pub input_keep: f64,
  pub use_stack: bool,
  pub bidirectional: bool,
  pub kl_growth: f64,
  pub generate_len: usize,
  pub temperature: f64,
}

impl Default for VaeParams {
  fn default() -> Self {
    Self {
      vocab_size: 0,
      output_size: None,
      embedding_size: 16,
      rnn_cell_size: 64,
      latent_dim: 32,
      stack_width: 16,
      stack_depth: 8,
      n_layers: 1,
      dropout: 0.0,
      batch_size: 32,
      learning_rate: 0.01,
      optimizer: OptimizerKind::Adadelta,
      clip_grad: None,
      padding_index: 0,
      dropout_index: 1,
      start_index: 2,
      end_index: 3,
      input_keep: 1.0,
      use_stack: true,
      bidirectional: false,
      kl_growth: 0.0015,
      generate_len: 100,
      temperature: 0.8,
    }
  }
}

impl VaeParams {
  pub fn new(vocab_size: usize) -> Self {
    Self { vocab_size, ..Self::default() }
  }

  pub fn from_json_str(json: &str) -> Result<Self> {
    let params: Self = serde_json::from_str(json)?;
    params.validate()?;
    Ok(params)
  }

  pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
    let json = std::fs::read_to_string(path)?;
    Self::from_json_str(&json)
  }

  pub fn to_json(&self) -> Result<String> {
    Ok(serde_json::to_string_pretty(self)?)
  }

  pub fn output_size(&self) -> usize {
    self.output_size.unwrap_or(self.vocab_size)
  }

  pub fn tokens(&self) -> SpecialTokens {
    SpecialTokens {
      padding: self.padding_index,
      dropout: self.dropout_index,
      start: self.start_index,
      end: self.end_index,
    }
  }

  pub fn validate(&self) -> Result<()> {
    let sizes = [
      ("vocab_size", self.vocab_size),
      ("output_size", self.output_size()),
      ("embedding_size", self.embedding_size),
      ("rnn_cell_size", self.rnn_cell_size),
      ("latent_dim", self.latent_dim),
      ("stack_width", self.stack_width),
      ("stack_depth", self.stack_depth),
      ("n_layers", self.n_layers),
      ("batch_size", self.batch_size),
    ];
    if let Some((name, _)) = sizes.iter().find(|(_, size)| *size == 0 ) {
      return Err(VaeError::invalid_parameter(format!("{name} must be positive")))
    }
    if !(0.0..1.0).contains(&self.dropout) {
      return Err(VaeError::invalid_parameter(
        format!("dropout must be in [0, 1), got {}", self.dropout)))
    }
    let positive = [
      ("learning_rate", self.learning_rate),
      ("temperature", self.temperature),
    ];
    for (name, value) in positive {
      if value <= 0.0 || !value.is_finite() {
        return Err(VaeError::invalid_parameter(format!("{name} must be positive, got {value}")))
      }
    }
    if self.kl_growth < 0.0 || !self.kl_growth.is_finite() {
      return Err(VaeError::invalid_parameter(
        format!("kl_growth must be non-negative, got {}", self.kl_growth)))
    }
    if !(self.input_keep > 0.0 && self.input_keep <= 1.0) {
      return Err(VaeError::invalid_parameter(
        format!("input_keep must be in (0, 1], got {}", self.input_keep)))
    }
    if matches!(self.clip_grad, Some(norm) if norm <= 0.0 || !norm.is_finite()) {
      return Err(VaeError::invalid_parameter("clip_grad must be positive"))
    }
    let tokens = [
      ("padding_index", self.padding_index),
      ("dropout_index", self.dropout_index),
      ("start_index", self.start_index),
      ("end_index", self.end_index),
    ];
    for (name, token) in tokens {
      if token >= self.vocab_size {
        return Err(VaeError::invalid_parameter(
          format!("{name} {token} is outside of the vocabulary of size {}", self.vocab_size)))
      }
    }
    if self.end_index >= self.output_size() {
      return Err(VaeError::invalid_parameter("end_index must be a valid output token"))
    }
    if self.bidirectional {
      return Err(VaeError::invalid_parameter("bidirectional recurrence is not supported"))
    }
    Ok(())
  }
}
