//! Error types for model construction, training and persistence.

use thiserror::Error;


/// Errors caused by user supplied data, parameters or files.
///
/// Shape violations inside the tensor core are programming
/// errors and panic instead.

#[derive(Debug, Error)]
pub enum VaeError {
  #[error("I/O error: {0}")]
  Io(#[from] std::io::Error),

  #[error("Invalid parameter file: {0}")]
  Json(#[from] serde_json::Error),

  #[error("Checkpoint codec error: {0}")]
  Codec(#[from] postcard::Error),

  #[error("Invalid parameter: {message}")]
  InvalidParameter {
    message: String,
  },

  /// A tensor or sequence didn't have the expected dimensions.
  #[error("Shape mismatch for {what}: expected {expected:?}, actual {actual:?}")]
  ShapeMismatch {
    what: String,
    expected: Vec<usize>,
    actual: Vec<usize>,
  },

  #[error("Token {token} is outside of the vocabulary of size {vocab_size}")]
  TokenOutOfRange {
    token: usize,
    vocab_size: usize,
  },

  #[error("Empty input: {what}")]
  EmptyInput {
    what: &'static str,
  },

  #[error("Checkpoint is missing weight '{name}'")]
  MissingWeight {
    name: String,
  },

  #[error("Could not sample token: {0}")]
  Sampling(#[from] rand::distributions::WeightedError),
}

impl VaeError {
  pub fn invalid_parameter(message: impl Into<String>) -> Self {
    Self::InvalidParameter { message: message.into() }
  }

  pub fn shape_mismatch(what: impl Into<String>, expected: &[usize], actual: &[usize]) -> Self {
    Self::ShapeMismatch {
      what: what.into(),
      expected: expected.to_vec(),
      actual: actual.to_vec(),
    }
  }

  pub fn token_out_of_range(token: usize, vocab_size: usize) -> Self {
    Self::TokenOutOfRange { token, vocab_size }
  }

  pub fn empty(what: &'static str) -> Self {
    Self::EmptyInput { what }
  }
}


pub type Result<T> = std::result::Result<T, VaeError>;


#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn messages() {
    let errors = vec![
      VaeError::invalid_parameter("vocab_size must be positive"),
      VaeError::shape_mismatch("latent", &[2, 8], &[2, 4]),
      VaeError::token_out_of_range(40, 32),
      VaeError::empty("input sequence"),
      VaeError::MissingWeight { name: "decoder.rnn.embedding.weight".to_string() },
    ];
    let expected = [
      "vocab_size",
      "expected [2, 8], actual [2, 4]",
      "Token 40",
      "input sequence",
      "decoder.rnn.embedding.weight",
    ];
    for (err, expected) in errors.iter().zip(expected) {
      let display = err.to_string();
      assert!(display.contains(expected), "{display} should contain {expected}");
    }
  }

  #[test]
  fn conversions() {
    let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
    assert!(matches!(VaeError::from(io), VaeError::Io(_)));
    let json = serde_json::from_str::<u32>("nope").unwrap_err();
    assert!(matches!(VaeError::from(json), VaeError::Json(_)));
  }
}
