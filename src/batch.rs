use rand::Rng;
use serde::{ Serialize, Deserialize };

use crate::error::{ Result, VaeError };


/// Vocabulary indices with a special meaning.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecialTokens {
  pub padding: usize,
  /// Replaces decoder inputs that get dropped. Doubles as the unknown token.
  pub dropout: usize,
  pub start: usize,
  pub end: usize,
}

impl Default for SpecialTokens {
  fn default() -> Self {
    Self { padding: 0, dropout: 1, start: 2, end: 3 }
  }
}


/// Step-major token sequences for one training batch.
///
/// All three sequences hold `len()` steps of `batch_size()` tokens.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceBatch {
  pub encoder: Vec<Vec<usize>>,
  pub decoder: Vec<Vec<usize>>,
  pub target: Vec<Vec<usize>>,
}

impl SequenceBatch {
  /// Build encoder input, decoder input and decoder target from
  /// batch-major token sequences.
  ///
  /// Padding tokens are removed first. The decoder input is prefixed with
  /// the start token and its tokens are replaced by the dropout token with
  /// probability `1 - input_keep`. The target is suffixed with the end token.

  pub fn prepare<R: Rng>(
    sequences: &[Vec<usize>],
    tokens: SpecialTokens,
    input_keep: f64,
    rng: &mut R,
  ) -> Result<Self> {
    if sequences.is_empty() { return Err(VaeError::empty("batch")) }
    if !(input_keep > 0.0 && input_keep <= 1.0) {
      return Err(VaeError::invalid_parameter(
        format!("input_keep must be in (0, 1], got {input_keep}")))
    }

    let stripped: Vec<Vec<usize>> = sequences.iter()
      .map(|seq| seq.iter().copied().filter(|&t| t != tokens.padding ).collect() )
      .collect();
    if stripped.iter().any(|seq: &Vec<usize>| seq.is_empty() ) {
      return Err(VaeError::empty("sequence"))
    }

    let decoder: Vec<Vec<usize>> = stripped.iter()
      .map(|seq| {
        std::iter::once(tokens.start)
          .chain(seq.iter().map(|&t| {
            if input_keep < 1.0 && rng.gen_range(0.0, 1.0) >= input_keep { tokens.dropout } else { t }
          }))
          .collect()
      })
      .collect();
    let target: Vec<Vec<usize>> = stripped.iter()
      .map(|seq| seq.iter().copied().chain(std::iter::once(tokens.end)).collect() )
      .collect();

    Ok(Self {
      encoder: pad_steps(&stripped, tokens.padding),
      decoder: pad_steps(&decoder, tokens.padding),
      target: pad_steps(&target, tokens.padding),
    })
  }

  pub fn batch_size(&self) -> usize {
    self.encoder.first().map_or(0, |step| step.len() )
  }

  /// Number of decoder steps.

  pub fn len(&self) -> usize {
    self.decoder.len()
  }

  pub fn is_empty(&self) -> bool {
    self.decoder.is_empty()
  }
}

/// Right-pad batch-major sequences and transpose them to step-major.

pub fn pad_steps(sequences: &[Vec<usize>], padding: usize) -> Vec<Vec<usize>> {
  let len = sequences.iter().map(|seq| seq.len() ).max().unwrap_or(0);
  (0..len)
    .map(|t| sequences.iter()
      .map(|seq| seq.get(t).copied().unwrap_or(padding) )
      .collect())
    .collect()
}
