use itertools::Itertools;
use serde::{ Serialize, Deserialize };

use crate::{
  config::VaeParams,
  error::Result,
};


/// Settings for sampling new sequences from the decoder.

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationOptions {
  /// Tokens that start every generated sequence.
  pub prime_input: Vec<usize>,
  pub end_token: usize,
  pub generate_len: usize,
  /// Softmax temperature. Lower values sample more greedily.
  pub temperature: f64,
}

impl GenerationOptions {
  pub fn new(prime_input: Vec<usize>, end_token: usize) -> Self {
    Self { prime_input, end_token, generate_len: 100, temperature: 0.8 }
  }

  /// Prime with the start token and stop at the end token.

  pub fn from_params(params: &VaeParams) -> Self {
    Self {
      prime_input: vec![params.start_index],
      end_token: params.end_index,
      generate_len: params.generate_len,
      temperature: params.temperature,
    }
  }
}


/// Drop the leading start token and everything from the first `end` on.

pub fn strip_special_tokens(sequence: &[usize], end: usize) -> Vec<usize> {
  sequence.iter()
    .skip(1)
    .take_while(|&&token| token != end )
    .copied()
    .collect()
}


/// Renders token indices as text.

pub trait TokenDecoder {
  fn decode(&self, tokens: &[usize]) -> String;
}

impl<F: Fn(&[usize]) -> String> TokenDecoder for F {
  fn decode(&self, tokens: &[usize]) -> String {
    self(tokens)
  }
}

/// Space separated token indices.

#[derive(Debug, Clone, Copy, Default)]
pub struct IndexDecoder;

impl TokenDecoder for IndexDecoder {
  fn decode(&self, tokens: &[usize]) -> String {
    tokens.iter().join(" ")
  }
}


#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoleculeRow {
  pub molecule_number: usize,
  pub smiles: String,
}


/// Tabular summary of generated molecules.

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MoleculeTable {
  pub rows: Vec<MoleculeRow>,
}

impl MoleculeTable {
  pub fn len(&self) -> usize {
    self.rows.len()
  }

  pub fn is_empty(&self) -> bool {
    self.rows.is_empty()
  }

  pub fn to_json(&self) -> Result<String> {
    Ok(serde_json::to_string(&self.rows)?)
  }
}

impl std::fmt::Display for MoleculeTable {
  fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
    let width = self.rows.iter()
      .map(|row| row.molecule_number.to_string().len() )
      .max()
      .unwrap_or(0)
      .max("molecule_number".len());
    writeln!(f, "{:>width$}  smiles", "molecule_number")?;
    for row in &self.rows {
      writeln!(f, "{:>width$}  {}", row.molecule_number, row.smiles)?;
    }
    Ok(())
  }
}


/// Token sequences sampled by the decoder, with special tokens stripped.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedMolecules {
  pub molecules: Vec<Vec<usize>>,
}

impl GeneratedMolecules {
  pub fn from_sequences(sequences: &[Vec<usize>], end: usize) -> Self {
    let molecules = sequences.iter()
      .map(|seq| strip_special_tokens(seq, end) )
      .collect();
    Self { molecules }
  }

  pub fn len(&self) -> usize {
    self.molecules.len()
  }

  pub fn is_empty(&self) -> bool {
    self.molecules.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item=&Vec<usize>> {
    self.molecules.iter()
  }

  pub fn summary(&self) -> MoleculeTable {
    self.summary_with(&IndexDecoder)
  }

  pub fn summary_with(&self, decoder: &impl TokenDecoder) -> MoleculeTable {
    let rows = self.molecules.iter()
      .enumerate()
      .map(|(molecule_number, tokens)| MoleculeRow {
        molecule_number,
        smiles: decoder.decode(tokens),
      })
      .collect();
    MoleculeTable { rows }
  }
}


#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn strip() {
    assert_eq!(strip_special_tokens(&[2, 5, 6, 3, 7, 3], 3), vec![5, 6]);
    assert_eq!(strip_special_tokens(&[2, 5, 6], 3), vec![5, 6]);
    assert_eq!(strip_special_tokens(&[2, 3], 3), Vec::<usize>::new());
    assert_eq!(strip_special_tokens(&[], 3), Vec::<usize>::new());
  }

  #[test]
  fn summary() {
    let generated = GeneratedMolecules::from_sequences(&[vec![2, 5, 6, 3], vec![2, 7, 3, 3]], 3);
    assert_eq!(generated.molecules, vec![vec![5, 6], vec![7]]);

    let table = generated.summary();
    assert_eq!(table.rows[0], MoleculeRow { molecule_number: 0, smiles: "5 6".to_string() });

    let vocab = ["<pad>", "<unk>", "<start>", "<end>", "", "C", "O", "N"];
    let table = generated.summary_with(&|tokens: &[usize]| {
      tokens.iter().map(|&t| vocab[t] ).collect::<String>()
    });
    assert_eq!(table.rows[0].smiles, "CO");
    assert_eq!(table.rows[1].smiles, "N");
    assert_eq!(table.to_json().unwrap(),
      r#"[{"molecule_number":0,"smiles":"CO"},{"molecule_number":1,"smiles":"N"}]"#);
    assert!(table.to_string().contains("molecule_number  smiles"));
  }

  #[test]
  fn options_from_params() {
    let options = GenerationOptions::from_params(&VaeParams::new(10));
    assert_eq!(options.prime_input, vec![2]);
    assert_eq!(options.end_token, 3);
    assert_eq!(options.generate_len, 100);
  }
}
