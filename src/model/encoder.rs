use crate::{
  config::VaeParams,
  error::{ Result, VaeError },
  scalar::Real,
  stack_rnn::StackGru,
  variable::{ Variable, layer::{ Module, Linear, prefixed } },
};


/// Reads a step-major token sequence into the parameters
/// of a diagonal Gaussian over the latent space.

#[derive(Debug, Clone)]
pub struct StackGruEncoder<T: Real> {
  pub rnn: StackGru<T>,
  pub hidden_to_mu: Linear<T>,
  pub hidden_to_logvar: Linear<T>,
  params: VaeParams,
}

impl<T: Real> StackGruEncoder<T> {
  pub fn new(params: &VaeParams) -> Result<Self> {
    let rnn = StackGru::new(params)?;
    Ok(Self {
      hidden_to_mu: Linear::new(rnn.hidden_size(), params.latent_dim),
      hidden_to_logvar: Linear::new(rnn.hidden_size(), params.latent_dim),
      rnn,
      params: params.clone(),
    })
  }

  pub fn params(&self) -> &VaeParams {
    &self.params
  }

  pub fn latent_dim(&self) -> usize {
    self.hidden_to_mu.outputs()
  }

  /// Run over all `input` steps from a blank state, returning
  /// `(mu, logvar)`, each `[batch, latent_dim]`.

  pub fn encode(&self, input: &[Vec<usize>]) -> Result<(Variable<T>, Variable<T>)> {
    let batch = input.first().map_or(0, |step| step.len() );
    if batch == 0 { return Err(VaeError::empty("encoder input")) }
    let mut hidden = self.rnn.init_hidden(batch);
    let mut stack = self.rnn.init_stack(batch);
    for tokens in input {
      let (_, h, s) = self.rnn.step(tokens, &hidden, &stack)?;
      hidden = h;
      stack = s;
    }
    let top = hidden.top();
    Ok((self.hidden_to_mu.forward(top), self.hidden_to_logvar.forward(top)))
  }
}

impl<T: Real> Module<T> for StackGruEncoder<T> {
  fn named_parameters(&self) -> Vec<(String, Variable<T>)> {
    [
      prefixed("rnn", &self.rnn),
      prefixed("hidden_to_mu", &self.hidden_to_mu),
      prefixed("hidden_to_logvar", &self.hidden_to_logvar),
    ].concat()
  }
}


#[cfg(test)]
mod tests {
  use super::*;
  use crate::ops::BaseOps;

  fn params() -> VaeParams {
    VaeParams {
      embedding_size: 4,
      rnn_cell_size: 8,
      latent_dim: 3,
      stack_width: 2,
      stack_depth: 4,
      ..VaeParams::new(6)
    }
  }

  #[test]
  fn encode_shapes() {
    let encoder = StackGruEncoder::<f64>::new(&params()).unwrap();
    let (mu, logvar) = encoder.encode(&[vec![4, 5], vec![5, 4], vec![3, 0]]).unwrap();
    assert_eq!(mu.shape().dims, vec![2, 3]);
    assert_eq!(logvar.shape().dims, vec![2, 3]);
    assert!(!mu.parameters().is_empty());
  }

  #[test]
  fn empty_input() {
    let encoder = StackGruEncoder::<f64>::new(&params()).unwrap();
    assert!(matches!(encoder.encode(&[]), Err(VaeError::EmptyInput { .. })));
    assert!(matches!(encoder.encode(&[vec![]]), Err(VaeError::EmptyInput { .. })));
  }

  #[test]
  fn ragged_steps() {
    let encoder = StackGruEncoder::<f64>::new(&params()).unwrap();
    assert!(encoder.encode(&[vec![4, 5], vec![5]]).is_err());
  }

  #[test]
  fn parameter_names() {
    let encoder = StackGruEncoder::<f32>::new(&params()).unwrap();
    let names: Vec<_> = encoder.named_parameters().into_iter().map(|(name, _)| name ).collect();
    assert_eq!(names[0], "rnn.embedding.weight");
    assert!(names.contains(&"hidden_to_logvar.bias".to_string()));
  }
}
