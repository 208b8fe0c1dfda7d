use rand::{ Rng, distributions::{ Distribution, WeightedIndex } };
use tracing::debug;

use crate::{
  config::VaeParams,
  error::{ Result, VaeError },
  internal::*,
  ops::*,
  scalar::Real,
  stack_rnn::{ StackGru, Hidden, Stack },
  tensor::Tensor,
  variable::{ Variable, layer::{ Module, Linear, prefixed } },
};


/// Unrolls a [StackGru] from a latent vector, either scoring
/// a target sequence or sampling a new one.

#[derive(Debug, Clone)]
pub struct StackGruDecoder<T: Real> {
  pub rnn: StackGru<T>,
  pub latent_to_hidden: Linear<T>,
  params: VaeParams,
}

impl<T: Real> StackGruDecoder<T> {
  pub fn new(params: &VaeParams) -> Result<Self> {
    let rnn = StackGru::new(params)?;
    Ok(Self {
      latent_to_hidden: Linear::new(params.latent_dim, rnn.hidden_size()),
      rnn,
      params: params.clone(),
    })
  }

  pub fn params(&self) -> &VaeParams {
    &self.params
  }

  pub fn latent_dim(&self) -> usize {
    self.latent_to_hidden.inputs()
  }

  fn check_latent(&self, latent: &Tensor<T>) -> Result<usize> {
    let dims = &latent.shape().dims;
    if dims.len() != 2 || dims[1] != self.latent_dim() || dims[0] == 0 {
      return Err(VaeError::shape_mismatch("latent", &[dims.first().copied().unwrap_or(0), self.latent_dim()], dims))
    }
    Ok(dims[0])
  }

  /// Every GRU layer starts from the projected latent.

  fn initial_hidden(&self, latent: &Variable<T>) -> Hidden<T> {
    Hidden::repeated(&self.latent_to_hidden.forward(latent), self.rnn.num_layers())
  }

  /// One generation step, cut off from the graph.

  fn advance(&self, tokens: &[usize], hidden: &Hidden<T>, stack: &Stack<T>) -> Result<(Variable<T>, Hidden<T>, Stack<T>)> {
    let (output, hidden, stack) = self.rnn.step(tokens, hidden, stack)?;
    Ok((output.detached(), hidden.detached(), stack.detached()))
  }

  /// Sum of the per step cross-entropy between predicted
  /// logits and `target`, each step averaged over the batch.

  pub fn train_step(&self, latent: &Variable<T>, input: &[Vec<usize>], target: &[Vec<usize>]) -> Result<Variable<T>> {
    let batch = self.check_latent(latent)?;
    if input.is_empty() { return Err(VaeError::empty("decoder input")) }
    if input.len() != target.len() {
      return Err(VaeError::shape_mismatch("decoder target", &[input.len()], &[target.len()]))
    }
    let mut hidden = self.initial_hidden(latent);
    let mut stack = self.rnn.init_stack(batch);
    let mut loss: Option<Variable<T>> = None;
    for (tokens, targets) in input.iter().zip(target) {
      if targets.len() != batch {
        return Err(VaeError::shape_mismatch("target step", &[batch], &[targets.len()]))
      }
      if let Some(&token) = targets.iter().find(|&&t| t >= self.rnn.output_size() ) {
        return Err(VaeError::token_out_of_range(token, self.rnn.output_size()))
      }
      let (output, h, s) = self.rnn.step(tokens, &hidden, &stack)?;
      let step_loss = output.cross_entropy(targets);
      loss = Some(match loss {
        Some(loss) => loss + step_loss,
        None => step_loss,
      });
      hidden = h;
      stack = s;
    }
    loss.ok_or(VaeError::empty("decoder input"))
  }

  /// Sample sequences for every row of the `[batch, latent_dim]` latent.
  ///
  /// All tokens of `prime` but the last build up the state, the last one is
  /// the first input. Returned sequences start with the priming tokens.
  /// With a batch of one, generation stops after sampling `end`.

  pub fn generate_from_latent<R: Rng>(
    &self,
    latent: &Tensor<T>,
    prime: &[usize],
    end: usize,
    generate_len: usize,
    temperature: f64,
    rng: &mut R,
  ) -> Result<Vec<Vec<usize>>> {
    let batch = self.check_latent(latent)?;
    let Some((&last, priming)) = prime.split_last() else {
      return Err(VaeError::empty("priming sequence"))
    };
    if temperature <= 0.0 || !temperature.is_finite() {
      return Err(VaeError::invalid_parameter(format!("temperature must be positive, got {temperature}")))
    }

    let mut hidden = self.initial_hidden(&latent.tracked()).detached();
    let mut stack = self.rnn.init_stack(batch);
    for &token in priming {
      let (_, h, s) = self.advance(&vec![token; batch], &hidden, &stack)?;
      hidden = h;
      stack = s;
    }

    let mut sequences = vec![prime.to_vec(); batch];
    let mut input = vec![last; batch];
    let temperature: T = cast(temperature);
    for _ in 0..generate_len {
      let (output, h, s) = self.advance(&input, &hidden, &stack)?;
      hidden = h;
      stack = s;

      let logits = output.tensor();
      for (b, row) in logits.iter().enumerate() {
        let max = row.max(0).item();
        let weights: Vec<f64> = row.raw().iter()
          .map(|&l| to_f64(((l - max) / temperature).exp()) )
          .collect();
        let token = WeightedIndex::new(&weights)?.sample(rng);
        sequences[b].push(token);
        input[b] = token;
      }
      if batch == 1 && input[0] == end { break }
    }
    debug!(batch, steps = sequences[0].len() - prime.len(), "Generated sequences");
    Ok(sequences)
  }
}

impl<T: Real> Module<T> for StackGruDecoder<T> {
  fn named_parameters(&self) -> Vec<(String, Variable<T>)> {
    [
      prefixed("rnn", &self.rnn),
      prefixed("latent_to_hidden", &self.latent_to_hidden),
    ].concat()
  }
}
