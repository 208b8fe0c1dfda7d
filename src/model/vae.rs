use std::path::Path;

use rand::Rng;
use tracing::debug;

use crate::{
  checkpoint::Checkpoint,
  config::VaeParams,
  error::{ Result, VaeError },
  generation::{ GeneratedMolecules, GenerationOptions },
  internal::*,
  ops::*,
  scalar::Real,
  tensor::Tensor,
  variable::{ Variable, layer::{ Module, prefixed } },
};

use super::{ StackGruEncoder, StackGruDecoder };


/// Result of a full encode, sample and decode pass.

#[derive(Debug, Clone)]
pub struct VaeOutput<T: Real> {
  pub decoder_loss: Variable<T>,
  pub mu: Variable<T>,
  pub logvar: Variable<T>,
}


/// Variational autoencoder built from a stack-GRU encoder and decoder.
///
/// The decoder is trained with teacher forcing on the target sequence.

#[derive(Debug, Clone)]
pub struct TeacherVae<T: Real> {
  pub encoder: StackGruEncoder<T>,
  pub decoder: StackGruDecoder<T>,
}

impl<T: Real> TeacherVae<T> {
  pub fn new(encoder: StackGruEncoder<T>, decoder: StackGruDecoder<T>) -> Result<Self> {
    if encoder.latent_dim() != decoder.latent_dim() {
      return Err(VaeError::shape_mismatch("latent dim", &[encoder.latent_dim()], &[decoder.latent_dim()]))
    }
    Ok(Self { encoder, decoder })
  }

  pub fn from_params(params: &VaeParams) -> Result<Self> {
    Self::new(StackGruEncoder::new(params)?, StackGruDecoder::new(params)?)
  }

  pub fn latent_dim(&self) -> usize {
    self.encoder.latent_dim()
  }

  pub fn set_training(&mut self, training: bool) {
    self.encoder.rnn.set_training(training);
    self.decoder.rnn.set_training(training);
  }

  pub fn is_training(&self) -> bool {
    self.encoder.rnn.is_training()
  }

  /// Latent mean and log-variance of a step-major `input`.

  pub fn encode(&self, input: &[Vec<usize>]) -> Result<(Variable<T>, Variable<T>)> {
    self.encoder.encode(input)
  }

  /// Sample `z = mu + eps * exp(logvar / 2)` with standard normal `eps`.

  pub fn reparameterize(&self, mu: &Variable<T>, logvar: &Variable<T>) -> Variable<T> {
    let eps = Tensor::randn(&mu.shape().dims);
    self.reparameterize_with(mu, logvar, &eps)
  }

  /// Like [reparameterize](Self::reparameterize), drawing `eps` from `rng`.

  pub fn reparameterize_rng<R: Rng>(&self, mu: &Variable<T>, logvar: &Variable<T>, rng: &mut R) -> Variable<T> {
    let eps = Tensor::randn_with(&mu.shape().dims, rng);
    self.reparameterize_with(mu, logvar, &eps)
  }

  pub fn reparameterize_with(&self, mu: &Variable<T>, logvar: &Variable<T>, eps: &Tensor<T>) -> Variable<T> {
    let std = (logvar * cast::<T>(0.5)).exp();
    eps.tracked() * std + mu
  }

  /// Decoder loss of `target` given latent `z` and decoder `input`.

  pub fn decode(&self, z: &Variable<T>, input: &[Vec<usize>], target: &[Vec<usize>]) -> Result<Variable<T>> {
    self.decoder.train_step(z, input, target)
  }

  pub fn forward(&self, input: &[Vec<usize>], decoder_input: &[Vec<usize>], target: &[Vec<usize>]) -> Result<VaeOutput<T>> {
    let (mu, logvar) = self.encode(input)?;
    let z = self.reparameterize(&mu, &logvar);
    let decoder_loss = self.decode(&z, decoder_input, target)?;
    Ok(VaeOutput { decoder_loss, mu, logvar })
  }

  /// Sample one molecule per row of the `[batch, latent_dim]` latent `z`.

  pub fn generate<R: Rng>(&self, z: &Tensor<T>, options: &GenerationOptions, rng: &mut R) -> Result<GeneratedMolecules> {
    let sequences = self.decoder.generate_from_latent(
      z,
      &options.prime_input,
      options.end_token,
      options.generate_len,
      options.temperature,
      rng,
    )?;
    let molecules = GeneratedMolecules::from_sequences(&sequences, options.end_token);
    debug!(molecules = molecules.len(), "Generated molecules");
    Ok(molecules)
  }

  /// Sample latents from the prior and decode them.

  pub fn sample<R: Rng>(&self, count: usize, options: &GenerationOptions, rng: &mut R) -> Result<GeneratedMolecules> {
    let z = Tensor::randn_with(&[count, self.latent_dim()], rng);
    self.generate(&z, options, rng)
  }

  pub fn save_model(&self, path: impl AsRef<Path>) -> Result<()> {
    Checkpoint::capture(self).save(path)
  }

  /// Overwrite all weights with those stored at `path`.

  pub fn load_model(&self, path: impl AsRef<Path>) -> Result<()> {
    Checkpoint::load(path)?.restore(self)
  }

  pub fn from_checkpoint(path: impl AsRef<Path>) -> Result<Self> {
    let checkpoint = Checkpoint::load(path)?;
    let model = Self::new(
      StackGruEncoder::new(&checkpoint.encoder_params)?,
      StackGruDecoder::new(&checkpoint.decoder_params)?,
    )?;
    checkpoint.restore(&model)?;
    Ok(model)
  }
}

impl<T: Real> Module<T> for TeacherVae<T> {
  fn named_parameters(&self) -> Vec<(String, Variable<T>)> {
    [prefixed("encoder", &self.encoder), prefixed("decoder", &self.decoder)].concat()
  }
}


#[cfg(test)]
mod tests {
  use super::*;
  use rand::{ SeedableRng, rngs::StdRng };
  use crate::optimize::{ Optimizer, Adam };

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
  fn latent_dims_must_agree() {
    let encoder = StackGruEncoder::<f64>::new(&params()).unwrap();
    let decoder = StackGruDecoder::<f64>::new(&VaeParams { latent_dim: 5, ..params() }).unwrap();
    assert!(matches!(TeacherVae::new(encoder, decoder), Err(VaeError::ShapeMismatch { .. })));
  }

  #[test]
  fn reparameterize() {
    let model = TeacherVae::<f64>::from_params(&params()).unwrap();
    let mu = Tensor::vec(&[1.0, -1.0]).trained();
    let logvar = Tensor::vec(&[0.0, 2.0f64.ln() * 2.0]).trained();
    let z = model.reparameterize_with(&mu, &logvar, &Tensor::vec(&[0.5, 1.0]));
    assert!((z.raw()[0] - 1.5).abs() < 1e-12);
    assert!((z.raw()[1] - 1.0).abs() < 1e-12);
    let z = model.reparameterize(&mu, &logvar);
    assert_eq!(z.shape().dims, vec![2]);
  }

  #[test]
  fn forward() {
    let model = TeacherVae::<f64>::from_params(&params()).unwrap();
    let output = model.forward(
      &[vec![4, 5], vec![5, 0]],
      &[vec![2, 2], vec![4, 5], vec![5, 1]],
      &[vec![4, 5], vec![5, 3], vec![3, 0]],
    ).unwrap();
    assert_eq!(output.mu.shape().dims, vec![2, 3]);
    assert_eq!(output.logvar.shape().dims, vec![2, 3]);
    assert!(output.decoder_loss.item() > 0.0);
    assert!(!output.decoder_loss.parameters().is_empty());
  }

  #[test]
  fn training_reduces_loss() {
    let model = TeacherVae::<f64>::from_params(&params()).unwrap();
    let input = [vec![4], vec![5], vec![4]];
    let decoder_input = [vec![2], vec![4], vec![5], vec![4]];
    let target = [vec![4], vec![5], vec![4], vec![3]];
    let mut optimizer = Optimizer::new(0.01, Adam::default());
    let parameters = model.parameters();
    let eps = Tensor::zeros(&[1, 3]);
    let loss_of = |model: &TeacherVae<f64>| {
      let (mu, logvar) = model.encode(&input).unwrap();
      let z = model.reparameterize_with(&mu, &logvar, &eps);
      model.decode(&z, &decoder_input, &target).unwrap()
    };
    let first = loss_of(&model).item();
    for _ in 0..50 {
      let loss = loss_of(&model);
      optimizer.minimize(&loss, &parameters);
    }
    assert!(loss_of(&model).item() < first);
  }

  #[test]
  fn generate_strips_special_tokens() {
    let model = TeacherVae::<f64>::from_params(&params()).unwrap();
    {
      let mut bias = model.decoder.rnn.output.bias.raw_mut();
      bias[3] = 50.0;
    }
    let mut rng = StdRng::seed_from_u64(5);
    let options = GenerationOptions { generate_len: 10, ..GenerationOptions::from_params(&params()) };
    let molecules = model.generate(&Tensor::randn(&[1, 3]), &options, &mut rng).unwrap();
    assert_eq!(molecules.molecules, vec![Vec::<usize>::new()]);
    assert_eq!(molecules.summary().rows[0].smiles, "");

    let molecules = model.sample(4, &options, &mut rng).unwrap();
    assert_eq!(molecules.len(), 4);
    assert!(molecules.iter().all(|m| !m.contains(&3) && !m.contains(&2) ));
  }

  #[test]
  fn seeded_sampling_is_reproducible() {
    let mut model = TeacherVae::<f64>::from_params(&params()).unwrap();
    model.set_training(false);
    let options = GenerationOptions { generate_len: 8, ..GenerationOptions::from_params(&params()) };
    let a = model.sample(4, &options, &mut StdRng::seed_from_u64(9)).unwrap();
    let b = model.sample(4, &options, &mut StdRng::seed_from_u64(9)).unwrap();
    assert_eq!(a, b);

    let mu = Tensor::zeros(&[2, 3]).tracked();
    let logvar = Tensor::zeros(&[2, 3]).tracked();
    let x = model.reparameterize_rng(&mu, &logvar, &mut StdRng::seed_from_u64(3));
    let y = model.reparameterize_rng(&mu, &logvar, &mut StdRng::seed_from_u64(3));
    assert_eq!(x.tensor(), y.tensor());
  }

  #[test]
  fn training_mode() {
    let mut model = TeacherVae::<f32>::from_params(&params()).unwrap();
    assert!(model.is_training());
    model.set_training(false);
    assert!(!model.is_training());
    assert!(!model.decoder.rnn.is_training());
  }
}
