use tracing::{ debug, info };

use crate::{
  batch::SequenceBatch,
  config::VaeParams,
  error::{ Result, VaeError },
  internal::*,
  loss::{ vae_loss, kl_weight },
  model::TeacherVae,
  optimize::{ Optimizer, Strategy },
  scalar::Real,
  variable::layer::Module,
};


/// Loss values of a single batch, or averages over several.

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StepStats {
  pub loss: f64,
  pub kl_divergence: f64,
  pub decoder_loss: f64,
}

impl StepStats {
  fn mean(stats: &[Self]) -> Self {
    let n = stats.len().max(1) as f64;
    stats.iter().fold(Self::default(), |acc, s| Self {
      loss: acc.loss + s.loss / n,
      kl_divergence: acc.kl_divergence + s.kl_divergence / n,
      decoder_loss: acc.decoder_loss + s.decoder_loss / n,
    })
  }
}


/// Fits a [TeacherVae] with KL annealing.

pub struct Trainer<T: Real> {
  model: TeacherVae<T>,
  optimizer: Optimizer<T, Box<dyn Strategy<T>>>,
  kl_growth: f64,
}

impl<T: Real> Trainer<T> {
  pub fn new(model: TeacherVae<T>, params: &VaeParams) -> Result<Self> {
    params.validate()?;
    let mut optimizer = Optimizer::new(cast(params.learning_rate), params.optimizer.strategy());
    if let Some(max_norm) = params.clip_grad {
      optimizer = optimizer.with_clip_norm(cast(max_norm));
    }
    Ok(Self { model, optimizer, kl_growth: params.kl_growth })
  }

  pub fn model(&self) -> &TeacherVae<T> {
    &self.model
  }

  pub fn model_mut(&mut self) -> &mut TeacherVae<T> {
    &mut self.model
  }

  pub fn into_model(self) -> TeacherVae<T> {
    self.model
  }

  /// Number of optimizer updates performed so far.

  pub fn step(&self) -> usize {
    self.optimizer.step() - 1
  }

  pub fn train_step(&mut self, batch: &SequenceBatch) -> Result<StepStats> {
    if batch.is_empty() { return Err(VaeError::empty("batch")) }
    let output = self.model.forward(&batch.encoder, &batch.decoder, &batch.target)?;
    let weight = kl_weight(self.step(), self.kl_growth);
    let loss = vae_loss(&output.decoder_loss, &output.mu, &output.logvar, cast(weight));
    let stats = StepStats {
      loss: to_f64(loss.total.item()),
      kl_divergence: to_f64(loss.kl_divergence.item()),
      decoder_loss: to_f64(output.decoder_loss.item()),
    };
    self.optimizer.minimize(&loss.total, &self.model.parameters());
    debug!(step = self.step(), kl_weight = weight, loss = stats.loss, kl = stats.kl_divergence, "Trained batch");
    Ok(stats)
  }

  /// Mean statistics over one pass through `batches`.

  pub fn train_epoch(&mut self, batches: &[SequenceBatch]) -> Result<StepStats> {
    if batches.is_empty() { return Err(VaeError::empty("epoch")) }
    let stats = batches.iter()
      .map(|batch| self.train_step(batch) )
      .collect::<Result<Vec<_>>>()?;
    let mean = StepStats::mean(&stats);
    info!(step = self.step(), batches = batches.len(), loss = mean.loss, kl = mean.kl_divergence, "Finished epoch");
    Ok(mean)
  }

  /// Mean eval-mode statistics with full KL weight, without updating.

  pub fn evaluate(&mut self, batches: &[SequenceBatch]) -> Result<StepStats> {
    if batches.is_empty() { return Err(VaeError::empty("evaluation set")) }
    let training = self.model.is_training();
    self.model.set_training(false);
    let stats = batches.iter()
      .map(|batch| self.evaluate_batch(batch) )
      .collect::<Result<Vec<_>>>();
    self.model.set_training(training);
    let mean = StepStats::mean(&stats?);
    info!(batches = batches.len(), loss = mean.loss, kl = mean.kl_divergence, "Evaluated");
    Ok(mean)
  }

  fn evaluate_batch(&self, batch: &SequenceBatch) -> Result<StepStats> {
    let output = self.model.forward(&batch.encoder, &batch.decoder, &batch.target)?;
    let loss = vae_loss(&output.decoder_loss, &output.mu, &output.logvar, T::one());
    Ok(StepStats {
      loss: to_f64(loss.total.item()),
      kl_divergence: to_f64(loss.kl_divergence.item()),
      decoder_loss: to_f64(output.decoder_loss.item()),
    })
  }
}
