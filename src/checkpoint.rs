//! Binary persistence of trained models.
//!
//! A checkpoint holds the hyperparameters of encoder and decoder
//! alongside every named weight, stored as `f64` regardless of
//! the model's inner type.

use std::{ fs, path::Path };

use serde::{ Serialize, Deserialize };
use tracing::info;

use crate::{
  config::VaeParams,
  error::{ Result, VaeError },
  model::TeacherVae,
  ops::*,
  scalar::Real,
  tensor::Tensor,
  variable::layer::Module,
};


#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedTensor {
  pub name: String,
  pub tensor: Tensor<f64>,
}


#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
  pub encoder_params: VaeParams,
  pub decoder_params: VaeParams,
  pub weights: Vec<NamedTensor>,
}

impl Checkpoint {
  pub fn capture<T: Real>(model: &TeacherVae<T>) -> Self {
    let weights = model.named_parameters()
      .into_iter()
      .map(|(name, param)| NamedTensor { name, tensor: param.tensor().cast() })
      .collect();
    Self {
      encoder_params: model.encoder.params().clone(),
      decoder_params: model.decoder.params().clone(),
      weights,
    }
  }

  pub fn to_bytes(&self) -> Result<Vec<u8>> {
    Ok(postcard::to_allocvec(self)?)
  }

  pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
    Ok(postcard::from_bytes(bytes)?)
  }

  pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    fs::write(path, self.to_bytes()?)?;
    info!(path = %path.display(), weights = self.weights.len(), "Saved checkpoint");
    Ok(())
  }

  pub fn load(path: impl AsRef<Path>) -> Result<Self> {
    let path = path.as_ref();
    let checkpoint = Self::from_bytes(&fs::read(path)?)?;
    info!(path = %path.display(), weights = checkpoint.weights.len(), "Loaded checkpoint");
    Ok(checkpoint)
  }

  fn weight(&self, name: &str) -> Option<&Tensor<f64>> {
    self.weights.iter()
      .find(|weight| weight.name == name )
      .map(|weight| &weight.tensor )
  }

  /// Copy stored weights into the parameters of `module`.
  ///
  /// Every parameter must be present with matching dimensions.
  /// Nothing is modified if any of them isn't.

  pub fn restore<T: Real>(&self, module: &impl Module<T>) -> Result<()> {
    let params = module.named_parameters();
    let mut updates = Vec::with_capacity(params.len());
    for (name, param) in &params {
      let stored = self.weight(name)
        .ok_or_else(|| VaeError::MissingWeight { name: name.clone() } )?;
      if stored.shape().dims != param.shape().dims {
        return Err(VaeError::shape_mismatch(name.as_str(), &param.shape().dims, &stored.shape().dims))
      }
      updates.push((param, stored.cast::<T>()));
    }
    for (param, tensor) in updates {
      param.assign(&tensor);
    }
    Ok(())
  }
}
