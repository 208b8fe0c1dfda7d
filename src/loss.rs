use crate::{
  internal::*,
  ops::*,
  scalar::Real,
  variable::Variable,
};


/// KL divergence between `N(mu, exp(logvar))` and the
/// standard normal, averaged over all elements.

pub fn kl_divergence<T: Real>(mu: &Variable<T>, logvar: &Variable<T>) -> Variable<T> {
  (logvar + T::one() - mu.sqr() - logvar.exp()).mean(0) * -cast::<T>(0.5)
}

/// Logistic annealing weight of the KL term at training `step`.

pub fn kl_weight(step: usize, growth: f64) -> f64 {
  1.0 - 1.0 / (1.0 + (growth * step as f64).exp())
}


/// Combined training objective.

#[derive(Debug, Clone)]
pub struct VaeLoss<T: Real> {
  pub total: Variable<T>,
  pub kl_divergence: Variable<T>,
}

pub fn vae_loss<T: Real>(decoder_loss: &Variable<T>, mu: &Variable<T>, logvar: &Variable<T>, weight: T) -> VaeLoss<T> {
  let kl_divergence = kl_divergence(mu, logvar);
  let total = &kl_divergence * weight + decoder_loss;
  VaeLoss { total, kl_divergence }
}


#[cfg(test)]
mod tests {
  use super::*;
  use crate::Tensor;

  #[test]
  fn kl_of_standard_normal_is_zero() {
    let mu = Tensor::zeros(&[2,3]).tracked();
    let logvar = Tensor::zeros(&[2,3]).tracked();
    assert_eq!(kl_divergence::<f64>(&mu, &logvar).item(), 0.0);
  }

  #[test]
  fn kl_of_shifted_mean() {
    let mu = Tensor::fill(&[1,2], 2.0).tracked();
    let logvar = Tensor::zeros(&[1,2]).tracked();
    // -0.5 * (1 + 0 - 4 - 1)
    assert_eq!(kl_divergence::<f64>(&mu, &logvar).item(), 2.0);
  }

  #[test]
  fn kl_gradients() {
    let logvar = Tensor::<f64>::randn(&[2,2]).tracked();
    assert!(Variable::<f64>::check_gradients(&[2,2], |mu| kl_divergence(mu, &logvar) ) < 1e-3);
  }

  #[test]
  fn annealing() {
    assert_eq!(kl_weight(0, 0.0015), 0.5);
    assert!(kl_weight(1000, 0.0015) > 0.8);
    assert!(kl_weight(100_000, 0.0015) > 0.999);
  }

  #[test]
  fn weighted_total() {
    let mu = Tensor::fill(&[1,2], 2.0).trained();
    let logvar = Tensor::zeros(&[1,2]).trained();
    let decoder_loss = Tensor::scalar(1.5).tracked();
    let loss = vae_loss(&decoder_loss, &mu, &logvar, 0.5);
    assert_eq!(loss.kl_divergence.item(), 2.0);
    assert_eq!(loss.total.item(), 2.5);
    loss.total.backward();
    // d/dmu of 0.5 * mean(mu^2) / 2
    assert_eq!(mu.grad(), Some(&Tensor::fill(&[1,2], 0.5)));
  }
}
