use std::collections::HashMap;

use tracing::trace;

use crate::{
  internal::*,
  scalar::Real,
  tensor::Tensor,
  variable::Variable,
  ops::{ BaseOps, Hops },
};


/// An optimization strategy to be used with [Optimizer].
///
/// Strategies receive the gradient of a single parameter,
/// identified by `id`, and return the change to apply to it.

pub trait Strategy<R: Real> {
  fn update(&mut self, id: usize, grad: &Tensor<R>, rate: R, step: usize) -> Tensor<R>;
}

impl<R: Real> Strategy<R> for Box<dyn Strategy<R>> {
  fn update(&mut self, id: usize, grad: &Tensor<R>, rate: R, step: usize) -> Tensor<R> {
    (**self).update(id, grad, rate, step)
  }
}


/// Generic optimizer that allows for several optimization [strategies](Strategy) to be used.

#[derive(Debug)]
pub struct Optimizer<R: Real, S: Strategy<R>> {
  strategy: S,
  pub learning_rate: R,
  pub clip_norm: Option<R>,
  step: usize,
}

impl<R: Real, S: Strategy<R>> Optimizer<R, S> {
  pub fn new(learning_rate: R, strategy: S) -> Self {
    Self { strategy, learning_rate, clip_norm: None, step: 1 }
  }

  /// Rescale gradients whenever their global L2 norm exceeds `max_norm`.

  pub fn with_clip_norm(mut self, max_norm: R) -> Self {
    self.clip_norm = Some(max_norm);
    self
  }

  pub fn step(&self) -> usize {
    self.step
  }

  /// Backpropagate `loss` and update all `params`.
  ///
  /// Gradients in the loss' graph get reset afterwards.

  pub fn minimize(&mut self, loss: &Variable<R>, params: &[Variable<R>]) {
    loss.backward();

    let scale = self.clip_norm.and_then(|max_norm| {
      let norm = global_norm(params);
      (norm > max_norm).then(|| max_norm / (norm + cast(1e-6)) )
    });

    for param in params {
      let Some(grad) = param.grad() else { continue };
      let grad = match scale {
        Some(scale) => grad * scale,
        None => grad.clone(),
      };
      let change = self.strategy.update(param.id(), &grad, self.learning_rate, self.step);
      let weights = param.tensor();
      weights.assign(&(weights + change));
    }
    trace!(step = self.step, params = params.len(), clipped = scale.is_some(), "Updated parameters");

    loss.reset();
    self.step += 1;
  }
}

fn global_norm<R: Real>(params: &[Variable<R>]) -> R {
  params.iter()
    .filter_map(|param| param.grad() )
    .map(|grad| grad.raw().iter().fold(R::zero(), |acc, &g| acc + g * g ) )
    .fold(R::zero(), |acc, sq| acc + sq )
    .sqrt()
}


/// Stochastic Gradient Descent strategy

#[derive(Debug, Clone, Default)]
pub struct Sgd;

impl<R: Real> Strategy<R> for Sgd {
  fn update(&mut self, _id: usize, grad: &Tensor<R>, rate: R, _step: usize) -> Tensor<R> {
    grad * -rate
  }
}


/// Stochastic Gradient Descent with momentum

#[derive(Debug, Clone)]
pub struct Momentum<R: Real> {
  pub momentum: R,
  v: HashMap<usize, Tensor<R>>,
}

impl<R: Real> Momentum<R> {
  pub fn new(momentum: R) -> Self {
    Self { momentum, v: HashMap::new() }
  }
}

impl<R: Real> Default for Momentum<R> {
  fn default() -> Self {
    Self::new(cast(0.9))
  }
}

impl<R: Real> Strategy<R> for Momentum<R> {
  fn update(&mut self, id: usize, grad: &Tensor<R>, rate: R, _step: usize) -> Tensor<R> {
    let v = self.v.entry(id)
      .or_insert_with(|| Tensor::zeros(&grad.shape().dims) );
    v.assign(&(&*v * self.momentum - grad * rate));
    v.clone()
  }
}


/// Stochastic Gradient Descent with Nesterov momentum

#[derive(Debug, Clone)]
pub struct Nesterov<R: Real> {
  pub momentum: R,
  v: HashMap<usize, Tensor<R>>,
}

impl<R: Real> Nesterov<R> {
  pub fn new(momentum: R) -> Self {
    Self { momentum, v: HashMap::new() }
  }
}

impl<R: Real> Default for Nesterov<R> {
  fn default() -> Self {
    Self::new(cast(0.9))
  }
}

impl<R: Real> Strategy<R> for Nesterov<R> {
  fn update(&mut self, id: usize, grad: &Tensor<R>, rate: R, _step: usize) -> Tensor<R> {
    let v = self.v.entry(id)
      .or_insert_with(|| Tensor::zeros(&grad.shape().dims) );
    let v_prev = v.detach();
    v.assign(&(&*v * self.momentum - grad * rate));
    v_prev * -self.momentum + &*v * (R::one() + self.momentum)
  }
}


/// Adaptive Movement Estimation strategy (ADAM)

#[derive(Debug, Clone)]
pub struct Adam<R: Real> {
  pub beta1: R,
  pub beta2: R,
  m: HashMap<usize, Tensor<R>>,
  v: HashMap<usize, Tensor<R>>,
}

impl<R: Real> Adam<R> {
  pub fn new(beta1: R, beta2: R) -> Self {
    Self { beta1, beta2, m: HashMap::new(), v: HashMap::new() }
  }
}

impl<R: Real> Default for Adam<R> {
  fn default() -> Self {
    Self::new(cast(0.9), cast(0.999))
  }
}

impl<R: Real> Strategy<R> for Adam<R> {
  fn update(&mut self, id: usize, grad: &Tensor<R>, rate: R, step: usize) -> Tensor<R> {
    let dims = &grad.shape().dims;
    let m = self.m.entry(id).or_insert_with(|| Tensor::zeros(dims) );
    m.assign(&(&*m * self.beta1 + grad * (R::one() - self.beta1)));
    let v = self.v.entry(id).or_insert_with(|| Tensor::zeros(dims) );
    v.assign(&(&*v * self.beta2 + grad.sqr() * (R::one() - self.beta2)));
    let step: R = cast(step as f64);
    let mt = &self.m[&id] / (R::one() - self.beta1.powf(step));
    let vt = &self.v[&id] / (R::one() - self.beta2.powf(step));
    mt * -rate / (vt.sqrt() + cast::<R>(1e-8))
  }
}


/// Adaptive learning rate strategy (Adadelta)

#[derive(Debug, Clone)]
pub struct Adadelta<R: Real> {
  pub rho: R,
  pub eps: R,
  square_avg: HashMap<usize, Tensor<R>>,
  delta_avg: HashMap<usize, Tensor<R>>,
}

impl<R: Real> Adadelta<R> {
  pub fn new(rho: R, eps: R) -> Self {
    Self { rho, eps, square_avg: HashMap::new(), delta_avg: HashMap::new() }
  }
}

impl<R: Real> Default for Adadelta<R> {
  fn default() -> Self {
    Self::new(cast(0.9), cast(1e-6))
  }
}

impl<R: Real> Strategy<R> for Adadelta<R> {
  fn update(&mut self, id: usize, grad: &Tensor<R>, rate: R, _step: usize) -> Tensor<R> {
    let dims = &grad.shape().dims;
    let rho = self.rho;
    let eps = self.eps;
    let square_avg = self.square_avg.entry(id).or_insert_with(|| Tensor::zeros(dims) );
    square_avg.assign(&(&*square_avg * rho + grad.sqr() * (R::one() - rho)));
    let delta_avg = self.delta_avg.entry(id).or_insert_with(|| Tensor::zeros(dims) );
    let delta = (&*delta_avg + eps).sqrt() / (&self.square_avg[&id] + eps).sqrt() * grad;
    delta_avg.assign(&(&*delta_avg * rho + delta.sqr() * (R::one() - rho)));
    delta * -rate
  }
}


#[cfg(test)]
mod tests {
  use super::*;
  use crate::ops::NumericOps;

  fn quadratic_loss(x: &Variable<f64>) -> Variable<f64> {
    (x - 3.0).sqr().sum(0)
  }

  fn descend(strategy: impl Strategy<f64>, rate: f64, steps: usize) -> (f64, f64) {
    let x = Tensor::vec(&[0.0, 1.0, -2.0]).trained();
    let mut optimizer = Optimizer::new(rate, strategy);
    let first = quadratic_loss(&x).item();
    for _ in 0..steps {
      let loss = quadratic_loss(&x);
      optimizer.minimize(&loss, &[x.clone()]);
    }
    (first, quadratic_loss(&x).item())
  }

  #[test]
  fn sgd() {
    let (first, last) = descend(Sgd, 0.1, 50);
    assert!(last < first * 1e-3);
  }

  #[test]
  fn momentum() {
    let (first, last) = descend(Momentum::default(), 0.05, 100);
    assert!(last < first * 1e-2);
  }

  #[test]
  fn nesterov() {
    let (first, last) = descend(Nesterov::default(), 0.05, 100);
    assert!(last < first * 1e-2);
  }

  #[test]
  fn adam() {
    let (first, last) = descend(Adam::default(), 0.1, 200);
    assert!(last < first * 1e-2);
  }

  #[test]
  fn adadelta() {
    let (first, last) = descend(Adadelta::default(), 1.0, 200);
    assert!(last < first);
  }

  #[test]
  fn boxed_strategy() {
    let strategy: Box<dyn Strategy<f64>> = Box::new(Sgd);
    let (first, last) = descend(strategy, 0.1, 20);
    assert!(last < first);
  }

  #[test]
  fn clip_norm() {
    let x = Tensor::vec(&[0.0]).trained();
    let mut optimizer = Optimizer::new(1.0, Sgd).with_clip_norm(0.5);
    // Gradient of (x - 3)^2 at 0 is -6, clipped to -0.5
    optimizer.minimize(&quadratic_loss(&x), &[x.clone()]);
    assert!((x.item() - 0.5).abs() < 1e-4);
    assert_eq!(optimizer.step(), 2);
  }
}
