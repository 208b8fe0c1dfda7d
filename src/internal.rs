use rand::Rng;
use num_traits::NumCast;

use crate::scalar::Real;


#[inline]
pub fn negative_index(i: isize, n: usize, start_behind: bool) -> usize {
  if i < 0 {
    let offset = if start_behind { 1 } else { 0 };
    (n as isize + i + offset) as usize
  } else {
    i as usize
  }
}


/// Convert a host-side constant into the inner type.
/// Every [Real] type can represent an f64 approximately.

#[inline]
pub fn cast<T: Real>(value: f64) -> T {
  <T as NumCast>::from(value).unwrap_or_else(T::zero)
}

#[inline]
pub fn to_f64<T: Real>(value: T) -> f64 {
  value.to_f64().unwrap_or(f64::NAN)
}


// Polar Box-Muller transformation

pub fn randn<T: Real, R: Rng + ?Sized>(rng: &mut R) -> (T, T) {
  loop {
    let u = rng.gen_range(-T::one(), T::one());
    let v = rng.gen_range(-T::one(), T::one());
    let r = u * u + v * v;
    // Try again if outside interval
    if r == T::zero() || r >= T::one() { continue }
    let c = (cast::<T>(-2.0) * r.ln() / r).sqrt();
    return (u * c, v * c)
  }
}
