use std::rc::Rc;
use std::cell::{Ref, RefMut, RefCell};
use std::fmt::Debug;

use rand::Rng;
use serde::{Serialize, Deserialize};

mod cops;
mod lops;

use crate::{
  internal::*,
  shape::Shape,
  variable::Variable,
  scalar::{ Inner, Numeric, Real },
  ops::Hops,
};


/// Multidimensional array.
///
/// Tensors may contain any type that satisfies [Inner], but
/// additional methods are available for [Numeric], [Real]
/// and [boolean](bool) inner types.
///
/// [Real] tensor types can be wrapped in a [Variable] by
/// calling [tracked](Tensor::tracked) or [trained](Tensor::trained).

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "TensorData<T>", bound(deserialize = "T: Deserialize<'de>"))]
pub struct Tensor<T: Inner> {
  shape: Shape,
  data: Rc<RefCell<Vec<T>>>,
}

// Unchecked wire form of a tensor
#[derive(Deserialize)]
struct TensorData<T> {
  shape: Shape,
  data: Vec<T>,
}

impl<T: Inner> TryFrom<TensorData<T>> for Tensor<T> {
  type Error = String;

  fn try_from(raw: TensorData<T>) -> Result<Self, Self::Error> {
    if raw.shape.size() != raw.data.len() {
      return Err(format!("{} doesn't match data length {}", raw.shape, raw.data.len()))
    }
    Ok(Self::from_shape(raw.shape, raw.data))
  }
}

impl<T: Real> Hops<T> for Tensor<T> {}

impl<T: Inner> PartialEq for Tensor<T> {
  fn eq(&self, rhs: &Self) -> bool {
    self.shape == rhs.shape && *self.raw() == *rhs.raw()
  }
}

impl<T: Inner> Tensor<T> {
  pub fn from_shape(shape: Shape, data: Vec<T>) -> Self {
    assert_eq!(shape.size(), data.len(),
      "{} doesn't match data length {}", shape, data.len());
    Self { shape, data: Rc::new(RefCell::new(data)) }
  }

  pub fn new(shape: &[usize], data: Vec<T>) -> Self {
    Self::from_shape(Shape::new(shape), data)
  }

  pub fn vec(vec: &[T]) -> Self {
    Self::new(&[vec.len()], vec.to_vec())
  }

  pub fn from_vec(vec: Vec<T>) -> Self {
    Self::new(&[vec.len()], vec)
  }

  pub fn fill(shape: &[usize], filler: T) -> Self {
    Self::new(shape, vec![filler; shape.iter().product()])
  }

  /// Stack equally shaped tensors along a new first dimension.

  pub fn rows(rows: &[Tensor<T>]) -> Self {
    let mut dims = rows[0].shape.dims.clone();
    dims.insert(0, rows.len());
    let data = rows.iter()
      .flat_map(|row| row.to_vec() )
      .collect();
    Self::new(&dims, data)
  }

  pub fn raw(&self) -> Ref<'_, Vec<T>> {
    self.data.borrow()
  }

  pub fn raw_mut(&self) -> RefMut<'_, Vec<T>> {
    self.data.borrow_mut()
  }

  pub fn to_vec(&self) -> Vec<T> {
    self.raw().clone()
  }

  pub fn into_raw(self) -> Vec<T> {
    match Rc::try_unwrap(self.data) {
      Ok(cell) => cell.into_inner(),
      Err(data) => {
        let vec = data.borrow().clone();
        vec
      },
    }
  }

  pub fn size(&self) -> usize {
    self.shape.size()
  }

  pub fn rank(&self) -> usize {
    self.shape.rank()
  }

  pub fn item(&self) -> T {
    assert!(self.size() == 1,
      "Can't extract item from non-scalar {}", self.shape);
    self.raw()[0]
  }

  pub fn shared_with(&self, other: &Self) -> bool {
    Rc::ptr_eq(&self.data, &other.data)
  }

  /// Overwrite this tensor's storage with the contents of `other`.

  pub fn assign(&self, other: &Self) {
    assert_eq!(self.size(), other.size(),
      "Could not assign {} tensor to {} tensor", other.shape, self.shape);
    if self.shared_with(other) { return }
    self.raw_mut().copy_from_slice(&other.raw());
  }

  pub fn refill(&self, filler: T) {
    for item in self.raw_mut().iter_mut() {
      *item = filler;
    }
  }

  pub fn detach(&self) -> Self {
    Self::from_shape(self.shape.clone(), self.to_vec())
  }

  pub fn zip<O,F>(&self, rhs: &Self, cb: F) -> Tensor<O>
  where
    O: Inner,
    F: Fn((T, T)) -> O,
  {
    let shape = self.shape.broadcast(&rhs.shape);
    let data_l = self.raw();
    let data_r = rhs.raw();
    let data = self.shape.broadcast_iter(&shape)
      .zip(rhs.shape.broadcast_iter(&shape))
      .map(|(i, j)| cb((data_l[i], data_r[j])) )
      .collect();
    Tensor::from_shape(shape, data)
  }

  pub fn vectorize<O,F>(&self, cb: F) -> Tensor<O>
  where
    O: Inner,
    F: FnMut(T) -> O,
  {
    let data = self.raw().iter().copied().map(cb).collect();
    Tensor::from_shape(self.shape.clone(), data)
  }

  /// Reduce `dim` and all dimensions behind it.

  pub fn collapse<O,F>(&self, dim: isize, cb: F) -> Tensor<O>
  where
    O: Inner,
    F: Fn(&[T]) -> O,
  {
    let shape = self.shape.collapse(dim);
    let chunk = self.size() / shape.size();
    let data = self.raw()
      .chunks(chunk)
      .map(cb)
      .collect();
    Tensor::from_shape(shape, data)
  }

  /// Gather a new tensor of the given shape from storage indices.

  pub(crate) fn gather(&self, shape: Shape, indices: impl Iterator<Item=usize>) -> Self {
    let data = {
      let raw = self.raw();
      indices.map(|i| raw[i] ).collect()
    };
    Self::from_shape(shape, data)
  }

  /// Iterate over copies of all sub-tensors along the first dimension.

  pub fn iter(&self) -> impl Iterator<Item=Tensor<T>> + '_ {
    (0..self.shape.dims.first().copied().unwrap_or(0))
      .map(move |i| self.at(&[i]) )
  }

  pub fn at(&self, indices: &[usize]) -> Self {
    let start = self.shape.index(indices);
    let shape = Shape::new(&self.shape.dims[indices.len()..]);
    let data = self.raw()[start..start + shape.size()].to_vec();
    Self::from_shape(shape, data)
  }

  pub fn equal(&self, rhs: &Self) -> Tensor<bool> {
    self.zip(rhs, |(a, b)| a == b )
  }
}

impl<T: Numeric> Tensor<T> {
  pub fn ones(shape: &[usize]) -> Self {
    Self::fill(shape, T::one())
  }

  pub fn zeros(shape: &[usize]) -> Self {
    Self::fill(shape, T::zero())
  }

  pub fn arrange(shape: &[usize], start: T, step: T) -> Self {
    Self::new(shape, (0..shape.iter().product())
      .map(|i| T::from(i).unwrap_or_else(T::zero) * step + start )
      .collect())
  }

  pub fn hot_encode(idx: usize, size: usize) -> Self {
    let mut a = vec![T::zero(); size];
    a[idx] = T::one();
    Self::from_vec(a)
  }

  /// Add `other` into this tensor's storage.

  pub fn accumulate(&self, other: &Self) {
    assert_eq!(self.size(), other.size(),
      "Could not accumulate {} tensor into {} tensor", other.shape, self.shape);
    // Avoid clashing borrow when tensors share storage
    let other = if self.shared_with(other) { other.detach() } else { other.clone() };
    let other_data = other.raw();
    for (a, &b) in self.raw_mut().iter_mut().zip(other_data.iter()) {
      *a += b;
    }
  }

  /// Sum a broadcasted tensor back down to `shape`.

  pub fn sum_to(&self, shape: &Shape) -> Self {
    if *shape == self.shape { return self.clone() }
    let mut data = vec![T::zero(); shape.size()];
    {
      let raw = self.raw();
      for (k, i) in shape.broadcast_iter(&self.shape).enumerate() {
        data[i] += raw[k];
      }
    }
    Self::from_shape(shape.clone(), data)
  }

  pub fn gt(&self, rhs: &Self) -> Tensor<bool> {
    self.zip(rhs, |(a, b)| a > b )
  }

  pub fn lt(&self, rhs: &Self) -> Tensor<bool> {
    self.zip(rhs, |(a, b)| a < b )
  }

  /// Collapse the last dimension using the index of its greatest value.

  pub fn argmax(&self) -> Tensor<usize> {
    self.collapse(-1, |values| {
      let mut index = 0;
      for (i, &value) in values.iter().enumerate() {
        if value > values[index] {
          index = i;
        }
      }
      index
    })
  }

  pub fn clamp(&self, min: T, max: T) -> Self {
    self.vectorize(|a| if a < min { min } else if a > max { max } else { a } )
  }

  pub fn cast<I: Numeric>(&self) -> Tensor<I> {
    self.vectorize(|a| I::from(a).unwrap_or_else(I::zero) )
  }
}

impl<T: Real> Tensor<T> {
  pub fn rand(shape: &[usize]) -> Self {
    Self::uniform(shape, T::zero(), T::one())
  }

  pub fn uniform(shape: &[usize], low: T, high: T) -> Self {
    let mut rng = rand::thread_rng();
    let data = (0..shape.iter().product())
      .map(|_| rng.gen_range(low, high) )
      .collect();
    Self::new(shape, data)
  }

  pub fn randn(shape: &[usize]) -> Self {
    Self::randn_with(shape, &mut rand::thread_rng())
  }

  /// Standard normal samples drawn from `rng`.

  pub fn randn_with<R: Rng + ?Sized>(shape: &[usize], rng: &mut R) -> Self {
    let len = shape.iter().product();
    let mut data = vec![T::zero(); len];
    for i in 0..(len + 1) / 2 {
      let j = i * 2;
      let (r1, r2): (T, T) = randn(rng);
      data[j] = r1;
      data[(j + 1) % len] = r2;
    }
    Self::new(shape, data)
  }

  pub fn bernoulli<O: Numeric>(&self) -> Tensor<O> {
    let mut rng = rand::thread_rng();
    self.vectorize(|a| if rng.gen_range(T::zero(), T::one()) < a {
      O::one()
    } else {
      O::zero()
    })
  }

  pub fn trained(&self) -> Variable<T> {
    Variable::from_tensor(self.clone(), true)
  }

  pub fn tracked(&self) -> Variable<T> {
    Variable::from_tensor(self.clone(), false)
  }
}

impl Tensor<bool> {
  pub fn numeric<O: Numeric>(&self) -> Tensor<O> {
    self.vectorize(|a| if a { O::one() } else { O::zero() })
  }

  pub fn all(&self) -> bool {
    self.raw().iter().all(|&a| a )
  }

  pub fn any(&self) -> bool {
    self.raw().iter().any(|&a| a )
  }
}

impl<T: Inner> std::fmt::Display for Tensor<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
    write!(f, "Tensor{:?} ", self.shape.dims)?;
    print_chunks(0, &self.shape, &self.raw(), f)
  }
}

fn print_chunks<T: Debug>(idx: usize, shape: &Shape, vec: &[T], f: &mut std::fmt::Formatter) -> std::fmt::Result {
  let indent = "  ".repeat(idx);
  if shape.rank() == 0 {
    write!(f, "{indent}{:?}", vec[0])?;
  } else if idx == shape.rank() - 1 {
    writeln!(f, "{indent}{:?}", vec)?;
  } else {
    writeln!(f, "{indent}[")?;
    for chunk in vec.chunks((vec.len() / shape.dims[idx]).max(1)) {
      print_chunks(idx + 1, shape, chunk, f)?;
    }
    writeln!(f, "{indent}]")?;
  }
  Ok(())
}


#[cfg(test)]
mod tests {
  use super::*;
  use crate::ops::NumericOps;

  #[test]
  fn index() {
    let x = Tensor::new(&[2,2,2], vec![1, 2, 3, 4, 5, 6, 7, 8]);
    assert_eq!(x.at(&[0,0]), Tensor::vec(&[1, 2]));
    assert_eq!(x.at(&[1,1]), Tensor::vec(&[7, 8]));
    assert_eq!(x.at(&[0]), Tensor::new(&[2,2], vec![1, 2, 3, 4]));
    assert_eq!(x.at(&[0,1,1]).item(), 4);
  }

  #[test]
  fn rows() {
    let a = Tensor::rows(&[Tensor::vec(&[1, 2]), Tensor::vec(&[3, 4])]);
    assert_eq!(a, Tensor::new(&[2,2], vec![1, 2, 3, 4]));
    assert_eq!(a.iter().count(), 2);
  }

  #[test]
  fn broadcast() {
    let x = Tensor::new(&[1,2,3], vec![1, 2, 3, 4, 5, 6]);

    let y = Tensor::new(&[    1], vec![1]);
    assert_eq!(&x + &y, Tensor::new(&[1,2,3], vec![2, 3, 4, 5, 6, 7]));

    let y = Tensor::new(&[    3], vec![1, 2, 3]);
    assert_eq!(&x + &y, Tensor::new(&[1,2,3], vec![2, 4, 6, 5, 7, 9]));

    let y = Tensor::new(&[  2,3], vec![1, 2, 3, 4, 5, 6]);
    assert_eq!(&x + &y, Tensor::new(&[1,2,3], vec![2, 4, 6, 8, 10, 12]));

    let y = Tensor::new(&[  2,1], vec![1, 2]);
    assert_eq!(&x + &y, Tensor::new(&[1,2,3], vec![2, 3, 4, 6, 7, 8]));
  }

  #[test]
  fn sum_to() {
    let a = Tensor::<i32>::arrange(&[3,2,2], 0, 1).sum_to(&Shape::new(&[3,1,2]));
    assert_eq!(a, Tensor::new(&[3,1,2], vec![2, 4, 10, 12, 18, 20]));

    let b = Tensor::<i32>::ones(&[2,3]).sum_to(&Shape::new(&[]));
    assert_eq!(b.item(), 6);
  }

  #[test]
  fn accumulate_shared() {
    let a = Tensor::vec(&[1.0, 2.0]);
    a.accumulate(&a.clone());
    assert_eq!(a, Tensor::vec(&[2.0, 4.0]));
  }

  #[test]
  fn argmax() {
    let a = Tensor::new(&[2,3], vec![0.1, 0.7, 0.2, -3.0, -4.0, -1.0]);
    assert_eq!(a.argmax(), Tensor::vec(&[1, 2]));
  }

  #[test]
  fn seeded_randn() {
    use rand::{ SeedableRng, rngs::StdRng };
    let a = Tensor::<f64>::randn_with(&[3,5], &mut StdRng::seed_from_u64(7));
    let b = Tensor::<f64>::randn_with(&[3,5], &mut StdRng::seed_from_u64(7));
    assert_eq!(a, b);
    assert_eq!(a.shape.dims, vec![3,5]);
  }

  #[test]
  fn deserialize_checks_length() {
    #[derive(Serialize)]
    struct Raw {
      shape: Shape,
      data: Vec<f64>,
    }

    let t = Tensor::new(&[2,2], vec![1.0, 2.0, 3.0, 4.0]);
    let bytes = postcard::to_allocvec(&t).unwrap();
    assert_eq!(postcard::from_bytes::<Tensor<f64>>(&bytes).unwrap(), t);

    let raw = Raw { shape: Shape::new(&[2,3]), data: vec![1.0] };
    let bytes = postcard::to_allocvec(&raw).unwrap();
    assert!(postcard::from_bytes::<Tensor<f64>>(&bytes).is_err());
  }

  #[test]
  fn randn_statistics() {
    let a = Tensor::<f64>::randn(&[4001]);
    let mean = a.sum(0).item() / 4001.0;
    assert!(mean.abs() < 0.1);
  }

  #[test]
  fn bernoulli_extremes() {
    let ones: Tensor<f32> = Tensor::fill(&[16], 1.0).bernoulli();
    assert_eq!(ones, Tensor::ones(&[16]));
    let zeros: Tensor<f32> = Tensor::fill(&[16], 0.0).bernoulli();
    assert_eq!(zeros, Tensor::zeros(&[16]));
  }
}
