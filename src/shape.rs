use serde::{Serialize, Deserialize};

use crate::internal::*;


/// The shape of a [Tensor](crate::Tensor).
///
/// Tensors are always stored contiguously in row-major order,
/// so a shape is fully described by its dimensions.

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shape {
  pub dims: Vec<usize>,
}

impl Shape {
  pub fn new(dims: &[usize]) -> Self {
    Self { dims: dims.to_vec() }
  }

  pub fn strides(&self) -> Vec<usize> {
    let mut strides = vec![1; self.dims.len()];
    for i in (1..self.dims.len()).rev() {
      strides[i - 1] = self.dims[i] * strides[i];
    }
    strides
  }

  pub fn size(&self) -> usize {
    self.dims.iter().product()
  }

  pub fn rank(&self) -> usize {
    self.dims.len()
  }

  pub fn index(&self, indices: &[usize]) -> usize {
    assert!(indices.len() <= self.rank(), "Too many indices for {}", self);
    // Missing trailing indices count as zero
    indices.iter()
      .zip(self.strides())
      .map(|(&i, s)| i * s )
      .sum()
  }

  pub fn view(&self, dims: &[usize]) -> Self {
    let shape = Self::new(dims);
    assert_eq!(shape.size(), self.size(), "Cannot view {} as {}", self, shape);
    shape
  }

  pub fn squeeze(&self) -> Self {
    Self { dims: self.dims.iter().copied().filter(|&n| n != 1 ).collect() }
  }

  pub fn unsqueeze(&self, dim: isize) -> Self {
    let d = negative_index(dim, self.rank(), true);
    let mut dims = self.dims.clone();
    dims.insert(d, 1);
    Self { dims }
  }

  /// Remove `dim` and all dimensions behind it.

  pub fn collapse(&self, dim: isize) -> Self {
    let d = negative_index(dim, self.rank(), false);
    Self::new(&self.dims[..d])
  }

  pub fn transpose(&self, dim1: isize, dim2: isize) -> Self {
    let dim1 = negative_index(dim1, self.rank(), false);
    let dim2 = negative_index(dim2, self.rank(), false);
    let mut dims = self.dims.clone();
    dims.swap(dim1, dim2);
    Self { dims }
  }

  pub fn narrow(&self, dim: isize, start: usize, len: usize) -> Self {
    let d = negative_index(dim, self.rank(), false);
    assert!(start + len <= self.dims[d],
      "Cannot narrow dim {} of {} to {}..{}", d, self, start, start + len);
    let mut dims = self.dims.clone();
    dims[d] = len;
    Self { dims }
  }

  pub fn broadcast(&self, other: &Self) -> Self {
    let mut dims: Vec<usize> = self.dims.iter()
      .rev()
      .chain(std::iter::repeat(&1))
      .zip(other.dims.iter()
        .rev()
        .chain(std::iter::repeat(&1)))
      .take(self.rank().max(other.rank()))
      .map(|(&a, &b)| {
        assert!(a == b || a == 1 || b == 1, "Could not broadcast {} & {}", self, other);
        a.max(b)
      })
      .collect();
    dims.reverse();
    Self { dims }
  }

  /// Storage indices of this shape, visited in the order of `target`,
  /// which this shape gets broadcasted to.

  pub fn broadcast_iter(&self, target: &Self) -> ShapeIterator {
    assert!(self.rank() <= target.rank(), "Could not broadcast {} to {}", self, target);
    let offset = target.rank() - self.rank();
    let source_strides = self.strides();
    let strides = target.dims.iter()
      .enumerate()
      .map(|(d, &n)| {
        if d < offset { return 0 }
        let source = self.dims[d - offset];
        assert!(source == n || source == 1, "Could not broadcast {} to {}", self, target);
        if source == 1 { 0 } else { source_strides[d - offset] }
      })
      .collect();
    ShapeIterator::new(target.dims.clone(), strides, 0)
  }

  /// Storage indices visited in the order of this shape's transposition.

  pub fn transpose_iter(&self, dim1: isize, dim2: isize) -> ShapeIterator {
    let dim1 = negative_index(dim1, self.rank(), false);
    let dim2 = negative_index(dim2, self.rank(), false);
    let mut strides = self.strides();
    strides.swap(dim1, dim2);
    ShapeIterator::new(self.transpose(dim1 as isize, dim2 as isize).dims, strides, 0)
  }

  /// Storage indices of a window along `dim`.

  pub fn narrow_iter(&self, dim: isize, start: usize, len: usize) -> ShapeIterator {
    let d = negative_index(dim, self.rank(), false);
    let shape = self.narrow(d as isize, start, len);
    let strides = self.strides();
    let offset = start * strides[d];
    ShapeIterator::new(shape.dims, strides, offset)
  }
}

impl std::ops::Index<isize> for Shape {
  type Output = usize;

  fn index(&self, i: isize) -> &usize {
    let idx = negative_index(i, self.rank(), false);
    &self.dims[idx]
  }
}

impl std::fmt::Display for Shape {
  fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
    write!(f, "Shape{:?}", self.dims)
  }
}


/// Iterate through strided storage indices.

#[derive(Debug, Clone)]
pub struct ShapeIterator {
  dims: Vec<usize>,
  strides: Vec<usize>,
  counter: Vec<usize>,
  idx: usize,
  remaining: usize,
}

impl ShapeIterator {
  fn new(dims: Vec<usize>, strides: Vec<usize>, offset: usize) -> Self {
    Self {
      remaining: dims.iter().product(),
      counter: vec![0; dims.len()],
      dims,
      strides,
      idx: offset,
    }
  }
}

impl Iterator for ShapeIterator {
  type Item = usize;

  fn next(&mut self) -> Option<Self::Item> {
    if self.remaining == 0 { return None }
    self.remaining -= 1;
    let out = self.idx;
    // Walk backward through dimensions
    for d in (0..self.dims.len()).rev() {
      self.counter[d] += 1;
      self.idx += self.strides[d];
      if self.counter[d] < self.dims[d] { break }
      // Full turn
      self.idx -= self.strides[d] * self.dims[d];
      self.counter[d] = 0;
    }
    Some(out)
  }

  fn size_hint(&self) -> (usize, Option<usize>) {
    (self.remaining, Some(self.remaining))
  }
}

impl ExactSizeIterator for ShapeIterator {}
