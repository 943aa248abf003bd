//! Dense tensor blocks
//!
//! This module provides the `DenseND<T>` type used for the process-local block
//! of a distributed tensor. A block is immutable once it has been handed to a
//! factorization engine; the engine only reads its dimensions, its squared norm
//! and its row-major element buffer.
//!
//! # SciRS2 Integration
//!
//! All array operations use `scirs2_core::ndarray_ext`.
//! Direct use of `ndarray` is forbidden per SCIRS2_INTEGRATION_POLICY.md

use scirs2_core::ndarray_ext::{Array, ArrayView, IxDyn};
use scirs2_core::numeric::{Float, Num};
use std::fmt;

/// Dense N-dimensional tensor with row-major (C-contiguous) storage
///
/// The storage is kept in standard layout at all times so that
/// [`DenseND::as_slice`] can hand the element buffer to kernels that
/// reinterpret the block as a matrix (e.g. MTTKRP and the dimension tree).
///
/// # Examples
///
/// ```
/// use tenrso_core::DenseND;
///
/// let tensor = DenseND::<f64>::zeros(&[2, 3, 4]);
/// assert_eq!(tensor.dimensions(), &[2, 3, 4]);
/// assert_eq!(tensor.modes(), 3);
/// assert_eq!(tensor.numel(), 24);
/// ```
#[derive(Clone, PartialEq)]
pub struct DenseND<T> {
    pub(crate) data: Array<T, IxDyn>,
}

impl<T> DenseND<T>
where
    T: Clone + Num,
{
    /// Create a tensor from an existing array
    ///
    /// Arrays that are not in standard layout are copied into row-major order.
    pub fn from_array(array: Array<T, IxDyn>) -> Self {
        if array.is_standard_layout() {
            Self { data: array }
        } else {
            Self {
                data: array.as_standard_layout().into_owned(),
            }
        }
    }

    /// Create a tensor from row-major data
    ///
    /// # Errors
    ///
    /// Fails if `vec.len()` differs from the product of `shape`.
    ///
    /// # Examples
    ///
    /// ```
    /// use tenrso_core::DenseND;
    ///
    /// let tensor = DenseND::from_vec(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3]).unwrap();
    /// assert_eq!(tensor[&[1, 0][..]], 4.0);
    /// ```
    pub fn from_vec(vec: Vec<T>, shape: &[usize]) -> anyhow::Result<Self> {
        let total: usize = shape.iter().product();
        if vec.len() != total {
            anyhow::bail!(
                "Shape {:?} requires {} elements, but got {}",
                shape,
                total,
                vec.len()
            );
        }
        let array = Array::from_shape_vec(IxDyn(shape), vec)?;
        Ok(Self { data: array })
    }

    /// Create a tensor filled with `value`
    pub fn from_elem(shape: &[usize], value: T) -> Self {
        Self {
            data: Array::from_elem(IxDyn(shape), value),
        }
    }

    /// Create a tensor of zeros
    pub fn zeros(shape: &[usize]) -> Self {
        Self {
            data: Array::zeros(IxDyn(shape)),
        }
    }

    /// Create a tensor of ones
    pub fn ones(shape: &[usize]) -> Self {
        Self {
            data: Array::ones(IxDyn(shape)),
        }
    }

    /// Number of modes (dimensions)
    pub fn modes(&self) -> usize {
        self.data.ndim()
    }

    /// Alias of [`DenseND::modes`]
    pub fn rank(&self) -> usize {
        self.modes()
    }

    /// Extent of every mode
    pub fn dimensions(&self) -> &[usize] {
        self.data.shape()
    }

    /// Alias of [`DenseND::dimensions`]
    pub fn shape(&self) -> &[usize] {
        self.dimensions()
    }

    /// Total number of elements
    pub fn numel(&self) -> usize {
        self.data.len()
    }

    /// Alias of [`DenseND::numel`]
    pub fn len(&self) -> usize {
        self.numel()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Borrow the underlying array
    pub fn as_array(&self) -> &Array<T, IxDyn> {
        &self.data
    }

    /// Immutable view of the block
    pub fn view(&self) -> ArrayView<'_, T, IxDyn> {
        self.data.view()
    }

    /// Element buffer in row-major order
    ///
    /// # Examples
    ///
    /// ```
    /// use tenrso_core::DenseND;
    ///
    /// let tensor = DenseND::<f64>::ones(&[2, 3]);
    /// assert_eq!(tensor.as_slice().len(), 6);
    /// ```
    pub fn as_slice(&self) -> &[T] {
        // standard layout is an invariant of every constructor
        self.data.as_slice().unwrap_or(&[])
    }

    /// Bounds-checked element access
    pub fn get(&self, index: &[usize]) -> Option<&T> {
        if index.len() != self.modes() {
            return None;
        }
        if index
            .iter()
            .zip(self.dimensions().iter())
            .any(|(&i, &d)| i >= d)
        {
            return None;
        }
        Some(&self.data[IxDyn(index)])
    }

    /// Product of the extents of all modes except `mode`
    pub fn numel_except(&self, mode: usize) -> usize {
        self.dimensions()
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != mode)
            .map(|(_, &d)| d)
            .product()
    }
}

impl<T> DenseND<T>
where
    T: Float,
{
    /// Sum of squared elements
    ///
    /// This is the quantity the factorization engine all-reduces to obtain
    /// the squared Frobenius norm of the global tensor.
    ///
    /// # Examples
    ///
    /// ```
    /// use tenrso_core::DenseND;
    ///
    /// let tensor = DenseND::from_vec(vec![1.0, 2.0, 2.0], &[3]).unwrap();
    /// assert_eq!(tensor.norm_squared(), 9.0);
    /// ```
    pub fn norm_squared(&self) -> T {
        self.data.iter().fold(T::zero(), |acc, &x| acc + x * x)
    }

    /// Frobenius norm `sqrt(Σ x²)`
    pub fn frobenius_norm(&self) -> T {
        self.norm_squared().sqrt()
    }
}

impl<T> std::ops::Index<&[usize]> for DenseND<T> {
    type Output = T;

    fn index(&self, index: &[usize]) -> &Self::Output {
        &self.data[IxDyn(index)]
    }
}

impl<T> std::ops::IndexMut<&[usize]> for DenseND<T> {
    fn index_mut(&mut self, index: &[usize]) -> &mut Self::Output {
        &mut self.data[IxDyn(index)]
    }
}

impl<T: fmt::Debug> fmt::Debug for DenseND<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DenseND")
            .field("shape", &self.data.shape())
            .field("data", &self.data)
            .finish()
    }
}
