//! Parallel processing utilities for image and array operations
//!
//! Thin wrappers around rayon and ndarray's parallel iterators. Each unit of
//! work writes a disjoint region of the output, so no synchronization is
//! needed beyond the join at the end.

use ndarray::{Array2, Array3, ArrayViewMut1, ArrayViewMut2, Axis};
use rayon::prelude::*;

/// Fill every plane (index along axis 0) of a 3-D array in parallel.
///
/// # Arguments
/// * `shape` - Array shape as (planes, rows, cols)
/// * `processor` - Closure receiving the plane index and a mutable view of the plane
///
/// # Returns
/// The filled array
pub fn fill_planes_in_parallel<F>(shape: (usize, usize, usize), processor: F) -> Array3<f64>
where
    F: Fn(usize, &mut ArrayViewMut2<f64>) + Send + Sync,
{
    let mut cube = Array3::<f64>::zeros(shape);

    cube.axis_iter_mut(Axis(0))
        .into_par_iter()
        .enumerate()
        .for_each(|(plane_idx, mut plane)| processor(plane_idx, &mut plane));

    cube
}

/// Compute a 2-D array row by row in parallel.
///
/// # Arguments
/// * `shape` - Output shape as (rows, cols)
/// * `processor` - Closure receiving the row index and a mutable view of the row
pub fn map_rows_in_parallel<T, F>(shape: (usize, usize), processor: F) -> Array2<T>
where
    T: Clone + Default + Send + Sync,
    F: Fn(usize, &mut ArrayViewMut1<T>) + Send + Sync,
{
    let mut output = Array2::<T>::default(shape);

    output
        .axis_iter_mut(Axis(0))
        .into_par_iter()
        .enumerate()
        .for_each(|(row_idx, mut row)| processor(row_idx, &mut row));

    output
}
