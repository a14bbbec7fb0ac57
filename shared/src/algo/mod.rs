//! Generic algorithms used across the workspace
//!
//! - **union_find**: disjoint-set forest with path compression
//! - **parallel**: rayon helpers for filling ndarray planes and rows

pub mod parallel;
pub mod union_find;

pub use parallel::{fill_planes_in_parallel, map_rows_in_parallel};
pub use union_find::DisjointSet;
