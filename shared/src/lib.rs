//! Shared components and utilities for the segmented-aperture contrast tools.
//!
//! This crate holds the generic array and image machinery that the `pastis`
//! crate builds on: disjoint-set clustering, connected-component labeling,
//! binary morphology, dark-hole masks and centered Fourier transforms. Nothing
//! in here knows about segments, baselines or coronagraphs.

pub mod algo;
pub mod image_proc;
