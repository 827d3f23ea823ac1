//! Spectral-graph boundary detection for liquid level gauging.
//!
//! This crate holds the pure detection algorithms and is free of any
//! concrete frame-grabbing or image-container dependency. Frames enter as
//! borrowed [`RgbView`] buffers and leave as float [`ImageF32`] maps.
//!
//! The detection pipeline per frame:
//! 1. optional CLAHE-style lighting normalization ([`equalize_rgb_in_place`]),
//! 2. downsampling + L*a*b* feature extraction,
//! 3. a radius-thresholded affinity graph over color+position features,
//! 4. a generalized eigenproblem on the graph Laplacian/degree pair,
//! 5. oriented derivative-of-Gaussian filtering of the eigenvector maps,
//! 6. fusion into a single normalized boundary-strength map
//!    ([`BoundaryDetector::detect`]),
//! 7. subpixel localization of the dominant boundary row
//!    ([`locate_subpixel_row`]).

mod boundary;
mod clahe;
mod color;
mod filters;
mod graph;
mod image;
mod locate;
mod spectral;

pub use boundary::{BoundaryDetector, BoundaryMap, BoundaryQuality, DetectorParams};
pub use clahe::{equalize_rgb_in_place, ClaheParams};
pub use filters::OrientedFilterBank;
pub use graph::{build_affinity_graph, build_feature_map, AffinityGraph, FEATURE_DIM};
pub use image::{ImageF32, RgbView};
pub use locate::{gaussian_smooth_1d, locate_subpixel_row};
pub use spectral::{eigen_maps, SpectralError};
