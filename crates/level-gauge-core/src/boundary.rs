//! Boundary-strength map synthesis: the detector's public entry point.

use log::warn;
use serde::{Deserialize, Serialize};

use crate::color::rgb_planes_to_lab;
use crate::filters::OrientedFilterBank;
use crate::graph::{build_affinity_graph, build_feature_map};
use crate::image::{downsample_area, resize_bilinear, ImageF32, RgbView};
use crate::spectral::eigen_maps;

/// Detector configuration. Defaults reproduce the reference tuning.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DetectorParams {
    /// Number of non-trivial eigenvectors in the spectral embedding.
    pub num_eigenvectors: usize,
    /// Gaussian bandwidth for affinity weighting.
    pub sigma: f32,
    /// Neighborhood radius in the combined color+position feature space.
    pub radius: f32,
    /// Frames are downsampled so `max(h, w) <= max_dim` before the graph is
    /// built; the output map is upsampled back to the input size.
    pub max_dim: usize,
    /// Number of oriented derivative filters over [0, π).
    pub num_orientations: usize,
    /// Gaussian sigma of the oriented filters.
    pub filter_sigma: f32,
    /// Filter support as a multiple of `filter_sigma`.
    pub filter_support: f32,
    /// Eigensolver tolerance on Ritz-value drift between iterations.
    pub solver_tol: f64,
    /// Eigensolver iteration cap; exceeding it degrades the frame instead
    /// of failing it.
    pub solver_max_iters: usize,
}

impl Default for DetectorParams {
    fn default() -> Self {
        Self {
            num_eigenvectors: 5,
            sigma: 0.1,
            radius: 0.2,
            max_dim: 100,
            num_orientations: 8,
            filter_sigma: 1.0,
            filter_support: 2.0,
            solver_tol: 1e-2,
            solver_max_iters: 60,
        }
    }
}

/// Whether a boundary map came out of the nominal path or a recovered
/// degraded one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BoundaryQuality {
    Nominal,
    /// The spectral solver failed; an all-zero embedding was substituted.
    SolverDegraded,
}

/// Normalized boundary-strength map at the input frame's resolution.
#[derive(Clone, Debug)]
pub struct BoundaryMap {
    pub values: ImageF32,
    pub quality: BoundaryQuality,
}

/// Spectral boundary detector. Construction precomputes the oriented filter
/// bank; `detect` is deterministic for fixed parameters and input pixels.
pub struct BoundaryDetector {
    params: DetectorParams,
    filters: OrientedFilterBank,
}

impl BoundaryDetector {
    pub fn new(params: DetectorParams) -> Self {
        let filters = OrientedFilterBank::new(
            params.num_orientations,
            params.filter_sigma,
            params.filter_support,
        );
        Self { params, filters }
    }

    pub fn params(&self) -> &DetectorParams {
        &self.params
    }

    /// Extract the boundary-strength map of one frame.
    ///
    /// Never fails: a frame that defeats the spectral solver (blank or
    /// degenerate content) produces an all-near-zero map tagged
    /// [`BoundaryQuality::SolverDegraded`].
    pub fn detect(&self, frame: RgbView<'_>) -> BoundaryMap {
        let (orig_w, orig_h) = (frame.width, frame.height);
        let mut planes = rgb_to_planes(frame);

        // Bound the graph size: all spectral work runs at reduced resolution.
        let max_side = orig_w.max(orig_h);
        let downsampled = max_side > self.params.max_dim;
        if downsampled {
            let scale = self.params.max_dim as f32 / max_side as f32;
            let new_w = ((orig_w as f32 * scale) as usize).max(1);
            let new_h = ((orig_h as f32 * scale) as usize).max(1);
            planes = [
                downsample_area(&planes[0], new_w, new_h),
                downsample_area(&planes[1], new_w, new_h),
                downsample_area(&planes[2], new_w, new_h),
            ];
        }
        let (w, h) = (planes[0].width, planes[0].height);

        let mut lab = rgb_planes_to_lab(&planes);
        for plane in &mut lab {
            plane.normalize_min_max();
        }

        let features = build_feature_map(&lab);
        let graph = build_affinity_graph(&features, self.params.radius, self.params.sigma);

        let (mut maps, quality) = match eigen_maps(
            &graph,
            self.params.num_eigenvectors,
            w,
            h,
            self.params.solver_tol,
            self.params.solver_max_iters,
        ) {
            Ok(maps) => (maps, BoundaryQuality::Nominal),
            Err(err) => {
                warn!("spectral embedding degraded: {err}");
                (
                    vec![ImageF32::new(w, h); self.params.num_eigenvectors],
                    BoundaryQuality::SolverDegraded,
                )
            }
        };

        let mut fused = ImageF32::new(w, h);
        for map in &mut maps {
            map.normalize_min_max();
            self.filters.accumulate_abs_responses(map, &mut fused);
        }

        let mut values = if downsampled {
            resize_bilinear(&fused, orig_w, orig_h)
        } else {
            fused
        };
        values.zero_non_finite();
        values.normalize_min_max();

        BoundaryMap { values, quality }
    }
}

fn rgb_to_planes(frame: RgbView<'_>) -> [ImageF32; 3] {
    let (w, h) = (frame.width, frame.height);
    let mut planes = [ImageF32::new(w, h), ImageF32::new(w, h), ImageF32::new(w, h)];
    for i in 0..w * h {
        planes[0].data[i] = frame.data[i * 3] as f32 / 255.0;
        planes[1].data[i] = frame.data[i * 3 + 1] as f32 / 255.0;
        planes[2].data[i] = frame.data[i * 3 + 2] as f32 / 255.0;
    }
    planes
}
