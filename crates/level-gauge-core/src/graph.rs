//! Sparse affinity graph over per-pixel color+position features.
//!
//! Every pixel is connected to the pixels whose combined feature vector lies
//! within a fixed Euclidean radius; weights follow a Gaussian kernel of the
//! feature distance. The k-d tree makes the radius queries tractable at the
//! reduced detector resolution.

use kiddo::{KdTree, SquaredEuclidean};

use crate::image::ImageF32;

/// Three color channels plus (row, col) position.
pub const FEATURE_DIM: usize = 5;

/// Symmetric weighted adjacency in CSR form. No self-loops; rows of
/// isolated pixels are empty, which downstream code must tolerate.
#[derive(Clone, Debug)]
pub struct AffinityGraph {
    pub nodes: usize,
    pub row_ptr: Vec<usize>,
    pub col_idx: Vec<u32>,
    pub values: Vec<f32>,
}

impl AffinityGraph {
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// Row sums of the adjacency, i.e. the node degrees.
    pub fn degrees(&self) -> Vec<f64> {
        let mut deg = vec![0.0f64; self.nodes];
        for i in 0..self.nodes {
            let mut acc = 0.0f64;
            for idx in self.row_ptr[i]..self.row_ptr[i + 1] {
                acc += self.values[idx] as f64;
            }
            deg[i] = acc;
        }
        deg
    }
}

/// Combine normalized [L, a, b] planes with spatial coordinates into one
/// feature vector per pixel. Coordinates are normalized by max(h, w) so the
/// spatial term is scale-free.
pub fn build_feature_map(lab: &[ImageF32; 3]) -> Vec<[f32; FEATURE_DIM]> {
    let (w, h) = (lab[0].width, lab[0].height);
    let inv_dim = 1.0 / w.max(h).max(1) as f32;
    let mut features = Vec::with_capacity(w * h);
    for y in 0..h {
        for x in 0..w {
            let i = y * w + x;
            features.push([
                lab[0].data[i],
                lab[1].data[i],
                lab[2].data[i],
                y as f32 * inv_dim,
                x as f32 * inv_dim,
            ]);
        }
    }
    features
}

/// Radius-neighbor graph with Gaussian edge weights
/// `exp(-distance^2 / sigma^2)`.
pub fn build_affinity_graph(
    features: &[[f32; FEATURE_DIM]],
    radius: f32,
    sigma: f32,
) -> AffinityGraph {
    let mut tree: KdTree<f32, FEATURE_DIM> = KdTree::with_capacity(features.len());
    for (i, feature) in features.iter().enumerate() {
        tree.add(feature, i as u64);
    }

    let radius_sq = radius * radius;
    let inv_sigma_sq = 1.0 / (sigma * sigma);

    let mut row_ptr = Vec::with_capacity(features.len() + 1);
    let mut col_idx = Vec::new();
    let mut values = Vec::new();
    row_ptr.push(0);

    for (i, feature) in features.iter().enumerate() {
        for neighbor in tree.within_unsorted::<SquaredEuclidean>(feature, radius_sq) {
            if neighbor.item as usize == i {
                continue;
            }
            col_idx.push(neighbor.item as u32);
            values.push((-neighbor.distance * inv_sigma_sq).exp());
        }
        row_ptr.push(col_idx.len());
    }

    AffinityGraph {
        nodes: features.len(),
        row_ptr,
        col_idx,
        values,
    }
}
