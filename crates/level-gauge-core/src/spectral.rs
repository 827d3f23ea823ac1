//! Generalized spectral decomposition of the affinity graph.
//!
//! Solves `L v = λ D v` with `L = D - W` for the smallest eigenpairs through
//! the symmetric reduction `(I - D^{-1/2} W D^{-1/2}) u = λ u`,
//! `v = D^{-1/2} u`. The smallest eigenvectors of the normalized Laplacian
//! are the largest of `C = I + D^{-1/2} W D^{-1/2}`, which block subspace
//! iteration with Rayleigh-Ritz extraction finds to the modest tolerance a
//! perceptual grouping signal needs. Exact spectra are not the goal.

use nalgebra::{DMatrix, SymmetricEigen};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::graph::AffinityGraph;
use crate::image::ImageF32;

/// Degrees below this are floored to keep `D^{-1/2}` finite on isolated
/// pixels.
pub(crate) const DEGREE_FLOOR: f64 = 1e-10;

/// Fixed seed so a given frame always yields the same embedding.
const SUBSPACE_SEED: u64 = 0x1eaf_9a0e;

#[derive(thiserror::Error, Debug)]
pub enum SpectralError {
    #[error("eigensolver did not converge within {max_iters} iterations (last drift {drift:.3e})")]
    NonConvergence { max_iters: usize, drift: f64 },

    #[error("graph with {nodes} nodes cannot yield {requested} non-trivial eigenvectors")]
    ProblemTooSmall { nodes: usize, requested: usize },
}

/// Compute the first `k` non-trivial generalized eigenvectors and reshape
/// them into `width x height` maps (`width * height == graph.nodes`).
///
/// The trivial eigenvector (eigenvalue ~= 0) is discarded. Convergence is
/// declared when the Ritz values drift less than `tol` between iterations.
pub fn eigen_maps(
    graph: &AffinityGraph,
    k: usize,
    width: usize,
    height: usize,
    tol: f64,
    max_iters: usize,
) -> Result<Vec<ImageF32>, SpectralError> {
    let n = graph.nodes;
    let m = k + 1;
    debug_assert_eq!(n, width * height);
    if n <= m {
        return Err(SpectralError::ProblemTooSmall {
            nodes: n,
            requested: k,
        });
    }

    let inv_sqrt_deg: Vec<f64> = graph
        .degrees()
        .into_iter()
        .map(|d| 1.0 / d.max(DEGREE_FLOOR).sqrt())
        .collect();

    // Degree-normalized adjacency in the same CSR layout as the graph.
    let mut scaled = Vec::with_capacity(graph.nnz());
    for i in 0..n {
        for idx in graph.row_ptr[i]..graph.row_ptr[i + 1] {
            let j = graph.col_idx[idx] as usize;
            scaled.push(graph.values[idx] as f64 * inv_sqrt_deg[i] * inv_sqrt_deg[j]);
        }
    }

    let mut rng = StdRng::seed_from_u64(SUBSPACE_SEED);
    let x0 = DMatrix::from_fn(n, m, |_, _| rng.gen::<f64>() - 0.5);
    let mut q = orthonormalize(x0);

    let mut prev_ritz: Option<Vec<f64>> = None;
    let mut drift = f64::INFINITY;
    for _ in 0..max_iters {
        let z = apply_shifted_operator(graph, &scaled, &q);
        let mut t = q.transpose() * &z;
        symmetrize(&mut t);
        let eig = SymmetricEigen::new(t);
        let order = descending_order(eig.eigenvalues.as_slice());
        let ritz: Vec<f64> = order.iter().map(|&j| eig.eigenvalues[j]).collect();

        if let Some(prev) = &prev_ritz {
            drift = ritz
                .iter()
                .zip(prev)
                .map(|(a, b)| (a - b).abs())
                .fold(0.0, f64::max);
            if drift < tol {
                let rotation =
                    DMatrix::from_fn(m, m, |r, c| eig.eigenvectors[(r, order[c])]);
                let vectors = q * rotation;
                return Ok(reshape_to_maps(&vectors, &inv_sqrt_deg, k, width, height));
            }
        }
        prev_ritz = Some(ritz);
        q = orthonormalize(z);
    }

    Err(SpectralError::NonConvergence { max_iters, drift })
}

/// `y = (I + A_hat) x`, column by column over the CSR adjacency.
fn apply_shifted_operator(
    graph: &AffinityGraph,
    scaled: &[f64],
    x: &DMatrix<f64>,
) -> DMatrix<f64> {
    let (n, m) = x.shape();
    let mut y = DMatrix::zeros(n, m);
    for col in 0..m {
        for i in 0..n {
            let mut acc = x[(i, col)];
            for idx in graph.row_ptr[i]..graph.row_ptr[i + 1] {
                acc += scaled[idx] * x[(graph.col_idx[idx] as usize, col)];
            }
            y[(i, col)] = acc;
        }
    }
    y
}

fn orthonormalize(x: DMatrix<f64>) -> DMatrix<f64> {
    x.qr().q()
}

fn symmetrize(t: &mut DMatrix<f64>) {
    let m = t.nrows();
    for r in 0..m {
        for c in r + 1..m {
            let avg = 0.5 * (t[(r, c)] + t[(c, r)]);
            t[(r, c)] = avg;
            t[(c, r)] = avg;
        }
    }
}

fn descending_order(values: &[f64]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[b].total_cmp(&values[a]));
    order
}

/// Columns 1..=k (the trivial leading vector skipped), rescaled by
/// `D^{-1/2}` back to generalized eigenvectors, as per-pixel maps.
fn reshape_to_maps(
    vectors: &DMatrix<f64>,
    inv_sqrt_deg: &[f64],
    k: usize,
    width: usize,
    height: usize,
) -> Vec<ImageF32> {
    (1..=k)
        .map(|col| {
            let mut map = ImageF32::new(width, height);
            for i in 0..width * height {
                map.data[i] = (vectors[(i, col)] * inv_sqrt_deg[i]) as f32;
            }
            map
        })
        .collect()
}
