//! Oriented first-derivative-of-Gaussian filter bank.
//!
//! The bank is precomputed once per detector. Kernels are zero-mean and
//! L1-normalized, so responses are comparable across orientations; boundary
//! handling reflects at the image edge.

use crate::image::ImageF32;

/// A small dense 2-D kernel, `size` is odd, taps row-major.
#[derive(Clone, Debug)]
struct Kernel2D {
    size: usize,
    taps: Vec<f32>,
}

/// Fixed set of first-derivative-of-Gaussian kernels at evenly spaced
/// orientations over [0, π).
#[derive(Clone, Debug)]
pub struct OrientedFilterBank {
    kernels: Vec<Kernel2D>,
}

impl OrientedFilterBank {
    /// Precompute `num_orientations` kernels with the given Gaussian sigma
    /// and support (half-size = ceil(sigma * support)).
    pub fn new(num_orientations: usize, sigma: f32, support: f32) -> Self {
        let kernels = (0..num_orientations)
            .map(|o| {
                let theta = std::f32::consts::PI / num_orientations as f32 * o as f32;
                derivative_kernel(sigma, support, theta)
            })
            .collect();
        Self { kernels }
    }

    pub fn num_orientations(&self) -> usize {
        self.kernels.len()
    }

    /// Correlate `map` with every kernel and add the absolute responses
    /// into `acc` (same dimensions as `map`).
    pub fn accumulate_abs_responses(&self, map: &ImageF32, acc: &mut ImageF32) {
        debug_assert_eq!(map.width, acc.width);
        debug_assert_eq!(map.height, acc.height);
        for kernel in &self.kernels {
            correlate_reflect_abs_into(map, kernel, acc);
        }
    }
}

/// Rotated first-derivative-of-Gaussian tap grid: the derivative acts along
/// the rotated x axis, so the kernel responds to intensity steps
/// perpendicular to `theta`.
fn derivative_kernel(sigma: f32, support: f32, theta: f32) -> Kernel2D {
    let hs = (sigma * support).ceil() as i32;
    let size = (2 * hs + 1) as usize;
    let (sin_t, cos_t) = theta.sin_cos();
    let inv_sigma2 = 1.0 / (sigma * sigma);

    let mut taps = Vec::with_capacity(size * size);
    for y in -hs..=hs {
        for x in -hs..=hs {
            let xf = x as f32;
            let yf = y as f32;
            let x_theta = xf * cos_t + yf * sin_t;
            let y_theta = -xf * sin_t + yf * cos_t;
            let gauss = (-(x_theta * x_theta + y_theta * y_theta) * 0.5 * inv_sigma2).exp();
            taps.push(-(x_theta * inv_sigma2) * gauss);
        }
    }

    let mean = taps.iter().sum::<f32>() / taps.len() as f32;
    for t in &mut taps {
        *t -= mean;
    }
    let l1 = taps.iter().map(|t| t.abs()).sum::<f32>() + 1e-10;
    for t in &mut taps {
        *t /= l1;
    }

    Kernel2D { size, taps }
}

/// Reflect an out-of-range index back into [0, n): -1 -> 0, n -> n-1.
#[inline]
fn reflect_index(mut i: i64, n: usize) -> usize {
    let n = n as i64;
    loop {
        if i < 0 {
            i = -i - 1;
        } else if i >= n {
            i = 2 * n - 1 - i;
        } else {
            return i as usize;
        }
    }
}

fn correlate_reflect_abs_into(src: &ImageF32, kernel: &Kernel2D, acc: &mut ImageF32) {
    let hs = (kernel.size / 2) as i64;
    for y in 0..src.height {
        for x in 0..src.width {
            let mut resp = 0.0f32;
            let mut tap = 0usize;
            for ky in -hs..=hs {
                let sy = reflect_index(y as i64 + ky, src.height);
                for kx in -hs..=hs {
                    let sx = reflect_index(x as i64 + kx, src.width);
                    resp += kernel.taps[tap] * src.get(sx, sy);
                    tap += 1;
                }
            }
            let i = y * src.width + x;
            acc.data[i] += resp.abs();
        }
    }
}
