//! Subpixel localization of the dominant boundary row.

use crate::image::ImageF32;

const PARABOLA_EPS: f32 = 1e-10;

/// Gaussian-smooth a 1-D signal (reflect border, truncated at 4 sigma).
pub fn gaussian_smooth_1d(signal: &[f32], sigma: f32) -> Vec<f32> {
    if signal.is_empty() || sigma <= 0.0 {
        return signal.to_vec();
    }
    let radius = (4.0 * sigma).ceil() as i64;
    let mut kernel = Vec::with_capacity((2 * radius + 1) as usize);
    let inv_two_sigma_sq = 1.0 / (2.0 * sigma * sigma);
    for offset in -radius..=radius {
        kernel.push((-(offset * offset) as f32 * inv_two_sigma_sq).exp());
    }
    let norm: f32 = kernel.iter().sum();
    for k in &mut kernel {
        *k /= norm;
    }

    let n = signal.len() as i64;
    let mut out = Vec::with_capacity(signal.len());
    for i in 0..n {
        let mut acc = 0.0f32;
        for (tap, &k) in kernel.iter().enumerate() {
            let mut j = i + tap as i64 - radius;
            // reflect: -1 -> 0, n -> n-1
            loop {
                if j < 0 {
                    j = -j - 1;
                } else if j >= n {
                    j = 2 * n - 1 - j;
                } else {
                    break;
                }
            }
            acc += k * signal[j as usize];
        }
        out.push(acc);
    }
    out
}

/// Estimate the subpixel row of the dominant peak in a boundary map.
///
/// The map is averaged across columns into a row profile, smoothed with a
/// small Gaussian, and the maximum is refined by 3-point parabolic
/// interpolation. A peak at either end of the profile is returned as the
/// integer index: there is no second neighbor to interpolate against.
pub fn locate_subpixel_row(map: &ImageF32) -> f32 {
    if map.height == 0 || map.width == 0 {
        return 0.0;
    }
    let inv_w = 1.0 / map.width as f32;
    let profile: Vec<f32> = (0..map.height)
        .map(|y| (0..map.width).map(|x| map.get(x, y)).sum::<f32>() * inv_w)
        .collect();
    let smoothed = gaussian_smooth_1d(&profile, 1.0);
    refine_peak(&smoothed)
}

fn refine_peak(profile: &[f32]) -> f32 {
    let mut peak = 0usize;
    for (i, &v) in profile.iter().enumerate() {
        if v > profile[peak] {
            peak = i;
        }
    }
    if peak == 0 || peak == profile.len() - 1 {
        return peak as f32;
    }
    let y1 = profile[peak - 1];
    let y2 = profile[peak];
    let y3 = profile[peak + 1];
    let offset = 0.5 * (y1 - y3) / (y1 - 2.0 * y2 + y3 + PARABOLA_EPS);
    peak as f32 + offset
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn map_from_profile(profile: &[f32], width: usize) -> ImageF32 {
        let mut map = ImageF32::new(width, profile.len());
        for (y, &v) in profile.iter().enumerate() {
            for x in 0..width {
                map.set(x, y, v);
            }
        }
        map
    }

    fn gaussian_bump(len: usize, center: f32, width: f32) -> Vec<f32> {
        (0..len)
            .map(|i| {
                let d = i as f32 - center;
                (-d * d / (2.0 * width * width)).exp()
            })
            .collect()
    }

    #[test]
    fn symmetric_bump_at_50_localizes_within_a_tenth() {
        let profile = gaussian_bump(100, 50.0, 5.0);
        let map = map_from_profile(&profile, 20);
        let row = locate_subpixel_row(&map);
        assert!((row - 50.0).abs() < 0.1, "row = {row}");
    }

    #[test]
    fn off_grid_bump_is_resolved_between_samples() {
        let profile = gaussian_bump(100, 42.3, 4.0);
        let map = map_from_profile(&profile, 8);
        let row = locate_subpixel_row(&map);
        assert!((row - 42.3).abs() < 0.1, "row = {row}");
    }

    #[test]
    fn interior_peak_refinement_stays_within_half_a_sample() {
        // Asymmetric neighbors push the estimate off-center but never by
        // more than half a sample.
        let profile = [0.0, 0.2, 1.0, 0.6, 0.1];
        let row = refine_peak(&profile);
        assert!(row >= 1.5 && row <= 2.5, "row = {row}");
    }

    #[test]
    fn peak_at_first_row_returns_zero_exactly() {
        let mut profile = vec![0.0f32; 40];
        profile[0] = 1.0;
        // feed refine_peak directly: smoothing would move mass but the
        // boundary contract is about the argmax position
        assert_relative_eq!(refine_peak(&profile), 0.0);
    }

    #[test]
    fn peak_at_last_row_returns_last_index_exactly() {
        let mut profile = vec![0.0f32; 40];
        profile[39] = 1.0;
        assert_relative_eq!(refine_peak(&profile), 39.0);
    }

    #[test]
    fn boundary_peak_through_full_locate_path() {
        // Monotonically increasing map: the smoothed profile still peaks at
        // the final row, which must be returned un-interpolated.
        let profile: Vec<f32> = (0..30).map(|i| i as f32).collect();
        let map = map_from_profile(&profile, 10);
        assert_relative_eq!(locate_subpixel_row(&map), 29.0);
    }

    #[test]
    fn near_flat_triple_is_stable() {
        let profile = [0.49, 0.5, 0.49];
        let row = refine_peak(&profile);
        assert!(row.is_finite());
        assert_relative_eq!(row, 1.0, epsilon = 1e-4);
    }

    #[test]
    fn smoothing_preserves_constant_signals() {
        let signal = vec![0.3f32; 17];
        let smoothed = gaussian_smooth_1d(&signal, 1.0);
        for &v in &smoothed {
            assert_relative_eq!(v, 0.3, epsilon = 1e-5);
        }
    }
}
