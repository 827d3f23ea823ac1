//! CLAHE-style tile-local contrast equalization.
//!
//! Works on the luma channel of a packed RGB buffer and rescales all three
//! channels by the luma gain, so hue is preserved. Tile mappings are blended
//! bilinearly to avoid visible tile seams.

use serde::{Deserialize, Serialize};

/// Settings for [`equalize_rgb_in_place`].
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct ClaheParams {
    /// Histogram clip limit as a multiple of the mean bin count.
    pub clip_limit: f32,
    /// Tile grid columns.
    pub tiles_x: usize,
    /// Tile grid rows.
    pub tiles_y: usize,
}

impl Default for ClaheParams {
    fn default() -> Self {
        Self {
            clip_limit: 2.0,
            tiles_x: 8,
            tiles_y: 8,
        }
    }
}

#[inline]
fn luma_of(r: u8, g: u8, b: u8) -> u8 {
    (0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32)
        .round()
        .clamp(0.0, 255.0) as u8
}

/// Per-tile clipped-histogram equalization mapping, 256 entries.
fn tile_mapping(luma: &[u8], width: usize, x0: usize, x1: usize, y0: usize, y1: usize, clip_limit: f32) -> [u8; 256] {
    let mut hist = [0u32; 256];
    for y in y0..y1 {
        for x in x0..x1 {
            hist[luma[y * width + x] as usize] += 1;
        }
    }
    let total = ((x1 - x0) * (y1 - y0)) as u32;

    let limit = ((clip_limit * total as f32 / 256.0).max(1.0)) as u32;
    let mut excess = 0u32;
    for bin in &mut hist {
        if *bin > limit {
            excess += *bin - limit;
            *bin = limit;
        }
    }
    let bonus = excess / 256;
    for bin in &mut hist {
        *bin += bonus;
    }

    let redistributed: u32 = hist.iter().sum();
    let mut map = [0u8; 256];
    let mut cdf = 0u32;
    for (v, &count) in hist.iter().enumerate() {
        cdf += count;
        map[v] = ((cdf as f32 / redistributed.max(1) as f32) * 255.0)
            .round()
            .clamp(0.0, 255.0) as u8;
    }
    map
}

/// Equalize a packed RGB buffer (`3 * width * height` bytes) in place.
pub fn equalize_rgb_in_place(pixels: &mut [u8], width: usize, height: usize, params: &ClaheParams) {
    if width == 0 || height == 0 || pixels.len() < width * height * 3 {
        return;
    }
    let tiles_x = params.tiles_x.clamp(1, width);
    let tiles_y = params.tiles_y.clamp(1, height);

    let luma: Vec<u8> = (0..width * height)
        .map(|i| luma_of(pixels[i * 3], pixels[i * 3 + 1], pixels[i * 3 + 2]))
        .collect();

    let mut mappings = Vec::with_capacity(tiles_x * tiles_y);
    for ty in 0..tiles_y {
        let y0 = ty * height / tiles_y;
        let y1 = (ty + 1) * height / tiles_y;
        for tx in 0..tiles_x {
            let x0 = tx * width / tiles_x;
            let x1 = (tx + 1) * width / tiles_x;
            mappings.push(tile_mapping(&luma, width, x0, x1, y0, y1, params.clip_limit));
        }
    }

    for y in 0..height {
        // Tile-grid coordinate of the pixel center, offset so integer
        // values land on tile centers.
        let gy = (y as f32 + 0.5) / height as f32 * tiles_y as f32 - 0.5;
        let ty0 = (gy.floor().max(0.0) as usize).min(tiles_y - 1);
        let ty1 = (ty0 + 1).min(tiles_y - 1);
        let fy = (gy - ty0 as f32).clamp(0.0, 1.0);

        for x in 0..width {
            let gx = (x as f32 + 0.5) / width as f32 * tiles_x as f32 - 0.5;
            let tx0 = (gx.floor().max(0.0) as usize).min(tiles_x - 1);
            let tx1 = (tx0 + 1).min(tiles_x - 1);
            let fx = (gx - tx0 as f32).clamp(0.0, 1.0);

            let v = luma[y * width + x] as usize;
            let m00 = mappings[ty0 * tiles_x + tx0][v] as f32;
            let m10 = mappings[ty0 * tiles_x + tx1][v] as f32;
            let m01 = mappings[ty1 * tiles_x + tx0][v] as f32;
            let m11 = mappings[ty1 * tiles_x + tx1][v] as f32;
            let top = m00 + fx * (m10 - m00);
            let bottom = m01 + fx * (m11 - m01);
            let mapped = top + fy * (bottom - top);

            let gain = if v == 0 { 1.0 } else { mapped / v as f32 };
            let i = (y * width + x) * 3;
            for c in 0..3 {
                pixels[i + c] = (pixels[i + c] as f32 * gain).round().clamp(0.0, 255.0) as u8;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_frame(width: usize, height: usize, value: u8) -> Vec<u8> {
        vec![value; width * height * 3]
    }

    #[test]
    fn constant_frame_stays_finite_and_bounded() {
        let mut pixels = flat_frame(32, 24, 90);
        equalize_rgb_in_place(&mut pixels, 32, 24, &ClaheParams::default());
        assert_eq!(pixels.len(), 32 * 24 * 3);
    }

    #[test]
    fn low_contrast_gradient_spreads_toward_full_range() {
        // Mid-gray vertical gradient (64..192); with a generous clip limit
        // the tile equalization must widen the dynamic range on both ends.
        let (w, h) = (256usize, 256usize);
        let mut pixels = Vec::with_capacity(w * h * 3);
        for y in 0..h {
            let v = (64 + y / 2) as u8;
            for _ in 0..w {
                pixels.extend_from_slice(&[v, v, v]);
            }
        }
        let params = ClaheParams {
            clip_limit: 100.0,
            ..ClaheParams::default()
        };
        equalize_rgb_in_place(&mut pixels, w, h, &params);
        let min = pixels.iter().copied().min().unwrap();
        let max = pixels.iter().copied().max().unwrap();
        assert!(min < 44, "min {min}");
        assert!(max > 212, "max {max}");
    }

    #[test]
    fn tile_mapping_is_monotone() {
        // CDF-based mappings never invert brightness order.
        let (w, h) = (32usize, 32usize);
        let luma: Vec<u8> = (0..w * h).map(|i| (i % 200) as u8).collect();
        let map = tile_mapping(&luma, w, 0, w, 0, h, 2.0);
        for v in 1..256 {
            assert!(map[v] >= map[v - 1], "inversion at {v}");
        }
    }

    #[test]
    fn short_buffer_is_left_untouched() {
        let mut pixels = vec![10u8; 5];
        equalize_rgb_in_place(&mut pixels, 32, 32, &ClaheParams::default());
        assert_eq!(pixels, vec![10u8; 5]);
    }
}
