//! Lightweight float image container and resampling helpers.

/// Guard added to min-max denominators so constant inputs map to zero
/// instead of NaN.
pub(crate) const NORM_EPS: f32 = 1e-8;

/// Borrowed view over packed 8-bit RGB pixels (3 bytes per pixel, row-major).
#[derive(Clone, Copy, Debug)]
pub struct RgbView<'a> {
    pub width: usize,
    pub height: usize,
    pub data: &'a [u8], // len = 3*w*h
}

impl<'a> RgbView<'a> {
    #[inline]
    pub fn pixel(&self, x: usize, y: usize) -> [u8; 3] {
        let i = (y * self.width + x) * 3;
        [self.data[i], self.data[i + 1], self.data[i + 2]]
    }
}

/// Single-channel float image, row-major, `stride == width`.
#[derive(Clone, Debug, PartialEq)]
pub struct ImageF32 {
    pub width: usize,
    pub height: usize,
    pub data: Vec<f32>,
}

impl ImageF32 {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0.0; width * height],
        }
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> f32 {
        self.data[y * self.width + x]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, v: f32) {
        self.data[y * self.width + x] = v;
    }

    /// Min-max normalize in place: constant images become all-zero, the
    /// epsilon keeps the denominator finite.
    pub fn normalize_min_max(&mut self) {
        normalize_min_max(&mut self.data);
    }

    /// Replace every non-finite sample with zero.
    pub fn zero_non_finite(&mut self) {
        for v in &mut self.data {
            if !v.is_finite() {
                *v = 0.0;
            }
        }
    }
}

pub(crate) fn normalize_min_max(data: &mut [f32]) {
    let mut min = f32::INFINITY;
    let mut max = f32::NEG_INFINITY;
    for &v in data.iter() {
        min = min.min(v);
        max = max.max(v);
    }
    if !min.is_finite() || !max.is_finite() {
        data.fill(0.0);
        return;
    }
    let inv = 1.0 / (max - min + NORM_EPS);
    for v in data.iter_mut() {
        *v = (*v - min) * inv;
    }
}

/// Area-average downsampling. Each destination pixel is the mean of the
/// source block it covers; block edges are rounded to whole pixels.
pub(crate) fn downsample_area(src: &ImageF32, new_w: usize, new_h: usize) -> ImageF32 {
    let mut out = ImageF32::new(new_w, new_h);
    let sx = src.width as f32 / new_w as f32;
    let sy = src.height as f32 / new_h as f32;
    for y in 0..new_h {
        let y0 = (y as f32 * sy) as usize;
        let y1 = (((y + 1) as f32 * sy).ceil() as usize).min(src.height).max(y0 + 1);
        for x in 0..new_w {
            let x0 = (x as f32 * sx) as usize;
            let x1 = (((x + 1) as f32 * sx).ceil() as usize).min(src.width).max(x0 + 1);
            let mut acc = 0.0f32;
            for sy_i in y0..y1 {
                for sx_i in x0..x1 {
                    acc += src.get(sx_i, sy_i);
                }
            }
            out.set(x, y, acc / ((y1 - y0) * (x1 - x0)) as f32);
        }
    }
    out
}

#[inline]
fn get_clamped(src: &ImageF32, x: i64, y: i64) -> f32 {
    let xc = x.clamp(0, src.width as i64 - 1) as usize;
    let yc = y.clamp(0, src.height as i64 - 1) as usize;
    src.get(xc, yc)
}

/// Center-aligned bilinear sample with clamped borders.
#[inline]
pub(crate) fn sample_bilinear(src: &ImageF32, x: f32, y: f32) -> f32 {
    let x0 = x.floor() as i64;
    let y0 = y.floor() as i64;
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let p00 = get_clamped(src, x0, y0);
    let p10 = get_clamped(src, x0 + 1, y0);
    let p01 = get_clamped(src, x0, y0 + 1);
    let p11 = get_clamped(src, x0 + 1, y0 + 1);

    let a = p00 + fx * (p10 - p00);
    let b = p01 + fx * (p11 - p01);
    a + fy * (b - a)
}

/// Bilinear resize, used to bring a reduced-resolution map back to the
/// original frame size.
pub(crate) fn resize_bilinear(src: &ImageF32, new_w: usize, new_h: usize) -> ImageF32 {
    let mut out = ImageF32::new(new_w, new_h);
    let sx = src.width as f32 / new_w as f32;
    let sy = src.height as f32 / new_h as f32;
    for y in 0..new_h {
        let src_y = (y as f32 + 0.5) * sy - 0.5;
        for x in 0..new_w {
            let src_x = (x as f32 + 0.5) * sx - 0.5;
            out.set(x, y, sample_bilinear(src, src_x, src_y));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn ramp(width: usize, height: usize) -> ImageF32 {
        let mut img = ImageF32::new(width, height);
        for y in 0..height {
            for x in 0..width {
                img.set(x, y, (y * width + x) as f32);
            }
        }
        img
    }

    #[test]
    fn normalize_maps_to_unit_range() {
        let mut img = ramp(4, 3);
        img.normalize_min_max();
        let min = img.data.iter().cloned().fold(f32::INFINITY, f32::min);
        let max = img.data.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
        assert!(min >= 0.0 && max <= 1.0);
        assert_relative_eq!(min, 0.0);
        assert!(max > 0.99);
    }

    #[test]
    fn normalize_constant_image_is_all_zero() {
        let mut img = ImageF32::new(5, 5);
        img.data.fill(0.7);
        img.normalize_min_max();
        assert!(img.data.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn downsample_preserves_constant_value() {
        let mut img = ImageF32::new(10, 10);
        img.data.fill(0.25);
        let down = downsample_area(&img, 3, 3);
        assert_eq!(down.width, 3);
        assert_eq!(down.height, 3);
        for &v in &down.data {
            assert_relative_eq!(v, 0.25, epsilon = 1e-6);
        }
    }

    #[test]
    fn downsample_averages_blocks() {
        // 2x2 blocks of a 4x4 checker collapse to their mean.
        let mut img = ImageF32::new(4, 4);
        for y in 0..4 {
            for x in 0..4 {
                img.set(x, y, ((x + y) % 2) as f32);
            }
        }
        let down = downsample_area(&img, 2, 2);
        for &v in &down.data {
            assert_relative_eq!(v, 0.5, epsilon = 1e-6);
        }
    }

    #[test]
    fn bilinear_resize_round_trips_constant() {
        let mut img = ImageF32::new(7, 5);
        img.data.fill(0.6);
        let up = resize_bilinear(&img, 21, 15);
        assert_eq!(up.width, 21);
        for &v in &up.data {
            assert_relative_eq!(v, 0.6, epsilon = 1e-6);
        }
    }

    #[test]
    fn rgb_view_indexes_packed_pixels() {
        let data = [1u8, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12];
        let view = RgbView {
            width: 2,
            height: 2,
            data: &data,
        };
        assert_eq!(view.pixel(0, 0), [1, 2, 3]);
        assert_eq!(view.pixel(1, 1), [10, 11, 12]);
    }
}
