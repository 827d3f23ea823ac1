//! sRGB to CIE L*a*b* conversion on float image planes.
//!
//! D65 white point, standard sRGB linearization. The detector only needs a
//! perceptually uniform space for feature distances, so no chromatic
//! adaptation beyond D65 is performed.

use crate::image::ImageF32;

const XN: f32 = 0.950_47;
const YN: f32 = 1.0;
const ZN: f32 = 1.088_83;

#[inline]
fn srgb_to_linear(c: f32) -> f32 {
    if c <= 0.040_45 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

#[inline]
fn lab_f(t: f32) -> f32 {
    // delta = 6/29
    const DELTA3: f32 = 0.008_856_452; // (6/29)^3
    const SLOPE: f32 = 7.787_037; // 1 / (3 * (6/29)^2)
    if t > DELTA3 {
        t.cbrt()
    } else {
        SLOPE * t + 4.0 / 29.0
    }
}

/// Convert [r, g, b] planes with values in [0, 1] into [L*, a*, b*] planes.
///
/// Output ranges are the usual L* in [0, 100], a*/b* roughly [-128, 127];
/// callers normalize per channel afterwards.
pub(crate) fn rgb_planes_to_lab(rgb: &[ImageF32; 3]) -> [ImageF32; 3] {
    let (w, h) = (rgb[0].width, rgb[0].height);
    let mut l_plane = ImageF32::new(w, h);
    let mut a_plane = ImageF32::new(w, h);
    let mut b_plane = ImageF32::new(w, h);

    for i in 0..w * h {
        let r = srgb_to_linear(rgb[0].data[i]);
        let g = srgb_to_linear(rgb[1].data[i]);
        let b = srgb_to_linear(rgb[2].data[i]);

        let x = 0.412_456_4 * r + 0.357_576_1 * g + 0.180_437_5 * b;
        let y = 0.212_672_9 * r + 0.715_152_2 * g + 0.072_175_0 * b;
        let z = 0.019_333_9 * r + 0.119_192_0 * g + 0.950_304_1 * b;

        let fx = lab_f(x / XN);
        let fy = lab_f(y / YN);
        let fz = lab_f(z / ZN);

        l_plane.data[i] = 116.0 * fy - 16.0;
        a_plane.data[i] = 500.0 * (fx - fy);
        b_plane.data[i] = 200.0 * (fy - fz);
    }

    [l_plane, a_plane, b_plane]
}
