use crate::document::Rgb;

/// HSV (all in [0, 1]) to RGB, same sector arithmetic as Python's `colorsys`
pub fn hsv_to_rgb(h: f64, s: f64, v: f64) -> Rgb {
    if s <= 0.0 {
        return Rgb { r: v, g: v, b: v };
    }
    let h6 = (h.rem_euclid(1.0)) * 6.0;
    let sector = h6.floor();
    let f = h6 - sector;
    let p = v * (1.0 - s);
    let q = v * (1.0 - s * f);
    let t = v * (1.0 - s * (1.0 - f));

    let (r, g, b) = match sector as u32 % 6 {
        0 => (v, t, p),
        1 => (q, v, p),
        2 => (p, v, t),
        3 => (p, q, v),
        4 => (t, p, v),
        _ => (v, p, q),
    };
    Rgb { r, g, b }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: Rgb, b: (f64, f64, f64)) -> bool {
        (a.r - b.0).abs() < 1e-9 && (a.g - b.1).abs() < 1e-9 && (a.b - b.2).abs() < 1e-9
    }

    #[test]
    fn test_primary_hues() {
        assert!(close(hsv_to_rgb(0.0, 1.0, 1.0), (1.0, 0.0, 0.0)));
        assert!(close(hsv_to_rgb(1.0 / 3.0, 1.0, 1.0), (0.0, 1.0, 0.0)));
        assert!(close(hsv_to_rgb(2.0 / 3.0, 1.0, 1.0), (0.0, 0.0, 1.0)));
    }

    #[test]
    fn test_hue_one_wraps_to_red() {
        assert!(close(hsv_to_rgb(1.0, 1.0, 0.5), (0.5, 0.0, 0.0)));
    }

    #[test]
    fn test_zero_saturation_is_grey() {
        assert!(close(hsv_to_rgb(0.42, 0.0, 0.7), (0.7, 0.7, 0.7)));
    }
}
