// Area → individual weight model.
// Log-linear fit from an offline calibration; the constants are frozen.

/// Slope of ln(weight_g) on ln(area_px²).
pub const SLOPE: f64 = 1.496995;
/// Intercept of ln(weight_g) on ln(area_px²).
pub const INTERCEPT: f64 = -8.178205;

/// Estimated specimen weight in grams for a pixel area.
///
/// Returns `None` outside the model's domain (`area <= 0`, NaN, infinite).
pub fn estimate_weight(area: f64) -> Option<f64> {
    if !area.is_finite() || area <= 0.0 {
        return None;
    }
    Some((area.ln() * SLOPE + INTERCEPT).exp())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_area_is_exp_intercept() {
        assert_eq!(estimate_weight(1.0), Some(INTERCEPT.exp()));
    }

    #[test]
    fn domain() {
        assert_eq!(estimate_weight(0.0), None);
        assert_eq!(estimate_weight(-5.0), None);
        assert_eq!(estimate_weight(f64::NAN), None);
        assert_eq!(estimate_weight(f64::INFINITY), None);
    }

    #[test]
    fn typical_specimen() {
        // ~1000 px² is a mid-size specimen in 640x640 auction frames
        let w = estimate_weight(1000.0).unwrap();
        let expected = (1000f64.ln() * 1.496995 - 8.178205).exp();
        assert!((w - expected).abs() < 1e-12);
        assert!(w > 8.0 && w < 9.0, "got {w}");
    }

    #[test]
    fn monotonic() {
        let mut prev = 0.0;
        for area in [0.5, 1.0, 10.0, 100.0, 500.0, 600.0, 5000.0] {
            let w = estimate_weight(area).unwrap();
            assert!(w > prev);
            prev = w;
        }
    }
}
