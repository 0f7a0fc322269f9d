//! Raw/cooked unit conversion.
//!
//! Hardware controllers report position in their native ("raw") units:
//! encoder counts, controller-native hundredths of a millimetre, and so
//! on. User-facing ("cooked") values are derived through a per-axis
//! scale and zero-point offset:
//!
//! ```text
//! cooked = (raw - offset_raw) / scale
//! raw    = scale * cooked + offset_raw
//! ```
//!
//! `scale` is sign-significant (a negative scale flips the travel
//! direction) and must never reach zero, or the conversion law divides
//! by zero. Magnitudes below [`MIN_SCALE_MAGNITUDE`] are clamped to it,
//! preserving sign.

/// Smallest allowed magnitude for a conversion scale.
pub const MIN_SCALE_MAGNITUDE: f64 = 1e-9;

/// Clamp a scale magnitude away from zero, preserving sign.
pub fn clamp_scale(scale: f64) -> f64 {
    if scale.abs() >= MIN_SCALE_MAGNITUDE {
        scale
    } else if scale.is_sign_negative() {
        -MIN_SCALE_MAGNITUDE
    } else {
        MIN_SCALE_MAGNITUDE
    }
}

/// A raw/cooked conversion pair for one encoder.
///
/// The primary position and the auxiliary encoder each carry their own
/// independent `Calibration`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Calibration {
    /// Raw units per cooked unit. Non-zero, sign-significant.
    pub scale: f64,
    /// Raw-unit zero point.
    pub offset_raw: f64,
}

impl Calibration {
    /// Create a calibration, clamping the scale away from zero.
    pub fn new(scale: f64, offset_raw: f64) -> Self {
        Self {
            scale: clamp_scale(scale),
            offset_raw,
        }
    }

    /// Convert a raw-unit position to cooked units.
    pub fn to_cooked(&self, raw: f64) -> f64 {
        (raw - self.offset_raw) / self.scale
    }

    /// Convert a cooked-unit position to raw units.
    pub fn to_raw(&self, cooked: f64) -> f64 {
        self.scale * cooked + self.offset_raw
    }

    /// Replace the scale, clamping it away from zero.
    pub fn set_scale(&mut self, scale: f64) {
        self.scale = clamp_scale(scale);
    }
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            scale: 1.0,
            offset_raw: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_is_exact() {
        let cases = [
            (100.0, 0.0),
            (-250.5, 17.25),
            (0.001, -12345.0),
            (1e6, 3.0),
        ];
        for (scale, offset) in cases {
            let cal = Calibration::new(scale, offset);
            for raw in [-15000.0, -1.0, 0.0, 0.5, 15000.0] {
                let back = cal.to_raw(cal.to_cooked(raw));
                assert!(
                    (back - raw).abs() <= raw.abs().max(1.0) * f64::EPSILON * 4.0,
                    "round trip failed for scale={scale} offset={offset} raw={raw}: got {back}"
                );
            }
        }
    }

    #[test]
    fn test_known_conversion() {
        let cal = Calibration::new(100.0, 0.0);
        assert_eq!(cal.to_raw(150.0), 15000.0);
        assert_eq!(cal.to_cooked(15000.0), 150.0);

        let cal = Calibration::new(2.0, 500.0);
        assert_eq!(cal.to_raw(10.0), 520.0);
        assert_eq!(cal.to_cooked(520.0), 10.0);
    }

    #[test]
    fn test_tiny_scale_clamps_preserving_sign() {
        assert_eq!(clamp_scale(1e-12), MIN_SCALE_MAGNITUDE);
        assert_eq!(clamp_scale(-1e-12), -MIN_SCALE_MAGNITUDE);
        assert_eq!(clamp_scale(0.0), MIN_SCALE_MAGNITUDE);
        assert_eq!(clamp_scale(-0.0), -MIN_SCALE_MAGNITUDE);
        // Values at or above the floor are untouched.
        assert_eq!(clamp_scale(1e-9), 1e-9);
        assert_eq!(clamp_scale(-3.5), -3.5);
    }

    #[test]
    fn test_clamped_scale_keeps_conversion_finite() {
        let cal = Calibration::new(0.0, 10.0);
        let cooked = cal.to_cooked(25.0);
        assert!(cooked.is_finite());
        assert!(cal.to_raw(cooked).is_finite());
    }
}
