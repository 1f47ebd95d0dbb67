//! Per-axis calibration.
//!
//! Pure functions that turn raw samples into normalized values using the ranges
//! a device declared at attach time. Nothing here holds mutable state; the
//! catalog keeps the last applied value per axis and asks
//! [`AxisCalibration::should_apply`] whether a new one is worth publishing.

use crate::device::AxisDescriptor;

/// Map a raw axis sample into `[-1, 1]`.
///
/// Samples with `|raw| <= flat` are treated as centered and return exactly `0.0`.
/// A `flat` of zero disables the deadzone, so unsigned ranges still reach `-1`
/// at their minimum. A degenerate range (`max <= min`) always yields `0.0`.
pub fn normalize_axis(raw: i32, min: i32, max: i32, flat: i32) -> f32 {
    if flat > 0 && (raw as i64).abs() <= flat as i64 {
        return 0.0;
    }
    if max <= min {
        return 0.0;
    }
    let range = max as f64 - min as f64;
    let norm = (raw as f64 - min as f64) / range;
    (2.0 * norm - 1.0).clamp(-1.0, 1.0) as f32
}

/// Smallest normalized change that counts as real movement.
///
/// Derived from the manufacturer-declared fuzz so that jitter under the noise
/// floor never reaches the aggregated state.
pub fn axis_change_threshold(fuzz: i32, min: i32, max: i32) -> f32 {
    if max <= min {
        return 0.0;
    }
    (2.0 * fuzz.max(0) as f64 / (max as f64 - min as f64)) as f32
}

/// Raw button sample to pressed/released.
#[inline]
pub fn button_state(raw: i32) -> bool {
    raw > 0
}

/// Calibration parameters for one axis, captured at attach time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisCalibration {
    pub min: i32,
    pub max: i32,
    pub flat: i32,
    /// Debounce threshold in normalized units.
    pub eps: f32,
}

impl AxisCalibration {
    pub fn new(min: i32, max: i32, fuzz: i32, flat: i32) -> Self {
        Self {
            min,
            max,
            flat,
            eps: axis_change_threshold(fuzz, min, max),
        }
    }

    pub fn normalize(&self, raw: i32) -> f32 {
        normalize_axis(raw, self.min, self.max, self.flat)
    }

    /// `true` if `next` differs from the last applied value by more than `eps`.
    pub fn should_apply(&self, last: f32, next: f32) -> bool {
        next > last + self.eps || next < last - self.eps
    }
}

impl From<&AxisDescriptor> for AxisCalibration {
    fn from(d: &AxisDescriptor) -> Self {
        AxisCalibration::new(d.min, d.max, d.fuzz, d.flat)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const MIN: i32 = -32768;
    const MAX: i32 = 32767;
    const FLAT: i32 = 4000;
    const FUZZ: i32 = 256;

    #[test]
    fn example_calibration() {
        assert_eq!(normalize_axis(0, MIN, MAX, FLAT), 0.0);
        assert!((normalize_axis(MAX, MIN, MAX, FLAT) - 1.0).abs() < 1e-6);
        assert!((normalize_axis(MIN, MIN, MAX, FLAT) + 1.0).abs() < 1e-6);
        let eps = axis_change_threshold(FUZZ, MIN, MAX);
        assert!((eps - 0.0078).abs() < 1e-4);
    }

    #[test]
    fn endpoints_are_exact() {
        assert_eq!(normalize_axis(0, 0, 255, 0), -1.0);
        assert_eq!(normalize_axis(255, 0, 255, 0), 1.0);
        assert_eq!(normalize_axis(MIN, MIN, MAX, 0), -1.0);
        assert_eq!(normalize_axis(MAX, MIN, MAX, 0), 1.0);
    }

    #[test]
    fn out_of_range_is_clamped() {
        assert_eq!(normalize_axis(400, 0, 255, 0), 1.0);
        assert_eq!(normalize_axis(-10, 0, 255, 0), -1.0);
    }

    #[test]
    fn degenerate_range_is_centered() {
        assert_eq!(normalize_axis(5, 10, 10, 0), 0.0);
        assert_eq!(axis_change_threshold(3, 10, 10), 0.0);
    }

    #[test]
    fn buttons() {
        assert!(button_state(1));
        assert!(button_state(255));
        assert!(!button_state(0));
        assert!(!button_state(-1));
    }

    #[test]
    fn debounce_uses_fuzz() {
        let cal = AxisCalibration::new(MIN, MAX, FUZZ, 0);
        assert!(!cal.should_apply(0.5, 0.5 + cal.eps * 0.5));
        assert!(!cal.should_apply(0.5, 0.5 + cal.eps));
        assert!(cal.should_apply(0.5, 0.5 + cal.eps * 2.0));
        assert!(cal.should_apply(0.5, 0.5 - cal.eps * 2.0));
    }

    #[test]
    fn zero_fuzz_applies_any_change() {
        let cal = AxisCalibration::new(0, 255, 0, 0);
        assert!(cal.should_apply(0.0, cal.normalize(128)));
        assert!(!cal.should_apply(0.25, 0.25));
    }

    proptest! {
        #[test]
        fn normalized_in_unit_range(v in MIN..=MAX, flat in 0..8000i32) {
            let n = normalize_axis(v, MIN, MAX, flat);
            prop_assert!((-1.0..=1.0).contains(&n));
        }

        #[test]
        fn inside_flat_is_zero(flat in 1..16000i32, frac in -1.0f64..=1.0) {
            let v = (flat as f64 * frac) as i32;
            prop_assert_eq!(normalize_axis(v, MIN, MAX, flat), 0.0);
        }

        #[test]
        fn arbitrary_ranges_stay_bounded(min in -100_000..0i32, span in 1..200_000i32, raw in any::<i32>()) {
            let max = min + span;
            let n = normalize_axis(raw, min, max, 0);
            prop_assert!((-1.0..=1.0).contains(&n));
        }
    }
}
