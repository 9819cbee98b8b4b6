pub mod attendance;
pub mod calendar;
pub mod leave;
pub mod payroll;

/// Currency rounding to two decimals.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
