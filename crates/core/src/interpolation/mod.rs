pub use interpolator::{barycentric, Interpolator};
pub use triangulation::Triangulation;

mod interpolator;
mod triangulation;

/// Converts an interpolated value back to a 16-bit device value, truncating toward zero.
///
/// Values outside the 16-bit range saturate.
pub fn to_device_units(value: f64) -> u16 {
    value as u16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_device_units_truncates() {
        assert_eq!(to_device_units(50.9), 50);
        assert_eq!(to_device_units(65535.99), 65535);
        assert_eq!(to_device_units(0.2), 0);
        assert_eq!(to_device_units(70000.0), 65535);
    }
}
