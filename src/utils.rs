use std::f64::consts::PI;

/// Converts meters to the device's millimeters, truncating toward zero.
#[inline]
pub fn meters_to_millimeters(meters: f64) -> i32 {
    (meters * 1000.0) as i32
}

/// Converts radians to the device's millidegrees, truncating toward zero.
///
/// # Arguments
///
/// * `radians` - Heading in radians. Not normalized; the device accepts negative values.
#[inline]
pub fn radians_to_millidegrees(radians: f64) -> i32 {
    (radians / PI * 180.0 * 1000.0) as i32
}
