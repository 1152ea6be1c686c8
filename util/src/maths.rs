//! Utility maths functions
//!
//! Provides the geometric helpers used by the guidance modules: polar to
//! cartesian conversions, azimuth/elevation angles between points, the
//! histogram angle/index mappings, yaw calculations and a rate limited
//! speed ramp.
//!
//! Angle conventions follow the polar histogram: azimuth is measured in
//! degrees from the positive Y axis in (-180, 180], elevation in degrees
//! from the horizontal plane in (-90, 90). Yaw is measured in radians from
//! the positive X axis, as returned by `atan2`.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use nalgebra::Vector3;
use num_traits::Float;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A direction given as a pair of histogram angles plus a radius.
#[derive(Debug, Default, Copy, Clone)]
pub struct PolarPoint {
    /// Elevation angle in degrees
    pub e_deg: f64,

    /// Azimuth angle in degrees
    pub z_deg: f64,

    /// Radius in meters
    pub radius_m: f64,
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Convert a polar point into a cartesian point relative to the given
/// origin.
pub fn polar_to_cartesian(p_pol: &PolarPoint, origin: &Vector3<f64>) -> Vector3<f64> {
    let e_rad = p_pol.e_deg.to_radians();
    let z_rad = p_pol.z_deg.to_radians();

    Vector3::new(
        origin.x + p_pol.radius_m * e_rad.cos() * z_rad.sin(),
        origin.y + p_pol.radius_m * e_rad.cos() * z_rad.cos(),
        origin.z + p_pol.radius_m * e_rad.sin(),
    )
}

/// Decompose a cartesian point into polar angles and radius relative to the
/// given origin.
pub fn cartesian_to_polar(pos: &Vector3<f64>, origin: &Vector3<f64>) -> PolarPoint {
    PolarPoint {
        e_deg: elevation_from_cartesian(pos, origin),
        z_deg: azimuth_from_cartesian(pos, origin),
        radius_m: (pos - origin).norm(),
    }
}

/// Compute the azimuth angle of a position relative to an origin.
///
/// The angle is given in degrees from the positive Y axis in (-180, 180].
///
/// # Notes
/// - If the origin and the position coincide the output is 0 degrees.
pub fn azimuth_from_cartesian(pos: &Vector3<f64>, origin: &Vector3<f64>) -> f64 {
    (pos.x - origin.x).atan2(pos.y - origin.y).to_degrees()
}

/// Compute the elevation angle of a position relative to an origin.
///
/// The angle is given in degrees from the horizontal plane in (-90, 90).
pub fn elevation_from_cartesian(pos: &Vector3<f64>, origin: &Vector3<f64>) -> f64 {
    let dx = pos.x - origin.x;
    let dy = pos.y - origin.y;
    let dz = pos.z - origin.z;

    dz.atan2(dx.hypot(dy)).to_degrees()
}

/// Map an azimuth angle in degrees to a histogram cell index at the given
/// angular resolution.
///
/// The full azimuth range (-180, 180] maps onto `360 / res_deg` cells,
/// index 0 starting at -180 degrees.
pub fn azimuth_to_index(z_deg: f64, res_deg: usize) -> usize {
    // 180 and -180 degrees are the same direction and share cell 0
    let z_deg = if z_deg >= 180.0 { z_deg - 360.0 } else { z_deg };

    let num_cells = 360 / res_deg;
    let index = ((z_deg + 180.0) / res_deg as f64).floor() as isize;

    index.max(0).min(num_cells as isize - 1) as usize
}

/// Map an elevation angle in degrees to a histogram cell index at the given
/// angular resolution.
pub fn elevation_to_index(e_deg: f64, res_deg: usize) -> usize {
    let num_cells = 180 / res_deg;
    let index = ((e_deg + 90.0) / res_deg as f64).floor() as isize;

    index.max(0).min(num_cells as isize - 1) as usize
}

/// Get the azimuth angle in degrees of the centre of a histogram cell.
pub fn index_to_azimuth(index: usize, res_deg: usize) -> f64 {
    (index * res_deg) as f64 - 180.0 + res_deg as f64 / 2.0
}

/// Compute the yaw angle in radians required to face the target from the
/// given position.
pub fn next_yaw(position: &Vector3<f64>, target: &Vector3<f64>) -> f64 {
    (target.y - position.y).atan2(target.x - position.x)
}

/// Ramp a speed towards a target at a limited rate.
///
/// The returned speed is `v_old` increased by `slope * elapsed_s`, capped
/// at `target`. Note that the ramp never reduces the speed, reductions are
/// applied by clamping before the ramp.
pub fn velocity_linear(target: f64, slope: f64, v_old: f64, elapsed_s: f64) -> f64 {
    let v_new = v_old + slope * elapsed_s;

    if v_new > target {
        target
    }
    else {
        v_new
    }
}

/// Wrap the input angle into the (-pi, pi] range.
pub fn wrap_angle_to_plus_minus_pi(angle_rad: f64) -> f64 {
    use std::f64::consts::{PI, TAU};

    let wrapped = rem_euclid(angle_rad + PI, TAU) - PI;

    // rem_euclid maps both pi and -pi onto -pi, the range is (-pi, pi]
    if wrapped == -PI {
        PI
    }
    else {
        wrapped
    }
}

/// Compute an angular velocity to steer the current yaw towards the
/// desired yaw.
///
/// The returned rate is proportional to the shortest signed angular
/// difference between the two yaws, bounded to avoid commanding violent
/// rotations.
pub fn angular_velocity(desired_yaw_rad: f64, curr_yaw_rad: f64) -> f64 {
    /// Proportional gain on the yaw error
    const YAW_ERROR_GAIN: f64 = 0.5;

    /// Maximum magnitude of the commanded yaw rate
    ///
    /// Units: radians/second
    const MAX_YAW_RATE_RADS: f64 = std::f64::consts::FRAC_PI_4;

    let yaw_error_rad = wrap_angle_to_plus_minus_pi(
        wrap_angle_to_plus_minus_pi(desired_yaw_rad) - curr_yaw_rad,
    );

    clamp(
        &(YAW_ERROR_GAIN * yaw_error_rad),
        &-MAX_YAW_RATE_RADS,
        &MAX_YAW_RATE_RADS,
    )
}

/// Get the unsigned angular distance between two angles in degrees,
/// accounting for wrapping at +/-180.
pub fn angle_difference_deg(a_deg: f64, b_deg: f64) -> f64 {
    let diff = rem_euclid(a_deg - b_deg, 360.0);

    if diff > 180.0 {
        360.0 - diff
    }
    else {
        diff
    }
}

pub fn clamp<T>(value: &T, min: &T, max: &T) -> T
where
    T: Float + std::ops::Mul + std::ops::Add + std::ops::AddAssign
{
    let mut ret = *value;

    if ret > *max {
        ret = *max
    }
    if ret < *min {
        ret = *min
    }

    ret
}

/// Calculates the least nonnegative remainder of `lhs (mod rhs)`.
///
/// This function is taken from the std library as num is missing it.
pub fn rem_euclid<T>(lhs: T, rhs: T) -> T
where
    T: Float + std::ops::Mul + std::ops::Add + std::ops::Sub + std::ops::Rem
{
    let r = lhs % rhs;
    if r < T::from(0.0).unwrap() { r + rhs.abs() } else { r }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn test_wrap_angle() {
        assert!((wrap_angle_to_plus_minus_pi(0.0)).abs() < 1e-10);
        assert!((wrap_angle_to_plus_minus_pi(PI) - PI).abs() < 1e-10);
        assert!((wrap_angle_to_plus_minus_pi(-PI) - PI).abs() < 1e-10);
        assert!((wrap_angle_to_plus_minus_pi(1.5 * PI) + 0.5 * PI).abs() < 1e-10);
        assert!((wrap_angle_to_plus_minus_pi(-2.5 * PI) + 0.5 * PI).abs() < 1e-10);
    }

    #[test]
    fn test_azimuth_convention() {
        let origin = Vector3::zeros();

        // Positive Y axis is 0 degrees azimuth
        assert!(
            azimuth_from_cartesian(&Vector3::new(0.0, 1.0, 0.0), &origin).abs() < 1e-10
        );

        // Positive X axis is +90 degrees
        assert!(
            (azimuth_from_cartesian(&Vector3::new(1.0, 0.0, 0.0), &origin) - 90.0).abs()
                < 1e-10
        );

        // Coincident points give 0
        assert!(azimuth_from_cartesian(&origin, &origin).abs() < 1e-10);
    }

    #[test]
    fn test_polar_cartesian_consistency() {
        let origin = Vector3::new(1.0, -2.0, 3.0);
        let point = Vector3::new(4.0, 0.5, 2.0);

        let polar = cartesian_to_polar(&point, &origin);
        let back = polar_to_cartesian(&polar, &origin);

        assert!((back - point).norm() < 1e-9);
    }

    #[test]
    fn test_azimuth_index_mapping() {
        // 6 degree cells, 60 cells over the full range
        assert_eq!(azimuth_to_index(-180.0, 6), 0);
        assert_eq!(azimuth_to_index(-177.0, 6), 0);
        assert_eq!(azimuth_to_index(0.0, 6), 30);
        assert_eq!(azimuth_to_index(179.9, 6), 59);

        // 180 wraps onto the -180 cell
        assert_eq!(azimuth_to_index(180.0, 6), 0);

        // Cell centres map back to their own cell
        for i in 0..60 {
            assert_eq!(azimuth_to_index(index_to_azimuth(i, 6), 6), i);
        }
    }

    #[test]
    fn test_elevation_index_mapping() {
        assert_eq!(elevation_to_index(-90.0, 6), 0);
        assert_eq!(elevation_to_index(0.0, 6), 15);
        assert_eq!(elevation_to_index(89.9, 6), 29);
    }

    #[test]
    fn test_velocity_linear() {
        // Ramp is limited by the slope
        assert!((velocity_linear(2.0, 1.0, 0.0, 0.1) - 0.1).abs() < 1e-10);

        // Ramp saturates at the target
        assert!((velocity_linear(2.0, 1.0, 1.95, 0.1) - 2.0).abs() < 1e-10);

        // Zero elapsed time leaves the speed unchanged
        assert!((velocity_linear(2.0, 1.0, 0.5, 0.0) - 0.5).abs() < 1e-10);
    }

    #[test]
    fn test_angular_velocity() {
        // No error commands no rotation
        assert!(angular_velocity(1.0, 1.0).abs() < 1e-10);

        // Small errors are proportional
        assert!((angular_velocity(0.2, 0.0) - 0.1).abs() < 1e-10);

        // Large errors saturate at the bound
        assert!((angular_velocity(PI, 0.0)).abs() <= std::f64::consts::FRAC_PI_4 + 1e-10);
        assert!((angular_velocity(-3.0, 3.0)).abs() <= std::f64::consts::FRAC_PI_4 + 1e-10);

        // The error is taken over the wrapped shortest distance
        assert!(angular_velocity(PI - 0.1, -PI + 0.1) < 0.0);
    }

    #[test]
    fn test_angle_difference_deg() {
        assert!((angle_difference_deg(10.0, -10.0) - 20.0).abs() < 1e-10);
        assert!((angle_difference_deg(-170.0, 170.0) - 20.0).abs() < 1e-10);
        assert!((angle_difference_deg(90.0, 90.0)).abs() < 1e-10);
    }

    #[test]
    fn test_next_yaw() {
        let pos = Vector3::zeros();

        assert!((next_yaw(&pos, &Vector3::new(1.0, 0.0, 0.0))).abs() < 1e-10);
        assert!(
            (next_yaw(&pos, &Vector3::new(0.0, 1.0, 0.0)) - std::f64::consts::FRAC_PI_2)
                .abs()
                < 1e-10
        );
    }
}
