//! Jerk limited waypoint smoothing calculations

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::debug;
use nalgebra::{Vector2, Vector3};

// Internal
use super::*;
use crate::wp_gen::state::VehicleState;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Jerk limits below this are considered disabled.
const JERK_LIMIT_EPSILON: f64 = 0.001;

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl WpGen {
    /// Shape the adapted target into a trajectory point with bounded
    /// horizontal jerk.
    ///
    /// Only the current and previous cycle's kinematic samples are used.
    /// The required jerk is reconstructed by finite differencing, clamped
    /// to the limit while preserving its direction, and the achievable
    /// velocity recovered by integrating forwards twice. The vertical
    /// coordinate passes through unfiltered.
    pub(crate) fn smooth_waypoint(&mut self, vehicle: &VehicleState, dt_s: f64) {
        let vel_cur_xy: Vector2<f64> = vehicle.vel_mps.xy();
        let prev_wp_m = self
            .last_position_wp
            .map(|wp| wp.position_m)
            .unwrap_or(vehicle.pose.position_m);

        let mut vel_sp_xy: Vector2<f64> =
            (self.output.adapted_goto_position_m.xy() - prev_wp_m.xy()) / dt_s;

        let accel_diff = (vel_sp_xy - vel_cur_xy) / dt_s;
        let accel_cur = (vel_cur_xy - self.last_velocity_mps) / dt_s;
        let jerk_diff = (accel_diff - accel_cur) / dt_s;

        let mut max_jerk = self.params.max_jerk_limit;

        // Velocity dependent jerk limit: slow manoeuvres keep control
        // authority, fast motion is proportionally more constrained
        if self.params.min_jerk_limit > JERK_LIMIT_EPSILON {
            max_jerk *= vel_cur_xy.norm();
            if max_jerk < self.params.min_jerk_limit {
                max_jerk = self.params.min_jerk_limit;
            }
        }

        if jerk_diff.norm_squared() > max_jerk * max_jerk && max_jerk > JERK_LIMIT_EPSILON {
            let jerk_clamped = max_jerk * jerk_diff.normalize();
            vel_sp_xy = (jerk_clamped * dt_s + accel_cur) * dt_s + vel_cur_xy;
        }

        self.output.smoothed_goto_position_m = Vector3::new(
            prev_wp_m.x + vel_sp_xy.x * dt_s,
            prev_wp_m.y + vel_sp_xy.y * dt_s,
            self.output.adapted_goto_position_m.z,
        );

        debug!(
            "[WG] Smoothed waypoint: [{:.3}, {:.3}, {:.3}]",
            self.output.smoothed_goto_position_m.x,
            self.output.smoothed_goto_position_m.y,
            self.output.smoothed_goto_position_m.z
        );
    }
}
