//! Cruise speed adaptation calculations

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use chrono::{DateTime, Utc};
use log::debug;

// Internal
use super::*;
use crate::wp_gen::state::VehicleState;
use util::{maths, time};

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl WpGen {
    /// Compute this cycle's cruise speed and rescale the step towards the
    /// raw target accordingly.
    ///
    /// The speed is ramped towards an obstacle dependent bound, penalised
    /// when the target lies outside the sensor's field of view, corrected
    /// for the time spent computing this cycle's plan, and braked close to
    /// the goal.
    pub(crate) fn adapt_speed(
        &mut self,
        vehicle: &VehicleState,
        decision: &PlannerDecision,
        now: DateTime<Utc>,
    ) {
        let since_ramp_s = self
            .velocity_time
            .map(|t| time::elapsed_seconds(now - t))
            .unwrap_or(0.0);

        // Ramp towards the maximum speed in free space, clamp down to the
        // minimum as soon as an obstacle is flagged ahead
        if !decision.obstacle_ahead {
            self.speed_mps = self.speed_mps.min(decision.max_speed_mps);
            self.speed_mps = maths::velocity_linear(
                decision.max_speed_mps,
                decision.velocity_slope,
                self.speed_mps,
                since_ramp_s,
            );
        }
        else {
            self.speed_mps = self.speed_mps.min(decision.min_speed_mps);
            self.speed_mps = maths::velocity_linear(
                decision.min_speed_mps,
                decision.velocity_slope,
                self.speed_mps,
                since_ramp_s,
            );
        }

        // Slow down for waypoints outside the field of view, the further
        // outside the sensor cone the slower the approach
        let target_z_deg = maths::azimuth_from_cartesian(
            &self.output.adapted_goto_position_m,
            &vehicle.pose.position_m,
        );
        let target_z_idx = maths::azimuth_to_index(target_z_deg, ALPHA_RES_DEG);

        if vehicle.z_fov_idx.contains(&target_z_idx) {
            self.waypoint_outside_fov = false;
        }
        else {
            self.waypoint_outside_fov = true;

            if decision.reach_altitude && !self.reached_goal {
                let ind_dist = vehicle
                    .z_fov_idx
                    .iter()
                    .map(|&idx| (idx as isize - target_z_idx as isize).abs())
                    .min()
                    .unwrap_or(isize::MAX);

                let angle_diff_deg =
                    ((ALPHA_RES_DEG as f64) * ind_dist as f64).min(HOVER_ANGLE_DEG);

                self.speed_mps *= 1.0 - angle_diff_deg / HOVER_ANGLE_DEG;

                self.only_yawed = false;
                if self.speed_mps < YAW_ONLY_SPEED_THRESHOLD_MS {
                    self.only_yawed = true;
                    debug!("[WG] Waypoint far outside FOV, yawing in place");
                }
            }
        }

        self.velocity_time = Some(now);

        // Compensate for the time already spent computing this cycle's
        // plan
        let since_update_s = time::elapsed_seconds(now - vehicle.update_time);
        self.speed_mps += since_update_s * vehicle.vel_mag_mps;

        // Brake before the goal: when the vehicle is closer to the goal
        // than a velocity dependent distance, the speed is limited
        let pos_to_goal_m = (vehicle.goal_m - vehicle.pose.position_m).abs();

        let start_dist_m =
            self.params.factor_close_to_goal_start_speed_limitation * vehicle.vel_mag_mps;
        let stop_dist_m =
            self.params.factor_close_to_goal_stop_speed_limitation * vehicle.vel_mag_mps;

        if pos_to_goal_m.x < start_dist_m && pos_to_goal_m.y < start_dist_m {
            self.limit_speed_close_to_goal = true;
        }
        else if pos_to_goal_m.x > stop_dist_m || pos_to_goal_m.y > stop_dist_m {
            self.limit_speed_close_to_goal = false;
        }

        if self.limit_speed_close_to_goal {
            self.speed_mps = self
                .speed_mps
                .min(self.params.max_speed_close_to_goal_factor * pos_to_goal_m.norm());
            self.speed_mps = self.speed_mps.max(self.params.min_speed_close_to_goal_ms);
        }

        // Rescale the step towards the target to the final speed
        let mut dir = self.output.adapted_goto_position_m - vehicle.pose.position_m;
        if dir.norm() > NORM_EPSILON_M {
            dir.normalize_mut();
        }

        self.output.adapted_goto_position_m = vehicle.pose.position_m + dir * self.speed_mps;

        debug!(
            "[WG] Speed adapted waypoint: [{:.3}, {:.3}, {:.3}] at {:.3} m/s",
            self.output.adapted_goto_position_m.x,
            self.output.adapted_goto_position_m.y,
            self.output.adapted_goto_position_m.z,
            self.speed_mps
        );
    }
}
