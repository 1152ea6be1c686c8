//! Parameters structure for the waypoint generation module

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Deserialize;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for waypoint generation.
#[derive(Debug, Clone, Deserialize)]
pub struct Params {

    // ---- GOAL ACCEPTANCE ----

    /// Distance to the goal below which the goal counts as reached.
    ///
    /// Units: meters
    pub goal_acceptance_radius_in_m: f64,

    /// Distance to the goal above which a reached goal counts as lost
    /// again. Must be greater than or equal to the inner radius, the two
    /// thresholds form the goal-reached hysteresis.
    ///
    /// Units: meters
    pub goal_acceptance_radius_out_m: f64,

    // ---- GOAL PROXIMITY BRAKING ----

    /// Braking engages when the horizontal distance to the goal falls
    /// below this factor times the current speed.
    pub factor_close_to_goal_start_speed_limitation: f64,

    /// Braking disengages when the horizontal distance to the goal exceeds
    /// this factor times the current speed. Must be greater than or equal
    /// to the start factor.
    pub factor_close_to_goal_stop_speed_limitation: f64,

    /// Floor on the commanded speed while braking near the goal.
    ///
    /// Units: meters/second
    pub min_speed_close_to_goal_ms: f64,

    /// Speed per meter of remaining goal distance while braking.
    ///
    /// Units: 1/second
    pub max_speed_close_to_goal_factor: f64,

    // ---- TRAJECTORY SMOOTHING ----

    /// Upper bound on the rate of change of horizontal acceleration.
    ///
    /// Units: meters/second^3
    pub max_jerk_limit: f64,

    /// If set above a small epsilon the jerk limit is scaled with the
    /// current horizontal speed and floored at this value, retaining
    /// control authority in low speed manoeuvres.
    ///
    /// Units: meters/second^3
    pub min_jerk_limit: f64,

    // ---- SENSOR FIELD OF VIEW ----

    /// Horizontal field of view of the obstacle sensor.
    ///
    /// Units: degrees
    pub h_fov_deg: f64,

    /// Vertical field of view of the obstacle sensor.
    ///
    /// Units: degrees
    pub v_fov_deg: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for Params {
    /// Nominal flight values, used by tests and as a reference for the
    /// parameter file.
    fn default() -> Self {
        Self {
            goal_acceptance_radius_in_m: 0.5,
            goal_acceptance_radius_out_m: 1.5,
            factor_close_to_goal_start_speed_limitation: 3.0,
            factor_close_to_goal_stop_speed_limitation: 4.0,
            min_speed_close_to_goal_ms: 0.5,
            max_speed_close_to_goal_factor: 0.1,
            max_jerk_limit: 500.0,
            min_jerk_limit: 200.0,
            h_fov_deg: 59.0,
            v_fov_deg: 46.0,
        }
    }
}
