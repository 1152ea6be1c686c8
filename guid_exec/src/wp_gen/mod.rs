//! # Waypoint generation module
//!
//! Waypoint generation is the final stage of the local planning pipeline.
//! Each control cycle the upstream obstacle avoidance planner selects one
//! of a closed set of behaviours (the waypoint type) and this module turns
//! that decision into a single, kinematically admissible position and
//! velocity command:
//!
//! - `Hover` - hold the position the vehicle had when hover was entered.
//! - `Costmap` - step along the direction suggested by the planner's
//!   costmap.
//! - `TryPath` - step along the direction derived from the planner's path
//!   tree, falling back to `Direct` when the tree is unusable.
//! - `Direct` - step straight towards the goal.
//! - `ReachHeight` - behaviourally identical to `Direct` in this version,
//!   kept separate so downstream consumers can distinguish the two.
//! - `GoBack` - retreat from a recorded anchor point at constant altitude.
//!
//! All translational behaviours share a common post processing pipeline:
//! the raw target is speed adapted (obstacle proximity, sensor field of
//! view, goal proximity braking), shaped by a jerk limited smoothing
//! filter, and clamped to the goal once the goal acceptance hysteresis
//! engages. A climb-out override forces incremental vertical ascent before
//! any of this applies.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod calc_smooth;
mod calc_speed;
mod decision;
mod output;
mod params;
mod state;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal
pub use decision::*;
pub use output::*;
pub use params::Params;
pub use state::*;

use util::params::LoadError;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Angular resolution of the planner's polar histogram.
///
/// Units: degrees per cell
pub const ALPHA_RES_DEG: usize = 6;

/// Nominal control tick used when the clock has not advanced between two
/// cycles.
///
/// Units: seconds
pub const NOMINAL_TICK_S: f64 = 0.004;

/// Direction vectors shorter than this are not normalised, preventing
/// unstable unit vectors being amplified from noise.
///
/// Units: meters
pub const NORM_EPSILON_M: f64 = 0.01;

/// Length of one retreat step during a back off manoeuvre.
///
/// Units: meters
pub const BACK_OFF_STEP_M: f64 = 0.5;

/// Altitude increment commanded while climbing to the flight altitude.
///
/// Units: meters
pub const CLIMB_STEP_M: f64 = 0.5;

/// Horizontal distance inside which the goal counts as directly overhead
/// during climb-out, suppressing yaw changes.
///
/// Units: meters
pub const OVERHEAD_GOAL_RADIUS_M: f64 = 1.0;

/// Goal movements larger than this invalidate the goal related hysteresis
/// state.
///
/// Units: meters
pub const GOAL_MOVED_THRESHOLD_M: f64 = 0.1;

/// Minimum distance to the goal for the path tree to be worth following
/// when no obstacle is ahead.
///
/// Units: meters
pub const TRY_PATH_MIN_GOAL_DIST_M: f64 = 4.0;

/// Maximum age of the planner's path before it is considered stale.
///
/// Units: seconds
pub const MAX_PATH_AGE_S: f64 = 5.0;

/// Angular distance to the nearest visible histogram cell at which the
/// field of view speed penalty reaches full stop.
///
/// Units: degrees
pub const HOVER_ANGLE_DEG: f64 = 30.0;

/// Speeds below this put the generator into yaw-only mode, rotating in
/// place rather than translating.
///
/// Units: meters/second
pub const YAW_ONLY_SPEED_THRESHOLD_MS: f64 = 0.01;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Possible errors that can occur during waypoint generation.
#[derive(Debug, thiserror::Error)]
pub enum WpGenError {
    #[error("Could not load parameters: {0}")]
    ParamLoadError(LoadError),

    /// No planner decision has been supplied for this cycle. The upstream
    /// planner must call `set_planner_decision` before generation.
    #[error("No planner decision has been set")]
    NoPlannerDecision,

    /// No vehicle state has been supplied. The scheduler must call
    /// `update_state` before generation.
    #[error("No vehicle state has been set")]
    NoStateUpdate,
}
