//! Output types of the waypoint generation module

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::Vector3;
use serde::Serialize;

// Internal
use super::WaypointType;
use util::maths;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A position plus yaw command for the flight controller.
#[derive(Debug, Default, Copy, Clone, Serialize)]
pub struct PositionCmd {
    /// Commanded position in the local frame
    ///
    /// Units: meters
    pub position_m: Vector3<f64>,

    /// Commanded yaw
    ///
    /// Units: radians
    pub yaw_rad: f64,
}

/// A velocity command for the flight controller.
#[derive(Debug, Default, Copy, Clone, Serialize)]
pub struct VelocityCmd {
    /// Linear velocity components. These are the raw positional delta of
    /// the position command against the current pose, not a delta divided
    /// by elapsed time.
    pub linear: Vector3<f64>,

    /// Angular velocity about the local Z axis
    ///
    /// Units: radians/second
    pub angular_z_rads: f64,
}

/// The complete result of one generation cycle.
///
/// Produced fresh each cycle, the previous cycle's commands are retained
/// inside the generator as filter history only.
#[derive(Debug, Default, Clone, Serialize)]
pub struct GenerationResult {
    /// The behaviour that was actually executed. This may differ from the
    /// requested type when `TryPath` degrades to `Direct`.
    pub waypoint_type: WaypointType,

    /// The raw target position selected by the mode dispatch
    ///
    /// Units: meters
    pub goto_position_m: Vector3<f64>,

    /// The target after speed adaptation
    ///
    /// Units: meters
    pub adapted_goto_position_m: Vector3<f64>,

    /// The target after jerk limited smoothing and the goal override
    ///
    /// Units: meters
    pub smoothed_goto_position_m: Vector3<f64>,

    /// The final pose command
    pub position_waypoint: PositionCmd,

    /// The final velocity command
    pub velocity_waypoint: VelocityCmd,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl PositionCmd {
    pub fn new(position_m: Vector3<f64>, yaw_rad: f64) -> Self {
        Self { position_m, yaw_rad }
    }
}

impl VelocityCmd {
    /// Derive a velocity command by finite differencing a position command
    /// against the current vehicle position.
    ///
    /// The angular component is a bounded proportional function of the
    /// shortest angular difference between the commanded and current yaw.
    pub fn from_position_cmd(
        cmd: &PositionCmd,
        current_position_m: &Vector3<f64>,
        curr_yaw_rad: f64,
    ) -> Self {
        Self {
            linear: cmd.position_m - current_position_m,
            angular_z_rads: maths::angular_velocity(cmd.yaw_rad, curr_yaw_rad),
        }
    }
}
