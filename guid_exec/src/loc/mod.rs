//! # Localisation module
//!
//! This module provides the pose types used by the guidance modules. The
//! pose itself is estimated externally, the guidance software only
//! consumes it.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use nalgebra::{UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The current pose (position and attitude) of the vehicle in the local
/// frame.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, Default)]
pub struct Pose {
    /// The position in the local frame
    ///
    /// Units: meters
    pub position_m: Vector3<f64>,

    /// The attitude of the vehicle in the local frame. This is a quaternion
    /// that will rotate an object from the local frame into the body frame.
    pub attitude_q: UnitQuaternion<f64>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Pose {
    /// Build a pose from a position and a yaw angle, with zero roll and
    /// pitch.
    pub fn from_position_and_yaw(position_m: Vector3<f64>, yaw_rad: f64) -> Self {
        Self {
            position_m,
            attitude_q: UnitQuaternion::from_euler_angles(0.0, 0.0, yaw_rad),
        }
    }

    /// Return the yaw (rotation about the local Z axis) of the vehicle in
    /// radians.
    pub fn get_yaw(&self) -> f64 {
        self.attitude_q.euler_angles().2
    }

    /// Return the pitch (rotation about the body Y axis) of the vehicle in
    /// radians.
    pub fn get_pitch(&self) -> f64 {
        self.attitude_q.euler_angles().1
    }
}
