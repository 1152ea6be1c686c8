//! Planner decision input to the waypoint generation module

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use chrono::{DateTime, Utc};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

// Internal
use util::maths::{cartesian_to_polar, PolarPoint};

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// The behaviour selected by the upstream obstacle avoidance planner.
///
/// This is a closed set, each variant is dispatched through an explicit
/// match in the generator.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WaypointType {
    /// Hold the position captured when hover was entered
    Hover,

    /// Step along the direction suggested by the planner's costmap
    Costmap,

    /// Step along the direction derived from the planner's path tree
    TryPath,

    /// Step straight towards the goal
    Direct,

    /// Climb to the flight altitude, currently identical to `Direct`
    ReachHeight,

    /// Retreat from the back off anchor at constant altitude
    GoBack,
}

impl Default for WaypointType {
    fn default() -> Self {
        WaypointType::Hover
    }
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The full decision record produced by the upstream planner each cycle.
///
/// The waypoint type and its mode specific fields must be mutually
/// consistent, for example `TryPath` implies that `path_node_positions`
/// and `last_path_time` are meaningful.
#[derive(Debug, Clone)]
pub struct PlannerDecision {
    /// The behaviour to execute this cycle
    pub waypoint_type: WaypointType,

    /// True if the planner currently sees an obstacle ahead of the vehicle
    pub obstacle_ahead: bool,

    /// Suggested direction for `Costmap` mode. The radius is ignored, the
    /// generator always steps at unit radius.
    pub costmap_direction: PolarPoint,

    /// Candidate path node positions for `TryPath` mode, ordered from the
    /// goal end of the tree back towards the vehicle.
    ///
    /// Units: meters
    pub path_node_positions: Vec<Vector3<f64>>,

    /// The time at which the path tree was last computed
    pub last_path_time: DateTime<Utc>,

    /// The anchor point to retreat from in `GoBack` mode
    ///
    /// Units: meters
    pub back_off_point_m: Vector3<f64>,

    /// The vehicle position at the moment the back off manoeuvre started.
    /// Its altitude is held for the whole manoeuvre.
    ///
    /// Units: meters
    pub back_off_start_point_m: Vector3<f64>,

    /// True once the vehicle has reached its flight altitude. While false
    /// the climb-out override is active.
    pub reach_altitude: bool,

    /// The offboard target position used during climb-out
    ///
    /// Units: meters
    pub offboard_position_m: Vector3<f64>,

    /// Minimum cruise speed
    ///
    /// Units: meters/second
    pub min_speed_mps: f64,

    /// Maximum cruise speed
    ///
    /// Units: meters/second
    pub max_speed_mps: f64,

    /// Slope of the rate limited speed ramp
    ///
    /// Units: meters/second^2
    pub velocity_slope: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for PlannerDecision {
    fn default() -> Self {
        Self {
            waypoint_type: WaypointType::default(),
            obstacle_ahead: false,
            costmap_direction: PolarPoint::default(),
            path_node_positions: vec![],
            last_path_time: DateTime::<Utc>::from(std::time::UNIX_EPOCH),
            back_off_point_m: Vector3::zeros(),
            back_off_start_point_m: Vector3::zeros(),
            reach_altitude: true,
            offboard_position_m: Vector3::zeros(),
            min_speed_mps: 0.0,
            max_speed_mps: 0.0,
            velocity_slope: 1.0,
        }
    }
}

impl PlannerDecision {
    /// Derive a step direction from the path node sequence relative to the
    /// given position.
    ///
    /// Returns the polar direction from the position towards the node one
    /// step closer to the goal than the node nearest to the vehicle, or
    /// `None` if the sequence is too short to define a direction.
    pub fn direction_from_path(&self, position_m: &Vector3<f64>) -> Option<PolarPoint> {
        if self.path_node_positions.len() < 2 {
            return None;
        }

        // Find the node closest to the vehicle
        let mut closest = 0;
        let mut closest_dist_m = f64::INFINITY;
        for (i, node) in self.path_node_positions.iter().enumerate() {
            let dist_m = (node - position_m).norm();
            if dist_m < closest_dist_m {
                closest = i;
                closest_dist_m = dist_m;
            }
        }

        // Nodes are ordered goal first, step towards the node one closer
        // to the goal
        let target = if closest == 0 {
            self.path_node_positions[0]
        }
        else {
            self.path_node_positions[closest - 1]
        };

        Some(cartesian_to_polar(&target, position_m))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_direction_from_path() {
        let mut decision = PlannerDecision::default();

        // Too few nodes gives no direction
        assert!(decision.direction_from_path(&Vector3::zeros()).is_none());
        decision.path_node_positions = vec![Vector3::new(5.0, 0.0, 0.0)];
        assert!(decision.direction_from_path(&Vector3::zeros()).is_none());

        // Goal-first sequence along the positive X axis
        decision.path_node_positions = vec![
            Vector3::new(5.0, 0.0, 0.0),
            Vector3::new(3.0, 0.0, 0.0),
            Vector3::new(1.0, 0.0, 0.0),
        ];

        // From the origin the nearest node is the last one, the direction
        // points at the middle node, which lies along +X (azimuth 90 deg)
        let dir = decision
            .direction_from_path(&Vector3::zeros())
            .expect("expected a direction");
        assert!((dir.z_deg - 90.0).abs() < 1e-10);
        assert!(dir.e_deg.abs() < 1e-10);
    }
}
