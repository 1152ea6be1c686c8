//! Waypoint generation module state

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use chrono::{DateTime, Utc};
use log::debug;
use nalgebra::{Vector2, Vector3};

// Internal
use super::*;
use crate::loc::Pose;
use util::maths::{self, PolarPoint};
use util::{params, time};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The vehicle state consumed by the generator, updated once per cycle
/// from the external localisation and mission layers.
///
/// Must never be mutated mid cycle, every downstream stage reads the same
/// snapshot.
#[derive(Debug, Clone)]
pub struct VehicleState {
    /// Current pose of the vehicle
    pub pose: Pose,

    /// Current mission goal position
    ///
    /// Units: meters
    pub goal_m: Vector3<f64>,

    /// Current velocity vector
    ///
    /// Units: meters/second
    pub vel_mps: Vector3<f64>,

    /// Current yaw, extracted from the pose
    ///
    /// Units: radians
    pub yaw_rad: f64,

    /// Magnitude of the current velocity
    ///
    /// Units: meters/second
    pub vel_mag_mps: f64,

    /// The azimuth histogram cells currently inside the sensor's
    /// horizontal field of view
    pub z_fov_idx: Vec<usize>,

    /// Lowest elevation histogram cell inside the vertical field of view
    pub e_fov_min_idx: usize,

    /// Highest elevation histogram cell inside the vertical field of view
    pub e_fov_max_idx: usize,

    /// The time at which this state was captured
    pub update_time: DateTime<Utc>,
}

/// The waypoint generator.
///
/// One instance exists per controlled vehicle. The external scheduler
/// drives it once per control cycle: `update_state`, `set_planner_decision`
/// and then `generate`. All cross-cycle memory (filter history, hysteresis
/// state, the hover anchor) is owned here, there is no sharing between
/// instances or cycles beyond these fields.
pub struct WpGen {
    pub(crate) params: Params,

    /// This cycle's planner decision
    pub(crate) decision: Option<PlannerDecision>,

    /// This cycle's vehicle state snapshot
    pub(crate) vehicle: Option<VehicleState>,

    /// True if the external scheduler requested a hover regardless of the
    /// planner supplied mode
    pub(crate) force_hover: bool,

    // ---- CYCLE TIMING ----

    /// The timestamp of the current generation cycle
    pub(crate) current_time: Option<DateTime<Utc>>,

    /// The timestamp of the previous generation cycle
    pub(crate) last_time: Option<DateTime<Utc>>,

    /// The time at which the cruise speed was last ramped
    pub(crate) velocity_time: Option<DateTime<Utc>>,

    // ---- FILTER HISTORY ----

    /// The waypoint type requested in the previous cycle, used to detect
    /// entry into hover
    pub(crate) last_wp_type: Option<WaypointType>,

    /// The previous cycle's position waypoint, the smoothing filter
    /// integrates from here
    pub(crate) last_position_wp: Option<PositionCmd>,

    /// The previous cycle's vehicle yaw
    pub(crate) last_yaw_rad: f64,

    /// The previous cycle's horizontal vehicle velocity
    pub(crate) last_velocity_mps: Vector2<f64>,

    /// The position frozen at the instant hover mode was entered
    pub(crate) hover_position_m: Option<Vector3<f64>>,

    /// The current cruise speed
    pub(crate) speed_mps: f64,

    /// Goal-reached hysteresis state
    pub(crate) reached_goal: bool,

    /// Goal-proximity braking hysteresis state
    pub(crate) limit_speed_close_to_goal: bool,

    /// The yaw captured the instant the goal-reached hysteresis first
    /// engaged
    pub(crate) yaw_reached_goal_rad: f64,

    /// True if this cycle's adapted waypoint lies outside the sensor's
    /// field of view
    pub(crate) waypoint_outside_fov: bool,

    /// True if the speed has dropped so low the vehicle should rotate in
    /// place rather than translate
    pub(crate) only_yawed: bool,

    // ---- CYCLE SCRATCH ----

    /// The yaw command being built up this cycle
    pub(crate) new_yaw_rad: f64,

    /// The output being built up this cycle
    pub(crate) output: GenerationResult,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl WpGen {
    /// Create a new generator with the given parameters and empty filter
    /// history.
    pub fn new(params: Params) -> Self {
        Self {
            params,
            decision: None,
            vehicle: None,
            force_hover: false,
            current_time: None,
            last_time: None,
            velocity_time: None,
            last_wp_type: None,
            last_position_wp: None,
            last_yaw_rad: 0.0,
            last_velocity_mps: Vector2::zeros(),
            hover_position_m: None,
            speed_mps: 0.0,
            reached_goal: false,
            limit_speed_close_to_goal: false,
            yaw_reached_goal_rad: 0.0,
            waypoint_outside_fov: false,
            only_yawed: false,
            new_yaw_rad: 0.0,
            output: GenerationResult::default(),
        }
    }

    /// Initialise the generator from a parameter file.
    ///
    /// The path is relative to the software root's params directory.
    pub fn from_file(params_path: &str) -> Result<Self, WpGenError> {
        let params = match params::load(params_path) {
            Ok(p) => p,
            Err(e) => return Err(WpGenError::ParamLoadError(e)),
        };

        Ok(Self::new(params))
    }

    /// Store the decision produced by the upstream planner for this cycle.
    pub fn set_planner_decision(&mut self, decision: PlannerDecision) {
        self.decision = Some(decision);
    }

    /// Update the vehicle state from the external localisation and mission
    /// layers.
    ///
    /// Must be called once per cycle before [`WpGen::generate`]. If the
    /// goal has moved by more than [`GOAL_MOVED_THRESHOLD_M`] the goal
    /// related hysteresis state is reset, a new goal invalidates it. If
    /// `stay` is set the next generation cycle hovers regardless of the
    /// planner supplied mode.
    pub fn update_state(
        &mut self,
        pose: &Pose,
        goal_m: Vector3<f64>,
        vel_mps: Vector3<f64>,
        stay: bool,
        t: DateTime<Utc>,
    ) {
        if let Some(ref vehicle) = self.vehicle {
            if (vehicle.goal_m - goal_m).norm() > GOAL_MOVED_THRESHOLD_M {
                self.reached_goal = false;
                self.limit_speed_close_to_goal = false;
            }
        }

        let yaw_rad = pose.get_yaw();
        let pitch_deg = pose.get_pitch().to_degrees();

        // Visible azimuth cells are those whose centre lies within half the
        // horizontal field of view of the sensor bore
        let bore_z_deg = maths::wrap_angle_to_plus_minus_pi(
            (90.0 - yaw_rad.to_degrees()).to_radians(),
        )
        .to_degrees();

        let num_z_cells = 360 / ALPHA_RES_DEG;
        let mut z_fov_idx = Vec::with_capacity(num_z_cells);
        for idx in 0..num_z_cells {
            let centre_deg = maths::index_to_azimuth(idx, ALPHA_RES_DEG);
            if maths::angle_difference_deg(centre_deg, bore_z_deg) <= self.params.h_fov_deg / 2.0
            {
                z_fov_idx.push(idx);
            }
        }

        let e_fov_min_idx =
            maths::elevation_to_index(pitch_deg - self.params.v_fov_deg / 2.0, ALPHA_RES_DEG);
        let e_fov_max_idx =
            maths::elevation_to_index(pitch_deg + self.params.v_fov_deg / 2.0, ALPHA_RES_DEG);

        debug!(
            "[WG] FOV update: {} azimuth cells visible, elevation cells {} to {}",
            z_fov_idx.len(),
            e_fov_min_idx,
            e_fov_max_idx
        );

        self.vehicle = Some(VehicleState {
            pose: *pose,
            goal_m,
            vel_mps,
            yaw_rad,
            vel_mag_mps: vel_mps.norm(),
            z_fov_idx,
            e_fov_min_idx,
            e_fov_max_idx,
            update_time: t,
        });

        self.force_hover = stay;
    }

    /// Generate this cycle's waypoint and velocity command.
    ///
    /// `now` is the current cycle timestamp, supplied by the external
    /// scheduler so that processing is deterministic under test.
    pub fn generate(&mut self, now: DateTime<Utc>) -> Result<GenerationResult, WpGenError> {
        // Validate inputs for this cycle
        let vehicle = match self.vehicle {
            Some(ref v) => v.clone(),
            None => return Err(WpGenError::NoStateUpdate),
        };
        let decision = match self.decision {
            Some(ref d) => d.clone(),
            None => return Err(WpGenError::NoPlannerDecision),
        };

        debug!(
            "[WG] Generate waypoint, current position: [{:.3}, {:.3}, {:.3}]",
            vehicle.pose.position_m.x, vehicle.pose.position_m.y, vehicle.pose.position_m.z
        );

        // Timing
        self.last_time = self.current_time;
        self.current_time = Some(now);

        // A hover request from the scheduler overrides the planner's mode
        let wp_type = if self.force_hover {
            WaypointType::Hover
        }
        else {
            decision.waypoint_type
        };

        self.output = GenerationResult::default();
        self.output.waypoint_type = wp_type;

        match wp_type {
            WaypointType::Hover => {
                // Freeze the anchor on entry into hover
                if self.last_wp_type != Some(WaypointType::Hover)
                    || self.hover_position_m.is_none()
                {
                    self.hover_position_m = Some(vehicle.pose.position_m);
                }

                let anchor_m = self.hover_position_m.unwrap_or(vehicle.pose.position_m);

                self.output.goto_position_m = anchor_m;
                debug!(
                    "[WG] Hover at: [{:.3}, {:.3}, {:.3}]",
                    anchor_m.x, anchor_m.y, anchor_m.z
                );
                self.post_process(&vehicle, &decision, now);
            }
            WaypointType::Costmap => {
                let direction = PolarPoint {
                    e_deg: decision.costmap_direction.e_deg,
                    z_deg: decision.costmap_direction.z_deg,
                    radius_m: 1.0,
                };
                self.output.goto_position_m =
                    maths::polar_to_cartesian(&direction, &vehicle.pose.position_m);
                debug!(
                    "[WG] Costmap to: [{:.3}, {:.3}, {:.3}]",
                    self.output.goto_position_m.x,
                    self.output.goto_position_m.y,
                    self.output.goto_position_m.z
                );
                self.post_process(&vehicle, &decision, now);
            }
            WaypointType::TryPath => {
                let dist_goal_m = (vehicle.goal_m - vehicle.pose.position_m).norm();
                let path_age_s = time::elapsed_seconds(now - decision.last_path_time);

                match decision.direction_from_path(&vehicle.pose.position_m) {
                    Some(direction)
                        if (decision.obstacle_ahead
                            || dist_goal_m > TRY_PATH_MIN_GOAL_DIST_M)
                            && path_age_s < MAX_PATH_AGE_S =>
                    {
                        debug!("[WG] Using calculated path tree");
                        let step = PolarPoint {
                            e_deg: direction.e_deg,
                            z_deg: direction.z_deg,
                            radius_m: 1.0,
                        };
                        self.output.goto_position_m =
                            maths::polar_to_cartesian(&step, &vehicle.pose.position_m);
                        self.post_process(&vehicle, &decision, now);
                    }
                    _ => {
                        debug!("[WG] No valid path tree, going direct");
                        self.output.waypoint_type = WaypointType::Direct;
                        self.go_fast(&vehicle, &decision, now);
                    }
                }
            }
            WaypointType::Direct | WaypointType::ReachHeight => {
                self.go_fast(&vehicle, &decision, now);
            }
            WaypointType::GoBack => {
                debug!("[WG] Too close, backing off");
                self.back_off(&vehicle, &decision);
            }
        }

        // Update the filter history for the next cycle
        self.last_wp_type = Some(wp_type);
        self.last_position_wp = Some(self.output.position_waypoint);
        self.last_yaw_rad = vehicle.yaw_rad;
        self.last_velocity_mps = vehicle.vel_mps.xy();

        Ok(self.output.clone())
    }

    /// True once the goal-reached hysteresis has engaged.
    pub fn is_reached_goal(&self) -> bool {
        self.reached_goal
    }

    /// True if the last cycle dropped into yaw-only mode, rotating in
    /// place rather than translating.
    pub fn is_only_yawed(&self) -> bool {
        self.only_yawed
    }
}

impl WpGen {
    /// Step one unit towards the goal along the straight line direction.
    fn go_fast(&mut self, vehicle: &VehicleState, decision: &PlannerDecision, now: DateTime<Utc>) {
        let mut dir = vehicle.goal_m - vehicle.pose.position_m;
        if dir.norm() > NORM_EPSILON_M {
            dir.normalize_mut();
        }

        self.output.goto_position_m = vehicle.pose.position_m + dir;

        debug!(
            "[WG] Go fast selected waypoint: [{:.3}, {:.3}, {:.3}]",
            self.output.goto_position_m.x,
            self.output.goto_position_m.y,
            self.output.goto_position_m.z
        );

        self.post_process(vehicle, decision, now);
    }

    /// Retreat from the back off anchor.
    ///
    /// The direction is horizontal only and the altitude recorded at the
    /// start of the manoeuvre is held, so the whole retreat happens in a
    /// level plane. Yaw is not changed during the manoeuvre and the common
    /// post processing pipeline is bypassed.
    fn back_off(&mut self, vehicle: &VehicleState, decision: &PlannerDecision) {
        let mut dir = vehicle.pose.position_m - decision.back_off_point_m;
        dir.z = 0.0;
        if dir.norm() > NORM_EPSILON_M {
            dir.normalize_mut();
        }
        dir *= BACK_OFF_STEP_M;

        let mut goto_m = vehicle.pose.position_m + dir;
        goto_m.z = decision.back_off_start_point_m.z;

        self.output.goto_position_m = goto_m;
        self.output.adapted_goto_position_m = goto_m;
        self.output.smoothed_goto_position_m = goto_m;

        self.new_yaw_rad = self.last_yaw_rad;
        self.output.position_waypoint = PositionCmd::new(goto_m, self.last_yaw_rad);
        self.output.velocity_waypoint = VelocityCmd::from_position_cmd(
            &self.output.position_waypoint,
            &vehicle.pose.position_m,
            vehicle.yaw_rad,
        );

        debug!(
            "[WG] Back off from: [{:.3}, {:.3}, {:.3}], direction: [{:.3}, {:.3}]",
            decision.back_off_point_m.x,
            decision.back_off_point_m.y,
            decision.back_off_point_m.z,
            dir.x,
            dir.y
        );
    }

    /// Common post processing applied to all translational behaviours.
    fn post_process(
        &mut self,
        vehicle: &VehicleState,
        decision: &PlannerDecision,
        now: DateTime<Utc>,
    ) {
        self.output.adapted_goto_position_m = self.output.goto_position_m;

        // Wall clock delta for this cycle. A non positive delta (clock not
        // advancing, or the first cycle) is replaced with the nominal tick
        // to avoid dividing by zero downstream.
        let dt_s = self
            .last_time
            .and_then(|t| time::duration_to_seconds(now - t))
            .filter(|s| *s > 0.0)
            .unwrap_or(NOMINAL_TICK_S);

        // Face the raw target
        self.new_yaw_rad =
            maths::next_yaw(&vehicle.pose.position_m, &self.output.adapted_goto_position_m);

        self.adapt_speed(vehicle, decision, now);
        self.output.smoothed_goto_position_m = self.output.adapted_goto_position_m;

        if !decision.reach_altitude {
            // Reach the flight altitude before anything else. The climb
            // point bypasses both speed adaptation and smoothing.
            self.reach_goal_altitude_first(vehicle, decision);
            self.output.adapted_goto_position_m = self.output.goto_position_m;
            self.output.smoothed_goto_position_m = self.output.goto_position_m;
            debug!(
                "[WG] Climb-out waypoint: [{:.3}, {:.3}, {:.3}]",
                self.output.smoothed_goto_position_m.x,
                self.output.smoothed_goto_position_m.y,
                self.output.smoothed_goto_position_m.z
            );
        }
        else {
            self.smooth_waypoint(vehicle, dt_s);
        }

        // Clamp to the goal while the goal-reached hysteresis is engaged
        if self.within_goal_radius(vehicle) {
            self.output.smoothed_goto_position_m = vehicle.goal_m;
        }
        if self.reached_goal {
            self.new_yaw_rad = self.yaw_reached_goal_rad;
        }

        debug!(
            "[WG] Final waypoint: [{:.3}, {:.3}, {:.3}]",
            self.output.smoothed_goto_position_m.x,
            self.output.smoothed_goto_position_m.y,
            self.output.smoothed_goto_position_m.z
        );

        self.output.position_waypoint =
            PositionCmd::new(self.output.smoothed_goto_position_m, self.new_yaw_rad);
        self.output.velocity_waypoint = VelocityCmd::from_position_cmd(
            &self.output.position_waypoint,
            &vehicle.pose.position_m,
            vehicle.yaw_rad,
        );
    }

    /// Climb towards the flight altitude before making horizontal
    /// progress.
    ///
    /// The commanded altitude is always the current altitude plus
    /// [`CLIMB_STEP_M`], never the final altitude directly. Horizontal
    /// approach towards the offboard target is clamped to the minimum
    /// cruise speed, and no yaw is commanded for a goal directly overhead.
    fn reach_goal_altitude_first(&mut self, vehicle: &VehicleState, decision: &PlannerDecision) {
        let climb_z_m = vehicle.pose.position_m.z + CLIMB_STEP_M;

        // If the goal lies directly overhead, do not yaw
        let diff_m = (vehicle.goal_m - vehicle.pose.position_m).abs();
        if diff_m.x < OVERHEAD_GOAL_RADIUS_M && diff_m.y < OVERHEAD_GOAL_RADIUS_M {
            self.new_yaw_rad = vehicle.yaw_rad;
        }

        // Constrain the horizontal step, the altitude step is preserved
        let mut step_xy = decision.offboard_position_m.xy() - vehicle.pose.position_m.xy();
        if step_xy.norm() > decision.min_speed_mps {
            step_xy = step_xy.normalize() * decision.min_speed_mps;
        }

        self.output.goto_position_m = Vector3::new(
            vehicle.pose.position_m.x + step_xy.x,
            vehicle.pose.position_m.y + step_xy.y,
            climb_z_m,
        );
    }

    /// Check the goal-reached hysteresis, capturing the yaw at the moment
    /// the goal is first reached.
    ///
    /// Once the squared distance drops below the inner acceptance radius
    /// the goal stays reached until it exceeds the outer radius, so the
    /// flag cannot flicker on a single boundary value.
    fn within_goal_radius(&mut self, vehicle: &VehicleState) -> bool {
        let sqrd_dist_m2 = (vehicle.goal_m - vehicle.pose.position_m).norm_squared();

        if sqrd_dist_m2 < self.params.goal_acceptance_radius_in_m.powi(2) {
            if !self.reached_goal {
                self.yaw_reached_goal_rad = vehicle.yaw_rad;
            }
            self.reached_goal = true;
        }
        else if sqrd_dist_m2 > self.params.goal_acceptance_radius_out_m.powi(2) {
            self.reached_goal = false;
        }

        self.reached_goal
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use nalgebra::Vector3;

    fn timestamp(s: f64) -> DateTime<Utc> {
        DateTime::<Utc>::from(std::time::UNIX_EPOCH)
            + chrono::Duration::milliseconds((s * 1000.0) as i64)
    }

    fn decision(wp_type: WaypointType) -> PlannerDecision {
        PlannerDecision {
            waypoint_type: wp_type,
            max_speed_mps: 2.0,
            min_speed_mps: 0.5,
            velocity_slope: 1.0,
            ..Default::default()
        }
    }

    fn update(
        gen: &mut WpGen,
        position_m: Vector3<f64>,
        yaw_rad: f64,
        goal_m: Vector3<f64>,
        t: DateTime<Utc>,
    ) {
        gen.update_state(
            &Pose::from_position_and_yaw(position_m, yaw_rad),
            goal_m,
            Vector3::zeros(),
            false,
            t,
        );
    }

    #[test]
    fn test_hover_freezes_anchor() {
        let mut gen = WpGen::new(Params::default());
        let goal = Vector3::new(50.0, 0.0, 3.0);
        let anchor = Vector3::new(1.0, 2.0, 3.0);

        update(&mut gen, anchor, 0.0, goal, timestamp(0.0));
        gen.set_planner_decision(decision(WaypointType::Hover));
        let result = gen.generate(timestamp(0.0)).unwrap();

        assert_eq!(result.waypoint_type, WaypointType::Hover);
        assert!((result.goto_position_m - anchor).norm() < 1e-10);

        // The vehicle drifts but the anchor must not move with it
        update(
            &mut gen,
            Vector3::new(1.5, 2.2, 3.0),
            0.0,
            goal,
            timestamp(0.1),
        );
        gen.set_planner_decision(decision(WaypointType::Hover));
        let result = gen.generate(timestamp(0.1)).unwrap();

        assert!((result.goto_position_m - anchor).norm() < 1e-10);
    }

    #[test]
    fn test_try_path_follows_tree() {
        let mut gen = WpGen::new(Params::default());
        update(
            &mut gen,
            Vector3::zeros(),
            0.0,
            Vector3::new(10.0, 0.0, 0.0),
            timestamp(1.0),
        );

        let mut dec = decision(WaypointType::TryPath);
        dec.path_node_positions = vec![
            Vector3::new(5.0, 0.0, 0.0),
            Vector3::new(3.0, 0.0, 0.0),
            Vector3::new(1.0, 0.0, 0.0),
        ];
        dec.last_path_time = timestamp(0.0);
        gen.set_planner_decision(dec);

        let result = gen.generate(timestamp(1.0)).unwrap();

        // Goal is far, path is fresh: a unit step along the tree direction
        assert_eq!(result.waypoint_type, WaypointType::TryPath);
        assert!((result.goto_position_m - Vector3::new(1.0, 0.0, 0.0)).norm() < 1e-9);
    }

    #[test]
    fn test_try_path_degrades_to_direct() {
        // No derivable direction
        let mut gen = WpGen::new(Params::default());
        update(
            &mut gen,
            Vector3::zeros(),
            0.0,
            Vector3::new(10.0, 0.0, 0.0),
            timestamp(1.0),
        );
        let mut dec = decision(WaypointType::TryPath);
        dec.last_path_time = timestamp(1.0);
        gen.set_planner_decision(dec);
        let result = gen.generate(timestamp(1.0)).unwrap();
        assert_eq!(result.waypoint_type, WaypointType::Direct);
        assert!((result.goto_position_m - Vector3::new(1.0, 0.0, 0.0)).norm() < 1e-9);

        // Stale path
        let mut gen = WpGen::new(Params::default());
        update(
            &mut gen,
            Vector3::zeros(),
            0.0,
            Vector3::new(10.0, 0.0, 0.0),
            timestamp(6.0),
        );
        let mut dec = decision(WaypointType::TryPath);
        dec.path_node_positions = vec![
            Vector3::new(5.0, 0.0, 0.0),
            Vector3::new(3.0, 0.0, 0.0),
            Vector3::new(1.0, 0.0, 0.0),
        ];
        dec.last_path_time = timestamp(0.0);
        gen.set_planner_decision(dec);
        let result = gen.generate(timestamp(6.0)).unwrap();
        assert_eq!(result.waypoint_type, WaypointType::Direct);

        // Close to the goal with no obstacle ahead
        let mut gen = WpGen::new(Params::default());
        update(
            &mut gen,
            Vector3::zeros(),
            0.0,
            Vector3::new(2.0, 0.0, 0.0),
            timestamp(1.0),
        );
        let mut dec = decision(WaypointType::TryPath);
        dec.path_node_positions = vec![
            Vector3::new(5.0, 0.0, 0.0),
            Vector3::new(3.0, 0.0, 0.0),
            Vector3::new(1.0, 0.0, 0.0),
        ];
        dec.last_path_time = timestamp(0.5);
        gen.set_planner_decision(dec);
        let result = gen.generate(timestamp(1.0)).unwrap();
        assert_eq!(result.waypoint_type, WaypointType::Direct);
    }

    #[test]
    fn test_goal_hysteresis_locks_position_and_yaw() {
        let mut gen = WpGen::new(Params::default());
        let goal = Vector3::new(10.0, 0.0, 0.0);

        // Inside the inner acceptance radius: goal reached, yaw captured
        update(&mut gen, Vector3::new(9.8, 0.0, 0.0), 0.3, goal, timestamp(0.0));
        gen.set_planner_decision(decision(WaypointType::Direct));
        let result = gen.generate(timestamp(0.0)).unwrap();

        assert!(gen.is_reached_goal());
        assert!((result.position_waypoint.position_m - goal).norm() < 1e-12);
        assert!((result.position_waypoint.yaw_rad - 0.3).abs() < 1e-12);

        // Between the two radii: stays reached, output stays locked to the
        // goal and the captured yaw, not the freshly computed one
        update(&mut gen, Vector3::new(9.0, 0.0, 0.0), 0.0, goal, timestamp(0.1));
        gen.set_planner_decision(decision(WaypointType::Direct));
        let result = gen.generate(timestamp(0.1)).unwrap();

        assert!(gen.is_reached_goal());
        assert!((result.position_waypoint.position_m - goal).norm() < 1e-12);
        assert!((result.position_waypoint.yaw_rad - 0.3).abs() < 1e-12);

        // Beyond the outer radius: the hysteresis disengages
        update(&mut gen, Vector3::new(7.0, 0.0, 0.0), 0.0, goal, timestamp(0.2));
        gen.set_planner_decision(decision(WaypointType::Direct));
        let result = gen.generate(timestamp(0.2)).unwrap();

        assert!(!gen.is_reached_goal());
        assert!((result.position_waypoint.position_m - goal).norm() > 1e-6);
    }

    #[test]
    fn test_goal_move_resets_hysteresis() {
        let mut gen = WpGen::new(Params::default());
        let goal = Vector3::new(10.0, 0.0, 0.0);

        // Arriving at speed engages both the goal-reached and the braking
        // hysteresis
        gen.update_state(
            &Pose::from_position_and_yaw(Vector3::new(9.8, 0.0, 0.0), 0.3),
            goal,
            Vector3::new(1.0, 0.0, 0.0),
            false,
            timestamp(0.0),
        );
        gen.set_planner_decision(decision(WaypointType::Direct));
        gen.generate(timestamp(0.0)).unwrap();

        assert!(gen.reached_goal);
        assert!(gen.limit_speed_close_to_goal);

        // The goal moving by more than 0.1 m invalidates both flags
        gen.update_state(
            &Pose::from_position_and_yaw(Vector3::new(9.8, 0.0, 0.0), 0.3),
            Vector3::new(10.0, 0.4, 0.0),
            Vector3::new(1.0, 0.0, 0.0),
            false,
            timestamp(0.1),
        );

        assert!(!gen.reached_goal);
        assert!(!gen.limit_speed_close_to_goal);

        // A sub-threshold goal adjustment leaves an engaged hysteresis
        // alone
        gen.set_planner_decision(decision(WaypointType::Direct));
        gen.generate(timestamp(0.1)).unwrap();
        assert!(gen.reached_goal);

        gen.update_state(
            &Pose::from_position_and_yaw(Vector3::new(9.8, 0.0, 0.0), 0.3),
            Vector3::new(10.0, 0.45, 0.0),
            Vector3::new(1.0, 0.0, 0.0),
            false,
            timestamp(0.2),
        );
        assert!(gen.reached_goal);
    }

    #[test]
    fn test_climb_out_overrides_altitude() {
        let mut gen = WpGen::new(Params::default());

        // Goal almost directly overhead
        update(
            &mut gen,
            Vector3::new(0.0, 0.0, 1.0),
            0.7,
            Vector3::new(0.3, 0.2, 10.0),
            timestamp(0.0),
        );

        let mut dec = decision(WaypointType::Direct);
        dec.reach_altitude = false;
        dec.offboard_position_m = Vector3::new(0.0, 0.0, 5.0);
        gen.set_planner_decision(dec);

        let result = gen.generate(timestamp(0.0)).unwrap();

        // Incremental climb: exactly half a meter above the current
        // altitude, never the final altitude
        assert!((result.smoothed_goto_position_m.z - 1.5).abs() < 1e-12);

        // Smoothing is bypassed entirely
        assert!(
            (result.adapted_goto_position_m - result.smoothed_goto_position_m).norm() < 1e-12
        );
        assert!((result.goto_position_m - result.smoothed_goto_position_m).norm() < 1e-12);

        // No yaw change for a goal directly overhead
        assert!((result.position_waypoint.yaw_rad - 0.7).abs() < 1e-12);
    }

    #[test]
    fn test_go_back_holds_altitude_and_yaw() {
        let mut gen = WpGen::new(Params::default());
        let goal = Vector3::new(10.0, 0.0, 2.0);

        // A first cycle establishes the previous yaw
        update(&mut gen, Vector3::new(2.0, 0.0, 2.0), 0.4, goal, timestamp(0.0));
        gen.set_planner_decision(decision(WaypointType::Direct));
        gen.generate(timestamp(0.0)).unwrap();

        // Back off away from the anchor, holding the start altitude
        update(&mut gen, Vector3::new(2.0, 0.0, 2.0), 0.9, goal, timestamp(0.1));
        let mut dec = decision(WaypointType::GoBack);
        dec.back_off_point_m = Vector3::new(1.0, 0.0, 2.0);
        dec.back_off_start_point_m = Vector3::new(1.0, 0.0, 3.0);
        gen.set_planner_decision(dec);

        let result = gen.generate(timestamp(0.1)).unwrap();

        assert_eq!(result.waypoint_type, WaypointType::GoBack);
        assert!(
            (result.position_waypoint.position_m - Vector3::new(2.5, 0.0, 3.0)).norm() < 1e-12
        );

        // Yaw held at the previous cycle's value
        assert!((result.position_waypoint.yaw_rad - 0.4).abs() < 1e-12);

        // Velocity command is the raw positional delta
        assert!(
            (result.velocity_waypoint.linear - Vector3::new(0.5, 0.0, 1.0)).norm() < 1e-12
        );
    }

    #[test]
    fn test_degenerate_dt_is_safe() {
        let mut gen = WpGen::new(Params::default());
        let goal = Vector3::new(10.0, 0.0, 0.0);

        update(&mut gen, Vector3::zeros(), 0.0, goal, timestamp(1.0));
        gen.set_planner_decision(decision(WaypointType::Direct));
        gen.generate(timestamp(1.0)).unwrap();

        // The clock does not advance between cycles, dt falls back to the
        // nominal tick and nothing blows up
        update(&mut gen, Vector3::zeros(), 0.0, goal, timestamp(1.0));
        gen.set_planner_decision(decision(WaypointType::Direct));
        let result = gen.generate(timestamp(1.0)).unwrap();

        assert!(result.position_waypoint.position_m.iter().all(|c| c.is_finite()));
        assert!(result.smoothed_goto_position_m.iter().all(|c| c.is_finite()));
        assert!(result.velocity_waypoint.linear.iter().all(|c| c.is_finite()));
        assert!(result.velocity_waypoint.angular_z_rads.is_finite());
    }

    /// Closed loop run against a point mass vehicle model: the generator
    /// must drive the vehicle monotonically towards the goal and lock the
    /// output onto the goal once inside the acceptance radius.
    #[test]
    fn test_goal_approach_closed_loop() {
        let mut gen = WpGen::new(Params::default());
        let goal = Vector3::new(10.0, 0.0, 0.0);
        let dt_s = 0.1;
        let max_speed_mps = 2.0;

        let mut position = Vector3::<f64>::zeros();
        let mut vel = Vector3::<f64>::zeros();
        let mut yaw = 0.0;
        let mut last_dist = (goal - position).norm();
        let mut reached_cycle = None;

        for cycle in 0..600 {
            let now = timestamp(cycle as f64 * dt_s);

            gen.update_state(
                &Pose::from_position_and_yaw(position, yaw),
                goal,
                vel,
                false,
                now,
            );
            gen.set_planner_decision(decision(WaypointType::Direct));
            let result = gen.generate(now).unwrap();

            // Vehicle tracks the waypoint with a speed-capped step
            let mut step = result.position_waypoint.position_m - position;
            let max_step = max_speed_mps * dt_s;
            if step.norm() > max_step {
                step = step.normalize() * max_step;
            }
            position += step;
            vel = step / dt_s;
            yaw = result.position_waypoint.yaw_rad;

            // Monotonic approach, no overshoot past the goal
            let dist = (goal - position).norm();
            assert!(
                dist <= last_dist + 1e-9,
                "distance increased at cycle {}: {} -> {}",
                cycle,
                last_dist,
                dist
            );
            last_dist = dist;

            if gen.is_reached_goal() {
                // Output locks exactly onto the goal
                assert!((result.position_waypoint.position_m - goal).norm() < 1e-12);
                reached_cycle = Some(cycle);
                break;
            }
        }

        let reached_cycle = reached_cycle.expect("goal never reached");

        // Covering 9.5 m at 2 m/s takes at least 4.75 s worth of cycles
        assert!(reached_cycle >= 47);

        // The hysteresis engaged inside the inner acceptance radius
        assert!(last_dist < Params::default().goal_acceptance_radius_in_m + max_speed_mps * dt_s);
    }

    #[test]
    fn test_generate_without_inputs_is_an_error() {
        let mut gen = WpGen::new(Params::default());
        assert!(matches!(
            gen.generate(timestamp(0.0)),
            Err(WpGenError::NoStateUpdate)
        ));

        update(
            &mut gen,
            Vector3::zeros(),
            0.0,
            Vector3::new(1.0, 0.0, 0.0),
            timestamp(0.0),
        );
        assert!(matches!(
            gen.generate(timestamp(0.0)),
            Err(WpGenError::NoPlannerDecision)
        ));
    }
}
