//! Main guidance executable entry point.
//!
//! # Architecture
//!
//! This executable runs the waypoint generator against a point mass vehicle
//! model in a closed loop, standing in for the flight stack:
//!
//!     - Initialise the session, logger and parameters
//!     - Main loop:
//!         - Vehicle state update from the model
//!         - Planner decision injection
//!         - Waypoint generation
//!         - Vehicle model propagation towards the commanded waypoint
//!
//! The per-cycle generation results are dumped as a JSON trace into the
//! session directory for offline inspection.

// ---------------------------------------------------------------------------
// USE MODULES FROM LIBRARY
// ---------------------------------------------------------------------------

use guid_lib::loc::Pose;
use guid_lib::wp_gen::{GenerationResult, PlannerDecision, WaypointType, WpGen};

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use chrono::{DateTime, Duration, Utc};
use color_eyre::{eyre::WrapErr, Report};
use log::{info, warn};
use nalgebra::Vector3;
use serde::Deserialize;
use std::fs::File;

// Internal
use util::{
    logger::{logger_init, LevelFilter},
    raise_error,
    session::Session,
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for the closed loop simulation driving the generator.
#[derive(Debug, Deserialize)]
struct SimParams {
    /// Period of one control cycle.
    ///
    /// Units: seconds
    pub cycle_period_s: f64,

    /// Maximum number of cycles to run before giving up on the goal.
    pub num_cycles: usize,

    /// Start position of the vehicle.
    ///
    /// Units: meters
    pub start_position_m: [f64; 3],

    /// Goal position for the run.
    ///
    /// Units: meters
    pub goal_position_m: [f64; 3],

    /// Maximum cruise speed handed to the generator.
    ///
    /// Units: meters/second
    pub max_speed_mps: f64,

    /// Minimum cruise speed handed to the generator.
    ///
    /// Units: meters/second
    pub min_speed_mps: f64,

    /// Cruise speed ramp rate handed to the generator.
    ///
    /// Units: meters/second/second
    pub velocity_slope_mps2: f64,
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {
    // ---- EARLY INITIALISATION ----

    // Initialise session
    let session = Session::new("guid_exec", "sessions").wrap_err("Failed to create the session")?;

    // Initialise logger
    logger_init(LevelFilter::Trace, &session).wrap_err("Failed to initialise logging")?;

    // Log information on this execution
    info!("Guidance Executable\n");
    info!("Session directory: {:?}\n", session.session_root);

    // ---- LOAD PARAMETERS ----

    let sim_params: SimParams =
        util::params::load("sim.toml").wrap_err("Could not load sim params")?;

    info!("Exec parameters loaded");

    if sim_params.cycle_period_s <= 0.0 {
        raise_error!("Invalid cycle period: {} s", sim_params.cycle_period_s);
    }

    // ---- INITIALISE MODULES ----

    info!("Initialising modules...");

    let mut wp_gen = WpGen::from_file("wp_gen.toml").wrap_err("Failed to initialise WpGen")?;
    info!("WpGen init complete\n");

    // ---- MAIN LOOP ----

    info!("Begining main loop\n");

    let epoch = Utc::now();
    let goal_m = Vector3::from(sim_params.goal_position_m);

    let mut position_m = Vector3::from(sim_params.start_position_m);
    let mut vel_mps = Vector3::<f64>::zeros();
    let mut yaw_rad = 0.0f64;
    let mut trace: Vec<GenerationResult> = Vec::with_capacity(sim_params.num_cycles);

    for cycle in 0..sim_params.num_cycles {
        let now: DateTime<Utc> = epoch
            + Duration::milliseconds((cycle as f64 * sim_params.cycle_period_s * 1000.0) as i64);

        // ---- DATA INPUT ----

        let pose = Pose::from_position_and_yaw(position_m, yaw_rad);
        wp_gen.update_state(&pose, goal_m, vel_mps, false, now);

        // A fixed direct-to-goal decision stands in for the local planner
        wp_gen.set_planner_decision(PlannerDecision {
            waypoint_type: WaypointType::Direct,
            max_speed_mps: sim_params.max_speed_mps,
            min_speed_mps: sim_params.min_speed_mps,
            velocity_slope: sim_params.velocity_slope_mps2,
            ..Default::default()
        });

        // ---- GUIDANCE PROCESSING ----

        let result = wp_gen.generate(now).wrap_err("Waypoint generation failed")?;

        // ---- VEHICLE MODEL PROPAGATION ----

        // Point mass tracking of the position waypoint, step capped at the
        // maximum cruise speed
        let mut step_m = result.position_waypoint.position_m - position_m;
        let max_step_m = sim_params.max_speed_mps * sim_params.cycle_period_s;
        if step_m.norm() > max_step_m {
            step_m = step_m.normalize() * max_step_m;
        }

        position_m += step_m;
        vel_mps = step_m / sim_params.cycle_period_s;
        yaw_rad = result.position_waypoint.yaw_rad;

        trace.push(result);

        if wp_gen.is_reached_goal() {
            info!(
                "Goal reached after {} cycles at [{:.3}, {:.3}, {:.3}]",
                cycle + 1,
                position_m.x,
                position_m.y,
                position_m.z
            );
            break;
        }
    }

    if !wp_gen.is_reached_goal() {
        warn!(
            "Goal not reached within {} cycles, final position: [{:.3}, {:.3}, {:.3}]",
            sim_params.num_cycles, position_m.x, position_m.y, position_m.z
        );
    }

    // ---- TRACE OUTPUT ----

    let trace_path = session.session_root.join("wp_trace.json");
    let trace_file =
        File::create(&trace_path).wrap_err("Failed to create the waypoint trace file")?;
    serde_json::to_writer_pretty(trace_file, &trace)
        .wrap_err("Failed to write the waypoint trace")?;

    info!("Waypoint trace written to {:?}", trace_path);

    Ok(())
}
