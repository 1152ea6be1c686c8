//! # Guidance library
//!
//! This library implements the final stage of the local planning pipeline:
//! turning the decision made by the upstream obstacle avoidance planner
//! into a kinematically admissible waypoint and velocity command, once per
//! control cycle.
//!
//! The library is split into two modules:
//!
//! - [`loc`] - pose and localisation types shared by the guidance modules.
//! - [`wp_gen`] - the waypoint generation module itself.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod loc;
pub mod wp_gen;
