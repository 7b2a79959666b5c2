// Reloop - Recycling Pickup Platform Core
//
// This crate provides the backend core for connecting waste-generating
// company branches with recycling factories: material matchmaking, the
// pickup lifecycle state machine, recurring-pickup scheduling, and the
// scheduled jobs that advance pickups through their time slots.
//
// Everything UI-facing lives elsewhere; this crate only exposes the data
// it reads and writes plus a thin JSON API over the domain operations.

pub mod common;
pub mod config;
pub mod domains;
pub mod kernel;
pub mod server;

pub use config::*;
