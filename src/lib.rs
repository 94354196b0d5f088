//! Gatehouse - school portal API with house-scoped access control
//!
//! Visitors book appointments with staff, staff and students share
//! announcements and house community posts, and admins curate the campus
//! map. Every read and write passes through one policy engine keyed on the
//! caller's role and house.
//!
//! ## Layers
//!
//! - **Policy**: pure guards over principals, resources and proposals
//! - **Services**: snapshot, decide, commit; denials are audited
//! - **Stores**: in-memory or MongoDB collections behind one capability
//! - **Routes**: JSON over hyper http1

pub mod auth;
pub mod config;
pub mod db;
pub mod logging;
pub mod policy;
pub mod routes;
pub mod server;
pub mod services;
pub mod types;

pub use config::Args;
pub use server::{run, serve, AppState};
pub use types::{GatehouseError, Result};
