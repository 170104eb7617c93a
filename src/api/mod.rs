//! API module for the MediLink ML service
//!
//! This module contains all HTTP-facing functionality.

pub mod handlers;
pub mod middleware;
pub mod routes;

pub use routes::configure;
