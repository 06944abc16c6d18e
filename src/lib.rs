//! Rategate - Rate limit policy compiler
//!
//! This crate validates a declarative rate limiting configuration (an
//! upstream, a list of routes and optional header-based rate dimensions) and
//! compiles it into an immutable policy set for a reverse proxy engine to
//! enforce.

pub mod config;
pub mod error;
pub mod policy;
