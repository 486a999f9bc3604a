//! Position vacancy analysis and deactivation workflows over an HR directory.

pub mod config;
pub mod directory;
pub mod domain;
pub mod error;
pub mod telemetry;
pub mod workflows;
