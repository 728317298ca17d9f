//! Infrastructure adapters and runtime bootstrap.

pub mod bootstrap;
pub mod db;
pub mod dynamodb;
pub mod error;
pub mod memory;
pub mod telemetry;
