//! HTTP handlers shared by every service.

pub mod health;

pub use health::{HealthReport, health_check, readiness};
