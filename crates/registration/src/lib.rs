//! Course registration campaigns.
//!
//! Administrators upload enrollment rules (school/grade/curriculum to course)
//! and session options per campaign, end users submit a registration form
//! bundled with a survey, and admins export the resulting roster as CSV.
//! Persistence, user lookup, and enrollment management are collaborator
//! traits so deployments can plug in their own backends.

pub mod config;
pub mod error;
pub mod registration;
pub mod telemetry;
