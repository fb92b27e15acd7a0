//! Event registration and certificate issuance service.

pub mod application;
pub mod config;
pub mod domain;
pub mod infra;
