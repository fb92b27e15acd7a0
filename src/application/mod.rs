//! Application services: event administration, registration and certificate issuance.

pub mod certificates;
pub mod error;
pub mod events;
pub mod mailer;
pub mod registration;
pub mod repos;
pub mod scheduler;
