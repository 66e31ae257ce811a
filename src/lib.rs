//! Polls a message queue and forwards every message as an event to a rule
//! engine, acknowledging messages only after their event was taken.

pub mod error;
pub mod health;
pub mod models;
pub mod services;

pub use error::{ConnectorError, EmitError};
