//! HTTP handlers for the knowledge-base service.

pub mod chat;
pub mod health;
pub mod session;
