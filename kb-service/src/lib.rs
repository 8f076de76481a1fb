//! Knowledge-base chat service.
//!
//! Each user message is routed either to a grounded answer built from one
//! sitemap page or to a general-knowledge answer, and the exchange is
//! recorded in a per-session transcript.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod startup;
pub mod workflow;
