//! Chain-based API test execution core.
//!
//! Ingests an OpenAPI contract, resolves it into an endpoint catalog,
//! composes dependency-aware test chains and executes them against a
//! live target, recording per-step/per-case/per-run outcomes. The
//! surrounding product (dashboards, CRUD surfaces, AI chain generation)
//! supplies suite definitions and consumes the result records; it is
//! not part of this crate.

pub mod config;
pub mod error;
pub mod models;
pub mod queue;
pub mod repositories;
pub mod services;
pub mod state;
