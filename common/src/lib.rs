// Shared library for the feed dispatch worker

pub mod auth;
pub mod bootstrap;
pub mod config;
pub mod errors;
pub mod models;
pub mod pipeline;
pub mod publish;
pub mod schedule;
pub mod storage;
pub mod telemetry;
