pub mod common;
pub mod config;
pub mod telemetry;
pub mod web;
