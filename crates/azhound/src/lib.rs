#![doc = include_str!("../README.md")]

pub mod client;
pub mod collector;
pub mod config;
pub mod shutdown;
pub mod sink;
pub mod telemetry;
