#![warn(missing_docs)]
//! Relaywatch monitors a fleet of network relays and emails watchers when a
//! relay goes down, runs an out-of-date release, drops below a bandwidth
//! threshold, or earns the sustained-uptime reward.

pub mod cmd;
pub mod config;
pub mod context;
pub mod engine;
pub mod models;
pub mod notifier;
pub mod persistence;
pub mod providers;
pub mod supervisor;
pub mod test_helpers;
