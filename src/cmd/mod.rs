//! CLI subcommands.

pub mod cycle;

pub use cycle::CycleArgs;
