// src/retention/mod.rs

pub mod sweeper;

pub use sweeper::{RetentionSweeper, SweepReport};
