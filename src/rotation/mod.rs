// src/rotation/mod.rs

pub mod rotator;
pub mod schedule;
pub mod trigger;

pub use rotator::{RotationOutcome, Rotator, RotatorSettings};
pub use schedule::RotationSchedule;
pub use trigger::RotationTrigger;
