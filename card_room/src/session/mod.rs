//! Session layer: the coordinator that serializes all game mutations,
//! plus the background timer driver and stale-game sweeper.

pub mod coordinator;
pub mod sweeper;
pub mod timer;

pub use coordinator::{Credentials, GameCoordinator};
pub use sweeper::StaleGameSweeper;
pub use timer::TimerDriver;
