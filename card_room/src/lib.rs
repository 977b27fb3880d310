//! # card_room
//!
//! The authoritative engine and session coordinator for a multi-room,
//! real-time No-Limit Texas Hold'em service. Games are created ad hoc,
//! addressed by a six-character room code, and persisted to an external
//! store so any process restart resumes mid-hand.
//!
//! ## Architecture
//!
//! - [`game`] — cards, hand evaluation, blind schedules, and the
//!   deterministic poker state machine. Pure in-memory; never suspends.
//! - [`lobby`] — the pre-start game record, room codes, and PIN auth.
//! - [`store`] — the persistence trait with PostgreSQL and in-memory
//!   backends. JSON round trips are the contract: a state that does not
//!   rehydrate identically is a bug.
//! - [`session`] — the coordinator that serializes every mutation on a
//!   per-game FIFO mutex, plus the turn-timeout/auto-deal timer driver
//!   and the stale-game sweeper.
//! - [`net`] — the connection registry that fans viewer-filtered state
//!   out to players and spectators over any duplex channel.
//!
//! The HTTP/WebSocket surface lives in the companion `cr_server` crate
//! and stays deliberately thin: all rules and consistency guarantees are
//! here.

pub mod errors;
pub mod game;
pub mod lobby;
pub mod net;
pub mod session;
pub mod store;

pub use errors::ServiceError;
pub use game::{Action, EngineView, GameEngine, GameSettings};
pub use lobby::{LobbyRecord, LobbyView, NewGameRequest};
pub use net::{ConnectionRegistry, MessageChannel};
pub use session::{Credentials, GameCoordinator, StaleGameSweeper, TimerDriver};
pub use store::{GameStore, MemoryStore, PostgresStore};
