//! Dispatch engine for companion chat bots.
//!
//! Inbound chat messages are routed to a bounded, resizable set of
//! long-running external text-generation processes that speak one JSON
//! object per line over stdin/stdout. Every dispatch returns a reply:
//! failures degrade to a neutral fallback answer that keeps the bot's
//! mood and affection unchanged.

pub mod cli;
pub mod config;
pub mod error;
pub mod pacer;
pub mod payload;
pub mod pool;
pub mod worker;

pub use pacer::{Dispatch, Pacer};
pub use payload::{BotProfile, BotState, Gender, RequestPayload, ResponsePayload};
pub use pool::WorkerPool;
