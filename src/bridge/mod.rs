//! Bridge between the chat platform and the game server.
//!
//! - `filter`: admissibility and sanitization of inbound chat
//! - `commands`: command table, cooldowns and template expansion
//! - `orchestrator`: the `Bridge` struct routing events between both sides

pub mod commands;
pub mod filter;
pub mod orchestrator;

pub use commands::CommandRegistry;
pub use filter::FilterEngine;
pub use orchestrator::Bridge;
