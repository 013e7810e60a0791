//! Host game-server seams and game-side components.
//!
//! The core never inspects host engine internals. These narrow capabilities
//! are implemented by the host-specific collaborator and injected at
//! construction time.

pub mod console;
pub mod enforcer;
pub mod monitor;

pub use console::ConsoleHost;
pub use enforcer::BindEnforcer;
pub use monitor::PerformanceMonitor;

/// Memory usage snapshot of the host process.
#[derive(Debug, Clone, Copy)]
pub struct MemoryUsage {
    pub used_mb: u64,
    pub max_mb: u64,
}

/// Mutating surface of the game server.
///
/// Implementations are responsible for marshaling each call onto the host's
/// designated execution context; callers may invoke them from the network
/// task and must never be blocked by them.
pub trait GameServer: Send + Sync {
    /// Broadcast a chat line to every connected player.
    fn broadcast(&self, message: &str);

    /// Send a chat line to one player. A no-op for offline players.
    fn send_to_player(&self, player: &str, message: &str);

    /// Disconnect a player with a reason shown to them.
    fn kick_player(&self, player: &str, reason: &str);

    fn is_online(&self, player: &str) -> bool;

    fn online_players(&self) -> Vec<String>;

    fn max_players(&self) -> usize;

    /// Grant a player access to the server's allow list.
    fn whitelist_add(&self, player: &str);

    /// Revoke a player's allow-list entry.
    fn whitelist_remove(&self, player: &str);
}

/// Read-only host performance figures.
pub trait PerformanceSource: Send + Sync {
    fn ticks_per_second(&self) -> f64;

    fn memory_usage(&self) -> MemoryUsage;
}
