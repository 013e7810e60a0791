//! Console host adapter.
//!
//! A stand-in game server for running the bridge without a host engine:
//! game-side effects are logged, and stdin lines drive the bridge's inbound
//! hooks (`join <name>`, `quit <name>`, `chat <name> <text>`,
//! `verify <name> <code>`).

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

use crate::bridge::Bridge;
use crate::game::{GameServer, MemoryUsage, PerformanceSource};

/// Development host: tracks joined players, logs everything else.
pub struct ConsoleHost {
    players: Mutex<HashSet<String>>,
    max_players: usize,
}

impl ConsoleHost {
    pub fn new() -> Self {
        Self {
            players: Mutex::new(HashSet::new()),
            max_players: 20,
        }
    }

    fn player_joined(&self, player: &str) {
        self.players.lock().unwrap().insert(player.to_string());
    }

    fn player_left(&self, player: &str) {
        self.players.lock().unwrap().remove(player);
    }
}

impl Default for ConsoleHost {
    fn default() -> Self {
        Self::new()
    }
}

impl GameServer for ConsoleHost {
    fn broadcast(&self, message: &str) {
        info!(target: "game", "[broadcast] {}", message);
    }

    fn send_to_player(&self, player: &str, message: &str) {
        info!(target: "game", "[to {}] {}", player, message);
    }

    fn kick_player(&self, player: &str, reason: &str) {
        info!(target: "game", "[kick {}] {}", player, reason);
        self.player_left(player);
    }

    fn is_online(&self, player: &str) -> bool {
        self.players.lock().unwrap().contains(player)
    }

    fn online_players(&self) -> Vec<String> {
        let mut players: Vec<String> = self.players.lock().unwrap().iter().cloned().collect();
        players.sort();
        players
    }

    fn max_players(&self) -> usize {
        self.max_players
    }

    fn whitelist_add(&self, player: &str) {
        info!(target: "game", "[whitelist add] {}", player);
    }

    fn whitelist_remove(&self, player: &str) {
        info!(target: "game", "[whitelist remove] {}", player);
    }
}

impl PerformanceSource for ConsoleHost {
    /// Fixed placeholder figures; a real host reports live values.
    fn ticks_per_second(&self) -> f64 {
        20.0
    }

    fn memory_usage(&self) -> MemoryUsage {
        MemoryUsage {
            used_mb: 0,
            max_mb: 0,
        }
    }
}

/// Read stdin lines and feed them into the bridge as game-side events.
pub async fn run_console_input(host: Arc<ConsoleHost>, bridge: Arc<Bridge>) {
    let stdin = tokio::io::stdin();
    let mut lines = BufReader::new(stdin).lines();

    while let Ok(Some(line)) = lines.next_line().await {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let mut parts = line.splitn(3, ' ');
        match (parts.next(), parts.next(), parts.next()) {
            (Some("join"), Some(name), _) => {
                host.player_joined(name);
                bridge.on_player_join(name);
            }
            (Some("quit"), Some(name), _) => {
                host.player_left(name);
                bridge.on_player_quit(name);
            }
            (Some("chat"), Some(name), Some(text)) => {
                bridge.on_player_chat(name, text);
            }
            (Some("verify"), Some(name), Some(code)) => {
                bridge.on_player_verify(name, code);
            }
            _ => {
                info!("console commands: join <name> | quit <name> | chat <name> <text> | verify <name> <code>");
            }
        }
    }
}
