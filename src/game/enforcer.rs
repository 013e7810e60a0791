//! Enforcement against players who have not completed binding.
//!
//! When force-bind is enabled, an unbound player is either refused outright
//! or given a grace period with periodic reminders before being kicked.
//! Both scheduled tasks are cancelled when the player quits or completes
//! binding.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::info;

use crate::binding::BindingStore;
use crate::common::scheduler::{Scheduler, TaskId};
use crate::config::ForceBindConfig;
use crate::game::GameServer;

const REMINDER_MESSAGE: &str = "Please complete your account binding soon.";
const BOUND_MESSAGE: &str = "Account binding complete - enjoy the game!";

pub struct BindEnforcer {
    config: ForceBindConfig,
    scheduler: Arc<Scheduler>,
    game: Arc<dyn GameServer>,
    store: Arc<BindingStore>,
    kick_tasks: Mutex<HashMap<String, TaskId>>,
    remind_tasks: Mutex<HashMap<String, TaskId>>,
}

impl BindEnforcer {
    pub fn new(
        config: ForceBindConfig,
        scheduler: Arc<Scheduler>,
        game: Arc<dyn GameServer>,
        store: Arc<BindingStore>,
    ) -> Self {
        Self {
            config,
            scheduler,
            game,
            store,
            kick_tasks: Mutex::new(HashMap::new()),
            remind_tasks: Mutex::new(HashMap::new()),
        }
    }

    /// A player joined: kick immediately or start the grace period if they
    /// are unbound.
    pub fn on_join(&self, player: &str) {
        if !self.config.enabled || self.store.is_bound(player) {
            return;
        }

        if !self.config.allow_join {
            self.game.kick_player(player, &self.config.kick_message);
            return;
        }

        let kick_delay = self.config.kick_delay_secs;
        if kick_delay == 0 {
            return;
        }

        let join_message = self
            .config
            .join_message
            .replace("{time}", &kick_delay.to_string());
        self.game.send_to_player(player, &join_message);

        if self.config.remind_interval_secs > 0 {
            let game = self.game.clone();
            let store = self.store.clone();
            let name = player.to_string();
            let remind_id = self.scheduler.schedule_repeating(
                Duration::from_secs(self.config.remind_interval_secs),
                move || {
                    let game = game.clone();
                    let store = store.clone();
                    let name = name.clone();
                    async move {
                        if game.is_online(&name) && !store.is_bound(&name) {
                            game.send_to_player(&name, REMINDER_MESSAGE);
                        }
                    }
                },
            );
            self.remind_tasks
                .lock()
                .unwrap()
                .insert(player.to_string(), remind_id);
        }

        let game = self.game.clone();
        let store = self.store.clone();
        let name = player.to_string();
        let kick_message = self.config.kick_message.clone();
        let kick_id = self
            .scheduler
            .schedule_once(Duration::from_secs(kick_delay), async move {
                // Freshly bound or already gone: nothing to do. The kick
                // raises a quit event, which cleans the task maps up.
                if game.is_online(&name) && !store.is_bound(&name) {
                    game.kick_player(&name, &kick_message);
                }
            });
        self.kick_tasks
            .lock()
            .unwrap()
            .insert(player.to_string(), kick_id);

        info!(
            "Player '{}' is unbound - kicking in {}s unless they bind",
            player, kick_delay
        );
    }

    /// A player quit: drop any scheduled enforcement.
    pub fn on_quit(&self, player: &str) {
        self.cancel_tasks(player);
    }

    /// A player completed binding: drop the pending restriction.
    pub fn on_bound(&self, player: &str) {
        self.cancel_tasks(player);
        if self.game.is_online(player) {
            self.game.send_to_player(player, BOUND_MESSAGE);
        }
    }

    fn cancel_tasks(&self, player: &str) {
        if let Some(id) = self.kick_tasks.lock().unwrap().remove(player) {
            self.scheduler.cancel(id);
        }
        if let Some(id) = self.remind_tasks.lock().unwrap().remove(player) {
            self.scheduler.cancel(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BindMode, BindingConfig, CodeFormat};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::mpsc;

    /// Records kicks and messages instead of touching a real server.
    struct RecordingGame {
        online: Mutex<HashMap<String, bool>>,
        kicks: Mutex<Vec<String>>,
        messages: AtomicUsize,
    }

    impl RecordingGame {
        fn new(players: &[&str]) -> Self {
            Self {
                online: Mutex::new(
                    players.iter().map(|p| (p.to_string(), true)).collect(),
                ),
                kicks: Mutex::new(Vec::new()),
                messages: AtomicUsize::new(0),
            }
        }

        fn kicked(&self) -> Vec<String> {
            self.kicks.lock().unwrap().clone()
        }
    }

    impl GameServer for RecordingGame {
        fn broadcast(&self, _message: &str) {}

        fn send_to_player(&self, _player: &str, _message: &str) {
            self.messages.fetch_add(1, Ordering::SeqCst);
        }

        fn kick_player(&self, player: &str, _reason: &str) {
            self.kicks.lock().unwrap().push(player.to_string());
            self.online.lock().unwrap().insert(player.to_string(), false);
        }

        fn is_online(&self, player: &str) -> bool {
            self.online.lock().unwrap().get(player).copied().unwrap_or(false)
        }

        fn online_players(&self) -> Vec<String> {
            Vec::new()
        }

        fn max_players(&self) -> usize {
            20
        }

        fn whitelist_add(&self, _player: &str) {}

        fn whitelist_remove(&self, _player: &str) {}
    }

    fn make_store(tag: &str) -> Arc<BindingStore> {
        let path = std::env::temp_dir().join(format!(
            "herald-enforcer-{}-{}.json",
            tag,
            std::process::id()
        ));
        let _ = std::fs::remove_file(&path);
        let (tx, _rx) = mpsc::unbounded_channel();
        Arc::new(
            BindingStore::open(
                BindingConfig {
                    enabled: true,
                    mode: BindMode::Direct,
                    max_bindings: 1,
                    code_length: 6,
                    code_format: CodeFormat::Numeric,
                    expiry_minutes: 5,
                    file: path.display().to_string(),
                },
                tx,
            )
            .unwrap(),
        )
    }

    fn make_config() -> ForceBindConfig {
        ForceBindConfig {
            enabled: true,
            allow_join: true,
            kick_delay_secs: 30,
            remind_interval_secs: 10,
            join_message: "bind within {time}s".to_string(),
            kick_message: "unbound".to_string(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_immediate_kick_when_join_disallowed() {
        let game = Arc::new(RecordingGame::new(&["Eve"]));
        let mut config = make_config();
        config.allow_join = false;

        let enforcer = BindEnforcer::new(
            config,
            Arc::new(Scheduler::new()),
            game.clone(),
            make_store("nojoin"),
        );
        enforcer.on_join("Eve");

        assert_eq!(game.kicked(), vec!["Eve"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delayed_kick_fires_for_unbound_player() {
        let game = Arc::new(RecordingGame::new(&["Eve"]));
        let enforcer = BindEnforcer::new(
            make_config(),
            Arc::new(Scheduler::new()),
            game.clone(),
            make_store("delayed"),
        );

        enforcer.on_join("Eve");
        assert!(game.kicked().is_empty());
        // The grace-period notice went out on join.
        assert_eq!(game.messages.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(game.kicked(), vec!["Eve"]);
        // Reminders fired every 10s during the 30s grace period.
        assert!(game.messages.load(Ordering::SeqCst) > 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_bound_player_is_left_alone() {
        let game = Arc::new(RecordingGame::new(&["Faith"]));
        let store = make_store("bound");
        store.bind(1001, "Faith").unwrap();

        let enforcer = BindEnforcer::new(
            make_config(),
            Arc::new(Scheduler::new()),
            game.clone(),
            store,
        );
        enforcer.on_join("Faith");

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(game.kicked().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_binding_during_grace_cancels_kick() {
        let game = Arc::new(RecordingGame::new(&["Eve"]));
        let enforcer = BindEnforcer::new(
            make_config(),
            Arc::new(Scheduler::new()),
            game.clone(),
            make_store("grace"),
        );

        enforcer.on_join("Eve");
        tokio::time::sleep(Duration::from_secs(5)).await;
        enforcer.on_bound("Eve");

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(game.kicked().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_quit_cancels_pending_kick() {
        let game = Arc::new(RecordingGame::new(&["Eve"]));
        let enforcer = BindEnforcer::new(
            make_config(),
            Arc::new(Scheduler::new()),
            game.clone(),
            make_store("quit"),
        );

        enforcer.on_join("Eve");
        enforcer.on_quit("Eve");

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(game.kicked().is_empty());
    }
}
