//! Event routing between the chat platform and the game server.
//!
//! Classified inbound events run through the filter, the command engine and
//! the binding store; game-side events flow the other way into outbound
//! protocol actions. Validation rejections are not errors: each produces a
//! short reply on the originating channel and processing completes normally.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::{debug, error, info};

use crate::binding::{BindOutcome, BindingNotice, BindingStore, RequestOutcome, UnbindOutcome, VerifyOutcome};
use crate::bridge::commands::{expand_actions, Command, CommandRegistry, CooldownCheck};
use crate::bridge::filter::{FilterEngine, FilterVerdict};
use crate::common::now_millis;
use crate::config::{self, ChatConfig, Config, FormatsConfig, StatusConfig};
use crate::game::{BindEnforcer, GameServer, PerformanceSource};
use crate::protocol::action::ActionSender;
use crate::protocol::event::{ChannelKind, MessageEvent, ProtocolEvent};

const NO_PERMISSION: &str = "You do not have permission to run this command.";
const BINDING_DISABLED: &str = "The binding system is not enabled.";
const PERSIST_FAILED: &str = "The operation failed, please contact an administrator.";

/// The glue between the protocol client, the game server and the stateful
/// engines. All dependencies are injected at construction time.
pub struct Bridge {
    config_path: String,
    chat: ChatConfig,
    formats: FormatsConfig,
    status: StatusConfig,
    filter: Arc<FilterEngine>,
    registry: Arc<CommandRegistry>,
    store: Arc<BindingStore>,
    enforcer: Arc<BindEnforcer>,
    game: Arc<dyn GameServer>,
    perf: Arc<dyn PerformanceSource>,
    actions: ActionSender,
    /// Channel id -> last status invocation, wall-clock millis.
    status_cooldowns: Mutex<HashMap<i64, u64>>,
}

impl Bridge {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: &Config,
        config_path: String,
        filter: Arc<FilterEngine>,
        registry: Arc<CommandRegistry>,
        store: Arc<BindingStore>,
        enforcer: Arc<BindEnforcer>,
        game: Arc<dyn GameServer>,
        perf: Arc<dyn PerformanceSource>,
        actions: ActionSender,
    ) -> Self {
        Self {
            config_path,
            chat: config.chat.clone(),
            formats: config.formats.clone(),
            status: config.status.clone(),
            filter,
            registry,
            store,
            enforcer,
            game,
            perf,
            actions,
            status_cooldowns: Mutex::new(HashMap::new()),
        }
    }

    // ==================== inbound from the chat platform ====================

    /// Route one classified event. Called sequentially by the connection
    /// task, in wire arrival order.
    pub fn handle_event(&self, event: ProtocolEvent) {
        match event {
            ProtocolEvent::Message(msg) => match msg.channel {
                ChannelKind::Group => self.handle_group_message(msg),
                ChannelKind::Private => self.handle_private_message(msg),
            },
            ProtocolEvent::Notice { kind } => debug!("Notice event: {}", kind),
            ProtocolEvent::Request { kind } => debug!("Request event: {}", kind),
            ProtocolEvent::Meta { kind } => debug!("Meta event: {}", kind),
        }
    }

    fn handle_group_message(&self, msg: MessageEvent) {
        if !self.chat.groups.contains(&msg.channel_id) {
            debug!("Ignoring message from unconfigured group {}", msg.channel_id);
            return;
        }

        let sanitized = match self.filter.evaluate(&msg.text, msg.sender_id) {
            FilterVerdict::Admit(text) => text,
            FilterVerdict::Reject(reason) => {
                debug!(
                    sender = msg.sender_id,
                    "Message rejected: {:?}", reason
                );
                self.actions.reply(&msg, reason.user_message());
                return;
            }
        };

        if sanitized.starts_with(&self.chat.command_prefix) {
            self.handle_command(&msg, &sanitized);
            return;
        }

        let line = self
            .formats
            .chat_to_game
            .replace("{sender}", &msg.sender_name)
            .replace("{message}", &sanitized)
            .replace("{time}", &current_time());
        self.game.broadcast(&line);
    }

    /// Private messages are processed only from configured admins, and only
    /// admin-only commands run there.
    fn handle_private_message(&self, msg: MessageEvent) {
        if !self.chat.admins.contains(&msg.sender_id) {
            debug!("Ignoring private message from non-admin {}", msg.sender_id);
            return;
        }
        if msg.text.starts_with(&self.chat.command_prefix) {
            self.handle_command(&msg, &msg.text);
        }
    }

    fn handle_command(&self, msg: &MessageEvent, text: &str) {
        let body = &text[self.chat.command_prefix.len()..];
        let args: Vec<String> = body.split_whitespace().map(str::to_string).collect();
        let Some(token) = args.first() else {
            return;
        };

        let Some(command) = self.registry.resolve(token) else {
            debug!("Unknown command '{}'", token);
            return;
        };

        let is_admin = self.chat.admins.contains(&msg.sender_id);
        if msg.channel == ChannelKind::Private && !command.admin_only {
            return;
        }
        if command.admin_only && !is_admin {
            self.actions.reply(msg, NO_PERMISSION);
            return;
        }

        match self.registry.check_cooldown(msg.sender_id, &command) {
            CooldownCheck::Allow => {}
            CooldownCheck::Deny { remaining_secs } => {
                self.actions.reply(
                    msg,
                    format!("Command on cooldown, try again in {}s", remaining_secs),
                );
                return;
            }
        }

        info!(
            sender = msg.sender_id,
            command = %command.name,
            "Executing command"
        );
        for action in expand_actions(&command, &args) {
            self.execute_action(&action, msg);
        }
    }

    /// Run one fully-expanded action string. The first token selects the
    /// side effect; anything unrecognized is custom DSL output with no
    /// handler and is dropped.
    fn execute_action(&self, action: &str, msg: &MessageEvent) {
        let (keyword, rest) = match action.split_once(' ') {
            Some((keyword, rest)) => (keyword, rest.trim()),
            None => (action.trim(), ""),
        };

        match keyword {
            "status" => self.send_status(msg),
            "bind" => {
                if rest.is_empty() || rest.contains("{arg") {
                    self.actions.reply(
                        msg,
                        format!("Usage: {}bind <game id>", self.chat.command_prefix),
                    );
                    return;
                }
                self.handle_bind(msg, rest.split_whitespace().next().unwrap_or(rest));
            }
            "unbind" => {
                if rest.is_empty() || rest.contains("{arg") {
                    self.actions.reply(
                        msg,
                        format!("Usage: {}unbind <game id>", self.chat.command_prefix),
                    );
                    return;
                }
                self.handle_unbind(msg, rest.split_whitespace().next().unwrap_or(rest));
            }
            "broadcast" => {
                if !rest.is_empty() && !rest.contains("{args}") {
                    self.game.broadcast(&format!("[Announcement] {}", rest));
                }
            }
            "chat_broadcast" => {
                if !rest.is_empty() && !rest.contains("{args}") {
                    for group in &self.chat.groups {
                        self.actions
                            .send_group(*group, format!("[Announcement] {}", rest));
                    }
                }
            }
            "reload" => self.handle_reload(msg),
            other => debug!("No handler for action '{}'", other),
        }
    }

    fn handle_bind(&self, msg: &MessageEvent, game_identity: &str) {
        if !self.store.enabled() {
            self.actions.reply(msg, BINDING_DISABLED);
            return;
        }

        match self.store.mode() {
            config::BindMode::Direct => match self.store.bind(msg.sender_id, game_identity) {
                Ok(BindOutcome::Bound) => {
                    self.game.whitelist_add(game_identity);
                    self.actions.reply(msg, "Binding complete!");
                }
                Ok(BindOutcome::AlreadyBoundSelf) => {
                    self.actions
                        .reply(msg, "You have already bound this game identity.");
                }
                Ok(BindOutcome::AlreadyBoundOther) => {
                    self.actions
                        .reply(msg, "That game identity is bound to another account.");
                }
                Ok(BindOutcome::LimitExceeded) => {
                    self.actions.reply(msg, "You have reached the binding limit.");
                }
                Err(e) => {
                    error!("Failed to persist binding: {}", e);
                    self.actions.reply(msg, PERSIST_FAILED);
                }
            },
            config::BindMode::Verify => {
                match self
                    .store
                    .request_verification(msg.sender_id, game_identity, now_millis())
                {
                    RequestOutcome::Code {
                        code,
                        expires_minutes,
                    } => {
                        self.game.send_to_player(
                            game_identity,
                            &format!(
                                "Your binding verification code is {} - verify within {} minute(s).",
                                code, expires_minutes
                            ),
                        );
                        self.actions.reply(
                            msg,
                            "A verification code has been sent in-game; finish binding there.",
                        );
                    }
                    RequestOutcome::AlreadyBoundSelf => {
                        self.actions
                            .reply(msg, "You have already bound this game identity.");
                    }
                    RequestOutcome::AlreadyBoundOther => {
                        self.actions
                            .reply(msg, "That game identity is bound to another account.");
                    }
                    RequestOutcome::LimitExceeded => {
                        self.actions.reply(msg, "You have reached the binding limit.");
                    }
                }
            }
        }
    }

    fn handle_unbind(&self, msg: &MessageEvent, game_identity: &str) {
        if !self.store.enabled() {
            self.actions.reply(msg, BINDING_DISABLED);
            return;
        }

        match self.store.unbind(msg.sender_id, game_identity) {
            Ok(UnbindOutcome::Unbound) => {
                self.game.whitelist_remove(game_identity);
                self.actions.reply(msg, "Unbound.");
            }
            Ok(UnbindOutcome::NotBound) => {
                self.actions.reply(msg, "That game identity is not bound.");
            }
            Ok(UnbindOutcome::NotOwner) => {
                self.actions
                    .reply(msg, "You are not allowed to unbind that game identity.");
            }
            Err(e) => {
                error!("Failed to persist unbind: {}", e);
                self.actions.reply(msg, PERSIST_FAILED);
            }
        }
    }

    /// Status summary, behind its own per-channel cooldown.
    fn send_status(&self, msg: &MessageEvent) {
        let cooldown_ms = self.status.cooldown_secs * 1000;
        if cooldown_ms > 0 {
            let now = now_millis();
            let mut cooldowns = self.status_cooldowns.lock().unwrap();
            let elapsed = now.saturating_sub(
                cooldowns.get(&msg.channel_id).copied().unwrap_or(0),
            );
            if elapsed < cooldown_ms {
                self.actions.reply(
                    msg,
                    format!(
                        "Status is on cooldown, try again in {}s",
                        (cooldown_ms - elapsed) / 1000
                    ),
                );
                return;
            }
            cooldowns.insert(msg.channel_id, now);
        }

        self.actions.reply(msg, self.build_status_summary());
    }

    fn build_status_summary(&self) -> String {
        let players = self.game.online_players();
        let mut out = String::from("Server status:\n");
        out.push_str(&format!(
            "Online players: {}/{}\n",
            players.len(),
            self.game.max_players()
        ));

        if self.status.show_tps {
            out.push_str(&format!("TPS: {:.1}\n", self.perf.ticks_per_second()));
        }
        if self.status.show_memory {
            let memory = self.perf.memory_usage();
            out.push_str(&format!("Memory: {}MB/{}MB\n", memory.used_mb, memory.max_mb));
        }
        if self.status.show_player_list && !players.is_empty() {
            out.push_str("\nOnline player list:\n");
            for player in &players {
                out.push_str(&format!("- {}\n", player));
            }
        }

        out.trim_end().to_string()
    }

    fn handle_reload(&self, msg: &MessageEvent) {
        match config::load_and_validate(&self.config_path) {
            Ok(new_config) => {
                self.registry.reload(&new_config.commands);
                self.filter.reload(&new_config.filter);
                info!("Configuration reloaded from {}", self.config_path);
                self.actions.reply(msg, "Configuration reloaded!");
            }
            Err(e) => {
                error!("Reload failed: {}", e);
                self.actions.reply(msg, "Reload failed, check the server log.");
            }
        }
    }

    // ==================== inbound from the game server ====================

    /// A player spoke in game: relay to every configured group channel.
    pub fn on_player_chat(&self, player: &str, message: &str) {
        let line = self
            .formats
            .game_to_chat
            .replace("{player}", player)
            .replace("{message}", message)
            .replace("{time}", &current_time());
        for group in &self.chat.groups {
            self.actions.send_group(*group, line.clone());
        }
    }

    pub fn on_player_join(&self, player: &str) {
        let line = self.formats.join_announce.replace("{player}", player);
        for group in &self.chat.groups {
            self.actions.send_group(*group, line.clone());
        }
        self.enforcer.on_join(player);
    }

    pub fn on_player_quit(&self, player: &str) {
        let line = self.formats.quit_announce.replace("{player}", player);
        for group in &self.chat.groups {
            self.actions.send_group(*group, line.clone());
        }
        self.enforcer.on_quit(player);
    }

    /// A player submitted a verification code in game.
    pub fn on_player_verify(&self, player: &str, code: &str) {
        if !self.store.enabled() {
            self.game.send_to_player(player, BINDING_DISABLED);
            return;
        }

        match self.store.submit_verification(player, code, now_millis()) {
            // The success path is announced via the binding notice.
            Ok(VerifyOutcome::Bound) => {}
            Ok(VerifyOutcome::NoPendingRequest) => {
                self.game
                    .send_to_player(player, "Request a binding code from the chat group first.");
            }
            Ok(VerifyOutcome::Expired) => {
                self.game
                    .send_to_player(player, "Your verification code expired, request a new one.");
            }
            Ok(VerifyOutcome::CodeMismatch) => {
                self.game
                    .send_to_player(player, "Incorrect verification code, try again.");
            }
            Err(e) => {
                error!("Failed to persist verified binding: {}", e);
                self.game.send_to_player(player, PERSIST_FAILED);
            }
        }
    }

    /// React to a published binding notice: lift any pending restriction,
    /// whitelist the player and announce the result.
    pub fn on_bind_completed(&self, notice: BindingNotice) {
        let BindingNotice::BindCompleted { game_identity, .. } = notice;

        self.enforcer.on_bound(&game_identity);
        self.game.whitelist_add(&game_identity);
        self.game.send_to_player(&game_identity, "Binding complete!");
        for group in &self.chat.groups {
            self.actions.send_group(
                *group,
                format!("Player {} has completed binding!", game_identity),
            );
        }
    }
}

/// Current local time for the `{time}` format placeholder.
fn current_time() -> String {
    chrono::Local::now().format("%H:%M:%S").to_string()
}
