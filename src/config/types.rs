//! Configuration type definitions.

use serde::Deserialize;

/// Root configuration structure.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub connection: ConnectionConfig,
    #[serde(default)]
    pub reconnect: ReconnectConfig,
    #[serde(default)]
    pub heartbeat: HeartbeatConfig,
    pub chat: ChatConfig,
    #[serde(default)]
    pub filter: FilterConfig,
    #[serde(default)]
    pub binding: BindingConfig,
    #[serde(default)]
    pub force_bind: ForceBindConfig,
    #[serde(default)]
    pub status: StatusConfig,
    #[serde(default)]
    pub performance: PerformanceConfig,
    #[serde(default)]
    pub formats: FormatsConfig,
    #[serde(default)]
    pub commands: Vec<CommandConfig>,
}

/// Chat platform connection settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionConfig {
    /// WebSocket endpoint of the OneBot implementation, e.g. `ws://localhost:6700`.
    pub endpoint: String,
    /// Optional bearer token sent as an `Authorization` header.
    #[serde(default)]
    pub access_token: Option<String>,
}

/// Reconnect policy after a dropped connection.
///
/// A single attempt is scheduled per disconnect; `max_attempts` is accepted
/// for compatibility but not enforced beyond that one attempt.
#[derive(Debug, Clone, Deserialize)]
pub struct ReconnectConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_reconnect_delay")]
    pub delay_secs: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            delay_secs: default_reconnect_delay(),
            max_attempts: default_max_attempts(),
        }
    }
}

/// Liveness probe settings.
#[derive(Debug, Clone, Deserialize)]
pub struct HeartbeatConfig {
    #[serde(default = "default_heartbeat_interval")]
    pub interval_secs: u64,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_heartbeat_interval(),
        }
    }
}

/// Which external channels and principals the bridge serves.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatConfig {
    /// Group channels relayed to and from the game.
    pub groups: Vec<i64>,
    /// External identities allowed to run admin-only commands.
    #[serde(default)]
    pub admins: Vec<i64>,
    #[serde(default = "default_command_prefix")]
    pub command_prefix: String,
}

/// Inbound message filtering settings.
#[derive(Debug, Clone, Deserialize)]
pub struct FilterConfig {
    #[serde(default = "default_max_length")]
    pub max_length: usize,
    #[serde(default)]
    pub allow_empty: bool,
    #[serde(default = "default_true")]
    pub allow_pure_image: bool,
    /// Messages admitted per sender per 60-second window.
    #[serde(default = "default_rate_limit")]
    pub rate_limit: u32,
    /// Words replaced by the mask character, applied in order.
    #[serde(default)]
    pub words: Vec<String>,
    #[serde(default = "default_mask")]
    pub mask: String,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            max_length: default_max_length(),
            allow_empty: false,
            allow_pure_image: true,
            rate_limit: default_rate_limit(),
            words: Vec::new(),
            mask: default_mask(),
        }
    }
}

/// Account binding mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BindMode {
    Direct,
    Verify,
}

/// Verification code alphabet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodeFormat {
    Numeric,
    Alphanumeric,
}

/// Account binding settings.
#[derive(Debug, Clone, Deserialize)]
pub struct BindingConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_bind_mode")]
    pub mode: BindMode,
    /// Game identities one external identity may own.
    #[serde(default = "default_max_bindings")]
    pub max_bindings: usize,
    #[serde(default = "default_code_length")]
    pub code_length: usize,
    #[serde(default = "default_code_format")]
    pub code_format: CodeFormat,
    #[serde(default = "default_expiry_minutes")]
    pub expiry_minutes: u64,
    /// Path of the persisted game-identity -> external-identity map.
    #[serde(default = "default_binding_file")]
    pub file: String,
}

impl Default for BindingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            mode: default_bind_mode(),
            max_bindings: default_max_bindings(),
            code_length: default_code_length(),
            code_format: default_code_format(),
            expiry_minutes: default_expiry_minutes(),
            file: default_binding_file(),
        }
    }
}

/// Enforcement against players who have not completed binding.
#[derive(Debug, Clone, Deserialize)]
pub struct ForceBindConfig {
    #[serde(default)]
    pub enabled: bool,
    /// When false, unbound players are kicked on join instead of after a delay.
    #[serde(default = "default_true")]
    pub allow_join: bool,
    #[serde(default = "default_kick_delay")]
    pub kick_delay_secs: u64,
    #[serde(default = "default_remind_interval")]
    pub remind_interval_secs: u64,
    /// `{time}` expands to the kick delay in seconds.
    #[serde(default = "default_join_message")]
    pub join_message: String,
    #[serde(default = "default_kick_message")]
    pub kick_message: String,
}

impl Default for ForceBindConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            allow_join: true,
            kick_delay_secs: default_kick_delay(),
            remind_interval_secs: default_remind_interval(),
            join_message: default_join_message(),
            kick_message: default_kick_message(),
        }
    }
}

/// Server status summary settings.
#[derive(Debug, Clone, Deserialize)]
pub struct StatusConfig {
    /// Per-channel cooldown of the status action, independent of command cooldowns.
    #[serde(default = "default_status_cooldown")]
    pub cooldown_secs: u64,
    #[serde(default = "default_true")]
    pub show_tps: bool,
    #[serde(default = "default_true")]
    pub show_memory: bool,
    #[serde(default = "default_true")]
    pub show_player_list: bool,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            cooldown_secs: default_status_cooldown(),
            show_tps: true,
            show_memory: true,
            show_player_list: true,
        }
    }
}

/// Periodic host performance checks.
#[derive(Debug, Clone, Deserialize)]
pub struct PerformanceConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_performance_interval")]
    pub interval_secs: u64,
    #[serde(default = "default_tps_warning")]
    pub tps_warning: f64,
    #[serde(default = "default_memory_warning")]
    pub memory_warning_percent: u64,
    /// Also broadcast warnings to the configured external channels.
    #[serde(default = "default_true")]
    pub send_warnings: bool,
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_secs: default_performance_interval(),
            tps_warning: default_tps_warning(),
            memory_warning_percent: default_memory_warning(),
            send_warnings: true,
        }
    }
}

/// Relay message formats. `{sender}`, `{player}`, `{message}` and `{time}`
/// placeholders.
#[derive(Debug, Clone, Deserialize)]
pub struct FormatsConfig {
    #[serde(default = "default_chat_to_game")]
    pub chat_to_game: String,
    #[serde(default = "default_game_to_chat")]
    pub game_to_chat: String,
    #[serde(default = "default_join_announce")]
    pub join_announce: String,
    #[serde(default = "default_quit_announce")]
    pub quit_announce: String,
}

impl Default for FormatsConfig {
    fn default() -> Self {
        Self {
            chat_to_game: default_chat_to_game(),
            game_to_chat: default_game_to_chat(),
            join_announce: default_join_announce(),
            quit_announce: default_quit_announce(),
        }
    }
}

/// One configured command.
#[derive(Debug, Clone, Deserialize)]
pub struct CommandConfig {
    pub name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub permission: String,
    #[serde(default)]
    pub cooldown_secs: u64,
    #[serde(default)]
    pub admin_only: bool,
    /// Action templates expanded with `{argN}` / `{args}` at invocation time.
    #[serde(default)]
    pub actions: Vec<String>,
}

fn default_true() -> bool {
    true
}

fn default_reconnect_delay() -> u64 {
    30
}

fn default_max_attempts() -> u32 {
    5
}

fn default_heartbeat_interval() -> u64 {
    30
}

fn default_command_prefix() -> String {
    "!".to_string()
}

fn default_max_length() -> usize {
    500
}

fn default_rate_limit() -> u32 {
    60
}

fn default_mask() -> String {
    "*".to_string()
}

fn default_bind_mode() -> BindMode {
    BindMode::Direct
}

fn default_max_bindings() -> usize {
    1
}

fn default_code_length() -> usize {
    6
}

fn default_code_format() -> CodeFormat {
    CodeFormat::Numeric
}

fn default_expiry_minutes() -> u64 {
    5
}

fn default_binding_file() -> String {
    "bindings.json".to_string()
}

fn default_kick_delay() -> u64 {
    300
}

fn default_remind_interval() -> u64 {
    60
}

fn default_join_message() -> String {
    "Please bind your account within {time} seconds or you will be disconnected.".to_string()
}

fn default_kick_message() -> String {
    "You must bind your account before playing on this server.".to_string()
}

fn default_status_cooldown() -> u64 {
    30
}

fn default_performance_interval() -> u64 {
    300
}

fn default_tps_warning() -> f64 {
    18.0
}

fn default_memory_warning() -> u64 {
    80
}

fn default_chat_to_game() -> String {
    "[Chat] {sender}: {message}".to_string()
}

fn default_game_to_chat() -> String {
    "{player}: {message}".to_string()
}

fn default_join_announce() -> String {
    "+ {player} joined the server".to_string()
}

fn default_quit_announce() -> String {
    "- {player} left the server".to_string()
}
