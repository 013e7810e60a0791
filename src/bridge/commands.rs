//! Command table, alias resolution, cooldowns and template expansion.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use crate::common::now_millis;
use crate::config::CommandConfig;

/// A configured command definition. Immutable once a table snapshot is
/// published.
#[derive(Debug, Clone)]
pub struct Command {
    pub name: String,
    /// Alternate names; resolution goes through the registry's alias table.
    #[allow(dead_code)]
    pub aliases: Vec<String>,
    /// Permission tag carried from configuration. Gating is the caller's
    /// responsibility; the registry performs no permission checks itself.
    #[allow(dead_code)]
    pub permission: String,
    pub cooldown_secs: u64,
    pub admin_only: bool,
    pub actions: Vec<String>,
}

/// Cooldown gate result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CooldownCheck {
    Allow,
    Deny { remaining_secs: u64 },
}

struct CommandTable {
    commands: HashMap<String, Arc<Command>>,
    aliases: HashMap<String, String>,
}

impl CommandTable {
    fn build(defs: &[CommandConfig]) -> Self {
        let mut commands = HashMap::new();
        let mut aliases = HashMap::new();

        for def in defs {
            let name = def.name.to_lowercase();
            for alias in &def.aliases {
                aliases.insert(alias.to_lowercase(), name.clone());
            }
            commands.insert(
                name.clone(),
                Arc::new(Command {
                    name,
                    aliases: def.aliases.clone(),
                    permission: def.permission.clone(),
                    cooldown_secs: def.cooldown_secs,
                    admin_only: def.admin_only,
                    actions: def.actions.clone(),
                }),
            );
        }

        Self { commands, aliases }
    }
}

/// Resolves typed command names to definitions and gates invocations on
/// per-(sender, command) cooldowns.
pub struct CommandRegistry {
    table: RwLock<CommandTable>,
    /// (sender, command name) -> last invocation, wall-clock millis.
    cooldowns: Mutex<HashMap<(i64, String), u64>>,
}

impl CommandRegistry {
    pub fn from_config(defs: &[CommandConfig]) -> Self {
        Self {
            table: RwLock::new(CommandTable::build(defs)),
            cooldowns: Mutex::new(HashMap::new()),
        }
    }

    /// Resolve a typed token, case-insensitively: canonical names first,
    /// then the alias table.
    pub fn resolve(&self, token: &str) -> Option<Arc<Command>> {
        let token = token.to_lowercase();
        let table = self.table.read().unwrap();

        if let Some(command) = table.commands.get(&token) {
            return Some(command.clone());
        }
        table
            .aliases
            .get(&token)
            .and_then(|name| table.commands.get(name))
            .cloned()
    }

    /// Cooldown gate with the current wall clock.
    pub fn check_cooldown(&self, sender_id: i64, command: &Command) -> CooldownCheck {
        self.check_cooldown_at(sender_id, command, now_millis())
    }

    /// Cooldown gate at an explicit time.
    ///
    /// The check and the last-invocation update happen under one lock, so
    /// the read-modify-write is atomic per (sender, command). On `Allow`
    /// the invocation time is recorded immediately.
    pub fn check_cooldown_at(
        &self,
        sender_id: i64,
        command: &Command,
        now_ms: u64,
    ) -> CooldownCheck {
        if command.cooldown_secs == 0 {
            return CooldownCheck::Allow;
        }

        let cooldown_ms = command.cooldown_secs * 1000;
        let mut cooldowns = self.cooldowns.lock().unwrap();
        let key = (sender_id, command.name.clone());
        let elapsed = now_ms.saturating_sub(cooldowns.get(&key).copied().unwrap_or(0));

        if elapsed < cooldown_ms {
            return CooldownCheck::Deny {
                remaining_secs: (cooldown_ms - elapsed) / 1000,
            };
        }

        cooldowns.insert(key, now_ms);
        CooldownCheck::Allow
    }

    /// Atomically replace the whole table. In-flight resolves observe either
    /// the fully-old or fully-new table. Cooldown state resets with it.
    pub fn reload(&self, defs: &[CommandConfig]) {
        *self.table.write().unwrap() = CommandTable::build(defs);
        self.cooldowns.lock().unwrap().clear();
    }
}

/// Expand a command's action templates with the invocation tokens.
///
/// `{argN}` is replaced positionally (index 0 is the command token itself),
/// `{args}` with the space-joined remainder when more than one token exists.
/// Unmatched placeholders are left verbatim.
pub fn expand_actions(command: &Command, args: &[String]) -> Vec<String> {
    command
        .actions
        .iter()
        .map(|template| expand_template(template, args))
        .collect()
}

fn expand_template(template: &str, args: &[String]) -> String {
    let mut out = template.to_string();
    for (i, arg) in args.iter().enumerate() {
        out = out.replace(&format!("{{arg{}}}", i), arg);
    }
    if args.len() > 1 {
        out = out.replace("{args}", &args[1..].join(" "));
    }
    out
}
