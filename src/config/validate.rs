//! Configuration validation.
//!
//! Validates configuration values and provides helpful error messages.

use std::collections::HashSet;

use crate::common::error::ConfigError;
use crate::config::types::Config;

/// Validate a configuration and return detailed errors.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let mut errors = Vec::new();

    // Connection
    if config.connection.endpoint.is_empty() {
        errors.push("connection.endpoint is required".to_string());
    } else if !config.connection.endpoint.starts_with("ws://")
        && !config.connection.endpoint.starts_with("wss://")
    {
        errors.push(format!(
            "connection.endpoint must be a ws:// or wss:// URL (got '{}')",
            config.connection.endpoint
        ));
    }

    // Chat channels
    if config.chat.groups.is_empty() {
        errors.push("chat.groups is empty - no message routing configured".to_string());
    }
    if config.chat.command_prefix.is_empty() {
        errors.push("chat.command_prefix must not be empty".to_string());
    }

    // Filter
    if config.filter.max_length == 0 {
        errors.push("filter.max_length must be non-zero".to_string());
    }
    if config.filter.rate_limit == 0 {
        errors.push("filter.rate_limit must be non-zero".to_string());
    }
    if config.filter.mask.chars().count() != 1 {
        errors.push(format!(
            "filter.mask must be a single character (got '{}')",
            config.filter.mask
        ));
    }

    // Binding
    if config.binding.max_bindings == 0 {
        errors.push("binding.max_bindings must be at least 1".to_string());
    }
    if config.binding.code_length == 0 || config.binding.code_length > 9 {
        errors.push(format!(
            "binding.code_length must be 1-9 (got {})",
            config.binding.code_length
        ));
    }
    if config.binding.expiry_minutes == 0 {
        errors.push("binding.expiry_minutes must be at least 1".to_string());
    }
    if config.binding.enabled && config.binding.file.is_empty() {
        errors.push("binding.file is required when binding is enabled".to_string());
    }

    // Commands: canonical names and aliases must be unique across the table
    let mut seen: HashSet<String> = HashSet::new();
    for (i, cmd) in config.commands.iter().enumerate() {
        if cmd.name.is_empty() {
            errors.push(format!("commands[{}].name is required", i));
            continue;
        }
        if !seen.insert(cmd.name.to_lowercase()) {
            errors.push(format!(
                "commands[{}]: duplicate command name '{}'",
                i, cmd.name
            ));
        }
        for alias in &cmd.aliases {
            if !seen.insert(alias.to_lowercase()) {
                errors.push(format!(
                    "commands[{}]: alias '{}' collides with another command or alias",
                    i, alias
                ));
            }
        }
        if cmd.actions.is_empty() {
            errors.push(format!("commands[{}] ('{}') has no actions", i, cmd.name));
        }
    }

    // Performance thresholds
    if config.performance.enabled {
        if config.performance.interval_secs == 0 {
            errors.push("performance.interval_secs must be non-zero".to_string());
        }
        if config.performance.memory_warning_percent > 100 {
            errors.push(format!(
                "performance.memory_warning_percent must be 0-100 (got {})",
                config.performance.memory_warning_percent
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationError {
            message: errors.join("\n"),
        })
    }
}
