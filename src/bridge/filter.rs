//! Inbound message filtering.
//!
//! Decides admissibility of a chat message and sanitizes its text before it
//! crosses the bridge: length and emptiness checks, an image-only check, a
//! fixed 60-second per-sender rate window and banned-word masking.

use std::collections::HashMap;
use std::sync::{Mutex, RwLock};

use regex::Regex;

use crate::common::now_millis;
use crate::config::FilterConfig;
use crate::protocol::event::IMAGE_PLACEHOLDER;

/// Length of the fixed rate-limit window.
const WINDOW_MILLIS: u64 = 60_000;

/// Why a message was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    TooLong { max: usize },
    Empty,
    PureImage,
    RateLimited { retry_after_secs: u64 },
}

impl RejectReason {
    /// Short user-facing denial. Internal detail stays in the log.
    pub fn user_message(&self) -> String {
        match self {
            Self::TooLong { max } => {
                format!("Message is too long (limit {} characters)", max)
            }
            Self::Empty => "Empty messages are not relayed".to_string(),
            Self::PureImage => "Image-only messages are not relayed".to_string(),
            Self::RateLimited { retry_after_secs } => {
                format!("Sending too fast, try again in {}s", retry_after_secs)
            }
        }
    }
}

/// Outcome of evaluating a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterVerdict {
    Admit(String),
    Reject(RejectReason),
}

/// A banned word compiled to its replacement rule.
struct WordRule {
    pattern: Regex,
    mask: String,
}

struct FilterRules {
    max_length: usize,
    allow_empty: bool,
    allow_pure_image: bool,
    rate_limit: u32,
    words: Vec<WordRule>,
}

impl FilterRules {
    fn from_config(config: &FilterConfig) -> Self {
        let mask_char = config.mask.chars().next().unwrap_or('*');
        let words = config
            .words
            .iter()
            .filter(|word| !word.is_empty())
            .map(|word| WordRule {
                // Escaped literal match; a mask of identical length.
                pattern: Regex::new(&regex::escape(word))
                    .expect("escaped literal is always a valid regex"),
                mask: mask_char.to_string().repeat(word.chars().count()),
            })
            .collect();

        Self {
            max_length: config.max_length,
            allow_empty: config.allow_empty,
            allow_pure_image: config.allow_pure_image,
            rate_limit: config.rate_limit,
            words,
        }
    }
}

/// Per-sender fixed window: count resets on first use after expiry.
struct RateLimitWindow {
    count: u32,
    window_reset_ms: u64,
}

/// Stateless admission rules plus the per-sender rate windows.
pub struct FilterEngine {
    rules: RwLock<FilterRules>,
    windows: Mutex<HashMap<i64, RateLimitWindow>>,
}

impl FilterEngine {
    pub fn new(config: &FilterConfig) -> Self {
        Self {
            rules: RwLock::new(FilterRules::from_config(config)),
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Evaluate a message with the current wall clock.
    pub fn evaluate(&self, text: &str, sender_id: i64) -> FilterVerdict {
        self.evaluate_at(text, sender_id, now_millis())
    }

    /// Evaluate a message at an explicit time.
    ///
    /// The only side effect is the sender's rate window advancing.
    pub fn evaluate_at(&self, text: &str, sender_id: i64, now_ms: u64) -> FilterVerdict {
        let rules = self.rules.read().unwrap();

        if text.chars().count() > rules.max_length {
            return FilterVerdict::Reject(RejectReason::TooLong {
                max: rules.max_length,
            });
        }

        let trimmed = text.trim();
        if !rules.allow_empty && trimmed.is_empty() {
            return FilterVerdict::Reject(RejectReason::Empty);
        }
        if !rules.allow_pure_image && trimmed == IMAGE_PLACEHOLDER {
            return FilterVerdict::Reject(RejectReason::PureImage);
        }

        if let Some(retry_after_secs) = self.check_rate_limit(sender_id, rules.rate_limit, now_ms)
        {
            return FilterVerdict::Reject(RejectReason::RateLimited { retry_after_secs });
        }

        // Rules apply in configuration order, each over the previous output.
        let mut sanitized = text.to_string();
        for rule in &rules.words {
            sanitized = rule
                .pattern
                .replace_all(&sanitized, rule.mask.as_str())
                .into_owned();
        }

        FilterVerdict::Admit(sanitized)
    }

    /// Returns the remaining window in whole seconds when the sender is over
    /// the limit, `None` when admitted.
    fn check_rate_limit(&self, sender_id: i64, limit: u32, now_ms: u64) -> Option<u64> {
        let mut windows = self.windows.lock().unwrap();
        let window = windows.entry(sender_id).or_insert(RateLimitWindow {
            count: 0,
            window_reset_ms: now_ms + WINDOW_MILLIS,
        });

        if now_ms >= window.window_reset_ms {
            window.count = 0;
            window.window_reset_ms = now_ms + WINDOW_MILLIS;
        }

        if window.count >= limit {
            return Some((window.window_reset_ms - now_ms).div_ceil(1000));
        }

        window.count += 1;
        None
    }

    /// Replace the rule set and reset every rate window.
    pub fn reload(&self, config: &FilterConfig) {
        *self.rules.write().unwrap() = FilterRules::from_config(config);
        self.windows.lock().unwrap().clear();
    }
}
