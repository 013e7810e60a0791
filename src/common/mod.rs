//! Common utilities shared across the application.

pub mod error;
pub mod scheduler;

/// Wall-clock milliseconds since the Unix epoch.
///
/// Cooldowns, rate-limit windows, and verification expiry all compare
/// against this clock.
pub fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
