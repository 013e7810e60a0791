//! External-identity to game-identity binding.
//!
//! Bindings persist as a flat JSON map of game identity -> external
//! identity, rewritten in full on every change by a single writer. Pending
//! verification requests are in-memory only and do not survive a restart.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::binding::codes::generate_code;
use crate::common::error::PersistError;
use crate::config::{BindMode, BindingConfig};

/// Published when a verification completes. The game-side collaborator
/// reacts to this (cancelling pending access restrictions, announcing) -
/// the store never calls into it directly.
#[derive(Debug, Clone)]
pub enum BindingNotice {
    BindCompleted {
        game_identity: String,
        external_id: i64,
    },
}

/// Outcome of a direct bind attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindOutcome {
    Bound,
    AlreadyBoundSelf,
    AlreadyBoundOther,
    LimitExceeded,
}

/// Outcome of requesting a verification code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestOutcome {
    Code { code: String, expires_minutes: u64 },
    AlreadyBoundSelf,
    AlreadyBoundOther,
    LimitExceeded,
}

/// Outcome of submitting a verification code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyOutcome {
    Bound,
    NoPendingRequest,
    Expired,
    CodeMismatch,
}

/// Outcome of an unbind attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnbindOutcome {
    Unbound,
    NotBound,
    NotOwner,
}

/// At most one live request per game identity; a newer request replaces it.
#[derive(Debug, Clone)]
struct VerificationRequest {
    external_id: i64,
    code: String,
    expires_at_ms: u64,
}

struct StoreState {
    /// Game identity (as given) -> owning external identity.
    bindings: HashMap<String, i64>,
    /// Lowercased game identity -> pending verification.
    pending: HashMap<String, VerificationRequest>,
}

/// Reconciles external identities with game identities.
pub struct BindingStore {
    config: BindingConfig,
    path: PathBuf,
    state: Mutex<StoreState>,
    notice_tx: mpsc::UnboundedSender<BindingNotice>,
}

impl BindingStore {
    /// Open the store, loading any persisted bindings.
    pub fn open(
        config: BindingConfig,
        notice_tx: mpsc::UnboundedSender<BindingNotice>,
    ) -> Result<Self, PersistError> {
        let path = PathBuf::from(&config.file);
        let bindings = load_bindings(&path)?;
        if !bindings.is_empty() {
            info!("Loaded {} binding record(s) from {}", bindings.len(), path.display());
        }

        Ok(Self {
            config,
            path,
            state: Mutex::new(StoreState {
                bindings,
                pending: HashMap::new(),
            }),
            notice_tx,
        })
    }

    pub fn enabled(&self) -> bool {
        self.config.enabled
    }

    pub fn mode(&self) -> BindMode {
        self.config.mode
    }

    /// Whether a game identity is bound. When the binding feature is
    /// disabled this always answers true - an explicit bypass.
    pub fn is_bound(&self, game_identity: &str) -> bool {
        if !self.config.enabled {
            return true;
        }
        self.state.lock().unwrap().bindings.contains_key(game_identity)
    }

    /// Directly bind a game identity to an external identity.
    ///
    /// The in-memory table and the persisted file change together or not at
    /// all: a failed write rolls the insertion back.
    pub fn bind(&self, external_id: i64, game_identity: &str) -> Result<BindOutcome, PersistError> {
        let mut state = self.state.lock().unwrap();

        if let Some(check) = check_ownership(&state.bindings, external_id, game_identity, self.config.max_bindings) {
            return Ok(check);
        }

        state.bindings.insert(game_identity.to_string(), external_id);
        if let Err(e) = self.save(&state.bindings) {
            state.bindings.remove(game_identity);
            return Err(e);
        }

        info!("Bound game identity '{}' to {}", game_identity, external_id);
        Ok(BindOutcome::Bound)
    }

    /// Begin verify-mode binding: generate a code and an expiry, replacing
    /// any pending request for the same game identity.
    ///
    /// The caller delivers the code to the game-side identity out-of-band.
    pub fn request_verification(
        &self,
        external_id: i64,
        game_identity: &str,
        now_ms: u64,
    ) -> RequestOutcome {
        let mut state = self.state.lock().unwrap();

        if let Some(check) = check_ownership(&state.bindings, external_id, game_identity, self.config.max_bindings) {
            return match check {
                BindOutcome::AlreadyBoundSelf => RequestOutcome::AlreadyBoundSelf,
                BindOutcome::AlreadyBoundOther => RequestOutcome::AlreadyBoundOther,
                _ => RequestOutcome::LimitExceeded,
            };
        }

        let code = generate_code(self.config.code_format, self.config.code_length);
        let expires_minutes = self.config.expiry_minutes;
        state.pending.insert(
            game_identity.to_lowercase(),
            VerificationRequest {
                external_id,
                code: code.clone(),
                expires_at_ms: now_ms + expires_minutes * 60_000,
            },
        );

        RequestOutcome::Code {
            code,
            expires_minutes,
        }
    }

    /// Submit a verification code for a game identity.
    ///
    /// An expired request is discarded; a mismatched code leaves the request
    /// in place for a retry. A matching attempt consumes the request even
    /// when the binding write then fails.
    pub fn submit_verification(
        &self,
        game_identity: &str,
        supplied_code: &str,
        now_ms: u64,
    ) -> Result<VerifyOutcome, PersistError> {
        let key = game_identity.to_lowercase();
        let mut state = self.state.lock().unwrap();

        let request = match state.pending.get(&key) {
            None => return Ok(VerifyOutcome::NoPendingRequest),
            Some(request) => request.clone(),
        };

        if now_ms > request.expires_at_ms {
            state.pending.remove(&key);
            return Ok(VerifyOutcome::Expired);
        }
        if request.code != supplied_code {
            return Ok(VerifyOutcome::CodeMismatch);
        }

        state.pending.remove(&key);
        state
            .bindings
            .insert(game_identity.to_string(), request.external_id);
        if let Err(e) = self.save(&state.bindings) {
            state.bindings.remove(game_identity);
            return Err(e);
        }

        info!(
            "Verified and bound game identity '{}' to {}",
            game_identity, request.external_id
        );
        if self
            .notice_tx
            .send(BindingNotice::BindCompleted {
                game_identity: game_identity.to_string(),
                external_id: request.external_id,
            })
            .is_err()
        {
            warn!("No listener for binding notices");
        }

        Ok(VerifyOutcome::Bound)
    }

    /// Remove a binding. Only the recorded owner may unbind.
    pub fn unbind(
        &self,
        external_id: i64,
        game_identity: &str,
    ) -> Result<UnbindOutcome, PersistError> {
        let mut state = self.state.lock().unwrap();

        match state.bindings.get(game_identity) {
            None => return Ok(UnbindOutcome::NotBound),
            Some(&owner) if owner != external_id => return Ok(UnbindOutcome::NotOwner),
            Some(_) => {}
        }

        let removed = state.bindings.remove(game_identity);
        if let Err(e) = self.save(&state.bindings) {
            if let Some(owner) = removed {
                state.bindings.insert(game_identity.to_string(), owner);
            }
            return Err(e);
        }

        info!("Unbound game identity '{}'", game_identity);
        Ok(UnbindOutcome::Unbound)
    }

    /// Overwrite the whole record set. Callers hold the state lock, so
    /// writes are serialized.
    fn save(&self, bindings: &HashMap<String, i64>) -> Result<(), PersistError> {
        let encoded = serde_json::to_string_pretty(bindings)?;
        fs::write(&self.path, encoded).map_err(|source| PersistError::Io {
            path: self.path.display().to_string(),
            source,
        })
    }
}

/// Ownership and quota checks shared by both bind modes. `None` means the
/// bind may proceed.
fn check_ownership(
    bindings: &HashMap<String, i64>,
    external_id: i64,
    game_identity: &str,
    max_bindings: usize,
) -> Option<BindOutcome> {
    if let Some(&owner) = bindings.get(game_identity) {
        return Some(if owner == external_id {
            BindOutcome::AlreadyBoundSelf
        } else {
            BindOutcome::AlreadyBoundOther
        });
    }

    let owned = bindings.values().filter(|&&id| id == external_id).count();
    if owned >= max_bindings {
        return Some(BindOutcome::LimitExceeded);
    }

    None
}

fn load_bindings(path: &PathBuf) -> Result<HashMap<String, i64>, PersistError> {
    if !path.exists() {
        return Ok(HashMap::new());
    }
    let raw = fs::read_to_string(path).map_err(|source| PersistError::Io {
        path: path.display().to_string(),
        source,
    })?;
    Ok(serde_json::from_str(&raw)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CodeFormat;

    fn temp_path(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!("herald-bindings-{}-{}.json", tag, std::process::id()))
    }

    fn make_config(tag: &str) -> BindingConfig {
        BindingConfig {
            enabled: true,
            mode: BindMode::Direct,
            max_bindings: 2,
            code_length: 6,
            code_format: CodeFormat::Numeric,
            expiry_minutes: 5,
            file: temp_path(tag).display().to_string(),
        }
    }

    fn make_store(tag: &str) -> (BindingStore, mpsc::UnboundedReceiver<BindingNotice>) {
        let _ = fs::remove_file(temp_path(tag));
        let (tx, rx) = mpsc::unbounded_channel();
        let store = BindingStore::open(make_config(tag), tx).expect("store should open");
        (store, rx)
    }

    fn request_code(store: &BindingStore, external_id: i64, name: &str, now: u64) -> String {
        match store.request_verification(external_id, name, now) {
            RequestOutcome::Code { code, .. } => code,
            other => panic!("expected code, got {:?}", other),
        }
    }

    #[test]
    fn test_direct_bind_lifecycle() {
        let (store, _rx) = make_store("direct");

        assert_eq!(store.bind(1001, "Alice").unwrap(), BindOutcome::Bound);
        assert!(store.is_bound("Alice"));

        assert_eq!(
            store.bind(1001, "Alice").unwrap(),
            BindOutcome::AlreadyBoundSelf
        );
        assert_eq!(
            store.bind(1002, "Alice").unwrap(),
            BindOutcome::AlreadyBoundOther
        );

        assert_eq!(store.unbind(1002, "Alice").unwrap(), UnbindOutcome::NotOwner);
        assert_eq!(store.unbind(1001, "Alice").unwrap(), UnbindOutcome::Unbound);
        assert!(!store.is_bound("Alice"));
        assert_eq!(store.unbind(1001, "Alice").unwrap(), UnbindOutcome::NotBound);

        let _ = fs::remove_file(temp_path("direct"));
    }

    #[test]
    fn test_binding_limit_per_external_identity() {
        let (store, _rx) = make_store("limit");

        assert_eq!(store.bind(1001, "One").unwrap(), BindOutcome::Bound);
        assert_eq!(store.bind(1001, "Two").unwrap(), BindOutcome::Bound);
        assert_eq!(store.bind(1001, "Three").unwrap(), BindOutcome::LimitExceeded);
        // Other identities are unaffected.
        assert_eq!(store.bind(1002, "Three").unwrap(), BindOutcome::Bound);

        let _ = fs::remove_file(temp_path("limit"));
    }

    #[test]
    fn test_bindings_survive_reopen() {
        let tag = "persist";
        {
            let (store, _rx) = make_store(tag);
            assert_eq!(store.bind(7, "Keeper").unwrap(), BindOutcome::Bound);
        }

        let (tx, _rx) = mpsc::unbounded_channel();
        let store = BindingStore::open(make_config(tag), tx).unwrap();
        assert!(store.is_bound("Keeper"));
        assert_eq!(store.bind(8, "Keeper").unwrap(), BindOutcome::AlreadyBoundOther);

        let _ = fs::remove_file(temp_path(tag));
    }

    #[test]
    fn test_disabled_store_bypasses_lookup() {
        let tag = "disabled";
        let _ = fs::remove_file(temp_path(tag));
        let mut config = make_config(tag);
        config.enabled = false;
        let (tx, _rx) = mpsc::unbounded_channel();
        let store = BindingStore::open(config, tx).unwrap();

        assert!(store.is_bound("Nobody"));
    }

    #[test]
    fn test_verification_happy_path() {
        let (store, mut rx) = make_store("verify");
        let now = 1_000_000;

        let code = request_code(&store, 2002, "Bob", now);
        assert_eq!(
            store.submit_verification("Bob", &code, now + 1_000).unwrap(),
            VerifyOutcome::Bound
        );
        assert!(store.is_bound("Bob"));

        // The request is consumed on success.
        assert_eq!(
            store.submit_verification("Bob", &code, now + 2_000).unwrap(),
            VerifyOutcome::NoPendingRequest
        );

        match rx.try_recv().unwrap() {
            BindingNotice::BindCompleted {
                game_identity,
                external_id,
            } => {
                assert_eq!(game_identity, "Bob");
                assert_eq!(external_id, 2002);
            }
        }

        let _ = fs::remove_file(temp_path("verify"));
    }

    #[test]
    fn test_wrong_code_keeps_request_alive() {
        let (store, _rx) = make_store("mismatch");
        let now = 1_000_000;

        let code = request_code(&store, 2002, "Bob", now);
        let wrong = if code == "000000" { "000001" } else { "000000" };

        assert_eq!(
            store.submit_verification("Bob", wrong, now + 1_000).unwrap(),
            VerifyOutcome::CodeMismatch
        );
        // A later correct submission before expiry still succeeds.
        assert_eq!(
            store.submit_verification("Bob", &code, now + 2_000).unwrap(),
            VerifyOutcome::Bound
        );

        let _ = fs::remove_file(temp_path("mismatch"));
    }

    #[test]
    fn test_expired_request_is_discarded() {
        let (store, _rx) = make_store("expiry");
        let now = 1_000_000;

        let code = request_code(&store, 2002, "Bob", now);
        let after_expiry = now + 5 * 60_000 + 1;

        assert_eq!(
            store.submit_verification("Bob", &code, after_expiry).unwrap(),
            VerifyOutcome::Expired
        );
        assert_eq!(
            store.submit_verification("Bob", &code, after_expiry).unwrap(),
            VerifyOutcome::NoPendingRequest
        );

        let _ = fs::remove_file(temp_path("expiry"));
    }

    #[test]
    fn test_new_request_replaces_old() {
        let (store, _rx) = make_store("replace");
        let now = 1_000_000;

        let first = request_code(&store, 2002, "Bob", now);
        let second = request_code(&store, 2002, "Bob", now + 1_000);

        if first != second {
            assert_eq!(
                store.submit_verification("Bob", &first, now + 2_000).unwrap(),
                VerifyOutcome::CodeMismatch
            );
        }
        assert_eq!(
            store.submit_verification("Bob", &second, now + 2_000).unwrap(),
            VerifyOutcome::Bound
        );

        let _ = fs::remove_file(temp_path("replace"));
    }

    #[test]
    fn test_verification_keyed_case_insensitively() {
        let (store, _rx) = make_store("case");
        let now = 1_000_000;

        let code = request_code(&store, 2002, "BOB", now);
        assert_eq!(
            store.submit_verification("bob", &code, now + 1_000).unwrap(),
            VerifyOutcome::Bound
        );

        let _ = fs::remove_file(temp_path("case"));
    }

    #[test]
    fn test_request_for_owned_identity_rejected() {
        let (store, _rx) = make_store("owned");
        assert_eq!(store.bind(1001, "Alice").unwrap(), BindOutcome::Bound);

        assert_eq!(
            store.request_verification(1002, "Alice", 0),
            RequestOutcome::AlreadyBoundOther
        );
        assert_eq!(
            store.request_verification(1001, "Alice", 0),
            RequestOutcome::AlreadyBoundSelf
        );

        let _ = fs::remove_file(temp_path("owned"));
    }

    #[test]
    fn test_failed_write_leaves_no_partial_state() {
        let tag = "rollback";
        let _ = fs::remove_file(temp_path(tag));
        let mut config = make_config(tag);
        // A directory path that cannot exist as a file parent.
        config.file = temp_path(tag)
            .join("not-a-dir")
            .join("bindings.json")
            .display()
            .to_string();
        let (tx, _rx) = mpsc::unbounded_channel();
        let store = BindingStore::open(config, tx).unwrap();

        assert!(store.bind(1001, "Alice").is_err());
        assert!(!store.is_bound("Alice"));
    }
}
