//! Account binding between external and game identities.

pub mod codes;
pub mod store;

pub use store::{
    BindOutcome, BindingNotice, BindingStore, RequestOutcome, UnbindOutcome, VerifyOutcome,
};
