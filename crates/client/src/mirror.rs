//! Pieces shared by the cart and wishlist mirrors.

use serde::Serialize;
use shopfront_core::Role;
use tokio::sync::watch;
use tracing::warn;

use crate::error::{ClientError, Result};
use crate::models::Identity;
use crate::session::{SessionContext, SessionState};

/// Load status of a mirror.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "message", rename_all = "snake_case")]
pub enum SyncStatus {
    /// Nothing loaded: no customer is signed in.
    #[default]
    Idle,
    Loading,
    Ready,
    /// The last load failed. The items are whatever was loaded before.
    Failed(String),
}

impl SyncStatus {
    #[must_use]
    pub const fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }
}

/// A snapshot that carries an epoch and the subject it belongs to.
pub(crate) trait Mirrored: Default {
    fn epoch(&self) -> u64;
    fn owner(&self) -> Option<&str>;
    fn reset(&mut self, epoch: u64, owner: Option<String>);
}

/// Apply `update` only if the mirror is still at `epoch`.
///
/// Returns whether the update was applied. A load or mutation that started
/// before the mirror was cleared must not write into the new one.
pub(crate) fn apply_at<S: Mirrored>(
    tx: &watch::Sender<S>,
    epoch: u64,
    update: impl FnOnce(&mut S),
) -> bool {
    tx.send_if_modified(|snapshot| {
        if snapshot.epoch() == epoch {
            update(snapshot);
            true
        } else {
            false
        }
    })
}

/// Empty the mirror and move it to a new epoch. An unowned mirror is
/// already empty.
pub(crate) fn clear<S: Mirrored>(tx: &watch::Sender<S>) {
    tx.send_if_modified(|snapshot| {
        if snapshot.owner().is_none() {
            return false;
        }
        let next = snapshot.epoch() + 1;
        snapshot.reset(next, None);
        true
    });
}

/// Hand the mirror to `subject`, clearing it first if it belonged to
/// someone else. Returns the epoch to load under.
pub(crate) fn claim<S: Mirrored>(tx: &watch::Sender<S>, subject: &str) -> u64 {
    tx.send_if_modified(|snapshot| {
        if snapshot.owner() == Some(subject) {
            return false;
        }
        let next = snapshot.epoch() + 1;
        snapshot.reset(next, Some(subject.to_string()));
        true
    });
    tx.borrow().epoch()
}

/// The signed-in customer, or the reason there is none.
pub(crate) fn require_customer(session: &SessionContext) -> Result<Identity> {
    session.require_role(Role::Customer)
}

/// What a mirror should do for a session state.
pub(crate) enum SessionAction<'a> {
    Load(&'a Identity),
    Clear,
    Wait,
}

pub(crate) fn action_for(state: &SessionState) -> SessionAction<'_> {
    match state {
        SessionState::Loading => SessionAction::Wait,
        SessionState::Authenticated(identity) if matches!(identity.role, Role::Customer) => {
            SessionAction::Load(identity)
        }
        SessionState::Authenticated(_) | SessionState::Anonymous => SessionAction::Clear,
    }
}

/// Log a failed reconciling refetch. The mutation's own error is what the
/// caller gets back.
pub(crate) fn log_refetch_failure(collection: &str, err: &ClientError) {
    warn!(collection, error = %err, "Refetch after failed mutation also failed");
}
