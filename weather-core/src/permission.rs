//! Location permission negotiation.

use async_trait::async_trait;
use std::{fmt, sync::Arc};

use crate::{error::StoreError, store::KeyValueStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PermissionKind {
    FineLocation,
    CoarseLocation,
}

impl PermissionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PermissionKind::FineLocation => "fine_location",
            PermissionKind::CoarseLocation => "coarse_location",
        }
    }

    /// Everything a location subscription asks for.
    pub const fn location() -> &'static [PermissionKind] {
        &[PermissionKind::FineLocation, PermissionKind::CoarseLocation]
    }

    fn store_key(&self) -> String {
        format!("permission.{}", self.as_str())
    }
}

impl fmt::Display for PermissionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionDecision {
    AllGranted,
    SomeDenied,
    /// A kind was denied before; the user must be told why it is needed.
    NeedsRationale,
}

/// The user's answer to the rationale dialog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RationaleChoice {
    OpenSettings,
    Cancel,
}

/// Recorded answer for one permission kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantState {
    NotAsked,
    Granted,
    Denied,
}

impl GrantState {
    fn from_stored(value: Option<&str>) -> Self {
        match value {
            Some("granted") => GrantState::Granted,
            Some("denied") => GrantState::Denied,
            _ => GrantState::NotAsked,
        }
    }

    fn as_stored(&self) -> Option<&'static str> {
        match self {
            GrantState::NotAsked => None,
            GrantState::Granted => Some("granted"),
            GrantState::Denied => Some("denied"),
        }
    }
}

#[async_trait]
pub trait PermissionNegotiator: Send + Sync {
    async fn request_permissions(&self, kinds: &[PermissionKind]) -> PermissionDecision;

    async fn show_rationale(&self) -> RationaleChoice;

    /// Hand the user over to wherever grants are changed. Does not re-check.
    async fn open_settings(&self);
}

/// Grant state persisted in the preference store under `permission.<kind>`.
///
/// Kinds never asked about are treated as denied; use an interactive
/// negotiator on top of this to prompt for them.
#[derive(Clone)]
pub struct StoredPermissions {
    store: Arc<dyn KeyValueStore>,
}

impl StoredPermissions {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub fn state(&self, kind: PermissionKind) -> Result<GrantState, StoreError> {
        let stored = self.store.get(&kind.store_key())?;
        Ok(GrantState::from_stored(stored.as_deref()))
    }

    pub fn set_state(&self, kind: PermissionKind, state: GrantState) -> Result<(), StoreError> {
        let value = state.as_stored().unwrap_or("");
        self.store.put(&kind.store_key(), value)
    }

    pub fn grant_all(&self, kinds: &[PermissionKind]) -> Result<(), StoreError> {
        kinds.iter().try_for_each(|k| self.set_state(*k, GrantState::Granted))
    }

    pub fn revoke_all(&self, kinds: &[PermissionKind]) -> Result<(), StoreError> {
        kinds.iter().try_for_each(|k| self.set_state(*k, GrantState::Denied))
    }

    /// Kinds currently granted, in request order.
    pub fn granted(&self, kinds: &[PermissionKind]) -> Vec<PermissionKind> {
        kinds
            .iter()
            .copied()
            .filter(|k| matches!(self.state(*k), Ok(GrantState::Granted)))
            .collect()
    }

    /// Decision from stored state alone.
    pub fn decide(&self, kinds: &[PermissionKind]) -> Result<PermissionDecision, StoreError> {
        let mut all_granted = true;
        for kind in kinds {
            match self.state(*kind)? {
                GrantState::Granted => {}
                GrantState::Denied => return Ok(PermissionDecision::NeedsRationale),
                GrantState::NotAsked => all_granted = false,
            }
        }

        Ok(if all_granted { PermissionDecision::AllGranted } else { PermissionDecision::SomeDenied })
    }
}

#[async_trait]
impl PermissionNegotiator for StoredPermissions {
    async fn request_permissions(&self, kinds: &[PermissionKind]) -> PermissionDecision {
        self.decide(kinds).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "could not read stored permissions");
            PermissionDecision::SomeDenied
        })
    }

    async fn show_rationale(&self) -> RationaleChoice {
        RationaleChoice::Cancel
    }

    async fn open_settings(&self) {}
}

impl fmt::Debug for StoredPermissions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoredPermissions").finish_non_exhaustive()
    }
}
