//! Hooks and traits for external collaborators
//!
//! Authorization and the system-of-record lookup live outside this
//! repository. The workflow engine only talks to them through the narrow
//! traits below, injected at construction.

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::SyncError;

/// The caller on whose behalf an operation runs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct User {
    pub id: String,
}

impl User {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// Actions gated by the permission checker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Upload,
    View,
    Approve,
    Rollback,
    Diff,
    Export,
}

impl Action {
    pub const ALL: [Action; 6] = [
        Action::Upload,
        Action::View,
        Action::Approve,
        Action::Rollback,
        Action::Diff,
        Action::Export,
    ];
}

impl Display for Action {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Action::Upload => write!(f, "upload"),
            Action::View => write!(f, "view"),
            Action::Approve => write!(f, "approve"),
            Action::Rollback => write!(f, "rollback"),
            Action::Diff => write!(f, "diff"),
            Action::Export => write!(f, "export"),
        }
    }
}

impl FromStr for Action {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "upload" => Ok(Action::Upload),
            "view" => Ok(Action::View),
            "approve" => Ok(Action::Approve),
            "rollback" => Ok(Action::Rollback),
            "diff" => Ok(Action::Diff),
            "export" => Ok(Action::Export),
            _ => Err(anyhow::anyhow!("Invalid action: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny,
}

impl Decision {
    pub fn is_allowed(self) -> bool {
        self == Decision::Allow
    }
}

impl From<bool> for Decision {
    fn from(allowed: bool) -> Self {
        if allowed {
            Decision::Allow
        } else {
            Decision::Deny
        }
    }
}

/// Built-in roles for the static role table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Every action
    Admin,
    /// Reviews staged uploads: view, diff, approve, rollback, export
    Reviewer,
    /// Submits files: upload, view
    Uploader,
    /// Read-only: view, export
    Viewer,
}

impl Role {
    pub fn allows(self, action: Action) -> bool {
        match self {
            Role::Admin => true,
            Role::Reviewer => !matches!(action, Action::Upload),
            Role::Uploader => matches!(action, Action::Upload | Action::View),
            Role::Viewer => matches!(action, Action::View | Action::Export),
        }
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Role::Admin => write!(f, "admin"),
            Role::Reviewer => write!(f, "reviewer"),
            Role::Uploader => write!(f, "uploader"),
            Role::Viewer => write!(f, "viewer"),
        }
    }
}

impl FromStr for Role {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "reviewer" => Ok(Role::Reviewer),
            "uploader" => Ok(Role::Uploader),
            "viewer" => Ok(Role::Viewer),
            _ => Err(anyhow::anyhow!("Invalid role: {}", s)),
        }
    }
}

/// Permission check capability.
///
/// Implementors only have to answer `check`; the per-action helpers are what
/// the workflow engine calls.
#[async_trait]
pub trait PermissionChecker: Send + Sync {
    async fn check(&self, user: &User, action: Action) -> Decision;

    async fn can_upload(&self, user: &User) -> bool {
        self.check(user, Action::Upload).await.is_allowed()
    }

    async fn can_view(&self, user: &User) -> bool {
        self.check(user, Action::View).await.is_allowed()
    }

    async fn can_approve(&self, user: &User) -> bool {
        self.check(user, Action::Approve).await.is_allowed()
    }

    async fn can_rollback(&self, user: &User) -> bool {
        self.check(user, Action::Rollback).await.is_allowed()
    }

    async fn can_diff(&self, user: &User) -> bool {
        self.check(user, Action::Diff).await.is_allowed()
    }

    async fn can_export(&self, user: &User) -> bool {
        self.check(user, Action::Export).await.is_allowed()
    }
}

/// Lookup of current values held by the system of record.
#[async_trait]
pub trait SystemOfRecord: Send + Sync {
    /// Current field values for a property. Unknown properties yield an empty map.
    async fn current_values(&self, property_id: &str)
        -> Result<BTreeMap<String, String>, SyncError>;
}

/// Allows everything. For local development and tests.
pub struct AllowAll;

#[async_trait]
impl PermissionChecker for AllowAll {
    async fn check(&self, _user: &User, _action: Action) -> Decision {
        Decision::Allow
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_matrix() {
        for action in Action::ALL {
            assert!(Role::Admin.allows(action));
        }
        assert!(!Role::Reviewer.allows(Action::Upload));
        assert!(Role::Reviewer.allows(Action::Rollback));
        assert!(Role::Uploader.allows(Action::Upload));
        assert!(!Role::Uploader.allows(Action::Approve));
        assert!(Role::Viewer.allows(Action::Export));
        assert!(!Role::Viewer.allows(Action::Diff));
    }

    #[test]
    fn action_round_trips_through_display() {
        for action in Action::ALL {
            assert_eq!(action.to_string().parse::<Action>().unwrap(), action);
        }
        assert!("delete".parse::<Action>().is_err());
    }

    #[test]
    fn role_parse_is_case_insensitive() {
        assert_eq!(" Reviewer ".parse::<Role>().unwrap(), Role::Reviewer);
        assert!("root".parse::<Role>().is_err());
    }

    #[tokio::test]
    async fn allow_all_answers_every_helper() {
        let user = User::new("anyone");
        assert!(AllowAll.can_upload(&user).await);
        assert!(AllowAll.can_rollback(&user).await);
        assert!(AllowAll.can_export(&user).await);
    }
}
