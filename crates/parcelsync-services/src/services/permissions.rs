//! Role-table permission checker and the guard the workflow calls.

use std::collections::BTreeMap;

use async_trait::async_trait;
use parcelsync_core::{Action, Config, Decision, PermissionChecker, Role, SyncError, SyncResult, User};

/// Permissions from a fixed `user -> role` table. Unknown users are denied.
#[derive(Debug, Clone, Default)]
pub struct StaticRoles {
    roles: BTreeMap<String, Role>,
}

impl StaticRoles {
    pub fn new(roles: BTreeMap<String, Role>) -> Self {
        Self { roles }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.users.clone())
    }

    pub fn with_user(mut self, user: impl Into<String>, role: Role) -> Self {
        self.roles.insert(user.into(), role);
        self
    }

    pub fn role_of(&self, user: &User) -> Option<Role> {
        self.roles.get(&user.id).copied()
    }
}

#[async_trait]
impl PermissionChecker for StaticRoles {
    async fn check(&self, user: &User, action: Action) -> Decision {
        let decision = Decision::from(self.role_of(user).is_some_and(|role| role.allows(action)));
        if !decision.is_allowed() {
            tracing::debug!(user = %user.id, action = %action, "Role table denies action");
        }
        decision
    }
}

/// Fail with `Forbidden` unless `checker` allows `action` for `user`.
pub async fn ensure(checker: &dyn PermissionChecker, user: &User, action: Action) -> SyncResult<()> {
    let allowed = match action {
        Action::Upload => checker.can_upload(user).await,
        Action::View => checker.can_view(user).await,
        Action::Approve => checker.can_approve(user).await,
        Action::Rollback => checker.can_rollback(user).await,
        Action::Diff => checker.can_diff(user).await,
        Action::Export => checker.can_export(user).await,
    };

    if allowed {
        Ok(())
    } else {
        tracing::warn!(user = %user.id, action = %action, "Permission denied");
        Err(SyncError::Forbidden {
            user: user.id.clone(),
            action,
        })
    }
}
