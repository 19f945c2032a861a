use crate::{
    constants::ANONYMOUS_USER,
    models::{Action, Resource},
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::{
    collections::{HashMap, HashSet},
    fmt::Debug,
    sync::Arc,
};

pub type SharedSecurityContext = Arc<dyn SecurityContext>;

/// The caller of a single request, as established by an upstream stage.
///
/// `can` is the only place permission rules live; the classifier and checker
/// never look behind it, so a role table, a robot permission list or a
/// remote policy service are interchangeable.
#[async_trait]
pub trait SecurityContext: Send + Sync + Debug {
    fn name(&self) -> &'static str;

    fn username(&self) -> Option<&str> {
        None
    }

    fn is_authenticated(&self) -> bool;

    fn is_sys_admin(&self) -> bool {
        false
    }

    async fn can(&self, action: Action, resource: &Resource) -> bool;
}

pub fn display_name(ctx: &dyn SecurityContext) -> &str {
    ctx.username().unwrap_or(ANONYMOUS_USER)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AnonymousContext;

#[async_trait]
impl SecurityContext for AnonymousContext {
    fn name(&self) -> &'static str {
        "anonymous"
    }

    fn is_authenticated(&self) -> bool {
        false
    }

    async fn can(&self, _action: Action, _resource: &Resource) -> bool {
        false
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Role {
    ProjectAdmin,
    Maintainer,
    Developer,
    Guest,
    LimitedGuest,
}

impl Role {
    pub fn allows(self, action: Action) -> bool {
        match self {
            Role::ProjectAdmin | Role::Maintainer | Role::Developer => true,
            Role::Guest => matches!(action, Action::Pull | Action::List),
            Role::LimitedGuest => action == Action::Pull,
        }
    }
}

/// A local user with a role per project id.
#[derive(Debug, Clone)]
pub struct LocalUserContext {
    username: String,
    sys_admin: bool,
    roles: HashMap<i64, Role>,
}

impl LocalUserContext {
    pub fn new(username: impl Into<String>, sys_admin: bool, roles: HashMap<i64, Role>) -> Self {
        Self {
            username: username.into(),
            sys_admin,
            roles,
        }
    }
}

#[async_trait]
impl SecurityContext for LocalUserContext {
    fn name(&self) -> &'static str {
        "local"
    }

    fn username(&self) -> Option<&str> {
        Some(&self.username)
    }

    fn is_authenticated(&self) -> bool {
        true
    }

    fn is_sys_admin(&self) -> bool {
        self.sys_admin
    }

    async fn can(&self, action: Action, resource: &Resource) -> bool {
        if self.sys_admin {
            return true;
        }
        self.roles
            .get(&resource.project_id)
            .is_some_and(|role| role.allows(action))
    }
}

/// A robot account restricted to explicit actions per project id.
#[derive(Debug, Clone)]
pub struct RobotContext {
    name: String,
    permissions: HashMap<i64, HashSet<Action>>,
}

impl RobotContext {
    pub fn new(name: impl Into<String>, permissions: HashMap<i64, HashSet<Action>>) -> Self {
        Self {
            name: name.into(),
            permissions,
        }
    }
}

#[async_trait]
impl SecurityContext for RobotContext {
    fn name(&self) -> &'static str {
        "robot"
    }

    fn username(&self) -> Option<&str> {
        Some(&self.name)
    }

    fn is_authenticated(&self) -> bool {
        true
    }

    async fn can(&self, action: Action, resource: &Resource) -> bool {
        self.permissions
            .get(&resource.project_id)
            .is_some_and(|actions| actions.contains(&action))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_table_matches_expected_actions() {
        for role in [Role::ProjectAdmin, Role::Maintainer, Role::Developer] {
            assert!(role.allows(Action::Pull));
            assert!(role.allows(Action::Push));
            assert!(role.allows(Action::List));
        }
        assert!(Role::Guest.allows(Action::Pull));
        assert!(Role::Guest.allows(Action::List));
        assert!(!Role::Guest.allows(Action::Push));
        assert!(Role::LimitedGuest.allows(Action::Pull));
        assert!(!Role::LimitedGuest.allows(Action::List));
        assert!(!Role::LimitedGuest.allows(Action::Push));
    }

    #[tokio::test]
    async fn local_user_checks_role_for_resolved_project_id() {
        let user = LocalUserContext::new("alice", false, HashMap::from([(1, Role::Guest)]));
        assert!(user.can(Action::Pull, &Resource::repository(1)).await);
        assert!(!user.can(Action::Push, &Resource::repository(1)).await);
        assert!(!user.can(Action::Pull, &Resource::repository(2)).await);
    }

    #[tokio::test]
    async fn sys_admin_can_do_everything() {
        let admin = LocalUserContext::new("admin", true, HashMap::new());
        assert!(admin.is_sys_admin());
        assert!(admin.can(Action::Push, &Resource::repository(42)).await);
    }

    #[tokio::test]
    async fn robot_only_holds_listed_actions() {
        let robot = RobotContext::new(
            "robot$ci",
            HashMap::from([(3, HashSet::from([Action::Push]))]),
        );
        assert!(robot.is_authenticated());
        assert!(!robot.is_sys_admin());
        assert!(robot.can(Action::Push, &Resource::repository(3)).await);
        assert!(!robot.can(Action::Pull, &Resource::repository(3)).await);
    }

    #[tokio::test]
    async fn anonymous_can_nothing() {
        let anon = AnonymousContext;
        assert!(!anon.is_authenticated());
        assert_eq!(display_name(&anon), "anonymous");
        assert!(!anon.can(Action::Pull, &Resource::repository(1)).await);
    }
}
