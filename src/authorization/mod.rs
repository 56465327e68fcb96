//! # 授权端口
//!
//! 角色策略（正式）与全部放行（开发用）两种实现，启动时按配置选择。

use std::fmt;
use std::sync::Arc;

use crate::config::AuthorizerKind;
use crate::error::{Result, TicketingError};
use crate::identity::{Principal, Role};

/// 操作
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Create,
    Read,
    Update,
    Delete,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Create => "create",
            Self::Read => "read",
            Self::Update => "update",
            Self::Delete => "delete",
        })
    }
}

/// 操作对象，只携带授权需要的归属信息
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Event { owner_id: i32 },
    Packet { owner_id: i32 },
    Inclusion { event_owner: i32, packet_owner: i32 },
    /// 门票归属于其引用的活动或套票的所有者
    Ticket {
        event_owner: Option<i32>,
        packet_owner: Option<i32>,
    },
    Profile { user_id: i32 },
}

impl Target {
    const fn label(&self) -> &'static str {
        match self {
            Self::Event { .. } => "event",
            Self::Packet { .. } => "packet",
            Self::Inclusion { .. } => "inclusion",
            Self::Ticket { .. } => "ticket",
            Self::Profile { .. } => "profile",
        }
    }
}

/// 授权端口
pub trait Authorizer: Send + Sync {
    fn authorize(&self, principal: &Principal, action: Action, target: &Target) -> Result<()>;
}

/// 基于角色和归属的授权
#[derive(Debug, Default)]
pub struct RoleAuthorizer;

impl RoleAuthorizer {
    fn allows(principal: &Principal, action: Action, target: &Target) -> bool {
        let me = principal.user_id;
        match (principal.role, target) {
            (Role::Admin, _) => true,

            (Role::OwnerEvent, Target::Event { owner_id } | Target::Packet { owner_id }) => {
                *owner_id == me
            }
            (
                Role::OwnerEvent,
                Target::Inclusion {
                    event_owner,
                    packet_owner,
                },
            ) => *event_owner == me && *packet_owner == me,
            (
                Role::OwnerEvent,
                Target::Ticket {
                    event_owner,
                    packet_owner,
                },
            ) => *event_owner == Some(me) || *packet_owner == Some(me),

            (Role::Client, Target::Ticket { .. }) => action == Action::Create,

            (Role::ServiciuClienti, Target::Ticket { .. }) => true,
            (Role::ServiciuClienti, Target::Profile { .. }) => action != Action::Delete,

            (_, Target::Profile { user_id }) => *user_id == me && action != Action::Create,

            _ => false,
        }
    }
}

impl Authorizer for RoleAuthorizer {
    fn authorize(&self, principal: &Principal, action: Action, target: &Target) -> Result<()> {
        if Self::allows(principal, action, target) {
            Ok(())
        } else {
            Err(TicketingError::forbidden(format!(
                "role {} may not {action} this {}",
                principal.role,
                target.label()
            )))
        }
    }
}

/// 全部放行
#[derive(Debug, Default)]
pub struct PermissiveAuthorizer;

impl Authorizer for PermissiveAuthorizer {
    fn authorize(&self, _principal: &Principal, _action: Action, _target: &Target) -> Result<()> {
        Ok(())
    }
}

#[must_use]
pub fn build_authorizer(kind: AuthorizerKind) -> Arc<dyn Authorizer> {
    match kind {
        AuthorizerKind::Roles => Arc::new(RoleAuthorizer),
        AuthorizerKind::Permissive => Arc::new(PermissiveAuthorizer),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const OWNER: i32 = 5;

    #[rstest]
    #[case(Role::Admin, Action::Delete, Target::Event { owner_id: 99 }, true)]
    #[case(Role::OwnerEvent, Action::Create, Target::Event { owner_id: OWNER }, true)]
    #[case(Role::OwnerEvent, Action::Create, Target::Event { owner_id: 6 }, false)]
    #[case(Role::OwnerEvent, Action::Update, Target::Packet { owner_id: OWNER }, true)]
    #[case(Role::OwnerEvent, Action::Create, Target::Inclusion { event_owner: OWNER, packet_owner: 6 }, false)]
    #[case(Role::OwnerEvent, Action::Create, Target::Inclusion { event_owner: OWNER, packet_owner: OWNER }, true)]
    #[case(Role::OwnerEvent, Action::Delete, Target::Ticket { event_owner: None, packet_owner: Some(OWNER) }, true)]
    #[case(Role::OwnerEvent, Action::Delete, Target::Ticket { event_owner: Some(6), packet_owner: None }, false)]
    #[case(Role::Client, Action::Create, Target::Ticket { event_owner: Some(6), packet_owner: None }, true)]
    #[case(Role::Client, Action::Delete, Target::Ticket { event_owner: Some(6), packet_owner: None }, false)]
    #[case(Role::Client, Action::Create, Target::Event { owner_id: OWNER }, false)]
    #[case(Role::ServiciuClienti, Action::Update, Target::Ticket { event_owner: None, packet_owner: None }, true)]
    #[case(Role::ServiciuClienti, Action::Create, Target::Event { owner_id: OWNER }, false)]
    #[case(Role::ServiciuClienti, Action::Create, Target::Profile { user_id: 1 }, true)]
    #[case(Role::ServiciuClienti, Action::Delete, Target::Profile { user_id: 1 }, false)]
    #[case(Role::Client, Action::Read, Target::Profile { user_id: OWNER }, true)]
    #[case(Role::Client, Action::Delete, Target::Profile { user_id: OWNER }, true)]
    #[case(Role::Client, Action::Create, Target::Profile { user_id: OWNER }, false)]
    #[case(Role::Client, Action::Read, Target::Profile { user_id: 6 }, false)]
    fn role_policy(
        #[case] role: Role,
        #[case] action: Action,
        #[case] target: Target,
        #[case] allowed: bool,
    ) {
        let principal = Principal::new(OWNER, role);
        let result = RoleAuthorizer.authorize(&principal, action, &target);
        assert_eq!(result.is_ok(), allowed, "{role} {action} {target:?}");
        if let Err(err) = result {
            assert!(matches!(err, TicketingError::Forbidden { .. }));
        }
    }

    #[test]
    fn permissive_allows_everything() {
        let principal = Principal::new(1, Role::Client);
        assert!(
            PermissiveAuthorizer
                .authorize(&principal, Action::Delete, &Target::Event { owner_id: 2 })
                .is_ok()
        );
    }
}
