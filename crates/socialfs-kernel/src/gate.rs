//! RoleGate: which role may run which operation, and where.
//!
//! | role | operations | roots |
//! |------|------------|-------|
//! | admin | all | `base` |
//! | moderator | list, view, copy, move, find | `moderators/`, `users/` |
//! | user | list, append, view, copy | `users/<name>/` |
//!
//! Authorization is a pure table lookup; nothing here touches the disk.

use std::path::PathBuf;

use crate::config::{NamespaceConfig, is_single_segment};
use crate::error::{GateError, GateResult};
use crate::role::{Operation, Principal, Role};

const ADMIN_OPS: &[Operation] = &Operation::ALL;

const MODERATOR_OPS: &[Operation] = &[
    Operation::List,
    Operation::View,
    Operation::Copy,
    Operation::Move,
    Operation::Find,
];

const USER_OPS: &[Operation] = &[
    Operation::List,
    Operation::Append,
    Operation::View,
    Operation::Copy,
];

/// Table-driven authorization plus role → namespace root mapping.
#[derive(Debug, Clone)]
pub struct RoleGate {
    config: NamespaceConfig,
}

impl RoleGate {
    pub fn new(config: NamespaceConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &NamespaceConfig {
        &self.config
    }

    /// The allow-set for a role.
    pub fn allowed(role: Role) -> &'static [Operation] {
        match role {
            Role::Admin => ADMIN_OPS,
            Role::Moderator => MODERATOR_OPS,
            Role::RegularUser => USER_OPS,
        }
    }

    pub fn allows(role: Role, operation: Operation) -> bool {
        Self::allowed(role).contains(&operation)
    }

    pub fn authorize(&self, role: Role, operation: Operation) -> GateResult<()> {
        if Self::allows(role, operation) {
            Ok(())
        } else {
            Err(GateError::Unauthorized {
                role,
                operation: operation.name().to_string(),
            })
        }
    }

    /// Authorize an operation given by name. Unknown names are unauthorized.
    pub fn authorize_named(&self, role: Role, name: &str) -> GateResult<Operation> {
        let operation = name.parse::<Operation>().map_err(|()| GateError::Unauthorized {
            role,
            operation: name.to_string(),
        })?;
        self.authorize(role, operation)?;
        Ok(operation)
    }

    /// Namespace roots for a principal. The first entry is the primary root.
    pub fn roots(&self, principal: &Principal) -> GateResult<Vec<PathBuf>> {
        let config = &self.config;
        match principal.role {
            Role::Admin => Ok(vec![config.base.clone()]),
            Role::Moderator => Ok(vec![config.moderators_root(), config.users_root()]),
            Role::RegularUser => match principal.username.as_deref() {
                Some(name) => {
                    if !is_valid_username(name) {
                        return Err(GateError::invalid_path(name, "not a valid username"));
                    }
                    Ok(vec![config.users_root().join(name)])
                }
                None => Ok(vec![config.users_root()]),
            },
        }
    }
}

fn is_valid_username(name: &str) -> bool {
    is_single_segment(name)
        && !name.starts_with('.')
        && !name.chars().any(char::is_control)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn gate() -> RoleGate {
        RoleGate::new(NamespaceConfig::rooted_at("/srv/sm"))
    }

    #[test]
    fn test_admin_may_run_everything() {
        for op in Operation::ALL {
            assert!(RoleGate::allows(Role::Admin, op), "{op}");
        }
    }

    #[test]
    fn test_moderator_cannot_mutate_structure() {
        for op in [
            Operation::Mkdir,
            Operation::RmTree,
            Operation::Chmod,
            Operation::Symlink,
            Operation::Append,
            Operation::Audit,
        ] {
            let err = gate().authorize(Role::Moderator, op).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Unauthorized);
        }
    }

    #[test]
    fn test_unknown_operation_is_unauthorized() {
        let err = gate().authorize_named(Role::Admin, "format").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
        assert_eq!(
            gate().authorize_named(Role::RegularUser, "append").unwrap(),
            Operation::Append
        );
    }

    #[test]
    fn test_user_root_is_own_subtree() {
        let roots = gate()
            .roots(&Principal::user(Role::RegularUser, "amy"))
            .unwrap();
        assert_eq!(roots, vec![PathBuf::from("/srv/sm/users/amy")]);
    }

    #[test]
    fn test_anonymous_user_gets_shared_users_root() {
        let roots = gate().roots(&Principal::new(Role::RegularUser)).unwrap();
        assert_eq!(roots, vec![PathBuf::from("/srv/sm/users")]);
    }

    #[test]
    fn test_hostile_usernames_rejected() {
        for name in ["..", "a/b", ".hidden", "x\ny", ""] {
            let err = gate()
                .roots(&Principal::user(Role::RegularUser, name))
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidPath, "{name:?}");
        }
    }

    #[test]
    fn test_moderator_roots_cover_flag_workflow() {
        let roots = gate().roots(&Principal::new(Role::Moderator)).unwrap();
        assert_eq!(
            roots,
            vec![
                PathBuf::from("/srv/sm/moderators"),
                PathBuf::from("/srv/sm/users")
            ]
        );
    }
}
