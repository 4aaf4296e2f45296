//! Roles, operations and the argument shape each operation takes.

use std::fmt;
use std::str::FromStr;

/// A session role. Fixed for the lifetime of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Admin,
    Moderator,
    RegularUser,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Admin, Role::Moderator, Role::RegularUser];

    pub fn label(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Moderator => "moderator",
            Role::RegularUser => "user",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "moderator" | "mod" => Ok(Role::Moderator),
            "user" | "regular_user" => Ok(Role::RegularUser),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// Arguments an operation expects, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgShape {
    None,
    Path,
    /// Two paths: source/target first, destination/link second.
    TwoPaths,
    PathMode,
    PathContent,
    /// Search root, then a base-name glob.
    PathPattern,
}

impl ArgShape {
    /// Number of required arguments.
    pub fn arity(self) -> usize {
        match self {
            ArgShape::None => 0,
            ArgShape::Path => 1,
            ArgShape::TwoPaths
            | ArgShape::PathMode
            | ArgShape::PathContent
            | ArgShape::PathPattern => 2,
        }
    }

    pub fn describe(self) -> &'static str {
        match self {
            ArgShape::None => "no arguments",
            ArgShape::Path => "path",
            ArgShape::TwoPaths => "source and destination",
            ArgShape::PathMode => "path and octal mode",
            ArgShape::PathContent => "path and content",
            ArgShape::PathPattern => "directory and name pattern",
        }
    }
}

/// The eleven operations the dispatcher understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    List,
    Mkdir,
    RmTree,
    Chmod,
    Symlink,
    Copy,
    Move,
    Append,
    View,
    Find,
    Audit,
}

/// Flag accepted as an optional trailing argument by copy and move.
pub const OVERWRITE_FLAG: &str = "--overwrite";

impl Operation {
    pub const ALL: [Operation; 11] = [
        Operation::List,
        Operation::Mkdir,
        Operation::RmTree,
        Operation::Chmod,
        Operation::Symlink,
        Operation::Copy,
        Operation::Move,
        Operation::Append,
        Operation::View,
        Operation::Find,
        Operation::Audit,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Operation::List => "list",
            Operation::Mkdir => "mkdir",
            Operation::RmTree => "rmtree",
            Operation::Chmod => "chmod",
            Operation::Symlink => "symlink",
            Operation::Copy => "copy",
            Operation::Move => "move",
            Operation::Append => "append",
            Operation::View => "view",
            Operation::Find => "find",
            Operation::Audit => "audit",
        }
    }

    pub fn shape(self) -> ArgShape {
        match self {
            Operation::Audit => ArgShape::None,
            Operation::List | Operation::Mkdir | Operation::RmTree | Operation::View => {
                ArgShape::Path
            }
            Operation::Chmod => ArgShape::PathMode,
            Operation::Symlink | Operation::Copy | Operation::Move => ArgShape::TwoPaths,
            Operation::Append => ArgShape::PathContent,
            Operation::Find => ArgShape::PathPattern,
        }
    }

    /// True if the operation changes the filesystem.
    pub fn is_mutating(self) -> bool {
        matches!(
            self,
            Operation::Mkdir
                | Operation::RmTree
                | Operation::Chmod
                | Operation::Symlink
                | Operation::Copy
                | Operation::Move
                | Operation::Append
        )
    }

    /// True if the operation takes the optional `--overwrite` flag.
    pub fn accepts_overwrite(self) -> bool {
        matches!(self, Operation::Copy | Operation::Move)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Operation {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Operation::ALL
            .into_iter()
            .find(|op| op.name() == s)
            .ok_or(())
    }
}

/// Who is asking: a role plus, optionally, the username behind it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub role: Role,
    pub username: Option<String>,
}

impl Principal {
    pub fn new(role: Role) -> Self {
        Self {
            role,
            username: None,
        }
    }

    pub fn user(role: Role, username: impl Into<String>) -> Self {
        Self {
            role,
            username: Some(username.into()),
        }
    }

    /// Name written to the audit log: the username if known, else the role.
    pub fn actor(&self) -> &str {
        self.username.as_deref().unwrap_or(self.role.label())
    }
}
