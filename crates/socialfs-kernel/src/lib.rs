//! socialfs-kernel: role-gated filesystem commands over a fixed namespace.
//!
//! Three roles (admin, moderator, user) operate on a directory namespace
//! (`/socialmedia/...` by default). A caller hands the [`Dispatcher`] a
//! role, an operation and its arguments; the request passes through:
//!
//! - **RoleGate** ([`gate`]): is this role allowed this operation, and which
//!   roots may it touch?
//! - **PathGuard** ([`guard`]): lexical checks, then canonical containment
//!   under those roots.
//! - **FsOps** ([`fsops`]): one direct filesystem call. No shell, ever.
//! - **AuditLog** ([`audit`]): one appended line per attempt.
//!
//! ```no_run
//! use socialfs_kernel::{Dispatcher, NamespaceConfig, Operation, Request, Role};
//!
//! # async fn demo() {
//! let dispatcher = Dispatcher::new(NamespaceConfig::default());
//! let request = Request::new(Role::RegularUser, Operation::Append, ["post.txt", "hello"])
//!     .as_user("amy");
//! let result = dispatcher.dispatch(request).await;
//! println!("{}", result.render());
//! # }
//! ```
//!
//! The kernel is Unix-only: modes and symlinks are POSIX concepts.

pub mod audit;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod fsops;
pub mod gate;
pub mod guard;
pub mod namespace;
pub mod role;

pub use audit::{AuditLog, AuditRecord, Outcome};
pub use config::{ConfigError, NamespaceConfig};
pub use dispatch::{DispatchResult, Dispatcher, Output, Payload, Request, Stage};
pub use error::{AuditError, ErrorKind, GateError, GateResult};
pub use fsops::{DirEntry, DirEntryKind};
pub use gate::RoleGate;
pub use guard::PathGuard;
pub use namespace::bootstrap;
pub use role::{ArgShape, Operation, Principal, Role};
