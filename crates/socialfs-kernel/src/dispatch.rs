//! Dispatcher: the single entry point callers use.
//!
//! Each request walks a fixed pipeline:
//!
//! ```text
//! Received → Authorized → PathValidated → Executed → Logged → Completed
//!      └──────────┴──────────────┴──→ Rejected (still logged)
//! ```
//!
//! RoleGate and PathGuard run before anything touches the disk, so a rejected
//! request has no filesystem effect. Exactly one primitive runs per accepted
//! request. Every request, accepted or not, produces one audit record whose
//! outcome matches the returned result.

use std::path::{Path, PathBuf};

use tracing::Instrument;

use crate::audit::{AuditLog, AuditRecord, Outcome};
use crate::config::NamespaceConfig;
use crate::error::{AuditError, ErrorKind, GateError, GateResult};
use crate::fsops::{self, DirEntry, Find};
use crate::gate::RoleGate;
use crate::guard::PathGuard;
use crate::role::{OVERWRITE_FLAG, Operation, Principal, Role};

/// One caller action. Built per request and consumed by [`Dispatcher::dispatch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub principal: Principal,
    pub operation: Operation,
    pub args: Vec<String>,
}

impl Request {
    pub fn new<I, S>(role: Role, operation: Operation, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            principal: Principal::new(role),
            operation,
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Attach the username behind the role.
    pub fn as_user(mut self, username: impl Into<String>) -> Self {
        self.principal.username = Some(username.into());
        self
    }
}

/// Pipeline position of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    Authorized,
    PathValidated,
    Executed,
    Logged,
    Completed,
    Rejected,
}

/// Data returned by read-style operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Listing(Vec<DirEntry>),
    Content(Vec<u8>),
    Matches(Vec<PathBuf>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Output {
    pub message: String,
    pub payload: Option<Payload>,
}

impl Output {
    fn text(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            payload: None,
        }
    }

    fn with_payload(message: impl Into<String>, payload: Payload) -> Self {
        Self {
            message: message.into(),
            payload: Some(payload),
        }
    }
}

/// What a caller gets back.
#[derive(Debug)]
pub struct DispatchResult {
    /// Operation name as requested.
    pub operation: String,
    /// `Completed` or `Rejected`.
    pub stage: Stage,
    pub outcome: Result<Output, GateError>,
    /// Set when the audit record could not be written. Never masks `outcome`.
    pub audit_warning: Option<AuditError>,
}

impl DispatchResult {
    pub fn ok(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.outcome.as_ref().err().map(GateError::kind)
    }

    pub fn payload(&self) -> Option<&Payload> {
        self.outcome.as_ref().ok().and_then(|o| o.payload.as_ref())
    }

    /// The outcome as the audit log records it.
    pub fn audit_outcome(&self) -> Outcome {
        match (&self.outcome, self.stage) {
            (Ok(_), _) => Outcome::Success,
            (Err(e), Stage::Rejected) => Outcome::Rejected(e.kind()),
            (Err(e), _) => Outcome::Failed(e.kind()),
        }
    }

    /// Text for display: payload if there is one, else the message or error.
    pub fn render(&self) -> String {
        match &self.outcome {
            Err(e) => format!("{}: {e}", self.operation),
            Ok(output) => match &output.payload {
                None => output.message.clone(),
                Some(Payload::Listing(entries)) => entries
                    .iter()
                    .map(DirEntry::long_line)
                    .collect::<Vec<_>>()
                    .join("\n"),
                Some(Payload::Content(bytes)) => String::from_utf8_lossy(bytes).into_owned(),
                Some(Payload::Matches(paths)) => paths
                    .iter()
                    .map(|p| p.display().to_string())
                    .collect::<Vec<_>>()
                    .join("\n"),
            },
        }
    }
}

/// A request whose arguments passed every check, ready for one primitive.
#[derive(Debug)]
enum Validated {
    List(PathBuf),
    Mkdir(PathBuf),
    RmTree(PathBuf),
    Chmod(PathBuf, u32),
    Symlink { target: PathBuf, link: PathBuf },
    Copy { src: PathBuf, dest: PathBuf, overwrite: bool },
    Move { src: PathBuf, dest: PathBuf, overwrite: bool },
    Append(PathBuf, String),
    View(PathBuf),
    Find(Find),
    Audit(PathBuf),
}

impl Validated {
    /// Target paths as recorded in the audit trail. Append content is omitted.
    fn targets(&self) -> Vec<String> {
        let show = |p: &Path| p.display().to_string();
        match self {
            Validated::List(p)
            | Validated::Mkdir(p)
            | Validated::RmTree(p)
            | Validated::Append(p, _)
            | Validated::View(p) => vec![show(p)],
            Validated::Chmod(p, mode) => vec![show(p), format!("{mode:04o}")],
            Validated::Symlink { target, link } => vec![show(target), show(link)],
            Validated::Copy { src, dest, .. } | Validated::Move { src, dest, .. } => {
                vec![show(src), show(dest)]
            }
            Validated::Find(find) => vec![show(find.root()), find.pattern().to_string()],
            Validated::Audit(_) => Vec::new(),
        }
    }
}

/// Routes requests through RoleGate, PathGuard, FsOps and AuditLog.
///
/// Holds no mutable state; share it freely between tasks.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    gate: RoleGate,
    audit: AuditLog,
}

impl Dispatcher {
    pub fn new(config: NamespaceConfig) -> Self {
        let audit = AuditLog::new(config.audit_log_path());
        Self {
            gate: RoleGate::new(config),
            audit,
        }
    }

    pub fn config(&self) -> &NamespaceConfig {
        self.gate.config()
    }

    /// Run one request to completion.
    pub async fn dispatch(&self, request: Request) -> DispatchResult {
        let span = tracing::debug_span!(
            "dispatch",
            role = %request.principal.role,
            actor = request.principal.actor(),
            operation = request.operation.name(),
        );
        self.run(request).instrument(span).await
    }

    /// Run a request whose operation is given by name.
    ///
    /// Unknown names are unauthorized and still leave a rejected record.
    pub async fn dispatch_named(
        &self,
        principal: Principal,
        name: &str,
        args: Vec<String>,
    ) -> DispatchResult {
        match self.gate.authorize_named(principal.role, name) {
            Ok(operation) => {
                self.dispatch(Request {
                    principal,
                    operation,
                    args,
                })
                .await
            }
            Err(err) => {
                self.finish(&principal, name, args, Stage::Rejected, Err(err))
                    .await
            }
        }
    }

    async fn run(&self, request: Request) -> DispatchResult {
        let Request {
            principal,
            operation,
            args,
        } = request;
        tracing::debug!(stage = ?Stage::Received);

        if let Err(err) = self.gate.authorize(principal.role, operation) {
            let targets = raw_targets(operation, args);
            return self
                .finish(&principal, operation.name(), targets, Stage::Rejected, Err(err))
                .await;
        }
        tracing::debug!(stage = ?Stage::Authorized);

        let validated = match self.validate(&principal, operation, &args) {
            Ok(validated) => validated,
            Err(err) => {
                let targets = raw_targets(operation, args);
                return self
                    .finish(&principal, operation.name(), targets, Stage::Rejected, Err(err))
                    .await;
            }
        };
        tracing::debug!(stage = ?Stage::PathValidated);

        let targets = validated.targets();
        let outcome = self.execute(validated).await;
        tracing::debug!(stage = ?Stage::Executed, ok = outcome.is_ok());

        self.finish(&principal, operation.name(), targets, Stage::Completed, outcome)
            .await
    }

    /// Write the audit record and package the result.
    async fn finish(
        &self,
        principal: &Principal,
        operation: &str,
        targets: Vec<String>,
        stage: Stage,
        outcome: Result<Output, GateError>,
    ) -> DispatchResult {
        let mut result = DispatchResult {
            operation: operation.to_string(),
            stage,
            outcome,
            audit_warning: None,
        };
        if let Err(err) = &result.outcome {
            if stage == Stage::Rejected {
                tracing::warn!(actor = principal.actor(), operation, error = %err, "request rejected");
            }
        }

        let record = AuditRecord::now(principal.actor(), operation, targets, result.audit_outcome());
        match self.audit.record(&record).await {
            Ok(()) => tracing::debug!(stage = ?Stage::Logged),
            Err(err) => {
                tracing::warn!(error = %err, "audit write failed");
                result.audit_warning = Some(err);
            }
        }
        tracing::debug!(stage = ?result.stage);
        result
    }

    /// Arity, argument and path checks. Nothing here mutates the filesystem.
    fn validate(
        &self,
        principal: &Principal,
        operation: Operation,
        args: &[String],
    ) -> GateResult<Validated> {
        let overwrite = check_arity(operation, args)?;
        let config = self.gate.config();
        let guard = PathGuard::new(self.gate.roots(principal)?, config.max_path_len);

        let validated = match operation {
            Operation::List => Validated::List(guard.resolve(&args[0])?),
            Operation::View => Validated::View(guard.resolve(&args[0])?),
            Operation::Mkdir => {
                let path = guard.resolve(&args[0])?;
                self.protect_audit_log(&path, false)?;
                Validated::Mkdir(path)
            }
            Operation::RmTree => {
                let path = guard.resolve_no_follow(&args[0])?;
                if guard.is_root(&path) {
                    return Err(GateError::invalid_path(&args[0], "namespace root"));
                }
                self.protect_audit_log(&path, true)?;
                Validated::RmTree(path)
            }
            Operation::Chmod => {
                let path = guard.resolve(&args[0])?;
                let mode = parse_mode(&args[1]).ok_or_else(|| {
                    GateError::invalid_argument(operation, format!("bad octal mode {:?}", args[1]))
                })?;
                self.protect_audit_log(&path, false)?;
                Validated::Chmod(path, mode)
            }
            Operation::Symlink => {
                let target = &args[0];
                if target.is_empty() || target.chars().any(char::is_control) {
                    return Err(GateError::invalid_path(target, "bad symlink target"));
                }
                let link = guard.resolve_no_follow(&args[1])?;
                if config.confine_symlink_targets {
                    guard.check_link_target(&link, target)?;
                }
                self.protect_audit_log(&link, false)?;
                Validated::Symlink {
                    target: PathBuf::from(target),
                    link,
                }
            }
            Operation::Copy => {
                let src = guard.resolve(&args[0])?;
                let dest = self.destination(&guard, &src, &args[1])?;
                reject_same_file(operation, &src, &dest)?;
                Validated::Copy {
                    src,
                    dest,
                    overwrite,
                }
            }
            Operation::Move => {
                let src = guard.resolve_no_follow(&args[0])?;
                if guard.is_root(&src) {
                    return Err(GateError::invalid_path(&args[0], "namespace root"));
                }
                self.protect_audit_log(&src, true)?;
                let dest = self.destination(&guard, &src, &args[1])?;
                reject_same_file(operation, &src, &dest)?;
                Validated::Move {
                    src,
                    dest,
                    overwrite,
                }
            }
            Operation::Append => {
                let content = &args[1];
                if content.len() > config.max_content_len {
                    return Err(GateError::invalid_argument(
                        operation,
                        format!("content exceeds {} bytes", config.max_content_len),
                    ));
                }
                let path = guard.resolve(&args[0])?;
                self.protect_audit_log(&path, false)?;
                Validated::Append(path, content.clone())
            }
            Operation::Find => {
                let root = guard.resolve(&args[0])?;
                Validated::Find(Find::new(root, &args[1], guard)?)
            }
            Operation::Audit => Validated::Audit(self.audit.path().to_path_buf()),
        };
        Ok(validated)
    }

    /// Copy/move destination, descending into it if it is a directory.
    fn destination(&self, guard: &PathGuard, src: &Path, raw: &str) -> GateResult<PathBuf> {
        let mut dest = guard.resolve(raw)?;
        if dest.is_dir() {
            if let Some(name) = src.file_name() {
                dest = guard.resolve_within(&dest.join(name))?;
            }
        }
        self.protect_audit_log(&dest, false)?;
        Ok(dest)
    }

    /// The trail is written by AuditLog only.
    ///
    /// With `with_ancestors`, also refuse any directory that contains it.
    fn protect_audit_log(&self, path: &Path, with_ancestors: bool) -> GateResult<()> {
        let config = self.gate.config();
        let log = config
            .admin_root()
            .canonicalize()
            .map(|admin| admin.join(&config.audit_log))
            .unwrap_or_else(|_| config.audit_log_path());
        let hit = if with_ancestors {
            log.starts_with(path)
        } else {
            log == path
        };
        if hit {
            Err(GateError::PermissionDenied {
                path: path.to_path_buf(),
            })
        } else {
            Ok(())
        }
    }

    /// Run the single primitive for a validated request.
    async fn execute(&self, validated: Validated) -> GateResult<Output> {
        match validated {
            Validated::List(path) => {
                let entries = fsops::list_directory(&path).await?;
                Ok(Output::with_payload(
                    format!("{} entries", entries.len()),
                    Payload::Listing(entries),
                ))
            }
            Validated::Mkdir(path) => {
                let created = fsops::create_directory(&path).await?;
                let message = if created {
                    format!("created {}", path.display())
                } else {
                    format!("{} already exists", path.display())
                };
                Ok(Output::text(message))
            }
            Validated::RmTree(path) => {
                fsops::remove_tree(&path).await?;
                Ok(Output::text(format!("removed {}", path.display())))
            }
            Validated::Chmod(path, mode) => {
                fsops::change_mode(&path, mode).await?;
                Ok(Output::text(format!(
                    "mode of {} set to {mode:04o}",
                    path.display()
                )))
            }
            Validated::Symlink { target, link } => {
                fsops::create_symlink(&target, &link).await?;
                Ok(Output::text(format!(
                    "linked {} -> {}",
                    link.display(),
                    target.display()
                )))
            }
            Validated::Copy {
                src,
                dest,
                overwrite,
            } => {
                let bytes = fsops::copy(&src, &dest, overwrite).await?;
                Ok(Output::text(format!(
                    "copied {bytes} bytes to {}",
                    dest.display()
                )))
            }
            Validated::Move {
                src,
                dest,
                overwrite,
            } => {
                fsops::move_path(&src, &dest, overwrite).await?;
                Ok(Output::text(format!(
                    "moved {} to {}",
                    src.display(),
                    dest.display()
                )))
            }
            Validated::Append(path, content) => {
                fsops::append_or_create(&path, &content).await?;
                Ok(Output::text(format!("appended to {}", path.display())))
            }
            Validated::View(path) | Validated::Audit(path) => {
                let bytes = fsops::read_file(&path).await?;
                Ok(Output::with_payload(
                    format!("{} bytes", bytes.len()),
                    Payload::Content(bytes),
                ))
            }
            Validated::Find(find) => {
                let root = find.root().to_path_buf();
                let matches = tokio::task::spawn_blocking(move || {
                    find.iter().collect::<GateResult<Vec<_>>>()
                })
                .await
                .map_err(|e| GateError::Io {
                    path: root,
                    source: std::io::Error::other(e),
                })??;
                Ok(Output::with_payload(
                    format!("{} matches", matches.len()),
                    Payload::Matches(matches),
                ))
            }
        }
    }
}

/// Raw arguments as audit targets. Append content stays out of the trail.
fn raw_targets(operation: Operation, mut args: Vec<String>) -> Vec<String> {
    if operation == Operation::Append {
        args.truncate(1);
    }
    args
}

/// Copying or moving a file onto itself would destroy it.
fn reject_same_file(operation: Operation, src: &Path, dest: &Path) -> GateResult<()> {
    if src == dest || fsops::same_file(src, dest) {
        return Err(GateError::invalid_argument(
            operation,
            format!("{} and {} are the same file", src.display(), dest.display()),
        ));
    }
    Ok(())
}

/// Check argument count. Returns whether `--overwrite` was given.
fn check_arity(operation: Operation, args: &[String]) -> GateResult<bool> {
    let arity = operation.shape().arity();
    if args.len() == arity {
        return Ok(false);
    }
    if operation.accepts_overwrite()
        && args.len() == arity + 1
        && args[arity] == OVERWRITE_FLAG
    {
        return Ok(true);
    }
    Err(GateError::invalid_argument(
        operation,
        format!("expected {} ({}), got {}", arity, operation.shape().describe(), args.len()),
    ))
}

/// Octal mode such as `644`, `0644` or `0o644`, at most `7777`.
fn parse_mode(raw: &str) -> Option<u32> {
    let digits = raw.strip_prefix("0o").unwrap_or(raw);
    if digits.is_empty() || !digits.bytes().all(|b| (b'0'..=b'7').contains(&b)) {
        return None;
    }
    u32::from_str_radix(digits, 8)
        .ok()
        .filter(|mode| *mode <= 0o7777)
}
