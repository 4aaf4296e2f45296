//! Append-only audit trail.
//!
//! One line per attempted operation, in arrival order:
//!
//! ```text
//! 2026-10-18T09:14:03.512Z: amy - append /socialmedia/users/amy/post.txt -> ok
//! 2026-10-18T09:14:09.001Z: moderator - mkdir /socialmedia/admin/x -> rejected:unauthorized
//! ```
//!
//! The file is only ever opened in append mode. Writing the trail is not
//! transactional with the filesystem effect it describes: a failed write is
//! reported back as an [`AuditError`] and nothing is rolled back.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;

use crate::error::{AuditError, ErrorKind};

/// How an attempted operation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    /// Stopped by RoleGate, argument checks or PathGuard. Nothing ran.
    Rejected(ErrorKind),
    /// The filesystem primitive ran and failed.
    Failed(ErrorKind),
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Success => f.write_str("ok"),
            Outcome::Rejected(kind) => write!(f, "rejected:{kind}"),
            Outcome::Failed(kind) => write!(f, "failed:{kind}"),
        }
    }
}

/// One entry of the trail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditRecord {
    pub timestamp: DateTime<Utc>,
    /// Username, or the role label when there is none.
    pub actor: String,
    /// Operation name as requested, which may be unknown.
    pub operation: String,
    pub targets: Vec<String>,
    pub outcome: Outcome,
}

impl AuditRecord {
    pub fn now(
        actor: impl Into<String>,
        operation: impl Into<String>,
        targets: Vec<String>,
        outcome: Outcome,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            actor: actor.into(),
            operation: operation.into(),
            targets,
            outcome,
        }
    }

    /// Render as a single log line, newline included.
    ///
    /// Control characters in caller-supplied fields are escaped, so a crafted
    /// argument can't break the line or forge a second record.
    pub fn to_line(&self) -> String {
        let mut line = format!(
            "{}: {} - {}",
            self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            escape(&self.actor),
            escape(&self.operation),
        );
        for target in &self.targets {
            line.push(' ');
            line.push_str(&escape(target));
        }
        line.push_str(" -> ");
        line.push_str(&self.outcome.to_string());
        line.push('\n');
        line
    }
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if c.is_control() {
            out.extend(c.escape_default());
        } else {
            out.push(c);
        }
    }
    out
}

/// The durable trail file.
#[derive(Debug, Clone)]
pub struct AuditLog {
    path: PathBuf,
}

impl AuditLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record. The line is written with a single O_APPEND write.
    pub async fn record(&self, record: &AuditRecord) -> Result<(), AuditError> {
        let line = record.to_line();
        let wrap = |source| AuditError {
            path: self.path.clone(),
            source,
        };

        let mut file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.path)
            .await
            .map_err(wrap)?;
        file.write_all(line.as_bytes()).await.map_err(wrap)?;
        file.flush().await.map_err(wrap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed(outcome: Outcome, targets: &[&str]) -> AuditRecord {
        AuditRecord {
            timestamp: Utc.with_ymd_and_hms(2026, 10, 18, 9, 14, 3).unwrap(),
            actor: "amy".into(),
            operation: "copy".into(),
            targets: targets.iter().map(|t| t.to_string()).collect(),
            outcome,
        }
    }

    #[test]
    fn test_line_format() {
        let line = fixed(Outcome::Success, &["/a", "/b"]).to_line();
        assert_eq!(line, "2026-10-18T09:14:03.000Z: amy - copy /a /b -> ok\n");
    }

    #[test]
    fn test_outcome_labels() {
        assert_eq!(
            Outcome::Rejected(ErrorKind::Unauthorized).to_string(),
            "rejected:unauthorized"
        );
        assert_eq!(
            Outcome::Failed(ErrorKind::NotFound).to_string(),
            "failed:not_found"
        );
    }

    #[test]
    fn test_control_characters_cannot_forge_lines() {
        let line = fixed(
            Outcome::Rejected(ErrorKind::InvalidPath),
            &["x\n2026-01-01T00:00:00.000Z: admin - rmtree / -> ok"],
        )
        .to_line();
        assert_eq!(line.matches('\n').count(), 1);
        assert!(line.contains("x\\n2026"));
    }

    #[tokio::test]
    async fn test_record_appends_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let log = AuditLog::new(dir.path().join("activity_log.txt"));
        std::fs::write(log.path(), "earlier line\n").unwrap();

        log.record(&fixed(Outcome::Success, &["/a"])).await.unwrap();
        log.record(&fixed(Outcome::Failed(ErrorKind::NotFound), &["/b"]))
            .await
            .unwrap();

        let content = std::fs::read_to_string(log.path()).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "earlier line");
        assert!(lines[1].ends_with("copy /a -> ok"));
        assert!(lines[2].ends_with("copy /b -> failed:not_found"));
    }

    #[tokio::test]
    async fn test_unwritable_log_reports_error() {
        let dir = tempfile::tempdir().unwrap();
        let log = AuditLog::new(dir.path().join("missing/activity_log.txt"));

        let err = log.record(&fixed(Outcome::Success, &[])).await.unwrap_err();
        assert_eq!(err.path, log.path());
    }
}
