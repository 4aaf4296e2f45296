//! Namespace configuration.
//!
//! Every directory the dispatcher may touch is derived from a
//! [`NamespaceConfig`]. Nothing is hardcoded, so tests point the whole
//! namespace at a temp directory.
//!
//! Config is read from TOML:
//!
//! ```toml
//! base = "/socialmedia"
//! users_dir = "users"
//! max_path_len = 256
//! confine_symlink_targets = false
//! ```
//!
//! Missing keys take their defaults. The default file location follows XDG:
//! `$XDG_CONFIG_HOME/socialfs/config.toml`.

use std::path::{Component, Path, PathBuf};

use directories::BaseDirs;
use serde::Deserialize;
use thiserror::Error;

/// Errors loading or validating a config file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Layout and limits of the namespace.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NamespaceConfig {
    /// Namespace base directory. Must be absolute.
    pub base: PathBuf,
    /// Admin area, relative to `base`.
    pub admin_dir: String,
    /// Moderator area, relative to `base`.
    pub moderators_dir: String,
    /// Parent of per-user subtrees, relative to `base`.
    pub users_dir: String,
    /// Audit log file name inside the admin area.
    pub audit_log: String,
    /// Longest raw path argument accepted, in bytes.
    pub max_path_len: usize,
    /// Longest append payload accepted, in bytes.
    pub max_content_len: usize,
    /// Require symlink targets to resolve inside the role's roots at creation.
    pub confine_symlink_targets: bool,
}

impl Default for NamespaceConfig {
    fn default() -> Self {
        Self {
            base: PathBuf::from("/socialmedia"),
            admin_dir: "admin".to_string(),
            moderators_dir: "moderators".to_string(),
            users_dir: "users".to_string(),
            audit_log: "activity_log.txt".to_string(),
            max_path_len: 256,
            max_content_len: 2048,
            confine_symlink_targets: false,
        }
    }
}

impl NamespaceConfig {
    /// Default layout rooted at `base` instead of `/socialmedia`.
    pub fn rooted_at(base: impl Into<PathBuf>) -> Self {
        Self {
            base: base.into(),
            ..Self::default()
        }
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&source)
    }

    /// Load from the XDG location if a file exists there, else defaults.
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = default_config_path();
        if path.is_file() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.base.is_absolute() {
            return Err(ConfigError::Invalid(format!(
                "base must be absolute, got {}",
                self.base.display()
            )));
        }
        for (key, value) in [
            ("admin_dir", &self.admin_dir),
            ("moderators_dir", &self.moderators_dir),
            ("users_dir", &self.users_dir),
            ("audit_log", &self.audit_log),
        ] {
            if !is_single_segment(value) {
                return Err(ConfigError::Invalid(format!(
                    "{key} must be a single path segment, got {value:?}"
                )));
            }
        }
        if self.admin_dir == self.moderators_dir
            || self.admin_dir == self.users_dir
            || self.moderators_dir == self.users_dir
        {
            return Err(ConfigError::Invalid(
                "admin_dir, moderators_dir and users_dir must differ".into(),
            ));
        }
        if self.max_path_len == 0 {
            return Err(ConfigError::Invalid("max_path_len must be > 0".into()));
        }
        Ok(())
    }

    pub fn admin_root(&self) -> PathBuf {
        self.base.join(&self.admin_dir)
    }

    pub fn moderators_root(&self) -> PathBuf {
        self.base.join(&self.moderators_dir)
    }

    pub fn users_root(&self) -> PathBuf {
        self.base.join(&self.users_dir)
    }

    /// Where the audit trail is appended.
    pub fn audit_log_path(&self) -> PathBuf {
        self.admin_root().join(&self.audit_log)
    }
}

/// True if `s` is exactly one normal path component.
pub(crate) fn is_single_segment(s: &str) -> bool {
    let mut components = Path::new(s).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    ) && !s.contains('/')
}

/// `$XDG_CONFIG_HOME/socialfs`, or `~/.config/socialfs` as a fallback.
pub fn config_dir() -> PathBuf {
    BaseDirs::new()
        .map(|d| d.config_dir().to_path_buf())
        .unwrap_or_else(|| home_fallback().join(".config"))
        .join("socialfs")
}

pub fn default_config_path() -> PathBuf {
    config_dir().join("config.toml")
}

fn home_fallback() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_socialmedia_layout() {
        let config = NamespaceConfig::default();
        assert_eq!(config.admin_root(), PathBuf::from("/socialmedia/admin"));
        assert_eq!(
            config.audit_log_path(),
            PathBuf::from("/socialmedia/admin/activity_log.txt")
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config = NamespaceConfig::from_toml_str(
            r#"
            base = "/srv/social"
            confine_symlink_targets = true
            "#,
        )
        .unwrap();
        assert_eq!(config.users_root(), PathBuf::from("/srv/social/users"));
        assert!(config.confine_symlink_targets);
        assert_eq!(config.max_path_len, 256);
    }

    #[test]
    fn test_relative_base_rejected() {
        let err = NamespaceConfig::from_toml_str(r#"base = "socialmedia""#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_nested_dir_names_rejected() {
        for bad in ["a/b", "..", ".", ""] {
            let config = NamespaceConfig {
                users_dir: bad.to_string(),
                ..NamespaceConfig::default()
            };
            assert!(config.validate().is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn test_shared_area_names_rejected() {
        let err = NamespaceConfig::from_toml_str(
            r#"
            base = "/srv/social"
            moderators_dir = "users"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_unknown_keys_rejected() {
        let err = NamespaceConfig::from_toml_str("colour = \"blue\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_config_path_is_under_socialfs() {
        assert!(config_dir().ends_with("socialfs"));
        assert!(default_config_path().ends_with("socialfs/config.toml"));
    }
}
