//! Namespace bootstrap.
//!
//! Lays out the directory tree every role expects:
//!
//! ```text
//! <base>/
//! ├── admin/                 0700  (audit log lives here)
//! ├── moderators/            0750
//! │   ├── flagged/
//! │   └── reports/
//! └── users/                 0755
//! ```

use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;

use tokio::fs;

use crate::config::NamespaceConfig;
use crate::error::{GateResult, IoResultExt};

const ADMIN_MODE: u32 = 0o700;
const MODERATORS_MODE: u32 = 0o750;
const USERS_MODE: u32 = 0o755;

/// Create the namespace tree and set its modes. Safe to run repeatedly.
pub async fn bootstrap(config: &NamespaceConfig) -> GateResult<()> {
    let moderators = config.moderators_root();
    let dirs: [PathBuf; 4] = [
        config.admin_root(),
        moderators.join("flagged"),
        moderators.join("reports"),
        config.users_root(),
    ];
    for dir in &dirs {
        fs::create_dir_all(dir).await.at(dir)?;
    }

    for (dir, mode) in [
        (config.admin_root(), ADMIN_MODE),
        (moderators, MODERATORS_MODE),
        (config.users_root(), USERS_MODE),
    ] {
        fs::set_permissions(&dir, std::fs::Permissions::from_mode(mode))
            .await
            .at(&dir)?;
    }

    tracing::info!(base = %config.base.display(), "namespace ready");
    Ok(())
}
