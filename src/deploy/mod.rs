// ABOUTME: Release-based deployment: new releases, rollbacks, and their results.
// ABOUTME: Remote layout is <deploy_path>/releases/<id> plus a `current` symlink.

mod deployer;
mod error;
pub mod plan;
mod release;
mod result;
mod rollback;

pub use deployer::{BUNDLES_DIR, ReleaseDeployer};
pub use error::DeployError;
pub use release::{
    CURRENT_LINK, RELEASES_DIR, ReleaseIdGenerator, ReleaseInventory, ReleaseLayout,
};
pub use result::{DeployResult, SetupResult};
pub use rollback::RollbackExecutor;

use crate::diagnostics::{Diagnostics, Warning};
use crate::ssh::Remote;

/// Close a pipeline's remote. A failure to close is only a warning: the
/// operation's outcome is already decided.
pub(crate) async fn close_remote<R: Remote + ?Sized>(remote: &R, diag: &mut Diagnostics) {
    if let Err(e) = remote.end().await {
        diag.warn(Warning::session_close(format!("failed to close SSH session: {e}")));
    }
}
