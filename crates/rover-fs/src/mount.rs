//! Mounting a namespace.

use std::path::Path;

use fuser::MountOption;
use tracing::info;

use crate::config::FsConfig;
use crate::error::{FsError, FsResult};
use crate::fuse::RoverFs;
use crate::namespace::Namespace;

/// Mount options for `config`. The mount is always read-only.
pub fn mount_options(config: &FsConfig) -> Vec<MountOption> {
    let mut options = vec![
        MountOption::RO,
        MountOption::FSName(config.fs_name.clone()),
        MountOption::Subtype("rover".to_string()),
    ];
    if config.auto_unmount {
        options.push(MountOption::AutoUnmount);
    }
    if config.allow_other {
        options.push(MountOption::AllowOther);
    }
    options
}

/// Mount `namespace` at `mountpoint` and serve it until unmounted.
///
/// The mountpoint directory is created if it does not exist.
pub fn mount(namespace: Namespace, mountpoint: &Path) -> FsResult<()> {
    if !mountpoint.exists() {
        std::fs::create_dir_all(mountpoint)
            .map_err(|e| FsError::Mount(format!("creating {}: {e}", mountpoint.display())))?;
    }
    let options = mount_options(namespace.config());
    info!(mountpoint = %mountpoint.display(), fs_name = %namespace.config().fs_name, "mounting");
    fuser::mount2(RoverFs::new(namespace), mountpoint, &options)
        .map_err(|e| FsError::Mount(format!("{}: {e}", mountpoint.display())))?;
    info!(mountpoint = %mountpoint.display(), "unmounted");
    Ok(())
}
