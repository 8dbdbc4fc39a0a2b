//! Configuration for the namespace and its mount.
//!
//! Every field has a default, so an empty TOML file is a valid config.
//! Process-bound values (the fallback timestamp and the owner identity) are
//! never read from the file; they are injected when the config is built.

use std::path::Path;
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};

use crate::error::{FsError, FsResult};

/// Configuration of a Rover namespace.
///
/// # Example
///
/// ```ignore
/// let config = FsConfig::default()
///     .with_roots_ttl(Duration::from_secs(30))
///     .with_search_limit(500);
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct FsConfig {
    /// Time-to-live of the top-level roots listing, in seconds.
    pub roots_refresh_secs: u64,
    /// Result limit of each root attribute search.
    pub search_limit: usize,
    /// How long the kernel may cache attributes and entries, in seconds.
    pub attr_ttl_secs: u64,
    /// Default transfer mode of open responses. File versions clear it.
    pub direct_io: bool,
    /// Filesystem name shown in the mount table.
    pub fs_name: String,
    /// Let other users access the mount.
    pub allow_other: bool,
    /// Unmount automatically when the process exits.
    pub auto_unmount: bool,
    /// Fallback modification and creation time.
    #[serde(skip)]
    pub server_start: SystemTime,
    /// Owner of every node.
    #[serde(skip)]
    pub uid: u32,
    /// Group of every node.
    #[serde(skip)]
    pub gid: u32,
}

impl Default for FsConfig {
    fn default() -> Self {
        let (uid, gid) = process_identity();
        Self {
            roots_refresh_secs: 60,
            search_limit: 100,
            attr_ttl_secs: 1,
            direct_io: true,
            fs_name: "rover".to_string(),
            allow_other: false,
            auto_unmount: true,
            server_start: SystemTime::now(),
            uid,
            gid,
        }
    }
}

impl FsConfig {
    /// Parse a TOML document. Missing fields keep their defaults.
    pub fn from_toml_str(s: &str) -> FsResult<Self> {
        toml::from_str(s).map_err(|e| FsError::Config(e.to_string()))
    }

    /// Load a TOML config file.
    pub fn from_path(path: &Path) -> FsResult<Self> {
        let s = std::fs::read_to_string(path)
            .map_err(|e| FsError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&s)
    }

    /// Render the serializable fields as TOML.
    pub fn to_toml_string(&self) -> FsResult<String> {
        toml::to_string_pretty(self).map_err(|e| FsError::Config(e.to_string()))
    }

    pub fn roots_ttl(&self) -> Duration {
        Duration::from_secs(self.roots_refresh_secs)
    }

    pub fn attr_ttl(&self) -> Duration {
        Duration::from_secs(self.attr_ttl_secs)
    }

    /// Flags every open response starts from.
    pub fn default_open_flags(&self) -> u32 {
        if self.direct_io {
            fuser::consts::FOPEN_DIRECT_IO
        } else {
            0
        }
    }

    /// Set the roots time-to-live. Sub-second precision is truncated.
    pub fn with_roots_ttl(mut self, ttl: Duration) -> Self {
        self.roots_refresh_secs = ttl.as_secs();
        self
    }

    pub fn with_search_limit(mut self, limit: usize) -> Self {
        self.search_limit = limit;
        self
    }

    pub fn with_server_start(mut self, start: SystemTime) -> Self {
        self.server_start = start;
        self
    }

    pub fn with_identity(mut self, uid: u32, gid: u32) -> Self {
        self.uid = uid;
        self.gid = gid;
        self
    }

    pub fn with_direct_io(mut self, direct_io: bool) -> Self {
        self.direct_io = direct_io;
        self
    }

    pub fn with_allow_other(mut self, allow_other: bool) -> Self {
        self.allow_other = allow_other;
        self
    }
}

/// Effective uid and gid of this process.
pub fn process_identity() -> (u32, u32) {
    // SAFETY: geteuid/getegid cannot fail and touch no memory.
    unsafe { (libc::geteuid(), libc::getegid()) }
}
