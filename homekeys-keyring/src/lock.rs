//! Advisory lock file guarding writes to a keyring file
//!
//! Byte-range locks are unreliable on the network filesystems home
//! directories tend to live on, so the lock is a marker file created with
//! `O_EXCL`. A holder that crashes leaves the marker behind; after waiting
//! out a bounded number of timeouts the marker is presumed stale and
//! replaced. There is no ownership token: the lock only arbitrates between
//! cooperating writers.
// Copyright 2025 Francisco F. Pinochet
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.


use crate::error::{KeyringError, KeyringResult};
use crate::providers::Clock;
use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// Maximum number of timeouts waiting for the lock before it is presumed stale
pub const MAX_LOCK_TIMEOUTS: u32 = 32;

/// Length of each wait for the lock
pub const LOCK_TIMEOUT_MILLISECONDS: u64 = 250;

/// Retry policy for lock acquisition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockPolicy {
    /// Number of failed attempts before the lock is presumed stale
    pub max_timeouts: u32,
    /// Sleep between attempts
    pub timeout: Duration,
}

impl Default for LockPolicy {
    fn default() -> Self {
        Self {
            max_timeouts: MAX_LOCK_TIMEOUTS,
            timeout: Duration::from_millis(LOCK_TIMEOUT_MILLISECONDS),
        }
    }
}

impl LockPolicy {
    pub fn new(max_timeouts: u32, timeout: Duration) -> Self {
        Self {
            max_timeouts,
            timeout,
        }
    }

    /// Longest time `FileLock::acquire` waits before overriding a stale lock
    pub fn worst_case_wait(&self) -> Duration {
        self.timeout * self.max_timeouts
    }
}

/// A held lock marker. The marker is deleted when the guard is dropped.
#[derive(Debug)]
pub struct FileLock {
    path: PathBuf,
}

impl FileLock {
    /// Acquire the lock at `path`, waiting and finally breaking a stale lock
    /// according to `policy`
    pub fn acquire(path: &Path, policy: &LockPolicy, clock: &dyn Clock) -> KeyringResult<Self> {
        let mut timeouts = 0;
        while timeouts < policy.max_timeouts {
            match create_exclusive(path) {
                Ok(()) => return Ok(Self::held(path)),
                Err(e) => {
                    debug!(
                        path = %path.display(),
                        error = %e,
                        sleep_ms = policy.timeout.as_millis() as u64,
                        "Did not get lock file, sleeping"
                    );
                }
            }

            clock.sleep(policy.timeout);
            timeouts += 1;
        }

        warn!(
            path = %path.display(),
            timeouts = timeouts,
            "Lock file timed out, assuming stale"
        );

        if let Err(e) = fs::remove_file(path) {
            if e.kind() != io::ErrorKind::NotFound {
                warn!(path = %path.display(), error = %e, "Couldn't delete stale lock file");
            }
        }

        create_exclusive(path).map_err(|e| {
            KeyringError::Failed(format!(
                "Couldn't create lock file {} after deleting stale one: {}",
                path.display(),
                e
            ))
        })?;

        Ok(Self::held(path))
    }

    fn held(path: &Path) -> Self {
        debug!(path = %path.display(), "Acquired keyring lock");
        Self {
            path: path.to_path_buf(),
        }
    }

    /// Path of the marker file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Release the lock now rather than at end of scope
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        release(&self.path);
    }
}

/// Delete a lock marker. Failure is logged and otherwise ignored.
pub fn release(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        warn!(path = %path.display(), error = %e, "Failed to delete lock file");
    }
}

fn create_exclusive(path: &Path) -> io::Result<()> {
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);

    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    options.open(path).map(|_| ())
}
