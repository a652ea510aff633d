//! Keyring handle: paths, the cached key set and the reload protocol
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


use crate::codec::{parse_keyring, serialize_keyring};
use crate::context::validate_context;
use crate::error::{KeyringError, KeyringResult};
use crate::key_types::{Key, KeyId, DEFAULT_KEYRING_SUBDIR};
use crate::lifecycle::{find_key_by_id, find_recent_key, generate_key};
use crate::lock::{FileLock, LockPolicy};
use crate::providers::{
    Clock, FixedHomeResolver, HomeResolver, OsRandom, RandomSource, SystemClock,
    SystemHomeResolver,
};
use std::cell::RefCell;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Keyring settings independent of where time and randomness come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyringOptions {
    /// Directory under the home directory holding keyring files
    pub subdir: String,
    /// Lock acquisition policy for writes
    pub lock_policy: LockPolicy,
}

impl Default for KeyringOptions {
    fn default() -> Self {
        Self {
            subdir: DEFAULT_KEYRING_SUBDIR.to_string(),
            lock_policy: LockPolicy::default(),
        }
    }
}

/// Builder for keyrings with non-default options or capabilities
pub struct KeyringBuilder {
    options: KeyringOptions,
    clock: Box<dyn Clock>,
    random: Box<dyn RandomSource>,
    home: Box<dyn HomeResolver>,
}

impl Default for KeyringBuilder {
    fn default() -> Self {
        Self {
            options: KeyringOptions::default(),
            clock: Box::new(SystemClock),
            random: Box::new(OsRandom),
            home: Box::new(SystemHomeResolver),
        }
    }
}

impl KeyringBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn options(mut self, options: KeyringOptions) -> Self {
        self.options = options;
        self
    }

    pub fn lock_policy(mut self, policy: LockPolicy) -> Self {
        self.options.lock_policy = policy;
        self
    }

    pub fn clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn random(mut self, random: impl RandomSource + 'static) -> Self {
        self.random = Box::new(random);
        self
    }

    pub fn home_resolver(mut self, resolver: impl HomeResolver + 'static) -> Self {
        self.home = Box::new(resolver);
        self
    }

    /// Use `home` instead of looking the home directory up
    pub fn home_dir(self, home: impl Into<PathBuf>) -> Self {
        self.home_resolver(FixedHomeResolver::new(home))
    }

    /// Open the keyring named `context` in the home directory of `username`,
    /// or of the current process owner when `username` is `None`.
    ///
    /// Existing keys are loaded best-effort: an unreadable or missing file
    /// yields an empty keyring, not an error. The keyring directory is
    /// created if missing; failing that only means new keys can't be saved.
    pub fn create(self, username: Option<&str>, context: &str) -> KeyringResult<Keyring> {
        let homedir = self.home.home_dir(username)?;

        if !validate_context(context.as_bytes()) {
            return Err(KeyringError::Failed(
                "Invalid context in keyring creation".to_string(),
            ));
        }

        let directory = homedir.join(&self.options.subdir);
        let filename = directory.join(context);
        let mut lock_name = filename.clone().into_os_string();
        lock_name.push(".lock");
        let filename_lock = PathBuf::from(lock_name);

        let mut state = KeyringState {
            directory,
            filename,
            filename_lock,
            keys: Vec::new(),
            lock_policy: self.options.lock_policy,
            clock: self.clock,
            random: self.random,
        };

        if let Err(e) = state.reload(false) {
            debug!(error = %e, "Didn't load an existing keyring");
        }

        if let Err(e) = create_private_dir(&state.directory) {
            debug!(
                path = %state.directory.display(),
                error = %e,
                "Creating keyring directory failed"
            );
        }

        Ok(Keyring {
            inner: Rc::new(RefCell::new(state)),
        })
    }
}

/// Handle to a keyring in a user's home directory.
///
/// Cloning takes another reference to the same keyring and dropping the
/// last clone releases it. The handle is neither `Send` nor `Sync`; only
/// the lock file coordinates separate processes.
#[derive(Clone)]
pub struct Keyring {
    inner: Rc<RefCell<KeyringState>>,
}

struct KeyringState {
    directory: PathBuf,
    filename: PathBuf,
    filename_lock: PathBuf,
    keys: Vec<Key>,
    lock_policy: LockPolicy,
    clock: Box<dyn Clock>,
    random: Box<dyn RandomSource>,
}

impl Keyring {
    /// Open a keyring with system time, OS randomness and the system's
    /// idea of the user's home directory
    pub fn create(username: Option<&str>, context: &str) -> KeyringResult<Self> {
        KeyringBuilder::new().create(username, context)
    }

    pub fn builder() -> KeyringBuilder {
        KeyringBuilder::new()
    }

    /// Id of a recent key to use for a challenge, creating and saving a new
    /// key when none of the loaded ones is recent enough
    pub fn get_best_key(&self) -> KeyringResult<KeyId> {
        let mut state = self.inner.borrow_mut();

        if let Some(key) = find_recent_key(&state.keys, state.clock.now()) {
            return Ok(key.id);
        }

        // All keys are too old, or the keyring was never loaded
        state.reload(true)?;

        find_recent_key(&state.keys, state.clock.now())
            .map(|key| key.id)
            .ok_or_else(|| {
                KeyringError::Failed(
                    "No recent-enough key found in keyring, and unable to create a new key"
                        .to_string(),
                )
            })
    }

    /// Reload keys from disk. With `add_new`, also add a fresh key and
    /// rewrite the file under the lock, which drops expired keys from it.
    ///
    /// On error the previously loaded keys are kept unchanged.
    pub fn reload(&self, add_new: bool) -> KeyringResult<()> {
        self.inner.borrow_mut().reload(add_new)
    }

    /// Key with the given id, as last loaded
    pub fn get_key(&self, id: KeyId) -> Option<Key> {
        find_key_by_id(&self.inner.borrow().keys, id).cloned()
    }

    /// Hex-encoded secret of the key with the given id
    pub fn hex_key(&self, id: KeyId) -> Option<String> {
        find_key_by_id(&self.inner.borrow().keys, id).map(Key::hex_secret)
    }

    /// Snapshot of the loaded keys in file order
    pub fn keys(&self) -> Vec<Key> {
        self.inner.borrow().keys.clone()
    }

    pub fn directory(&self) -> PathBuf {
        self.inner.borrow().directory.clone()
    }

    pub fn file_path(&self) -> PathBuf {
        self.inner.borrow().filename.clone()
    }

    pub fn lock_path(&self) -> PathBuf {
        self.inner.borrow().filename_lock.clone()
    }

    /// Number of live handles to this keyring
    pub fn ref_count(&self) -> usize {
        Rc::strong_count(&self.inner)
    }
}

impl std::fmt::Debug for Keyring {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.borrow();
        f.debug_struct("Keyring")
            .field("file", &state.filename)
            .field("keys", &state.keys.len())
            .finish()
    }
}

impl KeyringState {
    fn reload(&mut self, add_new: bool) -> KeyringResult<()> {
        let now = self.clock.now();

        // Held until the end of this function, whichever way it exits
        let _lock = if add_new {
            let lock = FileLock::acquire(&self.filename_lock, &self.lock_policy, self.clock.as_ref())
                .map_err(|e| {
                    warn!(path = %self.filename_lock.display(), error = %e, "Could not lock keyring file");
                    match e {
                        KeyringError::Failed(reason) => KeyringError::Failed(format!(
                            "Could not lock keyring file to add to it: {}",
                            reason
                        )),
                        other => other,
                    }
                })?;
            Some(lock)
        } else {
            None
        };

        let contents = match fs::read(&self.filename) {
            Ok(contents) => contents,
            Err(e) => {
                // Carry on with an empty keyring so the file gets recreated
                debug!(path = %self.filename.display(), error = %e, "Failed to load keyring file");
                Vec::new()
            }
        };

        let mut keys = parse_keyring(&contents, now);

        if add_new {
            let key = generate_key(&keys, now, self.random.as_mut())?;
            keys.push(key);

            let serialized = serialize_keyring(&keys);
            write_atomically(&self.filename, serialized.as_bytes()).map_err(|e| {
                warn!(path = %self.filename.display(), error = %e, "Failed to save keyring file");
                e
            })?;
            info!(
                path = %self.filename.display(),
                count = keys.len(),
                "Saved keyring file"
            );
        }

        self.keys = keys;
        Ok(())
    }
}

impl Drop for KeyringState {
    fn drop(&mut self) {
        debug!(path = %self.filename.display(), "Releasing keyring");
    }
}

/// Replace `path` with `data` through a temporary file and a rename, so
/// readers see either the old or the new contents
fn write_atomically(path: &Path, data: &[u8]) -> io::Result<()> {
    let temp_path = path.with_extension(format!("tmp.{}", Uuid::new_v4()));

    let written = (|| {
        let mut options = OpenOptions::new();
        options.write(true).create_new(true);

        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        let mut file = options.open(&temp_path)?;
        file.write_all(data)?;
        file.sync_all()?;
        fs::rename(&temp_path, path)
    })();

    if written.is_err() {
        if let Err(e) = fs::remove_file(&temp_path) {
            debug!(path = %temp_path.display(), error = %e, "Failed to remove temporary keyring file");
        }
    }
    written
}

fn create_private_dir(path: &Path) -> io::Result<()> {
    let mut builder = fs::DirBuilder::new();

    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o700);
    }

    match builder.create(path) {
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(()),
        other => other,
    }
}
