//! Injectable capabilities: wall clock, randomness and home directory lookup
//!
//! The keyring never touches ambient time, entropy or user databases
//! directly. Each is reached through one of the traits below so that
//! expiry, id generation and lock staleness can be driven deterministically.
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
use rand::RngCore;
use std::path::PathBuf;
use std::time::Duration;

/// Source of wall-clock time and blocking sleeps
pub trait Clock {
    /// Current Unix time in seconds
    fn now(&self) -> i64;

    /// Block the calling thread for `duration`
    fn sleep(&self, duration: Duration);
}

/// Source of random bytes for key ids and secrets
pub trait RandomSource {
    /// Fill `buf` entirely with random bytes
    fn fill_bytes(&mut self, buf: &mut [u8]) -> KeyringResult<()>;
}

/// Resolves the home directory holding a user's keyrings
pub trait HomeResolver {
    /// Home directory of `username`, or of the current process owner when
    /// `username` is `None`
    fn home_dir(&self, username: Option<&str>) -> KeyringResult<PathBuf>;
}

/// System clock backed by `chrono`
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Operating system randomness
#[derive(Debug, Default, Clone, Copy)]
pub struct OsRandom;

impl RandomSource for OsRandom {
    fn fill_bytes(&mut self, buf: &mut [u8]) -> KeyringResult<()> {
        rand::rngs::OsRng
            .try_fill_bytes(buf)
            .map_err(|e| KeyringError::Failed(format!("Failed to generate random bytes: {}", e)))
    }
}

/// Looks up home directories from the running system
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemHomeResolver;

impl HomeResolver for SystemHomeResolver {
    fn home_dir(&self, username: Option<&str>) -> KeyringResult<PathBuf> {
        match username {
            None => dirs::home_dir().ok_or_else(|| {
                KeyringError::Failed("Could not determine home directory of current user".to_string())
            }),
            Some(name) => home_dir_for_user(name),
        }
    }
}

#[cfg(unix)]
fn home_dir_for_user(username: &str) -> KeyringResult<PathBuf> {
    let user = nix::unistd::User::from_name(username).map_err(|e| {
        KeyringError::Failed(format!("Failed to look up user {}: {}", username, e))
    })?;

    user.map(|user| user.dir)
        .filter(|home| !home.as_os_str().is_empty())
        .ok_or_else(|| KeyringError::Failed(format!("No home directory found for user {}", username)))
}

#[cfg(not(unix))]
fn home_dir_for_user(username: &str) -> KeyringResult<PathBuf> {
    Err(KeyringError::Failed(format!(
        "Looking up other users is not supported on this platform: {}",
        username
    )))
}

/// Always resolves to the same directory, whatever the username
#[derive(Debug, Clone)]
pub struct FixedHomeResolver {
    home: PathBuf,
}

impl FixedHomeResolver {
    pub fn new(home: impl Into<PathBuf>) -> Self {
        Self { home: home.into() }
    }
}

impl HomeResolver for FixedHomeResolver {
    fn home_dir(&self, _username: Option<&str>) -> KeyringResult<PathBuf> {
        Ok(self.home.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_user_has_no_home() {
        let err = SystemHomeResolver
            .home_dir(Some("homekeys-no-such-user-8f3a"))
            .unwrap_err();
        assert!(err.is_failed());
    }

    #[cfg(unix)]
    #[test]
    fn test_root_user_has_home() {
        let home = SystemHomeResolver.home_dir(Some("root")).unwrap();
        assert!(home.is_absolute());
    }

    #[test]
    fn test_fixed_home_resolver() {
        let resolver = FixedHomeResolver::new("/tmp/somewhere");
        assert_eq!(resolver.home_dir(None).unwrap(), PathBuf::from("/tmp/somewhere"));
        assert_eq!(resolver.home_dir(Some("x")).unwrap(), PathBuf::from("/tmp/somewhere"));
    }

    #[test]
    fn test_os_random_fills_buffer() {
        let mut a = [0u8; 32];
        let mut b = [0u8; 32];
        OsRandom.fill_bytes(&mut a).unwrap();
        OsRandom.fill_bytes(&mut b).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_system_clock_is_sane() {
        // 2020-01-01
        assert!(SystemClock.now() > 1_577_836_800);
    }
}
