//! Key type definitions
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


use std::fmt;

/// Identifier used to refer to a key. Always in `0..=i32::MAX`.
pub type KeyId = i32;

/// Maximum age of a key before a new one is created for challenges.
///
/// Clocks can be wrong, so this is a best effort rather than a guarantee.
pub const NEW_KEY_TIMEOUT_SECONDS: i64 = 60 * 5;

/// Age after which a key is dropped from the keyring file.
///
/// `EXPIRE_KEYS_TIMEOUT_SECONDS - NEW_KEY_TIMEOUT_SECONDS` is the minimum
/// window a peer has to complete authentication with a key.
pub const EXPIRE_KEYS_TIMEOUT_SECONDS: i64 = NEW_KEY_TIMEOUT_SECONDS + 60 * 2;

/// How far in the future a key's creation time may be.
pub const MAX_TIME_TRAVEL_SECONDS: i64 = 60 * 5;

/// Length of generated secrets
pub const KEY_LENGTH_BYTES: usize = 24;

/// Subdirectory of the home directory holding keyring files
pub const DEFAULT_KEYRING_SUBDIR: &str = ".dbus-keyrings";

/// A shared secret with its identifier and creation timestamp
#[derive(Clone, PartialEq, Eq)]
pub struct Key {
    /// Identifier peers exchange to refer to this key
    pub id: KeyId,
    /// Unix timestamp (seconds) at which the key was generated
    pub creation_time: i64,
    /// Secret bytes
    pub secret: Vec<u8>,
}

impl Key {
    pub fn new(id: KeyId, creation_time: i64, secret: Vec<u8>) -> Self {
        Self {
            id,
            creation_time,
            secret,
        }
    }

    /// Seconds elapsed since the key was created, negative if it lies in
    /// the future
    pub fn age(&self, now: i64) -> i64 {
        now.saturating_sub(self.creation_time)
    }

    /// Whether the key is still young enough to hand out for new challenges
    pub fn is_recent(&self, now: i64) -> bool {
        now.saturating_sub(NEW_KEY_TIMEOUT_SECONDS) < self.creation_time
    }

    /// Whether the key may be kept in the keyring at time `now`
    pub fn is_within_lifetime(&self, now: i64) -> bool {
        is_acceptable_timestamp(self.creation_time, now)
    }

    /// Secret encoded as lowercase hex
    pub fn hex_secret(&self) -> String {
        hex::encode(&self.secret)
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Key")
            .field("id", &self.id)
            .field("creation_time", &self.creation_time)
            .field("secret_len", &self.secret.len())
            .finish()
    }
}

/// Whether a creation timestamp is neither negative, too far in the future
/// nor expired relative to `now`
pub fn is_acceptable_timestamp(timestamp: i64, now: i64) -> bool {
    timestamp >= 0
        && timestamp <= now.saturating_add(MAX_TIME_TRAVEL_SECONDS)
        && timestamp >= now.saturating_sub(EXPIRE_KEYS_TIMEOUT_SECONDS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeouts() {
        assert_eq!(NEW_KEY_TIMEOUT_SECONDS, 300);
        assert_eq!(EXPIRE_KEYS_TIMEOUT_SECONDS, 420);
        assert_eq!(MAX_TIME_TRAVEL_SECONDS, 300);
    }

    #[test]
    fn test_is_recent_boundary() {
        let now = 1_000_000;
        let key = Key::new(1, now - NEW_KEY_TIMEOUT_SECONDS, vec![1]);
        assert!(!key.is_recent(now));

        let key = Key::new(1, now - NEW_KEY_TIMEOUT_SECONDS + 1, vec![1]);
        assert!(key.is_recent(now));
    }

    #[test]
    fn test_acceptable_timestamp_window() {
        let now = 1_000_000;
        assert!(is_acceptable_timestamp(now, now));
        assert!(is_acceptable_timestamp(now - EXPIRE_KEYS_TIMEOUT_SECONDS, now));
        assert!(!is_acceptable_timestamp(now - EXPIRE_KEYS_TIMEOUT_SECONDS - 1, now));
        assert!(is_acceptable_timestamp(now + MAX_TIME_TRAVEL_SECONDS, now));
        assert!(!is_acceptable_timestamp(now + MAX_TIME_TRAVEL_SECONDS + 1, now));
        assert!(!is_acceptable_timestamp(-1, 100));
    }

    #[test]
    fn test_debug_hides_secret() {
        let key = Key::new(7, 10, vec![0xde, 0xad, 0xbe, 0xef]);
        let debug = format!("{:?}", key);
        assert!(debug.contains("secret_len: 4"));
        assert!(!debug.contains("deadbeef"));
        assert_eq!(key.hex_secret(), "deadbeef");
    }
}
