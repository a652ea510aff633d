//! Key generation and selection
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
use crate::key_types::{Key, KeyId, KEY_LENGTH_BYTES};
use crate::providers::RandomSource;
use tracing::{debug, info};

/// Upper bound on id draws before giving up on a random source that keeps
/// producing taken or unusable ids
pub const MAX_ID_ATTEMPTS: u32 = 64;

/// Generate a key whose id is not used by any of `existing`.
///
/// The id comes from 4 random bytes read as a little-endian `i32` and made
/// non-negative. The secret is a separate 24-byte draw made once the id is
/// settled.
pub fn generate_key(
    existing: &[Key],
    now: i64,
    rng: &mut dyn RandomSource,
) -> KeyringResult<Key> {
    let id = draw_unique_id(existing, rng)?;

    let mut secret = vec![0u8; KEY_LENGTH_BYTES];
    rng.fill_bytes(&mut secret)?;

    info!(key_id = id, creation_time = now, "Creating new secret key");
    Ok(Key::new(id, now, secret))
}

fn draw_unique_id(existing: &[Key], rng: &mut dyn RandomSource) -> KeyringResult<KeyId> {
    for _ in 0..MAX_ID_ATTEMPTS {
        let mut bytes = [0u8; 4];
        rng.fill_bytes(&mut bytes)?;

        // i32::MIN has no non-negative counterpart
        let Some(id) = i32::from_le_bytes(bytes).checked_abs() else {
            debug!("Drew unusable key ID, trying another one");
            continue;
        };

        if find_key_by_id(existing, id).is_some() {
            debug!(key_id = id, "Key ID already existed, trying another one");
            continue;
        }

        return Ok(id);
    }

    Err(KeyringError::Failed(format!(
        "Could not generate a unique key ID after {} attempts",
        MAX_ID_ATTEMPTS
    )))
}

/// First key, in storage order, that is still recent at `now`
pub fn find_recent_key(keys: &[Key], now: i64) -> Option<&Key> {
    keys.iter().find(|key| {
        debug!(key_id = key.id, age = key.age(now), "Considering key");
        key.is_recent(now)
    })
}

/// Key with the given id, if loaded
pub fn find_key_by_id(keys: &[Key], id: KeyId) -> Option<&Key> {
    keys.iter().find(|key| key.id == id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key_types::NEW_KEY_TIMEOUT_SECONDS;
    use crate::test_support::ScriptedRandom;

    const NOW: i64 = 1_700_000_000;

    #[test]
    fn test_generate_uses_separate_draws() {
        let mut rng = ScriptedRandom::new(vec![
            vec![0x05, 0x00, 0x00, 0x00],
            (1..=24).collect(),
        ]);

        let key = generate_key(&[], NOW, &mut rng).unwrap();
        assert_eq!(key.id, 5);
        assert_eq!(key.creation_time, NOW);
        assert_eq!(key.secret, (1..=24).collect::<Vec<u8>>());
    }

    #[test]
    fn test_negative_draw_is_folded() {
        // -2 little endian
        let mut rng = ScriptedRandom::new(vec![vec![0xfe, 0xff, 0xff, 0xff], vec![0; 24]]);
        let key = generate_key(&[], NOW, &mut rng).unwrap();
        assert_eq!(key.id, 2);
    }

    #[test]
    fn test_collision_redraws() {
        let existing = vec![Key::new(7, NOW, vec![1])];
        let mut rng = ScriptedRandom::new(vec![
            vec![7, 0, 0, 0],
            vec![7, 0, 0, 0],
            vec![8, 0, 0, 0],
            vec![0xaa; 24],
        ]);

        let key = generate_key(&existing, NOW, &mut rng).unwrap();
        assert_eq!(key.id, 8);
        assert_eq!(key.secret, vec![0xaa; 24]);
        assert_eq!(rng.draws(), 4);
    }

    #[test]
    fn test_min_draw_is_redrawn() {
        let mut rng = ScriptedRandom::new(vec![
            vec![0x00, 0x00, 0x00, 0x80],
            vec![1, 0, 0, 0],
            vec![0; 24],
        ]);
        let key = generate_key(&[], NOW, &mut rng).unwrap();
        assert_eq!(key.id, 1);
    }

    #[test]
    fn test_degenerate_source_gives_up() {
        let existing = vec![Key::new(3, NOW, vec![1])];
        let mut rng = ScriptedRandom::repeating(vec![3, 0, 0, 0]);

        let err = generate_key(&existing, NOW, &mut rng).unwrap_err();
        assert!(err.is_failed());
        assert_eq!(rng.draws(), MAX_ID_ATTEMPTS as usize);
    }

    #[test]
    fn test_find_recent_key_first_match_wins() {
        let keys = vec![
            Key::new(1, NOW - NEW_KEY_TIMEOUT_SECONDS - 10, vec![1]),
            Key::new(2, NOW - 100, vec![2]),
            Key::new(3, NOW - 1, vec![3]),
        ];
        assert_eq!(find_recent_key(&keys, NOW).map(|k| k.id), Some(2));
    }

    #[test]
    fn test_find_recent_key_none_when_all_old() {
        let keys = vec![Key::new(1, NOW - NEW_KEY_TIMEOUT_SECONDS, vec![1])];
        assert!(find_recent_key(&keys, NOW).is_none());
        assert!(find_recent_key(&[], NOW).is_none());
    }

    #[test]
    fn test_find_key_by_id() {
        let keys = vec![Key::new(1, NOW, vec![1]), Key::new(0, NOW, vec![2])];
        assert_eq!(find_key_by_id(&keys, 0).map(|k| k.secret.clone()), Some(vec![2]));
        assert!(find_key_by_id(&keys, 5).is_none());
    }
}
