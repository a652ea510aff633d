//! Keyring file format
//!
//! One key per line: `<id> <creation_time> <hex secret>`. The file is shared
//! by every process of the user and may be truncated, concurrently rewritten
//! or scribbled on, so the parser drops anything it does not like instead of
//! failing.
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


use crate::key_types::{is_acceptable_timestamp, Key, KeyId};
use std::fmt::Write;
use tracing::{debug, warn};

/// Why a line was dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineRejection {
    MalformedId,
    IdOutOfRange,
    MalformedTimestamp,
    TimestampOutOfRange,
    MissingSecret,
    InvalidHex,
}

/// True when every byte is 7-bit ASCII other than NUL
pub fn is_ascii_text(content: &[u8]) -> bool {
    content.iter().all(|&b| b != 0 && b.is_ascii())
}

/// Parse keyring file contents, keeping keys acceptable at time `now`.
///
/// Non-ASCII content is discarded as a whole. Individual bad lines, expired
/// or future keys and repeated ids are skipped. Keys are returned in file
/// order.
pub fn parse_keyring(content: &[u8], now: i64) -> Vec<Key> {
    if !is_ascii_text(content) {
        warn!("Secret keyring file contains non-ASCII! Ignoring existing contents");
        return Vec::new();
    }

    // ASCII is valid UTF-8
    let text = String::from_utf8_lossy(content);

    let mut keys: Vec<Key> = Vec::new();
    for line in text.lines() {
        match parse_line(line, now) {
            Ok(key) => {
                if keys.iter().any(|k| k.id == key.id) {
                    debug!(key_id = key.id, "Ignoring repeated secret key ID");
                    continue;
                }
                keys.push(key);
            }
            Err(reason) => {
                debug!(reason = ?reason, "Ignoring keyring line");
            }
        }
    }

    debug!(count = keys.len(), "Loaded existing keys");
    keys
}

/// Parse a single line of the keyring file
pub fn parse_line(line: &str, now: i64) -> Result<Key, LineRejection> {
    let (id, rest) = parse_decimal(line).ok_or(LineRejection::MalformedId)?;
    if id < 0 || id > i64::from(KeyId::MAX) {
        return Err(LineRejection::IdOutOfRange);
    }

    let rest = skip_blank(rest);
    let (timestamp, rest) = parse_decimal(rest).ok_or(LineRejection::MalformedTimestamp)?;
    if !is_acceptable_timestamp(timestamp, now) {
        debug!(
            age = now.saturating_sub(timestamp),
            timestamp = timestamp,
            now = now,
            "Dropping key with out-of-range timestamp"
        );
        return Err(LineRejection::TimestampOutOfRange);
    }

    let rest = skip_blank(rest).trim_end_matches([' ', '\t']);
    if rest.is_empty() {
        return Err(LineRejection::MissingSecret);
    }

    let secret = hex::decode(rest).map_err(|_| LineRejection::InvalidHex)?;
    if secret.is_empty() {
        return Err(LineRejection::MissingSecret);
    }

    Ok(Key::new(id as KeyId, timestamp, secret))
}

/// Serialize keys in order, one `\n`-terminated line each
pub fn serialize_keyring(keys: &[Key]) -> String {
    let mut out = String::with_capacity(keys.len() * 80);
    for key in keys {
        // Writing to a String cannot fail
        let _ = writeln!(out, "{} {} {}", key.id, key.creation_time, key.hex_secret());
    }
    out
}

/// Parse a signed decimal integer prefix the way `strtol` does: optional
/// leading whitespace, optional sign, at least one digit. Returns the value
/// and the unparsed remainder, or `None` on no digits or overflow.
fn parse_decimal(s: &str) -> Option<(i64, &str)> {
    let s = s.trim_start_matches(|c: char| c.is_ascii_whitespace() || c == '\x0b');
    let (negative, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };

    let len = digits.bytes().take_while(u8::is_ascii_digit).count();
    if len == 0 {
        return None;
    }

    let mut value: i64 = 0;
    for b in digits[..len].bytes() {
        let digit = i64::from(b - b'0');
        value = value.checked_mul(10)?;
        value = if negative {
            value.checked_sub(digit)?
        } else {
            value.checked_add(digit)?
        };
    }

    Some((value, &digits[len..]))
}

fn skip_blank(s: &str) -> &str {
    s.trim_start_matches([' ', '\t'])
}
