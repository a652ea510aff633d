//! Keyring context validation
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
use tracing::debug;

/// Check whether `context` can safely name a keyring file.
///
/// Contexts must be non-empty printable ASCII (0x7F is tolerated) and may
/// not contain directory separators of any platform or a dot, which rules
/// out dotfiles, `..` and clashes with the `.lock` suffix.
pub fn validate_context(context: &[u8]) -> bool {
    if context.is_empty() {
        debug!("Context is zero-length");
        return false;
    }

    if !context.iter().all(|b| (0x20..=0x7f).contains(b)) {
        debug!("Context is not printable ASCII");
        return false;
    }

    if context.contains(&b'/') {
        debug!("Context contains a slash");
        return false;
    }

    if context.contains(&b'\\') {
        debug!("Context contains a backslash");
        return false;
    }

    if context.contains(&b'.') {
        debug!("Context contains a dot");
        return false;
    }

    true
}

/// Validate a context string, returning it on success
pub fn checked_context(context: &str) -> KeyringResult<&str> {
    if validate_context(context.as_bytes()) {
        Ok(context)
    } else {
        Err(KeyringError::InvalidInput(format!(
            "Invalid keyring context: {:?}",
            context
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_contexts() {
        assert!(validate_context(b"foo"));
        assert!(validate_context(b"org_freedesktop_general"));
        assert!(validate_context(b"foo\x7f"));
    }

    #[test]
    fn test_invalid_contexts() {
        assert!(!validate_context(b""));
        assert!(!validate_context(b".foo"));
        assert!(!validate_context(b"bar.foo"));
        assert!(!validate_context(b"bar/foo"));
        assert!(!validate_context(b"bar\\foo"));
        assert!(!validate_context(b"foo\xfa\xf0"));
        assert!(!validate_context(b"foo\x80"));
        assert!(!validate_context(b"\0"));
        assert!(!validate_context(b"foo\nbar"));
    }

    #[test]
    fn test_checked_context() {
        assert_eq!(checked_context("cookie").unwrap(), "cookie");

        let err = checked_context("..").unwrap_err();
        assert!(matches!(err, KeyringError::InvalidInput(_)));
    }
}
