//! Error types for keyring operations
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


use thiserror::Error;

/// Keyring errors
///
/// Only resource-level failures end up here. Malformed content in the
/// shared keyring file is dropped while parsing and never reported.
#[derive(Error, Debug)]
pub enum KeyringError {
    #[error("Out of memory: {0}")]
    OutOfMemory(String),

    #[error("Keyring operation failed: {0}")]
    Failed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type for keyring operations
pub type KeyringResult<T> = Result<T, KeyringError>;

impl KeyringError {
    /// True for errors raised because the keyring could not be locked or
    /// a usable key could not be produced
    pub fn is_failed(&self) -> bool {
        matches!(self, KeyringError::Failed(_))
    }
}
