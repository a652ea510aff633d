//! Home directory keyrings for cookie-based authentication
//!
//! Both sides of a connection prove they can read the same home directory
//! by using a shared secret stored there. This crate manages those secrets:
//! rotating them, persisting them to a file shared by every process of the
//! user and handing out the current best key.
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


pub mod codec;
pub mod context;
pub mod error;
pub mod key_types;
pub mod keyring;
pub mod lifecycle;
pub mod lock;
pub mod providers;

#[cfg(test)]
mod test_support;

pub use context::validate_context;
pub use error::{KeyringError, KeyringResult};
pub use key_types::{Key, KeyId};
pub use keyring::{Keyring, KeyringBuilder, KeyringOptions};
pub use lock::LockPolicy;
pub use providers::{Clock, HomeResolver, RandomSource};
