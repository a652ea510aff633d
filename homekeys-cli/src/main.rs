//! homekeys
//!
//! Inspects and maintains the cookie keyrings in a home directory:
//! - `best <context> [username]` prints the id of the current key, creating one if needed
//! - `list <context> [username]` prints the loaded keys without their secrets
//! - `check <context>` reports whether a context name is acceptable
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


use homekeys_config::KeyringSettings;
use homekeys_keyring::context::checked_context;
use homekeys_keyring::{Key, Keyring, KeyringBuilder};
use homekeys_logging::{init_console_logging, init_logging};
use tracing::{debug, error};

const USAGE: &str = "usage: homekeys <best|list|check> <context> [username]";

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Best { context: String, username: Option<String> },
    List { context: String, username: Option<String> },
    Check { context: String },
}

fn parse_args(args: &[String]) -> anyhow::Result<Command> {
    let (name, rest) = args
        .split_first()
        .ok_or_else(|| anyhow::anyhow!(USAGE))?;

    let context = rest
        .first()
        .cloned()
        .ok_or_else(|| anyhow::anyhow!(USAGE))?;
    let username = rest.get(1).cloned();
    if rest.len() > 2 {
        anyhow::bail!(USAGE);
    }

    match name.as_str() {
        "best" => Ok(Command::Best { context, username }),
        "list" => Ok(Command::List { context, username }),
        "check" if username.is_none() => Ok(Command::Check { context }),
        _ => anyhow::bail!(USAGE),
    }
}

fn builder(settings: &KeyringSettings) -> KeyringBuilder {
    let builder = Keyring::builder().options(settings.keyring_options());
    match &settings.home_dir {
        Some(home) => builder.home_dir(home.clone()),
        None => builder,
    }
}

fn format_key(key: &Key, now: i64) -> String {
    let created = chrono::DateTime::from_timestamp(key.creation_time, 0)
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| key.creation_time.to_string());
    format!(
        "{:>10}  age {:>4}s  {}{}",
        key.id,
        key.age(now),
        created,
        if key.is_recent(now) { "  (recent)" } else { "" }
    )
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = KeyringSettings::from_env()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;

    if settings.json_logs() {
        init_logging("homekeys", settings.log_level());
    } else {
        init_console_logging("homekeys", settings.log_level());
    }

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = parse_args(&args)?;
    debug!(command = ?command, "Running command");

    // Keyring handles are single-threaded and may block on the lock file
    let output = tokio::task::spawn_blocking(move || run(&settings, command)).await??;
    for line in output {
        println!("{}", line);
    }

    Ok(())
}

fn run(settings: &KeyringSettings, command: Command) -> anyhow::Result<Vec<String>> {
    match command {
        Command::Check { context } => {
            checked_context(&context)?;
            Ok(vec![format!("{}: valid", context)])
        }
        Command::Best { context, username } => {
            let keyring = builder(settings).create(username.as_deref(), &context)?;
            let id = keyring.get_best_key().map_err(|e| {
                error!(context = %context, error = %e, "Could not get a key");
                e
            })?;
            Ok(vec![id.to_string()])
        }
        Command::List { context, username } => {
            let keyring = builder(settings).create(username.as_deref(), &context)?;
            let now = chrono::Utc::now().timestamp();
            let mut lines = vec![format!("# {}", keyring.file_path().display())];
            lines.extend(keyring.keys().iter().map(|key| format_key(key, now)));
            Ok(lines)
        }
    }
}
