//-
// Copyright (c) 2020, 2024, Jason Lingle
//
// This file is part of msmtpq.
//
// msmtpq is free software: you can  redistribute it and/or modify it under the
// terms of  the GNU General Public  License as published by  the Free Software
// Foundation, either version  3 of the License, or (at  your option) any later
// version.
//
// msmtpq is distributed  in the hope that  it will be useful,  but WITHOUT ANY
// WARRANTY; without  even the implied  warranty of MERCHANTABILITY  or FITNESS
// FOR  A PARTICULAR  PURPOSE.  See the  GNU General  Public  License for  more
// details.
//
// You should have received a copy of the GNU General Public License along with
// msmtpq. If not, see <http://www.gnu.org/licenses/>.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::support::error::Error;

/// Directory under `$HOME` holding the configuration and the default queue.
pub const APP_DIR: &str = ".config/msmtpq";
/// Name of the configuration file within `APP_DIR`.
pub const CONFIG_FILE_NAME: &str = "msmtpq.toml";
/// Name of the optional log4rs configuration within `APP_DIR`.
pub const LOGGING_CONFIG_FILE_NAME: &str = "logging.toml";

const DEFAULT_QUEUE_DIR: &str = "queue";
const DEFAULT_LOG_FILE: &str = ".log/msmtpq.log";

/// The configuration for msmtpq.
///
/// This is stored in `~/.config/msmtpq/msmtpq.toml`. The file is optional;
/// every setting has a default.
#[derive(Clone, Debug, Deserialize, Serialize, Default, PartialEq)]
pub struct SystemConfig {
    #[serde(default)]
    pub queue: QueueConfig,

    #[serde(default)]
    pub delivery: DeliveryConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct QueueConfig {
    /// The directory holding queued messages.
    ///
    /// If unset, `~/.config/msmtpq/queue` is used.
    pub dir: Option<PathBuf>,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct DeliveryConfig {
    /// The sendmail-compatible program used to deliver messages.
    ///
    /// Queued arguments are appended to this, and the message is written to
    /// its standard input.
    pub program: String,

    /// The number of messages delivered concurrently by `send`.
    ///
    /// 1 (the default) delivers one message at a time in queue order.
    pub parallelism: usize,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        DeliveryConfig {
            program: "msmtp".to_owned(),
            parallelism: 1,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// The file to append log entries to.
    ///
    /// If unset, `~/.log/msmtpq.log` is used. Ignored if
    /// `~/.config/msmtpq/logging.toml` exists.
    pub file: Option<PathBuf>,

    /// The minimum level to log, e.g. "info" or "debug".
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            file: None,
            level: "info".to_owned(),
        }
    }
}

impl SystemConfig {
    /// Load the configuration at `path`.
    ///
    /// A missing file yields the default configuration.
    pub fn load(path: &Path) -> Result<Self, Error> {
        match std::fs::read_to_string(path) {
            Ok(text) => Ok(toml::from_str(&text)?),
            Err(e) if std::io::ErrorKind::NotFound == e.kind() => {
                Ok(SystemConfig::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn queue_dir(&self, home: &Path) -> PathBuf {
        self.queue
            .dir
            .clone()
            .unwrap_or_else(|| home.join(APP_DIR).join(DEFAULT_QUEUE_DIR))
    }

    pub fn log_file(&self, home: &Path) -> PathBuf {
        self.logging
            .file
            .clone()
            .unwrap_or_else(|| home.join(DEFAULT_LOG_FILE))
    }

    pub fn log_level(&self) -> log::LevelFilter {
        self.logging.level.parse().unwrap_or(log::LevelFilter::Info)
    }
}

/// Determine the home directory of the current user.
///
/// `$HOME` takes precedence; otherwise the passwd entry is consulted.
pub fn home_dir() -> Result<PathBuf, Error> {
    if let Some(home) = std::env::var_os("HOME").filter(|h| !h.is_empty()) {
        return Ok(home.into());
    }

    nix::unistd::User::from_uid(nix::unistd::getuid())?
        .map(|user| user.dir)
        .ok_or(Error::NoHome)
}
