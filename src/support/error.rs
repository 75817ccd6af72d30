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

use std::io;
use std::process::ExitStatus;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("No queued message with key {0}")]
    NotFound(String),
    #[error("Unsafe queue key")]
    UnsafeKey,
    #[error("Queued message {key} is corrupt: {source}")]
    CorruptRecord {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("Failed to start {program}: {source}")]
    DeliveryStart {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("Failed to feed message to {program}: {source}")]
    DeliveryIo {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("{program} failed: {status}")]
    DeliveryFailed { program: String, status: ExitStatus },
    #[error("Unable to determine the home directory")]
    NoHome,
    #[error("Invalid configuration: {0}")]
    Config(#[from] toml::de::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Nix(#[from] nix::Error),
}
