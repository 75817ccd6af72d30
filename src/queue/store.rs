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

//! The on-disk message queue.
//!
//! The queue is a flat directory. Each queued message is a single file whose
//! name is the message key and whose content is the JSON form of the
//! `MessageRecord`. There is no index; the directory listing is the queue.
//!
//! Writes are staged as hidden temporary files within the same directory and
//! then renamed into place, so readers never see a partially written record.
//! Hidden files are never considered part of the queue.
//!
//! There is no locking. Only one process is expected to mutate a given queue
//! at a time.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use super::message::MessageRecord;
use crate::support::{
    error::Error,
    file_ops::{self, ErrorTransforms},
    log_prefix::LogPrefix,
    safe_name::is_safe_name,
};

const RECORD_MODE: u32 = 0o600;

/// Maps keys to `MessageRecord`s, backed by a directory.
///
/// Every operation goes straight to the file system; nothing is cached.
#[derive(Clone, Debug)]
pub struct MessageStore {
    log_prefix: LogPrefix,
    root: PathBuf,
}

impl MessageStore {
    /// Open the queue in `root`, which must already exist.
    pub fn new(log_prefix: LogPrefix, root: PathBuf) -> Self {
        MessageStore { log_prefix, root }
    }

    /// The prefix put on every log line concerning this queue.
    pub fn log_prefix(&self) -> &LogPrefix {
        &self.log_prefix
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Load the record stored under `key`.
    ///
    /// Any failure to read the file, including permission problems, is
    /// reported as `Error::NotFound`. A file that can be read but does not
    /// contain a valid record is reported as `Error::CorruptRecord`.
    pub fn get(&self, key: &str) -> Result<MessageRecord, Error> {
        if !is_safe_name(key) {
            return Err(Error::NotFound(key.to_owned()));
        }

        let data = match fs::read(self.root.join(key)) {
            Ok(data) => data,
            Err(e) => {
                debug!("{} Can't read {}: {}", self.log_prefix, key, e);
                return Err(Error::NotFound(key.to_owned()));
            }
        };

        MessageRecord::from_json(&data).map_err(|source| Error::CorruptRecord {
            key: key.to_owned(),
            source,
        })
    }

    /// Store `record` under `key`, replacing whatever was there.
    ///
    /// `key` is not checked against the content of `record`; use `add()` to
    /// store a record under its own key.
    pub fn set(&self, key: &str, record: &MessageRecord) -> Result<(), Error> {
        if !is_safe_name(key) {
            return Err(Error::UnsafeKey);
        }

        let data = record.to_json()?;
        file_ops::spit(
            &self.root,
            self.root.join(key),
            RECORD_MODE,
            &data,
        )?;
        Ok(())
    }

    /// Remove the record stored under `key`.
    pub fn delete(&self, key: &str) -> Result<(), Error> {
        if !is_safe_name(key) {
            return Err(Error::NotFound(key.to_owned()));
        }

        fs::remove_file(self.root.join(key))
            .on_not_found(Error::NotFound(key.to_owned()))
    }

    /// List the keys currently in the queue.
    ///
    /// The directory is read afresh on every call, and lazily as the returned
    /// iterator is consumed. The order is whatever the file system yields.
    pub fn keys(&self) -> Result<Keys, Error> {
        Ok(Keys {
            log_prefix: self.log_prefix.clone(),
            inner: fs::read_dir(&self.root)?,
        })
    }

    /// Count the messages currently in the queue.
    pub fn size(&self) -> Result<usize, Error> {
        Ok(self.keys()?.count())
    }

    /// Queue `record` under the key derived from its body and return that key.
    ///
    /// A record already queued with the same body is replaced, even if its
    /// arguments differ.
    pub fn add(&self, record: &MessageRecord) -> Result<String, Error> {
        let key = record.key();
        self.set(&key, record)?;
        info!("{} Queued {}", self.log_prefix, key);
        Ok(key)
    }
}

/// Iterator over the keys in a `MessageStore`.
///
/// Directory entries which cannot be queue keys (hidden files, non-UTF-8
/// names) are skipped.
#[derive(Debug)]
pub struct Keys {
    log_prefix: LogPrefix,
    inner: fs::ReadDir,
}

impl Iterator for Keys {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        loop {
            let entry = match self.inner.next()? {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("{} Error listing queue: {}", self.log_prefix, e);
                    continue;
                }
            };

            match entry.file_name().into_string() {
                Ok(name) if is_safe_name(&name) => return Some(name),
                Ok(_) => continue,
                Err(name) => warn!(
                    "{} Ignoring non-UTF-8 file in queue: {:?}",
                    self.log_prefix, name
                ),
            }
        }
    }
}
