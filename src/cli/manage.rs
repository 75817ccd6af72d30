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

//! The `--manage` subcommands.
//!
//! Each returns the exit code to use on failure, having already explained the
//! problem on `err`.

use std::fmt;
use std::io::Write;
use std::mem;

use log::info;

use super::main::sysexit_for;
use crate::delivery::DeliveryAgent;
use crate::queue::{
    message::MessageRecord,
    sender::{QueueSender, SendOutcome},
    store::MessageStore,
};
use crate::support::{error::Error, sysexits::*};

struct Listing<'a> {
    key: &'a str,
    record: &'a MessageRecord,
}

impl fmt::Display for Listing<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Key: {}\nArgs: {:?}\n{}",
            self.key, self.record.arguments, self.record.body
        )
    }
}

fn report(err: &mut impl Write, e: &Error) -> Sysexit {
    let _ = writeln!(err, "{}", e);
    sysexit_for(e)
}

pub(super) fn send_all<A: DeliveryAgent + Sync>(
    sender: &QueueSender<'_, A>,
    err: &mut impl Write,
) -> Result<(), Sysexit> {
    sender.send_all().map_err(|e| report(err, &e))?;
    Ok(())
}

pub(super) fn send_one<A: DeliveryAgent>(
    sender: &QueueSender<'_, A>,
    key: &str,
    err: &mut impl Write,
) -> Result<(), Sysexit> {
    match sender.send(key) {
        Ok(SendOutcome::Sent) => Ok(()),
        Ok(SendOutcome::Failed) => {
            let _ = writeln!(
                err,
                "Failed to send {}; it is still queued. See the log.",
                key
            );
            Err(EX_UNAVAILABLE)
        }
        Err(e) => Err(report(err, &e)),
    }
}

pub(super) fn list(
    store: &MessageStore,
    out: &mut impl Write,
    err: &mut impl Write,
) -> Result<(), Sysexit> {
    let keys = store.keys().map_err(|e| report(err, &e))?;

    let mut first = true;
    for key in keys {
        let record = match store.get(&key) {
            Ok(record) => record,
            // Corrupt or concurrently removed; carry on with the rest
            Err(e) => {
                report(err, &e);
                continue;
            }
        };

        if !mem::take(&mut first) {
            writeln!(out).map_err(|_| EX_IOERR)?;
        }
        writeln!(
            out,
            "{}",
            Listing {
                key: &key,
                record: &record,
            }
        )
        .map_err(|_| EX_IOERR)?;
    }

    Ok(())
}

pub(super) fn count(
    store: &MessageStore,
    out: &mut impl Write,
    err: &mut impl Write,
) -> Result<(), Sysexit> {
    let size = store.size().map_err(|e| report(err, &e))?;
    writeln!(out, "{}", size).map_err(|_| EX_IOERR)
}

pub(super) fn delete(
    store: &MessageStore,
    key: &str,
    err: &mut impl Write,
) -> Result<(), Sysexit> {
    store.delete(key).map_err(|e| report(err, &e))?;
    info!("{} Deleted {}", store.log_prefix(), key);
    Ok(())
}
