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

use std::io::{self, Write};
use std::process::{Command, Stdio};

use log::debug;

use super::DeliveryAgent;
use crate::queue::message::MessageRecord;
use crate::support::error::Error;

/// Delivers messages by running a sendmail-compatible program such as
/// `msmtp`.
///
/// The program is run with the record's arguments, the body is written to
/// its standard input, and only its exit status is considered. Its standard
/// output and standard error are inherited.
#[derive(Clone, Debug)]
pub struct Sendmail {
    program: String,
}

impl Sendmail {
    pub fn new(program: String) -> Self {
        Sendmail { program }
    }

    fn io_failure(&self, source: io::Error) -> Error {
        Error::DeliveryIo {
            program: self.program.clone(),
            source,
        }
    }
}

impl DeliveryAgent for Sendmail {
    fn deliver(&self, record: &MessageRecord) -> Result<(), Error> {
        debug!("Running {} {:?}", self.program, record.arguments);

        let mut child = Command::new(&self.program)
            .args(&record.arguments)
            .stdin(Stdio::piped())
            .spawn()
            .map_err(|source| Error::DeliveryStart {
                program: self.program.clone(),
                source,
            })?;

        // Taking stdin out of the child means it gets closed once written,
        // so the program sees EOF.
        if let Some(mut stdin) = child.stdin.take() {
            match stdin.write_all(record.body.as_bytes()) {
                Ok(()) => (),
                // The program exited without reading everything; its exit
                // status decides what happened.
                Err(e) if io::ErrorKind::BrokenPipe == e.kind() => {
                    debug!("{} closed its input early", self.program)
                }
                Err(e) => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(self.io_failure(e));
                }
            }
        }

        let status = child.wait().map_err(|e| self.io_failure(e))?;
        if status.success() {
            Ok(())
        } else {
            Err(Error::DeliveryFailed {
                program: self.program.clone(),
                status,
            })
        }
    }
}
