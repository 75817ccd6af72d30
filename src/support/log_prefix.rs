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

use std::fmt;
use std::sync::{Arc, Mutex};

/// Tracks text that should be included in at the start of every log statement.
///
/// This is the logging collaborator handed to the queue and the sender; they
/// never consult any other context when writing log lines.
///
/// Clones of a `LogPrefix` share the same underlying data.
#[derive(Clone)]
pub struct LogPrefix {
    inner: Arc<Mutex<Inner>>,
}

struct Inner {
    operation: String,
    queue: Option<String>,
}

impl LogPrefix {
    pub fn new(operation: String) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                operation,
                queue: None,
            })),
        }
    }

    pub fn set_queue(&self, queue: String) {
        self.inner.lock().unwrap().queue = Some(sanitise(queue));
    }
}

impl fmt::Display for LogPrefix {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let inner = self.inner.lock().unwrap();
        write!(f, "{}", inner.operation)?;
        if let Some(ref queue) = inner.queue {
            write!(f, "[{}]", queue)?;
        }

        Ok(())
    }
}

impl fmt::Debug for LogPrefix {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "LogPrefix({})", self)
    }
}

fn sanitise(mut s: String) -> String {
    s.retain(|c| !c.is_control());
    if let Some((truncate_len, _)) = s.char_indices().nth(64) {
        s.truncate(truncate_len);
    }

    s
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn formatting() {
        let prefix = LogPrefix::new("send".to_owned());
        assert_eq!("send", prefix.to_string());

        let shared = prefix.clone();
        shared.set_queue("/home/sophie/\nqueue".to_owned());
        assert_eq!("send[/home/sophie/queue]", prefix.to_string());

        shared.set_queue("q".repeat(100));
        assert_eq!(format!("send[{}]", "q".repeat(64)), prefix.to_string());
    }
}
