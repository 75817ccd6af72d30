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

use std::io::Read;

use crate::queue::{message::MessageRecord, store::MessageStore};
use crate::support::error::Error;

/// Read a message from `input` and queue it with `arguments`.
///
/// The whole input is the message; it must be valid UTF-8.
pub(super) fn enqueue(
    store: &MessageStore,
    arguments: Vec<String>,
    mut input: impl Read,
) -> Result<String, Error> {
    let mut body = String::new();
    input.read_to_string(&mut body)?;
    store.add(&MessageRecord::new(arguments, body))
}

#[cfg(test)]
mod test {
    use std::io;

    use super::*;
    use crate::support::log_prefix::LogPrefix;

    fn store(root: &tempfile::TempDir) -> MessageStore {
        MessageStore::new(
            LogPrefix::new("enqueue".to_owned()),
            root.path().to_owned(),
        )
    }

    #[test]
    fn queues_stdin_with_arguments() {
        crate::init_test_log();
        let root = tempfile::tempdir().unwrap();
        let store = store(&root);

        let key = enqueue(
            &store,
            vec![
                "-oi".to_owned(),
                "-f".to_owned(),
                "me@example.com".to_owned(),
            ],
            b"Sophie is cute" as &[u8],
        )
        .unwrap();

        assert_eq!("7e63d917011ecb90b52e02ff5ea0b9da9daeb7c4", key);
        assert_eq!(
            MessageRecord::new(
                vec![
                    "-oi".to_owned(),
                    "-f".to_owned(),
                    "me@example.com".to_owned()
                ],
                "Sophie is cute".to_owned()
            ),
            store.get(&key).unwrap()
        );
    }

    #[test]
    fn empty_input() {
        crate::init_test_log();
        let root = tempfile::tempdir().unwrap();
        let store = store(&root);

        let key = enqueue(&store, vec![], b"" as &[u8]).unwrap();
        assert_eq!(
            MessageRecord::new(vec![], String::new()),
            store.get(&key).unwrap()
        );
    }

    #[test]
    fn rejects_invalid_utf8() {
        crate::init_test_log();
        let root = tempfile::tempdir().unwrap();
        let store = store(&root);

        let result = enqueue(&store, vec![], b"Sophie \xFF cute" as &[u8]);
        match result {
            Err(Error::Io(ref e)) => {
                assert_eq!(io::ErrorKind::InvalidData, e.kind())
            }
            r => panic!("Unexpected result: {:?}", r),
        }
        assert_eq!(0, store.size().unwrap());
    }
}
