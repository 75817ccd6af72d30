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

use serde::{Deserialize, Serialize};

/// Compute the queue key for a message body.
///
/// This is the lower-case hex SHA-1 of the UTF-8 bytes of `body`. Only the
/// body participates, so two messages with the same body but different
/// arguments share a key, and queueing the second replaces the first.
pub fn key_of(body: &str) -> String {
    hex::encode(openssl::sha::sha1(body.as_bytes()))
}

/// A queued message: the arguments for the delivery program and the raw
/// message it reads on standard input.
///
/// On disk, this is a JSON object with exactly the fields `arguments` and
/// `body`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct MessageRecord {
    pub arguments: Vec<String>,
    pub body: String,
}

impl MessageRecord {
    pub fn new(arguments: Vec<String>, body: String) -> Self {
        MessageRecord { arguments, body }
    }

    pub fn key(&self) -> String {
        key_of(&self.body)
    }

    pub fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn from_json(data: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(data)
    }
}

#[cfg(test)]
mod test {
    use proptest::prelude::*;

    use super::*;

    fn sophie(arguments: &[&str]) -> MessageRecord {
        MessageRecord::new(
            arguments.iter().map(|&s| s.to_owned()).collect(),
            "Sophie is cute".to_owned(),
        )
    }

    #[test]
    fn known_key() {
        assert_eq!(
            "7e63d917011ecb90b52e02ff5ea0b9da9daeb7c4",
            key_of("Sophie is cute")
        );
        assert_eq!(
            "7e63d917011ecb90b52e02ff5ea0b9da9daeb7c4",
            sophie(&["foo", "bar"]).key()
        );
        // SHA-1 of the empty string
        assert_eq!("da39a3ee5e6b4b0d3255bfef95601890afd80709", key_of(""));
    }

    #[test]
    fn key_ignores_arguments() {
        assert_eq!(sophie(&["foo"]).key(), sophie(&["foo", "bar"]).key());
        assert_eq!(sophie(&[]).key(), sophie(&["-t"]).key());
    }

    #[test]
    fn equality() {
        assert_eq!(sophie(&["foo", "bar"]), sophie(&["foo", "bar"]));
        assert_ne!(sophie(&["foo"]), sophie(&["foo", "bar"]));
        assert_ne!(sophie(&["bar", "foo"]), sophie(&["foo", "bar"]));
        assert_ne!(
            MessageRecord::new(
                vec!["foo".to_owned(), "bar".to_owned()],
                "Sophie is a dork".to_owned()
            ),
            sophie(&["foo", "bar"])
        );
    }

    #[test]
    fn json_format() {
        let json: serde_json::Value =
            serde_json::from_slice(&sophie(&["foo", "bar"]).to_json().unwrap())
                .unwrap();
        assert_eq!(
            serde_json::json!({
                "arguments": ["foo", "bar"],
                "body": "Sophie is cute",
            }),
            json
        );

        assert_eq!(
            sophie(&["foo", "bar"]),
            MessageRecord::from_json(
                br#"{"arguments": ["foo", "bar"], "body": "Sophie is cute"}"#
            )
            .unwrap()
        );

        assert!(MessageRecord::from_json(b"").is_err());
        assert!(MessageRecord::from_json(br#"{"arguments": []}"#).is_err());
        assert!(MessageRecord::from_json(
            br#"{"args": ["foo"], "message": "Sophie is cute"}"#
        )
        .is_err());
    }

    proptest! {
        #[test]
        fn json_round_trip(
            arguments in prop::collection::vec(".*", 0..5),
            body in ".*",
        ) {
            let record = MessageRecord::new(arguments, body);
            prop_assert_eq!(
                &record,
                &MessageRecord::from_json(&record.to_json().unwrap()).unwrap()
            );
        }

        #[test]
        fn key_is_deterministic(
            arguments in prop::collection::vec("[a-z-]{0,8}", 0..5),
            body in ".*",
        ) {
            let key = key_of(&body);
            prop_assert_eq!(40, key.len());
            prop_assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
            prop_assert_eq!(&key, &key_of(&body));
            prop_assert_eq!(
                &key,
                &MessageRecord::new(arguments, body.clone()).key()
            );
        }
    }
}
