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

//! Delivery of queued messages.
//!
//! A message leaves the queue only once the delivery agent has accepted it.
//! If delivery fails, the message stays queued as it was and is retried by
//! the next pass; nothing else about it changes. This gives at-least-once
//! delivery: if the process dies between delivery and removal, the message
//! will be delivered again.

use log::{error, info, warn};

use super::store::MessageStore;
use crate::delivery::DeliveryAgent;
use crate::support::{
    error::Error, log_prefix::LogPrefix, threading::WorkerPool,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SendOutcome {
    /// The message was delivered and removed from the queue.
    Sent,
    /// Delivery failed; the message is still queued.
    Failed,
}

/// Tallies of one `send_all()` pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SendSummary {
    pub sent: usize,
    pub failed: usize,
    /// Messages which could not be attempted at all, e.g. because they were
    /// corrupt or vanished during the pass.
    pub skipped: usize,
}

/// Sends messages in a `MessageStore` through a `DeliveryAgent`.
pub struct QueueSender<'a, A> {
    log_prefix: LogPrefix,
    store: &'a MessageStore,
    agent: A,
    parallelism: usize,
}

impl<'a, A: DeliveryAgent> QueueSender<'a, A> {
    pub fn new(
        log_prefix: LogPrefix,
        store: &'a MessageStore,
        agent: A,
    ) -> Self {
        QueueSender {
            log_prefix,
            store,
            agent,
            parallelism: 1,
        }
    }

    /// Set how many messages `send_all()` may deliver at once.
    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism.max(1);
        self
    }

    /// Send the message with `key`.
    ///
    /// Failure to deliver is not an error: it is logged, the message is left
    /// in the queue, and `SendOutcome::Failed` is returned. Errors are only
    /// returned if the message could not be loaded, or if it was delivered
    /// but could not be removed from the queue.
    pub fn send(&self, key: &str) -> Result<SendOutcome, Error> {
        let record = self.store.get(key)?;

        if let Err(e) = self.agent.deliver(&record) {
            error!("{} Failed to send {}: {}", self.log_prefix, key, e);
            return Ok(SendOutcome::Failed);
        }

        if let Err(e) = self.store.delete(key) {
            error!(
                "{} Sent {} but could not remove it from the queue: {}",
                self.log_prefix, key, e
            );
            return Err(e);
        }

        info!("{} Sent {}", self.log_prefix, key);
        Ok(SendOutcome::Sent)
    }

    /// Attempt to send every message in the queue.
    ///
    /// The set of keys is taken when the pass starts. Every message in it is
    /// attempted regardless of what happens to the others; problems with
    /// individual messages are logged and counted, never returned. The only
    /// error is failing to list the queue in the first place.
    pub fn send_all(&self) -> Result<SendSummary, Error>
    where
        A: Sync,
    {
        info!("{} Sending all messages", self.log_prefix);

        let keys = self.store.keys()?.collect::<Vec<_>>();
        let mut summary = SendSummary::default();

        WorkerPool::new(self.parallelism).run(
            keys,
            |key| match self.send(&key) {
                Ok(outcome) => Some(outcome),
                Err(e @ Error::NotFound(_)) => {
                    warn!("{} Skipping {}: {}", self.log_prefix, key, e);
                    None
                }
                Err(e) => {
                    error!("{} Skipping {}: {}", self.log_prefix, key, e);
                    None
                }
            },
            |outcome| match outcome {
                Some(SendOutcome::Sent) => summary.sent += 1,
                Some(SendOutcome::Failed) => summary.failed += 1,
                None => summary.skipped += 1,
            },
        );

        info!(
            "{} Sending finished: {} sent, {} failed, {} skipped",
            self.log_prefix, summary.sent, summary.failed, summary.skipped
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod test {
    use std::collections::BTreeSet;
    use std::fs;
    use std::os::unix::process::ExitStatusExt;
    use std::process::ExitStatus;
    use std::sync::Mutex;

    use tempfile::TempDir;

    use super::*;
    use crate::queue::message::MessageRecord;

    /// Records every delivery attempt, failing those whose body is in `fail`.
    #[derive(Default)]
    struct StubAgent {
        fail: BTreeSet<String>,
        calls: Mutex<Vec<MessageRecord>>,
    }

    impl StubAgent {
        fn failing(bodies: &[&str]) -> Self {
            StubAgent {
                fail: bodies.iter().map(|&s| s.to_owned()).collect(),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<MessageRecord> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl DeliveryAgent for StubAgent {
        fn deliver(&self, record: &MessageRecord) -> Result<(), Error> {
            self.calls.lock().unwrap().push(record.clone());
            if self.fail.contains(&record.body) {
                Err(Error::DeliveryFailed {
                    program: "stub".to_owned(),
                    status: ExitStatus::from_raw(1 << 8),
                })
            } else {
                Ok(())
            }
        }
    }

    struct Setup {
        _root: TempDir,
        store: MessageStore,
    }

    fn set_up() -> Setup {
        crate::init_test_log();

        let root = TempDir::new().unwrap();
        let store = MessageStore::new(
            LogPrefix::new("store".to_owned()),
            root.path().to_owned(),
        );
        Setup { _root: root, store }
    }

    fn sender<'a>(
        store: &'a MessageStore,
        agent: &'a StubAgent,
    ) -> QueueSender<'a, &'a StubAgent> {
        QueueSender::new(LogPrefix::new("send".to_owned()), store, agent)
    }

    fn record(body: &str) -> MessageRecord {
        MessageRecord::new(vec!["foo".to_owned()], body.to_owned())
    }

    fn keys(store: &MessageStore) -> BTreeSet<String> {
        store.keys().unwrap().collect()
    }

    #[test]
    fn send_success_removes() {
        let setup = set_up();
        let agent = StubAgent::default();
        let message = record("Sophie is cute.");
        setup.store.set("sophie", &message).unwrap();

        assert_eq!(
            SendOutcome::Sent,
            sender(&setup.store, &agent).send("sophie").unwrap()
        );
        assert_eq!(vec![message], agent.calls());
        assert!(keys(&setup.store).is_empty());
    }

    #[test]
    fn send_failure_keeps_message() {
        let setup = set_up();
        let agent = StubAgent::failing(&["Sophie is cute."]);
        let message = record("Sophie is cute.");
        setup.store.set("sophie", &message).unwrap();

        assert_eq!(
            SendOutcome::Failed,
            sender(&setup.store, &agent).send("sophie").unwrap()
        );
        assert_eq!(vec![message.clone()], agent.calls());
        assert_eq!(message, setup.store.get("sophie").unwrap());
    }

    #[test]
    fn send_missing() {
        let setup = set_up();
        let agent = StubAgent::default();

        assert_matches!(
            Err(Error::NotFound(_)),
            sender(&setup.store, &agent).send("sophie")
        );
        assert!(agent.calls().is_empty());
    }

    #[test]
    fn send_corrupt() {
        let setup = set_up();
        let agent = StubAgent::default();
        fs::write(setup.store.root().join("sophie"), "garbage").unwrap();

        assert_matches!(
            Err(Error::CorruptRecord { .. }),
            sender(&setup.store, &agent).send("sophie")
        );
        assert!(agent.calls().is_empty());
        assert!(setup.store.root().join("sophie").is_file());
    }

    #[test]
    fn send_all_isolates_failures() {
        let setup = set_up();
        let agent = StubAgent::failing(&["Prachta is cute."]);
        setup.store.set("sophie", &record("Sophie is cute.")).unwrap();
        setup
            .store
            .set("prachta", &record("Prachta is cute."))
            .unwrap();

        let summary = sender(&setup.store, &agent).send_all().unwrap();

        assert_eq!(
            SendSummary {
                sent: 1,
                failed: 1,
                skipped: 0,
            },
            summary
        );
        assert_eq!(2, agent.calls().len());
        assert_eq!(
            std::iter::once("prachta".to_owned()).collect::<BTreeSet<_>>(),
            keys(&setup.store)
        );
    }

    #[test]
    fn send_all_empty() {
        let setup = set_up();
        let agent = StubAgent::default();

        assert_eq!(
            SendSummary::default(),
            sender(&setup.store, &agent).send_all().unwrap()
        );
        assert!(agent.calls().is_empty());
    }

    #[test]
    fn send_all_skips_corrupt() {
        let setup = set_up();
        let agent = StubAgent::default();
        fs::write(setup.store.root().join("broken"), "{").unwrap();
        let key = setup.store.add(&record("Sophie is cute.")).unwrap();

        let summary = sender(&setup.store, &agent).send_all().unwrap();

        assert_eq!(
            SendSummary {
                sent: 1,
                failed: 0,
                skipped: 1,
            },
            summary
        );
        assert_eq!(1, agent.calls().len());
        assert!(!setup.store.root().join(&key).exists());
        assert!(setup.store.root().join("broken").is_file());
    }

    #[test]
    fn failed_message_is_retried() {
        let setup = set_up();
        let key = setup.store.add(&record("Sophie is cute.")).unwrap();

        let failing = StubAgent::failing(&["Sophie is cute."]);
        sender(&setup.store, &failing).send_all().unwrap();
        assert!(keys(&setup.store).contains(&key));

        let working = StubAgent::default();
        let summary = sender(&setup.store, &working).send_all().unwrap();
        assert_eq!(1, summary.sent);
        assert_eq!(vec![record("Sophie is cute.")], working.calls());
        assert!(keys(&setup.store).is_empty());
    }

    #[test]
    fn send_all_parallel() {
        let setup = set_up();
        let bodies = (0..64)
            .map(|i| format!("Message {}", i))
            .collect::<Vec<_>>();
        for body in &bodies {
            setup.store.add(&record(body)).unwrap();
        }

        let failing = bodies
            .iter()
            .step_by(4)
            .map(|s| s.as_str())
            .collect::<Vec<_>>();
        let agent = StubAgent::failing(&failing);

        let summary = sender(&setup.store, &agent)
            .with_parallelism(8)
            .send_all()
            .unwrap();

        assert_eq!(
            SendSummary {
                sent: 48,
                failed: 16,
                skipped: 0,
            },
            summary
        );

        // Each message was attempted exactly once
        let attempted = agent
            .calls()
            .into_iter()
            .map(|r| r.body)
            .collect::<Vec<_>>();
        assert_eq!(64, attempted.len());
        assert_eq!(
            bodies.iter().cloned().collect::<BTreeSet<_>>(),
            attempted.into_iter().collect::<BTreeSet<_>>()
        );

        assert_eq!(
            failing
                .iter()
                .map(|&body| crate::queue::message::key_of(body))
                .collect::<BTreeSet<_>>(),
            keys(&setup.store)
        );
    }

    #[test]
    fn send_all_missing_queue() {
        let setup = set_up();
        let agent = StubAgent::default();
        let store = MessageStore::new(
            LogPrefix::new("store".to_owned()),
            setup.store.root().join("nx"),
        );

        assert_matches!(Err(Error::Io(_)), sender(&store, &agent).send_all());
    }
}
