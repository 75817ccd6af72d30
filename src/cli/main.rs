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

use std::ffi::OsString;
use std::io;
use std::path::PathBuf;

use log::error;
use structopt::StructOpt;

use crate::delivery::Sendmail;
use crate::queue::{sender::QueueSender, store::MessageStore};
use crate::support::{
    error::Error,
    file_ops,
    log_prefix::LogPrefix,
    sysexits::*,
    system_config::{self, SystemConfig},
};

/// Manage the msmtpq mail queue.
///
/// When run without `--manage`, msmtpq reads a message from standard input
/// and queues it, together with all command-line arguments, for later
/// delivery through msmtp. It is meant to be configured as the `sendmail`
/// program of a mail client.
///
/// Configuration is read from ~/.config/msmtpq/msmtpq.toml, or the file
/// named by $MSMTPQ_CONFIG. $MSMTPQ_QUEUE_DIR overrides the queue directory.
#[derive(StructOpt)]
#[structopt(name = "msmtpq --manage", max_term_width = 80)]
pub(super) struct ManageOptions {
    #[structopt(flatten)]
    pub(super) common: CommonOptions,

    #[structopt(subcommand)]
    pub(super) command: ManageCommand,
}

#[derive(StructOpt, Default)]
pub(super) struct CommonOptions {
    /// The configuration file to use
    /// [default: ~/.config/msmtpq/msmtpq.toml]
    #[structopt(long, parse(from_os_str))]
    pub(super) config: Option<PathBuf>,

    /// The queue directory to operate on, overriding the configuration
    #[structopt(long, parse(from_os_str))]
    pub(super) queue_dir: Option<PathBuf>,
}

#[derive(StructOpt, Debug, PartialEq, Eq)]
pub(super) enum ManageCommand {
    /// Attempt to send every queued message.
    ///
    /// Messages which fail to send stay queued. Failures are only reported
    /// in the log; this always exits successfully once every message has
    /// been attempted.
    Send,
    /// Print every queued message.
    List,
    /// Print the number of queued messages.
    Count,
    /// Remove a message from the queue without sending it.
    Delete {
        /// The key of the message, as shown by `list`
        key: String,
    },
    /// Attempt to send a single queued message.
    SendOne {
        /// The key of the message, as shown by `list`
        key: String,
    },
}

/// Everything derived from configuration and the environment.
struct Environment {
    home: PathBuf,
    config: SystemConfig,
    queue_dir: PathBuf,
}

impl Environment {
    fn load(common: CommonOptions) -> Self {
        let home = match system_config::home_dir() {
            Ok(home) => home,
            Err(e) => die!(EX_CONFIG, "{}", e),
        };

        let config_path = common
            .config
            .or_else(|| std::env::var_os("MSMTPQ_CONFIG").map(PathBuf::from))
            .unwrap_or_else(|| {
                home.join(system_config::APP_DIR)
                    .join(system_config::CONFIG_FILE_NAME)
            });
        let config = match SystemConfig::load(&config_path) {
            Ok(config) => config,
            Err(e) => die!(
                EX_CONFIG,
                "Error in config file at '{}': {}",
                config_path.display(),
                e
            ),
        };

        let queue_dir = common
            .queue_dir
            .or_else(|| {
                std::env::var_os("MSMTPQ_QUEUE_DIR").map(PathBuf::from)
            })
            .unwrap_or_else(|| config.queue_dir(&home));

        Environment {
            home,
            config,
            queue_dir,
        }
    }

    fn init_logging(&self) {
        let log_config_file = self
            .home
            .join(system_config::APP_DIR)
            .join(system_config::LOGGING_CONFIG_FILE_NAME);
        if log_config_file.is_file() {
            if let Err(e) = log4rs::init_file(
                &log_config_file,
                log4rs::file::Deserializers::new(),
            ) {
                die!(
                    EX_CONFIG,
                    "Error in logging config at '{}': {}",
                    log_config_file.display(),
                    e
                );
            }
            return;
        }

        use log4rs::{
            append::file::FileAppender,
            config::{Appender, Config, Root},
            encode::pattern::PatternEncoder,
        };

        let log_file = self.config.log_file(&self.home);
        if let Some(parent) = log_file.parent() {
            if let Err(e) = file_ops::ensure_dir(parent, 0o700) {
                die!(
                    EX_CANTCREAT,
                    "Failed to create '{}': {}",
                    parent.display(),
                    e
                );
            }
        }

        let appender = match FileAppender::builder()
            .encoder(Box::new(PatternEncoder::new(
                "{d(%Y-%m-%d %H:%M:%S)} {l} {m}{n}",
            )))
            .build(&log_file)
        {
            Ok(appender) => appender,
            Err(e) => die!(
                EX_CANTCREAT,
                "Failed to open '{}': {}",
                log_file.display(),
                e
            ),
        };

        let config = Config::builder()
            .appender(Appender::builder().build("file", Box::new(appender)))
            .build(
                Root::builder()
                    .appender("file")
                    .build(self.config.log_level()),
            );
        match config {
            Ok(config) => {
                if let Err(e) = log4rs::init_config(config) {
                    die!(EX_SOFTWARE, "Failed to initialise logging: {}", e);
                }
            }
            Err(e) => die!(EX_CONFIG, "Invalid logging setup: {}", e),
        }
    }

    fn open_store(&self, operation: &str) -> MessageStore {
        if let Err(e) = file_ops::ensure_dir(&self.queue_dir, 0o700) {
            error!("Failed to create {}: {}", self.queue_dir.display(), e);
            die!(
                EX_CANTCREAT,
                "Failed to create '{}': {}",
                self.queue_dir.display(),
                e
            );
        }

        MessageStore::new(self.log_prefix(operation), self.queue_dir.clone())
    }

    fn log_prefix(&self, operation: &str) -> LogPrefix {
        let log_prefix = LogPrefix::new(operation.to_owned());
        log_prefix.set_queue(self.queue_dir.display().to_string());
        log_prefix
    }
}

pub fn main() {
    let args = std::env::args_os().skip(1).collect::<Vec<_>>();
    let first = args.first().and_then(|a| a.to_str()).map(str::to_owned);

    match first.as_deref() {
        Some("--manage") => manage(args.into_iter().skip(1)),
        Some("--help") | Some("-h") => {
            let _ = ManageOptions::clap().print_long_help();
            println!();
        }
        _ => enqueue(args),
    }
}

fn enqueue(args: Vec<OsString>) {
    let arguments = match args
        .into_iter()
        .map(OsString::into_string)
        .collect::<Result<Vec<_>, _>>()
    {
        Ok(arguments) => arguments,
        Err(arg) => die!(EX_USAGE, "Argument is not valid UTF-8: {:?}", arg),
    };

    let env = Environment::load(CommonOptions::default());
    env.init_logging();
    let store = env.open_store("enqueue");

    if let Err(e) =
        super::enqueue::enqueue(&store, arguments, io::stdin().lock())
    {
        error!("Failed to queue message: {}", e);
        die!(sysexit_for(&e), "Failed to queue message: {}", e);
    }
}

fn manage(args: impl Iterator<Item = OsString>) {
    // Clap exits with status 1 instead of EX_USAGE if we use the more concise
    // API
    let options = match ManageOptions::from_iter_safe(
        std::iter::once(OsString::from("msmtpq --manage")).chain(args),
    ) {
        Ok(options) => options,
        Err(
            e @ clap::Error {
                kind: clap::ErrorKind::HelpDisplayed,
                ..
            },
        )
        | Err(
            e @ clap::Error {
                kind: clap::ErrorKind::VersionDisplayed,
                ..
            },
        ) => {
            println!("{}", e.message);
            return;
        }
        Err(e) => {
            eprintln!("{}", e.message);
            EX_USAGE.exit()
        }
    };

    let env = Environment::load(options.common);
    env.init_logging();

    let store = env.open_store("manage");
    let sender = QueueSender::new(
        env.log_prefix("send"),
        &store,
        Sendmail::new(env.config.delivery.program.clone()),
    )
    .with_parallelism(env.config.delivery.parallelism);

    let stdout = io::stdout();
    let stderr = io::stderr();
    let mut err = stderr.lock();
    let result = match options.command {
        ManageCommand::Send => super::manage::send_all(&sender, &mut err),
        ManageCommand::List => {
            super::manage::list(&store, &mut stdout.lock(), &mut err)
        }
        ManageCommand::Count => {
            super::manage::count(&store, &mut stdout.lock(), &mut err)
        }
        ManageCommand::Delete { ref key } => {
            super::manage::delete(&store, key, &mut err)
        }
        ManageCommand::SendOne { ref key } => {
            super::manage::send_one(&sender, key, &mut err)
        }
    };

    if let Err(exit) = result {
        exit.exit();
    }
}

/// Map an error reaching the top level onto the exit code to report.
pub(super) fn sysexit_for(e: &Error) -> Sysexit {
    match *e {
        Error::NotFound(_) | Error::UnsafeKey => EX_NOINPUT,
        Error::CorruptRecord { .. } | Error::Json(_) => EX_DATAERR,
        Error::DeliveryStart { .. }
        | Error::DeliveryIo { .. }
        | Error::DeliveryFailed { .. } => EX_UNAVAILABLE,
        Error::Config(_) | Error::NoHome => EX_CONFIG,
        Error::Io(ref e) if io::ErrorKind::InvalidData == e.kind() => {
            EX_DATAERR
        }
        Error::Io(_) => EX_IOERR,
        Error::Nix(_) => EX_OSERR,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn parse(args: &[&str]) -> Result<ManageOptions, clap::Error> {
        ManageOptions::from_iter_safe(
            std::iter::once("msmtpq --manage").chain(args.iter().copied()),
        )
    }

    #[test]
    fn parse_subcommands() {
        assert_eq!(ManageCommand::Send, parse(&["send"]).unwrap().command);
        assert_eq!(ManageCommand::List, parse(&["list"]).unwrap().command);
        assert_eq!(ManageCommand::Count, parse(&["count"]).unwrap().command);
        assert_eq!(
            ManageCommand::Delete {
                key: "sophie".to_owned()
            },
            parse(&["delete", "sophie"]).unwrap().command
        );
        assert_eq!(
            ManageCommand::SendOne {
                key: "sophie".to_owned()
            },
            parse(&["send-one", "sophie"]).unwrap().command
        );
    }

    #[test]
    fn parse_common_options() {
        let options =
            parse(&["--queue-dir", "/tmp/q", "--config", "/tmp/c.toml", "list"])
                .unwrap();
        assert_eq!(Some(PathBuf::from("/tmp/q")), options.common.queue_dir);
        assert_eq!(Some(PathBuf::from("/tmp/c.toml")), options.common.config);
    }

    #[test]
    fn parse_errors() {
        assert!(parse(&["frobnicate"]).is_err());
        assert!(parse(&[]).is_err());
        assert!(parse(&["delete"]).is_err());
        assert!(parse(&["send", "extra"]).is_err());
    }

    #[test]
    fn exit_codes() {
        assert_eq!(EX_NOINPUT, sysexit_for(&Error::NotFound("k".to_owned())));
        assert_eq!(
            EX_DATAERR,
            sysexit_for(&Error::Io(io::Error::from(io::ErrorKind::InvalidData)))
        );
        assert_eq!(
            EX_IOERR,
            sysexit_for(&Error::Io(io::Error::from(
                io::ErrorKind::PermissionDenied
            )))
        );
        assert_eq!(EX_CONFIG, sysexit_for(&Error::NoHome));
        assert_eq!(
            EX_UNAVAILABLE,
            sysexit_for(&Error::DeliveryIo {
                program: "msmtp".to_owned(),
                source: io::Error::from(io::ErrorKind::BrokenPipe),
            })
        );
    }

    #[test]
    fn log_prefixes_name_the_queue() {
        let env = Environment {
            home: PathBuf::from("/home/sophie"),
            config: SystemConfig::default(),
            queue_dir: PathBuf::from("/home/sophie/queue"),
        };
        assert_eq!(
            "send[/home/sophie/queue]",
            env.log_prefix("send").to_string()
        );
    }
}
