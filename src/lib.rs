pub mod config;
pub mod context;
pub mod daemon;
pub mod filter;
pub mod logger;
pub mod lru;
pub mod mailer;
pub mod net;
pub mod periodic;
pub mod processor;
pub mod ratelimit;
pub mod recurring;
pub mod ringbuf;
pub mod stats;
pub mod supervisor;
pub mod tailbuf;
pub mod toolbox;
pub mod totp;

pub use config::Config;
pub use context::ProcessContext;
pub use daemon::{Daemon, PlainSocketConfig, PlainSocketDaemon};
pub use filter::{
    CommandFilter, LintText, NotifyViaEmail, PinAndShortcuts, ResultFilter, TranslateSequences,
};
pub use logger::Logger;
pub use lru::LeastRecentlyUsedBuffer;
pub use mailer::{MailConfig, Mailer};
pub use net::{ServerError, TcpApp, TcpServer, UdpApp, UdpServer};
pub use periodic::Periodic;
pub use processor::{CommandProcessor, ConfigError};
pub use ratelimit::RateLimit;
pub use recurring::{RecurringCommands, RecurringConfig};
pub use ringbuf::RingBuffer;
pub use stats::Stats;
pub use supervisor::Supervisor;
pub use tailbuf::TailBuffer;
pub use toolbox::{CmdError, Command, CommandResult, Feature, FeatureSet};
