//! Alert engine: mailbox access, batch orchestration and record sinks.
mod export;
mod harvester;
mod mailbox;
mod persist;
mod sink;
mod sqlite;
mod types;

pub use export::JsonFileSink;
pub use harvester::{Clock, HarvestError, Harvester};
pub use mailbox::{GmailClient, GmailSettings, MailboxClient};
pub use persist::{ensure_output_dir, AtomicFileWriter, PersistError};
pub use sink::{MemoryRecordSink, RecordSink, SinkError};
pub use sqlite::SqliteRecordSink;
pub use types::{FailureKind, HarvestEvent, ProgressSink, TransportError};
