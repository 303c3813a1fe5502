//! Alert core: pure message decoding and record extraction, no I/O.
mod decode;
mod extract;
mod message;
mod record;
mod report;
mod snippet;

pub use decode::{decode_message, select_label, DecodeError, DecodeOptions};
pub use extract::{
    ExtractError, ExtractOptions, ExtractOutcome, MalformedRecord, RecordExtractor,
    SkippedHeading,
};
pub use message::{DecodedMessage, Header, MessageBody, MessagePart, RawMessage};
pub use record::{Record, RecordFormat};
pub use report::{BatchReport, FailureStage, MessageFailure, MessageSummary};
pub use snippet::{normalize_snippet, ELLIPSIS};
