//! Version-control server output parsing for Team Sync
//!
//! Turns the line-oriented responses of an update/annotate command into
//! structured notifications and severity-tagged statuses:
//!
//! - [`UpdateParser`]: stateful line translator for the message and error channels
//! - [`UpdateNotification`]: what the server told us about one resource
//! - [`ProtocolStatus`]: recoverable warnings and errors surfaced alongside
//! - [`Transcript`]: reader for captured `M `/`E ` tagged server responses

pub mod error;
pub mod notification;
pub mod parser;
pub mod status;
pub mod transcript;

pub use error::{Error, Result};
pub use notification::{FileState, UpdateNotification};
pub use parser::{ParseOutcome, ServerPrefixes, UpdateParser};
pub use status::{ProtocolStatus, Severity, StatusCode};
pub use transcript::{Channel, Transcript, TranscriptLine, TranscriptReplay};
