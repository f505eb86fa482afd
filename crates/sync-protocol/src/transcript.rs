//! Captured server responses
//!
//! A transcript is the response stream of one command as the client received
//! it: `M <text>` lines on the message channel, `E <text>` lines on the error
//! channel, terminated by `ok` or `error [text]`.

use std::path::Path;

use serde::{Deserialize, Serialize};
use sync_model::ChangeEvent;

use crate::notification::UpdateNotification;
use crate::parser::{ParseOutcome, UpdateParser};
use crate::status::{ProtocolStatus, Severity};
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Message,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptLine {
    pub channel: Channel,
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transcript {
    lines: Vec<TranscriptLine>,
    /// `Some(true)` after `ok`, `Some(false)` after `error`, `None` when the
    /// capture was cut short
    completed: Option<bool>,
}

/// Everything a transcript produced, in line order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TranscriptReplay {
    pub outcomes: Vec<ParseOutcome>,
    pub completed: Option<bool>,
}

impl Transcript {
    /// Parse a transcript from its text form. Blank lines are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedLine`] for a line without a channel tag.
    pub fn parse(content: &str) -> Result<Self> {
        let mut transcript = Transcript::default();

        for (index, raw) in content.lines().enumerate() {
            if raw.trim().is_empty() {
                continue;
            }
            if raw == "ok" {
                transcript.completed = Some(true);
                continue;
            }
            if raw == "error" || raw.starts_with("error ") {
                transcript.completed = Some(false);
                continue;
            }

            let (channel, text) = if let Some(text) = raw.strip_prefix("M ") {
                (Channel::Message, text)
            } else if let Some(text) = raw.strip_prefix("E ") {
                (Channel::Error, text)
            } else if raw == "M" || raw == "E" {
                // An empty message line
                continue;
            } else {
                return Err(Error::MalformedLine {
                    line: index + 1,
                    content: raw.to_string(),
                });
            };

            transcript.lines.push(TranscriptLine {
                channel,
                text: text.to_string(),
            });
        }

        Ok(transcript)
    }

    /// Load a transcript from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        Self::parse(&content)
    }

    pub fn lines(&self) -> &[TranscriptLine] {
        &self.lines
    }

    pub fn completed(&self) -> Option<bool> {
        self.completed
    }

    /// Feed every line through `parser`, preserving order across channels.
    pub fn replay(&self, parser: &mut UpdateParser) -> TranscriptReplay {
        let outcomes = self
            .lines
            .iter()
            .map(|line| match line.channel {
                Channel::Message => parser.message_line(&line.text),
                Channel::Error => parser.error_line(&line.text),
            })
            .collect();

        TranscriptReplay {
            outcomes,
            completed: self.completed,
        }
    }
}

impl TranscriptReplay {
    pub fn notifications(&self) -> impl Iterator<Item = &UpdateNotification> {
        self.outcomes.iter().filter_map(|o| o.notification.as_ref())
    }

    pub fn statuses(&self) -> impl Iterator<Item = &ProtocolStatus> {
        self.outcomes.iter().filter_map(|o| o.status.as_ref())
    }

    /// One change event per notification, in order.
    pub fn change_events(&self) -> Vec<ChangeEvent> {
        self.notifications()
            .map(UpdateNotification::to_change_event)
            .collect()
    }

    /// The most severe status raised, if any.
    pub fn worst_severity(&self) -> Option<Severity> {
        self.statuses().map(|s| s.severity).max()
    }
}
