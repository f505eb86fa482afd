//! Stateful translator for update/annotate server output
//!
//! Informational lines (`<letter> <path>`) arrive on the message channel;
//! diagnostics arrive on the error channel, prefixed by the server tag. The
//! diagnostics are classified by an ordered rule table where the first match
//! wins.

use serde::{Deserialize, Serialize};
use sync_model::{ChangeEvent, ResourcePath};

use crate::notification::{FileState, UpdateNotification};
use crate::status::{ProtocolStatus, StatusCode};

const MERGING_PREFIX: &str = "Merging ";
const RCSMERGE_CONFLICTS: &str = "rcsmerge: warning: conflicts during merge";

/// The message prefixes a server program uses for its diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerPrefixes {
    /// Prefixes of regular diagnostics, e.g. `cvs server: `
    pub messages: Vec<String>,
    /// Prefixes of diagnostics after which the command stopped, e.g.
    /// `cvs [server aborted]: `
    pub aborted: Vec<String>,
}

impl ServerPrefixes {
    /// Prefixes used by `program` when run remotely or locally.
    pub fn for_program(program: &str) -> Self {
        Self {
            messages: vec![
                format!("{} server: ", program),
                format!("{} update: ", program),
            ],
            aborted: vec![
                format!("{} [server aborted]: ", program),
                format!("{} [update aborted]: ", program),
            ],
        }
    }

    fn strip_message<'a>(&self, line: &'a str) -> Option<&'a str> {
        self.messages.iter().find_map(|p| line.strip_prefix(p.as_str()))
    }

    fn strip_aborted<'a>(&self, line: &'a str) -> Option<&'a str> {
        self.aborted.iter().find_map(|p| line.strip_prefix(p.as_str()))
    }
}

impl Default for ServerPrefixes {
    fn default() -> Self {
        Self::for_program("cvs")
    }
}

/// The result of parsing one line: zero or one notification and zero or one
/// status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseOutcome {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification: Option<UpdateNotification>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ProtocolStatus>,
}

impl ParseOutcome {
    fn none() -> Self {
        Self::default()
    }

    fn notify(notification: UpdateNotification) -> Self {
        Self {
            notification: Some(notification),
            status: None,
        }
    }

    fn status(status: ProtocolStatus) -> Self {
        Self {
            notification: None,
            status: Some(status),
        }
    }

    fn both(notification: UpdateNotification, status: ProtocolStatus) -> Self {
        Self {
            notification: Some(notification),
            status: Some(status),
        }
    }

    /// The change event this line produces for the collector, if any.
    pub fn change_event(&self) -> Option<ChangeEvent> {
        self.notification.as_ref().map(UpdateNotification::to_change_event)
    }

    pub fn is_empty(&self) -> bool {
        self.notification.is_none() && self.status.is_none()
    }
}

/// How a diagnostic is recognized.
#[derive(Debug, Clone, Copy)]
enum Pattern {
    Prefix(&'static str),
    Suffix(&'static str),
    Both(&'static str, &'static str),
}

/// What a recognized diagnostic produces.
#[derive(Debug, Clone, Copy)]
enum Action {
    DirectoryExists,
    DirectoryDoesNotExist,
    DirectoryIsNew,
    FileRemoved,
    FileRemovedWithWarning,
    Warning,
    Info,
    Ignore,
}

struct Rule {
    pattern: Pattern,
    action: Action,
}

/// Classification of diagnostics under the server message prefix.
const SERVER_RULES: &[Rule] = &[
    Rule {
        pattern: Pattern::Prefix("Updating "),
        action: Action::DirectoryExists,
    },
    Rule {
        pattern: Pattern::Prefix("skipping directory"),
        action: Action::DirectoryDoesNotExist,
    },
    Rule {
        pattern: Pattern::Prefix("New directory"),
        action: Action::DirectoryIsNew,
    },
    Rule {
        pattern: Pattern::Suffix(" is no longer in the repository"),
        action: Action::FileRemoved,
    },
    Rule {
        pattern: Pattern::Both("conflict:", " is modified but no longer in the repository"),
        action: Action::FileRemovedWithWarning,
    },
    Rule {
        pattern: Pattern::Prefix("conflict:"),
        action: Action::Warning,
    },
    Rule {
        pattern: Pattern::Both("warning:", " is not (any longer) pertinent"),
        action: Action::FileRemovedWithWarning,
    },
    Rule {
        pattern: Pattern::Prefix("warning:"),
        action: Action::Warning,
    },
    Rule {
        pattern: Pattern::Prefix("conflicts"),
        action: Action::Info,
    },
    Rule {
        pattern: Pattern::Prefix("cannot open directory"),
        action: Action::Ignore,
    },
    Rule {
        pattern: Pattern::Prefix("nothing known about"),
        action: Action::Ignore,
    },
];

impl Pattern {
    /// Returns the part of `message` between the matched prefix and suffix.
    fn capture<'a>(&self, message: &'a str) -> Option<&'a str> {
        match *self {
            Pattern::Prefix(prefix) => message.strip_prefix(prefix),
            Pattern::Suffix(suffix) => message.strip_suffix(suffix),
            Pattern::Both(prefix, suffix) => message
                .strip_prefix(prefix)
                .and_then(|rest| rest.strip_suffix(suffix)),
        }
    }
}

/// Line-by-line parser for one update/annotate command.
///
/// Paths in the output are relative to the command root. The only state
/// carried between lines is whether a merge is in progress: the server
/// reports a merged file with conflicts as a plain modification, so an `M`
/// line following `Merging ...` is promoted to a conflict.
#[derive(Debug, Clone)]
pub struct UpdateParser {
    root: ResourcePath,
    prefixes: ServerPrefixes,
    merging: bool,
}

impl UpdateParser {
    pub fn new(root: ResourcePath) -> Self {
        Self::with_prefixes(root, ServerPrefixes::default())
    }

    pub fn with_prefixes(root: ResourcePath, prefixes: ServerPrefixes) -> Self {
        Self {
            root,
            prefixes,
            merging: false,
        }
    }

    pub fn root(&self) -> &ResourcePath {
        &self.root
    }

    /// Whether a `Merging ...` line was seen and not yet consumed.
    pub fn is_merging(&self) -> bool {
        self.merging
    }

    /// Parse one line from the message channel.
    pub fn message_line(&mut self, line: &str) -> ParseOutcome {
        if line.starts_with(MERGING_PREFIX) {
            self.merging = true;
            return ParseOutcome::none();
        }

        let mut chars = line.chars();
        let (Some(letter), Some(' ')) = (chars.next(), chars.next()) else {
            return ParseOutcome::none();
        };
        let path = chars.as_str();
        if path.is_empty() {
            return ParseOutcome::none();
        }

        let mut state = FileState::from_letter(letter);
        if self.merging {
            if state == FileState::Modified {
                state = FileState::MergeableConflict;
            }
            self.merging = false;
        }

        ParseOutcome::notify(UpdateNotification::FileInformation {
            state,
            path: self.root.join(path),
        })
    }

    /// Parse one line from the error (diagnostic) channel.
    pub fn error_line(&mut self, line: &str) -> ParseOutcome {
        if line.starts_with(MERGING_PREFIX) {
            self.merging = true;
            return ParseOutcome::none();
        }

        if let Some(message) = self.prefixes.strip_message(line) {
            return self.server_message(line, message);
        }

        if let Some(message) = self.prefixes.strip_aborted(line) {
            return if message.starts_with("no such tag") {
                ParseOutcome::status(ProtocolStatus::warning(StatusCode::NoSuchTag, line))
            } else {
                ParseOutcome::status(ProtocolStatus::error(StatusCode::ServerAborted, line))
            };
        }

        if line == RCSMERGE_CONFLICTS {
            return ParseOutcome::status(ProtocolStatus::warning(StatusCode::Conflict, line));
        }

        tracing::debug!(line, "Unclassified diagnostic line");
        ParseOutcome::status(ProtocolStatus::error(StatusCode::Unclassified, line))
    }

    fn server_message(&self, line: &str, message: &str) -> ParseOutcome {
        let matched = SERVER_RULES
            .iter()
            .find_map(|rule| rule.pattern.capture(message).map(|c| (rule.action, c)));

        let Some((action, captured)) = matched else {
            return ParseOutcome::status(ProtocolStatus::error(StatusCode::ServerError, line));
        };

        match action {
            Action::DirectoryExists => ParseOutcome::notify(UpdateNotification::DirectoryExists {
                path: self.root.join(captured.trim()),
            }),
            Action::DirectoryDoesNotExist => {
                ParseOutcome::notify(UpdateNotification::DirectoryDoesNotExist {
                    path: self.root.join(captured.trim()),
                })
            }
            Action::DirectoryIsNew => ParseOutcome::notify(UpdateNotification::DirectoryIsNew {
                path: self.root.join(new_directory_name(captured)),
            }),
            Action::FileRemoved => ParseOutcome::notify(UpdateNotification::FileRemoved {
                path: self.root.join(strip_quotes(captured.trim())),
            }),
            Action::FileRemovedWithWarning => ParseOutcome::both(
                UpdateNotification::FileRemoved {
                    path: self.root.join(strip_quotes(captured.trim())),
                },
                ProtocolStatus::warning(StatusCode::Conflict, line),
            ),
            Action::Warning => {
                ParseOutcome::status(ProtocolStatus::warning(StatusCode::Conflict, line))
            }
            Action::Info => ParseOutcome::status(ProtocolStatus::info(StatusCode::Conflict, line)),
            Action::Ignore => ParseOutcome::none(),
        }
    }
}

/// Remove the `` `name' `` quoting the server puts around filenames.
fn strip_quotes(name: &str) -> &str {
    let name = name
        .strip_prefix('`')
        .or_else(|| name.strip_prefix('\''))
        .unwrap_or(name);
    name.strip_suffix('\'').unwrap_or(name)
}

/// Extract `x` from `` `x' -- ignored ``.
fn new_directory_name(rest: &str) -> &str {
    let rest = rest.trim();
    let unquoted = rest
        .strip_prefix('`')
        .or_else(|| rest.strip_prefix('\''));
    match unquoted {
        Some(inner) => match inner.rfind('\'') {
            Some(end) => &inner[..end],
            None => inner,
        },
        None => rest.split(" -- ").next().unwrap_or(rest),
    }
}
