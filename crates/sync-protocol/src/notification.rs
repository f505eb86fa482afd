//! Structured notifications and their translation into change events

use serde::{Deserialize, Serialize};
use sync_model::{ChangeEvent, Depth, ResourcePath};

/// Classification of an informational `<letter> <path>` line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FileState {
    /// `A`: scheduled for addition locally
    AddedLocally,
    /// `?`: not under version control
    Unknown,
    /// `U`/`P`: brought up to date from the server
    RemoteChanges,
    /// `R`/`D`: removed
    Deleted,
    /// `M`: locally modified
    Modified,
    /// `C`: conflict reported by the server
    Conflict,
    /// `M` reported while a merge was in progress
    MergeableConflict,
    /// Any other letter
    None,
}

impl FileState {
    pub fn from_letter(letter: char) -> Self {
        match letter {
            'A' => FileState::AddedLocally,
            '?' => FileState::Unknown,
            'U' | 'P' => FileState::RemoteChanges,
            'R' | 'D' => FileState::Deleted,
            'M' => FileState::Modified,
            'C' => FileState::Conflict,
            _ => FileState::None,
        }
    }

    pub fn is_conflicting(self) -> bool {
        matches!(self, FileState::Conflict | FileState::MergeableConflict)
    }
}

/// What a server response said about one resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum UpdateNotification {
    /// `Updating X`: the directory exists remotely
    DirectoryExists { path: ResourcePath },
    /// `skipping directory X`: the directory no longer exists remotely
    DirectoryDoesNotExist { path: ResourcePath },
    /// `New directory X`: the directory is new remotely
    DirectoryIsNew { path: ResourcePath },
    /// The file is no longer in the repository
    FileRemoved { path: ResourcePath },
    /// An informational `<letter> <path>` line
    FileInformation { state: FileState, path: ResourcePath },
}

impl UpdateNotification {
    pub fn path(&self) -> &ResourcePath {
        match self {
            UpdateNotification::DirectoryExists { path }
            | UpdateNotification::DirectoryDoesNotExist { path }
            | UpdateNotification::DirectoryIsNew { path }
            | UpdateNotification::FileRemoved { path }
            | UpdateNotification::FileInformation { path, .. } => path,
        }
    }

    /// Translate into the change event the collector consumes.
    ///
    /// Removed files become a recomputation rather than a removal: the
    /// comparator decides whether that is an incoming deletion or a resource
    /// that is no longer tracked.
    pub fn to_change_event(&self) -> ChangeEvent {
        match self {
            UpdateNotification::DirectoryExists { path } => {
                ChangeEvent::changed(path.clone(), Depth::Zero)
            }
            UpdateNotification::DirectoryDoesNotExist { path } => {
                ChangeEvent::removed(path.clone(), Depth::Infinite)
            }
            UpdateNotification::DirectoryIsNew { path } => {
                ChangeEvent::changed(path.clone(), Depth::Infinite)
            }
            UpdateNotification::FileRemoved { path }
            | UpdateNotification::FileInformation { path, .. } => {
                ChangeEvent::changed(path.clone(), Depth::Zero)
            }
        }
    }
}

impl std::fmt::Display for UpdateNotification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UpdateNotification::DirectoryExists { path } => write!(f, "directory {}", path),
            UpdateNotification::DirectoryDoesNotExist { path } => {
                write!(f, "directory gone {}", path)
            }
            UpdateNotification::DirectoryIsNew { path } => write!(f, "new directory {}", path),
            UpdateNotification::FileRemoved { path } => write!(f, "file removed {}", path),
            UpdateNotification::FileInformation { state, path } => {
                write!(f, "file {:?} {}", state, path)
            }
        }
    }
}

impl From<&UpdateNotification> for ChangeEvent {
    fn from(notification: &UpdateNotification) -> Self {
        notification.to_change_event()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case('A', FileState::AddedLocally)]
    #[case('?', FileState::Unknown)]
    #[case('U', FileState::RemoteChanges)]
    #[case('P', FileState::RemoteChanges)]
    #[case('R', FileState::Deleted)]
    #[case('D', FileState::Deleted)]
    #[case('M', FileState::Modified)]
    #[case('C', FileState::Conflict)]
    #[case('X', FileState::None)]
    fn test_letters(#[case] letter: char, #[case] expected: FileState) {
        assert_eq!(FileState::from_letter(letter), expected);
    }

    #[test]
    fn test_missing_directory_removes_subtree() {
        let notification = UpdateNotification::DirectoryDoesNotExist {
            path: ResourcePath::new("old"),
        };
        assert_eq!(
            notification.to_change_event(),
            ChangeEvent::removed(ResourcePath::new("old"), Depth::Infinite)
        );
    }

    #[test]
    fn test_new_directory_recomputes_subtree() {
        let notification = UpdateNotification::DirectoryIsNew {
            path: ResourcePath::new("fresh"),
        };
        assert_eq!(notification.to_change_event().depth(), Depth::Infinite);
    }

    #[test]
    fn test_removed_file_is_recomputed() {
        let notification = UpdateNotification::FileRemoved {
            path: ResourcePath::new("gone.txt"),
        };
        assert_eq!(
            ChangeEvent::from(&notification),
            ChangeEvent::changed(ResourcePath::new("gone.txt"), Depth::Zero)
        );
    }
}
