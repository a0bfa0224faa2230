//! Job domain types: identifiers and the states a job directory moves through.

use std::borrow::Cow;
use std::ffi::{OsStr, OsString};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::OwnerId;

/// Error returned when a name cannot be used as a single directory component.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NameError {
    #[error("name must not be empty")]
    Empty,
    #[error("name {0:?} is reserved")]
    Reserved(String),
    #[error("name {0:?} contains a path separator or NUL byte")]
    InvalidChar(String),
}

/// Check that `name` is safe to use as exactly one path component.
///
/// Job name prefixes and property keys go through this check.
pub fn validate_component(name: &str) -> Result<(), NameError> {
    validate_os_component(OsStr::new(name))
}

/// Same as [`validate_component`] for names read back from the filesystem,
/// which need not be UTF-8.
///
/// Only what can never be one component is rejected; any other byte,
/// including `\`, is an ordinary character on the filesystems the queue runs on.
pub fn validate_os_component(name: &OsStr) -> Result<(), NameError> {
    if name.is_empty() {
        return Err(NameError::Empty);
    }
    if name == "." || name == ".." {
        return Err(NameError::Reserved(name.to_string_lossy().into_owned()));
    }
    if name.as_encoded_bytes().iter().any(|b| matches!(b, b'/' | b'\0')) {
        return Err(NameError::InvalidChar(name.to_string_lossy().into_owned()));
    }
    Ok(())
}

/// Name of a job directory, unique within a queue.
///
/// Jobs may be submitted by other programs, so the name is kept exactly as it
/// appears on disk. It serializes as (lossy) UTF-8 text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct JobId(OsString);

impl JobId {
    /// Parse a job ID from a directory name.
    pub fn parse(s: impl Into<OsString>) -> Result<Self, NameError> {
        let s = s.into();
        validate_os_component(&s)?;
        Ok(Self(s))
    }

    /// The directory name, for joining onto a state directory.
    pub fn as_os_str(&self) -> &OsStr {
        &self.0
    }

    /// The name as text, if it is valid UTF-8.
    pub fn to_str(&self) -> Option<&str> {
        self.0.to_str()
    }

    /// The human-readable prefix the job was created with.
    ///
    /// Jobs are named `<prefix>-<random>`; names without a `-` are their own kind.
    pub fn kind(&self) -> Cow<'_, str> {
        fn prefix(name: &str) -> &str {
            name.rsplit_once('-').map_or(name, |(kind, _)| kind)
        }
        match self.0.to_string_lossy() {
            Cow::Borrowed(name) => Cow::Borrowed(prefix(name)),
            Cow::Owned(name) => Cow::Owned(prefix(&name).to_string()),
        }
    }
}

impl TryFrom<String> for JobId {
    type Error = NameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<JobId> for String {
    fn from(id: JobId) -> Self {
        match id.0.into_string() {
            Ok(s) => s,
            Err(raw) => raw.to_string_lossy().into_owned(),
        }
    }
}

impl AsRef<Path> for JobId {
    fn as_ref(&self) -> &Path {
        Path::new(&self.0)
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0.to_string_lossy())
    }
}

/// Where a job currently lives. The directory a job sits in *is* its state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum JobState {
    /// Being prepared by the creating process; invisible to workers.
    Staging,
    /// Visible to every worker calling take.
    Submittable,
    /// Claimed by the worker process that owns the slot.
    Owned { owner: OwnerId },
    /// Finished successfully.
    Completed,
    /// Finished unsuccessfully.
    Failed,
}

impl JobState {
    pub const STAGING_DIR: &'static str = "staging";
    pub const SUBMITTABLE_DIR: &'static str = "submittable";
    pub const OWNED_DIR: &'static str = "owned";
    pub const COMPLETED_DIR: &'static str = "completed";
    pub const FAILED_DIR: &'static str = "failed";

    /// Name of the top-level directory under the queue root for this state.
    pub fn dir_name(&self) -> &'static str {
        match self {
            JobState::Staging => Self::STAGING_DIR,
            JobState::Submittable => Self::SUBMITTABLE_DIR,
            JobState::Owned { .. } => Self::OWNED_DIR,
            JobState::Completed => Self::COMPLETED_DIR,
            JobState::Failed => Self::FAILED_DIR,
        }
    }

    /// Terminal jobs are never moved again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Staging => "staging",
            JobState::Submittable => "submittable",
            JobState::Owned { .. } => "owned",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
        }
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobState::Owned { owner } => write!(f, "owned by {owner}"),
            other => f.write_str(other.as_str()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unsafe_components() {
        assert_eq!(validate_component(""), Err(NameError::Empty));
        assert!(matches!(validate_component(".."), Err(NameError::Reserved(_))));
        assert!(matches!(
            validate_component("a/b"),
            Err(NameError::InvalidChar(_))
        ));
        assert!(matches!(
            validate_component("nul\0"),
            Err(NameError::InvalidChar(_))
        ));
        assert!(validate_component("build-Ab12cd").is_ok());
        assert!(validate_component("report\\2024").is_ok());
    }

    #[cfg(unix)]
    #[test]
    fn non_utf8_names_are_valid_ids() {
        use std::os::unix::ffi::OsStrExt;

        let id = JobId::parse(OsStr::from_bytes(b"scan-\xff01")).unwrap();
        assert_eq!(id.to_str(), None);
        assert_eq!(id.kind(), "scan");
        assert_eq!(id.to_string(), "scan-\u{fffd}01");
    }

    #[test]
    fn kind_is_prefix_before_last_dash() {
        let id = JobId::parse("send-email-x7Yq2a").unwrap();
        assert_eq!(id.kind(), "send-email");

        let bare = JobId::parse("foo").unwrap();
        assert_eq!(bare.kind(), "foo");
    }

    #[test]
    fn job_id_deserialization_validates() {
        let ok: JobId = serde_json::from_str("\"build-123\"").unwrap();
        assert_eq!(ok.to_str(), Some("build-123"));

        let bad: Result<JobId, _> = serde_json::from_str("\"../etc\"");
        assert!(bad.is_err());
    }

    #[test]
    fn terminal_states() {
        assert!(JobState::Completed.is_terminal());
        assert!(JobState::Failed.is_terminal());
        assert!(!JobState::Submittable.is_terminal());
        assert_eq!(JobState::Submittable.dir_name(), "submittable");
    }
}
