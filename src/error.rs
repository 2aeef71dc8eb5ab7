//! Errors returned by the collector, the dumper and the orchestrator.
//!
//! Every error carries the profile name and/or the host or path it relates to,
//! so the caller can tell which download or which write failed.
//! [ProfileError::kind] groups the variants into the four classes the rest of the tool acts on:
//! - [ErrorKind::Validation]: bad input, detected before any network or filesystem access.
//! - [ErrorKind::Network]: a download failed; the only class the keep-going policy may drop.
//! - [ErrorKind::Io]: creating the dump directory or writing a profile file failed.
//! - [ErrorKind::Cancellation]: the shared cancellation token fired.
//!
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Network,
    Io,
    Cancellation,
}

#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    #[error("invalid host address {host:?}: {reason}")]
    InvalidHost {
        host: String,
        reason: String,
    },

    #[error("unknown profile {profile:?}, possible options: {known}")]
    UnknownProfile {
        profile: String,
        known: String,
    },

    #[error("invalid profile request {request:?}: {reason}")]
    InvalidProfile {
        request: String,
        reason: String,
    },

    #[error("profile {profile:?} is requested more than once")]
    DuplicateProfile {
        profile: String,
    },

    #[error("cannot build url for {profile}: {reason}")]
    BuildUrl {
        profile: String,
        reason: String,
    },

    #[error("cannot collect {profile}: {source}")]
    Download {
        profile: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("cannot collect {profile}: non success response {status}")]
    Status {
        profile: String,
        status: reqwest::StatusCode,
    },

    #[error("cannot create directory {}: {source}", .path.display())]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot write {profile} profile to {}: {source}", .path.display())]
    WriteProfile {
        profile: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("collection cancelled")]
    Cancelled,
}

impl ProfileError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidHost { .. }
            | Self::UnknownProfile { .. }
            | Self::InvalidProfile { .. }
            | Self::DuplicateProfile { .. } => ErrorKind::Validation,
            Self::BuildUrl { .. }
            | Self::Download { .. }
            | Self::Status { .. } => ErrorKind::Network,
            Self::CreateDirectory { .. }
            | Self::WriteProfile { .. } => ErrorKind::Io,
            Self::Cancelled => ErrorKind::Cancellation,
        }
    }
    /// Whether the keep-going policy is allowed to drop this error.
    pub fn is_ignorable(&self) -> bool {
        self.kind() == ErrorKind::Network
    }
    pub fn is_cancelled(&self) -> bool {
        self.kind() == ErrorKind::Cancellation
    }
    /// The profile the error is about, if it is about a single profile.
    pub fn profile(&self) -> Option<&str> {
        match self {
            Self::UnknownProfile { profile, .. }
            | Self::DuplicateProfile { profile }
            | Self::BuildUrl { profile, .. }
            | Self::Download { profile, .. }
            | Self::Status { profile, .. }
            | Self::WriteProfile { profile, .. } => Some(profile),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_are_not_ignorable() {
        let error = ProfileError::UnknownProfile { profile: "nope".to_string(), known: "heap".to_string() };
        assert_eq!(error.kind(), ErrorKind::Validation);
        assert!(!error.is_ignorable());
        assert_eq!(error.profile(), Some("nope"));
    }
    #[test]
    fn network_errors_are_ignorable() {
        let error = ProfileError::BuildUrl { profile: "allocs".to_string(), reason: "bad".to_string() };
        assert_eq!(error.kind(), ErrorKind::Network);
        assert!(error.is_ignorable());
        assert!(error.to_string().starts_with("cannot build url for allocs:"));
    }
    #[test]
    fn io_errors_name_the_path() {
        let error = ProfileError::CreateDirectory {
            path: PathBuf::from("/dev/null/x"),
            source: std::io::Error::new(std::io::ErrorKind::Other, "not a directory"),
        };
        assert_eq!(error.kind(), ErrorKind::Io);
        assert!(!error.is_ignorable());
        assert_eq!(error.to_string(), "cannot create directory /dev/null/x: not a directory");
    }
    #[test]
    fn cancellation_is_its_own_kind() {
        assert!(ProfileError::Cancelled.is_cancelled());
        assert!(!ProfileError::Cancelled.is_ignorable());
        assert_eq!(ProfileError::Cancelled.profile(), None);
    }
}
