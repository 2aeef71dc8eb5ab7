//! Module for writing the collected profiles into the dump directory.
//!
use std::path::{Path, PathBuf};
use chrono::{DateTime, Local};
use log::*;
use reqwest::Url;
use tokio::fs;
use tokio_util::sync::CancellationToken;
use crate::error::ProfileError;
use crate::profiles::{check_profile_name, CollectedProfiles};

/// Hostname and port of a host base url, as used in the dump directory name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostAddress {
    pub hostname: String,
    pub port: u16,
}

impl HostAddress {
    pub fn parse(base_url: &str) -> Result<Self, ProfileError>
    {
        let invalid = |reason: String| ProfileError::InvalidHost { host: base_url.to_string(), reason };

        // Url::parse silently strips tabs and newlines, reject them here.
        if base_url.chars().any(|c| c.is_control() || c.is_whitespace()) {
            return Err(invalid("contains whitespace or control characters".to_string()));
        }
        let url = Url::parse(base_url)
            .map_err(|e| invalid(e.to_string()))?;
        let hostname = url.host_str()
            .filter(|host| !host.is_empty())
            .ok_or_else(|| invalid("no hostname".to_string()))?;
        let port = url.port_or_known_default()
            .ok_or_else(|| invalid(format!("no port and no default port for scheme {}", url.scheme())))?;

        Ok(HostAddress { hostname: hostname.to_string(), port })
    }
    pub fn directory_name(&self) -> String
    {
        format!("{}:{}", self.hostname, self.port)
    }
}

/// The directory the profiles of `host` are written to at `timestamp`:
/// `{root_dir}/{hostname}:{port}/{YYYY MM DD}/{HH MM SS}`.
pub fn dump_folder(
    root_dir: &Path,
    host: &HostAddress,
    timestamp: DateTime<Local>,
) -> PathBuf
{
    root_dir
        .join(host.directory_name())
        .join(timestamp.format("%Y %m %d").to_string())
        .join(timestamp.format("%H %M %S").to_string())
}

/// Write every collected profile of `base_url` into a fresh timestamped directory under `root_dir`,
/// and return that directory.
///
/// A failed write stops the dump; files written before it stay on disk.
pub async fn dump(
    cancel: &CancellationToken,
    root_dir: &Path,
    base_url: &str,
    profiles: &CollectedProfiles,
) -> Result<PathBuf, ProfileError>
{
    let host = HostAddress::parse(base_url)?;
    if cancel.is_cancelled() {
        return Err(ProfileError::Cancelled);
    }

    for profile in profiles.names() {
        check_profile_name(profile)
            .map_err(|reason| ProfileError::InvalidProfile { request: profile.to_string(), reason: reason.to_string() })?;
    }

    let folder = dump_folder(root_dir, &host, Local::now());
    match fs::try_exists(&folder).await {
        Ok(true) => warn!("[{}] directory {} already exists, profiles in it will be overwritten", base_url, folder.display()),
        Ok(false) => {},
        Err(error) => debug!("[{}] cannot check if {} exists: {}", base_url, folder.display(), error),
    }
    fs::create_dir_all(&folder)
        .await
        .map_err(|source| ProfileError::CreateDirectory { path: folder.clone(), source })?;

    write_profiles(base_url, &folder, profiles).await?;
    Ok(folder)
}

/// Write every profile as a file directly under `folder`, in name order.
/// The first failed write stops writing the remaining profiles.
pub async fn write_profiles(
    base_url: &str,
    folder: &Path,
    profiles: &CollectedProfiles,
) -> Result<(), ProfileError>
{
    for profile in profiles.names() {
        let content = profiles.get(profile).unwrap_or_default();
        let file_path = folder.join(profile);
        fs::write(&file_path, content)
            .await
            .map_err(|source| ProfileError::WriteProfile { profile: profile.to_string(), path: file_path.clone(), source })?;
        info!("[{}] wrote {} to {}", base_url, profile, file_path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use crate::error::ErrorKind;

    #[test]
    fn parse_host_with_port() {
        let host = HostAddress::parse("http://localhost:8080").unwrap();
        assert_eq!(host, HostAddress { hostname: "localhost".to_string(), port: 8080 });
        assert_eq!(host.directory_name(), "localhost:8080");
    }
    #[test]
    fn parse_host_uses_scheme_default_port() {
        assert_eq!(HostAddress::parse("http://yb-1.local/").unwrap().port, 80);
        assert_eq!(HostAddress::parse("https://yb-1.local").unwrap().port, 443);
    }
    #[test]
    fn parse_host_rejects_malformed_addresses() {
        for base_url in ["http://localhost:8080\n", "localhost:8080", "not a url", "unix:/var/run/app.sock", ""] {
            let error = HostAddress::parse(base_url).unwrap_err();
            assert_eq!(error.kind(), ErrorKind::Validation, "{:?}", base_url);
        }
    }
    #[test]
    fn dump_folder_layout() {
        let host = HostAddress::parse("http://localhost:8080").unwrap();
        let timestamp = Local.with_ymd_and_hms(2023, 2, 3, 4, 5, 6).unwrap();
        let folder = dump_folder(Path::new("/tmp/profiles"), &host, timestamp);
        assert_eq!(folder, PathBuf::from("/tmp/profiles/localhost:8080/2023 02 03/04 05 06"));
    }
    #[tokio::test]
    async fn dump_writes_nothing_when_cancelled() {
        let root = tempfile::tempdir().unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let error = dump(&cancel, root.path(), "http://localhost:8080", &CollectedProfiles::new()).await.unwrap_err();
        assert!(error.is_cancelled());
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }
    #[tokio::test]
    async fn dump_refuses_names_outside_the_folder() {
        let root = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();
        let absolute = outside.path().join("escaped").to_string_lossy().to_string();
        for name in [absolute.as_str(), "../../../sneaky", "..", "a/b"] {
            let mut profiles = CollectedProfiles::new();
            profiles.insert("heap".to_string(), b"heap".to_vec());
            profiles.insert(name.to_string(), b"escaped".to_vec());
            let error = dump(&CancellationToken::new(), root.path(), "http://localhost:8080", &profiles).await.unwrap_err();
            assert_eq!(error.kind(), ErrorKind::Validation, "{:?}", name);
        }
        assert!(!outside.path().join("escaped").exists());
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }
    #[tokio::test]
    async fn write_profiles_stops_at_first_failed_write() {
        let folder = tempfile::tempdir().unwrap();
        // a directory where the heap profile should go makes that write fail
        std::fs::create_dir(folder.path().join("heap")).unwrap();
        let mut profiles = CollectedProfiles::new();
        profiles.insert("allocs".to_string(), b"allocs".to_vec());
        profiles.insert("heap".to_string(), b"heap".to_vec());
        profiles.insert("threadcreate".to_string(), b"threadcreate".to_vec());

        let error = write_profiles("http://localhost:8080", folder.path(), &profiles).await.unwrap_err();

        assert!(matches!(error, ProfileError::WriteProfile { ref profile, .. } if profile == "heap"), "{}", error);
        assert_eq!(error.kind(), ErrorKind::Io);
        assert_eq!(std::fs::read(folder.path().join("allocs")).unwrap(), b"allocs");
        assert!(!folder.path().join("threadcreate").exists());
    }
    #[tokio::test]
    async fn dump_without_profiles_creates_empty_folder() {
        let root = tempfile::tempdir().unwrap();
        let folder = dump(&CancellationToken::new(), root.path(), "http://localhost:8080", &CollectedProfiles::new()).await.unwrap();
        assert!(folder.is_dir());
        assert!(folder.starts_with(root.path().join("localhost:8080")));
        assert_eq!(std::fs::read_dir(&folder).unwrap().count(), 0);
    }
}
