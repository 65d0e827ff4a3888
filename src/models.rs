//! Data models for Ge.tt API responses.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Lifecycle tag the server reports on shares and files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadyState {
    Ready,
    Remote,
    Removed,
    Uploading,
    Uploaded,
}

impl ReadyState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReadyState::Ready => "ready",
            ReadyState::Remote => "remote",
            ReadyState::Removed => "removed",
            ReadyState::Uploading => "uploading",
            ReadyState::Uploaded => "uploaded",
        }
    }
}

impl FromStr for ReadyState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ready" => Ok(ReadyState::Ready),
            "remote" => Ok(ReadyState::Remote),
            "removed" => Ok(ReadyState::Removed),
            "uploading" => Ok(ReadyState::Uploading),
            "uploaded" => Ok(ReadyState::Uploaded),
            other => Err(format!("unknown ready state: {}", other)),
        }
    }
}

impl fmt::Display for ReadyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unknown states decode to `None` rather than failing the whole body.
fn deserialize_ready_state<'de, D>(deserializer: D) -> Result<Option<ReadyState>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt: Option<String> = Option::deserialize(deserializer)?;
    Ok(opt.and_then(|s| s.parse().ok()))
}

/// Storage quota of the authenticated account, in bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageInfo {
    #[serde(rename = "used", default)]
    pub used_space: u64,
    #[serde(rename = "limit", default)]
    pub limit_space: u64,
    #[serde(rename = "extra", default)]
    pub extra_space: u64,
}

impl StorageInfo {
    /// Bytes still available for uploads.
    pub fn remaining(&self) -> u64 {
        self.limit_space.saturating_sub(self.used_space)
    }
}

/// Account information returned by login and `/users/me`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    #[serde(rename = "userid")]
    pub user_id: String,
    #[serde(rename = "fullname", default)]
    pub full_name: String,
    #[serde(default)]
    pub email: String,
    pub storage: StorageInfo,
}

impl fmt::Display for UserInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} <{}> ({})\tused {} of {}",
            self.full_name,
            self.email,
            self.user_id,
            format_size(self.storage.used_space),
            format_size(self.storage.limit_space)
        )
    }
}

/// One-time upload endpoints issued when a file record is created.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadUrls {
    #[serde(default)]
    pub puturl: Option<String>,
    #[serde(default)]
    pub posturl: Option<String>,
}

/// A share: a named container of files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShareInfo {
    #[serde(rename = "sharename")]
    pub share_name: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(rename = "created", default, with = "chrono::serde::ts_seconds_option")]
    pub creation_date: Option<DateTime<Utc>>,
    #[serde(
        rename = "readystate",
        default,
        deserialize_with = "deserialize_ready_state"
    )]
    pub ready_state: Option<ReadyState>,
    #[serde(rename = "getturl", default)]
    pub url: Option<String>,
    #[serde(default)]
    pub files: Vec<FileInfo>,
}

impl ShareInfo {
    pub fn is_removed(&self) -> bool {
        self.ready_state == Some(ReadyState::Removed)
    }

    /// Look up a file of this share by id, ignoring ASCII case.
    pub fn find_file(&self, file_id: &str) -> Option<&FileInfo> {
        self.files
            .iter()
            .find(|f| f.file_id.eq_ignore_ascii_case(file_id))
    }
}

impl fmt::Display for ShareInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.ready_state.map(|s| s.as_str()).unwrap_or("-");
        let title = self.title.as_deref().unwrap_or("-");
        write!(
            f,
            "{}\t{}\t{} file(s)\t{}",
            self.share_name,
            state,
            self.files.len(),
            title
        )
    }
}

/// A file inside a share.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileInfo {
    #[serde(rename = "filename")]
    pub file_name: String,
    #[serde(rename = "fileid")]
    pub file_id: String,
    #[serde(rename = "sharename", default)]
    pub share_name: String,
    #[serde(rename = "getturl", default)]
    pub url: Option<String>,
    #[serde(default)]
    pub upload: Option<UploadUrls>,
    #[serde(rename = "downloads", default)]
    pub number_of_downloads: u64,
    #[serde(
        rename = "readystate",
        default,
        deserialize_with = "deserialize_ready_state"
    )]
    pub ready_state: Option<ReadyState>,
    #[serde(rename = "created", default, with = "chrono::serde::ts_seconds_option")]
    pub creation_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(skip)]
    share: Option<Box<ShareInfo>>,
}

impl FileInfo {
    /// URL the file bytes must be PUT to. Only present right after creation.
    pub fn upload_url(&self) -> Option<&str> {
        self.upload.as_ref().and_then(|u| u.puturl.as_deref())
    }

    /// The share this file was fetched from, if the client attached it.
    pub fn share(&self) -> Option<&ShareInfo> {
        self.share.as_deref()
    }

    /// Attach the owning share. The share's name always wins over whatever
    /// the file body reported, so the back-reference stays consistent.
    pub(crate) fn attach_share(&mut self, share: ShareInfo) {
        self.share_name = share.share_name.clone();
        self.share = Some(Box::new(share));
    }
}

impl fmt::Display for FileInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let size_str = self
            .size
            .map(format_size)
            .unwrap_or_else(|| "-".to_string());
        let state = self.ready_state.map(|s| s.as_str()).unwrap_or("-");
        write!(
            f,
            "{}\t{}\t{}\t{}\t{}",
            self.file_id, size_str, state, self.number_of_downloads, self.file_name
        )
    }
}

/// Format bytes into human-readable size.
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Response from the login endpoint, for both credentials and refresh token.
#[derive(Debug, Deserialize)]
pub struct AuthResponse {
    #[serde(rename = "accesstoken")]
    pub access_token: String,
    #[serde(rename = "refreshtoken")]
    pub refresh_token: String,
    /// Seconds until the access token expires.
    pub expires: u64,
    pub user: UserInfo,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(500), "500 B");
        assert_eq!(format_size(1024), "1.00 KB");
        assert_eq!(format_size(1536), "1.50 KB");
        assert_eq!(format_size(1048576), "1.00 MB");
        assert_eq!(format_size(1073741824), "1.00 GB");
    }

    #[test]
    fn test_ready_state_parse_ignores_case() {
        assert_eq!("READY".parse::<ReadyState>(), Ok(ReadyState::Ready));
        assert_eq!("Removed".parse::<ReadyState>(), Ok(ReadyState::Removed));
        assert!("gone".parse::<ReadyState>().is_err());
    }

    #[test]
    fn test_share_info_deserialize() {
        let json = r#"{
            "sharename": "4Xy8abc",
            "title": "Holiday",
            "created": 1325376000,
            "readystate": "active",
            "getturl": "http://ge.tt/4Xy8abc",
            "files": [
                {
                    "filename": "a.jpg",
                    "fileid": "0",
                    "sharename": "4Xy8abc",
                    "downloads": 3,
                    "readystate": "uploaded",
                    "created": 1325376010,
                    "size": 2048
                }
            ]
        }"#;

        let share: ShareInfo = serde_json::from_str(json).unwrap();
        assert_eq!(share.share_name, "4Xy8abc");
        assert_eq!(share.title.as_deref(), Some("Holiday"));
        assert_eq!(share.creation_date.unwrap().timestamp(), 1325376000);
        // "active" is not a state the client knows about.
        assert_eq!(share.ready_state, None);
        assert_eq!(share.files.len(), 1);
        assert_eq!(share.files[0].ready_state, Some(ReadyState::Uploaded));
        assert_eq!(share.files[0].number_of_downloads, 3);
        assert!(share.files[0].share().is_none());
    }

    #[test]
    fn test_file_info_upload_url() {
        let json = r#"{
            "filename": "b.txt",
            "fileid": "1",
            "sharename": "4Xy8abc",
            "readystate": "remote",
            "upload": {
                "puturl": "https://blobs.ge.tt/4Xy8abc/1?sig=x",
                "posturl": "https://blobs.ge.tt/4Xy8abc/1/post?sig=x"
            }
        }"#;

        let file: FileInfo = serde_json::from_str(json).unwrap();
        assert_eq!(file.upload_url(), Some("https://blobs.ge.tt/4Xy8abc/1?sig=x"));
        assert_eq!(file.ready_state, Some(ReadyState::Remote));
        assert!(file.creation_date.is_none());
    }

    #[test]
    fn test_attach_share_aligns_share_name() {
        let mut file: FileInfo =
            serde_json::from_str(r#"{"filename": "c.txt", "fileid": "2"}"#).unwrap();
        let share: ShareInfo = serde_json::from_str(r#"{"sharename": "abc"}"#).unwrap();

        file.attach_share(share);

        assert_eq!(file.share_name, "abc");
        assert_eq!(file.share().map(|s| s.share_name.as_str()), Some("abc"));
    }

    #[test]
    fn test_storage_remaining_saturates() {
        let storage = StorageInfo {
            used_space: 10,
            limit_space: 4,
            extra_space: 0,
        };
        assert_eq!(storage.remaining(), 0);
    }

    #[test]
    fn test_share_find_file_ignores_case() {
        let share: ShareInfo = serde_json::from_str(
            r#"{"sharename": "abc", "files": [{"filename": "x", "fileid": "AbC1"}]}"#,
        )
        .unwrap();
        assert!(share.find_file("abc1").is_some());
        assert!(share.find_file("zzz").is_none());
    }
}
