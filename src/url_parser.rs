//! URL parser for extracting Ge.tt share names and file ids from links.

use regex::Regex;
use std::sync::LazyLock;

use crate::error::{GettError, Result};

/// `http(s)://ge.tt/<share>/v/<fileid>`, optionally with `www.` and a trailing path.
static FILE_URL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https?://(?:www\.)?ge\.tt/([a-zA-Z0-9_-]+)/v/([a-zA-Z0-9_-]+)")
        .expect("Invalid file URL regex")
});

/// `http(s)://ge.tt/<share>`.
static SHARE_URL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https?://(?:www\.)?ge\.tt/([a-zA-Z0-9_-]+)/?(?:[?#].*)?$")
        .expect("Invalid share URL regex")
});

/// Valid share name / file id pattern (alphanumeric, underscore, hyphen).
static NAME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9_-]+$").expect("Invalid name regex"));

/// A share, optionally narrowed down to one of its files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareRef {
    pub share_name: String,
    pub file_id: Option<String>,
}

/// Extract a share name (and file id, if present) from a Ge.tt link or a raw
/// share name.
///
/// Supports the following formats:
/// - `http://ge.tt/<share>`
/// - `http://ge.tt/<share>/v/<fileid>`
/// - Raw share name
///
/// # Examples
///
/// ```
/// use gett::url_parser::extract_share_ref;
///
/// let r = extract_share_ref("http://ge.tt/4Xy8abc/v/0").unwrap();
/// assert_eq!(r.share_name, "4Xy8abc");
/// assert_eq!(r.file_id.as_deref(), Some("0"));
///
/// let r = extract_share_ref("4Xy8abc").unwrap();
/// assert_eq!(r.file_id, None);
/// ```
pub fn extract_share_ref(url_or_name: &str) -> Result<ShareRef> {
    let trimmed = url_or_name.trim();

    if let Some(captures) = FILE_URL_REGEX.captures(trimmed) {
        if let (Some(share), Some(file)) = (captures.get(1), captures.get(2)) {
            return Ok(ShareRef {
                share_name: share.as_str().to_string(),
                file_id: Some(file.as_str().to_string()),
            });
        }
    }

    if let Some(captures) = SHARE_URL_REGEX.captures(trimmed) {
        if let Some(share) = captures.get(1) {
            return Ok(ShareRef {
                share_name: share.as_str().to_string(),
                file_id: None,
            });
        }
    }

    if NAME_REGEX.is_match(trimmed) {
        return Ok(ShareRef {
            share_name: trimmed.to_string(),
            file_id: None,
        });
    }

    Err(GettError::InvalidUrlOrId(url_or_name.to_string()))
}

/// Validate a raw file id.
pub fn validate_file_id(file_id: &str) -> Result<String> {
    let trimmed = file_id.trim();
    if NAME_REGEX.is_match(trimmed) {
        Ok(trimmed.to_string())
    } else {
        Err(GettError::InvalidUrlOrId(file_id.to_string()))
    }
}
