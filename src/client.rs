//! Ge.tt API client for share and file operations.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::StreamExt;
use reqwest::Url;
use serde_json::{json, Value};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, info, warn};

use crate::auth::{Clock, SessionManager, SessionState, SystemClock};
use crate::config::ClientConfig;
use crate::error::{GettError, Result};
use crate::models::{FileInfo, ReadyState, ShareInfo, UserInfo};
use crate::request::{guess_mime_type, Dispatcher};

const ME_PATH: &str = "/1/users/me";
const CREATE_SHARE_PATH: &str = "/1/shares/create";
const LIST_SHARES_PATH: &str = "/1/shares";
const DESTROY_SHARE_PATH: &str = "/1/shares/{sharename}/destroy";
const UPDATE_SHARE_PATH: &str = "/1/shares/{sharename}/update";
const CREATE_FILE_PATH: &str = "/1/files/{sharename}/create";
const FILE_PATH: &str = "/1/files/{sharename}/{fileid}";
const DESTROY_FILE_PATH: &str = "/1/files/{sharename}/{fileid}/destroy";
const FILE_BLOB_PATH: &str = "/1/files/{sharename}/{fileid}/blob";

/// Query parameter carrying the access token on authenticated requests.
const ACCESS_TOKEN_PARAM: &str = "accesstoken";

/// Substitute `{sharename}` and `{fileid}` placeholders verbatim.
fn expand_path(template: &str, share_name: &str, file_id: Option<&str>) -> String {
    let path = template.replace("{sharename}", share_name);
    match file_id {
        Some(id) => path.replace("{fileid}", id),
        None => path,
    }
}

/// Client for the Ge.tt REST API.
///
/// Every operation other than [`authenticate`](Self::authenticate) requires
/// a session and renews it transparently when it has expired. Operations
/// take `&mut self` because a renewal replaces the stored tokens.
#[derive(Debug)]
pub struct GettClient {
    base_url: String,
    dispatcher: Dispatcher,
    session: SessionManager,
}

impl GettClient {
    /// Create a client against the public Ge.tt endpoint.
    pub fn new() -> Result<Self> {
        Self::with_config(ClientConfig::default())
    }

    pub fn with_config(config: ClientConfig) -> Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a client whose session expiry is measured against `clock`.
    pub fn with_clock(config: ClientConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        let dispatcher = Dispatcher::new(&config)?;
        let session = SessionManager::new(
            dispatcher.clone(),
            &config.base_url,
            clock,
            config.refresh_margin,
        );
        Ok(Self {
            base_url: config.base_url,
            dispatcher,
            session,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn session_state(&self) -> SessionState {
        self.session.state()
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_authenticated()
    }

    pub fn is_expired(&self) -> bool {
        self.session.is_expired()
    }

    /// Log in with the account's API key, email and password.
    pub async fn authenticate(
        &mut self,
        api_key: &str,
        email: &str,
        password: &str,
    ) -> Result<UserInfo> {
        self.session.authenticate(api_key, email, password).await
    }

    /// See [`SessionManager::ensure_usable`].
    pub async fn ensure_usable(&mut self) -> bool {
        self.session.ensure_usable().await
    }

    /// Make sure the session is usable and return the access token to send.
    async fn check_preconditions(&mut self) -> Result<String> {
        if !self.session.ensure_usable().await {
            return Err(GettError::NotAuthenticated(
                "unable to perform the request, check that the user is authenticated".to_string(),
            ));
        }
        self.session
            .access_token()
            .map(str::to_string)
            .ok_or_else(|| GettError::NotAuthenticated("no access token".to_string()))
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Share lookup URL; the name is percent-encoded as a path segment.
    fn share_url(&self, share_name: &str) -> Result<Url> {
        let mut url = Url::parse(&self.url(LIST_SHARES_PATH))
            .map_err(|e| GettError::InvalidUrlOrId(format!("{}: {}", self.base_url, e)))?;
        url.path_segments_mut()
            .map_err(|_| GettError::InvalidUrlOrId(self.base_url.clone()))?
            .push(share_name);
        Ok(url)
    }

    // ---------------------------------------------------------------------
    // Users
    // ---------------------------------------------------------------------

    /// Fetch the authenticated account, including its storage quota.
    pub async fn get_user_information(&mut self) -> Result<UserInfo> {
        let token = self.check_preconditions().await?;
        self.fetch_user(&token).await
    }

    async fn fetch_user(&self, token: &str) -> Result<UserInfo> {
        let body = self
            .dispatcher
            .get(&self.url(ME_PATH), &[(ACCESS_TOKEN_PARAM, token)])
            .await?
            .ok_or_else(|| {
                GettError::Transport("unable to retrieve user information".to_string())
            })?;
        Ok(serde_json::from_str(&body)?)
    }

    // ---------------------------------------------------------------------
    // Shares
    // ---------------------------------------------------------------------

    /// Create a new share, optionally titled.
    pub async fn create_share(&mut self, title: Option<&str>) -> Result<ShareInfo> {
        let token = self.check_preconditions().await?;
        self.post_create_share(&token, title).await
    }

    async fn post_create_share(&self, token: &str, title: Option<&str>) -> Result<ShareInfo> {
        let body = title.map(|t| json!({ "title": t }));
        let response = self
            .dispatcher
            .post(
                &self.url(CREATE_SHARE_PATH),
                body.as_ref(),
                &[(ACCESS_TOKEN_PARAM, token)],
            )
            .await?
            .ok_or_else(|| GettError::Transport("unable to create a new share".to_string()))?;
        let share: ShareInfo = serde_json::from_str(&response)?;
        info!(share = %share.share_name, "share created");
        Ok(share)
    }

    /// Fetch a share by name.
    pub async fn get_share(&mut self, share_name: &str) -> Result<ShareInfo> {
        let token = self.check_preconditions().await?;
        self.fetch_share(&token, share_name).await
    }

    async fn fetch_share(&self, token: &str, share_name: &str) -> Result<ShareInfo> {
        let url = self.share_url(share_name)?;
        let body = self
            .dispatcher
            .get(url.as_str(), &[(ACCESS_TOKEN_PARAM, token)])
            .await?
            .ok_or_else(|| GettError::ShareNotFound(share_name.to_string()))?;
        Ok(serde_json::from_str(&body)?)
    }

    /// List every share of the authenticated account.
    pub async fn get_shares(&mut self) -> Result<Vec<ShareInfo>> {
        let token = self.check_preconditions().await?;
        let body = self
            .dispatcher
            .get(&self.url(LIST_SHARES_PATH), &[(ACCESS_TOKEN_PARAM, token.as_str())])
            .await?
            .ok_or_else(|| GettError::Transport("unable to retrieve the share list".to_string()))?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Change the title of a share (`None` clears it) and return the share
    /// as the server reports it afterwards.
    pub async fn update_share(
        &mut self,
        share: &ShareInfo,
        new_title: Option<&str>,
    ) -> Result<ShareInfo> {
        let token = self.check_preconditions().await?;
        let name = share.share_name.as_str();
        self.fetch_share(&token, name).await?;

        let url = self.url(&expand_path(UPDATE_SHARE_PATH, name, None));
        let body = json!({ "title": new_title });
        self.dispatcher
            .post(&url, Some(&body), &[(ACCESS_TOKEN_PARAM, token.as_str())])
            .await?
            .ok_or_else(|| {
                GettError::Transport(format!("unable to update share {}", name))
            })?;

        self.fetch_share(&token, name).await
    }

    /// Destroy a share. The server keeps removed shares retrievable, so
    /// destroying the same share twice succeeds both times.
    pub async fn destroy_share(&mut self, share: &ShareInfo) -> Result<()> {
        let token = self.check_preconditions().await?;
        let name = share.share_name.as_str();
        self.fetch_share(&token, name).await?;

        let url = self.url(&expand_path(DESTROY_SHARE_PATH, name, None));
        self.dispatcher
            .post(&url, None::<&Value>, &[(ACCESS_TOKEN_PARAM, token.as_str())])
            .await?
            .ok_or_else(|| {
                GettError::Transport(format!("unable to destroy share {}", name))
            })?;
        info!(share = name, "share destroyed");
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Files
    // ---------------------------------------------------------------------

    /// Fetch a file of `share` by id, with the freshly fetched share attached.
    pub async fn get_file(&mut self, share: &ShareInfo, file_id: &str) -> Result<FileInfo> {
        let token = self.check_preconditions().await?;
        self.fetch_file(&token, &share.share_name, file_id).await
    }

    async fn fetch_file(&self, token: &str, share_name: &str, file_id: &str) -> Result<FileInfo> {
        let share = self.fetch_share(token, share_name).await?;
        if share.find_file(file_id).is_none() {
            error!(file_id, share = share_name, "file is not part of the share");
            return Err(GettError::FileNotFound(format!(
                "no file with id {} in share {}",
                file_id, share_name
            )));
        }

        let url = self.url(&expand_path(FILE_PATH, &share.share_name, Some(file_id)));
        let body = self
            .dispatcher
            .get(&url, &[(ACCESS_TOKEN_PARAM, token)])
            .await?
            .ok_or_else(|| {
                GettError::FileNotFound(format!(
                    "no file with id {} in share {}",
                    file_id, share_name
                ))
            })?;

        let mut file: FileInfo = serde_json::from_str(&body)?;
        file.attach_share(share);
        Ok(file)
    }

    /// Destroy a file. A vanished share is reported as a missing file.
    pub async fn destroy_file(&mut self, file: &FileInfo) -> Result<()> {
        let token = self.check_preconditions().await?;
        let share_name = file
            .share()
            .map(|s| s.share_name.as_str())
            .unwrap_or(file.share_name.as_str());

        match self.fetch_file(&token, share_name, &file.file_id).await {
            Ok(_) => {}
            Err(GettError::ShareNotFound(name)) => {
                error!(share = %name, file_id = %file.file_id, "share of the file was not found");
                return Err(GettError::FileNotFound(format!(
                    "share {} of file {} was not found",
                    name, file.file_id
                )));
            }
            Err(e) => return Err(e),
        }

        let url = self.url(&expand_path(DESTROY_FILE_PATH, share_name, Some(&file.file_id)));
        self.dispatcher
            .post(&url, None::<&Value>, &[(ACCESS_TOKEN_PARAM, token.as_str())])
            .await?
            .ok_or_else(|| {
                GettError::Transport(format!(
                    "unable to destroy file {} of share {}",
                    file.file_id, share_name
                ))
            })?;
        info!(share = share_name, file_id = %file.file_id, "file destroyed");
        Ok(())
    }

    /// Upload a local file.
    ///
    /// # Arguments
    /// * `local_path` - Path to the local file
    /// * `share` - Destination share; a new untitled share is created if `None`
    /// * `remote_name` - Name on Ge.tt; defaults to the local file name
    pub async fn upload_file<P: AsRef<Path>>(
        &mut self,
        local_path: P,
        share: Option<&ShareInfo>,
        remote_name: Option<&str>,
    ) -> Result<FileInfo> {
        let local_path = local_path.as_ref();
        let token = self.check_preconditions().await?;

        let local_name = local_path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| GettError::FileNotFound(local_path.display().to_string()))?;
        let file_size = tokio::fs::metadata(local_path).await?.len();

        let me = self.fetch_user(&token).await?;
        let available = me.storage.remaining();
        if available < file_size {
            error!(file = local_name, file_size, available, "not enough space left");
            return Err(GettError::QuotaExceeded {
                file: local_name.to_string(),
                needed: file_size,
                available,
            });
        }

        let share = match share {
            Some(s) => s.clone(),
            None => self.post_create_share(&token, None).await?,
        };
        if share.is_removed() {
            return Err(GettError::ShareRemoved(share.share_name));
        }
        let remote_name = remote_name.unwrap_or(local_name);
        let mime_type = guess_mime_type(local_name);

        let url = self.url(&expand_path(CREATE_FILE_PATH, &share.share_name, None));
        let body = json!({ "filename": remote_name });
        let response = self
            .dispatcher
            .post(&url, Some(&body), &[(ACCESS_TOKEN_PARAM, token.as_str())])
            .await?
            .ok_or_else(|| {
                GettError::Transport(format!(
                    "unable to create file {} in share {}",
                    remote_name, share.share_name
                ))
            })?;
        let mut file: FileInfo = serde_json::from_str(&response)?;

        let upload_url = file
            .upload_url()
            .ok_or_else(|| {
                GettError::Transport(format!("no upload URL issued for file {}", file.file_id))
            })?
            .to_string();

        let bytes = tokio::fs::read(local_path).await?;
        self.dispatcher.put_upload(bytes, &upload_url, &mime_type).await?;
        file.ready_state = Some(ReadyState::Uploaded);

        let refreshed = self.fetch_share(&token, &share.share_name).await?;
        file.attach_share(refreshed);
        info!(share = %file.share_name, file_id = %file.file_id, "file uploaded");
        Ok(file)
    }

    /// Download the contents of a file.
    ///
    /// If `destination` is a directory the file is stored under its remote
    /// name inside it. Returns the path written to.
    pub async fn download_file<P: AsRef<Path>>(
        &mut self,
        file: &FileInfo,
        destination: P,
    ) -> Result<PathBuf> {
        let token = self.check_preconditions().await?;
        let destination = destination.as_ref();

        let is_dir = tokio::fs::metadata(destination)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false);
        let final_path = if is_dir {
            destination.join(&file.file_name)
        } else {
            destination.to_path_buf()
        };

        let url = self.url(&expand_path(FILE_BLOB_PATH, &file.share_name, Some(&file.file_id)));
        let response = self
            .dispatcher
            .get_response(&url, &[(ACCESS_TOKEN_PARAM, token.as_str())])
            .await?
            .ok_or_else(|| {
                GettError::FileNotFound(format!(
                    "no content for file {} in share {}",
                    file.file_id, file.share_name
                ))
            })?;

        let mut out = File::create(&final_path).await?;
        let written = match write_stream(&mut out, response).await {
            Ok(written) => written,
            Err(e) => {
                drop(out);
                // A partial download must not be mistaken for the file.
                if let Err(remove_err) = tokio::fs::remove_file(&final_path).await {
                    warn!(path = %final_path.display(), error = %remove_err, "failed to remove partial download");
                }
                return Err(e);
            }
        };
        debug!(path = %final_path.display(), written, "download complete");
        if file.size.is_some_and(|size| size != written) {
            warn!(expected = file.size, written, "downloaded size differs from reported size");
        }

        Ok(final_path)
    }
}

/// Copy a response body into `out`, returning the number of bytes written.
async fn write_stream(out: &mut File, response: reqwest::Response) -> Result<u64> {
    let mut stream = response.bytes_stream();
    let mut written: u64 = 0;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        written += chunk.len() as u64;
        out.write_all(&chunk).await?;
    }

    out.flush().await?;
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_path() {
        assert_eq!(
            expand_path(DESTROY_SHARE_PATH, "abc", None),
            "/1/shares/abc/destroy"
        );
        assert_eq!(
            expand_path(DESTROY_FILE_PATH, "abc", Some("3")),
            "/1/files/abc/3/destroy"
        );
    }

    #[test]
    fn test_share_url_percent_encodes_name() {
        let client =
            GettClient::with_config(ClientConfig::default().base_url("http://localhost:1234"))
                .unwrap();
        let url = client.share_url("a b/c").unwrap();
        assert_eq!(url.as_str(), "http://localhost:1234/1/shares/a%20b%2Fc");
    }

    #[test]
    fn test_new_client_is_unauthenticated() {
        let client = GettClient::new().unwrap();
        assert_eq!(client.session_state(), SessionState::Unauthenticated);
        assert_eq!(client.base_url(), "https://open.ge.tt");
    }
}
