//! Low-level request dispatch.
//!
//! GET and POST return `Ok(None)` for any status other than 200 OK; the
//! caller decides whether absence means "not found" or a transport failure.
//! Only network-level errors are returned as `Err`.

use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::error::{GettError, Result};

/// Fallback content type when the MIME type cannot be guessed.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Thin wrapper around a single long-lived `reqwest::Client`.
#[derive(Clone, Debug)]
pub struct Dispatcher {
    http: Client,
}

impl Dispatcher {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.as_str())
            .build()?;
        Ok(Self { http })
    }

    /// GET `url` with `query` appended.
    pub async fn get(&self, url: &str, query: &[(&str, &str)]) -> Result<Option<String>> {
        debug!(method = "GET", url, "dispatching request");
        let response = self.http.get(url).query(query).send().await?;
        read_body(response, "GET", url).await
    }

    /// GET `url` and hand back the raw response for streaming, or `None`
    /// when the server does not answer 200 OK.
    pub async fn get_response(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<Option<reqwest::Response>> {
        debug!(method = "GET", url, "dispatching streaming request");
        let response = self.http.get(url).query(query).send().await?;
        let status = response.status();
        if status != StatusCode::OK {
            warn!(method = "GET", url, status = status.as_u16(), "server did not return 200 OK");
            return Ok(None);
        }
        Ok(Some(response))
    }

    /// POST a JSON body to `url`. `None` sends an empty body.
    pub async fn post<B: Serialize + ?Sized>(
        &self,
        url: &str,
        body: Option<&B>,
        query: &[(&str, &str)],
    ) -> Result<Option<String>> {
        debug!(method = "POST", url, "dispatching request");
        let payload = match body {
            Some(b) => serde_json::to_string(b)?,
            None => String::new(),
        };
        let response = self
            .http
            .post(url)
            .query(query)
            .header(CONTENT_TYPE, "application/json; charset=utf-8")
            .body(payload)
            .send()
            .await?;
        read_body(response, "POST", url).await
    }

    /// PUT raw file bytes to a one-time upload URL.
    pub async fn put_upload(&self, bytes: Vec<u8>, url: &str, mime_type: &str) -> Result<()> {
        debug!(method = "PUT", url, mime_type, size = bytes.len(), "uploading bytes");
        let response = self
            .http
            .put(url)
            .header(CONTENT_TYPE, mime_type)
            .body(bytes)
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            warn!(url, status = status.as_u16(), "upload rejected");
            return Err(GettError::Transport(format!(
                "upload to {} returned status {}: {}",
                url, status, body
            )));
        }
        Ok(())
    }
}

async fn read_body(
    response: reqwest::Response,
    method: &str,
    url: &str,
) -> Result<Option<String>> {
    let status = response.status();
    if status != StatusCode::OK {
        warn!(method, url, status = status.as_u16(), "server did not return 200 OK");
        return Ok(None);
    }
    let body = response.text().await?;
    debug!(method, url, len = body.len(), "received response body");
    Ok(Some(body))
}

/// Best-effort MIME type for a file name.
pub fn guess_mime_type(name: &str) -> String {
    match mime_guess::from_path(name).first() {
        Some(mime) => mime.to_string(),
        None => {
            debug!(name, "no MIME type known, using octet-stream");
            OCTET_STREAM.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guess_mime_type() {
        assert_eq!(guess_mime_type("photo.png"), "image/png");
        assert_eq!(guess_mime_type("notes.txt"), "text/plain");
        assert_eq!(guess_mime_type("mystery.zzzunknown"), OCTET_STREAM);
        assert_eq!(guess_mime_type("no_extension"), OCTET_STREAM);
    }
}
