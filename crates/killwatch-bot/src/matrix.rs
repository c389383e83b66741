//! Minimal Matrix client-server API client.
//!
//! Only the two calls the bot needs: uploading media to the content
//! repository and sending a room message. Authentication is a pre-issued
//! access token sent as a bearer header.

use bytes::Bytes;
use serde::Deserialize;
use std::fmt;
use std::future::Future;
use std::time::Duration;
use url::Url;

use crate::format::Notification;
use crate::{Error, Result};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Event type of every message the bot sends.
pub const ROOM_MESSAGE: &str = "m.room.message";

/// Where notifications are delivered and media is hosted.
pub trait ChatBackend: Send + Sync + 'static {
    /// Upload a blob and return its `mxc://` content URI.
    fn upload_media(
        &self,
        data: Bytes,
        content_type: &str,
        filename: &str,
    ) -> impl Future<Output = Result<String>> + Send;

    /// Send a message event to a room and return the event id.
    fn send_message(
        &self,
        room_id: &str,
        message: &Notification,
    ) -> impl Future<Output = Result<String>> + Send;
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    content_uri: String,
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    event_id: String,
}

/// Standard Matrix error body.
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    errcode: String,
    #[serde(default)]
    error: String,
}

#[derive(Clone)]
pub struct MatrixClient {
    http: reqwest::Client,
    homeserver: Url,
    access_token: String,
}

impl fmt::Debug for MatrixClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MatrixClient")
            .field("homeserver", &self.homeserver.as_str())
            .field("access_token", &"<redacted>")
            .finish()
    }
}

impl MatrixClient {
    pub fn new(homeserver: &str, access_token: &str, user_agent: &str) -> Result<Self> {
        let homeserver = Url::parse(homeserver)?;
        if homeserver.cannot_be_a_base() {
            return Err(Error::Matrix(format!(
                "homeserver URL cannot have a path: {homeserver}"
            )));
        }

        let http = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            homeserver,
            access_token: access_token.to_string(),
        })
    }

    /// Homeserver URL with `segments` appended, each percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.homeserver.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// Decode a success body, or turn an error response into [`Error::Matrix`].
    async fn read<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json::<T>().await?);
        }

        let body = response.text().await.unwrap_or_default();
        let message = match serde_json::from_str::<ErrorResponse>(&body) {
            Ok(err) => format!("{status} {}: {}", err.errcode, err.error),
            Err(_) => format!("{status}: {body}"),
        };
        Err(Error::Matrix(message))
    }
}

impl ChatBackend for MatrixClient {
    async fn upload_media(&self, data: Bytes, content_type: &str, filename: &str) -> Result<String> {
        let mut url = self.endpoint(&["_matrix", "media", "v3", "upload"]);
        url.query_pairs_mut().append_pair("filename", filename);

        let response = self
            .http
            .post(url)
            .bearer_auth(&self.access_token)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(data)
            .send()
            .await?;

        let upload: UploadResponse = Self::read(response).await?;
        tracing::debug!(content_uri = %upload.content_uri, filename, "uploaded media");
        Ok(upload.content_uri)
    }

    async fn send_message(&self, room_id: &str, message: &Notification) -> Result<String> {
        let txn_id = uuid::Uuid::new_v4().to_string();
        let url = self.endpoint(&[
            "_matrix",
            "client",
            "v3",
            "rooms",
            room_id,
            "send",
            ROOM_MESSAGE,
            &txn_id,
        ]);

        let response = self
            .http
            .put(url)
            .bearer_auth(&self.access_token)
            .json(message)
            .send()
            .await?;

        let sent: SendResponse = Self::read(response).await?;
        Ok(sent.event_id)
    }
}
