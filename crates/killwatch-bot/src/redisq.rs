//! zKillboard RedisQ long-poll client.
//!
//! RedisQ holds each request open for up to ten seconds and answers with
//! `{"package": {...}}` for the next killmail on the queue or
//! `{"package": null}` when nothing arrived. The queue is identified by the
//! `queueID` parameter; reusing an id resumes where the last poll stopped.

use killwatch_core::{FeedPackage, FeedResponse};
use std::error::Error as StdError;
use std::fmt;
use std::future::Future;
use std::io;
use std::time::Duration;

use crate::Error;

/// Client-side timeout; must exceed the server hold time.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// How a failed poll should be handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollErrorKind {
    /// Retry after a backoff delay.
    Transient,
    /// Stop polling and let the supervisor restart the process.
    Fatal,
}

impl PollErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Transient => "transient",
            Self::Fatal => "fatal",
        }
    }
}

impl fmt::Display for PollErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed poll, classified when it happened.
#[derive(Debug, thiserror::Error)]
#[error("{kind} poll failure: {source}")]
pub struct PollError {
    pub kind: PollErrorKind,
    #[source]
    pub source: Error,
    /// The feed answered with a success status before the failure, so the
    /// poll cycle itself completed.
    pub responded: bool,
}

impl PollError {
    /// Classify an error from the feed client.
    ///
    /// A 502 from the feed and an abruptly closed connection are fatal;
    /// everything else (other statuses, timeouts, malformed bodies) is
    /// transient.
    pub fn classify(source: Error) -> Self {
        let fatal = match &source {
            Error::Status { status, .. } => *status == reqwest::StatusCode::BAD_GATEWAY,
            Error::Http(e) => is_connection_dropped(e),
            _ => false,
        };
        let kind = if fatal {
            PollErrorKind::Fatal
        } else {
            PollErrorKind::Transient
        };
        Self {
            kind,
            source,
            responded: false,
        }
    }

    pub fn transient(source: Error) -> Self {
        Self {
            kind: PollErrorKind::Transient,
            source,
            responded: false,
        }
    }

    pub fn fatal(source: Error) -> Self {
        Self {
            kind: PollErrorKind::Fatal,
            source,
            responded: false,
        }
    }

    /// Mark the failure as happening after a success response arrived.
    pub fn after_response(mut self) -> Self {
        self.responded = true;
        self
    }

    pub fn is_fatal(&self) -> bool {
        self.kind == PollErrorKind::Fatal
    }
}

/// Whether an error chain shows the feed dropped the connection.
///
/// Covers a reset or half-closed socket and hyper's incomplete message (the
/// server hung up before sending a complete response).
fn is_connection_dropped(err: &(dyn StdError + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(err) = current {
        if err
            .downcast_ref::<hyper::Error>()
            .is_some_and(hyper::Error::is_incomplete_message)
        {
            return true;
        }
        if let Some(io_err) = err.downcast_ref::<io::Error>()
            && matches!(
                io_err.kind(),
                io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::BrokenPipe
                    | io::ErrorKind::UnexpectedEof
            )
        {
            return true;
        }
        current = err.source();
    }
    false
}

/// Source of killmail packages.
pub trait FeedSource: Send + Sync + 'static {
    /// Wait for the next package. `Ok(None)` means the poll completed empty.
    fn listen(&self) -> impl Future<Output = Result<Option<FeedPackage>, PollError>> + Send;
}

#[derive(Debug, Clone)]
pub struct RedisqClient {
    http: reqwest::Client,
    url: String,
    queue_id: String,
}

impl RedisqClient {
    pub fn new(url: &str, queue_id: &str, user_agent: &str) -> crate::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            url: url.to_string(),
            queue_id: queue_id.to_string(),
        })
    }

    pub fn queue_id(&self) -> &str {
        &self.queue_id
    }

    async fn request(&self) -> crate::Result<reqwest::Response> {
        let response = self
            .http
            .get(&self.url)
            .query(&[("queueID", &self.queue_id)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Status {
                status,
                url: self.url.clone(),
            });
        }
        Ok(response)
    }
}

impl FeedSource for RedisqClient {
    async fn listen(&self) -> Result<Option<FeedPackage>, PollError> {
        let response = self.request().await.map_err(PollError::classify)?;

        let body = response
            .text()
            .await
            .map_err(|e| PollError::classify(e.into()).after_response())?;

        FeedResponse::from_json(&body)
            .map(|response| response.package)
            .map_err(|e| PollError::classify(e.into()).after_response())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_error(status: reqwest::StatusCode) -> Error {
        Error::Status {
            status,
            url: "https://redisq.zkillboard.com/listen.php".to_string(),
        }
    }

    #[test]
    fn test_bad_gateway_is_fatal() {
        let err = PollError::classify(status_error(reqwest::StatusCode::BAD_GATEWAY));
        assert!(err.is_fatal());
        assert!(err.to_string().starts_with("fatal poll failure"));
    }

    #[test]
    fn test_other_statuses_are_transient() {
        for status in [
            reqwest::StatusCode::TOO_MANY_REQUESTS,
            reqwest::StatusCode::INTERNAL_SERVER_ERROR,
            reqwest::StatusCode::SERVICE_UNAVAILABLE,
            reqwest::StatusCode::GATEWAY_TIMEOUT,
        ] {
            let err = PollError::classify(status_error(status));
            assert_eq!(err.kind, PollErrorKind::Transient, "{status}");
        }
    }

    #[test]
    fn test_bad_body_is_transient() {
        let json_err = FeedResponse::from_json("<html>").unwrap_err();
        let err = PollError::classify(json_err.into());
        assert_eq!(err.kind, PollErrorKind::Transient);
        assert!(!err.responded);
    }

    #[derive(Debug, thiserror::Error)]
    #[error("request failed")]
    struct Wrapper(#[source] io::Error);

    #[test]
    fn test_dropped_connection_detected_in_chain() {
        let reset = Wrapper(io::Error::new(io::ErrorKind::ConnectionReset, "reset"));
        assert!(is_connection_dropped(&reset));

        let eof = Wrapper(io::Error::new(io::ErrorKind::UnexpectedEof, "eof"));
        assert!(is_connection_dropped(&eof));

        let timeout = Wrapper(io::Error::new(io::ErrorKind::TimedOut, "timeout"));
        assert!(!is_connection_dropped(&timeout));
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(PollErrorKind::Transient.to_string(), "transient");
        assert_eq!(PollErrorKind::Fatal.to_string(), "fatal");
    }

    /// Serve every connection on a local port with `respond`, which gets the
    /// accepted socket after the request has been read.
    async fn feed_server<F, Fut>(respond: F) -> String
    where
        F: Fn(tokio::net::TcpStream) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        use tokio::io::AsyncReadExt;

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let mut buf = [0u8; 4096];
                let _ = socket.read(&mut buf).await;
                respond(socket).await;
            }
        });
        format!("http://{addr}/listen.php")
    }

    async fn reply(mut socket: tokio::net::TcpStream, status: &str, body: &str) {
        use tokio::io::AsyncWriteExt;

        let response = format!(
            "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
        );
        let _ = socket.write_all(response.as_bytes()).await;
        let _ = socket.shutdown().await;
    }

    fn client(url: &str) -> RedisqClient {
        RedisqClient::new(url, "test-queue", "killwatch/0.1 (ops@example.com)").unwrap()
    }

    #[tokio::test]
    async fn test_hang_up_before_response_is_fatal() {
        let url = feed_server(|socket| async move { drop(socket) }).await;

        let err = client(&url).listen().await.unwrap_err();

        assert_eq!(err.kind, PollErrorKind::Fatal, "{err:?}");
        assert!(!err.responded);
    }

    #[tokio::test]
    async fn test_bad_gateway_response_is_fatal() {
        let url = feed_server(|socket| reply(socket, "502 Bad Gateway", "")).await;

        let err = client(&url).listen().await.unwrap_err();

        assert_eq!(err.kind, PollErrorKind::Fatal);
        assert!(!err.responded);
    }

    #[tokio::test]
    async fn test_empty_package() {
        let url = feed_server(|socket| reply(socket, "200 OK", r#"{"package":null}"#)).await;

        let package = client(&url).listen().await.unwrap();

        assert!(package.is_none());
    }

    #[tokio::test]
    async fn test_malformed_package_counts_as_response() {
        let url = feed_server(|socket| reply(socket, "200 OK", r#"{"package":{"killID":1}}"#)).await;

        let err = client(&url).listen().await.unwrap_err();

        assert_eq!(err.kind, PollErrorKind::Transient);
        assert!(err.responded);
    }
}
