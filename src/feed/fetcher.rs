use std::time::Duration;

use futures::StreamExt;

use crate::feed::types::FetchError;

/// Identifying user-agent sent with every request.
pub const USER_AGENT: &str = concat!("brief/", env!("CARGO_PKG_VERSION"));

/// Response bodies past this size are abandoned.
const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Builds the HTTP client shared by all fetches in a cycle.
pub fn build_client() -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder().user_agent(USER_AGENT).build()
}

/// Performs exactly one GET against `url`, bounded by `timeout`.
///
/// The timeout covers the whole exchange, body included. Transport-level
/// faults (connection, DNS, TLS, timeout) all collapse into
/// [`FetchError::Network`]; a response with status other than 200 is
/// reported as [`FetchError::HttpStatus`] so callers can surface the code.
/// No retries, no caching, no redirect handling beyond what the transport
/// performs transparently.
pub async fn fetch_bytes(
    client: &reqwest::Client,
    url: &str,
    timeout: Duration,
) -> Result<Vec<u8>, FetchError> {
    tokio::time::timeout(timeout, request(client, url))
        .await
        .map_err(|_| FetchError::Network("request timed out".to_string()))?
}

async fn request(client: &reqwest::Client, url: &str) -> Result<Vec<u8>, FetchError> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| FetchError::Network(e.to_string()))?;

    let status = response.status().as_u16();
    if status != 200 {
        return Err(FetchError::HttpStatus(status));
    }

    read_limited(response, MAX_BODY_BYTES).await
}

async fn read_limited(response: reqwest::Response, limit: usize) -> Result<Vec<u8>, FetchError> {
    // Fast path: trust Content-Length when the server sends one.
    if let Some(len) = response.content_length() {
        if len as usize > limit {
            return Err(oversize(limit));
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| FetchError::Network(e.to_string()))?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(oversize(limit));
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok(bytes)
}

fn oversize(limit: usize) -> FetchError {
    FetchError::Network(format!("response body exceeds {limit} bytes"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const BODY: &str = "<rss version=\"2.0\"><channel></channel></rss>";

    #[tokio::test]
    async fn fetch_returns_body_on_200() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(BODY))
            .mount(&server)
            .await;

        let client = build_client().unwrap();
        let bytes = fetch_bytes(&client, &server.uri(), Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(bytes, BODY.as_bytes());
    }

    #[tokio::test]
    async fn fetch_sends_identifying_user_agent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header("user-agent", USER_AGENT))
            .respond_with(ResponseTemplate::new(200).set_body_string(BODY))
            .expect(1)
            .mount(&server)
            .await;

        let client = build_client().unwrap();
        fetch_bytes(&client, &server.uri(), Duration::from_secs(5))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn non_200_status_is_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = build_client().unwrap();
        let err = fetch_bytes(&client, &server.uri(), Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::HttpStatus(404)));
    }

    #[tokio::test]
    async fn server_error_is_reported_without_retry() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1) // exactly one attempt, no backoff
            .mount(&server)
            .await;

        let client = build_client().unwrap();
        let err = fetch_bytes(&client, &server.uri(), Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::HttpStatus(500)));
    }

    #[tokio::test]
    async fn slow_response_times_out_as_network_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(BODY)
                    .set_delay(Duration::from_secs(10)),
            )
            .mount(&server)
            .await;

        let client = build_client().unwrap();
        let err = fetch_bytes(&client, &server.uri(), Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Network(_)));
    }

    #[tokio::test]
    async fn connection_refused_is_network_error() {
        let client = build_client().unwrap();
        // Nothing listens on this port.
        let err = fetch_bytes(&client, "http://127.0.0.1:1/feed", Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Network(_)));
    }
}
