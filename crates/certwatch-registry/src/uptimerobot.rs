use crate::error::{RegistryError, Result};
use crate::{RegistryPage, RegistrySource};
use certwatch_common::types::MonitorDefinition;
use reqwest::Client;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::time::Duration;

pub const DEFAULT_ENDPOINT: &str = "https://api.uptimerobot.com";

/// Error id UptimeRobot returns when the requested range holds no monitors.
const NO_MONITORS_ERROR_ID: &str = "212";

/// Client for the UptimeRobot `getMonitors` listing.
pub struct UptimeRobotRegistry {
    endpoint: String,
    api_key: String,
    client: Client,
}

impl UptimeRobotRegistry {
    pub fn new(endpoint: &str, api_key: &str, timeout_secs: u64) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(RegistryError::Config("registry api_key is empty".to_string()));
        }
        let client = Client::builder()
            .use_rustls_tls()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;

        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            client,
        })
    }
}

#[async_trait::async_trait]
impl RegistrySource for UptimeRobotRegistry {
    fn name(&self) -> &str {
        "uptimerobot"
    }

    async fn fetch_page(&self, offset: usize, limit: usize) -> Result<RegistryPage> {
        let url = format!("{}/getMonitors", self.endpoint);
        let offset = offset.to_string();
        let limit = limit.to_string();
        let response = self
            .client
            .get(&url)
            .query(&[
                ("apiKey", self.api_key.as_str()),
                ("format", "json"),
                ("noJsonCallback", "1"),
                ("offset", offset.as_str()),
                ("limit", limit.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(RegistryError::Http {
                status: status.as_u16(),
                body,
            });
        }

        parse_page(&body)
    }
}

#[derive(Deserialize)]
struct ListingResponse {
    stat: String,
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    monitors: Option<MonitorList>,
}

#[derive(Deserialize)]
struct MonitorList {
    #[serde(default)]
    monitor: Vec<Value>,
}

#[derive(Deserialize)]
struct RawMonitor {
    #[serde(deserialize_with = "deserialize_id")]
    id: String,
    friendlyname: String,
    url: String,
}

fn deserialize_id<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum IdInput {
        Text(String),
        Number(u64),
    }

    match IdInput::deserialize(deserializer)? {
        IdInput::Text(id) => Ok(id),
        IdInput::Number(id) => Ok(id.to_string()),
    }
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Decodes one `getMonitors` response body.
///
/// Entries that do not carry `id`, `friendlyname` and `url` are logged and
/// dropped; they still count toward [`RegistryPage::fetched`].
pub fn parse_page(body: &str) -> Result<RegistryPage> {
    let listing: ListingResponse = serde_json::from_str(body)?;

    if listing.stat != "ok" {
        let id = listing.id.as_ref().map(value_to_string).unwrap_or_default();
        if id == NO_MONITORS_ERROR_ID {
            return Ok(RegistryPage::default());
        }
        return Err(RegistryError::Api {
            id,
            message: listing.message.unwrap_or_else(|| "unknown error".to_string()),
        });
    }

    let entries = listing.monitors.map(|m| m.monitor).unwrap_or_default();
    let fetched = entries.len();
    let mut monitors = Vec::with_capacity(fetched);

    for entry in entries {
        match serde_json::from_value::<RawMonitor>(entry) {
            Ok(raw) => monitors.push(MonitorDefinition {
                id: raw.id,
                friendly_name: raw.friendlyname,
                url: raw.url,
            }),
            Err(e) => {
                tracing::warn!(error = %e, "Skipping malformed registry monitor entry");
            }
        }
    }

    Ok(RegistryPage { monitors, fetched })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_decode_monitor_entries() {
        let body = r#"{
            "stat": "ok",
            "offset": "0",
            "limit": "50",
            "total": "2",
            "monitors": {"monitor": [
                {"id": "776", "friendlyname": "Google", "url": "http://www.google.com", "type": "1"},
                {"id": 777, "friendlyname": "Shop", "url": "https://shop.example.com"}
            ]}
        }"#;

        let page = parse_page(body).unwrap();
        assert_eq!(page.fetched, 2);
        assert_eq!(page.monitors.len(), 2);
        assert_eq!(page.monitors[0].id, "776");
        assert_eq!(page.monitors[0].friendly_name, "Google");
        assert_eq!(page.monitors[1].id, "777");
    }

    #[test]
    fn should_skip_malformed_entries_but_count_them() {
        let body = r#"{
            "stat": "ok",
            "monitors": {"monitor": [
                {"id": "1", "friendlyname": "ok", "url": "http://a.example.com"},
                {"id": "2", "url": "http://b.example.com"},
                "garbage"
            ]}
        }"#;

        let page = parse_page(body).unwrap();
        assert_eq!(page.fetched, 3);
        assert_eq!(page.monitors.len(), 1);
        assert_eq!(page.monitors[0].id, "1");
    }

    #[test]
    fn should_surface_api_failures() {
        let body = r#"{"stat":"fail","id":"100","message":"apiKey not mentioned or in a wrong format"}"#;
        match parse_page(body) {
            Err(RegistryError::Api { id, message }) => {
                assert_eq!(id, "100");
                assert!(message.contains("apiKey"));
            }
            other => panic!("expected api error, got {other:?}"),
        }
    }

    #[test]
    fn should_treat_no_monitors_as_empty_page() {
        let body = r#"{"stat":"fail","id":"212","message":"The account has no monitors"}"#;
        let page = parse_page(body).unwrap();
        assert_eq!(page, RegistryPage::default());
    }

    #[test]
    fn should_reject_non_json_body() {
        assert!(matches!(
            parse_page("<html>502</html>"),
            Err(RegistryError::Decode(_))
        ));
    }

    #[test]
    fn should_reject_empty_api_key() {
        assert!(matches!(
            UptimeRobotRegistry::new(DEFAULT_ENDPOINT, "  ", 30),
            Err(RegistryError::Config(_))
        ));
    }

    /// Accepts one HTTP request, answers it with `status` and `body`, and
    /// returns the raw request text.
    async fn serve_once(
        status: &'static str,
        body: &'static str,
    ) -> (String, tokio::task::JoinHandle<String>) {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            let mut chunk = [0u8; 1024];
            let head_end = loop {
                let n = socket.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break buf.len();
                }
                buf.extend_from_slice(&chunk[..n]);
                if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                    break pos + 4;
                }
            };
            let head = String::from_utf8_lossy(&buf[..head_end]).to_string();
            let content_length = head
                .lines()
                .filter_map(|line| line.split_once(':'))
                .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
                .and_then(|(_, value)| value.trim().parse::<usize>().ok())
                .unwrap_or(0);
            while buf.len() < head_end + content_length {
                let n = socket.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&chunk[..n]);
            }

            let response = format!(
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;
            String::from_utf8_lossy(&buf).to_string()
        });
        (format!("http://{addr}"), handle)
    }

    #[tokio::test]
    async fn should_send_listing_query_and_map_error_status() {
        let (endpoint, server) = serve_once("503 Service Unavailable", "busy").await;
        let registry = UptimeRobotRegistry::new(&endpoint, "k", 5).unwrap();

        let err = registry.fetch_page(0, 50).await.unwrap_err();
        match err {
            RegistryError::Http { status, body } => {
                assert_eq!(status, 503);
                assert_eq!(body, "busy");
            }
            other => panic!("expected http error, got {other:?}"),
        }

        let request = server.await.unwrap();
        assert!(
            request.starts_with(
                "GET /getMonitors?apiKey=k&format=json&noJsonCallback=1&offset=0&limit=50 HTTP/1.1"
            ),
            "unexpected request: {request}"
        );
    }

    #[tokio::test]
    async fn should_fetch_page_at_offset() {
        let (endpoint, server) = serve_once(
            "200 OK",
            r#"{"stat":"ok","monitors":{"monitor":[{"id":"9","friendlyname":"Blog","url":"http://blog.example.com"}]}}"#,
        )
        .await;
        let registry = UptimeRobotRegistry::new(&endpoint, "k", 5).unwrap();

        let page = registry.fetch_page(100, 50).await.unwrap();
        assert_eq!(page.fetched, 1);
        assert_eq!(page.monitors[0].friendly_name, "Blog");

        let request = server.await.unwrap();
        assert!(request.contains("offset=100&limit=50"), "unexpected request: {request}");
    }
}
