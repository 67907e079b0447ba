//! Resolving configured streams to playable URLs.
//!
//! Two resolvers are provided: a static URL template, and an Icecast
//! `status-json.xsl` listing where only currently-live mounts resolve.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;

use super::{ReportedFields, StreamDescriptor, StreamSpec};

/// Placeholder replaced by the stream name in URL templates.
pub const NAME_PLACEHOLDER: &str = "{name}";

/// Errors that can occur while resolving a stream.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// HTTP request to the directory failed.
    #[error("directory request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Directory answered with a non-success status.
    #[error("directory returned HTTP {0}")]
    HttpStatus(u16),

    /// Directory body was not a valid listing.
    #[error("invalid directory listing: {0}")]
    InvalidListing(reqwest::Error),

    /// The stream is not currently listed.
    #[error("stream {0} is not listed")]
    NotListed(String),
}

/// Convenient Result alias for directory operations.
pub type DirectoryResult<T> = Result<T, DirectoryError>;

/// Turns a configured stream into a loadable descriptor.
#[async_trait]
pub trait StreamResolver: Send + Sync {
    /// Resolves `spec`; [`DirectoryError::NotListed`] when it is not live.
    async fn resolve(&self, spec: &StreamSpec) -> DirectoryResult<StreamDescriptor>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Static template
// ─────────────────────────────────────────────────────────────────────────────

/// Substitutes the stream name into a fixed URL template. Never fails.
#[derive(Debug, Clone)]
pub struct UrlTemplateResolver {
    template: String,
    image_url: Option<String>,
}

impl UrlTemplateResolver {
    pub fn new(template: impl Into<String>, image_url: Option<String>) -> Self {
        Self {
            template: template.into(),
            image_url,
        }
    }

    pub fn url_for(&self, name: &str) -> String {
        self.template.replace(NAME_PLACEHOLDER, name)
    }
}

#[async_trait]
impl StreamResolver for UrlTemplateResolver {
    async fn resolve(&self, spec: &StreamSpec) -> DirectoryResult<StreamDescriptor> {
        Ok(StreamDescriptor::from_spec(
            spec,
            self.url_for(&spec.name),
            ReportedFields::default(),
            self.image_url.clone(),
        ))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Icecast listing
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct IcecastStatus {
    icestats: IceStats,
}

impl IcecastStatus {
    fn into_sources(self) -> Vec<IcecastSource> {
        self.icestats
            .source
            .map(OneOrMany::into_vec)
            .unwrap_or_default()
    }
}

#[derive(Debug, Default, Deserialize)]
struct IceStats {
    #[serde(default)]
    source: Option<OneOrMany<IcecastSource>>,
}

/// Icecast emits a bare object when a single mount is live.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            Self::One(item) => vec![item],
            Self::Many(items) => items,
        }
    }
}

/// One live mount as reported by Icecast.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct IcecastSource {
    pub listenurl: String,
    #[serde(default)]
    pub server_type: Option<String>,
    #[serde(default)]
    pub server_name: Option<String>,
    #[serde(default)]
    pub server_description: Option<String>,
}

impl IcecastSource {
    /// Last path segment of `listenurl`, i.e. the mount name.
    pub fn mount_name(&self) -> &str {
        self.listenurl
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or_default()
    }
}

/// Resolves streams against a live Icecast listing, fetched per call.
#[derive(Debug, Clone)]
pub struct IcecastDirectoryResolver {
    client: Client,
    url: String,
    image_url: Option<String>,
    timeout: Duration,
}

impl IcecastDirectoryResolver {
    /// # Arguments
    /// * `client` - Shared HTTP client
    /// * `url` - Full `status-json.xsl` URL
    /// * `image_url` - Artwork attached to every resolved stream
    /// * `timeout` - Bound on the listing request
    pub fn new(
        client: Client,
        url: impl Into<String>,
        image_url: Option<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            url: url.into(),
            image_url,
            timeout,
        }
    }

    async fn fetch(&self) -> DirectoryResult<Vec<IcecastSource>> {
        let response = self
            .client
            .get(&self.url)
            .timeout(self.timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(DirectoryError::HttpStatus(status.as_u16()));
        }

        let listing = response.json::<IcecastStatus>().await.map_err(|e| {
            if e.is_decode() {
                DirectoryError::InvalidListing(e)
            } else {
                DirectoryError::Http(e)
            }
        })?;
        Ok(listing.into_sources())
    }
}

#[async_trait]
impl StreamResolver for IcecastDirectoryResolver {
    async fn resolve(&self, spec: &StreamSpec) -> DirectoryResult<StreamDescriptor> {
        let sources = self.fetch().await?;
        log::debug!("[Directory] {} live source(s) at {}", sources.len(), self.url);

        let source = sources
            .into_iter()
            .find(|source| source.mount_name() == spec.name)
            .ok_or_else(|| DirectoryError::NotListed(spec.name.clone()))?;

        let reported = ReportedFields {
            mime_type: source.server_type.clone(),
            title: source.server_name.clone(),
            subtitle: source.server_description.clone(),
        };
        Ok(StreamDescriptor::from_spec(
            spec,
            source.listenurl,
            reported,
            self.image_url.clone(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    const LISTING: &str = r#"{
        "icestats": {
            "admin": "icemaster@localhost",
            "source": [
                {
                    "listenurl": "http://radio.example:8000/hmjamaat",
                    "server_type": "audio/mpeg",
                    "server_name": "Jamaat",
                    "server_description": "Main hall"
                },
                {"listenurl": "http://radio.example:8000/hma_furqaan", "server_type": "audio/aac"}
            ]
        }
    }"#;

    fn parse_listing(body: &str) -> serde_json::Result<Vec<IcecastSource>> {
        serde_json::from_str::<IcecastStatus>(body).map(IcecastStatus::into_sources)
    }

    /// Answers every connection with one canned HTTP/1.1 response.
    async fn serve(status_line: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();

        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let mut request: Vec<u8> = Vec::new();
                    let mut buf = [0u8; 1024];
                    while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                        match socket.read(&mut buf).await {
                            Ok(0) | Err(_) => return,
                            Ok(n) => request.extend_from_slice(&buf[..n]),
                        }
                    }
                    let response = format!(
                        "HTTP/1.1 {}\r\nContent-Type: application/json\r\n\
                         Content-Length: {}\r\nConnection: close\r\n\r\n{}",
                        status_line,
                        body.len(),
                        body
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });

        format!("http://{}/status-json.xsl", address)
    }

    fn resolver(url: String) -> IcecastDirectoryResolver {
        let client = Client::builder().no_proxy().build().unwrap();
        IcecastDirectoryResolver::new(
            client,
            url,
            Some("https://img/logo.png".into()),
            Duration::from_secs(5),
        )
    }

    #[test]
    fn parses_source_array() {
        let sources = parse_listing(LISTING).unwrap();
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0].mount_name(), "hmjamaat");
        assert_eq!(sources[1].server_name, None);
    }

    #[test]
    fn parses_single_source_object() {
        let body = r#"{"icestats": {"source": {"listenurl": "http://r:8000/solo"}}}"#;
        let sources = parse_listing(body).unwrap();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].mount_name(), "solo");
    }

    #[test]
    fn no_live_sources_is_empty() {
        let sources = parse_listing(r#"{"icestats": {"admin": "x"}}"#).unwrap();
        assert!(sources.is_empty());
        assert!(parse_listing("not json").is_err());
    }

    #[tokio::test]
    async fn listed_mount_resolves_with_reported_fields() {
        let url = serve("200 OK", LISTING).await;
        let descriptor = resolver(url)
            .resolve(&StreamSpec::new("hmjamaat", 3))
            .await
            .unwrap();
        assert_eq!(descriptor.playback_url, "http://radio.example:8000/hmjamaat");
        assert_eq!(descriptor.mime_type, "audio/mpeg");
        assert_eq!(descriptor.display_title, "Jamaat");
        assert_eq!(descriptor.display_subtitle, "Main hall");
        assert_eq!(descriptor.image_url.as_deref(), Some("https://img/logo.png"));
        assert_eq!(descriptor.priority, 3);
    }

    #[tokio::test]
    async fn absent_mount_is_not_listed() {
        let url = serve("200 OK", LISTING).await;

        let result = resolver(url).resolve(&StreamSpec::new("jumuah", 1)).await;
        assert!(matches!(result, Err(DirectoryError::NotListed(name)) if name == "jumuah"));
    }

    #[tokio::test]
    async fn error_status_is_reported() {
        let url = serve("500 Internal Server Error", "{}").await;

        let result = resolver(url).resolve(&StreamSpec::new("hmjamaat", 1)).await;
        assert!(matches!(result, Err(DirectoryError::HttpStatus(500))));
    }

    #[tokio::test]
    async fn garbage_listing_is_invalid() {
        let url = serve("200 OK", "<html>not json</html>").await;

        let result = resolver(url).resolve(&StreamSpec::new("hmjamaat", 1)).await;
        assert!(matches!(result, Err(DirectoryError::InvalidListing(_))));
    }

    #[tokio::test]
    async fn template_substitutes_name() {
        let resolver = UrlTemplateResolver::new(
            "http://radio.example:8000/{name}",
            Some("https://img/logo.png".into()),
        );
        let descriptor = resolver.resolve(&StreamSpec::new("hmjamaat", 1)).await.unwrap();
        assert_eq!(descriptor.playback_url, "http://radio.example:8000/hmjamaat");
        assert_eq!(descriptor.image_url.as_deref(), Some("https://img/logo.png"));
        assert_eq!(descriptor.priority, 1);
    }
}
