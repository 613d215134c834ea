// API client module: a small blocking HTTP client for the blog's private
// API. It knows three calls (token, upload, create post). Errors the blog
// reports in its JSON body come back as `RemoteOutcome::Rejected` (or in
// `TokenGrant::errors` for the token call) so the caller decides whether to
// keep going; only transport and decoding failures are returned as `Err`.

use crate::config::Config;
use crate::post::PostPayload;
use reqwest::blocking::{multipart, Client, RequestBuilder, Response};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::File;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, warn};

/// Failures that prevent a call from producing any response to inspect.
#[derive(Debug, Error)]
pub enum BlogError {
    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("Failed to open image file {path}: {source}")]
    File {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Response from {url} is not valid JSON ({status}): {body}")]
    Decode {
        url: String,
        status: u16,
        body: String,
    },
}

/// One entry of the `errors` array the blog returns.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteError {
    #[serde(default)]
    pub message: String,
    #[serde(default, rename = "errorType")]
    pub error_type: Option<String>,
    #[serde(default)]
    pub context: Option<String>,
}

impl std::fmt::Display for RemoteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.error_type {
            Some(kind) => write!(f, "{}: {}", kind, self.message)?,
            None => write!(f, "{}", self.message)?,
        }
        if let Some(ctx) = &self.context {
            write!(f, " ({})", ctx)?;
        }
        Ok(())
    }
}

/// Result of a call that reached the blog and got a JSON answer.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteOutcome<T> {
    Accepted(T),
    Rejected(Vec<RemoteError>),
}

/// Bearer token returned by the token endpoint. Shared read-only for the
/// whole run; expiry is up to the blog.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Credential(token.into())
    }

    pub fn token(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn header_value(&self) -> Option<HeaderValue> {
        match HeaderValue::from_str(&format!("Bearer {}", self.0)) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("access token is not a valid header value, sending request without Authorization");
                None
            }
        }
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

/// Answer of the token endpoint. The blog may send `errors` next to an
/// `access_token`; both are kept so the caller can log the errors and still
/// use whatever token came back.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TokenGrant {
    pub credential: Credential,
    pub errors: Vec<RemoteError>,
}

impl TokenGrant {
    pub fn is_rejected(&self) -> bool {
        !self.errors.is_empty()
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
}

#[derive(Serialize)]
struct PostsEnvelope<'a> {
    posts: [&'a PostPayload; 1],
}

/// Blocking client bound to one blog.
#[derive(Clone)]
pub struct BlogClient {
    client: Client,
    api_url: String,
}

impl BlogClient {
    /// Build a client for `<blog_url><api_prefix>` with the configured timeout.
    pub fn from_config(config: &Config) -> Result<Self, BlogError> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(BlogError::Client)?;
        let api_url = format!(
            "{}{}",
            config.blog_url.trim().trim_end_matches('/'),
            config.api_prefix.trim_end_matches('/')
        );
        Ok(BlogClient { client, api_url })
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_url, path)
    }

    fn auth_headers(credential: &Credential) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        if let Some(value) = credential.header_value() {
            headers.insert(AUTHORIZATION, value);
        }
        headers
    }

    /// Password grant against `/authentication/token`.
    ///
    /// A rejected grant still resolves: the caller gets the errors along
    /// with the token field, which may be empty.
    pub fn authenticate(
        &self,
        username: &str,
        password: &str,
        client_id: &str,
        client_secret: &str,
    ) -> Result<TokenGrant, BlogError> {
        let url = self.url("/authentication/token");
        let form = [
            ("grant_type", "password"),
            ("username", username),
            ("password", password),
            ("client_id", client_id),
            ("client_secret", client_secret),
        ];
        let req = self
            .client
            .post(&url)
            .header(ACCEPT, "application/json")
            .form(&form);
        let body = self.send(&url, req)?;
        let errors = remote_errors(&body).unwrap_or_default();
        let token = serde_json::from_value::<TokenResponse>(body)
            .ok()
            .and_then(|t| t.access_token)
            .unwrap_or_default();
        Ok(TokenGrant {
            credential: Credential::new(token),
            errors,
        })
    }

    /// Upload one image file to `/uploads` as the `uploadimage` multipart
    /// field. Accepted value is the stored image URL.
    pub fn upload_image(
        &self,
        credential: &Credential,
        file_path: &Path,
    ) -> Result<RemoteOutcome<String>, BlogError> {
        let url = self.url("/uploads");
        let file = File::open(file_path).map_err(|source| BlogError::File {
            path: file_path.display().to_string(),
            source,
        })?;
        let file_name = file_path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("image.jpg")
            .to_string();
        let part = multipart::Part::reader(file)
            .file_name(file_name)
            .mime_str(image_mime(file_path))
            .map_err(|source| BlogError::Transport {
                url: url.clone(),
                source,
            })?;
        let form = multipart::Form::new().part("uploadimage", part);

        let req = self
            .client
            .post(&url)
            .headers(Self::auth_headers(credential))
            .multipart(form);
        let body = self.send(&url, req)?;
        Ok(match remote_errors(&body) {
            Some(errors) => RemoteOutcome::Rejected(errors),
            None => match image_url(&body) {
                Some(image) => RemoteOutcome::Accepted(image),
                None => RemoteOutcome::Rejected(vec![RemoteError {
                    message: format!("Upload response has no image URL: {}", body),
                    ..Default::default()
                }]),
            },
        })
    }

    /// Create one post via `/posts`. Accepted value is the created post as
    /// the blog returned it.
    pub fn create_post(
        &self,
        credential: &Credential,
        payload: &PostPayload,
    ) -> Result<RemoteOutcome<Value>, BlogError> {
        let url = self.url("/posts");
        let req = self
            .client
            .post(&url)
            .headers(Self::auth_headers(credential))
            .json(&PostsEnvelope { posts: [payload] });
        let body = self.send(&url, req)?;
        Ok(match remote_errors(&body) {
            Some(errors) => RemoteOutcome::Rejected(errors),
            None => {
                let post = match body.get("posts").and_then(|p| p.get(0)) {
                    Some(post) => post.clone(),
                    None => body,
                };
                RemoteOutcome::Accepted(post)
            }
        })
    }

    /// Send and decode the JSON body. A non-success status without an
    /// `errors` array is turned into one so callers see a rejection.
    fn send(&self, url: &str, req: RequestBuilder) -> Result<Value, BlogError> {
        let res: Response = req.send().map_err(|source| BlogError::Transport {
            url: url.to_string(),
            source,
        })?;
        let status = res.status();
        let text = res.text().map_err(|source| BlogError::Transport {
            url: url.to_string(),
            source,
        })?;
        debug!(url, status = status.as_u16(), "blog api response");

        match serde_json::from_str::<Value>(&text) {
            Ok(body) if status.is_success() || body.get("errors").is_some() => Ok(body),
            _ if !status.is_success() => Ok(serde_json::json!({
                "errors": [{ "message": format!("HTTP {}: {}", status, text) }]
            })),
            _ => Err(BlogError::Decode {
                url: url.to_string(),
                status: status.as_u16(),
                body: text,
            }),
        }
    }
}

/// Errors carried in a response body, if any.
fn remote_errors(body: &Value) -> Option<Vec<RemoteError>> {
    let errors = body.get("errors")?;
    let list = match errors {
        Value::Array(items) => items.iter().map(to_remote_error).collect(),
        other => vec![to_remote_error(other)],
    };
    Some(list)
}

fn to_remote_error(value: &Value) -> RemoteError {
    match value {
        Value::String(message) => RemoteError {
            message: message.clone(),
            ..Default::default()
        },
        other => serde_json::from_value(other.clone()).unwrap_or_else(|_| RemoteError {
            message: other.to_string(),
            ..Default::default()
        }),
    }
}

// The upload endpoint answers with a bare JSON string; newer versions wrap
// it as `{"url": ...}` or `{"images": [{"url": ...}]}`.
fn image_url(body: &Value) -> Option<String> {
    match body {
        Value::String(url) => Some(url.clone()),
        Value::Object(map) => map
            .get("url")
            .or_else(|| body.pointer("/images/0/url"))
            .and_then(Value::as_str)
            .map(String::from),
        _ => None,
    }
}

fn image_mime(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "image/jpeg",
    }
}
