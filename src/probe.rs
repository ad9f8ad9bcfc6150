use std::{env, fmt};

use bytes::Bytes;
use log::debug;
use serde::Serialize;
use sonic_rs::to_vec;
use thiserror::Error;

use super::adapter::{Client, RestError, RestRequest, RestResponse, RestResult};

/// Endpoint kept exactly as pasted from the console, mas.* host included.
/// The `{conversation_id}` segment is sent literally, not substituted.
pub const CONVERSATION_URL: &str = concat!(
    "https://mas.ap-southeast-1.console-intl.huaweicloud.com",
    "/v1/d0d86359a22a4ba891f920d3e50e1d4e",
    "/workflows/d86a319d-27ed-48a2-912c-74c89fa53327",
    "/conversations/{conversation_id}",
    "?version=1765736664945",
);

pub const AUTH_TOKEN_ENV: &str = "HWC_X_AUTH_TOKEN";

pub const REQUEST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(60);

/// The printed body is capped at this many characters.
pub const BODY_PREVIEW_CHARS: usize = 2000;

const QUERY_TEXT: &str = "hello";

#[derive(Serialize)]
struct ConversationQuery<'a> {
    query: &'a str,
}

/// Bearer credential for the `X-Auth-Token` header. The value is never
/// displayed; `Debug` redacts it.
#[derive(Clone)]
pub struct AuthToken(String);

impl AuthToken {
    /// Trims surrounding whitespace and rejects missing or empty values.
    pub fn parse(raw: Option<&str>) -> Result<Self, ProbeError> {
        let trimmed = raw.unwrap_or_default().trim();
        if trimmed.is_empty() {
            return Err(ProbeError::MissingToken);
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Reads the credential once from `HWC_X_AUTH_TOKEN`.
    pub fn from_env() -> Result<Self, ProbeError> {
        let raw = env::var(AUTH_TOKEN_ENV).ok();
        Self::parse(raw.as_deref())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AuthToken(<redacted>)")
    }
}

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error(
        "Missing env var HWC_X_AUTH_TOKEN. Set it to your Huawei Cloud X-Auth-Token (X-Subject-Token)."
    )]
    MissingToken,
    #[error(transparent)]
    Transport(#[from] RestError),
}

impl ProbeError {
    /// Process exit code for the failure: 2 before any network activity,
    /// 1 once the transport was involved.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::MissingToken => 2,
            Self::Transport(_) => 1,
        }
    }
}

/// Builds the one request the probe sends: POST, two headers, the constant
/// JSON payload, 60s timeout. Pure except for the serializer.
pub fn conversation_request(token: &AuthToken) -> RestResult<RestRequest> {
    let payload = to_vec(&ConversationQuery { query: QUERY_TEXT })?;
    Ok(RestRequest::post(CONVERSATION_URL)
        .with_header("Content-Type", "application/json")
        .with_header("X-Auth-Token", Bytes::from(token.as_str().to_owned()))
        .with_body(payload)
        .with_timeout(REQUEST_TIMEOUT))
}

/// Outcome of a completed exchange, ready for display. Any HTTP status is a
/// success at this level; only transport failures surface as errors.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProbeReport {
    pub status: u16,
    pub body_preview: String,
}

impl ProbeReport {
    pub fn from_response(response: &RestResponse) -> Self {
        let text = String::from_utf8_lossy(response.body());
        Self {
            status: response.status(),
            body_preview: truncate_chars(&text, BODY_PREVIEW_CHARS).to_owned(),
        }
    }
}

impl fmt::Display for ProbeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "STATUS: {}\n{}", self.status, self.body_preview)
    }
}

fn truncate_chars(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Issues the single authenticated POST and wraps the outcome.
pub async fn run(client: &Client, token: &AuthToken) -> Result<ProbeReport, ProbeError> {
    let request = conversation_request(token)?;
    debug!("POST {CONVERSATION_URL}");
    let response = client.execute(request).await?;
    debug!(
        "response status={} bytes={} elapsed={:?}",
        response.status(),
        response.body().len(),
        response.elapsed
    );
    Ok(ProbeReport::from_response(&response))
}
