use crate::error::{AuthError, CaptureError, Error, Result};
use crate::models::*;
use reqwest::header::{ACCEPT, HeaderValue};
use reqwest::{Client, Url};
use std::future::Future;
use tracing::debug;

const USER_AGENT: &str = "ysnap/0.1";
const TOKEN_PATH: &str = "api/lapp/token/get";
const CAPTURE_PATH: &str = "api/lapp/device/capture";
/// Snapshots are always taken from the first channel.
pub const CAPTURE_CHANNEL: u32 = 1;

/// Operations the poll cycle needs from the camera platform.
pub trait VendorApi {
    fn issue_token(
        &self,
        creds: &Credentials,
    ) -> impl Future<Output = std::result::Result<Token, AuthError>> + Send;

    fn request_capture(
        &self,
        token: &Token,
        device: &DeviceSerial,
    ) -> impl Future<Output = std::result::Result<CaptureResult, CaptureError>> + Send;

    fn download(
        &self,
        picture_url: &str,
    ) -> impl Future<Output = std::result::Result<Vec<u8>, CaptureError>> + Send;
}

#[derive(Clone)]
pub struct Ys7Client {
    http: Client,
    base_url: Url,
}

impl Ys7Client {
    pub fn new(base_url: &str) -> Result<Self> {
        let mut base = base_url
            .parse::<Url>()
            .map_err(|err| Error::InvalidConfig(format!("invalid base url: {err}")))?;
        if !base.as_str().ends_with('/') {
            base = base
                .join(&format!("{}/", base.path().trim_end_matches('/')))
                .map_err(|err| Error::InvalidConfig(format!("invalid base url: {err}")))?;
        }

        let http = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|err| Error::InvalidConfig(format!("failed to build client: {err}")))?;

        Ok(Self {
            http,
            base_url: base,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|err| Error::InvalidConfig(format!("invalid url: {err}")))
    }

    async fn post_form(
        &self,
        url: Url,
        form: &[(&str, &str)],
    ) -> std::result::Result<String, reqwest::Error> {
        let response = self
            .http
            .post(url)
            .header(ACCEPT, HeaderValue::from_static("application/json"))
            .form(form)
            .send()
            .await?;
        response.text().await
    }
}

impl VendorApi for Ys7Client {
    async fn issue_token(&self, creds: &Credentials) -> std::result::Result<Token, AuthError> {
        let url = self
            .endpoint(TOKEN_PATH)
            .map_err(|err| AuthError::Malformed(err.to_string()))?;
        let body = self
            .post_form(
                url,
                &[
                    ("appKey", creds.app_key.as_str()),
                    ("appSecret", creds.app_secret.as_str()),
                ],
            )
            .await?;
        debug!(body = %body, "token response");
        parse_token_response(&body)
    }

    async fn request_capture(
        &self,
        token: &Token,
        device: &DeviceSerial,
    ) -> std::result::Result<CaptureResult, CaptureError> {
        let url = self
            .endpoint(CAPTURE_PATH)
            .map_err(|err| CaptureError::Malformed(err.to_string()))?;
        let channel = CAPTURE_CHANNEL.to_string();
        let body = self
            .post_form(
                url,
                &[
                    ("accessToken", token.access_token.as_str()),
                    ("deviceSerial", device.as_str()),
                    ("channelNo", channel.as_str()),
                ],
            )
            .await?;
        debug!(device = %device, body = %body, "capture response");
        parse_capture_response(&body)
    }

    async fn download(&self, picture_url: &str) -> std::result::Result<Vec<u8>, CaptureError> {
        let response = self
            .http
            .get(picture_url)
            .header(ACCEPT, HeaderValue::from_static("*/*"))
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(CaptureError::Download {
                status,
                url: picture_url.to_string(),
            });
        }
        let bytes = response.bytes().await?;
        debug!(url = picture_url, bytes = bytes.len(), "picture downloaded");
        Ok(bytes.to_vec())
    }
}

/// Decode a token-issuance response. Anything short of a non-empty token and
/// an expiry is an error; an empty token is never handed out.
pub fn parse_token_response(body: &str) -> std::result::Result<Token, AuthError> {
    let envelope: ApiEnvelope<TokenData> =
        serde_json::from_str(body).map_err(|err| AuthError::Malformed(err.to_string()))?;
    if !envelope.is_ok() {
        return Err(AuthError::Rejected {
            message: envelope.message(),
            code: envelope.code,
        });
    }
    let data = envelope
        .data
        .ok_or_else(|| AuthError::Malformed("missing data".into()))?;
    let access_token = data
        .access_token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AuthError::Malformed("missing data.accessToken".into()))?;
    let expires_at_ms = data
        .expire_time
        .ok_or_else(|| AuthError::Malformed("missing data.expireTime".into()))?;
    Ok(Token {
        access_token,
        expires_at_ms,
    })
}

pub fn parse_capture_response(body: &str) -> std::result::Result<CaptureResult, CaptureError> {
    let envelope: ApiEnvelope<CaptureData> =
        serde_json::from_str(body).map_err(|err| CaptureError::Malformed(err.to_string()))?;
    if !envelope.is_ok() {
        return Err(CaptureError::Rejected {
            message: envelope.message(),
            code: envelope.code,
        });
    }
    let picture_url = envelope
        .data
        .and_then(|d| d.pic_url)
        .filter(|u| !u.is_empty())
        .ok_or_else(|| CaptureError::Malformed("missing data.picUrl".into()))?;
    Ok(CaptureResult { picture_url })
}
