#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use ysnap_core::{
    AuthError, CaptureError, CaptureResult, Credentials, DeviceSerial, Token, VendorApi,
};

pub const PICTURE_URL: &str = "http://x/y.jpg";

/// In-memory stand-in for the open platform.
pub struct FakeVendor {
    pub token_calls: AtomicUsize,
    pub token_expires_at_ms: Mutex<i64>,
    pub reject_token: Mutex<bool>,
    /// Scripted capture codes, consumed one per request; "200" once exhausted.
    pub capture_codes: Mutex<VecDeque<&'static str>>,
    /// Access token presented on every capture request, in order.
    pub captures_with: Mutex<Vec<String>>,
    pub downloads: Mutex<Vec<String>>,
    pub picture: Vec<u8>,
}

impl FakeVendor {
    pub fn new(picture: &[u8]) -> Self {
        Self {
            token_calls: AtomicUsize::new(0),
            token_expires_at_ms: Mutex::new(i64::MAX),
            reject_token: Mutex::new(false),
            capture_codes: Mutex::new(VecDeque::new()),
            captures_with: Mutex::new(Vec::new()),
            downloads: Mutex::new(Vec::new()),
            picture: picture.to_vec(),
        }
    }

    pub fn with_capture_codes(self, codes: &[&'static str]) -> Self {
        *self.capture_codes.lock().unwrap() = codes.iter().copied().collect();
        self
    }

    pub fn token_calls(&self) -> usize {
        self.token_calls.load(Ordering::SeqCst)
    }

    pub fn captures_with(&self) -> Vec<String> {
        self.captures_with.lock().unwrap().clone()
    }
}

impl VendorApi for FakeVendor {
    async fn issue_token(&self, creds: &Credentials) -> Result<Token, AuthError> {
        let n = self.token_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if *self.reject_token.lock().unwrap() {
            return Err(AuthError::Rejected {
                code: "10017".into(),
                message: format!("appKey {} not found", creds.app_key),
            });
        }
        Ok(Token {
            access_token: format!("tok-{n}"),
            expires_at_ms: *self.token_expires_at_ms.lock().unwrap(),
        })
    }

    async fn request_capture(
        &self,
        token: &Token,
        _device: &DeviceSerial,
    ) -> Result<CaptureResult, CaptureError> {
        self.captures_with
            .lock()
            .unwrap()
            .push(token.access_token.clone());
        let code = self.capture_codes.lock().unwrap().pop_front().unwrap_or("200");
        if code != "200" {
            return Err(CaptureError::Rejected {
                code: code.into(),
                message: "device offline".into(),
            });
        }
        Ok(CaptureResult {
            picture_url: PICTURE_URL.into(),
        })
    }

    async fn download(&self, picture_url: &str) -> Result<Vec<u8>, CaptureError> {
        self.downloads.lock().unwrap().push(picture_url.to_string());
        Ok(self.picture.clone())
    }
}

pub fn creds() -> Credentials {
    Credentials::new("key", "secret")
}

pub fn device() -> DeviceSerial {
    "123456789".parse().unwrap()
}
