use crate::archive::ImageArchiver;
use crate::client::VendorApi;
use crate::config::MAX_INTERVAL_MINUTES;
use crate::error::Result;
use crate::models::{CycleReport, Credentials, DeviceSerial};
use crate::token::TokenManager;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{error, info, warn};

const MIN_PERIOD: Duration = Duration::from_secs(1);
const MAX_PERIOD: Duration = Duration::from_secs(MAX_INTERVAL_MINUTES * 60);

/// Owns everything one poll cycle touches: vendor client, credentials, token and archive.
pub struct Poller<A> {
    api: A,
    creds: Credentials,
    device: DeviceSerial,
    tokens: TokenManager,
    archiver: ImageArchiver,
}

impl<A: VendorApi> Poller<A> {
    pub fn new(
        api: A,
        creds: Credentials,
        device: DeviceSerial,
        archiver: ImageArchiver,
    ) -> Self {
        Self {
            api,
            creds,
            device,
            tokens: TokenManager::new(),
            archiver,
        }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn tokens(&self) -> &TokenManager {
        &self.tokens
    }

    pub fn tokens_mut(&mut self) -> &mut TokenManager {
        &mut self.tokens
    }

    pub fn archiver(&self) -> &ImageArchiver {
        &self.archiver
    }

    /// Token check, capture, download and store, in that order. The latest
    /// file is only touched once the picture bytes are in hand.
    pub async fn run_cycle(&mut self) -> Result<CycleReport> {
        let ensured = self.tokens.ensure_valid(&self.api, &self.creds).await?;
        let capture = self
            .api
            .request_capture(&ensured.token, &self.device)
            .await?;
        let bytes = self.api.download(&capture.picture_url).await?;
        let stored = self.archiver.store(&bytes)?;
        Ok(CycleReport {
            bytes: stored.bytes,
            latest_path: stored.latest_path,
            history_path: stored.history_path,
            token_refreshed: ensured.refreshed,
        })
    }

    /// Run one cycle and log its outcome. Errors stay inside the cycle.
    pub async fn tick(&mut self) -> Option<CycleReport> {
        info!(device = %self.device, "capture started");
        match self.run_cycle().await {
            Ok(report) => {
                info!(
                    device = %self.device,
                    bytes = report.bytes,
                    history = %report.history_path.display(),
                    token_refreshed = report.token_refreshed,
                    "capture finished"
                );
                Some(report)
            }
            Err(crate::Error::Capture(err)) if err.code().is_some() => {
                warn!(
                    device = %self.device,
                    code = err.code().unwrap_or_default(),
                    "capture failed, device may be powered off or unreachable: {err}"
                );
                None
            }
            Err(err) => {
                error!(device = %self.device, stage = err.stage(), "cycle failed: {err}");
                None
            }
        }
    }

    /// Tick every `period` until the process is terminated. The first tick
    /// fires one period after start; a slow cycle delays later ticks instead
    /// of bunching them up. `period` is clamped to the range `Config::interval`
    /// accepts.
    pub async fn run(&mut self, period: Duration) {
        let period = period.clamp(MIN_PERIOD, MAX_PERIOD);
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(
            device = %self.device,
            interval = %humantime::format_duration(period),
            latest = %self.archiver.latest_path().display(),
            history = %self.archiver.history_dir().display(),
            "polling started"
        );
        loop {
            ticker.tick().await;
            self.tick().await;
        }
    }
}
