use crate::browser::{BrowserSession, ClickOutcome, Locator};
use crate::config::SynthConfig;
use crate::{logi, logok, logw};
use anyhow::{Context, Result};
use async_trait::async_trait;
use regex::Regex;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tokio::time::sleep;

const DOWNLOAD_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";
const MAX_BACKOFF: Duration = Duration::from_secs(120);
const RETRY_STATUSES: [StatusCode; 4] = [
    StatusCode::INTERNAL_SERVER_ERROR,
    StatusCode::BAD_GATEWAY,
    StatusCode::SERVICE_UNAVAILABLE,
    StatusCode::GATEWAY_TIMEOUT,
];

#[async_trait]
pub trait AudioDownloader: Send + Sync {
    /// `Ok(None)` for a definitive non-200 answer.
    async fn download(&self, url: &str) -> Result<Option<Vec<u8>>>;
}

/// Delay before retry number `retry` (1-based): `factor * 2^(retry-1)`, capped.
pub fn backoff_delay(factor_secs: f64, retry: u32) -> Duration {
    if factor_secs.is_nan() || factor_secs <= 0.0 || retry == 0 {
        return Duration::ZERO;
    }
    let secs = factor_secs * 2f64.powi(retry.saturating_sub(1).min(30) as i32);
    if !secs.is_finite() || secs >= MAX_BACKOFF.as_secs_f64() {
        return MAX_BACKOFF;
    }
    Duration::from_secs_f64(secs)
}

pub struct HttpDownloader {
    client: Client,
    retries: u32,
    backoff_factor_secs: f64,
    timeout: Duration,
}

impl HttpDownloader {
    pub fn new(client: Client, cfg: &SynthConfig) -> Self {
        Self {
            client,
            retries: cfg.download_retries,
            backoff_factor_secs: cfg.backoff_factor_secs,
            timeout: Duration::from_secs(cfg.download_timeout_secs),
        }
    }
}

#[async_trait]
impl AudioDownloader for HttpDownloader {
    async fn download(&self, url: &str) -> Result<Option<Vec<u8>>> {
        let mut retry = 0;
        loop {
            let outcome = self
                .client
                .get(url)
                .header(reqwest::header::USER_AGENT, DOWNLOAD_USER_AGENT)
                .timeout(self.timeout)
                .send()
                .await;

            let transient = match outcome {
                Ok(resp) if resp.status() == StatusCode::OK => {
                    let bytes = resp.bytes().await.context("Audio response read failed")?;
                    return Ok(Some(bytes.to_vec()));
                }
                Ok(resp) if RETRY_STATUSES.contains(&resp.status()) => {
                    format!("HTTP {}", resp.status().as_u16())
                }
                Ok(resp) => {
                    logw(format!("Audio response status: {}", resp.status().as_u16()));
                    return Ok(None);
                }
                Err(err) if err.is_connect() || err.is_timeout() => err.to_string(),
                Err(err) => return Err(err).context("Audio download failed"),
            };

            retry += 1;
            if retry > self.retries {
                anyhow::bail!("Audio download gave up after {} retries ({})", self.retries, transient);
            }
            let delay = backoff_delay(self.backoff_factor_secs, retry);
            logw(format!(
                "Audio download transient failure ({}); retry {}/{} in {:.1}s",
                transient,
                retry,
                self.retries,
                delay.as_secs_f64()
            ));
            sleep(delay).await;
        }
    }
}

/// Drives the remote text-to-speech page through a browser session.
pub struct SpeechSynthesizer<S, D> {
    session: S,
    downloader: D,
    cfg: SynthConfig,
    resource_pattern: Regex,
}

impl<S: BrowserSession, D: AudioDownloader> SpeechSynthesizer<S, D> {
    pub fn new(session: S, downloader: D, cfg: SynthConfig) -> Result<Self> {
        let resource_pattern = Regex::new(&cfg.resource_pattern)
            .with_context(|| format!("Bad resource pattern: {}", cfg.resource_pattern))?;
        Ok(Self {
            session,
            downloader,
            cfg,
            resource_pattern,
        })
    }

    pub fn session(&self) -> &S {
        &self.session
    }

    pub fn into_session(self) -> S {
        self.session
    }

    pub fn is_valid_resource(&self, src: &str) -> bool {
        self.resource_pattern.is_match(src)
    }

    /// Submits `text` and returns the rendered audio, or `None` when the page
    /// never yields a downloadable resource within the attempt bound.
    pub async fn synthesize(&mut self, text: &str) -> Option<Vec<u8>> {
        if let Err(err) = self.submit(text).await {
            logw(format!("{:#}", err));
            return None;
        }

        let locator = Locator::xpath(&self.cfg.audio_xpath);
        for attempt in 1..=self.cfg.max_attempts {
            match self.collect(&locator, attempt).await {
                Ok(Some(bytes)) => {
                    logok(format!("Synthesized {} bytes of audio", bytes.len()));
                    return Some(bytes);
                }
                Ok(None) => {}
                Err(err) => logw(format!("Error on attempt {}: {:#}", attempt, err)),
            }
            if attempt < self.cfg.max_attempts {
                sleep(self.cfg.retry_interval()).await;
            }
        }

        logw(format!(
            "No audio resource after {} attempts",
            self.cfg.max_attempts
        ));
        None
    }

    async fn submit(&self, text: &str) -> Result<()> {
        self.session
            .navigate(&self.cfg.page_url)
            .await
            .context("Failed to open synthesis page")?;

        let input = self
            .session
            .find(&Locator::id(&self.cfg.input_id))
            .await?
            .context("Text input not found.")?;
        self.session.clear(&input).await?;
        self.session.send_keys(&input, text).await?;

        let submit = self
            .session
            .find(&Locator::id(&self.cfg.submit_id))
            .await?
            .context("Generate button not found.")?;
        self.session.scroll_into_view(&submit).await?;
        sleep(self.cfg.settle()).await;
        match self.session.click(&submit).await? {
            ClickOutcome::Clicked => Ok(()),
            ClickOutcome::Intercepted => anyhow::bail!("Generate button click intercepted."),
        }
    }

    async fn collect(&self, locator: &Locator, attempt: u32) -> Result<Option<Vec<u8>>> {
        let Some(element) = self
            .session
            .wait_for(locator, self.cfg.element_wait())
            .await?
        else {
            logw(format!("Attempt {}: audio element did not appear", attempt));
            return Ok(None);
        };

        let Some(src) = self.session.attribute(&element, "src").await? else {
            logw(format!("Attempt {}: audio element has no src", attempt));
            return Ok(None);
        };
        logi(format!("Attempt {}: Found audio source URL: {}", attempt, src));

        if !self.is_valid_resource(&src) {
            return Ok(None);
        }
        self.downloader.download(&src).await
    }
}
