use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub paths: Paths,
    pub quotes: QuoteConfig,
    pub translate: TranslateConfig,
    pub browser: BrowserConfig,
    pub synth: SynthConfig,
    pub mix: MixConfig,
    pub video: VideoConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Paths {
    /// Background music pool.
    pub background_dir: PathBuf,
    /// Template video pool.
    pub templates_dir: PathBuf,
    pub audio_output_dir: PathBuf,
    pub video_output_dir: PathBuf,
    /// Raw synthesized speech lives here until its batch ends.
    pub staging_dir: PathBuf,
    pub audio_metadata: PathBuf,
    pub video_metadata: PathBuf,
}

impl Default for Paths {
    fn default() -> Self {
        Self {
            background_dir: PathBuf::from("audios"),
            templates_dir: PathBuf::from("videos"),
            audio_output_dir: PathBuf::from("output/audios"),
            video_output_dir: PathBuf::from("output/videos"),
            staging_dir: PathBuf::from("staging"),
            audio_metadata: PathBuf::from("audio_metadata.json"),
            video_metadata: PathBuf::from("video_metadata.json"),
        }
    }
}

impl Paths {
    pub fn directories(&self) -> [&Path; 5] {
        [
            &self.background_dir,
            &self.templates_dir,
            &self.audio_output_dir,
            &self.video_output_dir,
            &self.staging_dir,
        ]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QuoteConfig {
    pub api_url: String,
}

impl Default for QuoteConfig {
    fn default() -> Self {
        Self {
            api_url: "https://zenquotes.io/api/random".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslateConfig {
    pub endpoint: String,
    pub source_lang: String,
    pub target_lang: String,
}

impl Default for TranslateConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://translate.googleapis.com/translate_a/single".to_string(),
            source_lang: "en".to_string(),
            target_lang: "hi".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    pub webdriver_url: String,
    pub headless: bool,
    /// Adds the sandbox/shm/automation flags needed on container hosts.
    pub hardened: bool,
    pub window_size: String,
    /// Chromium binary, when the driver should not pick its default.
    pub binary: Option<String>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            webdriver_url: "http://localhost:9515".to_string(),
            headless: true,
            hardened: true,
            window_size: "1920,1080".to_string(),
            binary: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthConfig {
    pub page_url: String,
    pub input_id: String,
    pub submit_id: String,
    pub audio_xpath: String,
    pub resource_pattern: String,
    pub max_attempts: u32,
    pub element_wait_secs: u64,
    pub settle_ms: u64,
    pub retry_interval_ms: u64,
    pub download_retries: u32,
    pub backoff_factor_secs: f64,
    pub download_timeout_secs: u64,
}

impl Default for SynthConfig {
    fn default() -> Self {
        Self {
            page_url: "https://crikk.com/text-to-speech/hindi/".to_string(),
            input_id: "promptText".to_string(),
            submit_id: "action_submit".to_string(),
            audio_xpath: "//audio/source[@id='audioSource']".to_string(),
            resource_pattern: r"^https://crikk\.com/app/app/text-to-speech/".to_string(),
            max_attempts: 10,
            element_wait_secs: 15,
            settle_ms: 1000,
            retry_interval_ms: 1000,
            download_retries: 10,
            backoff_factor_secs: 1.0,
            download_timeout_secs: 30,
        }
    }
}

impl SynthConfig {
    pub fn element_wait(&self) -> Duration {
        Duration::from_secs(self.element_wait_secs)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MixConfig {
    pub background_gain_db: f32,
    pub sample_rate: u32,
    pub channels: u16,
    pub bitrate: String,
    pub extensions: Vec<String>,
}

impl Default for MixConfig {
    fn default() -> Self {
        Self {
            background_gain_db: -10.0,
            sample_rate: 44_100,
            channels: 2,
            bitrate: "192k".to_string(),
            extensions: vec!["mp3".to_string(), "m4a".to_string()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    pub caption_secs: f64,
    pub preferred_font: PathBuf,
    pub fallback_fonts: Vec<PathBuf>,
    pub video_codec: String,
    pub audio_codec: String,
    pub audio_bitrate: String,
    pub preset: String,
    pub crf: u8,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            caption_secs: 3.0,
            preferred_font: PathBuf::from("resources/NotoSansDevanagari-Regular.ttf"),
            fallback_fonts: vec![
                PathBuf::from("/usr/share/fonts/truetype/noto/NotoSansDevanagari-Regular.ttf"),
                PathBuf::from("/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf"),
                PathBuf::from("/System/Library/Fonts/Supplemental/Arial Unicode.ttf"),
                PathBuf::from("C:\\Windows\\Fonts\\arial.ttf"),
            ],
            video_codec: "libx264".to_string(),
            audio_codec: "aac".to_string(),
            audio_bitrate: "192k".to_string(),
            preset: "veryfast".to_string(),
            crf: 22,
        }
    }
}

impl Config {
    /// Reads `path`, falling back to defaults when the file does not exist.
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !fs::try_exists(path).await.unwrap_or(false) {
            tracing::info!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        let config: Config = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.synth.max_attempts == 0 {
            anyhow::bail!("config.json: synth.max_attempts must be at least 1");
        }
        if !self.synth.backoff_factor_secs.is_finite() || self.synth.backoff_factor_secs < 0.0 {
            anyhow::bail!("config.json: synth.backoff_factor_secs must be a non-negative number");
        }
        if self.mix.sample_rate == 0 {
            anyhow::bail!("config.json: mix.sample_rate must be positive");
        }
        if self.mix.channels == 0 {
            anyhow::bail!("config.json: mix.channels must be at least 1");
        }
        if self.video.caption_secs <= 0.0 {
            anyhow::bail!("config.json: video.caption_secs must be positive");
        }
        regex::Regex::new(&self.synth.resource_pattern).with_context(|| {
            format!("config.json: bad synth.resource_pattern {}", self.synth.resource_pattern)
        })?;
        if self.browser.webdriver_url.is_empty() {
            anyhow::bail!("config.json: browser.webdriver_url missing");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_keeps_defaults() {
        let cfg: Config =
            serde_json::from_str(r#"{"browser": {"hardened": false}, "synth": {"max_attempts": 3}}"#)
                .unwrap();
        assert!(!cfg.browser.hardened);
        assert!(cfg.browser.headless);
        assert_eq!(cfg.synth.max_attempts, 3);
        assert_eq!(cfg.synth.element_wait_secs, 15);
        assert_eq!(cfg.paths.templates_dir, PathBuf::from("videos"));
        cfg.validate().unwrap();
    }

    #[test]
    fn bad_resource_pattern_is_rejected() {
        let mut cfg = Config::default();
        cfg.synth.resource_pattern = "(unclosed".to_string();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn backoff_factor_bounds() {
        let mut cfg = Config::default();
        cfg.synth.backoff_factor_secs = -1.0;
        assert!(cfg.validate().is_err());
        cfg.synth.backoff_factor_secs = f64::INFINITY;
        assert!(cfg.validate().is_err());
        cfg.synth.backoff_factor_secs = 1e20;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn zero_attempts_is_rejected() {
        let mut cfg = Config::default();
        cfg.synth.max_attempts = 0;
        assert!(cfg.validate().is_err());
    }

    #[tokio::test]
    async fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = Config::load(dir.path().join("config.json")).await.unwrap();
        assert_eq!(cfg.mix.background_gain_db, -10.0);
        assert_eq!(cfg.video.caption_secs, 3.0);
    }

    #[tokio::test]
    async fn invalid_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        tokio::fs::write(&path, "{not json").await.unwrap();
        assert!(Config::load(&path).await.is_err());
    }
}
