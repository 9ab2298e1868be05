use crate::config::TranslateConfig;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, text: &str) -> Result<String>;
}

/// Client for the keyless `translate_a/single?client=gtx` endpoint.
pub struct GoogleTranslator {
    client: Client,
    cfg: TranslateConfig,
}

impl GoogleTranslator {
    pub fn new(client: Client, cfg: TranslateConfig) -> Self {
        Self { client, cfg }
    }
}

#[async_trait]
impl Translator for GoogleTranslator {
    async fn translate(&self, text: &str) -> Result<String> {
        let resp = self
            .client
            .get(&self.cfg.endpoint)
            .query(&[
                ("client", "gtx"),
                ("sl", self.cfg.source_lang.as_str()),
                ("tl", self.cfg.target_lang.as_str()),
                ("dt", "t"),
                ("q", text),
            ])
            .timeout(Duration::from_secs(30))
            .send()
            .await
            .context("Translation request failed")?;

        let status = resp.status();
        if !status.is_success() {
            anyhow::bail!("Translation HTTP {}", status.as_u16());
        }

        let raw = resp.text().await.context("Translation response read failed")?;
        extract_translation(&raw)
    }
}

/// The response is `[[["<translated>", "<source>", ...], ...], ...]`; segments are concatenated.
fn extract_translation(resp_json: &str) -> Result<String> {
    let root: serde_json::Value =
        serde_json::from_str(resp_json).context("Translation response was not JSON")?;
    let segments = root
        .get(0)
        .and_then(|v| v.as_array())
        .context("Translation response has no segment list")?;

    let mut out = String::new();
    for segment in segments {
        if let Some(piece) = segment.get(0).and_then(|v| v.as_str()) {
            out.push_str(piece);
        }
    }

    if out.trim().is_empty() {
        anyhow::bail!("Translation response was empty");
    }
    Ok(out)
}
