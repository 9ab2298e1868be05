use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Spoken between the English quote and its Hindi translation.
pub const HINDI_MARKER: &str = "हिंदी में";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub text: String,
    pub author: String,
}

#[derive(Debug, Deserialize)]
struct ZenQuote {
    q: String,
    a: String,
}

impl Quote {
    pub fn new(text: impl Into<String>, author: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            author: author.into(),
        }
    }

    /// Parses the ZenQuotes payload: an array whose first element carries `q` and `a`.
    pub fn from_zenquotes_json(text: &str) -> Result<Self> {
        let items: Vec<ZenQuote> =
            serde_json::from_str(text).context("Failed to parse quote JSON")?;
        let first = items.into_iter().next().context("Quote payload was empty")?;
        if first.q.trim().is_empty() || first.a.trim().is_empty() {
            anyhow::bail!("Quote payload is missing text or author");
        }
        Ok(Self::new(first.q, first.a))
    }

    pub fn narration(&self, hindi: &str) -> String {
        format!(
            "{} says \"{}\"\n{}\n\"{}\"",
            self.author, self.text, HINDI_MARKER, hindi
        )
    }

    pub fn audio_file_name(&self, date: &str) -> String {
        format!("{}_{}_tts_audio.mp3", safe_author_name(&self.author), date)
    }
}

pub fn safe_author_name(author: &str) -> String {
    author
        .chars()
        .filter(|c| *c != ',' && *c != '.')
        .map(|c| if c == ' ' { '_' } else { c })
        .collect()
}

/// Local date as `YYYY-MM-DD`.
pub fn today() -> String {
    chrono::Local::now().format("%Y-%m-%d").to_string()
}
