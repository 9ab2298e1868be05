use crate::logw;
use crate::quote::Quote;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;

#[async_trait]
pub trait QuoteSource: Send + Sync {
    /// `None` when the remote is unreachable, answers non-200, or sends junk.
    async fn fetch_quote(&self) -> Option<Quote>;
}

pub struct ZenQuotes {
    client: Client,
    url: String,
}

impl ZenQuotes {
    pub fn new(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl QuoteSource for ZenQuotes {
    async fn fetch_quote(&self) -> Option<Quote> {
        let resp = match self
            .client
            .get(&self.url)
            .timeout(Duration::from_secs(30))
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(err) => {
                logw(format!("Quote request failed: {}", err));
                return None;
            }
        };

        if resp.status() != StatusCode::OK {
            logw(format!("Quote API HTTP {}", resp.status().as_u16()));
            return None;
        }

        let body = match resp.text().await {
            Ok(body) => body,
            Err(err) => {
                logw(format!("Quote response read failed: {}", err));
                return None;
            }
        };

        match Quote::from_zenquotes_json(&body) {
            Ok(quote) => Some(quote),
            Err(err) => {
                let snippet = body.chars().take(200).collect::<String>();
                logw(format!("{:#} (body starts: {})", err, snippet));
                None
            }
        }
    }
}
