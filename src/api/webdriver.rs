use crate::browser::{BrowserSession, ClickOutcome, ElementRef, Locator};
use crate::config::BrowserConfig;
use crate::{logi, logw};
use anyhow::{Context, Result};
use async_trait::async_trait;
use rand::seq::SliceRandom;
use reqwest::{Client, Method};
use serde_json::{Value, json};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use thiserror::Error;

/// W3C key under which element references are returned.
const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:125.0) Gecko/20100101 Firefox/125.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Safari/605.1.15",
];

#[derive(Debug, Error)]
#[error("webdriver {error}: {message}")]
pub struct WebDriverError {
    pub error: String,
    pub message: String,
}

impl WebDriverError {
    fn is(&self, code: &str) -> bool {
        self.error == code
    }
}

pub fn random_user_agent() -> &'static str {
    USER_AGENTS
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(USER_AGENTS[0])
}

/// Chrome command line for a synthesis session.
pub fn chrome_args(cfg: &BrowserConfig, user_agent: &str) -> Vec<String> {
    let mut args = Vec::new();
    if cfg.headless {
        args.push("--headless".to_string());
    }
    args.push("--disable-gpu".to_string());
    args.push(format!("--window-size={}", cfg.window_size));
    args.push("--mute-audio".to_string());
    args.push(format!("user-agent={}", user_agent));
    if cfg.hardened {
        args.push("--no-sandbox".to_string());
        args.push("--disable-dev-shm-usage".to_string());
        args.push("--disable-blink-features=AutomationControlled".to_string());
    }
    args
}

fn capabilities(cfg: &BrowserConfig, user_agent: &str) -> Value {
    let mut chrome_options = json!({ "args": chrome_args(cfg, user_agent) });
    if let Some(binary) = &cfg.binary {
        chrome_options["binary"] = json!(binary);
    }
    json!({
        "capabilities": {
            "alwaysMatch": {
                "browserName": "chrome",
                "goog:chromeOptions": chrome_options,
            }
        }
    })
}

fn locator_body(locator: &Locator) -> Value {
    match locator {
        Locator::Id(id) => json!({ "using": "css selector", "value": format!("[id=\"{}\"]", id) }),
        Locator::XPath(xpath) => json!({ "using": "xpath", "value": xpath }),
    }
}

fn element_id(value: &Value) -> Option<ElementRef> {
    value
        .get(ELEMENT_KEY)
        .and_then(|v| v.as_str())
        .map(|id| ElementRef(id.to_string()))
}

fn parse_error(raw: &str, status: u16) -> WebDriverError {
    let parsed: Option<Value> = serde_json::from_str(raw).ok();
    let value = parsed.as_ref().and_then(|root| root.get("value"));
    let field = |name: &str| {
        value
            .and_then(|v| v.get(name))
            .and_then(|v| v.as_str())
            .map(str::to_string)
    };
    WebDriverError {
        error: field("error").unwrap_or_else(|| format!("HTTP {}", status)),
        message: field("message").unwrap_or_else(|| raw.chars().take(200).collect()),
    }
}

/// A live chromedriver session spoken to over the W3C WebDriver protocol.
pub struct WebDriver {
    client: Client,
    base_url: String,
    session_id: String,
    closed: AtomicBool,
}

impl WebDriver {
    pub async fn start(client: Client, cfg: &BrowserConfig) -> Result<Self> {
        let user_agent = random_user_agent();
        logi(format!("Using User-Agent: {}", user_agent));

        let base_url = cfg.webdriver_url.trim_end_matches('/').to_string();
        let resp = client
            .post(format!("{}/session", base_url))
            .json(&capabilities(cfg, user_agent))
            .timeout(Duration::from_secs(120))
            .send()
            .await
            .with_context(|| format!("WebDriver not reachable at {}", base_url))?;

        let status = resp.status();
        let raw = resp
            .text()
            .await
            .context("Failed to read new-session response")?;
        if !status.is_success() {
            return Err(parse_error(&raw, status.as_u16())).context("Failed to create browser session");
        }

        let root: Value = serde_json::from_str(&raw).context("Bad new-session response")?;
        let session_id = root
            .get("value")
            .and_then(|v| v.get("sessionId"))
            .and_then(|v| v.as_str())
            .context("New-session response has no sessionId")?
            .to_string();

        logi(format!("Browser session {} started", session_id));
        Ok(Self {
            client,
            base_url,
            session_id,
            closed: AtomicBool::new(false),
        })
    }

    async fn command(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value> {
        let url = format!("{}/session/{}{}", self.base_url, self.session_id, path);
        let mut req = self
            .client
            .request(method, &url)
            .timeout(Duration::from_secs(60));
        if let Some(body) = body {
            req = req.json(&body);
        }

        let resp = req
            .send()
            .await
            .with_context(|| format!("WebDriver request failed: {}", path))?;
        let status = resp.status();
        let raw = resp
            .text()
            .await
            .with_context(|| format!("Failed to read WebDriver response: {}", path))?;
        if !status.is_success() {
            return Err(parse_error(&raw, status.as_u16()).into());
        }

        let root: Value = serde_json::from_str(&raw)
            .with_context(|| format!("WebDriver response was not JSON: {}", path))?;
        Ok(root.get("value").cloned().unwrap_or(Value::Null))
    }

    fn element_path(element: &ElementRef, suffix: &str) -> String {
        format!("/element/{}{}", element.0, suffix)
    }
}

#[async_trait]
impl BrowserSession for WebDriver {
    async fn navigate(&self, url: &str) -> Result<()> {
        self.command(Method::POST, "/url", Some(json!({ "url": url })))
            .await?;
        Ok(())
    }

    async fn find(&self, locator: &Locator) -> Result<Option<ElementRef>> {
        match self
            .command(Method::POST, "/element", Some(locator_body(locator)))
            .await
        {
            Ok(value) => Ok(element_id(&value)),
            Err(err) => match err.downcast_ref::<WebDriverError>() {
                Some(wd) if wd.is("no such element") => Ok(None),
                _ => Err(err),
            },
        }
    }

    async fn clear(&self, element: &ElementRef) -> Result<()> {
        self.command(Method::POST, &Self::element_path(element, "/clear"), Some(json!({})))
            .await?;
        Ok(())
    }

    async fn send_keys(&self, element: &ElementRef, text: &str) -> Result<()> {
        self.command(
            Method::POST,
            &Self::element_path(element, "/value"),
            Some(json!({ "text": text })),
        )
        .await?;
        Ok(())
    }

    async fn scroll_into_view(&self, element: &ElementRef) -> Result<()> {
        let body = json!({
            "script": "arguments[0].scrollIntoView(true);",
            "args": [{ ELEMENT_KEY: element.0 }],
        });
        self.command(Method::POST, "/execute/sync", Some(body)).await?;
        Ok(())
    }

    async fn click(&self, element: &ElementRef) -> Result<ClickOutcome> {
        match self
            .command(Method::POST, &Self::element_path(element, "/click"), Some(json!({})))
            .await
        {
            Ok(_) => Ok(ClickOutcome::Clicked),
            Err(err) => match err.downcast_ref::<WebDriverError>() {
                Some(wd) if wd.is("element click intercepted") => Ok(ClickOutcome::Intercepted),
                _ => Err(err),
            },
        }
    }

    async fn attribute(&self, element: &ElementRef, name: &str) -> Result<Option<String>> {
        let value = self
            .command(
                Method::GET,
                &Self::element_path(element, &format!("/attribute/{}", name)),
                None,
            )
            .await?;
        Ok(value.as_str().map(str::to_string))
    }

    async fn quit(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.command(Method::DELETE, "", None).await?;
        logi(format!("Browser session {} closed", self.session_id));
        Ok(())
    }
}

impl Drop for WebDriver {
    fn drop(&mut self) {
        if self.closed.load(Ordering::SeqCst) {
            return;
        }
        logw(format!(
            "Browser session {} dropped without quit; closing it",
            self.session_id
        ));
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let client = self.client.clone();
        let url = format!("{}/session/{}", self.base_url, self.session_id);
        handle.spawn(async move {
            let _ = client.delete(url).send().await;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hardening_flags_follow_config() {
        let mut cfg = BrowserConfig::default();
        let args = chrome_args(&cfg, "UA");
        assert!(args.contains(&"--headless".to_string()));
        assert!(args.contains(&"--no-sandbox".to_string()));
        assert!(args.contains(&"user-agent=UA".to_string()));
        assert!(args.contains(&"--window-size=1920,1080".to_string()));

        cfg.hardened = false;
        cfg.headless = false;
        let args = chrome_args(&cfg, "UA");
        assert!(!args.contains(&"--headless".to_string()));
        assert!(!args.contains(&"--no-sandbox".to_string()));
        assert!(!args.contains(&"--disable-dev-shm-usage".to_string()));
        assert!(args.contains(&"--mute-audio".to_string()));
    }

    #[test]
    fn capabilities_carry_binary() {
        let cfg = BrowserConfig {
            binary: Some("/usr/bin/chromium".to_string()),
            ..BrowserConfig::default()
        };
        let caps = capabilities(&cfg, "UA");
        let opts = &caps["capabilities"]["alwaysMatch"]["goog:chromeOptions"];
        assert_eq!(opts["binary"], "/usr/bin/chromium");
        assert!(opts["args"].as_array().unwrap().len() >= 5);
    }

    #[test]
    fn element_reference_is_extracted() {
        let value = json!({ ELEMENT_KEY: "abc-123" });
        assert_eq!(element_id(&value), Some(ElementRef("abc-123".into())));
        assert_eq!(element_id(&json!({})), None);
    }

    #[test]
    fn locators_map_to_strategies() {
        let by_id = locator_body(&Locator::id("promptText"));
        assert_eq!(by_id["using"], "css selector");
        assert_eq!(by_id["value"], "[id=\"promptText\"]");
        let by_xpath = locator_body(&Locator::xpath("//audio"));
        assert_eq!(by_xpath["using"], "xpath");
    }

    #[test]
    fn driver_errors_are_decoded() {
        let raw = r#"{"value":{"error":"no such element","message":"Unable to locate element","stacktrace":""}}"#;
        let err = parse_error(raw, 404);
        assert!(err.is("no such element"));
        assert_eq!(err.message, "Unable to locate element");

        let err = parse_error("gateway down", 502);
        assert_eq!(err.error, "HTTP 502");
        assert_eq!(err.message, "gateway down");
    }

    #[test]
    fn user_agent_comes_from_pool() {
        assert!(USER_AGENTS.contains(&random_user_agent()));
    }

    /// Serves one request: reads it fully, answers 500 with a body cut short.
    async fn truncated_reply_server() -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&request);
                if let Some(end) = text.find("\r\n\r\n") {
                    let body_len = text[..end]
                        .lines()
                        .find_map(|l| {
                            let (name, value) = l.split_once(':')?;
                            name.eq_ignore_ascii_case("content-length")
                                .then(|| value.trim().parse::<usize>().ok())
                                .flatten()
                        })
                        .unwrap_or(0);
                    if request.len() >= end + 4 + body_len {
                        break;
                    }
                }
            }
            socket
                .write_all(
                    b"HTTP/1.1 500 Internal Server Error\r\nContent-Type: application/json\r\nContent-Length: 100\r\n\r\n{\"va",
                )
                .await
                .unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn unreadable_reply_body_is_reported() {
        let cfg = BrowserConfig {
            webdriver_url: truncated_reply_server().await,
            ..BrowserConfig::default()
        };
        let err = match WebDriver::start(Client::new(), &cfg).await {
            Ok(_) => panic!("session should not start"),
            Err(err) => format!("{:#}", err),
        };
        assert!(err.contains("Failed to read new-session response"), "{}", err);
        assert!(!err.contains("HTTP 500"), "{}", err);
    }
}
