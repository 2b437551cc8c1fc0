//! W3C WebDriver page backend.
//!
//! Speaks the plain JSON wire protocol over a blocking HTTP client, so it
//! must only be used from the worker thread.

use std::thread;
use std::time::{Duration, Instant};

use base64::Engine;
use reqwest::blocking::Client;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::page::{ElementHandle, Locator, PageCapability, PageConnector, PageError};

/// Key under which W3C drivers return element references.
const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

const ENTER_KEY: &str = "\u{E007}";

const COMMAND_TIMEOUT: Duration = Duration::from_secs(60);

const LOCATE_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Opens WebDriver sessions against `endpoint`.
#[derive(Debug, Clone)]
pub struct WebDriverConnector {
    endpoint: String,
    headless: bool,
}

impl WebDriverConnector {
    pub fn new(endpoint: impl Into<String>, headless: bool) -> Self {
        Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            headless,
        }
    }

    fn capabilities(&self) -> Value {
        let mut args = vec!["--window-size=1280,800", "--disable-gpu"];
        if self.headless {
            args.push("--headless=new");
        }
        json!({
            "capabilities": {
                "alwaysMatch": {
                    "browserName": "chrome",
                    "goog:chromeOptions": { "args": args }
                }
            }
        })
    }
}

impl PageConnector for WebDriverConnector {
    fn name(&self) -> &'static str {
        "webdriver"
    }

    fn connect(&self) -> Result<Box<dyn PageCapability>, PageError> {
        let client = Client::builder()
            .timeout(COMMAND_TIMEOUT)
            .build()
            .map_err(|e| PageError::Unavailable(e.to_string()))?;

        let url = format!("{}/session", self.endpoint);
        let value = send(&client, Method::POST, &url, Some(self.capabilities()))?;
        let session_id = value
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| PageError::Unavailable("driver returned no session id".into()))?;

        info!(endpoint = %self.endpoint, session_id = %session_id, "WebDriver session opened");

        Ok(Box::new(WebDriverPage {
            client,
            session_url: format!("{}/session/{}", self.endpoint, session_id),
        }))
    }
}

/// One WebDriver session.
pub struct WebDriverPage {
    client: Client,
    session_url: String,
}

impl WebDriverPage {
    fn command(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value, PageError> {
        let url = format!("{}{}", self.session_url, path);
        send(&self.client, method, &url, body)
    }

    fn element_command(
        &self,
        element: &ElementHandle,
        action: &str,
        body: Value,
    ) -> Result<(), PageError> {
        let path = format!("/element/{}/{}", element.id(), action);
        self.command(Method::POST, &path, Some(body)).map(|_| ())
    }

    fn find(&self, locator: &Locator) -> Result<ElementHandle, PageError> {
        let using = match locator {
            Locator::Css(_) => "css selector",
            Locator::XPath(_) => "xpath",
        };
        let value = self.command(
            Method::POST,
            "/element",
            Some(json!({ "using": using, "value": locator.as_str() })),
        )?;
        element_id(&value)
            .map(ElementHandle::new)
            .ok_or_else(|| PageError::Operation("driver returned no element reference".into()))
    }

    fn string_command(&self, path: &str) -> Result<String, PageError> {
        let value = self.command(Method::GET, path, None)?;
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| PageError::Operation(format!("unexpected response for {}", path)))
    }
}

impl PageCapability for WebDriverPage {
    fn navigate(&self, url: &str) -> Result<String, PageError> {
        self.command(Method::POST, "/url", Some(json!({ "url": url })))?;
        self.current_url()
    }

    fn locate(
        &self,
        locator: &Locator,
        timeout: Duration,
    ) -> Result<Option<ElementHandle>, PageError> {
        let deadline = Instant::now() + timeout;
        loop {
            match self.find(locator) {
                Ok(handle) => return Ok(Some(handle)),
                Err(PageError::NotFound) => {}
                Err(e) => return Err(e),
            }
            let now = Instant::now();
            if now >= deadline {
                debug!(locator = %locator, "Locator resolved nothing before timeout");
                return Ok(None);
            }
            thread::sleep(LOCATE_POLL_INTERVAL.min(deadline - now));
        }
    }

    fn fill(&self, element: &ElementHandle, value: &str) -> Result<(), PageError> {
        self.element_command(element, "clear", json!({}))?;
        self.element_command(element, "value", json!({ "text": value }))
    }

    fn click(&self, element: &ElementHandle) -> Result<(), PageError> {
        self.element_command(element, "click", json!({}))
    }

    fn press_enter(&self, element: &ElementHandle) -> Result<(), PageError> {
        self.element_command(element, "value", json!({ "text": ENTER_KEY }))
    }

    fn snapshot(&self) -> Result<Vec<u8>, PageError> {
        let encoded = self.string_command("/screenshot")?;
        base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| PageError::Operation(format!("invalid screenshot encoding: {}", e)))
    }

    fn title(&self) -> Result<String, PageError> {
        self.string_command("/title")
    }

    fn content(&self) -> Result<String, PageError> {
        self.string_command("/source")
    }

    fn current_url(&self) -> Result<String, PageError> {
        self.string_command("/url")
    }

    fn close(&self) -> Result<(), PageError> {
        self.command(Method::DELETE, "", None).map(|_| ())
    }
}

fn send(client: &Client, method: Method, url: &str, body: Option<Value>) -> Result<Value, PageError> {
    let mut request = client.request(method, url);
    if let Some(body) = body {
        request = request.json(&body);
    }

    let response = request.send().map_err(map_transport_error)?;
    let status = response.status();
    let payload: Value = response
        .json()
        .map_err(|e| PageError::Operation(format!("invalid driver response: {}", e)))?;
    let value = payload.get("value").cloned().unwrap_or(Value::Null);

    if status.is_success() {
        return Ok(value);
    }

    let code = value.get("error").and_then(Value::as_str).unwrap_or("unknown error");
    let message = value.get("message").and_then(Value::as_str).unwrap_or_default();
    Err(map_driver_error(code, message))
}

fn map_transport_error(err: reqwest::Error) -> PageError {
    if err.is_timeout() {
        PageError::Timeout(COMMAND_TIMEOUT)
    } else if err.is_connect() {
        PageError::Unavailable(err.to_string())
    } else {
        PageError::Operation(err.to_string())
    }
}

/// Map a W3C error code to a page error.
fn map_driver_error(code: &str, message: &str) -> PageError {
    match code {
        "no such element" | "stale element reference" => PageError::NotFound,
        "invalid session id" | "no such window" | "session not created" => {
            PageError::SessionLost(format!("{}: {}", code, message))
        }
        "timeout" | "script timeout" => PageError::Timeout(COMMAND_TIMEOUT),
        _ => PageError::Operation(format!("{}: {}", code, message)),
    }
}

fn element_id(value: &Value) -> Option<String> {
    value
        .get(ELEMENT_KEY)
        .or_else(|| value.get("ELEMENT"))
        .and_then(Value::as_str)
        .map(str::to_string)
}
