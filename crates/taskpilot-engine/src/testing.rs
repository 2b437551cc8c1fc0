//! Scripted page backend for unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::page::{ElementHandle, Locator, PageCapability, PageConnector, PageError};

pub(crate) const PNG: &[u8] = &[0x89, b'P', b'N', b'G'];

pub(crate) const HTML: &str =
    "<html><head><title>Example Domain</title></head><body><h1>Example</h1></body></html>";

/// Shared script and call log behind every [`ScriptedPage`] of a connector.
#[derive(Default)]
pub(crate) struct PageScript {
    calls: Mutex<Vec<String>>,
    resolvable: Mutex<Vec<Locator>>,
    broken: Mutex<Vec<String>>,
    failures: Mutex<HashMap<&'static str, PageError>>,
    gate: Mutex<Option<mpsc::Receiver<()>>>,
    close_delay: Mutex<Duration>,
    open: AtomicUsize,
    max_open: AtomicUsize,
}

impl PageScript {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make `locator` resolve. Elements are named `el-<n>` in the order
    /// their locators were added.
    pub(crate) fn resolve(&self, locator: Locator) -> ElementHandle {
        let mut resolvable = self.resolvable.lock();
        resolvable.push(locator);
        ElementHandle::new(format!("el-{}", resolvable.len() - 1))
    }

    /// Fill and click on `element` fail with an operation error.
    pub(crate) fn break_element(&self, element: &ElementHandle) {
        self.broken.lock().push(element.id().to_string());
    }

    /// Every call to `op` fails with `error`.
    pub(crate) fn fail(&self, op: &'static str, error: PageError) {
        self.failures.lock().insert(op, error);
    }

    /// Block each navigation until a permit is sent.
    pub(crate) fn gate_navigation(&self) -> mpsc::Sender<()> {
        let (tx, rx) = mpsc::channel();
        *self.gate.lock() = Some(rx);
        tx
    }

    /// Make every close take `delay` before the page counts as released.
    pub(crate) fn slow_close(&self, delay: Duration) {
        *self.close_delay.lock() = delay;
    }

    /// Pages connected and not yet closed.
    pub(crate) fn open_pages(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }

    /// Highest number of pages open at the same time.
    pub(crate) fn max_open_pages(&self) -> usize {
        self.max_open.load(Ordering::SeqCst)
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub(crate) fn count(&self, op: &str) -> usize {
        let prefix = format!("{}:", op);
        self.calls
            .lock()
            .iter()
            .filter(|c| c.starts_with(&prefix) || c.as_str() == op)
            .count()
    }

    fn record(&self, op: &'static str, detail: &str) -> Result<(), PageError> {
        self.calls.lock().push(if detail.is_empty() {
            op.to_string()
        } else {
            format!("{}:{}", op, detail)
        });
        match self.failures.lock().get(op) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    fn check_element(&self, element: &ElementHandle) -> Result<(), PageError> {
        if self.broken.lock().iter().any(|id| id == element.id()) {
            return Err(PageError::Operation(format!("{} is not interactable", element.id())));
        }
        Ok(())
    }
}

pub(crate) struct ScriptedPage {
    script: Arc<PageScript>,
}

impl PageCapability for ScriptedPage {
    fn navigate(&self, url: &str) -> Result<String, PageError> {
        self.script.record("navigate", url)?;
        let gate = self.script.gate.lock();
        if let Some(rx) = gate.as_ref() {
            rx.recv_timeout(Duration::from_secs(10))
                .map_err(|_| PageError::Timeout(Duration::from_secs(10)))?;
        }
        Ok(url.to_string())
    }

    fn locate(&self, locator: &Locator, _timeout: Duration) -> Result<Option<ElementHandle>, PageError> {
        self.script.record("locate", &locator.to_string())?;
        let resolvable = self.script.resolvable.lock();
        Ok(resolvable
            .iter()
            .position(|l| l == locator)
            .map(|idx| ElementHandle::new(format!("el-{}", idx))))
    }

    fn fill(&self, element: &ElementHandle, value: &str) -> Result<(), PageError> {
        self.script.record("fill", &format!("{}={}", element.id(), value))?;
        self.script.check_element(element)
    }

    fn click(&self, element: &ElementHandle) -> Result<(), PageError> {
        self.script.record("click", element.id())?;
        self.script.check_element(element)
    }

    fn press_enter(&self, element: &ElementHandle) -> Result<(), PageError> {
        self.script.record("enter", element.id())
    }

    fn snapshot(&self) -> Result<Vec<u8>, PageError> {
        self.script.record("snapshot", "")?;
        Ok(PNG.to_vec())
    }

    fn title(&self) -> Result<String, PageError> {
        self.script.record("title", "")?;
        Ok("Example Domain".to_string())
    }

    fn content(&self) -> Result<String, PageError> {
        self.script.record("content", "")?;
        Ok(HTML.to_string())
    }

    fn current_url(&self) -> Result<String, PageError> {
        self.script.record("current_url", "")?;
        Ok(String::new())
    }

    fn close(&self) -> Result<(), PageError> {
        let delay = *self.script.close_delay.lock();
        thread::sleep(delay);
        self.script.open.fetch_sub(1, Ordering::SeqCst);
        self.script.record("close", "")
    }
}

impl ScriptedPage {
    pub(crate) fn new(script: Arc<PageScript>) -> Self {
        Self { script }
    }
}

pub(crate) struct ScriptedConnector {
    script: Arc<PageScript>,
}

impl ScriptedConnector {
    pub(crate) fn new(script: Arc<PageScript>) -> Self {
        Self { script }
    }
}

impl PageConnector for ScriptedConnector {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn connect(&self) -> Result<Box<dyn PageCapability>, PageError> {
        let open = self.script.open.fetch_add(1, Ordering::SeqCst) + 1;
        self.script.max_open.fetch_max(open, Ordering::SeqCst);
        Ok(Box::new(ScriptedPage::new(self.script.clone())))
    }
}

/// Poll `condition` until it holds or a few seconds pass.
pub(crate) async fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}
