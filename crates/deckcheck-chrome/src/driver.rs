//! Chrome DevTools Protocol slide driver.
//!
//! Every `load` launches its own headless Chrome with a throwaway profile
//! directory, so concurrent runs never share cookies, storage or viewport
//! state.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::{CaptureScreenshotFormat, Viewport as ClipRegion};
use chromiumoxide::handler::viewport::Viewport as PageViewport;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::Page;
use deckcheck_core::{
    DeckError, DriverConfig, DriverHandle, DriverOptions, NavigationMode, Rect, RendererKind,
    Result, SlideDriver, SlideSnapshot, Viewport,
};
use futures::StreamExt;
use serde::de::DeserializeOwned;
use tempfile::TempDir;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::renderer::{pick_ready, probe_expr, Renderer};
use crate::script::inspect_script;
use crate::target::resolve_target;

/// Interval between readiness probes while loading.
const READY_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Chrome driver settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ChromeConfig {
    pub renderer: RendererKind,
    pub headless: bool,
    pub chrome_path: Option<PathBuf>,
    pub options: DriverOptions,
}

impl Default for ChromeConfig {
    fn default() -> Self {
        Self::from(&DriverConfig::default())
    }
}

impl From<&DriverConfig> for ChromeConfig {
    fn from(config: &DriverConfig) -> Self {
        Self {
            renderer: config.renderer,
            headless: config.headless,
            chrome_path: config.chrome_path.clone(),
            options: config.options(),
        }
    }
}

/// `SlideDriver` backed by a local Chrome/Chromium.
#[derive(Debug, Clone, Default)]
pub struct ChromeDriver {
    config: ChromeConfig,
}

impl ChromeDriver {
    pub fn new(config: ChromeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ChromeConfig {
        &self.config
    }

    fn browser_config(&self, viewport: Viewport, profile: &Path) -> Result<BrowserConfig> {
        let mut builder = BrowserConfig::builder()
            .window_size(viewport.width, viewport.height)
            .viewport(PageViewport {
                width: viewport.width,
                height: viewport.height,
                device_scale_factor: Some(1.0),
                emulating_mobile: false,
                is_landscape: viewport.width >= viewport.height,
                has_touch: false,
            })
            .user_data_dir(profile)
            .arg("--hide-scrollbars");
        if !self.config.headless {
            builder = builder.with_head();
        }
        if let Some(path) = &self.config.chrome_path {
            builder = builder.chrome_executable(path);
        }
        builder
            .build()
            .map_err(|e| DeckError::Config(format!("invalid browser configuration: {}", e)))
    }
}

#[async_trait]
impl SlideDriver for ChromeDriver {
    async fn load(&self, target: &str, viewport: Viewport) -> Result<Box<dyn DriverHandle>> {
        let url = resolve_target(target)?;
        let profile = tempfile::Builder::new()
            .prefix("deckcheck-profile-")
            .tempdir()?;

        let (browser, mut handler) = Browser::launch(self.browser_config(viewport, profile.path())?)
            .await
            .map_err(|e| DeckError::Navigation(format!("cannot launch browser: {}", e)))?;
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(err) = event {
                    debug!(error = %err, "CDP handler stopped");
                    break;
                }
            }
        });

        let mut handle = ChromeHandle {
            browser: Some(browser),
            page: None,
            handler_task: Some(handler_task),
            renderer: Renderer::Reveal,
            options: self.config.options,
            total: None,
            _profile: profile,
        };

        match handle.open(url.as_str(), target, self.config.renderer).await {
            Ok(()) => {
                info!(
                    target = %target,
                    renderer = handle.renderer.name(),
                    viewport = %viewport,
                    "presentation ready"
                );
                Ok(Box::new(handle))
            }
            Err(err) => {
                handle.close().await.ok();
                Err(err)
            }
        }
    }
}

/// One browser, one page, one presentation.
pub struct ChromeHandle {
    browser: Option<Browser>,
    page: Option<Page>,
    handler_task: Option<JoinHandle<()>>,
    renderer: Renderer,
    options: DriverOptions,
    total: Option<usize>,
    // Declared last: removed after the browser has been dropped.
    _profile: TempDir,
}

impl ChromeHandle {
    /// Open `url` and wait, bounded by the load timeout, until a candidate
    /// renderer reports ready.
    async fn open(&mut self, url: &str, target: &str, kind: RendererKind) -> Result<()> {
        let browser = self
            .browser
            .as_ref()
            .ok_or_else(|| DeckError::RendererNotReady("browser not running".into()))?;
        let candidates = Renderer::candidates(kind);
        let probe = probe_expr(&candidates);
        let timeout = self.options.load_timeout();

        let opened = tokio::time::timeout(timeout, async {
            let page = match browser.new_page(url).await {
                Ok(page) => page,
                Err(e) => return Err(DeckError::Navigation(format!("{}: {}", url, e))),
            };
            loop {
                // Errors are expected while the document is still loading.
                if let Ok(result) = page.evaluate(probe.clone()).await {
                    if let Ok(value) = result.into_value::<serde_json::Value>() {
                        if let Some(renderer) = pick_ready(&candidates, &value) {
                            return Ok((page, renderer));
                        }
                    }
                }
                tokio::time::sleep(READY_POLL_INTERVAL).await;
            }
        })
        .await;

        match opened {
            Ok(Ok((page, renderer))) => {
                self.page = Some(page);
                self.renderer = renderer;
                Ok(())
            }
            Ok(Err(err)) => Err(err),
            Err(_) => Err(DeckError::LoadTimeout {
                target: target.to_string(),
                timeout_ms: self.options.load_timeout_ms,
            }),
        }
    }

    fn page(&self) -> Result<&Page> {
        self.page
            .as_ref()
            .ok_or_else(|| DeckError::RendererNotReady("browser context is closed".into()))
    }

    async fn eval<T: DeserializeOwned>(
        &self,
        expression: String,
        wrap: fn(String) -> DeckError,
    ) -> Result<T> {
        let result = self
            .page()?
            .evaluate(expression)
            .await
            .map_err(|e| wrap(e.to_string()))?;
        result.into_value::<T>().map_err(|e| wrap(e.to_string()))
    }
}

#[async_trait]
impl DriverHandle for ChromeHandle {
    fn renderer(&self) -> &str {
        self.renderer.name()
    }

    fn navigation_mode(&self) -> NavigationMode {
        self.renderer.navigation_mode()
    }

    fn settle_delay(&self) -> Duration {
        self.options.settle_delay()
    }

    async fn total_slides(&mut self) -> Result<usize> {
        if let Some(total) = self.total {
            self.page()?;
            return Ok(total);
        }
        let total: usize = self
            .eval(self.renderer.count_expr().to_string(), DeckError::Navigation)
            .await?;
        self.total = Some(total);
        Ok(total)
    }

    async fn go_to(&mut self, index: usize) -> Result<()> {
        let total = self.total_slides().await?;
        if index >= total {
            return Err(DeckError::IndexOutOfRange { index, total });
        }
        let expression = self.renderer.jump_expr(index).ok_or_else(|| {
            DeckError::Navigation(format!("renderer '{}' has no jump API", self.renderer.name()))
        })?;
        let moved: bool = self.eval(expression, DeckError::Navigation).await?;
        if !moved {
            return Err(DeckError::Navigation(format!(
                "renderer '{}' refused to show slide {}",
                self.renderer.name(),
                index
            )));
        }
        tokio::time::sleep(self.options.settle_delay()).await;
        Ok(())
    }

    async fn inspect(&mut self, selectors: &BTreeSet<String>) -> Result<SlideSnapshot> {
        let script = inspect_script(self.renderer.root_expr(), selectors);
        self.eval(script, DeckError::Inspection).await
    }

    async fn screenshot(&mut self, path: &Path, clip: Option<Rect>) -> Result<()> {
        let page = self.page()?;
        let mut params = ScreenshotParams::builder().format(CaptureScreenshotFormat::Png);
        if let Some(rect) = clip {
            params = params.clip(ClipRegion {
                x: rect.x,
                y: rect.y,
                width: rect.width,
                height: rect.height,
                scale: 1.0,
            });
        }
        page.save_screenshot(params.build(), path)
            .await
            .map_err(|e| DeckError::Capture(format!("{}: {}", path.display(), e)))?;
        Ok(())
    }

    async fn send_key(&mut self, key: &str) -> Result<()> {
        let body = self
            .page()?
            .find_element("body")
            .await
            .map_err(|e| DeckError::Navigation(e.to_string()))?;
        body.press_key(key)
            .await
            .map_err(|e| DeckError::Navigation(format!("key '{}': {}", key, e)))?;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(page) = self.page.take() {
            if let Err(err) = page.close().await {
                debug!(error = %err, "closing page failed");
            }
        }
        if let Some(mut browser) = self.browser.take() {
            if let Err(err) = browser.close().await {
                debug!(error = %err, "closing browser failed");
            }
            if let Err(err) = browser.wait().await {
                debug!(error = %err, "waiting for browser exit failed");
            }
        }
        if let Some(task) = self.handler_task.take() {
            task.abort();
            task.await.ok();
        }
        Ok(())
    }
}

impl Drop for ChromeHandle {
    fn drop(&mut self) {
        if let Some(task) = self.handler_task.take() {
            task.abort();
        }
    }
}
