use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use chromiumoxide::{Browser, BrowserConfig, Element, Page};
use futures::StreamExt;
use rolodex_core::error::AppError;
use rolodex_core::session::BrowserSession;
use tokio::task::JoinHandle;

/// Launch options for [`ChromeSession`].
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Persistent profile directory; keeps the login between runs.
    pub profile_dir: PathBuf,
    pub headless: bool,
    pub window_size: (u32, u32),
    /// Bound on each DevTools command and on every session operation.
    pub request_timeout: Duration,
    /// Explicit browser binary; otherwise well-known paths are probed.
    pub chrome_executable: Option<PathBuf>,
    pub block_images: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            profile_dir: PathBuf::from("data_folder/chrome_profile"),
            headless: false,
            window_size: (1280, 900),
            request_timeout: Duration::from_secs(30),
            chrome_executable: None,
            block_images: true,
        }
    }
}

impl SessionConfig {
    fn extra_args(&self) -> Vec<&'static str> {
        let mut args = vec![
            "--disable-gpu",
            "--disable-dev-shm-usage",
            "--disable-extensions",
            "--disable-popup-blocking",
            "--disable-translate",
            "--no-first-run",
            "--lang=en-US",
        ];
        if self.headless {
            args.push("--headless=new");
        }
        if self.block_images {
            args.push("--blink-settings=imagesEnabled=false");
        }
        args
    }
}

/// One Chromium tab driven over the DevTools protocol.
///
/// The browser runs with a persistent profile so a previous login is reused.
/// Every operation is bounded by the configured request timeout.
pub struct ChromeSession {
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
    timeout: Duration,
}

impl ChromeSession {
    pub async fn launch(config: &SessionConfig) -> Result<Self, AppError> {
        std::fs::create_dir_all(&config.profile_dir).map_err(|e| {
            AppError::IoError(format!(
                "Failed to create profile dir {}: {e}",
                config.profile_dir.display()
            ))
        })?;

        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .disable_default_args()
            .user_data_dir(&config.profile_dir)
            .window_size(config.window_size.0, config.window_size.1)
            .request_timeout(config.request_timeout);

        if !config.headless {
            builder = builder.with_head();
        }

        if let Some(bin) = config.chrome_executable.clone().or_else(find_chrome_binary) {
            tracing::info!("Using Chrome binary: {}", bin.display());
            builder = builder.chrome_executable(bin);
        }

        for arg in config.extra_args() {
            builder = builder.arg(arg);
        }

        let browser_config = builder
            .build()
            .map_err(|e| AppError::BrowserError(format!("Browser config error: {e}")))?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| AppError::BrowserError(format!("Failed to launch browser: {e}")))?;

        // The CDP handler must be polled continuously for the connection to work.
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    tracing::warn!("Browser CDP handler error: {event:?}");
                    break;
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| AppError::BrowserError(format!("Failed to open tab: {e}")))?;

        tracing::info!(
            headless = config.headless,
            profile = %config.profile_dir.display(),
            "Browser session started"
        );

        Ok(Self {
            browser,
            page,
            handler,
            timeout: config.request_timeout,
        })
    }

    /// Close the browser and wait for the process to exit.
    pub async fn close(mut self) -> Result<(), AppError> {
        let closed = self.browser.close().await;
        let _ = self.browser.wait().await;
        self.handler.abort();
        closed
            .map(|_| ())
            .map_err(|e| AppError::BrowserError(format!("Failed to close browser: {e}")))
    }

    async fn bounded<T>(
        &self,
        op: impl Future<Output = Result<T, AppError>>,
    ) -> Result<T, AppError> {
        tokio::time::timeout(self.timeout, op)
            .await
            .map_err(|_| AppError::Timeout(self.timeout.as_secs()))?
    }

    async fn element(&self, selector: &str) -> Result<Element, AppError> {
        self.page
            .find_element(selector)
            .await
            .map_err(|_| AppError::ElementNotFound(selector.to_string()))
    }

    async fn elements(&self, selector: &str) -> Result<Vec<Element>, AppError> {
        self.page
            .find_elements(selector)
            .await
            .map_err(|e| AppError::BrowserError(format!("Query '{selector}' failed: {e}")))
    }
}

async fn inner_text(element: &Element) -> Result<String, AppError> {
    element
        .inner_text()
        .await
        .map(Option::unwrap_or_default)
        .map_err(|e| AppError::BrowserError(format!("Failed to read text: {e}")))
}

/// Tries to locate a Chrome/Chromium binary.
///
/// The snap wrapper at `/snap/bin/chromium` strips unknown CLI flags, so the
/// real binary inside the snap is preferred. `None` lets `chromiumoxide` do
/// its own lookup.
fn find_chrome_binary() -> Option<PathBuf> {
    let candidates: &[&str] = &[
        "/snap/chromium/current/usr/lib/chromium-browser/chrome",
        "/var/lib/flatpak/exports/bin/org.chromium.Chromium",
        "/usr/bin/google-chrome-stable",
        "/usr/bin/google-chrome",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    ];

    candidates
        .iter()
        .map(PathBuf::from)
        .find(|p| p.exists())
}

impl BrowserSession for ChromeSession {
    async fn goto(&self, url: &str) -> Result<(), AppError> {
        tracing::debug!(%url, "Navigating");
        self.bounded(async {
            self.page
                .goto(url)
                .await
                .map(|_| ())
                .map_err(|e| AppError::NavigationError(format!("Failed to open {url}: {e}")))
        })
        .await
    }

    async fn current_url(&self) -> Result<String, AppError> {
        self.bounded(async {
            self.page
                .url()
                .await
                .map(Option::unwrap_or_default)
                .map_err(|e| AppError::BrowserError(format!("Failed to read URL: {e}")))
        })
        .await
    }

    async fn text(&self, selector: &str) -> Result<String, AppError> {
        self.bounded(async {
            let element = self.element(selector).await?;
            inner_text(&element).await
        })
        .await
    }

    async fn texts(&self, selector: &str) -> Result<Vec<String>, AppError> {
        self.bounded(async {
            let mut out = Vec::new();
            for element in self.elements(selector).await? {
                out.push(inner_text(&element).await?);
            }
            Ok(out)
        })
        .await
    }

    async fn attribute(&self, selector: &str, name: &str) -> Result<Option<String>, AppError> {
        self.bounded(async {
            self.element(selector)
                .await?
                .attribute(name)
                .await
                .map_err(|e| AppError::BrowserError(format!("Failed to read '{name}': {e}")))
        })
        .await
    }

    async fn child_texts(
        &self,
        container: &str,
        child: &str,
    ) -> Result<Vec<Option<String>>, AppError> {
        self.bounded(async {
            let mut out = Vec::new();
            for element in self.elements(container).await? {
                let text = match element.find_element(child).await {
                    Ok(found) => inner_text(&found).await.ok(),
                    Err(_) => None,
                };
                out.push(text);
            }
            Ok(out)
        })
        .await
    }

    async fn child_attributes(
        &self,
        container: &str,
        child: &str,
        name: &str,
    ) -> Result<Vec<Option<String>>, AppError> {
        self.bounded(async {
            let mut out = Vec::new();
            for element in self.elements(container).await? {
                let value = match element.find_element(child).await {
                    Ok(found) => found.attribute(name).await.ok().flatten(),
                    Err(_) => None,
                };
                out.push(value);
            }
            Ok(out)
        })
        .await
    }

    async fn click(&self, selector: &str) -> Result<(), AppError> {
        self.bounded(async {
            self.element(selector)
                .await?
                .click()
                .await
                .map(|_| ())
                .map_err(|e| AppError::BrowserError(format!("Failed to click '{selector}': {e}")))
        })
        .await
    }

    async fn type_text(&self, selector: &str, text: &str) -> Result<(), AppError> {
        self.bounded(async {
            let element = self.element(selector).await?;
            element
                .click()
                .await
                .map_err(|e| AppError::BrowserError(format!("Failed to focus '{selector}': {e}")))?;
            element
                .type_str(text)
                .await
                .map(|_| ())
                .map_err(|e| AppError::BrowserError(format!("Failed to type into '{selector}': {e}")))
        })
        .await
    }

    async fn evaluate(&self, script: &str) -> Result<serde_json::Value, AppError> {
        self.bounded(async {
            let result = self
                .page
                .evaluate(script)
                .await
                .map_err(|e| AppError::BrowserError(format!("Script failed: {e}")))?;
            Ok(result.value().cloned().unwrap_or(serde_json::Value::Null))
        })
        .await
    }
}
