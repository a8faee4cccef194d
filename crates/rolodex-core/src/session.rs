use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

use crate::error::AppError;

/// Page condition polled by [`BrowserSession::wait_until`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitCondition {
    /// `document.readyState` is `complete`.
    DocumentReady,
    /// At least one element matches the CSS selector.
    ElementPresent(String),
    /// The current URL contains the given fragment.
    UrlContains(String),
}

/// One live browser tab.
///
/// Element lookups take CSS selectors and return
/// [`AppError::ElementNotFound`] when nothing matches. Waiting is bounded
/// polling on top of the primitive reads.
pub trait BrowserSession: Send + Sync {
    /// Navigate the tab and wait for the navigation to commit.
    fn goto(&self, url: &str) -> impl Future<Output = Result<(), AppError>> + Send;

    fn current_url(&self) -> impl Future<Output = Result<String, AppError>> + Send;

    /// Visible text of the first match.
    fn text(&self, selector: &str) -> impl Future<Output = Result<String, AppError>> + Send;

    /// Visible text of every match, in document order.
    fn texts(&self, selector: &str) -> impl Future<Output = Result<Vec<String>, AppError>> + Send;

    /// Attribute of the first match; `None` if the element lacks it.
    fn attribute(
        &self,
        selector: &str,
        name: &str,
    ) -> impl Future<Output = Result<Option<String>, AppError>> + Send;

    /// For every element matching `container`, the text of its first
    /// descendant matching `child` (`None` when it has no such descendant).
    fn child_texts(
        &self,
        container: &str,
        child: &str,
    ) -> impl Future<Output = Result<Vec<Option<String>>, AppError>> + Send;

    /// Like [`child_texts`](Self::child_texts) but reads attribute `name`.
    fn child_attributes(
        &self,
        container: &str,
        child: &str,
        name: &str,
    ) -> impl Future<Output = Result<Vec<Option<String>>, AppError>> + Send;

    fn click(&self, selector: &str) -> impl Future<Output = Result<(), AppError>> + Send;

    fn type_text(
        &self,
        selector: &str,
        text: &str,
    ) -> impl Future<Output = Result<(), AppError>> + Send;

    /// Run a JavaScript expression and return its JSON value.
    fn evaluate(
        &self,
        script: &str,
    ) -> impl Future<Output = Result<serde_json::Value, AppError>> + Send;

    /// Delay between condition checks in [`wait_until`](Self::wait_until).
    fn poll_interval(&self) -> Duration {
        Duration::from_millis(250)
    }

    /// Evaluate `condition` once.
    fn check(
        &self,
        condition: &WaitCondition,
    ) -> impl Future<Output = Result<bool, AppError>> + Send {
        async move {
            match condition {
                WaitCondition::DocumentReady => {
                    let state = self.evaluate("document.readyState").await?;
                    Ok(state.as_str() == Some("complete"))
                }
                WaitCondition::ElementPresent(selector) => match self.text(selector).await {
                    Ok(_) => Ok(true),
                    Err(AppError::ElementNotFound(_)) => Ok(false),
                    Err(e) => Err(e),
                },
                WaitCondition::UrlContains(fragment) => {
                    Ok(self.current_url().await?.contains(fragment.as_str()))
                }
            }
        }
    }

    /// Poll `condition` until it holds or `timeout` elapses.
    ///
    /// Fails with [`AppError::Timeout`] on expiry.
    fn wait_until(
        &self,
        condition: WaitCondition,
        timeout: Duration,
    ) -> impl Future<Output = Result<(), AppError>> + Send {
        async move {
            let deadline = Instant::now() + timeout;
            loop {
                if self.check(&condition).await? {
                    return Ok(());
                }
                if Instant::now() >= deadline {
                    tracing::debug!(?condition, "Wait expired");
                    return Err(AppError::Timeout(timeout.as_secs()));
                }
                tokio::time::sleep(self.poll_interval()).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{MockElement, MockPage, MockSession};

    const URL: &str = "https://social.example/feed/";

    #[tokio::test]
    async fn wait_for_document_ready() {
        let session = MockSession::new().page(URL, MockPage::new());
        session.goto(URL).await.unwrap();

        session
            .wait_until(WaitCondition::DocumentReady, Duration::from_millis(50))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn wait_for_element_present() {
        let session = MockSession::new().page(
            URL,
            MockPage::new().element(".share-box", MockElement::text("Start a post")),
        );
        session.goto(URL).await.unwrap();

        session
            .wait_until(
                WaitCondition::ElementPresent(".share-box".into()),
                Duration::from_millis(50),
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn wait_times_out_when_condition_never_holds() {
        let session = MockSession::new().page(URL, MockPage::new());
        session.goto(URL).await.unwrap();

        let err = session
            .wait_until(
                WaitCondition::UrlContains("/checkpoint/".into()),
                Duration::from_millis(30),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Timeout(_)));
    }

    #[tokio::test]
    async fn check_propagates_browser_errors() {
        let session = MockSession::new();

        // No page loaded: the mock reports a browser error for reads.
        let err = session
            .check(&WaitCondition::ElementPresent("body".into()))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::BrowserError(_)));
    }
}
