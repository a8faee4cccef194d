use std::time::Duration;

use crate::config::Credentials;
use crate::error::AppError;
use crate::session::{BrowserSession, WaitCondition};

const POST_TRIGGER: &str = ".share-box-feed-entry__trigger";
const POST_TRIGGER_TEXT: &str = "Start a post";
const USERNAME_INPUT: &str = "#username";
const PASSWORD_INPUT: &str = "#password";
const SUBMIT_BUTTON: &str = r#"button[type="submit"]"#;
const CHECKPOINT_FRAGMENT: &str = "/checkpoint/challengesV2/";
const FEED_FRAGMENT: &str = "/feed";

/// Where and how patiently to log in.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub base_url: String,
    /// Bound for ordinary page waits.
    pub page_timeout: Duration,
    /// How long a human gets to solve a security checkpoint.
    pub checkpoint_timeout: Duration,
    /// Pause after submitting the form before looking for a checkpoint.
    pub settle_delay: Duration,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.linkedin.com".into(),
            page_timeout: Duration::from_secs(10),
            checkpoint_timeout: Duration::from_secs(300),
            settle_delay: Duration::from_secs(5),
        }
    }
}

impl AuthConfig {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginOutcome {
    /// The browser profile already held a session.
    AlreadyLoggedIn,
    /// Credentials were submitted and no checkpoint was left open.
    LoggedIn,
    /// A security checkpoint appeared and was not completed in time.
    CheckpointPending,
}

/// Signs the browser session in, reusing a stored session when possible.
///
/// Problems with the login form are logged and do not abort: the harvest
/// that follows will fail loudly enough if the session is not usable.
#[derive(Debug, Clone, Default)]
pub struct Authenticator {
    config: AuthConfig,
}

impl Authenticator {
    pub fn new(config: AuthConfig) -> Self {
        Self { config }
    }

    pub async fn login<S: BrowserSession>(
        &self,
        session: &S,
        credentials: &Credentials,
    ) -> Result<LoginOutcome, AppError> {
        session.goto(&self.config.url("/")).await?;
        self.wait_for_page_load(session).await?;

        if self.is_logged_in(session).await? {
            tracing::info!("Session already authenticated");
            return Ok(LoginOutcome::AlreadyLoggedIn);
        }

        tracing::info!("Navigating to the login page");
        session.goto(&self.config.url("/login")).await?;
        if session.current_url().await?.contains(FEED_FRAGMENT) {
            tracing::info!("Session already authenticated");
            return Ok(LoginOutcome::AlreadyLoggedIn);
        }

        self.enter_credentials(session, credentials).await?;
        self.submit(session).await?;
        tokio::time::sleep(self.config.settle_delay).await;

        self.handle_security_check(session).await
    }

    /// True if the feed shows the "start a post" trigger.
    pub async fn is_logged_in<S: BrowserSession>(&self, session: &S) -> Result<bool, AppError> {
        session.goto(&self.config.url("/feed")).await?;
        match session
            .wait_until(
                WaitCondition::ElementPresent(POST_TRIGGER.into()),
                self.config.page_timeout,
            )
            .await
        {
            Ok(()) => {}
            Err(AppError::Timeout(_)) => return Ok(false),
            Err(e) => return Err(e),
        }

        let labels = session.texts(POST_TRIGGER).await?;
        Ok(labels.iter().any(|l| l.trim() == POST_TRIGGER_TEXT))
    }

    async fn wait_for_page_load<S: BrowserSession>(&self, session: &S) -> Result<(), AppError> {
        match session
            .wait_until(WaitCondition::DocumentReady, self.config.page_timeout)
            .await
        {
            Err(AppError::Timeout(secs)) => {
                tracing::warn!(secs, "Page load timed out");
                Ok(())
            }
            other => other,
        }
    }

    async fn enter_credentials<S: BrowserSession>(
        &self,
        session: &S,
        credentials: &Credentials,
    ) -> Result<(), AppError> {
        let form = session
            .wait_until(
                WaitCondition::ElementPresent(USERNAME_INPUT.into()),
                self.config.page_timeout,
            )
            .await;
        if let Err(e) = form {
            return tolerate(e, "Login form not found, skipping credential entry");
        }

        if let Err(e) = session.type_text(USERNAME_INPUT, &credentials.email).await {
            return tolerate(e, "Email field not found");
        }
        if let Err(e) = session
            .type_text(PASSWORD_INPUT, credentials.password())
            .await
        {
            return tolerate(e, "Password field not found");
        }
        Ok(())
    }

    async fn submit<S: BrowserSession>(&self, session: &S) -> Result<(), AppError> {
        match session.click(SUBMIT_BUTTON).await {
            Err(e) => tolerate(e, "Login button not found, check the page structure"),
            ok => ok,
        }
    }

    async fn handle_security_check<S: BrowserSession>(
        &self,
        session: &S,
    ) -> Result<LoginOutcome, AppError> {
        let checkpoint = session
            .wait_until(
                WaitCondition::UrlContains(CHECKPOINT_FRAGMENT.into()),
                self.config.page_timeout,
            )
            .await;
        match checkpoint {
            Ok(()) => {}
            Err(AppError::Timeout(_)) => return Ok(LoginOutcome::LoggedIn),
            Err(e) => return Err(e),
        }

        tracing::warn!(
            timeout_secs = self.config.checkpoint_timeout.as_secs(),
            "Security checkpoint detected, complete the challenge in the browser window"
        );
        match session
            .wait_until(
                WaitCondition::UrlContains(FEED_FRAGMENT.into()),
                self.config.checkpoint_timeout,
            )
            .await
        {
            Ok(()) => {
                tracing::info!("Security check completed");
                Ok(LoginOutcome::LoggedIn)
            }
            Err(AppError::Timeout(_)) => {
                tracing::warn!("Security check not completed");
                Ok(LoginOutcome::CheckpointPending)
            }
            Err(e) => Err(e),
        }
    }
}

/// Swallow missing-element and timeout errors with a warning.
fn tolerate(error: AppError, message: &str) -> Result<(), AppError> {
    match error {
        AppError::ElementNotFound(_) | AppError::Timeout(_) => {
            tracing::warn!(error = %error, "{message}");
            Ok(())
        }
        other => Err(other),
    }
}
