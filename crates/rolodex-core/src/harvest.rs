use std::time::Duration;

use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::AppError;
use crate::extract::ContactExtractor;
use crate::models::{LinkId, PersonRecord};
use crate::queue::LinkQueue;
use crate::session::{BrowserSession, WaitCondition};

const SCROLL_SCRIPT: &str =
    "window.scrollTo(0, document.body.scrollHeight); document.body.scrollHeight";

/// Knobs for one harvest run.
#[derive(Debug, Clone)]
pub struct HarvestConfig {
    /// Listing of the user's connections.
    pub network_url: String,
    /// One element per connection; its first `a` links to the profile.
    pub card_selector: String,
    /// "Show more" control at the bottom of the listing.
    pub load_more_selector: String,
    /// Path appended to a profile URL to open its contact details.
    pub contact_info_suffix: String,
    /// Hard cap on scroll rounds.
    pub scroll_iterations: usize,
    /// Stop scrolling early after this many rounds without page growth.
    pub stable_rounds: usize,
    /// Pause between scroll rounds so lazy content can render.
    pub scroll_pause: Duration,
    /// Bound for each page-ready wait.
    pub page_timeout: Duration,
    /// Requeue stranded claims before starting.
    pub recover_stranded: bool,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            network_url: "https://www.linkedin.com/mynetwork/invite-connect/connections/".into(),
            card_selector: ".mn-connection-card__details".into(),
            load_more_selector: "div.p5".into(),
            contact_info_suffix: "overlay/contact-info/".into(),
            scroll_iterations: 20,
            stable_rounds: 3,
            scroll_pause: Duration::from_millis(500),
            page_timeout: Duration::from_secs(10),
            recover_stranded: true,
        }
    }
}

impl HarvestConfig {
    /// Contact-info URL for a profile link.
    pub fn contact_info_url(&self, profile: &str) -> String {
        if profile.ends_with('/') {
            format!("{profile}{}", self.contact_info_suffix)
        } else {
            format!("{profile}/{}", self.contact_info_suffix)
        }
    }
}

/// Events emitted during a harvest for monitoring/logging.
#[derive(Debug, Clone)]
pub enum HarvestEvent<'a> {
    Recovered {
        requeued: usize,
    },
    ListingLoaded {
        scroll_rounds: usize,
    },
    LinksCollected {
        found: usize,
        added: usize,
    },
    Claimed {
        profile: &'a str,
    },
    Finalized {
        person: &'a PersonRecord,
    },
    Halted {
        profile: &'a str,
        error: &'a AppError,
    },
    Cancelled {
        remaining: usize,
    },
    Drained {
        finalized: usize,
    },
}

/// Trait for receiving harvest events (decoupled logging).
pub trait HarvestReporter: Send + Sync {
    fn report(&self, event: HarvestEvent<'_>) {
        let _ = event;
    }
}

/// Reporter that uses the `tracing` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingHarvestReporter;

impl HarvestReporter for TracingHarvestReporter {
    fn report(&self, event: HarvestEvent<'_>) {
        match event {
            HarvestEvent::Recovered { requeued } => {
                tracing::info!(%requeued, "Requeued stranded links");
            }
            HarvestEvent::ListingLoaded { scroll_rounds } => {
                tracing::info!(%scroll_rounds, "Connections listing loaded");
            }
            HarvestEvent::LinksCollected { found, added } => {
                tracing::info!(%found, %added, "Collected connection links");
            }
            HarvestEvent::Claimed { profile } => {
                tracing::debug!(%profile, "Claimed link");
            }
            HarvestEvent::Finalized { person } => {
                tracing::info!(profile = %person.profile, name = %person.name, "Contact saved");
            }
            HarvestEvent::Halted { profile, error } => {
                tracing::error!(%profile, %error, "Harvest halted, link left in progress");
            }
            HarvestEvent::Cancelled { remaining } => {
                tracing::warn!(%remaining, "Harvest cancelled");
            }
            HarvestEvent::Drained { finalized } => {
                tracing::info!(%finalized, "Queue drained");
            }
        }
    }
}

/// Totals for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HarvestSummary {
    pub requeued: usize,
    pub links_collected: usize,
    pub links_added: usize,
    pub finalized: usize,
    pub cancelled: bool,
}

/// Drives the harvest: list connections, queue their links, then visit
/// each queued link and store the contact details found there.
///
/// Strictly sequential over one browser session. A navigation failure
/// stops the run with the link still claimed; everything finalized before
/// it stays saved.
pub struct HarvestService<S, Q>
where
    S: BrowserSession,
    Q: LinkQueue,
{
    session: S,
    queue: Q,
    extractor: ContactExtractor,
    config: HarvestConfig,
}

impl<S, Q> HarvestService<S, Q>
where
    S: BrowserSession,
    Q: LinkQueue,
{
    pub fn new(session: S, queue: Q, config: HarvestConfig) -> Self {
        Self {
            session,
            queue,
            extractor: ContactExtractor::new(),
            config,
        }
    }

    pub fn with_extractor(mut self, extractor: ContactExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn queue(&self) -> &Q {
        &self.queue
    }

    pub fn session(&self) -> &S {
        &self.session
    }

    /// Give the browser session back, e.g. to close it.
    pub fn into_session(self) -> S {
        self.session
    }

    /// Full run: recover, list, collect, drain.
    pub async fn run<R: HarvestReporter>(
        &self,
        cancel_token: &CancellationToken,
        reporter: &R,
    ) -> Result<HarvestSummary, AppError> {
        let mut summary = HarvestSummary {
            requeued: self.recover(reporter)?,
            ..Default::default()
        };

        let scroll_rounds = self.load_listing().await?;
        reporter.report(HarvestEvent::ListingLoaded { scroll_rounds });

        let links = self.collect_links().await?;
        summary.links_collected = links.len();
        summary.links_added = self.queue.add_pending(&links)?;
        reporter.report(HarvestEvent::LinksCollected {
            found: summary.links_collected,
            added: summary.links_added,
        });

        self.drain(cancel_token, reporter, &mut summary).await?;
        Ok(summary)
    }

    /// Process what is already queued without listing connections again.
    pub async fn run_drain_only<R: HarvestReporter>(
        &self,
        cancel_token: &CancellationToken,
        reporter: &R,
    ) -> Result<HarvestSummary, AppError> {
        let mut summary = HarvestSummary {
            requeued: self.recover(reporter)?,
            ..Default::default()
        };
        self.drain(cancel_token, reporter, &mut summary).await?;
        Ok(summary)
    }

    fn recover<R: HarvestReporter>(&self, reporter: &R) -> Result<usize, AppError> {
        if !self.config.recover_stranded {
            return Ok(0);
        }
        let requeued = self.queue.requeue_stranded()?;
        if requeued > 0 {
            reporter.report(HarvestEvent::Recovered { requeued });
        }
        Ok(requeued)
    }

    /// Open the listing and scroll until it stops growing or the cap is hit.
    ///
    /// Returns the number of scroll rounds performed.
    pub async fn load_listing(&self) -> Result<usize, AppError> {
        self.session.goto(&self.config.network_url).await?;
        self.session
            .wait_until(WaitCondition::DocumentReady, self.config.page_timeout)
            .await?;

        let mut last_height = -1i64;
        let mut unchanged = 0usize;
        let mut rounds = 0usize;

        while rounds < self.config.scroll_iterations {
            rounds += 1;
            let height = self
                .session
                .evaluate(SCROLL_SCRIPT)
                .await?
                .as_i64()
                .unwrap_or_default();

            match self.session.click(&self.config.load_more_selector).await {
                Ok(()) | Err(AppError::ElementNotFound(_)) => {}
                Err(e) => tracing::debug!(error = %e, "Load-more click failed"),
            }

            if height <= last_height {
                unchanged += 1;
                if unchanged >= self.config.stable_rounds {
                    break;
                }
            } else {
                unchanged = 0;
                last_height = height;
            }

            if !self.config.scroll_pause.is_zero() {
                tokio::time::sleep(self.config.scroll_pause).await;
            }
        }

        tracing::debug!(rounds, height = last_height, "Scrolling finished");
        Ok(rounds)
    }

    /// Profile links on the rendered listing, in page order.
    ///
    /// Relative hrefs are resolved against the listing URL. One pass: cards
    /// that have not rendered yet are missed.
    pub async fn collect_links(&self) -> Result<Vec<LinkId>, AppError> {
        let base = Url::parse(&self.config.network_url)
            .map_err(|e| AppError::ConfigError(format!("Invalid network URL: {e}")))?;
        let hrefs = self
            .session
            .child_attributes(&self.config.card_selector, "a", "href")
            .await?;
        let total = hrefs.len();
        let links: Vec<LinkId> = hrefs
            .into_iter()
            .flatten()
            .map(|href| href.trim().to_string())
            .filter(|href| !href.is_empty())
            .filter_map(|href| match base.join(&href) {
                Ok(url) => Some(url.to_string()),
                Err(e) => {
                    tracing::debug!(%href, error = %e, "Skipping malformed link");
                    None
                }
            })
            .collect();
        if links.len() < total {
            tracing::debug!(cards = total, links = links.len(), "Some cards had no link");
        }
        Ok(links)
    }

    /// Visit one profile's contact info and return its record.
    pub async fn gather_contact(&self, profile: &str) -> Result<PersonRecord, AppError> {
        self.session
            .goto(&self.config.contact_info_url(profile))
            .await?;
        self.session
            .wait_until(WaitCondition::DocumentReady, self.config.page_timeout)
            .await?;

        let mut record = self.extractor.extract(&self.session).await;
        record.profile = profile.to_string();
        Ok(record)
    }

    async fn drain<R: HarvestReporter>(
        &self,
        cancel_token: &CancellationToken,
        reporter: &R,
        summary: &mut HarvestSummary,
    ) -> Result<(), AppError> {
        loop {
            if cancel_token.is_cancelled() {
                let remaining = self.queue.counts()?.pending;
                reporter.report(HarvestEvent::Cancelled { remaining });
                summary.cancelled = true;
                return Ok(());
            }

            let Some(profile) = self.queue.claim_next()? else {
                break;
            };
            reporter.report(HarvestEvent::Claimed { profile: &profile });

            let record = match self.gather_contact(&profile).await {
                Ok(record) => record,
                Err(error) => {
                    reporter.report(HarvestEvent::Halted {
                        profile: &profile,
                        error: &error,
                    });
                    return Err(error);
                }
            };

            self.queue.finalize(&profile, &record)?;
            self.queue.remove_in_progress(&profile)?;
            summary.finalized += 1;
            reporter.report(HarvestEvent::Finalized { person: &record });
        }

        reporter.report(HarvestEvent::Drained {
            finalized: summary.finalized,
        });
        Ok(())
    }
}
