pub mod analytics;
pub mod auth;
pub mod clean;
pub mod config;
pub mod error;
pub mod extract;
pub mod harvest;
pub mod models;
pub mod queue;
pub mod session;
pub mod store;
pub mod traits;

#[cfg(test)]
pub(crate) mod testutil;

pub use analytics::AnalyticsReport;
pub use auth::{AuthConfig, Authenticator, LoginOutcome};
pub use clean::{CleanService, CleanedDocument, CleanedPerson, Language};
pub use config::{Credentials, DataFolder};
pub use error::AppError;
pub use extract::ContactExtractor;
pub use harvest::{HarvestConfig, HarvestService, HarvestSummary, TracingHarvestReporter};
pub use models::{LinkId, PersonRecord, QueueCounts, QueueDocument, parse_link};
pub use queue::{LinkQueue, QueueManager};
pub use session::{BrowserSession, WaitCondition};
pub use store::RecordStore;
pub use traits::{Coordinates, Geocoder, NullGeocoder};
