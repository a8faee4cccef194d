pub mod browser_session;
pub mod geocoder;

pub use browser_session::{ChromeSession, SessionConfig};
pub use geocoder::NominatimGeocoder;
