/// Smoke-test for `ChromeSession`.
///
/// Launches a headless Chromium with a throwaway profile, opens
/// <https://example.com>, and checks the `<h1>` through the session API.
///
/// Run with:
///   cargo run -p rolodex-client --example session_smoke
use std::time::Duration;

use rolodex_client::{ChromeSession, SessionConfig};
use rolodex_core::session::{BrowserSession, WaitCondition};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let profile = std::env::temp_dir().join("rolodex-smoke-profile");
    let config = SessionConfig {
        profile_dir: profile,
        headless: true,
        ..Default::default()
    };

    println!("Launching headless browser…");
    let session = ChromeSession::launch(&config).await?;

    let url = "https://example.com";
    println!("Opening {url} …");
    session.goto(url).await?;
    session
        .wait_until(WaitCondition::DocumentReady, Duration::from_secs(10))
        .await?;

    let heading = session.text("h1").await?;
    assert_eq!(heading.trim(), "Example Domain", "unexpected <h1>");

    let links = session.child_attributes("body", "a", "href").await?;
    println!("OK: heading {heading:?}, first link {:?}", links.first());

    session.close().await?;
    Ok(())
}
