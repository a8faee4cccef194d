use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use rolodex_client::{ChromeSession, NominatimGeocoder, SessionConfig};
use rolodex_core::traits::Geocoder;
use rolodex_core::{
    AnalyticsReport, Authenticator, CleanService, CleanedDocument, CleanedPerson, Credentials,
    DataFolder, HarvestConfig, HarvestService, HarvestSummary, Language, LinkQueue, LoginOutcome,
    NullGeocoder, PersonRecord, QueueManager, TracingHarvestReporter, parse_link,
};

#[derive(Parser)]
#[command(name = "rolodex", version, about = "Harvest your network's contact details")]
struct Cli {
    /// Folder holding secrets.yaml, the queue file, and the browser profile
    #[arg(
        short,
        long,
        global = true,
        env = "ROLODEX_DATA_DIR",
        default_value = "data_folder"
    )]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in, collect connection links, and scrape their contact info
    Harvest {
        /// Run the browser without a window
        #[arg(long, default_value_t = false)]
        headless: bool,

        /// Maximum scroll rounds on the connections page
        #[arg(long, default_value_t = 20)]
        scroll_iterations: usize,

        /// Leave links stranded by an earlier run where they are
        #[arg(long, default_value_t = false)]
        no_recover: bool,

        /// Skip listing connections; only process links already queued
        #[arg(long, default_value_t = false)]
        drain_only: bool,

        /// Account email (overrides secrets.yaml)
        #[arg(long, env = "ROLODEX_EMAIL", requires = "password")]
        email: Option<String>,

        /// Account password (overrides secrets.yaml)
        #[arg(long, env = "ROLODEX_PASSWORD", hide_env_values = true, requires = "email")]
        password: Option<String>,

        /// Chrome/Chromium binary to launch
        #[arg(long, env = "CHROME_BIN")]
        chrome_bin: Option<PathBuf>,
    },

    /// Show queue counts and links stranded in progress
    Status,

    /// Queue profile URLs by hand
    Add {
        /// Profile URLs
        #[arg(required = true)]
        urls: Vec<String>,
    },

    /// Derive location, coordinates, and title fields for stored contacts
    Clean {
        /// Synonym table for title normalization (es, en)
        #[arg(short, long, default_value = "es")]
        language: Language,

        /// Skip geocoding; coordinates stay empty
        #[arg(long, default_value_t = false)]
        no_geocode: bool,
    },

    /// Print statistics over the cleaned contacts
    Analyze {
        /// Number of title keywords to show
        #[arg(short, long, default_value_t = 10)]
        top: usize,

        /// Print the report as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Write stored contacts to a CSV file
    Export {
        /// Destination CSV file
        #[arg(short, long)]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Setup tracing; RUST_LOG overrides the default filter
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("rolodex=info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if std::io::stderr().is_terminal() {
                eprintln!("\x1b[1;31merror:\x1b[0m {e:#}");
            } else {
                eprintln!("error: {e:#}");
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let folder = DataFolder::new(cli.data_dir);

    match cli.command {
        Commands::Harvest {
            headless,
            scroll_iterations,
            no_recover,
            drain_only,
            email,
            password,
            chrome_bin,
        } => {
            let credentials = match (email, password) {
                (Some(email), Some(password)) => Credentials::new(email, password)?,
                _ => folder.credentials()?,
            };
            let session_config = SessionConfig {
                profile_dir: folder.browser_profile(),
                headless,
                chrome_executable: chrome_bin,
                ..Default::default()
            };
            let harvest_config = HarvestConfig {
                scroll_iterations,
                recover_stranded: !no_recover,
                ..Default::default()
            };
            cmd_harvest(&folder, &credentials, &session_config, harvest_config, drain_only).await
        }
        Commands::Status => cmd_status(&folder),
        Commands::Add { urls } => cmd_add(&folder, &urls),
        Commands::Clean {
            language,
            no_geocode,
        } => cmd_clean(&folder, language, no_geocode).await,
        Commands::Analyze { top, json } => cmd_analyze(&folder, top, json),
        Commands::Export { output } => cmd_export(&folder, &output),
    }
}

fn open_queue(folder: &DataFolder) -> Result<QueueManager> {
    folder.validate()?;
    Ok(QueueManager::open(folder.queue()))
}

async fn cmd_harvest(
    folder: &DataFolder,
    credentials: &Credentials,
    session_config: &SessionConfig,
    harvest_config: HarvestConfig,
    drain_only: bool,
) -> Result<()> {
    let queue = open_queue(folder)?;
    // Surface a corrupt queue file before a browser is launched.
    queue.counts().context("Queue file is unreadable")?;

    let session = ChromeSession::launch(session_config)
        .await
        .context("Failed to start the browser")?;

    match Authenticator::default().login(&session, credentials).await {
        Ok(LoginOutcome::CheckpointPending) => {
            tracing::warn!("Continuing without a completed security check");
        }
        Ok(outcome) => tracing::info!(?outcome, "Login finished"),
        Err(e) => {
            let _ = session.close().await;
            return Err(e).context("Login failed");
        }
    }

    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, stopping after the current contact");
            signal_token.cancel();
        }
    });

    let service = HarvestService::new(session, queue, harvest_config);
    let result = if drain_only {
        service
            .run_drain_only(&cancel, &TracingHarvestReporter)
            .await
    } else {
        service.run(&cancel, &TracingHarvestReporter).await
    };

    if let Err(e) = service.into_session().close().await {
        tracing::warn!(error = %e, "Browser did not close cleanly");
    }

    let summary = result.context("Harvest stopped")?;
    print_summary(&summary);
    Ok(())
}

fn print_summary(summary: &HarvestSummary) {
    println!("Harvest {}:", if summary.cancelled { "cancelled" } else { "complete" });
    if summary.requeued > 0 {
        println!("  requeued stranded: {}", summary.requeued);
    }
    println!("  links collected:   {}", summary.links_collected);
    println!("  links added:       {}", summary.links_added);
    println!("  contacts saved:    {}", summary.finalized);
}

fn cmd_status(folder: &DataFolder) -> Result<()> {
    let queue = open_queue(folder)?;
    let counts = queue.counts()?;

    println!("Queue {}:\n", folder.queue().display());
    println!("  pending:     {}", counts.pending);
    println!("  in progress: {}", counts.in_progress);
    println!("  persons:     {}", counts.persons);

    let stranded = queue.list_in_progress()?;
    if !stranded.is_empty() {
        println!("\nStranded (requeued on next harvest):");
        for id in stranded {
            println!("  {id}");
        }
    }
    Ok(())
}

fn cmd_add(folder: &DataFolder, urls: &[String]) -> Result<()> {
    let ids = urls
        .iter()
        .map(|raw| parse_link(raw))
        .collect::<Result<Vec<_>, _>>()?;

    let added = open_queue(folder)?.add_pending(&ids)?;
    println!("Queued {added} of {} links", ids.len());
    Ok(())
}

async fn cmd_clean(folder: &DataFolder, language: Language, no_geocode: bool) -> Result<()> {
    let persons = open_queue(folder)?.list_persons()?;
    if persons.is_empty() {
        println!("No contacts stored yet; run `rolodex harvest` first.");
        return Ok(());
    }

    let cleaned = if no_geocode {
        clean_with(NullGeocoder, language, &persons).await
    } else {
        let geocoder = NominatimGeocoder::new().context("Failed to create HTTP client")?;
        clean_with(geocoder, language, &persons).await
    };

    let output = folder.cleaned();
    CleanedDocument { persons: cleaned }.save(&output)?;
    println!("Cleaned {} contacts into {}", persons.len(), output.display());
    Ok(())
}

async fn clean_with<G: Geocoder>(
    geocoder: G,
    language: Language,
    persons: &[PersonRecord],
) -> Vec<CleanedPerson> {
    CleanService::new(geocoder)
        .with_language(language)
        .clean_all(persons)
        .await
}

fn cmd_analyze(folder: &DataFolder, top: usize, json: bool) -> Result<()> {
    let path = folder.cleaned();
    let doc = CleanedDocument::load(&path)
        .with_context(|| format!("Run `rolodex clean` first to create {}", path.display()))?;
    let report = AnalyticsReport::build(&doc.persons, top);

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Contacts analysed: {}", report.total_persons);

    println!("\nDistribution by region (%):");
    for (region, pct) in &report.regions {
        println!("  {region}: {pct}%");
    }

    println!("\nDistribution by country (%):");
    for (country, pct) in &report.countries {
        println!("  {country}: {pct}%");
    }

    println!("\nCompleted fields (%):");
    println!("  email:   {}%", report.completion.email);
    println!("  phone:   {}%", report.completion.phone);
    println!("  website: {}%", report.completion.website);

    println!("\nTop title keywords:");
    for kw in &report.top_keywords {
        println!("  {:<20} {}", kw.keyword, kw.count);
    }

    println!(
        "\nGenerated {}",
        report.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    Ok(())
}

fn cmd_export(folder: &DataFolder, output: &Path) -> Result<()> {
    let persons = open_queue(folder)?.list_persons()?;

    let mut writer = csv::Writer::from_path(output)
        .with_context(|| format!("Failed to create {}", output.display()))?;
    if persons.is_empty() {
        writer.write_record(PersonRecord::FIELDS)?;
    }
    for person in &persons {
        writer.serialize(person)?;
    }
    writer.flush()?;

    println!("Exported {} contacts to {}", persons.len(), output.display());
    Ok(())
}
