//! CLI entry point for ipafetch.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use ipafetch_core::auth::{
    Account, AuthRetryPolicy, CredentialStore, EncryptedFileCredentialStore,
    KeyringCredentialStore, SessionManager,
};
use ipafetch_core::catalog::{CatalogLookup, ItunesLookup, VersionHistory};
use ipafetch_core::download::{ArtifactDownloader, DownloadProgress, ProgressCallback, format_bytes};
use ipafetch_core::session::{SessionOptions, StoreSession};
use ipafetch_core::store::{HttpTimeouts, StoreClient, StoreEndpoints, StoreError};
use ipafetch_core::{AcquireError, AcquireRequest, Acquirer};
use tracing::{debug, info};

mod app_config;
mod cli;
mod progress;

use app_config::{CredentialStoreKind, FileConfig, VerbositySetting, load_default_file_config};
use cli::{AppArgs, AuthCommand, Cli, Command, DownloadArgs, LoginArgs, LookupArgs};
use progress::TransferBar;

/// Overrides the storefront base URL (for testing against a mock server).
const STORE_URL_ENV: &str = "IPAFETCH_STORE_URL";
/// Overrides the version history endpoint (for testing against a mock server).
const VERSION_HISTORY_URL_ENV: &str = "IPAFETCH_VERSION_HISTORY_URL";
/// Overrides the catalog lookup base URL (for testing against a mock server).
const LOOKUP_URL_ENV: &str = "IPAFETCH_LOOKUP_URL";

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let cli = Cli::parse();
    let loaded = load_default_file_config()?;
    let config = loaded.config.unwrap_or_default();

    init_tracing(&cli, &config);
    debug!(
        config_path = ?loaded.path,
        verbosity = config.verbosity.map_or("unset", VerbositySetting::as_str),
        "configuration loaded"
    );

    let result = run(cli, config).await;
    if let Err(error) = &result
        && requires_code(error)
    {
        eprintln!("A verification code was sent to your trusted devices.");
        eprintln!("Re-run `ipafetch auth login` with `--code <CODE>`.");
    }
    result
}

/// Priority: `RUST_LOG` > -q/-v flags > config verbosity > info.
fn init_tracing(cli: &Cli, config: &FileConfig) {
    let default_level = if cli.quiet {
        "error"
    } else if cli.verbose > 0 {
        match cli.verbose {
            1 => "debug",
            _ => "trace",
        }
    } else {
        match config.verbosity {
            Some(VerbositySetting::Quiet) => "error",
            Some(VerbositySetting::Verbose) => "debug",
            Some(VerbositySetting::Debug) => "trace",
            Some(VerbositySetting::Default) | None => "info",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn requires_code(error: &anyhow::Error) -> bool {
    matches!(
        error.downcast_ref::<StoreError>(),
        Some(StoreError::CodeRequired)
    ) || matches!(
        error.downcast_ref::<AcquireError>(),
        Some(AcquireError::Store(StoreError::CodeRequired))
    )
}

struct Runtime {
    manager: SessionManager,
    timeouts: HttpTimeouts,
    quiet: bool,
    output_dir: Option<PathBuf>,
}

impl Runtime {
    fn build(cli: &Cli, config: &FileConfig) -> Result<Self> {
        let timeouts = http_timeouts(config);
        let session = Arc::new(
            StoreSession::with_options(SessionOptions {
                timeouts,
                device_guid: config.device_guid.clone(),
            })
            .context("Failed to create storefront session")?,
        );

        let client = match std::env::var(STORE_URL_ENV) {
            Ok(base) if !base.trim().is_empty() => {
                StoreClient::with_endpoints(StoreEndpoints::rooted_at(base.trim()))
            }
            _ => StoreClient::new(),
        };

        let kind = cli
            .credential_store
            .or(config.credential_store)
            .unwrap_or_default();
        let manager = SessionManager::new(session, client, credential_store(kind)?)
            .with_retry_policy(retry_policy(config));

        Ok(Self {
            manager,
            timeouts,
            quiet: cli.quiet,
            output_dir: config.output_dir.clone(),
        })
    }

    fn saved_account(&self) -> Result<Account> {
        self.manager
            .load_saved()
            .ok_or_else(|| anyhow!("Not signed in. Run `ipafetch auth login` first."))
    }

    fn acquirer(&self) -> Result<Acquirer> {
        let downloader = ArtifactDownloader::with_timeouts(self.timeouts)
            .context("Failed to create download client")?;
        Ok(Acquirer::new(
            Arc::clone(self.manager.session()),
            self.manager.client().clone(),
            downloader,
        ))
    }
}

fn http_timeouts(config: &FileConfig) -> HttpTimeouts {
    let mut timeouts = HttpTimeouts::default();
    if let Some(secs) = config.connect_timeout_secs {
        timeouts.connect = Duration::from_secs(secs);
    }
    if let Some(secs) = config.read_timeout_secs {
        timeouts.read = Duration::from_secs(secs);
    }
    timeouts
}

fn retry_policy(config: &FileConfig) -> AuthRetryPolicy {
    let default = AuthRetryPolicy::default();
    AuthRetryPolicy::new(
        config.auth_max_attempts.unwrap_or(default.max_attempts()),
        config
            .auth_retry_delay_ms
            .map_or(default.delay(), Duration::from_millis),
    )
}

fn credential_store(kind: CredentialStoreKind) -> Result<Arc<dyn CredentialStore>> {
    Ok(match kind {
        CredentialStoreKind::Keyring => Arc::new(KeyringCredentialStore::default()),
        CredentialStoreKind::File => Arc::new(
            EncryptedFileCredentialStore::at_default_location()
                .context("Failed to locate the credential file")?,
        ),
    })
}

async fn run(cli: Cli, config: FileConfig) -> Result<()> {
    let runtime = Runtime::build(&cli, &config)?;
    match cli.command {
        Command::Auth { command } => match command {
            AuthCommand::Login(args) => login(&runtime, &args).await,
            AuthCommand::Info => {
                show_identity(&runtime);
                Ok(())
            }
            AuthCommand::Revoke => {
                if runtime.manager.delete() {
                    println!("Saved identity removed.");
                } else {
                    println!("No saved identity.");
                }
                Ok(())
            }
        },
        Command::Download(args) => download(&runtime, &args).await,
        Command::Purchase(args) => purchase(&runtime, &args).await,
        Command::Versions(args) => versions(&runtime, &args).await,
        Command::Lookup(args) => lookup(&args).await,
    }
}

async fn login(runtime: &Runtime, args: &LoginArgs) -> Result<()> {
    let account = runtime
        .manager
        .authenticate(&args.email, &args.password, args.code.as_deref())
        .await?;
    println!(
        "Signed in as {} <{}> (storefront {}, {})",
        account.name, account.email, account.region.storefront, account.region.country_code
    );
    Ok(())
}

fn show_identity(runtime: &Runtime) {
    let Some(account) = runtime.manager.load_saved() else {
        println!("No saved identity.");
        return;
    };
    println!("Name:       {}", account.name);
    println!("Email:      {}", account.email);
    println!("DSID:       {}", account.dsid);
    println!(
        "Storefront: {} ({})",
        account.region.storefront, account.region.country_code
    );
    println!("Cookies:    {}", account.cookies.len());
    if runtime.manager.is_session_expiring(&account) {
        println!("Session expires soon; sign in again if requests fail.");
    }
}

async fn resolve_catalog_id(
    app_id: Option<&str>,
    bundle_id: Option<&str>,
    country: &str,
) -> Result<String> {
    if let Some(app_id) = app_id {
        return Ok(app_id.to_string());
    }
    let bundle_id = bundle_id.ok_or_else(|| anyhow!("Either --app-id or --bundle-id is required"))?;
    let entry = lookup_client()?
        .lookup(bundle_id, country)
        .await
        .with_context(|| format!("Failed to resolve bundle id '{bundle_id}'"))?;
    debug!(bundle_id, catalog_id = %entry.catalog_id, "bundle id resolved");
    Ok(entry.catalog_id)
}

fn lookup_client() -> Result<ItunesLookup> {
    let lookup = match std::env::var(LOOKUP_URL_ENV) {
        Ok(base) if !base.trim().is_empty() => ItunesLookup::with_base_url(base.trim()),
        _ => ItunesLookup::new(),
    };
    lookup.context("Failed to create lookup client")
}

async fn download(runtime: &Runtime, args: &DownloadArgs) -> Result<()> {
    let account = runtime.saved_account()?;
    let country = args
        .country
        .as_deref()
        .unwrap_or(&account.region.country_code);
    let catalog_id =
        resolve_catalog_id(args.app_id.as_deref(), args.bundle_id.as_deref(), country).await?;

    let mut request = AcquireRequest::new(catalog_id).purchase_if_needed(args.purchase);
    if let Some(version_id) = &args.version_id {
        request = request.with_version(version_id.clone());
    }
    if let Some(output) = args.output.clone().or_else(|| runtime.output_dir.clone()) {
        request = request.with_output(output);
    }

    let bar = TransferBar::new(!runtime.quiet);
    let reporter = bar.clone();
    let on_progress = move |progress: &DownloadProgress| reporter.update(progress);
    let callback: &ProgressCallback = &on_progress;

    let result = runtime
        .acquirer()?
        .acquire(&request, &account, Some(callback))
        .await;
    bar.finish();
    let artifact = result?;

    let _ = runtime.manager.refresh_cookies(&account);
    info!(purchased = artifact.purchased, "download finished");
    println!(
        "Saved {} {} to {} ({})",
        artifact.item.metadata.bundle_display_name,
        artifact.item.metadata.bundle_short_version_string,
        artifact.path.display(),
        format_bytes(artifact.bytes_downloaded)
    );
    Ok(())
}

async fn purchase(runtime: &Runtime, args: &AppArgs) -> Result<()> {
    let account = runtime.saved_account()?;
    runtime.acquirer()?.purchase(&account, &args.app_id).await?;
    let _ = runtime.manager.refresh_cookies(&account);
    println!("License acquired for {}.", args.app_id);
    Ok(())
}

async fn versions(runtime: &Runtime, args: &AppArgs) -> Result<()> {
    let account = runtime.saved_account()?;
    let history = match std::env::var(VERSION_HISTORY_URL_ENV) {
        Ok(url) if !url.trim().is_empty() => VersionHistory::with_base_url(url.trim()),
        _ => VersionHistory::new(),
    }
    .context("Failed to create version history client")?;

    let versions = runtime
        .acquirer()?
        .list_versions(&history, &account, &args.app_id)
        .await?;
    for version in versions {
        let marker = if version.is_current { " (current)" } else { "" };
        println!(
            "{}\t{}{marker}",
            version.external_id,
            version.version.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}

async fn lookup(args: &LookupArgs) -> Result<()> {
    let entry = lookup_client()?
        .lookup(&args.bundle_id, &args.country)
        .await?;
    println!(
        "{}\t{}\t{}",
        entry.catalog_id,
        entry.bundle_id,
        entry.name.as_deref().unwrap_or("-")
    );
    Ok(())
}
