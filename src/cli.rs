//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{ArgGroup, Args, Parser, Subcommand};

use crate::app_config::CredentialStoreKind;

/// Fetch app packages from the storefront.
///
/// ipafetch signs in to a storefront account, acquires free licenses when
/// needed, downloads the package and writes the metadata install tooling
/// expects.
#[derive(Parser, Debug)]
#[command(name = "ipafetch")]
#[command(author, version, about)]
pub struct Cli {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Where the signed-in identity is kept
    #[arg(long, value_enum, global = true, env = "IPAFETCH_CREDENTIAL_STORE")]
    pub credential_store: Option<CredentialStoreKind>,

    #[command(subcommand)]
    pub command: Command,
}

/// Top-level commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Manage the signed-in identity
    Auth {
        #[command(subcommand)]
        command: AuthCommand,
    },
    /// Download a package, acquiring a license first when asked
    Download(DownloadArgs),
    /// Acquire a free license without downloading
    Purchase(AppArgs),
    /// List downloadable versions
    Versions(AppArgs),
    /// Resolve a bundle identifier to its catalog id
    Lookup(LookupArgs),
}

/// `auth` subcommands.
#[derive(Subcommand, Debug)]
pub enum AuthCommand {
    /// Sign in and save the identity
    Login(LoginArgs),
    /// Show the saved identity
    Info,
    /// Forget the saved identity
    Revoke,
}

#[derive(Args, Debug)]
pub struct LoginArgs {
    /// Account email
    #[arg(short, long, env = "IPAFETCH_EMAIL")]
    pub email: String,

    /// Account password
    #[arg(short, long, env = "IPAFETCH_PASSWORD", hide_env_values = true)]
    pub password: String,

    /// Two-factor verification code
    #[arg(long)]
    pub code: Option<String>,
}

#[derive(Args, Debug)]
#[command(group(ArgGroup::new("target").required(true).args(["app_id", "bundle_id"])))]
pub struct DownloadArgs {
    /// Catalog id of the app
    #[arg(short = 'i', long)]
    pub app_id: Option<String>,

    /// Bundle identifier of the app (resolved through the catalog lookup)
    #[arg(short, long)]
    pub bundle_id: Option<String>,

    /// External version id of a historical build
    #[arg(long)]
    pub version_id: Option<String>,

    /// Output file or directory
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Acquire a free license when the account has none
    #[arg(long)]
    pub purchase: bool,

    /// Storefront country for bundle id lookups (defaults to the account's)
    #[arg(long)]
    pub country: Option<String>,
}

#[derive(Args, Debug)]
pub struct AppArgs {
    /// Catalog id of the app
    #[arg(short = 'i', long)]
    pub app_id: String,
}

#[derive(Args, Debug)]
pub struct LookupArgs {
    /// Bundle identifier to resolve
    #[arg(short, long)]
    pub bundle_id: String,

    /// Storefront country (ISO code)
    #[arg(long, default_value = "US")]
    pub country: String,
}
