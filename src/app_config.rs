//! Application configuration loading for CLI defaults.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use ipafetch_core::auth::config_dir;

const CONFIG_FILE_NAME: &str = "config.toml";

/// TOML-backed file configuration for CLI defaults.
#[derive(Debug, Clone, Default)]
pub struct FileConfig {
    /// Default output directory for downloaded packages.
    pub output_dir: Option<PathBuf>,
    /// Total sign-in attempts (1..=10).
    pub auth_max_attempts: Option<u32>,
    /// Delay between sign-in attempts in milliseconds.
    pub auth_retry_delay_ms: Option<u64>,
    /// Storefront and download connect timeout in seconds.
    pub connect_timeout_secs: Option<u64>,
    /// Storefront and download read timeout in seconds.
    pub read_timeout_secs: Option<u64>,
    /// Where the signed-in identity is kept.
    pub credential_store: Option<CredentialStoreKind>,
    /// Device GUID to reuse across runs.
    pub device_guid: Option<String>,
    /// Default verbosity mode.
    pub verbosity: Option<VerbositySetting>,
}

impl FileConfig {
    /// Validates config values against runtime and CLI constraints.
    pub fn validate(&self) -> Result<()> {
        if let Some(attempts) = self.auth_max_attempts
            && !(1..=10).contains(&attempts)
        {
            bail!("Invalid config value for `auth_max_attempts`: {attempts}. Expected range: 1..=10");
        }

        if let Some(delay) = self.auth_retry_delay_ms
            && delay > 60_000
        {
            bail!(
                "Invalid config value for `auth_retry_delay_ms`: {delay}. Expected range: 0..=60000"
            );
        }
        validate_timeout_secs("connect_timeout_secs", self.connect_timeout_secs)?;
        validate_timeout_secs("read_timeout_secs", self.read_timeout_secs)?;

        Ok(())
    }
}

fn validate_timeout_secs(field: &str, value: Option<u64>) -> Result<()> {
    let Some(value) = value else {
        return Ok(());
    };
    if !(1..=3600).contains(&value) {
        bail!("Invalid config value for `{field}`: {value}. Expected range: 1..=3600");
    }
    Ok(())
}

/// Supported config verbosity labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerbositySetting {
    Default,
    Verbose,
    Quiet,
    Debug,
}

impl VerbositySetting {
    /// Returns the stable string label for display output.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Verbose => "verbose",
            Self::Quiet => "quiet",
            Self::Debug => "debug",
        }
    }
}

/// Identity storage backends selectable from config and CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum CredentialStoreKind {
    /// Operating system keychain.
    #[default]
    Keyring,
    /// Encrypted file in the config directory.
    File,
}

/// Loaded config metadata.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// Resolved config path if a base directory is known.
    pub path: Option<PathBuf>,
    /// Parsed file config when a config file exists and was valid.
    pub config: Option<FileConfig>,
}

/// Resolves the default config path under the application config directory.
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    config_dir().ok().map(|dir| dir.join(CONFIG_FILE_NAME))
}

/// Loads config from the default path if present.
pub fn load_default_file_config() -> Result<LoadedConfig> {
    let path = resolve_default_config_path();
    let Some(path_ref) = path.as_deref() else {
        return Ok(LoadedConfig { path, config: None });
    };

    if !path_ref.exists() {
        return Ok(LoadedConfig { path, config: None });
    }

    let config = load_file_config(path_ref)?;
    Ok(LoadedConfig {
        path,
        config: Some(config),
    })
}

fn load_file_config(path: &Path) -> Result<FileConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    parse_config_str(&raw)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))
}

fn parse_config_str(raw: &str) -> Result<FileConfig> {
    let mut cfg = FileConfig::default();
    for (line_index, raw_line) in raw.lines().enumerate() {
        let line = strip_inline_comment(raw_line).trim();
        if line.is_empty() {
            continue;
        }

        let Some((raw_key, raw_value)) = line.split_once('=') else {
            bail!(
                "Invalid config syntax on line {}: expected key = value",
                line_index + 1
            );
        };

        let key = raw_key.trim();
        let value = raw_value.trim();
        let line_number = line_index + 1;

        match key {
            "output_dir" => {
                let parsed = parse_string_literal(value)
                    .with_context(|| format!("Invalid `output_dir` value on line {line_number}"))?;
                cfg.output_dir = Some(PathBuf::from(parsed));
            }
            "auth_max_attempts" => {
                let parsed = parse_integer_u64(value).with_context(|| {
                    format!("Invalid `auth_max_attempts` value on line {line_number}")
                })?;
                let attempts = u32::try_from(parsed)
                    .map_err(|_| anyhow::anyhow!("auth_max_attempts out of range for u32"))?;
                cfg.auth_max_attempts = Some(attempts);
            }
            "auth_retry_delay_ms" => {
                let parsed = parse_integer_u64(value).with_context(|| {
                    format!("Invalid `auth_retry_delay_ms` value on line {line_number}")
                })?;
                cfg.auth_retry_delay_ms = Some(parsed);
            }
            "connect_timeout_secs" => {
                let parsed = parse_integer_u64(value).with_context(|| {
                    format!("Invalid `connect_timeout_secs` value on line {line_number}")
                })?;
                cfg.connect_timeout_secs = Some(parsed);
            }
            "read_timeout_secs" => {
                let parsed = parse_integer_u64(value).with_context(|| {
                    format!("Invalid `read_timeout_secs` value on line {line_number}")
                })?;
                cfg.read_timeout_secs = Some(parsed);
            }
            "credential_store" => {
                let parsed = parse_string_literal(value).with_context(|| {
                    format!("Invalid `credential_store` value on line {line_number}")
                })?;
                cfg.credential_store = Some(parse_credential_store(&parsed).with_context(|| {
                    format!("Invalid `credential_store` value '{parsed}' on line {line_number}")
                })?);
            }
            "device_guid" => {
                let parsed = parse_string_literal(value).with_context(|| {
                    format!("Invalid `device_guid` value on line {line_number}")
                })?;
                cfg.device_guid = Some(parsed);
            }
            "verbosity" => {
                let parsed = parse_string_literal(value)
                    .with_context(|| format!("Invalid `verbosity` value on line {line_number}"))?;
                cfg.verbosity = Some(parse_verbosity(&parsed).with_context(|| {
                    format!("Invalid `verbosity` value '{parsed}' on line {line_number}")
                })?);
            }
            unknown => {
                bail!("Unknown configuration key: '{unknown}' on line {line_number}");
            }
        }
    }
    cfg.validate()?;
    Ok(cfg)
}

fn strip_inline_comment(line: &str) -> &str {
    let mut in_string = false;
    for (index, ch) in line.char_indices() {
        match ch {
            '"' => in_string = !in_string,
            '#' if !in_string => return &line[..index],
            _ => {}
        }
    }
    line
}

fn parse_string_literal(raw_value: &str) -> Result<String> {
    if raw_value.len() < 2 || !raw_value.starts_with('"') || !raw_value.ends_with('"') {
        bail!("Expected double-quoted string");
    }
    Ok(raw_value[1..raw_value.len() - 1].to_string())
}

fn parse_integer_u64(raw_value: &str) -> Result<u64> {
    let token = raw_value.trim();
    if token.is_empty() {
        bail!("Expected integer value");
    }
    let value = token.parse::<i128>()?;
    if value < 0 {
        bail!("Expected non-negative integer");
    }
    u64::try_from(value).map_err(|_| anyhow::anyhow!("Integer value out of range for u64"))
}

fn parse_verbosity(value: &str) -> Result<VerbositySetting> {
    match value {
        "default" => Ok(VerbositySetting::Default),
        "verbose" => Ok(VerbositySetting::Verbose),
        "quiet" => Ok(VerbositySetting::Quiet),
        "debug" => Ok(VerbositySetting::Debug),
        _ => bail!("Expected one of: default, verbose, quiet, debug"),
    }
}

fn parse_credential_store(value: &str) -> Result<CredentialStoreKind> {
    match value {
        "keyring" => Ok(CredentialStoreKind::Keyring),
        "file" => Ok(CredentialStoreKind::File),
        _ => bail!("Expected one of: keyring, file"),
    }
}
