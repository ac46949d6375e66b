//! Application configuration loading for CLI defaults.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};

/// TOML-style file configuration for hidemail defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileConfig {
    /// Default cookie file.
    pub cookie_file: Option<PathBuf>,
    /// Default alias label.
    pub label: Option<String>,
    /// Default number of aliases per run.
    pub count: Option<usize>,
    /// Default failed calls allowed per alias (1..=10).
    pub max_attempts: Option<u32>,
    /// Default delay between aliases in milliseconds.
    pub delay_ms: Option<u64>,
    /// Default rate-limit backoff ceiling in seconds.
    pub max_backoff_secs: Option<u64>,
    /// Default cooldown batch size (0 disables).
    pub cooldown_every: Option<u32>,
    /// Default cooldown length in seconds.
    pub cooldown_secs: Option<u64>,
    /// Default output file.
    pub output: Option<PathBuf>,
    /// Write detailed output lines by default.
    pub detailed: Option<bool>,
    /// Service endpoint override.
    pub base_url: Option<String>,
    /// Default verbosity mode.
    pub verbosity: Option<VerbositySetting>,
    /// Provider client connect timeout in seconds.
    pub connect_timeout_secs: Option<u64>,
    /// Provider client read timeout in seconds.
    pub read_timeout_secs: Option<u64>,
}

impl FileConfig {
    /// Validates config values against runtime and CLI constraints.
    pub fn validate(&self) -> Result<()> {
        if let Some(max_attempts) = self.max_attempts
            && !(1..=10).contains(&max_attempts)
        {
            bail!("Invalid config value for `max_attempts`: {max_attempts}. Expected range: 1..=10");
        }

        if let Some(delay_ms) = self.delay_ms
            && delay_ms > 600_000
        {
            bail!("Invalid config value for `delay_ms`: {delay_ms}. Expected range: 0..=600000");
        }

        if let Some(max_backoff_secs) = self.max_backoff_secs
            && !(1..=3600).contains(&max_backoff_secs)
        {
            bail!(
                "Invalid config value for `max_backoff_secs`: {max_backoff_secs}. Expected range: 1..=3600"
            );
        }

        if let Some(cooldown_secs) = self.cooldown_secs
            && cooldown_secs > 86_400
        {
            bail!(
                "Invalid config value for `cooldown_secs`: {cooldown_secs}. Expected range: 0..=86400"
            );
        }

        if let Some(label) = &self.label
            && label.trim().is_empty()
        {
            bail!("Invalid config value for `label`: must not be empty");
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

/// Loaded config metadata.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// Resolved config path if a base directory is known.
    pub path: Option<PathBuf>,
    /// Parsed file config when a config file exists and was valid.
    pub config: Option<FileConfig>,
}

/// Resolves default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/hidemail/config.toml`
/// 2. `$HOME/.config/hidemail/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(
            PathBuf::from(xdg_config_home)
                .join("hidemail")
                .join("config.toml"),
        );
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join("hidemail")
            .join("config.toml"),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads config from default path if present.
pub fn load_default_file_config() -> Result<LoadedConfig> {
    let path = resolve_default_config_path();
    let config = match path.as_deref() {
        Some(path_ref) if path_ref.exists() => Some(load_file_config(path_ref)?),
        _ => None,
    };
    Ok(LoadedConfig { path, config })
}

pub(crate) fn load_file_config(path: &Path) -> Result<FileConfig> {
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
        let line_no = line_index + 1;
        let invalid = || format!("Invalid `{key}` value on line {line_no}");

        match key {
            "cookie_file" => {
                cfg.cookie_file = Some(PathBuf::from(
                    parse_string_literal(value).with_context(invalid)?,
                ));
            }
            "label" => cfg.label = Some(parse_string_literal(value).with_context(invalid)?),
            "count" => {
                let parsed = parse_integer_u64(value).with_context(invalid)?;
                cfg.count = Some(
                    usize::try_from(parsed)
                        .map_err(|_| anyhow::anyhow!("count out of range for usize"))?,
                );
            }
            "max_attempts" => {
                let parsed = parse_integer_u64(value).with_context(invalid)?;
                cfg.max_attempts = Some(
                    u32::try_from(parsed)
                        .map_err(|_| anyhow::anyhow!("max_attempts out of range for u32"))?,
                );
            }
            "delay_ms" => cfg.delay_ms = Some(parse_integer_u64(value).with_context(invalid)?),
            "max_backoff_secs" => {
                cfg.max_backoff_secs = Some(parse_integer_u64(value).with_context(invalid)?);
            }
            "cooldown_every" => {
                let parsed = parse_integer_u64(value).with_context(invalid)?;
                cfg.cooldown_every = Some(
                    u32::try_from(parsed)
                        .map_err(|_| anyhow::anyhow!("cooldown_every out of range for u32"))?,
                );
            }
            "cooldown_secs" => {
                cfg.cooldown_secs = Some(parse_integer_u64(value).with_context(invalid)?);
            }
            "output" => {
                cfg.output = Some(PathBuf::from(
                    parse_string_literal(value).with_context(invalid)?,
                ));
            }
            "detailed" => cfg.detailed = Some(parse_boolean(value).with_context(invalid)?),
            "base_url" => cfg.base_url = Some(parse_string_literal(value).with_context(invalid)?),
            "verbosity" => {
                let parsed = parse_string_literal(value).with_context(invalid)?;
                cfg.verbosity = Some(parse_verbosity(&parsed).with_context(|| {
                    format!("Invalid `verbosity` value '{parsed}' on line {line_no}")
                })?);
            }
            "connect_timeout_secs" => {
                cfg.connect_timeout_secs = Some(parse_integer_u64(value).with_context(invalid)?);
            }
            "read_timeout_secs" => {
                cfg.read_timeout_secs = Some(parse_integer_u64(value).with_context(invalid)?);
            }
            unknown => {
                bail!("Unknown configuration key: '{unknown}' on line {line_no}");
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

fn parse_boolean(raw_value: &str) -> Result<bool> {
    match raw_value.trim() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => bail!("Expected 'true' or 'false'"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config_partial_fields() {
        let cfg = parse_config_str(
            r#"
            label = "newsletters"
            count = 10
            delay_ms = 2500
            "#,
        )
        .unwrap();
        assert_eq!(cfg.label.as_deref(), Some("newsletters"));
        assert_eq!(cfg.count, Some(10));
        assert_eq!(cfg.delay_ms, Some(2500));
        assert_eq!(cfg.max_attempts, None);
    }

    #[test]
    fn test_parse_config_all_fields() {
        let cfg = parse_config_str(
            r#"
            cookie_file = "/tmp/cookie.txt"
            label = "shop"
            count = 3
            max_attempts = 4
            delay_ms = 0
            max_backoff_secs = 120
            cooldown_every = 5
            cooldown_secs = 600
            output = "out.txt"
            detailed = true
            base_url = "http://127.0.0.1:9000"
            verbosity = "quiet"
            connect_timeout_secs = 5
            read_timeout_secs = 20
            "#,
        )
        .unwrap();
        assert_eq!(cfg.cookie_file, Some(PathBuf::from("/tmp/cookie.txt")));
        assert_eq!(cfg.max_attempts, Some(4));
        assert_eq!(cfg.cooldown_every, Some(5));
        assert_eq!(cfg.detailed, Some(true));
        assert_eq!(cfg.verbosity, Some(VerbositySetting::Quiet));
        assert_eq!(cfg.read_timeout_secs, Some(20));
    }

    #[test]
    fn test_parse_config_strips_comments_outside_strings() {
        let cfg = parse_config_str(
            "# leading comment\nlabel = \"a#b\" # trailing\ncount = 2 # two\n",
        )
        .unwrap();
        assert_eq!(cfg.label.as_deref(), Some("a#b"));
        assert_eq!(cfg.count, Some(2));
    }

    #[test]
    fn test_parse_config_unknown_key_errors() {
        let err = parse_config_str("concurrency = 4").unwrap_err();
        assert!(err.to_string().contains("Unknown configuration key"));
    }

    #[test]
    fn test_parse_config_missing_equals_errors() {
        let err = parse_config_str("label").unwrap_err();
        assert!(err.to_string().contains("line 1"));
    }

    #[test]
    fn test_parse_config_unquoted_string_errors() {
        assert!(parse_config_str("label = shop").is_err());
    }

    #[test]
    fn test_parse_config_negative_integer_errors() {
        assert!(parse_config_str("count = -1").is_err());
    }

    #[test]
    fn test_validate_rejects_out_of_range_values() {
        assert!(parse_config_str("max_attempts = 0").is_err());
        assert!(parse_config_str("max_attempts = 11").is_err());
        assert!(parse_config_str("delay_ms = 600001").is_err());
        assert!(parse_config_str("max_backoff_secs = 0").is_err());
        assert!(parse_config_str("read_timeout_secs = 0").is_err());
        assert!(parse_config_str("label = \"  \"").is_err());
    }

    #[test]
    fn test_parse_verbosity_rejects_unknown() {
        assert!(parse_config_str("verbosity = \"loud\"").is_err());
    }

    #[test]
    fn test_load_file_config_reads_from_disk() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "count = 7\n").unwrap();
        assert_eq!(load_file_config(&path).unwrap().count, Some(7));
    }

    #[test]
    fn test_load_file_config_missing_file_errors() {
        let dir = tempfile::TempDir::new().unwrap();
        let err = load_file_config(&dir.path().join("nope.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
