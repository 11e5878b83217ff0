use anyhow::{Context, Result};
use bizdesk_core::{ExecutionMode, ManagerConfig, OrchestratorConfig, RouterConfig, TieBreak};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, warn};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BizdeskConfig {
    #[serde(default)]
    pub google: GoogleConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub routing: RoutingConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorSection,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct GoogleConfig {
    /// OAuth access token with Gmail send/read and Calendar scopes
    #[serde(default)]
    pub access_token: String,
    /// Mailbox to act for; `me` is the token's own account
    #[serde(default = "default_user_id")]
    pub user_id: String,
    #[serde(default = "default_calendar_id")]
    pub calendar_id: String,
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default)]
    pub from_name: Option<String>,
}

impl std::fmt::Debug for GoogleConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleConfig")
            .field("access_token", &mask_secret(&self.access_token))
            .field("user_id", &self.user_id)
            .field("calendar_id", &self.calendar_id)
            .field("timezone", &self.timezone)
            .field("from_name", &self.from_name)
            .finish()
    }
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            access_token: String::new(),
            user_id: default_user_id(),
            calendar_id: default_calendar_id(),
            timezone: default_timezone(),
            from_name: None,
        }
    }
}

fn default_user_id() -> String {
    "me".to_string()
}

fn default_calendar_id() -> String {
    "primary".to_string()
}

fn default_timezone() -> String {
    "UTC".to_string()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// SQLite export of the Tally company; ledger capabilities fail without it
    #[serde(default)]
    pub path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingConfig {
    #[serde(default = "default_ambiguity_ratio")]
    pub ambiguity_ratio: f64,
    #[serde(default)]
    pub tie_break: TieBreak,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            ambiguity_ratio: default_ambiguity_ratio(),
            tie_break: TieBreak::default(),
        }
    }
}

fn default_ambiguity_ratio() -> f64 {
    0.75
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorSection {
    #[serde(default)]
    pub mode: ExecutionMode,
    #[serde(default = "default_max_concurrent_steps")]
    pub max_concurrent_steps: usize,
    #[serde(default = "default_step_timeout")]
    pub step_timeout_secs: u64,
}

impl Default for OrchestratorSection {
    fn default() -> Self {
        Self {
            mode: ExecutionMode::default(),
            max_concurrent_steps: default_max_concurrent_steps(),
            step_timeout_secs: default_step_timeout(),
        }
    }
}

fn default_max_concurrent_steps() -> usize {
    4
}

fn default_step_timeout() -> u64 {
    30
}

/// Mask a secret for display: first 3 and last 4 chars of longer values,
/// otherwise "***". Slices on char boundaries.
pub fn mask_secret(s: &str) -> String {
    if s.is_empty() {
        return "(empty)".to_string();
    }
    let chars: Vec<char> = s.chars().collect();
    if chars.len() > 7 {
        let prefix: String = chars[..3].iter().collect();
        let suffix: String = chars[chars.len() - 4..].iter().collect();
        format!("{}...{}", prefix, suffix)
    } else {
        "***".to_string()
    }
}

pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".bizdesk")
}

pub fn default_config_path() -> PathBuf {
    config_dir().join("config.toml")
}

impl BizdeskConfig {
    pub fn load(custom_path: &Option<PathBuf>) -> Result<Self> {
        let path = custom_path.clone().unwrap_or_else(default_config_path);

        // Refuse configs that group or other can read (Unix only)
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Ok(metadata) = std::fs::metadata(&path) {
                let mode = metadata.permissions().mode();
                if mode & 0o077 != 0 {
                    return Err(anyhow::anyhow!(
                        "Config file {:?} has overly permissive permissions ({:o}). \
                         It may contain secrets. Fix with: chmod 600 {:?}",
                        path,
                        mode & 0o777,
                        path
                    ));
                }
            }
        }

        let content = std::fs::read_to_string(&path).with_context(|| {
            format!(
                "Failed to read config at {}. Run `bizdesk init` first.",
                path.display()
            )
        })?;

        let config = Self::parse(&content)
            .with_context(|| format!("Failed to parse config at {}", path.display()))?;

        if !config.google.access_token.is_empty() && !content.contains("${GOOGLE_ACCESS_TOKEN}") {
            warn!(
                "Google access token is hardcoded in config file. For security, use environment variables: access_token = \"${{GOOGLE_ACCESS_TOKEN}}\""
            );
        }

        Ok(config)
    }

    /// Load the config when one exists. Without an explicit path a missing
    /// default file yields the built-in defaults.
    pub fn load_or_default(custom_path: &Option<PathBuf>) -> Result<Self> {
        if custom_path.is_none() && !default_config_path().exists() {
            debug!("No config at {}, using defaults", default_config_path().display());
            return Ok(Self::default());
        }
        Self::load(custom_path)
    }

    /// Expand allowed `${VAR}`s, parse and validate
    pub fn parse(content: &str) -> Result<Self> {
        let expanded = expand_env_vars(content);
        let config: Self = toml::from_str(&expanded)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let ratio = self.routing.ambiguity_ratio;
        if !(ratio > 0.0 && ratio <= 1.0) {
            anyhow::bail!("routing.ambiguity_ratio must be in (0, 1], got {}", ratio);
        }
        if self.orchestrator.max_concurrent_steps == 0 {
            anyhow::bail!("orchestrator.max_concurrent_steps must be at least 1");
        }
        Ok(())
    }

    pub fn manager_config(&self) -> ManagerConfig {
        ManagerConfig {
            router: RouterConfig {
                ambiguity_ratio: self.routing.ambiguity_ratio,
            },
            tie_break: self.routing.tie_break,
            orchestrator: OrchestratorConfig {
                mode: self.orchestrator.mode,
                max_concurrent_steps: self.orchestrator.max_concurrent_steps,
                step_timeout_secs: self.orchestrator.step_timeout_secs,
            },
        }
    }

    /// Copy safe to print
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if !copy.google.access_token.is_empty() {
            copy.google.access_token = mask_secret(&copy.google.access_token);
        }
        copy
    }
}

/// Environment variables that may be expanded in config files; anything
/// else is left as written
const ALLOWED_ENV_VARS: &[&str] = &[
    "GOOGLE_ACCESS_TOKEN",
    "BIZDESK_LEDGER_PATH",
    "BIZDESK_DELEGATED_USER",
    "HOME",
    "USER",
];

fn expand_env_vars(s: &str) -> String {
    let mut result = s.to_string();
    let mut pos = 0;
    while pos < result.len() {
        let Some(start) = result[pos..].find("${") else {
            break;
        };
        let abs_start = pos + start;
        let Some(end) = result[abs_start..].find('}') else {
            break;
        };
        let var_name = result[abs_start + 2..abs_start + end].to_string();

        if !ALLOWED_ENV_VARS.contains(&var_name.as_str()) {
            warn!(
                "Skipping expansion of unrecognized env var '{}' in config (not in allowlist)",
                var_name
            );
            pos = abs_start + end + 1;
            continue;
        }

        let value = std::env::var(&var_name).unwrap_or_default();
        result = format!(
            "{}{}{}",
            &result[..abs_start],
            value,
            &result[abs_start + end + 1..]
        );
        pos = abs_start + value.len();
    }
    result
}

/// Expand a leading `~/` to the home directory
pub fn expand_home(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}
