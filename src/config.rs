//! Service configuration.
//! Precedence, lowest first: built-in defaults, JSON config file, `ECOPLANINA_*`
//! environment variables, command-line flags.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

use crate::hosted::HostedConfig;
use crate::reset::{Locale, MIN_CREDENTIAL_LEN};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// In-process sessions, directory and argon2 credential store.
    #[default]
    Local,
    /// Hosted backend-as-a-service over HTTP.
    Hosted,
}

impl std::str::FromStr for BackendKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(BackendKind::Local),
            "hosted" => Ok(BackendKind::Hosted),
            other => Err(anyhow!("unknown backend '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub bind_addr: String,
    pub http_port: u16,
    pub backend: BackendKind,
    pub hosted_url: Option<String>,
    pub hosted_service_key: Option<String>,
    pub hosted_timeout_ms: u64,
    pub hosted_users_table: String,
    pub locale: Locale,
    pub min_credential_len: usize,
    pub cors_allow_origin: String,
    /// JSON array of user records loaded into the local directory.
    pub seed_file: Option<PathBuf>,
    pub session_ttl_secs: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0".to_string(),
            http_port: 8787,
            backend: BackendKind::Local,
            hosted_url: None,
            hosted_service_key: None,
            hosted_timeout_ms: 10_000,
            hosted_users_table: "users".to_string(),
            locale: Locale::Bg,
            min_credential_len: MIN_CREDENTIAL_LEN,
            cors_allow_origin: "*".to_string(),
            seed_file: None,
            session_ttl_secs: 60 * 60,
        }
    }
}

pub const USAGE: &str = "ecoplanina_server\n\nUSAGE:\n  ecoplanina_server [OPTIONS]\n\nOPTIONS:\n  --config PATH          JSON config file (env: ECOPLANINA_CONFIG)\n  --bind ADDR            Bind address (env: ECOPLANINA_BIND, default 0.0.0.0)\n  --http-port N          HTTP port (env: ECOPLANINA_HTTP_PORT, default 8787)\n  --backend KIND         local | hosted (env: ECOPLANINA_BACKEND, default local)\n  --hosted-url URL       Hosted backend url (env: ECOPLANINA_HOSTED_URL)\n  --hosted-key KEY       Hosted service key (env: ECOPLANINA_HOSTED_SERVICE_KEY)\n  --locale bg|en         Response language (env: ECOPLANINA_LOCALE, default bg)\n  --seed PATH            Local directory seed file (env: ECOPLANINA_SEED_FILE)\n";

fn parse_flag(args: &[String], flag: &str) -> Option<String> {
    let mut i = 0;
    while i < args.len() {
        if args[i] == flag && i + 1 < args.len() {
            return Some(args[i + 1].clone());
        }
        if let Some(v) = args[i].strip_prefix(flag).and_then(|rest| rest.strip_prefix('=')) {
            return Some(v.to_string());
        }
        i += 1;
    }
    None
}

pub fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}

fn parse_num<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T> {
    raw.trim().parse::<T>().map_err(|_| anyhow!("invalid value for {}: '{}'", name, raw))
}

impl ServiceConfig {
    /// Resolve configuration from the process environment and `args`.
    pub fn load(args: &[String]) -> Result<Self> {
        Self::resolve(args, |k| std::env::var(k).ok())
    }

    pub fn resolve<F: Fn(&str) -> Option<String>>(args: &[String], env: F) -> Result<Self> {
        let file = parse_flag(args, "--config").or_else(|| env("ECOPLANINA_CONFIG"));
        let mut conf = match file {
            Some(path) => Self::from_file(Path::new(&path))?,
            None => Self::default(),
        };
        conf.apply_env(&env)?;
        conf.apply_args(args)?;
        conf.validate()?;
        Ok(conf)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).with_context(|| format!("reading config {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    fn apply_env<F: Fn(&str) -> Option<String>>(&mut self, env: &F) -> Result<()> {
        if let Some(v) = env("ECOPLANINA_BIND") { self.bind_addr = v; }
        if let Some(v) = env("ECOPLANINA_HTTP_PORT") { self.http_port = parse_num("ECOPLANINA_HTTP_PORT", &v)?; }
        if let Some(v) = env("ECOPLANINA_BACKEND") { self.backend = v.parse()?; }
        if let Some(v) = env("ECOPLANINA_HOSTED_URL") { self.hosted_url = Some(v); }
        if let Some(v) = env("ECOPLANINA_HOSTED_SERVICE_KEY") { self.hosted_service_key = Some(v); }
        if let Some(v) = env("ECOPLANINA_HOSTED_TIMEOUT_MS") { self.hosted_timeout_ms = parse_num("ECOPLANINA_HOSTED_TIMEOUT_MS", &v)?; }
        if let Some(v) = env("ECOPLANINA_HOSTED_USERS_TABLE") { self.hosted_users_table = v; }
        if let Some(v) = env("ECOPLANINA_LOCALE") { self.locale = v.parse::<Locale>().map_err(|e: String| anyhow!(e))?; }
        if let Some(v) = env("ECOPLANINA_MIN_CREDENTIAL_LEN") { self.min_credential_len = parse_num("ECOPLANINA_MIN_CREDENTIAL_LEN", &v)?; }
        if let Some(v) = env("ECOPLANINA_CORS_ORIGIN") { self.cors_allow_origin = v; }
        if let Some(v) = env("ECOPLANINA_SEED_FILE") { self.seed_file = Some(PathBuf::from(v)); }
        if let Some(v) = env("ECOPLANINA_SESSION_TTL_SECS") { self.session_ttl_secs = parse_num("ECOPLANINA_SESSION_TTL_SECS", &v)?; }
        Ok(())
    }

    fn apply_args(&mut self, args: &[String]) -> Result<()> {
        if let Some(v) = parse_flag(args, "--bind") { self.bind_addr = v; }
        if let Some(v) = parse_flag(args, "--http-port") { self.http_port = parse_num("--http-port", &v)?; }
        if let Some(v) = parse_flag(args, "--backend") { self.backend = v.parse()?; }
        if let Some(v) = parse_flag(args, "--hosted-url") { self.hosted_url = Some(v); }
        if let Some(v) = parse_flag(args, "--hosted-key") { self.hosted_service_key = Some(v); }
        if let Some(v) = parse_flag(args, "--locale") { self.locale = v.parse::<Locale>().map_err(|e: String| anyhow!(e))?; }
        if let Some(v) = parse_flag(args, "--seed") { self.seed_file = Some(PathBuf::from(v)); }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.min_credential_len == 0 {
            return Err(anyhow!("min_credential_len must be at least 1"));
        }
        if self.backend == BackendKind::Hosted {
            self.hosted_config()?;
        }
        Ok(())
    }

    pub fn hosted_config(&self) -> Result<HostedConfig> {
        let url = self.hosted_url.clone().filter(|s| !s.trim().is_empty())
            .ok_or_else(|| anyhow!("hosted backend requires hosted_url"))?;
        let key = self.hosted_service_key.clone().filter(|s| !s.trim().is_empty())
            .ok_or_else(|| anyhow!("hosted backend requires hosted_service_key"))?;
        let mut hc = HostedConfig::new(url, key);
        hc.timeout = Duration::from_millis(self.hosted_timeout_ms);
        hc.users_table = self.hosted_users_table.clone();
        Ok(hc)
    }

    pub fn session_ttl(&self) -> Duration { Duration::from_secs(self.session_ttl_secs) }
}
