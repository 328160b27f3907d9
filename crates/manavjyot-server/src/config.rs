use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, bail};

const PLACEHOLDER_SECRETS: &[&str] = &["dev-secret-change-me", "change-me"];

#[derive(Debug, Clone, PartialEq)]
pub struct MailConfig {
    pub api_url: String,
    pub api_key: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub jwt_secret: String,
    pub db_path: PathBuf,
    pub addr: SocketAddr,
    pub public_url: String,
    pub site_email: String,
    pub mail: Option<MailConfig>,
    pub stripe_secret: Option<String>,
    pub reset_ttl_secs: i64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let jwt_secret = var("MANAVJYOT_JWT_SECRET").context("MANAVJYOT_JWT_SECRET must be set")?;
        if PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("MANAVJYOT_JWT_SECRET is still a placeholder value");
        }

        let host = var("MANAVJYOT_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port: u16 = var("MANAVJYOT_PORT")
            .unwrap_or_else(|| "4500".into())
            .parse()
            .context("MANAVJYOT_PORT is not a valid port")?;
        let addr: SocketAddr = format!("{}:{}", host, port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", host, port))?;

        let mail = match (var("MANAVJYOT_MAIL_API_URL"), var("MANAVJYOT_MAIL_API_KEY")) {
            (Some(api_url), Some(api_key)) => Some(MailConfig { api_url, api_key }),
            (None, None) => None,
            _ => bail!("MANAVJYOT_MAIL_API_URL and MANAVJYOT_MAIL_API_KEY must be set together"),
        };

        let reset_ttl_secs: i64 = var("MANAVJYOT_RESET_TTL_SECS")
            .unwrap_or_else(|| "3600".into())
            .parse()
            .context("MANAVJYOT_RESET_TTL_SECS is not a number")?;
        if reset_ttl_secs <= 0 {
            bail!("MANAVJYOT_RESET_TTL_SECS must be positive");
        }

        Ok(Self {
            jwt_secret,
            db_path: PathBuf::from(var("MANAVJYOT_DB_PATH").unwrap_or_else(|| "manavjyot.db".into())),
            addr,
            public_url: var("MANAVJYOT_PUBLIC_URL").unwrap_or_else(|| format!("http://localhost:{}", port)),
            site_email: var("MANAVJYOT_SITE_EMAIL").unwrap_or_else(|| "no-reply@manavjyot.org".into()),
            mail,
            stripe_secret: var("MANAVJYOT_STRIPE_SECRET"),
            reset_ttl_secs,
        })
    }
}
