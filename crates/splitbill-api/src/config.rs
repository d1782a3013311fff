use std::fmt;
use std::ops::RangeInclusive;
use std::path::PathBuf;
use std::time::Duration;

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
    "secret",
];

// Upper bounds keep deadline and expiry arithmetic far from overflow.
const MAX_REQUEST_TIMEOUT_SECS: u64 = 60 * 60;
const MAX_SESSION_TTL_SECS: u64 = 366 * 24 * 60 * 60;
const MAX_SWEEP_SECS: u64 = 7 * 24 * 60 * 60;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} is unset or still a placeholder")]
    MissingSecret(&'static str),

    #[error("{name} has an invalid value {value:?}")]
    Invalid { name: &'static str, value: String },

    #[error("cannot read secret file {path}: {source}")]
    SecretFile {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub session: SessionConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    /// Upper bound on a single batch update, enforced inside its transaction.
    pub request_timeout: Duration,
}

#[derive(Clone)]
pub struct SessionConfig {
    pub secret: String,
    pub issuer: String,
    pub ttl: Duration,
    pub sweep_interval: Duration,
}

impl SessionConfig {
    pub fn new(secret: impl Into<String>, ttl: Duration) -> Self {
        Self {
            secret: secret.into(),
            issuer: "split-bill".into(),
            ttl,
            sweep_interval: Duration::from_secs(600),
        }
    }
}

// Keeps the signing secret out of logs.
impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("secret", &"<redacted>")
            .field("issuer", &self.issuer)
            .field("ttl", &self.ttl)
            .field("sweep_interval", &self.sweep_interval)
            .finish()
    }
}

impl Config {
    /// Reads the process environment. Call `dotenvy::dotenv()` first if a
    /// `.env` file should be honoured.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = lookup("SPLITBILL_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port = parse_or(&lookup, "SPLITBILL_PORT", 3000)?;
        let db_path: PathBuf = lookup("SPLITBILL_DB_PATH")
            .unwrap_or_else(|| "splitbill.db".into())
            .into();
        let request_timeout = secs_within(
            &lookup,
            "SPLITBILL_REQUEST_TIMEOUT_SECS",
            10,
            1..=MAX_REQUEST_TIMEOUT_SECS,
        )?;

        let secret = read_secret(&lookup)?;
        let issuer = lookup("SPLITBILL_JWT_ISSUER").unwrap_or_else(|| "split-bill".into());
        let ttl = secs_within(&lookup, "SPLITBILL_SESSION_TTL_SECS", 3600, 1..=MAX_SESSION_TTL_SECS)?;
        let sweep_interval =
            secs_within(&lookup, "SPLITBILL_SESSION_SWEEP_SECS", 600, 1..=MAX_SWEEP_SECS)?;

        Ok(Self {
            server: ServerConfig {
                host,
                port,
                db_path,
                request_timeout,
            },
            session: SessionConfig {
                secret,
                issuer,
                ttl,
                sweep_interval,
            },
        })
    }
}

/// `SPLITBILL_JWT_SECRET` wins over `SPLITBILL_JWT_SECRET_FILE`.
fn read_secret<F>(lookup: &F) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let secret = match lookup("SPLITBILL_JWT_SECRET") {
        Some(secret) => secret,
        None => match lookup("SPLITBILL_JWT_SECRET_FILE") {
            Some(path) => std::fs::read_to_string(&path)
                .map_err(|source| ConfigError::SecretFile { path, source })?,
            None => String::new(),
        },
    };

    let secret = secret.trim().to_string();
    if secret.is_empty() || PLACEHOLDER_SECRETS.contains(&secret.as_str()) {
        return Err(ConfigError::MissingSecret("SPLITBILL_JWT_SECRET"));
    }
    Ok(secret)
}

fn parse_or<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(name) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
    }
}

fn secs_within<F>(
    lookup: &F,
    name: &'static str,
    default: u64,
    range: RangeInclusive<u64>,
) -> Result<Duration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let secs = parse_or(lookup, name, default)?;
    if !range.contains(&secs) {
        return Err(ConfigError::Invalid {
            name,
            value: secs.to_string(),
        });
    }
    Ok(Duration::from_secs(secs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_only_the_secret_is_set() {
        let config = Config::from_lookup(lookup(&[("SPLITBILL_JWT_SECRET", "s3cr3t-value")])).unwrap();

        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.server.db_path, PathBuf::from("splitbill.db"));
        assert_eq!(config.server.request_timeout, Duration::from_secs(10));
        assert_eq!(config.session.issuer, "split-bill");
        assert_eq!(config.session.ttl, Duration::from_secs(3600));
        assert_eq!(config.session.sweep_interval, Duration::from_secs(600));
    }

    #[test]
    fn missing_or_placeholder_secret_is_fatal() {
        assert!(matches!(
            Config::from_lookup(lookup(&[])),
            Err(ConfigError::MissingSecret(_))
        ));
        assert!(matches!(
            Config::from_lookup(lookup(&[("SPLITBILL_JWT_SECRET", "dev-secret-change-me")])),
            Err(ConfigError::MissingSecret(_))
        ));
        assert!(matches!(
            Config::from_lookup(lookup(&[("SPLITBILL_JWT_SECRET", "   ")])),
            Err(ConfigError::MissingSecret(_))
        ));
    }

    #[test]
    fn secret_can_come_from_a_file() {
        let path = std::env::temp_dir().join(format!("splitbill-secret-{}", std::process::id()));
        std::fs::write(&path, "from-a-file\n").unwrap();

        let path_str = path.to_string_lossy().into_owned();
        let config =
            Config::from_lookup(lookup(&[("SPLITBILL_JWT_SECRET_FILE", path_str.as_str())])).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.session.secret, "from-a-file");
    }

    #[test]
    fn unreadable_secret_file_is_reported() {
        let err = Config::from_lookup(lookup(&[(
            "SPLITBILL_JWT_SECRET_FILE",
            "/definitely/not/here",
        )]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::SecretFile { .. }));
    }

    #[test]
    fn malformed_numbers_are_rejected() {
        let err = Config::from_lookup(lookup(&[
            ("SPLITBILL_JWT_SECRET", "s3cr3t-value"),
            ("SPLITBILL_PORT", "http"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "SPLITBILL_PORT", .. }));
    }

    #[test]
    fn durations_out_of_range_are_rejected() {
        let too_much = u64::MAX.to_string();
        for (name, value) in [
            ("SPLITBILL_SESSION_TTL_SECS", "10000000000000"),
            ("SPLITBILL_SESSION_TTL_SECS", "0"),
            ("SPLITBILL_REQUEST_TIMEOUT_SECS", too_much.as_str()),
            ("SPLITBILL_REQUEST_TIMEOUT_SECS", "0"),
            ("SPLITBILL_SESSION_SWEEP_SECS", "0"),
        ] {
            let err = Config::from_lookup(lookup(&[
                ("SPLITBILL_JWT_SECRET", "s3cr3t-value"),
                (name, value),
            ]))
            .unwrap_err();
            assert!(
                matches!(&err, ConfigError::Invalid { name: n, .. } if *n == name),
                "{name}={value}: {err:?}"
            );
        }
    }

    #[test]
    fn a_year_long_ttl_is_accepted() {
        let config = Config::from_lookup(lookup(&[
            ("SPLITBILL_JWT_SECRET", "s3cr3t-value"),
            ("SPLITBILL_SESSION_TTL_SECS", "31536000"),
        ]))
        .unwrap();
        assert_eq!(config.session.ttl, Duration::from_secs(31_536_000));
    }

    #[test]
    fn debug_output_hides_the_secret() {
        let config = SessionConfig::new("hunter2-hunter2", Duration::from_secs(1));
        assert!(!format!("{config:?}").contains("hunter2"));
    }
}
