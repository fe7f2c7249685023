use std::time::Duration;

use chrono_tz::Tz;

/// Where the database credential comes from.
///
/// The credential is an OAuth token used as the PostgreSQL password. It is
/// loaded at process start and re-resolved by the server's refresh loop on
/// the dashboard cadence, so a rotated secret file picks up without a
/// restart. There is deliberately no fallback identity: a missing credential
/// is a startup error, not a silent downgrade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialSource {
    /// Token provided directly via `GENIELYTICS_DB_TOKEN`. Fixed for the
    /// process lifetime.
    Token(String),
    /// Path to a mounted secret file (`GENIELYTICS_DB_TOKEN_FILE`), re-read
    /// on every refresh cycle.
    TokenFile(String),
}

impl CredentialSource {
    /// Resolve the current token value.
    pub fn resolve(&self) -> Result<String, String> {
        match self {
            CredentialSource::Token(token) => Ok(token.clone()),
            CredentialSource::TokenFile(path) => {
                let raw = std::fs::read_to_string(path)
                    .map_err(|e| format!("could not read credential file {path}: {e}"))?;
                let token = raw.trim().to_string();
                if token.is_empty() {
                    return Err(format!("credential file {path} is empty"));
                }
                Ok(token)
            }
        }
    }
}

/// PostgreSQL connection coordinates. The token is kept separate from the
/// rest so it can be refreshed without re-parsing configuration.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub name: String,
    pub user: String,
    pub credential: CredentialSource,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database: DatabaseConfig,
    /// IANA zone used for calendar-date truncation in the views; applied as
    /// the database session TimeZone at connect time.
    pub timezone: Tz,
    /// Dashboard auto-refresh cadence; also drives the credential refresh
    /// loop.
    pub refresh_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        let require = |name: &'static str| -> Result<String, String> {
            std::env::var(name).map_err(|_| format!("{name} is required"))
        };

        let credential = match std::env::var("GENIELYTICS_DB_TOKEN") {
            Ok(token) if !token.trim().is_empty() => CredentialSource::Token(token),
            _ => match std::env::var("GENIELYTICS_DB_TOKEN_FILE") {
                Ok(path) if !path.trim().is_empty() => CredentialSource::TokenFile(path),
                _ => {
                    return Err(
                        "no database credential available: set GENIELYTICS_DB_TOKEN or \
                         GENIELYTICS_DB_TOKEN_FILE"
                            .to_string(),
                    )
                }
            },
        };

        Ok(Self {
            port: std::env::var("GENIELYTICS_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|e| format!("invalid port: {e}"))?,
            database: DatabaseConfig {
                host: require("GENIELYTICS_DB_HOST")?,
                port: std::env::var("GENIELYTICS_DB_PORT")
                    .unwrap_or_else(|_| "5432".to_string())
                    .parse()
                    .map_err(|e| format!("invalid database port: {e}"))?,
                name: require("GENIELYTICS_DB_NAME")?,
                user: require("GENIELYTICS_DB_USER")?,
                credential,
            },
            timezone: {
                let raw = std::env::var("GENIELYTICS_TIMEZONE")
                    .unwrap_or_else(|_| "UTC".to_string());
                raw.parse::<Tz>()
                    .map_err(|_| format!("invalid GENIELYTICS_TIMEZONE: {raw}"))?
            },
            refresh_secs: std::env::var("GENIELYTICS_REFRESH_SECS")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .unwrap_or(60),
        })
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_secs)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    /// Serializes all env-var mutation tests in this module. Tests run in
    /// parallel by default; interleaved env mutation would make the
    /// fail-closed assertions flaky.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn clear_env() {
        for var in [
            "GENIELYTICS_PORT",
            "GENIELYTICS_DB_HOST",
            "GENIELYTICS_DB_PORT",
            "GENIELYTICS_DB_NAME",
            "GENIELYTICS_DB_USER",
            "GENIELYTICS_DB_TOKEN",
            "GENIELYTICS_DB_TOKEN_FILE",
            "GENIELYTICS_TIMEZONE",
            "GENIELYTICS_REFRESH_SECS",
        ] {
            std::env::remove_var(var);
        }
    }

    fn set_minimal_env() {
        std::env::set_var("GENIELYTICS_DB_HOST", "db.example.net");
        std::env::set_var("GENIELYTICS_DB_NAME", "genielytics");
        std::env::set_var("GENIELYTICS_DB_USER", "svc-genielytics");
        std::env::set_var("GENIELYTICS_DB_TOKEN", "tok-123");
    }

    #[test]
    fn missing_credential_fails_closed() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|p| p.into_inner());
        clear_env();
        std::env::set_var("GENIELYTICS_DB_HOST", "db.example.net");
        std::env::set_var("GENIELYTICS_DB_NAME", "genielytics");
        std::env::set_var("GENIELYTICS_DB_USER", "svc-genielytics");

        let err = Config::from_env().unwrap_err();
        assert!(
            err.contains("no database credential available"),
            "unexpected error: {err}"
        );
    }

    #[test]
    fn minimal_env_applies_defaults() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|p| p.into_inner());
        clear_env();
        set_minimal_env();

        let cfg = Config::from_env().unwrap();
        assert_eq!(cfg.port, 3000);
        assert_eq!(cfg.database.port, 5432);
        assert_eq!(cfg.timezone, chrono_tz::UTC);
        assert_eq!(cfg.refresh_secs, 60);
        assert_eq!(
            cfg.database.credential,
            CredentialSource::Token("tok-123".to_string())
        );
    }

    #[test]
    fn token_file_wins_only_when_token_absent() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|p| p.into_inner());
        clear_env();
        set_minimal_env();
        std::env::remove_var("GENIELYTICS_DB_TOKEN");
        std::env::set_var("GENIELYTICS_DB_TOKEN_FILE", "/run/secrets/db-token");

        let cfg = Config::from_env().unwrap();
        assert_eq!(
            cfg.database.credential,
            CredentialSource::TokenFile("/run/secrets/db-token".to_string())
        );
    }

    #[test]
    fn invalid_timezone_is_rejected() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|p| p.into_inner());
        clear_env();
        set_minimal_env();
        std::env::set_var("GENIELYTICS_TIMEZONE", "Mars/Olympus_Mons");

        let err = Config::from_env().unwrap_err();
        assert!(err.contains("invalid GENIELYTICS_TIMEZONE"));
    }

    #[test]
    fn token_file_resolve_reads_and_trims() {
        let dir = std::env::temp_dir();
        let path = dir.join("genielytics-test-token");
        std::fs::write(&path, "tok-from-file\n").unwrap();

        let source = CredentialSource::TokenFile(path.to_string_lossy().into_owned());
        assert_eq!(source.resolve().unwrap(), "tok-from-file");

        std::fs::write(&path, "   \n").unwrap();
        assert!(source.resolve().unwrap_err().contains("is empty"));

        std::fs::remove_file(&path).ok();
    }
}
