use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::LazyLock;
use tokio_postgres::{Config as TokioPgConnectOptions, config::SslMode as TokioPgSslMode};

use crate::shared::ValidationError;

/// Common Postgres settings shared by both sides of a clone.
const COMMON_DATESTYLE: &str = "ISO";
const COMMON_INTERVALSTYLE: &str = "postgres";
const COMMON_EXTRA_FLOAT_DIGITS: i32 = 3;
const COMMON_CLIENT_ENCODING: &str = "UTF8";
const COMMON_TIMEZONE: &str = "UTC";

const APP_NAME_SOURCE: &str = "flowclone_source";
const APP_NAME_DESTINATION: &str = "flowclone_destination";

/// Session options for the connection reading the source table.
///
/// The statement timeout is disabled since the read query streams for the whole run.
pub static SOURCE_CONNECTION_OPTIONS: LazyLock<PgConnectionOptions> =
    LazyLock::new(|| PgConnectionOptions {
        datestyle: COMMON_DATESTYLE.to_string(),
        intervalstyle: COMMON_INTERVALSTYLE.to_string(),
        extra_float_digits: COMMON_EXTRA_FLOAT_DIGITS,
        client_encoding: COMMON_CLIENT_ENCODING.to_string(),
        timezone: COMMON_TIMEZONE.to_string(),
        statement_timeout: 0,
        lock_timeout: 30_000,
        application_name: APP_NAME_SOURCE.to_string(),
    });

/// Session options for the connection writing to the destination table.
pub static DESTINATION_CONNECTION_OPTIONS: LazyLock<PgConnectionOptions> =
    LazyLock::new(|| PgConnectionOptions {
        datestyle: COMMON_DATESTYLE.to_string(),
        intervalstyle: COMMON_INTERVALSTYLE.to_string(),
        extra_float_digits: COMMON_EXTRA_FLOAT_DIGITS,
        client_encoding: COMMON_CLIENT_ENCODING.to_string(),
        timezone: COMMON_TIMEZONE.to_string(),
        statement_timeout: 30_000,
        lock_timeout: 10_000,
        application_name: APP_NAME_DESTINATION.to_string(),
    });

#[derive(Debug, Clone)]
pub struct PgConnectionOptions {
    pub datestyle: String,
    pub intervalstyle: String,
    pub extra_float_digits: i32,
    pub client_encoding: String,
    pub timezone: String,
    pub statement_timeout: u32,
    pub lock_timeout: u32,
    pub application_name: String,
}

impl PgConnectionOptions {
    pub fn to_options_string(&self) -> String {
        format!(
            "-c datestyle={} -c intervalstyle={} -c extra_float_digits={} -c client_encoding={} -c timezone={} -c statement_timeout={} -c lock_timeout={}",
            self.datestyle,
            self.intervalstyle,
            self.extra_float_digits,
            self.client_encoding,
            self.timezone,
            self.statement_timeout,
            self.lock_timeout,
        )
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TlsConfig {
    #[serde(default)]
    pub trusted_root_certs: String,
    #[serde(default)]
    pub enabled: bool,
}

impl TlsConfig {
    pub fn disabled() -> Self {
        Self {
            trusted_root_certs: "".to_string(),
            enabled: false,
        }
    }

    /// Validates TLS settings.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.enabled && self.trusted_root_certs.trim().is_empty() {
            return Err(ValidationError::MissingTrustedRootCerts);
        }

        Ok(())
    }
}

/// Builds [`tokio_postgres`] connection options from a clone endpoint configuration.
pub trait IntoConnectOptions {
    fn connect_options(
        &self,
        options: Option<&PgConnectionOptions>,
    ) -> Result<TokioPgConnectOptions, ValidationError>;
}

/// Parses `credentials` and layers the database name, TLS mode and session options on top.
///
/// A non-empty `database` wins over the database named inside the connection string.
pub(crate) fn build_connect_options(
    field: &'static str,
    credentials: &SecretString,
    database: &str,
    tls: &TlsConfig,
    options: Option<&PgConnectionOptions>,
) -> Result<TokioPgConnectOptions, ValidationError> {
    let mut config = TokioPgConnectOptions::from_str(credentials.expose_secret()).map_err(
        |err| ValidationError::InvalidCredentials {
            field,
            reason: err.to_string(),
        },
    )?;

    if !database.is_empty() {
        config.dbname(database);
    }

    let ssl_mode = if tls.enabled {
        TokioPgSslMode::Require
    } else {
        TokioPgSslMode::Disable
    };
    config.ssl_mode(ssl_mode);

    if let Some(opts) = options {
        config.options(&opts.to_options_string());
        config.application_name(&opts.application_name);
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_options_string_format() {
        let options_string = SOURCE_CONNECTION_OPTIONS.to_options_string();
        assert_eq!(
            options_string,
            "-c datestyle=ISO -c intervalstyle=postgres -c extra_float_digits=3 -c client_encoding=UTF8 -c timezone=UTC -c statement_timeout=0 -c lock_timeout=30000"
        );
    }

    #[test]
    fn test_database_overrides_credentials() {
        let credentials = SecretString::new("postgresql://user:pw@db-host:6543/other".to_string());

        let config = build_connect_options(
            "src.credentials",
            &credentials,
            "wanted",
            &TlsConfig::disabled(),
            Some(&DESTINATION_CONNECTION_OPTIONS),
        )
        .unwrap();

        assert_eq!(config.get_dbname(), Some("wanted"));
        assert_eq!(config.get_user(), Some("user"));
        assert_eq!(config.get_ports(), &[6543]);
        assert_eq!(
            config.get_application_name(),
            Some(APP_NAME_DESTINATION)
        );
        assert!(matches!(config.get_ssl_mode(), TokioPgSslMode::Disable));
    }

    #[test]
    fn test_invalid_credentials_are_rejected() {
        let credentials = SecretString::new("postgresql://host:notaport".to_string());

        let err = build_connect_options(
            "dst.credentials",
            &credentials,
            "",
            &TlsConfig::disabled(),
            None,
        )
        .unwrap_err();

        assert!(matches!(
            err,
            ValidationError::InvalidCredentials {
                field: "dst.credentials",
                ..
            }
        ));
    }

    #[test]
    fn test_tls_requires_root_certs() {
        let tls = TlsConfig {
            trusted_root_certs: String::new(),
            enabled: true,
        };

        assert!(matches!(
            tls.validate(),
            Err(ValidationError::MissingTrustedRootCerts)
        ));
        assert!(TlsConfig::disabled().validate().is_ok());
    }
}
