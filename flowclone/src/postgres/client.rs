use std::io::BufReader;
use std::sync::Once;

use flowclone_config::shared::TlsConfig;
use pg_escape::quote_identifier;
use rustls::ClientConfig;
use tokio_postgres::tls::MakeTlsConnect;
use tokio_postgres::{Client, Config, Connection, NoTls, Socket};
use tokio_postgres_rustls::MakeRustlsConnect;
use tracing::{Instrument, error, info};

use crate::clone_error;
use crate::error::{CloneError, CloneResult, ErrorKind};

static INIT_CRYPTO: Once = Once::new();

/// Installs the process-wide rustls crypto provider.
///
/// Safe to call several times, only the first call has an effect.
pub fn install_crypto_provider() {
    INIT_CRYPTO.call_once(|| {
        // Another provider may already be installed by the embedding application.
        let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
    });
}

/// Spawns a background task to monitor a Postgres connection until it terminates.
fn spawn_postgres_connection<T>(connection: Connection<Socket, T::Stream>)
where
    T: MakeTlsConnect<Socket>,
    T::Stream: Send + 'static,
{
    let span = tracing::Span::current();
    let task = async move {
        let result = connection.await;

        match result {
            Err(err) => error!("an error occurred during the postgres connection: {}", err),
            Ok(()) => info!("postgres connection terminated successfully"),
        }
    }
    .instrument(span);

    // The connection ends on its own once the owning `Client` is dropped.
    tokio::spawn(task);
}

/// Connects to Postgres, using TLS when `tls` is enabled.
///
/// Failures are reported with `kind`, which tells apart the side of the clone that failed.
pub(crate) async fn connect(
    config: &Config,
    tls: &TlsConfig,
    kind: ErrorKind,
) -> CloneResult<Client> {
    if !tls.enabled {
        let (client, connection) = config
            .connect(NoTls)
            .await
            .map_err(|err| postgres_error(kind, "Could not connect to Postgres", err))?;
        spawn_postgres_connection::<NoTls>(connection);

        info!("successfully connected to postgres without tls");

        return Ok(client);
    }

    install_crypto_provider();

    let mut root_store = rustls::RootCertStore::empty();
    let mut root_certs_reader = BufReader::new(tls.trusted_root_certs.as_bytes());
    for cert in rustls_pemfile::certs(&mut root_certs_reader) {
        let cert = cert?;
        root_store.add(cert)?;
    }

    let tls_config = ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();

    let (client, connection) = config
        .connect(MakeRustlsConnect::new(tls_config))
        .await
        .map_err(|err| postgres_error(kind, "Could not connect to Postgres", err))?;
    spawn_postgres_connection::<MakeRustlsConnect>(connection);

    info!("successfully connected to postgres with tls");

    Ok(client)
}

/// Wraps a [`tokio_postgres::Error`] into a [`CloneError`] of the given `kind`.
///
/// The SQLSTATE code is kept in the detail when the server reported one.
pub(crate) fn postgres_error(
    kind: ErrorKind,
    description: &'static str,
    err: tokio_postgres::Error,
) -> CloneError {
    let detail = match err.code() {
        Some(code) => format!("{err} (SQLSTATE {})", code.code()),
        None => err.to_string(),
    };

    clone_error!(kind, description, detail = detail, source: err)
}

/// Quotes a possibly schema-qualified table name, e.g. `public.Users` becomes `public."Users"`.
pub fn quote_table_name(table: &str) -> String {
    table
        .split('.')
        .map(|part| quote_identifier(part.trim()).into_owned())
        .collect::<Vec<_>>()
        .join(".")
}
