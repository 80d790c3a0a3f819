use flowclone_config::shared::{DestinationConfig, SourceConfig, TlsConfig};
use secrecy::SecretString;
use tokio_postgres::{Client, NoTls};
use uuid::Uuid;

/// Builds the credentials of the local Postgres server used by tests, without a database.
///
/// Configuration is read from environment variables:
/// - `TESTS_DATABASE_HOST`: Postgres server hostname (required)
/// - `TESTS_DATABASE_PORT`: Postgres server port (required)
/// - `TESTS_DATABASE_USERNAME`: Database user (required)
/// - `TESTS_DATABASE_PASSWORD`: Database password (optional)
fn local_credentials() -> String {
    let host = std::env::var("TESTS_DATABASE_HOST").expect("TESTS_DATABASE_HOST must be set");
    let port: u16 = std::env::var("TESTS_DATABASE_PORT")
        .expect("TESTS_DATABASE_PORT must be set")
        .parse()
        .expect("TESTS_DATABASE_PORT must be a valid port number");
    let username =
        std::env::var("TESTS_DATABASE_USERNAME").expect("TESTS_DATABASE_USERNAME must be set");

    match std::env::var("TESTS_DATABASE_PASSWORD") {
        Ok(password) => format!("postgresql://{username}:{password}@{host}:{port}"),
        Err(_) => format!("postgresql://{username}@{host}:{port}"),
    }
}

async fn connect_to(credentials: &str, database: &str) -> Client {
    let (client, connection) =
        tokio_postgres::connect(&format!("{credentials}/{database}"), NoTls)
            .await
            .expect("Failed to connect to Postgres");

    tokio::spawn(async move {
        if let Err(err) = connection.await {
            eprintln!("warning: test postgres connection failed: {err}");
        }
    });

    client
}

/// A uniquely named Postgres database living for the duration of a test.
pub struct TestDatabase {
    credentials: String,
    name: String,
    client: Client,
}

impl TestDatabase {
    /// Returns a client connected to the test database.
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Returns a source configuration reading `table` of the test database.
    pub fn source_config(&self, table: &str, query: Option<&str>) -> SourceConfig {
        SourceConfig {
            credentials: SecretString::new(self.credentials.clone()),
            database: self.name.clone(),
            collection: table.to_owned(),
            query: query.map(str::to_owned),
            tls: TlsConfig::default(),
        }
    }

    /// Returns a destination configuration writing `table` of the test database.
    pub fn destination_config(&self, table: &str) -> DestinationConfig {
        DestinationConfig {
            credentials: SecretString::new(self.credentials.clone()),
            database: self.name.clone(),
            collection: table.to_owned(),
            tls: TlsConfig::default(),
        }
    }

    /// Drops the test database, terminating the connections still open on it.
    ///
    /// Failures are only reported, so cleanup never fails a test.
    pub async fn drop_database(self) {
        let Self {
            credentials,
            name,
            client,
        } = self;
        drop(client);

        let admin = connect_to(&credentials, "postgres").await;

        if let Err(err) = admin
            .execute(
                "select pg_terminate_backend(pid) from pg_stat_activity \
                 where datname = $1 and pid <> pg_backend_pid()",
                &[&name],
            )
            .await
        {
            eprintln!("warning: failed to terminate connections for database {name}: {err}");
        }

        if let Err(err) = admin
            .batch_execute(&format!(r#"drop database if exists "{name}""#))
            .await
        {
            eprintln!("warning: failed to drop database {name}: {err}");
        }
    }
}

/// Creates a database with a random name on the local test server and connects to it.
///
/// # Panics
///
/// Panics if the server cannot be reached or the database cannot be created.
pub async fn spawn_database() -> TestDatabase {
    let credentials = local_credentials();
    let name = Uuid::new_v4().to_string();

    let admin = connect_to(&credentials, "postgres").await;
    admin
        .batch_execute(&format!(r#"create database "{name}""#))
        .await
        .expect("Failed to create database");

    let client = connect_to(&credentials, &name).await;

    TestDatabase {
        credentials,
        name,
        client,
    }
}
