use flowclone_config::shared::{
    DESTINATION_CONNECTION_OPTIONS, DestinationConfig, IntoConnectOptions,
};
use tokio_postgres::{Client, Statement};
use tracing::info;

use crate::bail;
use crate::destination::Destination;
use crate::error::{CloneResult, ErrorKind};
use crate::postgres::client::{connect, postgres_error, quote_table_name};
use crate::types::Record;

struct Connected {
    client: Client,
    insert: Statement,
}

/// Destination inserting JSON documents as rows of an existing Postgres table.
///
/// Document keys are matched to column names. Keys without a matching column are ignored and
/// columns without a matching key receive `null`.
pub struct PgDestination {
    config: DestinationConfig,
    connected: Option<Connected>,
}

impl PgDestination {
    pub fn new(config: DestinationConfig) -> Self {
        Self {
            config,
            connected: None,
        }
    }

    fn insert_query(&self) -> String {
        let table = quote_table_name(&self.config.collection);

        format!("insert into {table} select * from json_populate_record(null::{table}, $1)")
    }
}

impl Destination for PgDestination {
    fn name() -> &'static str {
        "postgres"
    }

    async fn connect(&mut self) -> CloneResult<()> {
        if self.connected.is_some() {
            return Ok(());
        }

        let options = self
            .config
            .connect_options(Some(&DESTINATION_CONNECTION_OPTIONS))?;
        let client = connect(
            &options,
            &self.config.tls,
            ErrorKind::DestinationConnectionFailed,
        )
        .await?;

        // Preparing the insert up front fails fast when the table does not exist.
        let insert = client.prepare(&self.insert_query()).await.map_err(|err| {
            postgres_error(
                ErrorKind::DestinationConnectionFailed,
                "Could not prepare the insert into the destination table",
                err,
            )
        })?;

        info!(table = %self.config.collection, "connected to postgres destination");
        self.connected = Some(Connected { client, insert });

        Ok(())
    }

    async fn write_record(&self, record: Record) -> CloneResult<()> {
        let Some(connected) = self.connected.as_ref() else {
            bail!(ErrorKind::WriteError, "Postgres destination is not connected");
        };

        let value = record.into_value();
        connected
            .client
            .execute(&connected.insert, &[&value])
            .await
            .map_err(|err| {
                postgres_error(
                    ErrorKind::WriteError,
                    "Could not insert the record into the destination table",
                    err,
                )
            })?;

        Ok(())
    }

    async fn close(&mut self) -> CloneResult<()> {
        if self.connected.take().is_some() {
            info!(table = %self.config.collection, "closed postgres destination connection");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use flowclone_config::shared::TlsConfig;
    use secrecy::SecretString;
    use serde_json::json;

    use super::*;

    fn destination() -> PgDestination {
        PgDestination::new(DestinationConfig {
            credentials: SecretString::new("postgresql://localhost:5432".to_string()),
            database: "app".to_string(),
            collection: "backup.users_03_07_2024".to_string(),
            tls: TlsConfig::disabled(),
        })
    }

    #[test]
    fn insert_populates_the_destination_row_type() {
        assert_eq!(
            destination().insert_query(),
            "insert into backup.users_03_07_2024 select * from json_populate_record(null::backup.users_03_07_2024, $1)"
        );
    }

    #[tokio::test]
    async fn writing_before_connecting_fails_the_record() {
        let err = destination()
            .write_record(Record::new(json!({"id": 1})))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::WriteError);
    }
}
