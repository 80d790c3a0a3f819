use flowclone_config::shared::{IntoConnectOptions, SOURCE_CONNECTION_OPTIONS, SourceConfig};
use futures::{StreamExt, TryStreamExt};
use serde_json::Value;
use tokio_postgres::Client;
use tracing::{debug, info};

use crate::bail;
use crate::error::{CloneResult, ErrorKind};
use crate::postgres::client::{connect, postgres_error, quote_table_name};
use crate::source::{RecordStream, Source};
use crate::types::Record;

/// Source reading the rows of a Postgres table as JSON documents.
pub struct PgSource {
    config: SourceConfig,
    client: Option<Client>,
}

impl PgSource {
    pub fn new(config: SourceConfig) -> Self {
        Self {
            config,
            client: None,
        }
    }

    fn client(&self) -> CloneResult<&Client> {
        match self.client.as_ref() {
            Some(client) => Ok(client),
            None => bail!(ErrorKind::InvalidState, "Postgres source is not connected"),
        }
    }

    /// Returns the `where` clause selecting the rows to copy.
    fn where_clause(&self) -> String {
        match self.config.filter() {
            Some(filter) => format!(" where {filter}"),
            None => String::new(),
        }
    }

    fn count_query(&self) -> String {
        format!(
            "select count(*) from {} t{}",
            quote_table_name(&self.config.collection),
            self.where_clause()
        )
    }

    fn select_query(&self) -> String {
        format!(
            "select row_to_json(t) from {} t{}",
            quote_table_name(&self.config.collection),
            self.where_clause()
        )
    }
}

impl Source for PgSource {
    fn name() -> &'static str {
        "postgres"
    }

    async fn connect(&mut self) -> CloneResult<()> {
        if self.client.is_some() {
            return Ok(());
        }

        let options = self
            .config
            .connect_options(Some(&SOURCE_CONNECTION_OPTIONS))?;
        let client = connect(
            &options,
            &self.config.tls,
            ErrorKind::SourceConnectionFailed,
        )
        .await?;

        info!(table = %self.config.collection, "connected to postgres source");
        self.client = Some(client);

        Ok(())
    }

    async fn count_estimate(&self) -> CloneResult<u64> {
        let query = self.count_query();
        debug!(%query, "counting source rows");

        let row = self
            .client()?
            .query_one(&query, &[])
            .await
            .map_err(|err| {
                postgres_error(
                    ErrorKind::SourceQueryFailed,
                    "Could not count the source rows",
                    err,
                )
            })?;

        let count: i64 = row.try_get(0).map_err(|err| {
            postgres_error(
                ErrorKind::ConversionError,
                "Unexpected value returned by the source row count",
                err,
            )
        })?;

        Ok(count.max(0) as u64)
    }

    async fn open_stream(&self) -> CloneResult<RecordStream> {
        let query = self.select_query();
        debug!(%query, "opening source row stream");

        let rows = self
            .client()?
            .query_raw(&query, std::iter::empty::<String>())
            .await
            .map_err(|err| {
                postgres_error(
                    ErrorKind::SourceQueryFailed,
                    "Could not query the source table",
                    err,
                )
            })?;

        let records = rows
            .map_err(|err| {
                postgres_error(
                    ErrorKind::SourceReadError,
                    "Could not read the next source row",
                    err,
                )
            })
            .and_then(|row| async move {
                let value: Value = row.try_get(0).map_err(|err| {
                    postgres_error(
                        ErrorKind::ConversionError,
                        "Could not decode a source row as json",
                        err,
                    )
                })?;

                Ok(Record::new(value))
            });

        Ok(records.boxed())
    }

    async fn close(&mut self) -> CloneResult<()> {
        // Dropping the client terminates the connection task.
        if self.client.take().is_some() {
            info!(table = %self.config.collection, "closed postgres source connection");
        }

        Ok(())
    }
}
