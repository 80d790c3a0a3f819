//! Postgres adapters.
//!
//! Rows are exchanged as JSON documents: the source renders each row with `row_to_json` and the
//! destination turns it back into a row of the destination table with `json_populate_record`.
//! The destination table must therefore have columns named like the source columns.

mod client;
pub mod destination;
pub mod source;

pub use client::{install_crypto_provider, quote_table_name};
pub use destination::PgDestination;
pub use source::PgSource;
