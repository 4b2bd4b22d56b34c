//! awstab - AWS resources as queryable tables
//!
//! Each supported AWS resource type is exposed as a table with a declared
//! column schema. A table lists all resources (paginating the underlying
//! API and enriching each item through hydrate calls) or fetches a single
//! resource by its key column. Construct a [`Plugin`] from a
//! [`ConnectionConfig`], then drive list and get queries through it:
//!
//! ```no_run
//! # async fn run() -> awstab::Result<()> {
//! use futures::StreamExt;
//!
//! let plugin = awstab::plugin(&awstab::ConnectionConfig::default())?;
//! let mut rows = plugin.list("aws_iam_user", plugin.query_context())?;
//! while let Some(row) = rows.next().await {
//!     println!("{:?}", row?);
//! }
//! # Ok(())
//! # }
//! ```

pub mod aws;
pub mod config;
pub mod error;
pub mod registry;
pub mod table;
pub mod tables;

pub use config::ConnectionConfig;
pub use error::{Error, Result};
pub use registry::{build_registry, Registry};
pub use table::{CellValue, Column, ColumnType, QueryContext, Row, RowStream, TableSpec};

use aws::client::AwsClient;
use std::sync::Arc;

pub const PLUGIN_NAME: &str = "awstab";

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Error codes every table treats as "not found" on get lookups, on top of
/// the table-specific and connection-configured codes.
pub const DEFAULT_IGNORE_CODES: &[&str] = &["ResourceNotFoundException", "NoSuchEntity"];

/// A configured connection: the table registry plus the API client built
/// from one [`ConnectionConfig`].
pub struct Plugin {
    registry: Registry,
    client: AwsClient,
    ignore_codes: Vec<String>,
}

/// Build a [`Plugin`] for the given connection configuration
pub fn plugin(config: &ConnectionConfig) -> Result<Plugin> {
    let client = AwsClient::new(config)?;
    let mut ignore_codes: Vec<String> = DEFAULT_IGNORE_CODES
        .iter()
        .map(|c| c.to_string())
        .collect();
    ignore_codes.extend(config.ignore_error_codes.iter().cloned());

    let registry = build_registry();
    tracing::debug!(
        region = %client.region,
        tables = registry.len(),
        "plugin initialized"
    );

    Ok(Plugin {
        registry,
        client,
        ignore_codes,
    })
}

impl Plugin {
    /// A fresh query context carrying the connection's client and error
    /// suppression set; add quals and a limit before issuing the query.
    pub fn query_context(&self) -> QueryContext {
        QueryContext::new(self.client.clone()).with_ignore_codes(self.ignore_codes.iter().cloned())
    }

    /// Stream all rows of a table
    pub fn list(&self, table: &str, ctx: QueryContext) -> Result<RowStream> {
        let table = self.registry.table(table)?;
        tracing::debug!(table = table.name(), "list query");
        Ok(table.list(ctx))
    }

    /// Fetch one row by key column, or `None` when the resource does not
    /// exist and its error code is in the suppression set
    pub async fn get(&self, table: &str, ctx: QueryContext) -> Result<Option<Row>> {
        let table = self.registry.table(table)?;
        tracing::debug!(table = table.name(), "get query");
        table.get(ctx).await
    }

    /// All table names this connection serves, sorted
    pub fn table_names(&self) -> Vec<&'static str> {
        self.registry.names()
    }

    /// Schema access for one table
    pub fn table(&self, name: &str) -> Result<Arc<dyn TableSpec>> {
        self.registry.table(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plugin_builds_from_default_config() {
        let plugin = plugin(&ConnectionConfig::default()).unwrap();
        assert_eq!(plugin.table_names().len(), 3);
    }

    #[test]
    fn connection_codes_extend_the_default_suppression_set() {
        let config = ConnectionConfig {
            ignore_error_codes: vec!["AccessDenied".to_string()],
            ..Default::default()
        };
        let plugin = plugin(&config).unwrap();
        let ctx = plugin.query_context();

        let denied = Error::Api {
            status: 403,
            code: Some("AccessDenied".to_string()),
            message: "nope".to_string(),
        };
        let missing = Error::Api {
            status: 404,
            code: Some("NoSuchEntity".to_string()),
            message: "gone".to_string(),
        };
        assert!(ctx.should_ignore(&denied, &[]));
        assert!(ctx.should_ignore(&missing, &[]));
    }

    #[tokio::test]
    async fn unknown_table_is_rejected() {
        let plugin = plugin(&ConnectionConfig::default()).unwrap();
        let result = plugin.list("aws_unknown", plugin.query_context());
        assert!(matches!(result, Err(Error::UnknownTable(_))));
    }
}
