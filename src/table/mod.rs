//! Table abstraction layer
//!
//! A table binds one AWS resource type to a declared schema: columns with
//! semantic types and extraction rules, a paginated "list" binding, an
//! optional keyed "get" binding, and hydrators that enrich each item with
//! secondary API calls.
//!
//! # Architecture
//!
//! - [`transform`] - Pure row mapping: extraction rules and type coercion
//! - [`hydrate`] - Dependency resolution for hydrators (topological order)
//! - [`fanout`] - Bounded concurrent fan-out for per-item sub-calls
//!
//! List execution streams typed items from the fetcher into a bounded
//! channel while a worker hydrates items concurrently and forwards rendered
//! rows. Dropping the row receiver (or reaching the row limit) closes the
//! item channel, which stops the fetcher from issuing further pages.

pub mod fanout;
pub(crate) mod hydrate;
pub mod transform;

use crate::aws::client::AwsClient;
use crate::error::{Error, Result};
use async_trait::async_trait;
use futures::channel::mpsc;
use futures::future::BoxFuture;
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

pub use transform::{CellValue, ColumnType, HydrateMap, Row, Transform};

/// Channel capacity between fetcher, hydration worker, and consumer
const CHANNEL_CAPACITY: usize = 32;

/// How many items hydrate concurrently within one query
const ITEM_CONCURRENCY: usize = 8;

/// Sender half handed to a table's list binding
pub type ItemSender<T> = mpsc::Sender<T>;

/// Stream of rendered rows; fetch-level errors terminate the stream,
/// per-item hydrate errors appear as that item's `Err` entry.
pub type RowStream = mpsc::Receiver<Result<Row>>;

type ListFn<T> =
    Arc<dyn Fn(QueryContext, ItemSender<T>) -> BoxFuture<'static, Result<()>> + Send + Sync>;
type GetFn<T> = Arc<dyn Fn(QueryContext) -> BoxFuture<'static, Result<T>> + Send + Sync>;
type HydrateFn<T> = Arc<
    dyn for<'a> Fn(&'a QueryContext, &'a T, &'a HydrateMap) -> BoxFuture<'a, Result<Value>>
        + Send
        + Sync,
>;

/// Send one fetched item downstream. Returns `false` when the consumer has
/// stopped reading (row limit reached or query cancelled); the list binding
/// should stop paginating and return `Ok`.
pub async fn stream_item<T>(tx: &mut ItemSender<T>, item: T) -> bool {
    tx.send(item).await.is_ok()
}

/// Per-query execution context: shared API client, key column values, row
/// limit, and the connection-level error suppression set.
#[derive(Clone)]
pub struct QueryContext {
    client: Arc<AwsClient>,
    quals: Arc<HashMap<&'static str, String>>,
    ignore_codes: Arc<Vec<String>>,
    limit: Option<usize>,
}

impl QueryContext {
    pub fn new(client: AwsClient) -> Self {
        Self {
            client: Arc::new(client),
            quals: Arc::new(HashMap::new()),
            ignore_codes: Arc::new(Vec::new()),
            limit: None,
        }
    }

    /// Set a key column value for a get lookup
    pub fn with_qual(mut self, column: &'static str, value: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.quals).insert(column, value.into());
        self
    }

    /// Cap the number of rendered rows a list query produces; pagination
    /// stops once the cap is reached. Per-item `Err` entries do not count
    /// toward the cap.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Add error codes that get lookups treat as empty results
    pub fn with_ignore_codes<I, S>(mut self, codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Arc::make_mut(&mut self.ignore_codes).extend(codes.into_iter().map(Into::into));
        self
    }

    pub fn client(&self) -> &AwsClient {
        &self.client
    }

    pub fn qual(&self, column: &str) -> Option<&str> {
        self.quals.get(column).map(String::as_str)
    }

    pub fn require_qual(&self, column: &'static str) -> Result<&str> {
        self.qual(column).ok_or(Error::MissingKey(column))
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    /// Whether an error's code is in the suppression set (the table's get
    /// config plus the connection-level codes)
    pub fn should_ignore(&self, error: &Error, extra: &[&str]) -> bool {
        let Some(code) = error.code() else {
            return false;
        };
        extra.contains(&code) || self.ignore_codes.iter().any(|c| c.as_str() == code)
    }
}

/// Static metadata describing one output column
#[derive(Debug, Clone)]
pub struct Column {
    pub name: &'static str,
    pub description: &'static str,
    pub kind: ColumnType,
    /// Hydrator whose result this column reads; `None` reads the base item
    pub hydrate: Option<&'static str>,
    pub transform: Transform,
}

impl Column {
    pub fn new(name: &'static str, description: &'static str, kind: ColumnType) -> Self {
        Self {
            name,
            description,
            kind,
            hydrate: None,
            transform: Transform::default_field(),
        }
    }

    pub fn hydrate(mut self, hydrator: &'static str) -> Self {
        self.hydrate = Some(hydrator);
        self
    }

    pub fn transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }
}

/// A named secondary fetch enriching one item
pub struct Hydrator<T> {
    pub name: &'static str,
    pub depends: &'static [&'static str],
    func: HydrateFn<T>,
}

impl<T> Hydrator<T> {
    pub fn new<F>(name: &'static str, func: F) -> Self
    where
        F: for<'a> Fn(&'a QueryContext, &'a T, &'a HydrateMap) -> BoxFuture<'a, Result<Value>>
            + Send
            + Sync
            + 'static,
    {
        Self {
            name,
            depends: &[],
            func: Arc::new(func),
        }
    }

    /// Declare hydrators that must run (and succeed) before this one
    pub fn depends(mut self, depends: &'static [&'static str]) -> Self {
        self.depends = depends;
        self
    }
}

impl<T> Clone for Hydrator<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            depends: self.depends,
            func: Arc::clone(&self.func),
        }
    }
}

/// Binding for single-item lookup by key column
pub struct GetConfig<T> {
    pub key_column: &'static str,
    /// Error codes treated as "not found" for this table's get
    pub ignore_codes: &'static [&'static str],
    func: GetFn<T>,
}

impl<T> GetConfig<T> {
    pub fn new<F>(key_column: &'static str, func: F) -> Self
    where
        F: Fn(QueryContext) -> BoxFuture<'static, Result<T>> + Send + Sync + 'static,
    {
        Self {
            key_column,
            ignore_codes: &[],
            func: Arc::new(func),
        }
    }

    pub fn ignore_codes(mut self, codes: &'static [&'static str]) -> Self {
        self.ignore_codes = codes;
        self
    }
}

impl<T> Clone for GetConfig<T> {
    fn clone(&self) -> Self {
        Self {
            key_column: self.key_column,
            ignore_codes: self.ignore_codes,
            func: Arc::clone(&self.func),
        }
    }
}

/// Complete definition of one table over a typed resource item `T`
pub struct Table<T> {
    name: &'static str,
    description: &'static str,
    columns: Vec<Column>,
    list_fn: ListFn<T>,
    get_config: Option<GetConfig<T>>,
    hydrators: Vec<Hydrator<T>>,
}

impl<T> Clone for Table<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            description: self.description,
            columns: self.columns.clone(),
            list_fn: Arc::clone(&self.list_fn),
            get_config: self.get_config.clone(),
            hydrators: self.hydrators.clone(),
        }
    }
}

impl<T> Table<T>
where
    T: Serialize + Send + Sync + 'static,
{
    pub fn new<F>(name: &'static str, description: &'static str, list: F) -> Self
    where
        F: Fn(QueryContext, ItemSender<T>) -> BoxFuture<'static, Result<()>>
            + Send
            + Sync
            + 'static,
    {
        Self {
            name,
            description,
            columns: Vec::new(),
            list_fn: Arc::new(list),
            get_config: None,
            hydrators: Vec::new(),
        }
    }

    pub fn get_config(mut self, get: GetConfig<T>) -> Self {
        self.get_config = Some(get);
        self
    }

    pub fn hydrator(mut self, hydrator: Hydrator<T>) -> Self {
        self.hydrators.push(hydrator);
        self
    }

    pub fn columns(mut self, columns: Vec<Column>) -> Self {
        self.columns = columns;
        self
    }

    fn hydrate_nodes(&self) -> Vec<(&'static str, &'static [&'static str])> {
        self.hydrators
            .iter()
            .map(|h| (h.name, h.depends))
            .collect()
    }

    /// Run every hydrator in dependency order, then render the row
    async fn hydrate_and_render(
        &self,
        ctx: &QueryContext,
        order: &[usize],
        item: T,
    ) -> Result<Row> {
        let mut results = HydrateMap::new();

        for &index in order {
            let hydrator = &self.hydrators[index];
            for dep in hydrator.depends {
                if !results.contains_key(dep) {
                    return Err(Error::MissingDependency {
                        hydrator: hydrator.name.to_string(),
                        dependency: dep.to_string(),
                    });
                }
            }
            let value = (hydrator.func)(ctx, &item, &results).await?;
            results.insert(hydrator.name, value);
        }

        let raw = serde_json::to_value(&item).map_err(|e| Error::decode("item", e))?;
        transform::render_row(self.name, &self.columns, &raw, &results)
    }

    fn stream_rows(&self, ctx: QueryContext) -> RowStream {
        let (mut row_tx, row_rx) = mpsc::channel::<Result<Row>>(CHANNEL_CAPACITY);

        let order = match hydrate::execution_order(&self.hydrate_nodes()) {
            Ok(order) => order,
            Err(err) => {
                let _ = row_tx.try_send(Err(err));
                return row_rx;
            }
        };

        let (item_tx, item_rx) = mpsc::channel::<T>(CHANNEL_CAPACITY);

        // fetcher: streams raw items, following pagination until exhausted
        // or until the item channel closes
        let list = Arc::clone(&self.list_fn);
        let fetch_ctx = ctx.clone();
        let mut fetch_err_tx = row_tx.clone();
        tokio::spawn(async move {
            if let Err(err) = list(fetch_ctx, item_tx).await {
                let _ = fetch_err_tx.send(Err(err)).await;
            }
        });

        // hydration worker: bounded concurrency across items; each item's
        // hydrate or decode failure becomes that item's Err entry
        let table = self.clone();
        tokio::spawn(async move {
            let limit = ctx.limit();
            let mut rows = item_rx
                .map(|item| {
                    let table = table.clone();
                    let ctx = ctx.clone();
                    let order = order.clone();
                    async move { table.hydrate_and_render(&ctx, &order, item).await }
                })
                .buffer_unordered(ITEM_CONCURRENCY);

            // only rendered rows count toward the limit; an item whose
            // hydrate failed does not consume the caller's row budget
            let mut sent = 0usize;
            while let Some(row) = rows.next().await {
                let rendered = row.is_ok();
                if row_tx.send(row).await.is_err() {
                    break;
                }
                if rendered {
                    sent += 1;
                    if limit.is_some_and(|l| sent >= l) {
                        break;
                    }
                }
            }
        });

        row_rx
    }

    async fn get_row(&self, ctx: QueryContext) -> Result<Option<Row>> {
        let Some(get) = &self.get_config else {
            return Err(Error::GetUnsupported(self.name));
        };
        ctx.require_qual(get.key_column)?;

        let order = hydrate::execution_order(&self.hydrate_nodes())?;

        match (get.func)(ctx.clone()).await {
            Ok(item) => self.hydrate_and_render(&ctx, &order, item).await.map(Some),
            Err(err) if ctx.should_ignore(&err, get.ignore_codes) => Ok(None),
            Err(err) => Err(err),
        }
    }
}

/// Type-erased table interface handed to the registry
#[async_trait]
pub trait TableSpec: Send + Sync {
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    fn columns(&self) -> &[Column];

    /// The key column for get lookups, when the table supports get
    fn key_column(&self) -> Option<&'static str>;

    /// Stream all rows for a list query
    fn list(&self, ctx: QueryContext) -> RowStream;

    /// Fetch exactly one row by key, or `None` when the lookup hit a
    /// suppressed not-found error code
    async fn get(&self, ctx: QueryContext) -> Result<Option<Row>>;
}

impl std::fmt::Debug for dyn TableSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableSpec")
            .field("name", &self.name())
            .finish()
    }
}

#[async_trait]
impl<T> TableSpec for Table<T>
where
    T: Serialize + Send + Sync + 'static,
{
    fn name(&self) -> &'static str {
        self.name
    }

    fn description(&self) -> &'static str {
        self.description
    }

    fn columns(&self) -> &[Column] {
        &self.columns
    }

    fn key_column(&self) -> Option<&'static str> {
        self.get_config.as_ref().map(|g| g.key_column)
    }

    fn list(&self, ctx: QueryContext) -> RowStream {
        self.stream_rows(ctx)
    }

    async fn get(&self, ctx: QueryContext) -> Result<Option<Row>> {
        self.get_row(ctx).await
    }
}
