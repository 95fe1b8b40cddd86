//! Table provisioning
//!
//! [`TableProvisioner`] checks whether a table exists, creates it with the
//! composite `id`/`date` key schema when it does not, waits for it to become
//! ACTIVE, and performs the item reads and writes against it. Each lifecycle
//! step is exposed on its own and as a single transition of [`TableState`].

mod state;
mod waiter;

pub use state::TableState;
pub use waiter::{Clock, TokioClock, WaiterConfig, DEFAULT_POLL_INTERVAL, DEFAULT_WAIT_TIMEOUT};

#[cfg(test)]
pub(crate) use waiter::ManualClock;

use crate::db::models::join_keys;
use crate::db::{Item, ItemKey, RangeQuery, TableDescription, TableSchema, TableStatus, TableStore};
use crate::error::{ProvisionError, Result};

/// Result of polling a table until it is ACTIVE or the deadline passes
enum WaitOutcome {
    Active(TableDescription),
    TimedOut { last_status: Option<TableStatus> },
}

/// Provisions one table and runs item operations against it.
pub struct TableProvisioner<S, C = TokioClock> {
    store: S,
    clock: C,
    table_name: String,
    schema: TableSchema,
    waiter: WaiterConfig,
}

impl<S: TableStore> TableProvisioner<S, TokioClock> {
    /// Create a provisioner for `table_name` with the contacts key schema.
    ///
    /// # Arguments
    /// * `store` - Store the table lives in
    /// * `table_name` - Name of the table to provision
    /// * `waiter` - Timeout and poll interval for the activation wait
    pub fn new(store: S, table_name: impl Into<String>, waiter: WaiterConfig) -> Self {
        Self {
            store,
            clock: TokioClock,
            table_name: table_name.into(),
            schema: TableSchema::contacts(),
            waiter,
        }
    }
}

impl<S: TableStore, C: Clock> TableProvisioner<S, C> {
    /// Replace the clock used by the activation wait
    pub fn with_clock<C2: Clock>(self, clock: C2) -> TableProvisioner<S, C2> {
        TableProvisioner {
            store: self.store,
            clock,
            table_name: self.table_name,
            schema: self.schema,
            waiter: self.waiter,
        }
    }

    /// Replace the key schema used for creation and validation
    pub fn with_schema(mut self, schema: TableSchema) -> Self {
        self.schema = schema;
        self
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Whether the table exists. Only "not found" maps to `false`; every
    /// other describe failure is returned as is.
    pub async fn ensure_table(&self) -> Result<bool> {
        let exists = self.store.describe_table(&self.table_name).await?.is_some();
        tracing::debug!(table = %self.table_name, exists, "Checked table existence");
        Ok(exists)
    }

    /// Request creation of the table. The caller checks that it is absent;
    /// creating an existing table fails in the store.
    pub async fn create_table(&self) -> Result<()> {
        self.store.create_table(&self.table_name, &self.schema).await?;

        tracing::info!(
            table = %self.table_name,
            keys = %self.schema.describe_keys(),
            "Table creation requested"
        );

        Ok(())
    }

    /// Poll describe-table until the table is ACTIVE.
    ///
    /// Fails with [`ProvisionError::ProvisioningTimeout`] when the waiter's
    /// timeout elapses first. Describe failures end the wait immediately.
    pub async fn wait_until_active(&self) -> Result<TableDescription> {
        match self.poll_until_active().await? {
            WaitOutcome::Active(description) => Ok(description),
            WaitOutcome::TimedOut { last_status } => Err(self.timeout_error(last_status.as_ref())),
        }
    }

    async fn poll_until_active(&self) -> Result<WaitOutcome> {
        let deadline = self
            .clock
            .now()
            .checked_add(self.waiter.timeout)
            .ok_or_else(|| {
                ProvisionError::InvalidRequest(format!(
                    "wait timeout of {}s is out of range",
                    self.waiter.timeout.as_secs()
                ))
            })?;
        let mut last_status = None;
        let mut attempts: u32 = 0;

        loop {
            attempts += 1;

            match self.store.describe_table(&self.table_name).await? {
                Some(description) if description.status.is_active() => {
                    tracing::info!(table = %self.table_name, attempts, "Table is active");
                    return Ok(WaitOutcome::Active(description));
                }
                Some(description) => {
                    tracing::debug!(
                        table = %self.table_name,
                        status = %description.status,
                        attempts,
                        "Table not active yet"
                    );
                    last_status = Some(description.status);
                }
                // Right after creation the table may not be visible yet
                None => {
                    tracing::debug!(table = %self.table_name, attempts, "Table not visible yet");
                }
            }

            let now = self.clock.now();
            if now >= deadline {
                tracing::warn!(
                    table = %self.table_name,
                    attempts,
                    timeout_secs = self.waiter.timeout.as_secs(),
                    "Gave up waiting for table"
                );
                return Ok(WaitOutcome::TimedOut { last_status });
            }

            self.clock
                .sleep(self.waiter.poll_interval.min(deadline - now))
                .await;
        }
    }

    fn timeout_error(&self, last_status: Option<&TableStatus>) -> ProvisionError {
        ProvisionError::ProvisioningTimeout {
            table: self.table_name.clone(),
            timeout: self.waiter.timeout,
            last_status: last_status
                .map(ToString::to_string)
                .unwrap_or_else(|| "NOT_FOUND".to_string()),
        }
    }

    /// Check that the existing table has exactly the expected key schema
    pub async fn verify_schema(&self) -> Result<TableDescription> {
        let description = self
            .store
            .describe_table(&self.table_name)
            .await?
            .ok_or_else(|| ProvisionError::TableNotFound {
                table: self.table_name.clone(),
            })?;

        if !self.schema.matches(&description.key_schema) {
            return Err(ProvisionError::SchemaMismatch {
                table: self.table_name.clone(),
                expected: self.schema.describe_keys(),
                actual: join_keys(description.key_schema.iter()),
            });
        }

        Ok(description)
    }

    /// Unconditional put; replaces any item with the same key pair
    pub async fn write_item(&self, item: Item) -> Result<()> {
        item.validate_key(&self.schema)?;
        self.store.put_item(&self.table_name, item).await
    }

    /// Direct key lookup; `None` when no item has exactly this key
    pub async fn read_item(&self, id: &str, date: i64) -> Result<Option<Item>> {
        let key = ItemKey::for_schema(&self.schema, id, date)?;
        self.store.get_item(&self.table_name, &key).await
    }

    /// All items in partition `id` with `date >= lower_bound`, ascending by date
    pub async fn query_by_partition_and_range(&self, id: &str, lower_bound: i64) -> Result<Vec<Item>> {
        let query = RangeQuery::from_lower_bound(&self.schema, id, lower_bound)?;
        let items = self.store.query(&self.table_name, &query).await?;

        tracing::debug!(
            table = %self.table_name,
            id = %id,
            lower_bound,
            count = items.len(),
            "Range query finished"
        );

        Ok(items)
    }

    /// Perform one lifecycle transition. Terminal states are returned unchanged.
    pub async fn advance(&self, state: TableState) -> Result<TableState> {
        let next = match state {
            TableState::Unknown => {
                if self.ensure_table().await? {
                    TableState::Existing
                } else {
                    TableState::Missing
                }
            }
            TableState::Missing => {
                self.create_table().await?;
                TableState::Creating
            }
            TableState::Creating => match self.poll_until_active().await? {
                WaitOutcome::Active(_) => TableState::Active,
                WaitOutcome::TimedOut { last_status } => TableState::TimedOut {
                    waited: self.waiter.timeout,
                    last_status,
                },
            },
            terminal => terminal,
        };

        Ok(next)
    }

    /// Drive the table from `Unknown` to a ready state
    pub async fn provision(&self) -> Result<TableState> {
        self.provision_with(|_| Ok(())).await
    }

    /// Like [`provision`](Self::provision), calling `on_transition` after
    /// every step. A timeout is reported to the callback, then returned as
    /// [`ProvisionError::ProvisioningTimeout`].
    pub async fn provision_with<F>(&self, mut on_transition: F) -> Result<TableState>
    where
        F: FnMut(&TableState) -> Result<()>,
    {
        let mut state = TableState::Unknown;

        while !state.is_terminal() {
            state = self.advance(state).await?;
            tracing::debug!(table = %self.table_name, state = %state, "Table state changed");
            on_transition(&state)?;
        }

        if let TableState::TimedOut { last_status, .. } = &state {
            return Err(self.timeout_error(last_status.as_ref()));
        }

        Ok(state)
    }
}
