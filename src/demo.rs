//! Demonstration sequence
//!
//! Provisions the table, writes one contact, reads it back by key and by a
//! range query, printing progress and the retrieved e-mail addresses.

use std::io::Write;

use crate::db::{Contact, TableStore};
use crate::error::{ProvisionError, Result};
use crate::provisioner::{Clock, TableProvisioner, TableState};

/// What the demonstration run observed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemoReport {
    /// Lifecycle state the table ended in
    pub table_state: TableState,

    /// `email` of the item read back by key
    pub read_email: String,

    /// `email` of the first item returned by the range query
    pub queried_email: String,

    /// Number of items the range query returned
    pub queried_count: usize,
}

/// Run the full sequence against `provisioner`, writing console output to `out`.
///
/// An absent item or an empty query result is reported as an error rather
/// than assumed away.
pub async fn run<S, C, W>(
    provisioner: &TableProvisioner<S, C>,
    record: &Contact,
    out: &mut W,
) -> Result<DemoReport>
where
    S: TableStore,
    C: Clock,
    W: Write,
{
    let table_state = provisioner
        .provision_with(|state| {
            match state {
                TableState::Existing => writeln!(out, "table exists")?,
                TableState::Missing => writeln!(out, "create table while not exists")?,
                TableState::Creating => writeln!(out, "waiting table initial")?,
                _ => {}
            }
            Ok(())
        })
        .await?;

    if table_state == TableState::Existing {
        provisioner.verify_schema().await?;
    }

    writeln!(out, "put item")?;
    provisioner.write_item(record.to_item()).await?;
    tracing::info!(table = %provisioner.table_name(), id = %record.id, date = record.date, "Item written");

    let item = provisioner
        .read_item(&record.id, record.date)
        .await?
        .ok_or_else(|| ProvisionError::ItemNotFound {
            table: provisioner.table_name().to_string(),
            id: record.id.clone(),
            date: record.date,
        })?;
    let read_email = item.get_string("email")?.to_string();
    writeln!(out, "{}", read_email)?;

    let items = provisioner
        .query_by_partition_and_range(&record.id, record.date)
        .await?;
    let first = items.first().ok_or_else(|| ProvisionError::EmptyQueryResult {
        table: provisioner.table_name().to_string(),
        id: record.id.clone(),
        lower_bound: record.date,
    })?;
    let queried_email = first.get_string("email")?.to_string();
    writeln!(out, "{}", queried_email)?;

    Ok(DemoReport {
        table_state,
        read_email,
        queried_email,
        queried_count: items.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{
        Activation, InMemoryStore, Item, ItemKey, RangeQuery, StoreOperation, TableDescription,
        TableSchema,
    };
    use crate::provisioner::{ManualClock, WaiterConfig};

    const TABLE: &str = "my-table4";

    fn provisioner(store: InMemoryStore) -> TableProvisioner<InMemoryStore, ManualClock> {
        TableProvisioner::new(store, TABLE, WaiterConfig::default()).with_clock(ManualClock::new())
    }

    #[tokio::test]
    async fn test_demo_on_missing_table() {
        let provisioner = provisioner(InMemoryStore::new());
        let mut out = Vec::new();

        let report = run(&provisioner, &Contact::default(), &mut out).await.unwrap();

        assert_eq!(
            String::from_utf8(out).unwrap(),
            "create table while not exists\n\
             waiting table initial\n\
             put item\n\
             john@a.com\n\
             john@a.com\n"
        );
        assert_eq!(report.table_state, TableState::Active);
        assert_eq!(report.read_email, "john@a.com");
        assert_eq!(report.queried_email, "john@a.com");
        assert_eq!(report.queried_count, 1);
    }

    #[tokio::test]
    async fn test_demo_on_existing_table() {
        let store = InMemoryStore::new().with_table(TABLE, TableSchema::contacts());
        let provisioner = provisioner(store);
        let mut out = Vec::new();

        let report = run(&provisioner, &Contact::default(), &mut out).await.unwrap();

        assert!(String::from_utf8(out).unwrap().starts_with("table exists\nput item\n"));
        assert_eq!(report.table_state, TableState::Existing);
    }

    #[tokio::test]
    async fn test_demo_without_email_fails_cleanly() {
        let provisioner = provisioner(InMemoryStore::new());
        let record = Contact {
            email: None,
            ..Contact::default()
        };

        let err = run(&provisioner, &record, &mut Vec::<u8>::new()).await.unwrap_err();
        assert!(matches!(err, ProvisionError::MissingAttribute { name } if name == "email"));
    }

    #[tokio::test]
    async fn test_demo_aborts_on_timeout() {
        let store = InMemoryStore::new().with_activation(Activation::Never);
        let provisioner = provisioner(store);
        let mut out = Vec::new();

        let err = run(&provisioner, &Contact::default(), &mut out).await.unwrap_err();

        assert!(err.is_timeout());
        assert!(!String::from_utf8(out).unwrap().contains("put item"));
        assert_eq!(provisioner.store().calls(StoreOperation::PutItem), 0);
    }

    /// Wraps the in-memory store, optionally dropping puts or query results
    struct LossyStore {
        inner: InMemoryStore,
        discard_puts: bool,
        empty_queries: bool,
    }

    #[async_trait::async_trait]
    impl TableStore for LossyStore {
        async fn describe_table(&self, table: &str) -> Result<Option<TableDescription>> {
            self.inner.describe_table(table).await
        }

        async fn create_table(&self, table: &str, schema: &TableSchema) -> Result<()> {
            self.inner.create_table(table, schema).await
        }

        async fn put_item(&self, table: &str, item: Item) -> Result<()> {
            if self.discard_puts {
                return Ok(());
            }
            self.inner.put_item(table, item).await
        }

        async fn get_item(&self, table: &str, key: &ItemKey) -> Result<Option<Item>> {
            self.inner.get_item(table, key).await
        }

        async fn query(&self, table: &str, query: &RangeQuery) -> Result<Vec<Item>> {
            let items = self.inner.query(table, query).await?;
            Ok(if self.empty_queries { Vec::new() } else { items })
        }
    }

    fn lossy(discard_puts: bool, empty_queries: bool) -> TableProvisioner<LossyStore, ManualClock> {
        let store = LossyStore {
            inner: InMemoryStore::new().with_table(TABLE, TableSchema::contacts()),
            discard_puts,
            empty_queries,
        };
        TableProvisioner::new(store, TABLE, WaiterConfig::default()).with_clock(ManualClock::new())
    }

    #[tokio::test]
    async fn test_demo_reports_missing_item() {
        let provisioner = lossy(true, false);

        let err = run(&provisioner, &Contact::default(), &mut Vec::<u8>::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ProvisionError::ItemNotFound { id, date: 20220410, .. } if id == "123"
        ));
    }

    #[tokio::test]
    async fn test_demo_reports_empty_query() {
        let provisioner = lossy(false, true);
        let mut out = Vec::new();

        let err = run(&provisioner, &Contact::default(), &mut out)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ProvisionError::EmptyQueryResult { lower_bound: 20220410, .. }
        ));
        // The point read still printed its result
        assert!(String::from_utf8(out).unwrap().ends_with("put item\njohn@a.com\n"));
    }

    #[tokio::test]
    async fn test_demo_propagates_write_failure() {
        let store = InMemoryStore::new().with_table(TABLE, TableSchema::contacts());
        store.fail_next(StoreOperation::PutItem, "ProvisionedThroughputExceededException");
        let provisioner = provisioner(store);

        let err = run(&provisioner, &Contact::default(), &mut Vec::<u8>::new())
            .await
            .unwrap_err();
        assert_eq!(err.code(), Some("InjectedFailure"));
        assert_eq!(provisioner.store().calls(StoreOperation::GetItem), 0);
    }
}
