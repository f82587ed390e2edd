//! Storage of the single counter row.

use async_trait::async_trait;
use tokio_postgres::Client;

use crate::database::error::DatabaseResult;
#[cfg(any(test, feature = "test-support"))]
use crate::database::{error::DatabaseError, fake::FakeClient};

/// Statements the counter needs from a connection handle.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Create the table if it does not exist yet.
    async fn ensure_table(&self) -> DatabaseResult<()>;

    /// The stored count, or `None` when the row has never been written.
    async fn read_count(&self) -> DatabaseResult<Option<i32>>;

    async fn insert_count(&self, count: i32) -> DatabaseResult<()>;

    async fn update_count(&self, count: i32) -> DatabaseResult<()>;
}

#[async_trait]
impl CounterStore for Client {
    async fn ensure_table(&self) -> DatabaseResult<()> {
        self.batch_execute(r#"CREATE TABLE IF NOT EXISTS "welcome" ( "count" INTEGER )"#)
            .await?;
        Ok(())
    }

    async fn read_count(&self) -> DatabaseResult<Option<i32>> {
        let rows = self.query(r#"SELECT "count" FROM "welcome""#, &[]).await?;
        match rows.first() {
            Some(row) => {
                let count: Option<i32> = row.try_get(0)?;
                Ok(Some(count.unwrap_or(0)))
            }
            None => Ok(None),
        }
    }

    async fn insert_count(&self, count: i32) -> DatabaseResult<()> {
        self.execute(r#"INSERT INTO "welcome" VALUES($1)"#, &[&count])
            .await?;
        Ok(())
    }

    async fn update_count(&self, count: i32) -> DatabaseResult<()> {
        self.execute(r#"UPDATE "welcome" SET "count" = $1"#, &[&count])
            .await?;
        Ok(())
    }
}

#[cfg(any(test, feature = "test-support"))]
#[async_trait]
impl CounterStore for FakeClient {
    async fn ensure_table(&self) -> DatabaseResult<()> {
        self.check()
    }

    async fn read_count(&self) -> DatabaseResult<Option<i32>> {
        self.check()?;
        Ok(*self.storage.count.lock().unwrap_or_else(|e| e.into_inner()))
    }

    async fn insert_count(&self, count: i32) -> DatabaseResult<()> {
        self.check()?;
        let mut row = self.storage.count.lock().unwrap_or_else(|e| e.into_inner());
        if row.is_some() {
            return Err(DatabaseError::Query("row already exists".to_string()));
        }
        *row = Some(count);
        Ok(())
    }

    async fn update_count(&self, count: i32) -> DatabaseResult<()> {
        self.check()?;
        let mut row = self.storage.count.lock().unwrap_or_else(|e| e.into_inner());
        if row.is_some() {
            *row = Some(count);
        }
        Ok(())
    }
}
