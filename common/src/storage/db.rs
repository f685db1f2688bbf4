use std::ops::Deref;

use surrealdb::{
    engine::any::{connect, Any},
    opt::auth::Root,
    Error, Surreal,
};
use tracing::debug;

use super::types::StoredObject;
use crate::error::AppError;

/// Indexes the worker relies on when polling for queued jobs.
const RENDER_JOB_INDEXES: &str = "
    DEFINE INDEX IF NOT EXISTS idx_render_job_status ON render_job FIELDS status;
    DEFINE INDEX IF NOT EXISTS idx_render_job_created ON render_job FIELDS created_at;
";

/// Job record store.
#[derive(Clone)]
pub struct SurrealDbClient {
    pub client: Surreal<Any>,
}

impl SurrealDbClient {
    /// Connects to `address`, signs in as root and selects the namespace and database.
    pub async fn new(
        address: &str,
        username: &str,
        password: &str,
        namespace: &str,
        database: &str,
    ) -> Result<Self, Error> {
        let client = connect(address).await?;
        client.signin(Root { username, password }).await?;
        client.use_ns(namespace).use_db(database).await?;
        debug!(address, namespace, database, "connected to SurrealDB");

        Ok(Self { client })
    }

    /// Prepares the schema; safe to run on every start.
    pub async fn ensure_initialized(&self) -> Result<(), AppError> {
        self.build_indexes().await?;
        Ok(())
    }

    pub async fn build_indexes(&self) -> Result<(), Error> {
        self.client.query(RENDER_JOB_INDEXES).await?.check()?;
        Ok(())
    }

    /// Creates `item` under its own id. Fails if a record with that id exists.
    pub async fn store_item<T>(&self, item: T) -> Result<Option<T>, Error>
    where
        T: StoredObject + Send + Sync + 'static,
    {
        self.client
            .create((T::table_name(), item.get_id()))
            .content(item)
            .await
    }

    pub async fn get_item<T>(&self, id: &str) -> Result<Option<T>, Error>
    where
        T: StoredObject,
    {
        self.client.select((T::table_name(), id)).await
    }
}

impl Deref for SurrealDbClient {
    type Target = Surreal<Any>;

    fn deref(&self) -> &Self::Target {
        &self.client
    }
}

#[cfg(any(test, feature = "test-utils"))]
impl SurrealDbClient {
    /// In-memory database for tests.
    pub async fn memory(namespace: &str, database: &str) -> Result<Self, Error> {
        let client = connect("mem://").await?;
        client.use_ns(namespace).use_db(database).await?;

        Ok(Self { client })
    }
}
