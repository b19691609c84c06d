use std::path::Path;
use std::sync::Arc;

use crate::buffer::BufferPool;
use crate::catalog::Catalog;
use crate::common::{Result, StorageConfig, TableId};
use crate::concurrency::Transaction;
use crate::tuple::Schema;

/// A catalog and the buffer pool serving its tables.
///
/// Everything that needs either gets it from here; there is no global
/// instance. Cloning the `Arc`s is how components share them.
pub struct Database {
    config: StorageConfig,
    catalog: Arc<Catalog>,
    buffer_pool: Arc<BufferPool>,
}

impl Database {
    pub fn new(config: StorageConfig) -> Result<Self> {
        config.validate()?;
        let catalog = Arc::new(Catalog::new(config.page_size));
        let buffer_pool = Arc::new(BufferPool::new(&config, Arc::clone(&catalog))?);
        Ok(Self {
            config,
            catalog,
            buffer_pool,
        })
    }

    /// Opens a database whose tables are listed in the schema file at `path`.
    pub fn open_schema<P: AsRef<Path>>(config: StorageConfig, path: P) -> Result<Self> {
        let db = Self::new(config)?;
        db.catalog.load_schema(path)?;
        Ok(db)
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn buffer_pool(&self) -> &Arc<BufferPool> {
        &self.buffer_pool
    }

    /// Shorthand for [`Catalog::create_table`].
    pub fn create_table<P: AsRef<Path>>(
        &self,
        name: &str,
        schema: Arc<Schema>,
        path: P,
    ) -> Result<TableId> {
        self.catalog.create_table(name, schema, path, None)
    }

    /// Starts a transaction against this database's buffer pool.
    pub fn begin(&self) -> Transaction {
        Transaction::begin(&self.buffer_pool)
    }
}
