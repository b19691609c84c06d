use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::info;

use crate::common::{HeapDbError, Result, TableId};
use crate::storage::table::HeapFile;
use crate::tuple::Schema;

/// Metadata about a table
#[derive(Clone)]
pub struct TableInfo {
    pub name: String,
    pub heap_file: Arc<HeapFile>,
    pub primary_key: Option<String>,
}

impl TableInfo {
    pub fn table_id(&self) -> TableId {
        self.heap_file.table_id()
    }

    pub fn schema(&self) -> &Arc<Schema> {
        self.heap_file.schema()
    }
}

/// Catalog keeps track of all tables: their names, schemas and heap files.
///
/// All tables share one page size, fixed when the catalog is created.
pub struct Catalog {
    /// Bytes per page of every registered table
    page_size: usize,
    /// Table ID -> table info
    tables: RwLock<HashMap<TableId, Arc<TableInfo>>>,
    /// Next table id to hand out
    next_table_id: AtomicU32,
}

impl Catalog {
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size,
            tables: RwLock::new(HashMap::new()),
            next_table_id: AtomicU32::new(1),
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Reserves a fresh table id.
    pub fn allocate_table_id(&self) -> TableId {
        TableId(self.next_table_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Registers `heap_file` under `name`.
    ///
    /// A table already registered with the same id or the same name is
    /// replaced. Pages of a replaced id that a buffer pool already cached are
    /// not touched; call [`BufferPool::discard_table`] to drop them.
    ///
    /// [`BufferPool::discard_table`]: crate::buffer::BufferPool::discard_table
    pub fn add_table(
        &self,
        heap_file: HeapFile,
        name: &str,
        primary_key: Option<&str>,
    ) -> Result<TableId> {
        if heap_file.page_size() != self.page_size {
            return Err(HeapDbError::PageSizeMismatch {
                expected: self.page_size,
                actual: heap_file.page_size(),
            });
        }
        if let Some(pk) = primary_key {
            if heap_file.schema().column_index(pk).is_none() {
                return Err(HeapDbError::InvalidSchema(format!(
                    "primary key {} is not a column of {}",
                    pk, name
                )));
            }
        }

        let table_id = heap_file.table_id();
        self.next_table_id
            .fetch_max(table_id.as_u32() + 1, Ordering::Relaxed);

        let info = TableInfo {
            name: name.to_string(),
            heap_file: Arc::new(heap_file),
            primary_key: primary_key.map(str::to_string),
        };

        let mut tables = self.tables.write();
        tables.retain(|&id, existing| id != table_id && existing.name != name);
        info!(
            table = name,
            %table_id,
            schema = %info.schema(),
            "registered table"
        );
        tables.insert(table_id, Arc::new(info));
        Ok(table_id)
    }

    /// Creates (or reopens) the heap file at `path` and registers it as a new table.
    pub fn create_table<P: AsRef<Path>>(
        &self,
        name: &str,
        schema: Arc<Schema>,
        path: P,
        primary_key: Option<&str>,
    ) -> Result<TableId> {
        let table_id = self.allocate_table_id();
        let heap_file = HeapFile::open(table_id, path, schema, self.page_size)?;
        self.add_table(heap_file, name, primary_key)
    }

    fn info(&self, table_id: TableId) -> Result<Arc<TableInfo>> {
        self.tables
            .read()
            .get(&table_id)
            .cloned()
            .ok_or(HeapDbError::TableNotFound(table_id))
    }

    /// Looks up a table id by name.
    pub fn table_id(&self, name: &str) -> Result<TableId> {
        self.tables
            .read()
            .values()
            .find(|info| info.name == name)
            .map(|info| info.table_id())
            .ok_or_else(|| HeapDbError::TableNameNotFound(name.to_string()))
    }

    pub fn table_info(&self, table_id: TableId) -> Result<Arc<TableInfo>> {
        self.info(table_id)
    }

    pub fn schema(&self, table_id: TableId) -> Result<Arc<Schema>> {
        Ok(Arc::clone(self.info(table_id)?.schema()))
    }

    pub fn heap_file(&self, table_id: TableId) -> Result<Arc<HeapFile>> {
        Ok(Arc::clone(&self.info(table_id)?.heap_file))
    }

    pub fn table_name(&self, table_id: TableId) -> Result<String> {
        Ok(self.info(table_id)?.name.clone())
    }

    pub fn primary_key(&self, table_id: TableId) -> Result<Option<String>> {
        Ok(self.info(table_id)?.primary_key.clone())
    }

    /// Returns all table ids, in increasing order.
    pub fn table_ids(&self) -> Vec<TableId> {
        let mut ids: Vec<_> = self.tables.read().keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn table_count(&self) -> usize {
        self.tables.read().len()
    }

    /// Forgets every table. Files on disk are left alone.
    pub fn clear(&self) {
        self.tables.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tuple::DataType;
    use tempfile::TempDir;

    const PAGE: usize = 256;

    fn schema() -> Arc<Schema> {
        Schema::builder()
            .column("id", DataType::Integer)
            .column("name", DataType::Text(16))
            .build_arc()
            .unwrap()
    }

    #[test]
    fn test_catalog_create_and_lookup() {
        let dir = TempDir::new().unwrap();
        let catalog = Catalog::new(PAGE);

        let users = catalog
            .create_table("users", schema(), dir.path().join("users.dat"), Some("id"))
            .unwrap();
        let orders = catalog
            .create_table("orders", schema(), dir.path().join("orders.dat"), None)
            .unwrap();
        assert_ne!(users, orders);

        assert_eq!(catalog.table_id("users").unwrap(), users);
        assert_eq!(catalog.table_name(orders).unwrap(), "orders");
        assert_eq!(catalog.primary_key(users).unwrap().as_deref(), Some("id"));
        assert_eq!(catalog.primary_key(orders).unwrap(), None);
        assert_eq!(*catalog.schema(users).unwrap(), *schema());
        assert_eq!(catalog.heap_file(users).unwrap().table_id(), users);
        assert_eq!(catalog.table_ids(), vec![users, orders]);
    }

    #[test]
    fn test_catalog_missing_tables() {
        let catalog = Catalog::new(PAGE);
        assert!(matches!(
            catalog.table_id("nope"),
            Err(HeapDbError::TableNameNotFound(_))
        ));
        assert!(matches!(
            catalog.schema(TableId(42)),
            Err(HeapDbError::TableNotFound(TableId(42)))
        ));
    }

    #[test]
    fn test_catalog_same_name_replaces() {
        let dir = TempDir::new().unwrap();
        let catalog = Catalog::new(PAGE);

        let first = catalog
            .create_table("t", schema(), dir.path().join("a.dat"), None)
            .unwrap();
        let second = catalog
            .create_table("t", schema(), dir.path().join("b.dat"), None)
            .unwrap();

        assert_eq!(catalog.table_count(), 1);
        assert_eq!(catalog.table_id("t").unwrap(), second);
        assert!(catalog.heap_file(first).is_err());
    }

    #[test]
    fn test_catalog_rejects_foreign_page_size() {
        let dir = TempDir::new().unwrap();
        let catalog = Catalog::new(PAGE);
        let file = HeapFile::open(
            catalog.allocate_table_id(),
            dir.path().join("t.dat"),
            schema(),
            PAGE * 2,
        )
        .unwrap();

        assert!(matches!(
            catalog.add_table(file, "t", None),
            Err(HeapDbError::PageSizeMismatch { .. })
        ));
    }

    #[test]
    fn test_catalog_clear() {
        let dir = TempDir::new().unwrap();
        let catalog = Catalog::new(PAGE);
        catalog
            .create_table("t", schema(), dir.path().join("t.dat"), None)
            .unwrap();

        catalog.clear();
        assert!(catalog.table_ids().is_empty());
    }
}
