//! Creating and dropping warehouse tables.

use tracing::info;

use super::{dependency_order, Table};
use crate::warehouse::{Result, Warehouse};

/// Creates and drops a set of tables in foreign-key order.
///
/// Statements run on the caller's warehouse connection. Inside an open
/// transaction they join it; otherwise each one commits on its own.
#[derive(Debug, Clone)]
pub struct SchemaManager {
    tables: Vec<Table>,
}

impl Default for SchemaManager {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaManager {
    /// Manager for every warehouse table.
    pub fn new() -> Self {
        Self::for_tables(&Table::ALL)
    }

    /// Manager for the staging tables only.
    pub fn staging() -> Self {
        Self::for_tables(&Table::STAGING)
    }

    pub fn for_tables(tables: &[Table]) -> Self {
        Self {
            tables: tables.to_vec(),
        }
    }

    pub fn tables(&self) -> &[Table] {
        &self.tables
    }

    /// Referenced tables before the tables referencing them.
    pub fn create_order(&self) -> Result<Vec<Table>> {
        dependency_order(&self.tables)
    }

    /// Reverse of [`create_order`](Self::create_order).
    pub fn drop_order(&self) -> Result<Vec<Table>> {
        let mut order = self.create_order()?;
        order.reverse();
        Ok(order)
    }

    /// Create every table. Fails on the first table that already exists.
    pub async fn create_all(&self, warehouse: &mut dyn Warehouse) -> Result<()> {
        let dialect = warehouse.dialect();
        for table in self.create_order()? {
            let statement = dialect.build_table_create(&table.create_statement(dialect));
            warehouse.execute(statement).await?;
            info!(table = %table, "Created table");
        }
        Ok(())
    }

    /// Drop every table that exists. Missing tables are skipped.
    pub async fn drop_all(&self, warehouse: &mut dyn Warehouse) -> Result<()> {
        let dialect = warehouse.dialect();
        for table in self.drop_order()? {
            let statement = dialect.build_table_drop(&table.drop_statement());
            warehouse.execute(statement).await?;
            info!(table = %table, "Dropped table");
        }
        Ok(())
    }

    /// Drop then recreate every table, leaving them empty.
    pub async fn reset(&self, warehouse: &mut dyn Warehouse) -> Result<()> {
        self.drop_all(warehouse).await?;
        self.create_all(warehouse).await
    }

    /// Drop and recreate only the staging tables among this manager's set.
    pub async fn reset_staging(&self, warehouse: &mut dyn Warehouse) -> Result<()> {
        let staging: Vec<Table> = self
            .tables
            .iter()
            .copied()
            .filter(Table::is_staging)
            .collect();
        Self::for_tables(&staging).reset(warehouse).await
    }
}
