//! Table DDL as seen by the shard creation path.
//!
//! The creation path treats DDL as an opaque, ordered list of statements. This
//! module provides the source of those statements, the deparser that turns
//! parsed statements back into text, and the worker-side rewrite that points
//! each statement at a shard relation.

pub mod deparse;
pub mod relay;

use crate::core::{DbError, DistributedTable, Result, TableId};
use sqlparser::ast::Statement;
use std::collections::HashMap;
use std::sync::RwLock;

pub use deparse::{deparse_statement, parse_ddl};
pub use relay::{
    extend_inter_shard_ddl, extend_shard_ddl, foreign_key_referenced_relation,
    shard_relation_name,
};

/// Produces the statements that recreate a table's schema on a worker.
pub trait DdlSource: Send + Sync {
    fn table_ddl_events(&self, table: &DistributedTable) -> Result<Vec<String>>;

    /// `ALTER TABLE ... ADD FOREIGN KEY` commands of `table`.
    ///
    /// They run after the table DDL, once per shard, pointed at the shard
    /// of the referenced table that is colocated with that shard.
    fn foreign_constraint_commands(&self, _table: &DistributedTable) -> Result<Vec<String>> {
        Ok(Vec::new())
    }
}

/// DDL source backed by statements registered up front.
///
/// Statements are stored parsed and deparsed on every read, so whatever a
/// worker receives has been through the same parser the worker will use.
#[derive(Debug, Default)]
pub struct InMemoryDdlSource {
    statements: RwLock<HashMap<TableId, Vec<Statement>>>,
    foreign_constraints: RwLock<HashMap<TableId, Vec<Statement>>>,
}

impl InMemoryDdlSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses `sql` and appends its statements to the table's DDL sequence.
    pub fn register_table_ddl(&self, table_id: TableId, sql: &str) -> Result<()> {
        let parsed = parse_ddl(sql)?;
        for statement in &parsed {
            deparse_statement(statement)?;
        }
        self.statements
            .write()?
            .entry(table_id)
            .or_default()
            .extend(parsed);
        Ok(())
    }

    /// Registers a foreign key command of `table_id`.
    pub fn register_foreign_constraint(&self, table_id: TableId, sql: &str) -> Result<()> {
        let parsed = parse_ddl(sql)?;
        for statement in &parsed {
            foreign_key_referenced_relation(&deparse_statement(statement)?)?;
        }
        self.foreign_constraints
            .write()?
            .entry(table_id)
            .or_default()
            .extend(parsed);
        Ok(())
    }
}

impl DdlSource for InMemoryDdlSource {
    fn table_ddl_events(&self, table: &DistributedTable) -> Result<Vec<String>> {
        let statements = self.statements.read()?;
        let table_statements = statements.get(&table.table_id).ok_or_else(|| {
            DbError::InvalidArgument(format!(
                "no DDL events registered for table \"{}\"",
                table.name
            ))
        })?;
        table_statements.iter().map(deparse_statement).collect()
    }

    fn foreign_constraint_commands(&self, table: &DistributedTable) -> Result<Vec<String>> {
        match self.foreign_constraints.read()?.get(&table.table_id) {
            Some(statements) => statements.iter().map(deparse_statement).collect(),
            None => Ok(Vec::new()),
        }
    }
}
