use super::deparse::parse_ddl;
use crate::core::{DbError, Result, ShardId};
use sqlparser::ast::{AlterTableOperation, ObjectName, ObjectNamePart, Statement, TableConstraint};

/// Name of the physical relation holding one shard of `relation_name`.
pub fn shard_relation_name(relation_name: &str, shard_id: ShardId) -> String {
    format!("{}_{}", relation_name, shard_id)
}

/// Rewrites table DDL so that every relation it names is the shard relation.
///
/// Index names are extended as well, so indexes of different shards on the
/// same worker do not collide.
pub fn extend_shard_ddl(sql: &str, shard_id: ShardId) -> Result<Vec<String>> {
    parse_ddl(sql)?
        .into_iter()
        .map(|mut statement| {
            extend_statement(&mut statement, shard_id)?;
            Ok(statement.to_string())
        })
        .collect()
}

/// Relation referenced by a foreign key command.
///
/// The command must be an `ALTER TABLE` whose operations all add foreign
/// keys to one referenced relation.
pub fn foreign_key_referenced_relation(sql: &str) -> Result<String> {
    let mut referenced: Option<String> = None;
    for statement in parse_ddl(sql)? {
        for foreign_table in foreign_key_tables(&statement, sql)? {
            let relation = relation_base_name(foreign_table)?;
            match &referenced {
                Some(existing) if *existing != relation => {
                    return Err(DbError::UnsupportedOperation(format!(
                        "foreign key command references more than one relation: {}",
                        sql
                    )));
                }
                Some(_) => {}
                None => referenced = Some(relation),
            }
        }
    }
    referenced.ok_or_else(|| not_foreign_key(sql))
}

/// Rewrites a foreign key command between two shards.
///
/// The altered relation and the constraint name get `shard_id`, the
/// referenced relation gets `referenced_shard_id`.
pub fn extend_inter_shard_ddl(
    sql: &str,
    shard_id: ShardId,
    referenced_shard_id: ShardId,
) -> Result<Vec<String>> {
    parse_ddl(sql)?
        .into_iter()
        .map(|mut statement| {
            foreign_key_tables(&statement, sql)?;
            let Statement::AlterTable {
                name, operations, ..
            } = &mut statement
            else {
                return Err(not_foreign_key(sql));
            };
            extend_object_name(name, shard_id)?;
            for operation in operations.iter_mut() {
                if let AlterTableOperation::AddConstraint {
                    constraint:
                        TableConstraint::ForeignKey {
                            name: constraint_name,
                            foreign_table,
                            ..
                        },
                    ..
                } = operation
                {
                    if let Some(constraint_name) = constraint_name {
                        constraint_name.value =
                            shard_relation_name(&constraint_name.value, shard_id);
                    }
                    extend_object_name(foreign_table, referenced_shard_id)?;
                }
            }
            Ok(statement.to_string())
        })
        .collect()
}

fn foreign_key_tables<'a>(statement: &'a Statement, sql: &str) -> Result<Vec<&'a ObjectName>> {
    let Statement::AlterTable { operations, .. } = statement else {
        return Err(not_foreign_key(sql));
    };
    if operations.is_empty() {
        return Err(not_foreign_key(sql));
    }
    operations
        .iter()
        .map(|operation| match operation {
            AlterTableOperation::AddConstraint {
                constraint: TableConstraint::ForeignKey { foreign_table, .. },
                ..
            } => Ok(foreign_table),
            _ => Err(not_foreign_key(sql)),
        })
        .collect()
}

fn not_foreign_key(sql: &str) -> DbError {
    DbError::UnsupportedOperation(format!("not a foreign key command: {}", sql))
}

fn relation_base_name(name: &ObjectName) -> Result<String> {
    match name.0.last() {
        Some(ObjectNamePart::Identifier(ident)) => Ok(ident.value.clone()),
        _ => Err(DbError::ParseError(format!("invalid relation name '{}'", name))),
    }
}

fn extend_statement(statement: &mut Statement, shard_id: ShardId) -> Result<()> {
    match statement {
        Statement::CreateTable(create) => extend_object_name(&mut create.name, shard_id),
        Statement::CreateIndex(index) => {
            if let Some(name) = index.name.as_mut() {
                extend_object_name(name, shard_id)?;
            }
            extend_object_name(&mut index.table_name, shard_id)
        }
        Statement::AlterTable { name, .. } => extend_object_name(name, shard_id),
        other => Err(DbError::UnsupportedOperation(format!(
            "cannot extend shard names in statement: {}",
            other
        ))),
    }
}

fn extend_object_name(name: &mut ObjectName, shard_id: ShardId) -> Result<()> {
    if let Some(ObjectNamePart::Identifier(ident)) = name.0.last_mut() {
        ident.value = shard_relation_name(&ident.value, shard_id);
        return Ok(());
    }
    Err(DbError::ParseError(format!("invalid relation name '{}'", name)))
}
