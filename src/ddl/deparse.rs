use crate::core::{DbError, Result};
use sqlparser::ast::{ObjectType, Statement};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;

/// ALTER TYPE forms the parser has no syntax tree for.
const UNSUPPORTED_ALTER_TYPE_FORMS: [[&str; 2]; 5] = [
    ["OWNER", "TO"],
    ["SET", "SCHEMA"],
    ["RENAME", "ATTRIBUTE"],
    ["ADD", "ATTRIBUTE"],
    ["DROP", "ATTRIBUTE"],
];

pub fn parse_ddl(sql: &str) -> Result<Vec<Statement>> {
    Parser::parse_sql(&PostgreSqlDialect {}, sql).map_err(|e| {
        match unsupported_alter_type_form(sql) {
            Some(form) => DbError::UnsupportedOperation(format!(
                "ALTER TYPE ... {} cannot be deparsed",
                form
            )),
            None => DbError::ParseError(e.to_string()),
        }
    })
}

fn unsupported_alter_type_form(sql: &str) -> Option<String> {
    let words: Vec<String> = sql
        .split_whitespace()
        .map(|word| word.trim_end_matches(';').to_ascii_uppercase())
        .collect();
    if words.len() < 2 || words[0] != "ALTER" || words[1] != "TYPE" {
        return None;
    }
    words.windows(2).find_map(|pair| {
        UNSUPPORTED_ALTER_TYPE_FORMS
            .iter()
            .find(|form| pair[0] == form[0] && pair[1] == form[1])
            .map(|form| form.join(" "))
    })
}

/// Reconstructs SQL text for a parsed DDL statement.
///
/// Supports type DDL (CREATE/ALTER/DROP TYPE) and the table statements that
/// make up a table's DDL events. Everything else is rejected.
///
/// ALTER TYPE covers RENAME TO, ADD VALUE and RENAME VALUE. OWNER TO,
/// SET SCHEMA and the attribute forms have no syntax tree in sqlparser;
/// `parse_ddl` reports them as `UnsupportedOperation`.
pub fn deparse_statement(statement: &Statement) -> Result<String> {
    match statement {
        Statement::CreateType { .. } | Statement::AlterType(_) => Ok(statement.to_string()),
        Statement::CreateTable(_) | Statement::CreateIndex(_) | Statement::AlterTable { .. } => {
            Ok(statement.to_string())
        }
        Statement::Drop { object_type, .. } => match object_type {
            ObjectType::Type | ObjectType::Table | ObjectType::Index => Ok(statement.to_string()),
            other => Err(DbError::UnsupportedOperation(format!(
                "unsupported drop statement for deparsing: {:?}",
                other
            ))),
        },
        _ => Err(DbError::UnsupportedOperation(
            "unsupported statement for deparsing".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deparse_one(sql: &str) -> Result<String> {
        let statements = parse_ddl(sql)?;
        assert_eq!(statements.len(), 1);
        deparse_statement(&statements[0])
    }

    #[test]
    fn test_deparse_type_statements() {
        let create = deparse_one("CREATE TYPE mood AS ENUM ('sad', 'ok', 'happy')").unwrap();
        assert!(create.starts_with("CREATE TYPE mood"));
        assert!(create.contains("'happy'"));

        let drop = deparse_one("DROP TYPE mood").unwrap();
        assert!(drop.starts_with("DROP TYPE"));
        assert!(drop.contains("mood"));
    }

    #[test]
    fn test_deparse_table_statements() {
        let create = deparse_one("create table events (id bigint, payload text)").unwrap();
        assert!(create.starts_with("CREATE TABLE events"));

        let reparsed = parse_ddl(&create).unwrap();
        assert_eq!(deparse_statement(&reparsed[0]).unwrap(), create);
    }

    #[test]
    fn test_deparse_alter_type_forms() {
        let rename = deparse_one("ALTER TYPE mood RENAME TO feeling").unwrap();
        assert_eq!(rename, "ALTER TYPE mood RENAME TO feeling");
        let add_value = deparse_one("ALTER TYPE mood ADD VALUE 'meh' AFTER 'ok'").unwrap();
        assert!(add_value.contains("ADD VALUE"));
        let rename_value = deparse_one("ALTER TYPE mood RENAME VALUE 'ok' TO 'fine'").unwrap();
        assert!(rename_value.contains("RENAME VALUE"));

        for sql in [
            "ALTER TYPE mood OWNER TO bob",
            "ALTER TYPE mood SET SCHEMA archive",
            "ALTER TYPE address RENAME ATTRIBUTE street TO line1",
            "alter type address add attribute zip text;",
        ] {
            assert!(
                matches!(deparse_one(sql), Err(DbError::UnsupportedOperation(_))),
                "{}",
                sql
            );
        }
        assert!(matches!(
            deparse_one("ALTER TYPE"),
            Err(DbError::ParseError(_))
        ));
    }

    #[test]
    fn test_deparse_rejects_other_statements() {
        assert!(matches!(
            deparse_one("SELECT 1"),
            Err(DbError::UnsupportedOperation(_))
        ));
        assert!(matches!(
            deparse_one("DROP VIEW recent_events"),
            Err(DbError::UnsupportedOperation(_))
        ));
    }
}
