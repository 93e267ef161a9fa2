//! PostgreSQL namespace migration.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use sqlx::PgPool;
use tracing::{debug, info};

use super::{NamespaceMap, NamespaceMigrationGateway};
use crate::error::MigrationError;
use crate::settings::MigrationSettings;

/// Valid SQL identifier: alphanumeric and underscores, not starting with a digit.
#[allow(clippy::expect_used)]
static VALID_IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z_][a-zA-Z0-9_]*$").expect("valid regex literal"));

/// Rewrites namespaces in one text column of one table.
pub struct PgNamespaceMigrationGateway {
    pool: PgPool,
    settings: MigrationSettings,
}

impl PgNamespaceMigrationGateway {
    pub fn new(pool: PgPool, settings: MigrationSettings) -> Self {
        Self { pool, settings }
    }

    fn identifiers(&self) -> Result<(&str, &str, &str), MigrationError> {
        let settings = &self.settings;
        for name in [&settings.table, &settings.column, &settings.marker_column] {
            if !VALID_IDENTIFIER.is_match(name) {
                return Err(MigrationError::InvalidIdentifier { name: name.clone() });
            }
        }
        Ok((&settings.table, &settings.column, &settings.marker_column))
    }

    /// `UPDATE` statement for a map of `entries` rewrites.
    pub(crate) fn update_sql(&self, entries: usize) -> Result<String, MigrationError> {
        let (table, column, marker_column) = self.identifiers()?;
        let expression = replace_expression(column, entries);
        let marker = entries * 2 + 1;
        Ok(format!(
            "UPDATE {table} SET {column} = {expression} \
             WHERE {marker_column} = ${marker} AND {column} <> {expression}"
        ))
    }

    /// `SELECT COUNT(*)` statement matching the rows `update_sql` changes.
    pub(crate) fn count_sql(&self, entries: usize) -> Result<String, MigrationError> {
        let (table, column, marker_column) = self.identifiers()?;
        let expression = replace_expression(column, entries);
        let marker = entries * 2 + 1;
        Ok(format!(
            "SELECT COUNT(*) FROM {table} \
             WHERE {marker_column} = ${marker} AND {column} <> {expression}"
        ))
    }
}

/// Nested `REPLACE` calls; entry N wraps entry N-1.
fn replace_expression(column: &str, entries: usize) -> String {
    (0..entries).fold(column.to_string(), |inner, i| {
        format!("REPLACE({inner}, ${}, ${})", i * 2 + 1, i * 2 + 2)
    })
}

#[async_trait]
impl NamespaceMigrationGateway for PgNamespaceMigrationGateway {
    async fn migrate(&self, map: &NamespaceMap) -> Result<u64, MigrationError> {
        if map.is_empty() {
            debug!("empty namespace map, nothing to migrate");
            return Ok(0);
        }

        let sql = self.update_sql(map.len())?;
        let mut query = sqlx::query(&sql);
        for (from, to) in map {
            query = query.bind(from).bind(to);
        }
        let result = query.bind(&self.settings.marker).execute(&self.pool).await?;

        let affected = result.rows_affected();
        info!(
            table = %self.settings.table,
            rewrites = map.len(),
            affected,
            "namespace migration complete"
        );
        Ok(affected)
    }

    async fn count_pending(&self, map: &NamespaceMap) -> Result<u64, MigrationError> {
        if map.is_empty() {
            return Ok(0);
        }

        let sql = self.count_sql(map.len())?;
        let mut query = sqlx::query_scalar::<_, i64>(&sql);
        for (from, to) in map {
            query = query.bind(from).bind(to);
        }
        let count = query.bind(&self.settings.marker).fetch_one(&self.pool).await?;

        Ok(u64::try_from(count).unwrap_or(0))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use sqlx::postgres::PgPoolOptions;

    /// Gateway over a pool that never connects; only SQL generation is used.
    fn gateway(settings: MigrationSettings) -> PgNamespaceMigrationGateway {
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/unused")
            .unwrap();
        PgNamespaceMigrationGateway::new(pool, settings)
    }

    #[test]
    fn nested_replace_expression() {
        assert_eq!(replace_expression("body", 0), "body");
        assert_eq!(
            replace_expression("body", 2),
            "REPLACE(REPLACE(body, $1, $2), $3, $4)"
        );
    }

    #[tokio::test]
    async fn update_sql_guards_against_rewrites() {
        let sql = gateway(MigrationSettings::default()).update_sql(2).unwrap();
        assert_eq!(
            sql,
            "UPDATE richtext_field SET data_text = REPLACE(REPLACE(data_text, $1, $2), $3, $4) \
             WHERE field_type = $5 AND data_text <> REPLACE(REPLACE(data_text, $1, $2), $3, $4)"
        );
    }

    #[tokio::test]
    async fn count_sql_matches_update_filter() {
        let sql = gateway(MigrationSettings::default()).count_sql(1).unwrap();
        assert_eq!(
            sql,
            "SELECT COUNT(*) FROM richtext_field \
             WHERE field_type = $3 AND data_text <> REPLACE(data_text, $1, $2)"
        );
    }

    #[tokio::test]
    async fn invalid_identifiers_are_rejected() {
        let settings = MigrationSettings {
            table: "richtext; DROP TABLE users".to_string(),
            ..MigrationSettings::default()
        };
        let err = gateway(settings).update_sql(1).unwrap_err();
        assert!(matches!(err, MigrationError::InvalidIdentifier { .. }));
    }

    #[tokio::test]
    async fn empty_map_is_a_no_op() {
        let gateway = gateway(MigrationSettings::default());
        assert_eq!(gateway.migrate(&NamespaceMap::new()).await.unwrap(), 0);
        assert_eq!(gateway.count_pending(&NamespaceMap::new()).await.unwrap(), 0);
    }
}
