use sqlx::migrate::{MigrateError, Migrator};

use crate::DbPool;

pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

pub async fn run_pending(pool: &DbPool) -> Result<(), MigrateError> {
    MIGRATOR.run(pool).await
}

/// Number of migration versions in the embedded set.
pub fn known_count() -> usize {
    MIGRATOR.iter().filter(|migration| migration.migration_type.is_up_migration()).count()
}

/// Number of migration versions recorded in the database journal. Zero for
/// a database that has never been migrated.
pub async fn applied_count(pool: &DbPool) -> i64 {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM _sqlx_migrations")
        .fetch_one(pool)
        .await
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use sqlx::Row;

    use super::run_pending;
    use crate::{connect_with_settings, migrations::MIGRATOR};

    const MANAGED_TABLES: &[&str] = &[
        "contracts",
        "quotes",
        "quote_items",
        "specifications",
        "deals",
        "approvals",
        "workflow_transitions",
        "brand_assignments",
        "route_assignments",
        "plan_fact_categories",
        "plan_fact_items",
        "supplier_invoices",
        "supplier_invoice_payments",
        "notifications",
        "document_refs",
    ];

    const MANAGED_INDEXES: &[&str] = &[
        "idx_quotes_org_status",
        "idx_quote_items_quote_id",
        "idx_quote_items_procurement_user",
        "idx_specifications_quote",
        "idx_deals_quote",
        "idx_approvals_quote",
        "idx_approvals_pending_quote",
        "idx_plan_fact_items_deal",
        "idx_plan_fact_items_status",
        "idx_supplier_invoices_deal",
        "idx_invoice_payments_invoice",
        "idx_notifications_recipient",
        "idx_document_refs_owner",
    ];

    #[tokio::test]
    async fn migrations_create_baseline_tables() {
        let pool = connect_with_settings("sqlite::memory:", 1, 5_000).await.expect("connect");
        run_pending(&pool).await.expect("run migrations");

        for table in MANAGED_TABLES {
            let count = sqlx::query(
                "SELECT COUNT(*) AS count FROM sqlite_master WHERE type = 'table' AND name = ?1",
            )
            .bind(table)
            .fetch_one(&pool)
            .await
            .expect("check table")
            .get::<i64, _>("count");
            assert_eq!(count, 1, "table `{table}` should exist after migrations");
        }

        for index in MANAGED_INDEXES {
            let count = sqlx::query(
                "SELECT COUNT(*) AS count FROM sqlite_master WHERE type = 'index' AND name = ?1",
            )
            .bind(index)
            .fetch_one(&pool)
            .await
            .expect("check index")
            .get::<i64, _>("count");
            assert_eq!(count, 1, "index `{index}` should exist after migrations");
        }
    }

    #[tokio::test]
    async fn migrations_seed_the_category_registry() {
        let pool = connect_with_settings("sqlite::memory:", 1, 5_000).await.expect("connect");
        run_pending(&pool).await.expect("run migrations");

        let counts = sqlx::query(
            "SELECT kind, COUNT(*) AS count FROM plan_fact_categories GROUP BY kind ORDER BY kind",
        )
        .fetch_all(&pool)
        .await
        .expect("load category counts");

        assert_eq!(counts.len(), 2);
        assert_eq!(counts[0].get::<String, _>("kind"), "expense");
        assert_eq!(counts[0].get::<i64, _>("count"), 5);
        assert_eq!(counts[1].get::<String, _>("kind"), "income");
        assert_eq!(counts[1].get::<i64, _>("count"), 3);
    }

    #[tokio::test]
    async fn migrations_are_reversible() {
        let pool = connect_with_settings("sqlite::memory:", 1, 5_000).await.expect("connect");
        run_pending(&pool).await.expect("run migrations");

        MIGRATOR.undo(&pool, 0).await.expect("undo migrations");

        let quote_count = sqlx::query(
            "SELECT COUNT(*) AS count FROM sqlite_master WHERE type = 'table' AND name = 'quotes'",
        )
        .fetch_one(&pool)
        .await
        .expect("check quotes table removed")
        .get::<i64, _>("count");

        assert_eq!(quote_count, 0);
    }

    #[tokio::test]
    async fn migrations_up_down_up_preserves_schema_signature() {
        let pool = connect_with_settings("sqlite::memory:", 1, 5_000).await.expect("connect");
        run_pending(&pool).await.expect("run migrations");

        let initial_signature = managed_schema_signature(&pool).await;
        assert_eq!(
            initial_signature.len(),
            MANAGED_TABLES.len() + MANAGED_INDEXES.len(),
            "initial migration pass should create all managed schema objects",
        );

        MIGRATOR.undo(&pool, 0).await.expect("undo migrations");

        let after_down_signature = managed_schema_signature(&pool).await;
        assert!(
            after_down_signature.is_empty(),
            "managed schema objects should be removed after full undo",
        );

        run_pending(&pool).await.expect("re-run migrations");

        let after_second_up_signature = managed_schema_signature(&pool).await;
        assert_eq!(
            after_second_up_signature, initial_signature,
            "up/down/up should preserve migration-managed schema signature",
        );
    }

    async fn managed_schema_signature(pool: &sqlx::SqlitePool) -> Vec<(String, String, String)> {
        let mut signature: Vec<(String, String, String)> = sqlx::query(
            "SELECT type, name, IFNULL(sql, '') AS sql
             FROM sqlite_master
             WHERE type IN ('table', 'index')",
        )
        .fetch_all(pool)
        .await
        .expect("load schema objects")
        .into_iter()
        .filter_map(|row| {
            let name = row.get::<String, _>("name");
            if MANAGED_TABLES.contains(&name.as_str()) || MANAGED_INDEXES.contains(&name.as_str()) {
                Some((row.get::<String, _>("type"), name, row.get::<String, _>("sql")))
            } else {
                None
            }
        })
        .collect();
        signature.sort();
        signature
    }
}
