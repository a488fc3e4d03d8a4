// ABOUTME: Destination catalog lookups and counting queries
// ABOUTME: Used by the importer for foreign key targets and by the verifier for row counts

use crate::sqlite::quote_ident;
use anyhow::{Context, Result};
use tokio_postgres::Client;

/// Returns true if `schema.table` exists (exact, case-sensitive name)
pub async fn table_exists(client: &Client, schema: &str, table: &str) -> Result<bool> {
    let row = client
        .query_one(
            "SELECT EXISTS (
                 SELECT 1 FROM information_schema.tables
                 WHERE table_schema = $1 AND table_name = $2
             )",
            &[&schema, &table],
        )
        .await
        .with_context(|| format!("Failed to look up table {}.{}", schema, table))?;
    Ok(row.get(0))
}

/// Count rows in `schema.table`
pub async fn count_rows(client: &Client, schema: &str, table: &str) -> Result<i64> {
    let sql = format!(
        "SELECT COUNT(*) FROM {}.{}",
        quote_ident(schema),
        quote_ident(table)
    );
    let row = client
        .query_one(&sql, &[])
        .await
        .with_context(|| format!("Failed to count rows in {}.{}", schema, table))?;
    Ok(row.get(0))
}

/// Run a query returning a single count, with `schema` as the search path
///
/// The search path is set inside a read-only transaction so unqualified
/// table names resolve to the imported schema and nothing can be modified.
pub async fn query_count(client: &mut Client, schema: &str, sql: &str) -> Result<i64> {
    let tx = client
        .build_transaction()
        .read_only(true)
        .start()
        .await
        .context("Failed to start read-only transaction")?;
    tx.batch_execute(&format!("SET LOCAL search_path TO {}", quote_ident(schema)))
        .await
        .context("Failed to set search_path")?;

    let row = tx
        .query_one(sql, &[])
        .await
        .with_context(|| format!("Failed to run count query: {}", sql))?;
    let count = match row.try_get::<_, i64>(0) {
        Ok(n) => n,
        Err(_) => i64::from(row.try_get::<_, i32>(0).context("Count query must return an integer")?),
    };

    tx.rollback().await.context("Failed to close read-only transaction")?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::postgres::connect;

    #[tokio::test]
    #[ignore]
    async fn test_table_exists_and_count() {
        let url = std::env::var("TEST_TARGET_URL").unwrap();
        let mut client = connect(&url).await.unwrap();

        client
            .batch_execute(
                "DROP TABLE IF EXISTS public.\"CatalogSample\";
                 CREATE TABLE public.\"CatalogSample\" (id INT);
                 INSERT INTO public.\"CatalogSample\" VALUES (1), (2);",
            )
            .await
            .unwrap();

        assert!(table_exists(&client, "public", "CatalogSample").await.unwrap());
        assert!(!table_exists(&client, "public", "catalogsample").await.unwrap());
        assert_eq!(count_rows(&client, "public", "CatalogSample").await.unwrap(), 2);
        assert_eq!(
            query_count(&mut client, "public", "SELECT COUNT(*) FROM \"CatalogSample\"")
                .await
                .unwrap(),
            2
        );

        client
            .batch_execute("DROP TABLE public.\"CatalogSample\"")
            .await
            .unwrap();
    }
}
