use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::domain::models::{Cluster, ClusterUpgradeStatus};
use crate::domain::ports::errors::StoreError;
use crate::domain::ports::ClusterStore;
use crate::infrastructure::database::utils::parse_datetime;

/// SQLite implementation of `ClusterStore`
///
/// Cluster rows carry the upgrade status as a JSON column so the status
/// shape can evolve without schema migrations.
pub struct SqliteClusterStore {
    pool: SqlitePool,
}

impl SqliteClusterStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create the clusters table if it does not exist yet.
    pub async fn init_schema(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS clusters (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL UNIQUE,
                main_image TEXT NOT NULL,
                central_endpoint TEXT NOT NULL,
                auto_upgrade_enabled INTEGER NOT NULL DEFAULT 1,
                upgrade_status TEXT,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationError(format!("Failed to create clusters table: {e}")))?;
        Ok(())
    }

    pub async fn insert_cluster(&self, cluster: &Cluster) -> Result<(), StoreError> {
        let status_json = cluster
            .upgrade_status
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let created_at_str = cluster.created_at.to_rfc3339();
        let auto_upgrade_i64 = i64::from(cluster.auto_upgrade_enabled);

        sqlx::query(
            r#"
            INSERT INTO clusters (
                id, name, main_image, central_endpoint,
                auto_upgrade_enabled, upgrade_status, created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&cluster.id)
        .bind(&cluster.name)
        .bind(&cluster.main_image)
        .bind(&cluster.central_endpoint)
        .bind(auto_upgrade_i64)
        .bind(status_json)
        .bind(created_at_str)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn list_clusters(&self) -> Result<Vec<Cluster>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, main_image, central_endpoint,
                   auto_upgrade_enabled, upgrade_status, created_at
            FROM clusters
            ORDER BY name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_cluster).collect()
    }

    pub async fn find_cluster_by_name(&self, name: &str) -> Result<Option<Cluster>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, name, main_image, central_endpoint,
                   auto_upgrade_enabled, upgrade_status, created_at
            FROM clusters
            WHERE name = ?
            "#,
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_cluster).transpose()
    }

    pub async fn remove_cluster(&self, id: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM clusters WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl ClusterStore for SqliteClusterStore {
    async fn get_cluster(&self, id: &str) -> Result<Option<Cluster>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, name, main_image, central_endpoint,
                   auto_upgrade_enabled, upgrade_status, created_at
            FROM clusters
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_cluster).transpose()
    }

    async fn update_cluster_upgrade_status(
        &self,
        id: &str,
        status: &ClusterUpgradeStatus,
    ) -> Result<(), StoreError> {
        let status_json = serde_json::to_string(status)?;
        let result = sqlx::query("UPDATE clusters SET upgrade_status = ? WHERE id = ?")
            .bind(status_json)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("cluster {id}")));
        }
        Ok(())
    }
}

fn row_to_cluster(row: &SqliteRow) -> Result<Cluster, StoreError> {
    let upgrade_status = row
        .try_get::<Option<String>, _>("upgrade_status")?
        .map(|json| serde_json::from_str(&json))
        .transpose()?;
    let created_at_str: String = row.try_get("created_at")?;

    Ok(Cluster {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        main_image: row.try_get("main_image")?,
        central_endpoint: row.try_get("central_endpoint")?,
        auto_upgrade_enabled: row.try_get::<i64, _>("auto_upgrade_enabled")? != 0,
        created_at: parse_datetime(&created_at_str)
            .map_err(|e| StoreError::InvalidData(format!("created_at: {e}")))?,
        upgrade_status,
    })
}
