//! PostgreSQL access store.
//!
//! Uses sqlx with embedded migrations. Batch writes run in a single
//! transaction so a failed matrix save applies nothing.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::gauge;
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;
use tracing::{debug, info};

use crate::access::{AccessLevel, Permission, PermissionId, Role, RoleId, RuleChange, StoredRule};
use crate::config::DatabaseConfig;
use crate::error::{AccessError, Result};
use crate::store::AccessStore;

/// Database connection and operations.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect(&config.url)
            .await?;

        info!(
            max_connections = config.max_connections,
            min_connections = config.min_connections,
            "Connected to database"
        );
        Ok(Self { pool })
    }

    /// Wrap an existing pool.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("Database migrations applied");
        Ok(())
    }

    /// Get the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Map a foreign-key failure on a grant edge to the entity that is missing.
fn grant_error(error: sqlx::Error, role_id: RoleId, permission_id: PermissionId) -> AccessError {
    if let sqlx::Error::Database(db_err) = &error {
        match db_err.constraint() {
            Some(c) if c.contains("permission_id") => return AccessError::permission_not_found(permission_id),
            Some(c) if c.contains("role_id") => return AccessError::role_not_found(role_id),
            _ => {}
        }
    }
    AccessError::from(error)
}

#[async_trait]
impl AccessStore for Database {
    fn backend_name(&self) -> &'static str {
        "postgres"
    }

    async fn list_roles(&self) -> Result<Vec<Role>> {
        let rows = sqlx::query_as::<_, RoleRow>(
            r#"
            SELECT id, name, display_name, level, is_active, is_superuser, created_at
            FROM roles
            ORDER BY level DESC, id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Role::from).collect())
    }

    async fn list_permissions(&self) -> Result<Vec<Permission>> {
        let rows = sqlx::query_as::<_, PermissionRow>(
            r#"
            SELECT id, module, resource, action, display_name, description, is_active
            FROM permissions
            ORDER BY module, resource, action
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Permission::from).collect())
    }

    async fn list_grants(&self, role_id: RoleId) -> Result<Vec<Permission>> {
        let rows = sqlx::query_as::<_, PermissionRow>(
            r#"
            SELECT p.id, p.module, p.resource, p.action, p.display_name, p.description, p.is_active
            FROM permissions p
            JOIN role_permissions rp ON rp.permission_id = p.id
            WHERE rp.role_id = $1
            ORDER BY p.module, p.resource, p.action
            "#,
        )
        .bind(role_id.get())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Permission::from).collect())
    }

    async fn grant(&self, role_id: RoleId, permission_id: PermissionId) -> Result<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO role_permissions (role_id, permission_id, granted_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (role_id, permission_id) DO NOTHING
            "#,
        )
        .bind(role_id.get())
        .bind(permission_id.get())
        .execute(&self.pool)
        .await
        .map_err(|e| grant_error(e, role_id, permission_id))?;

        debug!(role_id = %role_id, permission_id = %permission_id, inserted = result.rows_affected(), "Grant stored");
        Ok(())
    }

    async fn revoke(&self, role_id: RoleId, permission_id: PermissionId) -> Result<()> {
        let result = sqlx::query(
            r#"
            DELETE FROM role_permissions
            WHERE role_id = $1 AND permission_id = $2
            "#,
        )
        .bind(role_id.get())
        .bind(permission_id.get())
        .execute(&self.pool)
        .await?;

        debug!(role_id = %role_id, permission_id = %permission_id, deleted = result.rows_affected(), "Revoke stored");
        Ok(())
    }

    async fn list_rules(&self, role_id: Option<RoleId>) -> Result<Vec<StoredRule>> {
        let rows = sqlx::query_as::<_, PageAccessRow>(
            r#"
            SELECT role_id, page_url, access_level, updated_at
            FROM page_access
            WHERE $1::BIGINT IS NULL OR role_id = $1
            ORDER BY page_url, role_id
            "#,
        )
        .bind(role_id.map(RoleId::get))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(StoredRule::from).collect())
    }

    async fn apply_rule_batch(&self, changes: &[RuleChange]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        // Statements run in submission order, so a repeated cell keeps its last value.
        for change in changes {
            sqlx::query(
                r#"
                INSERT INTO page_access (role_id, page_url, access_level, updated_at)
                VALUES ($1, $2, $3, NOW())
                ON CONFLICT (role_id, page_url)
                DO UPDATE SET access_level = EXCLUDED.access_level, updated_at = NOW()
                "#,
            )
            .bind(change.role_id.get())
            .bind(&change.page_url)
            .bind(change.access_level.as_str())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        debug!(changes = changes.len(), "Rule batch committed");
        Ok(())
    }

    async fn materialize_rules(
        &self,
        role_ids: &[RoleId],
        page_urls: &[String],
        level: AccessLevel,
    ) -> Result<u64> {
        let ids: Vec<i64> = role_ids.iter().map(|r| r.get()).collect();
        let result = sqlx::query(
            r#"
            INSERT INTO page_access (role_id, page_url, access_level, updated_at)
            SELECT r.id, u.url, $3, NOW()
            FROM roles r
            CROSS JOIN UNNEST($2::TEXT[]) AS u(url)
            WHERE r.id = ANY($1)
            ON CONFLICT (role_id, page_url) DO NOTHING
            "#,
        )
        .bind(ids)
        .bind(page_urls.to_vec())
        .bind(level.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn health_check(&self) -> Result<()> {
        tokio::time::timeout(
            Duration::from_secs(5),
            sqlx::query("SELECT 1").execute(&self.pool),
        )
        .await??;

        gauge!("accessgate_db_pool_connections").set(self.pool.size() as f64);
        gauge!("accessgate_db_pool_idle").set(self.pool.num_idle() as f64);
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Row Types
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, sqlx::FromRow)]
pub struct RoleRow {
    pub id: i64,
    pub name: String,
    pub display_name: String,
    pub level: i32,
    pub is_active: bool,
    pub is_superuser: bool,
    pub created_at: DateTime<Utc>,
}

impl From<RoleRow> for Role {
    fn from(row: RoleRow) -> Self {
        Self {
            id: RoleId(row.id),
            name: row.name,
            display_name: row.display_name,
            level: row.level,
            is_active: row.is_active,
            is_superuser: row.is_superuser,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct PermissionRow {
    pub id: i64,
    pub module: String,
    pub resource: String,
    pub action: String,
    pub display_name: String,
    pub description: Option<String>,
    pub is_active: bool,
}

impl From<PermissionRow> for Permission {
    fn from(row: PermissionRow) -> Self {
        Self {
            id: PermissionId(row.id),
            module: row.module,
            resource: row.resource,
            action: row.action,
            display_name: row.display_name,
            description: row.description.unwrap_or_default(),
            is_active: row.is_active,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct PageAccessRow {
    pub role_id: i64,
    pub page_url: String,
    pub access_level: String,
    pub updated_at: DateTime<Utc>,
}

impl From<PageAccessRow> for StoredRule {
    fn from(row: PageAccessRow) -> Self {
        Self {
            role_id: RoleId(row.role_id),
            page_url: row.page_url,
            access_level: row.access_level,
        }
    }
}
