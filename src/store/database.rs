use async_trait::async_trait;
use chrono::Utc;
use sqlx::migrate::MigrateDatabase;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use tracing::info;

use crate::error::WorkflowError;
use crate::query::{Page, PageResult, WorkflowFilter};
use crate::store::{HistoryLog, StoredWorkflow, WorkflowRecordStore};
use crate::workflow::types::{ReviewHistoryEntry, ReviewStatus, ReviewWorkflow, WorkflowKey};

const WORKFLOW_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS review_workflows (
    id TEXT PRIMARY KEY,
    item_type TEXT NOT NULL,
    item_id TEXT NOT NULL,
    engagement TEXT NOT NULL,
    status TEXT NOT NULL,
    assigned_reviewer TEXT,
    priority TEXT NOT NULL,
    due_date_ms INTEGER,
    superseded INTEGER NOT NULL DEFAULT 0,
    revision INTEGER NOT NULL,
    created_at_ms INTEGER NOT NULL,
    record TEXT NOT NULL
)
"#;

/// One active workflow per natural key, enforced in the store layer.
const WORKFLOW_KEY_INDEX: &str = r#"
CREATE UNIQUE INDEX IF NOT EXISTS idx_review_workflows_natural_key
ON review_workflows (item_type, item_id, engagement)
WHERE superseded = 0
"#;

const HISTORY_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS review_history (
    id TEXT PRIMARY KEY,
    workflow_id TEXT NOT NULL,
    engagement TEXT NOT NULL,
    performed_at_ms INTEGER NOT NULL,
    entry TEXT NOT NULL
)
"#;

const HISTORY_WORKFLOW_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_review_history_workflow
ON review_history (workflow_id, performed_at_ms)
"#;

/// Connect to (and if needed create) the SQLite database and return the
/// record store and history log sharing one pool.
pub async fn connect_sqlite(
    url: &str,
    max_connections: u32,
) -> Result<(SqliteWorkflowStore, SqliteHistoryLog), WorkflowError> {
    if !Sqlite::database_exists(url).await? {
        info!("Creating database at {}", url);
        Sqlite::create_database(url).await?;
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect(url)
        .await?;

    for statement in [
        WORKFLOW_SCHEMA,
        WORKFLOW_KEY_INDEX,
        HISTORY_SCHEMA,
        HISTORY_WORKFLOW_INDEX,
    ] {
        sqlx::query(statement).execute(&pool).await?;
    }

    Ok((
        SqliteWorkflowStore { pool: pool.clone() },
        SqliteHistoryLog { pool },
    ))
}

/// SQLite-backed record store. The full record is stored as JSON alongside
/// the filterable columns; `revision` gates every update.
pub struct SqliteWorkflowStore {
    pool: SqlitePool,
}

impl SqliteWorkflowStore {
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    fn row_to_stored(row: &sqlx::sqlite::SqliteRow) -> Result<StoredWorkflow, WorkflowError> {
        let record: ReviewWorkflow = serde_json::from_str(&row.get::<String, _>("record"))?;
        Ok(StoredWorkflow {
            revision: row.get::<i64, _>("revision") as u64,
            record,
        })
    }

    fn push_filter(builder: &mut QueryBuilder<'_, Sqlite>, filter: &WorkflowFilter) {
        builder.push(" WHERE superseded = 0");
        if let Some(status) = filter.status {
            builder.push(" AND status = ").push_bind(status.as_str());
        }
        if let Some(engagement) = filter.engagement.clone() {
            builder.push(" AND engagement = ").push_bind(engagement);
        }
        if let Some(item_type) = filter.item_type {
            builder.push(" AND item_type = ").push_bind(item_type.as_str());
        }
        if let Some(reviewer) = filter.assigned_reviewer.clone() {
            builder
                .push(" AND assigned_reviewer = ")
                .push_bind(reviewer);
        }
        if let Some(priority) = filter.priority {
            builder
                .push(" AND priority = ")
                .push_bind(priority.to_string());
        }
        if let Some(from) = filter.due_from {
            builder
                .push(" AND due_date_ms IS NOT NULL AND due_date_ms >= ")
                .push_bind(from.timestamp_millis());
        }
        if let Some(to) = filter.due_to {
            builder
                .push(" AND due_date_ms IS NOT NULL AND due_date_ms <= ")
                .push_bind(to.timestamp_millis());
        }
        if let Some(now) = filter.overdue_as_of {
            builder
                .push(" AND due_date_ms IS NOT NULL AND due_date_ms < ")
                .push_bind(now.timestamp_millis());
            builder
                .push(" AND status != ")
                .push_bind(ReviewStatus::SignedOff.as_str());
        }
    }
}

#[async_trait]
impl WorkflowRecordStore for SqliteWorkflowStore {
    async fn get(&self, id: &str) -> Result<Option<StoredWorkflow>, WorkflowError> {
        let row = sqlx::query("SELECT revision, record FROM review_workflows WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::row_to_stored).transpose()
    }

    async fn get_by_key(&self, key: &WorkflowKey) -> Result<Option<StoredWorkflow>, WorkflowError> {
        let row = sqlx::query(
            r#"
            SELECT revision, record FROM review_workflows
            WHERE item_type = ?1 AND item_id = ?2 AND engagement = ?3 AND superseded = 0
            "#,
        )
        .bind(key.item_type.as_str())
        .bind(&key.item_id)
        .bind(&key.engagement)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(Self::row_to_stored).transpose()
    }

    async fn create(&self, mut record: ReviewWorkflow) -> Result<StoredWorkflow, WorkflowError> {
        let now = Utc::now();
        record.created_at = now;
        record.updated_at = now;

        let result = sqlx::query(
            r#"
            INSERT INTO review_workflows
                (id, item_type, item_id, engagement, status, assigned_reviewer,
                 priority, due_date_ms, superseded, revision, created_at_ms, record)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 1, ?10, ?11)
            "#,
        )
        .bind(&record.id)
        .bind(record.item_type.as_str())
        .bind(&record.item_id)
        .bind(&record.engagement)
        .bind(record.status.as_str())
        .bind(record.assigned_reviewer.as_deref())
        .bind(record.priority.to_string())
        .bind(record.due_date.map(|due| due.timestamp_millis()))
        .bind(record.superseded as i64)
        .bind(record.created_at.timestamp_millis())
        .bind(serde_json::to_string(&record)?)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(StoredWorkflow {
                revision: 1,
                record,
            }),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                Err(WorkflowError::conflict(format!(
                    "an active workflow already exists for {}",
                    record.key()
                )))
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn compare_and_swap(
        &self,
        id: &str,
        expected_revision: u64,
        mut record: ReviewWorkflow,
    ) -> Result<StoredWorkflow, WorkflowError> {
        let current = self
            .get(id)
            .await?
            .ok_or_else(|| WorkflowError::not_found(format!("workflow id {id}")))?;
        if record.key() != current.record.key() {
            return Err(WorkflowError::validation(
                "the natural key of a workflow is immutable",
            ));
        }

        record.created_at = current.record.created_at;
        record.updated_at = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE review_workflows
            SET status = ?1, assigned_reviewer = ?2, priority = ?3, due_date_ms = ?4,
                superseded = ?5, revision = revision + 1, record = ?6
            WHERE id = ?7 AND revision = ?8
            "#,
        )
        .bind(record.status.as_str())
        .bind(record.assigned_reviewer.as_deref())
        .bind(record.priority.to_string())
        .bind(record.due_date.map(|due| due.timestamp_millis()))
        .bind(record.superseded as i64)
        .bind(serde_json::to_string(&record)?)
        .bind(id)
        .bind(expected_revision as i64)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(WorkflowError::conflict(format!(
                "workflow {id} has moved past revision {expected_revision}"
            )));
        }

        Ok(StoredWorkflow {
            revision: expected_revision + 1,
            record,
        })
    }

    async fn list(
        &self,
        filter: &WorkflowFilter,
        page: &Page,
    ) -> Result<PageResult<ReviewWorkflow>, WorkflowError> {
        let mut count_builder =
            QueryBuilder::<Sqlite>::new("SELECT COUNT(*) AS total FROM review_workflows");
        Self::push_filter(&mut count_builder, filter);
        let total: i64 = count_builder
            .build()
            .fetch_one(&self.pool)
            .await?
            .get("total");

        let mut list_builder =
            QueryBuilder::<Sqlite>::new("SELECT revision, record FROM review_workflows");
        Self::push_filter(&mut list_builder, filter);
        list_builder
            .push(" ORDER BY created_at_ms ASC, id ASC LIMIT ")
            .push_bind(page.limit as i64)
            .push(" OFFSET ")
            .push_bind(page.offset as i64);

        let rows = list_builder.build().fetch_all(&self.pool).await?;
        let mut items = Vec::with_capacity(rows.len());
        for row in &rows {
            items.push(Self::row_to_stored(row)?.record);
        }

        Ok(PageResult {
            items,
            total: total as usize,
            offset: page.offset,
            limit: page.limit,
        })
    }
}

/// SQLite-backed append-only history log.
pub struct SqliteHistoryLog {
    pool: SqlitePool,
}

impl SqliteHistoryLog {
    async fn list_where(
        &self,
        column: &str,
        value: &str,
    ) -> Result<Vec<ReviewHistoryEntry>, WorkflowError> {
        let sql = format!(
            "SELECT entry FROM review_history WHERE {column} = ?1 \
             ORDER BY performed_at_ms ASC, rowid ASC"
        );
        let rows = sqlx::query(&sql).bind(value).fetch_all(&self.pool).await?;
        let mut entries = Vec::with_capacity(rows.len());
        for row in &rows {
            entries.push(serde_json::from_str(&row.get::<String, _>("entry"))?);
        }
        Ok(entries)
    }
}

#[async_trait]
impl HistoryLog for SqliteHistoryLog {
    async fn append(&self, entry: ReviewHistoryEntry) -> Result<(), WorkflowError> {
        // INSERT OR IGNORE keeps the append idempotent by entry id; an
        // existing row is never touched.
        sqlx::query(
            r#"
            INSERT OR IGNORE INTO review_history
                (id, workflow_id, engagement, performed_at_ms, entry)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&entry.id)
        .bind(&entry.workflow_id)
        .bind(&entry.engagement)
        .bind(entry.performed_at.timestamp_millis())
        .bind(serde_json::to_string(&entry)?)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_by_workflow(
        &self,
        workflow_id: &str,
    ) -> Result<Vec<ReviewHistoryEntry>, WorkflowError> {
        self.list_where("workflow_id", workflow_id).await
    }

    async fn list_by_engagement(
        &self,
        engagement: &str,
    ) -> Result<Vec<ReviewHistoryEntry>, WorkflowError> {
        self.list_where("engagement", engagement).await
    }
}
