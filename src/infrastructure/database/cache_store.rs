use super::params::{SqlValue, bind_params};
use super::snapshot::{SNAPSHOT_FORMAT_VERSION, SNAPSHOT_TABLES, StoreSnapshot, TableDump};
use crate::application::ports::snapshot_store::SnapshotStore;
use crate::shared::error::AppError;
use crate::shared::unix_now;
use sqlx::sqlite::{SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;

/// 1つのステートメントとその束縛値
pub type Statement = (String, Vec<SqlValue>);

/// インメモリ SQLite とスナップショットによる永続化を束ねたストア
///
/// 書き込みはすべてスナップショットへ書き戻される。書き戻しの失敗は呼び出し元へ返さず、
/// `persist_failures` に計上する。
pub struct CacheStore {
    pool: SqlitePool,
    snapshot_store: Arc<dyn SnapshotStore>,
    persist_gate: Mutex<()>,
    persist_failures: AtomicU64,
}

impl CacheStore {
    pub async fn open(snapshot_store: Arc<dyn SnapshotStore>) -> Result<Arc<Self>, AppError> {
        // 接続が閉じるとインメモリ DB が消えるため単一接続を保持し続ける
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;

        let store = Arc::new(Self {
            pool,
            snapshot_store,
            persist_gate: Mutex::new(()),
            persist_failures: AtomicU64::new(0),
        });

        match store.snapshot_store.load().await {
            Ok(Some(bytes)) => match store.restore(&bytes).await {
                Ok(rows) => {
                    tracing::info!(target: "cache::store", rows, "restored cache snapshot");
                }
                Err(err) => {
                    tracing::warn!(
                        target: "cache::store",
                        error = %err,
                        "discarding unreadable snapshot; starting with an empty cache"
                    );
                }
            },
            Ok(None) => {
                tracing::debug!(target: "cache::store", "no snapshot found; starting empty");
            }
            Err(err) => {
                tracing::warn!(
                    target: "cache::store",
                    error = %err,
                    "failed to load snapshot; starting with an empty cache"
                );
            }
        }

        Ok(store)
    }

    pub async fn query(&self, sql: &str, params: &[SqlValue]) -> Result<Vec<SqliteRow>, AppError> {
        let rows = bind_params(sqlx::query(sql), params)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    pub async fn query_optional(
        &self,
        sql: &str,
        params: &[SqlValue],
    ) -> Result<Option<SqliteRow>, AppError> {
        let row = bind_params(sqlx::query(sql), params)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    pub async fn exec(&self, sql: &str, params: &[SqlValue]) -> Result<u64, AppError> {
        let affected = bind_params(sqlx::query(sql), params)
            .execute(&self.pool)
            .await?
            .rows_affected();
        self.persist().await;
        Ok(affected)
    }

    /// 全ステートメントを1トランザクションで実行し、永続化は1回だけ行う
    pub async fn exec_batch(&self, statements: &[Statement]) -> Result<u64, AppError> {
        if statements.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        let mut affected = 0;
        for (sql, params) in statements {
            affected += bind_params(sqlx::query(sql), params)
                .execute(&mut *tx)
                .await?
                .rows_affected();
        }
        tx.commit().await?;

        self.persist().await;
        Ok(affected)
    }

    pub async fn export_snapshot(&self) -> Result<Vec<u8>, AppError> {
        let mut tables = Vec::with_capacity(SNAPSHOT_TABLES.len());
        for name in SNAPSHOT_TABLES {
            tables.push(self.dump_table(name).await?);
        }

        StoreSnapshot {
            format_version: SNAPSHOT_FORMAT_VERSION,
            exported_at: unix_now(),
            tables,
        }
        .encode()
    }

    /// スナップショットで全テーブルの内容を置き換える
    pub async fn import_snapshot(&self, bytes: &[u8]) -> Result<u64, AppError> {
        let rows = self.restore(bytes).await?;
        self.persist().await;
        Ok(rows)
    }

    pub fn persist_failures(&self) -> u64 {
        self.persist_failures.load(Ordering::Relaxed)
    }

    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await.is_ok()
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn restore(&self, bytes: &[u8]) -> Result<u64, AppError> {
        let snapshot = StoreSnapshot::decode(bytes)?;

        let mut tx = self.pool.begin().await?;
        for name in SNAPSHOT_TABLES {
            sqlx::query(&format!("DELETE FROM {name}"))
                .execute(&mut *tx)
                .await?;
        }

        let mut restored = 0u64;
        for table in &snapshot.tables {
            let placeholders = vec!["?"; table.columns.len()].join(", ");
            let sql = format!(
                "INSERT INTO {} ({}) VALUES ({})",
                table.name,
                table.columns.join(", "),
                placeholders
            );
            for row in &table.rows {
                bind_params(sqlx::query(&sql), row)
                    .execute(&mut *tx)
                    .await?;
                restored += 1;
            }
        }
        tx.commit().await?;

        Ok(restored)
    }

    async fn dump_table(&self, name: &str) -> Result<TableDump, AppError> {
        let column_rows = sqlx::query(&format!("SELECT name FROM pragma_table_info('{name}')"))
            .fetch_all(&self.pool)
            .await?;
        let mut columns = Vec::with_capacity(column_rows.len());
        for row in &column_rows {
            columns.push(row.try_get::<String, _>("name")?);
        }

        let rows = sqlx::query(&format!("SELECT {} FROM {name}", columns.join(", ")))
            .fetch_all(&self.pool)
            .await?;
        let mut values = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut record = Vec::with_capacity(row.columns().len());
            for index in 0..row.columns().len() {
                record.push(SqlValue::from_row(row, index)?);
            }
            values.push(record);
        }

        Ok(TableDump {
            name: name.to_string(),
            columns,
            rows: values,
        })
    }

    async fn persist(&self) {
        let _guard = self.persist_gate.lock().await;
        let result = match self.export_snapshot().await {
            Ok(bytes) => self.snapshot_store.save(&bytes).await,
            Err(err) => Err(err),
        };
        if let Err(err) = result {
            self.persist_failures.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(
                target: "cache::store",
                error = %err,
                "failed to persist cache snapshot"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params;
    use async_trait::async_trait;
    use std::sync::Mutex as StdMutex;

    #[derive(Default)]
    struct RecordingSnapshotStore {
        initial: Option<Vec<u8>>,
        saved: StdMutex<Vec<Vec<u8>>>,
        fail_saves: bool,
    }

    #[async_trait]
    impl SnapshotStore for RecordingSnapshotStore {
        async fn load(&self) -> Result<Option<Vec<u8>>, AppError> {
            Ok(self.initial.clone())
        }

        async fn save(&self, bytes: &[u8]) -> Result<(), AppError> {
            if self.fail_saves {
                return Err(AppError::Storage("disk full".into()));
            }
            self.saved.lock().unwrap().push(bytes.to_vec());
            Ok(())
        }
    }

    const INSERT_USER: &str = "INSERT INTO users (address, display_name, tickets_owned, events_organized, last_synced) VALUES (?, ?, ?, 0, ?)";

    #[tokio::test]
    async fn exec_persists_and_snapshot_restores_rows() {
        let recorder = Arc::new(RecordingSnapshotStore::default());
        let store = CacheStore::open(recorder.clone()).await.unwrap();

        let affected = store
            .exec(INSERT_USER, &params!["0xaa", "alice", 2i64, 100i64])
            .await
            .unwrap();
        assert_eq!(affected, 1);

        let latest = recorder.saved.lock().unwrap().last().cloned().unwrap();
        let reopened = CacheStore::open(Arc::new(RecordingSnapshotStore {
            initial: Some(latest),
            ..Default::default()
        }))
        .await
        .unwrap();

        let rows = reopened
            .query("SELECT display_name, tickets_owned FROM users WHERE address = ?", &params!["0xaa"])
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get::<String, _>("display_name"), "alice");
        assert_eq!(rows[0].get::<i64, _>("tickets_owned"), 2);
    }

    #[tokio::test]
    async fn corrupt_snapshot_falls_back_to_empty_schema() {
        let store = CacheStore::open(Arc::new(RecordingSnapshotStore {
            initial: Some(vec![0xff, 0x00, 0x13]),
            ..Default::default()
        }))
        .await
        .unwrap();

        let rows = store.query("SELECT * FROM events", &[]).await.unwrap();
        assert!(rows.is_empty());
        assert!(store.health_check().await);
    }

    #[tokio::test]
    async fn exec_batch_is_atomic() {
        let recorder = Arc::new(RecordingSnapshotStore::default());
        let store = CacheStore::open(recorder.clone()).await.unwrap();

        let statements: Vec<Statement> = vec![
            (INSERT_USER.to_string(), params!["0xaa", "alice", 1i64, 1i64]),
            (INSERT_USER.to_string(), params!["0xaa", "duplicate", 1i64, 1i64]),
        ];
        assert!(store.exec_batch(&statements).await.is_err());

        let rows = store.query("SELECT * FROM users", &[]).await.unwrap();
        assert!(rows.is_empty());
        assert!(recorder.saved.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn persist_failure_is_counted_not_returned() {
        let store = CacheStore::open(Arc::new(RecordingSnapshotStore {
            fail_saves: true,
            ..Default::default()
        }))
        .await
        .unwrap();

        store
            .exec(INSERT_USER, &params!["0xbb", "bob", 0i64, 5i64])
            .await
            .unwrap();
        assert_eq!(store.persist_failures(), 1);
    }

    #[tokio::test]
    async fn import_replaces_existing_contents() {
        let source = CacheStore::open(Arc::new(RecordingSnapshotStore::default()))
            .await
            .unwrap();
        source
            .exec(INSERT_USER, &params!["0xaa", "alice", 1i64, 1i64])
            .await
            .unwrap();
        let bytes = source.export_snapshot().await.unwrap();

        let target = CacheStore::open(Arc::new(RecordingSnapshotStore::default()))
            .await
            .unwrap();
        target
            .exec(INSERT_USER, &params!["0xcc", "carol", 1i64, 1i64])
            .await
            .unwrap();
        let restored = target.import_snapshot(&bytes).await.unwrap();
        assert_eq!(restored, 1);

        let rows = target.query("SELECT address FROM users", &[]).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get::<String, _>("address"), "0xaa");
    }
}
