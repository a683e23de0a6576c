// ==========================================
// 钢铁物质流分析 - 模型快照数据仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 存储: 一个配置指纹对应一个快照（流量网络 + 守恒摘要）
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::network::FlowNetwork;
use crate::engine::mass_balance::BalanceSummary;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{Local, NaiveDateTime};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tracing::debug;
use uuid::Uuid;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// ==========================================
// ModelSnapshot - 已计算模型的快照
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSnapshot {
    pub snapshot_id: String,
    pub fingerprint: String,
    pub created_at: NaiveDateTime,
    pub network: FlowNetwork,
    pub summary: BalanceSummary,
}

impl ModelSnapshot {
    pub fn new(fingerprint: String, network: FlowNetwork, summary: BalanceSummary) -> Self {
        Self {
            snapshot_id: Uuid::new_v4().to_string(),
            fingerprint,
            created_at: Local::now().naive_local(),
            network,
            summary,
        }
    }
}

// ==========================================
// SnapshotRepository - 快照仓储
// ==========================================
/// 快照仓储
/// 职责: 管理 model_snapshot 表的读写
/// 红线: 不做计算,只负责数据访问
pub struct SnapshotRepository {
    conn: Arc<Mutex<Connection>>,
}

impl SnapshotRepository {
    /// 创建新的 SnapshotRepository 实例（自动建表）
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    ///
    /// # 返回
    /// - RepositoryResult<Self>
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)
            .map_err(|e| RepositoryError::DatabaseConnectionError(e.to_string()))?;
        let repo = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        repo.ensure_schema()?;
        Ok(repo)
    }

    /// 从已有连接创建仓储实例（自动建表）
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> RepositoryResult<Self> {
        let repo = Self { conn };
        repo.ensure_schema()?;
        Ok(repo)
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn ensure_schema(&self) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS model_snapshot (
                fingerprint TEXT PRIMARY KEY,
                snapshot_id TEXT NOT NULL,
                created_at TEXT NOT NULL,
                network_json TEXT NOT NULL,
                summary_json TEXT NOT NULL
            );
            "#,
        )?;
        Ok(())
    }

    /// 写入快照（INSERT OR REPLACE）
    ///
    /// # 说明
    /// - 主键: fingerprint,同一配置只保留最新快照
    pub fn upsert(&self, snapshot: &ModelSnapshot) -> RepositoryResult<()> {
        let network_json = serde_json::to_string(&snapshot.network)?;
        let summary_json = serde_json::to_string(&snapshot.summary)?;

        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT OR REPLACE INTO model_snapshot (
                fingerprint, snapshot_id, created_at, network_json, summary_json
            ) VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                snapshot.fingerprint,
                snapshot.snapshot_id,
                snapshot.created_at.format(TIMESTAMP_FORMAT).to_string(),
                network_json,
                summary_json,
            ],
        )?;
        debug!(
            fingerprint = %snapshot.fingerprint,
            bytes = network_json.len(),
            "快照写入 model_snapshot"
        );
        Ok(())
    }

    /// 按配置指纹查询快照
    ///
    /// # 返回
    /// - Ok(Some(ModelSnapshot)): 找到快照
    /// - Ok(None): 未找到
    /// - Err: 数据库错误 / 反序列化失败
    pub fn find_by_fingerprint(&self, fingerprint: &str) -> RepositoryResult<Option<ModelSnapshot>> {
        let conn = self.get_conn()?;
        let row = conn
            .query_row(
                r#"
                SELECT snapshot_id, created_at, network_json, summary_json
                FROM model_snapshot
                WHERE fingerprint = ?1
                "#,
                params![fingerprint],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                },
            )
            .optional()?;

        let Some((snapshot_id, created_at, network_json, summary_json)) = row else {
            return Ok(None);
        };

        let created_at = NaiveDateTime::parse_from_str(&created_at, TIMESTAMP_FORMAT).map_err(|e| {
            RepositoryError::FieldValueError {
                field: "created_at".to_string(),
                message: e.to_string(),
            }
        })?;

        Ok(Some(ModelSnapshot {
            snapshot_id,
            fingerprint: fingerprint.to_string(),
            created_at,
            network: serde_json::from_str(&network_json)?,
            summary: serde_json::from_str(&summary_json)?,
        }))
    }

    /// 删除快照
    ///
    /// # 返回
    /// - Ok(true): 已删除
    /// - Ok(false): 不存在
    pub fn delete_by_fingerprint(&self, fingerprint: &str) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            "DELETE FROM model_snapshot WHERE fingerprint = ?1",
            params![fingerprint],
        )?;
        Ok(affected > 0)
    }

    /// 列出所有快照指纹（按写入时间倒序）
    pub fn list_fingerprints(&self) -> RepositoryResult<Vec<String>> {
        let conn = self.get_conn()?;
        let mut stmt =
            conn.prepare("SELECT fingerprint FROM model_snapshot ORDER BY created_at DESC")?;
        let fingerprints = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(fingerprints)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModelConfig;
    use crate::engine::orchestrator::ModelBuilder;

    fn empty_snapshot(fingerprint: &str) -> ModelSnapshot {
        let config = ModelConfig::default();
        let builder = ModelBuilder::new(&config);
        let dims = builder.dimensions(&["R".to_string()]).unwrap();
        let network = builder.init_network(dims).unwrap();
        let summary = BalanceSummary {
            balance: vec![0.0; network.processes().len()],
            checked_cells: 0,
            tolerance: 1e-6,
        };
        ModelSnapshot::new(fingerprint.to_string(), network, summary)
    }

    fn memory_repo() -> SnapshotRepository {
        let conn = Connection::open_in_memory().unwrap();
        SnapshotRepository::from_connection(Arc::new(Mutex::new(conn))).unwrap()
    }

    #[test]
    fn test_find_missing_returns_none() {
        let repo = memory_repo();
        assert!(repo.find_by_fingerprint("absent").unwrap().is_none());
    }

    #[test]
    fn test_upsert_then_find() {
        let repo = memory_repo();
        let snapshot = empty_snapshot("cfg_1");
        repo.upsert(&snapshot).unwrap();

        let loaded = repo.find_by_fingerprint("cfg_1").unwrap().unwrap();
        assert_eq!(loaded.snapshot_id, snapshot.snapshot_id);
        assert_eq!(loaded.network, snapshot.network);
        assert_eq!(loaded.summary, snapshot.summary);
    }

    #[test]
    fn test_upsert_replaces_same_fingerprint() {
        let repo = memory_repo();
        repo.upsert(&empty_snapshot("cfg_1")).unwrap();
        let second = empty_snapshot("cfg_1");
        repo.upsert(&second).unwrap();

        assert_eq!(repo.list_fingerprints().unwrap(), vec!["cfg_1".to_string()]);
        let loaded = repo.find_by_fingerprint("cfg_1").unwrap().unwrap();
        assert_eq!(loaded.snapshot_id, second.snapshot_id);
    }

    #[test]
    fn test_corrupt_network_json_is_serialization_error() {
        let repo = memory_repo();
        repo.upsert(&empty_snapshot("cfg_1")).unwrap();
        repo.get_conn()
            .unwrap()
            .execute(
                "UPDATE model_snapshot SET network_json = '{' WHERE fingerprint = 'cfg_1'",
                [],
            )
            .unwrap();

        let result = repo.find_by_fingerprint("cfg_1");
        assert!(matches!(result, Err(RepositoryError::SerializationError(_))));
    }

    #[test]
    fn test_bad_timestamp_is_field_value_error() {
        let repo = memory_repo();
        repo.upsert(&empty_snapshot("cfg_1")).unwrap();
        repo.get_conn()
            .unwrap()
            .execute(
                "UPDATE model_snapshot SET created_at = 'yesterday' WHERE fingerprint = 'cfg_1'",
                [],
            )
            .unwrap();

        let result = repo.find_by_fingerprint("cfg_1");
        assert!(matches!(result, Err(RepositoryError::FieldValueError { .. })));
    }

    #[test]
    fn test_delete_by_fingerprint() {
        let repo = memory_repo();
        repo.upsert(&empty_snapshot("cfg_1")).unwrap();
        assert!(repo.delete_by_fingerprint("cfg_1").unwrap());
        assert!(!repo.delete_by_fingerprint("cfg_1").unwrap());
    }
}
