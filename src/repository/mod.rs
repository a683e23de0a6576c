// ==========================================
// 钢铁物质流分析 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// 职责: 模型快照的持久化,屏蔽数据库细节
// 约束: 所有查询使用参数化,防止 SQL 注入
// ==========================================

pub mod error;
pub mod snapshot_repo;

// 重导出核心仓储
pub use error::{RepositoryError, RepositoryResult};
pub use snapshot_repo::{ModelSnapshot, SnapshotRepository};
