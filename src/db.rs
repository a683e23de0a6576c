// ==========================================
// 钢铁物质流分析 - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一 Connection::open 的 PRAGMA 行为
// - 统一 busy_timeout，减少并发写入时的偶发 busy 错误
// - 快照库默认位置: <data_dir>/steel-mfa/snapshots.db
// ==========================================

use rusqlite::Connection;
use std::path::PathBuf;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 默认快照库文件名
pub const SNAPSHOT_DB_FILE: &str = "snapshots.db";

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - journal_mode 使用 WAL,读写互不阻塞
/// - busy_timeout 需要“每个连接”单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 默认快照库路径（系统数据目录不可用时退回当前目录）
pub fn default_snapshot_db_path() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join(crate::APP_NAME))
        .unwrap_or_else(|| PathBuf::from("."))
        .join(SNAPSHOT_DB_FILE)
}
