// ==========================================
// 印花车间计价系统 - SQLite 连接初始化 / 建表
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为 (外键 / busy_timeout)
// - 启动时建表 (CREATE TABLE IF NOT EXISTS)，并写入 schema_version
// ==========================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 时间戳存储格式
pub const TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// 配置 SQLite 连接的统一 PRAGMA
///
/// foreign_keys / busy_timeout 需要"每个连接"单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 建表 (幂等)
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS orders (
            order_id TEXT PRIMARY KEY,
            order_no TEXT NOT NULL UNIQUE,
            quantity INTEGER NOT NULL CHECK (quantity > 0),
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS process (
            process_id TEXT PRIMARY KEY,
            order_id TEXT NOT NULL REFERENCES orders(order_id),
            name TEXT NOT NULL,
            seq_no INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS process_run (
            run_id TEXT PRIMARY KEY,
            process_id TEXT NOT NULL REFERENCES process(process_id),
            run_number INTEGER NOT NULL,
            process_kind TEXT NOT NULL,
            values_json TEXT NOT NULL DEFAULT '{}',
            images_json TEXT NOT NULL DEFAULT '[]',
            executor_id TEXT,
            reviewer_id TEXT,
            location_id TEXT,
            config_status TEXT NOT NULL DEFAULT 'PENDING',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE (process_id, run_number)
        );

        CREATE TABLE IF NOT EXISTS billing_context (
            context_id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            created_by TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            revision INTEGER NOT NULL DEFAULT 0,
            latest_result REAL,
            latest_is_draft INTEGER,
            latest_created_at TEXT
        );

        CREATE TABLE IF NOT EXISTS billing_context_order (
            context_id TEXT NOT NULL REFERENCES billing_context(context_id),
            order_id TEXT NOT NULL REFERENCES orders(order_id),
            seq_no INTEGER NOT NULL,
            PRIMARY KEY (context_id, order_id)
        );

        CREATE TABLE IF NOT EXISTS billing_snapshot (
            snapshot_id TEXT NOT NULL UNIQUE,
            context_id TEXT NOT NULL REFERENCES billing_context(context_id),
            order_id TEXT NOT NULL REFERENCES orders(order_id),
            result REAL NOT NULL,
            inputs_json TEXT NOT NULL,
            is_draft INTEGER NOT NULL,
            created_at TEXT NOT NULL,
            PRIMARY KEY (context_id, order_id)
        );

        CREATE TABLE IF NOT EXISTS action_log (
            action_id TEXT PRIMARY KEY,
            target_id TEXT,
            action_type TEXT NOT NULL,
            action_ts TEXT NOT NULL,
            actor TEXT NOT NULL,
            payload_json TEXT,
            detail TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_action_log_target ON action_log(target_id);

        CREATE TABLE IF NOT EXISTS config_kv (
            scope_id TEXT NOT NULL,
            key TEXT NOT NULL,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (scope_id, key)
        );
        "#,
    )?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [CURRENT_SCHEMA_VERSION],
    )?;
    Ok(())
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> = conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}
