// ==========================================
// 需求供应规划系统 - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为
// - 统一 busy_timeout，减少多批次并发写入时的偶发 busy 错误
// - 集中维护建表语句（原始单元格、批次、四类派生记录、配置）
// ==========================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要“每个连接”单独开启
/// - busy_timeout 需要“每个连接”单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let mut conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    crate::perf::install_sqlite_tracing(&mut conn);
    Ok(conn)
}

/// 默认数据库路径
///
/// 优先级: SUPPLY_PLANNER_DB_PATH > 用户本地数据目录 > 当前目录
pub fn default_db_path() -> String {
    use std::path::PathBuf;

    if let Ok(path) = std::env::var("SUPPLY_PLANNER_DB_PATH") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./supply_planner.db");
    if let Some(data_dir) = dirs::data_local_dir() {
        let dir = data_dir.join("supply-planner");
        // 目录创建失败时回退到当前目录
        if std::fs::create_dir_all(&dir).is_ok() {
            path = dir.join("supply_planner.db");
        }
    }

    path.to_string_lossy().to_string()
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

/// 初始化全部表结构（幂等）
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;
    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [CURRENT_SCHEMA_VERSION],
    )?;
    Ok(())
}

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS config_kv (
    scope_id TEXT NOT NULL,
    key TEXT NOT NULL,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (scope_id, key)
);

-- 外部导入写入的原始单元格（管道只读）
CREATE TABLE IF NOT EXISTS raw_cell (
    upload_batch_id TEXT NOT NULL,
    workbook TEXT NOT NULL DEFAULT '',
    sheet_name TEXT NOT NULL,
    row_index INTEGER NOT NULL,
    col_index INTEGER NOT NULL,
    column_name TEXT NOT NULL,
    cell_value TEXT,
    PRIMARY KEY (upload_batch_id, sheet_name, row_index, col_index)
);

CREATE TABLE IF NOT EXISTS upload_batch (
    batch_id TEXT PRIMARY KEY,
    status TEXT NOT NULL,
    current_stage TEXT,
    error_message TEXT,
    demand_count INTEGER NOT NULL DEFAULT 0,
    supply_count INTEGER NOT NULL DEFAULT 0,
    distribution_count INTEGER NOT NULL DEFAULT 0,
    balance_count INTEGER NOT NULL DEFAULT 0,
    data_gap_count INTEGER NOT NULL DEFAULT 0,
    config_snapshot_json TEXT,
    started_at TEXT NOT NULL,
    finished_at TEXT
);

CREATE TABLE IF NOT EXISTS demand_record (
    upload_batch_id TEXT NOT NULL,
    ordinal INTEGER NOT NULL,
    country TEXT NOT NULL,
    sku TEXT NOT NULL,
    month INTEGER NOT NULL,
    demand_cases REAL NOT NULL,
    market_class TEXT NOT NULL,
    production_environment TEXT NOT NULL,
    safety_stock_warehouse TEXT NOT NULL,
    inventory_days_norm REAL NOT NULL,
    supply_reference_json TEXT,
    consumption_formula_json TEXT,
    PRIMARY KEY (upload_batch_id, country, sku, month)
);

CREATE TABLE IF NOT EXISTS supply_record (
    upload_batch_id TEXT NOT NULL,
    ordinal INTEGER NOT NULL,
    country TEXT NOT NULL,
    sku TEXT NOT NULL,
    month INTEGER NOT NULL,
    warehouse TEXT NOT NULL,
    transport_cost REAL NOT NULL,
    max_capacity REAL,
    weight_per_unit REAL NOT NULL,
    qty REAL NOT NULL DEFAULT 0,
    wt REAL NOT NULL DEFAULT 0,
    position_ok INTEGER NOT NULL,
    qty_within_max INTEGER NOT NULL,
    PRIMARY KEY (upload_batch_id, country, sku, month, warehouse)
);

CREATE TABLE IF NOT EXISTS distribution_record (
    upload_batch_id TEXT NOT NULL,
    ordinal INTEGER NOT NULL,
    warehouse TEXT NOT NULL,
    factory TEXT NOT NULL,
    country TEXT NOT NULL,
    sku TEXT NOT NULL,
    month INTEGER NOT NULL,
    cost_rule TEXT NOT NULL,
    cost_per_unit REAL NOT NULL,
    custom_cost_per_unit REAL,
    max_qty REAL NOT NULL,
    weight_per_unit REAL NOT NULL,
    qty REAL NOT NULL DEFAULT 0,
    wt REAL NOT NULL DEFAULT 0,
    row_cost REAL NOT NULL DEFAULT 0,
    PRIMARY KEY (upload_batch_id, warehouse, factory, country, sku, month)
);

CREATE TABLE IF NOT EXISTS warehouse_balance_record (
    upload_batch_id TEXT NOT NULL,
    ordinal INTEGER NOT NULL,
    warehouse TEXT NOT NULL,
    sku TEXT NOT NULL,
    month INTEGER NOT NULL,
    opening_stock REAL NOT NULL,
    inbound REAL NOT NULL,
    outbound REAL NOT NULL,
    closing_stock REAL NOT NULL,
    max_supply REAL NOT NULL,
    storage_cost REAL NOT NULL,
    opening_within_bounds INTEGER NOT NULL,
    closing_within_bounds INTEGER NOT NULL,
    PRIMARY KEY (upload_batch_id, warehouse, sku, month)
);

CREATE TABLE IF NOT EXISTS sku_month_storage (
    upload_batch_id TEXT NOT NULL,
    sku TEXT NOT NULL,
    month INTEGER NOT NULL,
    total_opening REAL NOT NULL,
    total_closing REAL NOT NULL,
    average_stock REAL NOT NULL,
    storage_cost REAL NOT NULL,
    PRIMARY KEY (upload_batch_id, sku, month)
);

CREATE INDEX IF NOT EXISTS idx_demand_record_ordinal ON demand_record (upload_batch_id, ordinal);
CREATE INDEX IF NOT EXISTS idx_supply_record_ordinal ON supply_record (upload_batch_id, ordinal);
CREATE INDEX IF NOT EXISTS idx_distribution_record_ordinal ON distribution_record (upload_batch_id, ordinal);
CREATE INDEX IF NOT EXISTS idx_balance_record_ordinal ON warehouse_balance_record (upload_batch_id, ordinal);
"#;
