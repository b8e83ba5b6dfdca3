// ==========================================
// 需求供应规划系统 - 分块批量写入
// ==========================================
// 分块只为绕开绑定参数上限与提升吞吐，不承担原子性:
// 每块独立事务，长批次在写入过程中可能部分可见
// ==========================================

use crate::repository::error::RepositoryResult;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection};

/// SQLite 单语句绑定参数上限（SQLITE_MAX_VARIABLE_NUMBER 默认值）
pub const SQLITE_MAX_PARAMS: usize = 32_766;

/// 计算每块行数：min(参数上限 / 列数, 配置上限)
pub fn rows_per_chunk(column_count: usize, configured_max_rows: usize) -> usize {
    let by_params = SQLITE_MAX_PARAMS / column_count.max(1);
    by_params.min(configured_max_rows).max(1)
}

/// 多行 INSERT，按块提交
///
/// # 参数
/// - table: 表名
/// - columns: 列名（顺序与每行取值一致）
/// - rows: 每行的取值
/// - max_rows: 每块最大行数
///
/// # 返回
/// - 写入总行数
pub fn insert_chunked(
    conn: &Connection,
    table: &str,
    columns: &[&str],
    rows: Vec<Vec<Value>>,
    max_rows: usize,
) -> RepositoryResult<usize> {
    if rows.is_empty() {
        return Ok(0);
    }

    let chunk_rows = rows_per_chunk(columns.len(), max_rows);
    let placeholder_row = format!("({})", vec!["?"; columns.len()].join(", "));
    let mut written = 0;

    for (chunk_idx, chunk) in rows.chunks(chunk_rows).enumerate() {
        let sql = format!(
            "INSERT INTO {} ({}) VALUES {}",
            table,
            columns.join(", "),
            vec![placeholder_row.as_str(); chunk.len()].join(", ")
        );

        let tx = conn.unchecked_transaction()?;
        let affected = tx.execute(&sql, params_from_iter(chunk.iter().flatten()))?;
        tx.commit()?;

        tracing::debug!(table, chunk = chunk_idx, rows = affected, "分块写入完成");
        written += affected;
    }

    Ok(written)
}
