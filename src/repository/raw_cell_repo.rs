// ==========================================
// 需求供应规划系统 - 原始单元格仓储
// ==========================================
// 红线: 管道只读 raw_cell；写入接口仅供外部导入方与测试使用
// ==========================================

use crate::db::open_sqlite_connection;
use crate::importer::cell_store::{CellStore, RawCell};
use crate::importer::error::{ImportError, ImportResult};
use crate::repository::bulk::insert_chunked;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::row_codec::{int, text};
use rusqlite::types::Value;
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};

const RAW_CELL_COLUMNS: [&str; 7] = [
    "upload_batch_id",
    "workbook",
    "sheet_name",
    "row_index",
    "col_index",
    "column_name",
    "cell_value",
];

/// 原始单元格仓储
pub struct RawCellRepository {
    conn: Arc<Mutex<Connection>>,
}

impl RawCellRepository {
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 写入一个工作表的单元格
    pub fn insert_cells(
        &self,
        batch_id: &str,
        sheet_name: &str,
        cells: &[RawCell],
        chunk_rows: usize,
    ) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let rows: Vec<Vec<Value>> = cells
            .iter()
            .map(|c| {
                vec![
                    text(batch_id),
                    text(&c.workbook),
                    text(sheet_name),
                    int(c.row_index),
                    int(c.col_index),
                    text(&c.column_name),
                    c.value.as_deref().map(text).unwrap_or(Value::Null),
                ]
            })
            .collect();
        insert_chunked(&conn, "raw_cell", &RAW_CELL_COLUMNS, rows, chunk_rows)
    }

    pub fn delete_by_batch(&self, batch_id: &str) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            "DELETE FROM raw_cell WHERE upload_batch_id = ?1",
            params![batch_id],
        )?;
        Ok(affected)
    }

    fn query_sheet(&self, batch_id: &str, sheet_name: &str) -> RepositoryResult<Vec<RawCell>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT workbook, row_index, col_index, column_name, cell_value
            FROM raw_cell
            WHERE upload_batch_id = ?1 AND sheet_name = ?2
            ORDER BY row_index, col_index
            "#,
        )?;

        let cells = stmt
            .query_map(params![batch_id, sheet_name], |row| {
                Ok(RawCell {
                    workbook: row.get(0)?,
                    row_index: row.get::<_, i64>(1)? as usize,
                    col_index: row.get::<_, i64>(2)? as usize,
                    column_name: row.get(3)?,
                    value: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(cells)
    }
}

impl CellStore for RawCellRepository {
    fn read_sheet(&self, batch_id: &str, sheet_name: &str) -> ImportResult<Vec<RawCell>> {
        self.query_sheet(batch_id, sheet_name)
            .map_err(|e| ImportError::CellStoreError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_schema;

    fn repo() -> RawCellRepository {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        RawCellRepository::from_connection(Arc::new(Mutex::new(conn)))
    }

    #[test]
    fn test_cells_are_scoped_by_batch_and_sheet() {
        let repo = repo();
        repo.insert_cells(
            "B1",
            "PRODUCT",
            &[RawCell::new(0, 0, "SKU", "SKU"), RawCell::new(1, 0, "SKU", "100")],
            500,
        )
        .unwrap();
        repo.insert_cells("B2", "PRODUCT", &[RawCell::new(0, 0, "SKU", "SKU")], 500)
            .unwrap();

        let cells = repo.read_sheet("B1", "PRODUCT").unwrap();
        assert_eq!(cells.len(), 2);
        assert_eq!(cells[1].value.as_deref(), Some("100"));
        assert!(repo.read_sheet("B1", "FREIGHT").unwrap().is_empty());

        assert_eq!(repo.delete_by_batch("B1").unwrap(), 2);
        assert!(repo.read_sheet("B1", "PRODUCT").unwrap().is_empty());
    }
}
