// ==========================================
// 需求供应规划系统 - 仓库库存滚动仓储
// ==========================================
// 表: warehouse_balance_record（逐仓逐月）、sku_month_storage（SKU × 月汇总）
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::balance::{SkuMonthStorage, WarehouseBalanceRecord};
use crate::repository::bulk::insert_chunked;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::row_codec::{flag, int, real, text, warehouse_column};
use rusqlite::types::Value;
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};

const BALANCE_COLUMNS: [&str; 13] = [
    "upload_batch_id",
    "ordinal",
    "warehouse",
    "sku",
    "month",
    "opening_stock",
    "inbound",
    "outbound",
    "closing_stock",
    "max_supply",
    "storage_cost",
    "opening_within_bounds",
    "closing_within_bounds",
];

const STORAGE_COLUMNS: [&str; 7] = [
    "upload_batch_id",
    "sku",
    "month",
    "total_opening",
    "total_closing",
    "average_stock",
    "storage_cost",
];

pub struct WarehouseBalanceRepository {
    conn: Arc<Mutex<Connection>>,
}

impl WarehouseBalanceRepository {
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

    pub fn insert_balances(
        &self,
        records: &[WarehouseBalanceRecord],
        chunk_rows: usize,
    ) -> RepositoryResult<usize> {
        let rows: Vec<Vec<Value>> = records
            .iter()
            .map(|r| {
                vec![
                    text(&r.upload_batch_id),
                    int(r.ordinal),
                    text(r.warehouse.to_db_str()),
                    text(&r.sku),
                    Value::Integer(r.month as i64),
                    real(r.opening_stock),
                    real(r.inbound),
                    real(r.outbound),
                    real(r.closing_stock),
                    real(r.max_supply),
                    real(r.storage_cost),
                    flag(r.opening_within_bounds),
                    flag(r.closing_within_bounds),
                ]
            })
            .collect();

        let conn = self.get_conn()?;
        insert_chunked(
            &conn,
            "warehouse_balance_record",
            &BALANCE_COLUMNS,
            rows,
            chunk_rows,
        )
    }

    pub fn insert_storage(
        &self,
        summaries: &[SkuMonthStorage],
        chunk_rows: usize,
    ) -> RepositoryResult<usize> {
        let rows: Vec<Vec<Value>> = summaries
            .iter()
            .map(|s| {
                vec![
                    text(&s.upload_batch_id),
                    text(&s.sku),
                    Value::Integer(s.month as i64),
                    real(s.total_opening),
                    real(s.total_closing),
                    real(s.average_stock),
                    real(s.storage_cost),
                ]
            })
            .collect();

        let conn = self.get_conn()?;
        insert_chunked(&conn, "sku_month_storage", &STORAGE_COLUMNS, rows, chunk_rows)
    }

    pub fn find_balances_by_batch(
        &self,
        batch_id: &str,
    ) -> RepositoryResult<Vec<WarehouseBalanceRecord>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT upload_batch_id, ordinal, warehouse, sku, month,
                   opening_stock, inbound, outbound, closing_stock,
                   max_supply, storage_cost, opening_within_bounds, closing_within_bounds
            FROM warehouse_balance_record
            WHERE upload_batch_id = ?1
            ORDER BY ordinal
            "#,
        )?;

        let records = stmt
            .query_map(params![batch_id], |row| {
                Ok(WarehouseBalanceRecord {
                    upload_batch_id: row.get(0)?,
                    ordinal: row.get::<_, i64>(1)? as usize,
                    warehouse: warehouse_column(2, row.get(2)?)?,
                    sku: row.get(3)?,
                    month: row.get::<_, i64>(4)? as u32,
                    opening_stock: row.get(5)?,
                    inbound: row.get(6)?,
                    outbound: row.get(7)?,
                    closing_stock: row.get(8)?,
                    max_supply: row.get(9)?,
                    storage_cost: row.get(10)?,
                    opening_within_bounds: row.get::<_, i64>(11)? != 0,
                    closing_within_bounds: row.get::<_, i64>(12)? != 0,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    pub fn find_storage_by_batch(&self, batch_id: &str) -> RepositoryResult<Vec<SkuMonthStorage>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT upload_batch_id, sku, month, total_opening, total_closing,
                   average_stock, storage_cost
            FROM sku_month_storage
            WHERE upload_batch_id = ?1
            ORDER BY sku, month
            "#,
        )?;

        let summaries = stmt
            .query_map(params![batch_id], |row| {
                Ok(SkuMonthStorage {
                    upload_batch_id: row.get(0)?,
                    sku: row.get(1)?,
                    month: row.get::<_, i64>(2)? as u32,
                    total_opening: row.get(3)?,
                    total_closing: row.get(4)?,
                    average_stock: row.get(5)?,
                    storage_cost: row.get(6)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(summaries)
    }

    pub fn count_by_batch(&self, batch_id: &str) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM warehouse_balance_record WHERE upload_batch_id = ?1",
            params![batch_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    pub fn delete_by_batch(&self, batch_id: &str) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;
        let mut removed = tx.execute(
            "DELETE FROM warehouse_balance_record WHERE upload_batch_id = ?1",
            params![batch_id],
        )?;
        removed += tx.execute(
            "DELETE FROM sku_month_storage WHERE upload_batch_id = ?1",
            params![batch_id],
        )?;
        tx.commit()?;
        Ok(removed)
    }
}
