// ==========================================
// 需求供应规划系统 - 供应候选仓储
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::supply::SupplyRecord;
use crate::repository::bulk::insert_chunked;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::row_codec::{flag, int, opt_real, real, text, warehouse_column};
use rusqlite::types::Value;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

const SUPPLY_COLUMNS: [&str; 13] = [
    "upload_batch_id",
    "ordinal",
    "country",
    "sku",
    "month",
    "warehouse",
    "transport_cost",
    "max_capacity",
    "weight_per_unit",
    "qty",
    "wt",
    "position_ok",
    "qty_within_max",
];

const SELECT_SUPPLY: &str = r#"
    SELECT upload_batch_id, ordinal, country, sku, month, warehouse,
           transport_cost, max_capacity, weight_per_unit, qty, wt,
           position_ok, qty_within_max
    FROM supply_record
"#;

pub struct SupplyRecordRepository {
    conn: Arc<Mutex<Connection>>,
}

impl SupplyRecordRepository {
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

    pub fn insert_batch(&self, records: &[SupplyRecord], chunk_rows: usize) -> RepositoryResult<usize> {
        let rows: Vec<Vec<Value>> = records
            .iter()
            .map(|r| {
                vec![
                    text(&r.upload_batch_id),
                    int(r.ordinal),
                    text(&r.country),
                    text(&r.sku),
                    Value::Integer(r.month as i64),
                    text(r.warehouse.to_db_str()),
                    real(r.transport_cost),
                    opt_real(r.max_capacity),
                    real(r.weight_per_unit),
                    real(r.qty),
                    real(r.wt),
                    flag(r.position_ok),
                    flag(r.qty_within_max),
                ]
            })
            .collect();

        let conn = self.get_conn()?;
        insert_chunked(&conn, "supply_record", &SUPPLY_COLUMNS, rows, chunk_rows)
    }

    pub fn find_by_batch(&self, batch_id: &str) -> RepositoryResult<Vec<SupplyRecord>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "{} WHERE upload_batch_id = ?1 ORDER BY ordinal",
            SELECT_SUPPLY
        ))?;
        let records = stmt
            .query_map(params![batch_id], map_supply_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    pub fn find_by_ordinal(&self, batch_id: &str, ordinal: usize) -> RepositoryResult<Option<SupplyRecord>> {
        let conn = self.get_conn()?;
        let record = conn
            .query_row(
                &format!("{} WHERE upload_batch_id = ?1 AND ordinal = ?2", SELECT_SUPPLY),
                params![batch_id, ordinal as i64],
                map_supply_row,
            )
            .optional()?;
        Ok(record)
    }

    /// 人工编辑计划量（wt 与上限标记同步重算）
    pub fn update_qty(&self, batch_id: &str, ordinal: usize, qty: f64) -> RepositoryResult<SupplyRecord> {
        let mut record = self
            .find_by_ordinal(batch_id, ordinal)?
            .ok_or_else(|| RepositoryError::NotFound {
                entity: "SupplyRecord".to_string(),
                key: format!("{}#{}", batch_id, ordinal),
            })?;
        if !qty.is_finite() || qty < 0.0 {
            return Err(RepositoryError::FieldValueError {
                field: "qty".to_string(),
                message: format!("计划量必须为非负数: {}", qty),
            });
        }
        record.apply_qty(qty);

        let conn = self.get_conn()?;
        conn.execute(
            r#"
            UPDATE supply_record SET qty = ?1, wt = ?2, qty_within_max = ?3
            WHERE upload_batch_id = ?4 AND ordinal = ?5
            "#,
            params![record.qty, record.wt, record.qty_within_max, batch_id, ordinal as i64],
        )?;
        Ok(record)
    }

    pub fn count_by_batch(&self, batch_id: &str) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM supply_record WHERE upload_batch_id = ?1",
            params![batch_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

fn map_supply_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<SupplyRecord> {
    Ok(SupplyRecord {
        upload_batch_id: row.get(0)?,
        ordinal: row.get::<_, i64>(1)? as usize,
        country: row.get(2)?,
        sku: row.get(3)?,
        month: row.get::<_, i64>(4)? as u32,
        warehouse: warehouse_column(5, row.get(5)?)?,
        transport_cost: row.get(6)?,
        max_capacity: row.get(7)?,
        weight_per_unit: row.get(8)?,
        qty: row.get(9)?,
        wt: row.get(10)?,
        position_ok: row.get::<_, i64>(11)? != 0,
        qty_within_max: row.get::<_, i64>(12)? != 0,
    })
}
