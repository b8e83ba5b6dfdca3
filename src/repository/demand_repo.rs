// ==========================================
// 需求供应规划系统 - 需求记录仓储
// ==========================================
// 红线: 读取一律 ORDER BY ordinal，下游序号引用依赖稳定顺序
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::demand::DemandRecord;
use crate::domain::reference::{ConsumptionFormula, SupplyReference};
use crate::domain::types::{MarketClass, ProductionEnvironment};
use crate::repository::bulk::insert_chunked;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::row_codec::{int, json_column, json_value, real, text, warehouse_column};
use rusqlite::types::Value;
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};

const DEMAND_COLUMNS: [&str; 12] = [
    "upload_batch_id",
    "ordinal",
    "country",
    "sku",
    "month",
    "demand_cases",
    "market_class",
    "production_environment",
    "safety_stock_warehouse",
    "inventory_days_norm",
    "supply_reference_json",
    "consumption_formula_json",
];

pub struct DemandRecordRepository {
    conn: Arc<Mutex<Connection>>,
}

impl DemandRecordRepository {
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

    /// 批量写入需求记录
    ///
    /// # 返回
    /// - Ok(usize): 写入行数
    pub fn insert_batch(&self, records: &[DemandRecord], chunk_rows: usize) -> RepositoryResult<usize> {
        let rows = records
            .iter()
            .map(|r| -> Result<Vec<Value>, serde_json::Error> {
                Ok(vec![
                    text(&r.upload_batch_id),
                    int(r.ordinal),
                    text(&r.country),
                    text(&r.sku),
                    Value::Integer(r.month as i64),
                    real(r.demand_cases),
                    text(r.market_class.to_db_str()),
                    text(r.production_environment.to_db_str()),
                    text(r.safety_stock_warehouse.to_db_str()),
                    real(r.inventory_days_norm),
                    json_value(r.supply_reference.as_ref())?,
                    json_value(r.consumption_formula.as_ref())?,
                ])
            })
            .collect::<Result<Vec<_>, _>>()?;

        let conn = self.get_conn()?;
        insert_chunked(&conn, "demand_record", &DEMAND_COLUMNS, rows, chunk_rows)
    }

    pub fn find_by_batch(&self, batch_id: &str) -> RepositoryResult<Vec<DemandRecord>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT upload_batch_id, ordinal, country, sku, month, demand_cases,
                   market_class, production_environment, safety_stock_warehouse,
                   inventory_days_norm, supply_reference_json, consumption_formula_json
            FROM demand_record
            WHERE upload_batch_id = ?1
            ORDER BY ordinal
            "#,
        )?;

        let records = stmt
            .query_map(params![batch_id], |row| {
                Ok(DemandRecord {
                    upload_batch_id: row.get(0)?,
                    ordinal: row.get::<_, i64>(1)? as usize,
                    country: row.get(2)?,
                    sku: row.get(3)?,
                    month: row.get::<_, i64>(4)? as u32,
                    demand_cases: row.get(5)?,
                    market_class: MarketClass::from_db_str(&row.get::<_, String>(6)?),
                    production_environment: ProductionEnvironment::from_db_str(
                        &row.get::<_, String>(7)?,
                    ),
                    safety_stock_warehouse: warehouse_column(8, row.get(8)?)?,
                    inventory_days_norm: row.get(9)?,
                    supply_reference: json_column(10, row.get(10)?)?,
                    consumption_formula: json_column(11, row.get(11)?)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    /// 回填交叉引用（单事务）
    pub fn update_references(
        &self,
        batch_id: &str,
        references: &[(usize, SupplyReference, ConsumptionFormula)],
    ) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;
        let mut updated = 0;
        {
            let mut stmt = tx.prepare(
                r#"
                UPDATE demand_record
                SET supply_reference_json = ?1, consumption_formula_json = ?2
                WHERE upload_batch_id = ?3 AND ordinal = ?4
                "#,
            )?;
            for (ordinal, supply_ref, formula) in references {
                updated += stmt.execute(params![
                    serde_json::to_string(supply_ref)?,
                    serde_json::to_string(formula)?,
                    batch_id,
                    *ordinal as i64
                ])?;
            }
        }
        tx.commit()?;
        Ok(updated)
    }

    pub fn count_by_batch(&self, batch_id: &str) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM demand_record WHERE upload_batch_id = ?1",
            params![batch_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}
