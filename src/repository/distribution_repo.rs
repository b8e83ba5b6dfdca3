// ==========================================
// 需求供应规划系统 - 一级调拨仓储
// ==========================================
// 编辑接口: 计划量、人工单价；row_cost 始终由领域模型重算后落库
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::distribution::DistributionRecord;
use crate::domain::types::CostRule;
use crate::repository::bulk::insert_chunked;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::row_codec::{int, opt_real, real, text, warehouse_column};
use rusqlite::types::Value;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

const DISTRIBUTION_COLUMNS: [&str; 15] = [
    "upload_batch_id",
    "ordinal",
    "warehouse",
    "factory",
    "country",
    "sku",
    "month",
    "cost_rule",
    "cost_per_unit",
    "custom_cost_per_unit",
    "max_qty",
    "weight_per_unit",
    "qty",
    "wt",
    "row_cost",
];

const SELECT_DISTRIBUTION: &str = r#"
    SELECT upload_batch_id, ordinal, warehouse, factory, country, sku, month,
           cost_rule, cost_per_unit, custom_cost_per_unit, max_qty,
           weight_per_unit, qty, wt, row_cost
    FROM distribution_record
"#;

pub struct DistributionRecordRepository {
    conn: Arc<Mutex<Connection>>,
}

impl DistributionRecordRepository {
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

    pub fn insert_batch(
        &self,
        records: &[DistributionRecord],
        chunk_rows: usize,
    ) -> RepositoryResult<usize> {
        let rows: Vec<Vec<Value>> = records
            .iter()
            .map(|r| {
                vec![
                    text(&r.upload_batch_id),
                    int(r.ordinal),
                    text(r.warehouse.to_db_str()),
                    text(&r.factory),
                    text(&r.country),
                    text(&r.sku),
                    Value::Integer(r.month as i64),
                    text(r.cost_rule.to_db_str()),
                    real(r.cost_per_unit),
                    opt_real(r.custom_cost_per_unit),
                    real(r.max_qty),
                    real(r.weight_per_unit),
                    real(r.qty),
                    real(r.wt),
                    real(r.row_cost),
                ]
            })
            .collect();

        let conn = self.get_conn()?;
        insert_chunked(
            &conn,
            "distribution_record",
            &DISTRIBUTION_COLUMNS,
            rows,
            chunk_rows,
        )
    }

    pub fn find_by_batch(&self, batch_id: &str) -> RepositoryResult<Vec<DistributionRecord>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "{} WHERE upload_batch_id = ?1 ORDER BY ordinal",
            SELECT_DISTRIBUTION
        ))?;
        let records = stmt
            .query_map(params![batch_id], map_distribution_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    pub fn find_by_ordinal(
        &self,
        batch_id: &str,
        ordinal: usize,
    ) -> RepositoryResult<Option<DistributionRecord>> {
        let conn = self.get_conn()?;
        let record = conn
            .query_row(
                &format!(
                    "{} WHERE upload_batch_id = ?1 AND ordinal = ?2",
                    SELECT_DISTRIBUTION
                ),
                params![batch_id, ordinal as i64],
                map_distribution_row,
            )
            .optional()?;
        Ok(record)
    }

    /// 编辑计划量（不得超过工厂产能上限）
    pub fn update_qty(
        &self,
        batch_id: &str,
        ordinal: usize,
        qty: f64,
    ) -> RepositoryResult<DistributionRecord> {
        let mut record = self.require(batch_id, ordinal)?;
        if !qty.is_finite() || qty < 0.0 || qty > record.max_qty {
            return Err(RepositoryError::FieldValueError {
                field: "qty".to_string(),
                message: format!("计划量 {} 超出范围 [0, {}]", qty, record.max_qty),
            });
        }
        record.qty = qty;
        record.recompute();
        self.write_editable(&record)?;
        Ok(record)
    }

    /// 设置（或清除）人工单价；原始 cost_per_unit 保留
    pub fn set_custom_cost(
        &self,
        batch_id: &str,
        ordinal: usize,
        custom_cost: Option<f64>,
    ) -> RepositoryResult<DistributionRecord> {
        let mut record = self.require(batch_id, ordinal)?;
        if let Some(cost) = custom_cost {
            if !cost.is_finite() || cost < 0.0 {
                return Err(RepositoryError::FieldValueError {
                    field: "custom_cost_per_unit".to_string(),
                    message: format!("人工单价必须为非负数: {}", cost),
                });
            }
        }
        record.custom_cost_per_unit = custom_cost;
        record.recompute();
        self.write_editable(&record)?;
        Ok(record)
    }

    fn require(&self, batch_id: &str, ordinal: usize) -> RepositoryResult<DistributionRecord> {
        self.find_by_ordinal(batch_id, ordinal)?
            .ok_or_else(|| RepositoryError::NotFound {
                entity: "DistributionRecord".to_string(),
                key: format!("{}#{}", batch_id, ordinal),
            })
    }

    fn write_editable(&self, record: &DistributionRecord) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            UPDATE distribution_record
            SET qty = ?1, wt = ?2, row_cost = ?3, custom_cost_per_unit = ?4
            WHERE upload_batch_id = ?5 AND ordinal = ?6
            "#,
            params![
                record.qty,
                record.wt,
                record.row_cost,
                record.custom_cost_per_unit,
                record.upload_batch_id,
                record.ordinal as i64
            ],
        )?;
        Ok(())
    }

    pub fn count_by_batch(&self, batch_id: &str) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM distribution_record WHERE upload_batch_id = ?1",
            params![batch_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

fn map_distribution_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<DistributionRecord> {
    Ok(DistributionRecord {
        upload_batch_id: row.get(0)?,
        ordinal: row.get::<_, i64>(1)? as usize,
        warehouse: warehouse_column(2, row.get(2)?)?,
        factory: row.get(3)?,
        country: row.get(4)?,
        sku: row.get(5)?,
        month: row.get::<_, i64>(6)? as u32,
        cost_rule: CostRule::from_db_str(&row.get::<_, String>(7)?),
        cost_per_unit: row.get(8)?,
        custom_cost_per_unit: row.get(9)?,
        max_qty: row.get(10)?,
        weight_per_unit: row.get(11)?,
        qty: row.get(12)?,
        wt: row.get(13)?,
        row_cost: row.get(14)?,
    })
}
