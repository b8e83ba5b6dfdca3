// ==========================================
// 需求供应规划系统 - 上传批次仓储
// ==========================================
// 职责: upload_batch 状态流转 + 批次派生数据清理
// 状态: RUNNING → COMPLETED | FAILED
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::batch::{PipelineRunSummary, UploadBatch};
use crate::domain::types::{BatchStatus, StageName};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

/// 批次派生数据表（重跑前整体清空）
const OUTPUT_TABLES: [&str; 5] = [
    "demand_record",
    "supply_record",
    "distribution_record",
    "warehouse_balance_record",
    "sku_month_storage",
];

pub struct UploadBatchRepository {
    conn: Arc<Mutex<Connection>>,
}

impl UploadBatchRepository {
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

    /// 开始（或重新开始）一个批次
    pub fn begin(&self, batch_id: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO upload_batch (
                batch_id, status, current_stage, error_message,
                demand_count, supply_count, distribution_count, balance_count, data_gap_count,
                config_snapshot_json, started_at, finished_at
            ) VALUES (?1, ?2, NULL, NULL, 0, 0, 0, 0, 0, NULL, ?3, NULL)
            ON CONFLICT(batch_id) DO UPDATE SET
                status = excluded.status,
                current_stage = NULL,
                error_message = NULL,
                demand_count = 0,
                supply_count = 0,
                distribution_count = 0,
                balance_count = 0,
                data_gap_count = 0,
                config_snapshot_json = NULL,
                started_at = excluded.started_at,
                finished_at = NULL
            "#,
            params![
                batch_id,
                BatchStatus::Running.to_db_str(),
                Utc::now().to_rfc3339()
            ],
        )?;
        Ok(())
    }

    /// 记录本次运行生效的配置快照
    pub fn set_config_snapshot(&self, batch_id: &str, snapshot_json: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "UPDATE upload_batch SET config_snapshot_json = ?1 WHERE batch_id = ?2",
            params![snapshot_json, batch_id],
        )?;
        Ok(())
    }

    pub fn config_snapshot(&self, batch_id: &str) -> RepositoryResult<Option<String>> {
        let conn = self.get_conn()?;
        let snapshot = conn
            .query_row(
                "SELECT config_snapshot_json FROM upload_batch WHERE batch_id = ?1",
                params![batch_id],
                |row| row.get::<_, Option<String>>(0),
            )
            .optional()?;
        Ok(snapshot.flatten())
    }

    pub fn update_stage(&self, batch_id: &str, stage: StageName) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            "UPDATE upload_batch SET current_stage = ?1 WHERE batch_id = ?2",
            params![stage.to_db_str(), batch_id],
        )?;
        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "UploadBatch".to_string(),
                key: batch_id.to_string(),
            });
        }
        Ok(())
    }

    /// 标记完成并写入计数
    pub fn complete(&self, summary: &PipelineRunSummary) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            UPDATE upload_batch SET
                status = ?1,
                error_message = NULL,
                demand_count = ?2,
                supply_count = ?3,
                distribution_count = ?4,
                balance_count = ?5,
                data_gap_count = ?6,
                finished_at = ?7
            WHERE batch_id = ?8
            "#,
            params![
                BatchStatus::Completed.to_db_str(),
                summary.demand_count as i64,
                summary.supply_count as i64,
                summary.distribution_count as i64,
                summary.balance_count as i64,
                summary.data_gaps.len() as i64,
                Utc::now().to_rfc3339(),
                summary.batch_id
            ],
        )?;
        Ok(())
    }

    /// 标记失败（记录失败阶段、原因与失败前已收集的数据缺口数）
    pub fn fail(
        &self,
        batch_id: &str,
        stage: StageName,
        message: &str,
        data_gap_count: usize,
    ) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            UPDATE upload_batch SET
                status = ?1, current_stage = ?2, error_message = ?3,
                data_gap_count = ?4, finished_at = ?5
            WHERE batch_id = ?6
            "#,
            params![
                BatchStatus::Failed.to_db_str(),
                stage.to_db_str(),
                message,
                data_gap_count as i64,
                Utc::now().to_rfc3339(),
                batch_id
            ],
        )?;
        Ok(())
    }

    /// 库存滚动单独重算后更新计数（状态保持不变）
    pub fn update_balance_count(&self, batch_id: &str, balance_count: usize) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            "UPDATE upload_batch SET balance_count = ?1, finished_at = ?2 WHERE batch_id = ?3",
            params![balance_count as i64, Utc::now().to_rfc3339(), batch_id],
        )?;
        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "UploadBatch".to_string(),
                key: batch_id.to_string(),
            });
        }
        Ok(())
    }

    pub fn find(&self, batch_id: &str) -> RepositoryResult<Option<UploadBatch>> {
        let conn = self.get_conn()?;
        let batch = conn
            .query_row(
                r#"
                SELECT batch_id, status, current_stage, error_message,
                       demand_count, supply_count, distribution_count, balance_count,
                       data_gap_count, started_at, finished_at
                FROM upload_batch
                WHERE batch_id = ?1
                "#,
                params![batch_id],
                |row| {
                    let stage: Option<String> = row.get(2)?;
                    Ok(UploadBatch {
                        batch_id: row.get(0)?,
                        status: BatchStatus::from_db_str(&row.get::<_, String>(1)?),
                        current_stage: stage.as_deref().and_then(stage_from_db_str),
                        error_message: row.get(3)?,
                        demand_count: row.get::<_, i64>(4)? as usize,
                        supply_count: row.get::<_, i64>(5)? as usize,
                        distribution_count: row.get::<_, i64>(6)? as usize,
                        balance_count: row.get::<_, i64>(7)? as usize,
                        data_gap_count: row.get::<_, i64>(8)? as usize,
                        started_at: parse_timestamp(&row.get::<_, String>(9)?),
                        finished_at: row
                            .get::<_, Option<String>>(10)?
                            .map(|s| parse_timestamp(&s)),
                    })
                },
            )
            .optional()?;
        Ok(batch)
    }

    /// 清空批次全部派生数据（单事务）
    pub fn clear_batch_outputs(&self, batch_id: &str) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;
        let mut removed = 0;
        for table in OUTPUT_TABLES {
            removed += tx.execute(
                &format!("DELETE FROM {} WHERE upload_batch_id = ?1", table),
                params![batch_id],
            )?;
        }
        tx.commit()?;
        Ok(removed)
    }
}

fn stage_from_db_str(s: &str) -> Option<StageName> {
    [
        StageName::LoadInputs,
        StageName::DemandNormalize,
        StageName::SupplyExpand,
        StageName::CrossReference,
        StageName::DistributionCost,
        StageName::WarehouseBalance,
    ]
    .into_iter()
    .find(|stage| stage.to_db_str() == s)
}

fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_default()
}
