// ==========================================
// 需求供应规划系统 - 引擎层仓储聚合
// ==========================================
// 职责: 聚合管道各阶段所需的 Repository
// ==========================================

use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::repository::{
    DemandRecordRepository, DistributionRecordRepository, SupplyRecordRepository,
    UploadBatchRepository, WarehouseBalanceRepository,
};

/// 管道仓储集合
///
/// # 包含的仓储
/// - `batch_repo`: 批次状态
/// - `demand_repo`: 阶段1 需求记录
/// - `supply_repo`: 阶段2 供应候选
/// - `distribution_repo`: 阶段3 调拨记录
/// - `balance_repo`: 阶段4 库存滚动与仓储汇总
#[derive(Clone)]
pub struct PipelineRepositories {
    pub batch_repo: Arc<UploadBatchRepository>,
    pub demand_repo: Arc<DemandRecordRepository>,
    pub supply_repo: Arc<SupplyRecordRepository>,
    pub distribution_repo: Arc<DistributionRecordRepository>,
    pub balance_repo: Arc<WarehouseBalanceRepository>,
}

impl PipelineRepositories {
    /// 全部仓储共享同一连接
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self {
            batch_repo: Arc::new(UploadBatchRepository::from_connection(conn.clone())),
            demand_repo: Arc::new(DemandRecordRepository::from_connection(conn.clone())),
            supply_repo: Arc::new(SupplyRecordRepository::from_connection(conn.clone())),
            distribution_repo: Arc::new(DistributionRecordRepository::from_connection(conn.clone())),
            balance_repo: Arc::new(WarehouseBalanceRepository::from_connection(conn)),
        }
    }
}
