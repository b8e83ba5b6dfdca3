// ==========================================
// 需求供应规划系统 - 仓库库存滚动领域模型
// ==========================================
// 阶段4 输出: (仓库, SKU, 月) 严格按月递增
// 红线: opening(m) == closing(m-1); closing 不截断（负值即不可行信号）
// ==========================================

use crate::domain::types::WarehouseCode;
use serde::{Deserialize, Serialize};

/// 单条库存链的一个月状态
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChainState {
    pub month: u32,
    pub opening_stock: f64,
    pub inbound: f64,
    pub outbound: f64,
    pub closing_stock: f64,
}

impl ChainState {
    pub fn average_stock(&self) -> f64 {
        (self.opening_stock + self.closing_stock) / 2.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WarehouseBalanceRecord {
    pub upload_batch_id: String,
    pub ordinal: usize,

    // ===== 主键 =====
    pub warehouse: WarehouseCode,
    pub sku: String,
    pub month: u32,

    // ===== 滚动 =====
    pub opening_stock: f64,
    pub inbound: f64,
    pub outbound: f64,
    pub closing_stock: f64,

    // ===== 约束与成本 =====
    pub max_supply: f64,
    pub storage_cost: f64,

    // ===== 建议性校验（不阻断） =====
    pub opening_within_bounds: bool,
    pub closing_within_bounds: bool,
}

/// SKU × 月 仓储汇总（四个仓库轨道合计）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkuMonthStorage {
    pub upload_batch_id: String,
    pub sku: String,
    pub month: u32,
    pub total_opening: f64,
    pub total_closing: f64,
    pub average_stock: f64,
    pub storage_cost: f64,
}
