// ==========================================
// 需求供应规划系统 - 一级调拨领域模型
// ==========================================
// 阶段3 输出: (仓库, 工厂, 国家, SKU, 月) 唯一
// 红线: 虚拟仓 / 同国 / 同址工厂 → cost_per_unit = 0
// ==========================================

use crate::domain::types::{CostRule, WarehouseCode};
use serde::{Deserialize, Serialize};

/// 调拨记录主键 (warehouse, factory, country, sku, month)
pub type DistributionKey = (WarehouseCode, String, String, String, u32);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionRecord {
    pub upload_batch_id: String,
    pub ordinal: usize,

    // ===== 主键 =====
    pub warehouse: WarehouseCode,
    pub factory: String,
    pub country: String,
    pub sku: String,
    pub month: u32,

    // ===== 运费 =====
    pub cost_rule: CostRule,
    pub cost_per_unit: f64,
    pub custom_cost_per_unit: Option<f64>, // 人工覆盖单价

    // ===== 约束与计划量 =====
    pub max_qty: f64,
    pub weight_per_unit: f64,
    pub qty: f64,
    pub wt: f64,
    pub row_cost: f64,
}

impl DistributionRecord {
    pub fn key(&self) -> DistributionKey {
        (
            self.warehouse,
            self.factory.clone(),
            self.country.clone(),
            self.sku.clone(),
            self.month,
        )
    }

    /// 生效单价：人工覆盖优先
    pub fn effective_cost(&self) -> f64 {
        self.custom_cost_per_unit.unwrap_or(self.cost_per_unit)
    }

    /// 重算派生字段 wt / row_cost
    pub fn recompute(&mut self) {
        self.wt = self.qty * self.weight_per_unit;
        self.row_cost = self.qty * self.effective_cost();
    }
}
