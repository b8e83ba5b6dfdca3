// ==========================================
// 需求供应规划系统 - 供应候选领域模型
// ==========================================
// 阶段2 输出: 每条需求 × 4 个候选仓库
// qty / wt 初始为 0，仅由下游人工或后续修正写入
// ==========================================

use crate::domain::types::WarehouseCode;
use serde::{Deserialize, Serialize};

/// 供应记录主键 (country, sku, month, warehouse)
pub type SupplyKey = (String, String, u32, WarehouseCode);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupplyRecord {
    pub upload_batch_id: String,
    pub ordinal: usize,

    // ===== 主键 =====
    pub country: String,
    pub sku: String,
    pub month: u32,
    pub warehouse: WarehouseCode,

    // ===== 参数 =====
    pub transport_cost: f64,
    pub max_capacity: Option<f64>, // None = 无约束（虚拟仓）
    pub weight_per_unit: f64,

    // ===== 计划量（可编辑） =====
    pub qty: f64,
    pub wt: f64,

    // ===== 校验标记 =====
    pub position_ok: bool,
    pub qty_within_max: bool,
}

impl SupplyRecord {
    pub fn key(&self) -> SupplyKey {
        (self.country.clone(), self.sku.clone(), self.month, self.warehouse)
    }

    /// 写入计划量，并同步重量与上限标记
    pub fn apply_qty(&mut self, qty: f64) {
        self.qty = qty;
        self.wt = qty * self.weight_per_unit;
        self.qty_within_max = self.max_capacity.map(|max| qty <= max).unwrap_or(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(max_capacity: Option<f64>) -> SupplyRecord {
        SupplyRecord {
            upload_batch_id: "B1".to_string(),
            ordinal: 1,
            country: "KSA".to_string(),
            sku: "100".to_string(),
            month: 1,
            warehouse: WarehouseCode::A,
            transport_cost: 0.0,
            max_capacity,
            weight_per_unit: 2.5,
            qty: 0.0,
            wt: 0.0,
            position_ok: true,
            qty_within_max: true,
        }
    }

    #[test]
    fn test_apply_qty_updates_weight_and_flag() {
        let mut r = record(Some(10.0));
        r.apply_qty(12.0);
        assert_eq!(r.wt, 30.0);
        assert!(!r.qty_within_max);

        r.apply_qty(10.0);
        assert!(r.qty_within_max);
    }

    #[test]
    fn test_unconstrained_always_within_max() {
        let mut r = record(None);
        r.apply_qty(1_000_000.0);
        assert!(r.qty_within_max);
    }
}
