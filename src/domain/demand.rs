// ==========================================
// 需求供应规划系统 - 需求领域模型
// ==========================================
// 阶段1 输入: RawDemandRow（工作表原始行）
// 阶段1 输出: DemandRecord（国家 × SKU × 月，12 期稠密）
// ==========================================

use crate::domain::reference::{ConsumptionFormula, SupplyReference};
use crate::domain::types::{MarketClass, ProductionEnvironment, WarehouseCode};
use serde::{Deserialize, Serialize};

/// 需求记录主键 (country, sku, month)
pub type DemandKey = (String, String, u32);

// ==========================================
// RawDemandRow - 原始需求行
// ==========================================
// 月份和数值保留原文，由 DemandNormalizer 解析并记录数据缺口
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDemandRow {
    pub row_index: usize,
    pub geography: String,
    pub market: String,
    pub sku: String,
    pub month_raw: String,
    pub value_raw: String,
    pub classification: String,
    pub origin: String,
}

// ==========================================
// DemandRecord - 标准化需求
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemandRecord {
    // ===== 批次 =====
    pub upload_batch_id: String,
    pub ordinal: usize, // 批次内序号（1 起）

    // ===== 主键 =====
    pub country: String,
    pub sku: String,
    pub month: u32,

    // ===== 需求 =====
    pub demand_cases: f64, // Σ max(0, raw)

    // ===== 分类 =====
    pub market_class: MarketClass,
    pub production_environment: ProductionEnvironment,
    pub safety_stock_warehouse: WarehouseCode,
    pub inventory_days_norm: f64,

    // ===== 交叉引用（阶段2之后回填） =====
    pub supply_reference: Option<SupplyReference>,
    pub consumption_formula: Option<ConsumptionFormula>,
}

impl DemandRecord {
    pub fn key(&self) -> DemandKey {
        (self.country.clone(), self.sku.clone(), self.month)
    }
}
