// ==========================================
// 需求供应规划系统 - 管道配置
// ==========================================
// 职责: 一次运行所需的全部配置（不可变，入口构建后显式传递）
// ==========================================

use crate::domain::lookup::normalize_key;
use crate::domain::types::{StorageCostVariant, WarehouseCode};
use serde::{Deserialize, Serialize};

/// 批量写入默认每块行数
pub const DEFAULT_INSERT_CHUNK_ROWS: usize = 500;

// ==========================================
// WarehouseSite - 实体仓库站点
// ==========================================
// home_country: 仓库所在国（同国发运零运费）
// colocated_factory: 同址工厂（站内调拨零运费）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WarehouseSite {
    pub warehouse: WarehouseCode,
    pub home_country: String,
    pub colocated_factory: String,
}

// ==========================================
// PipelineConfig
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub warehouse_sites: Vec<WarehouseSite>,
    pub home_countries: Vec<String>,

    // ===== 调拨资格 =====
    pub opening_stock_days_filter: bool, // 期初库存天数过滤（默认关闭）
    pub strict_freight_rates: bool,      // 运价缺失视为致命错误

    // ===== 仓储成本 =====
    pub unit_storage_cost: f64,
    pub storage_cost_variant: StorageCostVariant,

    // ===== 库存边界（仅用于建议性标记） =====
    pub stock_floor: f64,
    pub stock_ceiling: Option<f64>,

    // ===== 持久化 =====
    pub insert_chunk_rows: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let warehouse_sites = default_warehouse_sites();
        let home_countries = warehouse_sites.iter().map(|s| s.home_country.clone()).collect();
        Self {
            warehouse_sites,
            home_countries,
            opening_stock_days_filter: false,
            strict_freight_rates: false,
            unit_storage_cost: 1.0,
            storage_cost_variant: StorageCostVariant::Standard,
            stock_floor: 0.0,
            stock_ceiling: None,
            insert_chunk_rows: DEFAULT_INSERT_CHUNK_ROWS,
        }
    }
}

/// 默认站点: A=KSA/F1, B=UAE/F2, C=EGY/F3
pub fn default_warehouse_sites() -> Vec<WarehouseSite> {
    vec![
        WarehouseSite {
            warehouse: WarehouseCode::A,
            home_country: "KSA".to_string(),
            colocated_factory: "F1".to_string(),
        },
        WarehouseSite {
            warehouse: WarehouseCode::B,
            home_country: "UAE".to_string(),
            colocated_factory: "F2".to_string(),
        },
        WarehouseSite {
            warehouse: WarehouseCode::C,
            home_country: "EGY".to_string(),
            colocated_factory: "F3".to_string(),
        },
    ]
}

impl PipelineConfig {
    /// 实体仓库站点（虚拟仓无站点）
    pub fn site(&self, warehouse: WarehouseCode) -> Option<&WarehouseSite> {
        self.warehouse_sites.iter().find(|s| s.warehouse == warehouse)
    }

    pub fn is_home_country(&self, country: &str) -> bool {
        let country = normalize_key(country);
        self.home_countries
            .iter()
            .any(|c| normalize_key(c) == country)
    }

    /// 国家对应的安全库存仓库（无则虚拟仓）
    pub fn home_warehouse(&self, country: &str) -> WarehouseCode {
        let country = normalize_key(country);
        self.warehouse_sites
            .iter()
            .find(|s| normalize_key(&s.home_country) == country)
            .map(|s| s.warehouse)
            .unwrap_or(WarehouseCode::Placeholder)
    }

    /// 库存值是否在 [floor, ceiling] 内
    pub fn within_bounds(&self, stock: f64) -> bool {
        stock >= self.stock_floor && self.stock_ceiling.map(|c| stock <= c).unwrap_or(true)
    }

    /// 单位仓储成本（已乘口径系数）
    pub fn effective_unit_storage_cost(&self) -> f64 {
        self.unit_storage_cost * self.storage_cost_variant.factor()
    }
}
