// ==========================================
// 需求供应规划系统 - 查找表领域模型
// ==========================================
// 职责: 国家映射、产能表、运价表、产品表、仓库库存表
// 约束: 管道入口一次性构建，之后只读，显式传入各阶段
// 约束: 复合键使用元组，不做字符串拼接
// ==========================================

use crate::domain::types::{ProductionEnvironment, WarehouseCode};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::warn;

/// 查找键标准化（TRIM + UPPER）
pub fn normalize_key(value: &str) -> String {
    value.trim().to_uppercase()
}

// ==========================================
// 输入行（由工作表映射而来）
// ==========================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountryMappingRow {
    pub geography: String,
    pub market: String,
    pub country_code: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentNormRow {
    pub sku: String,
    pub environment: ProductionEnvironment,
    pub inventory_days: f64,
    pub opening_stock_days: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactoryCapacityRow {
    pub sku: String,
    pub factory: String,
    pub monthly_capacity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FreightRateRow {
    pub factory: String,
    pub country: String,
    pub sku: String,
    pub rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRow {
    pub sku: String,
    pub weight_per_unit: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WarehouseStockRow {
    pub warehouse: WarehouseCode,
    pub sku: String,
    pub opening_stock: f64,
    pub monthly_capacity: f64,
}

// ==========================================
// CountryMapping - (原始国家名, 市场) → 国家代码
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct CountryMapping {
    entries: HashMap<(String, String), String>,
}

impl CountryMapping {
    /// 构建映射；同一 (geography, market) 重复时保留首条
    pub fn from_rows(rows: Vec<CountryMappingRow>) -> Self {
        let mut entries = HashMap::new();
        for row in rows {
            let key = (normalize_key(&row.geography), normalize_key(&row.market));
            let code = normalize_key(&row.country_code);
            if let Some(existing) = entries.get(&key) {
                if existing != &code {
                    warn!(
                        geography = %key.0,
                        market = %key.1,
                        kept = %existing,
                        ignored = %code,
                        "国家映射重复，保留首条"
                    );
                }
                continue;
            }
            entries.insert(key, code);
        }
        Self { entries }
    }

    pub fn resolve(&self, geography: &str, market: &str) -> Option<&str> {
        self.entries
            .get(&(normalize_key(geography), normalize_key(market)))
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ==========================================
// CapacityTable - 库存天数标准 + 工厂产能
// ==========================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentNorm {
    pub inventory_days: f64,
    pub opening_stock_days: f64,
}

#[derive(Debug, Clone, Default)]
pub struct CapacityTable {
    norms: HashMap<(String, ProductionEnvironment), EnvironmentNorm>,
    factory_capacity: HashMap<(String, String), f64>,
    // SKU → 有产能的工厂（有序，保证输出稳定）
    factories_by_sku: BTreeMap<String, BTreeSet<String>>,
}

impl CapacityTable {
    pub fn from_rows(norm_rows: Vec<EnvironmentNormRow>, capacity_rows: Vec<FactoryCapacityRow>) -> Self {
        let mut norms = HashMap::new();
        for row in norm_rows {
            norms
                .entry((normalize_key(&row.sku), row.environment))
                .or_insert(EnvironmentNorm {
                    inventory_days: row.inventory_days,
                    opening_stock_days: row.opening_stock_days,
                });
        }

        let mut factory_capacity: HashMap<(String, String), f64> = HashMap::new();
        let mut factories_by_sku: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for row in capacity_rows {
            let sku = normalize_key(&row.sku);
            let factory = normalize_key(&row.factory);
            // 同键多行产能累加
            *factory_capacity.entry((sku.clone(), factory.clone())).or_insert(0.0) +=
                row.monthly_capacity;
            factories_by_sku.entry(sku).or_default().insert(factory);
        }

        Self {
            norms,
            factory_capacity,
            factories_by_sku,
        }
    }

    pub fn norm(&self, sku: &str, environment: ProductionEnvironment) -> Option<&EnvironmentNorm> {
        self.norms.get(&(normalize_key(sku), environment))
    }

    /// SKU 是否在任一工厂有产能条目（产能过滤口径）
    pub fn has_any_factory(&self, sku: &str) -> bool {
        self.factories_by_sku
            .get(&normalize_key(sku))
            .map(|f| !f.is_empty())
            .unwrap_or(false)
    }

    /// SKU 的可生产工厂（有序）
    pub fn factories_for(&self, sku: &str) -> Vec<&str> {
        self.factories_by_sku
            .get(&normalize_key(sku))
            .map(|set| set.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    pub fn factory_capacity(&self, sku: &str, factory: &str) -> Option<f64> {
        self.factory_capacity
            .get(&(normalize_key(sku), normalize_key(factory)))
            .copied()
    }

    /// 任一生产环境下期初库存天数 > 0
    pub fn has_opening_stock_days(&self, sku: &str) -> bool {
        let sku = normalize_key(sku);
        self.norms
            .iter()
            .any(|((s, _), norm)| s == &sku && norm.opening_stock_days > 0.0)
    }
}

// ==========================================
// FreightCostTable - (工厂, 国家, SKU) → 运价
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct FreightCostTable {
    rates: HashMap<(String, String, String), f64>,
}

impl FreightCostTable {
    pub fn from_rows(rows: Vec<FreightRateRow>) -> Self {
        let mut rates = HashMap::new();
        for row in rows {
            rates
                .entry((
                    normalize_key(&row.factory),
                    normalize_key(&row.country),
                    normalize_key(&row.sku),
                ))
                .or_insert(row.rate);
        }
        Self { rates }
    }

    pub fn lookup(&self, factory: &str, country: &str, sku: &str) -> Option<f64> {
        self.rates
            .get(&(normalize_key(factory), normalize_key(country), normalize_key(sku)))
            .copied()
    }
}

// ==========================================
// ProductTable - SKU → 单位重量
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct ProductTable {
    weights: HashMap<String, f64>,
}

impl ProductTable {
    pub fn from_rows(rows: Vec<ProductRow>) -> Self {
        let mut weights = HashMap::new();
        for row in rows {
            weights.entry(normalize_key(&row.sku)).or_insert(row.weight_per_unit);
        }
        Self { weights }
    }

    pub fn weight(&self, sku: &str) -> Option<f64> {
        self.weights.get(&normalize_key(sku)).copied()
    }
}

// ==========================================
// WarehouseStockTable - (仓库, SKU) → 期初库存 + 月产能
// ==========================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WarehouseStockEntry {
    pub opening_stock: f64,
    pub monthly_capacity: f64,
}

#[derive(Debug, Clone, Default)]
pub struct WarehouseStockTable {
    entries: HashMap<(WarehouseCode, String), WarehouseStockEntry>,
}

impl WarehouseStockTable {
    pub fn from_rows(rows: Vec<WarehouseStockRow>) -> Self {
        let mut entries = HashMap::new();
        for row in rows {
            entries
                .entry((row.warehouse, normalize_key(&row.sku)))
                .or_insert(WarehouseStockEntry {
                    opening_stock: row.opening_stock,
                    monthly_capacity: row.monthly_capacity,
                });
        }
        Self { entries }
    }

    pub fn get(&self, warehouse: WarehouseCode, sku: &str) -> Option<&WarehouseStockEntry> {
        self.entries.get(&(warehouse, normalize_key(sku)))
    }
}

// ==========================================
// LookupTables - 一次运行的只读查找表集合
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct LookupTables {
    pub country_mapping: CountryMapping,
    pub capacity: CapacityTable,
    pub freight: FreightCostTable,
    pub products: ProductTable,
    pub warehouse_stock: WarehouseStockTable,
}
