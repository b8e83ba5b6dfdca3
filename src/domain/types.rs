// ==========================================
// 需求供应规划系统 - 领域类型定义
// ==========================================
// 职责: 仓库代码、市场分类、生产环境、阶段名等枚举
// 序列化格式: SCREAMING_SNAKE_CASE (与数据库一致)
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

/// 规划期月份数（固定 12 期）
pub const HORIZON_MONTHS: u32 = 12;

/// 规划期月份序列 1..=12
pub fn horizon() -> impl Iterator<Item = u32> {
    1..=HORIZON_MONTHS
}

// ==========================================
// 仓库代码 (Warehouse Code)
// ==========================================
// 固定候选集合，顺序即输出顺序: A, B, C, PLACEHOLDER
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WarehouseCode {
    A,
    B,
    C,
    Placeholder, // 虚拟仓（外部/无约束流量）
}

impl WarehouseCode {
    /// 候选仓库（稳定顺序）
    pub const ALL: [WarehouseCode; 4] = [
        WarehouseCode::A,
        WarehouseCode::B,
        WarehouseCode::C,
        WarehouseCode::Placeholder,
    ];

    /// 实体仓库（不含虚拟仓）
    pub const PHYSICAL: [WarehouseCode; 3] = [WarehouseCode::A, WarehouseCode::B, WarehouseCode::C];

    pub fn is_placeholder(&self) -> bool {
        matches!(self, WarehouseCode::Placeholder)
    }

    /// 从字符串解析仓库代码
    pub fn from_db_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "A" => Some(WarehouseCode::A),
            "B" => Some(WarehouseCode::B),
            "C" => Some(WarehouseCode::C),
            "PLACEHOLDER" => Some(WarehouseCode::Placeholder),
            _ => None,
        }
    }

    /// 转换为数据库存储的字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            WarehouseCode::A => "A",
            WarehouseCode::B => "B",
            WarehouseCode::C => "C",
            WarehouseCode::Placeholder => "PLACEHOLDER",
        }
    }
}

impl fmt::Display for WarehouseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 市场分类 (Market Class)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MarketClass {
    Home,   // 本土市场（有仓库所在国）
    Export, // 出口市场
}

impl MarketClass {
    pub fn from_db_str(s: &str) -> Self {
        match s.trim().to_uppercase().as_str() {
            "HOME" => MarketClass::Home,
            _ => MarketClass::Export,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            MarketClass::Home => "HOME",
            MarketClass::Export => "EXPORT",
        }
    }
}

impl fmt::Display for MarketClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 生产环境 (Production Environment)
// ==========================================
// MTS: 备货生产; MTO: 订单生产; OTHER: 出口/未分类
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProductionEnvironment {
    Mts,
    Mto,
    Other,
}

impl ProductionEnvironment {
    /// 本土国家查表顺序
    pub const LOOKUP_ORDER: [ProductionEnvironment; 2] =
        [ProductionEnvironment::Mts, ProductionEnvironment::Mto];

    pub fn from_db_str(s: &str) -> Self {
        match s.trim().to_uppercase().as_str() {
            "MTS" => ProductionEnvironment::Mts,
            "MTO" => ProductionEnvironment::Mto,
            _ => ProductionEnvironment::Other,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            ProductionEnvironment::Mts => "MTS",
            ProductionEnvironment::Mto => "MTO",
            ProductionEnvironment::Other => "OTHER",
        }
    }

    /// 是否参与入库拆分（MTS/MTO）
    pub fn is_planned_production(&self) -> bool {
        !matches!(self, ProductionEnvironment::Other)
    }
}

impl fmt::Display for ProductionEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 管道阶段 (Pipeline Stage)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StageName {
    LoadInputs,
    DemandNormalize,
    SupplyExpand,
    CrossReference,
    DistributionCost,
    WarehouseBalance,
}

impl StageName {
    pub fn to_db_str(&self) -> &'static str {
        match self {
            StageName::LoadInputs => "LOAD_INPUTS",
            StageName::DemandNormalize => "DEMAND_NORMALIZE",
            StageName::SupplyExpand => "SUPPLY_EXPAND",
            StageName::CrossReference => "CROSS_REFERENCE",
            StageName::DistributionCost => "DISTRIBUTION_COST",
            StageName::WarehouseBalance => "WAREHOUSE_BALANCE",
        }
    }
}

impl fmt::Display for StageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 批次状态 (Batch Status)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BatchStatus {
    Running,
    Completed,
    Failed,
}

impl BatchStatus {
    pub fn from_db_str(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "COMPLETED" => BatchStatus::Completed,
            "FAILED" => BatchStatus::Failed,
            _ => BatchStatus::Running,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            BatchStatus::Running => "RUNNING",
            BatchStatus::Completed => "COMPLETED",
            BatchStatus::Failed => "FAILED",
        }
    }
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 零运费规则 (Cost Rule)
// ==========================================
// 规则表顺序即优先级，首条命中生效
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CostRule {
    PlaceholderWarehouse, // 虚拟仓
    IntraCountry,         // 仓库所在国 = 目的国
    IntraSite,            // 同址工厂调拨
    Freight,              // 运价表命中
    FreightMissing,       // 运价缺失，按 0 计
}

impl CostRule {
    pub fn from_db_str(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "PLACEHOLDER_WAREHOUSE" => CostRule::PlaceholderWarehouse,
            "INTRA_COUNTRY" => CostRule::IntraCountry,
            "INTRA_SITE" => CostRule::IntraSite,
            "FREIGHT" => CostRule::Freight,
            _ => CostRule::FreightMissing,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            CostRule::PlaceholderWarehouse => "PLACEHOLDER_WAREHOUSE",
            CostRule::IntraCountry => "INTRA_COUNTRY",
            CostRule::IntraSite => "INTRA_SITE",
            CostRule::Freight => "FREIGHT",
            CostRule::FreightMissing => "FREIGHT_MISSING",
        }
    }

    /// 是否为零运费例外规则
    pub fn is_zero_cost_exception(&self) -> bool {
        matches!(
            self,
            CostRule::PlaceholderWarehouse | CostRule::IntraCountry | CostRule::IntraSite
        )
    }
}

impl fmt::Display for CostRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 仓储成本口径 (Storage Cost Variant)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StorageCostVariant {
    Standard, // v1
    Markdown, // v2: 乘以 STORAGE_COST_MARKDOWN
}

/// v2 仓储成本折减系数
pub const STORAGE_COST_MARKDOWN: f64 = 0.5;

impl StorageCostVariant {
    pub fn from_db_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "STANDARD" | "V1" => Some(StorageCostVariant::Standard),
            "MARKDOWN" | "V2" => Some(StorageCostVariant::Markdown),
            _ => None,
        }
    }

    /// 成本乘数
    pub fn factor(&self) -> f64 {
        match self {
            StorageCostVariant::Standard => 1.0,
            StorageCostVariant::Markdown => STORAGE_COST_MARKDOWN,
        }
    }
}
