// ==========================================
// 需求供应规划系统 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型、查找表
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod balance;
pub mod batch;
pub mod demand;
pub mod distribution;
pub mod lookup;
pub mod reference;
pub mod supply;
pub mod types;

// 重导出核心类型
pub use balance::{ChainState, SkuMonthStorage, WarehouseBalanceRecord};
pub use batch::{DataGap, DataGapKind, DataGapLog, PipelineRunSummary, UploadBatch};
pub use demand::{DemandKey, DemandRecord, RawDemandRow};
pub use distribution::{DistributionKey, DistributionRecord};
pub use lookup::{
    CapacityTable, CountryMapping, FreightCostTable, LookupTables, ProductTable,
    WarehouseStockTable,
};
pub use reference::{ConsumptionFormula, FormulaLayout, RecordRef, RecordType, SupplyReference};
pub use supply::{SupplyKey, SupplyRecord};
pub use types::{
    BatchStatus, CostRule, MarketClass, ProductionEnvironment, StageName, StorageCostVariant,
    WarehouseCode, HORIZON_MONTHS,
};
