// ==========================================
// 需求供应规划系统 - 核心库
// ==========================================
// 技术栈: Rust + SQLite
// 系统定位: 四阶段派生管道（需求 → 供应候选 → 一级调拨 → 库存滚动）
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体、类型与查找表
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 派生规则与编排
pub mod engine;

// 输入层 - 原始单元格读取
pub mod importer;

// 配置层 - 管道配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一/建表）
pub mod db;

// 日志系统
pub mod logging;

// 阶段性能统计
pub mod perf;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{
    BatchStatus, CostRule, MarketClass, ProductionEnvironment, StageName, StorageCostVariant,
    WarehouseCode,
};

// 领域实体
pub use domain::{
    DataGap, DemandRecord, DistributionRecord, LookupTables, PipelineRunSummary, SkuMonthStorage,
    SupplyRecord, UploadBatch, WarehouseBalanceRecord,
};

// 引擎
pub use engine::{
    DemandNormalizer, DistributionCostEngine, PipelineError, PipelineOrchestrator,
    PipelineRepositories, SupplyExpander, WarehouseBalanceEngine,
};

// 配置
pub use config::{ConfigManager, PipelineConfig, PipelineConfigReader};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "需求供应规划系统";
