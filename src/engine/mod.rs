// ==========================================
// 需求供应规划系统 - 引擎层
// ==========================================
// 职责: 四阶段派生规则（标准化、展开、调拨运费、库存滚动）
// 红线: Engine 不拼 SQL；查找表只读，显式传入
// ==========================================

pub mod capacity_classifier;
pub mod cost_rules;
pub mod country_resolver;
pub mod cross_reference;
pub mod demand_normalizer;
pub mod distribution_cost;
pub mod error;
pub mod orchestrator;
pub mod repositories;
pub mod supply_expander;
pub mod warehouse_balance;

// 重导出核心引擎
pub use capacity_classifier::{CapacityClassifier, Classification};
pub use country_resolver::CountryResolver;
pub use cross_reference::CrossReferenceGenerator;
pub use demand_normalizer::DemandNormalizer;
pub use distribution_cost::DistributionCostEngine;
pub use error::{PipelineError, PipelineResult};
pub use orchestrator::PipelineOrchestrator;
pub use repositories::PipelineRepositories;
pub use supply_expander::SupplyExpander;
pub use warehouse_balance::{chain, BalanceOutput, WarehouseBalanceEngine};
