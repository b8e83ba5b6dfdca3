// ==========================================
// 需求供应规划系统 - 配置层
// ==========================================
// 职责: 管道配置管理（站点、资格过滤开关、仓储成本、库存边界）
// 存储: config_kv 表
// ==========================================

pub mod config_manager;
pub mod pipeline_config;
pub mod pipeline_config_reader;

// 重导出核心配置管理器
pub use config_manager::{config_keys, ConfigManager};
pub use pipeline_config::{PipelineConfig, WarehouseSite};
pub use pipeline_config_reader::PipelineConfigReader;
