// ==========================================
// 需求供应规划系统 - 管道配置读取 Trait
// ==========================================
// 职责: 定义管道所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use crate::config::pipeline_config::{PipelineConfig, WarehouseSite};
use crate::domain::types::StorageCostVariant;
use async_trait::async_trait;
use std::error::Error;

// ==========================================
// PipelineConfigReader Trait
// ==========================================
// 实现者: ConfigManager（config_kv 表）、PipelineConfig（静态配置）
#[async_trait]
pub trait PipelineConfigReader: Send + Sync {
    /// 获取实体仓库站点
    ///
    /// # 默认值
    /// - A=KSA/F1, B=UAE/F2, C=EGY/F3
    async fn get_warehouse_sites(&self) -> Result<Vec<WarehouseSite>, Box<dyn Error>>;

    /// 获取本土国家列表
    ///
    /// # 默认值
    /// - 各站点所在国
    async fn get_home_countries(&self) -> Result<Vec<String>, Box<dyn Error>>;

    /// 期初库存天数过滤是否启用
    ///
    /// # 默认值
    /// - false
    async fn get_opening_stock_days_filter(&self) -> Result<bool, Box<dyn Error>>;

    /// 运价缺失是否视为致命错误
    ///
    /// # 默认值
    /// - false（记录数据缺口，按 0 计）
    async fn get_strict_freight_rates(&self) -> Result<bool, Box<dyn Error>>;

    /// 单位仓储成本
    ///
    /// # 默认值
    /// - 1.0
    async fn get_unit_storage_cost(&self) -> Result<f64, Box<dyn Error>>;

    /// 仓储成本口径（STANDARD / MARKDOWN）
    async fn get_storage_cost_variant(&self) -> Result<StorageCostVariant, Box<dyn Error>>;

    /// 库存下限 / 上限（仅用于建议性标记）
    async fn get_stock_bounds(&self) -> Result<(f64, Option<f64>), Box<dyn Error>>;

    /// 批量写入每块最大行数
    async fn get_insert_chunk_rows(&self) -> Result<usize, Box<dyn Error>>;

    /// 汇总为一次运行的配置快照
    async fn load_pipeline_config(&self) -> Result<PipelineConfig, Box<dyn Error>>;
}

// ==========================================
// 静态配置实现（测试/嵌入使用）
// ==========================================
#[async_trait]
impl PipelineConfigReader for PipelineConfig {
    async fn get_warehouse_sites(&self) -> Result<Vec<WarehouseSite>, Box<dyn Error>> {
        Ok(self.warehouse_sites.clone())
    }

    async fn get_home_countries(&self) -> Result<Vec<String>, Box<dyn Error>> {
        Ok(self.home_countries.clone())
    }

    async fn get_opening_stock_days_filter(&self) -> Result<bool, Box<dyn Error>> {
        Ok(self.opening_stock_days_filter)
    }

    async fn get_strict_freight_rates(&self) -> Result<bool, Box<dyn Error>> {
        Ok(self.strict_freight_rates)
    }

    async fn get_unit_storage_cost(&self) -> Result<f64, Box<dyn Error>> {
        Ok(self.unit_storage_cost)
    }

    async fn get_storage_cost_variant(&self) -> Result<StorageCostVariant, Box<dyn Error>> {
        Ok(self.storage_cost_variant)
    }

    async fn get_stock_bounds(&self) -> Result<(f64, Option<f64>), Box<dyn Error>> {
        Ok((self.stock_floor, self.stock_ceiling))
    }

    async fn get_insert_chunk_rows(&self) -> Result<usize, Box<dyn Error>> {
        Ok(self.insert_chunk_rows)
    }

    async fn load_pipeline_config(&self) -> Result<PipelineConfig, Box<dyn Error>> {
        Ok(self.clone())
    }
}
