// ==========================================
// 需求供应规划系统 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、写入
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::config::pipeline_config::{
    default_warehouse_sites, PipelineConfig, WarehouseSite, DEFAULT_INSERT_CHUNK_ROWS,
};
use crate::config::pipeline_config_reader::PipelineConfigReader;
use crate::db::open_sqlite_connection;
use crate::domain::types::StorageCostVariant;
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::json;
use std::collections::BTreeMap;
use std::error::Error;
use std::sync::{Arc, Mutex};

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> Result<Self, Box<dyn Error>> {
        let conn = open_sqlite_connection(db_path)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：为保证连接行为一致，会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Result<Self, Box<dyn Error>> {
        {
            let conn_guard = conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    fn get_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let value = conn
            .query_row(
                "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;

        Ok(value)
    }

    /// 读取配置值，带默认值
    fn get_config_or_default(&self, key: &str, default: &str) -> Result<String, Box<dyn Error>> {
        Ok(self.get_config_value(key)?.unwrap_or_else(|| default.to_string()))
    }

    /// 读取 global scope 的配置值（公开方法，供其他模块复用）
    pub fn get_global_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        self.get_config_value(key)
    }

    /// 写入 global scope 配置（UPSERT）
    pub fn set_global_config_value(&self, key: &str, value: &str) -> Result<(), Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
            params![key, value],
        )?;
        Ok(())
    }

    /// 获取所有配置的快照（JSON格式）
    ///
    /// # 用途
    /// - 在批次开始时记录配置快照，便于追溯重算口径
    pub fn get_config_snapshot(&self) -> Result<String, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let mut stmt =
            conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key")?;

        let mut config_map: BTreeMap<String, String> = BTreeMap::new();
        let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?;
        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }

        Ok(serde_json::to_string(&json!(config_map))?)
    }

    fn get_bool(&self, key: &str, default: bool) -> Result<bool, Box<dyn Error>> {
        let value = match self.get_config_value(key)? {
            Some(v) => v,
            None => return Ok(default),
        };
        match value.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "y" | "on" => Ok(true),
            "0" | "false" | "no" | "n" | "off" => Ok(false),
            _ => {
                tracing::warn!(config_key = key, raw_value = %value, "布尔配置格式错误，使用默认值");
                Ok(default)
            }
        }
    }

    fn get_f64(&self, key: &str, default: f64) -> Result<f64, Box<dyn Error>> {
        let value = self.get_config_or_default(key, &default.to_string())?;
        Ok(value.trim().parse::<f64>().unwrap_or_else(|_| {
            tracing::warn!(config_key = key, raw_value = %value, "数值配置格式错误，使用默认值");
            default
        }))
    }
}

// ==========================================
// PipelineConfigReader Trait 实现
// ==========================================
#[async_trait]
impl PipelineConfigReader for ConfigManager {
    async fn get_warehouse_sites(&self) -> Result<Vec<WarehouseSite>, Box<dyn Error>> {
        let value = match self.get_config_value(config_keys::WAREHOUSE_SITES)? {
            Some(v) => v,
            None => return Ok(default_warehouse_sites()),
        };

        let sites: Vec<WarehouseSite> = serde_json::from_str(&value).unwrap_or_else(|_| {
            tracing::warn!(
                config_key = config_keys::WAREHOUSE_SITES,
                raw_value = %value,
                "仓库站点配置格式错误，使用默认站点"
            );
            default_warehouse_sites()
        });

        // 虚拟仓没有站点
        Ok(sites
            .into_iter()
            .filter(|s| !s.warehouse.is_placeholder())
            .collect())
    }

    async fn get_home_countries(&self) -> Result<Vec<String>, Box<dyn Error>> {
        let countries: Vec<String> = self
            .get_config_or_default(config_keys::HOME_COUNTRIES, "")?
            .split(',')
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .collect();

        if countries.is_empty() {
            let sites = self.get_warehouse_sites().await?;
            Ok(sites.into_iter().map(|s| s.home_country).collect())
        } else {
            Ok(countries)
        }
    }

    async fn get_opening_stock_days_filter(&self) -> Result<bool, Box<dyn Error>> {
        self.get_bool(config_keys::OPENING_STOCK_DAYS_FILTER, false)
    }

    async fn get_strict_freight_rates(&self) -> Result<bool, Box<dyn Error>> {
        self.get_bool(config_keys::STRICT_FREIGHT_RATES, false)
    }

    async fn get_unit_storage_cost(&self) -> Result<f64, Box<dyn Error>> {
        self.get_f64(config_keys::UNIT_STORAGE_COST, 1.0)
    }

    async fn get_storage_cost_variant(&self) -> Result<StorageCostVariant, Box<dyn Error>> {
        let value = self.get_config_or_default(config_keys::STORAGE_COST_VARIANT, "STANDARD")?;
        Ok(StorageCostVariant::from_db_str(&value).unwrap_or_else(|| {
            tracing::warn!(
                config_key = config_keys::STORAGE_COST_VARIANT,
                raw_value = %value,
                "仓储成本口径未知，使用 STANDARD"
            );
            StorageCostVariant::Standard
        }))
    }

    async fn get_stock_bounds(&self) -> Result<(f64, Option<f64>), Box<dyn Error>> {
        let floor = self.get_f64(config_keys::STOCK_FLOOR, 0.0)?;
        let ceiling = self
            .get_config_value(config_keys::STOCK_CEILING)?
            .and_then(|v| v.trim().parse::<f64>().ok());
        Ok((floor, ceiling))
    }

    async fn get_insert_chunk_rows(&self) -> Result<usize, Box<dyn Error>> {
        let value = self.get_config_or_default(
            config_keys::INSERT_CHUNK_ROWS,
            &DEFAULT_INSERT_CHUNK_ROWS.to_string(),
        )?;
        Ok(value
            .trim()
            .parse::<usize>()
            .ok()
            .filter(|&n| n > 0)
            .unwrap_or(DEFAULT_INSERT_CHUNK_ROWS))
    }

    async fn load_pipeline_config(&self) -> Result<PipelineConfig, Box<dyn Error>> {
        let warehouse_sites = self.get_warehouse_sites().await?;
        let home_countries = self.get_home_countries().await?;
        let opening_stock_days_filter = self.get_opening_stock_days_filter().await?;
        let strict_freight_rates = self.get_strict_freight_rates().await?;
        let unit_storage_cost = self.get_unit_storage_cost().await?;
        let storage_cost_variant = self.get_storage_cost_variant().await?;
        let (stock_floor, stock_ceiling) = self.get_stock_bounds().await?;
        let insert_chunk_rows = self.get_insert_chunk_rows().await?;

        Ok(PipelineConfig {
            warehouse_sites,
            home_countries,
            opening_stock_days_filter,
            strict_freight_rates,
            unit_storage_cost,
            storage_cost_variant,
            stock_floor,
            stock_ceiling,
            insert_chunk_rows,
        })
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 站点
    pub const WAREHOUSE_SITES: &str = "warehouse_sites"; // JSON 数组
    pub const HOME_COUNTRIES: &str = "home_countries"; // 逗号分隔

    // 调拨资格
    pub const OPENING_STOCK_DAYS_FILTER: &str = "opening_stock_days_filter";
    pub const STRICT_FREIGHT_RATES: &str = "strict_freight_rates";

    // 仓储成本
    pub const UNIT_STORAGE_COST: &str = "unit_storage_cost";
    pub const STORAGE_COST_VARIANT: &str = "storage_cost_variant";

    // 库存边界
    pub const STOCK_FLOOR: &str = "stock_floor";
    pub const STOCK_CEILING: &str = "stock_ceiling";

    // 持久化
    pub const INSERT_CHUNK_ROWS: &str = "insert_chunk_rows";
}
