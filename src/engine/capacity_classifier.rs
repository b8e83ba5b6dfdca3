// ==========================================
// 需求供应规划系统 - 产能分类
// ==========================================
// 本土国家: 按 MTS → MTO 顺序查库存天数标准
// 出口国家: EXPORT / OTHER / 0 天
// ==========================================

use crate::config::PipelineConfig;
use crate::domain::batch::{DataGapKind, DataGapLog};
use crate::domain::lookup::CapacityTable;
use crate::domain::types::{MarketClass, ProductionEnvironment, WarehouseCode};

/// 单个 (国家, SKU) 的分类结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Classification {
    pub market_class: MarketClass,
    pub production_environment: ProductionEnvironment,
    pub inventory_days_norm: f64,
    pub safety_stock_warehouse: WarehouseCode,
}

pub struct CapacityClassifier<'a> {
    capacity: &'a CapacityTable,
    config: &'a PipelineConfig,
}

impl<'a> CapacityClassifier<'a> {
    pub fn new(capacity: &'a CapacityTable, config: &'a PipelineConfig) -> Self {
        Self { capacity, config }
    }

    pub fn classify(&self, country: &str, sku: &str, gaps: &mut DataGapLog) -> Classification {
        let safety_stock_warehouse = self.config.home_warehouse(country);

        if !self.config.is_home_country(country) {
            return Classification {
                market_class: MarketClass::Export,
                production_environment: ProductionEnvironment::Other,
                inventory_days_norm: 0.0,
                safety_stock_warehouse,
            };
        }

        let found = ProductionEnvironment::LOOKUP_ORDER
            .iter()
            .find_map(|env| self.capacity.norm(sku, *env).map(|norm| (*env, norm.inventory_days)));

        match found {
            Some((production_environment, inventory_days_norm)) => Classification {
                market_class: MarketClass::Home,
                production_environment,
                inventory_days_norm,
                safety_stock_warehouse,
            },
            None => {
                gaps.record(
                    DataGapKind::MissingEnvironmentNorm,
                    format!("{}/{}", country, sku),
                    "本土国家 SKU 无 MTS/MTO 库存天数标准，按 OTHER/0 处理",
                );
                Classification {
                    market_class: MarketClass::Home,
                    production_environment: ProductionEnvironment::Other,
                    inventory_days_norm: 0.0,
                    safety_stock_warehouse,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::lookup::EnvironmentNormRow;
    use crate::domain::types::StageName;

    fn table() -> CapacityTable {
        CapacityTable::from_rows(
            vec![
                EnvironmentNormRow {
                    sku: "100".to_string(),
                    environment: ProductionEnvironment::Mto,
                    inventory_days: 14.0,
                    opening_stock_days: 0.0,
                },
                EnvironmentNormRow {
                    sku: "100".to_string(),
                    environment: ProductionEnvironment::Mts,
                    inventory_days: 30.0,
                    opening_stock_days: 0.0,
                },
            ],
            vec![],
        )
    }

    #[test]
    fn test_home_country_prefers_mts() {
        let table = table();
        let config = PipelineConfig::default();
        let classifier = CapacityClassifier::new(&table, &config);
        let mut gaps = DataGapLog::new("B1", StageName::DemandNormalize);

        let c = classifier.classify("KSA", "100", &mut gaps);
        assert_eq!(c.market_class, MarketClass::Home);
        assert_eq!(c.production_environment, ProductionEnvironment::Mts);
        assert_eq!(c.inventory_days_norm, 30.0);
        assert_eq!(c.safety_stock_warehouse, WarehouseCode::A);
        assert!(gaps.is_empty());
    }

    #[test]
    fn test_export_country_is_other() {
        let table = table();
        let config = PipelineConfig::default();
        let classifier = CapacityClassifier::new(&table, &config);
        let mut gaps = DataGapLog::new("B1", StageName::DemandNormalize);

        let c = classifier.classify("JOR", "100", &mut gaps);
        assert_eq!(c.market_class, MarketClass::Export);
        assert_eq!(c.production_environment, ProductionEnvironment::Other);
        assert_eq!(c.inventory_days_norm, 0.0);
        assert_eq!(c.safety_stock_warehouse, WarehouseCode::Placeholder);
    }

    #[test]
    fn test_home_country_without_norm_records_gap() {
        let table = table();
        let config = PipelineConfig::default();
        let classifier = CapacityClassifier::new(&table, &config);
        let mut gaps = DataGapLog::new("B1", StageName::DemandNormalize);

        let c = classifier.classify("UAE", "999", &mut gaps);
        assert_eq!(c.production_environment, ProductionEnvironment::Other);
        assert_eq!(gaps.len(), 1);
    }
}
