// ==========================================
// 需求供应规划系统 - 阶段3 一级调拨运费分配
// ==========================================
// 资格门槛: SKU 在任一工厂有产能条目
// 可选过滤: 期初库存天数 > 0（配置开关，默认关闭）
// 组合: 需求 (国家, SKU, 月) × 仓库 × 可生产工厂，每键唯一
// ==========================================

use crate::config::PipelineConfig;
use crate::domain::batch::{DataGapKind, DataGapLog};
use crate::domain::demand::DemandRecord;
use crate::domain::distribution::{DistributionKey, DistributionRecord};
use crate::domain::lookup::LookupTables;
use crate::domain::types::{CostRule, StageName, WarehouseCode};
use crate::engine::cost_rules::{self, RouteContext};
use crate::engine::error::{PipelineError, PipelineResult};
use std::collections::HashSet;
use tracing::{debug, info, instrument};

pub struct DistributionCostEngine<'a> {
    lookups: &'a LookupTables,
    config: &'a PipelineConfig,
}

impl<'a> DistributionCostEngine<'a> {
    pub fn new(lookups: &'a LookupTables, config: &'a PipelineConfig) -> Self {
        Self { lookups, config }
    }

    /// SKU 是否进入调拨矩阵
    pub fn is_eligible(&self, sku: &str) -> bool {
        let capacity = &self.lookups.capacity;
        if !capacity.has_any_factory(sku) {
            return false;
        }
        !self.config.opening_stock_days_filter || capacity.has_opening_stock_days(sku)
    }

    /// 生成调拨记录
    ///
    /// # 错误
    /// - strict_freight_rates 开启且运价缺失时返回 MissingFreightRate
    #[instrument(skip(self, demand, gaps), fields(demand = demand.len()))]
    pub fn assign(
        &self,
        batch_id: &str,
        demand: &[DemandRecord],
        gaps: &mut DataGapLog,
    ) -> PipelineResult<Vec<DistributionRecord>> {
        let mut seen: HashSet<DistributionKey> = HashSet::new();
        let mut missing_freight: HashSet<(String, String, String)> = HashSet::new();
        let mut skipped_skus: HashSet<&str> = HashSet::new();
        let mut records = Vec::new();

        for d in demand {
            if !self.is_eligible(&d.sku) {
                skipped_skus.insert(d.sku.as_str());
                continue;
            }

            let factories = self.lookups.capacity.factories_for(&d.sku);
            let weight_per_unit = self.lookups.products.weight(&d.sku).unwrap_or(0.0);

            for warehouse in WarehouseCode::ALL {
                for &factory in &factories {
                    let key: DistributionKey = (
                        warehouse,
                        factory.to_string(),
                        d.country.clone(),
                        d.sku.clone(),
                        d.month,
                    );
                    if !seen.insert(key) {
                        continue;
                    }

                    let ctx = RouteContext {
                        warehouse,
                        site: self.config.site(warehouse),
                        factory: Some(factory),
                        country: &d.country,
                        sku: &d.sku,
                    };
                    let decision = cost_rules::evaluate(&ctx, &self.lookups.freight);

                    if decision.rule == CostRule::FreightMissing {
                        let freight_key = format!("{}/{}/{}", factory, d.country, d.sku);
                        if self.config.strict_freight_rates {
                            return Err(PipelineError::MissingFreightRate {
                                batch_id: batch_id.to_string(),
                                stage: StageName::DistributionCost,
                                key: freight_key,
                            });
                        }
                        if missing_freight.insert((
                            factory.to_string(),
                            d.country.clone(),
                            d.sku.clone(),
                        )) {
                            gaps.record(DataGapKind::MissingFreightRate, freight_key, "调拨运价缺失，按 0 计");
                        }
                    }

                    let mut record = DistributionRecord {
                        upload_batch_id: batch_id.to_string(),
                        ordinal: records.len() + 1,
                        warehouse,
                        factory: factory.to_string(),
                        country: d.country.clone(),
                        sku: d.sku.clone(),
                        month: d.month,
                        cost_rule: decision.rule,
                        cost_per_unit: decision.cost_per_unit,
                        custom_cost_per_unit: None,
                        max_qty: self
                            .lookups
                            .capacity
                            .factory_capacity(&d.sku, factory)
                            .unwrap_or(0.0),
                        weight_per_unit,
                        qty: 0.0,
                        wt: 0.0,
                        row_cost: 0.0,
                    };
                    record.recompute();
                    records.push(record);
                }
            }
        }

        debug!(skipped_skus = skipped_skus.len(), "无产能 SKU 已跳过");
        info!(batch_id, records = records.len(), "调拨运费分配完成");
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::lookup::{
        CapacityTable, EnvironmentNormRow, FactoryCapacityRow, FreightCostTable, FreightRateRow,
    };
    use crate::domain::types::{MarketClass, ProductionEnvironment};

    fn demand(country: &str, sku: &str, month: u32) -> DemandRecord {
        DemandRecord {
            upload_batch_id: "B1".to_string(),
            ordinal: month as usize,
            country: country.to_string(),
            sku: sku.to_string(),
            month,
            demand_cases: 10.0,
            market_class: MarketClass::Export,
            production_environment: ProductionEnvironment::Other,
            safety_stock_warehouse: WarehouseCode::Placeholder,
            inventory_days_norm: 0.0,
            supply_reference: None,
            consumption_formula: None,
        }
    }

    fn lookups() -> LookupTables {
        LookupTables {
            capacity: CapacityTable::from_rows(
                vec![EnvironmentNormRow {
                    sku: "100".to_string(),
                    environment: ProductionEnvironment::Mts,
                    inventory_days: 30.0,
                    opening_stock_days: 0.0,
                }],
                vec![
                    FactoryCapacityRow {
                        sku: "100".to_string(),
                        factory: "F1".to_string(),
                        monthly_capacity: 500.0,
                    },
                    FactoryCapacityRow {
                        sku: "100".to_string(),
                        factory: "F2".to_string(),
                        monthly_capacity: 300.0,
                    },
                ],
            ),
            freight: FreightCostTable::from_rows(vec![
                FreightRateRow {
                    factory: "F1".to_string(),
                    country: "JOR".to_string(),
                    sku: "100".to_string(),
                    rate: 4.0,
                },
                FreightRateRow {
                    factory: "F2".to_string(),
                    country: "JOR".to_string(),
                    sku: "100".to_string(),
                    rate: 6.0,
                },
            ]),
            ..LookupTables::default()
        }
    }

    fn assign(config: &PipelineConfig, demand: &[DemandRecord]) -> PipelineResult<(Vec<DistributionRecord>, DataGapLog)> {
        let lookups = lookups();
        let mut gaps = DataGapLog::new("B1", StageName::DistributionCost);
        let records = DistributionCostEngine::new(&lookups, config).assign("B1", demand, &mut gaps)?;
        Ok((records, gaps))
    }

    #[test]
    fn test_sku_without_capacity_yields_no_rows() {
        let (records, _) = assign(&PipelineConfig::default(), &[demand("JOR", "999", 1)]).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_home_country_destination_is_free() {
        let (records, _) = assign(&PipelineConfig::default(), &[demand("KSA", "100", 1)]).unwrap();
        let from_a: Vec<&DistributionRecord> =
            records.iter().filter(|r| r.warehouse == WarehouseCode::A).collect();
        assert_eq!(from_a.len(), 2);
        assert!(from_a.iter().all(|r| r.cost_per_unit == 0.0));
        assert!(from_a.iter().all(|r| r.cost_rule == CostRule::IntraCountry));
    }

    #[test]
    fn test_placeholder_rows_are_free_and_keys_unique() {
        let demand: Vec<DemandRecord> = (1..=3).map(|m| demand("JOR", "100", m)).collect();
        let (records, _) = assign(&PipelineConfig::default(), &demand).unwrap();

        // 3 月 × 4 仓 × 2 工厂
        assert_eq!(records.len(), 24);
        let keys: HashSet<DistributionKey> = records.iter().map(|r| r.key()).collect();
        assert_eq!(keys.len(), records.len());
        assert!(records
            .iter()
            .filter(|r| r.warehouse.is_placeholder())
            .all(|r| r.cost_per_unit == 0.0));

        let a_f2 = records
            .iter()
            .find(|r| r.warehouse == WarehouseCode::A && r.factory == "F2")
            .unwrap();
        assert_eq!(a_f2.cost_rule, CostRule::Freight);
        assert_eq!(a_f2.cost_per_unit, 6.0);
        assert_eq!(a_f2.max_qty, 300.0);

        let a_f1 = records
            .iter()
            .find(|r| r.warehouse == WarehouseCode::A && r.factory == "F1")
            .unwrap();
        assert_eq!(a_f1.cost_rule, CostRule::IntraSite);
    }

    #[test]
    fn test_opening_stock_days_filter() {
        let config = PipelineConfig {
            opening_stock_days_filter: true,
            ..PipelineConfig::default()
        };
        let (records, _) = assign(&config, &[demand("JOR", "100", 1)]).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_freight_miss_policy() {
        let (records, gaps) = assign(&PipelineConfig::default(), &[demand("EGY", "100", 1)]).unwrap();
        assert!(!records.is_empty());
        assert!(gaps.gaps().iter().any(|g| g.kind == DataGapKind::MissingFreightRate));

        let strict = PipelineConfig {
            strict_freight_rates: true,
            ..PipelineConfig::default()
        };
        let err = assign(&strict, &[demand("OMN", "100", 1)]).unwrap_err();
        assert!(matches!(err, PipelineError::MissingFreightRate { .. }));
    }
}
