// ==========================================
// 需求供应规划系统 - 阶段2 供应候选展开
// ==========================================
// 每条需求 → 4 条候选（A, B, C, PLACEHOLDER，顺序固定）
// qty / wt 初始为 0，本阶段不重算
// ==========================================

use crate::config::PipelineConfig;
use crate::domain::batch::{DataGapKind, DataGapLog};
use crate::domain::demand::DemandRecord;
use crate::domain::lookup::LookupTables;
use crate::domain::supply::SupplyRecord;
use crate::domain::types::{CostRule, WarehouseCode};
use crate::engine::cost_rules::{self, RouteContext};
use std::collections::HashSet;
use tracing::{info, instrument};

pub struct SupplyExpander<'a> {
    lookups: &'a LookupTables,
    config: &'a PipelineConfig,
}

impl<'a> SupplyExpander<'a> {
    pub fn new(lookups: &'a LookupTables, config: &'a PipelineConfig) -> Self {
        Self { lookups, config }
    }

    #[instrument(skip(self, demand, gaps), fields(demand = demand.len()))]
    pub fn expand(
        &self,
        batch_id: &str,
        demand: &[DemandRecord],
        gaps: &mut DataGapLog,
    ) -> Vec<SupplyRecord> {
        let mut missing_weight: HashSet<String> = HashSet::new();
        let mut missing_freight: HashSet<(WarehouseCode, String, String)> = HashSet::new();
        let mut records = Vec::with_capacity(demand.len() * WarehouseCode::ALL.len());

        for d in demand {
            let weight_per_unit = match self.lookups.products.weight(&d.sku) {
                Some(w) => w,
                None => {
                    if missing_weight.insert(d.sku.clone()) {
                        gaps.record(
                            DataGapKind::MissingProductWeight,
                            d.sku.clone(),
                            "产品单位重量缺失，按 0 计",
                        );
                    }
                    0.0
                }
            };

            for warehouse in WarehouseCode::ALL {
                let ctx = RouteContext {
                    warehouse,
                    site: self.config.site(warehouse),
                    factory: None,
                    country: &d.country,
                    sku: &d.sku,
                };
                let decision = cost_rules::evaluate(&ctx, &self.lookups.freight);
                if decision.rule == CostRule::FreightMissing
                    && missing_freight.insert((warehouse, d.country.clone(), d.sku.clone()))
                {
                    gaps.record(
                        DataGapKind::MissingFreightRate,
                        format!(
                            "{}/{}/{}/{}",
                            warehouse,
                            ctx.origin_factory().unwrap_or("-"),
                            d.country,
                            d.sku
                        ),
                        "仓库发运运价缺失，按 0 计",
                    );
                }

                let stock = self.lookups.warehouse_stock.get(warehouse, &d.sku);
                let max_capacity = if warehouse.is_placeholder() {
                    None
                } else {
                    Some(stock.map(|s| s.monthly_capacity).unwrap_or(0.0))
                };

                records.push(SupplyRecord {
                    upload_batch_id: batch_id.to_string(),
                    ordinal: records.len() + 1,
                    country: d.country.clone(),
                    sku: d.sku.clone(),
                    month: d.month,
                    warehouse,
                    transport_cost: decision.cost_per_unit,
                    max_capacity,
                    weight_per_unit,
                    qty: 0.0,
                    wt: 0.0,
                    position_ok: warehouse.is_placeholder() || stock.is_some(),
                    qty_within_max: true,
                });
            }
        }

        info!(batch_id, records = records.len(), "供应候选展开完成");
        records
    }
}
