// ==========================================
// 需求供应规划系统 - 交叉引用生成
// ==========================================
// 需求行 → 其 4 条供应候选的序号引用 + 需求==供应 校验公式
// 红线: 序号按键查表获取，不做算术推导（供应行重排后依然有效）
// ==========================================

use crate::domain::demand::DemandRecord;
use crate::domain::reference::{ConsumptionFormula, RecordRef, SupplyReference};
use crate::domain::supply::{SupplyKey, SupplyRecord};
use crate::domain::types::WarehouseCode;
use std::collections::HashMap;
use tracing::{debug, instrument};

/// 单条需求的引用回填 (需求序号, 供应求和引用, 校验公式)
pub type DemandReferenceUpdate = (usize, SupplyReference, ConsumptionFormula);

/// 缺失供应行（批次内不一致）
#[derive(Debug, Clone, PartialEq)]
pub struct MissingSupplyRow {
    pub demand_ordinal: usize,
    pub key: SupplyKey,
}

#[derive(Debug, Default)]
pub struct CrossReferenceGenerator;

impl CrossReferenceGenerator {
    pub fn new() -> Self {
        Self
    }

    #[instrument(skip_all, fields(demand = demand.len(), supply = supply.len()))]
    pub fn generate(
        &self,
        demand: &[DemandRecord],
        supply: &[SupplyRecord],
    ) -> Result<Vec<DemandReferenceUpdate>, MissingSupplyRow> {
        let positions: HashMap<SupplyKey, usize> =
            supply.iter().map(|s| (s.key(), s.ordinal)).collect();

        let mut updates = Vec::with_capacity(demand.len());
        for d in demand {
            let mut members = Vec::with_capacity(WarehouseCode::ALL.len());
            for warehouse in WarehouseCode::ALL {
                let key: SupplyKey = (d.country.clone(), d.sku.clone(), d.month, warehouse);
                match positions.get(&key) {
                    Some(ordinal) => members.push(RecordRef::supply(*ordinal)),
                    None => {
                        return Err(MissingSupplyRow {
                            demand_ordinal: d.ordinal,
                            key,
                        })
                    }
                }
            }

            let supply_ref = SupplyReference { members };
            let formula = ConsumptionFormula {
                demand: RecordRef::demand(d.ordinal),
                supply: supply_ref.clone(),
            };
            updates.push((d.ordinal, supply_ref, formula));
        }

        debug!(updates = updates.len(), "交叉引用生成完成");
        Ok(updates)
    }
}
