// ==========================================
// 需求供应规划系统 - 阶段4 仓库库存滚动
// ==========================================
// 每条 (仓库, SKU) 链按月严格递增计算，链之间相互独立（rayon 并行）
// 红线: opening(m) == closing(m-1)；closing = opening + inbound - outbound，不截断
// 汇总: SKU × 月 四个仓库轨道合计 → 平均库存 → 仓储成本
// ==========================================

use crate::config::PipelineConfig;
use crate::domain::balance::{ChainState, SkuMonthStorage, WarehouseBalanceRecord};
use crate::domain::batch::{DataGapKind, DataGapLog};
use crate::domain::demand::DemandRecord;
use crate::domain::lookup::LookupTables;
use crate::domain::supply::SupplyRecord;
use crate::domain::types::{horizon, WarehouseCode, HORIZON_MONTHS};
use rayon::prelude::*;
use rayon::ThreadPool;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::OnceLock;
use tracing::{info, instrument};

/// 单条库存链滚动（纯函数）
///
/// inbound / outbound 长度不一致时，缺失月份按 0 处理
pub fn chain(seed: f64, inbound: &[f64], outbound: &[f64]) -> Vec<ChainState> {
    let months = inbound.len().max(outbound.len());
    let mut states = Vec::with_capacity(months);
    let mut opening = seed;

    for idx in 0..months {
        let inbound = inbound.get(idx).copied().unwrap_or(0.0);
        let outbound = outbound.get(idx).copied().unwrap_or(0.0);
        let closing = opening + inbound - outbound;
        states.push(ChainState {
            month: idx as u32 + 1,
            opening_stock: opening,
            inbound,
            outbound,
            closing_stock: closing,
        });
        opening = closing;
    }

    states
}

// ==========================================
// 线程池
// ==========================================
// 使用 crate 内独立线程池；构建失败时退化为单线程
static CHAIN_POOL: OnceLock<Option<ThreadPool>> = OnceLock::new();

fn build_chain_pool() -> Option<ThreadPool> {
    let requested = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    let try_build = |n| rayon::ThreadPoolBuilder::new().num_threads(n).build();

    match try_build(requested) {
        Ok(pool) => Some(pool),
        Err(_) if requested > 1 => try_build(1).ok(),
        Err(_) => None,
    }
}

fn chain_pool() -> Option<&'static ThreadPool> {
    CHAIN_POOL.get_or_init(build_chain_pool).as_ref()
}

/// 一条链的全部输入
#[derive(Debug, Clone)]
struct ChainInput {
    warehouse: WarehouseCode,
    sku: String,
    seed: f64,
    inbound: Vec<f64>,
    outbound: Vec<f64>,
    max_supply: Vec<f64>,
}

fn run_chain(input: &ChainInput) -> Vec<ChainState> {
    chain(input.seed, &input.inbound, &input.outbound)
}

/// 阶段4 输出
#[derive(Debug, Clone, Default)]
pub struct BalanceOutput {
    pub balances: Vec<WarehouseBalanceRecord>,
    pub storage: Vec<SkuMonthStorage>,
}

pub struct WarehouseBalanceEngine<'a> {
    lookups: &'a LookupTables,
    config: &'a PipelineConfig,
}

impl<'a> WarehouseBalanceEngine<'a> {
    pub fn new(lookups: &'a LookupTables, config: &'a PipelineConfig) -> Self {
        Self { lookups, config }
    }

    /// 生产来源份额: 各实体仓按同址工厂产能占比；总产能为 0 时全部归虚拟仓
    pub fn inbound_shares(&self, sku: &str) -> [(WarehouseCode, f64); 4] {
        let capacity_of = |warehouse: WarehouseCode| {
            self.config
                .site(warehouse)
                .and_then(|site| {
                    self.lookups
                        .capacity
                        .factory_capacity(sku, &site.colocated_factory)
                })
                .unwrap_or(0.0)
                .max(0.0)
        };

        let caps = WarehouseCode::PHYSICAL.map(capacity_of);
        let total: f64 = caps.iter().sum();

        if total > 0.0 {
            [
                (WarehouseCode::A, caps[0] / total),
                (WarehouseCode::B, caps[1] / total),
                (WarehouseCode::C, caps[2] / total),
                (WarehouseCode::Placeholder, 0.0),
            ]
        } else {
            [
                (WarehouseCode::A, 0.0),
                (WarehouseCode::B, 0.0),
                (WarehouseCode::C, 0.0),
                (WarehouseCode::Placeholder, 1.0),
            ]
        }
    }

    #[instrument(skip(self, demand, supply, gaps), fields(demand = demand.len(), supply = supply.len()))]
    pub fn compute(
        &self,
        batch_id: &str,
        demand: &[DemandRecord],
        supply: &[SupplyRecord],
        gaps: &mut DataGapLog,
    ) -> BalanceOutput {
        let skus: BTreeSet<&str> = demand.iter().map(|d| d.sku.as_str()).collect();

        // SKU × 月 MTS/MTO 需求
        let mut planned_demand: HashMap<(&str, u32), f64> = HashMap::new();
        for d in demand.iter().filter(|d| d.production_environment.is_planned_production()) {
            *planned_demand.entry((d.sku.as_str(), d.month)).or_insert(0.0) += d.demand_cases;
        }

        // (仓库, SKU, 月) 计划发运
        let mut planned_shipment: HashMap<(WarehouseCode, &str, u32), f64> = HashMap::new();
        for s in supply {
            *planned_shipment
                .entry((s.warehouse, s.sku.as_str(), s.month))
                .or_insert(0.0) += s.qty;
        }

        let mut inputs = Vec::with_capacity(skus.len() * WarehouseCode::ALL.len());
        for sku in &skus {
            for (warehouse, share) in self.inbound_shares(sku) {
                let stock = self.lookups.warehouse_stock.get(warehouse, sku);
                let seed = if warehouse.is_placeholder() {
                    0.0
                } else {
                    match stock {
                        Some(entry) => entry.opening_stock,
                        None => {
                            gaps.record(
                                DataGapKind::MissingOpeningStock,
                                format!("{}/{}", warehouse, sku),
                                "期初库存缺失，按 0 计",
                            );
                            0.0
                        }
                    }
                };

                let mut inbound = Vec::with_capacity(HORIZON_MONTHS as usize);
                let mut outbound = Vec::with_capacity(HORIZON_MONTHS as usize);
                let mut max_supply = Vec::with_capacity(HORIZON_MONTHS as usize);
                for month in horizon() {
                    // 本月入库 = 下月计划需求 × 份额；末月无下期
                    let next = if month < HORIZON_MONTHS {
                        planned_demand.get(&(*sku, month + 1)).copied().unwrap_or(0.0)
                    } else {
                        0.0
                    };
                    inbound.push(next * share);

                    let planned = planned_shipment
                        .get(&(warehouse, *sku, month))
                        .copied()
                        .unwrap_or(0.0);
                    let cap = if warehouse.is_placeholder() {
                        planned
                    } else {
                        stock.map(|s| s.monthly_capacity).unwrap_or(0.0)
                    };
                    outbound.push(planned.min(cap));
                    max_supply.push(cap);
                }

                inputs.push(ChainInput {
                    warehouse,
                    sku: sku.to_string(),
                    seed,
                    inbound,
                    outbound,
                    max_supply,
                });
            }
        }

        let chains: Vec<Vec<ChainState>> = match chain_pool() {
            Some(pool) => pool.install(|| inputs.par_iter().map(run_chain).collect()),
            None => inputs.iter().map(run_chain).collect(),
        };

        let output = self.assemble(batch_id, &inputs, chains);
        info!(
            batch_id,
            chains = inputs.len(),
            balances = output.balances.len(),
            storage = output.storage.len(),
            "库存滚动完成"
        );
        output
    }

    fn assemble(
        &self,
        batch_id: &str,
        inputs: &[ChainInput],
        chains: Vec<Vec<ChainState>>,
    ) -> BalanceOutput {
        let unit_cost = self.config.effective_unit_storage_cost();
        let mut balances = Vec::with_capacity(inputs.len() * HORIZON_MONTHS as usize);
        // (SKU, 月) → (期初合计, 期末合计)
        let mut totals: BTreeMap<(String, u32), (f64, f64)> = BTreeMap::new();

        for (input, states) in inputs.iter().zip(chains) {
            for state in states {
                let idx = (state.month - 1) as usize;
                balances.push(WarehouseBalanceRecord {
                    upload_batch_id: batch_id.to_string(),
                    ordinal: balances.len() + 1,
                    warehouse: input.warehouse,
                    sku: input.sku.clone(),
                    month: state.month,
                    opening_stock: state.opening_stock,
                    inbound: state.inbound,
                    outbound: state.outbound,
                    closing_stock: state.closing_stock,
                    max_supply: input.max_supply.get(idx).copied().unwrap_or(0.0),
                    storage_cost: state.average_stock() * unit_cost,
                    opening_within_bounds: self.config.within_bounds(state.opening_stock),
                    closing_within_bounds: self.config.within_bounds(state.closing_stock),
                });

                let entry = totals
                    .entry((input.sku.clone(), state.month))
                    .or_insert((0.0, 0.0));
                entry.0 += state.opening_stock;
                entry.1 += state.closing_stock;
            }
        }

        let storage = totals
            .into_iter()
            .map(|((sku, month), (total_opening, total_closing))| {
                let average_stock = (total_opening + total_closing) / 2.0;
                SkuMonthStorage {
                    upload_batch_id: batch_id.to_string(),
                    sku,
                    month,
                    total_opening,
                    total_closing,
                    average_stock,
                    storage_cost: average_stock * unit_cost,
                }
            })
            .collect();

        BalanceOutput { balances, storage }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::lookup::{CapacityTable, FactoryCapacityRow, WarehouseStockRow, WarehouseStockTable};
    use crate::domain::types::{MarketClass, ProductionEnvironment, StageName, StorageCostVariant};

    #[test]
    fn test_chain_rolls_forward_without_clamping() {
        let states = chain(100.0, &[20.0, 20.0, 20.0], &[30.0, 10.0, 50.0]);
        let closing: Vec<f64> = states.iter().map(|s| s.closing_stock).collect();
        assert_eq!(closing, vec![90.0, 100.0, 70.0]);
        assert_eq!(states[1].average_stock(), 95.0);

        let negative = chain(5.0, &[0.0], &[20.0]);
        assert_eq!(negative[0].closing_stock, -15.0);
    }

    #[test]
    fn test_chain_continuity() {
        let states = chain(7.0, &[1.0, 2.0, 3.0, 4.0], &[4.0, 3.0, 2.0]);
        assert_eq!(states.len(), 4);
        for pair in states.windows(2) {
            assert_eq!(pair[1].opening_stock, pair[0].closing_stock);
        }
        assert_eq!(states[3].outbound, 0.0);
    }

    fn demand(sku: &str, month: u32, cases: f64, env: ProductionEnvironment) -> DemandRecord {
        DemandRecord {
            upload_batch_id: "B1".to_string(),
            ordinal: month as usize,
            country: "KSA".to_string(),
            sku: sku.to_string(),
            month,
            demand_cases: cases,
            market_class: MarketClass::Home,
            production_environment: env,
            safety_stock_warehouse: WarehouseCode::A,
            inventory_days_norm: 30.0,
            supply_reference: None,
            consumption_formula: None,
        }
    }

    fn lookups() -> LookupTables {
        LookupTables {
            capacity: CapacityTable::from_rows(
                vec![],
                vec![
                    FactoryCapacityRow { sku: "100".to_string(), factory: "F1".to_string(), monthly_capacity: 300.0 },
                    FactoryCapacityRow { sku: "100".to_string(), factory: "F2".to_string(), monthly_capacity: 100.0 },
                ],
            ),
            warehouse_stock: WarehouseStockTable::from_rows(vec![
                WarehouseStockRow { warehouse: WarehouseCode::A, sku: "100".to_string(), opening_stock: 100.0, monthly_capacity: 25.0 },
                WarehouseStockRow { warehouse: WarehouseCode::B, sku: "100".to_string(), opening_stock: 10.0, monthly_capacity: 0.0 },
            ]),
            ..LookupTables::default()
        }
    }

    #[test]
    fn test_inbound_shares_follow_colocated_capacity() {
        let lookups = lookups();
        let config = PipelineConfig::default();
        let engine = WarehouseBalanceEngine::new(&lookups, &config);

        let shares = engine.inbound_shares("100");
        assert_eq!(shares[0], (WarehouseCode::A, 0.75));
        assert_eq!(shares[1], (WarehouseCode::B, 0.25));
        assert_eq!(shares[3], (WarehouseCode::Placeholder, 0.0));

        let orphan = engine.inbound_shares("999");
        assert_eq!(orphan[3], (WarehouseCode::Placeholder, 1.0));
    }

    #[test]
    fn test_compute_balances_and_storage() {
        let lookups = lookups();
        let config = PipelineConfig {
            unit_storage_cost: 2.0,
            storage_cost_variant: StorageCostVariant::Markdown,
            ..PipelineConfig::default()
        };
        let engine = WarehouseBalanceEngine::new(&lookups, &config);
        let mut gaps = DataGapLog::new("B1", StageName::WarehouseBalance);

        let demand: Vec<DemandRecord> = horizon()
            .map(|m| demand("100", m, if m == 2 { 40.0 } else { 0.0 }, ProductionEnvironment::Mts))
            .collect();
        let supply = vec![SupplyRecord {
            upload_batch_id: "B1".to_string(),
            ordinal: 1,
            country: "KSA".to_string(),
            sku: "100".to_string(),
            month: 1,
            warehouse: WarehouseCode::A,
            transport_cost: 0.0,
            max_capacity: Some(25.0),
            weight_per_unit: 0.0,
            qty: 30.0,
            wt: 0.0,
            position_ok: true,
            qty_within_max: false,
        }];

        let out = engine.compute("B1", &demand, &supply, &mut gaps);
        assert_eq!(out.balances.len(), 4 * 12);
        assert_eq!(out.storage.len(), 12);

        // A 第 1 月: 入库 = 40 × 0.75，出库受 25 上限约束
        let a1 = &out.balances[0];
        assert_eq!((a1.warehouse, a1.month), (WarehouseCode::A, 1));
        assert_eq!(a1.inbound, 30.0);
        assert_eq!(a1.outbound, 25.0);
        assert_eq!(a1.closing_stock, 105.0);
        assert_eq!(a1.max_supply, 25.0);
        // (100 + 105) / 2 × 2.0 × 0.5
        assert_eq!(a1.storage_cost, 102.5);

        // C 无期初库存 → 缺口；虚拟仓静默
        assert_eq!(gaps.len(), 1);
        assert_eq!(gaps.gaps()[0].key, "C/100");

        let month1 = &out.storage[0];
        assert_eq!(month1.total_opening, 110.0);
        assert_eq!(month1.total_closing, 110.0 + 40.0 - 25.0);
        assert_eq!(month1.average_stock, (month1.total_opening + month1.total_closing) / 2.0);
        assert_eq!(month1.storage_cost, month1.average_stock);

        for pair in out.balances.windows(2) {
            if pair[0].warehouse == pair[1].warehouse {
                assert_eq!(pair[1].opening_stock, pair[0].closing_stock);
            }
        }
    }
}
