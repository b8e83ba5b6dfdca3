// ==========================================
// 需求供应规划系统 - 管道编排器
// ==========================================
// 流程: 读取配置 → 清空批次 → 读取输入 → 阶段1..4
// 屏障: 每个阶段输出落库后，下一阶段从库中重新读取
// 失败: 标记批次 FAILED（阶段 + 原因 + 已收集缺口数），已写入数据保留，由操作员清理重跑
// 编辑: 人工修改供应计划量后，recompute_balances 只重算阶段4
// ==========================================

use crate::config::{PipelineConfig, PipelineConfigReader};
use crate::domain::batch::{DataGap, DataGapLog, PipelineRunSummary};
use crate::domain::demand::{DemandRecord, RawDemandRow};
use crate::domain::lookup::LookupTables;
use crate::domain::types::{BatchStatus, StageName};
use crate::engine::cross_reference::CrossReferenceGenerator;
use crate::engine::demand_normalizer::DemandNormalizer;
use crate::engine::distribution_cost::DistributionCostEngine;
use crate::engine::error::{PipelineError, PipelineResult};
use crate::engine::repositories::PipelineRepositories;
use crate::engine::supply_expander::SupplyExpander;
use crate::engine::warehouse_balance::WarehouseBalanceEngine;
use crate::importer::cell_store::CellStore;
use crate::importer::sheet_reader::SheetReader;
use crate::perf::StageTimer;
use crate::repository::error::RepositoryError;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};
use uuid::Uuid;

fn storage_err<'a>(
    batch_id: &'a str,
    stage: StageName,
    key: &'a str,
) -> impl FnOnce(RepositoryError) -> PipelineError + 'a {
    move |e| PipelineError::storage(batch_id, stage, key, e)
}

/// 单次运行内各阶段计数
#[derive(Debug, Default)]
struct StageCounts {
    demand: usize,
    supply: usize,
    distribution: usize,
    balance: usize,
    storage: usize,
}

// ==========================================
// PipelineOrchestrator - 管道编排器
// ==========================================

pub struct PipelineOrchestrator<C>
where
    C: PipelineConfigReader,
{
    config_reader: Arc<C>,
    cell_store: Arc<dyn CellStore>,
    repos: PipelineRepositories,
}

impl<C> PipelineOrchestrator<C>
where
    C: PipelineConfigReader,
{
    /// 创建编排器
    ///
    /// # 参数
    /// - config_reader: 配置读取器
    /// - cell_store: 原始单元格存储（只读）
    /// - repos: 派生记录仓储
    pub fn new(
        config_reader: Arc<C>,
        cell_store: Arc<dyn CellStore>,
        repos: PipelineRepositories,
    ) -> Self {
        Self {
            config_reader,
            cell_store,
            repos,
        }
    }

    /// 生成新的批次 ID（UUID v4）
    pub fn new_batch_id() -> String {
        Uuid::new_v4().to_string()
    }

    pub fn repositories(&self) -> &PipelineRepositories {
        &self.repos
    }

    /// 执行一个批次的完整管道（破坏性替换）
    pub async fn run_batch(&self, batch_id: &str) -> PipelineResult<PipelineRunSummary> {
        info!(batch_id, "开始执行管道");

        self.repos
            .batch_repo
            .begin(batch_id)
            .map_err(storage_err(batch_id, StageName::LoadInputs, "upload_batch"))?;

        let mut stage = StageName::LoadInputs;
        let mut gaps: Vec<DataGap> = Vec::new();
        let result = self.execute(batch_id, &mut stage, &mut gaps).await;
        match result {
            Ok(summary) => {
                self.repos
                    .batch_repo
                    .complete(&summary)
                    .map_err(storage_err(batch_id, stage, "upload_batch"))?;
                info!(
                    batch_id,
                    demand = summary.demand_count,
                    supply = summary.supply_count,
                    distribution = summary.distribution_count,
                    balance = summary.balance_count,
                    data_gaps = summary.data_gaps.len(),
                    elapsed_ms = summary.elapsed_ms as u64,
                    "管道执行完成"
                );
                Ok(summary)
            }
            Err(err) => {
                self.mark_failed(batch_id, err.stage().unwrap_or(stage), &err, gaps.len());
                Err(err)
            }
        }
    }

    /// 仅重算阶段4（库存滚动），前三个阶段的数据与人工编辑保持不变
    ///
    /// 供应计划量（SupplyRecord.qty）编辑后调用；全周期重算，
    /// 使用批次保存的配置快照（缺失时读取当前配置）与批次原始输入构建查找表。
    /// 返回的 data_gaps 只含本阶段缺口。
    pub async fn recompute_balances(&self, batch_id: &str) -> PipelineResult<PipelineRunSummary> {
        let stage = StageName::WarehouseBalance;
        info!(batch_id, "开始重算库存滚动");
        let started = Instant::now();

        let batch = self
            .repos
            .batch_repo
            .find(batch_id)
            .map_err(storage_err(batch_id, stage, "upload_batch"))?
            .ok_or_else(|| PipelineError::Integrity {
                batch_id: batch_id.to_string(),
                stage,
                key: "upload_batch".to_string(),
                message: "批次不存在".to_string(),
            })?;
        if batch.status != BatchStatus::Completed {
            return Err(PipelineError::Integrity {
                batch_id: batch_id.to_string(),
                stage,
                key: "upload_batch".to_string(),
                message: format!("批次状态为 {}，需先完整运行", batch.status),
            });
        }

        let config = self.batch_config(batch_id).await?;
        let mut gaps: Vec<DataGap> = Vec::new();
        let result = self.rerun_balance_stage(batch_id, &config, &mut gaps);
        let (balance, storage) = match result {
            Ok(counts) => counts,
            Err(err) => {
                self.mark_failed(batch_id, stage, &err, gaps.len());
                return Err(err);
            }
        };

        self.repos
            .batch_repo
            .update_balance_count(batch_id, balance)
            .map_err(storage_err(batch_id, stage, "upload_batch"))?;

        let summary = PipelineRunSummary {
            batch_id: batch_id.to_string(),
            demand_count: batch.demand_count,
            supply_count: batch.supply_count,
            distribution_count: batch.distribution_count,
            balance_count: balance,
            storage_summary_count: storage,
            data_gaps: gaps,
            elapsed_ms: started.elapsed().as_millis(),
        };
        info!(
            batch_id,
            balance,
            storage,
            data_gaps = summary.data_gaps.len(),
            "库存滚动重算完成"
        );
        Ok(summary)
    }

    /// 并发执行多个批次
    pub async fn run_batches(&self, batch_ids: &[String]) -> Vec<PipelineResult<PipelineRunSummary>> {
        use futures::future::join_all;

        info!(count = batch_ids.len(), "开始批量执行管道");
        let results = join_all(batch_ids.iter().map(|id| self.run_batch(id))).await;
        info!(
            total = results.len(),
            success = results.iter().filter(|r| r.is_ok()).count(),
            failed = results.iter().filter(|r| r.is_err()).count(),
            "批量执行完成"
        );
        results
    }

    fn mark_failed(&self, batch_id: &str, stage: StageName, err: &PipelineError, gap_count: usize) {
        error!(batch_id, stage = %stage, error = %err, data_gaps = gap_count, "管道执行失败");
        if let Err(mark_err) = self
            .repos
            .batch_repo
            .fail(batch_id, stage, &err.to_string(), gap_count)
        {
            warn!(batch_id, error = %mark_err, "批次失败状态写入失败");
        }
    }

    /// 批次运行时的配置快照；旧批次无快照时回退到当前配置
    async fn batch_config(&self, batch_id: &str) -> PipelineResult<PipelineConfig> {
        let stage = StageName::WarehouseBalance;
        let snapshot = self
            .repos
            .batch_repo
            .config_snapshot(batch_id)
            .map_err(storage_err(batch_id, stage, "upload_batch"))?;
        match snapshot {
            Some(json) => serde_json::from_str(&json).map_err(|e| PipelineError::Config {
                batch_id: batch_id.to_string(),
                stage,
                key: "config_snapshot_json".to_string(),
                message: e.to_string(),
            }),
            None => self
                .config_reader
                .load_pipeline_config()
                .await
                .map_err(|e| PipelineError::Config {
                    batch_id: batch_id.to_string(),
                    stage,
                    key: "pipeline_config".to_string(),
                    message: e.to_string(),
                }),
        }
    }

    fn rerun_balance_stage(
        &self,
        batch_id: &str,
        config: &PipelineConfig,
        gaps: &mut Vec<DataGap>,
    ) -> PipelineResult<(usize, usize)> {
        let stage = StageName::WarehouseBalance;
        let lookups = SheetReader::new(self.cell_store.as_ref(), batch_id)
            .lookup_tables()
            .map_err(|e| PipelineError::from_import(batch_id, stage, e))?;

        let removed = self
            .repos
            .balance_repo
            .delete_by_batch(batch_id)
            .map_err(storage_err(batch_id, stage, "warehouse_balance_record"))?;
        info!(batch_id, removed, "已清空库存滚动旧数据");

        self.roll_balances(batch_id, config, &lookups, gaps)
    }

    async fn execute(
        &self,
        batch_id: &str,
        stage: &mut StageName,
        gaps: &mut Vec<DataGap>,
    ) -> PipelineResult<PipelineRunSummary> {
        let started = Instant::now();

        let config = self
            .config_reader
            .load_pipeline_config()
            .await
            .map_err(|e| PipelineError::Config {
                batch_id: batch_id.to_string(),
                stage: StageName::LoadInputs,
                key: "pipeline_config".to_string(),
                message: e.to_string(),
            })?;
        let snapshot = serde_json::to_string(&config).map_err(anyhow::Error::from)?;
        self.repos
            .batch_repo
            .set_config_snapshot(batch_id, &snapshot)
            .map_err(storage_err(batch_id, StageName::LoadInputs, "upload_batch"))?;

        let removed = self
            .repos
            .batch_repo
            .clear_batch_outputs(batch_id)
            .map_err(storage_err(batch_id, StageName::LoadInputs, "batch_outputs"))?;
        if removed > 0 {
            info!(batch_id, removed, "已清空批次旧数据");
        }

        let mut counts = StageCounts::default();

        self.enter(batch_id, stage, StageName::LoadInputs)?;
        let (raw_demand, lookups) = self.load_inputs(batch_id)?;

        self.enter(batch_id, stage, StageName::DemandNormalize)?;
        counts.demand = self.normalize_demand(batch_id, &config, &lookups, &raw_demand, gaps)?;

        self.enter(batch_id, stage, StageName::SupplyExpand)?;
        counts.supply = self.expand_supply(batch_id, &config, &lookups, gaps)?;

        self.enter(batch_id, stage, StageName::CrossReference)?;
        self.link_references(batch_id)?;

        self.enter(batch_id, stage, StageName::DistributionCost)?;
        counts.distribution = self.assign_distribution(batch_id, &config, &lookups, gaps)?;

        self.enter(batch_id, stage, StageName::WarehouseBalance)?;
        let (balance, storage) = self.roll_balances(batch_id, &config, &lookups, gaps)?;
        counts.balance = balance;
        counts.storage = storage;

        Ok(PipelineRunSummary {
            batch_id: batch_id.to_string(),
            demand_count: counts.demand,
            supply_count: counts.supply,
            distribution_count: counts.distribution,
            balance_count: counts.balance,
            storage_summary_count: counts.storage,
            data_gaps: std::mem::take(gaps),
            elapsed_ms: started.elapsed().as_millis(),
        })
    }

    fn enter(&self, batch_id: &str, current: &mut StageName, next: StageName) -> PipelineResult<()> {
        *current = next;
        self.repos
            .batch_repo
            .update_stage(batch_id, next)
            .map_err(storage_err(batch_id, next, "upload_batch"))
    }

    fn reload_demand(&self, batch_id: &str, stage: StageName) -> PipelineResult<Vec<DemandRecord>> {
        self.repos
            .demand_repo
            .find_by_batch(batch_id)
            .map_err(storage_err(batch_id, stage, "demand_record"))
    }

    // ==========================================
    // 各阶段
    // ==========================================

    fn load_inputs(&self, batch_id: &str) -> PipelineResult<(Vec<RawDemandRow>, LookupTables)> {
        let stage = StageName::LoadInputs;
        let _timer = StageTimer::start(batch_id, stage);

        let reader = SheetReader::new(self.cell_store.as_ref(), batch_id);
        let raw_demand = reader
            .demand_rows()
            .map_err(|e| PipelineError::from_import(batch_id, stage, e))?;
        let lookups = reader
            .lookup_tables()
            .map_err(|e| PipelineError::from_import(batch_id, stage, e))?;

        info!(batch_id, raw_demand_rows = raw_demand.len(), "输入读取完成");
        Ok((raw_demand, lookups))
    }

    fn normalize_demand(
        &self,
        batch_id: &str,
        config: &PipelineConfig,
        lookups: &LookupTables,
        raw_demand: &[RawDemandRow],
        gaps: &mut Vec<DataGap>,
    ) -> PipelineResult<usize> {
        let stage = StageName::DemandNormalize;
        let _timer = StageTimer::start(batch_id, stage);
        let mut log = DataGapLog::new(batch_id, stage);

        let records = DemandNormalizer::new(lookups, config).normalize(batch_id, raw_demand, &mut log);
        let written = self
            .repos
            .demand_repo
            .insert_batch(&records, config.insert_chunk_rows)
            .map_err(storage_err(batch_id, stage, "demand_record"))?;

        gaps.extend(log.into_gaps());
        Ok(written)
    }

    fn expand_supply(
        &self,
        batch_id: &str,
        config: &PipelineConfig,
        lookups: &LookupTables,
        gaps: &mut Vec<DataGap>,
    ) -> PipelineResult<usize> {
        let stage = StageName::SupplyExpand;
        let _timer = StageTimer::start(batch_id, stage);
        let mut log = DataGapLog::new(batch_id, stage);

        let demand = self.reload_demand(batch_id, stage)?;
        let records = SupplyExpander::new(lookups, config).expand(batch_id, &demand, &mut log);
        let written = self
            .repos
            .supply_repo
            .insert_batch(&records, config.insert_chunk_rows)
            .map_err(storage_err(batch_id, stage, "supply_record"))?;

        if written != 4 * demand.len() {
            return Err(PipelineError::Integrity {
                batch_id: batch_id.to_string(),
                stage,
                key: "supply_record".to_string(),
                message: format!("供应行数 {} != 4 × 需求行数 {}", written, demand.len()),
            });
        }

        gaps.extend(log.into_gaps());
        Ok(written)
    }

    fn link_references(&self, batch_id: &str) -> PipelineResult<usize> {
        let stage = StageName::CrossReference;
        let _timer = StageTimer::start(batch_id, stage);

        let demand = self.reload_demand(batch_id, stage)?;
        let supply = self
            .repos
            .supply_repo
            .find_by_batch(batch_id)
            .map_err(storage_err(batch_id, stage, "supply_record"))?;

        let updates = CrossReferenceGenerator::new()
            .generate(&demand, &supply)
            .map_err(|missing| PipelineError::Integrity {
                batch_id: batch_id.to_string(),
                stage,
                key: format!(
                    "{}/{}/{}/{}",
                    missing.key.0, missing.key.1, missing.key.2, missing.key.3
                ),
                message: format!("需求行 #{} 缺少供应候选", missing.demand_ordinal),
            })?;

        self.repos
            .demand_repo
            .update_references(batch_id, &updates)
            .map_err(storage_err(batch_id, stage, "demand_record"))
    }

    fn assign_distribution(
        &self,
        batch_id: &str,
        config: &PipelineConfig,
        lookups: &LookupTables,
        gaps: &mut Vec<DataGap>,
    ) -> PipelineResult<usize> {
        let stage = StageName::DistributionCost;
        let _timer = StageTimer::start(batch_id, stage);
        let mut log = DataGapLog::new(batch_id, stage);

        let demand = self.reload_demand(batch_id, stage)?;
        let records = DistributionCostEngine::new(lookups, config).assign(batch_id, &demand, &mut log)?;
        let written = self
            .repos
            .distribution_repo
            .insert_batch(&records, config.insert_chunk_rows)
            .map_err(storage_err(batch_id, stage, "distribution_record"))?;

        gaps.extend(log.into_gaps());
        Ok(written)
    }

    fn roll_balances(
        &self,
        batch_id: &str,
        config: &PipelineConfig,
        lookups: &LookupTables,
        gaps: &mut Vec<DataGap>,
    ) -> PipelineResult<(usize, usize)> {
        let stage = StageName::WarehouseBalance;
        let _timer = StageTimer::start(batch_id, stage);
        let mut log = DataGapLog::new(batch_id, stage);

        let demand = self.reload_demand(batch_id, stage)?;
        let supply = self
            .repos
            .supply_repo
            .find_by_batch(batch_id)
            .map_err(storage_err(batch_id, stage, "supply_record"))?;

        let output = WarehouseBalanceEngine::new(lookups, config).compute(batch_id, &demand, &supply, &mut log);
        let balances = self
            .repos
            .balance_repo
            .insert_balances(&output.balances, config.insert_chunk_rows)
            .map_err(storage_err(batch_id, stage, "warehouse_balance_record"))?;
        let storage = self
            .repos
            .balance_repo
            .insert_storage(&output.storage, config.insert_chunk_rows)
            .map_err(storage_err(batch_id, stage, "sku_month_storage"))?;

        gaps.extend(log.into_gaps());
        Ok((balances, storage))
    }
}
