// ==========================================
// 需求供应规划系统 - 阶段1 需求标准化
// ==========================================
// 输入: RawDemandRow + 国家映射 + 产能表
// 输出: DemandRecord，(国家, SKU) × 12 期稠密
// 红线: 单行贡献 = max(0, 原值)，负值不抵扣
// ==========================================

use crate::config::PipelineConfig;
use crate::domain::batch::{DataGapKind, DataGapLog};
use crate::domain::demand::{DemandRecord, RawDemandRow};
use crate::domain::lookup::{normalize_key, LookupTables};
use crate::domain::types::{horizon, HORIZON_MONTHS};
use crate::engine::capacity_classifier::CapacityClassifier;
use crate::engine::country_resolver::CountryResolver;
use std::collections::BTreeMap;
use tracing::{debug, info, instrument};

const EXCLUDED_CLASSIFICATION: &str = "NPD";
const EXCLUDED_ORIGIN: &str = "OTHER";

/// 月份解析（"5" / "05" / "5.0" → 5；超出 1..=12 视为无效）
pub fn parse_month(raw: &str) -> Option<u32> {
    let value: f64 = raw.trim().parse().ok()?;
    if value.fract() != 0.0 || value < 1.0 || value > HORIZON_MONTHS as f64 {
        return None;
    }
    Some(value as u32)
}

/// 数值解析（空白视为 0；无法解析返回 None）
pub fn parse_cases(raw: &str) -> Option<f64> {
    let trimmed = raw.trim().replace(',', "");
    if trimmed.is_empty() {
        return Some(0.0);
    }
    trimmed.parse::<f64>().ok().filter(|v| v.is_finite())
}

pub struct DemandNormalizer<'a> {
    lookups: &'a LookupTables,
    config: &'a PipelineConfig,
}

impl<'a> DemandNormalizer<'a> {
    pub fn new(lookups: &'a LookupTables, config: &'a PipelineConfig) -> Self {
        Self { lookups, config }
    }

    #[instrument(skip(self, raw_rows, gaps), fields(rows = raw_rows.len()))]
    pub fn normalize(
        &self,
        batch_id: &str,
        raw_rows: &[RawDemandRow],
        gaps: &mut DataGapLog,
    ) -> Vec<DemandRecord> {
        let mut resolver = CountryResolver::new(&self.lookups.country_mapping);
        let mut excluded = 0usize;

        // (国家, SKU) → 12 期累计
        let mut totals: BTreeMap<(String, String), [f64; HORIZON_MONTHS as usize]> =
            BTreeMap::new();

        for row in raw_rows {
            if row.classification.trim().eq_ignore_ascii_case(EXCLUDED_CLASSIFICATION)
                || row.origin.trim().eq_ignore_ascii_case(EXCLUDED_ORIGIN)
            {
                excluded += 1;
                continue;
            }

            let Some(country) = resolver.resolve(&row.geography, &row.market, gaps) else {
                continue;
            };

            let Some(month) = parse_month(&row.month_raw) else {
                gaps.record(
                    DataGapKind::InvalidMonth,
                    format!("DEMAND#{}", row.row_index),
                    format!("月份无效: '{}'", row.month_raw),
                );
                continue;
            };

            let value = parse_cases(&row.value_raw).unwrap_or_else(|| {
                gaps.record(
                    DataGapKind::InvalidNumber,
                    format!("DEMAND#{}", row.row_index),
                    format!("需求数量无法解析: '{}'，按 0 计", row.value_raw),
                );
                0.0
            });

            let sku = normalize_key(&row.sku);
            let months = totals
                .entry((country, sku))
                .or_insert([0.0; HORIZON_MONTHS as usize]);
            months[(month - 1) as usize] += value.max(0.0);
        }

        debug!(excluded, unmapped = resolver.unmapped_count(), "需求行过滤完成");

        let classifier = CapacityClassifier::new(&self.lookups.capacity, self.config);
        let mut records = Vec::with_capacity(totals.len() * HORIZON_MONTHS as usize);

        for ((country, sku), months) in totals {
            let class = classifier.classify(&country, &sku, gaps);
            for month in horizon() {
                records.push(DemandRecord {
                    upload_batch_id: batch_id.to_string(),
                    ordinal: records.len() + 1,
                    country: country.clone(),
                    sku: sku.clone(),
                    month,
                    demand_cases: months[(month - 1) as usize],
                    market_class: class.market_class,
                    production_environment: class.production_environment,
                    safety_stock_warehouse: class.safety_stock_warehouse,
                    inventory_days_norm: class.inventory_days_norm,
                    supply_reference: None,
                    consumption_formula: None,
                });
            }
        }

        info!(batch_id, records = records.len(), "需求标准化完成");
        records
    }
}
