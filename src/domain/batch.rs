// ==========================================
// 需求供应规划系统 - 批次与数据缺口
// ==========================================
// 批次: 一次完整管道运行的幂等替换单元
// 数据缺口: 查表未命中（行被丢弃或取 0），记录但不阻断
// ==========================================

use crate::domain::types::{BatchStatus, StageName};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// UploadBatch - 批次状态
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadBatch {
    pub batch_id: String,
    pub status: BatchStatus,
    pub current_stage: Option<StageName>,
    pub error_message: Option<String>,
    pub demand_count: usize,
    pub supply_count: usize,
    pub distribution_count: usize,
    pub balance_count: usize,
    pub data_gap_count: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

// ==========================================
// DataGap - 数据缺口
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataGapKind {
    UnmappedCountry,
    MissingFreightRate,
    MissingEnvironmentNorm,
    MissingOpeningStock,
    MissingProductWeight,
    InvalidMonth,
    InvalidNumber,
}

impl fmt::Display for DataGapKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DataGapKind::UnmappedCountry => "UNMAPPED_COUNTRY",
            DataGapKind::MissingFreightRate => "MISSING_FREIGHT_RATE",
            DataGapKind::MissingEnvironmentNorm => "MISSING_ENVIRONMENT_NORM",
            DataGapKind::MissingOpeningStock => "MISSING_OPENING_STOCK",
            DataGapKind::MissingProductWeight => "MISSING_PRODUCT_WEIGHT",
            DataGapKind::InvalidMonth => "INVALID_MONTH",
            DataGapKind::InvalidNumber => "INVALID_NUMBER",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataGap {
    pub batch_id: String,
    pub stage: StageName,
    pub kind: DataGapKind,
    pub key: String,
    pub detail: String,
}

/// 数据缺口收集器（同时写 warn 日志）
#[derive(Debug, Clone)]
pub struct DataGapLog {
    batch_id: String,
    stage: StageName,
    gaps: Vec<DataGap>,
}

impl DataGapLog {
    pub fn new(batch_id: &str, stage: StageName) -> Self {
        Self {
            batch_id: batch_id.to_string(),
            stage,
            gaps: Vec::new(),
        }
    }

    pub fn record(&mut self, kind: DataGapKind, key: impl Into<String>, detail: impl Into<String>) {
        let gap = DataGap {
            batch_id: self.batch_id.clone(),
            stage: self.stage,
            kind,
            key: key.into(),
            detail: detail.into(),
        };
        tracing::warn!(
            batch_id = %gap.batch_id,
            stage = %gap.stage,
            kind = %gap.kind,
            key = %gap.key,
            detail = %gap.detail,
            "数据缺口"
        );
        self.gaps.push(gap);
    }

    pub fn len(&self) -> usize {
        self.gaps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gaps.is_empty()
    }

    pub fn gaps(&self) -> &[DataGap] {
        &self.gaps
    }

    pub fn into_gaps(self) -> Vec<DataGap> {
        self.gaps
    }
}

// ==========================================
// PipelineRunSummary - 一次运行的汇总
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRunSummary {
    pub batch_id: String,
    pub demand_count: usize,
    pub supply_count: usize,
    pub distribution_count: usize,
    pub balance_count: usize,
    pub storage_summary_count: usize,
    pub data_gaps: Vec<DataGap>,
    pub elapsed_ms: u128,
}
