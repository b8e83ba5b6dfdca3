// ==========================================
// 需求供应规划系统 - 管道致命错误
// ==========================================
// 致命错误中止后续阶段，已写入的数据保留，由操作员清理重跑
// 每个变体携带 batch_id / stage / key
// ==========================================

use crate::domain::types::StageName;
use crate::importer::error::ImportError;
use crate::repository::error::RepositoryError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("[{batch_id}/{stage}] 必需工作表缺失: {key}")]
    MissingSheet {
        batch_id: String,
        stage: StageName,
        key: String,
    },

    #[error("[{batch_id}/{stage}] 工作表格式错误 ({key}): {message}")]
    MalformedSheet {
        batch_id: String,
        stage: StageName,
        key: String,
        message: String,
    },

    #[error("[{batch_id}/{stage}] 运价缺失（严格模式）: {key}")]
    MissingFreightRate {
        batch_id: String,
        stage: StageName,
        key: String,
    },

    #[error("[{batch_id}/{stage}] 批次内引用不一致 ({key}): {message}")]
    Integrity {
        batch_id: String,
        stage: StageName,
        key: String,
        message: String,
    },

    #[error("[{batch_id}/{stage}] 存储失败 ({key}): {message}")]
    Storage {
        batch_id: String,
        stage: StageName,
        key: String,
        message: String,
    },

    #[error("[{batch_id}/{stage}] 配置读取失败 ({key}): {message}")]
    Config {
        batch_id: String,
        stage: StageName,
        key: String,
        message: String,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PipelineError {
    /// 失败所在阶段（Other 无阶段信息）
    pub fn stage(&self) -> Option<StageName> {
        match self {
            PipelineError::MissingSheet { stage, .. }
            | PipelineError::MalformedSheet { stage, .. }
            | PipelineError::MissingFreightRate { stage, .. }
            | PipelineError::Integrity { stage, .. }
            | PipelineError::Storage { stage, .. }
            | PipelineError::Config { stage, .. } => Some(*stage),
            PipelineError::Other(_) => None,
        }
    }

    pub fn storage(batch_id: &str, stage: StageName, key: &str, err: RepositoryError) -> Self {
        PipelineError::Storage {
            batch_id: batch_id.to_string(),
            stage,
            key: key.to_string(),
            message: err.to_string(),
        }
    }

    /// 读取输入时的错误映射
    pub fn from_import(batch_id: &str, stage: StageName, err: ImportError) -> Self {
        let batch_id = batch_id.to_string();
        match err {
            ImportError::SheetMissing { sheet } => PipelineError::MissingSheet {
                batch_id,
                stage,
                key: sheet,
            },
            ImportError::ColumnMissing { sheet, column } => PipelineError::MalformedSheet {
                batch_id,
                stage,
                key: sheet,
                message: format!("缺少必需列 {}", column),
            },
            ImportError::TypeConversionError {
                sheet,
                row,
                field,
                value,
            } => PipelineError::MalformedSheet {
                batch_id,
                stage,
                key: format!("{}#{}", sheet, row),
                message: format!("字段 {} 无法解析: {}", field, value),
            },
            ImportError::CellStoreError(message) | ImportError::DatabaseQueryError(message) => {
                PipelineError::Storage {
                    batch_id,
                    stage,
                    key: "raw_cell".to_string(),
                    message,
                }
            }
            ImportError::Other(e) => PipelineError::Other(e),
        }
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;
