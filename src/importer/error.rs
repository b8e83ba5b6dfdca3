// ==========================================
// 需求供应规划系统 - 输入读取错误类型
// ==========================================
// 范围: 从原始单元格存储读取工作表并映射为输入行
// 工具: thiserror 派生宏
// ==========================================

use thiserror::Error;

/// 输入读取错误类型
#[derive(Error, Debug)]
pub enum ImportError {
    // ===== 工作表结构错误 =====
    #[error("必需工作表缺失: {sheet}")]
    SheetMissing { sheet: String },

    #[error("工作表 {sheet} 缺少必需列: {column}")]
    ColumnMissing { sheet: String, column: String },

    // ===== 数据映射错误 =====
    #[error("类型转换失败 (工作表 {sheet}, 行 {row}, 字段 {field}): 值 {value}")]
    TypeConversionError {
        sheet: String,
        row: usize,
        field: String,
        value: String,
    },

    // ===== 存储错误 =====
    #[error("单元格存储读取失败: {0}")]
    CellStoreError(String),

    #[error("数据库查询失败: {0}")]
    DatabaseQueryError(String),

    // ===== 通用错误 =====
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// 实现 From<rusqlite::Error>
impl From<rusqlite::Error> for ImportError {
    fn from(err: rusqlite::Error) -> Self {
        ImportError::DatabaseQueryError(err.to_string())
    }
}

/// Result 类型别名
pub type ImportResult<T> = Result<T, ImportError>;
