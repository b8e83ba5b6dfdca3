// ==========================================
// 需求供应规划系统 - 原始单元格存储接口
// ==========================================
// 外部协作方: 表格导入方写入 (workbook, sheet, row, col, column_name, value)
// 管道只读；按 upload_batch_id + 逻辑工作表名读取
// ==========================================

use crate::importer::error::ImportResult;
use std::collections::HashMap;
use std::sync::RwLock;

/// 单个原始单元格
#[derive(Debug, Clone, PartialEq)]
pub struct RawCell {
    pub workbook: String,
    pub row_index: usize,
    pub col_index: usize,
    pub column_name: String,
    pub value: Option<String>,
}

impl RawCell {
    pub fn new(row_index: usize, col_index: usize, column_name: &str, value: &str) -> Self {
        Self {
            workbook: String::new(),
            row_index,
            col_index,
            column_name: column_name.to_string(),
            value: Some(value.to_string()),
        }
    }
}

// ==========================================
// CellStore Trait
// ==========================================
// 实现者: RawCellRepository（raw_cell 表）、MemoryCellStore（内存）
pub trait CellStore: Send + Sync {
    /// 读取某批次某逻辑工作表的全部单元格
    ///
    /// # 返回
    /// - Ok(Vec<RawCell>): 单元格（空表示工作表不存在）
    /// - Err: 存储访问失败
    fn read_sheet(&self, batch_id: &str, sheet_name: &str) -> ImportResult<Vec<RawCell>>;
}

// ==========================================
// MemoryCellStore - 内存实现
// ==========================================
#[derive(Default)]
pub struct MemoryCellStore {
    sheets: RwLock<HashMap<(String, String), Vec<RawCell>>>,
}

impl MemoryCellStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 以表格形式写入一个工作表
    ///
    /// # 参数
    /// - header_row: 表头所在行（0 起）
    /// - headers: 列名
    /// - rows: 数据行（紧跟表头之后）
    pub fn put_table(
        &self,
        batch_id: &str,
        sheet_name: &str,
        header_row: usize,
        headers: &[&str],
        rows: &[Vec<&str>],
    ) {
        let mut cells = Vec::new();
        for (col, name) in headers.iter().enumerate() {
            cells.push(RawCell::new(header_row, col, name, name));
        }
        for (offset, row) in rows.iter().enumerate() {
            for (col, value) in row.iter().enumerate() {
                if let Some(name) = headers.get(col) {
                    cells.push(RawCell::new(header_row + 1 + offset, col, name, value));
                }
            }
        }
        self.put_cells(batch_id, sheet_name, cells);
    }

    pub fn put_cells(&self, batch_id: &str, sheet_name: &str, cells: Vec<RawCell>) {
        if let Ok(mut sheets) = self.sheets.write() {
            sheets
                .entry((batch_id.to_string(), sheet_name.to_string()))
                .or_default()
                .extend(cells);
        }
    }
}

impl CellStore for MemoryCellStore {
    fn read_sheet(&self, batch_id: &str, sheet_name: &str) -> ImportResult<Vec<RawCell>> {
        let sheets = self
            .sheets
            .read()
            .map_err(|e| crate::importer::error::ImportError::CellStoreError(e.to_string()))?;
        Ok(sheets
            .get(&(batch_id.to_string(), sheet_name.to_string()))
            .cloned()
            .unwrap_or_default())
    }
}
