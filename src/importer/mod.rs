// ==========================================
// 需求供应规划系统 - 输入读取层
// ==========================================
// 职责: 从原始单元格存储读取逻辑工作表，映射为类型化输入行
// 不负责: 电子表格文件解析（由外部导入方写入单元格存储）
// ==========================================

pub mod cell_store;
pub mod error;
pub mod sheet_reader;

// 重导出核心类型
pub use cell_store::{CellStore, MemoryCellStore, RawCell};
pub use error::{ImportError, ImportResult};
pub use sheet_reader::{clean_code, SheetKind, SheetReader, SheetRow};
