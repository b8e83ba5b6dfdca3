// ==========================================
// 需求供应规划系统 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================
// 职责: 提供数据访问接口,屏蔽数据库细节
// 约束: 所有查询使用参数化；批量写入按参数上限分块
// ==========================================

pub mod balance_repo;
pub mod batch_repo;
pub mod bulk;
pub mod demand_repo;
pub mod distribution_repo;
pub mod error;
pub mod raw_cell_repo;
pub mod row_codec;
pub mod supply_repo;

// 重导出核心仓储
pub use balance_repo::WarehouseBalanceRepository;
pub use batch_repo::UploadBatchRepository;
pub use demand_repo::DemandRecordRepository;
pub use distribution_repo::DistributionRecordRepository;
pub use error::{RepositoryError, RepositoryResult};
pub use raw_cell_repo::RawCellRepository;
pub use supply_repo::SupplyRecordRepository;
