// ==========================================
// 需求供应规划系统 - 命令行入口
// ==========================================
// 用法: supply-planner [db_path] [batch_id]
// - db_path 缺省: db::default_db_path()
// - batch_id 缺省: 新 UUID（此时 raw_cell 中需已有该批次数据）
// 输出: 运行汇总 JSON（stdout）
// ==========================================

use std::error::Error;
use std::sync::{Arc, Mutex};

use supply_planner::db::{default_db_path, init_schema, open_sqlite_connection};
use supply_planner::repository::RawCellRepository;
use supply_planner::{logging, ConfigManager, PipelineOrchestrator, PipelineRepositories};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    logging::init();

    let db_path = std::env::args().nth(1).unwrap_or_else(default_db_path);
    let batch_id = std::env::args()
        .nth(2)
        .unwrap_or_else(PipelineOrchestrator::<ConfigManager>::new_batch_id);

    tracing::info!("==================================================");
    tracing::info!("{} v{}", supply_planner::APP_NAME, supply_planner::VERSION);
    tracing::info!(db_path = %db_path, batch_id = %batch_id, "使用数据库");
    tracing::info!("==================================================");

    let conn = open_sqlite_connection(&db_path)?;
    init_schema(&conn)?;
    let conn = Arc::new(Mutex::new(conn));

    let config = Arc::new(ConfigManager::from_connection(conn.clone())?);
    let cell_store = Arc::new(RawCellRepository::from_connection(conn.clone()));
    let repos = PipelineRepositories::from_connection(conn);

    let orchestrator = PipelineOrchestrator::new(config, cell_store, repos);
    let summary = orchestrator.run_batch(&batch_id).await?;

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
