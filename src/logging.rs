// ==========================================
// 需求供应规划系统 - 日志初始化
// ==========================================
// 使用 tracing 和 tracing-subscriber
// 数据缺口以 warn 级别输出，字段: batch_id / stage / kind / key
// ==========================================

use tracing_subscriber::{fmt, EnvFilter};

/// 初始化日志系统
///
/// # 环境变量
/// - RUST_LOG: 日志级别过滤器（默认: info）
///   例如: RUST_LOG=supply_planner=debug,perf=info
/// - SUPPLY_PLANNER_LOG_JSON=1: 输出 JSON 行日志（便于按 batch_id 检索）
///
/// # 示例
/// ```no_run
/// use supply_planner::logging;
/// logging::init();
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let json = std::env::var("SUPPLY_PLANNER_LOG_JSON")
        .map(|v| v.trim() == "1")
        .unwrap_or(false);

    let builder = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_line_number(true);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// 初始化测试环境的日志系统（可重复调用）
pub fn init_test() {
    let _ = fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}
