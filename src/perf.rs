// ==========================================
// 需求供应规划系统 - 阶段性能统计
// ==========================================
// 职责: 每个管道阶段的耗时 + SQL 语句数 + 慢 SQL 数
// 开关:
// - SUPPLY_PLANNER_PERF_SQL=1 强制开启 SQL 计数（Debug 默认开启）
// - SUPPLY_PLANNER_SLOW_SQL_MS=50 慢 SQL 阈值（毫秒）
// ==========================================

use crate::domain::types::StageName;
use rusqlite::Connection;
use std::cell::Cell;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

static SQL_HOOKS_ENABLED: AtomicBool = AtomicBool::new(false);
static SLOW_SQL_MS: AtomicU64 = AtomicU64::new(0);

thread_local! {
    // 当前线程上活跃的阶段计时器数量（嵌套时只计一次）
    static ACTIVE_STAGES: Cell<u32> = const { Cell::new(0) };
    static STATEMENTS: Cell<u64> = const { Cell::new(0) };
    static SLOW_STATEMENTS: Cell<u64> = const { Cell::new(0) };
}

fn env_flag(name: &str) -> Option<bool> {
    std::env::var(name).ok().map(|v| {
        matches!(
            v.trim().to_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        )
    })
}

/// 为连接安装 trace/profile 回调
pub fn install_sqlite_tracing(conn: &mut Connection) {
    let enabled = env_flag("SUPPLY_PLANNER_PERF_SQL").unwrap_or(cfg!(debug_assertions));
    SQL_HOOKS_ENABLED.store(enabled, Ordering::Relaxed);

    if !enabled {
        conn.trace(None);
        conn.profile(None);
        return;
    }

    let slow_ms = std::env::var("SUPPLY_PLANNER_SLOW_SQL_MS")
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(200);
    SLOW_SQL_MS.store(slow_ms, Ordering::Relaxed);

    conn.trace(Some(on_statement));
    conn.profile(Some(on_profile));
}

fn stage_active() -> bool {
    ACTIVE_STAGES.with(|d| d.get() > 0)
}

fn on_statement(_sql: &str) {
    if SQL_HOOKS_ENABLED.load(Ordering::Relaxed) && stage_active() {
        STATEMENTS.with(|c| c.set(c.get().saturating_add(1)));
    }
}

fn on_profile(sql: &str, duration: Duration) {
    if !SQL_HOOKS_ENABLED.load(Ordering::Relaxed) {
        return;
    }
    let ms = duration.as_millis() as u64;
    let threshold = SLOW_SQL_MS.load(Ordering::Relaxed);
    if threshold == 0 || ms < threshold {
        return;
    }

    let sql_short: String = sql.split_whitespace().collect::<Vec<_>>().join(" ");
    let sql_short: String = sql_short.chars().take(300).collect();
    tracing::warn!(target: "slow_sql", duration_ms = ms, sql = %sql_short, "慢 SQL");
    if stage_active() {
        SLOW_STATEMENTS.with(|c| c.set(c.get().saturating_add(1)));
    }
}

// ==========================================
// StageTimer - 阶段计时 Guard
// ==========================================
/// 使用方式：
/// ```ignore
/// let _timer = supply_planner::perf::StageTimer::start("batch-1", StageName::SupplyExpand);
/// // do work...
/// ```
pub struct StageTimer {
    batch_id: String,
    stage: StageName,
    started: Instant,
    statements_at_start: u64,
    slow_at_start: u64,
}

impl StageTimer {
    pub fn start(batch_id: &str, stage: StageName) -> Self {
        ACTIVE_STAGES.with(|d| d.set(d.get().saturating_add(1)));
        Self {
            batch_id: batch_id.to_string(),
            stage,
            started: Instant::now(),
            statements_at_start: STATEMENTS.with(|c| c.get()),
            slow_at_start: SLOW_STATEMENTS.with(|c| c.get()),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

impl Drop for StageTimer {
    fn drop(&mut self) {
        let sql_count = STATEMENTS
            .with(|c| c.get())
            .saturating_sub(self.statements_at_start);
        let slow_sql_count = SLOW_STATEMENTS
            .with(|c| c.get())
            .saturating_sub(self.slow_at_start);

        tracing::info!(
            target: "perf",
            batch_id = %self.batch_id,
            stage = %self.stage,
            elapsed_ms = self.started.elapsed().as_millis() as u64,
            sql_count,
            slow_sql_count,
            "阶段完成"
        );

        ACTIVE_STAGES.with(|d| d.set(d.get().saturating_sub(1)));
    }
}
