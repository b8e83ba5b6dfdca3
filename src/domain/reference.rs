// ==========================================
// 需求供应规划系统 - 位置引用
// ==========================================
// 用途: 需求行对供应行的符号引用（供导出层渲染为单元格公式）
// 约束: 引用只依赖批次内稳定序号，不是外键
// ==========================================

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecordType {
    Demand,
    Supply,
}

/// {记录类型, 批次内序号(1 起)}
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordRef {
    pub record_type: RecordType,
    pub ordinal: usize,
}

impl RecordRef {
    pub fn demand(ordinal: usize) -> Self {
        Self {
            record_type: RecordType::Demand,
            ordinal,
        }
    }

    pub fn supply(ordinal: usize) -> Self {
        Self {
            record_type: RecordType::Supply,
            ordinal,
        }
    }

    /// 渲染为 A1 风格单元格地址
    ///
    /// # 参数
    /// - column: 列字母（如 "K"）
    /// - header_rows: 数据区之前的行数（表头占用）
    pub fn to_cell_reference(&self, column: &str, header_rows: usize) -> String {
        format!("{}{}", column, self.ordinal + header_rows)
    }
}

/// 供应行求和引用（对应 4 个候选仓库行）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplyReference {
    pub members: Vec<RecordRef>,
}

impl SupplyReference {
    /// 渲染为 `=SUM(Sheet!K5,Sheet!K6,...)`
    pub fn render(&self, sheet: &str, column: &str, header_rows: usize) -> String {
        format!("=SUM({})", self.render_args(sheet, column, header_rows))
    }

    fn render_args(&self, sheet: &str, column: &str, header_rows: usize) -> String {
        self.members
            .iter()
            .map(|r| format!("{}!{}", sheet, r.to_cell_reference(column, header_rows)))
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// 需求 == 供应 校验公式
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumptionFormula {
    pub demand: RecordRef,
    pub supply: SupplyReference,
}

/// 公式渲染时各工作表的布局
#[derive(Debug, Clone)]
pub struct FormulaLayout {
    pub demand_column: String,
    pub demand_header_rows: usize,
    pub supply_sheet: String,
    pub supply_column: String,
    pub supply_header_rows: usize,
}

impl ConsumptionFormula {
    /// 渲染为 `=(E3=SUM(Supply!K5,...))`
    pub fn render(&self, layout: &FormulaLayout) -> String {
        format!(
            "=({}=SUM({}))",
            self.demand
                .to_cell_reference(&layout.demand_column, layout.demand_header_rows),
            self.supply.render_args(
                &layout.supply_sheet,
                &layout.supply_column,
                layout.supply_header_rows
            )
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_formulas() {
        let supply = SupplyReference {
            members: (5..=8).map(RecordRef::supply).collect(),
        };
        assert_eq!(
            supply.render("Supply", "K", 1),
            "=SUM(Supply!K6,Supply!K7,Supply!K8,Supply!K9)"
        );

        let formula = ConsumptionFormula {
            demand: RecordRef::demand(2),
            supply,
        };
        let layout = FormulaLayout {
            demand_column: "E".to_string(),
            demand_header_rows: 1,
            supply_sheet: "Supply".to_string(),
            supply_column: "K".to_string(),
            supply_header_rows: 1,
        };
        assert_eq!(
            formula.render(&layout),
            "=(E3=SUM(Supply!K6,Supply!K7,Supply!K8,Supply!K9))"
        );
    }
}
