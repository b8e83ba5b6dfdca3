// ==========================================
// 需求供应规划系统 - 零运费规则表
// ==========================================
// 有序规则表，首条命中生效:
// 1. 虚拟仓 → 0
// 2. 仓库所在国 == 目的国 → 0
// 3. 工厂 == 仓库同址工厂 → 0（仅调拨段）
// 4. 运价表 (工厂, 国家, SKU)，未命中按 0 并标记 FREIGHT_MISSING
// ==========================================

use crate::config::WarehouseSite;
use crate::domain::lookup::{normalize_key, FreightCostTable};
use crate::domain::types::{CostRule, WarehouseCode};

/// 单条运输路线的判定上下文
#[derive(Debug, Clone, Copy)]
pub struct RouteContext<'a> {
    pub warehouse: WarehouseCode,
    pub site: Option<&'a WarehouseSite>,
    /// 调拨段的发货工厂；None 表示仓库直发段（运价按同址工厂查）
    pub factory: Option<&'a str>,
    pub country: &'a str,
    pub sku: &'a str,
}

impl<'a> RouteContext<'a> {
    /// 运价查询使用的始发工厂
    pub fn origin_factory(&self) -> Option<&'a str> {
        self.factory
            .or_else(|| self.site.map(|s| s.colocated_factory.as_str()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CostDecision {
    pub rule: CostRule,
    pub cost_per_unit: f64,
}

type RulePredicate = fn(&RouteContext<'_>) -> bool;

fn is_placeholder(ctx: &RouteContext<'_>) -> bool {
    ctx.warehouse.is_placeholder()
}

fn is_intra_country(ctx: &RouteContext<'_>) -> bool {
    ctx.site
        .map(|s| normalize_key(&s.home_country) == normalize_key(ctx.country))
        .unwrap_or(false)
}

fn is_intra_site(ctx: &RouteContext<'_>) -> bool {
    match (ctx.site, ctx.factory) {
        (Some(site), Some(factory)) => {
            normalize_key(&site.colocated_factory) == normalize_key(factory)
        }
        _ => false,
    }
}

const ZERO_COST_RULES: [(CostRule, RulePredicate); 3] = [
    (CostRule::PlaceholderWarehouse, is_placeholder),
    (CostRule::IntraCountry, is_intra_country),
    (CostRule::IntraSite, is_intra_site),
];

/// 按规则表判定单价
pub fn evaluate(ctx: &RouteContext<'_>, freight: &FreightCostTable) -> CostDecision {
    if let Some((rule, _)) = ZERO_COST_RULES.iter().find(|(_, applies)| applies(ctx)) {
        return CostDecision {
            rule: *rule,
            cost_per_unit: 0.0,
        };
    }

    match ctx
        .origin_factory()
        .and_then(|factory| freight.lookup(factory, ctx.country, ctx.sku))
    {
        Some(rate) => CostDecision {
            rule: CostRule::Freight,
            cost_per_unit: rate,
        },
        None => CostDecision {
            rule: CostRule::FreightMissing,
            cost_per_unit: 0.0,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::lookup::FreightRateRow;

    fn site() -> WarehouseSite {
        WarehouseSite {
            warehouse: WarehouseCode::A,
            home_country: "KSA".to_string(),
            colocated_factory: "F1".to_string(),
        }
    }

    fn freight() -> FreightCostTable {
        FreightCostTable::from_rows(vec![
            FreightRateRow {
                factory: "F2".to_string(),
                country: "UAE".to_string(),
                sku: "100".to_string(),
                rate: 3.5,
            },
            FreightRateRow {
                factory: "F1".to_string(),
                country: "UAE".to_string(),
                sku: "100".to_string(),
                rate: 1.25,
            },
        ])
    }

    #[test]
    fn test_first_match_wins() {
        let site = site();
        let freight = freight();

        // 同国优先于同址
        let ctx = RouteContext {
            warehouse: WarehouseCode::A,
            site: Some(&site),
            factory: Some("F1"),
            country: "ksa",
            sku: "100",
        };
        assert_eq!(evaluate(&ctx, &freight).rule, CostRule::IntraCountry);

        let ctx = RouteContext {
            country: "UAE",
            ..ctx
        };
        assert_eq!(evaluate(&ctx, &freight).rule, CostRule::IntraSite);

        let ctx = RouteContext {
            factory: Some("F2"),
            ..ctx
        };
        let decision = evaluate(&ctx, &freight);
        assert_eq!(decision.rule, CostRule::Freight);
        assert_eq!(decision.cost_per_unit, 3.5);
    }

    #[test]
    fn test_placeholder_is_always_free() {
        let freight = freight();
        let ctx = RouteContext {
            warehouse: WarehouseCode::Placeholder,
            site: None,
            factory: Some("F2"),
            country: "UAE",
            sku: "100",
        };
        let decision = evaluate(&ctx, &freight);
        assert_eq!(decision.rule, CostRule::PlaceholderWarehouse);
        assert_eq!(decision.cost_per_unit, 0.0);
    }

    #[test]
    fn test_direct_leg_uses_colocated_factory_rate() {
        let site = site();
        let freight = freight();
        let ctx = RouteContext {
            warehouse: WarehouseCode::A,
            site: Some(&site),
            factory: None,
            country: "UAE",
            sku: "100",
        };
        let decision = evaluate(&ctx, &freight);
        assert_eq!(decision.rule, CostRule::Freight);
        assert_eq!(decision.cost_per_unit, 1.25);

        let ctx = RouteContext { sku: "200", ..ctx };
        assert_eq!(evaluate(&ctx, &freight).rule, CostRule::FreightMissing);
    }
}
