// ==========================================
// 管道集成测试
// ==========================================
// 目标: 原始单元格 → 四阶段 → SQLite 持久化的完整链路
// 覆盖: 记录数、交叉引用、零运费规则、库存链连续性、
//       破坏性重跑、致命错误与批次状态、人工编辑
// ==========================================


#[cfg(test)]
mod pipeline_integration_test {
    use crate::test_helpers::*;
    use std::collections::HashMap;
    use supply_planner::config::config_keys;
    use supply_planner::domain::types::{BatchStatus, CostRule, StageName, WarehouseCode};
    use supply_planner::domain::DataGapKind;
    use supply_planner::repository::error::RepositoryError;
    use supply_planner::{PipelineError, WarehouseBalanceRecord};

    const EPS: f64 = 1e-9;

    // ==========================================
    // 完整运行
    // ==========================================

    #[tokio::test]
    async fn test_full_run_persists_all_stages() {
        let (_tmp, db_path) = create_test_db().unwrap();
        let pipeline = build_pipeline(open_shared(&db_path));
        seed_standard_workbook(&pipeline.cells, "B1");

        let summary = pipeline.orchestrator.run_batch("B1").await.unwrap();

        assert_eq!(summary.demand_count, STANDARD_DEMAND_COUNT);
        assert_eq!(summary.supply_count, STANDARD_SUPPLY_COUNT);
        assert_eq!(summary.distribution_count, STANDARD_DISTRIBUTION_COUNT);
        assert_eq!(summary.balance_count, STANDARD_BALANCE_COUNT);
        assert_eq!(summary.storage_summary_count, STANDARD_STORAGE_COUNT);

        let repos = &pipeline.repos;
        assert_eq!(repos.demand_repo.count_by_batch("B1").unwrap(), STANDARD_DEMAND_COUNT);
        assert_eq!(repos.supply_repo.count_by_batch("B1").unwrap(), STANDARD_SUPPLY_COUNT);
        assert_eq!(
            repos.distribution_repo.count_by_batch("B1").unwrap(),
            STANDARD_DISTRIBUTION_COUNT
        );

        let batch = repos.batch_repo.find("B1").unwrap().unwrap();
        assert_eq!(batch.status, BatchStatus::Completed);
        assert_eq!(batch.demand_count, STANDARD_DEMAND_COUNT);
        assert_eq!(batch.data_gap_count, summary.data_gaps.len());
        assert!(batch.error_message.is_none());
        assert!(batch.finished_at.is_some());

        // 配置快照随批次保存
        let snapshot = repos.batch_repo.config_snapshot("B1").unwrap().unwrap();
        assert!(snapshot.contains("warehouse_sites"));
    }

    #[tokio::test]
    async fn test_demand_is_aggregated_and_filtered() {
        let (_tmp, db_path) = create_test_db().unwrap();
        let pipeline = build_pipeline(open_shared(&db_path));
        seed_standard_workbook(&pipeline.cells, "B1");
        pipeline.orchestrator.run_batch("B1").await.unwrap();

        let demand = pipeline.repos.demand_repo.find_by_batch("B1").unwrap();
        let cases = |country: &str, sku: &str, month: u32| {
            demand
                .iter()
                .find(|d| d.country == country && d.sku == sku && d.month == month)
                .map(|d| d.demand_cases)
                .unwrap()
        };

        // NPD / OTHER 行不计入
        assert_eq!(cases("KSA", "100", 1), 100.0);
        assert_eq!(cases("KSA", "100", 2), 50.0);
        assert_eq!(cases("UAE", "100", 2), 0.0);
        assert_eq!(cases("JOR", "200", 3), 20.0);
        // 稠密: 无需求月份补 0
        assert_eq!(cases("JOR", "200", 12), 0.0);

        let ordinals: Vec<usize> = demand.iter().map(|d| d.ordinal).collect();
        assert_eq!(ordinals, (1..=STANDARD_DEMAND_COUNT).collect::<Vec<_>>());

        let jor = demand.iter().find(|d| d.country == "JOR").unwrap();
        assert_eq!(jor.safety_stock_warehouse, WarehouseCode::Placeholder);
        assert_eq!(jor.inventory_days_norm, 0.0);
    }

    #[tokio::test]
    async fn test_cross_references_point_at_matching_supply_rows() {
        let (_tmp, db_path) = create_test_db().unwrap();
        let pipeline = build_pipeline(open_shared(&db_path));
        seed_standard_workbook(&pipeline.cells, "B1");
        pipeline.orchestrator.run_batch("B1").await.unwrap();

        let demand = pipeline.repos.demand_repo.find_by_batch("B1").unwrap();
        let supply = pipeline.repos.supply_repo.find_by_batch("B1").unwrap();
        let by_ordinal: HashMap<usize, _> = supply.iter().map(|s| (s.ordinal, s)).collect();

        for d in &demand {
            let reference = d.supply_reference.as_ref().unwrap();
            assert_eq!(reference.members.len(), 4);
            for member in &reference.members {
                let s = by_ordinal[&member.ordinal];
                assert_eq!((s.country.as_str(), s.sku.as_str(), s.month), (d.country.as_str(), d.sku.as_str(), d.month));
            }

            let formula = d.consumption_formula.as_ref().unwrap();
            assert_eq!(formula.demand.ordinal, d.ordinal);
            assert_eq!(&formula.supply, reference);
        }
    }

    #[tokio::test]
    async fn test_zero_cost_rules_apply_to_persisted_rows() {
        let (_tmp, db_path) = create_test_db().unwrap();
        let pipeline = build_pipeline(open_shared(&db_path));
        seed_standard_workbook(&pipeline.cells, "B1");
        pipeline.orchestrator.run_batch("B1").await.unwrap();

        let supply = pipeline.repos.supply_repo.find_by_batch("B1").unwrap();
        for s in supply.iter().filter(|s| s.warehouse == WarehouseCode::Placeholder) {
            assert_eq!(s.transport_cost, 0.0);
            assert_eq!(s.max_capacity, None);
            assert!(s.position_ok);
        }

        // KSA 需求经 A 仓（KSA 本土）零运费；经 B 仓按 F2→KSA 运价
        let ksa_a = supply
            .iter()
            .find(|s| s.country == "KSA" && s.month == 1 && s.warehouse == WarehouseCode::A)
            .unwrap();
        assert_eq!(ksa_a.transport_cost, 0.0);
        assert_eq!(ksa_a.max_capacity, Some(150.0));
        assert_eq!(ksa_a.weight_per_unit, 1.5);
        let ksa_b = supply
            .iter()
            .find(|s| s.country == "KSA" && s.month == 1 && s.warehouse == WarehouseCode::B)
            .unwrap();
        assert_eq!(ksa_b.transport_cost, 3.0);

        // 无库存记录的实体仓: 上限 0 且位置标记为假
        let ksa_c = supply
            .iter()
            .find(|s| s.country == "KSA" && s.month == 1 && s.warehouse == WarehouseCode::C)
            .unwrap();
        assert_eq!(ksa_c.max_capacity, Some(0.0));
        assert!(!ksa_c.position_ok);

        let distribution = pipeline.repos.distribution_repo.find_by_batch("B1").unwrap();
        for r in &distribution {
            match r.warehouse {
                WarehouseCode::Placeholder => {
                    assert_eq!(r.cost_rule, CostRule::PlaceholderWarehouse);
                    assert_eq!(r.cost_per_unit, 0.0);
                }
                _ if r.cost_rule.is_zero_cost_exception() => assert_eq!(r.cost_per_unit, 0.0),
                _ => {}
            }
        }

        // B 仓(UAE) + 同址工厂 F2 → 同站点；A 仓(KSA) 发往 KSA → 同国
        let intra_site = distribution
            .iter()
            .find(|r| r.warehouse == WarehouseCode::B && r.factory == "F2" && r.country == "KSA")
            .unwrap();
        assert_eq!(intra_site.cost_rule, CostRule::IntraSite);
        let intra_country = distribution
            .iter()
            .find(|r| r.warehouse == WarehouseCode::A && r.factory == "F2" && r.country == "KSA")
            .unwrap();
        assert_eq!(intra_country.cost_rule, CostRule::IntraCountry);
        let freight = distribution
            .iter()
            .find(|r| r.warehouse == WarehouseCode::C && r.factory == "F1" && r.country == "UAE")
            .unwrap();
        assert_eq!(freight.cost_rule, CostRule::Freight);
        assert_eq!(freight.cost_per_unit, 2.5);
        assert_eq!(freight.max_qty, 1000.0);
    }

    #[tokio::test]
    async fn test_data_gaps_are_reported_without_failing() {
        let (_tmp, db_path) = create_test_db().unwrap();
        let pipeline = build_pipeline(open_shared(&db_path));
        seed_standard_workbook(&pipeline.cells, "B1");

        let summary = pipeline.orchestrator.run_batch("B1").await.unwrap();

        let freight_gaps: Vec<_> = summary
            .data_gaps
            .iter()
            .filter(|g| g.kind == DataGapKind::MissingFreightRate)
            .collect();
        assert!(freight_gaps.iter().any(|g| g.key == "F3/JOR/200"
            && g.stage == StageName::DistributionCost));
        assert!(freight_gaps.iter().any(|g| g.stage == StageName::SupplyExpand));

        // 同一 (工厂, 国家, SKU) 调拨运价缺口只记录一次
        let distribution_misses = freight_gaps
            .iter()
            .filter(|g| g.key == "F3/JOR/200")
            .count();
        assert_eq!(distribution_misses, 1);

        assert!(summary
            .data_gaps
            .iter()
            .any(|g| g.kind == DataGapKind::MissingOpeningStock && g.stage == StageName::WarehouseBalance));
        assert!(summary.data_gaps.iter().all(|g| g.batch_id == "B1"));
    }

    #[tokio::test]
    async fn test_balance_chains_are_continuous() {
        let (_tmp, db_path) = create_test_db().unwrap();
        let pipeline = build_pipeline(open_shared(&db_path));
        seed_standard_workbook(&pipeline.cells, "B1");
        pipeline.orchestrator.run_batch("B1").await.unwrap();

        let balances = pipeline.repos.balance_repo.find_balances_by_batch("B1").unwrap();
        let mut chains: HashMap<(WarehouseCode, String), Vec<_>> = HashMap::new();
        for b in &balances {
            chains.entry((b.warehouse, b.sku.clone())).or_default().push(b);
        }
        assert_eq!(chains.len(), 2 * 4);

        for (_, mut chain) in chains {
            chain.sort_by_key(|b| b.month);
            assert_eq!(chain.len(), 12);
            for pair in chain.windows(2) {
                assert!((pair[0].closing_stock - pair[1].opening_stock).abs() < EPS);
            }
            for b in &chain {
                let expected = b.opening_stock + b.inbound - b.outbound;
                assert!((b.closing_stock - expected).abs() < EPS);
            }
        }

        // A 仓 SKU 100: 期初 200；1 月入库 = 2 月计划需求 50 × F1 份额 2/3
        let a_jan = balances
            .iter()
            .find(|b| b.warehouse == WarehouseCode::A && b.sku == "100" && b.month == 1)
            .unwrap();
        assert_eq!(a_jan.opening_stock, 200.0);
        assert!((a_jan.inbound - 50.0 * 2.0 / 3.0).abs() < EPS);
        assert_eq!(a_jan.max_supply, 150.0);

        // 出口 SKU 200 无计划生产需求，入库全为 0
        assert!(balances
            .iter()
            .filter(|b| b.sku == "200")
            .all(|b| b.inbound == 0.0));

        let storage = pipeline.repos.balance_repo.find_storage_by_batch("B1").unwrap();
        let jan = storage.iter().find(|s| s.sku == "100" && s.month == 1).unwrap();
        assert!((jan.total_opening - 250.0).abs() < EPS);
        assert!((jan.average_stock - (jan.total_opening + jan.total_closing) / 2.0).abs() < EPS);
    }

    // ==========================================
    // 破坏性重跑
    // ==========================================

    #[tokio::test]
    async fn test_rerun_replaces_batch_outputs() {
        let (_tmp, db_path) = create_test_db().unwrap();
        let pipeline = build_pipeline(open_shared(&db_path));
        seed_standard_workbook(&pipeline.cells, "B1");

        let first = pipeline.orchestrator.run_batch("B1").await.unwrap();
        let before = pipeline.repos.distribution_repo.find_by_batch("B1").unwrap();

        // 人工编辑在重跑后被丢弃
        pipeline
            .repos
            .distribution_repo
            .update_qty("B1", before[0].ordinal, 1.0)
            .unwrap();

        let second = pipeline.orchestrator.run_batch("B1").await.unwrap();
        let after = pipeline.repos.distribution_repo.find_by_batch("B1").unwrap();

        assert_eq!(first.demand_count, second.demand_count);
        assert_eq!(first.distribution_count, second.distribution_count);
        assert_eq!(first.data_gaps.len(), second.data_gaps.len());
        assert_eq!(before, after);
        assert_eq!(after[0].qty, 0.0);
    }

    #[tokio::test]
    async fn test_batches_are_isolated() {
        let (_tmp, db_path) = create_test_db().unwrap();
        let pipeline = build_pipeline(open_shared(&db_path));
        seed_standard_workbook(&pipeline.cells, "B1");
        seed_standard_workbook(&pipeline.cells, "B2");

        let results = pipeline
            .orchestrator
            .run_batches(&["B1".to_string(), "B2".to_string()])
            .await;
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.is_ok()));

        // 删除 B1 不影响 B2
        pipeline.repos.batch_repo.clear_batch_outputs("B1").unwrap();
        assert_eq!(pipeline.repos.demand_repo.count_by_batch("B1").unwrap(), 0);
        assert_eq!(
            pipeline.repos.demand_repo.count_by_batch("B2").unwrap(),
            STANDARD_DEMAND_COUNT
        );
        assert_eq!(
            pipeline.repos.balance_repo.count_by_batch("B2").unwrap(),
            STANDARD_BALANCE_COUNT
        );
    }

    // ==========================================
    // 致命错误
    // ==========================================

    #[tokio::test]
    async fn test_missing_required_sheet_fails_batch() {
        let (_tmp, db_path) = create_test_db().unwrap();
        let pipeline = build_pipeline(open_shared(&db_path));
        put_sheet(
            &pipeline.cells,
            "B1",
            "DEMAND",
            2,
            &DEMAND_HEADERS,
            &[vec!["Saudi Arabia", "Retail", "100", "1", "10", "", "Local"]],
        );

        let err = pipeline.orchestrator.run_batch("B1").await.unwrap_err();
        assert!(matches!(err, PipelineError::MissingSheet { ref key, .. } if key == "COUNTRY_MAP"));

        let batch = pipeline.repos.batch_repo.find("B1").unwrap().unwrap();
        assert_eq!(batch.status, BatchStatus::Failed);
        assert_eq!(batch.current_stage, Some(StageName::LoadInputs));
        assert!(batch.error_message.unwrap().contains("COUNTRY_MAP"));
        assert_eq!(pipeline.repos.demand_repo.count_by_batch("B1").unwrap(), 0);
    }

    #[tokio::test]
    async fn test_malformed_number_fails_batch() {
        let (_tmp, db_path) = create_test_db().unwrap();
        let pipeline = build_pipeline(open_shared(&db_path));
        seed_standard_workbook(&pipeline.cells, "B1");
        append_rows(
            &pipeline.cells,
            "B1",
            "FACTORY_CAPACITY",
            20,
            &["SKU", "Factory", "MonthlyCapacity"],
            &[vec!["300", "F1", "lots"]],
        );

        let err = pipeline.orchestrator.run_batch("B1").await.unwrap_err();
        assert!(matches!(err, PipelineError::MalformedSheet { ref key, .. } if key == "FACTORY_CAPACITY#20"));
        assert_eq!(err.stage(), Some(StageName::LoadInputs));
    }

    #[tokio::test]
    async fn test_strict_freight_rates_abort_distribution() {
        let (_tmp, db_path) = create_test_db().unwrap();
        let pipeline = build_pipeline(open_shared(&db_path));
        pipeline
            .config
            .set_global_config_value(config_keys::STRICT_FREIGHT_RATES, "true")
            .unwrap();
        seed_standard_workbook(&pipeline.cells, "B1");

        let err = pipeline.orchestrator.run_batch("B1").await.unwrap_err();
        match &err {
            PipelineError::MissingFreightRate { batch_id, stage, key } => {
                assert_eq!(batch_id, "B1");
                assert_eq!(*stage, StageName::DistributionCost);
                assert_eq!(key, "F3/JOR/200");
            }
            other => panic!("unexpected error: {other}"),
        }

        let batch = pipeline.repos.batch_repo.find("B1").unwrap().unwrap();
        assert_eq!(batch.status, BatchStatus::Failed);
        assert_eq!(batch.current_stage, Some(StageName::DistributionCost));
        // 失败前阶段2已记录的运价缺口（C/JOR/200）计入批次
        assert_eq!(batch.data_gap_count, 1);

        // 已完成阶段的数据保留
        assert_eq!(
            pipeline.repos.supply_repo.count_by_batch("B1").unwrap(),
            STANDARD_SUPPLY_COUNT
        );
        assert_eq!(pipeline.repos.distribution_repo.count_by_batch("B1").unwrap(), 0);
    }

    #[tokio::test]
    async fn test_opening_stock_days_filter_limits_distribution() {
        let (_tmp, db_path) = create_test_db().unwrap();
        let pipeline = build_pipeline(open_shared(&db_path));
        pipeline
            .config
            .set_global_config_value(config_keys::OPENING_STOCK_DAYS_FILTER, "true")
            .unwrap();
        // SKU 200 的期初库存天数为 0
        seed_workbook(&pipeline.cells, "B1", "0");

        let summary = pipeline.orchestrator.run_batch("B1").await.unwrap();
        assert_eq!(summary.distribution_count, 2 * 12 * 4 * 2);

        let distribution = pipeline.repos.distribution_repo.find_by_batch("B1").unwrap();
        assert!(distribution.iter().all(|r| r.sku == "100"));
    }

    // ==========================================
    // 人工编辑
    // ==========================================

    #[tokio::test]
    async fn test_distribution_edits_recompute_derived_fields() {
        let (_tmp, db_path) = create_test_db().unwrap();
        let pipeline = build_pipeline(open_shared(&db_path));
        seed_standard_workbook(&pipeline.cells, "B1");
        pipeline.orchestrator.run_batch("B1").await.unwrap();

        let repo = &pipeline.repos.distribution_repo;
        let target = repo
            .find_by_batch("B1")
            .unwrap()
            .into_iter()
            .find(|r| r.cost_rule == CostRule::Freight)
            .unwrap();

        let edited = repo.update_qty("B1", target.ordinal, 10.0).unwrap();
        assert_eq!(edited.wt, 10.0 * target.weight_per_unit);
        assert!((edited.row_cost - 10.0 * target.cost_per_unit).abs() < EPS);

        let overridden = repo.set_custom_cost("B1", target.ordinal, Some(1.0)).unwrap();
        assert!((overridden.row_cost - 10.0).abs() < EPS);
        assert_eq!(overridden.cost_per_unit, target.cost_per_unit);

        let reloaded = repo.find_by_ordinal("B1", target.ordinal).unwrap().unwrap();
        assert_eq!(reloaded.custom_cost_per_unit, Some(1.0));
        assert!((reloaded.row_cost - 10.0).abs() < EPS);

        let cleared = repo.set_custom_cost("B1", target.ordinal, None).unwrap();
        assert!((cleared.row_cost - 10.0 * target.cost_per_unit).abs() < EPS);

        let err = repo
            .update_qty("B1", target.ordinal, target.max_qty + 1.0)
            .unwrap_err();
        assert!(matches!(err, RepositoryError::FieldValueError { .. }));

        let err = repo.update_qty("B1", 999_999, 1.0).unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_supply_qty_edit_flags_capacity_overrun() {
        let (_tmp, db_path) = create_test_db().unwrap();
        let pipeline = build_pipeline(open_shared(&db_path));
        seed_standard_workbook(&pipeline.cells, "B1");
        pipeline.orchestrator.run_batch("B1").await.unwrap();

        let repo = &pipeline.repos.supply_repo;
        let ksa_a = repo
            .find_by_batch("B1")
            .unwrap()
            .into_iter()
            .find(|s| s.country == "KSA" && s.month == 1 && s.warehouse == WarehouseCode::A)
            .unwrap();

        let within = repo.update_qty("B1", ksa_a.ordinal, 100.0).unwrap();
        assert!(within.qty_within_max);
        assert_eq!(within.wt, 150.0);

        let over = repo.update_qty("B1", ksa_a.ordinal, 200.0).unwrap();
        assert!(!over.qty_within_max);

        assert!(repo.update_qty("B1", ksa_a.ordinal, -1.0).is_err());
    }

    // ==========================================
    // 阶段4 单独重算
    // ==========================================

    #[tokio::test]
    async fn test_recompute_balances_applies_supply_edits() {
        let (_tmp, db_path) = create_test_db().unwrap();
        let pipeline = build_pipeline(open_shared(&db_path));
        seed_standard_workbook(&pipeline.cells, "B1");
        pipeline.orchestrator.run_batch("B1").await.unwrap();

        let before = pipeline.repos.balance_repo.find_balances_by_batch("B1").unwrap();
        assert!(before.iter().all(|b| b.outbound == 0.0));
        let storage_before = pipeline.repos.balance_repo.find_storage_by_batch("B1").unwrap();

        let supply_repo = &pipeline.repos.supply_repo;
        let supply = supply_repo.find_by_batch("B1").unwrap();
        let ordinal_of = |country: &str, month: u32| {
            supply
                .iter()
                .find(|s| {
                    s.country == country
                        && s.sku == "100"
                        && s.month == month
                        && s.warehouse == WarehouseCode::A
                })
                .unwrap()
                .ordinal
        };

        // A 仓 SKU 100 月产能 150: 1 月计划 100 + 100 超限，2 月计划 40 未超限
        supply_repo.update_qty("B1", ordinal_of("KSA", 1), 100.0).unwrap();
        supply_repo.update_qty("B1", ordinal_of("UAE", 1), 100.0).unwrap();
        supply_repo.update_qty("B1", ordinal_of("KSA", 2), 40.0).unwrap();

        let summary = pipeline.orchestrator.recompute_balances("B1").await.unwrap();
        assert_eq!(summary.balance_count, STANDARD_BALANCE_COUNT);
        assert_eq!(summary.storage_summary_count, STANDARD_STORAGE_COUNT);
        assert_eq!(summary.demand_count, STANDARD_DEMAND_COUNT);

        // 前三个阶段保持不变，人工编辑保留
        assert_eq!(supply_repo.count_by_batch("B1").unwrap(), STANDARD_SUPPLY_COUNT);
        assert_eq!(
            supply_repo
                .find_by_ordinal("B1", ordinal_of("KSA", 1))
                .unwrap()
                .unwrap()
                .qty,
            100.0
        );
        assert_eq!(
            pipeline.repos.distribution_repo.count_by_batch("B1").unwrap(),
            STANDARD_DISTRIBUTION_COUNT
        );

        let balances = pipeline.repos.balance_repo.find_balances_by_batch("B1").unwrap();
        assert_eq!(balances.len(), STANDARD_BALANCE_COUNT);

        let mut a_chain: Vec<_> = balances
            .iter()
            .filter(|b| b.warehouse == WarehouseCode::A && b.sku == "100")
            .collect();
        a_chain.sort_by_key(|b| b.month);
        assert_eq!(a_chain[0].outbound, 150.0);
        assert_eq!(a_chain[0].max_supply, 150.0);
        assert_eq!(a_chain[1].outbound, 40.0);
        assert!(a_chain[2..].iter().all(|b| b.outbound == 0.0));

        for pair in a_chain.windows(2) {
            assert!((pair[0].closing_stock - pair[1].opening_stock).abs() < EPS);
        }
        for b in &a_chain {
            assert!((b.closing_stock - (b.opening_stock + b.inbound - b.outbound)).abs() < EPS);
        }
        assert!((a_chain[0].closing_stock - (200.0 + 50.0 * 2.0 / 3.0 - 150.0)).abs() < EPS);

        // 未编辑的链不受影响
        let edited_chain =
            |b: &WarehouseBalanceRecord| b.warehouse == WarehouseCode::A && b.sku == "100";
        let old_rest: Vec<_> = before.iter().filter(|b| !edited_chain(b)).collect();
        let new_rest: Vec<_> = balances.iter().filter(|b| !edited_chain(b)).collect();
        assert_eq!(old_rest.len(), new_rest.len());
        for (old, new) in old_rest.iter().zip(&new_rest) {
            assert_eq!(old.closing_stock, new.closing_stock);
        }

        // 汇总随之更新: 1 月期末合计减少 150
        let storage = pipeline.repos.balance_repo.find_storage_by_batch("B1").unwrap();
        let jan = storage.iter().find(|s| s.sku == "100" && s.month == 1).unwrap();
        let jan_closing: f64 = balances
            .iter()
            .filter(|b| b.sku == "100" && b.month == 1)
            .map(|b| b.closing_stock)
            .sum();
        assert!((jan.total_opening - 250.0).abs() < EPS);
        assert!((jan.total_closing - jan_closing).abs() < EPS);
        let jan_before = storage_before
            .iter()
            .find(|s| s.sku == "100" && s.month == 1)
            .unwrap();
        assert!((jan_before.total_closing - jan.total_closing - 150.0).abs() < EPS);
        assert!((jan.average_stock - (jan.total_opening + jan.total_closing) / 2.0).abs() < EPS);

        let batch = pipeline.repos.batch_repo.find("B1").unwrap().unwrap();
        assert_eq!(batch.status, BatchStatus::Completed);
        assert_eq!(batch.balance_count, STANDARD_BALANCE_COUNT);
    }

    #[tokio::test]
    async fn test_recompute_balances_requires_completed_batch() {
        let (_tmp, db_path) = create_test_db().unwrap();
        let pipeline = build_pipeline(open_shared(&db_path));

        let err = pipeline.orchestrator.recompute_balances("missing").await.unwrap_err();
        assert!(matches!(err, PipelineError::Integrity { ref key, .. } if key == "upload_batch"));

        pipeline
            .config
            .set_global_config_value(config_keys::STRICT_FREIGHT_RATES, "true")
            .unwrap();
        seed_standard_workbook(&pipeline.cells, "B1");
        pipeline.orchestrator.run_batch("B1").await.unwrap_err();

        let err = pipeline.orchestrator.recompute_balances("B1").await.unwrap_err();
        assert_eq!(err.stage(), Some(StageName::WarehouseBalance));
        assert!(matches!(err, PipelineError::Integrity { .. }));
    }
}
