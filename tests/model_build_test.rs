// ==========================================
// 建模流程集成测试
// ==========================================
// 职责: 验证 上游循环 → 废钢路由 → 路线分配 → 写回 → 守恒校验 全链路
// ==========================================

mod test_helpers;

use ndarray::{Array2, Array3, Axis};
use steel_mfa::config::TradeWindow;
use steel_mfa::domain::{ModelError, ProcessId, TradeClass};
use steel_mfa::engine::{ModelBuilder, UpperCycleMode};
use test_helpers::*;

fn flow_sum(network: &steel_mfa::FlowNetwork, origin: ProcessId, destination: ProcessId, t: usize) -> f64 {
    network
        .flow_values(origin, destination)
        .unwrap()
        .index_axis(Axis(0), t)
        .sum()
}

#[test]
fn test_production_from_demand_without_trade() {
    let config = test_config();
    let outcome = ModelBuilder::new(&config).build(&test_inputs(20.0, 10.0)).unwrap();
    let network = &outcome.network;

    for t in 0..N_YEARS {
        let bof = flow_sum(network, ProcessId::PrimaryProduction, ProcessId::Forming, t);
        let eaf = flow_sum(network, ProcessId::SecondaryProduction, ProcessId::Forming, t);
        assert!((bof + eaf - EXPECTED_PRODUCTION).abs() < 1e-2);
        let to_fabrication = flow_sum(network, ProcessId::Forming, ProcessId::Fabrication, t);
        assert!((to_fabrication - 118.0556).abs() < 1e-3);
    }
}

#[test]
fn test_network_is_frozen_and_balanced() {
    let config = test_config();
    let outcome = ModelBuilder::new(&config).build(&test_inputs(20.0, 10.0)).unwrap();

    assert!(outcome.network.is_frozen());
    assert!(outcome.summary.max_imbalance() <= config.mass_balance_tolerance);
    assert_eq!(outcome.summary.balance.len(), ProcessId::ALL.len());
    assert!(outcome.summary.to_string().starts_with("Success - Model loaded and checked."));
}

#[test]
fn test_use_stock_change_is_inflow_minus_outflow() {
    let config = test_config();
    let outcome = ModelBuilder::new(&config).build(&test_inputs(20.0, 10.0)).unwrap();

    let change = outcome.network.stock(ProcessId::Use).unwrap().change_values();
    // (t, e, r, g, s)
    assert!((change[[0, 0, 0, 0, 0]] - 30.0).abs() < 1e-9);
    assert!((change[[2, 0, 0, 1, 0]] - 40.0).abs() < 1e-9);
}

#[test]
fn test_scrap_use_capped_by_max_share() {
    let config = test_config();
    let outcome = ModelBuilder::new(&config).build(&test_inputs(500.0, 0.0)).unwrap();
    let network = &outcome.network;

    let production = flow_sum(network, ProcessId::PrimaryProduction, ProcessId::Forming, 1)
        + flow_sum(network, ProcessId::SecondaryProduction, ProcessId::Forming, 1);
    let scrap_used = flow_sum(network, ProcessId::EndOfLife, ProcessId::Recycling, 1);
    let waste = flow_sum(network, ProcessId::EndOfLife, ProcessId::Waste, 1);

    assert!((scrap_used - config.max_scrap_share.base * production).abs() < 1e-6);
    assert!(waste > 390.0);
    assert!(outcome.summary.max_imbalance() <= config.mass_balance_tolerance);
}

#[test]
fn test_scrap_exports_leave_the_pool() {
    let config = test_config();
    let mut inputs = test_inputs(20.0, 10.0);
    inputs.trade.scrap.fill(-5.0);

    let outcome = ModelBuilder::new(&config).build(&inputs).unwrap();
    let network = &outcome.network;

    let exports = flow_sum(network, ProcessId::EndOfLife, ProcessId::Environment, 0);
    let imports = flow_sum(network, ProcessId::Environment, ProcessId::EndOfLife, 0);
    assert!((exports - 5.0).abs() < 1e-9);
    assert_eq!(imports, 0.0);
    assert!(outcome.summary.max_imbalance() <= config.mass_balance_tolerance);
}

#[test]
fn test_build_is_deterministic() {
    let config = test_config();
    let builder = ModelBuilder::new(&config);
    let inputs = test_inputs(20.0, 10.0);

    let first = builder.build(&inputs).unwrap();
    let second = builder.build(&inputs).unwrap();
    assert_eq!(first.network, second.network);
    assert_eq!(first.summary, second.summary);
}

#[test]
fn test_reuse_keeps_balance() {
    let mut config = test_config();
    config.reuse.enabled = true;
    config.reuse.change_base_year = 2000;
    config.reuse.factors = vec![vec![1.5], vec![1.5]];

    let outcome = ModelBuilder::new(&config).build(&test_inputs(20.0, 10.0)).unwrap();
    let reuse = flow_sum(&outcome.network, ProcessId::Use, ProcessId::Use, 2);
    assert!(reuse > 0.0);
    assert!(outcome.summary.max_imbalance() <= config.mass_balance_tolerance);
}

#[test]
fn test_external_mode_requires_payload() {
    let mut config = test_config();
    config.upper_cycle = UpperCycleMode::External;

    let result = ModelBuilder::new(&config).build(&test_inputs(20.0, 10.0));
    assert!(matches!(result, Err(ModelError::Configuration(_))));
}

#[test]
fn test_dsm_shape_mismatch_is_rejected() {
    let config = test_config();
    let mut inputs = test_inputs(20.0, 10.0);
    inputs.regions.push("R2".to_string());

    let result = ModelBuilder::new(&config).build(&inputs);
    assert!(matches!(result, Err(ModelError::Consistency(_))));
}

#[test]
fn test_invalid_config_is_rejected() {
    let mut config = test_config();
    config.fabrication_yield = vec![0.9];

    let result = ModelBuilder::new(&config).build(&test_inputs(20.0, 10.0));
    assert!(matches!(result, Err(ModelError::Configuration(_))));
}

#[test]
fn test_use_stock_accumulates_without_outflow() {
    let config = test_config();
    let outcome = ModelBuilder::new(&config).build(&test_inputs(0.0, 0.0)).unwrap();
    let stock = outcome.network.stock(ProcessId::Use).unwrap();

    for t in 0..N_YEARS {
        let change: f64 = stock.change_values().index_axis(Axis(0), t).sum();
        let level: f64 = stock.values().index_axis(Axis(0), t).sum();
        assert!((change - 100.0).abs() < 1e-9);
        assert!((level - 100.0 * (t + 1) as f64).abs() < 1e-9);
    }
    let to_scrap = flow_sum(&outcome.network, ProcessId::Use, ProcessId::EndOfLife, 0);
    assert_eq!(to_scrap, 0.0);
}

#[test]
fn test_frozen_network_rejects_writes() {
    let config = test_config();
    let mut outcome = ModelBuilder::new(&config).build(&test_inputs(20.0, 10.0)).unwrap();
    let values = outcome
        .network
        .flow_values(ProcessId::Forming, ProcessId::Fabrication)
        .unwrap()
        .clone();

    let result = outcome
        .network
        .set_flow(ProcessId::Forming, ProcessId::Fabrication, values);
    assert!(matches!(result, Err(ModelError::Consistency(_))));
}

#[test]
fn test_real_data_split_absorbing_category_takes_remainder() {
    let config = real_data_config();
    let outcome = ModelBuilder::new(&config).build(&real_data_inputs()).unwrap();
    let network = &outcome.network;

    // (t, e, r, g, s)
    let indirect = network.flow_values(ProcessId::Environment, ProcessId::Use).unwrap();
    let share_a = 0.25 / 0.95;
    for t in 0..N_YEARS {
        let a = indirect[[t, 0, 0, 0, 0]];
        let b = indirect[[t, 0, 0, 1, 0]];
        assert!((a - 10.0 * share_a).abs() < 1e-9);
        assert!((b - 10.0 * (1.0 - share_a)).abs() < 1e-9);
        assert!((a + b - 10.0).abs() < 1e-9);
    }
    let indirect_exports = flow_sum(network, ProcessId::Use, ProcessId::Environment, 0);
    assert_eq!(indirect_exports, 0.0);

    // 间接进口替代部分国内加工
    let fabrication_use = flow_sum(network, ProcessId::Fabrication, ProcessId::Use, 0);
    assert!((fabrication_use - 90.0).abs() < 1e-9);
    assert!(outcome.summary.max_imbalance() <= config.mass_balance_tolerance);
}

#[test]
fn test_real_data_split_requires_share_table() {
    let config = real_data_config();
    let mut inputs = real_data_inputs();
    inputs.trade.indirect_shares = None;

    let result = ModelBuilder::new(&config).build(&inputs);
    assert!(matches!(result, Err(ModelError::Configuration(_))));
}

#[test]
fn test_external_upper_cycle_builds_balanced_network() {
    let config = external_config();
    let mut inputs = test_inputs(20.0, 10.0);
    inputs.external_upper_cycle = Some(external_payload());

    let outcome = ModelBuilder::new(&config).build(&inputs).unwrap();
    let network = &outcome.network;

    assert!(network.is_frozen());
    assert!(outcome.summary.max_imbalance() <= config.mass_balance_tolerance);
    for t in 0..N_YEARS {
        let bof = flow_sum(network, ProcessId::PrimaryProduction, ProcessId::Forming, t);
        let eaf = flow_sum(network, ProcessId::SecondaryProduction, ProcessId::Forming, t);
        assert!((bof + eaf - 126.0).abs() < 1e-9);
        let forming_scrap = flow_sum(network, ProcessId::Forming, ProcessId::EndOfLife, t);
        assert!((forming_scrap - 6.0).abs() < 1e-9);
        let fabrication_scrap = flow_sum(network, ProcessId::Fabrication, ProcessId::EndOfLife, t);
        assert!((fabrication_scrap - 20.0).abs() < 1e-9);
    }
}

#[test]
fn test_external_payload_shape_mismatch_is_rejected() {
    let config = external_config();
    let mut payload = external_payload();
    payload.production = Array3::from_elem((N_YEARS - 1, 1, 1), 126.0);
    let mut inputs = test_inputs(20.0, 10.0);
    inputs.external_upper_cycle = Some(payload);

    let result = ModelBuilder::new(&config).build(&inputs);
    assert!(matches!(result, Err(ModelError::Consistency(_))));
}

#[test]
fn test_non_finite_dsm_is_rejected() {
    let config = test_config();
    let mut inputs = test_inputs(20.0, 10.0);
    inputs.dsm.inflows[[1, 0, 0, 0]] = f64::NAN;

    let result = ModelBuilder::new(&config).build(&inputs);
    assert!(matches!(result, Err(ModelError::Consistency(_))));
}

#[test]
fn test_historical_net_trade_stops_at_window_end() {
    let mut config = test_config();
    config.trade.crude = TradeWindow::new(2001, 2001);
    let mut inputs = test_inputs(20.0, 10.0);
    inputs.trade.crude = Array2::from_elem((1, 1), 10.0);
    // 首年需求减半
    inputs.dsm.inflows.index_axis_mut(Axis(0), 0).fill(25.0);

    let history = ModelBuilder::new(&config)
        .historical_net_trade(&inputs, TradeClass::Crude)
        .unwrap();
    assert_eq!(history.dim(), (2, 1, 1));
    assert!((history[[0, 0, 0]] - 5.0).abs() < 1e-12);
    assert_eq!(history[[1, 0, 0]], 10.0);
}

#[test]
fn test_historical_scrap_trade_uses_production_scaler() {
    let config = test_config();
    let mut inputs = test_inputs(20.0, 10.0);
    inputs.trade.scrap.fill(-5.0);

    let history = ModelBuilder::new(&config)
        .historical_net_trade(&inputs, TradeClass::Scrap)
        .unwrap();
    assert_eq!(history.dim(), (N_YEARS, 1, 1));
    assert!(history.iter().all(|v| *v == -5.0));
}
