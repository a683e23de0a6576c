// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 提供小规模合成配置与模型输入
// 场景: 1 区域 × 1 情景 × 3 年份 × 2 在用类别
// ==========================================

#![allow(dead_code)]

use ndarray::{array, Array2, Array3, Array4, Axis};
use std::fs;
use std::path::Path;
use steel_mfa::config::{ModelConfig, TradeWindow};
use steel_mfa::engine::stock::DsmOutput;
use steel_mfa::engine::{
    CategorySplitMode, ExternalUpperCycle, ModelInputs, TradeHistory, UpperCycleMode,
};

pub const FIRST_YEAR: i32 = 2000;
pub const LAST_YEAR: i32 = 2002;
pub const N_YEARS: usize = 3;

/// 需求 50 + 50、收得率 0.9 / 0.8、成型收得率 0.95 时的产量
pub const EXPECTED_PRODUCTION: f64 = 124.269;

fn names(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// 合成配置
///
/// # 说明
/// - 报废类别: Form, Fabr, CD, Dis, NotCol（边界 Dis）
/// - 三类贸易窗口均覆盖全部年份
/// - 间接贸易按流量推断拆分,无需份额表
pub fn test_config() -> ModelConfig {
    steel_mfa::logging::init_test();

    let mut config = ModelConfig::default();
    config.model_name = "Synthetic Steel".to_string();
    config.start_year = FIRST_YEAR;
    config.end_year = LAST_YEAR;
    config.elements = names(&["Fe"]);
    config.scenarios = names(&["S1"]);
    config.in_use_categories = names(&["A", "B"]);
    config.recycling_categories = names(&["Form", "Fabr", "CD", "Dis", "NotCol"]);
    config.dissipative_boundary = "Dis".to_string();
    config.fabrication_yield = vec![0.9, 0.8];
    config.forming_yield = 0.95;
    config.use_eol_distribution = vec![
        vec![0.0, 0.0, 0.9, 0.05, 0.05],
        vec![0.0, 0.0, 0.8, 0.1, 0.1],
    ];
    config.recyclability = vec![1.0, 1.0, 0.9, 0.0, 0.0];
    config.scrap_in_bof_rate = 0.22;
    config.trade.crude = TradeWindow::new(FIRST_YEAR, LAST_YEAR);
    config.trade.scrap = TradeWindow::new(FIRST_YEAR, LAST_YEAR);
    config.trade.indirect = TradeWindow::new(FIRST_YEAR, LAST_YEAR);
    config.trade.indirect_split = CategorySplitMode::Inferred;
    config.trade.indirect_absorbing_category = Some("B".to_string());
    config.reuse.factors = vec![vec![1.0]; 2];
    config.mass_balance_tolerance = 1e-6;
    config
}

/// 无贸易历史
pub fn no_trade() -> TradeHistory {
    TradeHistory {
        crude: Array2::zeros((N_YEARS, 1)),
        scrap: Array2::zeros((N_YEARS, 1)),
        indirect: Array2::zeros((N_YEARS, 1)),
        indirect_shares: None,
    }
}

/// 合成 DSM: 每类流入 50,流出按类别给定
pub fn test_dsm(outflow_a: f64, outflow_b: f64) -> DsmOutput {
    let inflows = Array4::from_elem((N_YEARS, 1, 2, 1), 50.0);
    let mut outflows = Array4::zeros((N_YEARS, 1, 2, 1));
    outflows.index_axis_mut(Axis(2), 0).fill(outflow_a);
    outflows.index_axis_mut(Axis(2), 1).fill(outflow_b);
    DsmOutput::new(None, inflows, outflows)
}

/// 合成模型输入
pub fn test_inputs(outflow_a: f64, outflow_b: f64) -> ModelInputs {
    ModelInputs::new(names(&["R"]), test_dsm(outflow_a, outflow_b), no_trade())
}

/// 份额表拆分配置: 原始份额 A 0.25 / B 0.70,B 吸收归一余量
pub fn real_data_config() -> ModelConfig {
    let mut config = test_config();
    config.trade.indirect_split = CategorySplitMode::RealData;
    config.trade.indirect_absorbing_category = Some("B".to_string());
    config
}

/// 份额表拆分输入: 每年间接净进口 10
pub fn real_data_inputs() -> ModelInputs {
    let mut inputs = test_inputs(20.0, 10.0);
    inputs.trade.indirect.fill(10.0);
    inputs.trade.indirect_shares = Some(array![[0.25, 0.70]]);
    inputs
}

/// 外部上游路径配置
pub fn external_config() -> ModelConfig {
    let mut config = test_config();
    config.upper_cycle = UpperCycleMode::External;
    config
}

/// 自洽的外部上游数组
///
/// # 说明
/// - 在用流入 50 + 50 全部来自国内加工,无贸易
/// - 成型产出 120,粗钢生产 126
pub fn external_payload() -> ExternalUpperCycle {
    let dsm = test_dsm(20.0, 10.0);
    let trs = (N_YEARS, 1, 1);
    ExternalUpperCycle {
        production: Array3::from_elem(trs, 126.0),
        trade: Array3::zeros(trs),
        forming_fabrication: Array3::from_elem(trs, 120.0),
        fabrication_use: dsm.inflows.clone(),
        indirect_trade: Array4::zeros(dsm.inflows.dim()),
        inflows: dsm.inflows,
        outflows: dsm.outflows,
    }
}

/// 写入一套最小 CSV 输入表
pub fn write_input_tables(dir: &Path) {
    let mut dsm = String::from("region,category,scenario,year,inflow,outflow\n");
    for year in FIRST_YEAR..=LAST_YEAR {
        dsm.push_str(&format!("R,A,S1,{},50,20\n", year));
        dsm.push_str(&format!("R,B,S1,{},50,10\n", year));
    }
    fs::write(dir.join("dsm.csv"), dsm).unwrap();

    let wide = |value: f64| {
        format!(
            "region,2000,2001,2002\nR,{v},{v},{v}\n",
            v = value
        )
    };
    fs::write(dir.join("crude_trade.csv"), wide(0.0)).unwrap();
    fs::write(dir.join("scrap_trade.csv"), wide(-5.0)).unwrap();
    fs::write(dir.join("indirect_trade.csv"), wide(0.0)).unwrap();
}
