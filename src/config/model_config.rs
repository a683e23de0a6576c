// ==========================================
// 钢铁物质流分析 - 模型配置对象
// ==========================================
// 职责: 收益率/类别/情景/产能上限等全局常量
// 生命周期: 启动时构建一次,之后以引用传入各引擎,不可变
// 覆写: TOML 中缺失的字段取默认值 (#[serde(default)])
// ==========================================

use crate::engine::strategy::{CategorySplitMode, UpperCycleMode};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// 历史贸易数据的已知年份窗口（含两端）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeWindow {
    pub first_year: i32,
    pub last_year: i32,
}

impl TradeWindow {
    pub fn new(first_year: i32, last_year: i32) -> Self {
        Self {
            first_year,
            last_year,
        }
    }

    pub fn n_years(&self) -> usize {
        (self.last_year - self.first_year + 1).max(0) as usize
    }
}

/// 三类贸易配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TradeConfig {
    /// 粗钢贸易（外推基准: 总需求）
    pub crude: TradeWindow,
    /// 废钢贸易（外推基准: 产量）
    pub scrap: TradeWindow,
    /// 间接贸易（外推基准: 总需求）
    pub indirect: TradeWindow,
    /// 间接贸易按类别拆分方式
    pub indirect_split: CategorySplitMode,
    /// 份额表拆分时吸收舍入误差的类别
    #[serde(default)]
    pub indirect_absorbing_category: Option<String>,
}

impl Default for TradeConfig {
    fn default() -> Self {
        Self {
            crude: TradeWindow::new(1970, 2021),
            scrap: TradeWindow::new(1990, 2021),
            indirect: TradeWindow::new(2001, 2019),
            indirect_split: CategorySplitMode::RealData,
            indirect_absorbing_category: Some("Products".to_string()),
        }
    }
}

/// 生产中废钢占比上限
///
/// 自 break_year 起可切换到另一档上限（或由外部序列覆盖）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaxScrapShareConfig {
    pub base: f64,
    #[serde(default)]
    pub break_year: Option<i32>,
    #[serde(default)]
    pub share_after_break: Option<f64>,
}

impl Default for MaxScrapShareConfig {
    fn default() -> Self {
        Self {
            base: 0.6,
            break_year: None,
            share_after_break: None,
        }
    }
}

/// 在用复用调整
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReuseConfig {
    pub enabled: bool,
    /// 变化起始年份（此前复用系数为 1）
    pub change_base_year: i32,
    /// 终年复用系数 [类别][情景]
    pub factors: Vec<Vec<f64>>,
}

impl Default for ReuseConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            change_base_year: 2023,
            factors: Vec::new(),
        }
    }
}

// ==========================================
// ModelConfig - 模型配置
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub model_name: String,
    pub unit: String,

    // ===== 维度 =====
    pub start_year: i32,
    pub end_year: i32,
    pub elements: Vec<String>,
    pub in_use_categories: Vec<String>,
    pub recycling_categories: Vec<String>,
    pub scenarios: Vec<String>,

    // ===== 废钢池特殊类别 =====
    /// 边界类别: 其左侧为可回收废钢,自身及右侧为耗散损失
    pub dissipative_boundary: String,
    pub forming_scrap_category: String,
    pub fabrication_scrap_category: String,

    // ===== 收得率 =====
    /// 各在用类别加工收得率（≤ 1）
    pub fabrication_yield: Vec<f64>,
    /// 全局成型收得率
    pub forming_yield: f64,

    // ===== 报废路由 =====
    /// 在用类别 → 报废类别 分配矩阵 [类别][报废类别],行和为 1
    pub use_eol_distribution: Vec<Vec<f64>>,
    /// 各报废类别可回收系数
    pub recyclability: Vec<f64>,

    // ===== 生产路线 =====
    /// 转炉最大废钢比
    pub scrap_in_bof_rate: f64,
    pub max_scrap_share: MaxScrapShareConfig,

    // ===== 贸易 / 计算路径 =====
    pub trade: TradeConfig,
    pub upper_cycle: UpperCycleMode,
    pub reuse: ReuseConfig,

    // ===== 校验 =====
    /// 质量平衡容差（吨）
    pub mass_balance_tolerance: f64,

    // ===== 数据来源 / 缓存 =====
    pub country_specific: bool,
    pub region_data_source: String,
    pub data_path: PathBuf,
    #[serde(default)]
    pub snapshot_db_path: Option<PathBuf>,
}

fn names(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for ModelConfig {
    fn default() -> Self {
        let scenarios = names(&["SSP1", "SSP2", "SSP3", "SSP4", "SSP5"]);
        let in_use_categories = names(&["Transport", "Machinery", "Construction", "Products"]);

        Self {
            model_name: "World Steel Economy".to_string(),
            unit: "t".to_string(),
            start_year: 1900,
            end_year: 2100,
            elements: names(&["Fe"]),
            recycling_categories: names(&[
                "Form", "Fabr", "CD", "MSW", "ELV", "IEW", "INEW", "Dis", "NotCol",
            ]),
            dissipative_boundary: "Dis".to_string(),
            forming_scrap_category: "Form".to_string(),
            fabrication_scrap_category: "Fabr".to_string(),
            fabrication_yield: vec![0.75, 0.8, 0.93, 0.85],
            forming_yield: 0.937,
            // Form, Fabr, CD, MSW, ELV, IEW, INEW, Dis, NotCol
            use_eol_distribution: vec![
                vec![0.0, 0.0, 0.0, 0.0, 0.85, 0.0, 0.05, 0.03, 0.07],
                vec![0.0, 0.0, 0.0, 0.0, 0.0, 0.4, 0.45, 0.05, 0.1],
                vec![0.0, 0.0, 0.85, 0.0, 0.0, 0.0, 0.0, 0.02, 0.13],
                vec![0.0, 0.0, 0.0, 0.6, 0.0, 0.2, 0.0, 0.05, 0.15],
            ],
            recyclability: vec![1.0, 1.0, 0.9, 0.7, 0.9, 0.9, 0.9, 0.0, 0.0],
            scrap_in_bof_rate: 0.22,
            max_scrap_share: MaxScrapShareConfig::default(),
            trade: TradeConfig::default(),
            upper_cycle: UpperCycleMode::BaseModel,
            reuse: ReuseConfig {
                factors: vec![vec![1.0; scenarios.len()]; in_use_categories.len()],
                ..ReuseConfig::default()
            },
            mass_balance_tolerance: 1.0,
            country_specific: false,
            region_data_source: "REMIND".to_string(),
            data_path: PathBuf::from("data"),
            snapshot_db_path: None,
            in_use_categories,
            scenarios,
        }
    }
}

impl ModelConfig {
    pub fn n_years(&self) -> usize {
        (self.end_year - self.start_year + 1).max(0) as usize
    }

    pub fn years(&self) -> Vec<i32> {
        (self.start_year..=self.end_year).collect()
    }

    /// 快照标签: 国别模型 vs 区域模型
    pub fn snapshot_label(&self) -> String {
        if self.country_specific {
            "countries".to_string()
        } else {
            format!("{}_regions", self.region_data_source)
        }
    }
}
