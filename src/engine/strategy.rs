// ==========================================
// 钢铁物质流分析 - 计算路径/拆分模式定义
// ==========================================
// 用途：
// - UpperCycleMode: 上游循环两条互斥计算路径,由配置选择其一；
// - CategorySplitMode: 间接贸易按类别拆分的两种方式。

use serde::{Deserialize, Serialize};

/// 上游循环计算路径（需求 → 加工 → 成型 → 生产）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpperCycleMode {
    /// 由需求按收得率反推生产
    BaseModel,
    /// 整体采用外部提供的生产/贸易/加工数组
    External,
}

impl UpperCycleMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            UpperCycleMode::BaseModel => "base_model",
            UpperCycleMode::External => "external",
        }
    }
}

impl Default for UpperCycleMode {
    fn default() -> Self {
        UpperCycleMode::BaseModel
    }
}

impl std::str::FromStr for UpperCycleMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "base_model" | "base-model" => Ok(UpperCycleMode::BaseModel),
            "external" | "model_approaches" => Ok(UpperCycleMode::External),
            other => Err(format!("未知上游循环计算路径: {}", other)),
        }
    }
}

/// 类别拆分方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategorySplitMode {
    /// 外部份额表（行和为 1）
    RealData,
    /// 由配套流自身的类别构成推断
    Inferred,
}

impl CategorySplitMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CategorySplitMode::RealData => "real_data",
            CategorySplitMode::Inferred => "inferred",
        }
    }
}

impl Default for CategorySplitMode {
    fn default() -> Self {
        CategorySplitMode::RealData
    }
}

impl std::str::FromStr for CategorySplitMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "real_data" | "real-data" => Ok(CategorySplitMode::RealData),
            "inferred" => Ok(CategorySplitMode::Inferred),
            other => Err(format!("未知类别拆分方式: {}", other)),
        }
    }
}
