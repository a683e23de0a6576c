// ==========================================
// 钢铁物质流分析 - 领域类型定义
// ==========================================
// 维度 (Dim) / 过程节点 (ProcessId) / 数组签名 (Signature)
// 贸易类别 (TradeClass) / 维度条目表 (Dimensions)
// ==========================================

use crate::domain::error::{ModelError, ModelResult};
use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 维度 (Dimension)
// ==========================================
// 顺序固定: t, e, r, g, w, s
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dim {
    Time,     // 年份
    Element,  // 化学元素（通常只有 Fe）
    Region,   // 区域
    Good,     // 在用类别
    Waste,    // 废钢/报废路由类别
    Scenario, // 情景
}

impl Dim {
    /// 索引字母（与签名字符串一致）
    pub fn letter(&self) -> char {
        match self {
            Dim::Time => 't',
            Dim::Element => 'e',
            Dim::Region => 'r',
            Dim::Good => 'g',
            Dim::Waste => 'w',
            Dim::Scenario => 's',
        }
    }
}

impl fmt::Display for Dim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dim::Time => write!(f, "Time"),
            Dim::Element => write!(f, "Element"),
            Dim::Region => write!(f, "Region"),
            Dim::Good => write!(f, "Good"),
            Dim::Waste => write!(f, "Waste"),
            Dim::Scenario => write!(f, "Scenario"),
        }
    }
}

// ==========================================
// 过程节点 (Process ID)
// ==========================================
// 编号稳定,建模后不可变
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcessId {
    Environment,         // 0 环境/原始生产边界
    PrimaryProduction,   // 1 高炉-转炉 (BF/BOF)
    SecondaryProduction, // 2 电炉 (EAF)
    Forming,             // 3 成型
    Fabrication,         // 4 加工制造
    Use,                 // 5 在用
    EndOfLife,           // 6 报废/废钢池
    Recycling,           // 7 回收
    Waste,               // 8 填埋
    DissipativeLoss,     // 9 耗散/不可收集
}

impl ProcessId {
    pub const ALL: [ProcessId; 10] = [
        ProcessId::Environment,
        ProcessId::PrimaryProduction,
        ProcessId::SecondaryProduction,
        ProcessId::Forming,
        ProcessId::Fabrication,
        ProcessId::Use,
        ProcessId::EndOfLife,
        ProcessId::Recycling,
        ProcessId::Waste,
        ProcessId::DissipativeLoss,
    ];

    pub fn id(&self) -> usize {
        *self as usize
    }

    pub fn from_id(id: usize) -> Option<Self> {
        Self::ALL.get(id).copied()
    }

    /// 过程显示名
    pub fn name(&self) -> &'static str {
        match self {
            ProcessId::Environment => "Primary Production / Environment",
            ProcessId::PrimaryProduction => "BF/BOF Production",
            ProcessId::SecondaryProduction => "EAF Production",
            ProcessId::Forming => "Forming",
            ProcessId::Fabrication => "Fabrication",
            ProcessId::Use => "Using",
            ProcessId::EndOfLife => "End of Life",
            ProcessId::Recycling => "Recycling",
            ProcessId::Waste => "Waste",
            ProcessId::DissipativeLoss => "Dissipative/Not collectable",
        }
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} '{}'", self.id(), self.name())
    }
}

// ==========================================
// 数组签名 (Signature)
// ==========================================
// 封闭集合: 所有流/存量只允许以下四种维度组合
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Signature {
    Ters,   // t,e,r,s
    Tergs,  // t,e,r,g,s
    Terws,  // t,e,r,w,s
    Tergws, // t,e,r,g,w,s
}

impl Signature {
    pub fn dims(&self) -> &'static [Dim] {
        match self {
            Signature::Ters => &[Dim::Time, Dim::Element, Dim::Region, Dim::Scenario],
            Signature::Tergs => &[Dim::Time, Dim::Element, Dim::Region, Dim::Good, Dim::Scenario],
            Signature::Terws => &[Dim::Time, Dim::Element, Dim::Region, Dim::Waste, Dim::Scenario],
            Signature::Tergws => &[
                Dim::Time,
                Dim::Element,
                Dim::Region,
                Dim::Good,
                Dim::Waste,
                Dim::Scenario,
            ],
        }
    }

    pub fn ndim(&self) -> usize {
        self.dims().len()
    }

    pub fn axis_of(&self, dim: Dim) -> Option<usize> {
        self.dims().iter().position(|d| *d == dim)
    }

    pub fn contains(&self, dim: Dim) -> bool {
        self.axis_of(dim).is_some()
    }

    /// 判断 self 是否为 other 的有序子序列（可收缩目标）
    pub fn is_subset_of(&self, other: Signature) -> bool {
        let mut rest = other.dims().iter();
        self.dims().iter().all(|d| rest.any(|o| o == d))
    }

    /// 按维度条目表计算数组形状
    pub fn shape(&self, dimensions: &Dimensions) -> Vec<usize> {
        self.dims().iter().map(|d| dimensions.len(*d)).collect()
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let letters: Vec<String> = self.dims().iter().map(|d| d.letter().to_string()).collect();
        write!(f, "{}", letters.join(","))
    }
}

// ==========================================
// 贸易类别 (Trade Class)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeClass {
    Crude,    // 粗钢
    Scrap,    // 废钢
    Indirect, // 间接(含钢制品)贸易
}

impl TradeClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeClass::Crude => "crude",
            TradeClass::Scrap => "scrap",
            TradeClass::Indirect => "indirect",
        }
    }
}

impl std::str::FromStr for TradeClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "crude" => Ok(TradeClass::Crude),
            "scrap" => Ok(TradeClass::Scrap),
            "indirect" => Ok(TradeClass::Indirect),
            other => Err(format!("未知贸易类别: {}", other)),
        }
    }
}

impl fmt::Display for TradeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// Dimensions - 维度条目表
// ==========================================
// 建模时确定,之后只读
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dimensions {
    pub years: Vec<i32>,
    pub elements: Vec<String>,
    pub regions: Vec<String>,
    pub goods: Vec<String>,
    pub waste: Vec<String>,
    pub scenarios: Vec<String>,
}

impl Dimensions {
    /// 创建维度条目表
    ///
    /// # 校验
    /// - 所有维度非空
    /// - 年份连续递增
    pub fn new(
        years: Vec<i32>,
        elements: Vec<String>,
        regions: Vec<String>,
        goods: Vec<String>,
        waste: Vec<String>,
        scenarios: Vec<String>,
    ) -> ModelResult<Self> {
        let dims = Self {
            years,
            elements,
            regions,
            goods,
            waste,
            scenarios,
        };

        for dim in [
            Dim::Time,
            Dim::Element,
            Dim::Region,
            Dim::Good,
            Dim::Waste,
            Dim::Scenario,
        ] {
            if dims.len(dim) == 0 {
                return Err(ModelError::Consistency(format!("维度 {} 为空", dim)));
            }
        }

        if dims.years.windows(2).any(|w| w[1] != w[0] + 1) {
            return Err(ModelError::Consistency(
                "Time 维度年份必须连续递增".to_string(),
            ));
        }

        Ok(dims)
    }

    pub fn len(&self, dim: Dim) -> usize {
        match dim {
            Dim::Time => self.years.len(),
            Dim::Element => self.elements.len(),
            Dim::Region => self.regions.len(),
            Dim::Good => self.goods.len(),
            Dim::Waste => self.waste.len(),
            Dim::Scenario => self.scenarios.len(),
        }
    }

    pub fn n_years(&self) -> usize {
        self.years.len()
    }

    pub fn n_regions(&self) -> usize {
        self.regions.len()
    }

    pub fn n_goods(&self) -> usize {
        self.goods.len()
    }

    pub fn n_waste(&self) -> usize {
        self.waste.len()
    }

    pub fn n_scenarios(&self) -> usize {
        self.scenarios.len()
    }

    pub fn first_year(&self) -> i32 {
        self.years[0]
    }

    pub fn last_year(&self) -> i32 {
        self.years[self.years.len() - 1]
    }

    pub fn year_index(&self, year: i32) -> Option<usize> {
        if year < self.first_year() || year > self.last_year() {
            return None;
        }
        Some((year - self.first_year()) as usize)
    }

    pub fn waste_index(&self, name: &str) -> Option<usize> {
        self.waste.iter().position(|w| w == name)
    }

    pub fn good_index(&self, name: &str) -> Option<usize> {
        self.goods.iter().position(|g| g == name)
    }

    /// (t, r, s) 基础形状
    pub fn trs(&self) -> (usize, usize, usize) {
        (self.n_years(), self.n_regions(), self.n_scenarios())
    }
}
