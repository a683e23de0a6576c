// ==========================================
// 钢铁物质流分析 - 模型输入契约
// ==========================================
// 由 importer 加载或测试直接构造; 引擎只读
// ==========================================

use crate::domain::error::{ModelError, ModelResult};
use crate::domain::types::{Dimensions, TradeClass};
use crate::engine::stock::DsmOutput;
use crate::engine::upper_cycle::ExternalUpperCycle;
use ndarray::{Array2, Array3};
use serde::{Deserialize, Serialize};

/// 三类历史净贸易（已知窗口 (t_known, r)）与间接贸易份额表
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeHistory {
    pub crude: Array2<f64>,
    pub scrap: Array2<f64>,
    pub indirect: Array2<f64>,
    /// 间接贸易类别份额 (r, g)
    #[serde(default)]
    pub indirect_shares: Option<Array2<f64>>,
}

impl TradeHistory {
    pub fn known(&self, class: TradeClass) -> &Array2<f64> {
        match class {
            TradeClass::Crude => &self.crude,
            TradeClass::Scrap => &self.scrap,
            TradeClass::Indirect => &self.indirect,
        }
    }
}

/// 一次建模所需的全部外部输入
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInputs {
    pub regions: Vec<String>,
    pub dsm: DsmOutput,
    pub trade: TradeHistory,
    /// 自切换年份起的废钢占比上限序列 (t − break, r, s)
    #[serde(default)]
    pub max_scrap_share_series: Option<Array3<f64>>,
    /// 外部数据路径的上游循环数组
    #[serde(default)]
    pub external_upper_cycle: Option<ExternalUpperCycle>,
}

impl ModelInputs {
    pub fn new(regions: Vec<String>, dsm: DsmOutput, trade: TradeHistory) -> Self {
        Self {
            regions,
            dsm,
            trade,
            max_scrap_share_series: None,
            external_upper_cycle: None,
        }
    }

    /// 份额表行数必须与区域数一致
    pub fn check_shares(&self, dimensions: &Dimensions) -> ModelResult<()> {
        if let Some(shares) = &self.trade.indirect_shares {
            let expected = (dimensions.n_regions(), dimensions.n_goods());
            if shares.dim() != expected {
                return Err(ModelError::Consistency(format!(
                    "间接贸易份额表形状 {:?} 与 (r, g) = {:?} 不一致",
                    shares.dim(),
                    expected
                )));
            }
        }
        Ok(())
    }
}
