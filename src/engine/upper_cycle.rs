// ==========================================
// 钢铁物质流分析 - 上游循环引擎
// ==========================================
// 需求反推路径:
// 1) 国内加工投入 = 需求 − 间接进口 + 间接出口
// 2) 按类别除以加工收得率 → 成型产出（按类别）
// 3) 对类别求和 → 成型总产出
// 4) 生产+贸易 = 成型总产出 / 成型收得率
// 5) 粗钢进出口按总需求外推; 生产 = 生产+贸易 + 出口 − 进口
// 外部数据路径: 整体替换,不与上述步骤混用
// ==========================================

use crate::config::ModelConfig;
use crate::domain::error::{ModelError, ModelResult};
use crate::domain::types::{Dimensions, TradeClass};
use crate::engine::category_split::CategorySplitter;
use crate::engine::inputs::TradeHistory;
use crate::engine::trade::{split_net_trade, TradeReconstructor};
use ndarray::{Array1, Array3, Array4, Axis};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

/// 上游循环计算结果
#[derive(Debug, Clone, PartialEq)]
pub struct UpperCycle {
    /// 粗钢生产 (t, r, s)
    pub production: Array3<f64>,
    /// 成型 → 加工 (t, r, s)
    pub forming_fabrication: Array3<f64>,
    /// 粗钢进口/出口 (t, r, s)
    pub imports: Array3<f64>,
    pub exports: Array3<f64>,
    /// 加工 → 在用 (t, r, g, s)
    pub fabrication_use: Array4<f64>,
    /// 间接进口/出口 (t, r, g, s)
    pub indirect_imports: Array4<f64>,
    pub indirect_exports: Array4<f64>,
    /// 在用流入/流出 (t, r, g, s)
    pub inflows: Array4<f64>,
    pub outflows: Array4<f64>,
}

impl UpperCycle {
    /// 生产 + 净进口
    pub fn production_plus_trade(&self) -> Array3<f64> {
        &self.production + &self.imports - &self.exports
    }

    /// 成型损失 = 生产 + 进口 − 出口 − 成型产出
    pub fn forming_scrap(&self) -> Array3<f64> {
        self.production_plus_trade() - &self.forming_fabrication
    }

    /// 加工损失 = 成型产出 − Σ_g 加工 → 在用
    pub fn fabrication_scrap(&self) -> Array3<f64> {
        &self.forming_fabrication - &self.fabrication_use.sum_axis(Axis(2))
    }
}

/// 外部提供的上游循环数组（整体替换需求反推路径）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalUpperCycle {
    pub production: Array3<f64>,
    /// 粗钢净贸易 (t, r, s)
    pub trade: Array3<f64>,
    pub forming_fabrication: Array3<f64>,
    pub fabrication_use: Array4<f64>,
    /// 间接净贸易 (t, r, g, s)
    pub indirect_trade: Array4<f64>,
    pub inflows: Array4<f64>,
    pub outflows: Array4<f64>,
}

impl ExternalUpperCycle {
    /// 形状校验
    pub fn check_shapes(&self, dimensions: &Dimensions) -> ModelResult<()> {
        let (n_t, n_r, n_s) = dimensions.trs();
        let n_g = dimensions.n_goods();

        let trs = [
            ("production", self.production.dim()),
            ("trade", self.trade.dim()),
            ("forming_fabrication", self.forming_fabrication.dim()),
        ];
        for (name, dim) in trs {
            if dim != (n_t, n_r, n_s) {
                return Err(ModelError::Consistency(format!(
                    "外部上游数组 {} 形状 {:?} 与 (t, r, s) = {:?} 不一致",
                    name,
                    dim,
                    (n_t, n_r, n_s)
                )));
            }
        }

        let trgs = [
            ("fabrication_use", self.fabrication_use.dim()),
            ("indirect_trade", self.indirect_trade.dim()),
            ("inflows", self.inflows.dim()),
            ("outflows", self.outflows.dim()),
        ];
        for (name, dim) in trgs {
            if dim != (n_t, n_r, n_g, n_s) {
                return Err(ModelError::Consistency(format!(
                    "外部上游数组 {} 形状 {:?} 与 (t, r, g, s) = {:?} 不一致",
                    name,
                    dim,
                    (n_t, n_r, n_g, n_s)
                )));
            }
        }
        Ok(())
    }
}

/// 上游循环计算路径（互斥）
#[derive(Debug, Clone, Copy)]
pub enum UpperCycleStrategy<'a> {
    /// 需求反推,携带历史贸易
    BaseModel(&'a TradeHistory),
    /// 外部数组整体替换
    External(&'a ExternalUpperCycle),
}

/// 总需求 = Σ_g 在用流入
pub fn total_demand(inflows: &Array4<f64>) -> Array3<f64> {
    inflows.sum_axis(Axis(2))
}

// ==========================================
// UpperCycleComputer - 上游循环计算
// ==========================================
pub struct UpperCycleComputer<'a> {
    config: &'a ModelConfig,
    dimensions: &'a Dimensions,
}

impl<'a> UpperCycleComputer<'a> {
    pub fn new(config: &'a ModelConfig, dimensions: &'a Dimensions) -> Self {
        Self { config, dimensions }
    }

    fn fabrication_yield(&self) -> ModelResult<Array1<f64>> {
        let yields = Array1::from(self.config.fabrication_yield.clone());
        if yields.len() != self.dimensions.n_goods() {
            return Err(ModelError::Configuration(format!(
                "加工收得率个数 {} 与在用类别数 {} 不一致",
                yields.len(),
                self.dimensions.n_goods()
            )));
        }
        if yields.iter().any(|y| *y <= 0.0 || *y > 1.0) {
            return Err(ModelError::Configuration(
                "加工收得率必须位于 (0, 1]".to_string(),
            ));
        }
        Ok(yields)
    }

    fn category_splitter(&self) -> CategorySplitter {
        let absorbing = self
            .config
            .trade
            .indirect_absorbing_category
            .as_deref()
            .and_then(|name| self.dimensions.good_index(name));
        CategorySplitter::new(self.config.trade.indirect_split, absorbing)
    }

    /// 计算上游循环
    ///
    /// # 参数
    /// - strategy: 计算路径
    /// - inflows / outflows: 在用流入/流出 (t, r, g, s)（复用调整后）; 外部路径下忽略
    #[instrument(skip_all)]
    pub fn compute(
        &self,
        strategy: UpperCycleStrategy<'_>,
        inflows: &Array4<f64>,
        outflows: &Array4<f64>,
    ) -> ModelResult<UpperCycle> {
        match strategy {
            UpperCycleStrategy::BaseModel(history) => self.compute_base_model(history, inflows, outflows),
            UpperCycleStrategy::External(external) => self.compute_external(external),
        }
    }

    fn compute_base_model(
        &self,
        history: &TradeHistory,
        inflows: &Array4<f64>,
        outflows: &Array4<f64>,
    ) -> ModelResult<UpperCycle> {
        let yields = self.fabrication_yield()?;
        let demand = total_demand(inflows);
        let trade = TradeReconstructor::new(self.config, self.dimensions);

        // 间接贸易: 外推后拆分到类别
        let indirect = trade.reconstruct(TradeClass::Indirect, &history.indirect, &demand)?;
        let indirect = self.category_splitter().split_trade(
            &indirect,
            history.indirect_shares.as_ref(),
            Some(inflows),
            Some(outflows),
        )?;

        let fabrication_use = inflows - &indirect.imports + &indirect.exports;

        // 除以加工收得率 (g 轴广播)
        let inverse_yield = yields.mapv(|y| 1.0 / y);
        let by_category = &fabrication_use * &inverse_yield.insert_axis(Axis(1));
        let forming_fabrication = by_category.sum_axis(Axis(2));

        let crude = trade.reconstruct(TradeClass::Crude, &history.crude, &demand)?;
        let production_plus_trade = forming_fabrication.mapv(|v| v / self.config.forming_yield);
        let production = &production_plus_trade + &crude.exports - &crude.imports;

        info!(
            total_production = production.sum(),
            total_demand = demand.sum(),
            "上游循环计算完成（需求反推）"
        );

        Ok(UpperCycle {
            production,
            forming_fabrication,
            imports: crude.imports,
            exports: crude.exports,
            fabrication_use,
            indirect_imports: indirect.imports,
            indirect_exports: indirect.exports,
            inflows: inflows.clone(),
            outflows: outflows.clone(),
        })
    }

    fn compute_external(&self, external: &ExternalUpperCycle) -> ModelResult<UpperCycle> {
        external.check_shapes(self.dimensions)?;
        let crude = split_net_trade(&external.trade);
        let indirect = split_net_trade(&external.indirect_trade);

        info!(
            total_production = external.production.sum(),
            "上游循环采用外部数据"
        );

        Ok(UpperCycle {
            production: external.production.clone(),
            forming_fabrication: external.forming_fabrication.clone(),
            imports: crude.imports,
            exports: crude.exports,
            fabrication_use: external.fabrication_use.clone(),
            indirect_imports: indirect.imports,
            indirect_exports: indirect.exports,
            inflows: external.inflows.clone(),
            outflows: external.outflows.clone(),
        })
    }
}
