// ==========================================
// 钢铁物质流分析 - 废钢路由引擎
// ==========================================
// 1) 在用流出按 类别→报废类别 矩阵分配;
//    边界 (Dis) 左侧 → 报废废钢, 边界及右侧 → 耗散/不可收集
// 2) 成型/加工过程损失注入 Form / Fabr 两个预留槽位
// 3) 废钢进出口（按产量外推,按废钢池构成拆分）调整废钢池
// 4) 可回收废钢 = Σ_w 废钢池 × 可回收系数
// ==========================================

use crate::config::ModelConfig;
use crate::domain::error::{ModelError, ModelResult};
use crate::domain::types::{Dimensions, TradeClass};
use crate::engine::category_split::split_inferred;
use crate::engine::trade::TradeReconstructor;
use crate::engine::upper_cycle::UpperCycle;
use ndarray::{s, Array1, Array2, Array3, Array4, Array5, Axis};
use tracing::{debug, info, instrument};

/// 废钢池计算结果
#[derive(Debug, Clone, PartialEq)]
pub struct ScrapPool {
    /// 在用 → 报废 (t, r, g, w, s)
    pub use_eol: Array5<f64>,
    /// 在用 → 耗散/不可收集 (t, r, g, w, s)
    pub use_dissipative: Array5<f64>,
    /// 成型/加工损失 (t, r, s)
    pub forming_scrap: Array3<f64>,
    pub fabrication_scrap: Array3<f64>,
    /// 国内可得废钢 (t, r, w, s)
    pub available: Array4<f64>,
    /// 废钢进口/出口 (t, r, w, s)
    pub scrap_imports: Array4<f64>,
    pub scrap_exports: Array4<f64>,
    /// 贸易调整后废钢池 (t, r, w, s)
    pub total: Array4<f64>,
}

// ==========================================
// ScrapRouter - 废钢路由
// ==========================================
pub struct ScrapRouter<'a> {
    config: &'a ModelConfig,
    dimensions: &'a Dimensions,
    boundary: usize,
    form_slot: usize,
    fabr_slot: usize,
    distribution: Array2<f64>,
    recyclability: Array1<f64>,
}

impl<'a> ScrapRouter<'a> {
    /// 创建路由器,解析边界与预留槽位索引
    pub fn new(config: &'a ModelConfig, dimensions: &'a Dimensions) -> ModelResult<Self> {
        let slot = |name: &str| {
            dimensions.waste_index(name).ok_or_else(|| {
                ModelError::Configuration(format!("报废类别中不存在 '{}'", name))
            })
        };
        let boundary = slot(config.dissipative_boundary.as_str())?;
        let form_slot = slot(config.forming_scrap_category.as_str())?;
        let fabr_slot = slot(config.fabrication_scrap_category.as_str())?;

        let n_g = dimensions.n_goods();
        let n_w = dimensions.n_waste();
        if config.use_eol_distribution.len() != n_g
            || config.use_eol_distribution.iter().any(|row| row.len() != n_w)
        {
            return Err(ModelError::Configuration(format!(
                "报废分配矩阵形状应为 {} × {}",
                n_g, n_w
            )));
        }
        if config.recyclability.len() != n_w {
            return Err(ModelError::Configuration(format!(
                "可回收系数个数 {} 与报废类别数 {} 不一致",
                config.recyclability.len(),
                n_w
            )));
        }

        let flat: Vec<f64> = config.use_eol_distribution.iter().flatten().copied().collect();
        let distribution = Array2::from_shape_vec((n_g, n_w), flat)
            .map_err(|e| ModelError::Configuration(format!("报废分配矩阵错误: {}", e)))?;

        Ok(Self {
            config,
            dimensions,
            boundary,
            form_slot,
            fabr_slot,
            distribution,
            recyclability: Array1::from(config.recyclability.clone()),
        })
    }

    pub fn boundary(&self) -> usize {
        self.boundary
    }

    pub fn form_slot(&self) -> usize {
        self.form_slot
    }

    pub fn fabr_slot(&self) -> usize {
        self.fabr_slot
    }

    /// 在用流出按报废类别分配,拆成 (报废废钢, 耗散损失)
    ///
    /// # 返回
    /// 两个 (t, r, g, w, s) 数组,同一单元只在其中一个非零
    pub fn route_use_outflows(&self, outflows: &Array4<f64>) -> (Array5<f64>, Array5<f64>) {
        let (n_t, n_r, n_g, n_s) = outflows.dim();
        let n_w = self.distribution.ncols();

        let mut use_eol = Array5::<f64>::zeros((n_t, n_r, n_g, n_w, n_s));
        let mut use_dissipative = Array5::<f64>::zeros((n_t, n_r, n_g, n_w, n_s));

        for ((t, r, g, w, s), v) in use_eol.indexed_iter_mut() {
            if w < self.boundary {
                *v = outflows[[t, r, g, s]] * self.distribution[[g, w]];
            }
        }
        for ((t, r, g, w, s), v) in use_dissipative.indexed_iter_mut() {
            if w >= self.boundary {
                *v = outflows[[t, r, g, s]] * self.distribution[[g, w]];
            }
        }

        (use_eol, use_dissipative)
    }

    /// 组装废钢池并叠加废钢贸易
    ///
    /// # 参数
    /// - upper: 上游循环结果
    /// - scrap_history: 已知窗口废钢净贸易 (t_known, r)
    #[instrument(skip_all)]
    pub fn route(&self, upper: &UpperCycle, scrap_history: &Array2<f64>) -> ModelResult<ScrapPool> {
        let (use_eol, use_dissipative) = self.route_use_outflows(&upper.outflows);
        let forming_scrap = upper.forming_scrap();
        let fabrication_scrap = upper.fabrication_scrap();

        let mut available = use_eol.sum_axis(Axis(2));
        {
            let mut form = available.slice_mut(s![.., .., self.form_slot, ..]);
            form += &forming_scrap;
        }
        {
            let mut fabr = available.slice_mut(s![.., .., self.fabr_slot, ..]);
            fabr += &fabrication_scrap;
        }

        let trade = TradeReconstructor::new(self.config, self.dimensions).reconstruct(
            TradeClass::Scrap,
            scrap_history,
            &upper.production,
        )?;
        let scrap_imports = split_inferred(&trade.imports, &available)?;
        let scrap_exports = split_inferred(&trade.exports, &available)?;
        let total = &available + &scrap_imports - &scrap_exports;

        debug!(
            boundary = self.boundary,
            waste_categories = self.dimensions.n_waste(),
            "废钢池组装完成"
        );
        info!(
            available_scrap = available.sum(),
            dissipative = use_dissipative.sum(),
            "废钢路由完成"
        );

        Ok(ScrapPool {
            use_eol,
            use_dissipative,
            forming_scrap,
            fabrication_scrap,
            available,
            scrap_imports,
            scrap_exports,
            total,
        })
    }

    /// 可回收废钢 (t, r, s) = Σ_w 废钢池 × 可回收系数
    pub fn recyclable_scrap(&self, total: &Array4<f64>) -> Array3<f64> {
        let weighted = total * &self.recyclability.view().insert_axis(Axis(1));
        weighted.sum_axis(Axis(2))
    }
}
