// ==========================================
// 钢铁物质流分析 - 贸易重建引擎
// ==========================================
// 输入: 已知窗口内净贸易 (t_known, r) + 全时段外推基准 (t, r, s)
// 输出: 全时段进口/出口 (t, r, s)
// 规则:
// 1) 窗口内净贸易保持不变
// 2) 窗口外 = 最近边界年净贸易 × scaler[t] / scaler[边界年]
// 3) 边界年 scaler 为 0 时比值取 0（不产生 NaN/Inf）
// 4) 进口 = max(净, 0),出口 = max(-净, 0)
// ==========================================

use crate::config::{ModelConfig, TradeWindow};
use crate::domain::error::{ModelError, ModelResult};
use crate::domain::types::{Dimensions, TradeClass};
use ndarray::{s, Array, Array2, Array3, Dimension};
use tracing::{debug, instrument};

/// 进口/出口数组对
#[derive(Debug, Clone, PartialEq)]
pub struct TradeFlows<D: Dimension> {
    pub imports: Array<f64, D>,
    pub exports: Array<f64, D>,
}

impl<D: Dimension> TradeFlows<D> {
    /// 净贸易 = 进口 − 出口
    pub fn net(&self) -> Array<f64, D> {
        &self.imports - &self.exports
    }
}

/// 净贸易按符号拆分为进口与出口
pub fn split_net_trade<D: Dimension>(net: &Array<f64, D>) -> TradeFlows<D> {
    TradeFlows {
        imports: net.mapv(|v| if v > 0.0 { v } else { 0.0 }),
        exports: net.mapv(|v| if v < 0.0 { -v } else { 0.0 }),
    }
}

/// 外推比值,基准为 0 时取 0
fn scale_ratio(value: f64, boundary: f64) -> f64 {
    if boundary == 0.0 {
        0.0
    } else {
        value / boundary
    }
}

// ==========================================
// TradeReconstructor - 贸易重建
// ==========================================
pub struct TradeReconstructor<'a> {
    config: &'a ModelConfig,
    dimensions: &'a Dimensions,
}

impl<'a> TradeReconstructor<'a> {
    pub fn new(config: &'a ModelConfig, dimensions: &'a Dimensions) -> Self {
        Self { config, dimensions }
    }

    pub fn window(&self, class: TradeClass) -> TradeWindow {
        match class {
            TradeClass::Crude => self.config.trade.crude,
            TradeClass::Scrap => self.config.trade.scrap,
            TradeClass::Indirect => self.config.trade.indirect,
        }
    }

    /// 已知窗口在 Time 轴上的索引区间（含两端）
    fn window_indices(&self, class: TradeClass) -> ModelResult<(usize, usize)> {
        let window = self.window(class);
        match (
            self.dimensions.year_index(window.first_year),
            self.dimensions.year_index(window.last_year),
        ) {
            (Some(first), Some(last)) if first <= last => Ok((first, last)),
            _ => Err(ModelError::Consistency(format!(
                "{} 贸易窗口 {}-{} 超出模型年份 {}-{}",
                class,
                window.first_year,
                window.last_year,
                self.dimensions.first_year(),
                self.dimensions.last_year()
            ))),
        }
    }

    fn check_shapes(
        &self,
        class: TradeClass,
        known: &Array2<f64>,
        scaler: &Array3<f64>,
        n_known: usize,
    ) -> ModelResult<()> {
        let (n_t, n_r, n_s) = self.dimensions.trs();
        if scaler.dim() != (n_t, n_r, n_s) {
            return Err(ModelError::Consistency(format!(
                "{} 贸易外推基准形状 {:?} 与 (t, r, s) = {:?} 不一致",
                class,
                scaler.dim(),
                (n_t, n_r, n_s)
            )));
        }
        if known.dim() != (n_known, n_r) {
            return Err(ModelError::Consistency(format!(
                "{} 历史净贸易形状 {:?} 与窗口 (t, r) = {:?} 不一致",
                class,
                known.dim(),
                (n_known, n_r)
            )));
        }
        Ok(())
    }

    /// 净贸易外推到全时段
    ///
    /// # 参数
    /// - class: 贸易类别（决定已知窗口）
    /// - known: 已知窗口净贸易 (t_known, r)
    /// - scaler: 外推基准 (t, r, s)
    ///
    /// # 返回
    /// 全时段净贸易 (t, r, s)
    pub fn extrapolate_net_trade(
        &self,
        class: TradeClass,
        known: &Array2<f64>,
        scaler: &Array3<f64>,
    ) -> ModelResult<Array3<f64>> {
        let (first, last) = self.window_indices(class)?;
        self.check_shapes(class, known, scaler, last - first + 1)?;

        let (n_t, n_r, n_s) = scaler.dim();
        let mut net = Array3::<f64>::zeros((n_t, n_r, n_s));

        for t in 0..n_t {
            for r in 0..n_r {
                for s in 0..n_s {
                    net[[t, r, s]] = if t < first {
                        known[[0, r]] * scale_ratio(scaler[[t, r, s]], scaler[[first, r, s]])
                    } else if t > last {
                        known[[last - first, r]]
                            * scale_ratio(scaler[[t, r, s]], scaler[[last, r, s]])
                    } else {
                        known[[t - first, r]]
                    };
                }
            }
        }

        debug!(
            class = %class,
            first_known = first,
            last_known = last,
            years = n_t,
            "净贸易外推完成"
        );
        Ok(net)
    }

    /// 重建某类贸易的全时段进口/出口
    #[instrument(skip_all, fields(class = %class))]
    pub fn reconstruct(
        &self,
        class: TradeClass,
        known: &Array2<f64>,
        scaler: &Array3<f64>,
    ) -> ModelResult<TradeFlows<ndarray::Ix3>> {
        let net = self.extrapolate_net_trade(class, known, scaler)?;
        Ok(split_net_trade(&net))
    }

    /// 仅向过去外推的历史净贸易（模型起始年 … 窗口末年）
    ///
    /// 用于历史报表,不含窗口之后的年份
    pub fn scaled_past_net_trade(
        &self,
        class: TradeClass,
        known: &Array2<f64>,
        scaler: &Array3<f64>,
    ) -> ModelResult<Array3<f64>> {
        let (_, last) = self.window_indices(class)?;
        let net = self.extrapolate_net_trade(class, known, scaler)?;
        Ok(net.slice(s![..=last, .., ..]).to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn setup() -> (ModelConfig, Dimensions) {
        let mut config = ModelConfig::default();
        config.start_year = 2000;
        config.end_year = 2005;
        config.trade.crude = TradeWindow::new(2002, 2003);
        config.trade.scrap = TradeWindow::new(2000, 2005);
        config.trade.indirect = TradeWindow::new(2002, 2002);
        let dims = Dimensions::new(
            config.years(),
            vec!["Fe".to_string()],
            vec!["EU".to_string(), "CN".to_string()],
            config.in_use_categories.clone(),
            config.recycling_categories.clone(),
            vec!["S1".to_string()],
        )
        .unwrap();
        (config, dims)
    }

    fn scaler(values: [[f64; 2]; 6]) -> Array3<f64> {
        let mut out = Array3::<f64>::zeros((6, 2, 1));
        for t in 0..6 {
            for r in 0..2 {
                out[[t, r, 0]] = values[t][r];
            }
        }
        out
    }

    #[test]
    fn test_extrapolation_tracks_scaler() {
        let (config, dims) = setup();
        let trade = TradeReconstructor::new(&config, &dims);
        let known = array![[10.0, -4.0], [20.0, -8.0]];
        let sc = scaler([
            [50.0, 1.0],
            [100.0, 2.0],
            [100.0, 4.0],
            [200.0, 8.0],
            [300.0, 8.0],
            [400.0, 16.0],
        ]);
        let net = trade.extrapolate_net_trade(TradeClass::Crude, &known, &sc).unwrap();

        // 窗口内保持不变
        assert_eq!(net[[2, 0, 0]], 10.0);
        assert_eq!(net[[3, 1, 0]], -8.0);
        // 向过去: 10 × 50/100
        assert_eq!(net[[0, 0, 0]], 5.0);
        assert_eq!(net[[1, 1, 0]], -2.0);
        // 向未来: 20 × 400/200
        assert_eq!(net[[5, 0, 0]], 40.0);
        assert_eq!(net[[4, 1, 0]], -8.0);
    }

    #[test]
    fn test_zero_scaler_at_boundary_gives_zero() {
        let (config, dims) = setup();
        let trade = TradeReconstructor::new(&config, &dims);
        let known = array![[10.0, 3.0], [20.0, 3.0]];
        let sc = scaler([
            [5.0, 1.0],
            [5.0, 1.0],
            [0.0, 1.0],
            [0.0, 1.0],
            [7.0, 1.0],
            [9.0, 1.0],
        ]);
        let net = trade.extrapolate_net_trade(TradeClass::Crude, &known, &sc).unwrap();
        for t in [0, 1, 4, 5] {
            assert_eq!(net[[t, 0, 0]], 0.0);
            assert!(net[[t, 0, 0]].is_finite());
        }
        assert_eq!(net[[5, 1, 0]], 3.0);
    }

    #[test]
    fn test_imports_exports_are_exclusive() {
        let (config, dims) = setup();
        let trade = TradeReconstructor::new(&config, &dims);
        let known = array![[10.0, -4.0], [-20.0, 8.0]];
        let sc = scaler([[1.0, 1.0]; 6]);
        let flows = trade.reconstruct(TradeClass::Crude, &known, &sc).unwrap();
        let net = trade.extrapolate_net_trade(TradeClass::Crude, &known, &sc).unwrap();

        for ((imp, exp), n) in flows.imports.iter().zip(flows.exports.iter()).zip(net.iter()) {
            assert_eq!(imp * exp, 0.0);
            assert!((imp - exp - n).abs() < 1e-12);
            assert!(*imp >= 0.0 && *exp >= 0.0);
        }
        assert_eq!(flows.net(), net);
    }

    #[test]
    fn test_shape_mismatch_is_consistency_error() {
        let (config, dims) = setup();
        let trade = TradeReconstructor::new(&config, &dims);
        let known = array![[10.0, -4.0]];
        let sc = scaler([[1.0, 1.0]; 6]);
        assert!(matches!(
            trade.extrapolate_net_trade(TradeClass::Crude, &known, &sc),
            Err(ModelError::Consistency(_))
        ));
    }

    #[test]
    fn test_scaled_past_stops_at_window_end() {
        let (config, dims) = setup();
        let trade = TradeReconstructor::new(&config, &dims);
        let known = array![[6.0, 6.0]];
        let sc = scaler([[1.0, 1.0], [2.0, 2.0], [3.0, 3.0], [4.0, 4.0], [5.0, 5.0], [6.0, 6.0]]);
        let past = trade
            .scaled_past_net_trade(TradeClass::Indirect, &known, &sc)
            .unwrap();
        assert_eq!(past.dim(), (3, 2, 1));
        assert_eq!(past[[0, 0, 0]], 2.0);
        assert_eq!(past[[2, 1, 0]], 6.0);
    }
}
