// ==========================================
// 钢铁物质流分析 - 存量动态适配层
// ==========================================
// 职责:
// - 外部动态存量模型 (DSM) 输出契约与存量平衡校验
// - 在用复用调整（仅需求反推路径）
// - 存量变化计算（在用 / 填埋 / 耗散）
// 注: 队列存活计算本身不在本层,只消费其输出
// ==========================================

use crate::config::ModelConfig;
use crate::domain::error::{ModelError, ModelResult};
use crate::domain::types::Dimensions;
use ndarray::{Array3, Array4, Array5, Axis};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// 存量平衡致命阈值（吨）
pub const STOCK_BALANCE_ERROR: f64 = 1.0;
/// 存量平衡告警阈值（吨）
pub const STOCK_BALANCE_WARNING: f64 = 0.001;

/// 动态存量模型输出 (t, r, g, s)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DsmOutput {
    /// 在用存量（可缺省,缺省时不做存量平衡校验）
    pub stocks: Option<Array4<f64>>,
    pub inflows: Array4<f64>,
    pub outflows: Array4<f64>,
}

impl DsmOutput {
    pub fn new(stocks: Option<Array4<f64>>, inflows: Array4<f64>, outflows: Array4<f64>) -> Self {
        Self {
            stocks,
            inflows,
            outflows,
        }
    }

    /// 形状校验: 必须为 (t, r, g, s)
    pub fn check_shape(&self, dimensions: &Dimensions) -> ModelResult<()> {
        let (n_t, n_r, n_s) = dimensions.trs();
        let expected = (n_t, n_r, dimensions.n_goods(), n_s);

        let mut arrays = vec![("inflows", self.inflows.dim()), ("outflows", self.outflows.dim())];
        if let Some(stocks) = &self.stocks {
            arrays.push(("stocks", stocks.dim()));
        }
        for (name, dim) in arrays {
            if dim != expected {
                return Err(ModelError::Consistency(format!(
                    "DSM {} 形状 {:?} 与 (t, r, g, s) = {:?} 不一致",
                    name, dim, expected
                )));
            }
        }
        Ok(())
    }

    /// 数值校验: 流入/流出/存量必须全部为有限值
    pub fn check_finite(&self) -> ModelResult<()> {
        let mut arrays = vec![("inflows", &self.inflows), ("outflows", &self.outflows)];
        if let Some(stocks) = &self.stocks {
            arrays.push(("stocks", stocks));
        }
        for (name, values) in arrays {
            if let Some(((t, r, g, s), v)) = values.indexed_iter().find(|(_, v)| !v.is_finite()) {
                return Err(ModelError::Consistency(format!(
                    "DSM {} 含非有限值 {} (t={}, r={}, g={}, s={})",
                    name, v, t, r, g, s
                )));
            }
        }
        Ok(())
    }

    /// 存量平衡: Σ|stock[t] − stock[t−1] − (in[t] − out[t])|
    ///
    /// # 返回
    /// 不平衡总量; 无存量数组时返回 None
    pub fn stock_balance(&self) -> Option<f64> {
        let stocks = self.stocks.as_ref()?;
        let mut total = 0.0;
        for ((t, r, g, s), stock) in stocks.indexed_iter() {
            let previous = if t == 0 { 0.0 } else { stocks[[t - 1, r, g, s]] };
            let net = self.inflows[[t, r, g, s]] - self.outflows[[t, r, g, s]];
            total += (stock - previous - net).abs();
        }
        Some(total)
    }

    /// 存量平衡校验
    ///
    /// # 校验规则
    /// - > 1 吨: 一致性错误
    /// - > 0.001 吨: 告警日志
    pub fn check_stock_balance(&self) -> ModelResult<()> {
        let Some(balance) = self.stock_balance() else {
            debug!("DSM 未提供存量数组,跳过存量平衡校验");
            return Ok(());
        };

        if balance > STOCK_BALANCE_ERROR {
            return Err(ModelError::Consistency(format!(
                "动态存量模型存量平衡偏差过大: {}",
                balance
            )));
        }
        if balance > STOCK_BALANCE_WARNING {
            warn!(balance = balance, "动态存量模型存量平衡偏差值得关注");
        } else {
            debug!(balance = balance, "动态存量模型存量平衡校验通过");
        }
        Ok(())
    }
}

// ==========================================
// 复用调整
// ==========================================

/// 复用系数时间线 (t, g, s)
///
/// # 说明
/// 基准年及之前为 1,之后线性变化,末年达到配置的 [类别][情景] 系数
pub fn reuse_factor_timeline(config: &ModelConfig, dimensions: &Dimensions) -> ModelResult<Array3<f64>> {
    let n_t = dimensions.n_years();
    let n_g = dimensions.n_goods();
    let n_s = dimensions.n_scenarios();
    let factors = &config.reuse.factors;

    if factors.len() != n_g || factors.iter().any(|row| row.len() != n_s) {
        return Err(ModelError::Configuration(format!(
            "复用系数形状必须为 [{}][{}]",
            n_g, n_s
        )));
    }

    let base = config.reuse.change_base_year;
    let end = dimensions.last_year();
    let mut timeline = Array3::<f64>::ones((n_t, n_g, n_s));

    for ((t, g, s), v) in timeline.indexed_iter_mut() {
        let year = dimensions.years[t];
        let progress = if end <= base {
            if year >= base {
                1.0
            } else {
                0.0
            }
        } else {
            ((year - base) as f64 / (end - base) as f64).clamp(0.0, 1.0)
        };
        *v = 1.0 + (factors[g][s] - 1.0) * progress;
    }

    Ok(timeline)
}

/// 复用调整: reuse = outflows × (timeline − 1),流入与流出同时扣减
///
/// # 返回
/// 复用量 (t, r, g, s),即在用 → 在用 自环流
pub fn apply_reuse(dsm: &mut DsmOutput, timeline: &Array3<f64>) -> ModelResult<Array4<f64>> {
    let (n_t, _, n_g, n_s) = dsm.outflows.dim();
    if timeline.dim() != (n_t, n_g, n_s) {
        return Err(ModelError::Consistency(format!(
            "复用时间线形状 {:?} 与 (t, g, s) = {:?} 不一致",
            timeline.dim(),
            (n_t, n_g, n_s)
        )));
    }

    let mut reuse = dsm.outflows.clone();
    for ((t, _, g, s), v) in reuse.indexed_iter_mut() {
        *v *= timeline[[t, g, s]] - 1.0;
    }
    dsm.inflows -= &reuse;
    dsm.outflows -= &reuse;

    info!(total_reuse = reuse.sum(), "在用复用调整完成");
    Ok(reuse)
}

// ==========================================
// 存量变化
// ==========================================

/// 在用存量变化 = 流入 − 流出 (t, r, g, s)
pub fn in_use_stock_change(inflows: &Array4<f64>, outflows: &Array4<f64>) -> Array4<f64> {
    inflows - outflows
}

/// 耗散存量变化 = Σ_g 在用 → 耗散 (t, r, w, s)
pub fn dissipative_stock_change(use_dissipative: &Array5<f64>) -> Array4<f64> {
    use_dissipative.sum_axis(Axis(2))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dims(years: Vec<i32>) -> Dimensions {
        Dimensions::new(
            years,
            vec!["Fe".to_string()],
            vec!["R".to_string()],
            vec!["A".to_string()],
            vec!["X".to_string()],
            vec!["S1".to_string()],
        )
        .unwrap()
    }

    fn dsm(stock_offset: f64) -> DsmOutput {
        let inflows = Array4::from_elem((3, 1, 1, 1), 10.0);
        let outflows = Array4::from_elem((3, 1, 1, 1), 4.0);
        let mut stocks = Array4::<f64>::zeros((3, 1, 1, 1));
        for t in 0..3 {
            stocks[[t, 0, 0, 0]] = 6.0 * (t as f64 + 1.0);
        }
        stocks[[2, 0, 0, 0]] += stock_offset;
        DsmOutput::new(Some(stocks), inflows, outflows)
    }

    #[test]
    fn test_balanced_dsm_passes() {
        let output = dsm(0.0);
        assert_eq!(output.stock_balance(), Some(0.0));
        assert!(output.check_stock_balance().is_ok());
    }

    #[test]
    fn test_non_finite_dsm_rejected() {
        let mut output = dsm(0.0);
        assert!(output.check_finite().is_ok());
        output.outflows[[1, 0, 0, 0]] = f64::NAN;
        assert!(matches!(output.check_finite(), Err(ModelError::Consistency(_))));
    }

    #[test]
    fn test_small_imbalance_only_warns() {
        assert!(dsm(0.5).check_stock_balance().is_ok());
    }

    #[test]
    fn test_large_imbalance_is_consistency_error() {
        assert!(matches!(
            dsm(2.0).check_stock_balance(),
            Err(ModelError::Consistency(_))
        ));
    }

    #[test]
    fn test_missing_stocks_skip_check() {
        let mut output = dsm(5.0);
        output.stocks = None;
        assert!(output.check_stock_balance().is_ok());
    }

    #[test]
    fn test_shape_check() {
        let output = dsm(0.0);
        assert!(output.check_shape(&dims(vec![2000, 2001, 2002])).is_ok());
        assert!(output.check_shape(&dims(vec![2000, 2001])).is_err());
    }

    #[test]
    fn test_reuse_timeline_ramps_linearly() {
        let mut config = ModelConfig::default();
        config.reuse.change_base_year = 2000;
        config.reuse.factors = vec![vec![1.5]];
        let timeline = reuse_factor_timeline(&config, &dims(vec![1999, 2000, 2001, 2002])).unwrap();
        assert_eq!(timeline[[0, 0, 0]], 1.0);
        assert_eq!(timeline[[1, 0, 0]], 1.0);
        assert!((timeline[[2, 0, 0]] - 1.25).abs() < 1e-12);
        assert!((timeline[[3, 0, 0]] - 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_apply_reuse_reduces_both_sides() {
        let mut output = dsm(0.0);
        let timeline = Array3::from_elem((3, 1, 1), 1.25);
        let reuse = apply_reuse(&mut output, &timeline).unwrap();
        assert_eq!(reuse[[0, 0, 0, 0]], 1.0);
        assert_eq!(output.inflows[[0, 0, 0, 0]], 9.0);
        assert_eq!(output.outflows[[0, 0, 0, 0]], 3.0);
        // 存量变化不受复用影响
        let change = in_use_stock_change(&output.inflows, &output.outflows);
        assert_eq!(change[[1, 0, 0, 0]], 6.0);
    }
}
