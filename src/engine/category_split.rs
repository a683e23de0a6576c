// ==========================================
// 钢铁物质流分析 - 类别拆分引擎
// ==========================================
// 职责: 将 (t, r, s) 总量分配到类别轴 (t, r, c, s)
// 模式:
// - 份额表 (RealData): 外部份额 (r, c),行归一,指定类别吸收舍入误差
// - 推断 (Inferred): 取配套流自身的类别构成作为份额
// 红线: 行和为 0 时份额显式为 0
// ==========================================

use crate::domain::error::{ModelError, ModelResult};
use crate::engine::strategy::CategorySplitMode;
use crate::engine::trade::{split_net_trade, TradeFlows};
use ndarray::{Array2, Array3, Array4, Axis, Ix4};
use tracing::debug;

/// 份额表行归一
///
/// # 参数
/// - raw: 原始数量/份额 (r, c),负值视为 0
/// - absorbing: 吸收舍入误差的类别索引
///
/// # 返回
/// 行和为 1（或整行为 0）的份额表
pub fn normalize_share_table(raw: &Array2<f64>, absorbing: Option<usize>) -> Array2<f64> {
    let mut shares = raw.mapv(|v| if v.is_finite() && v > 0.0 { v } else { 0.0 });

    for mut row in shares.rows_mut() {
        let total: f64 = row.sum();
        if total == 0.0 {
            row.fill(0.0);
            continue;
        }
        row.mapv_inplace(|v| v / total);

        if let Some(a) = absorbing.filter(|a| *a < row.len()) {
            let others: f64 = row
                .iter()
                .enumerate()
                .filter(|(idx, _)| *idx != a)
                .map(|(_, v)| *v)
                .sum();
            row[a] = (1.0 - others).max(0.0);
        }
    }

    shares
}

/// 配套流的类别构成 (t, r, c, s),类别合计为 0 时份额为 0
pub fn category_shares(companion: &Array4<f64>) -> Array4<f64> {
    let totals = companion.sum_axis(Axis(2));
    let mut shares = companion.clone();
    for ((t, r, c, s), v) in shares.indexed_iter_mut() {
        let total = totals[[t, r, s]];
        *v = if total == 0.0 { 0.0 } else { companion[[t, r, c, s]] / total };
    }
    shares
}

/// 份额表拆分: (t, r, s) × (r, c) → (t, r, c, s)
pub fn split_by_share_table(aggregate: &Array3<f64>, shares: &Array2<f64>) -> ModelResult<Array4<f64>> {
    let (n_t, n_r, n_s) = aggregate.dim();
    let (share_r, n_c) = shares.dim();
    if share_r != n_r {
        return Err(ModelError::Consistency(format!(
            "份额表区域数 {} 与总量区域数 {} 不一致",
            share_r, n_r
        )));
    }

    let mut out = Array4::<f64>::zeros((n_t, n_r, n_c, n_s));
    for ((t, r, c, s), v) in out.indexed_iter_mut() {
        *v = aggregate[[t, r, s]] * shares[[r, c]];
    }
    Ok(out)
}

/// 推断拆分: 按配套流类别构成分配 (t, r, s) → (t, r, c, s)
pub fn split_inferred(aggregate: &Array3<f64>, companion: &Array4<f64>) -> ModelResult<Array4<f64>> {
    let (n_t, n_r, n_s) = aggregate.dim();
    let (c_t, c_r, n_c, c_s) = companion.dim();
    if (c_t, c_r, c_s) != (n_t, n_r, n_s) {
        return Err(ModelError::Consistency(format!(
            "配套流形状 {:?} 与总量形状 {:?} 不一致",
            companion.dim(),
            aggregate.dim()
        )));
    }

    let shares = category_shares(companion);
    let mut out = Array4::<f64>::zeros((n_t, n_r, n_c, n_s));
    for ((t, r, c, s), v) in out.indexed_iter_mut() {
        *v = aggregate[[t, r, s]] * shares[[t, r, c, s]];
    }
    Ok(out)
}

// ==========================================
// CategorySplitter - 间接贸易类别拆分
// ==========================================
pub struct CategorySplitter {
    mode: CategorySplitMode,
    absorbing: Option<usize>,
}

impl CategorySplitter {
    pub fn new(mode: CategorySplitMode, absorbing: Option<usize>) -> Self {
        Self { mode, absorbing }
    }

    pub fn mode(&self) -> CategorySplitMode {
        self.mode
    }

    /// 间接贸易拆分到在用类别
    ///
    /// # 参数
    /// - trade: 进口/出口 (t, r, s)
    /// - shares: 份额表 (r, g)，份额表模式必需
    /// - inflows / outflows: 在用流入/流出 (t, r, g, s)，推断模式必需
    ///
    /// # 返回
    /// 进口/出口 (t, r, g, s)
    ///
    /// # 说明
    /// 份额表模式对净贸易拆分后再按符号拆分,保证同一类别单元进出口不同时为正
    pub fn split_trade(
        &self,
        trade: &TradeFlows<ndarray::Ix3>,
        shares: Option<&Array2<f64>>,
        inflows: Option<&Array4<f64>>,
        outflows: Option<&Array4<f64>>,
    ) -> ModelResult<TradeFlows<Ix4>> {
        match self.mode {
            CategorySplitMode::RealData => {
                let raw = shares.ok_or_else(|| {
                    ModelError::Configuration(
                        "份额表拆分模式需要间接贸易类别份额表".to_string(),
                    )
                })?;
                let normalized = normalize_share_table(raw, self.absorbing);
                let net = split_by_share_table(&trade.net(), &normalized)?;
                debug!(categories = normalized.ncols(), "间接贸易按份额表拆分");
                Ok(split_net_trade(&net))
            }
            CategorySplitMode::Inferred => match (inflows, outflows) {
                (Some(inflows), Some(outflows)) => {
                    debug!("间接贸易按在用流入/流出构成拆分");
                    Ok(TradeFlows {
                        imports: split_inferred(&trade.imports, inflows)?,
                        exports: split_inferred(&trade.exports, outflows)?,
                    })
                }
                _ => Err(ModelError::Configuration(
                    "未提供在用流入/流出,无法按推断模式拆分间接贸易".to_string(),
                )),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_normalize_rows_and_absorb() {
        let raw = array![[1.0, 1.0, 2.0], [0.0, 0.0, 0.0], [3.0, -1.0, 1.0]];
        let shares = normalize_share_table(&raw, Some(2));
        assert!((shares.row(0).sum() - 1.0).abs() < 1e-12);
        assert_eq!(shares[[0, 0]], 0.25);
        assert_eq!(shares.row(1).sum(), 0.0);
        assert_eq!(shares[[2, 1]], 0.0);
        assert!(shares.iter().all(|v| *v >= 0.0));
    }

    #[test]
    fn test_real_data_split_preserves_total() {
        let mut aggregate = Array3::<f64>::zeros((2, 2, 1));
        aggregate[[0, 0, 0]] = 30.0;
        aggregate[[1, 1, 0]] = -12.0;
        let shares = normalize_share_table(&array![[1.0, 2.0], [3.0, 1.0]], Some(1));
        let split = split_by_share_table(&aggregate, &shares).unwrap();
        let summed = split.sum_axis(Axis(2));
        for (a, b) in summed.iter().zip(aggregate.iter()) {
            assert!((a - b).abs() < 1e-9);
        }
        assert!((split[[0, 0, 0, 0]] - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_inferred_split_uses_companion_shares() {
        let aggregate = Array3::from_elem((1, 1, 1), 10.0);
        let mut companion = Array4::<f64>::zeros((1, 1, 2, 1));
        companion[[0, 0, 0, 0]] = 1.0;
        companion[[0, 0, 1, 0]] = 3.0;
        let split = split_inferred(&aggregate, &companion).unwrap();
        assert_eq!(split[[0, 0, 0, 0]], 2.5);
        assert_eq!(split[[0, 0, 1, 0]], 7.5);
    }

    #[test]
    fn test_zero_companion_gives_zero_shares() {
        let companion = Array4::<f64>::zeros((1, 1, 3, 1));
        let shares = category_shares(&companion);
        assert!(shares.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_inferred_without_companions_is_configuration_error() {
        let splitter = CategorySplitter::new(CategorySplitMode::Inferred, None);
        let trade = split_net_trade(&Array3::from_elem((1, 1, 1), 5.0));
        let err = splitter.split_trade(&trade, None, None, None).unwrap_err();
        assert!(matches!(err, ModelError::Configuration(_)));
    }

    #[test]
    fn test_real_data_trade_split_keeps_exclusive_sides() {
        let splitter = CategorySplitter::new(CategorySplitMode::RealData, Some(0));
        let mut net = Array3::<f64>::zeros((2, 1, 1));
        net[[0, 0, 0]] = 8.0;
        net[[1, 0, 0]] = -4.0;
        let trade = split_net_trade(&net);
        let shares = array![[1.0, 3.0]];
        let split = splitter.split_trade(&trade, Some(&shares), None, None).unwrap();
        for (i, e) in split.imports.iter().zip(split.exports.iter()) {
            assert_eq!(i * e, 0.0);
        }
        assert!((split.imports[[0, 0, 1, 0]] - 6.0).abs() < 1e-12);
        assert!((split.exports[[1, 0, 0, 0]] - 1.0).abs() < 1e-12);
    }
}
