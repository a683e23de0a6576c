// ==========================================
// 钢铁物质流分析 - 质量守恒校验引擎
// ==========================================
// 规则: 对每个非环境过程, |Σ流入 − Σ流出 − 存量变化| ≤ 容差
//       按 (t, r, s) 单元检查,Element/Good/Waste 维度已汇总
// 豁免: Environment（边界/残差节点）
// ==========================================

use crate::domain::error::{BalanceViolation, ModelError, ModelResult};
use crate::domain::network::FlowNetwork;
use crate::domain::types::ProcessId;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{error, info, instrument};

/// 校验通过后的平衡摘要
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceSummary {
    /// 每个过程的最大绝对不平衡量（按过程编号索引）
    pub balance: Vec<f64>,
    /// 已检查的 (过程, t, r, s) 单元数
    pub checked_cells: usize,
    pub tolerance: f64,
}

impl BalanceSummary {
    /// 除环境节点外的最大绝对不平衡量
    pub fn max_imbalance(&self) -> f64 {
        self.balance
            .iter()
            .skip(1)
            .fold(0.0_f64, |acc, v| acc.max(*v))
    }
}

impl fmt::Display for BalanceSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Success - Model loaded and checked. Balance: {:?} (cells={}, tolerance={})",
            self.balance, self.checked_cells, self.tolerance
        )
    }
}

// ==========================================
// MassBalanceValidator - 质量守恒校验
// ==========================================
pub struct MassBalanceValidator {
    tolerance: f64,
}

impl MassBalanceValidator {
    pub fn new(tolerance: f64) -> Self {
        Self { tolerance }
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// 校验网络质量守恒
    ///
    /// # 返回
    /// - Ok(BalanceSummary): 所有非环境过程均在容差内
    /// - Err(ModelError::MassBalance): 列出每个超差过程及其最差单元
    #[instrument(skip_all, fields(network = %network.name))]
    pub fn validate(&self, network: &FlowNetwork) -> ModelResult<BalanceSummary> {
        let balance = network.mass_balance()?;
        let dims = network.dimensions();

        let mut per_process = vec![0.0_f64; balance.len_of(ndarray::Axis(0))];
        let mut violations = Vec::new();
        let mut checked_cells = 0;

        for (p, node) in balance.outer_iter().enumerate() {
            let mut worst: Option<((usize, usize, usize), f64)> = None;
            for (cell, value) in node.indexed_iter() {
                let abs = value.abs();
                // 非有限值视为最差单元,一经选中不再被替换
                let is_worse = worst.map_or(true, |(_, w)| {
                    !w.is_nan() && (abs.is_nan() || abs > w)
                });
                if is_worse {
                    worst = Some((cell, abs));
                }
            }
            let Some(((t, r, s), worst_abs)) = worst else {
                continue;
            };
            per_process[p] = worst_abs;

            let Some(process) = ProcessId::from_id(p) else {
                continue;
            };
            if process == ProcessId::Environment {
                continue;
            }
            checked_cells += node.len();

            if !(worst_abs <= self.tolerance) {
                error!(
                    process = %process,
                    imbalance = node[[t, r, s]],
                    year = dims.years[t],
                    "质量守恒校验失败"
                );
                violations.push(BalanceViolation {
                    process,
                    imbalance: node[[t, r, s]],
                    year: dims.years[t],
                    region: dims.regions[r].clone(),
                    scenario: dims.scenarios[s].clone(),
                });
            }
        }

        if !violations.is_empty() {
            return Err(ModelError::MassBalance {
                violations,
                balance: per_process,
            });
        }

        let summary = BalanceSummary {
            balance: per_process,
            checked_cells,
            tolerance: self.tolerance,
        };
        info!(max_imbalance = summary.max_imbalance(), "质量守恒校验通过");
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::{Dimensions, Signature};
    use ndarray::{ArrayD, IxDyn};

    fn network() -> FlowNetwork {
        let dims = Dimensions::new(
            vec![2000, 2001],
            vec!["Fe".to_string()],
            vec!["R".to_string()],
            vec!["A".to_string()],
            vec!["X".to_string()],
            vec!["S1".to_string()],
        )
        .unwrap();
        let mut net = FlowNetwork::new("test", "t", dims);
        for p in ProcessId::ALL {
            net.add_process(p, p.name()).unwrap();
        }
        net.add_flow("imports", ProcessId::Environment, ProcessId::Forming, Signature::Ters)
            .unwrap();
        net.add_flow("exports", ProcessId::Forming, ProcessId::Environment, Signature::Ters)
            .unwrap();
        net.add_flow("reuse", ProcessId::Use, ProcessId::Use, Signature::Tergs)
            .unwrap();
        net
    }

    fn ters(value: f64) -> ArrayD<f64> {
        ArrayD::from_elem(IxDyn(&[2, 1, 1, 1]), value)
    }

    #[test]
    fn test_balanced_network_passes() {
        let mut net = network();
        net.set_flow(ProcessId::Environment, ProcessId::Forming, ters(10.0))
            .unwrap();
        net.set_flow(ProcessId::Forming, ProcessId::Environment, ters(10.0))
            .unwrap();
        net.set_flow(
            ProcessId::Use,
            ProcessId::Use,
            ArrayD::from_elem(IxDyn(&[2, 1, 1, 1, 1]), 3.0),
        )
        .unwrap();

        let summary = MassBalanceValidator::new(1.0).validate(&net).unwrap();
        assert_eq!(summary.balance.len(), 10);
        assert_eq!(summary.max_imbalance(), 0.0);
        assert_eq!(summary.checked_cells, 9 * 2);
        assert!(summary.to_string().starts_with("Success"));
    }

    #[test]
    fn test_imbalance_names_process() {
        let mut net = network();
        net.set_flow(ProcessId::Environment, ProcessId::Forming, ters(10.0))
            .unwrap();
        net.set_flow(ProcessId::Forming, ProcessId::Environment, ters(7.5))
            .unwrap();

        let err = MassBalanceValidator::new(1.0).validate(&net).unwrap_err();
        match err {
            ModelError::MassBalance { violations, balance } => {
                assert_eq!(violations.len(), 1);
                assert_eq!(violations[0].process, ProcessId::Forming);
                assert_eq!(violations[0].imbalance, 2.5);
                assert_eq!(balance[ProcessId::Forming.id()], 2.5);
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_non_finite_imbalance_is_violation() {
        let mut net = network();
        let mut imports = ters(10.0);
        imports[[1, 0, 0, 0]] = f64::NAN;
        net.set_flow(ProcessId::Environment, ProcessId::Forming, imports)
            .unwrap();
        net.set_flow(ProcessId::Forming, ProcessId::Environment, ters(10.0))
            .unwrap();

        let err = MassBalanceValidator::new(1.0).validate(&net).unwrap_err();
        match err {
            ModelError::MassBalance { violations, .. } => {
                assert_eq!(violations.len(), 1);
                assert_eq!(violations[0].process, ProcessId::Forming);
                assert_eq!(violations[0].year, 2001);
                assert!(violations[0].imbalance.is_nan());
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_imbalance_within_tolerance_passes() {
        let mut net = network();
        net.set_flow(ProcessId::Environment, ProcessId::Forming, ters(10.0))
            .unwrap();
        net.set_flow(ProcessId::Forming, ProcessId::Environment, ters(9.5))
            .unwrap();
        let summary = MassBalanceValidator::new(1.0).validate(&net).unwrap();
        assert_eq!(summary.balance[ProcessId::Forming.id()], 0.5);
    }
}
