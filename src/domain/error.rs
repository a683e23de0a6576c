// ==========================================
// 钢铁物质流分析 - 模型错误类型
// ==========================================
// 工具: thiserror 派生宏
// 分类:
// - Configuration: 所选模式缺少配套数据 / 配置值非法
// - Consistency: 建模期拓扑或形状不一致（计算前致命）
// - MassBalance: 计算后质量守恒不满足（致命,附逐过程诊断）
// 注: 生产量为 0 / 外推基准为 0 等情况不是错误,按定义取 0
// ==========================================

use crate::domain::types::ProcessId;
use crate::importer::error::ImportError;
use crate::repository::error::RepositoryError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 单个过程的守恒违规记录（取该过程最差单元）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceViolation {
    pub process: ProcessId,
    pub imbalance: f64,
    pub year: i32,
    pub region: String,
    pub scenario: String,
}

/// 模型错误类型
#[derive(Error, Debug)]
pub enum ModelError {
    // ===== 配置错误 =====
    #[error("配置错误: {0}")]
    Configuration(String),

    // ===== 一致性错误 =====
    #[error("一致性检查失败: {0}")]
    Consistency(String),

    // ===== 质量守恒错误 =====
    #[error("{}", format_mass_balance_error(.violations, .balance))]
    MassBalance {
        violations: Vec<BalanceViolation>,
        balance: Vec<f64>,
    },

    // ===== 外部数据/持久化 =====
    #[error(transparent)]
    Import(#[from] ImportError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

fn format_mass_balance_error(violations: &[BalanceViolation], balance: &[f64]) -> String {
    let mut message = String::from("Error in mass balance of model\n");
    for v in violations {
        message.push_str(&format!(
            "\nError in process {}: {:.6} (year={}, region={}, scenario={})",
            v.process, v.imbalance, v.year, v.region, v.scenario
        ));
    }
    message.push_str(&format!("\n\nBalance summary: {:?}", balance));
    message
}

/// Result 类型别名
pub type ModelResult<T> = Result<T, ModelError>;
