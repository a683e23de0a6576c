// ==========================================
// 钢铁物质流分析 - 领域模型层
// ==========================================
// 职责: 维度/签名/过程类型、带签名数量、流量网络、错误类型
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod error;
pub mod network;
pub mod quantity;
pub mod types;

// 重导出核心类型
pub use error::{BalanceViolation, ModelError, ModelResult};
pub use network::{Flow, FlowNetwork, Process, Stock};
pub use quantity::Quantity;
pub use types::{Dim, Dimensions, ProcessId, Signature, TradeClass};
