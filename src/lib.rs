// ==========================================
// 钢铁物质流分析 - 核心库
// ==========================================
// 职责: 从存量动态模型结果出发,构建年份 × 元素 × 区域 × 类别 × 情景
//       多维流量网络,并校验每个过程的质量守恒
// 技术栈: Rust + ndarray + SQLite (快照缓存)
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 维度、数量与流量网络
pub mod domain;

// 数据仓储层 - 快照缓存
pub mod repository;

// 引擎层 - 流量计算
pub mod engine;

// 导入层 - 外部数据表
pub mod importer;

// 配置层 - 模型配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一）
pub mod db;

// 日志系统
pub mod logging;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::{
    Dim, Dimensions, FlowNetwork, ModelError, ModelResult, ProcessId, Quantity, Signature,
    TradeClass,
};

// 引擎
pub use engine::{
    BalanceSummary, CategorySplitter, MassBalanceValidator, ModelBuilder, ModelInputs,
    ProductionRouteAllocator, ScrapRouter, TradeReconstructor, UpperCycleComputer,
};

// 配置
pub use config::{ConfigManager, ModelConfig};

// 仓储
pub use repository::{ModelSnapshot, SnapshotRepository};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称（亦用作数据目录名）
pub const APP_NAME: &str = "steel-mfa";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
        assert!(!APP_NAME.contains(' '));
    }
}
