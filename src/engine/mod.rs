// ==========================================
// 钢铁物质流分析 - 引擎层
// ==========================================
// 职责: 贸易重建、类别拆分、上游循环、废钢路由、路线分配、
//       存量适配、质量守恒校验与整体编排
// 红线: Engine 不拼 SQL,不读文件
// ==========================================

pub mod category_split;
pub mod inputs;
pub mod mass_balance;
pub mod orchestrator;
pub mod route_allocator;
pub mod scrap_router;
pub mod stock;
pub mod strategy;
pub mod trade;
pub mod upper_cycle;

// 重导出核心引擎
pub use category_split::CategorySplitter;
pub use inputs::{ModelInputs, TradeHistory};
pub use mass_balance::{BalanceSummary, MassBalanceValidator};
pub use orchestrator::{BuildOutcome, ModelBuilder};
pub use route_allocator::{ProductionRouteAllocator, RouteAllocation};
pub use scrap_router::{ScrapPool, ScrapRouter};
pub use stock::DsmOutput;
pub use strategy::{CategorySplitMode, UpperCycleMode};
pub use trade::{TradeFlows, TradeReconstructor};
pub use upper_cycle::{ExternalUpperCycle, UpperCycle, UpperCycleComputer, UpperCycleStrategy};
