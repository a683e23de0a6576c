// ==========================================
// 钢铁物质流分析 - 配置层
// ==========================================
// 职责: 模型配置对象、默认值、TOML 覆写、配置指纹
// 来源: 内置默认值 < 覆写文件 (--config)
// ==========================================

pub mod config_manager;
pub mod model_config;

// 重导出核心配置类型
pub use config_manager::{fingerprint, validate_config, ConfigManager};
pub use model_config::{MaxScrapShareConfig, ModelConfig, ReuseConfig, TradeConfig, TradeWindow};
