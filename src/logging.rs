// ==========================================
// 钢铁物质流分析 - 日志初始化
// ==========================================
// 过滤: RUST_LOG 优先; 否则按命令行 -v 次数放开 steel_mfa 的级别
// 格式: 文本（默认）或 JSON 行（便于批量运行时收集）
// ==========================================

use tracing_subscriber::{fmt, EnvFilter};

/// 日志输出格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// 按 -v 次数生成过滤指令
///
/// # 说明
/// - 0: 本 crate info,依赖 warn
/// - 1: 本 crate debug（含各步骤数组统计）
/// - ≥2: 本 crate trace,依赖 info
pub fn filter_directives(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn,steel_mfa=info",
        1 => "warn,steel_mfa=debug",
        _ => "info,steel_mfa=trace",
    }
}

/// 初始化日志系统
///
/// # 参数
/// - verbosity: 命令行 -v 次数; 设置 RUST_LOG 时忽略
/// - format: 输出格式
pub fn init(verbosity: u8, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directives(verbosity)));

    match format {
        LogFormat::Text => fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_line_number(true)
            .init(),
        LogFormat::Json => fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(true)
            .init(),
    }
}

/// 测试用日志（debug 级别,输出交给测试框架捕获）
pub fn init_test() {
    let _ = fmt()
        .with_env_filter(EnvFilter::new(filter_directives(1)))
        .with_test_writer()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_raises_crate_level() {
        assert_eq!(filter_directives(0), "warn,steel_mfa=info");
        assert!(filter_directives(1).contains("steel_mfa=debug"));
        assert_eq!(filter_directives(2), filter_directives(5));
    }

    #[test]
    fn test_directives_parse_as_filter() {
        for verbosity in 0..3 {
            assert!(EnvFilter::try_new(filter_directives(verbosity)).is_ok());
        }
    }
}
