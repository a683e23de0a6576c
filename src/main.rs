// ==========================================
// 钢铁物质流分析 - 命令行入口
// ==========================================
// 流程: 加载配置 → 查快照缓存 → (未命中) 导入数据并计算 → 写快照 → 输出摘要
// --trade-history: 只导入数据,输出某类贸易的历史净贸易（按年汇总）
// ==========================================

use anyhow::Context;
use clap::{ArgAction, Parser};
use ndarray::Axis;
use std::path::PathBuf;
use steel_mfa::config::{ConfigManager, ModelConfig};
use steel_mfa::db::default_snapshot_db_path;
use steel_mfa::engine::ModelBuilder;
use steel_mfa::importer::TableLoader;
use steel_mfa::logging::{self, LogFormat};
use steel_mfa::repository::SnapshotRepository;
use steel_mfa::TradeClass;

/// 钢铁物质流分析模型
#[derive(Debug, Parser)]
#[command(name = "steel-mfa", version, about)]
struct Cli {
    /// 忽略缓存快照,强制重新计算
    #[arg(long)]
    recalculate: bool,

    /// 配置覆写文件 (TOML)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// 输出历史净贸易 (crude / scrap / indirect),不建模
    #[arg(long, value_name = "CLASS")]
    trade_history: Option<TradeClass>,

    /// 日志详细程度 (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// 以 JSON 行输出日志
    #[arg(long)]
    log_json: bool,
}

/// 打印某类贸易的历史净贸易（区域、情景求和）
fn print_trade_history(config: &ModelConfig, loader: &TableLoader, class: TradeClass) -> anyhow::Result<()> {
    let inputs = loader.load_inputs(config).context("导入输入表失败")?;
    let history = ModelBuilder::new(config)
        .historical_net_trade(&inputs, class)
        .context("历史贸易外推失败")?;

    println!("year\tnet_{}", class);
    for (year, slice) in config.years().iter().zip(history.axis_iter(Axis(0))) {
        println!("{}\t{:.3}", year, slice.sum());
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let format = if cli.log_json { LogFormat::Json } else { LogFormat::Text };
    logging::init(cli.verbose, format);

    tracing::info!("==================================================");
    tracing::info!("钢铁物质流分析 - 系统版本: {}", steel_mfa::VERSION);
    tracing::info!("==================================================");

    let manager = ConfigManager::load(cli.config.as_deref()).context("加载配置失败")?;
    let config = manager.config();
    let loader = TableLoader::new(&config.data_path);

    if let Some(class) = cli.trade_history {
        return print_trade_history(config, &loader, class);
    }

    let db_path = config
        .snapshot_db_path
        .clone()
        .unwrap_or_else(default_snapshot_db_path);
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("无法创建快照目录: {}", parent.display()))?;
    }
    tracing::info!(db_path = %db_path.display(), "使用快照库");
    let repo = SnapshotRepository::new(&db_path.to_string_lossy()).context("打开快照库失败")?;

    let builder = ModelBuilder::new(config);
    let snapshot = builder
        .load_or_build(&repo, cli.recalculate, || Ok(loader.load_inputs(config)?))
        .context("模型构建失败")?;

    println!("{}", snapshot.summary);
    Ok(())
}
