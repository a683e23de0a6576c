// ==========================================
// 钢铁物质流分析 - 配置管理器
// ==========================================
// 职责: 默认配置 + TOML 覆写加载、配置校验、配置指纹
// 红线: 校验失败直接报 Configuration 错误,不做静默修正
// ==========================================

use crate::config::model_config::ModelConfig;
use crate::domain::error::{ModelError, ModelResult};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use xxhash_rust::xxh32::xxh32;

/// xxHash32 种子（配置指纹）
const FINGERPRINT_SEED: u32 = 0;

/// 分配矩阵行和允许误差
const ROW_SUM_TOLERANCE: f64 = 1e-6;

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config: ModelConfig,
    source: Option<PathBuf>,
}

impl ConfigManager {
    /// 加载配置
    ///
    /// # 参数
    /// - override_path: 可选 TOML 覆写文件,缺失字段取默认值
    ///
    /// # 返回
    /// - Ok(ConfigManager): 已校验的配置
    /// - Err(Configuration): 文件读取/解析失败或校验不通过
    pub fn load(override_path: Option<&Path>) -> ModelResult<Self> {
        let config = match override_path {
            Some(path) => {
                let raw = fs::read_to_string(path).map_err(|e| {
                    ModelError::Configuration(format!(
                        "配置文件读取失败 ({}): {}",
                        path.display(),
                        e
                    ))
                })?;
                info!(path = %path.display(), "加载覆写配置");
                Self::parse_toml(&raw)?
            }
            None => {
                debug!("未指定覆写配置,使用默认配置");
                ModelConfig::default()
            }
        };

        Self::from_config(config, override_path.map(Path::to_path_buf))
    }

    /// 由现成配置对象创建（测试/嵌入使用）
    pub fn from_config(config: ModelConfig, source: Option<PathBuf>) -> ModelResult<Self> {
        validate_config(&config)?;
        Ok(Self { config, source })
    }

    /// 解析 TOML 覆写内容
    pub fn parse_toml(raw: &str) -> ModelResult<ModelConfig> {
        toml::from_str(raw)
            .map_err(|e| ModelError::Configuration(format!("配置文件格式错误: {}", e)))
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn into_config(self) -> ModelConfig {
        self.config
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// 配置指纹: "<标签>-<xxh32>"
    ///
    /// 相同指纹 ⇒ 可复用缓存快照
    pub fn fingerprint(&self) -> ModelResult<String> {
        fingerprint(&self.config)
    }
}

/// 计算配置指纹
pub fn fingerprint(config: &ModelConfig) -> ModelResult<String> {
    let bytes = serde_json::to_vec(config)
        .map_err(|e| ModelError::Configuration(format!("配置序列化失败: {}", e)))?;
    Ok(format!(
        "{}-{:08x}",
        config.snapshot_label(),
        xxh32(&bytes, FINGERPRINT_SEED)
    ))
}

fn config_error(message: String) -> ModelError {
    warn!(reason = %message, "配置校验失败");
    ModelError::Configuration(message)
}

fn in_unit_interval(v: f64) -> bool {
    v.is_finite() && (0.0..=1.0).contains(&v)
}

/// 配置校验
///
/// # 校验规则
/// 1. 年份范围有效,维度非空
/// 2. 收得率在 (0, 1]
/// 3. 分配矩阵形状匹配、非负、行和为 1,保留槽位 (Form/Fabr) 列为 0
/// 4. 可回收系数 / 废钢比 / 废钢上限在 [0, 1]
/// 5. 边界类别存在且 Form/Fabr 位于边界左侧
/// 6. 贸易窗口落在模型年份内
/// 7. 复用系数形状匹配
pub fn validate_config(config: &ModelConfig) -> ModelResult<()> {
    // 1. 维度
    if config.start_year > config.end_year {
        return Err(config_error(format!(
            "起始年份 {} 晚于结束年份 {}",
            config.start_year, config.end_year
        )));
    }
    if config.elements.is_empty()
        || config.in_use_categories.is_empty()
        || config.recycling_categories.is_empty()
        || config.scenarios.is_empty()
    {
        return Err(config_error("元素/在用类别/报废类别/情景不能为空".to_string()));
    }

    let n_goods = config.in_use_categories.len();
    let n_waste = config.recycling_categories.len();

    // 2. 收得率
    if config.fabrication_yield.len() != n_goods {
        return Err(config_error(format!(
            "加工收得率数量 {} 与在用类别数量 {} 不一致",
            config.fabrication_yield.len(),
            n_goods
        )));
    }
    for (category, y) in config.in_use_categories.iter().zip(&config.fabrication_yield) {
        if !(y.is_finite() && *y > 0.0 && *y <= 1.0) {
            return Err(config_error(format!(
                "类别 {} 的加工收得率 {} 超出 (0, 1]",
                category, y
            )));
        }
    }
    if !(config.forming_yield.is_finite() && config.forming_yield > 0.0 && config.forming_yield <= 1.0)
    {
        return Err(config_error(format!(
            "成型收得率 {} 超出 (0, 1]",
            config.forming_yield
        )));
    }

    // 5. 边界与保留槽位
    let boundary = config
        .recycling_categories
        .iter()
        .position(|w| *w == config.dissipative_boundary)
        .ok_or_else(|| {
            config_error(format!(
                "耗散边界类别 {} 不在报废类别中",
                config.dissipative_boundary
            ))
        })?;
    let mut reserved = Vec::new();
    for slot in [&config.forming_scrap_category, &config.fabrication_scrap_category] {
        let idx = config
            .recycling_categories
            .iter()
            .position(|w| w == slot)
            .ok_or_else(|| config_error(format!("保留废钢类别 {} 不在报废类别中", slot)))?;
        if idx >= boundary {
            return Err(config_error(format!(
                "保留废钢类别 {} 必须位于耗散边界 {} 左侧",
                slot, config.dissipative_boundary
            )));
        }
        reserved.push(idx);
    }
    if reserved[0] == reserved[1] {
        return Err(config_error("成型与加工废钢不能共用同一类别".to_string()));
    }

    // 3. 分配矩阵
    if config.use_eol_distribution.len() != n_goods {
        return Err(config_error(format!(
            "报废分配矩阵行数 {} 与在用类别数量 {} 不一致",
            config.use_eol_distribution.len(),
            n_goods
        )));
    }
    for (category, row) in config.in_use_categories.iter().zip(&config.use_eol_distribution) {
        if row.len() != n_waste {
            return Err(config_error(format!(
                "类别 {} 的报废分配列数 {} 与报废类别数量 {} 不一致",
                category,
                row.len(),
                n_waste
            )));
        }
        if row.iter().any(|v| !v.is_finite() || *v < 0.0) {
            return Err(config_error(format!("类别 {} 的报废分配含负值或非有限值", category)));
        }
        let sum: f64 = row.iter().sum();
        if (sum - 1.0).abs() > ROW_SUM_TOLERANCE {
            return Err(config_error(format!(
                "类别 {} 的报废分配行和 {:.6} 不等于 1",
                category, sum
            )));
        }
        if reserved.iter().any(|idx| row[*idx] != 0.0) {
            return Err(config_error(format!(
                "类别 {} 不能分配到成型/加工废钢保留槽位",
                category
            )));
        }
    }

    // 4. 系数范围
    if config.recyclability.len() != n_waste {
        return Err(config_error(format!(
            "可回收系数数量 {} 与报废类别数量 {} 不一致",
            config.recyclability.len(),
            n_waste
        )));
    }
    if let Some(v) = config.recyclability.iter().find(|v| !in_unit_interval(**v)) {
        return Err(config_error(format!("可回收系数 {} 超出 [0, 1]", v)));
    }
    if !(in_unit_interval(config.scrap_in_bof_rate) && config.scrap_in_bof_rate < 1.0) {
        return Err(config_error(format!(
            "转炉废钢比 {} 超出 [0, 1)",
            config.scrap_in_bof_rate
        )));
    }
    if !in_unit_interval(config.max_scrap_share.base) {
        return Err(config_error(format!(
            "废钢占比上限 {} 超出 [0, 1]",
            config.max_scrap_share.base
        )));
    }
    if let Some(share) = config.max_scrap_share.share_after_break {
        if !in_unit_interval(share) {
            return Err(config_error(format!("切换后废钢占比上限 {} 超出 [0, 1]", share)));
        }
        if config.max_scrap_share.break_year.is_none() {
            return Err(config_error("设置了切换后废钢占比上限但未设置 break_year".to_string()));
        }
    }
    if let Some(year) = config.max_scrap_share.break_year {
        if year < config.start_year || year > config.end_year {
            return Err(config_error(format!("废钢占比切换年份 {} 超出模型年份", year)));
        }
    }

    // 6. 贸易窗口
    for (class, window) in [
        ("crude", config.trade.crude),
        ("scrap", config.trade.scrap),
        ("indirect", config.trade.indirect),
    ] {
        if window.first_year > window.last_year
            || window.first_year < config.start_year
            || window.last_year > config.end_year
        {
            return Err(config_error(format!(
                "{} 贸易窗口 {}-{} 超出模型年份 {}-{}",
                class, window.first_year, window.last_year, config.start_year, config.end_year
            )));
        }
    }
    if let Some(category) = &config.trade.indirect_absorbing_category {
        if !config.in_use_categories.contains(category) {
            return Err(config_error(format!("吸收类别 {} 不在在用类别中", category)));
        }
    }

    // 7. 复用
    if config.reuse.enabled {
        if config.reuse.factors.len() != n_goods
            || config
                .reuse
                .factors
                .iter()
                .any(|row| row.len() != config.scenarios.len())
        {
            return Err(config_error(format!(
                "复用系数形状必须为 [{}][{}]",
                n_goods,
                config.scenarios.len()
            )));
        }
        if config.reuse.factors.iter().flatten().any(|v| !v.is_finite() || *v < 0.0) {
            return Err(config_error("复用系数必须为非负有限值".to_string()));
        }
    }

    if !(config.mass_balance_tolerance.is_finite() && config.mass_balance_tolerance > 0.0) {
        return Err(config_error(format!(
            "质量平衡容差 {} 必须为正",
            config.mass_balance_tolerance
        )));
    }

    debug!(
        years = config.n_years(),
        goods = n_goods,
        waste = n_waste,
        scenarios = config.scenarios.len(),
        "配置校验通过"
    );
    Ok(())
}
