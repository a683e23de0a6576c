// ==========================================
// 钢铁物质流分析 - 生产路线分配引擎
// ==========================================
// 输入: 生产 (t, r, s)、贸易调整后废钢池 (t, r, w, s)、可回收废钢 (t, r, s)
// 规则:
// 1) 可用废钢 = min(可回收废钢, 废钢占比上限 × 生产)
// 2) 废钢占比 = 可用废钢 / 生产（生产为 0 时取 0）
// 3) 电炉占比 = (废钢占比 − r_bof) / (1 − r_bof),≤ 0 时取 0
// 4) 转炉废钢 = min(r_bof × 转炉产量, 可用废钢); 铁水 = 转炉产量 − 转炉废钢
// 5) 填埋 = 废钢池总量 − (转炉废钢 + 电炉产量)
// ==========================================

use crate::config::ModelConfig;
use crate::domain::error::{ModelError, ModelResult};
use crate::domain::types::Dimensions;
use ndarray::{s, Array3, Array4, Axis, Zip};
use tracing::{debug, info, instrument};

/// 生产路线分配结果（均为 (t, r, s)）
#[derive(Debug, Clone, PartialEq)]
pub struct RouteAllocation {
    pub scrap_share: Array3<f64>,
    pub eaf_share: Array3<f64>,
    pub bof_production: Array3<f64>,
    pub eaf_production: Array3<f64>,
    pub scrap_in_bof: Array3<f64>,
    pub iron_production: Array3<f64>,
    /// 实际消耗废钢 = 转炉废钢 + 电炉产量
    pub scrap_in_production: Array3<f64>,
    pub waste: Array3<f64>,
}

/// 守护除法: 分母为 0 时取 0
pub fn guarded_share(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}

/// 电炉占比 = (废钢占比 − r_bof) / (1 − r_bof),负值取 0
pub fn secondary_route_share(scrap_share: f64, scrap_in_bof_rate: f64) -> f64 {
    let share = (scrap_share - scrap_in_bof_rate) / (1.0 - scrap_in_bof_rate);
    if share <= 0.0 {
        0.0
    } else {
        share
    }
}

// ==========================================
// ProductionRouteAllocator - 生产路线分配
// ==========================================
pub struct ProductionRouteAllocator<'a> {
    config: &'a ModelConfig,
    dimensions: &'a Dimensions,
}

impl<'a> ProductionRouteAllocator<'a> {
    pub fn new(config: &'a ModelConfig, dimensions: &'a Dimensions) -> Self {
        Self { config, dimensions }
    }

    /// 废钢占比上限时间表 (t, r, s)
    ///
    /// # 参数
    /// - series: 自切换年份起的外部上限序列 (t − break, r, s),覆盖配置值
    ///
    /// # 说明
    /// 未配置切换年份时全时段取基础上限; 外部序列必须配合切换年份使用
    pub fn max_scrap_share_schedule(&self, series: Option<&Array3<f64>>) -> ModelResult<Array3<f64>> {
        let (n_t, n_r, n_s) = self.dimensions.trs();
        let settings = &self.config.max_scrap_share;
        let mut schedule = Array3::from_elem((n_t, n_r, n_s), settings.base);

        let break_idx = match settings.break_year {
            Some(year) => Some(self.dimensions.year_index(year).ok_or_else(|| {
                ModelError::Configuration(format!("废钢占比切换年份 {} 超出模型年份", year))
            })?),
            None => None,
        };

        match (break_idx, series) {
            (Some(idx), Some(series)) => {
                let expected = (n_t - idx, n_r, n_s);
                if series.dim() != expected {
                    return Err(ModelError::Consistency(format!(
                        "废钢占比上限序列形状 {:?} 与期望 {:?} 不一致",
                        series.dim(),
                        expected
                    )));
                }
                schedule.slice_mut(s![idx.., .., ..]).assign(series);
            }
            (Some(idx), None) => {
                if let Some(share) = settings.share_after_break {
                    schedule.slice_mut(s![idx.., .., ..]).fill(share);
                }
            }
            (None, Some(_)) => {
                return Err(ModelError::Configuration(
                    "提供了废钢占比上限序列但未配置切换年份 break_year".to_string(),
                ));
            }
            (None, None) => {}
        }

        debug!(break_index = ?break_idx, base = settings.base, "废钢占比上限时间表生成");
        Ok(schedule)
    }

    /// 在两条生产路线间分配产量与废钢
    ///
    /// # 参数
    /// - production: 粗钢生产 (t, r, s)
    /// - total_scrap: 贸易调整后废钢池 (t, r, w, s)
    /// - recyclable: 可回收废钢 (t, r, s)
    /// - max_share: 废钢占比上限 (t, r, s)
    #[instrument(skip_all)]
    pub fn allocate(
        &self,
        production: &Array3<f64>,
        total_scrap: &Array4<f64>,
        recyclable: &Array3<f64>,
        max_share: &Array3<f64>,
    ) -> ModelResult<RouteAllocation> {
        let dim = production.dim();
        if recyclable.dim() != dim || max_share.dim() != dim {
            return Err(ModelError::Consistency(format!(
                "路线分配输入形状不一致: production {:?}, recyclable {:?}, max_share {:?}",
                dim,
                recyclable.dim(),
                max_share.dim()
            )));
        }

        let rate = self.config.scrap_in_bof_rate;

        // 1) 可用废钢
        let mut usable = Array3::<f64>::zeros(dim);
        Zip::from(&mut usable)
            .and(production)
            .and(recyclable)
            .and(max_share)
            .for_each(|u, &p, &rec, &cap| *u = rec.max(0.0).min(cap * p));

        // 2) 3) 占比
        let mut scrap_share = Array3::<f64>::zeros(dim);
        Zip::from(&mut scrap_share)
            .and(&usable)
            .and(production)
            .for_each(|share, &u, &p| *share = guarded_share(u, p));
        let eaf_share = scrap_share.mapv(|share| secondary_route_share(share, rate));

        // 4) 路线产量与铁水
        let eaf_production = production * &eaf_share;
        let bof_production = production - &eaf_production;
        let mut scrap_in_bof = Array3::<f64>::zeros(dim);
        Zip::from(&mut scrap_in_bof)
            .and(&bof_production)
            .and(&usable)
            .for_each(|b, &bof, &u| *b = (rate * bof).min(u));
        let iron_production = &bof_production - &scrap_in_bof;

        // 5) 填埋
        let scrap_in_production = &scrap_in_bof + &eaf_production;
        let waste = total_scrap.sum_axis(Axis(2)) - &scrap_in_production;

        info!(
            production = production.sum(),
            eaf_production = eaf_production.sum(),
            scrap_in_production = scrap_in_production.sum(),
            waste = waste.sum(),
            "生产路线分配完成"
        );

        Ok(RouteAllocation {
            scrap_share,
            eaf_share,
            bof_production,
            eaf_production,
            scrap_in_bof,
            iron_production,
            scrap_in_production,
            waste,
        })
    }
}
