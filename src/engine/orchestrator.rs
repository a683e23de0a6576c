// ==========================================
// 钢铁物质流分析 - 建模编排器
// ==========================================
// 主流程:
// 1) 维度 → 网络拓扑 → 一致性检查
// 2) DSM 形状/存量平衡校验 → 复用调整（可选）
// 3) 上游循环 → 废钢路由 → 生产路线分配
// 4) 写回网络 → 存量变化 → 质量守恒校验 → 冻结
// 缓存: 按配置指纹读取/写入快照
// ==========================================

use crate::config::{fingerprint, validate_config, ModelConfig};
use crate::domain::error::{ModelError, ModelResult};
use crate::domain::network::FlowNetwork;
use crate::domain::types::{Dim, Dimensions, ProcessId, Signature, TradeClass};
use crate::engine::inputs::ModelInputs;
use crate::engine::mass_balance::{BalanceSummary, MassBalanceValidator};
use crate::engine::route_allocator::{ProductionRouteAllocator, RouteAllocation};
use crate::engine::scrap_router::{ScrapPool, ScrapRouter};
use crate::engine::stock::{
    apply_reuse, dissipative_stock_change, in_use_stock_change, reuse_factor_timeline,
};
use crate::engine::strategy::UpperCycleMode;
use crate::engine::trade::TradeReconstructor;
use crate::engine::upper_cycle::{total_demand, UpperCycle, UpperCycleComputer, UpperCycleStrategy};
use crate::repository::snapshot_repo::{ModelSnapshot, SnapshotRepository};
use ndarray::{s, Array, Array3, Array4, ArrayD, Axis, Dimension, IxDyn};
use tracing::{debug, info, instrument};

/// 固定拓扑: (名称, 起点, 终点, 签名)
const FLOW_TOPOLOGY: [(&str, ProcessId, ProcessId, Signature); 20] = [
    ("Iron production", ProcessId::Environment, ProcessId::PrimaryProduction, Signature::Ters),
    ("Recycling - BOF", ProcessId::Recycling, ProcessId::PrimaryProduction, Signature::Ters),
    ("BOF - Forming", ProcessId::PrimaryProduction, ProcessId::Forming, Signature::Ters),
    ("Recycling - EAF", ProcessId::Recycling, ProcessId::SecondaryProduction, Signature::Ters),
    ("EAF - Forming", ProcessId::SecondaryProduction, ProcessId::Forming, Signature::Ters),
    ("Forming - Fabrication", ProcessId::Forming, ProcessId::Fabrication, Signature::Ters),
    ("Forming - Scrap", ProcessId::Forming, ProcessId::EndOfLife, Signature::Terws),
    ("Fabrication - In-Use", ProcessId::Fabrication, ProcessId::Use, Signature::Tergs),
    ("Fabrication - Scrap", ProcessId::Fabrication, ProcessId::EndOfLife, Signature::Terws),
    ("In-Use - Reuse", ProcessId::Use, ProcessId::Use, Signature::Tergs),
    ("In-Use - Scrap", ProcessId::Use, ProcessId::EndOfLife, Signature::Tergws),
    ("In-Use - Dis./Not col.", ProcessId::Use, ProcessId::DissipativeLoss, Signature::Tergws),
    ("Scrap - Recycling", ProcessId::EndOfLife, ProcessId::Recycling, Signature::Ters),
    ("Scrap - Waste", ProcessId::EndOfLife, ProcessId::Waste, Signature::Ters),
    ("Crude Imports", ProcessId::Environment, ProcessId::Forming, Signature::Ters),
    ("Crude Exports", ProcessId::Forming, ProcessId::Environment, Signature::Ters),
    ("Scrap Imports", ProcessId::Environment, ProcessId::EndOfLife, Signature::Terws),
    ("Scrap Exports", ProcessId::EndOfLife, ProcessId::Environment, Signature::Terws),
    ("Indirect Imports", ProcessId::Environment, ProcessId::Use, Signature::Tergs),
    ("Indirect Exports", ProcessId::Use, ProcessId::Environment, Signature::Tergs),
];

/// 存量: (过程, 名称, 签名)
const STOCK_TOPOLOGY: [(ProcessId, &str, Signature); 3] = [
    (ProcessId::Use, "in_use", Signature::Tergs),
    (ProcessId::Waste, "waste", Signature::Ters),
    (ProcessId::DissipativeLoss, "dissipative/not_collectable", Signature::Terws),
];

/// 在 Time 轴之后插入 Element 轴,数值写入第 0 个元素
fn with_element<D: Dimension>(values: &Array<f64, D>, n_elements: usize) -> ArrayD<f64> {
    let view = values.view().into_dyn();
    let mut shape = view.shape().to_vec();
    shape.insert(1, n_elements);
    let mut out = ArrayD::<f64>::zeros(IxDyn(&shape));
    out.index_axis_mut(Axis(1), 0).assign(&view);
    out
}

/// (t, r, s) 数组放入 (t, r, w, s) 的指定报废类别槽位
fn into_waste_slot(values: &ndarray::Array3<f64>, n_waste: usize, slot: usize) -> Array4<f64> {
    let (n_t, n_r, n_s) = values.dim();
    let mut out = Array4::<f64>::zeros((n_t, n_r, n_waste, n_s));
    out.slice_mut(s![.., .., slot, ..]).assign(values);
    out
}

/// 一次建模的结果
#[derive(Debug, Clone)]
pub struct BuildOutcome {
    pub network: FlowNetwork,
    pub summary: BalanceSummary,
}

// ==========================================
// ModelBuilder - 建模编排器
// ==========================================
pub struct ModelBuilder<'a> {
    config: &'a ModelConfig,
}

impl<'a> ModelBuilder<'a> {
    pub fn new(config: &'a ModelConfig) -> Self {
        Self { config }
    }

    /// 由配置与区域列表生成维度
    pub fn dimensions(&self, regions: &[String]) -> ModelResult<Dimensions> {
        Dimensions::new(
            self.config.years(),
            self.config.elements.clone(),
            regions.to_vec(),
            self.config.in_use_categories.clone(),
            self.config.recycling_categories.clone(),
            self.config.scenarios.clone(),
        )
    }

    /// 建立固定拓扑（过程/流/存量）,数组全零
    pub fn init_network(&self, dimensions: Dimensions) -> ModelResult<FlowNetwork> {
        let mut network = FlowNetwork::new(&self.config.model_name, &self.config.unit, dimensions);
        for process in ProcessId::ALL {
            network.add_process(process, process.name())?;
        }
        for (name, origin, destination, signature) in FLOW_TOPOLOGY {
            network.add_flow(name, origin, destination, signature)?;
        }
        for (process, name, signature) in STOCK_TOPOLOGY {
            network.add_stock(process, name, signature)?;
        }
        Ok(network)
    }

    /// 执行完整建模流程
    ///
    /// # 参数
    /// - inputs: 模型输入（DSM 输出、历史贸易、可选序列）
    ///
    /// # 返回
    /// 已冻结的网络与质量平衡摘要
    #[instrument(skip_all, fields(label = %self.config.snapshot_label()))]
    pub fn build(&self, inputs: &ModelInputs) -> ModelResult<BuildOutcome> {
        validate_config(self.config)?;

        // ==========================================
        // 步骤1: 维度与拓扑
        // ==========================================
        let dimensions = self.dimensions(&inputs.regions)?;
        let mut network = self.init_network(dimensions.clone())?;
        network.check_consistency()?;
        info!(
            years = dimensions.n_years(),
            regions = dimensions.n_regions(),
            scenarios = dimensions.n_scenarios(),
            "步骤1: 网络拓扑建立完成"
        );

        // ==========================================
        // 步骤2: 外部输入校验与复用调整
        // ==========================================
        inputs.dsm.check_shape(&dimensions)?;
        inputs.dsm.check_finite()?;
        inputs.dsm.check_stock_balance()?;
        inputs.check_shares(&dimensions)?;

        let allocator = ProductionRouteAllocator::new(self.config, &dimensions);
        let max_share = allocator.max_scrap_share_schedule(inputs.max_scrap_share_series.as_ref())?;

        let mut dsm = inputs.dsm.clone();
        let reuse = if self.config.reuse.enabled && self.config.upper_cycle == UpperCycleMode::BaseModel {
            let timeline = reuse_factor_timeline(self.config, &dimensions)?;
            apply_reuse(&mut dsm, &timeline)?
        } else {
            Array4::zeros(dsm.outflows.dim())
        };
        debug!(reuse_enabled = self.config.reuse.enabled, "步骤2: 输入校验完成");

        // ==========================================
        // 步骤3: 上游循环 → 废钢路由 → 路线分配
        // ==========================================
        let strategy = match self.config.upper_cycle {
            UpperCycleMode::BaseModel => UpperCycleStrategy::BaseModel(&inputs.trade),
            UpperCycleMode::External => {
                UpperCycleStrategy::External(inputs.external_upper_cycle.as_ref().ok_or_else(|| {
                    ModelError::Configuration("外部数据路径需要提供上游循环数组".to_string())
                })?)
            }
        };
        let upper = UpperCycleComputer::new(self.config, &dimensions).compute(
            strategy,
            &dsm.inflows,
            &dsm.outflows,
        )?;

        let router = ScrapRouter::new(self.config, &dimensions)?;
        let pool = router.route(&upper, &inputs.trade.scrap)?;
        let recyclable = router.recyclable_scrap(&pool.total);
        let allocation = allocator.allocate(&upper.production, &pool.total, &recyclable, &max_share)?;
        info!(mode = self.config.upper_cycle.as_str(), "步骤3: 流量计算完成");

        // ==========================================
        // 步骤4: 写回 → 存量 → 校验 → 冻结
        // ==========================================
        self.write_flows(&mut network, &router, &upper, &pool, &allocation, &reuse)?;
        self.write_stocks(&mut network, &upper, &pool, &allocation)?;

        let summary = MassBalanceValidator::new(self.config.mass_balance_tolerance).validate(&network)?;
        network.freeze();
        info!(%summary, "步骤4: 建模完成");

        Ok(BuildOutcome { network, summary })
    }

    fn write_flows(
        &self,
        network: &mut FlowNetwork,
        router: &ScrapRouter<'_>,
        upper: &UpperCycle,
        pool: &ScrapPool,
        allocation: &RouteAllocation,
        reuse: &Array4<f64>,
    ) -> ModelResult<()> {
        use ProcessId::*;

        let n_e = network.dimensions().len(Dim::Element);
        let n_w = network.dimensions().n_waste();
        let forming_scrap = into_waste_slot(&pool.forming_scrap, n_w, router.form_slot());
        let fabrication_scrap = into_waste_slot(&pool.fabrication_scrap, n_w, router.fabr_slot());

        let flows: Vec<(ProcessId, ProcessId, ArrayD<f64>)> = vec![
            (Environment, PrimaryProduction, with_element(&allocation.iron_production, n_e)),
            (Recycling, PrimaryProduction, with_element(&allocation.scrap_in_bof, n_e)),
            (PrimaryProduction, Forming, with_element(&allocation.bof_production, n_e)),
            (Recycling, SecondaryProduction, with_element(&allocation.eaf_production, n_e)),
            (SecondaryProduction, Forming, with_element(&allocation.eaf_production, n_e)),
            (Forming, Fabrication, with_element(&upper.forming_fabrication, n_e)),
            (Forming, EndOfLife, with_element(&forming_scrap, n_e)),
            (Fabrication, Use, with_element(&upper.fabrication_use, n_e)),
            (Fabrication, EndOfLife, with_element(&fabrication_scrap, n_e)),
            (Use, Use, with_element(reuse, n_e)),
            (Use, EndOfLife, with_element(&pool.use_eol, n_e)),
            (Use, DissipativeLoss, with_element(&pool.use_dissipative, n_e)),
            (EndOfLife, Recycling, with_element(&allocation.scrap_in_production, n_e)),
            (EndOfLife, Waste, with_element(&allocation.waste, n_e)),
            (Environment, Forming, with_element(&upper.imports, n_e)),
            (Forming, Environment, with_element(&upper.exports, n_e)),
            (Environment, EndOfLife, with_element(&pool.scrap_imports, n_e)),
            (EndOfLife, Environment, with_element(&pool.scrap_exports, n_e)),
            (Environment, Use, with_element(&upper.indirect_imports, n_e)),
            (Use, Environment, with_element(&upper.indirect_exports, n_e)),
        ];

        for (origin, destination, values) in flows {
            network.set_flow(origin, destination, values)?;
        }
        debug!(flows = network.flows().len(), "流量写回完成");
        Ok(())
    }

    fn write_stocks(
        &self,
        network: &mut FlowNetwork,
        upper: &UpperCycle,
        pool: &ScrapPool,
        allocation: &RouteAllocation,
    ) -> ModelResult<()> {
        let n_e = network.dimensions().len(Dim::Element);

        let in_use = in_use_stock_change(&upper.inflows, &upper.outflows);
        network.set_stock_change(ProcessId::Use, with_element(&in_use, n_e))?;
        network.set_stock_change(ProcessId::Waste, with_element(&allocation.waste, n_e))?;
        let dissipative = dissipative_stock_change(&pool.use_dissipative);
        network.set_stock_change(ProcessId::DissipativeLoss, with_element(&dissipative, n_e))?;
        Ok(())
    }

    /// 历史净贸易（模型起始年 … 已知窗口末年）
    ///
    /// # 参数
    /// - inputs: 模型输入
    /// - class: 贸易类别; 废钢以需求反推的粗钢生产为外推基准,其余以总需求为基准
    ///
    /// # 返回
    /// 净贸易 (t_past, r, s),正值为净进口
    #[instrument(skip_all, fields(class = %class))]
    pub fn historical_net_trade(&self, inputs: &ModelInputs, class: TradeClass) -> ModelResult<Array3<f64>> {
        validate_config(self.config)?;
        let dimensions = self.dimensions(&inputs.regions)?;
        inputs.dsm.check_shape(&dimensions)?;
        inputs.dsm.check_finite()?;

        let scaler = match class {
            TradeClass::Scrap => {
                UpperCycleComputer::new(self.config, &dimensions)
                    .compute(
                        UpperCycleStrategy::BaseModel(&inputs.trade),
                        &inputs.dsm.inflows,
                        &inputs.dsm.outflows,
                    )?
                    .production
            }
            TradeClass::Crude | TradeClass::Indirect => total_demand(&inputs.dsm.inflows),
        };

        TradeReconstructor::new(self.config, &dimensions).scaled_past_net_trade(
            class,
            inputs.trade.known(class),
            &scaler,
        )
    }

    /// 读取缓存快照,缺失或要求重算时重新建模并写入缓存
    ///
    /// # 参数
    /// - repo: 快照仓储
    /// - recalculate: 忽略缓存强制重算
    /// - load_inputs: 仅在需要重算时调用的输入加载器
    #[instrument(skip_all, fields(recalculate = recalculate))]
    pub fn load_or_build<F>(
        &self,
        repo: &SnapshotRepository,
        recalculate: bool,
        load_inputs: F,
    ) -> ModelResult<ModelSnapshot>
    where
        F: FnOnce() -> ModelResult<ModelInputs>,
    {
        let key = fingerprint(self.config)?;

        if !recalculate {
            if let Some(snapshot) = repo.find_by_fingerprint(&key)? {
                info!(fingerprint = %key, snapshot_id = %snapshot.snapshot_id, "复用缓存快照");
                return Ok(snapshot);
            }
            debug!(fingerprint = %key, "未找到缓存快照");
        }

        let inputs = load_inputs()?;
        let outcome = self.build(&inputs)?;
        let snapshot = ModelSnapshot::new(key, outcome.network, outcome.summary);
        repo.upsert(&snapshot)?;
        info!(
            fingerprint = %snapshot.fingerprint,
            snapshot_id = %snapshot.snapshot_id,
            "快照已写入"
        );
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_element_inserts_axis() {
        let values = ndarray::Array3::from_elem((2, 3, 1), 4.0);
        let out = with_element(&values, 2);
        assert_eq!(out.shape(), &[2, 2, 3, 1]);
        assert_eq!(out[[1, 0, 2, 0]], 4.0);
        assert_eq!(out[[1, 1, 2, 0]], 0.0);
    }

    #[test]
    fn test_into_waste_slot() {
        let values = ndarray::Array3::from_elem((2, 1, 1), 7.0);
        let out = into_waste_slot(&values, 3, 1);
        assert_eq!(out[[0, 0, 1, 0]], 7.0);
        assert_eq!(out.sum(), 14.0);
    }

    #[test]
    fn test_topology_is_consistent() {
        let config = ModelConfig::default();
        let builder = ModelBuilder::new(&config);
        let dims = builder.dimensions(&["R".to_string()]).unwrap();
        let network = builder.init_network(dims).unwrap();
        assert!(network.consistency_check());
        assert_eq!(network.processes().len(), 10);
        assert_eq!(network.flows().len(), 20);
        assert_eq!(network.stocks().len(), 3);
    }
}
