// ==========================================
// 钢铁物质流分析 - 流量网络（过程/流/存量 表结构）
// ==========================================
// 结构: 固定过程枚举 + 流描述表 + 存量描述表（以小整数索引）
// 生命周期:
// 1) 建模: add_process / add_flow / add_stock,数组全零
// 2) 填充: 每条流/每个存量只允许写入一次
// 3) 冻结: freeze 之后只读
// ==========================================

use crate::domain::error::{ModelError, ModelResult};
use crate::domain::quantity::Quantity;
use crate::domain::types::{Dim, Dimensions, ProcessId, Signature};
use ndarray::{Array4, ArrayD, Axis};
use serde::{Deserialize, Serialize};
use tracing::debug;

// ==========================================
// Process - 过程节点
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Process {
    pub id: ProcessId,
    pub name: String,
}

// ==========================================
// Flow - 有向流
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flow {
    pub name: String,
    pub origin: ProcessId,
    pub destination: ProcessId,
    quantity: Quantity,
    populated: bool,
}

impl Flow {
    pub fn signature(&self) -> Signature {
        self.quantity.signature()
    }

    pub fn quantity(&self) -> &Quantity {
        &self.quantity
    }

    pub fn values(&self) -> &ArrayD<f64> {
        self.quantity.values()
    }

    pub fn is_populated(&self) -> bool {
        self.populated
    }
}

// ==========================================
// Stock - 存量
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stock {
    pub process: ProcessId,
    pub name: String,
    stock: Quantity,
    stock_change: Quantity,
    populated: bool,
}

impl Stock {
    pub fn signature(&self) -> Signature {
        self.stock.signature()
    }

    pub fn values(&self) -> &ArrayD<f64> {
        self.stock.values()
    }

    pub fn change(&self) -> &Quantity {
        &self.stock_change
    }

    pub fn change_values(&self) -> &ArrayD<f64> {
        self.stock_change.values()
    }
}

// ==========================================
// FlowNetwork - 流量网络
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowNetwork {
    pub name: String,
    pub unit: String,
    dimensions: Dimensions,
    processes: Vec<Process>,
    flows: Vec<Flow>,
    stocks: Vec<Stock>,
    frozen: bool,
}

impl FlowNetwork {
    /// 创建空网络
    pub fn new(name: &str, unit: &str, dimensions: Dimensions) -> Self {
        Self {
            name: name.to_string(),
            unit: unit.to_string(),
            dimensions,
            processes: Vec::new(),
            flows: Vec::new(),
            stocks: Vec::new(),
            frozen: false,
        }
    }

    pub fn dimensions(&self) -> &Dimensions {
        &self.dimensions
    }

    pub fn processes(&self) -> &[Process] {
        &self.processes
    }

    pub fn flows(&self) -> &[Flow] {
        &self.flows
    }

    pub fn stocks(&self) -> &[Stock] {
        &self.stocks
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    fn ensure_mutable(&self) -> ModelResult<()> {
        if self.frozen {
            return Err(ModelError::Consistency(format!(
                "网络 '{}' 已冻结,不允许修改",
                self.name
            )));
        }
        Ok(())
    }

    fn has_process(&self, id: ProcessId) -> bool {
        self.processes.iter().any(|p| p.id == id)
    }

    // ==========================================
    // 拓扑建立
    // ==========================================

    /// 添加过程节点（编号必须等于当前节点数,保证按编号直接索引）
    pub fn add_process(&mut self, id: ProcessId, name: &str) -> ModelResult<()> {
        self.ensure_mutable()?;
        if self.has_process(id) {
            return Err(ModelError::Consistency(format!("过程 {} 重复定义", id)));
        }
        if id.id() != self.processes.len() {
            return Err(ModelError::Consistency(format!(
                "过程 {} 编号与位置 {} 不一致",
                id,
                self.processes.len()
            )));
        }
        self.processes.push(Process {
            id,
            name: name.to_string(),
        });
        Ok(())
    }

    /// 添加有向流（同一 origin/destination 只允许一条）
    pub fn add_flow(
        &mut self,
        name: &str,
        origin: ProcessId,
        destination: ProcessId,
        signature: Signature,
    ) -> ModelResult<()> {
        self.ensure_mutable()?;
        if !self.has_process(origin) || !self.has_process(destination) {
            return Err(ModelError::Consistency(format!(
                "流 '{}' 引用了未定义的过程 ({} -> {})",
                name, origin, destination
            )));
        }
        if self.flow_index(origin, destination).is_some() {
            return Err(ModelError::Consistency(format!(
                "流 {} -> {} 重复定义",
                origin, destination
            )));
        }
        self.flows.push(Flow {
            name: name.to_string(),
            origin,
            destination,
            quantity: Quantity::zeros(signature, &self.dimensions),
            populated: false,
        });
        Ok(())
    }

    /// 为过程挂接存量（签名必须包含 Time）
    pub fn add_stock(&mut self, process: ProcessId, name: &str, signature: Signature) -> ModelResult<()> {
        self.ensure_mutable()?;
        if !self.has_process(process) {
            return Err(ModelError::Consistency(format!(
                "存量 '{}' 挂接在未定义的过程 {}",
                name, process
            )));
        }
        if self.stocks.iter().any(|s| s.process == process) {
            return Err(ModelError::Consistency(format!("过程 {} 的存量重复定义", process)));
        }
        self.stocks.push(Stock {
            process,
            name: name.to_string(),
            stock: Quantity::zeros(signature, &self.dimensions),
            stock_change: Quantity::zeros(signature, &self.dimensions),
            populated: false,
        });
        Ok(())
    }

    // ==========================================
    // 查询
    // ==========================================

    fn flow_index(&self, origin: ProcessId, destination: ProcessId) -> Option<usize> {
        self.flows
            .iter()
            .position(|f| f.origin == origin && f.destination == destination)
    }

    pub fn flow(&self, origin: ProcessId, destination: ProcessId) -> ModelResult<&Flow> {
        self.flow_index(origin, destination)
            .map(|idx| &self.flows[idx])
            .ok_or_else(|| {
                ModelError::Consistency(format!("流 {} -> {} 不存在", origin, destination))
            })
    }

    pub fn flow_values(&self, origin: ProcessId, destination: ProcessId) -> ModelResult<&ArrayD<f64>> {
        Ok(self.flow(origin, destination)?.values())
    }

    pub fn stock(&self, process: ProcessId) -> ModelResult<&Stock> {
        self.stocks
            .iter()
            .find(|s| s.process == process)
            .ok_or_else(|| ModelError::Consistency(format!("过程 {} 没有存量", process)))
    }

    // ==========================================
    // 填充（每个数组只写一次）
    // ==========================================

    /// 写入流数值
    pub fn set_flow(
        &mut self,
        origin: ProcessId,
        destination: ProcessId,
        values: ArrayD<f64>,
    ) -> ModelResult<()> {
        self.ensure_mutable()?;
        let idx = self.flow_index(origin, destination).ok_or_else(|| {
            ModelError::Consistency(format!("流 {} -> {} 不存在", origin, destination))
        })?;

        let flow = &mut self.flows[idx];
        if flow.populated {
            return Err(ModelError::Consistency(format!(
                "流 '{}' 已填充,不允许重复写入",
                flow.name
            )));
        }
        flow.quantity = Quantity::from_array(flow.quantity.signature(), &self.dimensions, values)?;
        flow.populated = true;
        Ok(())
    }

    /// 写入存量变化,并沿 Time 累加得到存量
    pub fn set_stock_change(&mut self, process: ProcessId, change: ArrayD<f64>) -> ModelResult<()> {
        self.ensure_mutable()?;
        let stock = self
            .stocks
            .iter_mut()
            .find(|s| s.process == process)
            .ok_or_else(|| ModelError::Consistency(format!("过程 {} 没有存量", process)))?;

        if stock.populated {
            return Err(ModelError::Consistency(format!(
                "存量 '{}' 已填充,不允许重复写入",
                stock.name
            )));
        }

        let signature = stock.stock_change.signature();
        let change = Quantity::from_array(signature, &self.dimensions, change)?;
        let mut values = change.values().clone();
        values.accumulate_axis_inplace(Axis(0), |prev, curr| *curr += *prev);

        stock.stock_change = change;
        *stock.stock.values_mut() = values;
        stock.populated = true;
        Ok(())
    }

    // ==========================================
    // 一致性检查
    // ==========================================

    /// 一致性检查（布尔版）
    pub fn consistency_check(&self) -> bool {
        self.check_consistency().is_ok()
    }

    /// 一致性检查（返回第一处不一致）
    ///
    /// # 检查项
    /// 1. 过程编号与位置一致
    /// 2. 每条流的两端过程已定义
    /// 3. 每条流/存量数组形状与签名一致
    pub fn check_consistency(&self) -> ModelResult<()> {
        for (idx, p) in self.processes.iter().enumerate() {
            if p.id.id() != idx {
                return Err(ModelError::Consistency(format!(
                    "过程 {} 位于位置 {}",
                    p.id, idx
                )));
            }
        }

        for flow in &self.flows {
            if !self.has_process(flow.origin) || !self.has_process(flow.destination) {
                return Err(ModelError::Consistency(format!(
                    "流 '{}' 端点未定义",
                    flow.name
                )));
            }
            let expected = flow.signature().shape(&self.dimensions);
            if flow.values().shape() != expected.as_slice() {
                return Err(ModelError::Consistency(format!(
                    "流 '{}' 形状 {:?} 与签名 {} 期望 {:?} 不一致",
                    flow.name,
                    flow.values().shape(),
                    flow.signature(),
                    expected
                )));
            }
        }

        for stock in &self.stocks {
            if !self.has_process(stock.process) {
                return Err(ModelError::Consistency(format!(
                    "存量 '{}' 所属过程未定义",
                    stock.name
                )));
            }
            if !stock.signature().contains(Dim::Time) {
                return Err(ModelError::Consistency(format!(
                    "存量 '{}' 缺少 Time 维度",
                    stock.name
                )));
            }
            let expected = stock.signature().shape(&self.dimensions);
            if stock.values().shape() != expected.as_slice()
                || stock.change_values().shape() != expected.as_slice()
            {
                return Err(ModelError::Consistency(format!(
                    "存量 '{}' 形状与签名 {} 不一致",
                    stock.name,
                    stock.signature()
                )));
            }
        }

        debug!(
            processes = self.processes.len(),
            flows = self.flows.len(),
            stocks = self.stocks.len(),
            "网络一致性检查通过"
        );
        Ok(())
    }

    // ==========================================
    // 质量平衡查询
    // ==========================================

    /// 逐过程质量平衡: Σ流入 − Σ流出 − 存量变化
    ///
    /// # 返回
    /// 形状 (process, t, r, s),已对 Element/Good/Waste 求和
    ///
    /// # 说明
    /// 自环流（如在用复用）同时计入流入和流出,净额为 0
    pub fn mass_balance(&self) -> ModelResult<Array4<f64>> {
        let (n_t, n_r, n_s) = self.dimensions.trs();
        let mut balance = Array4::<f64>::zeros((self.processes.len(), n_t, n_r, n_s));

        for flow in &self.flows {
            let core = reduce_to_trs(flow.quantity())?;
            let mut dest = balance.index_axis_mut(Axis(0), flow.destination.id());
            dest += &core;
            let mut origin = balance.index_axis_mut(Axis(0), flow.origin.id());
            origin -= &core;
        }

        for stock in &self.stocks {
            let core = reduce_to_trs(stock.change())?;
            let mut node = balance.index_axis_mut(Axis(0), stock.process.id());
            node -= &core;
        }

        Ok(balance)
    }
}

/// 收缩到 (t, e, r, s) 再对 Element 求和,得到 (t, r, s)
fn reduce_to_trs(quantity: &Quantity) -> ModelResult<ndarray::Array3<f64>> {
    let core = quantity.collapse_to(Signature::Ters)?;
    core.values()
        .sum_axis(Axis(1))
        .into_dimensionality::<ndarray::Ix3>()
        .map_err(|e| ModelError::Consistency(format!("平衡数组维度错误: {}", e)))
}
