// ==========================================
// 钢铁物质流分析 - 带签名的多维数量
// ==========================================
// 红线: 维度收缩必须显式调用 collapse_to,不做隐式广播
// ==========================================

use crate::domain::error::{ModelError, ModelResult};
use crate::domain::types::{Dimensions, Signature};
use ndarray::{ArrayD, Axis, IxDyn};
use serde::{Deserialize, Serialize};

// ==========================================
// Quantity - 带签名数组
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quantity {
    signature: Signature,
    values: ArrayD<f64>,
}

impl Quantity {
    /// 按签名创建全零数组
    pub fn zeros(signature: Signature, dimensions: &Dimensions) -> Self {
        Self {
            signature,
            values: ArrayD::zeros(IxDyn(&signature.shape(dimensions))),
        }
    }

    /// 由现成数组构造,形状必须与签名一致
    pub fn from_array(
        signature: Signature,
        dimensions: &Dimensions,
        values: ArrayD<f64>,
    ) -> ModelResult<Self> {
        let expected = signature.shape(dimensions);
        if values.shape() != expected.as_slice() {
            return Err(ModelError::Consistency(format!(
                "签名 {} 期望形状 {:?}, 实际 {:?}",
                signature,
                expected,
                values.shape()
            )));
        }
        Ok(Self { signature, values })
    }

    pub fn signature(&self) -> Signature {
        self.signature
    }

    pub fn values(&self) -> &ArrayD<f64> {
        &self.values
    }

    pub(crate) fn values_mut(&mut self) -> &mut ArrayD<f64> {
        &mut self.values
    }

    pub fn sum(&self) -> f64 {
        self.values.sum()
    }

    /// 显式收缩到目标签名（对目标中不存在的维度求和）
    ///
    /// # 返回
    /// - Ok(Quantity): 收缩后的数量
    /// - Err(Consistency): 目标签名不是当前签名的有序子集
    pub fn collapse_to(&self, target: Signature) -> ModelResult<Quantity> {
        if !target.is_subset_of(self.signature) {
            return Err(ModelError::Consistency(format!(
                "无法将签名 {} 收缩为 {}",
                self.signature, target
            )));
        }

        let mut values = self.values.clone();
        // 从高轴往低轴求和,低轴编号保持有效
        for (axis, dim) in self.signature.dims().iter().enumerate().rev() {
            if !target.contains(*dim) {
                values = values.sum_axis(Axis(axis));
            }
        }

        Ok(Quantity {
            signature: target,
            values,
        })
    }
}
