/*
 * @Date         : 2025-12-21
 * @Description  : 逐元素乘法节点（Hadamard积）
 */

use super::super::{check_parents_count, TraitNode};
use crate::nn::GraphError;
use crate::nn::nodes::NodeHandle;
use crate::tensor::Tensor;

/// Multiply节点：逐元素乘法（Hadamard积）
/// 两个父节点必须形状相同，输出形状与输入相同
#[derive(Clone)]
pub(crate) struct Multiply {
    shape: Vec<usize>,
}

impl Multiply {
    pub(crate) fn new(parents: &[&NodeHandle]) -> Result<Self, GraphError> {
        check_parents_count("Multiply", parents.len(), 2)?;
        let shape = parents[0].value_expected_shape().to_vec();
        if parents[1].value_expected_shape() != shape {
            return Err(GraphError::ShapeMismatch {
                expected: shape,
                got: parents[1].value_expected_shape().to_vec(),
                message: "Multiply节点的两个父节点形状必须相同".to_string(),
            });
        }
        Ok(Self { shape })
    }
}

impl TraitNode for Multiply {
    fn type_name(&self) -> &'static str {
        "Multiply"
    }

    fn value_expected_shape(&self) -> &[usize] {
        &self.shape
    }

    fn calc_value_by_parents(&self, parents: &[&Tensor]) -> Result<Tensor, GraphError> {
        Ok(parents[0] * parents[1])
    }

    /// 设 C = A ⊙ B，则 dL/dA = dL/dC ⊙ B，dL/dB = dL/dC ⊙ A
    fn calc_grad_to_parent(
        &self,
        parent_index: usize,
        parents: &[&Tensor],
        upstream_grad: &Tensor,
    ) -> Result<Tensor, GraphError> {
        match parent_index {
            0 => Ok(upstream_grad * parents[1]),
            1 => Ok(upstream_grad * parents[0]),
            _ => Err(GraphError::InvalidOperation(format!(
                "Multiply 只有2个父节点，无法对第{parent_index}个父节点求梯度"
            ))),
        }
    }
}
