/*
 * @Date         : 2025-12-21
 * @Description  : 逐元素加法节点（如残差/跳跃连接），两个父节点形状必须相同
 */

use super::super::{check_parents_count, TraitNode};
use crate::nn::GraphError;
use crate::nn::nodes::NodeHandle;
use crate::tensor::Tensor;

#[derive(Clone)]
pub(crate) struct Add {
    shape: Vec<usize>,
}

impl Add {
    pub(crate) fn new(parents: &[&NodeHandle]) -> Result<Self, GraphError> {
        check_parents_count("Add", parents.len(), 2)?;
        let shape = parents[0].value_expected_shape().to_vec();
        if parents[1].value_expected_shape() != shape {
            return Err(GraphError::ShapeMismatch {
                expected: shape,
                got: parents[1].value_expected_shape().to_vec(),
                message: "Add节点的两个父节点形状必须相同".to_string(),
            });
        }
        Ok(Self { shape })
    }
}

impl TraitNode for Add {
    fn type_name(&self) -> &'static str {
        "Add"
    }

    fn value_expected_shape(&self) -> &[usize] {
        &self.shape
    }

    fn calc_value_by_parents(&self, parents: &[&Tensor]) -> Result<Tensor, GraphError> {
        Ok(parents[0] + parents[1])
    }

    /// dC/dA = dC/dB = I，梯度原样传给两个父节点
    fn calc_grad_to_parent(
        &self,
        _parent_index: usize,
        _parents: &[&Tensor],
        upstream_grad: &Tensor,
    ) -> Result<Tensor, GraphError> {
        Ok(upstream_grad.clone())
    }
}
