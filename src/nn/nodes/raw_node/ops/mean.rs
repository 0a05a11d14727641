use super::super::{check_parents_count, TraitNode};
use crate::nn::GraphError;
use crate::nn::nodes::NodeHandle;
use crate::tensor::Tensor;

/// 全局平均节点：对父节点所有元素求平均，输出标量 [1, 1]（可直接作为损失做反向传播）
#[derive(Clone)]
pub(crate) struct Mean {
    shape: Vec<usize>,
}

impl Mean {
    pub(crate) fn new(parents: &[&NodeHandle]) -> Result<Self, GraphError> {
        check_parents_count("Mean", parents.len(), 1)?;
        Ok(Self { shape: vec![1, 1] })
    }
}

impl TraitNode for Mean {
    fn type_name(&self) -> &'static str {
        "Mean"
    }

    fn value_expected_shape(&self) -> &[usize] {
        &self.shape
    }

    fn calc_value_by_parents(&self, parents: &[&Tensor]) -> Result<Tensor, GraphError> {
        Ok(Tensor::new(&[parents[0].mean()], &self.shape))
    }

    fn calc_grad_to_parent(
        &self,
        _parent_index: usize,
        parents: &[&Tensor],
        upstream_grad: &Tensor,
    ) -> Result<Tensor, GraphError> {
        let upstream = upstream_grad.number().ok_or_else(|| {
            GraphError::ComputationError(format!(
                "Mean节点的上游梯度应为标量，但得到形状 {:?}",
                upstream_grad.shape()
            ))
        })?;
        let size = parents[0].size().max(1) as f32;
        Ok(Tensor::full(upstream / size, parents[0].shape()))
    }
}
