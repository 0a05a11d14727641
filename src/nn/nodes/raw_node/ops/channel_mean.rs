/*
 * @Date         : 2026-02-03
 * @Description  : 通道平均节点：[batch, C, H, W] -> [batch, 1, H, W]
 *                 把多通道特征图压成单通道的空间响应图，感受野探测时每个网格位置只需一个脉冲
 */

use super::super::{check_4d_input, check_parents_count, TraitNode};
use crate::nn::GraphError;
use crate::nn::nodes::NodeHandle;
use crate::tensor::Tensor;

#[derive(Clone)]
pub(crate) struct ChannelMean {
    fixed_shape: Vec<usize>,
}

impl ChannelMean {
    pub(crate) fn new(parents: &[&NodeHandle]) -> Result<Self, GraphError> {
        check_parents_count("ChannelMean", parents.len(), 1)?;
        let input_shape = parents[0].value_expected_shape();
        check_4d_input("ChannelMean", input_shape)?;
        Ok(Self {
            fixed_shape: vec![input_shape[0], 1, input_shape[2], input_shape[3]],
        })
    }
}

impl TraitNode for ChannelMean {
    fn type_name(&self) -> &'static str {
        "ChannelMean"
    }

    fn value_expected_shape(&self) -> &[usize] {
        &self.fixed_shape
    }

    fn calc_value_by_parents(&self, parents: &[&Tensor]) -> Result<Tensor, GraphError> {
        Ok(parents[0].mean_axis_keep_dim(1))
    }

    /// 每个通道分得上游梯度的 1/C
    fn calc_grad_to_parent(
        &self,
        _parent_index: usize,
        parents: &[&Tensor],
        upstream_grad: &Tensor,
    ) -> Result<Tensor, GraphError> {
        let input_shape = parents[0].shape();
        let channels = input_shape[1] as f32;
        Ok(upstream_grad.broadcast_to(input_shape) * (1.0 / channels))
    }
}
