/*
 * @Date         : 2026-01-27
 * @Description  : 底层节点类型：叶子节点（输入/参数）与各种算子节点
 *
 * 所有节点都是“无状态”的：值与梯度统一存放在 `NodeHandle` 中，
 * 算子节点只保存自身的超参数与期望输出形状。前向时由父节点的值计算本节点的值，
 * 反向（VJP）时由上游梯度与父节点的值计算对某个父节点的梯度。
 */

mod input;
mod ops;
mod parameter;

pub(crate) use input::Input;
pub(crate) use ops::*;
pub(crate) use parameter::Parameter;

use crate::nn::GraphError;
use crate::tensor::Tensor;
use enum_dispatch::enum_dispatch;

#[enum_dispatch]
#[derive(Clone)]
pub(crate) enum NodeType {
    Input(Input),
    Parameter(Parameter),
    Conv2d(Conv2d),
    MaxPool2d(MaxPool2d),
    AvgPool2d(AvgPool2d),
    Add(Add),
    Multiply(Multiply),
    Tanh(Tanh),
    ChannelMean(ChannelMean),
    Mean(Mean),
}

#[enum_dispatch(NodeType)]
pub(crate) trait TraitNode {
    /// 节点类型名（用于显示和自动命名）
    fn type_name(&self) -> &'static str;

    /// 本节点的值应有的形状（创建节点时即已确定）
    fn value_expected_shape(&self) -> &[usize];

    /// 是否为叶子节点（输入/参数），叶子节点的值只能通过 `set_node_value` 设置
    fn is_leaf(&self) -> bool {
        false
    }

    /// 根据父节点的值计算本节点的值（父节点的值已由计算图预先算好，顺序与创建时一致）
    fn calc_value_by_parents(&self, parents: &[&Tensor]) -> Result<Tensor, GraphError>;

    /// VJP：已知损失对本节点的梯度 `upstream_grad`，计算损失对第 `parent_index` 个父节点的梯度
    fn calc_grad_to_parent(
        &self,
        parent_index: usize,
        parents: &[&Tensor],
        upstream_grad: &Tensor,
    ) -> Result<Tensor, GraphError>;
}

/// 校验父节点数量
pub(in crate::nn::nodes) fn check_parents_count(
    type_name: &str,
    parents_count: usize,
    expected: usize,
) -> Result<(), GraphError> {
    if parents_count != expected {
        return Err(GraphError::InvalidOperation(format!(
            "{type_name}节点需要正好{expected}个父节点，但得到{parents_count}个"
        )));
    }
    Ok(())
}

/// 校验输入是 4D [batch, C, H, W]（Batch-First）
pub(in crate::nn::nodes) fn check_4d_input(type_name: &str, shape: &[usize]) -> Result<(), GraphError> {
    if shape.len() != 4 {
        return Err(GraphError::ShapeMismatch {
            expected: vec![0, 0, 0, 0],
            got: shape.to_vec(),
            message: format!(
                "{type_name} 输入必须是 4D [batch, C, H, W]，得到 {shape:?}。单样本请使用 [1, C, H, W]"
            ),
        });
    }
    Ok(())
}
