use super::raw_node::{NodeType, TraitNode};
use crate::nn::GraphError;
use crate::tensor::Tensor;
use std::fmt;

/// 节点在计算图中的唯一标识（由计算图分配，从1开始递增）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u64);

/// 计算图中的节点：底层节点类型 + 该节点当前的值与梯度
#[derive(Clone)]
pub(crate) struct NodeHandle {
    id: NodeId,
    name: String,
    raw_node: NodeType,
    value: Option<Tensor>,
    grad: Option<Tensor>,
    last_forward_pass_id: u64,
}

impl NodeHandle {
    pub(in crate::nn) fn new<T: Into<NodeType>>(id: NodeId, name: &str, raw_node: T) -> Self {
        Self {
            id,
            name: name.to_string(),
            raw_node: raw_node.into(),
            value: None,
            grad: None,
            last_forward_pass_id: 0,
        }
    }

    pub(crate) const fn id(&self) -> NodeId {
        self.id
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn raw_node(&self) -> &NodeType {
        &self.raw_node
    }

    pub(crate) fn type_name(&self) -> &'static str {
        self.raw_node.type_name()
    }

    pub(crate) fn value_expected_shape(&self) -> &[usize] {
        self.raw_node.value_expected_shape()
    }

    pub(crate) fn is_leaf(&self) -> bool {
        self.raw_node.is_leaf()
    }

    pub(crate) fn value(&self) -> Option<&Tensor> {
        self.value.as_ref()
    }

    pub(crate) fn has_value(&self) -> bool {
        self.value.is_some()
    }

    /// 手动设置叶子节点（输入/参数）的值，形状必须与节点定义一致
    pub(crate) fn set_value(&mut self, value: Option<&Tensor>) -> Result<(), GraphError> {
        if !self.is_leaf() {
            return Err(GraphError::InvalidOperation(format!(
                "{self}的值由父节点计算得到，不应该被手动设置"
            )));
        }
        if let Some(value) = value {
            if value.shape() != self.value_expected_shape() {
                return Err(GraphError::ShapeMismatch {
                    expected: self.value_expected_shape().to_vec(),
                    got: value.shape().to_vec(),
                    message: format!("{self}所设置的值形状与节点定义不一致"),
                });
            }
        }
        self.value = value.cloned();
        Ok(())
    }

    /// 由前向传播写入计算结果
    pub(in crate::nn) fn set_computed_value(&mut self, value: Tensor, forward_pass_id: u64) {
        self.value = Some(value);
        self.last_forward_pass_id = forward_pass_id;
    }

    pub(crate) const fn last_forward_pass_id(&self) -> u64 {
        self.last_forward_pass_id
    }

    pub(crate) fn grad(&self) -> Option<&Tensor> {
        self.grad.as_ref()
    }

    pub(in crate::nn) fn set_grad(&mut self, grad: Option<Tensor>) {
        self.grad = grad;
    }
}

impl fmt::Display for NodeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "节点[id={}, name={}, type={}]",
            self.id.0,
            self.name,
            self.type_name()
        )
    }
}
