use super::TraitNode;
use crate::nn::GraphError;
use crate::tensor::Tensor;

/// 参数节点（如卷积核）。初始值由计算图按 N(0, 1/fan_in) 生成，也可通过 `set_node_value` 覆盖
#[derive(Clone)]
pub(crate) struct Parameter {
    shape: Vec<usize>,
}

impl Parameter {
    pub(crate) fn new(shape: &[usize]) -> Result<Self, GraphError> {
        // 支持 2D-4D 张量，4D 即 CNN 卷积核 [C_out, C_in, kH, kW]
        if shape.len() < 2 || shape.len() > 4 {
            return Err(GraphError::DimensionMismatch {
                expected: 2,
                got: shape.len(),
                message: format!(
                    "参数张量必须是 2-4 维，但收到的维度是 {} 维。",
                    shape.len(),
                ),
            });
        }
        Ok(Self {
            shape: shape.to_vec(),
        })
    }

    /// 扇入：除第一维（输出通道）外各维之积，卷积核即`C_in * kH * kW`
    pub(crate) fn fan_in(&self) -> usize {
        self.shape[1..].iter().product::<usize>().max(1)
    }

    /// 按固定种子生成初始值，标准差为`1 / sqrt(fan_in)`，使逐层回传的梯度量级大致不变
    pub(crate) fn init_value(&self, seed: u64) -> Tensor {
        let std_dev = (self.fan_in() as f32).sqrt().recip();
        Tensor::normal_seeded(0.0, std_dev, &self.shape, seed)
    }
}

impl TraitNode for Parameter {
    fn type_name(&self) -> &'static str {
        "Parameter"
    }

    fn value_expected_shape(&self) -> &[usize] {
        &self.shape
    }

    fn is_leaf(&self) -> bool {
        true
    }

    fn calc_value_by_parents(&self, _parents: &[&Tensor]) -> Result<Tensor, GraphError> {
        Err(GraphError::InvalidOperation(
            "参数节点被执行了前向传播。不该触及本错误，否则说明crate代码有问题".to_string(),
        ))
    }

    fn calc_grad_to_parent(
        &self,
        _parent_index: usize,
        _parents: &[&Tensor],
        _upstream_grad: &Tensor,
    ) -> Result<Tensor, GraphError> {
        Err(GraphError::InvalidOperation(
            "参数节点没有父节点。不该触及本错误，否则说明crate代码有问题".to_string(),
        ))
    }
}
