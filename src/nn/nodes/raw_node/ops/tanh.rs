use super::super::{check_parents_count, TraitNode};
use crate::nn::GraphError;
use crate::nn::nodes::NodeHandle;
use crate::tensor::Tensor;

/// Tanh 激活节点：y = tanh(x)，dy/dx = 1 - tanh²(x)
#[derive(Clone)]
pub(crate) struct Tanh {
    shape: Vec<usize>,
}

impl Tanh {
    pub(crate) fn new(parents: &[&NodeHandle]) -> Result<Self, GraphError> {
        check_parents_count("Tanh", parents.len(), 1)?;
        Ok(Self {
            shape: parents[0].value_expected_shape().to_vec(),
        })
    }
}

impl TraitNode for Tanh {
    fn type_name(&self) -> &'static str {
        "Tanh"
    }

    fn value_expected_shape(&self) -> &[usize] {
        &self.shape
    }

    fn calc_value_by_parents(&self, parents: &[&Tensor]) -> Result<Tensor, GraphError> {
        Ok(parents[0].map(f32::tanh))
    }

    fn calc_grad_to_parent(
        &self,
        _parent_index: usize,
        parents: &[&Tensor],
        upstream_grad: &Tensor,
    ) -> Result<Tensor, GraphError> {
        let derivative = parents[0].map(|x| 1.0 - x.tanh().powi(2));
        Ok(upstream_grad * &derivative)
    }
}
