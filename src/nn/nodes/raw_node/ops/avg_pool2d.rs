/*
 * @Date         : 2025-12-22
 * @Description  : 2D 平均池化节点（PyTorch 风格）
 *
 * 与最大池化不同，反向传播时梯度均匀地分给窗口内的每个输入位置，
 * 因此用它做感受野探测时能得到完整的窗口覆盖范围。
 *
 * 父节点：
 * - parents[0]: 输入数据
 */

use super::super::{check_parents_count, TraitNode};
use super::max_pool2d::pool2d_output_shape;
use crate::nn::GraphError;
use crate::nn::nodes::NodeHandle;
use crate::tensor::Tensor;

/// 2D 平均池化节点
#[derive(Clone)]
pub(crate) struct AvgPool2d {
    fixed_shape: Vec<usize>,
    kernel_size: (usize, usize),
    stride: (usize, usize),
}

impl AvgPool2d {
    /// 创建 `AvgPool2d` 节点，`stride` 默认等于 `kernel_size`
    pub(crate) fn new(
        parents: &[&NodeHandle],
        kernel_size: (usize, usize),
        stride: Option<(usize, usize)>,
    ) -> Result<Self, GraphError> {
        check_parents_count("AvgPool2d", parents.len(), 1)?;
        let stride = stride.unwrap_or(kernel_size);
        let fixed_shape =
            pool2d_output_shape("AvgPool2d", parents[0].value_expected_shape(), kernel_size, stride)?;
        Ok(Self {
            fixed_shape,
            kernel_size,
            stride,
        })
    }

    fn window_area(&self) -> f32 {
        (self.kernel_size.0 * self.kernel_size.1) as f32
    }
}

impl TraitNode for AvgPool2d {
    fn type_name(&self) -> &'static str {
        "AvgPool2d"
    }

    fn value_expected_shape(&self) -> &[usize] {
        &self.fixed_shape
    }

    fn calc_value_by_parents(&self, parents: &[&Tensor]) -> Result<Tensor, GraphError> {
        let input = parents[0];
        let mut output = Tensor::zeros(&self.fixed_shape);
        let [batch_size, channels, out_h, out_w] = [
            self.fixed_shape[0],
            self.fixed_shape[1],
            self.fixed_shape[2],
            self.fixed_shape[3],
        ];
        let (k_h, k_w) = self.kernel_size;
        for b in 0..batch_size {
            for c in 0..channels {
                for oh in 0..out_h {
                    for ow in 0..out_w {
                        let (h_start, w_start) = (oh * self.stride.0, ow * self.stride.1);
                        let mut sum = 0.0f32;
                        for kh in 0..k_h {
                            for kw in 0..k_w {
                                sum += input[[b, c, h_start + kh, w_start + kw]];
                            }
                        }
                        output[[b, c, oh, ow]] = sum / self.window_area();
                    }
                }
            }
        }
        Ok(output)
    }

    fn calc_grad_to_parent(
        &self,
        _parent_index: usize,
        parents: &[&Tensor],
        upstream_grad: &Tensor,
    ) -> Result<Tensor, GraphError> {
        let mut grad = Tensor::zeros(parents[0].shape());
        let [batch_size, channels, out_h, out_w] = [
            self.fixed_shape[0],
            self.fixed_shape[1],
            self.fixed_shape[2],
            self.fixed_shape[3],
        ];
        let (k_h, k_w) = self.kernel_size;
        for b in 0..batch_size {
            for c in 0..channels {
                for oh in 0..out_h {
                    for ow in 0..out_w {
                        let share = upstream_grad[[b, c, oh, ow]] / self.window_area();
                        let (h_start, w_start) = (oh * self.stride.0, ow * self.stride.1);
                        for kh in 0..k_h {
                            for kw in 0..k_w {
                                grad[[b, c, h_start + kh, w_start + kw]] += share;
                            }
                        }
                    }
                }
            }
        }
        Ok(grad)
    }
}
