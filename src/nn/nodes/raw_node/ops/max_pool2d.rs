/*
 * @Date         : 2025-12-22
 * @Description  : 2D 最大池化节点（PyTorch 风格）
 *
 * 设计决策：
 * - 反向传播时梯度只流向窗口内的最大值位置（稀疏梯度）；
 *   若有多个相同的最大值，取按行优先顺序的第一个
 * - Batch-First 格式：输入必须是 4D [batch, C, H, W]，输出 [batch, C, H', W']
 *
 * 父节点：
 * - parents[0]: 输入数据
 */

use super::super::{check_4d_input, check_parents_count, TraitNode};
use crate::nn::GraphError;
use crate::nn::nodes::NodeHandle;
use crate::tensor::Tensor;

/// 2D 最大池化节点
#[derive(Clone)]
pub(crate) struct MaxPool2d {
    fixed_shape: Vec<usize>,
    kernel_size: (usize, usize), // (kH, kW)
    stride: (usize, usize),      // (sH, sW)
}

impl MaxPool2d {
    /// 创建 `MaxPool2d` 节点
    ///
    /// # 参数
    /// - `parents`: [输入节点]
    /// - `kernel_size`: 池化窗口大小 (kH, kW)
    /// - `stride`: 步长 (sH, sW)，默认等于 `kernel_size`
    pub(crate) fn new(
        parents: &[&NodeHandle],
        kernel_size: (usize, usize),
        stride: Option<(usize, usize)>,
    ) -> Result<Self, GraphError> {
        check_parents_count("MaxPool2d", parents.len(), 1)?;
        let stride = stride.unwrap_or(kernel_size);
        let fixed_shape =
            pool2d_output_shape("MaxPool2d", parents[0].value_expected_shape(), kernel_size, stride)?;
        Ok(Self {
            fixed_shape,
            kernel_size,
            stride,
        })
    }

    /// 输出位置 (b, c, oh, ow) 对应窗口内最大值的输入坐标 (ih, iw)
    fn argmax(&self, input: &Tensor, b: usize, c: usize, oh: usize, ow: usize) -> (usize, usize) {
        let (k_h, k_w) = self.kernel_size;
        let (h_start, w_start) = (oh * self.stride.0, ow * self.stride.1);
        let mut best = (h_start, w_start);
        let mut best_val = f32::NEG_INFINITY;
        for kh in 0..k_h {
            for kw in 0..k_w {
                let val = input[[b, c, h_start + kh, w_start + kw]];
                if val > best_val {
                    best_val = val;
                    best = (h_start + kh, w_start + kw);
                }
            }
        }
        best
    }
}

/// 计算池化输出形状，供最大/平均池化共用
pub(super) fn pool2d_output_shape(
    type_name: &str,
    input_shape: &[usize],
    kernel_size: (usize, usize),
    stride: (usize, usize),
) -> Result<Vec<usize>, GraphError> {
    check_4d_input(type_name, input_shape)?;
    let (batch_size, channels, input_h, input_w) = (
        input_shape[0],
        input_shape[1],
        input_shape[2],
        input_shape[3],
    );
    let (k_h, k_w) = kernel_size;
    let (s_h, s_w) = stride;

    if k_h == 0 || k_w == 0 || s_h == 0 || s_w == 0 {
        return Err(GraphError::InvalidOperation(format!(
            "{type_name} 的池化窗口与步长必须大于0，得到窗口 {kernel_size:?}，步长 {stride:?}"
        )));
    }
    // 池化窗口不能超过输入尺寸
    if k_h > input_h || k_w > input_w {
        return Err(GraphError::InvalidOperation(format!(
            "{type_name} 池化窗口 {k_h}x{k_w} 超出输入尺寸 {input_h}x{input_w}"
        )));
    }

    let output_h = (input_h - k_h) / s_h + 1;
    let output_w = (input_w - k_w) / s_w + 1;
    Ok(vec![batch_size, channels, output_h, output_w])
}

impl TraitNode for MaxPool2d {
    fn type_name(&self) -> &'static str {
        "MaxPool2d"
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
        for b in 0..batch_size {
            for c in 0..channels {
                for oh in 0..out_h {
                    for ow in 0..out_w {
                        let (ih, iw) = self.argmax(input, b, c, oh, ow);
                        output[[b, c, oh, ow]] = input[[b, c, ih, iw]];
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
        let input = parents[0];
        let mut grad = Tensor::zeros(input.shape());
        let [batch_size, channels, out_h, out_w] = [
            self.fixed_shape[0],
            self.fixed_shape[1],
            self.fixed_shape[2],
            self.fixed_shape[3],
        ];
        for b in 0..batch_size {
            for c in 0..channels {
                for oh in 0..out_h {
                    for ow in 0..out_w {
                        let (ih, iw) = self.argmax(input, b, c, oh, ow);
                        grad[[b, c, ih, iw]] += upstream_grad[[b, c, oh, ow]];
                    }
                }
            }
        }
        Ok(grad)
    }
}
