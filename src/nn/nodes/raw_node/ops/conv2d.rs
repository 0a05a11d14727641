/*
 * @Date         : 2025-12-22
 * @Description  : 2D 卷积节点（PyTorch 风格，无偏置）
 *
 * 设计决策：
 * - 单节点处理多通道（PyTorch 风格）
 * - Batch-First 格式：输入必须是 4D [batch, C_in, H, W]，输出 [batch, C_out, H', W']
 * - 支持步长、零填充与空洞（dilation）
 * - 填充不实际拷贝输入，越界位置直接视为0
 *
 * 父节点：
 * - parents[0]: 输入数据
 * - parents[1]: 卷积核参数 [C_out, C_in, kH, kW]
 */

use super::super::{check_4d_input, check_parents_count, TraitNode};
use crate::nn::GraphError;
use crate::nn::nodes::NodeHandle;
use crate::tensor::Tensor;

/// 2D 卷积节点
#[derive(Clone)]
pub(crate) struct Conv2d {
    fixed_shape: Vec<usize>,
    kernel_size: (usize, usize), // (kH, kW)
    stride: (usize, usize),      // (sH, sW)
    padding: (usize, usize),     // (pH, pW)
    dilation: (usize, usize),    // (dH, dW)
}

impl Conv2d {
    /// 创建 Conv2d 节点
    ///
    /// # 参数
    /// - `parents`: [输入节点, 卷积核节点]
    /// - `stride`: 步长 (sH, sW)
    /// - `padding`: 填充 (pH, pW)
    /// - `dilation`: 空洞 (dH, dW)，普通卷积为 (1, 1)
    ///
    /// # 输出尺寸
    /// ```text
    /// H' = (H + 2*pH - dH*(kH-1) - 1) / sH + 1
    /// ```
    pub(crate) fn new(
        parents: &[&NodeHandle],
        stride: (usize, usize),
        padding: (usize, usize),
        dilation: (usize, usize),
    ) -> Result<Self, GraphError> {
        // 1. 验证父节点数量
        check_parents_count("Conv2d", parents.len(), 2)?;

        let input_shape = parents[0].value_expected_shape();
        let kernel_shape = parents[1].value_expected_shape();

        // 2. 验证卷积核形状：必须是 4D [C_out, C_in, kH, kW]
        if kernel_shape.len() != 4 {
            return Err(GraphError::ShapeMismatch {
                expected: vec![0, 0, 0, 0],
                got: kernel_shape.to_vec(),
                message: format!("卷积核必须是 4D [C_out, C_in, kH, kW]，得到 {kernel_shape:?}"),
            });
        }
        let (out_channels, in_channels, kernel_h, kernel_w) = (
            kernel_shape[0],
            kernel_shape[1],
            kernel_shape[2],
            kernel_shape[3],
        );

        // 3. 验证输入形状
        check_4d_input("Conv2d", input_shape)?;
        let (batch_size, input_c, input_h, input_w) = (
            input_shape[0],
            input_shape[1],
            input_shape[2],
            input_shape[3],
        );

        // 4. 验证通道数匹配
        if input_c != in_channels {
            return Err(GraphError::ShapeMismatch {
                expected: vec![in_channels],
                got: vec![input_c],
                message: format!("输入通道数 {input_c} 与卷积核输入通道数 {in_channels} 不匹配"),
            });
        }

        if stride.0 == 0 || stride.1 == 0 || dilation.0 == 0 || dilation.1 == 0 {
            return Err(GraphError::InvalidOperation(format!(
                "Conv2d 的步长与空洞必须大于0，得到步长 {stride:?}，空洞 {dilation:?}"
            )));
        }
        if kernel_h == 0 || kernel_w == 0 {
            return Err(GraphError::InvalidOperation(format!(
                "Conv2d 的卷积核尺寸必须大于0，得到 {kernel_h}x{kernel_w}"
            )));
        }

        // 5. 计算输出尺寸（空洞卷积的等效核尺寸为 d*(k-1)+1）
        let effective_h = dilation.0 * (kernel_h - 1) + 1;
        let effective_w = dilation.1 * (kernel_w - 1) + 1;
        let padded_h = input_h + 2 * padding.0;
        let padded_w = input_w + 2 * padding.1;
        if effective_h > padded_h || effective_w > padded_w {
            return Err(GraphError::InvalidOperation(format!(
                "卷积输出尺寸无效：输入 {input_h}x{input_w}，核 {kernel_h}x{kernel_w}，步长 {stride:?}，填充 {padding:?}，空洞 {dilation:?}"
            )));
        }
        let output_h = (padded_h - effective_h) / stride.0 + 1;
        let output_w = (padded_w - effective_w) / stride.1 + 1;

        Ok(Self {
            fixed_shape: vec![batch_size, out_channels, output_h, output_w],
            kernel_size: (kernel_h, kernel_w),
            stride,
            padding,
            dilation,
        })
    }

    /// 输出位置 (oh, ow) 的卷积核第 (kh, kw) 个元素对应的输入位置，落在填充区时返回 None
    fn input_position(
        &self,
        oh: usize,
        ow: usize,
        kh: usize,
        kw: usize,
        input_h: usize,
        input_w: usize,
    ) -> Option<(usize, usize)> {
        let ih = (oh * self.stride.0 + kh * self.dilation.0).checked_sub(self.padding.0)?;
        let iw = (ow * self.stride.1 + kw * self.dilation.1).checked_sub(self.padding.1)?;
        (ih < input_h && iw < input_w).then_some((ih, iw))
    }
}

impl TraitNode for Conv2d {
    fn type_name(&self) -> &'static str {
        "Conv2d"
    }

    fn value_expected_shape(&self) -> &[usize] {
        &self.fixed_shape
    }

    fn calc_value_by_parents(&self, parents: &[&Tensor]) -> Result<Tensor, GraphError> {
        let (input, kernel) = (parents[0], parents[1]);
        let input_shape = input.shape();
        let (batch_size, in_c, in_h, in_w) = (
            input_shape[0],
            input_shape[1],
            input_shape[2],
            input_shape[3],
        );
        let (out_c, out_h, out_w) = (
            self.fixed_shape[1],
            self.fixed_shape[2],
            self.fixed_shape[3],
        );
        let (k_h, k_w) = self.kernel_size;

        let mut output = Tensor::zeros(&[batch_size, out_c, out_h, out_w]);
        for b in 0..batch_size {
            for oc in 0..out_c {
                for oh in 0..out_h {
                    for ow in 0..out_w {
                        let mut sum = 0.0f32;
                        for kh in 0..k_h {
                            for kw in 0..k_w {
                                let Some((ih, iw)) = self.input_position(oh, ow, kh, kw, in_h, in_w)
                                else {
                                    continue;
                                };
                                for ic in 0..in_c {
                                    sum += input[[b, ic, ih, iw]] * kernel[[oc, ic, kh, kw]];
                                }
                            }
                        }
                        output[[b, oc, oh, ow]] = sum;
                    }
                }
            }
        }
        Ok(output)
    }

    /// 对于 Y = conv(X, K):
    /// - dL/dX: 转置卷积，把上游梯度按卷积核“撒回”输入位置
    /// - dL/dK: 输入与上游梯度的相关运算
    fn calc_grad_to_parent(
        &self,
        parent_index: usize,
        parents: &[&Tensor],
        upstream_grad: &Tensor,
    ) -> Result<Tensor, GraphError> {
        let (input, kernel) = (parents[0], parents[1]);
        let input_shape = input.shape();
        let (batch_size, in_c, in_h, in_w) = (
            input_shape[0],
            input_shape[1],
            input_shape[2],
            input_shape[3],
        );
        let grad_shape = upstream_grad.shape();
        let (out_c, out_h, out_w) = (grad_shape[1], grad_shape[2], grad_shape[3]);
        let (k_h, k_w) = self.kernel_size;

        let mut grad = match parent_index {
            0 => Tensor::zeros(input_shape),
            1 => Tensor::zeros(kernel.shape()),
            _ => {
                return Err(GraphError::InvalidOperation(format!(
                    "Conv2d 只有2个父节点，无法对第{parent_index}个父节点求梯度"
                )));
            }
        };

        for b in 0..batch_size {
            for oc in 0..out_c {
                for oh in 0..out_h {
                    for ow in 0..out_w {
                        let grad_val = upstream_grad[[b, oc, oh, ow]];
                        if grad_val == 0.0 {
                            continue;
                        }
                        for kh in 0..k_h {
                            for kw in 0..k_w {
                                let Some((ih, iw)) = self.input_position(oh, ow, kh, kw, in_h, in_w)
                                else {
                                    continue;
                                };
                                for ic in 0..in_c {
                                    if parent_index == 0 {
                                        grad[[b, ic, ih, iw]] += grad_val * kernel[[oc, ic, kh, kw]];
                                    } else {
                                        grad[[oc, ic, kh, kw]] += grad_val * input[[b, ic, ih, iw]];
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }
        Ok(grad)
    }
}
