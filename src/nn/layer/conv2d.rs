/*
 * @Date         : 2025-12-22
 * @Description  : Conv2d (2D 卷积) 层 - 函数式 API
 *
 * 输入/输出形状：
 * - 输入：[batch_size, in_channels, H, W]
 * - 输出：[batch_size, out_channels, H', W']
 *
 * 输出尺寸计算：
 * H' = (H + 2*padding_h - kernel_h) / stride_h + 1
 * W' = (W + 2*padding_w - kernel_w) / stride_w + 1
 */

use crate::nn::{GraphError, GraphInner, NodeId};

/// 创建一个卷积层：卷积核参数节点 `{name}_K` + 卷积节点 `{name}`，返回卷积节点
///
/// # 使用示例
/// ```ignore
/// let h = conv2d(&mut graph, x, 3, 16, (3, 3), (1, 1), (1, 1), "conv1")?;
/// ```
#[allow(clippy::too_many_arguments)]
pub fn conv2d(
    graph: &mut GraphInner,
    input: NodeId,
    in_channels: usize,
    out_channels: usize,
    kernel_size: (usize, usize),
    stride: (usize, usize),
    padding: (usize, usize),
    name: &str,
) -> Result<NodeId, GraphError> {
    let kernel = graph.new_parameter_node(
        &[out_channels, in_channels, kernel_size.0, kernel_size.1],
        Some(&format!("{name}_K")),
    )?;
    graph.new_conv2d_node(input, kernel, stride, padding, Some(name))
}
