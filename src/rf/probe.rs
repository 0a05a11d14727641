/*
 * @Date         : 2026-02-05
 * @Description  : 梯度探测的抽象：后端（如计算图）负责按输入形状构建模型，并给出一个可重复调用的探测会话。
 *                 会话接收每个特征图各一个脉冲掩码，返回每个特征图回传到输入图像的梯度（顺序与特征图一致）。
 */

use super::types::{GridPoint, GridShape, ImageShape};
use super::ReceptiveFieldError;
use crate::tensor::Tensor;

/// 已绑定到固定输入/输出形状的探测会话
pub trait GradientSession {
    /// - `masks`: 每个特征图一个`[1, 1, h, w]`的掩码
    /// - `input_image`: 形状为`[1, c, H, W]`的输入图像
    ///
    /// 返回每个特征图对应的输入梯度`[1, c, H, W]`
    fn gradients(
        &mut self,
        masks: &[Tensor],
        input_image: &Tensor,
    ) -> Result<Vec<Tensor>, ReceptiveFieldError>;
}

/// 探测会话以及它所绑定的形状（batch 均为1）
pub struct PreparedProbe<S> {
    pub session: S,
    pub input_shape: GridShape,
    pub output_shapes: Vec<GridShape>,
}

/// 能够为给定输入形状构建模型并生成探测会话的后端
pub trait GradientBackend {
    /// 用于选取输入/特征图张量的参数（如张量名称）
    type Selector: ?Sized;
    type Session: GradientSession;

    /// 构建（或重建）模型，返回新的探测会话。`output_shapes`与`selector`中特征图的顺序一致
    fn prepare(
        &mut self,
        input_shape: ImageShape,
        selector: &Self::Selector,
    ) -> Result<PreparedProbe<Self::Session>, ReceptiveFieldError>;
}

/// 为每个特征图生成脉冲掩码：除`points[i]`处为`intensity`外全为0
///
/// 在调用后端之前检查坐标是否越界。
pub(crate) fn impulse_masks(
    output_shapes: &[GridShape],
    points: &[GridPoint],
    intensity: f32,
) -> Result<Vec<Tensor>, ReceptiveFieldError> {
    if points.len() != output_shapes.len() {
        return Err(ReceptiveFieldError::MaskCountMismatch {
            expected: output_shapes.len(),
            got: points.len(),
        });
    }
    output_shapes
        .iter()
        .zip(points)
        .map(|(shape, &point)| {
            if !shape.contains(point) {
                return Err(ReceptiveFieldError::InvalidGridPoint {
                    point,
                    grid: *shape,
                });
            }
            Ok(Tensor::impulse(
                &[1, 1, shape.h, shape.w],
                point.y,
                point.x,
                intensity,
            ))
        })
        .collect()
}
