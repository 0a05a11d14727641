/*
 * @Date         : 2026-02-05
 * @Description  : 感受野估计的错误类型
 */

use super::types::{GridPoint, GridShape, ReceptiveFieldRect};
use crate::nn::GraphError;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum ReceptiveFieldError {
    #[error("计算图中不存在名为`{name}`的张量")]
    TensorResolution { name: String },

    #[error(
        "第{feature_map}个特征图的感受野{rect:?}触及输入图像{input:?}的边界，感受野大于输入图像，请增大 input_shape"
    )]
    ReceptiveFieldTooLarge {
        feature_map: usize,
        rect: ReceptiveFieldRect,
        input: GridShape,
    },

    #[error("网格坐标{point:?}超出特征图{grid:?}的范围")]
    InvalidGridPoint { point: GridPoint, grid: GridShape },

    #[error("第{feature_map}个特征图回传到输入的梯度全为0，无法确定感受野（权重是否全为0？）")]
    EmptySupport { feature_map: usize },

    #[error("第{feature_map}个特征图在两个探测点得到的感受野不一致：{first:?}，{second:?}")]
    InconsistentProbes {
        feature_map: usize,
        first: ReceptiveFieldRect,
        second: ReceptiveFieldRect,
    },

    #[error("第{feature_map}个特征图{shape:?}的宽或高小于2，无法估计步长，请增大 input_shape")]
    FeatureMapTooSmall { feature_map: usize, shape: GridShape },

    #[error("探测掩码数量应为{expected}（与特征图数量一致），实际为{got}")]
    MaskCountMismatch { expected: usize, got: usize },

    #[error("探测会话应返回{expected}个梯度（与特征图数量一致），实际返回{got}个")]
    GradientCountMismatch { expected: usize, got: usize },

    #[error("尚未准备探测会话，请先调用 prepare 或 compute")]
    NotPrepared,

    #[error(transparent)]
    Graph(#[from] GraphError),
}
