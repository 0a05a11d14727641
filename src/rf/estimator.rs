/*
 * @Date         : 2026-02-05
 * @Description  : 感受野估计器：在特征图的中心点及其对角相邻点各注入一次脉冲，
 *                 把回传到输入图像的梯度归约为感受野的尺寸、步长与偏移。
 *
 * 每次 compute 的流程：
 * 1. 通过后端构建模型，得到探测会话与输入/特征图形状（batch 均为1）；
 * 2. 所有特征图共用一轮探测：第一轮在中心点`(w / 2, h / 2)`，第二轮在对角相邻点；
 *    宽或高小于2的特征图只做中心探测，用于区分“输入太小”与“特征图太小”；
 * 3. 梯度按通道取绝对值求和，超过`最大值 * relative_threshold`的像素构成支撑集，其外接矩形即感受野；
 * 4. 两次探测的矩形中心之差即步长，中心探测的矩形尺寸即感受野尺寸。
 */

use log::debug;
use serde::{Deserialize, Serialize};

use super::probe::{impulse_masks, GradientBackend, GradientSession, PreparedProbe};
use super::types::{
    FeatureMapDescription, GridPoint, GridShape, ImageShape, Point, ReceptiveFieldDescription,
    ReceptiveFieldRect, Size,
};
use super::ReceptiveFieldError;
use crate::tensor::Tensor;

/// 探测参数
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// 脉冲强度
    pub intensity: f32,
    /// 支撑集阈值（相对于梯度图自身的最大值）
    pub relative_threshold: f32,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            intensity: 1.0,
            relative_threshold: 1e-10,
        }
    }
}

/// 基于梯度探测的感受野估计器，`B`为构建模型并计算梯度的后端
pub struct ReceptiveField<B: GradientBackend> {
    backend: B,
    config: ProbeConfig,
    session: Option<B::Session>,
    input_shape: Option<GridShape>,
    output_shapes: Vec<GridShape>,
    feature_maps_desc: Option<Vec<FeatureMapDescription>>,
}

impl<B: GradientBackend> ReceptiveField<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            config: ProbeConfig::default(),
            session: None,
            input_shape: None,
            output_shapes: Vec::new(),
            feature_maps_desc: None,
        }
    }

    pub fn with_config(mut self, config: ProbeConfig) -> Self {
        self.config = config;
        self
    }

    pub const fn config(&self) -> &ProbeConfig {
        &self.config
    }

    pub const fn backend(&self) -> &B {
        &self.backend
    }

    /// 最近一次 prepare 得到的输入形状
    pub const fn input_shape(&self) -> Option<GridShape> {
        self.input_shape
    }

    pub fn output_shapes(&self) -> &[GridShape] {
        &self.output_shapes
    }

    pub fn num_feature_maps(&self) -> usize {
        self.output_shapes.len()
    }

    /// 最近一次成功的 compute 结果
    pub fn feature_maps_desc(&self) -> Option<&[FeatureMapDescription]> {
        self.feature_maps_desc.as_deref()
    }

    /// 释放探测会话（及其持有的模型）
    pub fn close(&mut self) {
        self.session = None;
    }

    /// 为`input_shape`构建模型与探测会话，旧会话会先被释放
    pub fn prepare(
        &mut self,
        input_shape: impl Into<ImageShape>,
        selector: &B::Selector,
    ) -> Result<(), ReceptiveFieldError> {
        self.close();
        self.input_shape = None;
        self.output_shapes.clear();

        let PreparedProbe {
            session,
            input_shape,
            output_shapes,
        } = self.backend.prepare(input_shape.into(), selector)?;
        self.session = Some(session);
        self.input_shape = Some(input_shape.replace_n(1));
        self.output_shapes = output_shapes.into_iter().map(|s| s.replace_n(1)).collect();
        Ok(())
    }

    /// 在每个特征图的`points[i]`处注入强度为`intensity`的脉冲，返回各自回传到全零输入图像的梯度
    pub fn gradients_at(
        &mut self,
        points: &[GridPoint],
        intensity: f32,
    ) -> Result<Vec<Tensor>, ReceptiveFieldError> {
        let input_shape = self.input_shape.ok_or(ReceptiveFieldError::NotPrepared)?;
        let masks = impulse_masks(&self.output_shapes, points, intensity)?;
        let session = self
            .session
            .as_mut()
            .ok_or(ReceptiveFieldError::NotPrepared)?;
        let input_image = Tensor::zeros(&input_shape.to_nchw());
        let grads = session.gradients(&masks, &input_image)?;
        if grads.len() != masks.len() {
            return Err(ReceptiveFieldError::GradientCountMismatch {
                expected: masks.len(),
                got: grads.len(),
            });
        }
        Ok(grads)
    }

    /// 估计`selector`所选每个特征图的感受野，结果顺序与特征图顺序一致
    pub fn compute_with(
        &mut self,
        input_shape: impl Into<ImageShape>,
        selector: &B::Selector,
    ) -> Result<Vec<FeatureMapDescription>, ReceptiveFieldError> {
        self.feature_maps_desc = None;
        self.prepare(input_shape, selector)?;
        let input_shape = self.input_shape.ok_or(ReceptiveFieldError::NotPrepared)?;

        let intensity = self.config.intensity;
        let threshold = self.config.relative_threshold;

        let centers: Vec<GridPoint> = self.output_shapes.iter().map(GridShape::center).collect();
        let center_grads = self.gradients_at(&centers, intensity)?;
        let mut firsts = Vec::with_capacity(centers.len());
        for (index, grad) in center_grads.iter().enumerate() {
            let rect = footprint(grad, threshold)
                .ok_or(ReceptiveFieldError::EmptySupport { feature_map: index })?;
            ensure_inside(index, rect, &input_shape)?;
            firsts.push(rect);
        }

        // 中心探测已确认感受野完整落在输入内，此时特征图仍过小才无法估计步长
        for (index, shape) in self.output_shapes.iter().enumerate() {
            if shape.w < 2 || shape.h < 2 {
                return Err(ReceptiveFieldError::FeatureMapTooSmall {
                    feature_map: index,
                    shape: *shape,
                });
            }
        }

        let neighbours: Vec<GridPoint> = self
            .output_shapes
            .iter()
            .zip(&centers)
            .map(|(shape, &center)| diagonal_neighbour(shape, center))
            .collect();
        debug!("中心探测点：{centers:?}，相邻探测点：{neighbours:?}");
        let neighbour_grads = self.gradients_at(&neighbours, intensity)?;

        let mut descriptions = Vec::with_capacity(self.output_shapes.len());
        for (index, shape) in self.output_shapes.iter().enumerate() {
            let first = firsts[index];
            let second = footprint(&neighbour_grads[index], threshold)
                .ok_or(ReceptiveFieldError::EmptySupport { feature_map: index })?;
            debug!("第{index}个特征图的感受野：中心{first:?}，相邻{second:?}");
            ensure_inside(index, second, &input_shape)?;

            let inconsistent = ReceptiveFieldError::InconsistentProbes {
                feature_map: index,
                first,
                second,
            };
            if first.size() != second.size() {
                return Err(inconsistent);
            }
            let stride = probe_stride(first, second, neighbours[index] - centers[index])
                .ok_or(inconsistent)?;

            let center = centers[index];
            let centroid = first.center();
            let origin = Point::new(
                centroid.x - (stride.w * center.x) as f32,
                centroid.y - (stride.h * center.y) as f32,
            );
            descriptions.push(FeatureMapDescription {
                fm_size: shape.size(),
                reference_point: center,
                rect: first,
                rf: ReceptiveFieldDescription {
                    offset: centroid - input_shape.geometric_center(),
                    origin,
                    stride,
                    size: first.size(),
                },
            });
        }

        self.feature_maps_desc = Some(descriptions.clone());
        Ok(descriptions)
    }
}

/// 感受野触及输入边界时说明输入图像不够大
fn ensure_inside(
    feature_map: usize,
    rect: ReceptiveFieldRect,
    input: &GridShape,
) -> Result<(), ReceptiveFieldError> {
    if rect.touches_boundary(input) {
        return Err(ReceptiveFieldError::ReceptiveFieldTooLarge {
            feature_map,
            rect,
            input: *input,
        });
    }
    Ok(())
}

/// 对角相邻的网格点：各轴`+1`，越界时改为`-1`
fn diagonal_neighbour(shape: &GridShape, point: GridPoint) -> GridPoint {
    let step = |value: usize, len: usize| {
        if value + 1 < len { value + 1 } else { value - 1 }
    };
    GridPoint::new(step(point.x, shape.w), step(point.y, shape.h))
}

/// 网格上移动一格时矩形中心的位移，位移不为正时返回 None
fn probe_stride(
    first: ReceptiveFieldRect,
    second: ReceptiveFieldRect,
    (dx, dy): (isize, isize),
) -> Option<Size> {
    let shift = second.center() - first.center();
    let per_cell = |shift: f32, delta: isize| {
        let stride = (shift / delta as f32).round();
        (stride >= 1.).then_some(stride as usize)
    };
    Some(Size::new(per_cell(shift.x, dx)?, per_cell(shift.y, dy)?))
}

/// 梯度图`[1, c, H, W]`的支撑集外接矩形，梯度全为0时返回 None
pub(crate) fn footprint(grad: &Tensor, relative_threshold: f32) -> Option<ReceptiveFieldRect> {
    let magnitude = grad.abs().sum_axis_keep_dim(1);
    let max = magnitude.max_abs();
    if max <= 0. || !max.is_finite() {
        return None;
    }
    let threshold = max * relative_threshold;

    let shape = magnitude.shape();
    let (height, width) = (shape[2], shape[3]);
    let (mut x_min, mut y_min) = (usize::MAX, usize::MAX);
    let (mut x_max, mut y_max) = (0, 0);
    for y in 0..height {
        for x in 0..width {
            if magnitude[[0, 0, y, x]] > threshold {
                x_min = x_min.min(x);
                x_max = x_max.max(x);
                y_min = y_min.min(y);
                y_max = y_max.max(y);
            }
        }
    }
    if x_min == usize::MAX {
        return None;
    }
    Some(ReceptiveFieldRect::new(
        x_min as isize,
        y_min as isize,
        x_max - x_min + 1,
        y_max - y_min + 1,
    ))
}
