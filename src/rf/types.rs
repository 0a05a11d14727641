/*
 * @Date         : 2026-02-05
 * @Description  : 感受野估计用到的几何类型：图像/网格形状、网格坐标、像素坐标、矩形以及最终的特征图描述。
 *                 所有网格形状都以`[n, h, w, c]`的字段形式保存，与计算图中`[n, c, h, w]`的张量布局相互转换。
 */

use approx::AbsDiffEq;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Sub;

use super::ReceptiveFieldError;

/// 输入图像的形状（batch 隐含为1）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageShape {
    pub h: usize,
    pub w: usize,
    pub c: usize,
}

impl ImageShape {
    pub const fn new(h: usize, w: usize, c: usize) -> Self {
        Self { h, w, c }
    }
}

impl From<(usize, usize, usize)> for ImageShape {
    fn from((h, w, c): (usize, usize, usize)) -> Self {
        Self::new(h, w, c)
    }
}

impl fmt::Display for ImageShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[h={}, w={}, c={}]", self.h, self.w, self.c)
    }
}

/// 任意4维张量（输入图像或特征图）的形状
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridShape {
    pub n: usize,
    pub h: usize,
    pub w: usize,
    pub c: usize,
}

impl GridShape {
    pub const fn new(n: usize, h: usize, w: usize, c: usize) -> Self {
        Self { n, h, w, c }
    }

    /// 返回替换了 batch 大小的新形状，原形状不变
    pub const fn replace_n(self, n: usize) -> Self {
        Self { n, ..self }
    }

    /// 由计算图中`[n, c, h, w]`布局的形状构造，非4维时返回 None
    pub fn from_nchw(shape: &[usize]) -> Option<Self> {
        match *shape {
            [n, c, h, w] => Some(Self::new(n, h, w, c)),
            _ => None,
        }
    }

    /// 转为计算图中的`[n, c, h, w]`布局
    pub const fn to_nchw(&self) -> [usize; 4] {
        [self.n, self.c, self.h, self.w]
    }

    pub const fn contains(&self, point: GridPoint) -> bool {
        point.x < self.w && point.y < self.h
    }

    /// 网格中心点`(w / 2, h / 2)`
    pub const fn center(&self) -> GridPoint {
        GridPoint::new(self.w / 2, self.h / 2)
    }

    /// 几何中心（像素坐标），如宽为4时为1.5
    pub fn geometric_center(&self) -> Point {
        Point::new((self.w as f32 - 1.) / 2., (self.h as f32 - 1.) / 2.)
    }

    pub const fn size(&self) -> Size {
        Size::new(self.w, self.h)
    }
}

/// 特征图网格上的整数坐标
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridPoint {
    pub x: usize,
    pub y: usize,
}

impl GridPoint {
    pub const fn new(x: usize, y: usize) -> Self {
        Self { x, y }
    }
}

/// 两个网格坐标之差：`(dx, dy)`，可为负
impl Sub for GridPoint {
    type Output = (isize, isize);

    fn sub(self, other: Self) -> (isize, isize) {
        (
            self.x as isize - other.x as isize,
            self.y as isize - other.y as isize,
        )
    }
}

/// 输入图像上的像素坐标（可以落在两个像素之间）
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

impl Sub for Point {
    type Output = Point;

    fn sub(self, other: Self) -> Point {
        Point::new(self.x - other.x, self.y - other.y)
    }
}

impl AbsDiffEq for Point {
    type Epsilon = f32;

    fn default_epsilon() -> f32 {
        f32::EPSILON
    }

    fn abs_diff_eq(&self, other: &Self, epsilon: f32) -> bool {
        self.x.abs_diff_eq(&other.x, epsilon) && self.y.abs_diff_eq(&other.y, epsilon)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Size {
    pub w: usize,
    pub h: usize,
}

impl Size {
    pub const fn new(w: usize, h: usize) -> Self {
        Self { w, h }
    }
}

/// 感受野在输入图像上的外接矩形（左上角坐标可以为负，即延伸到图像之外）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReceptiveFieldRect {
    pub x: isize,
    pub y: isize,
    pub w: usize,
    pub h: usize,
}

impl ReceptiveFieldRect {
    pub const fn new(x: isize, y: isize, w: usize, h: usize) -> Self {
        Self { x, y, w, h }
    }

    /// 以`center`为中心、尺寸为`size`的矩形
    pub fn centered_at(center: Point, size: Size) -> Self {
        let x = center.x - (size.w as f32 - 1.) / 2.;
        let y = center.y - (size.h as f32 - 1.) / 2.;
        Self::new(x.round() as isize, y.round() as isize, size.w, size.h)
    }

    pub fn center(&self) -> Point {
        Point::new(
            self.x as f32 + (self.w as f32 - 1.) / 2.,
            self.y as f32 + (self.h as f32 - 1.) / 2.,
        )
    }

    pub const fn size(&self) -> Size {
        Size::new(self.w, self.h)
    }

    /// 矩形是否触及（或越过）`input`的边界
    pub const fn touches_boundary(&self, input: &GridShape) -> bool {
        self.x <= 0
            || self.y <= 0
            || self.x + self.w as isize >= input.w as isize
            || self.y + self.h as isize >= input.h as isize
    }
}

/// 一个特征图的感受野参数（像素单位）
///
/// - `offset`: 参考点的感受野中心相对于输入图像几何中心的偏移
/// - `origin`: 网格点`(0, 0)`的感受野中心
/// - `stride`: 网格上移动一格时感受野中心移动的像素数
/// - `size`: 感受野的宽高
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReceptiveFieldDescription {
    pub offset: Point,
    pub origin: Point,
    pub stride: Size,
    pub size: Size,
}

/// 单个特征图的估计结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureMapDescription {
    /// 特征图网格尺寸
    pub fm_size: Size,
    /// 探测时使用的参考网格点（特征图中心）
    pub reference_point: GridPoint,
    /// 参考网格点的感受野矩形
    pub rect: ReceptiveFieldRect,
    pub rf: ReceptiveFieldDescription,
}

impl FeatureMapDescription {
    /// 任意网格点的感受野矩形：中心为`origin + stride * point`
    pub fn rect_at(&self, point: GridPoint) -> Result<ReceptiveFieldRect, ReceptiveFieldError> {
        if point.x >= self.fm_size.w || point.y >= self.fm_size.h {
            return Err(ReceptiveFieldError::InvalidGridPoint {
                point,
                grid: GridShape::new(1, self.fm_size.h, self.fm_size.w, 1),
            });
        }
        let center = Point::new(
            self.rf.origin.x + (self.rf.stride.w * point.x) as f32,
            self.rf.origin.y + (self.rf.stride.h * point.y) as f32,
        );
        Ok(ReceptiveFieldRect::centered_at(center, self.rf.size))
    }
}
