use crate::errors::TensorError;
use crate::tensor::Tensor;
use ndarray::{Axis, IxDyn};

impl Tensor {
    /// 对每个元素应用`f`，返回一个新的张量
    pub fn map(&self, f: impl Fn(f32) -> f32) -> Tensor {
        Tensor {
            data: self.data.mapv(f),
        }
    }

    /// 逐元素取绝对值
    pub fn abs(&self) -> Tensor {
        self.map(f32::abs)
    }

    /// 所有元素之和（纯数）
    pub fn sum(&self) -> f32 {
        self.data.sum()
    }

    /// 所有元素的平均值（纯数），空张量返回0
    pub fn mean(&self) -> f32 {
        if self.size() == 0 {
            return 0.;
        }
        self.sum() / self.size() as f32
    }

    /// 沿`axis`求和，并保留该维度（长度变为1）
    pub fn sum_axis_keep_dim(&self, axis: usize) -> Tensor {
        Tensor {
            data: self.data.sum_axis(Axis(axis)).insert_axis(Axis(axis)),
        }
    }

    /// 沿`axis`求平均，并保留该维度（长度变为1）
    pub fn mean_axis_keep_dim(&self, axis: usize) -> Tensor {
        let len = self.shape()[axis].max(1) as f32;
        self.sum_axis_keep_dim(axis) * (1. / len)
    }

    /// 将长度为1的维度广播到`shape`，返回一个拥有数据的新张量
    pub fn broadcast_to(&self, shape: &[usize]) -> Tensor {
        let view = self.data.broadcast(IxDyn(shape)).unwrap_or_else(|| {
            panic!(
                "{}",
                TensorError::BroadcastError {
                    from: self.shape().to_vec(),
                    to: shape.to_vec(),
                }
            )
        });
        Tensor {
            data: view.to_owned(),
        }
    }
}
