/*
 * @Date         : 2023-08-17 17:24:24
 * @Description  : 张量的乘法，实现了两个张量“逐元素”相乘（Hadamard积）以及张量与纯数相乘的运算。
 *                 两个张量相乘时形状必须严格一致，否则panic。
 */

use super::add::assert_same_shape;
use crate::errors::Operator;
use crate::tensor::Tensor;
use std::ops::Mul;

impl Mul<f32> for Tensor {
    type Output = Self;

    fn mul(self, scalar: f32) -> Self {
        Self {
            data: &self.data * scalar,
        }
    }
}

impl Mul<f32> for &Tensor {
    type Output = Tensor;

    fn mul(self, scalar: f32) -> Tensor {
        Tensor {
            data: &self.data * scalar,
        }
    }
}

impl<'a> Mul<&'a Tensor> for &Tensor {
    type Output = Tensor;

    fn mul(self, other: &'a Tensor) -> Tensor {
        assert_same_shape(self, other, Operator::Mul);
        Tensor {
            data: &self.data * &other.data,
        }
    }
}

impl Mul for Tensor {
    type Output = Self;

    fn mul(self, other: Self) -> Self {
        &self * &other
    }
}
