/*
 * @Date         : 2026-01-27
 * @Description  : Graph 模块：计算图的核心实现
 *
 * 公开 API：
 * - `GraphInner`: 计算图（节点构建、前向传播、VJP 反向传播）
 * - `GraphError`: 错误类型
 */

mod error;
mod inner;

pub use error::GraphError;
pub use inner::GraphInner;
