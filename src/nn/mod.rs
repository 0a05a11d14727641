/*
 * @Date         : 2024-01-31 20:23:53
 * @Description  : 负责计算图（可求梯度的神经网络）的构建，是感受野探测的计算后端
 */

mod graph;
pub mod layer;
mod nodes;

pub use graph::{GraphError, GraphInner};
pub use nodes::NodeId;

#[cfg(test)]
mod tests;
