/*
 * @Date         : 2026-01-27
 * @Description  : Graph 模块的错误类型
 */

use crate::nn::NodeId;
use thiserror::Error;

/// Graph 操作错误类型
#[derive(Error, Debug, PartialEq, Eq)]
pub enum GraphError {
    #[error("图中不存在节点{0:?}")]
    NodeNotFound(NodeId),
    #[error("图中不存在名为`{0}`的节点")]
    NodeNameNotFound(String),
    #[error("{0}")]
    InvalidOperation(String),
    #[error("{message}（期望形状{expected:?}，实际形状{got:?}）")]
    ShapeMismatch {
        expected: Vec<usize>,
        got: Vec<usize>,
        message: String,
    },
    #[error("{message}（期望{expected}，实际{got}）")]
    DimensionMismatch {
        expected: usize,
        got: usize,
        message: String,
    },
    #[error("{0}")]
    ComputationError(String),
    #[error("{0}")]
    DuplicateNodeName(String),
}
