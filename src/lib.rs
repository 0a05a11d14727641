//! # Receptive Field
//!
//! `receptive_field`通过梯度探测估计卷积网络中特征图的感受野：在特征图的某个网格点注入一个脉冲，
//! 把它反向传播回输入图像，由梯度不为0的区域得到该网格点的感受野，进而得到感受野的尺寸、步长与偏移。
//! 无需手动推算每一层卷积/池化的尺寸变化。
//!
//! ```ignore
//! use receptive_field::nn::{layer::conv2d, GraphError, GraphInner, NodeId};
//! use receptive_field::rf::GraphFeatureMapsReceptiveField;
//!
//! fn model(graph: &mut GraphInner, input: NodeId) -> Result<Vec<NodeId>, GraphError> {
//!     let h = conv2d(graph, input, 3, 16, (3, 3), (1, 1), (1, 1), "conv1")?;
//!     Ok(vec![graph.new_avg_pool2d_node(h, (2, 2), None, Some("pool1"))?])
//! }
//!
//! let mut rf = GraphFeatureMapsReceptiveField::from_model_fn(model);
//! let descs = rf.compute((64, 64, 3))?;
//! println!("{:?}", descs[0].rf);
//! ```

pub mod errors;
pub mod nn;
pub mod rf;
pub mod tensor;
pub mod utils;
