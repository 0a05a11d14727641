/*
 * @Date         : 2026-02-05
 * @Description  : 基于梯度探测的感受野估计
 */

mod error;
mod estimator;
mod graph_backend;
mod probe;
pub mod types;

pub use error::ReceptiveFieldError;
pub use estimator::{ProbeConfig, ReceptiveField};
pub use graph_backend::{
    FeatureMapsGraphModel, GraphFeatureMapsReceptiveField, GraphReceptiveField, GraphSession,
    NamedGraphModel, TensorNames, DEFAULT_SEED, INPUT_IMAGE_NAME,
};
pub use probe::{GradientBackend, GradientSession, PreparedProbe};
pub use types::{
    FeatureMapDescription, GridPoint, GridShape, ImageShape, Point, ReceptiveFieldDescription,
    ReceptiveFieldRect, Size,
};

#[cfg(test)]
mod tests;
