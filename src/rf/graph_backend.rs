/*
 * @Date         : 2026-02-06
 * @Description  : 以`nn::GraphInner`为后端的探测实现
 *
 * 两种构建模型的方式：
 * - `NamedGraphModel`: 回调函数自行创建包括输入节点在内的整个计算图，调用方按节点名称选取输入与特征图；
 * - `FeatureMapsGraphModel`: 由本模块创建名为`input_image`的输入节点，回调函数直接返回特征图节点。
 *
 * 对每个特征图追加探测头：通道平均 -> 乘以掩码 -> 全局平均，得到标量损失，再对输入节点反向传播。
 */

use log::info;

use super::estimator::ReceptiveField;
use super::probe::{GradientBackend, GradientSession, PreparedProbe};
use super::types::{FeatureMapDescription, GridShape, ImageShape};
use super::ReceptiveFieldError;
use crate::nn::{GraphError, GraphInner, NodeId};
use crate::tensor::Tensor;

/// 构建计算图时默认使用的随机种子
pub const DEFAULT_SEED: u64 = 42;

/// `FeatureMapsGraphModel`创建的输入节点名称
pub const INPUT_IMAGE_NAME: &str = "input_image";

/// 按名称选取的输入张量与特征图张量
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TensorNames {
    pub input: String,
    pub outputs: Vec<String>,
}

impl TensorNames {
    pub fn new(input: &str, outputs: &[&str]) -> Self {
        Self {
            input: input.to_string(),
            outputs: outputs.iter().map(|name| name.to_string()).collect(),
        }
    }
}

/// 回调函数根据输入形状构建整个计算图（包括输入节点）
pub struct NamedGraphModel<F> {
    model_fn: F,
    seed: u64,
}

impl<F> NamedGraphModel<F>
where
    F: FnMut(&mut GraphInner, ImageShape) -> Result<(), GraphError>,
{
    pub fn new(model_fn: F) -> Self {
        Self {
            model_fn,
            seed: DEFAULT_SEED,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

impl<F> GradientBackend for NamedGraphModel<F>
where
    F: FnMut(&mut GraphInner, ImageShape) -> Result<(), GraphError>,
{
    type Selector = TensorNames;
    type Session = GraphSession;

    fn prepare(
        &mut self,
        input_shape: ImageShape,
        names: &TensorNames,
    ) -> Result<PreparedProbe<GraphSession>, ReceptiveFieldError> {
        let mut graph = GraphInner::with_name_and_seed("receptive_field", self.seed);
        (self.model_fn)(&mut graph, input_shape)?;

        let input = resolve_name(&graph, &names.input)?;
        let outputs = names
            .outputs
            .iter()
            .map(|name| resolve_name(&graph, name))
            .collect::<Result<Vec<_>, _>>()?;
        GraphSession::build(graph, input, &outputs)
    }
}

/// 输入节点由本模块创建，回调函数返回特征图节点
pub struct FeatureMapsGraphModel<F> {
    model_fn: F,
    seed: u64,
}

impl<F> FeatureMapsGraphModel<F>
where
    F: FnMut(&mut GraphInner, NodeId) -> Result<Vec<NodeId>, GraphError>,
{
    pub fn new(model_fn: F) -> Self {
        Self {
            model_fn,
            seed: DEFAULT_SEED,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

impl<F> GradientBackend for FeatureMapsGraphModel<F>
where
    F: FnMut(&mut GraphInner, NodeId) -> Result<Vec<NodeId>, GraphError>,
{
    type Selector = ();
    type Session = GraphSession;

    fn prepare(
        &mut self,
        input_shape: ImageShape,
        _selector: &(),
    ) -> Result<PreparedProbe<GraphSession>, ReceptiveFieldError> {
        let mut graph = GraphInner::with_name_and_seed("receptive_field", self.seed);
        let input = graph.new_input_node(
            &[1, input_shape.c, input_shape.h, input_shape.w],
            Some(INPUT_IMAGE_NAME),
        )?;
        let outputs = (self.model_fn)(&mut graph, input)?;
        GraphSession::build(graph, input, &outputs)
    }
}

fn resolve_name(graph: &GraphInner, name: &str) -> Result<NodeId, ReceptiveFieldError> {
    graph
        .get_node_by_name(name)
        .map_err(|_| ReceptiveFieldError::TensorResolution {
            name: name.to_string(),
        })
}

/// 节点形状须为`[1, c, h, w]`
fn grid_shape_of(graph: &GraphInner, node: NodeId) -> Result<GridShape, GraphError> {
    let shape = graph.get_node_shape(node)?;
    match GridShape::from_nchw(shape) {
        Some(grid) if grid.n == 1 => Ok(grid),
        _ => Err(GraphError::ShapeMismatch {
            expected: vec![1, 0, 0, 0],
            got: shape.to_vec(),
            message: format!(
                "节点`{}`必须是 batch 为1的4D张量 [1, C, H, W]",
                graph.get_node_name(node)?
            ),
        }),
    }
}

/// 单个特征图的探测头
struct ProbeHead {
    mask: NodeId,
    loss: NodeId,
}

/// 持有计算图的探测会话，随估计器一起释放
pub struct GraphSession {
    graph: GraphInner,
    input: NodeId,
    heads: Vec<ProbeHead>,
}

impl GraphSession {
    fn build(
        mut graph: GraphInner,
        input: NodeId,
        outputs: &[NodeId],
    ) -> Result<PreparedProbe<Self>, ReceptiveFieldError> {
        let input_shape = grid_shape_of(&graph, input)?;
        let mut output_shapes = Vec::with_capacity(outputs.len());
        let mut heads = Vec::with_capacity(outputs.len());
        for &output in outputs {
            let shape = grid_shape_of(&graph, output)?;
            let spatial = graph.new_channel_mean_node(output, None)?;
            let mask = graph.new_input_node(&[1, 1, shape.h, shape.w], None)?;
            let masked = graph.new_multiply_node(spatial, mask, None)?;
            let loss = graph.new_mean_node(masked, None)?;
            output_shapes.push(shape);
            heads.push(ProbeHead { mask, loss });
        }
        info!("特征图形状：{output_shapes:?}");
        info!("输入形状：{input_shape:?}");

        Ok(PreparedProbe {
            session: Self {
                graph,
                input,
                heads,
            },
            input_shape,
            output_shapes,
        })
    }
}

impl GradientSession for GraphSession {
    fn gradients(
        &mut self,
        masks: &[Tensor],
        input_image: &Tensor,
    ) -> Result<Vec<Tensor>, ReceptiveFieldError> {
        if masks.len() != self.heads.len() {
            return Err(ReceptiveFieldError::MaskCountMismatch {
                expected: self.heads.len(),
                got: masks.len(),
            });
        }
        self.graph.set_node_value(self.input, Some(input_image))?;
        for (head, mask) in self.heads.iter().zip(masks) {
            self.graph.set_node_value(head.mask, Some(mask))?;
        }
        let losses: Vec<NodeId> = self.heads.iter().map(|head| head.loss).collect();
        self.graph.forward_nodes(&losses)?;

        let mut grads = Vec::with_capacity(losses.len());
        for loss in losses {
            grads.push(self.graph.backward_to(loss, self.input)?);
        }
        Ok(grads)
    }
}

/// 按节点名称选取输入与特征图的估计器
pub type GraphReceptiveField<F> = ReceptiveField<NamedGraphModel<F>>;

/// 回调函数直接返回特征图节点的估计器
pub type GraphFeatureMapsReceptiveField<F> = ReceptiveField<FeatureMapsGraphModel<F>>;

impl<F> ReceptiveField<NamedGraphModel<F>>
where
    F: FnMut(&mut GraphInner, ImageShape) -> Result<(), GraphError>,
{
    pub fn from_model_fn(model_fn: F) -> Self {
        Self::new(NamedGraphModel::new(model_fn))
    }

    /// 估计名为`output_names`的各特征图相对于输入`input_name`的感受野
    ///
    /// 若网络的感受野大于`input_shape`，返回`ReceptiveFieldTooLarge`，此时应增大`input_shape`。
    pub fn compute(
        &mut self,
        input_shape: impl Into<ImageShape>,
        input_name: &str,
        output_names: &[&str],
    ) -> Result<Vec<FeatureMapDescription>, ReceptiveFieldError> {
        self.compute_with(input_shape, &TensorNames::new(input_name, output_names))
    }
}

impl<F> ReceptiveField<FeatureMapsGraphModel<F>>
where
    F: FnMut(&mut GraphInner, NodeId) -> Result<Vec<NodeId>, GraphError>,
{
    pub fn from_model_fn(model_fn: F) -> Self {
        Self::new(FeatureMapsGraphModel::new(model_fn))
    }

    pub fn compute(
        &mut self,
        input_shape: impl Into<ImageShape>,
    ) -> Result<Vec<FeatureMapDescription>, ReceptiveFieldError> {
        self.compute_with(input_shape, &())
    }
}
