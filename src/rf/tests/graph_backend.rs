use super::setup_logger;
use crate::assert_err;
use crate::nn::layer::conv2d;
use crate::nn::{GraphError, GraphInner, NodeId};
use crate::rf::{
    GraphFeatureMapsReceptiveField, GraphReceptiveField, GridPoint, ImageShape, Point,
    ReceptiveFieldError, ReceptiveFieldRect, Size,
};
use crate::tensor::Tensor;
use approx::assert_abs_diff_eq;

/// 卷积核全为1的卷积（权重全为正，梯度不会相互抵消）
fn ones_conv(
    graph: &mut GraphInner,
    input: NodeId,
    channels: (usize, usize),
    kernel: usize,
    stride: usize,
    dilation: usize,
) -> Result<NodeId, GraphError> {
    let (in_c, out_c) = channels;
    let shape = [out_c, in_c, kernel, kernel];
    let k = graph.new_parameter_node(&shape, None)?;
    graph.set_node_value(k, Some(&Tensor::ones(&shape)))?;
    let padding = dilation * (kernel - 1) / 2;
    graph.new_dilated_conv2d_node(
        input,
        k,
        (stride, stride),
        (padding, padding),
        (dilation, dilation),
        None,
    )
}

fn identity_model(_graph: &mut GraphInner, input: NodeId) -> Result<Vec<NodeId>, GraphError> {
    Ok(vec![input])
}

fn conv_stack_model(graph: &mut GraphInner, input: NodeId) -> Result<Vec<NodeId>, GraphError> {
    // 3x3 + 5x5 + 3x3：感受野 1 + 2 + 4 + 2 = 9
    let h = ones_conv(graph, input, (1, 4), 3, 1, 1)?;
    let h = graph.new_tanh_node(h, None)?;
    let h = ones_conv(graph, h, (4, 4), 5, 1, 1)?;
    let h = ones_conv(graph, h, (4, 2), 3, 1, 1)?;
    Ok(vec![h])
}

/// 使用默认（带种子的随机）初始化的卷积层
fn named_model(graph: &mut GraphInner, shape: ImageShape) -> Result<(), GraphError> {
    let x = graph.new_input_node(&[1, shape.c, shape.h, shape.w], Some("image"))?;
    let h = conv2d(graph, x, shape.c, 4, (3, 3), (1, 1), (1, 1), "conv1")?;
    let h = graph.new_tanh_node(h, Some("act1"))?;
    let h = graph.new_avg_pool2d_node(h, (2, 2), None, Some("pool1"))?;
    let h = conv2d(graph, h, 4, 8, (3, 3), (1, 1), (1, 1), "conv2")?;
    graph.new_tanh_node(h, Some("act2"))?;
    Ok(())
}

#[test]
fn test_identity_network() -> Result<(), ReceptiveFieldError> {
    setup_logger();
    let mut rf = GraphFeatureMapsReceptiveField::from_model_fn(identity_model);
    let descs = rf.compute((9, 8, 3))?;
    let rf_desc = descs[0].rf;
    assert_eq!(rf_desc.size, Size::new(1, 1));
    assert_eq!(rf_desc.stride, Size::new(1, 1));
    // 中心网格点 (4, 4)，图像几何中心 (3.5, 4)
    assert_abs_diff_eq!(rf_desc.offset, Point::new(0.5, 0.));
    assert_abs_diff_eq!(rf_desc.origin, Point::new(0., 0.));
    Ok(())
}

#[test]
fn test_conv_stack_size() -> Result<(), ReceptiveFieldError> {
    setup_logger();
    let mut rf = GraphFeatureMapsReceptiveField::from_model_fn(conv_stack_model);
    let descs = rf.compute((16, 16, 1))?;
    assert_eq!(descs[0].rf.size, Size::new(9, 9));
    assert_eq!(descs[0].rf.stride, Size::new(1, 1));
    assert_eq!(descs[0].rect, ReceptiveFieldRect::new(4, 4, 9, 9));
    Ok(())
}

#[test]
fn test_stride_two() -> Result<(), ReceptiveFieldError> {
    fn model(graph: &mut GraphInner, input: NodeId) -> Result<Vec<NodeId>, GraphError> {
        let conv = ones_conv(graph, input, (1, 2), 3, 2, 1)?;
        let pool = graph.new_avg_pool2d_node(input, (2, 2), None, None)?;
        Ok(vec![conv, pool])
    }
    let mut rf = GraphFeatureMapsReceptiveField::from_model_fn(model);
    let descs = rf.compute((16, 16, 1))?;

    assert_eq!(descs[0].rf.stride, Size::new(2, 2));
    assert_eq!(descs[0].rf.size, Size::new(3, 3));
    assert_eq!(descs[0].rect, ReceptiveFieldRect::new(7, 7, 3, 3));
    assert_eq!(descs[1].rf.stride, Size::new(2, 2));
    assert_eq!(descs[1].rf.size, Size::new(2, 2));
    assert_abs_diff_eq!(descs[1].rf.origin, Point::new(0.5, 0.5));
    Ok(())
}

#[test]
fn test_dilated_conv() -> Result<(), ReceptiveFieldError> {
    fn model(graph: &mut GraphInner, input: NodeId) -> Result<Vec<NodeId>, GraphError> {
        Ok(vec![ones_conv(graph, input, (2, 2), 3, 1, 3)?])
    }
    let mut rf = GraphFeatureMapsReceptiveField::from_model_fn(model);
    let descs = rf.compute((16, 16, 2))?;
    // 1 + d * (k - 1) = 7
    assert_eq!(descs[0].rf.size, Size::new(7, 7));
    Ok(())
}

#[test]
fn test_named_tensors_multiple_outputs() -> Result<(), ReceptiveFieldError> {
    setup_logger();
    let mut rf = GraphReceptiveField::from_model_fn(named_model);
    let descs = rf.compute((32, 32, 3), "image", &["conv1", "act2"])?;

    assert_eq!(rf.num_feature_maps(), 2);
    assert_eq!(descs[0].fm_size, Size::new(32, 32));
    assert_eq!(descs[0].rf.size, Size::new(3, 3));
    assert_eq!(descs[0].rf.stride, Size::new(1, 1));
    // 3x3 卷积 -> 2x2 池化 -> 3x3 卷积：(3 + 1) + 2 * 2 = 8
    assert_eq!(descs[1].fm_size, Size::new(16, 16));
    assert_eq!(descs[1].rf.size, Size::new(8, 8));
    assert_eq!(descs[1].rf.stride, Size::new(2, 2));
    assert_eq!(descs[1].rect, ReceptiveFieldRect::new(13, 13, 8, 8));

    // 结果只与模型、形状和种子有关
    let again = rf.compute((32, 32, 3), "image", &["conv1", "act2"])?;
    assert_eq!(descs, again);
    Ok(())
}

#[test]
fn test_rect_at_matches_probe() -> Result<(), ReceptiveFieldError> {
    let mut rf = GraphReceptiveField::from_model_fn(named_model);
    let descs = rf.compute((32, 32, 1), "image", &["act2"])?;
    let point = GridPoint::new(5, 10);
    let grads = rf.gradients_at(&[point], 1.)?;
    let probed = crate::rf::estimator::footprint(&grads[0], rf.config().relative_threshold);
    assert_eq!(probed, Some(descs[0].rect_at(point)?));
    Ok(())
}

#[test]
fn test_unknown_tensor_name() {
    let mut rf = GraphReceptiveField::from_model_fn(named_model);
    assert_err!(
        rf.compute((32, 32, 3), "image", &["conv1", "conv9"]),
        ReceptiveFieldError::TensorResolution { name } if name == "conv9"
    );
    assert_err!(
        rf.compute((32, 32, 3), "img", &["conv1"]),
        ReceptiveFieldError::TensorResolution { name } if name == "img"
    );
}

#[test]
fn test_receptive_field_too_large() {
    let mut rf = GraphFeatureMapsReceptiveField::from_model_fn(conv_stack_model);
    assert_err!(
        rf.compute((8, 8, 1)),
        ReceptiveFieldError::ReceptiveFieldTooLarge { feature_map: 0, .. }
    );
    assert!(rf.feature_maps_desc().is_none());
}

#[test]
fn test_batched_input_is_rejected() {
    fn model(graph: &mut GraphInner, shape: ImageShape) -> Result<(), GraphError> {
        graph.new_input_node(&[2, shape.c, shape.h, shape.w], Some("image"))?;
        Ok(())
    }
    let mut rf = GraphReceptiveField::from_model_fn(model);
    assert_err!(
        rf.compute((8, 8, 1), "image", &["image"]),
        ReceptiveFieldError::Graph(GraphError::ShapeMismatch { got, .. }) if got == &[2, 1, 8, 8]
    );
}

#[test]
fn test_model_error_is_propagated() {
    fn model(graph: &mut GraphInner, input: NodeId) -> Result<Vec<NodeId>, GraphError> {
        // 池化窗口大于输入
        Ok(vec![graph.new_max_pool2d_node(input, (9, 9), None, None)?])
    }
    let mut rf = GraphFeatureMapsReceptiveField::from_model_fn(model);
    assert_err!(
        rf.compute((8, 8, 1)),
        ReceptiveFieldError::Graph(GraphError::InvalidOperation(_))
    );
}

/// `depth`层 same padding 的 3x3 卷积，使用默认初始化
fn deep_conv_stack(
    graph: &mut GraphInner,
    input: NodeId,
    depth: usize,
    channels: usize,
) -> Result<NodeId, GraphError> {
    let mut h = conv2d(graph, input, 1, channels, (3, 3), (1, 1), (1, 1), "conv1")?;
    for layer in 2..=depth {
        let name = format!("conv{layer}");
        h = conv2d(graph, h, channels, channels, (3, 3), (1, 1), (1, 1), &name)?;
    }
    Ok(h)
}

#[test]
fn test_deep_conv_stack_keeps_full_support() -> Result<(), ReceptiveFieldError> {
    setup_logger();
    for (depth, channels) in [(14, 8), (20, 4)] {
        let model = |graph: &mut GraphInner, input: NodeId| -> Result<Vec<NodeId>, GraphError> {
            Ok(vec![deep_conv_stack(graph, input, depth, channels)?])
        };
        let mut rf = GraphFeatureMapsReceptiveField::from_model_fn(model);
        let side = 2 * depth + 12;
        let descs = rf.compute((side, side, 1))?;
        let expected = 2 * depth + 1;
        assert_eq!(descs[0].rf.size, Size::new(expected, expected), "depth = {depth}");
        assert_eq!(descs[0].rf.stride, Size::new(1, 1));
    }
    Ok(())
}

#[test]
fn test_valid_padding_input_equal_to_receptive_field() -> Result<(), ReceptiveFieldError> {
    // 三层无 padding 的 3x3 卷积：感受野为7
    fn model(graph: &mut GraphInner, input: NodeId) -> Result<Vec<NodeId>, GraphError> {
        let h = conv2d(graph, input, 1, 2, (3, 3), (1, 1), (0, 0), "conv1")?;
        let h = conv2d(graph, h, 2, 2, (3, 3), (1, 1), (0, 0), "conv2")?;
        Ok(vec![conv2d(graph, h, 2, 2, (3, 3), (1, 1), (0, 0), "conv3")?])
    }
    let mut rf = GraphFeatureMapsReceptiveField::from_model_fn(model);

    // 7x7 输入只得到 1x1 的特征图，此时应提示输入太小
    assert_err!(
        rf.compute((7, 7, 1)),
        ReceptiveFieldError::ReceptiveFieldTooLarge { feature_map: 0, rect, .. }
            if *rect == ReceptiveFieldRect::new(0, 0, 7, 7)
    );
    assert_err!(
        rf.compute((8, 8, 1)),
        ReceptiveFieldError::ReceptiveFieldTooLarge { feature_map: 0, .. }
    );

    let descs = rf.compute((12, 12, 1))?;
    assert_eq!(descs[0].fm_size, Size::new(6, 6));
    assert_eq!(descs[0].rf.size, Size::new(7, 7));
    assert_eq!(descs[0].rf.stride, Size::new(1, 1));
    Ok(())
}
