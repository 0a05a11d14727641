use crate::assert_err;
use crate::nn::{GraphError, GraphInner, NodeId};
use crate::tensor::Tensor;
use approx::assert_abs_diff_eq;

/// 输入 [1, 1, 3, 3]（值为1..=9），卷积核 [1, 1, 2, 2] 全为1
fn ones_kernel_graph(
    stride: (usize, usize),
    padding: (usize, usize),
) -> Result<(GraphInner, NodeId, NodeId, NodeId), GraphError> {
    let mut graph = GraphInner::new();
    let input = graph.new_input_node(&[1, 1, 3, 3], Some("x"))?;
    let kernel = graph.new_parameter_node(&[1, 1, 2, 2], Some("k"))?;
    graph.set_node_value(kernel, Some(&Tensor::ones(&[1, 1, 2, 2])))?;
    let conv = graph.new_conv2d_node(input, kernel, stride, padding, Some("conv"))?;
    let data: Vec<f32> = (1..=9).map(|x| x as f32).collect();
    graph.set_node_value(input, Some(&Tensor::new(&data, &[1, 1, 3, 3])))?;
    Ok((graph, input, kernel, conv))
}

#[test]
fn test_conv2d_forward() -> Result<(), GraphError> {
    let (mut graph, _, _, conv) = ones_kernel_graph((1, 1), (0, 0))?;
    assert_eq!(graph.get_node_shape(conv)?, &[1, 1, 2, 2]);
    graph.forward(conv)?;
    let result = graph.get_node_value(conv)?.unwrap();
    assert_eq!(result, &Tensor::new(&[12., 16., 24., 28.], &[1, 1, 2, 2]));
    Ok(())
}

#[test]
fn test_conv2d_forward_with_padding() -> Result<(), GraphError> {
    let (mut graph, _, _, conv) = ones_kernel_graph((1, 1), (1, 1))?;
    assert_eq!(graph.get_node_shape(conv)?, &[1, 1, 4, 4]);
    graph.forward(conv)?;
    let result = graph.get_node_value(conv)?.unwrap();
    // 左上角只覆盖到输入的(0, 0)
    assert_abs_diff_eq!(result[[0, 0, 0, 0]], 1.);
    assert_abs_diff_eq!(result[[0, 0, 1, 1]], 12.);
    assert_abs_diff_eq!(result[[0, 0, 3, 3]], 9.);
    Ok(())
}

#[test]
fn test_conv2d_output_shape_with_stride() -> Result<(), GraphError> {
    let mut graph = GraphInner::new();
    let input = graph.new_input_node(&[1, 3, 8, 6], None)?;
    let kernel = graph.new_parameter_node(&[4, 3, 2, 2], None)?;
    let conv = graph.new_conv2d_node(input, kernel, (2, 2), (0, 0), None)?;
    assert_eq!(graph.get_node_shape(conv)?, &[1, 4, 4, 3]);
    Ok(())
}

#[test]
fn test_conv2d_backward() -> Result<(), GraphError> {
    let (mut graph, input, kernel, conv) = ones_kernel_graph((1, 1), (0, 0))?;
    let loss = graph.new_mean_node(conv, Some("loss"))?;
    graph.forward(loss)?;

    // 每个输入位置被几个窗口覆盖，就得到几份 1/4
    let input_grad = graph.backward_to(loss, input)?;
    assert_abs_diff_eq!(
        input_grad,
        Tensor::new(
            &[0.25, 0.5, 0.25, 0.5, 1.0, 0.5, 0.25, 0.5, 0.25],
            &[1, 1, 3, 3]
        ),
        epsilon = 1e-6
    );
    // 只计算通往 target 的路径，卷积核不在其中
    assert!(graph.get_node_grad(kernel)?.is_none());

    let kernel_grad = graph.backward_to(loss, kernel)?;
    assert_abs_diff_eq!(
        kernel_grad,
        Tensor::new(&[3., 4., 6., 7.], &[1, 1, 2, 2]),
        epsilon = 1e-6
    );
    Ok(())
}

#[test]
fn test_dilated_conv2d() -> Result<(), GraphError> {
    let mut graph = GraphInner::new();
    let input = graph.new_input_node(&[1, 1, 5, 5], Some("x"))?;
    let kernel = graph.new_parameter_node(&[1, 1, 3, 3], Some("k"))?;
    graph.set_node_value(kernel, Some(&Tensor::ones(&[1, 1, 3, 3])))?;
    let conv = graph.new_dilated_conv2d_node(input, kernel, (1, 1), (0, 0), (2, 2), None)?;
    // 等效核尺寸为 2*(3-1)+1 = 5
    assert_eq!(graph.get_node_shape(conv)?, &[1, 1, 1, 1]);

    let loss = graph.new_mean_node(conv, None)?;
    graph.set_node_value(input, Some(&Tensor::ones(&[1, 1, 5, 5])))?;
    graph.forward(loss)?;
    assert_eq!(graph.get_node_value(loss)?.unwrap().number(), Some(9.));

    let grad = graph.backward_to(loss, input)?;
    for y in 0..5 {
        for x in 0..5 {
            let expected = if y % 2 == 0 && x % 2 == 0 { 1. } else { 0. };
            assert_abs_diff_eq!(grad[[0, 0, y, x]], expected);
        }
    }
    Ok(())
}

#[test]
fn test_conv2d_invalid_shapes() -> Result<(), GraphError> {
    let mut graph = GraphInner::new();
    let input = graph.new_input_node(&[1, 2, 4, 4], Some("x"))?;
    let kernel = graph.new_parameter_node(&[1, 3, 2, 2], Some("k"))?;
    assert_err!(
        graph.new_conv2d_node(input, kernel, (1, 1), (0, 0), None),
        GraphError::ShapeMismatch([3], [2], "输入通道数 2 与卷积核输入通道数 3 不匹配")
    );

    let big_kernel = graph.new_parameter_node(&[1, 2, 5, 5], Some("k_big"))?;
    assert_err!(
        graph.new_conv2d_node(input, big_kernel, (1, 1), (0, 0), None),
        GraphError::InvalidOperation(_)
    );

    let flat_input = graph.new_input_node(&[2, 4], Some("flat"))?;
    let flat_kernel = graph.new_parameter_node(&[1, 1, 2, 2], Some("k_flat"))?;
    assert_err!(
        graph.new_conv2d_node(flat_input, flat_kernel, (1, 1), (0, 0), None),
        GraphError::ShapeMismatch { got, .. } if got == &[2, 4]
    );
    Ok(())
}
