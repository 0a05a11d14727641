use crate::assert_err;
use crate::nn::{GraphError, GraphInner};
use crate::tensor::Tensor;
use approx::assert_abs_diff_eq;

fn arange_4x4() -> Tensor {
    let data: Vec<f32> = (0..16).map(|x| x as f32).collect();
    Tensor::new(&data, &[1, 1, 4, 4])
}

#[test]
fn test_max_pool2d_forward_and_backward() -> Result<(), GraphError> {
    let mut graph = GraphInner::new();
    let input = graph.new_input_node(&[1, 1, 4, 4], Some("x"))?;
    let pool = graph.new_max_pool2d_node(input, (2, 2), None, Some("pool"))?;
    let loss = graph.new_mean_node(pool, None)?;
    graph.set_node_value(input, Some(&arange_4x4()))?;
    graph.forward(loss)?;

    assert_eq!(
        graph.get_node_value(pool)?.unwrap(),
        &Tensor::new(&[5., 7., 13., 15.], &[1, 1, 2, 2])
    );

    let grad = graph.backward_to(loss, input)?;
    let mut expected = Tensor::zeros(&[1, 1, 4, 4]);
    for (y, x) in [(1, 1), (1, 3), (3, 1), (3, 3)] {
        expected[[0, 0, y, x]] = 0.25;
    }
    assert_abs_diff_eq!(grad, expected, epsilon = 1e-6);
    Ok(())
}

#[test]
fn test_max_pool2d_ties_route_to_first() -> Result<(), GraphError> {
    let mut graph = GraphInner::new();
    let input = graph.new_input_node(&[1, 1, 2, 2], Some("x"))?;
    let pool = graph.new_max_pool2d_node(input, (2, 2), None, None)?;
    let loss = graph.new_mean_node(pool, None)?;
    graph.set_node_value(input, Some(&Tensor::ones(&[1, 1, 2, 2])))?;
    graph.forward(loss)?;

    let grad = graph.backward_to(loss, input)?;
    assert_eq!(grad, Tensor::new(&[1., 0., 0., 0.], &[1, 1, 2, 2]));
    Ok(())
}

#[test]
fn test_avg_pool2d_forward_and_backward() -> Result<(), GraphError> {
    let mut graph = GraphInner::new();
    let input = graph.new_input_node(&[1, 1, 4, 4], Some("x"))?;
    let pool = graph.new_avg_pool2d_node(input, (2, 2), None, Some("pool"))?;
    let loss = graph.new_mean_node(pool, None)?;
    graph.set_node_value(input, Some(&arange_4x4()))?;
    graph.forward(loss)?;

    assert_abs_diff_eq!(
        graph.get_node_value(pool)?.unwrap(),
        &Tensor::new(&[2.5, 4.5, 10.5, 12.5], &[1, 1, 2, 2]),
        epsilon = 1e-6
    );
    let grad = graph.backward_to(loss, input)?;
    assert_abs_diff_eq!(grad, Tensor::full(1. / 16., &[1, 1, 4, 4]), epsilon = 1e-6);
    Ok(())
}

#[test]
fn test_overlapping_avg_pool2d() -> Result<(), GraphError> {
    let mut graph = GraphInner::new();
    let input = graph.new_input_node(&[1, 2, 3, 3], Some("x"))?;
    let pool = graph.new_avg_pool2d_node(input, (2, 2), Some((1, 1)), None)?;
    assert_eq!(graph.get_node_shape(pool)?, &[1, 2, 2, 2]);

    let loss = graph.new_mean_node(pool, None)?;
    graph.set_node_value(input, Some(&Tensor::ones(&[1, 2, 3, 3])))?;
    graph.forward(loss)?;
    let grad = graph.backward_to(loss, input)?;
    // 中心位置被4个窗口覆盖，角落只被1个覆盖
    assert_abs_diff_eq!(grad[[0, 1, 1, 1]], 4. * grad[[0, 1, 0, 0]], epsilon = 1e-6);
    Ok(())
}

#[test]
fn test_pool2d_invalid_window() -> Result<(), GraphError> {
    let mut graph = GraphInner::new();
    let input = graph.new_input_node(&[1, 1, 3, 3], Some("x"))?;
    assert_err!(
        graph.new_max_pool2d_node(input, (4, 4), None, None),
        GraphError::InvalidOperation("MaxPool2d 池化窗口 4x4 超出输入尺寸 3x3")
    );
    assert_err!(
        graph.new_avg_pool2d_node(input, (2, 2), Some((0, 1)), None),
        GraphError::InvalidOperation(_)
    );
    Ok(())
}
