use crate::assert_err;
use crate::nn::{GraphError, GraphInner};
use crate::tensor::Tensor;
use approx::assert_abs_diff_eq;

#[test]
fn test_add_and_multiply() -> Result<(), GraphError> {
    let mut graph = GraphInner::new();
    let a = graph.new_input_node(&[1, 1, 1, 2], Some("a"))?;
    let b = graph.new_input_node(&[1, 1, 1, 2], Some("b"))?;
    let sum = graph.new_add_node(a, b, None)?;
    let product = graph.new_multiply_node(sum, b, None)?;
    let loss = graph.new_mean_node(product, None)?;

    graph.set_node_value(a, Some(&Tensor::new(&[1., 2.], &[1, 1, 1, 2])))?;
    graph.set_node_value(b, Some(&Tensor::new(&[3., -1.], &[1, 1, 1, 2])))?;
    graph.forward(loss)?;
    assert_eq!(
        graph.get_node_value(product)?.unwrap(),
        &Tensor::new(&[12., -1.], &[1, 1, 1, 2])
    );

    // loss = mean((a + b) * b)，dloss/db = (a + 2b) / 2
    let grad_b = graph.backward_to(loss, b)?;
    assert_abs_diff_eq!(grad_b, Tensor::new(&[3.5, 0.], &[1, 1, 1, 2]), epsilon = 1e-6);
    let grad_a = graph.backward_to(loss, a)?;
    assert_abs_diff_eq!(grad_a, Tensor::new(&[1.5, -0.5], &[1, 1, 1, 2]), epsilon = 1e-6);
    Ok(())
}

#[test]
fn test_add_same_parent_twice_accumulates() -> Result<(), GraphError> {
    let mut graph = GraphInner::new();
    let x = graph.new_input_node(&[1, 1, 2, 2], Some("x"))?;
    let doubled = graph.new_add_node(x, x, None)?;
    let loss = graph.new_mean_node(doubled, None)?;
    graph.set_node_value(x, Some(&Tensor::ones(&[1, 1, 2, 2])))?;
    graph.forward(loss)?;

    let grad = graph.backward_to(loss, x)?;
    assert_abs_diff_eq!(grad, Tensor::full(0.5, &[1, 1, 2, 2]), epsilon = 1e-6);
    Ok(())
}

#[test]
fn test_add_shape_mismatch() -> Result<(), GraphError> {
    let mut graph = GraphInner::new();
    let a = graph.new_input_node(&[1, 1, 2, 2], Some("a"))?;
    let b = graph.new_input_node(&[1, 1, 2, 3], Some("b"))?;
    assert_err!(
        graph.new_add_node(a, b, None),
        GraphError::ShapeMismatch([1, 1, 2, 2], [1, 1, 2, 3], "Add节点的两个父节点形状必须相同")
    );
    assert_err!(
        graph.new_multiply_node(a, b, None),
        GraphError::ShapeMismatch { .. }
    );
    Ok(())
}

#[test]
fn test_tanh() -> Result<(), GraphError> {
    let mut graph = GraphInner::new();
    let x = graph.new_input_node(&[1, 1, 1, 2], Some("x"))?;
    let y = graph.new_tanh_node(x, None)?;
    let loss = graph.new_mean_node(y, None)?;
    graph.set_node_value(x, Some(&Tensor::new(&[0., 1.], &[1, 1, 1, 2])))?;
    graph.forward(loss)?;

    let value = graph.get_node_value(y)?.unwrap();
    assert_abs_diff_eq!(value[[0, 0, 0, 0]], 0.);
    assert_abs_diff_eq!(value[[0, 0, 0, 1]], 0.7615942, epsilon = 1e-6);

    let grad = graph.backward_to(loss, x)?;
    assert_abs_diff_eq!(grad[[0, 0, 0, 0]], 0.5, epsilon = 1e-6);
    assert_abs_diff_eq!(grad[[0, 0, 0, 1]], 0.5 * (1. - 0.7615942f32.powi(2)), epsilon = 1e-6);
    Ok(())
}

#[test]
fn test_channel_mean() -> Result<(), GraphError> {
    let mut graph = GraphInner::new();
    let x = graph.new_input_node(&[1, 2, 1, 2], Some("x"))?;
    let y = graph.new_channel_mean_node(x, None)?;
    assert_eq!(graph.get_node_shape(y)?, &[1, 1, 1, 2]);

    let loss = graph.new_mean_node(y, None)?;
    graph.set_node_value(x, Some(&Tensor::new(&[1., 3., 5., 7.], &[1, 2, 1, 2])))?;
    graph.forward(loss)?;
    assert_eq!(
        graph.get_node_value(y)?.unwrap(),
        &Tensor::new(&[3., 5.], &[1, 1, 1, 2])
    );

    let grad = graph.backward_to(loss, x)?;
    assert_abs_diff_eq!(grad, Tensor::full(0.25, &[1, 2, 1, 2]), epsilon = 1e-6);
    Ok(())
}
