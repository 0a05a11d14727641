/*
 * @Date         : 2026-01-27
 * @Description  : GraphInner VJP 反向传播
 */

use super::super::error::GraphError;
use super::GraphInner;
use crate::nn::nodes::raw_node::TraitNode;
use crate::nn::NodeId;
use crate::tensor::Tensor;
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};

impl GraphInner {
    // ========== VJP 反向传播核心 ==========

    /// 反向传播：计算标量损失 `loss` 对节点 `target` 的梯度（target 可以是输入节点）
    ///
    /// 只会访问位于 target 与 loss 之间路径上的节点，与 target 无关的分支（如其它参数）不参与计算。
    /// 调用前须先对 `loss` 执行 forward。结果同时写入各相关节点的梯度，可用 `get_node_grad` 查看。
    /// 若 loss 不依赖 target，返回与 target 同形的全零梯度。
    pub fn backward_to(&mut self, loss: NodeId, target: NodeId) -> Result<Tensor, GraphError> {
        let loss_node = self.get_node(loss)?;
        let loss_value = loss_node.value().ok_or_else(|| {
            GraphError::ComputationError(format!("损失{loss_node}没有值，请先执行 forward"))
        })?;
        if loss_value.size() != 1 {
            return Err(GraphError::InvalidOperation(format!(
                "反向传播要求损失为标量 [1, 1]，但得到 {:?}",
                loss_value.shape()
            )));
        }
        let loss_grad = Tensor::ones(loss_value.shape());
        let target_shape = self.get_node(target)?.value_expected_shape().to_vec();

        self.clear_grad();

        let on_path = self.descendants_of(target);
        let topo_order = self.topological_sort_backward(loss)?;

        let mut grads: HashMap<NodeId, Tensor> = HashMap::new();
        if on_path.contains(&loss) {
            grads.insert(loss, loss_grad);
        }

        for node_id in topo_order {
            if node_id == target {
                continue;
            }
            let Some(upstream_grad) = grads.get(&node_id) else {
                continue;
            };

            let node = self.get_node(node_id)?;
            let parents_ids = self.get_node_parents(node_id)?;
            let parent_values = self.get_parent_values(node, &parents_ids)?;

            let mut parent_grads = Vec::with_capacity(parents_ids.len());
            for (index, parent_id) in parents_ids.iter().enumerate() {
                if !on_path.contains(parent_id) {
                    continue;
                }
                let parent_grad =
                    node.raw_node()
                        .calc_grad_to_parent(index, &parent_values, upstream_grad)?;
                parent_grads.push((*parent_id, parent_grad));
            }

            // 同一父节点可能从多个子节点收到梯度，累加
            for (parent_id, parent_grad) in parent_grads {
                match grads.entry(parent_id) {
                    Entry::Occupied(mut existing) => *existing.get_mut() += &parent_grad,
                    Entry::Vacant(slot) => {
                        slot.insert(parent_grad);
                    }
                }
            }
        }

        let target_grad = grads
            .get(&target)
            .cloned()
            .unwrap_or_else(|| Tensor::zeros(&target_shape));
        for (node_id, grad) in grads {
            self.get_node_mut(node_id)?.set_grad(Some(grad));
        }
        Ok(target_grad)
    }

    /// 拓扑排序（反向）：子节点总是排在其所有父节点之前，起点为 `loss`
    fn topological_sort_backward(&self, loss_id: NodeId) -> Result<Vec<NodeId>, GraphError> {
        let mut post_order = Vec::new();
        let mut visited = HashSet::new();

        fn dfs(
            graph: &GraphInner,
            node_id: NodeId,
            visited: &mut HashSet<NodeId>,
            post_order: &mut Vec<NodeId>,
        ) -> Result<(), GraphError> {
            if !visited.insert(node_id) {
                return Ok(());
            }
            for parent_id in graph.get_node_parents(node_id)? {
                dfs(graph, parent_id, visited, post_order)?;
            }
            post_order.push(node_id);
            Ok(())
        }

        dfs(self, loss_id, &mut visited, &mut post_order)?;
        post_order.reverse();
        Ok(post_order)
    }

    /// `node_id` 自身及其所有下游节点
    fn descendants_of(&self, node_id: NodeId) -> HashSet<NodeId> {
        let mut result = HashSet::from([node_id]);
        let mut stack = vec![node_id];
        while let Some(current) = stack.pop() {
            for child in self.forward_edges.get(&current).into_iter().flatten() {
                if result.insert(*child) {
                    stack.push(*child);
                }
            }
        }
        result
    }

    /// 清除所有节点的梯度
    pub fn clear_grad(&mut self) {
        for node in self.nodes.values_mut() {
            node.set_grad(None);
        }
    }
}
