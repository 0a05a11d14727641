/*
 * @Date         : 2026-01-27
 * @Description  : GraphInner 节点构建方法（new_*_node）
 */

use super::super::error::GraphError;
use super::GraphInner;
use crate::nn::nodes::raw_node::{
    Add, AvgPool2d, ChannelMean, Conv2d, Input, MaxPool2d, Mean, Multiply, NodeType, Parameter,
    Tanh, TraitNode,
};
use crate::nn::nodes::NodeHandle;
use crate::nn::NodeId;
use rand::Rng;

impl GraphInner {
    /// 添加节点到列表
    pub(in crate::nn::graph) fn add_node_to_list(
        &mut self,
        raw_node: NodeType,
        name: Option<&str>,
        parents: &[NodeId],
    ) -> Result<NodeId, GraphError> {
        let node_type = raw_node.type_name().to_lowercase();
        let node_name = self.generate_valid_new_node_name(name.unwrap_or(""), &node_type)?;
        let node_id = self.generate_valid_node_id();

        for &parent_id in parents {
            self.forward_edges.entry(parent_id).or_default().push(node_id);
        }
        self.backward_edges
            .entry(node_id)
            .or_default()
            .extend(parents);

        self.nodes
            .insert(node_id, NodeHandle::new(node_id, &node_name, raw_node));
        Ok(node_id)
    }

    /// 创建输入节点（可接收梯度）
    pub fn new_input_node(&mut self, shape: &[usize], name: Option<&str>) -> Result<NodeId, GraphError> {
        let node = Input::new(shape)?;
        self.add_node_to_list(node.into(), name, &[])
    }

    /// 创建参数节点，初始值服从 N(0, 1/fan_in)：若图有种子则可重复，否则使用 thread_rng
    pub fn new_parameter_node(
        &mut self,
        shape: &[usize],
        name: Option<&str>,
    ) -> Result<NodeId, GraphError> {
        let seed: u64 = match self.rng {
            Some(ref mut rng) => rng.r#gen(),
            None => rand::thread_rng().r#gen(),
        };
        self.new_parameter_node_seeded(shape, name, seed)
    }

    /// 创建带种子的参数节点
    pub fn new_parameter_node_seeded(
        &mut self,
        shape: &[usize],
        name: Option<&str>,
        seed: u64,
    ) -> Result<NodeId, GraphError> {
        let node = Parameter::new(shape)?;
        let value = node.init_value(seed);
        let node_id = self.add_node_to_list(node.into(), name, &[])?;
        self.set_node_value(node_id, Some(&value))?;
        Ok(node_id)
    }

    /// 创建 Conv2d 节点：`input` [n, C_in, H, W]，`kernel` [C_out, C_in, kH, kW]
    pub fn new_conv2d_node(
        &mut self,
        input: NodeId,
        kernel: NodeId,
        stride: (usize, usize),
        padding: (usize, usize),
        name: Option<&str>,
    ) -> Result<NodeId, GraphError> {
        self.new_dilated_conv2d_node(input, kernel, stride, padding, (1, 1), name)
    }

    /// 创建空洞 Conv2d 节点
    pub fn new_dilated_conv2d_node(
        &mut self,
        input: NodeId,
        kernel: NodeId,
        stride: (usize, usize),
        padding: (usize, usize),
        dilation: (usize, usize),
        name: Option<&str>,
    ) -> Result<NodeId, GraphError> {
        let parents = [input, kernel];
        let node = Conv2d::new(&self.get_nodes(&parents)?, stride, padding, dilation)?;
        self.add_node_to_list(node.into(), name, &parents)
    }

    /// 创建 MaxPool2d 节点，`stride` 为 None 时等于 `kernel_size`
    pub fn new_max_pool2d_node(
        &mut self,
        input: NodeId,
        kernel_size: (usize, usize),
        stride: Option<(usize, usize)>,
        name: Option<&str>,
    ) -> Result<NodeId, GraphError> {
        let node = MaxPool2d::new(&self.get_nodes(&[input])?, kernel_size, stride)?;
        self.add_node_to_list(node.into(), name, &[input])
    }

    /// 创建 AvgPool2d 节点，`stride` 为 None 时等于 `kernel_size`
    pub fn new_avg_pool2d_node(
        &mut self,
        input: NodeId,
        kernel_size: (usize, usize),
        stride: Option<(usize, usize)>,
        name: Option<&str>,
    ) -> Result<NodeId, GraphError> {
        let node = AvgPool2d::new(&self.get_nodes(&[input])?, kernel_size, stride)?;
        self.add_node_to_list(node.into(), name, &[input])
    }

    pub fn new_add_node(
        &mut self,
        left: NodeId,
        right: NodeId,
        name: Option<&str>,
    ) -> Result<NodeId, GraphError> {
        let parents = [left, right];
        let node = Add::new(&self.get_nodes(&parents)?)?;
        self.add_node_to_list(node.into(), name, &parents)
    }

    pub fn new_multiply_node(
        &mut self,
        left: NodeId,
        right: NodeId,
        name: Option<&str>,
    ) -> Result<NodeId, GraphError> {
        let parents = [left, right];
        let node = Multiply::new(&self.get_nodes(&parents)?)?;
        self.add_node_to_list(node.into(), name, &parents)
    }

    pub fn new_tanh_node(&mut self, input: NodeId, name: Option<&str>) -> Result<NodeId, GraphError> {
        let node = Tanh::new(&self.get_nodes(&[input])?)?;
        self.add_node_to_list(node.into(), name, &[input])
    }

    /// 创建通道平均节点：[n, C, H, W] -> [n, 1, H, W]
    pub fn new_channel_mean_node(
        &mut self,
        input: NodeId,
        name: Option<&str>,
    ) -> Result<NodeId, GraphError> {
        let node = ChannelMean::new(&self.get_nodes(&[input])?)?;
        self.add_node_to_list(node.into(), name, &[input])
    }

    /// 创建全局平均节点，输出标量 [1, 1]
    pub fn new_mean_node(&mut self, input: NodeId, name: Option<&str>) -> Result<NodeId, GraphError> {
        let node = Mean::new(&self.get_nodes(&[input])?)?;
        self.add_node_to_list(node.into(), name, &[input])
    }
}
