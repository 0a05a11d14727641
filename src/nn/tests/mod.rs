mod node_conv2d;
mod node_elementwise;
mod node_pool2d;
