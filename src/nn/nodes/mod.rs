mod node_handle;
pub(crate) mod raw_node;

pub(crate) use node_handle::NodeHandle;
pub use node_handle::NodeId;
