pub type NodeID = usize;

/// Externally supplied node label. Names are arbitrary integers and need not
/// be dense; the store assigns dense internal indices in insertion order.
pub type NodeName = i64;

pub const INVALID_NODE_ID: NodeID = NodeID::MAX;
