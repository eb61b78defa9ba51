use bitvec::vec::BitVec;
use num::{Bounded, Signed, Zero};
use std::fmt::{Debug, Display};
use std::ops::{AddAssign, SubAssign};
use thiserror::Error;

use crate::graph::NodeName;

/// Capability set required of a flow type: add, subtract, compare, absolute
/// value, zero and max-value constants. Satisfied by fixed-width signed
/// integers and IEEE floats alike.
pub trait FlowValue:
    Copy + PartialOrd + Zero + Bounded + Signed + AddAssign + SubAssign + Debug + Display
{
}

impl<T> FlowValue for T where
    T: Copy + PartialOrd + Zero + Bounded + Signed + AddAssign + SubAssign + Debug + Display
{
}

/// `a` equals `b` up to the absolute tolerance.
#[inline]
pub fn is_close<T: FlowValue>(a: T, b: T, tol: T) -> bool {
    (a - b).abs() < tol
}

/// `x` is strictly positive beyond the tolerance. With `tol = 0` this is the
/// exact integer test `x > 0`.
#[inline]
pub fn is_positive<T: FlowValue>(x: T, tol: T) -> bool {
    x > tol
}

#[derive(Debug, Error, PartialEq)]
pub enum FlowError {
    #[error("malformed edge input: {0}")]
    MalformedInput(String),
    #[error("negative capacity on edge ({edge_source}, {target})")]
    NegativeCapacity {
        edge_source: NodeName,
        target: NodeName,
    },
    #[error("node {0} is not part of the graph")]
    UnknownNode(NodeName),
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("max flow was not computed")]
    FlowNotComputed,
}

pub trait MaxFlow<T: FlowValue> {
    /// Runs the flow computation and returns the max-flow value.
    fn run(&mut self) -> Result<T, FlowError>;

    /// The flow value of the last completed run.
    fn max_flow(&self) -> Result<T, FlowError>;

    /// Bit mask over internal node indices marking the nodes that can reach
    /// the sink in the residual graph of the last completed run.
    fn sink_partition(&self) -> Result<BitVec, FlowError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_tolerance_is_exact() {
        assert!(!is_close(0, 0, 0));
        assert!(is_positive(1, 0));
        assert!(!is_positive(0, 0));
    }

    #[test]
    fn float_tolerance() {
        assert!(is_close(0.5 - 0.25 - 0.25, 0., 1e-9));
        assert!(is_positive(1e-3, 1e-9));
        assert!(!is_positive(1e-12, 1e-9));
    }
}
