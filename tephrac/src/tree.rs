//! The host-owned tree and its accessor surface.
//!
//! The front-end lives in a dynamically-typed host runtime, so the trees it
//! produces are dynamically shaped: every node is a bag of named fields plus
//! an ordered element list. This module stores those nodes in an arena and
//! addresses them by stable [`NodeId`] identity, which is also the key used
//! by every derived-artifact side table in the backend.
//!
//! Field access comes in two flavors, and the distinction is part of the
//! producer contract:
//!
//! - required accessors ([`Tree::str_field`], [`Tree::node_field`], ...) - a
//!   missing or mistyped field is a malformed-tree error naming the node and
//!   field, and aborts the current compilation;
//! - optional lookup ([`Tree::field`]) - never presumes presence, used for
//!   polymorphic fields (`type` on a builtin descriptor is a tag string, on a
//!   pointer descriptor a node reference).
//!
//! Writes exist too: the backend publishes the compiled entry pointer back
//! onto the definition record with [`Tree::set_field`], because that record
//! is where the host picks it up.

use std::collections::HashMap;
use std::fmt;

use crate::error::CompileError;

/// Stable identity of a tree node: an index into the owning [`Tree`] arena.
///
/// All caching in the backend is keyed by this identity, so two structurally
/// equal nodes are still two distinct nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    pub fn new(index: usize) -> Self {
        NodeId(index as u32)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// A dynamically typed field payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// A host number. Hosts of this kind do not always distinguish integers
    /// from floats, so integral `Num`s are accepted where an integer is
    /// expected.
    Num(f64),
    /// A 64-bit integer.
    Int(i64),
    /// A boolean.
    Bool(bool),
    /// A string.
    Str(String),
    /// A reference to another node in the same tree.
    Node(NodeId),
    /// An opaque native handle (the published entry pointer uses this).
    Handle(usize),
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Num(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<NodeId> for Value {
    fn from(v: NodeId) -> Self {
        Value::Node(v)
    }
}

#[derive(Debug, Default, Clone)]
struct Node {
    fields: HashMap<String, Value>,
    elems: Vec<Value>,
}

/// Arena of host tree nodes plus the per-request anchor table.
#[derive(Debug, Default)]
pub struct Tree {
    nodes: Vec<Node>,
    anchors: AnchorTable,
}

impl Tree {
    pub fn new() -> Self {
        Tree::default()
    }

    /// Allocate a fresh, empty node and return its identity.
    pub fn add_node(&mut self) -> NodeId {
        let id = NodeId::new(self.nodes.len());
        self.nodes.push(Node::default());
        id
    }

    /// Number of ordered elements held by `id`.
    pub fn size(&self, id: NodeId) -> usize {
        self.nodes[id.index()].elems.len()
    }

    /// Indexed element access.
    pub fn elem(&self, id: NodeId, index: usize) -> Option<&Value> {
        self.nodes[id.index()].elems.get(index)
    }

    /// All ordered elements of `id`, in sequence order.
    pub fn elems(&self, id: NodeId) -> &[Value] {
        &self.nodes[id.index()].elems
    }

    /// Append an element to `id`'s ordered list.
    pub fn push(&mut self, id: NodeId, value: impl Into<Value>) {
        self.nodes[id.index()].elems.push(value.into());
    }

    /// Optional field lookup. Never presumes the field exists.
    pub fn field(&self, id: NodeId, name: &str) -> Option<&Value> {
        self.nodes[id.index()].fields.get(name)
    }

    /// Write a field on a live node.
    ///
    /// This mutates the shared tree; it is how the backend publishes derived
    /// artifacts (notably `fptr`) back to the host.
    pub fn set_field(&mut self, id: NodeId, name: impl Into<String>, value: impl Into<Value>) {
        self.nodes[id.index()]
            .fields
            .insert(name.into(), value.into());
    }

    fn require(&self, id: NodeId, field: &'static str) -> Result<&Value, CompileError> {
        self.field(id, field)
            .ok_or(CompileError::MissingField { node: id, field })
    }

    /// Required string field.
    pub fn str_field(&self, id: NodeId, field: &'static str) -> Result<&str, CompileError> {
        match self.require(id, field)? {
            Value::Str(s) => Ok(s),
            _ => Err(CompileError::FieldKind {
                node: id,
                field,
                expected: "a string",
            }),
        }
    }

    /// Required number field.
    pub fn num_field(&self, id: NodeId, field: &'static str) -> Result<f64, CompileError> {
        match self.require(id, field)? {
            Value::Num(v) => Ok(*v),
            Value::Int(v) => Ok(*v as f64),
            _ => Err(CompileError::FieldKind {
                node: id,
                field,
                expected: "a number",
            }),
        }
    }

    /// Required integer field. Integral `Num`s are accepted; the host does
    /// not reliably distinguish the two.
    pub fn int_field(&self, id: NodeId, field: &'static str) -> Result<i64, CompileError> {
        match self.require(id, field)? {
            Value::Int(v) => Ok(*v),
            Value::Num(v) if v.fract() == 0.0 => Ok(*v as i64),
            _ => Err(CompileError::FieldKind {
                node: id,
                field,
                expected: "an integer",
            }),
        }
    }

    /// Required boolean field. Integer 0/1 is accepted for the same reason
    /// integral `Num`s are accepted by [`Tree::int_field`].
    pub fn bool_field(&self, id: NodeId, field: &'static str) -> Result<bool, CompileError> {
        match self.require(id, field)? {
            Value::Bool(v) => Ok(*v),
            Value::Int(v) => Ok(*v != 0),
            _ => Err(CompileError::FieldKind {
                node: id,
                field,
                expected: "a boolean",
            }),
        }
    }

    /// Required node-reference field.
    pub fn node_field(&self, id: NodeId, field: &'static str) -> Result<NodeId, CompileError> {
        match self.require(id, field)? {
            Value::Node(n) => Ok(*n),
            _ => Err(CompileError::FieldKind {
                node: id,
                field,
                expected: "a node reference",
            }),
        }
    }

    /// Required opaque-handle field.
    pub fn handle_field(&self, id: NodeId, field: &'static str) -> Result<usize, CompileError> {
        match self.require(id, field)? {
            Value::Handle(h) => Ok(*h),
            _ => Err(CompileError::FieldKind {
                node: id,
                field,
                expected: "a native handle",
            }),
        }
    }

    /// Indexed element access that must yield a node reference.
    pub fn node_elem(&self, id: NodeId, index: usize) -> Result<NodeId, CompileError> {
        match self.elem(id, index) {
            Some(Value::Node(n)) => Ok(*n),
            _ => Err(CompileError::ElementKind { node: id, index }),
        }
    }

    pub fn anchors(&self) -> &AnchorTable {
        &self.anchors
    }

    pub fn anchors_mut(&mut self) -> &mut AnchorTable {
        &mut self.anchors
    }
}

/// Per-request rooting structure.
///
/// The host garbage-collects nodes by reachability; anchoring a node here
/// keeps it (and everything reachable from it) live for the duration of a
/// compilation request. Every live anchor occupies exactly one slot, and
/// slots are released in LIFO order when the owning scope ends. The compile
/// driver checks that occupancy returns to its pre-call size on every exit
/// path; a leak is a defect in the backend, not a recoverable condition.
#[derive(Debug, Default)]
pub struct AnchorTable {
    slots: Vec<NodeId>,
}

/// An occupied anchor slot. Must be handed back to [`AnchorTable::release`].
#[derive(Debug)]
#[must_use = "an unreleased anchor slot leaks host bookkeeping"]
pub struct AnchorSlot {
    index: usize,
}

impl AnchorTable {
    /// Number of occupied slots.
    pub fn occupancy(&self) -> usize {
        self.slots.len()
    }

    /// Root `node` for the current request.
    pub fn anchor(&mut self, node: NodeId) -> AnchorSlot {
        self.slots.push(node);
        AnchorSlot {
            index: self.slots.len() - 1,
        }
    }

    /// Release a slot. Panics if released out of LIFO order; that is a
    /// structural defect in the caller, never an input condition.
    pub fn release(&mut self, slot: AnchorSlot) {
        assert_eq!(
            slot.index + 1,
            self.slots.len(),
            "anchor slots must be released in LIFO order"
        );
        self.slots.pop();
    }

    pub fn is_anchored(&self, node: NodeId) -> bool {
        self.slots.contains(&node)
    }
}
