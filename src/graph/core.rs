use super::id::NodeId;
use crate::visitor::Archivable;
use crate::{GraphCodeError, Result};

/// The container for an archivable object graph.
///
/// Acts as an arena allocator for nodes. A node's identity is its slot index;
/// edges between nodes are stored by the nodes themselves as [`NodeId`] fields.
///
/// During decoding a slot is reserved before the node's fields are read, so a
/// node that refers back to itself can resolve that reference while it is
/// still being built. A graph handed out by a finished session never contains
/// empty slots.
#[derive(Debug, Default)]
pub struct ObjectGraph {
    nodes: Vec<Option<Box<dyn Archivable>>>,
}

impl ObjectGraph {
    /// Creates a new, empty `ObjectGraph`.
    pub fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    /// Adds a node to the graph and returns its identity.
    pub fn add<T: Archivable>(&mut self, node: T) -> NodeId {
        self.add_boxed(Box::new(node))
    }

    /// Adds an already boxed node to the graph.
    pub fn add_boxed(&mut self, node: Box<dyn Archivable>) -> NodeId {
        let id = self.next_id();
        self.nodes.push(Some(node));
        id
    }

    /// Reserves an empty slot whose node will be supplied later with [`fill`].
    ///
    /// [`fill`]: ObjectGraph::fill
    pub(crate) fn reserve(&mut self) -> NodeId {
        let id = self.next_id();
        self.nodes.push(None);
        id
    }

    /// Places a node into a slot obtained from [`reserve`].
    ///
    /// [`reserve`]: ObjectGraph::reserve
    pub(crate) fn fill(&mut self, id: NodeId, node: Box<dyn Archivable>) -> Result<()> {
        let slot = self
            .nodes
            .get_mut(id.index())
            .ok_or_else(|| GraphCodeError::Internal(format!("Node {id} out of bounds")))?;
        if slot.is_some() {
            return Err(GraphCodeError::Internal(format!(
                "Node {id} was filled twice"
            )));
        }
        *slot = Some(node);
        Ok(())
    }

    /// Returns true if every slot holds a node.
    pub(crate) fn is_complete(&self) -> bool {
        self.nodes.iter().all(Option::is_some)
    }

    /// Retrieves a node by its id.
    pub fn get(&self, id: NodeId) -> Option<&dyn Archivable> {
        self.nodes.get(id.index()).and_then(|slot| slot.as_deref())
    }

    /// Retrieves a node by its id, downcast to its concrete type.
    pub fn get_as<T: Archivable>(&self, id: NodeId) -> Option<&T> {
        self.get(id).and_then(|node| node.as_any().downcast_ref::<T>())
    }

    /// Mutable access to a node, downcast to its concrete type.
    ///
    /// Useful to close a cycle after both ends have been added.
    pub fn get_mut_as<T: Archivable>(&mut self, id: NodeId) -> Option<&mut T> {
        self.nodes
            .get_mut(id.index())
            .and_then(|slot| slot.as_deref_mut())
            .and_then(|node| node.as_any_mut().downcast_mut::<T>())
    }

    /// Returns true if `id` names a slot of this graph.
    pub fn contains(&self, id: NodeId) -> bool {
        id.index() < self.nodes.len()
    }

    /// Returns true if the graph has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Returns the number of nodes in the graph.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Iterates over all node ids in insertion order.
    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.nodes.len()).map(|i| NodeId::new(u32::try_from(i).unwrap_or(u32::MAX)))
    }

    fn next_id(&self) -> NodeId {
        NodeId::new(u32::try_from(self.nodes.len()).unwrap_or(u32::MAX))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archiver::Archiver;
    use crate::visitor::Tracer;
    use std::any::Any;

    #[derive(Debug, PartialEq)]
    struct Leaf(u8);

    impl Archivable for Leaf {
        fn class_name(&self) -> &'static str {
            "Leaf"
        }
        fn visit(&self, _tracer: &mut Tracer<'_>) {}
        fn encode(&self, archiver: &mut Archiver<'_>) -> Result<()> {
            archiver.write_u8(self.0, true);
            Ok(())
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    #[test]
    fn ids_follow_insertion_order() {
        let mut graph = ObjectGraph::new();
        let a = graph.add(Leaf(1));
        let b = graph.add(Leaf(2));
        assert_eq!(a.as_u32(), 0);
        assert_eq!(b.as_u32(), 1);
        assert_eq!(graph.get_as::<Leaf>(b), Some(&Leaf(2)));
        assert_eq!(graph.ids().collect::<Vec<_>>(), vec![a, b]);
    }

    #[test]
    fn reserved_slot_is_empty_until_filled() -> Result<()> {
        let mut graph = ObjectGraph::new();
        let id = graph.reserve();
        assert!(graph.get(id).is_none());
        assert!(!graph.is_complete());

        graph.fill(id, Box::new(Leaf(9)))?;
        assert!(graph.is_complete());
        assert!(graph.fill(id, Box::new(Leaf(9))).is_err());
        Ok(())
    }

    #[test]
    fn get_mut_as_allows_rewiring() {
        let mut graph = ObjectGraph::new();
        let id = graph.add(Leaf(1));
        if let Some(leaf) = graph.get_mut_as::<Leaf>(id) {
            leaf.0 = 5;
        }
        assert_eq!(graph.get_as::<Leaf>(id), Some(&Leaf(5)));
    }
}
