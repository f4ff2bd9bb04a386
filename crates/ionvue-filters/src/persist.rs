//! Filter-tree XML persistence.
//!
//! Topology is expressed by element nesting: each node's element (named
//! by its canonical type string) carries its parameter elements plus one
//! nested element per child filter. Parameter names never collide with
//! filter type strings, so readers separate the two by name. Unknown
//! elements and attributes are skipped for forward compatibility.

use crate::filter::create_filter;
use crate::tree::{FilterTree, NodeId, TreeError};
use crate::xml::XmlElem;
use thiserror::Error;
use tracing::warn;

#[derive(Error, Debug)]
pub enum PersistError {
    #[error("Unknown filter element: {0}")]
    UnknownFilter(String),

    #[error("Filter element {0} could not be read")]
    BadFilterState(String),

    #[error(transparent)]
    Tree(#[from] TreeError),
}

/// Serialise a whole tree under a `<filtertree>` element.
pub fn tree_to_xml(tree: &FilterTree) -> XmlElem {
    let mut root = XmlElem::new("filtertree");
    for &node in tree.roots() {
        root.children.push(node_to_xml(tree, node));
    }
    root
}

fn node_to_xml(tree: &FilterTree, id: NodeId) -> XmlElem {
    let mut elem = tree
        .filter(id)
        .expect("enumerated id")
        .write_state();
    for &child in tree.children(id) {
        elem.children.push(node_to_xml(tree, child));
    }
    elem
}

/// Rebuild a tree from its `<filtertree>` element. Elements that are not
/// recognised filters are skipped with a warning rather than failing the
/// whole document.
pub fn tree_from_xml(elem: &XmlElem) -> Result<FilterTree, PersistError> {
    let mut tree = FilterTree::new();
    for child in &elem.children {
        read_node(&mut tree, child, None)?;
    }
    Ok(tree)
}

fn read_node(
    tree: &mut FilterTree,
    elem: &XmlElem,
    parent: Option<NodeId>,
) -> Result<(), PersistError> {
    let Some(mut filter) = create_filter(&elem.name) else {
        warn!(element = %elem.name, "skipping unknown filter element");
        return Ok(());
    };
    filter
        .read_state(elem)
        .ok_or_else(|| PersistError::BadFilterState(elem.name.clone()))?;
    let id = tree.add_filter(filter, parent)?;

    for child in &elem.children {
        // Nested filter elements are children; everything else is this
        // node's own parameters.
        if crate::filter::FilterType::from_type_string(&child.name).is_some() {
            read_node(tree, child, Some(id))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::{BoundingBoxFilter, ClipFilter, DataLoadFilter};

    fn sample_tree() -> FilterTree {
        let mut tree = FilterTree::new();
        let mut load = DataLoadFilter::default();
        load.set_sampling(false, 0);
        let load_id = tree.add_filter(Box::new(load), None).unwrap();
        tree.set_user_string(load_id, "my dataset").unwrap();
        let clip = tree
            .add_filter(Box::new(ClipFilter::default()), Some(load_id))
            .unwrap();
        tree.add_filter(Box::new(BoundingBoxFilter::default()), Some(clip))
            .unwrap();
        tree.add_filter(Box::new(BoundingBoxFilter::default()), Some(load_id))
            .unwrap();
        tree
    }

    #[test]
    fn test_tree_round_trip_topology_and_labels() {
        let tree = sample_tree();
        let doc = tree_to_xml(&tree).to_document().unwrap();
        let reread = tree_from_xml(&XmlElem::parse_document(&doc).unwrap()).unwrap();

        assert_eq!(reread.len(), tree.len());
        assert_eq!(reread.roots().len(), 1);
        let root = reread.roots()[0];
        assert_eq!(reread.filter(root).unwrap().user_string(), "my dataset");
        assert_eq!(reread.children(root).len(), 2);
        // Properties survive the trip.
        let orig_props = tree.filter(tree.roots()[0]).unwrap().properties();
        let new_props = reread.filter(root).unwrap().properties();
        assert_eq!(orig_props, new_props);
    }

    #[test]
    fn test_unknown_elements_skipped() {
        let doc = r#"<filtertree><futurefilter value="1"/><boundbox/></filtertree>"#;
        let tree = tree_from_xml(&XmlElem::parse_document(doc).unwrap()).unwrap();
        assert_eq!(tree.len(), 1);
    }
}
