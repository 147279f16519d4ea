/*!
Drainage topology: which node each unit drains into, which conduit leaves that
node, and how wide that conduit is.

The conduit network is a directed graph with one edge per conduit row, from its
inlet node to its outlet node. When a node has several outgoing conduits only
the first one listed in the definition file is followed.
*/
use indexmap::IndexMap;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use tracing::debug;

use crate::section::{SectionTable, numeric_field};

// Conduit network; node weights are node keys, edge weights conduit keys
pub struct Topology {
    graph: DiGraph<String, String>,
    index: IndexMap<String, NodeIndex>,
}

impl Topology {
    pub fn from_conduits(conduits: &SectionTable) -> Self {
        let mut topology = Topology {
            graph: DiGraph::new(),
            index: IndexMap::new(),
        };
        for (conduit, fields) in conduits {
            if let [_, from, to, ..] = fields.as_slice() {
                let a = topology.node(from);
                let b = topology.node(to);
                topology.graph.add_edge(a, b, conduit.clone());
            }
        }
        topology
    }

    fn node(&mut self, key: &str) -> NodeIndex {
        if let Some(&idx) = self.index.get(key) {
            return idx;
        }
        let idx = self.graph.add_node(key.to_string());
        self.index.insert(key.to_string(), idx);
        idx
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn conduit_count(&self) -> usize {
        self.graph.edge_count()
    }

    // (conduit, downstream node) pairs leaving `node`, in file order; empty for
    // outfalls and unknown nodes
    pub fn outgoing(&self, node: &str) -> Vec<(&str, &str)> {
        let Some(&idx) = self.index.get(node) else {
            return Vec::new();
        };
        let mut edges: Vec<_> = self.graph.edges(idx).collect();
        edges.sort_by_key(|e| e.id());
        edges
            .into_iter()
            .map(|e| (e.weight().as_str(), self.graph[e.target()].as_str()))
            .collect()
    }
}

// Unit -> outlet -> conduit -> diameter mappings, in unit-table order
#[derive(Debug, Default)]
pub struct Resolution {
    pub unit_outlet: IndexMap<String, String>,
    pub outlet_units: IndexMap<String, Vec<String>>,
    pub node_conduit: IndexMap<String, String>,
    pub conduit_diameter: IndexMap<String, Option<f64>>,
    pub unit_conduit: IndexMap<String, String>,
    pub unit_diameter: IndexMap<String, f64>,
}

impl Resolution {
    pub fn outlet(&self, unit: &str) -> Option<&str> {
        self.unit_outlet.get(unit).map(String::as_str)
    }

    pub fn diameter(&self, unit: &str) -> Option<f64> {
        self.unit_diameter.get(unit).copied()
    }

    pub fn is_outlet(&self, node: &str) -> bool {
        self.outlet_units.contains_key(node)
    }
}

/**
Resolves every unit down to the diameter of the conduit below its outlet.

# Arguments
* `subcatchments` - unit rows; the outlet node is the third field.
* `conduits` - conduit rows; inlet and outlet nodes are fields two and three.
* `xsections` - cross-section rows; the diameter is the third field.

A missing link anywhere in the chain leaves the later mappings of that unit
unset; nothing here fails.
*/
pub fn resolve(
    subcatchments: &SectionTable,
    conduits: &SectionTable,
    xsections: &SectionTable,
) -> Resolution {
    let mut res = Resolution::default();

    for (unit, fields) in subcatchments {
        if let Some(outlet) = fields.get(2) {
            res.unit_outlet.insert(unit.clone(), outlet.clone());
            res.outlet_units
                .entry(outlet.clone())
                .or_default()
                .push(unit.clone());
        }
    }

    let topology = Topology::from_conduits(conduits);
    debug!(
        nodes = topology.node_count(),
        conduits = topology.conduit_count(),
        "conduit graph built"
    );
    for node in topology.index.keys() {
        let outgoing = topology.outgoing(node);
        let Some(&(conduit, _)) = outgoing.first() else {
            continue;
        };
        if outgoing.len() > 1 {
            debug!(
                node = %node,
                kept = conduit,
                others = outgoing.len() - 1,
                "several outgoing conduits"
            );
        }
        res.node_conduit.insert(node.clone(), conduit.to_string());
    }

    for (conduit, fields) in xsections {
        if fields.len() >= 3 {
            res.conduit_diameter
                .insert(conduit.clone(), numeric_field(fields, 2));
        }
    }

    for (unit, outlet) in &res.unit_outlet {
        let Some(conduit) = res.node_conduit.get(outlet) else {
            continue;
        };
        res.unit_conduit.insert(unit.clone(), conduit.clone());
        if let Some(Some(diameter)) = res.conduit_diameter.get(conduit) {
            res.unit_diameter.insert(unit.clone(), *diameter);
        }
    }

    res
}
