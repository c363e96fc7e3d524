//! Physical nets and net-name canonicalization.
//!
//! A [`NetList`] records, per net name, every copper point the board emitted
//! for it. Subcircuits name their nets locally, so when an instance is wired
//! into its parent the local name is declared an alias of the parent's name.
//! Aliases are kept in a union-find: every name in an electrically connected
//! set resolves to one *true* name, the terminal target of its alias chain.

use std::collections::HashMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::AliasCycleError;
use crate::geometry::Point;
use crate::units::Length;

/// How a net point came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointMode {
    Pad,
    Via,
    TraceEndpoint,
    Pour,
}

impl Default for PointMode {
    fn default() -> Self {
        PointMode::Pad
    }
}

/// Drilled copper: pad/via diameter and the hole through it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Aperture {
    pub diameter: Length,
    pub drill: Length,
}

impl Aperture {
    pub fn new(diameter: Length, drill: Length) -> Self {
        Self { diameter, drill }
    }

    /// Width of the copper ring left around the hole, in millimetres.
    pub fn ring_width_mm(&self) -> f64 {
        (self.diameter - self.drill).to_mm() / 2.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetPoint {
    pub layer: String,
    pub coordinate: Point,
    pub mode: PointMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aperture: Option<Aperture>,
}

/// A named physical connection; points may span several copper layers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Net {
    name: String,
    points: Vec<NetPoint>,
}

impl Net {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            points: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn points(&self) -> &[NetPoint] {
        &self.points
    }

    /// `(layer, coordinate, mode)` triples in insertion order.
    pub fn iter_points(&self) -> impl Iterator<Item = (&str, Point, PointMode)> + '_ {
        self.points
            .iter()
            .map(|p| (p.layer.as_str(), p.coordinate, p.mode))
    }

    pub fn layers(&self) -> Vec<&str> {
        let mut layers: Vec<&str> = self.points.iter().map(|p| p.layer.as_str()).collect();
        layers.sort_unstable();
        layers.dedup();
        layers
    }
}

/// Physical nets plus the alias → true-name canonicalization.
#[derive(Debug, Clone, Default)]
pub struct NetList {
    nets: IndexMap<String, Net>,
    /// Interned names known to the alias structure.
    ids: HashMap<String, usize>,
    names: Vec<String>,
    /// Union-find forest.
    parent: Vec<usize>,
    size: Vec<usize>,
    /// True-name id of each root.
    label: Vec<usize>,
    /// Declared alias edges, `alias -> target`, for cycle detection.
    edges: Vec<Vec<usize>>,
    /// Declared aliases in declaration order.
    declared: Vec<(String, String)>,
}

impl NetList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_point(
        &mut self,
        net: &str,
        layer: &str,
        coordinate: Point,
        mode: PointMode,
        aperture: Option<Aperture>,
    ) {
        self.intern(net);
        self.nets
            .entry(net.to_string())
            .or_insert_with(|| Net::new(net))
            .points
            .push(NetPoint {
                layer: layer.to_string(),
                coordinate,
                mode,
                aperture,
            });
    }

    /// Declare `alias` electrically identical to `target`; the true name of
    /// the joined set becomes the true name of `target`.
    pub fn add_alias(&mut self, alias: &str, target: &str) -> Result<(), AliasCycleError> {
        if alias == target {
            return Ok(());
        }
        let a = self.intern(alias);
        let t = self.intern(target);
        if let Some(path) = self.edge_path(t, a) {
            let mut chain = vec![alias.to_string()];
            chain.extend(path.into_iter().map(|id| self.names[id].clone()));
            return Err(AliasCycleError { chain });
        }
        if !self.edges[a].contains(&t) {
            self.edges[a].push(t);
            self.declared.push((alias.to_string(), target.to_string()));
        }
        self.union(a, t);
        log::debug!("net alias {} -> {}", alias, target);
        Ok(())
    }

    /// Canonical name of the electrically connected set containing `name`.
    /// Names never seen resolve to themselves.
    pub fn get_true_net_name(&self, name: &str) -> String {
        match self.ids.get(name) {
            Some(&id) => self.names[self.label[self.root(id)]].clone(),
            None => name.to_string(),
        }
    }

    pub fn same_node(&self, a: &str, b: &str) -> bool {
        self.get_true_net_name(a) == self.get_true_net_name(b)
    }

    /// Physical nets in creation order. Each call starts a fresh pass.
    pub fn iter_physical(&self) -> impl Iterator<Item = &Net> + '_ {
        self.nets.values()
    }

    pub fn get_net(&self, name: &str) -> Option<&Net> {
        self.nets.get(name)
    }

    /// Physical nets grouped by true name, in order of first appearance.
    pub fn true_nets(&self) -> IndexMap<String, Vec<&Net>> {
        let mut groups: IndexMap<String, Vec<&Net>> = IndexMap::new();
        for net in self.nets.values() {
            groups
                .entry(self.get_true_net_name(net.name()))
                .or_default()
                .push(net);
        }
        groups
    }

    pub fn aliases(&self) -> &[(String, String)] {
        &self.declared
    }

    pub fn len(&self) -> usize {
        self.nets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nets.is_empty()
    }

    pub fn point_count(&self) -> usize {
        self.nets.values().map(|n| n.points.len()).sum()
    }

    // ── Union-find ───────────────────────────────────────────────────

    fn intern(&mut self, name: &str) -> usize {
        if let Some(&id) = self.ids.get(name) {
            return id;
        }
        let id = self.names.len();
        self.ids.insert(name.to_string(), id);
        self.names.push(name.to_string());
        self.parent.push(id);
        self.size.push(1);
        self.label.push(id);
        self.edges.push(Vec::new());
        id
    }

    fn root(&self, mut id: usize) -> usize {
        while self.parent[id] != id {
            id = self.parent[id];
        }
        id
    }

    fn find(&mut self, id: usize) -> usize {
        let root = self.root(id);
        let mut cur = id;
        while self.parent[cur] != root {
            let next = self.parent[cur];
            self.parent[cur] = root;
            cur = next;
        }
        root
    }

    fn union(&mut self, alias: usize, target: usize) {
        let ra = self.find(alias);
        let rt = self.find(target);
        if ra == rt {
            return;
        }
        let label = self.label[rt];
        let (big, small) = if self.size[ra] > self.size[rt] { (ra, rt) } else { (rt, ra) };
        self.parent[small] = big;
        self.size[big] += self.size[small];
        self.label[big] = label;
    }

    /// Path of declared edges from `from` to `to`, excluding `from`'s own
    /// position at the front, if one exists.
    fn edge_path(&self, from: usize, to: usize) -> Option<Vec<usize>> {
        let mut stack = vec![(from, vec![from])];
        let mut seen = vec![false; self.names.len()];
        while let Some((node, path)) = stack.pop() {
            if node == to {
                return Some(path);
            }
            if std::mem::replace(&mut seen[node], true) {
                continue;
            }
            for &next in &self.edges[node] {
                let mut next_path = path.clone();
                next_path.push(next);
                stack.push((next, next_path));
            }
        }
        None
    }
}
