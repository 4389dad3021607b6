use std::collections::HashMap;
use std::fmt;

use bevy::math::{Vec3, Vec4};
use serde_json::{Map, Value};

use crate::config::GraphConfig;
use crate::document::GraphDocument;

/// Index of a node within its graph. Stable for the lifetime of one build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl NodeId {
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Error raised while building a graph from a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphBuildError {
    DuplicateNodeId(String),
    DanglingEndpoint { link: usize, id: String },
}

impl fmt::Display for GraphBuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphBuildError::DuplicateNodeId(id) => {
                write!(f, "node id '{}' appears more than once", id)
            }
            GraphBuildError::DanglingEndpoint { link, id } => {
                write!(f, "link {} references unknown node '{}'", link, id)
            }
        }
    }
}

/// One node of the graph. Position and velocity are mutated by every
/// simulation step; the visual side lives on the node's container entity.
#[derive(Debug, Clone)]
pub struct Node {
    pub id: String,
    pub group: i64,
    pub value: f32,
    pub color: Vec4,
    pub opacity: f32,
    pub position: Vec3,
    pub velocity: Vec3,
}

/// One link, endpoints resolved at build time.
#[derive(Debug, Clone)]
pub struct Link {
    pub source: NodeId,
    pub target: NodeId,
    pub color: Vec4,
    pub opacity: f32,
    pub visible: bool,
    pub width: f32,
}

#[derive(Debug, Clone, Default)]
pub struct Graph {
    pub nodes: Vec<Node>,
    pub links: Vec<Link>,
}

impl Graph {
    /// Build a graph from a fetched document under the given configuration.
    ///
    /// Every link endpoint must resolve to a node in the same document; a
    /// dangling reference aborts the whole build so the caller never sees a
    /// half-built graph.
    pub fn build(doc: &GraphDocument, config: &GraphConfig) -> Result<Graph, GraphBuildError> {
        let mut nodes = Vec::with_capacity(doc.nodes.len());
        let mut by_id: HashMap<String, NodeId> = HashMap::with_capacity(doc.nodes.len());
        let mut node_buckets = ColorBuckets::new(config.node_auto_color_by.as_deref());
        let mut link_buckets = ColorBuckets::new(config.link_auto_color_by.as_deref());

        for fields in &doc.nodes {
            let id = value_to_key(&config.node_id.resolve(fields));
            let node_id = NodeId(nodes.len() as u32);
            if by_id.insert(id.clone(), node_id).is_some() {
                return Err(GraphBuildError::DuplicateNodeId(id));
            }

            let group = fields.get("group").and_then(Value::as_i64).unwrap_or(0);
            let value = config.node_val.resolve_f32(fields, 1.0).max(0.05);
            let color = parse_color(&config.node_color.resolve(fields))
                .or_else(|| node_buckets.color_for(fields))
                .unwrap_or_else(|| palette_color(group as usize));

            nodes.push(Node {
                id,
                group,
                value,
                color,
                opacity: config.node_opacity,
                position: Vec3::ZERO,
                velocity: Vec3::ZERO,
            });
        }

        let mut links = Vec::with_capacity(doc.links.len());
        for (index, fields) in doc.links.iter().enumerate() {
            let source_key = value_to_key(&config.link_source.resolve(fields));
            let target_key = value_to_key(&config.link_target.resolve(fields));

            let source = *by_id
                .get(&source_key)
                .ok_or(GraphBuildError::DanglingEndpoint {
                    link: index,
                    id: source_key.clone(),
                })?;
            let target = *by_id
                .get(&target_key)
                .ok_or(GraphBuildError::DanglingEndpoint {
                    link: index,
                    id: target_key.clone(),
                })?;

            let color = parse_color(&config.link_color.resolve(fields))
                .or_else(|| link_buckets.color_for(fields))
                .unwrap_or(Vec4::new(0.6, 0.6, 0.6, 1.0));
            let visible = config
                .link_visibility
                .resolve(fields)
                .as_bool()
                .unwrap_or(true);

            links.push(Link {
                source,
                target,
                color,
                opacity: config.link_opacity,
                visible,
                width: config.link_width,
            });
        }

        Ok(Graph { nodes, links })
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Assigns palette colors to the distinct values of one field, in first-seen
/// order. Inactive when no field is configured.
struct ColorBuckets {
    field: Option<String>,
    seen: Vec<String>,
}

impl ColorBuckets {
    fn new(field: Option<&str>) -> Self {
        ColorBuckets {
            field: field.map(str::to_string),
            seen: Vec::new(),
        }
    }

    fn color_for(&mut self, fields: &Map<String, Value>) -> Option<Vec4> {
        let field = self.field.as_deref()?;
        let key = value_to_key(fields.get(field)?);
        let bucket = match self.seen.iter().position(|k| *k == key) {
            Some(i) => i,
            None => {
                self.seen.push(key);
                self.seen.len() - 1
            }
        };
        Some(palette_color(bucket))
    }
}

fn value_to_key(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Fixed bucket palette, cycled for out-of-range indices.
pub fn palette_color(bucket: usize) -> Vec4 {
    const PALETTE: [Vec4; 8] = [
        Vec4::new(0.15, 1.0, 0.30, 1.0),  // green
        Vec4::new(1.0, 0.95, 0.15, 1.0),  // yellow
        Vec4::new(0.20, 0.55, 1.0, 1.0),  // blue
        Vec4::new(1.0, 0.10, 0.10, 1.0),  // red
        Vec4::new(0.90, 0.25, 0.95, 1.0), // magenta
        Vec4::new(1.0, 0.60, 0.20, 1.0),  // orange
        Vec4::new(0.60, 0.40, 1.0, 1.0),  // purple
        Vec4::new(0.25, 0.80, 0.80, 1.0), // teal
    ];
    PALETTE[bucket % PALETTE.len()]
}

/// Parse `#rrggbb` / `#rrggbbaa` strings and `[r, g, b]` / `[r, g, b, a]`
/// arrays of 0..1 floats. Anything else yields `None` and the caller picks a
/// bucket color instead.
pub fn parse_color(value: &Value) -> Option<Vec4> {
    match value {
        Value::String(s) => {
            let hex = s.strip_prefix('#')?;
            if hex.len() != 6 && hex.len() != 8 {
                return None;
            }
            let channel = |i: usize| {
                u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16)
                    .ok()
                    .map(|c| c as f32 / 255.0)
            };
            let a = if hex.len() == 8 { channel(3)? } else { 1.0 };
            Some(Vec4::new(channel(0)?, channel(1)?, channel(2)?, a))
        }
        Value::Array(parts) if parts.len() == 3 || parts.len() == 4 => {
            let mut rgba = [0.0f32, 0.0, 0.0, 1.0];
            for (slot, part) in rgba.iter_mut().zip(parts) {
                *slot = part.as_f64()? as f32;
            }
            Some(Vec4::from_array(rgba))
        }
        _ => None,
    }
}
