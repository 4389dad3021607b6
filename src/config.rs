use bevy::prelude::Resource;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A named transform applied to a looked-up field value.
///
/// The set is closed on purpose: configuration never evaluates code, it only
/// selects one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Builtin {
    Cbrt,
    Sqrt,
    Abs,
}

impl Builtin {
    pub fn apply(&self, v: f64) -> f64 {
        match self {
            Builtin::Cbrt => v.cbrt(),
            Builtin::Sqrt => v.sqrt(),
            Builtin::Abs => v.abs(),
        }
    }
}

/// How a node/link attribute is read from a document entry.
///
/// Untagged: a JSON object selects `Transform`, a bare string selects
/// `Field`, anything else is a `Constant`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Accessor {
    Transform { field: String, transform: Builtin },
    Field(String),
    Constant(Value),
}

impl Accessor {
    pub fn field(name: &str) -> Self {
        Accessor::Field(name.to_string())
    }

    pub fn constant(value: Value) -> Self {
        Accessor::Constant(value)
    }

    /// Resolve against a document entry's fields.
    ///
    /// A field lookup that finds nothing falls back to the raw accessor
    /// string itself, so a misconfigured accessor degrades to a constant
    /// instead of failing the whole object.
    pub fn resolve(&self, fields: &Map<String, Value>) -> Value {
        match self {
            Accessor::Field(name) => fields
                .get(name)
                .cloned()
                .unwrap_or_else(|| Value::String(name.clone())),
            Accessor::Constant(value) => value.clone(),
            Accessor::Transform { field, transform } => {
                let raw = fields.get(field).cloned();
                match raw.as_ref().and_then(Value::as_f64) {
                    Some(n) => Value::from(transform.apply(n)),
                    None => {
                        log::warn!(
                            "accessor transform on non-numeric field '{}', using raw value",
                            field
                        );
                        raw.unwrap_or_else(|| Value::String(field.clone()))
                    }
                }
            }
        }
    }

    /// Resolve to a number, falling back to `default` when the value is not
    /// numeric.
    pub fn resolve_f32(&self, fields: &Map<String, Value>, default: f32) -> f32 {
        match self.resolve(fields).as_f64() {
            Some(n) => n as f32,
            None => default,
        }
    }
}

/// Full configuration block for one graph instance.
///
/// Read at creation, reacted to on change: shape-affecting fields trigger a
/// rebuild of graph + content pipeline, force strengths only retune the
/// running simulation.
#[derive(Debug, Clone, PartialEq, Resource, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GraphConfig {
    pub name: String,
    pub is_networked: bool,
    pub is_interactive: bool,
    pub is_draggable: bool,
    pub height: f32,
    pub width: f32,
    pub text_size: f32,
    pub document_url: String,
    pub charge_force: f32,
    pub x_force: f32,
    pub y_force: f32,
    pub z_force: f32,
    pub node_id: Accessor,
    pub node_val: Accessor,
    pub node_color: Accessor,
    pub node_auto_color_by: Option<String>,
    pub node_opacity: f32,
    pub link_source: Accessor,
    pub link_target: Accessor,
    pub link_visibility: Accessor,
    pub link_color: Accessor,
    pub link_auto_color_by: Option<String>,
    pub link_opacity: f32,
    pub link_width: f32,
}

impl Default for GraphConfig {
    fn default() -> Self {
        GraphConfig {
            name: String::new(),
            is_networked: false,
            is_interactive: true,
            is_draggable: true,
            height: 100.0,
            width: 100.0,
            text_size: 2.0,
            document_url: String::new(),
            charge_force: -50.0,
            x_force: 0.1,
            y_force: 0.1,
            z_force: 0.1,
            node_id: Accessor::field("id"),
            node_val: Accessor::field("val"),
            node_color: Accessor::field("color"),
            node_auto_color_by: None,
            node_opacity: 0.9,
            link_source: Accessor::field("source"),
            link_target: Accessor::field("target"),
            link_visibility: Accessor::constant(Value::Bool(true)),
            link_color: Accessor::field("color"),
            link_auto_color_by: None,
            link_opacity: 0.6,
            link_width: 0.5,
        }
    }
}

impl GraphConfig {
    /// True when the change between `prev` and `self` alters the shape of
    /// the graph (which document is loaded, or how its entries are read) and
    /// therefore requires a full rebuild. Everything else — force strengths
    /// in particular — is retuned in place.
    pub fn needs_rebuild(&self, prev: &GraphConfig) -> bool {
        self.document_url != prev.document_url
            || self.node_id != prev.node_id
            || self.node_val != prev.node_val
            || self.node_color != prev.node_color
            || self.node_auto_color_by != prev.node_auto_color_by
            || self.node_opacity != prev.node_opacity
            || self.link_source != prev.link_source
            || self.link_target != prev.link_target
            || self.link_visibility != prev.link_visibility
            || self.link_color != prev.link_color
            || self.link_auto_color_by != prev.link_auto_color_by
            || self.link_opacity != prev.link_opacity
            || self.link_width != prev.link_width
    }

    /// True when only force strengths differ.
    pub fn forces_changed(&self, prev: &GraphConfig) -> bool {
        self.charge_force != prev.charge_force
            || self.x_force != prev.x_force
            || self.y_force != prev.y_force
            || self.z_force != prev.z_force
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_accessor_deserialize_variants() {
        let field: Accessor = serde_json::from_value(json!("group")).unwrap();
        assert_eq!(field, Accessor::field("group"));

        let constant: Accessor = serde_json::from_value(json!(4.0)).unwrap();
        assert_eq!(constant, Accessor::constant(json!(4.0)));

        let transform: Accessor =
            serde_json::from_value(json!({"field": "val", "transform": "cbrt"})).unwrap();
        assert_eq!(
            transform,
            Accessor::Transform {
                field: "val".to_string(),
                transform: Builtin::Cbrt,
            }
        );
    }

    #[test]
    fn test_field_lookup_falls_back_to_raw() {
        let entry = fields(json!({"id": "a"}));

        let hit = Accessor::field("id").resolve(&entry);
        assert_eq!(hit, json!("a"));

        // Missing field degrades to the accessor string itself.
        let miss = Accessor::field("nope").resolve(&entry);
        assert_eq!(miss, json!("nope"));
    }

    #[test]
    fn test_transform_resolves_and_falls_back() {
        let entry = fields(json!({"val": 8.0, "label": "x"}));

        let cbrt = Accessor::Transform {
            field: "val".to_string(),
            transform: Builtin::Cbrt,
        };
        assert!((cbrt.resolve(&entry).as_f64().unwrap() - 2.0).abs() < 1e-9);

        // Non-numeric field: raw value, not a failure.
        let bad = Accessor::Transform {
            field: "label".to_string(),
            transform: Builtin::Sqrt,
        };
        assert_eq!(bad.resolve(&entry), json!("x"));
    }

    #[test]
    fn test_resolve_f32_default_on_non_numeric() {
        let entry = fields(json!({"val": "heavy"}));
        assert_eq!(Accessor::field("val").resolve_f32(&entry, 1.0), 1.0);
        assert_eq!(Accessor::field("missing").resolve_f32(&entry, 2.5), 2.5);
    }

    #[test]
    fn test_change_classification() {
        let base = GraphConfig::default();

        let mut forces = base.clone();
        forces.charge_force = -120.0;
        assert!(!forces.needs_rebuild(&base));
        assert!(forces.forces_changed(&base));

        let mut shape = base.clone();
        shape.document_url = "other.json".to_string();
        assert!(shape.needs_rebuild(&base));
        assert!(!shape.forces_changed(&base));

        let mut accessor = base.clone();
        accessor.node_val = Accessor::constant(json!(3.0));
        assert!(accessor.needs_rebuild(&base));
    }

    #[test]
    fn test_config_deserializes_camel_case() {
        let cfg: GraphConfig = serde_json::from_value(json!({
            "isNetworked": true,
            "documentUrl": "graph.json",
            "chargeForce": -80.0,
            "nodeAutoColorBy": "group"
        }))
        .unwrap();

        assert!(cfg.is_networked);
        assert_eq!(cfg.document_url, "graph.json");
        assert_eq!(cfg.charge_force, -80.0);
        assert_eq!(cfg.node_auto_color_by.as_deref(), Some("group"));
        // Unspecified fields keep their defaults.
        assert!(cfg.is_interactive);
    }
}
