//! Terraform state documents (the legacy v1 wire shape) and the flattener
//! that turns their nested module/resource/output structure into a single
//! dotted-path lookup table.
//!
//! Notes:
//! - Decoding is best-effort: unknown fields are ignored and missing fields
//!   fall back to empty values, matching how loose the format is in practice.
//! - `serial` and `lineage` are opaque provenance metadata; nothing here
//!   interprets them.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::io;
use thiserror::Error;

// ============================================================================
// Document model
// ============================================================================

/// A decoded state document: versioned root plus the modules it contains.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StateDocument {
    #[serde(default)]
    pub version: i64,
    #[serde(default)]
    pub terraform_version: String,
    #[serde(default)]
    pub serial: i64,
    #[serde(default)]
    pub lineage: String,
    #[serde(default)]
    pub modules: Vec<Module>,
}

/// A nesting scope within a state document.
///
/// The path is a sequence of segments where the literal segment `root` marks
/// the top-level module; `root` segments are elided when composing dotted
/// keys.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Module {
    #[serde(default)]
    pub path: Vec<String>,
    #[serde(default)]
    pub outputs: BTreeMap<String, Output>,
    #[serde(default)]
    pub resources: BTreeMap<String, Resource>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Output {
    #[serde(default)]
    pub sensitive: bool,
    #[serde(default, rename = "type")]
    pub value_type: String,
    #[serde(default)]
    pub value: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Resource {
    #[serde(default, rename = "type")]
    pub resource_type: String,
    #[serde(default, rename = "depends_on")]
    pub dependencies: Vec<String>,
    /// The realized instance. Absent in partially-serialized documents, in
    /// which case the resource contributes no attributes when flattened.
    #[serde(default)]
    pub primary: Option<Instance>,
    #[serde(default)]
    pub provider: String,
}

/// Attributes in this legacy format are always strings; nested structure
/// arrives pre-encoded as compound dotted attribute names.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Instance {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    #[serde(default)]
    pub meta: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Error)]
pub enum StateDecodeError {
    #[error("invalid state document: {0}")]
    Json(#[from] serde_json::Error),
}

impl StateDocument {
    pub fn from_slice(bytes: &[u8]) -> Result<Self, StateDecodeError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    pub fn from_reader<R: io::Read>(reader: R) -> Result<Self, StateDecodeError> {
        Ok(serde_json::from_reader(reader)?)
    }
}

// ============================================================================
// Values
// ============================================================================

/// An output value, discriminated at decode time.
///
/// Map-shaped values land in `Opaque` and render as their structural JSON
/// dump; richer map support is a known gap in the format this models.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Value {
    String(String),
    List(Vec<Value>),
    // Order matters: `Opaque` would also match strings and arrays, so it must
    // stay last.
    Opaque(serde_json::Value),
}

impl Default for Value {
    fn default() -> Self {
        Value::Opaque(serde_json::Value::Null)
    }
}

/// Strings pass through unchanged, lists stringify each element and join
/// with `,`, and anything else renders as raw JSON.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => f.write_str(s),
            Value::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{item}")?;
                }
                Ok(())
            }
            Value::Opaque(raw) => write!(f, "{raw}"),
        }
    }
}

// ============================================================================
// Flattening
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Output,
    Attribute,
}

/// One flattened lookup entry: either a module output or a resource
/// attribute, keyed by its dotted path.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FlatEntry {
    pub kind: EntryKind,
    pub value_type: String,
    pub value: Value,
}

impl StateDocument {
    /// Flatten every module into a single dotted-path mapping.
    ///
    /// Keys are `{modulePrefix}{output}` for outputs and
    /// `{modulePrefix}{resource}.{attribute}` for primary-instance
    /// attributes, where the prefix is `module.{segment}.` per non-root path
    /// segment. A later module or resource composing the same key overwrites
    /// the earlier entry; a resource without a primary instance contributes
    /// nothing.
    pub fn flatten(&self) -> BTreeMap<String, FlatEntry> {
        let mut flat = BTreeMap::new();

        for module in &self.modules {
            let prefix = module_prefix(&module.path);

            for (name, output) in &module.outputs {
                flat.insert(
                    format!("{prefix}{name}"),
                    FlatEntry {
                        kind: EntryKind::Output,
                        value_type: output.value_type.clone(),
                        value: output.value.clone(),
                    },
                );
            }

            for (name, resource) in &module.resources {
                let Some(primary) = resource.primary.as_ref() else {
                    continue;
                };
                let entry_path = format!("{prefix}{name}.");
                for (attr, value) in &primary.attributes {
                    flat.insert(
                        format!("{entry_path}{attr}"),
                        FlatEntry {
                            kind: EntryKind::Attribute,
                            value_type: "string".to_string(),
                            value: Value::String(value.clone()),
                        },
                    );
                }
            }
        }

        flat
    }
}

fn module_prefix(path: &[String]) -> String {
    let mut prefix = String::new();
    for segment in path {
        if segment == "root" {
            continue;
        }
        prefix.push_str("module.");
        prefix.push_str(segment);
        prefix.push('.');
    }
    prefix
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn doc(value: serde_json::Value) -> StateDocument {
        serde_json::from_value(value).expect("decode state document")
    }

    #[test]
    fn decodes_a_versioned_document() {
        let state = doc(serde_json::json!({
            "version": 3,
            "terraform_version": "0.9.11",
            "serial": 17,
            "lineage": "7b7b27cd-82d3-c7ea-1731-32b6a0ff3286",
            "backend_digest": "ignored-by-this-model",
            "modules": [
                {
                    "path": ["root"],
                    "outputs": {
                        "vpc_id": {"sensitive": false, "type": "string", "value": "vpc-0a1b"}
                    },
                    "resources": {}
                }
            ]
        }));

        assert_eq!(state.version, 3);
        assert_eq!(state.terraform_version, "0.9.11");
        assert_eq!(state.serial, 17);
        assert_eq!(state.modules.len(), 1);
        assert_eq!(
            state.modules[0].outputs["vpc_id"].value,
            Value::String("vpc-0a1b".to_string())
        );
    }

    #[test]
    fn decode_rejects_malformed_json() {
        assert!(StateDocument::from_slice(b"{\"modules\": [").is_err());
    }

    #[test]
    fn flattens_root_outputs_and_attributes() {
        let state = doc(serde_json::json!({
            "modules": [
                {
                    "path": ["root"],
                    "outputs": {
                        "foo": {"type": "string", "value": "bar"}
                    },
                    "resources": {
                        "aws_instance.web": {
                            "type": "aws_instance",
                            "primary": {
                                "id": "i-123",
                                "attributes": {"id": "i-123", "ami": "ami-42"}
                            }
                        }
                    }
                }
            ]
        }));

        let flat = state.flatten();

        let foo = &flat["foo"];
        assert_eq!(foo.kind, EntryKind::Output);
        assert_eq!(foo.value, Value::String("bar".to_string()));

        let id = &flat["aws_instance.web.id"];
        assert_eq!(id.kind, EntryKind::Attribute);
        assert_eq!(id.value_type, "string");
        assert_eq!(id.value, Value::String("i-123".to_string()));

        assert_eq!(
            flat["aws_instance.web.ami"].value,
            Value::String("ami-42".to_string())
        );
        assert_eq!(flat.len(), 3);
    }

    #[test]
    fn child_module_keys_get_dotted_prefixes() {
        let state = doc(serde_json::json!({
            "modules": [
                {"path": ["root"], "outputs": {"top": {"value": "t"}}, "resources": {}},
                {"path": ["root", "child"], "outputs": {"foo": {"value": "c"}}, "resources": {}},
                {"path": ["root", "a", "b"], "outputs": {"deep": {"value": "d"}}, "resources": {}}
            ]
        }));

        let flat = state.flatten();
        assert!(flat.contains_key("top"));
        assert!(flat.contains_key("module.child.foo"));
        assert!(flat.contains_key("module.a.module.b.deep"));
    }

    #[test]
    fn resource_without_primary_contributes_nothing() {
        let state = doc(serde_json::json!({
            "modules": [
                {
                    "path": ["root"],
                    "outputs": {},
                    "resources": {
                        "aws_eip.lb": {"type": "aws_eip", "primary": null},
                        "aws_instance.web": {
                            "type": "aws_instance",
                            "primary": {"id": "i-1", "attributes": {"id": "i-1"}}
                        }
                    }
                }
            ]
        }));

        let flat = state.flatten();
        assert_eq!(flat.len(), 1);
        assert!(flat.contains_key("aws_instance.web.id"));
    }

    #[test]
    fn later_module_overwrites_colliding_keys() {
        let state = doc(serde_json::json!({
            "modules": [
                {
                    "path": ["root"],
                    "outputs": {"module.child.foo": {"value": "first"}},
                    "resources": {}
                },
                {
                    "path": ["root", "child"],
                    "outputs": {"foo": {"value": "second"}},
                    "resources": {}
                }
            ]
        }));

        let flat = state.flatten();
        assert_eq!(flat.len(), 1);
        assert_eq!(
            flat["module.child.foo"].value,
            Value::String("second".to_string())
        );
    }

    #[test]
    fn flattening_is_independent_of_declaration_order() {
        let forward = doc(serde_json::json!({
            "modules": [{
                "path": ["root"],
                "outputs": {"a": {"value": "1"}, "b": {"value": "2"}},
                "resources": {}
            }]
        }));
        let reversed = doc(serde_json::json!({
            "modules": [{
                "path": ["root"],
                "outputs": {"b": {"value": "2"}, "a": {"value": "1"}},
                "resources": {}
            }]
        }));

        assert_eq!(forward.flatten(), reversed.flatten());
    }

    #[test]
    fn renders_strings_lists_and_opaque_values() {
        let list: Value =
            serde_json::from_value(serde_json::json!(["a", "b"])).expect("decode list");
        assert_eq!(list.to_string(), "a,b");

        let nested: Value =
            serde_json::from_value(serde_json::json!(["a", ["b", "c"], "d"])).expect("decode list");
        assert_eq!(nested.to_string(), "a,b,c,d");

        let number: Value = serde_json::from_value(serde_json::json!(7)).expect("decode number");
        assert_eq!(number.to_string(), "7");

        let map: Value =
            serde_json::from_value(serde_json::json!({"k": "v"})).expect("decode map");
        assert_eq!(map.to_string(), "{\"k\":\"v\"}");

        assert_eq!(Value::default().to_string(), "null");
    }

    #[test]
    fn untagged_decode_prefers_string_then_list() {
        let v: Value = serde_json::from_value(serde_json::json!("plain")).expect("decode");
        assert_eq!(v, Value::String("plain".to_string()));

        let v: Value = serde_json::from_value(serde_json::json!(["x"])).expect("decode");
        assert_eq!(v, Value::List(vec![Value::String("x".to_string())]));

        let v: Value = serde_json::from_value(serde_json::json!(true)).expect("decode");
        assert_eq!(v, Value::Opaque(serde_json::json!(true)));
    }

    fn value_strategy() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            "[a-z0-9._/-]{0,12}".prop_map(Value::String),
            any::<i64>().prop_map(|n| Value::Opaque(serde_json::json!(n))),
            Just(Value::Opaque(serde_json::Value::Null)),
        ];
        leaf.prop_recursive(3, 24, 4, |inner| {
            prop::collection::vec(inner, 0..4).prop_map(Value::List)
        })
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            failure_persistence: None,
            .. ProptestConfig::default()
        })]

        #[test]
        fn value_rendering_is_total(value in value_strategy()) {
            let rendered = value.to_string();
            if let Value::List(items) = &value {
                let joined = items
                    .iter()
                    .map(|item| item.to_string())
                    .collect::<Vec<_>>()
                    .join(",");
                prop_assert_eq!(rendered, joined);
            }
        }

        #[test]
        fn module_prefix_elides_root_segments(
            segments in prop::collection::vec(
                "[a-z]{1,8}".prop_filter("module names, not the root marker", |s| s != "root"),
                0..4,
            )
        ) {
            let expected: String = segments
                .iter()
                .map(|s| format!("module.{s}."))
                .collect();

            let mut path = vec!["root".to_string()];
            path.extend(segments.iter().cloned());

            prop_assert_eq!(module_prefix(&path), expected.clone());
            prop_assert_eq!(module_prefix(&segments), expected);
        }
    }
}
