//! The `.efn` document format.
//!
//! A document is a JSON object:
//!
//! ```json
//! {
//!   "nodes": [{ "id": "q0", "type": "circular", "position": { "x": 100, "y": 150 },
//!               "data": { "label": "q0", "angle": -90, "angles": [-90, 0, 90, 180], "isFinal": false } }],
//!   "edges": [{ "id": "e1", "source": "q0", "target": "q1", "label": "a", "type": "adjustableBezier",
//!               "style": { "strokeWidth": 2, "stroke": "#2c3e50" },
//!               "markerEnd": { "type": "arrowclosed", "color": "#2c3e50" },
//!               "data": { "anchorOffset": 0 } }],
//!   "startState": "q0",
//!   "acceptingStates": ["q1"]
//! }
//! ```
//!
//! `nodes` and `edges` are required. Import validates the whole document
//! before building anything, so a failed import never yields a partial
//! automaton.

use crate::error::{Error, ImportError, Result};
use crate::graph::Automaton;
use crate::path::Point;
use crate::state::{State, StateId, StateRegistry, DEFAULT_HANDLE_ANGLES};
use crate::transitions::{EdgeGeometry, Transition, TransitionId, TransitionKind, TransitionStore};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::path::Path;
use tracing::{info, warn};

/// File extension used for saved automata.
pub const FILE_EXTENSION: &str = "efn";

const EDGE_COLOR: &str = "#2c3e50";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub nodes: Vec<NodeRecord>,
    pub edges: Vec<EdgeRecord>,
    /// Empty when no start state is set.
    #[serde(default)]
    pub start_state: String,
    /// Absent in older documents; the accepting set is then taken from
    /// each node's `isFinal`.
    #[serde(default, alias = "acceptStates")]
    pub accepting_states: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: String,
    #[serde(rename = "type", default = "circular")]
    pub kind: String,
    pub position: Point,
    #[serde(default)]
    pub data: NodeData,
}

fn circular() -> String {
    "circular".to_owned()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeData {
    #[serde(default)]
    pub label: String,
    /// Angle of the first handle, kept for readers that only know one handle.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub angle: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub angles: Option<Vec<f32>>,
    #[serde(default)]
    pub is_final: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeRecord {
    pub id: String,
    pub source: String,
    pub target: String,
    /// Written as `"source-N"`; plain indices and `null` are also read.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        serialize_with = "handle_id::serialize_source",
        deserialize_with = "handle_id::deserialize"
    )]
    pub source_handle: Option<usize>,
    /// Written as `"target-N"`; plain indices and `null` are also read.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        serialize_with = "handle_id::serialize_target",
        deserialize_with = "handle_id::deserialize"
    )]
    pub target_handle: Option<usize>,
    pub label: String,
    #[serde(rename = "type", default)]
    pub kind: EdgeType,
    #[serde(default)]
    pub style: EdgeStyle,
    #[serde(default)]
    pub marker_end: MarkerEnd,
    #[serde(default)]
    pub data: EdgeGeometry,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EdgeType {
    #[default]
    AdjustableBezier,
    SelfLoop,
}

impl From<TransitionKind> for EdgeType {
    fn from(kind: TransitionKind) -> Self {
        match kind {
            TransitionKind::Straight => EdgeType::AdjustableBezier,
            TransitionKind::SelfLoop => EdgeType::SelfLoop,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EdgeStyle {
    pub stroke_width: f32,
    pub stroke: String,
}

impl Default for EdgeStyle {
    fn default() -> Self {
        Self {
            stroke_width: 2.0,
            stroke: EDGE_COLOR.to_owned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkerEnd {
    #[serde(rename = "type")]
    pub kind: String,
    pub color: String,
}

impl Default for MarkerEnd {
    fn default() -> Self {
        Self {
            kind: "arrowclosed".to_owned(),
            color: EDGE_COLOR.to_owned(),
        }
    }
}

/// Handle references as stored by the canvas: `"source-1"`, `"target-0"`.
mod handle_id {
    use serde::de::{self, Deserializer};
    use serde::{Deserialize, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Index(usize),
        Named(String),
    }

    pub fn serialize_source<S: Serializer>(index: &Option<usize>, serializer: S) -> Result<S::Ok, S::Error> {
        serialize("source", index, serializer)
    }

    pub fn serialize_target<S: Serializer>(index: &Option<usize>, serializer: S) -> Result<S::Ok, S::Error> {
        serialize("target", index, serializer)
    }

    fn serialize<S: Serializer>(prefix: &str, index: &Option<usize>, serializer: S) -> Result<S::Ok, S::Error> {
        match index {
            Some(i) => serializer.serialize_str(&format!("{prefix}-{i}")),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<usize>, D::Error> {
        match Option::<Raw>::deserialize(deserializer)? {
            None => Ok(None),
            Some(Raw::Index(i)) => Ok(Some(i)),
            Some(Raw::Named(name)) => parse(&name)
                .map(Some)
                .ok_or_else(|| de::Error::custom(format!("invalid handle id `{name}`"))),
        }
    }

    /// `"source-N"`, `"target-N"` or a bare `"N"`.
    fn parse(name: &str) -> Option<usize> {
        let digits = name
            .strip_prefix("source-")
            .or_else(|| name.strip_prefix("target-"))
            .unwrap_or(name);
        digits.parse().ok()
    }
}

impl Document {
    /// Parse a document, reporting missing required fields by name.
    pub fn from_json(json: &str) -> std::result::Result<Self, ImportError> {
        let value: serde_json::Value = serde_json::from_str(json).map_err(ImportError::Malformed)?;
        for field in ["nodes", "edges"] {
            if value.get(field).is_none() {
                return Err(ImportError::MissingField(field));
            }
        }
        serde_json::from_value(value).map_err(ImportError::Malformed)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(Error::Export)
    }
}

/// Snapshot `automaton` as a document.
pub fn export(automaton: &Automaton) -> Document {
    let nodes = automaton
        .states()
        .iter()
        .map(|s| NodeRecord {
            id: s.id.to_string(),
            kind: circular(),
            position: s.position,
            data: NodeData {
                label: s.id.to_string(),
                angle: s.handle_angles.first().copied(),
                angles: Some(s.handle_angles.clone()),
                is_final: automaton.is_accepting(&s.id),
            },
        })
        .collect();

    let edges = automaton
        .transitions()
        .iter()
        .map(|t| EdgeRecord {
            id: t.id.to_string(),
            source: t.source.to_string(),
            target: t.target.to_string(),
            source_handle: t.source_handle,
            target_handle: t.target_handle,
            label: t.label.clone(),
            kind: t.kind.into(),
            style: EdgeStyle::default(),
            marker_end: MarkerEnd::default(),
            data: t.geometry,
        })
        .collect();

    Document {
        nodes,
        edges,
        start_state: automaton.start_state().map(ToString::to_string).unwrap_or_default(),
        accepting_states: Some(automaton.states().accepting().map(ToString::to_string).collect()),
    }
}

/// Build an automaton from `document`, validating every reference.
///
/// Sibling fan-out is recomputed with `fan_out_unit` rather than trusted
/// from the stored `anchorOffset`.
pub fn import(document: &Document, fan_out_unit: f32) -> std::result::Result<Automaton, ImportError> {
    let mut ids: HashSet<&str> = HashSet::new();
    for node in &document.nodes {
        if !ids.insert(node.id.as_str()) {
            return Err(ImportError::DuplicateState(node.id.clone()));
        }
    }

    let accepting: BTreeSet<&str> = match &document.accepting_states {
        Some(list) => {
            for id in list {
                if !ids.contains(id.as_str()) {
                    return Err(ImportError::UnknownAcceptingState(id.clone()));
                }
            }
            list.iter().map(String::as_str).collect()
        }
        None => document
            .nodes
            .iter()
            .filter(|n| n.data.is_final)
            .map(|n| n.id.as_str())
            .collect(),
    };

    let start = match document.start_state.as_str() {
        "" => None,
        id if ids.contains(id) => Some(StateId::from(id)),
        id => return Err(ImportError::UnknownStartState(id.to_owned())),
    };

    let states = document
        .nodes
        .iter()
        .map(|node| {
            let mut state = State::new(StateId::from(node.id.as_str()), node.position);
            state.handle_angles = handle_angles(&node.data);
            state.is_final = accepting.contains(node.id.as_str());
            state
        })
        .collect();
    let states = StateRegistry::from_states(states, start);

    let mut seen: HashSet<&str> = HashSet::new();
    let mut transitions = Vec::with_capacity(document.edges.len());
    for edge in &document.edges {
        if !seen.insert(edge.id.as_str()) {
            return Err(ImportError::DuplicateTransition(edge.id.clone()));
        }
        for endpoint in [&edge.source, &edge.target] {
            if !ids.contains(endpoint.as_str()) {
                return Err(ImportError::DanglingReference {
                    edge: edge.id.clone(),
                    state: endpoint.clone(),
                });
            }
        }

        let mut transition = Transition::new(
            TransitionId::from(edge.id.as_str()),
            StateId::from(edge.source.as_str()),
            StateId::from(edge.target.as_str()),
            &edge.label,
        )
        .map_err(|e| ImportError::InvalidLabel {
            edge: edge.id.clone(),
            source: Box::new(e),
        })?;
        transition.geometry = edge.data;
        transition.source_handle = edge.source_handle;
        transition.target_handle = edge.target_handle;
        transitions.push(transition);
    }

    let mut store = TransitionStore::new(fan_out_unit);
    for transition in transitions {
        store.push(transition);
    }

    Ok(Automaton::from_parts(states, store))
}

/// Handle angles from node data: the full list when present, else the
/// defaults with the first handle taken from `angle`.
fn handle_angles(data: &NodeData) -> Vec<f32> {
    if let Some(angles) = &data.angles {
        return angles.clone();
    }
    let mut angles = DEFAULT_HANDLE_ANGLES.to_vec();
    if let Some(angle) = data.angle {
        angles[0] = angle;
    }
    angles
}

/// Serialize `automaton` to pretty-printed JSON.
pub fn to_json(automaton: &Automaton) -> Result<String> {
    export(automaton).to_json()
}

/// Parse and import a JSON document.
pub fn from_json(json: &str, fan_out_unit: f32) -> Result<Automaton> {
    let automaton = Document::from_json(json)
        .and_then(|document| import(&document, fan_out_unit))
        .map_err(|e| {
            warn!(error = %e, "rejected document");
            e
        })?;
    info!(
        states = automaton.states().len(),
        transitions = automaton.transitions().len(),
        "imported automaton"
    );
    Ok(automaton)
}

/// Write `automaton` to `path`.
pub fn save_to_path(automaton: &Automaton, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let json = to_json(automaton)?;
    std::fs::write(path, json)?;
    info!(path = %path.display(), states = automaton.states().len(), "saved automaton");
    Ok(())
}

/// Read and import the document at `path`.
pub fn load_from_path(path: impl AsRef<Path>, fan_out_unit: f32) -> Result<Automaton> {
    let path = path.as_ref();
    let json = std::fs::read_to_string(path).map_err(ImportError::Io)?;
    info!(path = %path.display(), "loading automaton");
    from_json(&json, fan_out_unit)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn q(n: usize) -> StateId {
        StateId::indexed(n)
    }

    fn import_str(json: &str) -> std::result::Result<Automaton, ImportError> {
        import(&Document::from_json(json)?, 10.0)
    }

    // ========================================================================
    // export()
    // ========================================================================

    #[test]
    fn test_export_example() {
        let doc = export(&Automaton::example());
        assert_eq!(doc.nodes.len(), 3);
        assert_eq!(doc.edges.len(), 2);
        assert_eq!(doc.start_state, "q0");
        assert_eq!(doc.accepting_states, Some(vec!["q1".to_owned(), "q2".to_owned()]));

        let e1 = &doc.edges[0];
        assert_eq!(e1.kind, EdgeType::AdjustableBezier);
        assert_eq!(e1.data.anchor_offset, -5.0);
        assert!(doc.nodes[1].data.is_final);
    }

    #[test]
    fn test_export_json_field_names() {
        let mut a = Automaton::example();
        let lp = a.add_self_loop(&q(1), "c", 60.0).unwrap();
        a.transitions_mut().get_mut(&lp).unwrap().geometry.c1 = Some(Point::new(1.0, 2.0));

        let json = to_json(&a).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        let edge = &value["edges"][2];
        assert_eq!(edge["type"], "selfLoop");
        assert_eq!(edge["data"]["loopAngle"], -90.0);
        assert_eq!(edge["data"]["c1"]["x"], 1.0);
        assert_eq!(edge["markerEnd"]["type"], "arrowclosed");
        assert_eq!(value["nodes"][1]["data"]["isFinal"], true);
        assert_eq!(value["startState"], "q0");
        assert!(edge["data"].get("c2").is_none());
    }

    #[test]
    fn test_round_trip_preserves_model() {
        let mut a = Automaton::example();
        a.add_self_loop(&q(2), "x, y", 60.0).unwrap();
        a.connect_handles(&q(1), Some(1), &q(2), Some(3), "b").unwrap();
        a.rotate_handle(&q(0), 2, 135.0).unwrap();
        a.transitions_mut().get_mut(&TransitionId::from("e1")).unwrap().geometry.c2 = Some(Point::new(9.5, -3.25));

        let back = from_json(&to_json(&a).unwrap(), 10.0).unwrap();
        assert_eq!(export(&back), export(&a));
        assert_eq!(back.states(), a.states());
    }

    // ========================================================================
    // import() - required fields
    // ========================================================================

    #[test]
    fn test_missing_nodes_or_edges() {
        assert!(matches!(import_str(r#"{"edges": []}"#), Err(ImportError::MissingField("nodes"))));
        assert!(matches!(import_str(r#"{"nodes": []}"#), Err(ImportError::MissingField("edges"))));
        assert!(matches!(import_str("[1, 2]"), Err(ImportError::MissingField("nodes"))));
    }

    #[test]
    fn test_malformed_documents() {
        assert!(matches!(import_str("{not json"), Err(ImportError::Malformed(_))));
        assert!(matches!(import_str(r#"{"nodes": 3, "edges": []}"#), Err(ImportError::Malformed(_))));
    }

    #[test]
    fn test_minimal_document() {
        let a = import_str(r#"{"nodes": [], "edges": []}"#).unwrap();
        assert!(a.states().is_empty());
        assert!(a.start_state().is_none());
    }

    // ========================================================================
    // import() - reference validation
    // ========================================================================

    const TWO_NODES: &str = r#"
        { "id": "q0", "position": { "x": 0, "y": 0 }, "data": { "label": "q0", "angle": 45 } },
        { "id": "q1", "position": { "x": 100, "y": 0 }, "data": { "label": "q1", "isFinal": true } }
    "#;

    fn doc(edges: &str, tail: &str) -> String {
        format!(r#"{{ "nodes": [{TWO_NODES}], "edges": [{edges}] {tail} }}"#)
    }

    #[test]
    fn test_accepting_derived_from_is_final_when_absent() {
        let a = import_str(&doc("", "")).unwrap();
        assert!(a.is_accepting(&q(1)));
        assert!(!a.is_accepting(&q(0)));
        assert_eq!(a.states().get(&q(0)).unwrap().handle_angles, vec![45.0, 0.0, 90.0, 180.0]);
    }

    #[test]
    fn test_accepting_list_wins_over_is_final() {
        let a = import_str(&doc("", r#", "acceptingStates": ["q0"]"#)).unwrap();
        assert!(a.is_accepting(&q(0)));
        assert!(!a.is_accepting(&q(1)));
        assert!(!a.states().get(&q(1)).unwrap().is_final);
    }

    #[test]
    fn test_dangling_edge() {
        let edges = r#"{ "id": "e1", "source": "q0", "target": "q7", "label": "a" }"#;
        assert!(matches!(
            import_str(&doc(edges, "")),
            Err(ImportError::DanglingReference { state, .. }) if state == "q7"
        ));
    }

    #[test]
    fn test_unknown_start_and_accepting() {
        assert!(matches!(
            import_str(&doc("", r#", "startState": "q9""#)),
            Err(ImportError::UnknownStartState(id)) if id == "q9"
        ));
        assert!(matches!(
            import_str(&doc("", r#", "acceptingStates": ["q9"]"#)),
            Err(ImportError::UnknownAcceptingState(id)) if id == "q9"
        ));
    }

    #[test]
    fn test_empty_start_means_none() {
        let a = import_str(&doc("", r#", "startState": """#)).unwrap();
        assert!(a.start_state().is_none());
    }

    #[test]
    fn test_duplicates() {
        let dup_nodes = format!(r#"{{ "nodes": [{TWO_NODES}, {{ "id": "q0", "position": {{ "x": 1, "y": 1 }} }}], "edges": [] }}"#);
        assert!(matches!(import_str(&dup_nodes), Err(ImportError::DuplicateState(id)) if id == "q0"));

        let edge = r#"{ "id": "e1", "source": "q0", "target": "q1", "label": "a" }"#;
        assert!(matches!(
            import_str(&doc(&format!("{edge}, {edge}"), "")),
            Err(ImportError::DuplicateTransition(id)) if id == "e1"
        ));
    }

    #[test]
    fn test_invalid_label() {
        let edges = r#"{ "id": "e1", "source": "q0", "target": "q1", "label": " " }"#;
        match import_str(&doc(edges, "")) {
            Err(ImportError::InvalidLabel { edge, source }) => {
                assert_eq!(edge, "e1");
                assert!(matches!(*source, Error::EmptyLabel));
            }
            other => panic!("expected InvalidLabel, got {other:?}"),
        }
    }

    #[test]
    fn test_self_loop_kind_follows_endpoints() {
        let edges = r#"{ "id": "x", "source": "q1", "target": "q1", "label": "a", "type": "adjustableBezier" }"#;
        let a = import_str(&doc(edges, "")).unwrap();
        assert!(a.transitions().get(&TransitionId::from("x")).unwrap().is_self_loop());
    }

    #[test]
    fn test_anchor_offset_is_recomputed() {
        let edges = r#"
            { "id": "e1", "source": "q0", "target": "q1", "label": "a", "data": { "anchorOffset": 99 } },
            { "id": "e2", "source": "q0", "target": "q1", "label": "b" }
        "#;
        let a = import_str(&doc(edges, "")).unwrap();
        assert_eq!(a.transitions().get(&TransitionId::from("e1")).unwrap().geometry.anchor_offset, -5.0);
    }

    #[test]
    fn test_new_ids_do_not_collide_after_import() {
        let edges = r#"{ "id": "e-q0-q1-1", "source": "q0", "target": "q1", "label": "a" }"#;
        let mut a = import_str(&doc(edges, "")).unwrap();
        let id = a.connect(&q(0), &q(1), "b").unwrap();
        assert_ne!(id, "e-q0-q1-1");
        assert_eq!(a.transitions().len(), 2);
    }

    // ========================================================================
    // Canvas-shaped records
    // ========================================================================

    #[test]
    fn test_partial_style_and_marker_take_defaults() {
        let edges = r#"{ "id": "self-q1-1", "source": "q1", "target": "q1", "label": "a", "type": "selfLoop",
            "markerEnd": { "type": "arrowclosed" }, "style": { "strokeWidth": 2 }, "data": { "loopAngle": -30 } }"#;
        let document = Document::from_json(&doc(edges, "")).unwrap();
        assert_eq!(document.edges[0].marker_end, MarkerEnd::default());
        assert_eq!(document.edges[0].style, EdgeStyle::default());

        let a = import(&document, 10.0).unwrap();
        let t = a.transitions().get(&TransitionId::from("self-q1-1")).unwrap();
        assert!(t.is_self_loop());
        assert_eq!(t.geometry.loop_angle, Some(-30.0));
    }

    #[test]
    fn test_string_handle_ids() {
        let edges = r#"
            { "id": "e1", "source": "q0", "target": "q1", "label": "a", "sourceHandle": "source-1", "targetHandle": "target-3" },
            { "id": "e2", "source": "q1", "target": "q0", "label": "b", "sourceHandle": 2, "targetHandle": null }
        "#;
        let a = import_str(&doc(edges, "")).unwrap();
        let e1 = a.transitions().get(&TransitionId::from("e1")).unwrap();
        assert_eq!((e1.source_handle, e1.target_handle), (Some(1), Some(3)));
        let e2 = a.transitions().get(&TransitionId::from("e2")).unwrap();
        assert_eq!((e2.source_handle, e2.target_handle), (Some(2), None));
    }

    #[test]
    fn test_bad_handle_id_is_malformed() {
        let edges = r#"{ "id": "e1", "source": "q0", "target": "q1", "label": "a", "sourceHandle": "left" }"#;
        assert!(matches!(import_str(&doc(edges, "")), Err(ImportError::Malformed(_))));
    }

    #[test]
    fn test_handles_export_as_canvas_ids() {
        let mut a = Automaton::example();
        a.connect_handles(&q(1), Some(1), &q(2), Some(3), "c").unwrap();
        let value: serde_json::Value = serde_json::from_str(&to_json(&a).unwrap()).unwrap();
        assert_eq!(value["edges"][2]["sourceHandle"], "source-1");
        assert_eq!(value["edges"][2]["targetHandle"], "target-3");
        assert!(value["edges"][0].get("sourceHandle").is_none());
    }

    #[test]
    fn test_accept_states_alias() {
        let a = import_str(&doc("", r#", "startState": "q1", "acceptStates": ["q0"]"#)).unwrap();
        assert_eq!(a.start_state(), Some(&q(1)));
        assert!(a.is_accepting(&q(0)));
        assert!(!a.is_accepting(&q(1)));
    }
}
