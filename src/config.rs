//! Visual and interaction constants for the editor.
//!
//! Every pixel constant the geometry engine, hit testing and pulse animation
//! use lives here so hosts can tune them from a JSON snippet:
//!
//! ```
//! use dfa_canvas::EditorConfig;
//!
//! let config = EditorConfig::from_json_str(r#"{ "stateRadius": 40 }"#).unwrap();
//! assert_eq!(config.state_radius, 40.0);
//! assert_eq!(config.fan_out_unit, 10.0);
//! ```

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EditorConfig {
    /// Visual radius of a state circle.
    pub state_radius: f32,
    /// Lateral spacing between sibling transitions leaving the same state.
    pub fan_out_unit: f32,
    /// Lower clamp for the default control point distance of a straight edge.
    pub curve_offset_min: f32,
    /// Upper clamp for the default control point distance of a straight edge.
    pub curve_offset_max: f32,
    /// How far self-loop endpoints are pulled inside the state's rim.
    pub loop_rim_inset: f32,
    /// How far beyond the rim self-loop control points bulge.
    pub loop_bulge: f32,
    /// Angular spacing between successive self-loops on one state, in degrees.
    pub self_loop_spread: f32,
    /// Distance beyond the rim of the loop-angle drag handle.
    pub loop_handle_gap: f32,
    pub handle_hit_radius: f32,
    pub edge_hover_distance: f32,
    pub hit_samples: usize,
    pub pulse_duration_ms: u64,
    /// Lower bound used for edge lengths when normalizing directions.
    pub short_edge_threshold: f32,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            state_radius: 30.0,
            fan_out_unit: 10.0,
            curve_offset_min: 20.0,
            curve_offset_max: 60.0,
            loop_rim_inset: 4.0,
            loop_bulge: 40.0,
            self_loop_spread: 60.0,
            loop_handle_gap: 12.0,
            handle_hit_radius: 8.0,
            edge_hover_distance: 6.0,
            hit_samples: 20,
            pulse_duration_ms: 700,
            short_edge_threshold: 1.0,
        }
    }
}

impl EditorConfig {
    /// Parse a (possibly partial) JSON object; missing keys keep their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
