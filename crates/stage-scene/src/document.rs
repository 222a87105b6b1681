use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::protocol::ServerMessage;

pub type JsonMap = Map<String, Value>;

/// Range-bound a value without rejecting the surrounding operation.
pub fn clamp(x: f64, lo: f64, hi: f64) -> f64 {
    x.max(lo).min(hi)
}

/// Partial overlay of the scene document, keyed by top-level section.
///
/// A patch is owned by its producer; `SceneDocument::apply_patch` copies
/// every value it takes, so mutating a patch after it has been applied
/// never reaches the stored document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Patch(JsonMap);

impl Patch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps a JSON object as a patch. Returns `None` for non-objects.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn contains(&self, section: &str) -> bool {
        self.0.contains_key(section)
    }

    /// True when the patch names an object, which is what triggers a
    /// generation job downstream.
    pub fn introduces_object(&self) -> bool {
        self.0.contains_key("object")
    }

    pub fn object_name(&self) -> Option<&str> {
        self.0.get("object")?.get("name")?.as_str()
    }

    pub fn set(&mut self, section: impl Into<String>, value: Value) {
        self.0.insert(section.into(), value);
    }

    /// The intermediate "working" patch broadcast the moment a job starts:
    /// busy flag up, any previous asset reference cleared.
    pub fn generation_started() -> Self {
        let mut map = JsonMap::new();
        map.insert("generating".to_string(), Value::Bool(true));
        map.insert("mesh_url".to_string(), Value::Null);
        Self(map)
    }

    /// The completion patch: busy flag down, plus the asset reference when
    /// the job produced one.
    pub fn generation_finished(mesh_url: Option<String>) -> Self {
        let mut map = JsonMap::new();
        map.insert("generating".to_string(), Value::Bool(false));
        if let Some(url) = mesh_url {
            map.insert("mesh_url".to_string(), Value::String(url));
        }
        Self(map)
    }
}

/// Canonical shared scene state.
///
/// All mutation goes through [`apply_patch`](SceneDocument::apply_patch);
/// callers never hold references into the stored tree.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneDocument {
    scene: JsonMap,
}

impl Default for SceneDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneDocument {
    pub fn new() -> Self {
        Self {
            scene: default_scene(),
        }
    }

    /// Merges `patch` into the document and re-applies the full clamp
    /// table, including fields this patch never touched.
    ///
    /// Top-level sections merge key-by-key when both sides are objects;
    /// everything else replaces wholesale. A numeric field only accepts
    /// replacements that read as numbers; a malformed value keeps the
    /// previous one and the rest of the patch still applies.
    pub fn apply_patch(&mut self, patch: &Patch) {
        for (key, incoming) in patch.entries() {
            let merged = match (self.scene.remove(key), incoming) {
                (Some(Value::Object(mut section)), Value::Object(overlay)) => {
                    for (field, value) in overlay {
                        merge_field(&mut section, field, value);
                    }
                    Value::Object(section)
                }
                (Some(previous), value) if previous.is_number() => match coerce_number(value) {
                    Some(n) => json!(n),
                    None => previous,
                },
                (_, value) => value.clone(),
            };
            self.scene.insert(key.clone(), merged);
        }
        self.clamp_all();
    }

    /// Wraps the current state in a full-state envelope. Every broadcast
    /// is a complete snapshot; no diff messages exist.
    pub fn snapshot(&self) -> ServerMessage {
        ServerMessage::Scene {
            scene: Value::Object(self.scene.clone()),
        }
    }

    /// Dotted-path accessor, e.g. `camera.distance`.
    pub fn field(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let mut current = self.scene.get(segments.next()?)?;
        for segment in segments {
            current = current.get(segment)?;
        }
        Some(current)
    }

    fn clamp_all(&mut self) {
        if let Some(Value::Object(camera)) = self.scene.get_mut("camera") {
            clamp_field(camera, "distance", 0.8, 8.0);
            clamp_field(camera, "fov", 5.0, 150.0);
        }
        if let Some(Value::Object(fx)) = self.scene.get_mut("fx") {
            clamp_field(fx, "outline", 0.0, 1.0);
            clamp_field(fx, "bloom", 0.0, 1.5);
            clamp_field(fx, "alpha", 0.0, 1.0);
            clamp_field(fx, "rim", 0.0, 1.0);
            clamp_field(fx, "env_reflect", 0.0, 1.0);
        }
        if let Some(Value::Object(material)) = self.scene.get_mut("material") {
            clamp_field(material, "roughness", 0.0, 1.0);
        }
        if let Some(Value::Object(dimensions)) = self
            .scene
            .get_mut("shape_hint")
            .and_then(|hint| hint.get_mut("dimensions"))
        {
            for field in ["width", "height", "depth"] {
                clamp_field(dimensions, field, 0.05, 5.0);
            }
            clamp_field(dimensions, "radius", 0.05, 3.0);
            clamp_field(dimensions, "thickness", 0.01, 1.0);
            clamp_int_field(dimensions, "segments", 8, 128);
        }
    }
}

fn merge_field(section: &mut JsonMap, field: &str, incoming: &Value) {
    if section.get(field).is_some_and(Value::is_number) {
        // Numeric fields keep their previous value when the replacement
        // cannot be read as a number.
        if let Some(n) = coerce_number(incoming) {
            section.insert(field.to_string(), json!(n));
        }
        return;
    }
    section.insert(field.to_string(), incoming.clone());
}

fn clamp_field(section: &mut JsonMap, field: &str, lo: f64, hi: f64) {
    if let Some(n) = section.get(field).and_then(coerce_number) {
        section.insert(field.to_string(), json!(clamp(n, lo, hi)));
    }
}

fn clamp_int_field(section: &mut JsonMap, field: &str, lo: i64, hi: i64) {
    if let Some(n) = section.get(field).and_then(coerce_number) {
        let bounded = clamp(n, lo as f64, hi as f64) as i64;
        section.insert(field.to_string(), json!(bounded));
    }
}

fn coerce_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn default_scene() -> JsonMap {
    let scene = json!({
        "object": {"name": "demo object", "category": "generic"},
        "presentation": {"mode": "hero_on_pedestal", "style": "glossy_studio"},
        "shape_hint": {
            "primitive": "rounded_box",
            "features": [],
            "dimensions": {
                "width": 0.5,
                "height": 1.0,
                "depth": 0.2,
                "radius": 0.05,
                "segments": 8
            }
        },
        "material": {"preset": "plastic_gloss", "color": "#4b7bff", "roughness": 0.35},
        "camera": {"orbit": true, "distance": 2.2, "fov": 35.0},
        "lighting": {"preset": "studio_softbox"},
        "fx": {"outline": 0.12, "bloom": 0.15, "alpha": 1.0, "rim": 0.0, "env_reflect": 0.0},
        "generating": false,
        "mesh_url": null,
    });
    match scene {
        Value::Object(map) => map,
        _ => unreachable!("default scene literal is a JSON object"),
    }
}
