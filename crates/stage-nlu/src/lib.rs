//! Rule-based command interpreter: turns a free-text utterance into a
//! scene patch. Unknown commands yield an empty patch, never an error.
//!
//! Rule order matters: the `show it`/`hide it` alpha phrases are guarded
//! before the object rule so they are not consumed as object commands,
//! and the object rule runs before style-only matching so a phrase like
//! "show me a wireframe phone" captures both the object and the style.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Value, json};
use stage_scene::Patch;

const COLOR_MAP: &[(&str, &str)] = &[
    // Longer color names first so they match before their suffixes.
    ("electric blue", "#1e3cff"),
    ("red", "#ff2b2b"),
    ("blue", "#2b6cff"),
    ("green", "#2bff6c"),
    ("purple", "#8b5bff"),
    ("pink", "#ff4bd8"),
    ("orange", "#ff8b2b"),
    ("white", "#ffffff"),
    ("black", "#101014"),
];

const STYLE_KEYWORDS: &[(&str, &str)] = &[
    ("futuristic", "futuristic_holo"),
    ("wireframe", "wireframe"),
    ("hologram", "futuristic_holo"),
    ("clay", "clay"),
    ("glossy", "glossy_studio"),
    ("matte", "matte_studio"),
];

struct CategoryHint {
    pattern: Regex,
    category: &'static str,
    primitive: &'static str,
    features: &'static [&'static str],
}

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace pattern compiles"));

static OBJECT_COMMAND: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(show me|show|display|i want to see)\s+(an?\s+)?(.+)$")
        .expect("object pattern compiles")
});

static HEX_COLOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#([0-9a-f]{6})\b").expect("hex pattern compiles"));

static COLOR_PATTERNS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    COLOR_MAP
        .iter()
        .map(|(name, hex)| {
            let pattern = Regex::new(&format!(r"\b{}\b", regex::escape(name)))
                .expect("color pattern compiles");
            (pattern, *hex)
        })
        .collect()
});

static CATEGORY_HINTS: LazyLock<Vec<CategoryHint>> = LazyLock::new(|| {
    let hint = |pattern: &str, category, primitive, features| CategoryHint {
        pattern: Regex::new(pattern).expect("category pattern compiles"),
        category,
        primitive,
        features,
    };
    vec![
        hint(
            r"\b(phone|handset|smartphone)\b",
            "consumer_electronics",
            "rounded_slab",
            &["camera_bump"],
        ),
        hint(r"\b(bottle|flask)\b", "product_container", "cylinder", &[]),
        hint(r"\b(headset|headphones)\b", "audio_device", "capsule", &[]),
        hint(r"\b(remote|controller)\b", "controller", "rounded_box", &[]),
    ]
});

/// Interprets a free-text command as a scene patch.
pub fn parse_command(text: &str) -> Patch {
    let lowered = text.trim().to_lowercase();
    let t = WHITESPACE.replace_all(&lowered, " ");
    let t = t.as_ref();

    // Alpha phrases beat the object rule ("show it" is not an object).
    if t.contains("hide it") {
        return patch(json!({"fx": {"alpha": 0.0}}));
    }
    if t.contains("show it") {
        return patch(json!({"fx": {"alpha": 1.0}}));
    }

    if let Some(caps) = OBJECT_COMMAND.captures(t) {
        let name = caps
            .get(3)
            .map(|m| m.as_str())
            .unwrap_or_default()
            .trim()
            .trim_matches(|c| c == '\'' || c == '"');
        return object_patch(name, t);
    }

    for (keyword, style) in STYLE_KEYWORDS {
        if t.contains(keyword) {
            return patch(json!({"presentation": {"style": style}}));
        }
    }

    for (pattern, hex) in COLOR_PATTERNS.iter() {
        if pattern.is_match(t) {
            return patch(json!({"material": {"color": hex}}));
        }
    }
    if let Some(caps) = HEX_COLOR.captures(t) {
        return patch(json!({"material": {"color": format!("#{}", &caps[1])}}));
    }

    if t.contains("zoom in") || t.contains("closer") {
        return patch(json!({"camera": {"distance": 1.6}}));
    }
    if t.contains("zoom out") || t.contains("further") {
        return patch(json!({"camera": {"distance": 3.2}}));
    }

    // "stop rotating" first so it is not swallowed by the "rotate" match.
    if t.contains("stop rotating") || t.contains("stop orbit") {
        return patch(json!({"camera": {"orbit": false}}));
    }
    if t.contains("start rotating") || t.contains("rotate") || t.contains("orbit") {
        return patch(json!({"camera": {"orbit": true}}));
    }

    if t.contains("remove enhance") || t == "plain" || t == "flat" {
        return patch(json!({"fx": {"rim": 0.0, "env_reflect": 0.0}}));
    }
    if t.contains("enhance") || t.contains("make it pop") || t.contains("stand out") {
        return patch(json!({"fx": {"rim": 0.6, "env_reflect": 0.3}}));
    }
    if t.contains("shiny") || t.contains("shinier") {
        return patch(json!({"material": {"roughness": 0.1}, "fx": {"rim": 0.4, "env_reflect": 0.3}}));
    }
    if t.contains("more rim") || t.contains("more edge") {
        return patch(json!({"fx": {"rim": 0.8}}));
    }
    if t.contains("less rim") {
        return patch(json!({"fx": {"rim": 0.2}}));
    }
    if t.contains("more reflection") {
        return patch(json!({"fx": {"env_reflect": 0.6}}));
    }
    if t.contains("less reflection") {
        return patch(json!({"fx": {"env_reflect": 0.1}}));
    }

    if t.contains("more outline") {
        return patch(json!({"fx": {"outline": 0.25}}));
    }
    if t.contains("less outline") {
        return patch(json!({"fx": {"outline": 0.05}}));
    }
    if t.contains("more bloom") || t.contains("glow") {
        return patch(json!({"fx": {"bloom": 0.35}}));
    }
    if t.contains("less bloom") || t.contains("reduce bloom") {
        return patch(json!({"fx": {"bloom": 0.05}}));
    }
    if t.contains("fade out") {
        return patch(json!({"fx": {"alpha": 0.0}}));
    }
    if t.contains("fade in") {
        return patch(json!({"fx": {"alpha": 1.0}}));
    }

    Patch::new()
}

fn object_patch(name: &str, utterance: &str) -> Patch {
    let mut body = json!({
        "object": {"name": name, "category": "generic"},
        "presentation": {"mode": "hero_on_pedestal"},
        "camera": {"orbit": true},
    });
    for (keyword, style) in STYLE_KEYWORDS {
        if utterance.contains(keyword) {
            body["presentation"]["style"] = json!(style);
            break;
        }
    }
    for hint in CATEGORY_HINTS.iter() {
        if hint.pattern.is_match(name) {
            body["object"]["category"] = json!(hint.category);
            body["shape_hint"] = json!({"primitive": hint.primitive, "features": hint.features});
            break;
        }
    }
    patch(body)
}

fn patch(value: Value) -> Patch {
    Patch::from_value(value).expect("rule output is a JSON object")
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::parse_command;

    fn field(patch: &stage_scene::Patch, path: &str) -> Option<Value> {
        let root = serde_json::to_value(patch).expect("patch should encode");
        let mut current = root;
        for segment in path.split('.') {
            current = current.get(segment)?.clone();
        }
        Some(current)
    }

    #[test]
    fn show_phone_sets_category_and_shape_hint() {
        let result = parse_command("show me a phone prototype");
        assert_eq!(field(&result, "object.name"), Some("phone prototype".into()));
        assert_eq!(
            field(&result, "object.category"),
            Some("consumer_electronics".into())
        );
        assert_eq!(field(&result, "shape_hint.primitive"), Some("rounded_slab".into()));
        let features = field(&result, "shape_hint.features").expect("features should exist");
        assert!(features.as_array().is_some_and(|f| f.contains(&"camera_bump".into())));
    }

    #[test]
    fn show_bottle_is_a_container() {
        let result = parse_command("show me a bottle");
        assert_eq!(field(&result, "object.name"), Some("bottle".into()));
        assert_eq!(field(&result, "object.category"), Some("product_container".into()));
        assert_eq!(field(&result, "shape_hint.primitive"), Some("cylinder".into()));
    }

    #[test]
    fn show_headset_is_an_audio_device() {
        let result = parse_command("show a headset");
        assert_eq!(field(&result, "object.name"), Some("headset".into()));
        assert_eq!(field(&result, "object.category"), Some("audio_device".into()));
    }

    #[test]
    fn unknown_object_falls_back_to_generic() {
        let result = parse_command("show me a widget");
        assert_eq!(field(&result, "object.name"), Some("widget".into()));
        assert_eq!(field(&result, "object.category"), Some("generic".into()));
    }

    #[test]
    fn display_variant_matches() {
        let result = parse_command("display an electric car");
        assert_eq!(field(&result, "object.name"), Some("electric car".into()));
    }

    #[test]
    fn embedded_style_lands_in_the_object_patch() {
        let result = parse_command("show me a wireframe phone");
        assert_eq!(field(&result, "object.name"), Some("wireframe phone".into()));
        assert_eq!(field(&result, "presentation.style"), Some("wireframe".into()));
    }

    #[test]
    fn named_colors_map_to_hex() {
        assert_eq!(
            field(&parse_command("make it red"), "material.color"),
            Some("#ff2b2b".into())
        );
        assert_eq!(
            field(&parse_command("make it blue"), "material.color"),
            Some("#2b6cff".into())
        );
        assert_eq!(
            field(&parse_command("set color to electric blue"), "material.color"),
            Some("#1e3cff".into())
        );
    }

    #[test]
    fn hex_colors_pass_through_lowercased() {
        assert_eq!(
            field(&parse_command("set color to #ff6b2b"), "material.color"),
            Some("#ff6b2b".into())
        );
        assert_eq!(
            field(&parse_command("color #FF6B2B"), "material.color"),
            Some("#ff6b2b".into())
        );
    }

    #[test]
    fn color_words_require_word_boundaries() {
        // "red" inside "reduce" must not match as a color.
        let result = parse_command("reduce bloom");
        assert_eq!(field(&result, "fx.bloom"), Some(0.05.into()));
    }

    #[test]
    fn zoom_commands_set_camera_distance() {
        assert_eq!(field(&parse_command("zoom in"), "camera.distance"), Some(1.6.into()));
        assert_eq!(field(&parse_command("zoom out"), "camera.distance"), Some(3.2.into()));
        assert_eq!(field(&parse_command("get closer"), "camera.distance"), Some(1.6.into()));
        assert_eq!(
            field(&parse_command("move further away"), "camera.distance"),
            Some(3.2.into())
        );
    }

    #[test]
    fn orbit_commands_toggle_rotation() {
        assert_eq!(field(&parse_command("start rotating"), "camera.orbit"), Some(true.into()));
        assert_eq!(field(&parse_command("stop rotating"), "camera.orbit"), Some(false.into()));
        assert_eq!(
            field(&parse_command("orbit the camera"), "camera.orbit"),
            Some(true.into())
        );
    }

    #[test]
    fn style_keywords_set_presentation_style() {
        assert_eq!(
            field(&parse_command("make it more futuristic"), "presentation.style"),
            Some("futuristic_holo".into())
        );
        assert_eq!(
            field(&parse_command("hologram style"), "presentation.style"),
            Some("futuristic_holo".into())
        );
        assert_eq!(
            field(&parse_command("make it glossy"), "presentation.style"),
            Some("glossy_studio".into())
        );
        assert_eq!(
            field(&parse_command("clay render please"), "presentation.style"),
            Some("clay".into())
        );
    }

    #[test]
    fn fx_knob_commands() {
        assert_eq!(field(&parse_command("more outline"), "fx.outline"), Some(0.25.into()));
        assert_eq!(field(&parse_command("less outline"), "fx.outline"), Some(0.05.into()));
        assert_eq!(field(&parse_command("add more bloom"), "fx.bloom"), Some(0.35.into()));
        assert_eq!(field(&parse_command("make it glow"), "fx.bloom"), Some(0.35.into()));
        assert_eq!(field(&parse_command("fade out"), "fx.alpha"), Some(0.0.into()));
        assert_eq!(field(&parse_command("fade in"), "fx.alpha"), Some(1.0.into()));
    }

    #[test]
    fn show_and_hide_phrases_control_alpha() {
        assert_eq!(field(&parse_command("hide it"), "fx.alpha"), Some(0.0.into()));
        assert_eq!(field(&parse_command("show it"), "fx.alpha"), Some(1.0.into()));
        // "show it" must not be parsed as an object named "it".
        assert!(field(&parse_command("show it"), "object").is_none());
    }

    #[test]
    fn enhance_cluster() {
        let popped = parse_command("make it pop");
        assert_eq!(field(&popped, "fx.rim"), Some(0.6.into()));
        assert_eq!(field(&popped, "fx.env_reflect"), Some(0.3.into()));

        let shiny = parse_command("make it shinier");
        assert_eq!(field(&shiny, "material.roughness"), Some(0.1.into()));
        assert_eq!(field(&shiny, "fx.rim"), Some(0.4.into()));

        let plain = parse_command("remove enhance");
        assert_eq!(field(&plain, "fx.rim"), Some(0.0.into()));
        assert_eq!(field(&plain, "fx.env_reflect"), Some(0.0.into()));
    }

    #[test]
    fn unknown_and_empty_commands_yield_empty_patches() {
        assert!(parse_command("do a backflip").is_empty());
        assert!(parse_command("").is_empty());
        assert!(parse_command("   ").is_empty());
    }

    #[test]
    fn input_is_case_and_whitespace_normalized() {
        assert_eq!(
            field(&parse_command("MAKE IT RED"), "material.color"),
            Some("#ff2b2b".into())
        );
        assert_eq!(
            field(&parse_command("show  me   a   phone"), "object.name"),
            Some("phone".into())
        );
    }
}
