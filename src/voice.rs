//! Voice roster and reading-style presets for the synthesis backend.

/// The prebuilt voices the synthesis endpoint accepts, each with the
/// one-word character label shown to users.
pub const VOICES: &[(&str, &str)] = &[
    ("Puck", "Upbeat"),
    ("Kore", "Firm"),
    ("Charon", "Informative"),
    ("Enceladus", "Breathy"),
    ("Zephyr", "Bright"),
    ("Fenrir", "Excitable"),
    ("Aoede", "Breezy"),
    ("Leda", "Youthful"),
    ("Achernar", "Soft"),
    ("Sulafat", "Warm"),
    ("Gacrux", "Mature"),
    ("Schedar", "Even"),
];

/// Named reading-style presets mapping to natural-language directives.
pub const STYLES: &[(&str, &str)] = &[
    (
        "Storyteller",
        "Read expressively like an engaging storyteller with natural emotion",
    ),
    (
        "Narrator",
        "Read clearly in a calm, steady audiobook narrator voice",
    ),
    (
        "Podcast",
        "Read conversationally like a friendly podcast host",
    ),
];

/// True when `name` is one of the known prebuilt voices. Matching is
/// case-sensitive because the endpoint is.
pub fn is_known_voice(name: &str) -> bool {
    VOICES.iter().any(|(voice, _)| *voice == name)
}

/// Resolve a style setting to the directive sent to the engine.
///
/// A preset name (case-insensitive) maps to its directive; anything
/// else is treated as a free-text directive; an empty setting means
/// no directive at all.
pub fn resolve_style(style: &str) -> Option<String> {
    let trimmed = style.trim();
    if trimmed.is_empty() {
        return None;
    }
    for (name, directive) in STYLES {
        if name.eq_ignore_ascii_case(trimmed) {
            return Some((*directive).to_string());
        }
    }
    Some(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roster_has_twelve_voices() {
        assert_eq!(VOICES.len(), 12);
    }

    #[test]
    fn test_known_voice() {
        assert!(is_known_voice("Puck"));
        assert!(is_known_voice("Schedar"));
        assert!(!is_known_voice("puck"));
        assert!(!is_known_voice("HAL9000"));
    }

    #[test]
    fn test_resolve_preset_case_insensitive() {
        let directive = resolve_style("narrator").unwrap();
        assert!(directive.contains("audiobook narrator"));
        assert_eq!(resolve_style("Narrator"), resolve_style("NARRATOR"));
    }

    #[test]
    fn test_resolve_free_text_passthrough() {
        assert_eq!(
            resolve_style("Whisper everything ominously").as_deref(),
            Some("Whisper everything ominously")
        );
    }

    #[test]
    fn test_resolve_empty_is_none() {
        assert_eq!(resolve_style(""), None);
        assert_eq!(resolve_style("   "), None);
    }
}
