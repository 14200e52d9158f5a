use tracing::debug;

/// One step of an enhancement chain, applied to interleaved f32 samples
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Stage {
    /// Scale the signal so its peak hits just below full scale
    Normalize,
    /// One-pole low-pass filter with the given cutoff in Hz
    LowPass(f32),
    /// One-pole high-pass filter with the given cutoff in Hz
    HighPass(f32),
    /// Reverse the signal frame order
    Reverse,
}

/// Chain applied when the requested preset is unknown or missing
pub const DEFAULT_CHAIN: &[Stage] = &[Stage::Normalize];

/// Lookup table from preset name to enhancement chain
const PRESET_TABLE: &[(&str, &[Stage])] = &[
    ("clean", &[Stage::Normalize]),
    ("bass", &[Stage::LowPass(120.0)]),
    ("lofi", &[Stage::LowPass(6000.0), Stage::HighPass(200.0)]),
    ("fx", &[Stage::Normalize, Stage::Reverse]),
];

/// Resolve a preset name to its enhancement chain.
///
/// Unrecognized names fall back to [`DEFAULT_CHAIN`] unconditionally; an
/// unknown preset is not a failure condition.
pub fn resolve(preset: &str) -> &'static [Stage] {
    match PRESET_TABLE.iter().find(|(name, _)| *name == preset) {
        Some((_, chain)) => chain,
        None => {
            debug!(preset = %preset, "Unknown preset, falling back to default chain");
            DEFAULT_CHAIN
        }
    }
}

/// Names of all recognized presets
pub fn known_presets() -> impl Iterator<Item = &'static str> {
    PRESET_TABLE.iter().map(|(name, _)| *name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_known_presets() {
        assert_eq!(resolve("clean"), &[Stage::Normalize]);
        assert_eq!(resolve("bass"), &[Stage::LowPass(120.0)]);
        assert_eq!(
            resolve("lofi"),
            &[Stage::LowPass(6000.0), Stage::HighPass(200.0)]
        );
        assert_eq!(resolve("fx"), &[Stage::Normalize, Stage::Reverse]);
    }

    #[test]
    fn test_unknown_preset_falls_back() {
        assert_eq!(resolve("nonexistent"), DEFAULT_CHAIN);
        assert_eq!(resolve(""), DEFAULT_CHAIN);
        assert_eq!(resolve("CLEAN"), DEFAULT_CHAIN); // names are case-sensitive
    }

    #[test]
    fn test_known_presets_listing() {
        let names: Vec<_> = known_presets().collect();
        assert_eq!(names, vec!["clean", "bass", "lofi", "fx"]);
    }
}
