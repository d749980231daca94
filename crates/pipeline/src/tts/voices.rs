//! Static voice catalog

use retail_voice_core::VoiceInfo;

/// Standard voice ids mapped to the synthesis backend model
const VOICE_MAP: &[(&str, &str)] = &[
    ("alloy", "aura-2-thalia-en"),
    ("echo", "aura-2-luna-en"),
    ("fable", "aura-2-stella-en"),
    ("onyx", "aura-2-arcas-en"),
    ("nova", "aura-2-thalia-en"),
    ("shimmer", "aura-2-hera-en"),
];

/// Backend model for a requested voice; unknown ids pass through unchanged
pub fn resolve_voice(voice_id: &str) -> String {
    VOICE_MAP
        .iter()
        .find(|(id, _)| id.eq_ignore_ascii_case(voice_id))
        .map(|(_, model)| (*model).to_string())
        .unwrap_or_else(|| voice_id.to_string())
}

/// Voices offered to clients
pub fn available_voices() -> Vec<VoiceInfo> {
    vec![
        VoiceInfo::new("alloy", "Alloy", "Neutral, balanced voice", "standard"),
        VoiceInfo::new("echo", "Echo", "Clear, articulate voice", "standard"),
        VoiceInfo::new("fable", "Fable", "Warm, storytelling voice", "standard"),
        VoiceInfo::new("onyx", "Onyx", "Deep, authoritative voice", "standard"),
        VoiceInfo::new("nova", "Nova", "Bright, energetic voice", "standard"),
        VoiceInfo::new("shimmer", "Shimmer", "Gentle, soothing voice", "standard"),
        VoiceInfo::new("aura-2-thalia-en", "Thalia", "Deepgram Aura Thalia", "deepgram"),
        VoiceInfo::new("aura-2-luna-en", "Luna", "Deepgram Aura Luna", "deepgram"),
        VoiceInfo::new("aura-2-stella-en", "Stella", "Deepgram Aura Stella", "deepgram"),
        VoiceInfo::new("aura-2-arcas-en", "Arcas", "Deepgram Aura Arcas", "deepgram"),
        VoiceInfo::new("aura-2-hera-en", "Hera", "Deepgram Aura Hera", "deepgram"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_standard_voice() {
        assert_eq!(resolve_voice("alloy"), "aura-2-thalia-en");
        assert_eq!(resolve_voice("Shimmer"), "aura-2-hera-en");
    }

    #[test]
    fn test_unknown_voice_passes_through() {
        assert_eq!(resolve_voice("aura-2-luna-en"), "aura-2-luna-en");
    }

    #[test]
    fn test_catalog() {
        let voices = available_voices();
        assert_eq!(voices.len(), 11);
        assert_eq!(voices.iter().filter(|v| v.kind == "deepgram").count(), 5);
    }
}
