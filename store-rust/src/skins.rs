//! Presentation themes referenced by [`veemee_sdk::SkinId`].
use serde::Serialize;
use veemee_sdk::SkinId;

/// Easing curve of the bloom animation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Easing {
    OutQuad,
    OutCubic,
    OutExp,
}

impl Easing {
    /// Progress of the animation at time `t` in `[0, 1]`.
    #[must_use]
    pub fn apply(self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Self::OutQuad => 1.0 - (1.0 - t).powi(2),
            Self::OutCubic => 1.0 - (1.0 - t).powi(3),
            Self::OutExp => 1.0 - 2f64.powf(-10.0 * t),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MotionPreset {
    pub bloom_duration_ms: u32,
    pub bloom_opacity: f64,
    pub bloom_scale_from: f64,
    pub bloom_scale_to: f64,
    pub easing: Easing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackgroundStyle {
    Solid,
    Grid,
    Waves,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Skin {
    pub background: &'static str,
    pub surface: &'static str,
    pub text: &'static str,
    pub muted: &'static str,
    pub accent: &'static str,
    pub motion: MotionPreset,
    pub background_style: BackgroundStyle,
}

// neutral, calm
const SIMPLE: Skin = Skin {
    background: "#0B0C10",
    surface: "#14161D",
    text: "#F2F4F8",
    muted: "#A7B0C0",
    accent: "#7AA2FF",
    motion: MotionPreset {
        bloom_duration_ms: 220,
        bloom_opacity: 0.14,
        bloom_scale_from: 0.985,
        bloom_scale_to: 1.07,
        easing: Easing::OutCubic,
    },
    background_style: BackgroundStyle::Solid,
};

// crisp, structured
const GEO: Skin = Skin {
    background: "#070A12",
    surface: "#10162A",
    text: "#EAF0FF",
    muted: "rgba(234,240,255,0.62)",
    accent: "#6CF0C2",
    motion: MotionPreset {
        bloom_duration_ms: 160,
        bloom_opacity: 0.12,
        bloom_scale_from: 0.995,
        bloom_scale_to: 1.045,
        easing: Easing::OutQuad,
    },
    background_style: BackgroundStyle::Grid,
};

// slower, softer
const TIDE: Skin = Skin {
    background: "#060C0F",
    surface: "#0D1A20",
    text: "#EAF6FF",
    muted: "rgba(234,246,255,0.62)",
    accent: "#FFB86B",
    motion: MotionPreset {
        bloom_duration_ms: 320,
        bloom_opacity: 0.1,
        bloom_scale_from: 0.99,
        bloom_scale_to: 1.06,
        easing: Easing::OutExp,
    },
    background_style: BackgroundStyle::Waves,
};

#[must_use]
pub fn skin(id: SkinId) -> &'static Skin {
    match id {
        SkinId::Simple => &SIMPLE,
        SkinId::Geo => &GEO,
        SkinId::Tide => &TIDE,
    }
}
