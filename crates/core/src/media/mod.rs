use std::{collections::HashMap, fmt, str::FromStr};

use url::Url;

use crate::{
    material::MaterialBinding, scene::ParameterValue, texture::TextureHandle,
    PhysicalMediaError, Result,
};

/// Straight (non-premultiplied) RGBA color with components in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgba {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Rgba {
    pub const BLACK: Self = Self::new(0.0, 0.0, 0.0, 1.0);

    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    pub fn opacity(&self) -> f32 {
        self.a
    }
}

impl FromStr for Rgba {
    type Err = PhysicalMediaError;

    /// Parses `RRGGBB` or `RRGGBBAA`, with or without a leading `#`.
    fn from_str(value: &str) -> Result<Self> {
        let hex = value.trim().trim_start_matches('#');
        if !matches!(hex.len(), 6 | 8) || !hex.is_ascii() {
            return Err(PhysicalMediaError::msg(format!(
                "expected RRGGBB or RRGGBBAA color, got `{value}`"
            )));
        }

        let channel = |index: usize| -> Result<f32> {
            let digits = &hex[index * 2..index * 2 + 2];
            u8::from_str_radix(digits, 16)
                .map(|byte| f32::from(byte) / 255.0)
                .map_err(|_| PhysicalMediaError::msg(format!("invalid color channel `{digits}`")))
        };

        let alpha = if hex.len() == 8 { channel(3)? } else { 1.0 };
        Ok(Self::new(channel(0)?, channel(1)?, channel(2)?, alpha))
    }
}

/// User-editable configuration of one preview.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaAppearance {
    pub art_source: Url,
    pub primary_color: Option<Rgba>,
    /// Relative model scale, `0.0` to `1.0`.
    pub scale: f32,
}

fn default_scale() -> f32 {
    1.0
}

impl MediaAppearance {
    pub fn new(art_source: Url) -> Self {
        Self {
            art_source,
            primary_color: None,
            scale: default_scale(),
        }
    }

    pub fn with_color(mut self, color: Rgba) -> Self {
        self.primary_color = Some(color);
        self
    }

    pub fn with_scale(mut self, scale: f32) -> Self {
        self.scale = scale;
        self
    }

    /// Scale clamped to `[0, 1]`; non-finite input falls back to `1.0`.
    pub fn clamped_scale(&self) -> f32 {
        if self.scale.is_finite() {
            self.scale.clamp(0.0, 1.0)
        } else {
            default_scale()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    VinylRecord,
    CompactDisc,
    CompactCassette,
}

impl MediaKind {
    pub const ALL: [Self; 3] = [Self::VinylRecord, Self::CompactDisc, Self::CompactCassette];
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::VinylRecord => "vinyl record",
            Self::CompactDisc => "compact disc",
            Self::CompactCassette => "compact cassette",
        };
        f.write_str(label)
    }
}

/// Parts restyled with the primary color and its opacity.
#[derive(Debug, Clone, PartialEq)]
pub struct TintSlots {
    pub parts: Vec<String>,
    pub color_parameter: String,
    pub opacity_parameter: String,
}

/// Renderer-side names for one kind of physical media.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaModel {
    pub kind: MediaKind,
    pub entity_name: String,
    pub default_scale_factor: f32,
    pub art_parts: Vec<String>,
    pub art_parameter: String,
    pub tint: Option<TintSlots>,
}

impl MediaModel {
    pub fn vinyl_record() -> Self {
        Self {
            kind: MediaKind::VinylRecord,
            entity_name: "vinyl_record".to_string(),
            default_scale_factor: 10.0,
            art_parts: names(&["vinyl_record_jacket_1420_paper"]),
            art_parameter: ALBUM_ART_PARAMETER.to_string(),
            tint: Some(TintSlots {
                parts: names(&["vinyl_record_jacket_1420_plastic"]),
                color_parameter: "vinylColor".to_string(),
                opacity_parameter: "vinylOpacity".to_string(),
            }),
        }
    }

    pub fn compact_disc() -> Self {
        Self {
            kind: MediaKind::CompactDisc,
            entity_name: "cd".to_string(),
            default_scale_factor: 10.0,
            art_parts: names(&["Booklet_Front", "Booklet_Back"]),
            art_parameter: ALBUM_ART_PARAMETER.to_string(),
            tint: None,
        }
    }

    pub fn compact_cassette() -> Self {
        Self {
            kind: MediaKind::CompactCassette,
            entity_name: "cassette".to_string(),
            default_scale_factor: 20.0,
            art_parts: names(&["Cover"]),
            art_parameter: ALBUM_ART_PARAMETER.to_string(),
            tint: Some(TintSlots {
                parts: names(&[
                    "A",
                    "B",
                    "Cover_1",
                    "Cover_Holder",
                    "Holder_Glass",
                    "Push_1",
                    "Push_2",
                    "Cover_2",
                    "Cover_Holder_1",
                    "Holder_Glass_1",
                ]),
                color_parameter: "cassetteColor".to_string(),
                opacity_parameter: "cassetteOpacity".to_string(),
            }),
        }
    }

    pub fn scale_factor(&self, appearance: &MediaAppearance) -> f32 {
        appearance.clamped_scale() * self.default_scale_factor
    }

    /// Material bindings that restyle this model with `appearance`.
    ///
    /// Art parts receive the texture. Tint parts are only bound when the
    /// appearance carries a color.
    pub fn bindings(
        &self,
        appearance: &MediaAppearance,
        texture: &TextureHandle,
    ) -> Vec<MaterialBinding> {
        let mut bindings: Vec<MaterialBinding> = self
            .art_parts
            .iter()
            .map(|part| {
                MaterialBinding::new(part.clone())
                    .with(&self.art_parameter, ParameterValue::Texture(texture.clone()))
            })
            .collect();

        if let (Some(tint), Some(color)) = (&self.tint, appearance.primary_color) {
            bindings.extend(tint.parts.iter().map(|part| {
                MaterialBinding::new(part.clone())
                    .with(&tint.color_parameter, ParameterValue::Color(color))
                    .with(&tint.opacity_parameter, ParameterValue::Scalar(color.opacity()))
            }));
        }

        bindings
    }
}

const ALBUM_ART_PARAMETER: &str = "albumArt";

fn names(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|part| part.to_string()).collect()
}

/// Registry of the media models a host can preview.
#[derive(Debug, Default)]
pub struct MediaCatalog {
    models: HashMap<MediaKind, MediaModel>,
}

impl MediaCatalog {
    pub fn new() -> Self {
        Self {
            models: HashMap::new(),
        }
    }

    /// Catalog holding the vinyl record, compact disc and compact cassette.
    pub fn standard() -> Self {
        let mut catalog = Self::new();
        catalog.register(MediaModel::vinyl_record());
        catalog.register(MediaModel::compact_disc());
        catalog.register(MediaModel::compact_cassette());
        catalog
    }

    pub fn register(&mut self, model: MediaModel) {
        self.models.insert(model.kind, model);
    }

    pub fn models(&self) -> impl Iterator<Item = &MediaModel> {
        self.models.values()
    }

    pub fn model(&self, kind: MediaKind) -> Result<&MediaModel> {
        self.models
            .get(&kind)
            .ok_or_else(|| PhysicalMediaError::msg(format!("no model registered for {kind}")))
    }
}
