use serde::{Deserialize, Serialize};
use std::fmt;

use super::geometry::BBox;

/// The only classes the counting pipeline accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum WasteClass {
    #[serde(rename = "bottle")]
    Bottle,
    #[serde(rename = "can")]
    Can,
    #[serde(rename = "cardboard")]
    Cardboard,
    #[serde(rename = "glass bottle")]
    GlassBottle,
}

impl WasteClass {
    pub const ALL: [WasteClass; 4] = [
        WasteClass::Bottle,
        WasteClass::Can,
        WasteClass::Cardboard,
        WasteClass::GlassBottle,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            WasteClass::Bottle => "bottle",
            WasteClass::Can => "can",
            WasteClass::Cardboard => "cardboard",
            WasteClass::GlassBottle => "glass bottle",
        }
    }

    /// Exact label match; anything else is not a waste class.
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.label() == label)
    }
}

impl fmt::Display for WasteClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Raw detector output, any label the model knows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub label: String,
    pub score: f32,
    pub bbox: BBox,
}

impl Prediction {
    pub fn new(label: impl Into<String>, score: f32, bbox: BBox) -> Self {
        Self { label: label.into(), score, bbox }
    }
}

/// A whitelisted detection, ready for ROI filtering and counting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub class: WasteClass,
    pub score: f32,
    pub bbox: BBox,
}

impl Detection {
    pub fn new(class: WasteClass, score: f32, bbox: BBox) -> Self {
        Self { class, score, bbox }
    }

    /// Overlay text, e.g. `glass bottle (87%)`.
    pub fn caption(&self) -> String {
        format!("{} ({}%)", self.class, (self.score * 100.0).round() as u32)
    }
}

impl TryFrom<Prediction> for Detection {
    type Error = Prediction;

    fn try_from(p: Prediction) -> Result<Self, Self::Error> {
        match WasteClass::from_label(&p.label) {
            Some(class) => Ok(Detection { class, score: p.score, bbox: p.bbox }),
            None => Err(p),
        }
    }
}

/// Drops every prediction whose label is not a [`WasteClass`].
pub fn retain_waste(predictions: Vec<Prediction>) -> Vec<Detection> {
    predictions
        .into_iter()
        .filter_map(|p| Detection::try_from(p).ok())
        .collect()
}
