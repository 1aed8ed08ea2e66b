// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The 3D asset an activation attempt presents.

/// Surface the model is anchored to in AR.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Placement {
    /// Horizontal surfaces (the default for ground cover such as grass).
    #[default]
    Floor,
    /// Vertical surfaces.
    Wall,
}

impl Placement {
    /// Value of the viewer element's `ar-placement` attribute.
    pub fn as_attr(self) -> &'static str {
        match self {
            Self::Floor => "floor",
            Self::Wall => "wall",
        }
    }

    /// Parse an `ar-placement` attribute value. Unknown values yield `None`.
    pub fn from_attr(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "floor" => Some(Self::Floor),
            "wall" => Some(Self::Wall),
            _ => None,
        }
    }
}

/// Reference to the 3D asset supplied by the product UI.
///
/// Passed by value into the controller and immutable for the lifetime of an
/// attempt. The controller does not fetch or validate the URLs; a missing
/// asset surfaces as a readiness timeout.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AssetReference {
    /// glTF/GLB model used by the viewer element and Scene Viewer/WebXR.
    pub model_url: String,
    /// USDZ model handed to iOS Quick Look.
    #[cfg_attr(feature = "serde", serde(default))]
    pub ios_model_url: Option<String>,
    /// Poster image shown while the model loads.
    #[cfg_attr(feature = "serde", serde(default))]
    pub poster_url: Option<String>,
    /// Anchoring surface.
    #[cfg_attr(feature = "serde", serde(default))]
    pub placement: Placement,
}

impl AssetReference {
    /// Reference with only a primary model and floor placement.
    pub fn new(model_url: impl Into<String>) -> Self {
        Self {
            model_url: model_url.into(),
            ios_model_url: None,
            poster_url: None,
            placement: Placement::Floor,
        }
    }

    /// Attach a USDZ model for iOS.
    #[must_use]
    pub fn with_ios_model(mut self, url: impl Into<String>) -> Self {
        self.ios_model_url = Some(url.into());
        self
    }

    /// Attach a poster image.
    #[must_use]
    pub fn with_poster(mut self, url: impl Into<String>) -> Self {
        self.poster_url = Some(url.into());
        self
    }

    /// Override the placement.
    #[must_use]
    pub fn with_placement(mut self, placement: Placement) -> Self {
        self.placement = placement;
        self
    }
}
