//! Domain-specific types for the edge glow

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Which screen edges the glow covers
///
/// Persisted as a short string (`"all"`, `"top"`, `"top_sides"`, `"sides"`).
/// Any other string deserializes to [`EdgeSelection::All`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EdgeSelection {
    /// Top, bottom, left and right
    #[default]
    All,
    /// Top bar only
    TopOnly,
    /// Top bar plus both side bars
    TopSides,
    /// Both side bars only
    SidesOnly,
}

impl EdgeSelection {
    /// Every selectable value, in menu order
    pub const ALL_OPTIONS: [EdgeSelection; 4] = [
        EdgeSelection::All,
        EdgeSelection::TopOnly,
        EdgeSelection::TopSides,
        EdgeSelection::SidesOnly,
    ];

    /// Persisted identifier
    pub fn as_str(self) -> &'static str {
        match self {
            EdgeSelection::All => "all",
            EdgeSelection::TopOnly => "top",
            EdgeSelection::TopSides => "top_sides",
            EdgeSelection::SidesOnly => "sides",
        }
    }

    /// Human-readable label
    pub fn label(self) -> &'static str {
        match self {
            EdgeSelection::All => "All Edges",
            EdgeSelection::TopOnly => "Top Only",
            EdgeSelection::TopSides => "Top + Sides",
            EdgeSelection::SidesOnly => "Sides Only",
        }
    }

    /// Parse a persisted identifier, returning `None` for unknown values
    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL_OPTIONS
            .into_iter()
            .find(|selection| selection.as_str() == value)
    }
}

impl From<String> for EdgeSelection {
    fn from(value: String) -> Self {
        Self::parse(&value).unwrap_or_else(|| {
            warn!(edge_selection = %value, "Unknown edge selection, falling back to all edges");
            EdgeSelection::All
        })
    }
}

impl From<EdgeSelection> for String {
    fn from(selection: EdgeSelection) -> Self {
        selection.as_str().to_string()
    }
}

impl std::fmt::Display for EdgeSelection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}
