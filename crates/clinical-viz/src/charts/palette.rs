//! Shared registry of named color palettes.
//!
//! All three synthesizers resolve `palette` options through this table, so a
//! palette name means the same colors in every chart.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use serde_json::{Value, json};

use crate::config::Palette;

static PALETTES: Lazy<BTreeMap<&'static str, &'static [&'static str]>> = Lazy::new(|| {
    let mut palettes: BTreeMap<&'static str, &'static [&'static str]> = BTreeMap::new();
    palettes.insert(
        "deep",
        &[
            "#55A868", "#DD8452", "#C44E52", "#4C72B0", "#8172B3", "#937860", "#DA8BC3",
            "#8C8C8C", "#CCB974", "#64B5CD",
        ],
    );
    palettes.insert(
        "deep6",
        &["#4C72B0", "#55A868", "#C44E52", "#8172B3", "#CCB974", "#64B5CD"],
    );
    palettes.insert(
        "muted",
        &[
            "#4878D0", "#EE854A", "#6ACC64", "#D65F5F", "#956CB4", "#8C613C", "#DC7EC0",
            "#797979", "#D5BB67", "#82C6E2",
        ],
    );
    palettes.insert(
        "muted6",
        &["#4878D0", "#6ACC64", "#D65F5F", "#956CB4", "#D5BB67", "#82C6E2"],
    );
    palettes.insert(
        "pastel",
        &[
            "#A1C9F4", "#FFB482", "#8DE5A1", "#FF9F9B", "#D0BBFF", "#DEBB9B", "#FAB0E4",
            "#CFCFCF", "#FFFEA3", "#B9F2F0",
        ],
    );
    palettes.insert(
        "pastel6",
        &["#A1C9F4", "#8DE5A1", "#FF9F9B", "#D0BBFF", "#FFFEA3", "#B9F2F0"],
    );
    palettes.insert(
        "bright",
        &[
            "#023EFF", "#FF7C00", "#1AC938", "#E8000B", "#8B2BE2", "#9F4800", "#F14CC1",
            "#A3A3A3", "#FFC400", "#00D7FF",
        ],
    );
    palettes.insert(
        "bright6",
        &["#023EFF", "#1AC938", "#E8000B", "#8B2BE2", "#FFC400", "#00D7FF"],
    );
    palettes.insert(
        "dark",
        &[
            "#001C7F", "#B1400D", "#12711C", "#8C0800", "#591E71", "#592F0D", "#A23582",
            "#3C3C3C", "#B8850A", "#006374",
        ],
    );
    palettes.insert(
        "dark6",
        &["#001C7F", "#12711C", "#8C0800", "#591E71", "#B8850A", "#006374"],
    );
    palettes.insert(
        "colorblind",
        &[
            "#0173B2", "#DE8F05", "#029E73", "#D55E00", "#CC78BC", "#CA9161", "#FBAFE4",
            "#949494", "#ECE133", "#56B4E9",
        ],
    );
    palettes.insert(
        "colorblind6",
        &["#0173B2", "#029E73", "#D55E00", "#CC78BC", "#ECE133", "#56B4E9"],
    );
    palettes
});

/// Colors of a registered palette.
pub fn named(name: &str) -> Option<&'static [&'static str]> {
    PALETTES.get(name).copied()
}

/// Names of all registered palettes, sorted.
pub fn names() -> Vec<&'static str> {
    PALETTES.keys().copied().collect()
}

/// A palette resolved to what the renderer receives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColorScale {
    /// Explicit color range.
    Range(Vec<String>),
    /// Renderer-side scheme name.
    Scheme(String),
}

impl ColorScale {
    /// Registered names expand to their colors; unknown names pass through as a scheme.
    pub fn resolve(palette: &Palette) -> Self {
        match palette {
            Palette::Colors(colors) => ColorScale::Range(colors.clone()),
            Palette::Named(name) => match named(name) {
                Some(colors) => ColorScale::Range(colors.iter().map(|c| c.to_string()).collect()),
                None => ColorScale::Scheme(name.clone()),
            },
        }
    }

    /// The `scale` object of a color encoding.
    pub fn to_value(&self) -> Value {
        match self {
            ColorScale::Range(colors) => json!({ "range": colors }),
            ColorScale::Scheme(name) => json!({ "scheme": name }),
        }
    }
}
