use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Writing style the assistant uses for its final report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStyle {
    /// Formal, citation-heavy prose.
    #[default]
    Academic,
    /// Approachable explanations for a general audience.
    PopularScience,
    /// Journalistic reporting.
    News,
    /// Short posts suitable for social platforms.
    SocialMedia,
}

impl ReportStyle {
    /// All styles, in display order.
    pub const ALL: [ReportStyle; 4] = [
        ReportStyle::Academic,
        ReportStyle::PopularScience,
        ReportStyle::News,
        ReportStyle::SocialMedia,
    ];

    /// The wire name of this style.
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportStyle::Academic => "academic",
            ReportStyle::PopularScience => "popular_science",
            ReportStyle::News => "news",
            ReportStyle::SocialMedia => "social_media",
        }
    }
}

impl fmt::Display for ReportStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ReportStyle::ALL
            .into_iter()
            .find(|style| style.as_str() == s)
            .ok_or_else(|| format!("unknown report style: {s}"))
    }
}
