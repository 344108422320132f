/// Section labels and their prompt lookup table.
///
/// The label set is closed. Every label carries a one-line hint used by the
/// classifier and default summary instructions used by the generator; both
/// lookups are exhaustive matches so a new label cannot ship without them.
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A topical section of the output document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum SectionLabel {
    Water,
    Fire,
    Administrative,
    Other,
}

impl SectionLabel {
    /// All labels, in output order.
    pub const ALL: [SectionLabel; 4] = [Self::Water, Self::Fire, Self::Administrative, Self::Other];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Water => "Water",
            Self::Fire => "Fire",
            Self::Administrative => "Administrative",
            Self::Other => "Other",
        }
    }

    /// Short parenthetical shown next to the label in classification prompts.
    #[must_use]
    pub fn hint(self) -> &'static str {
        match self {
            Self::Water => "floods, ports",
            Self::Fire => "wildfires, fire stations",
            Self::Administrative => "employees, establishments, admin support, etc.",
            Self::Other => "anything else",
        }
    }

    /// Default summary instructions for the section generator.
    #[must_use]
    pub fn default_instructions(self) -> &'static str {
        match self {
            Self::Water => {
                "Create a clear summary of these water provisions that:\n\
                 - Identifies key water related items\n\
                 - Highlights any budgetary requirements\n\
                 - Outlines specific procedures\n\
                 Use bullet points for clarity."
            }
            Self::Fire => {
                "Create a clear summary of these fire provisions that:\n\
                 - Identifies key fire related items\n\
                 - Highlights any budgetary requirements\n\
                 - Outlines specific procedures\n\
                 Use bullet points for clarity."
            }
            Self::Administrative => {
                "Create a clear summary of these administrative provisions that:\n\
                 - Identifies key administrative related items\n\
                 - Highlights any budgetary requirements\n\
                 - Outlines specific procedures\n\
                 Use bullet points for clarity."
            }
            Self::Other => {
                "Create a clear summary of this content that:\n\
                 - Highlights key points\n\
                 - Maintains important details\n\
                 - Preserves any specific requirements"
            }
        }
    }

    /// Interpret a classifier reply.
    ///
    /// The reply is trimmed and lower-cased, then must equal a label name
    /// exactly. Anything else is kept verbatim as unrecognized.
    #[must_use]
    pub fn parse_reply(reply: &str) -> LabelParse {
        let normalized = reply.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|label| label.name().to_lowercase() == normalized)
            .map_or_else(
                || LabelParse::Unrecognized(reply.trim().to_string()),
                LabelParse::Recognized,
            )
    }
}

impl fmt::Display for SectionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned when a string is not one of the known labels.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown section label: {0:?}")]
pub struct UnknownLabel(pub String);

impl FromStr for SectionLabel {
    type Err = UnknownLabel;

    /// Case-insensitive, whitespace-tolerant.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match Self::parse_reply(s) {
            LabelParse::Recognized(label) => Ok(label),
            LabelParse::Unrecognized(raw) => Err(UnknownLabel(raw)),
        }
    }
}

impl TryFrom<String> for SectionLabel {
    type Error = UnknownLabel;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SectionLabel> for String {
    fn from(label: SectionLabel) -> Self {
        label.name().to_string()
    }
}

/// Outcome of matching a classifier reply against the label set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LabelParse {
    Recognized(SectionLabel),
    Unrecognized(String),
}
