/// Sectioned documents: generated output and reference exemplars share
/// this shape.
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::PipelineError;
use crate::section::SectionLabel;

/// Narrative text per section label. Only labels that actually occur are
/// present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document {
    pub sections: BTreeMap<SectionLabel, String>,
}

impl Document {
    #[must_use]
    pub fn new(sections: BTreeMap<SectionLabel, String>) -> Self {
        Self { sections }
    }

    #[must_use]
    pub fn get(&self, label: SectionLabel) -> Option<&str> {
        self.sections.get(&label).map(String::as_str)
    }

    #[must_use]
    pub fn labels(&self) -> Vec<SectionLabel> {
        self.sections.keys().copied().collect()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// Load a document from a JSON object keyed by label name.
    pub fn load(path: &Path) -> Result<Self, PipelineError> {
        let data = std::fs::read_to_string(path)?;
        serde_json::from_str(&data)
            .map_err(|e| PipelineError::Document(format!("{}: {e}", path.display())))
    }

    pub fn save(&self, path: &Path) -> Result<(), PipelineError> {
        let data = serde_json::to_string_pretty(self)
            .map_err(|e| PipelineError::Document(e.to_string()))?;
        std::fs::write(path, data)?;
        Ok(())
    }
}

impl FromIterator<(SectionLabel, String)> for Document {
    fn from_iter<I: IntoIterator<Item = (SectionLabel, String)>>(iter: I) -> Self {
        Self {
            sections: iter.into_iter().collect(),
        }
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "=".repeat(80);
        writeln!(f, "{rule}")?;
        for (label, text) in &self.sections {
            writeln!(f, "SECTION: {}", label.name().to_uppercase())?;
            writeln!(f, "{}", "-".repeat(40))?;
            writeln!(f, "{text}")?;
            writeln!(f, "{rule}")?;
        }
        Ok(())
    }
}
