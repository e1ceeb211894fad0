//! Candidate split points and their importance weights

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::domain::DomainError;

/// Kind of candidate split point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryKind {
    Heading,
    SectionBreak,
    Code,
    Table,
    ListItem,
    Quote,
    Paragraph,
    Sentence,
}

impl BoundaryKind {
    pub const ALL: [BoundaryKind; 8] = [
        BoundaryKind::Heading,
        BoundaryKind::SectionBreak,
        BoundaryKind::Code,
        BoundaryKind::Table,
        BoundaryKind::ListItem,
        BoundaryKind::Quote,
        BoundaryKind::Paragraph,
        BoundaryKind::Sentence,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Heading => "heading",
            Self::SectionBreak => "section_break",
            Self::Code => "code",
            Self::Table => "table",
            Self::ListItem => "list_item",
            Self::Quote => "quote",
            Self::Paragraph => "paragraph",
            Self::Sentence => "sentence",
        }
    }
}

/// A candidate split point
///
/// A chunk ending here ends at `start`; the next chunk resumes at `end`.
/// For zero-width boundaries (headings, block edges) both are equal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Boundary {
    pub kind: BoundaryKind,
    pub start: usize,
    pub end: usize,
    pub importance: f32,
}

impl Boundary {
    pub fn new(kind: BoundaryKind, start: usize, end: usize, importance: f32) -> Self {
        Self {
            kind,
            start,
            end: end.max(start),
            importance,
        }
    }

    /// Sentence and paragraph boundaries are the preferred overlap cut points
    pub fn is_soft(&self) -> bool {
        matches!(self.kind, BoundaryKind::Sentence | BoundaryKind::Paragraph)
    }
}

/// Per-kind importance weights
///
/// Defaults keep heading >= code/table >= list/quote >= paragraph >= sentence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportanceTable {
    weights: HashMap<BoundaryKind, f32>,
}

impl Default for ImportanceTable {
    fn default() -> Self {
        let weights = HashMap::from([
            (BoundaryKind::Heading, 1.0),
            (BoundaryKind::SectionBreak, 0.9),
            (BoundaryKind::Code, 0.8),
            (BoundaryKind::Table, 0.8),
            (BoundaryKind::ListItem, 0.6),
            (BoundaryKind::Quote, 0.6),
            (BoundaryKind::Paragraph, 0.5),
            (BoundaryKind::Sentence, 0.3),
        ]);

        Self { weights }
    }
}

impl ImportanceTable {
    /// Default table with configured overrides applied on top
    pub fn with_overrides(overrides: &HashMap<BoundaryKind, f32>) -> Result<Self, DomainError> {
        let mut table = Self::default();

        for (kind, weight) in overrides {
            if !(0.0..=1.0).contains(weight) {
                return Err(DomainError::configuration(format!(
                    "importance for '{}' must be within [0, 1], got {}",
                    kind.as_str(),
                    weight
                )));
            }
            table.weights.insert(*kind, *weight);
        }

        Ok(table)
    }

    pub fn weight(&self, kind: BoundaryKind) -> f32 {
        self.weights.get(&kind).copied().unwrap_or(0.0)
    }
}

/// Collapse boundaries sharing a `start` offset, keeping the most important one
///
/// Input must be sorted by `start`.
pub fn collapse_same_offset(boundaries: &[Boundary]) -> Vec<Boundary> {
    let mut collapsed: Vec<Boundary> = Vec::with_capacity(boundaries.len());

    for boundary in boundaries {
        match collapsed.last_mut() {
            Some(last) if last.start == boundary.start => {
                if boundary.importance > last.importance {
                    *last = *boundary;
                }
            }
            _ => collapsed.push(*boundary),
        }
    }

    collapsed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_ordering() {
        let table = ImportanceTable::default();
        let heading = table.weight(BoundaryKind::Heading);
        let code = table.weight(BoundaryKind::Code);
        let list = table.weight(BoundaryKind::ListItem);
        let paragraph = table.weight(BoundaryKind::Paragraph);
        let sentence = table.weight(BoundaryKind::Sentence);

        assert!(heading >= code);
        assert!(code >= list);
        assert!(list >= paragraph);
        assert!(paragraph >= sentence);
    }

    #[test]
    fn test_overrides() {
        let overrides = HashMap::from([(BoundaryKind::Sentence, 0.45)]);
        let table = ImportanceTable::with_overrides(&overrides).unwrap();
        assert_eq!(table.weight(BoundaryKind::Sentence), 0.45);
        assert_eq!(table.weight(BoundaryKind::Heading), 1.0);

        let invalid = HashMap::from([(BoundaryKind::Heading, 1.5)]);
        assert!(ImportanceTable::with_overrides(&invalid).is_err());
    }

    #[test]
    fn test_collapse_keeps_highest() {
        let boundaries = vec![
            Boundary::new(BoundaryKind::Sentence, 5, 6, 0.3),
            Boundary::new(BoundaryKind::Heading, 10, 10, 1.0),
            Boundary::new(BoundaryKind::Paragraph, 10, 12, 0.5),
            Boundary::new(BoundaryKind::Sentence, 20, 21, 0.3),
        ];

        let collapsed = collapse_same_offset(&boundaries);
        assert_eq!(collapsed.len(), 3);
        assert_eq!(collapsed[1].kind, BoundaryKind::Heading);
    }
}
