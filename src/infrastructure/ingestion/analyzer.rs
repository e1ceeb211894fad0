//! Document feature analysis and adaptive parameter selection

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use super::parser::StructureParser;
use crate::domain::ingestion::chunker::helpers;
use crate::domain::ingestion::{
    ChunkingParams, ChunkingStrategy, DocumentFeatures, FormatHint, ParsedDocument,
    SpecialBlockKind,
};

static IMAGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)!\[[^\]]*\]\([^)]*\)|<img\b").expect("valid regex"));

static PARAGRAPH_GAP: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n[ \t]*\n").expect("valid regex"));

/// Inspects documents and picks chunking parameters for them
#[derive(Debug, Clone, Default)]
pub struct DocumentFeatureAnalyzer {
    parser: StructureParser,
}

impl DocumentFeatureAnalyzer {
    pub fn new(parser: StructureParser) -> Self {
        Self { parser }
    }

    /// Parse `text` and describe it; a parse failure is reported in the features
    pub fn analyze(&self, text: &str, hint: FormatHint) -> DocumentFeatures {
        match self.parser.parse(text, hint) {
            Ok(doc) => Self::features_of(text, &doc),
            Err(e) => {
                debug!(error = %e, "Structure parsing failed during analysis");
                DocumentFeatures {
                    parse_failed: true,
                    ..Self::text_features(text)
                }
            }
        }
    }

    /// Describe an already parsed document
    pub fn features_of(text: &str, doc: &ParsedDocument) -> DocumentFeatures {
        let has_kind = |kind: SpecialBlockKind| doc.special_blocks.iter().any(|b| b.kind == kind);

        DocumentFeatures {
            has_table: has_kind(SpecialBlockKind::Table),
            has_code: has_kind(SpecialBlockKind::Code),
            has_list: has_kind(SpecialBlockKind::List),
            structure_depth: doc.tree.depth(),
            heading_count: doc.tree.heading_count(),
            ..Self::text_features(text)
        }
    }

    /// Size-level features that need no parse
    pub fn text_features(text: &str) -> DocumentFeatures {
        let paragraph_count = if text.trim().is_empty() {
            0
        } else {
            PARAGRAPH_GAP
                .split(text)
                .filter(|p| !p.trim().is_empty())
                .count()
        };

        DocumentFeatures {
            estimated_size: helpers::char_len(text),
            estimated_tokens: helpers::estimate_tokens(text),
            has_images: IMAGE.is_match(text),
            paragraph_count,
            ..DocumentFeatures::default()
        }
    }

    /// Choose parameters for a document; a pure function of its features
    ///
    /// - parsing failed: fixed-size with the base sizes
    /// - deep structure (3+ heading levels), code or tables: hierarchical, 1.5x target
    /// - two or more headings: hierarchical
    /// - anything else: semantic
    pub fn choose_params(features: &DocumentFeatures, base: &ChunkingParams) -> ChunkingParams {
        if features.parse_failed {
            return base.clone().with_strategy(ChunkingStrategy::FixedSize);
        }

        if features.is_deeply_structured() || features.has_code || features.has_table {
            let target = base.target_size + base.target_size / 2;
            let max = base.max_size.max(target) + base.max_size / 2;

            return ChunkingParams {
                target_size: target,
                max_size: max,
                strategy: ChunkingStrategy::Hierarchical,
                ..base.clone()
            };
        }

        if features.heading_count >= 2 {
            return base.clone().with_strategy(ChunkingStrategy::Hierarchical);
        }

        base.clone().with_strategy(ChunkingStrategy::Semantic)
    }
}
