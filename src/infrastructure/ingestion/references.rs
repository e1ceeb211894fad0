//! Cross-reference extraction, resolution and reference-based ranking

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::domain::ingestion::{
    ParsedDocument, Reference, ReferenceKind, SectionId, SectionTree, SourceLocation,
};
use crate::domain::DomainError;

/// Default free-text cross-reference phrase; capture group 1 is the target
pub const DEFAULT_SEE_ALSO_PATTERN: &str = r#"(?i)(?:see also|see (?:the )?(?:section|chapter)|refer to (?:the )?(?:section|chapter)|参见|详见)\s*[:：]?\s*["“「]?([^"”」\n.,;:()\[\]。，；：]+)"#;

static MARKDOWN_LINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[([^\]\n]+)\]\(([^)\s]+)[^)]*\)").expect("valid regex"));

static BRACKET_REFERENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[\[([^\[\]\n]+)\]\]").expect("valid regex"));

static NON_ALPHANUMERIC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\p{L}\p{N}]+").expect("valid regex"));

/// Generated heading id: lower-cased, non-alphanumeric runs collapsed to `-`
pub fn slugify(title: &str) -> String {
    NON_ALPHANUMERIC
        .replace_all(&title.to_lowercase(), "-")
        .trim_matches('-')
        .to_string()
}

/// A reference found in the text, before it is attached to a section
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawReference {
    pub kind: ReferenceKind,
    pub offset: usize,
    pub target_text: String,
    /// Explicit `#fragment` of a link target
    pub anchor: Option<String>,
}

/// Finds references with the three independent patterns
#[derive(Debug, Clone)]
pub struct ReferenceExtractor {
    see_also: Regex,
}

impl Default for ReferenceExtractor {
    fn default() -> Self {
        Self {
            see_also: Regex::new(DEFAULT_SEE_ALSO_PATTERN).expect("valid default pattern"),
        }
    }
}

impl ReferenceExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a custom "see also" pattern; its first capture group must hold the target
    pub fn with_see_also_pattern(pattern: &str) -> Result<Self, DomainError> {
        let see_also = Regex::new(pattern).map_err(|e| {
            DomainError::configuration(format!("Invalid see-also pattern: {}", e))
        })?;

        if see_also.captures_len() < 2 {
            return Err(DomainError::configuration(
                "see-also pattern must contain a capture group for the target",
            ));
        }

        Ok(Self { see_also })
    }

    /// All references in `text`, sorted by offset
    pub fn extract(&self, text: &str) -> Vec<RawReference> {
        let mut found = Vec::new();

        for caps in MARKDOWN_LINK.captures_iter(text) {
            let (Some(whole), Some(label), Some(target)) = (caps.get(0), caps.get(1), caps.get(2))
            else {
                continue;
            };

            // Links to other sites are not cross-references
            if is_external(target.as_str()) {
                continue;
            }

            // Skip image embeds
            if whole.start() > 0 && text[..whole.start()].ends_with('!') {
                continue;
            }

            let anchor = target
                .as_str()
                .split_once('#')
                .map(|(_, fragment)| fragment.to_string())
                .filter(|f| !f.is_empty());

            found.push(RawReference {
                kind: ReferenceKind::Link,
                offset: whole.start(),
                target_text: label.as_str().trim().to_string(),
                anchor,
            });
        }

        for caps in BRACKET_REFERENCE.captures_iter(text) {
            let (Some(whole), Some(inner)) = (caps.get(0), caps.get(1)) else {
                continue;
            };

            let target = inner
                .as_str()
                .split('|')
                .next()
                .unwrap_or_default()
                .trim();

            if target.is_empty() {
                continue;
            }

            found.push(RawReference {
                kind: ReferenceKind::Bracket,
                offset: whole.start(),
                target_text: target.to_string(),
                anchor: None,
            });
        }

        for caps in self.see_also.captures_iter(text) {
            let (Some(whole), Some(target)) = (caps.get(0), caps.get(1)) else {
                continue;
            };

            let target = target.as_str().trim();
            if target.is_empty() {
                continue;
            }

            found.push(RawReference {
                kind: ReferenceKind::SeeAlso,
                offset: whole.start(),
                target_text: target.to_string(),
                anchor: None,
            });
        }

        found.sort_by_key(|r| r.offset);
        found
    }
}

fn is_external(target: &str) -> bool {
    target.contains("://") || target.starts_with("mailto:")
}

/// Resolves target text against the heading ids of one document
#[derive(Debug)]
pub struct ReferenceResolver {
    by_anchor: HashMap<String, SectionId>,
    /// (title slug, section), first occurrence wins
    by_slug: Vec<(String, SectionId)>,
}

impl ReferenceResolver {
    pub fn new(tree: &SectionTree) -> Self {
        let mut by_anchor = HashMap::new();
        let mut by_slug: Vec<(String, SectionId)> = Vec::new();

        for section in tree.sections().iter().filter(|s| !s.is_root()) {
            by_anchor.insert(section.anchor.clone(), section.id);

            let slug = slugify(&section.title);
            if !slug.is_empty() && !by_slug.iter().any(|(s, _)| *s == slug) {
                by_slug.push((slug, section.id));
            }
        }

        Self { by_anchor, by_slug }
    }

    /// Resolve by explicit anchor first, then by title
    pub fn resolve(&self, raw: &RawReference) -> Option<SectionId> {
        raw.anchor
            .as_deref()
            .and_then(|anchor| {
                self.by_anchor
                    .get(anchor)
                    .or_else(|| self.by_anchor.get(&slugify(anchor)))
                    .copied()
            })
            .or_else(|| self.resolve_text(&raw.target_text))
    }

    /// Exact slug match, otherwise the longest heading slug the target starts with
    pub fn resolve_text(&self, target: &str) -> Option<SectionId> {
        let slug = slugify(target);
        if slug.is_empty() {
            return None;
        }

        if let Some(id) = self.by_anchor.get(&slug) {
            return Some(*id);
        }

        if let Some((_, id)) = self.by_slug.iter().find(|(s, _)| *s == slug) {
            return Some(*id);
        }

        self.by_slug
            .iter()
            .filter(|(s, _)| is_slug_prefix(s, &slug))
            .max_by_key(|(s, _)| s.len())
            .map(|(_, id)| *id)
    }
}

/// `prefix` ends at a word boundary of `slug`; CJK titles may run straight into the next word
fn is_slug_prefix(prefix: &str, slug: &str) -> bool {
    if !slug.starts_with(prefix) || prefix.len() >= slug.len() {
        return false;
    }

    slug[prefix.len()..].starts_with('-') || prefix.chars().last().is_some_and(|c| !c.is_ascii())
}

/// Turn raw references into located, resolved references
pub fn resolve_references(
    raw: Vec<RawReference>,
    tree: &SectionTree,
    section_at: impl Fn(usize) -> SectionId,
) -> Vec<Reference> {
    let resolver = ReferenceResolver::new(tree);

    raw.into_iter()
        .map(|r| {
            let section_id = section_at(r.offset);
            let section_title = tree
                .get(section_id)
                .map(|s| s.title.clone())
                .unwrap_or_default();
            let target_section_id = resolver.resolve(&r);

            Reference {
                kind: r.kind,
                source_location: SourceLocation {
                    offset: r.offset,
                    section_id,
                    section_title,
                },
                target_text: r.target_text,
                target_section_id,
                resolved: target_section_id.is_some(),
            }
        })
        .collect()
}

/// Tie-break policy for sections with equal reference counts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// Earlier sections first
    #[default]
    DocumentOrder,
    /// Alphabetical by title, then document order
    Title,
}

/// Resolved incoming reference counts per section
pub fn incoming_reference_counts(doc: &ParsedDocument) -> HashMap<SectionId, usize> {
    let mut counts: HashMap<SectionId, usize> = HashMap::new();

    for target in doc.references.iter().filter_map(|r| r.target_section_id) {
        *counts.entry(target).or_default() += 1;
    }

    counts
}

/// Headed sections ordered by how often they are referenced, most referenced first
pub fn rank_sections_by_references(
    doc: &ParsedDocument,
    tie_break: TieBreak,
) -> Vec<(SectionId, usize)> {
    let counts = incoming_reference_counts(doc);

    let mut ranked: Vec<(SectionId, usize)> = doc
        .tree
        .sections()
        .iter()
        .filter(|s| !s.is_root())
        .map(|s| (s.id, counts.get(&s.id).copied().unwrap_or(0)))
        .collect();

    ranked.sort_by(|(a_id, a_count), (b_id, b_count)| {
        b_count.cmp(a_count).then_with(|| match tie_break {
            TieBreak::DocumentOrder => a_id.cmp(b_id),
            TieBreak::Title => {
                let a_title = doc.tree.get(*a_id).map(|s| s.title.as_str());
                let b_title = doc.tree.get(*b_id).map(|s| s.title.as_str());
                a_title.cmp(&b_title).then_with(|| a_id.cmp(b_id))
            }
        })
    });

    ranked
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Getting Started!"), "getting-started");
        assert_eq!(slugify("  API -- v2 "), "api-v2");
        assert_eq!(slugify("安装 指南"), "安装-指南");
        assert_eq!(slugify("***"), "");
    }

    #[test]
    fn test_extract_all_kinds() {
        let text = "Read [the setup](#setup) first. Also [[Usage|how to use]]. See also Troubleshooting.";
        let refs = ReferenceExtractor::new().extract(text);

        assert_eq!(refs.len(), 3);
        assert_eq!(refs[0].kind, ReferenceKind::Link);
        assert_eq!(refs[0].anchor.as_deref(), Some("setup"));
        assert_eq!(refs[1].kind, ReferenceKind::Bracket);
        assert_eq!(refs[1].target_text, "Usage");
        assert_eq!(refs[2].kind, ReferenceKind::SeeAlso);
        assert_eq!(refs[2].target_text, "Troubleshooting");
    }

    #[test]
    fn test_external_links_and_images_skipped() {
        let text = "[site](https://example.com) and ![logo](logo.png)";
        assert!(ReferenceExtractor::new().extract(text).is_empty());
    }

    #[test]
    fn test_cjk_see_also() {
        let refs = ReferenceExtractor::new().extract("详见安装指南。");
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].target_text, "安装指南");
    }

    #[test]
    fn test_custom_pattern_requires_group() {
        assert!(ReferenceExtractor::with_see_also_pattern(r"cf\. (\w+)").is_ok());
        assert!(ReferenceExtractor::with_see_also_pattern(r"cf\. \w+").is_err());
        assert!(ReferenceExtractor::with_see_also_pattern(r"(unclosed").is_err());
    }

    #[test]
    fn test_slug_prefix() {
        assert!(is_slug_prefix("setup", "setup-for-details"));
        assert!(!is_slug_prefix("set", "setup-for-details"));
        assert!(is_slug_prefix("安装指南", "安装指南以获取更多信息"));
    }
}
