//! HTML to heading-marked text conversion

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

static WHITESPACE_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

static BLANK_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n{3,}").expect("valid blank-run regex"));

/// Converts HTML into markdown-like text
///
/// Headings become `#` lines, `pre` becomes a fenced block, list items become `- ` lines
/// and table rows become pipe rows, so the structure parser finds the same structure it
/// finds in markdown sources.
#[derive(Debug, Clone, Default)]
pub struct HtmlConverter;

impl HtmlConverter {
    pub fn new() -> Self {
        Self
    }

    pub fn convert(&self, html: &str) -> String {
        let document = Html::parse_document(html);
        let body_selector = Selector::parse("body").ok();

        let mut out = String::new();
        match body_selector
            .as_ref()
            .and_then(|sel| document.select(sel).next())
        {
            Some(body) => Self::render_children(&body, &mut out),
            None => Self::render_children(&document.root_element(), &mut out),
        }

        Self::normalize(&out)
    }

    /// Document `<title>`, if any
    pub fn title(&self, html: &str) -> Option<String> {
        let document = Html::parse_document(html);
        let title_selector = Selector::parse("title").ok()?;
        document
            .select(&title_selector)
            .next()
            .map(|el| Self::inline_text(&el))
            .filter(|s| !s.is_empty())
    }

    fn render_children(element: &ElementRef, out: &mut String) {
        for node in element.children() {
            if let Some(el) = ElementRef::wrap(node) {
                Self::render_element(&el, out);
            } else if let Some(txt) = node.value().as_text() {
                let collapsed = WHITESPACE_RUN.replace_all(txt, " ");
                if !(collapsed == " " && (out.is_empty() || out.ends_with('\n'))) {
                    out.push_str(&collapsed);
                }
            }
        }
    }

    fn render_element(el: &ElementRef, out: &mut String) {
        let tag = el.value().name();

        match tag {
            "script" | "style" | "noscript" | "head" | "template" => {}
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                let level = tag[1..].parse::<usize>().unwrap_or(1);
                let title = Self::inline_text(el);
                if !title.is_empty() {
                    Self::start_block(out);
                    out.push_str(&"#".repeat(level));
                    out.push(' ');
                    out.push_str(&title);
                    Self::start_block(out);
                }
            }
            "pre" => {
                let code: String = el.text().collect();
                Self::start_block(out);
                out.push_str("```\n");
                out.push_str(code.trim_end_matches('\n'));
                out.push_str("\n```");
                Self::start_block(out);
            }
            "li" => {
                Self::start_line(out);
                out.push_str("- ");
                out.push_str(&Self::inline_text(el));
                out.push('\n');
            }
            "table" => {
                Self::start_block(out);
                Self::render_table(el, out);
                Self::start_block(out);
            }
            "br" => out.push('\n'),
            "hr" => {
                Self::start_block(out);
                out.push_str("---");
                Self::start_block(out);
            }
            "p" | "div" | "section" | "article" | "blockquote" | "ul" | "ol" | "main"
            | "header" | "footer" | "nav" | "aside" => {
                Self::start_block(out);
                Self::render_children(el, out);
                Self::start_block(out);
            }
            _ => Self::render_children(el, out),
        }
    }

    fn render_table(table: &ElementRef, out: &mut String) {
        let (Ok(row_selector), Ok(cell_selector)) =
            (Selector::parse("tr"), Selector::parse("th, td"))
        else {
            return;
        };

        for (i, row) in table.select(&row_selector).enumerate() {
            let cells: Vec<String> = row
                .select(&cell_selector)
                .map(|cell| Self::inline_text(&cell).replace('|', "\\|"))
                .collect();
            if cells.is_empty() {
                continue;
            }

            out.push_str("| ");
            out.push_str(&cells.join(" | "));
            out.push_str(" |\n");

            if i == 0 {
                out.push('|');
                out.push_str(&" --- |".repeat(cells.len()));
                out.push('\n');
            }
        }
    }

    fn inline_text(el: &ElementRef) -> String {
        let text: String = el.text().collect();
        WHITESPACE_RUN.replace_all(&text, " ").trim().to_string()
    }

    fn start_block(out: &mut String) {
        if out.is_empty() {
            return;
        }
        while !out.ends_with("\n\n") {
            out.push('\n');
        }
    }

    fn start_line(out: &mut String) {
        if !out.is_empty() && !out.ends_with('\n') {
            out.push('\n');
        }
    }

    fn normalize(text: &str) -> String {
        let mut in_fence = false;
        let lines: Vec<&str> = text
            .lines()
            .map(|line| {
                if line.trim_start().starts_with("```") {
                    in_fence = !in_fence;
                    return line.trim();
                }
                if in_fence { line.trim_end() } else { line.trim() }
            })
            .collect();

        BLANK_RUN
            .replace_all(&lines.join("\n"), "\n\n")
            .trim()
            .to_string()
    }
}
