// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

/// Extracts description, keywords and homepage from README anchors.
///
/// READMEs embed three HTML anchors alongside the markdown:
/// - `id="intro"`: introductory description text
/// - `id="keywords"`: a list whose `<li>` items are the keywords
/// - `id="url"`: a link to the canonical homepage
///
/// Only live markup is searched: fenced and indented code blocks, code spans
/// and HTML comments are blanked first, so an anchor shown in a code sample
/// is never mistaken for the real one.
///
/// Extraction is pure. Writing the resolved fields back into the package
/// descriptor is a separate step, [`merge_into_descriptor`].
use std::{
    fs,
    path::{Path, PathBuf},
    sync::LazyLock,
};

use masterror::AppError;
use regex::Regex;
use serde_json::Value;
use tracing::{debug, warn};

use crate::registry::descriptor_path;

/// File name of the documentation file at a repository root.
pub const README_FILE: &str = "README.md";

static OPEN_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<([A-Za-z][A-Za-z0-9]*)\b([^>]*)>").expect("valid regex"));
static ID_ATTR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\bid\s*=\s*["']([^"']*)["']"#).expect("valid regex"));
static HREF_ATTR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\bhref\s*=\s*["']([^"']*)["']"#).expect("valid regex"));
static ANCHOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<a\b([^>]*)>").expect("valid regex"));
static LIST_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<(/?)(ul|ol|li)\b[^>]*>").expect("valid regex"));
static ANY_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").expect("valid regex"));
static KEYWORDS_HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s{0,3}#{1,6}\s*keywords\s*#*\s*$").expect("valid regex"));
static BULLET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*[-*+]\s+(.+?)\s*$").expect("valid regex"));
static LIST_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^ {0,3}(?:[-*+]|\d{1,9}[.)])(?:\s|$)").expect("valid regex"));
static FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^ {0,3}(`{3,}|~{3,})(.*)$").expect("valid regex"));
static CODE_SPAN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"``[^\n]*?``|`[^`\n]*`").expect("valid regex"));
static COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").expect("valid regex"));

/// Documentation-derived metadata of a repository.
///
/// Absent anchors leave their field empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadmeMeta {
    pub description: String,
    pub keywords: Vec<String>,
    pub homepage: String,
}

/// Extracts [`ReadmeMeta`] from README markdown.
///
/// # Examples
///
/// ```
/// use repometa::extract_readme;
///
/// let markdown = r#"
/// # Richie
/// <p id="intro">Static site
/// optimiser.</p>
/// <ul id="keywords"><li>SEO</li><li>Static</li></ul>
/// <a id="url" href="https://richie.example">Homepage</a>
/// "#;
///
/// let meta = extract_readme(markdown);
/// assert_eq!(meta.description, "Static site optimiser.");
/// assert_eq!(meta.keywords, vec!["seo", "static"]);
/// assert_eq!(meta.homepage, "https://richie.example");
/// ```
pub fn extract(markdown: &str) -> ReadmeMeta {
    let live = live_markup(markdown);
    let markdown = live.as_str();

    let description = find_element(markdown, "intro")
        .map(|element| flatten_text(element.inner))
        .unwrap_or_default();

    let keywords = match find_element(markdown, "keywords") {
        Some(element) => list_items(element.inner),
        None => heading_keywords(markdown),
    };

    let homepage = find_element(markdown, "url")
        .and_then(|element| element_href(&element))
        .unwrap_or_default();

    ReadmeMeta {
        description,
        keywords,
        homepage,
    }
}

/// Path of the README under `root`.
pub fn readme_path(root: &Path) -> PathBuf {
    root.join(README_FILE)
}

/// Reads and extracts the README under `root`.
///
/// Returns `None` when the file is missing or unreadable, so callers can
/// tell "no documentation" apart from "documentation without anchors".
pub fn read_readme(root: &Path) -> Option<ReadmeMeta> {
    let path = readme_path(root);
    match fs::read_to_string(&path) {
        Ok(contents) => Some(extract(&contents)),
        Err(error) => {
            debug!("no README at {}: {}", path.display(), error);
            None
        }
    }
}

/// Merges resolved fields into the package descriptor at `path`.
///
/// Existing keys keep their position; `homepage`, `description` and
/// `keywords` are overwritten or appended. The file is rewritten with
/// two-space indentation.
///
/// # Errors
///
/// Returns [`AppError`] when the descriptor cannot be read, is not a JSON
/// object, or cannot be written back.
pub fn merge_into_descriptor(path: &Path, meta: &ReadmeMeta) -> Result<(), AppError> {
    let contents = fs::read_to_string(path).map_err(|e| {
        AppError::service(format!("failed to read descriptor {}: {e}", path.display()))
    })?;

    let mut document: Value = serde_json::from_str(&contents).map_err(|e| {
        AppError::validation(format!("invalid descriptor {}: {e}", path.display()))
    })?;

    let Some(object) = document.as_object_mut() else {
        return Err(AppError::validation(format!(
            "descriptor {} is not a JSON object",
            path.display()
        )));
    };

    object.insert("homepage".to_owned(), Value::from(meta.homepage.clone()));
    object.insert("description".to_owned(), Value::from(meta.description.clone()));
    object.insert("keywords".to_owned(), Value::from(meta.keywords.clone()));

    let rendered = serde_json::to_string_pretty(&document).map_err(|e| {
        AppError::internal(format!("failed to render descriptor {}: {e}", path.display()))
    })?;

    fs::write(path, rendered).map_err(|e| {
        AppError::service(format!("failed to write descriptor {}: {e}", path.display()))
    })
}

/// Resolves README metadata for a local repository and back-writes it into
/// the package descriptor when one exists.
///
/// Never fails: a missing README yields empty fields and skips the
/// back-write, and a missing or malformed descriptor is logged.
pub fn resolve_readme(root: &Path) -> ReadmeMeta {
    let Some(meta) = read_readme(root) else {
        return ReadmeMeta::default();
    };

    let descriptor = descriptor_path(root);
    if descriptor.is_file() {
        if let Err(error) = merge_into_descriptor(&descriptor, &meta) {
            warn!("skipping descriptor update for {}: {}", root.display(), error);
        }
    } else {
        debug!("{} has no package descriptor to update", root.display());
    }

    meta
}

struct Element<'a> {
    attributes: &'a str,
    inner: &'a str,
}

/// Finds the first element whose `id` equals `id`.
///
/// The element ends at the closing tag that balances it; elements without
/// one have no inner content.
fn find_element<'a>(html: &'a str, id: &str) -> Option<Element<'a>> {
    OPEN_TAG.captures_iter(html).find_map(|captures| {
        let whole = captures.get(0)?;
        let tag = captures.get(1)?.as_str().to_ascii_lowercase();
        let attributes = captures.get(2)?.as_str();

        let found = ID_ATTR.captures(attributes)?.get(1)?.as_str();
        if found != id {
            return None;
        }

        let start = whole.end();
        let inner = if attributes.trim_end().ends_with('/') {
            ""
        } else {
            closing_offset(&html[start..], &tag).map_or("", |offset| &html[start..start + offset])
        };

        Some(Element { attributes, inner })
    })
}

/// Offset of the `</tag>` that closes an element whose content starts at
/// the beginning of `html`, skipping nested elements of the same name.
fn closing_offset(html: &str, tag: &str) -> Option<usize> {
    let pattern = Regex::new(&format!(r"(?i)<(/?){}\b[^>]*>", regex::escape(tag))).ok()?;
    let mut depth = 0usize;

    for captures in pattern.captures_iter(html) {
        let whole = captures.get(0)?;
        if captures.get(1).is_some_and(|slash| !slash.as_str().is_empty()) {
            if depth == 0 {
                return Some(whole.start());
            }
            depth -= 1;
        } else if !whole.as_str().ends_with("/>") {
            depth += 1;
        }
    }
    None
}

fn element_href(element: &Element<'_>) -> Option<String> {
    let own = HREF_ATTR.captures(element.attributes);
    let nested = || {
        let anchor = ANCHOR.captures(element.inner)?;
        HREF_ATTR.captures(anchor.get(1)?.as_str())
    };

    own.or_else(nested)
        .and_then(|captures| captures.get(1))
        .map(|href| decode_entities(href.as_str().trim()))
}

/// Items that are direct children of the list; nested lists contribute to
/// their parent item's text only.
fn list_items(html: &str) -> Vec<String> {
    let keyword = |item: &str| flatten_text(item).to_lowercase();
    let mut items = Vec::new();
    let mut depth = 0usize;
    let mut open: Option<usize> = None;

    for captures in LIST_TAG.captures_iter(html) {
        let (Some(whole), Some(name)) = (captures.get(0), captures.get(2)) else {
            continue;
        };
        let closing = captures.get(1).is_some_and(|slash| !slash.as_str().is_empty());
        let is_item = name.as_str().eq_ignore_ascii_case("li");

        match (is_item, closing) {
            (false, false) => depth += 1,
            (false, true) => depth = depth.saturating_sub(1),
            (true, _) if depth > 0 => {}
            (true, false) => {
                // an unclosed item ends where its sibling starts
                if let Some(start) = open.replace(whole.end()) {
                    items.push(keyword(&html[start..whole.start()]));
                }
            }
            (true, true) => {
                if let Some(start) = open.take() {
                    items.push(keyword(&html[start..whole.start()]));
                }
            }
        }
    }

    if let Some(start) = open {
        items.push(keyword(&html[start..]));
    }
    items
}

fn heading_keywords(markdown: &str) -> Vec<String> {
    let mut lines = markdown.lines();
    if !lines.any(|line| KEYWORDS_HEADING.is_match(line)) {
        return Vec::new();
    }

    lines
        .skip_while(|line| line.trim().is_empty())
        .map_while(|line| BULLET.captures(line))
        .filter_map(|captures| captures.get(1))
        .map(|item| flatten_text(item.as_str()).to_lowercase())
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Block {
    Blank,
    Paragraph,
    Html,
    Code,
}

/// Blanks everything a markdown renderer would not emit as live HTML.
///
/// Fenced and indented code blocks become empty lines, code spans are
/// removed outside raw HTML blocks, and comments are dropped. Line structure
/// is otherwise kept.
fn live_markup(markdown: &str) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut fence: Option<(char, usize)> = None;
    let mut block = Block::Blank;
    let mut in_list = false;

    for line in markdown.lines() {
        if let Some((marker, length)) = fence {
            if closes_fence(line, marker, length) {
                fence = None;
                block = Block::Blank;
            }
            lines.push(String::new());
            continue;
        }
        if let Some(opened) = opening_fence(line) {
            fence = Some(opened);
            lines.push(String::new());
            continue;
        }
        if line.trim().is_empty() {
            if block != Block::Code {
                block = Block::Blank;
            }
            lines.push(String::new());
            continue;
        }

        if indentation(line) >= 4 {
            if !in_list && matches!(block, Block::Blank | Block::Code) {
                block = Block::Code;
                lines.push(String::new());
                continue;
            }
        } else {
            if block == Block::Code {
                block = Block::Blank;
            }
            if LIST_MARKER.is_match(line) {
                in_list = true;
            } else if block == Block::Blank {
                in_list = false;
            }
        }

        if block == Block::Blank {
            block = if line.trim_start().starts_with('<') {
                Block::Html
            } else {
                Block::Paragraph
            };
        }

        lines.push(if block == Block::Html {
            line.to_owned()
        } else {
            CODE_SPAN.replace_all(line, "").into_owned()
        });
    }

    COMMENT.replace_all(&lines.join("\n"), "").into_owned()
}

fn opening_fence(line: &str) -> Option<(char, usize)> {
    let captures = FENCE.captures(line)?;
    let run = captures.get(1)?.as_str();
    let marker = run.chars().next()?;
    if marker == '`' && captures.get(2).is_some_and(|info| info.as_str().contains('`')) {
        return None;
    }
    Some((marker, run.len()))
}

fn closes_fence(line: &str, marker: char, length: usize) -> bool {
    let trimmed = line.trim();
    indentation(line) < 4 && trimmed.len() >= length && trimmed.chars().all(|c| c == marker)
}

/// Leading whitespace width with tabs advancing to the next multiple of 4.
fn indentation(line: &str) -> usize {
    let mut width = 0;
    for c in line.chars() {
        match c {
            ' ' => width += 1,
            '\t' => width += 4 - width % 4,
            _ => break,
        }
    }
    width
}

/// Strips tags and entities, collapsing line breaks into single spaces.
fn flatten_text(html: &str) -> String {
    let text = decode_entities(&ANY_TAG.replace_all(html, ""));
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    const README: &str = r#"<h1 align="center">Richie</h1>

<p id="intro">
  Richie turns <b>static sites</b> into
  rich results &amp; more.
</p>

## Keywords

<ul id="keywords">
  <li>SEO</li>
  <li>Rich Results</li>
  <li>seo</li>
</ul>

<p align="center"><a id="url" href="https://richie.cresteem.com">Visit</a></p>
"#;

    #[test]
    fn extracts_all_three_anchors() {
        let meta = extract(README);

        assert_eq!(meta.description, "Richie turns static sites into rich results & more.");
        assert_eq!(meta.keywords, vec!["seo", "rich results", "seo"]);
        assert_eq!(meta.homepage, "https://richie.cresteem.com");
    }

    #[test]
    fn missing_anchors_yield_empty_fields() {
        let meta = extract("# Plain\n\nNo anchors here.\n");
        assert_eq!(meta, ReadmeMeta::default());
    }

    #[test]
    fn homepage_falls_back_to_nested_link() {
        let meta = extract(r#"<div id="url"><a href="https://bashup.example/">home</a></div>"#);
        assert_eq!(meta.homepage, "https://bashup.example/");
    }

    #[test]
    fn keywords_fall_back_to_markdown_heading() {
        let markdown = "# Tool\n\n### Keywords\n\n- CLI\n* Bash Scripts\n\nMore text.\n- not a keyword\n";
        assert_eq!(extract(markdown).keywords, vec!["cli", "bash scripts"]);
    }

    #[test]
    fn anchors_inside_fenced_code_are_ignored() {
        let markdown = "# Tool\n\nDocument your anchors like this:\n\n```html\n<p id=\"intro\">Your description here</p>\n<a id=\"url\" href=\"https://example.com\">Homepage</a>\n```\n\n<p id=\"intro\">Real description.</p>\n\n<a id=\"url\" href=\"https://real.example\">Homepage</a>\n";

        let meta = extract(markdown);
        assert_eq!(meta.description, "Real description.");
        assert_eq!(meta.homepage, "https://real.example");
    }

    #[test]
    fn anchors_inside_comments_indented_code_and_spans_are_ignored() {
        let markdown = "<!-- <p id=\"intro\">Old intro</p> -->\n\nFor example:\n\n    <ul id=\"keywords\"><li>sample</li></ul>\n\nUse `<a id=\"url\" href=\"https://span.example\">` links.\n\n<p id=\"intro\">Current intro</p>\n\n<ul id=\"keywords\"><li>Live</li></ul>\n\n<a id=\"url\" href=\"https://live.example\">site</a>\n";

        let meta = extract(markdown);
        assert_eq!(meta.description, "Current intro");
        assert_eq!(meta.keywords, vec!["live"]);
        assert_eq!(meta.homepage, "https://live.example");
    }

    #[test]
    fn html_block_keeps_backticks_and_list_content_stays_live() {
        let markdown = "- item\n\n    <p id=\"intro\">Run `make` first</p>\n";
        assert_eq!(extract(markdown).description, "Run `make` first");
    }

    #[test]
    fn keywords_take_top_level_items_only() {
        let markdown = "<ul id=\"keywords\">\n  <li>SEO\n    <ul>\n      <li>meta tags</li>\n    </ul>\n  </li>\n  <li>Static</li>\n</ul>\n";
        assert_eq!(extract(markdown).keywords, vec!["seo meta tags", "static"]);
    }

    #[test]
    fn unclosed_items_end_at_their_sibling() {
        let markdown = "<ul id=\"keywords\"><li>CLI<li>Bash</ul>";
        assert_eq!(extract(markdown).keywords, vec!["cli", "bash"]);
    }

    #[test]
    fn merge_preserves_existing_keys_in_order() {
        let temp = tempdir().expect("failed to create tempdir");
        let path = temp.path().join("package.json");
        fs::write(&path, r#"{"name":"richie","description":"old","version":"1.0.0"}"#)
            .expect("write");

        let meta = ReadmeMeta {
            description: "new".to_owned(),
            keywords: vec!["seo".to_owned()],
            homepage: "https://richie.example".to_owned(),
        };
        merge_into_descriptor(&path, &meta).expect("merge succeeds");

        let written = fs::read_to_string(&path).expect("read");
        assert!(written.starts_with("{\n  \"name\": \"richie\""));

        let document: Value = serde_json::from_str(&written).expect("valid json");
        let keys: Vec<&str> = document
            .as_object()
            .expect("object")
            .keys()
            .map(String::as_str)
            .collect();
        assert_eq!(keys, vec!["name", "description", "version", "homepage", "keywords"]);
        assert_eq!(document["description"], "new");
    }

    #[test]
    fn merge_rejects_non_object_descriptor() {
        let temp = tempdir().expect("failed to create tempdir");
        let path = temp.path().join("package.json");
        fs::write(&path, "[1, 2]").expect("write");

        assert!(merge_into_descriptor(&path, &ReadmeMeta::default()).is_err());
        assert_eq!(fs::read_to_string(&path).expect("read"), "[1, 2]");
    }

    #[test]
    fn resolve_without_readme_leaves_descriptor_untouched() {
        let temp = tempdir().expect("failed to create tempdir");
        let path = descriptor_path(temp.path());
        fs::write(&path, r#"{"name":"quiet"}"#).expect("write");

        assert_eq!(resolve_readme(temp.path()), ReadmeMeta::default());
        assert_eq!(fs::read_to_string(&path).expect("read"), r#"{"name":"quiet"}"#);
    }

    #[test]
    fn resolve_writes_back_and_tolerates_malformed_descriptor() {
        let temp = tempdir().expect("failed to create tempdir");
        fs::write(readme_path(temp.path()), README).expect("write readme");
        fs::write(descriptor_path(temp.path()), "{ broken").expect("write descriptor");

        let meta = resolve_readme(temp.path());
        assert_eq!(meta.homepage, "https://richie.cresteem.com");
        assert_eq!(
            fs::read_to_string(descriptor_path(temp.path())).expect("read"),
            "{ broken"
        );
    }
}
