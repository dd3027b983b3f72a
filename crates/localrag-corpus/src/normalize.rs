//! Type-specific cleaning followed by general whitespace normalization.

use regex::Regex;
use std::borrow::Cow;
use std::sync::LazyLock;

use localrag_core::types::{DocType, DocumentUnit};

macro_rules! pattern {
    ($name:ident, $re:expr) => {
        static $name: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new($re).ok());
    };
}

pattern!(MD_HEADER, r"(?m)^#+[ \t]*(.*)$");
pattern!(MD_BOLD_STAR, r"\*\*(.+?)\*\*");
pattern!(MD_BOLD_UNDERSCORE, r"__(.+?)__");
pattern!(MD_ITALIC_STAR, r"\*([^*\s][^*]*?)\*");
pattern!(MD_ITALIC_UNDERSCORE, r"\b_([^_]+?)_\b");
pattern!(MD_LINK, r"\[([^\]]*)\]\([^)]*\)");
pattern!(MD_CODE, r"`([^`]*)`");
pattern!(MD_QUOTE, r"(?m)^>[ \t]?");
pattern!(MD_LIST, r"(?m)^[-*+][ \t]?");
pattern!(NON_ASCII, r"[^\x00-\x7F]+");

pattern!(HTML_SCRIPT, r"(?is)<script\b.*?</script\s*>");
pattern!(HTML_STYLE, r"(?is)<style\b.*?</style\s*>");
pattern!(HTML_COMMENT, r"(?s)<!--.*?-->");
pattern!(HTML_TAG, r"(?s)<[^>]*>");

pattern!(HSPACE, r"[ \t]+");
pattern!(BLANK_LINES, r"\n\s*\n\s*\n+");
pattern!(AROUND_NEWLINE, r"[ \t]*\n[ \t]*");
pattern!(MULTI_SPACE, r" {2,}");

fn replace<'t>(re: &LazyLock<Option<Regex>>, text: Cow<'t, str>, with: &str) -> Cow<'t, str> {
    let Some(re) = (**re).as_ref() else { return text };
    let replaced = match re.replace_all(&text, with) {
        Cow::Owned(s) => Some(s),
        Cow::Borrowed(_) => None,
    };
    match replaced {
        Some(s) => Cow::Owned(s),
        None => text,
    }
}

/// Strip Markdown syntax, keeping the readable text.
pub fn clean_markdown(text: &str) -> String {
    let mut t = Cow::Borrowed(text);
    t = replace(&MD_HEADER, t, "$1");
    t = replace(&MD_BOLD_STAR, t, "$1");
    t = replace(&MD_BOLD_UNDERSCORE, t, "$1");
    t = replace(&MD_ITALIC_STAR, t, "$1");
    t = replace(&MD_ITALIC_UNDERSCORE, t, "$1");
    t = replace(&MD_LINK, t, "$1");
    t = replace(&MD_CODE, t, "$1");
    t = replace(&MD_QUOTE, t, "");
    t = replace(&MD_LIST, t, "");
    t = replace(&NON_ASCII, t, "");
    t.into_owned()
}

/// Drop `<script>`/`<style>` blocks, comments and tags; decode common entities.
pub fn clean_html(text: &str) -> String {
    let mut t = Cow::Borrowed(text);
    t = replace(&HTML_SCRIPT, t, "");
    t = replace(&HTML_STYLE, t, "");
    t = replace(&HTML_COMMENT, t, "");
    t = replace(&HTML_TAG, t, "");
    t.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Unify line endings, collapse horizontal whitespace and runs of blank
/// lines, and trim.
pub fn normalize_text(text: &str) -> String {
    let unified = text.replace("\r\n", "\n").replace('\r', "\n");
    let mut t = Cow::Owned(unified);
    t = replace(&HSPACE, t, " ");
    t = replace(&BLANK_LINES, t, "\n\n");
    t = replace(&AROUND_NEWLINE, t, "\n");
    t = replace(&MULTI_SPACE, t, " ");
    t.trim().to_string()
}

pub fn clean_for(doc_type: DocType, text: &str) -> String {
    let structural = match doc_type {
        DocType::Md => clean_markdown(text),
        DocType::Web | DocType::Html => clean_html(text),
        DocType::Pdf | DocType::Docx | DocType::Txt => text.to_string(),
    };
    normalize_text(&structural)
}

pub fn normalize_unit(unit: DocumentUnit) -> DocumentUnit {
    let text = clean_for(unit.doc_type, &unit.text);
    DocumentUnit { text, ..unit }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whitespace_is_collapsed() {
        let raw = "  Title\r\n\r\n\r\n\r\nBody\t\twith   gaps  \n  next line  ";
        assert_eq!(normalize_text(raw), "Title\n\nBody with gaps\nnext line");
    }

    #[test]
    fn markdown_keeps_readable_text() {
        let md = "# Heading\n> quoted **bold** and *it*\n- item with [link](http://x.y) and `code` ✨";
        assert_eq!(clean_for(DocType::Md, md), "Heading\nquoted bold and it\nitem with link and code");
    }

    #[test]
    fn html_drops_scripts_and_tags() {
        let html = "<html><head><style>p{}</style><script>var a = 1 < 2;</script></head>\
                    <body><p>Fish &amp; chips</p><!-- note --><p>are good</p></body></html>";
        assert_eq!(clean_for(DocType::Web, html), "Fish & chipsare good");
    }
}
