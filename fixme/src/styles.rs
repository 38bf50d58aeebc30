//! Static registry of comment conventions.
//!
//! Styles are keyed by name, never by file extension. The small
//! extension table at the bottom of this module only matters when a run
//! opts into strict comment styles; by default every registered token is
//! accepted in every file.

use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::path::Path;

/// An opening/closing token pair for a block comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockToken {
    pub open: &'static str,
    pub close: &'static str,
}

/// Comment conventions of one language family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommentStyle {
    pub name: &'static str,
    pub single_line: &'static [&'static str],
    pub block: &'static [BlockToken],
    /// Marker that conventionally prefixes each inner line of a block
    /// comment (`*` in ` * more text`).
    pub continuation: Option<&'static str>,
}

const fn block(open: &'static str, close: &'static str) -> BlockToken {
    BlockToken { open, close }
}

pub static COMMENT_STYLES: &[CommentStyle] = &[
    CommentStyle {
        name: "c-style",
        single_line: &["//"],
        block: &[block("/*", "*/")],
        continuation: Some("*"),
    },
    CommentStyle {
        name: "shell",
        single_line: &["#"],
        block: &[],
        continuation: None,
    },
    CommentStyle {
        name: "assembly",
        single_line: &[";"],
        block: &[],
        continuation: None,
    },
    CommentStyle {
        name: "sql",
        single_line: &["--"],
        block: &[],
        continuation: None,
    },
    CommentStyle {
        name: "haskell",
        single_line: &["--"],
        block: &[block("{-", "-}")],
        continuation: None,
    },
    CommentStyle {
        name: "html",
        single_line: &[],
        block: &[block("<!--", "-->")],
        continuation: None,
    },
    CommentStyle {
        name: "handlebars",
        single_line: &[],
        block: &[block("{{!--", "--}}")],
        continuation: None,
    },
    CommentStyle {
        name: "mustache",
        single_line: &[],
        block: &[block("{{!", "}}")],
        continuation: None,
    },
    CommentStyle {
        name: "lisp",
        single_line: &[";"],
        block: &[block("#|", "|#")],
        continuation: None,
    },
    CommentStyle {
        name: "tex",
        single_line: &["%"],
        block: &[],
        continuation: None,
    },
    CommentStyle {
        name: "matlab",
        single_line: &["%"],
        block: &[block("%{", "%}")],
        continuation: None,
    },
    CommentStyle {
        name: "batch",
        single_line: &["::"],
        block: &[],
        continuation: None,
    },
    CommentStyle {
        name: "d",
        single_line: &["//"],
        block: &[block("/+", "+/")],
        continuation: Some("+"),
    },
    CommentStyle {
        name: "powershell",
        single_line: &["#"],
        block: &[block("<#", "#>")],
        continuation: None,
    },
    CommentStyle {
        name: "delphi",
        single_line: &["//"],
        block: &[block("(*", "*)")],
        continuation: Some("*"),
    },
    CommentStyle {
        name: "lua",
        single_line: &["--"],
        block: &[block("--[[", "]]")],
        continuation: None,
    },
];

static STYLE_INDEX: Lazy<HashMap<&'static str, &'static CommentStyle>> =
    Lazy::new(|| COMMENT_STYLES.iter().map(|s| (s.name, s)).collect());

/// Looks up a comment style by name.
pub fn lookup_style(name: &str) -> Option<&'static CommentStyle> {
    STYLE_INDEX.get(name).copied()
}

/// All registered styles, in registration order.
pub fn all_styles() -> &'static [CommentStyle] {
    COMMENT_STYLES
}

const EXTENSION_STYLES: &[(&str, &[&str])] = &[
    ("js", &["c-style"]),
    ("jsx", &["c-style"]),
    ("ts", &["c-style"]),
    ("tsx", &["c-style"]),
    ("java", &["c-style"]),
    ("c", &["c-style"]),
    ("h", &["c-style"]),
    ("cpp", &["c-style"]),
    ("hpp", &["c-style"]),
    ("cs", &["c-style"]),
    ("go", &["c-style"]),
    ("rs", &["c-style"]),
    ("swift", &["c-style"]),
    ("kt", &["c-style"]),
    ("scala", &["c-style"]),
    ("groovy", &["c-style"]),
    ("dart", &["c-style"]),
    ("css", &["c-style"]),
    ("scss", &["c-style"]),
    ("less", &["c-style"]),
    ("json", &["c-style"]),
    ("php", &["c-style", "shell"]),
    ("vue", &["c-style", "html"]),
    ("html", &["html"]),
    ("xml", &["html"]),
    ("md", &["html"]),
    ("hbs", &["handlebars", "mustache", "html"]),
    ("mustache", &["mustache", "html"]),
    ("sh", &["shell"]),
    ("py", &["shell"]),
    ("rb", &["shell"]),
    ("pl", &["shell"]),
    ("yaml", &["shell"]),
    ("yml", &["shell"]),
    ("toml", &["shell"]),
    ("ps1", &["powershell"]),
    ("sql", &["sql"]),
    ("hs", &["haskell"]),
    ("lua", &["lua"]),
    ("lisp", &["lisp"]),
    ("el", &["lisp"]),
    ("clj", &["lisp"]),
    ("asm", &["assembly"]),
    ("tex", &["tex"]),
    ("m", &["matlab"]),
    ("bat", &["batch"]),
    ("cmd", &["batch"]),
    ("d", &["d"]),
    ("pas", &["delphi"]),
    ("ml", &["delphi"]),
];

const FILE_NAME_STYLES: &[(&str, &[&str])] = &[
    ("Makefile", &["shell"]),
    ("Dockerfile", &["shell"]),
    ("Rakefile", &["shell"]),
];

/// Names of the styles conventionally used by the file at `path`, if known.
pub fn style_names_for_path(path: &Path) -> Option<&'static [&'static str]> {
    if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
        if let Some((_, styles)) = FILE_NAME_STYLES.iter().find(|(n, _)| *n == name) {
            return Some(styles);
        }
    }

    let ext = path.extension()?.to_str()?;
    EXTENSION_STYLES
        .iter()
        .find(|(e, _)| e.eq_ignore_ascii_case(ext))
        .map(|(_, styles)| *styles)
}
