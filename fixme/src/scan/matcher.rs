use regex::{Match, Regex};
use std::collections::HashMap;

use crate::styles::CommentStyle;
use crate::verbs::{ActiveVerbs, VerbRule};

/// Characters allowed between a comment opener and the verb (`/** TODO`, `//! TODO`, `-- @todo`).
const DECORATION: &str = r"[ \t*!/#;%+\-]*";

/// Continuation markers allowed at the start of an inner block-comment line.
const CONTINUATION: &str = r"[*+]+[ \t]*";

/// How the comment that introduced a verb ends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opener {
    /// Runs to the end of the physical line
    Line,
    /// Runs until `close`, possibly across lines
    Block {
        close: &'static str,
        continuation: Option<&'static str>,
    },
}

impl Opener {
    pub fn close(&self) -> Option<&'static str> {
        match self {
            Opener::Line => None,
            Opener::Block { close, .. } => Some(*close),
        }
    }
}

/// A verb recognised on a line, with its header already parsed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerbHit {
    /// Byte offset of the comment opener (or of the verb inside a block)
    pub start: usize,
    pub verb: &'static VerbRule,
    pub author: Option<String>,
    /// Byte offset where the message text begins
    pub body_start: usize,
    pub opener: Opener,
}

/// Shared matching routine for every verb and comment style of a run.
///
/// One regex covers all openers and all active verbs, so adding a verb or
/// a style is a table change only.
#[derive(Debug)]
pub struct VerbMatcher {
    opener_regex: Option<Regex>,
    block_line_regex: Option<Regex>,
    openers: HashMap<&'static str, Opener>,
    block_openers: Vec<(&'static str, Opener)>,
    verbs: HashMap<&'static str, &'static VerbRule>,
}

impl VerbMatcher {
    /// Builds a matcher for `active` verbs introduced by any token in `styles`
    pub fn new<'a, I>(active: &ActiveVerbs, styles: I, case_sensitive: bool) -> Self
    where
        I: IntoIterator<Item = &'a CommentStyle>,
    {
        let mut openers: HashMap<&'static str, Opener> = HashMap::new();
        for style in styles {
            for token in style.single_line {
                openers.entry(*token).or_insert(Opener::Line);
            }
            for pair in style.block {
                openers.insert(
                    pair.open,
                    Opener::Block {
                        close: pair.close,
                        continuation: style.continuation,
                    },
                );
            }
        }

        let mut tokens: Vec<&'static str> = openers.keys().copied().collect();
        tokens.sort_unstable_by(|a, b| b.len().cmp(&a.len()).then(a.cmp(b)));

        let block_openers = tokens
            .iter()
            .filter_map(|token| match openers[token] {
                opener @ Opener::Block { .. } => Some((*token, opener)),
                Opener::Line => None,
            })
            .collect();

        let verbs: HashMap<&'static str, &'static VerbRule> = active
            .verbs()
            .iter()
            .map(|rule| (rule.name, *rule))
            .collect();

        let (opener_regex, block_line_regex) = if verbs.is_empty() || tokens.is_empty() {
            (None, None)
        } else {
            let verb_group = verb_alternation(active, case_sensitive);
            let opener_group = tokens
                .iter()
                .map(|t| regex::escape(t))
                .collect::<Vec<_>>()
                .join("|");

            // Both patterns are assembled from escaped literals and fixed
            // fragments, so compilation cannot fail.
            let opener_regex = Regex::new(&format!(
                r"(?P<open>{opener_group}){DECORATION}@?\b(?P<verb>{verb_group})\b"
            ))
            .ok();
            let block_line_regex = Regex::new(&format!(
                r"^[ \t]*(?:{CONTINUATION})?@?\b(?P<verb>{verb_group})\b"
            ))
            .ok();
            (opener_regex, block_line_regex)
        };

        Self {
            opener_regex,
            block_line_regex,
            openers,
            block_openers,
            verbs,
        }
    }

    /// Whether this matcher can ever produce a hit
    pub fn is_active(&self) -> bool {
        self.opener_regex.is_some()
    }

    /// Finds the first valid verb at or after byte offset `from`
    pub fn next_hit(&self, line: &str, from: usize) -> Option<VerbHit> {
        let regex = self.opener_regex.as_ref()?;
        let mut pos = from;

        while pos <= line.len() {
            let caps = regex.captures_at(line, pos)?;
            let open = caps.name("open")?;
            let verb = caps.name("verb")?;

            let Some(mut opener) = self.openers.get(open.as_str()).copied() else {
                pos = verb.end();
                continue;
            };
            if !has_left_boundary(line, open.start(), open.as_str(), opener) {
                // `docs#note`, `C# note`, `slow; note`: resume right after the token
                pos = open.end();
                continue;
            }

            let mut start = open.start();
            if let Some((inner_start, inner)) =
                self.inner_block_opener(line, open.end(), verb.start())
            {
                start = inner_start;
                opener = inner;
            }
            if let Some(hit) = self.parse_header(line, start, verb, opener) {
                return Some(hit);
            }
            pos = verb.end();
        }
        None
    }

    /// Matches a verb at the start of an inner block-comment line.
    ///
    /// `segment` is the part of the line before the block's close token.
    pub fn block_line_hit(&self, segment: &str, opener: Opener) -> Option<VerbHit> {
        let regex = self.block_line_regex.as_ref()?;
        let caps = regex.captures(segment)?;
        let verb = caps.name("verb")?;
        self.parse_header(segment, verb.start(), verb, opener)
    }

    /// A block opener that begins the line (after indentation) and is
    /// followed by whitespace, decoration or the end of the line.
    ///
    /// Returns the offset just past the token.
    pub fn leading_block_opener(&self, line: &str) -> Option<(usize, Opener)> {
        let indent = line.len() - line.trim_start().len();
        let rest = &line[indent..];

        self.block_openers
            .iter()
            .find(|(token, _)| rest.starts_with(token))
            .filter(|(token, _)| {
                rest[token.len()..]
                    .chars()
                    .next()
                    .map_or(true, |c| c.is_whitespace() || "*!#-+".contains(c))
            })
            .map(|(token, opener)| (indent + token.len(), *opener))
    }

    /// The rightmost block opener inside the decoration between a matched
    /// opener and its verb, when preceded by whitespace (`x; /* TODO */`).
    fn inner_block_opener(&self, line: &str, from: usize, to: usize) -> Option<(usize, Opener)> {
        let bytes = line.as_bytes();
        (from..to)
            .rev()
            .filter(|&i| i > 0 && matches!(bytes[i - 1], b' ' | b'\t'))
            .find_map(|i| {
                self.block_openers
                    .iter()
                    .find(|(token, _)| line[i..to].starts_with(token))
                    .map(|(_, opener)| (i, *opener))
            })
    }

    fn parse_header(
        &self,
        line: &str,
        start: usize,
        verb: Match<'_>,
        opener: Opener,
    ) -> Option<VerbHit> {
        let rule = self
            .verbs
            .get(verb.as_str().to_ascii_lowercase().as_str())
            .copied()?;

        if !follows_verb(&line[verb.end()..], opener.close()) {
            return None;
        }

        let mut cursor = verb.end();
        let mut author = None;

        let paren = skip_blanks(line, cursor);
        if line[paren..].starts_with('(') {
            if let Some(len) = line[paren + 1..].find(')') {
                let name = line[paren + 1..paren + 1 + len].trim();
                if !name.is_empty() {
                    author = Some(name.to_string());
                }
                cursor = paren + 1 + len + 1;
            }
        }

        let colon = skip_blanks(line, cursor);
        if line[colon..].starts_with(':') {
            cursor = colon + 1;
        }

        Some(VerbHit {
            start,
            verb: rule,
            author,
            body_start: cursor,
            opener,
        })
    }
}

fn verb_alternation(active: &ActiveVerbs, case_sensitive: bool) -> String {
    let mut names: Vec<&str> = active.verbs().iter().map(|rule| rule.name).collect();
    names.sort_unstable_by(|a, b| b.len().cmp(&a.len()).then(a.cmp(b)));

    if case_sensitive {
        let upper: Vec<String> = names
            .iter()
            .map(|n| regex::escape(&n.to_ascii_uppercase()))
            .collect();
        format!("(?:{})", upper.join("|"))
    } else {
        let escaped: Vec<String> = names.iter().map(|n| regex::escape(n)).collect();
        format!("(?i:{})", escaped.join("|"))
    }
}

/// One-character line openers (`#`, `;`, `%`) only count at the start of a
/// line or after whitespace.
fn has_left_boundary(line: &str, start: usize, token: &str, opener: Opener) -> bool {
    if opener != Opener::Line || token.len() > 1 || start == 0 {
        return true;
    }
    line[..start]
        .chars()
        .next_back()
        .map_or(true, char::is_whitespace)
}

/// The verb must be a keyword of its own, not the start of `todo.com` or `todo_list`.
fn follows_verb(rest: &str, close: Option<&str>) -> bool {
    match rest.chars().next() {
        None => true,
        Some(c) if c.is_whitespace() || c == '(' || c == ':' => true,
        Some(_) => close.is_some_and(|close| rest.starts_with(close)),
    }
}

fn skip_blanks(line: &str, from: usize) -> usize {
    from + (line[from..].len() - line[from..].trim_start_matches([' ', '\t']).len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::styles::all_styles;

    fn matcher() -> VerbMatcher {
        VerbMatcher::new(&ActiveVerbs::all(), all_styles(), false)
    }

    fn body<'a>(line: &'a str, hit: &VerbHit) -> &'a str {
        &line[hit.body_start..]
    }

    #[test]
    fn test_single_line_hit() {
        let line = "    // TODO: Eat some cake.";
        let hit = matcher().next_hit(line, 0).unwrap();
        assert_eq!(hit.verb.name, "todo");
        assert_eq!(hit.opener, Opener::Line);
        assert_eq!(hit.start, 4);
        assert_eq!(hit.author, None);
        assert_eq!(body(line, &hit), " Eat some cake.");
    }

    #[test]
    fn test_author_clause() {
        let line = "# FIXME (John Postlethwait): Seriously fix this";
        let hit = matcher().next_hit(line, 0).unwrap();
        assert_eq!(hit.verb.name, "fixme");
        assert_eq!(hit.author.as_deref(), Some("John Postlethwait"));
        assert_eq!(body(line, &hit), " Seriously fix this");

        let line = "// TODO(): nobody";
        let hit = matcher().next_hit(line, 0).unwrap();
        assert_eq!(hit.author, None);
        assert_eq!(body(line, &hit), " nobody");
    }

    #[test]
    fn test_at_prefix_and_decoration() {
        let m = matcher();
        assert_eq!(m.next_hit("/** @todo tidy */", 0).unwrap().verb.name, "todo");
        assert_eq!(m.next_hit("//! NOTE inner doc", 0).unwrap().verb.name, "note");
        assert_eq!(m.next_hit(";;; hack: lisp", 0).unwrap().verb.name, "hack");
        assert_eq!(m.next_hit("-- XXX", 0).unwrap().verb.name, "xxx");
    }

    #[test]
    fn test_block_opener_carries_close() {
        let hit = matcher().next_hit("<!-- BUG: broken -->", 0).unwrap();
        assert_eq!(
            hit.opener,
            Opener::Block {
                close: "-->",
                continuation: None
            }
        );

        let hit = matcher().next_hit("{{!-- NOTE: hbs --}}", 0).unwrap();
        assert_eq!(hit.opener.close(), Some("--}}"));
    }

    #[test]
    fn test_rejects_bare_words_and_urls() {
        let m = matcher();
        assert!(m.next_hit("NOTE: not in a comment", 0).is_none());
        assert!(m.next_hit("see https://example.com/note/1", 0).is_none());
        assert!(m.next_hit("fetch('http://todo.com/list')", 0).is_none());
        assert!(m.next_hit("// the todo_list variable", 0).is_none());
        assert!(m.next_hit("// notes about things", 0).is_none());
        assert!(m.next_hit("let todo = fixme; // fine", 0).is_none());
    }

    #[test]
    fn test_skips_invalid_candidates() {
        let line = "//todo.com // TODO: real";
        let hit = matcher().next_hit(line, 0).unwrap();
        assert_eq!(hit.start, 11);
        assert_eq!(body(line, &hit), " real");
    }

    #[test]
    fn test_prefers_nearer_block_opener() {
        let m = matcher();
        let line = "int x; /* HACK: quick */";
        let hit = m.next_hit(line, 0).unwrap();
        assert_eq!(hit.start, 7);
        assert_eq!(hit.opener.close(), Some("*/"));

        let line = "x(); // TODO: first";
        let hit = m.next_hit(line, 0).unwrap();
        assert_eq!(hit.opener, Opener::Line);
        assert_eq!(hit.start, 5);

        // Glued tokens are decoration, not a new opener
        let hit = m.next_hit("//* NOTE: odd", 0).unwrap();
        assert_eq!(hit.opener, Opener::Line);
    }

    #[test]
    fn test_short_openers_need_whitespace_before() {
        let m = matcher();
        assert!(m.next_hit("https://example.com/docs#note", 0).is_none());
        assert!(m.next_hit("value = 50%todo", 0).is_none());

        let line = "// TODO: fix the C# note parser";
        let hit = m.next_hit(line, 0).unwrap();
        assert_eq!(hit.verb.name, "todo");
        assert!(m.next_hit(line, hit.body_start).is_none());

        let line = "// FIXME: slow; note the callers";
        let hit = m.next_hit(line, 0).unwrap();
        assert!(m.next_hit(line, hit.body_start).is_none());

        assert_eq!(m.next_hit("x = 1 # NOTE: ok", 0).unwrap().start, 6);
        assert_eq!(m.next_hit("\t% TODO: tex", 0).unwrap().verb.name, "todo");
    }

    #[test]
    fn test_case_sensitive_mode() {
        let strict = VerbMatcher::new(&ActiveVerbs::all(), all_styles(), true);
        assert!(strict.next_hit("// todo: lower", 0).is_none());
        assert!(strict.next_hit("// TODO: upper", 0).is_some());

        assert!(matcher().next_hit("// todo: lower", 0).is_some());
    }

    #[test]
    fn test_skipped_verbs_never_match() {
        let active = ActiveVerbs::from_skip(["hack"]);
        let m = VerbMatcher::new(&active, all_styles(), false);
        assert!(m.next_hit("// HACK: gone", 0).is_none());
        assert!(m.next_hit("// TODO: still here", 0).is_some());
    }

    #[test]
    fn test_no_active_verbs() {
        let active = ActiveVerbs::from_skip(crate::verbs::VERB_REGISTRY.iter().map(|r| r.name));
        let m = VerbMatcher::new(&active, all_styles(), false);
        assert!(!m.is_active());
        assert!(m.next_hit("// TODO: x", 0).is_none());
    }

    #[test]
    fn test_block_line_hit() {
        let opener = Opener::Block {
            close: "*/",
            continuation: Some("*"),
        };
        let m = matcher();
        let hit = m.block_line_hit(" * TODO(ann): inside", opener).unwrap();
        assert_eq!(hit.verb.name, "todo");
        assert_eq!(hit.author.as_deref(), Some("ann"));
        assert!(m.block_line_hit(" * some prose about todo", opener).is_none());
    }

    #[test]
    fn test_leading_block_opener() {
        let m = matcher();
        assert_eq!(m.leading_block_opener("  /**").map(|(end, _)| end), Some(4));
        assert!(m.leading_block_opener("(*ptr).field = 1;").is_none());
        assert!(m.leading_block_opener("x = 1; /* trailing").is_none());
        let (_, opener) = m.leading_block_opener("<!-- start").unwrap();
        assert_eq!(opener.close(), Some("-->"));
    }
}
