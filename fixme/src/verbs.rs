use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use tracing::debug;

/// Display/styling classification attached to a verb.
///
/// Severity never influences matching; it only selects how the reporter
/// paints a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Note,
    Warning,
    Action,
    Danger,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Severity::Info => "info",
            Severity::Note => "note",
            Severity::Warning => "warning",
            Severity::Action => "action",
            Severity::Danger => "danger",
            Severity::Critical => "critical",
        };
        f.write_str(name)
    }
}

/// One recognised annotation category.
#[derive(Debug, PartialEq, Eq, Hash, Serialize)]
pub struct VerbRule {
    /// Unique lower-case key, also the keyword matched in source.
    pub name: &'static str,
    pub label: &'static str,
    pub severity: Severity,
}

/// The process-wide verb table, in reporting priority order.
pub static VERB_REGISTRY: &[VerbRule] = &[
    VerbRule {
        name: "note",
        label: "✐ NOTE",
        severity: Severity::Note,
    },
    VerbRule {
        name: "optimize",
        label: "↻ OPTIMIZE",
        severity: Severity::Info,
    },
    VerbRule {
        name: "todo",
        label: "✓ TODO",
        severity: Severity::Action,
    },
    VerbRule {
        name: "hack",
        label: "✄ HACK",
        severity: Severity::Warning,
    },
    VerbRule {
        name: "xxx",
        label: "✗ XXX",
        severity: Severity::Warning,
    },
    VerbRule {
        name: "fixme",
        label: "☠ FIXME",
        severity: Severity::Danger,
    },
    VerbRule {
        name: "bug",
        label: "☢ BUG",
        severity: Severity::Critical,
    },
];

/// Synthetic rule used for lines skipped because they are too long.
pub static LINE_LENGTH_DIAGNOSTIC: VerbRule = VerbRule {
    name: "line_length",
    label: "⚠ SKIPPING CHECK",
    severity: Severity::Critical,
};

/// Looks up a registered verb (or the diagnostic) by name, ignoring case.
pub fn lookup_verb(name: &str) -> Option<&'static VerbRule> {
    VERB_REGISTRY
        .iter()
        .chain(std::iter::once(&LINE_LENGTH_DIAGNOSTIC))
        .find(|rule| rule.name.eq_ignore_ascii_case(name))
}

/// The verbs enabled for one run.
///
/// Computed once from the registry and the run's skip list; the registry
/// itself is never touched, so a skip in one run cannot leak into another.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveVerbs {
    verbs: Vec<&'static VerbRule>,
    line_length_diagnostic: bool,
}

impl ActiveVerbs {
    /// Every registered verb plus the line-length diagnostic.
    pub fn all() -> Self {
        Self::from_skip(std::iter::empty::<&str>())
    }

    /// The registry minus any name in `skip`. Unknown names are ignored.
    pub fn from_skip<I, S>(skip: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let skip: HashSet<String> = skip
            .into_iter()
            .map(|s| s.as_ref().trim().to_ascii_lowercase())
            .filter(|s| !s.is_empty())
            .collect();

        for name in &skip {
            if lookup_verb(name).is_none() {
                debug!("Ignoring unknown skip entry: {}", name);
            }
        }

        Self {
            verbs: VERB_REGISTRY
                .iter()
                .filter(|rule| !skip.contains(rule.name))
                .collect(),
            line_length_diagnostic: !skip.contains(LINE_LENGTH_DIAGNOSTIC.name),
        }
    }

    pub fn verbs(&self) -> &[&'static VerbRule] {
        &self.verbs
    }

    /// Whether too-long lines should be reported as diagnostics.
    pub fn reports_line_length(&self) -> bool {
        self.line_length_diagnostic
    }
}

/// Convenience wrapper matching the registry contract.
pub fn active_verbs<I, S>(skip: I) -> ActiveVerbs
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    ActiveVerbs::from_skip(skip)
}
