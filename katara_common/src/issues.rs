//! A diagnostic "issue tracker" shared by the scanner, parser, checker, and
//! lowering passes. Unlike [`crate::error::CommonError`], issues are not tool
//! failures — they describe problems found *in the IR text being processed*
//! and never unwind the call stack; the caller decides what to do once a pass
//! returns.

use crate::position::{FileSet, Range, NO_RANGE};
use serde::{Deserialize, Serialize};
use std::fmt;

/// How serious an issue is. `Fatal` means the pass that raised it cannot
/// usefully continue; `Error` means the pass can finish but the result must
/// not be trusted; `Warning` means the result is still usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Severity {
    Warning,
    Error,
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
            Severity::Fatal => write!(f, "fatal"),
        }
    }
}

/// Which subsystem raised an issue. Numbering ranges (see [`IssueKind`])
/// already disambiguate this, but origin tags are kept on the issue itself
/// so renderers don't need to decode the numeric range back into a name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Origin {
    Scanner,
    Parser,
    Checker,
    ExtChecker,
    Lowering,
}

/// A diagnostic kind, numbered per §6.3: `1000-1999` scanner, `2000-2999`
/// parser, `3000-3999` checker, `4000+` extension checker and lowering.
/// Concrete kind enums (one per crate) implement this trait instead of
/// sharing a single giant enum, so each crate can evolve its own kinds
/// without colliding — numbering discipline is what keeps ranges disjoint,
/// not a shared type.
pub trait IssueKind: fmt::Debug + Clone + PartialEq + Eq + Send + Sync + 'static {
    fn id(&self) -> i64;
    fn origin(&self) -> Origin;
    fn severity(&self) -> Severity;
}

/// A single diagnostic: a kind, a severity, an optional set of source ranges
/// (non-empty for anything actually localized to source text), and a
/// human-readable message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue<K> {
    pub kind: K,
    pub ranges: Vec<Range>,
    pub message: String,
}

impl<K: IssueKind> Issue<K> {
    pub fn new(kind: K, ranges: Vec<Range>, message: impl Into<String>) -> Self {
        let ranges = if ranges.is_empty() { vec![NO_RANGE] } else { ranges };
        Self { kind, ranges, message: message.into() }
    }

    pub fn at(kind: K, range: Range, message: impl Into<String>) -> Self {
        Self::new(kind, vec![range], message)
    }

    pub fn severity(&self) -> Severity {
        self.kind.severity()
    }

    pub fn origin(&self) -> Origin {
        self.kind.origin()
    }
}

/// Output format for [`IssueTracker::print`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Plain,
    Terminal,
}

/// Collects diagnostics raised while processing one file set. Owned by the
/// caller of a pass, never by the pass itself — passes only ever append.
#[derive(Debug, Clone, Default)]
pub struct IssueTracker<K> {
    issues: Vec<Issue<K>>,
}

impl<K: IssueKind> IssueTracker<K> {
    pub fn new() -> Self {
        Self { issues: Vec::new() }
    }

    pub fn add(&mut self, kind: K, ranges: Vec<Range>, message: impl Into<String>) {
        self.issues.push(Issue::new(kind, ranges, message));
    }

    pub fn add_at(&mut self, kind: K, range: Range, message: impl Into<String>) {
        self.add(kind, vec![range], message);
    }

    pub fn push(&mut self, issue: Issue<K>) {
        self.issues.push(issue);
    }

    pub fn extend(&mut self, other: IssueTracker<K>) {
        self.issues.extend(other.issues);
    }

    pub fn issues(&self) -> &[Issue<K>] {
        &self.issues
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        self.issues.iter().any(|i| i.severity() == Severity::Warning)
    }

    pub fn has_errors(&self) -> bool {
        self.issues
            .iter()
            .any(|i| matches!(i.severity(), Severity::Error | Severity::Fatal))
    }

    pub fn has_fatal_errors(&self) -> bool {
        self.issues.iter().any(|i| i.severity() == Severity::Fatal)
    }

    /// Render every issue to `out`, in the given format, using `file_set` to
    /// resolve ranges back to source text.
    pub fn print(&self, file_set: &FileSet, format: Format, out: &mut dyn fmt::Write) -> fmt::Result {
        for issue in &self.issues {
            self.print_one(issue, file_set, format, out)?;
        }
        Ok(())
    }

    fn print_one(
        &self,
        issue: &Issue<K>,
        file_set: &FileSet,
        format: Format,
        out: &mut dyn fmt::Write,
    ) -> fmt::Result {
        match format {
            Format::Plain => match issue.severity() {
                Severity::Warning => write!(out, "Warning: ")?,
                Severity::Error | Severity::Fatal => write!(out, "Error: ")?,
            },
            Format::Terminal => match issue.severity() {
                Severity::Warning => write!(out, "\x1b[93;1mWarning:\x1b[0;0m ")?,
                Severity::Error | Severity::Fatal => write!(out, "\x1b[91;1mError:\x1b[0;0m ")?,
            },
        }
        writeln!(out, "{} [{}]", issue.message, issue.kind.id())?;
        print_ranges(file_set, &issue.ranges, out)?;
        Ok(())
    }
}

/// Render each range's owning line with a caret-underline (single-line
/// ranges) or leading/trailing angle markers (multi-line ranges).
fn print_ranges(file_set: &FileSet, ranges: &[Range], out: &mut dyn fmt::Write) -> fmt::Result {
    for range in ranges {
        let Some(file) = file_set.file_at(range.start) else {
            writeln!(out, "  <unknown position>")?;
            continue;
        };
        let lines = file.line_numbers_of_range(*range);
        if lines.start == lines.end {
            let line_range = file.range_of_line(lines.start);
            writeln!(out, "  {}:{}: {}", file.name(), lines.start, file.line_with_number(lines.start))?;
            let col_start = (range.start - line_range.start) as usize;
            let col_end = (range.end - line_range.start) as usize;
            let underline: String = (0..=col_end)
                .map(|i| if i >= col_start { '^' } else { ' ' })
                .collect();
            writeln!(out, "  {}:{}  {}", file.name(), " ".repeat(lines.start.to_string().len()), underline)?;
        } else {
            for (offset, content) in file.lines_with_numbers(lines).iter().enumerate() {
                let line_no = lines.start + offset as u32;
                let marker = if line_no == lines.start {
                    '>'
                } else if line_no == lines.end {
                    '<'
                } else {
                    '|'
                };
                writeln!(out, "  {} {}:{}: {}", marker, file.name(), line_no, content)?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::Pos;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum TestKind {
        Thing,
    }

    impl IssueKind for TestKind {
        fn id(&self) -> i64 {
            1000
        }
        fn origin(&self) -> Origin {
            Origin::Scanner
        }
        fn severity(&self) -> Severity {
            Severity::Error
        }
    }

    #[test]
    fn tracker_accumulates_and_classifies_severity() {
        let mut tracker: IssueTracker<TestKind> = IssueTracker::new();
        assert!(!tracker.has_errors());
        tracker.add_at(TestKind::Thing, Range::single(1 as Pos), "boom");
        assert!(tracker.has_errors());
        assert_eq!(tracker.issues().len(), 1);
    }

    #[test]
    fn plain_rendering_includes_kind_id_and_message() {
        let mut file_set = FileSet::new();
        file_set.add_file("a.ir", "ret %0\n");
        let mut tracker: IssueTracker<TestKind> = IssueTracker::new();
        tracker.add_at(TestKind::Thing, Range::single(1), "unexpected token");
        let mut out = String::new();
        tracker.print(&file_set, Format::Plain, &mut out).unwrap();
        assert!(out.contains("unexpected token"));
        assert!(out.contains("[1000]"));
    }
}
