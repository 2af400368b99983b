// ============================================================================
// Flat pass - token scan and substitution
// ============================================================================
//
// One `Candidate` per record in the unit's context. For each candidate the
// line is scanned left to right with a cursor:
//   match found   -> boundary + collision checks
//   checks pass   -> splice the replacement, cursor = end of inserted text
//   checks fail   -> cursor advances one character past the match start
// The cursor never re-enters freshly inserted text, so the loop terminates
// even when the replacement contains the search token.
//
// ============================================================================

use memchr::memmem::Finder;

use super::{QualifierStyle, RewriteRules};
use crate::resolver::ResolutionContext;
use crate::symbol_table::{SymbolRecord, SymbolRef};

/// Text searched for a record inside a line
///
/// Explicitly imported records appear bare (`Entity`), everything else is
/// searched fully qualified (`net.minecraft.server.Entity`). A token of
/// exactly two dotted segments is reduced to its trailing segment, which is
/// how a nested reference shows up inline.
pub fn search_token(record: &SymbolRecord, explicit: bool) -> String {
    let token = if explicit {
        record.legacy_short_name.clone()
    } else {
        record.legacy_qualified_name()
    };

    let mut segments = token.split('.');
    match (segments.next(), segments.next(), segments.next()) {
        (Some(_), Some(last), None) => last.to_string(),
        _ => token,
    }
}

/// A record paired with its search token
pub struct Candidate {
    pub record: SymbolRef,
    pub token: String,
    finder: Finder<'static>,
}

impl Candidate {
    pub fn new(record: SymbolRef, explicit: bool) -> Option<Self> {
        let token = search_token(&record, explicit);
        if token.is_empty() {
            return None;
        }
        let finder = Finder::new(token.as_bytes()).into_owned();
        Some(Self {
            record,
            token,
            finder,
        })
    }

    /// Rewrite every acceptable occurrence; returns the number of splices
    pub fn rewrite(&self, line: &mut String, ctx: &ResolutionContext, rules: &RewriteRules) -> usize {
        let mut cursor = 0;
        let mut spliced = 0;

        while cursor < line.len() {
            let Some(offset) = self.finder.find(&line.as_bytes()[cursor..]) else {
                break;
            };
            let start = cursor + offset;
            let end = start + self.token.len();

            if self.accepts(line, start, end, ctx, rules) {
                cursor = splice(line, start, end, &self.record, rules.qualifier);
                spliced += 1;
            } else {
                cursor = start + line[start..].chars().next().map_or(1, char::len_utf8);
            }
        }

        spliced
    }

    fn accepts(
        &self,
        line: &str,
        start: usize,
        end: usize,
        ctx: &ResolutionContext,
        rules: &RewriteRules,
    ) -> bool {
        if !is_standalone(line, start, end) {
            return false;
        }

        // A foreign import with the same simple name wins over an unqualified match
        let qualified = preceded_by(line, start, &self.record.legacy_qualifier_prefix);
        if !qualified && ctx.is_foreign(&self.token) {
            return false;
        }

        !qualifier_before(line, start).is_some_and(|q| is_protected(q, &rules.protected_roots))
    }
}

/// Neither neighbour of `line[start..end]` is alphabetic
pub fn is_standalone(line: &str, start: usize, end: usize) -> bool {
    let before = line[..start].chars().next_back();
    let after = line[end..].chars().next();
    !before.is_some_and(char::is_alphabetic) && !after.is_some_and(char::is_alphabetic)
}

/// `line[..start]` ends with `prefix` (always true for an empty prefix)
pub fn preceded_by(line: &str, start: usize, prefix: &str) -> bool {
    line[..start].ends_with(prefix)
}

/// Dotted identifier run directly before `start`, if the match is
/// member-accessed (`a.b.` in `a.b.Name`)
pub fn qualifier_before(line: &str, start: usize) -> Option<&str> {
    let head = &line[..start];
    if !head.ends_with('.') {
        return None;
    }
    let begin = head
        .char_indices()
        .rev()
        .take_while(|&(_, c)| c.is_ascii_alphanumeric() || matches!(c, '_' | '$' | '.'))
        .last()
        .map_or(start, |(i, _)| i);
    Some(&head[begin..])
}

/// Whether a qualifier starts with one of the protected roots (segment-aligned)
pub fn is_protected(qualifier: &str, roots: &[String]) -> bool {
    roots.iter().any(|root| {
        !root.is_empty()
            && qualifier
                .strip_prefix(root.as_str())
                .is_some_and(|rest| rest.is_empty() || rest.starts_with('.'))
    })
}

/// Replace `line[start..end]` with the record's new form
///
/// `Legacy`: already prefixed -> new name only, otherwise legacy prefix + new name.
/// `Mapped`: a preceding legacy prefix is swallowed and the new prefix + new name
/// is inserted.
///
/// Returns the byte offset just past the inserted text.
pub(crate) fn splice(
    line: &mut String,
    start: usize,
    end: usize,
    record: &SymbolRecord,
    style: QualifierStyle,
) -> usize {
    let prefix = record.legacy_qualifier_prefix.as_str();
    let qualified = preceded_by(line, start, prefix);

    let (from, replacement) = match style {
        QualifierStyle::Legacy if qualified => (start, record.new_qualified_name.clone()),
        QualifierStyle::Legacy => (start, format!("{prefix}{}", record.new_qualified_name)),
        QualifierStyle::Mapped if qualified => {
            (start - prefix.len(), record.new_fully_qualified_name())
        }
        QualifierStyle::Mapped => (start, record.new_fully_qualified_name()),
    };

    line.replace_range(from..end, &replacement);
    from + replacement.len()
}
