//! Positional line templates.
//!
//! A template is an ordered list of literal segments and capture slots.
//! Matching walks the segments left to right: literals must appear
//! verbatim, captures take the shortest non-empty run of text that still
//! lets the rest of the template match. The whole line has to be consumed.

use std::fmt;

/// Type a capture slot is expected to convert to.
///
/// The matcher itself only checks syntax; conversion happens in the
/// field extractors so that a malformed number can be reported against
/// the template it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotKind {
    /// Opaque text, kept as-is.
    Text,
    /// Unsigned decimal integer.
    Integer,
    /// Floating-point number.
    Float,
    /// Double-space separated list of `label value` pairs.
    Pairs,
}

/// One piece of a template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment {
    /// Text that must match exactly.
    Literal(&'static str),
    /// A typed hole.
    Capture(SlotKind),
}

/// Identity of a template within the standard set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemplateKind {
    /// Periodic `ethminer` speed report.
    Status,
    /// A CUDA device found a solution and is submitting it.
    Solution,
    /// The stratum pool accepted a submitted share.
    Share,
    /// The stratum pool sent a new job.
    Job,
}

impl fmt::Display for TemplateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TemplateKind::Status => "status",
            TemplateKind::Solution => "solution",
            TemplateKind::Share => "share",
            TemplateKind::Job => "job",
        };
        f.write_str(name)
    }
}

/// A fixed textual pattern with typed capture slots.
#[derive(Debug, Clone, Copy)]
pub struct Template {
    kind: TemplateKind,
    segments: &'static [Segment],
}

/// Text captured by a single slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capture<'a> {
    /// Declared type of the slot.
    pub kind: SlotKind,
    /// Raw captured text.
    pub text: &'a str,
}

/// A successful syntactic match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMatch<'a> {
    /// Which template matched.
    pub kind: TemplateKind,
    /// Captures in slot order.
    pub captures: Vec<Capture<'a>>,
}

impl Template {
    /// Creates a template from its segments.
    pub const fn new(kind: TemplateKind, segments: &'static [Segment]) -> Self {
        Self { kind, segments }
    }

    /// Returns the template identity.
    #[inline]
    pub fn kind(&self) -> TemplateKind {
        self.kind
    }

    /// Returns the segments in declared order.
    #[inline]
    pub fn segments(&self) -> &'static [Segment] {
        self.segments
    }

    /// Number of capture slots.
    pub fn slot_count(&self) -> usize {
        self.segments
            .iter()
            .filter(|s| matches!(s, Segment::Capture(_)))
            .count()
    }

    /// Attempts to match the whole of `input`.
    pub fn match_line<'a>(&self, input: &'a str) -> Option<RawMatch<'a>> {
        let mut captures = Vec::with_capacity(self.slot_count());
        if match_segments(self.segments, input, &mut captures) {
            Some(RawMatch {
                kind: self.kind,
                captures,
            })
        } else {
            None
        }
    }
}

fn match_segments<'a>(segments: &[Segment], input: &'a str, out: &mut Vec<Capture<'a>>) -> bool {
    let Some((first, rest)) = segments.split_first() else {
        return input.is_empty();
    };

    match *first {
        Segment::Literal(lit) => match input.strip_prefix(lit) {
            Some(remaining) => match_segments(rest, remaining, out),
            None => false,
        },
        Segment::Capture(kind) => {
            // Last slot swallows the remainder.
            if rest.is_empty() {
                if input.is_empty() {
                    return false;
                }
                out.push(Capture { kind, text: input });
                return true;
            }

            let mark = out.len();
            let ends = input
                .char_indices()
                .skip(1)
                .map(|(i, _)| i)
                .chain(std::iter::once(input.len()));

            for end in ends {
                let remaining = &input[end..];
                if let Some(Segment::Literal(lit)) = rest.first() {
                    if !remaining.starts_with(lit) {
                        continue;
                    }
                }
                out.push(Capture {
                    kind,
                    text: &input[..end],
                });
                if match_segments(rest, remaining, out) {
                    return true;
                }
                out.truncate(mark);
            }
            false
        }
    }
}
