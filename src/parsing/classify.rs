//! Classification of ethminer log lines.
//!
//! The standard template set is tried in declared order against the
//! decoration-free message; the first full match is handed to the field
//! extractor for its template, which converts the raw captures into a
//! typed [`MatchResult`].

use super::decoration;
use super::template::{Capture, RawMatch, SlotKind, Template, TemplateKind};
use thiserror::Error;

use super::template::Segment::{Capture as Slot, Literal};

/// `12:00:01|ethminer  Speed  123.45 Mh/s    0 61.2  1 62.0  [solo] Time: 01:02:03`
const STATUS: Template = Template::new(
    TemplateKind::Status,
    &[
        Slot(SlotKind::Text),
        Literal("|ethminer  Speed  "),
        Slot(SlotKind::Float),
        Literal(" Mh/s    "),
        Slot(SlotKind::Pairs),
        Literal("  ["),
        Slot(SlotKind::Text),
        Literal("] Time: "),
        Slot(SlotKind::Text),
    ],
);

/// `12:00:02|CUDA0     Solution found; Submitting solution to pool ...`
const SOLUTION: Template = Template::new(
    TemplateKind::Solution,
    &[
        Slot(SlotKind::Text),
        Literal("|CUDA"),
        Slot(SlotKind::Integer),
        Literal("     Solution found; Submitting solution to "),
        Slot(SlotKind::Text),
        Literal(" ..."),
    ],
);

/// `12:00:03|stratum    B-) Submitted and accepted.`
const SHARE: Template = Template::new(
    TemplateKind::Share,
    &[
        Slot(SlotKind::Text),
        Literal("|stratum    B-) Submitted and accepted."),
    ],
);

/// `12:00:04|stratum   Received new job 0xabc123`
const JOB: Template = Template::new(
    TemplateKind::Job,
    &[
        Slot(SlotKind::Text),
        Literal("|stratum   Received new job "),
        Slot(SlotKind::Text),
    ],
);

/// Templates in matching order.
pub const STANDARD_TEMPLATES: &[Template] = &[STATUS, SOLUTION, SHARE, JOB];

/// Separator between device entries in a status line.
const PAIR_SEPARATOR: &str = "  ";

/// Hashrate reported for one device.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceHashrate {
    /// Opaque device token, usually the GPU index.
    pub label: String,
    /// Hashrate in Mh/s.
    pub hashrate: f64,
}

/// Fields of a status line.
#[derive(Debug, Clone, PartialEq)]
pub struct HashrateReport {
    /// Total hashrate in Mh/s.
    pub total_hashrate: f64,
    /// Per-device hashrates in order of appearance.
    pub devices: Vec<DeviceHashrate>,
    /// Miner uptime as printed.
    pub uptime: String,
    /// Bracketed pool/mode tag, e.g. `solo`.
    pub mode: String,
}

impl HashrateReport {
    /// Uptime in seconds, if the text has the `H:MM` or `H:MM:SS` shape.
    pub fn uptime_seconds(&self) -> Option<u64> {
        parse_clock_duration(&self.uptime)
    }
}

/// Outcome of classifying one message.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchResult {
    /// Periodic speed report.
    HashrateReport(HashrateReport),
    /// A device found a solution.
    SolutionFound {
        /// CUDA device index.
        device: u32,
        /// Destination the solution is submitted to.
        pool: String,
    },
    /// The pool accepted a share.
    ShareAccepted,
    /// The pool sent a new job.
    JobReceived {
        /// Job identifier as printed.
        job_id: String,
    },
    /// Not a metric line.
    NoMatch,
}

impl MatchResult {
    /// Template that produced this result, `None` for [`MatchResult::NoMatch`].
    pub fn template(&self) -> Option<TemplateKind> {
        match self {
            MatchResult::HashrateReport(_) => Some(TemplateKind::Status),
            MatchResult::SolutionFound { .. } => Some(TemplateKind::Solution),
            MatchResult::ShareAccepted => Some(TemplateKind::Share),
            MatchResult::JobReceived { .. } => Some(TemplateKind::Job),
            MatchResult::NoMatch => None,
        }
    }
}

/// A template matched but one of its captures could not be converted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldParseError {
    #[error("{template} line: invalid number {value:?}")]
    InvalidFloat { template: TemplateKind, value: String },

    #[error("{template} line: invalid integer {value:?}")]
    InvalidInteger { template: TemplateKind, value: String },

    #[error("{template} line: malformed device entry {entry:?}")]
    MalformedPair { template: TemplateKind, entry: String },

    #[error("{template} line: missing capture {index}")]
    MissingCapture { template: TemplateKind, index: usize },
}

/// Tries an ordered set of templates against log messages.
#[derive(Debug, Clone, Copy)]
pub struct PatternMatcher {
    templates: &'static [Template],
}

impl PatternMatcher {
    /// Matcher over the standard ethminer templates.
    pub const fn standard() -> Self {
        Self {
            templates: STANDARD_TEMPLATES,
        }
    }

    /// Matcher over a custom ordered template set.
    pub const fn with_templates(templates: &'static [Template]) -> Self {
        Self { templates }
    }

    /// Returns the templates in matching order.
    pub fn templates(&self) -> &'static [Template] {
        self.templates
    }

    /// Returns the first template that matches `line` in full.
    ///
    /// `line` must already be stripped of decoration.
    pub fn match_line<'a>(&self, line: &'a str) -> Option<RawMatch<'a>> {
        self.templates.iter().find_map(|t| t.match_line(line))
    }

    /// Strips decoration, matches, and extracts typed fields.
    pub fn classify(&self, message: &str) -> Result<MatchResult, FieldParseError> {
        let line = decoration::strip(message);
        match self.match_line(&line) {
            Some(raw) => extract(&raw),
            None => Ok(MatchResult::NoMatch),
        }
    }
}

impl Default for PatternMatcher {
    fn default() -> Self {
        Self::standard()
    }
}

/// Classifies a raw journal message with the standard templates.
pub fn classify(message: &str) -> Result<MatchResult, FieldParseError> {
    PatternMatcher::standard().classify(message)
}

/// Converts the captures of a matched template into a typed result.
pub fn extract(raw: &RawMatch<'_>) -> Result<MatchResult, FieldParseError> {
    let fields = Fields {
        template: raw.kind,
        captures: &raw.captures,
    };

    match raw.kind {
        TemplateKind::Status => Ok(MatchResult::HashrateReport(HashrateReport {
            total_hashrate: fields.float(1)?,
            devices: fields.pairs(2)?,
            mode: fields.text(3)?.to_string(),
            uptime: fields.text(4)?.to_string(),
        })),
        TemplateKind::Solution => Ok(MatchResult::SolutionFound {
            device: fields.integer(1)?,
            pool: fields.text(2)?.to_string(),
        }),
        TemplateKind::Share => Ok(MatchResult::ShareAccepted),
        TemplateKind::Job => Ok(MatchResult::JobReceived {
            job_id: fields.text(1)?.to_string(),
        }),
    }
}

struct Fields<'m, 'a> {
    template: TemplateKind,
    captures: &'m [Capture<'a>],
}

impl<'a> Fields<'_, 'a> {
    fn text(&self, index: usize) -> Result<&'a str, FieldParseError> {
        self.captures
            .get(index)
            .map(|c| c.text)
            .ok_or(FieldParseError::MissingCapture {
                template: self.template,
                index,
            })
    }

    fn float(&self, index: usize) -> Result<f64, FieldParseError> {
        let value = self.text(index)?;
        parse_float(self.template, value)
    }

    fn integer(&self, index: usize) -> Result<u32, FieldParseError> {
        let value = self.text(index)?;
        value
            .parse()
            .map_err(|_| FieldParseError::InvalidInteger {
                template: self.template,
                value: value.to_string(),
            })
    }

    fn pairs(&self, index: usize) -> Result<Vec<DeviceHashrate>, FieldParseError> {
        self.text(index)?
            .split(PAIR_SEPARATOR)
            .map(|entry| {
                let malformed = || FieldParseError::MalformedPair {
                    template: self.template,
                    entry: entry.to_string(),
                };
                let (label, value) = entry.split_once(' ').ok_or_else(malformed)?;
                if label.is_empty() || value.contains(' ') {
                    return Err(malformed());
                }
                Ok(DeviceHashrate {
                    label: label.to_string(),
                    hashrate: parse_float(self.template, value)?,
                })
            })
            .collect()
    }
}

fn parse_float(template: TemplateKind, value: &str) -> Result<f64, FieldParseError> {
    value.parse().map_err(|_| FieldParseError::InvalidFloat {
        template,
        value: value.to_string(),
    })
}

/// Parses `H:MM` or `H:MM:SS` into seconds.
fn parse_clock_duration(text: &str) -> Option<u64> {
    let parts = text
        .split(':')
        .map(|p| p.parse::<u64>().ok())
        .collect::<Option<Vec<_>>>()?;

    let (h, m, s) = match parts.as_slice() {
        [h, m] => (*h, *m, 0),
        [h, m, s] => (*h, *m, *s),
        _ => return None,
    };
    if m >= 60 || s >= 60 {
        return None;
    }

    // Hours come straight from the log line and may not fit.
    h.checked_mul(3600)?.checked_add(m * 60 + s)
}
