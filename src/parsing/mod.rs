//! Log-line classification and field extraction.
//!
//! Journal messages are stripped of terminal decoration, matched against
//! a fixed ordered set of line templates, and the captures of the first
//! match are converted into typed metric updates.

mod classify;
mod decoration;
mod template;

pub use classify::{
    classify, extract, DeviceHashrate, FieldParseError, HashrateReport, MatchResult,
    PatternMatcher, STANDARD_TEMPLATES,
};
pub use decoration::{strip, strip_ansi};
pub use template::{Capture, RawMatch, Segment, SlotKind, Template, TemplateKind};
