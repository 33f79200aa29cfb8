//! Barcode structure expressions.
//!
//! A structure expression names a read and one or more slices using
//! Python's slice notation, e.g. `r1[0:12]` (first 12 nt of read 1) or
//! `r1[0:12][::-1]` (the same, reversed). Slices are applied left to right,
//! each one to the output of the previous.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex_lite::Regex;
use serde::{Deserialize, Serialize};

use crate::error::StructureError;

/// Anchored grammar every stored structure expression must match.
pub const STRUCTURE_GRAMMAR: &str = r"^r(1|2)(\[(-?\d+)?:(-?\d+)?(:(-?\d+)?)?\])+$";

const SLICE_PATTERN: &str = r"\[(-?\d+)?:(-?\d+)?(?::(-?\d+)?)?\]";

fn grammar() -> &'static Regex {
    static GRAMMAR: OnceLock<Regex> = OnceLock::new();
    GRAMMAR.get_or_init(|| Regex::new(STRUCTURE_GRAMMAR).expect("structure grammar compiles"))
}

fn slice_pattern() -> &'static Regex {
    static SLICE: OnceLock<Regex> = OnceLock::new();
    SLICE.get_or_init(|| Regex::new(SLICE_PATTERN).expect("slice pattern compiles"))
}

/// Source read of an extraction rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Read {
    R1,
    R2,
}

impl Read {
    pub fn as_str(&self) -> &'static str {
        match self {
            Read::R1 => "r1",
            Read::R2 => "r2",
        }
    }
}

impl fmt::Display for Read {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One `[start:stop:step]` slice applied to a read.
///
/// Bounds follow Python semantics: negative values count from the end,
/// `stop` is exclusive and an absent bound means "up to the boundary".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SliceRule {
    pub read: Read,
    pub start: Option<i64>,
    pub stop: Option<i64>,
    pub step: Option<i64>,
}

impl SliceRule {
    /// True for the bare `[::-1]` slice.
    pub fn is_reversal(&self) -> bool {
        self.start.is_none() && self.stop.is_none() && self.step == Some(-1)
    }

    /// Apply this slice to `seq`.
    pub fn apply(&self, seq: &[u8]) -> Vec<u8> {
        let len = seq.len() as i64;
        let step = self.step.unwrap_or(1);
        let (lower, upper) = if step > 0 { (0, len) } else { (-1, len - 1) };

        let clamp = |bound: i64| -> i64 {
            if bound < 0 {
                (bound + len).max(lower)
            } else {
                bound.min(upper)
            }
        };
        let start = self
            .start
            .map(clamp)
            .unwrap_or(if step > 0 { lower } else { upper });
        let stop = self
            .stop
            .map(clamp)
            .unwrap_or(if step > 0 { upper } else { lower });

        let mut out = Vec::new();
        let mut next = Some(start);
        while let Some(i) = next {
            let in_range = if step > 0 { i < stop } else { i > stop };
            if !in_range {
                break;
            }
            out.push(seq[i as usize]);
            next = i.checked_add(step);
        }
        out
    }
}

impl fmt::Display for SliceRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bound = |b: Option<i64>| b.map(|v| v.to_string()).unwrap_or_default();
        write!(f, "[{}:{}", bound(self.start), bound(self.stop))?;
        if let Some(step) = self.step {
            write!(f, ":{}", step)?;
        }
        write!(f, "]")
    }
}

/// A parsed structure expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BarcodeStructure {
    pub expression: String,
    pub rules: Vec<SliceRule>,
}

impl BarcodeStructure {
    /// Parse an expression such as `r2[0:8]` or `r1[0:12][::-1]`.
    pub fn parse(expression: &str) -> Result<Self, StructureError> {
        let captures = grammar()
            .captures(expression)
            .ok_or_else(|| StructureError::Grammar {
                expression: expression.to_string(),
                grammar: STRUCTURE_GRAMMAR,
            })?;

        let read = match captures.get(1).map(|m| m.as_str()) {
            Some("1") => Read::R1,
            _ => Read::R2,
        };

        let parse_bound = |m: Option<regex_lite::Match<'_>>| -> Result<Option<i64>, StructureError> {
            match m {
                None => Ok(None),
                Some(m) => m
                    .as_str()
                    .parse::<i64>()
                    .map(Some)
                    .map_err(|_| StructureError::BoundOutOfRange {
                        expression: expression.to_string(),
                        bound: m.as_str().to_string(),
                    }),
            }
        };

        let mut rules = Vec::new();
        // skip the "rN" prefix, the grammar already guarantees the rest is slices
        for slice in slice_pattern().captures_iter(&expression[2..]) {
            let rule = SliceRule {
                read,
                start: parse_bound(slice.get(1))?,
                stop: parse_bound(slice.get(2))?,
                step: parse_bound(slice.get(3))?,
            };
            if rule.step == Some(0) {
                return Err(StructureError::ZeroStep {
                    expression: expression.to_string(),
                });
            }
            rules.push(rule);
        }

        Ok(Self {
            expression: expression.to_string(),
            rules,
        })
    }

    /// The read the first rule draws from.
    pub fn read(&self) -> Read {
        self.rules.first().map(|r| r.read).unwrap_or(Read::R1)
    }

    /// True if the last rule reverses the extracted sequence.
    pub fn is_reversed(&self) -> bool {
        self.rules.last().is_some_and(SliceRule::is_reversal)
    }

    /// Extract the barcode from a read pair.
    ///
    /// Consecutive rules on the same read are chained; a rule on a different
    /// read starts a new fragment and fragments are concatenated in order.
    pub fn extract(&self, r1: &[u8], r2: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        let mut fragment: Option<(Read, Vec<u8>)> = None;

        for rule in &self.rules {
            fragment = match fragment.take() {
                Some((read, seq)) if read == rule.read => Some((read, rule.apply(&seq))),
                previous => {
                    if let Some((_, seq)) = previous {
                        out.extend(seq);
                    }
                    let source = match rule.read {
                        Read::R1 => r1,
                        Read::R2 => r2,
                    };
                    Some((rule.read, rule.apply(source)))
                }
            };
        }
        if let Some((_, seq)) = fragment {
            out.extend(seq);
        }
        out
    }
}

impl FromStr for BarcodeStructure {
    type Err = StructureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for BarcodeStructure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.expression)
    }
}
