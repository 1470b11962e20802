use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Value written in place of components that are not usable numbers
pub const SENTINEL: f32 = 0.0;

/// What had to be fixed in a raw embedding
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepairReport {
    /// Strings, booleans, objects, arrays
    pub non_numeric: usize,
    /// `null` (the service's NaN/Infinity), or values outside `f32` range
    pub non_finite: usize,
    /// Zeros appended to reach the dimension
    pub padded: usize,
    /// Components dropped past the dimension
    pub truncated: usize,
}

impl RepairReport {
    pub fn is_clean(&self) -> bool {
        *self == Self::default()
    }
}

/// Coerce a raw vector into exactly `dimension` finite `f32`s.
///
/// Never fails: bad components become [`SENTINEL`], short vectors are
/// zero-padded and long ones truncated.
pub fn repair_embedding(raw: &[Value], dimension: usize) -> (Vec<f32>, RepairReport) {
    let mut report = RepairReport::default();
    let mut embedding = Vec::with_capacity(dimension);

    for value in raw.iter().take(dimension) {
        let component = match value {
            Value::Number(number) => match number.as_f64().map(|n| n as f32) {
                Some(component) if component.is_finite() => component,
                _ => {
                    report.non_finite += 1;
                    SENTINEL
                }
            },
            Value::Null => {
                report.non_finite += 1;
                SENTINEL
            }
            _ => {
                report.non_numeric += 1;
                SENTINEL
            }
        };
        embedding.push(component);
    }

    report.truncated = raw.len().saturating_sub(dimension);
    report.padded = dimension - embedding.len();
    embedding.resize(dimension, 0.0);

    (embedding, report)
}

/// Replace the bare `NaN`/`Infinity` literals some JSON encoders emit with
/// `null`, so the body still parses.
///
/// Only literals in value position (start of body, or after `[`, `,` or `:`)
/// are replaced; string contents are copied through untouched.
pub fn sanitize_non_finite_literals(body: &str) -> String {
    const LITERALS: [&str; 3] = ["-Infinity", "Infinity", "NaN"];

    let mut out = String::with_capacity(body.len());
    let mut rest = body;
    let mut in_string = false;
    let mut escaped = false;
    let mut value_expected = true;

    while let Some(c) = rest.chars().next() {
        if !in_string
            && value_expected
            && let Some(literal) = LITERALS.iter().find(|literal| {
                rest.strip_prefix(**literal)
                    .is_some_and(|tail| !tail.starts_with(|next: char| next.is_ascii_alphanumeric()))
            })
        {
            out.push_str("null");
            rest = &rest[literal.len()..];
            value_expected = false;
            continue;
        }

        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
        } else if c == '"' {
            in_string = true;
            value_expected = false;
        } else if !c.is_whitespace() {
            value_expected = matches!(c, '[' | ',' | ':');
        }
        out.push(c);
        rest = &rest[c.len_utf8()..];
    }

    out
}
