//! Prometheus text exposition formatting.
//!
//! Turns a metric name, a label set and a sample value into a single
//! exposition line:
//!
//! ```text
//! athom_sensor_power{id="athom-plug-01"} 42.5
//! ```

use std::collections::HashMap;

/// Label name to label value mapping.
///
/// The map carries no ordering; [`format_metric`] sorts labels by key when
/// rendering.
pub type LabelSet = HashMap<String, String>;

/// A value that can be rendered as a Prometheus sample.
///
/// Floats render with the shortest decimal representation that round-trips
/// to the same value of their own type (`42.1f32` renders `42.1`, not the
/// widened `f64` digits). Whole numbers have no fractional part and exponent
/// notation is never used. Non-finite values use the exposition spellings
/// `NaN`, `+Inf` and `-Inf`.
pub trait SampleValue {
    /// Render the value for the exposition format.
    fn to_sample_string(&self) -> String;
}

macro_rules! impl_float_sample {
    ($($t:ty),*) => {
        $(
            impl SampleValue for $t {
                fn to_sample_string(&self) -> String {
                    if self.is_nan() {
                        "NaN".to_string()
                    } else if self.is_infinite() {
                        if self.is_sign_positive() {
                            "+Inf".to_string()
                        } else {
                            "-Inf".to_string()
                        }
                    } else {
                        self.to_string()
                    }
                }
            }
        )*
    };
}

macro_rules! impl_int_sample {
    ($($t:ty),*) => {
        $(
            impl SampleValue for $t {
                fn to_sample_string(&self) -> String {
                    self.to_string()
                }
            }
        )*
    };
}

impl_float_sample!(f32, f64);
impl_int_sample!(i8, i16, i32, i64, u8, u16, u32, u64, usize, isize);

/// Format one metric line in Prometheus exposition format.
///
/// Labels are emitted in ascending key order and the braces are omitted
/// when the label set is empty. The line always ends with exactly one `\n`.
///
/// The name is expected to be a valid metric name. Invalid characters are
/// replaced rather than written through, so a bad name can never break the
/// line structure of the output.
pub fn format_metric<V: SampleValue>(name: &str, labels: &LabelSet, value: V) -> String {
    let name = sanitize_metric_name(name);
    let labels = format_labels(labels);
    let value = value.to_sample_string();

    let mut line = String::with_capacity(name.len() + labels.len() + value.len() + 2);
    line.push_str(&name);
    line.push_str(&labels);
    line.push(' ');
    line.push_str(&value);
    line.push('\n');
    line
}

/// Format labels for Prometheus exposition format, sorted by key.
pub fn format_labels(labels: &LabelSet) -> String {
    if labels.is_empty() {
        return String::new();
    }

    let mut pairs: Vec<(String, &str)> = labels
        .iter()
        .map(|(k, v)| (sanitize_label_name(k), v.as_str()))
        .collect();
    pairs.sort_by(|a, b| a.0.cmp(&b.0));

    let parts: Vec<String> = pairs
        .iter()
        .map(|(k, v)| format!("{}=\"{}\"", k, escape_label_value(v)))
        .collect();

    format!("{{{}}}", parts.join(","))
}

/// Escape special characters in label values.
pub fn escape_label_value(value: &str) -> String {
    let mut result = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => result.push_str("\\\\"),
            '"' => result.push_str("\\\""),
            '\n' => result.push_str("\\n"),
            _ => result.push(c),
        }
    }
    result
}

/// Make a metric name safe to write.
///
/// Prometheus metric names must match `[a-zA-Z_:][a-zA-Z0-9_:]*`. Valid
/// names are returned unchanged. Otherwise invalid characters become
/// underscores, a leading digit gets an underscore prefix, and an empty
/// name becomes `unnamed`.
pub fn sanitize_metric_name(name: &str) -> String {
    if name.is_empty() {
        return "unnamed".to_string();
    }

    let mut result = String::with_capacity(name.len() + 1);
    if name.starts_with(|c: char| c.is_ascii_digit()) {
        result.push('_');
    }

    for c in name.chars() {
        if c.is_ascii_alphanumeric() || c == '_' || c == ':' {
            result.push(c);
        } else {
            result.push('_');
        }
    }

    result
}

/// Make a label name safe to write.
///
/// Prometheus label names must match `[a-zA-Z_][a-zA-Z0-9_]*`. Same rules
/// as [`sanitize_metric_name`] except that colons are not allowed and an
/// empty name becomes `label`.
pub fn sanitize_label_name(name: &str) -> String {
    if name.is_empty() {
        return "label".to_string();
    }

    let mut result = String::with_capacity(name.len() + 1);
    if name.starts_with(|c: char| c.is_ascii_digit()) {
        result.push('_');
    }

    for c in name.chars() {
        if c.is_ascii_alphanumeric() || c == '_' {
            result.push(c);
        } else {
            result.push('_');
        }
    }

    result
}
