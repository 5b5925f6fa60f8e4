use std::fmt;

use stacklimit_common::{ExporterError, Result};
use stacklimit_openstack::{LimitReport, LimitValue};

pub const METRIC_PREFIX: &str = "openstack";
pub const COMPUTE_NAMESPACE: &str = "compute";
pub const VOLUME_NAMESPACE: &str = "volume";
pub const VOLUME_UNWRAP_KEY: &str = "absolute";

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SampleValue {
    Integer(i64),
    Unsigned(u64),
    Float(f64),
}

impl fmt::Display for SampleValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(value) => write!(f, "{value}"),
            Self::Unsigned(value) => write!(f, "{value}"),
            Self::Float(value) => f.write_str(&format_float(*value)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetricLine {
    pub name: String,
    pub value: SampleValue,
}

impl fmt::Display for MetricLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.value)
    }
}

/// Turns the numeric fields of `report` into metric lines named
/// `openstack_<namespace>_<field>`, in report order.
///
/// With `unwrap_key`, the fields are read from `report[unwrap_key]`, which
/// must exist and be a mapping. Booleans, text, lists, nulls and nested
/// mappings are skipped.
pub fn encode(
    report: &LimitReport,
    namespace: &str,
    unwrap_key: Option<&str>,
) -> Result<Vec<MetricLine>> {
    let fields = match unwrap_key {
        None => report,
        Some(key) => match report.get(key) {
            Some(LimitValue::Nested(inner)) => inner,
            Some(_) => {
                return Err(ExporterError::MalformedReport(format!(
                    "`{key}` in {namespace} limits is not a mapping"
                )));
            }
            None => {
                return Err(ExporterError::MalformedReport(format!(
                    "{namespace} limits have no `{key}` section"
                )));
            }
        },
    };

    Ok(fields
        .iter()
        .filter_map(|(key, value)| {
            let value = match value {
                LimitValue::Integer(value) => SampleValue::Integer(*value),
                LimitValue::Unsigned(value) => SampleValue::Unsigned(*value),
                LimitValue::Float(value) => SampleValue::Float(*value),
                _ => return None,
            };
            Some(MetricLine {
                name: format!("{METRIC_PREFIX}_{namespace}_{key}"),
                value,
            })
        })
        .collect())
}

pub fn render_body(lines: &[MetricLine]) -> String {
    lines
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

// Debug formatting of f64 is the shortest round-trip form and keeps a
// fractional part, so 1.0 stays "1.0" instead of collapsing to "1".
fn format_float(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value == f64::INFINITY {
        "+Inf".to_string()
    } else if value == f64::NEG_INFINITY {
        "-Inf".to_string()
    } else {
        format!("{value:?}")
    }
}
