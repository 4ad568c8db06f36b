//! Field extraction from evaluation-result records.
//!
//! Every bias and statistics routine works on a value pulled out of an
//! arbitrary result record, usually next to its "baseline" counterpart.
//! Records are `serde_json::Value` trees. A field is addressed either by a
//! pre-flattened top-level key (`"usage.total_tokens"` stored verbatim) or by
//! a dot-separated walk through nested objects.
//!
//! The baseline of a path is found by prefixing `baseline_` onto the first
//! segment only: `output` -> `baseline_output`,
//! `usage.total_tokens` -> `baseline_usage.total_tokens`.

use serde_json::Value;

/// Prefix applied to the first path segment to locate the baseline field.
pub const BASELINE_PREFIX: &str = "baseline_";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FieldError {
    #[error("field not found: {path}")]
    NotFound { path: String },
}

/// Read-only view of one field (and its baseline) inside one result record.
///
/// Construction fails if the field path does not resolve, so accessors never
/// have to re-check existence of the primary field.
#[derive(Debug, Clone)]
pub struct FieldContext<'a> {
    field_path: String,
    record: &'a Value,
}

impl<'a> FieldContext<'a> {
    pub fn new(field_path: impl Into<String>, record: &'a Value) -> Result<Self, FieldError> {
        let field_path = field_path.into();
        if !field_exists(record, &field_path) {
            return Err(FieldError::NotFound { path: field_path });
        }
        Ok(Self { field_path, record })
    }

    pub fn field_path(&self) -> &str {
        &self.field_path
    }

    pub fn record(&self) -> &'a Value {
        self.record
    }

    /// Resolved field value.
    pub fn value(&self) -> Option<&'a Value> {
        resolve(self.record, &self.field_path)
    }

    /// Name of the paired baseline field.
    pub fn baseline_path(&self) -> String {
        baseline_path(&self.field_path)
    }

    /// Resolved baseline value, or `None` if the record carries no baseline.
    pub fn baseline_value(&self) -> Option<&'a Value> {
        resolve(self.record, &self.baseline_path())
    }

    pub fn has_baseline(&self) -> bool {
        field_exists(self.record, &self.baseline_path())
    }

    /// `value - baseline`, when both are numeric.
    pub fn delta(&self) -> Option<f64> {
        let (value, baseline) = self.numeric_pair()?;
        Some(value - baseline)
    }

    /// Percentage change from the baseline. `None` when the baseline is zero.
    pub fn delta_percentage(&self) -> Option<f64> {
        let (value, baseline) = self.numeric_pair()?;
        if baseline == 0.0 {
            return None;
        }
        Some((value - baseline) / baseline * 100.0)
    }

    /// Same dual-mode resolution as the field itself, against the bound record.
    pub fn field_exists(&self, path: &str) -> bool {
        field_exists(self.record, path)
    }

    fn numeric_pair(&self) -> Option<(f64, f64)> {
        let value = self.value()?.as_f64()?;
        let baseline = self.baseline_value()?.as_f64()?;
        Some((value, baseline))
    }
}

/// Compute the baseline field name for `path`.
pub fn baseline_path(path: &str) -> String {
    format!("{BASELINE_PREFIX}{path}")
}

/// Whether `path` resolves in `record`, as a flattened key or a nested walk.
pub fn field_exists(record: &Value, path: &str) -> bool {
    lookup(record, path).is_some()
}

/// Resolve `path` in `record`.
///
/// An exact top-level key wins over a nested walk. A missing segment or a
/// non-object intermediate yields `None`; an explicit JSON `null` also reads
/// as `None`.
pub fn resolve<'v>(record: &'v Value, path: &str) -> Option<&'v Value> {
    lookup(record, path).filter(|v| !v.is_null())
}

fn lookup<'v>(record: &'v Value, path: &str) -> Option<&'v Value> {
    let map = record.as_object()?;
    if let Some(v) = map.get(path) {
        return Some(v);
    }
    if path.is_empty() {
        return None;
    }
    path.split('.')
        .try_fold(record, |current, segment| current.as_object()?.get(segment))
}
