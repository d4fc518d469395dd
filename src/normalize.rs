//! Shape-driven normalization of untrusted report JSON.
//!
//! The analysis service does not guarantee the structure of its reports, so
//! every response goes through [`normalize`] before anything reads it. The
//! result always has exactly the declared fields with the declared container
//! kinds; anything missing or mistyped is replaced by the field's default.
//!
//! ```
//! use constructai::normalize::{normalize, FieldShape, Shape, ShapeKind};
//! use serde_json::json;
//!
//! static SHAPE: Shape = Shape::new(&[
//!     FieldShape::new("hazards", ShapeKind::TextList),
//!     FieldShape::new("summary", ShapeKind::Text),
//! ]);
//!
//! let out = normalize(&json!({"hazards": "fall risk", "extra": 1}), &SHAPE);
//! assert_eq!(out, json!({"hazards": [], "summary": ""}));
//! ```

use serde_json::{Map, Number, Value};

/// Declared structure of a record: its fields in order.
#[derive(Debug)]
pub struct Shape {
    pub fields: &'static [FieldShape],
}

impl Shape {
    pub const fn new(fields: &'static [FieldShape]) -> Self {
        Self { fields }
    }
}

/// One declared field of a [`Shape`].
#[derive(Debug)]
pub struct FieldShape {
    /// Canonical key in the normalized output.
    pub name: &'static str,
    /// Other keys the service is known to use for the same field.
    pub aliases: &'static [&'static str],
    pub kind: ShapeKind,
}

impl FieldShape {
    pub const fn new(name: &'static str, kind: ShapeKind) -> Self {
        Self {
            name,
            aliases: &[],
            kind,
        }
    }

    pub const fn aliased(
        name: &'static str,
        aliases: &'static [&'static str],
        kind: ShapeKind,
    ) -> Self {
        Self {
            name,
            aliases,
            kind,
        }
    }
}

/// Container or primitive kind of a field, with its default.
#[derive(Debug)]
pub enum ShapeKind {
    /// String, default `""`.
    Text,
    /// Any JSON number, default `0`.
    Number,
    /// Integral number, default `0`.
    Integer,
    /// One of a fixed set of strings (matched ignoring case and punctuation),
    /// default is the sentinel value.
    Choice {
        allowed: &'static [&'static str],
        default: &'static str,
    },
    /// Sequence of strings; non-string elements are dropped.
    TextList,
    /// Nested record.
    Record(&'static Shape),
    /// Sequence of nested records; non-record elements are dropped.
    RecordList(&'static Shape),
}

/// Coerce `raw` into a value satisfying `shape`.
///
/// Total: never fails for any input. Non-object input yields a record of
/// defaults. Extra keys are dropped.
pub fn normalize(raw: &Value, shape: &Shape) -> Value {
    let obj = raw.as_object();
    let mut out = Map::with_capacity(shape.fields.len());
    for field in shape.fields {
        let found = obj.and_then(|obj| {
            std::iter::once(field.name)
                .chain(field.aliases.iter().copied())
                .filter_map(|key| obj.get(key))
                .find(|value| fits(value, &field.kind))
        });
        let value = match found {
            Some(value) => coerce(value, &field.kind),
            None => default_for(&field.kind),
        };
        out.insert(field.name.to_string(), value);
    }
    Value::Object(out)
}

/// Record of defaults for `shape`.
pub fn empty(shape: &Shape) -> Value {
    normalize(&Value::Null, shape)
}

/// Whether `value` already satisfies `shape` exactly.
pub fn conforms(value: &Value, shape: &Shape) -> bool {
    let Some(obj) = value.as_object() else {
        return false;
    };
    if obj.len() != shape.fields.len() {
        return false;
    }
    shape.fields.iter().all(|field| {
        obj.get(field.name)
            .map(|v| conforms_kind(v, &field.kind))
            .unwrap_or(false)
    })
}

fn conforms_kind(value: &Value, kind: &ShapeKind) -> bool {
    match kind {
        ShapeKind::Text => value.is_string(),
        ShapeKind::Number => value.is_number(),
        ShapeKind::Integer => value.is_i64(),
        ShapeKind::Choice { allowed, default } => value
            .as_str()
            .map(|s| s == *default || allowed.iter().any(|a| *a == s))
            .unwrap_or(false),
        ShapeKind::TextList => value
            .as_array()
            .map(|items| items.iter().all(Value::is_string))
            .unwrap_or(false),
        ShapeKind::Record(shape) => conforms(value, shape),
        ShapeKind::RecordList(shape) => value
            .as_array()
            .map(|items| items.iter().all(|item| conforms(item, shape)))
            .unwrap_or(false),
    }
}

fn fits(value: &Value, kind: &ShapeKind) -> bool {
    match kind {
        ShapeKind::Text => value.is_string(),
        ShapeKind::Number => value.is_number(),
        ShapeKind::Integer => as_integer(value).is_some(),
        ShapeKind::Choice { allowed, .. } => value
            .as_str()
            .and_then(|s| match_choice(s, *allowed))
            .is_some(),
        ShapeKind::TextList | ShapeKind::RecordList(_) => value.is_array(),
        ShapeKind::Record(_) => value.is_object(),
    }
}

fn coerce(value: &Value, kind: &ShapeKind) -> Value {
    match kind {
        ShapeKind::Text | ShapeKind::Number => value.clone(),
        ShapeKind::Integer => as_integer(value).map(Value::from).unwrap_or(Value::from(0)),
        ShapeKind::Choice { allowed, default } => {
            let canonical = value
                .as_str()
                .and_then(|s| match_choice(s, *allowed))
                .unwrap_or(*default);
            Value::String(canonical.to_string())
        }
        ShapeKind::TextList => Value::Array(
            value
                .as_array()
                .map(|items| items.iter().filter(|v| v.is_string()).cloned().collect())
                .unwrap_or_default(),
        ),
        ShapeKind::Record(shape) => normalize(value, shape),
        ShapeKind::RecordList(shape) => Value::Array(
            value
                .as_array()
                .map(|items| {
                    items
                        .iter()
                        .filter(|v| v.is_object())
                        .map(|v| normalize(v, shape))
                        .collect()
                })
                .unwrap_or_default(),
        ),
    }
}

fn default_for(kind: &ShapeKind) -> Value {
    match kind {
        ShapeKind::Text => Value::String(String::new()),
        ShapeKind::Number | ShapeKind::Integer => Value::Number(Number::from(0)),
        ShapeKind::Choice { default, .. } => Value::String((*default).to_string()),
        ShapeKind::TextList | ShapeKind::RecordList(_) => Value::Array(Vec::new()),
        ShapeKind::Record(shape) => empty(shape),
    }
}

fn as_integer(value: &Value) -> Option<i64> {
    if let Some(i) = value.as_i64() {
        return Some(i);
    }
    let f = value.as_f64()?;
    if f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}

fn match_choice(raw: &str, allowed: &'static [&'static str]) -> Option<&'static str> {
    let needle = fold(raw);
    if needle.is_empty() {
        return None;
    }
    allowed.iter().copied().find(|candidate| fold(candidate) == needle)
}

// "NO-GO", "no go" and "No_Go" all fold to "nogo".
fn fold(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    static WEEK: Shape = Shape::new(&[
        FieldShape::new("week", ShapeKind::Integer),
        FieldShape::new("tasks", ShapeKind::TextList),
    ]);

    static PLAN: Shape = Shape::new(&[
        FieldShape::aliased("risk", &["riskLevel"], ShapeKind::Choice {
            allowed: &["Low", "High"],
            default: "Error",
        }),
        FieldShape::new("cost", ShapeKind::Number),
        FieldShape::new("schedule", ShapeKind::RecordList(&WEEK)),
        FieldShape::new("first", ShapeKind::Record(&WEEK)),
    ]);

    #[test]
    fn null_yields_defaults() {
        let out = normalize(&Value::Null, &PLAN);
        assert_eq!(
            out,
            json!({
                "risk": "Error",
                "cost": 0,
                "schedule": [],
                "first": {"week": 0, "tasks": []}
            })
        );
        assert!(conforms(&out, &PLAN));
    }

    #[test]
    fn bad_elements_are_dropped_not_the_list() {
        let raw = json!({
            "schedule": [{"week": 1, "tasks": "not-an-array"}, 7, "x", {"week": 2.0, "tasks": ["pour", 3]}]
        });
        let out = normalize(&raw, &PLAN);
        assert_eq!(
            out["schedule"],
            json!([{"week": 1, "tasks": []}, {"week": 2, "tasks": ["pour"]}])
        );
    }

    #[test]
    fn alias_used_when_canonical_missing_or_mistyped() {
        let out = normalize(&json!({"riskLevel": "high"}), &PLAN);
        assert_eq!(out["risk"], "High");

        let out = normalize(&json!({"risk": 5, "riskLevel": "LOW"}), &PLAN);
        assert_eq!(out["risk"], "Low");

        let out = normalize(&json!({"risk": "low", "riskLevel": "high"}), &PLAN);
        assert_eq!(out["risk"], "Low");
    }

    #[test]
    fn unknown_choice_falls_back_to_sentinel() {
        let out = normalize(&json!({"risk": "apocalyptic"}), &PLAN);
        assert_eq!(out["risk"], "Error");
    }

    #[test]
    fn wrong_scalar_kinds_get_defaults() {
        let out = normalize(&json!({"cost": "12,000", "first": [1, 2]}), &PLAN);
        assert_eq!(out["cost"], 0);
        assert_eq!(out["first"], json!({"week": 0, "tasks": []}));
    }

    #[test]
    fn fractional_week_is_not_an_integer() {
        let out = normalize(&json!({"week": 1.5, "tasks": []}), &WEEK);
        assert_eq!(out["week"], 0);
    }

    #[test]
    fn choice_matching_ignores_punctuation() {
        assert_eq!(match_choice("no go", &["GO", "NO-GO"]), Some("NO-GO"));
        assert_eq!(match_choice("  ", &["GO"]), None);
    }

    #[test]
    fn totality_over_assorted_inputs() {
        let inputs = [
            Value::Null,
            json!(true),
            json!(42),
            json!("report"),
            json!([]),
            json!([{"risk": "Low"}]),
            json!({}),
            json!({"risk": null, "cost": null, "schedule": null, "first": null}),
            json!({"risk": ["Low"], "cost": {"a": 1}, "schedule": {"week": 1}, "first": "x"}),
            json!({"schedule": [[], null, {"week": "one", "tasks": [null, {}, "ok"]}]}),
        ];
        for input in inputs {
            let out = normalize(&input, &PLAN);
            assert!(conforms(&out, &PLAN), "input {input} produced {out}");
        }
    }
}
