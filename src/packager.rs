//! Turns a [`WorkflowRequest`] into a transport body.
//!
//! Declared input fields are validated and coerced to their primitive kind
//! here, so a malformed value (a labour count of `"abc"`) is rejected before
//! anything reaches the transport.

use serde_json::{Map, Number, Value};

use crate::errors::ValidationError;
use crate::kind::{BodyEncoding, InputField, InputKind};
use crate::request::{FieldValue, WorkflowRequest};

/// One part of a multipart body.
#[derive(Debug, Clone, PartialEq)]
pub enum MultipartPart {
    Text {
        name: String,
        value: String,
    },
    File {
        name: String,
        filename: String,
        content_type: String,
        bytes: Vec<u8>,
    },
}

impl MultipartPart {
    pub fn name(&self) -> &str {
        match self {
            MultipartPart::Text { name, .. } | MultipartPart::File { name, .. } => name,
        }
    }
}

/// Encoded request body, independent of the HTTP stack.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportBody {
    Json(Map<String, Value>),
    Multipart(Vec<MultipartPart>),
}

impl TransportBody {
    pub fn is_multipart(&self) -> bool {
        matches!(self, TransportBody::Multipart(_))
    }

    /// String form of a non-file field, if present.
    pub fn text_field(&self, name: &str) -> Option<String> {
        match self {
            TransportBody::Json(map) => map.get(name).map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            }),
            TransportBody::Multipart(parts) => parts.iter().find_map(|part| match part {
                MultipartPart::Text { name: n, value } if n == name => Some(value.clone()),
                _ => None,
            }),
        }
    }

    /// Number of file parts carried by the body.
    pub fn file_count(&self) -> usize {
        match self {
            TransportBody::Json(_) => 0,
            TransportBody::Multipart(parts) => parts
                .iter()
                .filter(|p| matches!(p, MultipartPart::File { .. }))
                .count(),
        }
    }
}

/// Validate and encode `request`.
///
/// Multipart is used when the request carries attachments or the endpoint
/// only reads form fields; otherwise the fields go out as one JSON object.
pub fn package(request: &WorkflowRequest) -> Result<TransportBody, ValidationError> {
    let kind = request.kind;
    let mut fields: Vec<(String, FieldValue)> = Vec::new();

    for decl in kind.input_fields() {
        match request.value(decl.name) {
            Some(value) => fields.push((decl.name.to_string(), coerce(decl, value)?)),
            None if decl.required => return Err(ValidationError::required(decl.name)),
            None => {}
        }
    }

    // Undeclared fields pass through as given, after the declared ones.
    for (name, value) in &request.text_fields {
        if kind.input_field(name).is_none() {
            fields.push((name.clone(), FieldValue::Text(value.clone())));
        }
    }
    for (name, value) in &request.structured_fields {
        if kind.input_field(name).is_none() && !request.text_fields.contains_key(name) {
            fields.push((name.clone(), value.clone()));
        }
    }

    for attachment in &request.attachments {
        if !kind
            .attachment_fields()
            .iter()
            .any(|f| *f == attachment.field_name)
        {
            return Err(
                ValidationError::new(format!("{kind} does not accept this attachment"))
                    .with_field(attachment.field_name.clone()),
            );
        }
    }

    if request.attachments.is_empty() && kind.encoding() == BodyEncoding::Json {
        let mut map = Map::with_capacity(fields.len());
        for (name, value) in fields {
            let json = to_json(&name, value)?;
            map.insert(name, json);
        }
        return Ok(TransportBody::Json(map));
    }

    let mut parts: Vec<MultipartPart> = fields
        .into_iter()
        .map(|(name, value)| MultipartPart::Text {
            name,
            value: value.to_string(),
        })
        .collect();
    parts.extend(request.attachments.iter().map(|a| MultipartPart::File {
        name: a.field_name.clone(),
        filename: a.filename.clone(),
        content_type: a.content_type.clone(),
        bytes: a.bytes.clone(),
    }));
    Ok(TransportBody::Multipart(parts))
}

fn coerce(decl: &InputField, value: FieldValue) -> Result<FieldValue, ValidationError> {
    let invalid = |message: &str| ValidationError::new(message).with_field(decl.name);
    match decl.kind {
        InputKind::Text => {
            let text = value.to_string();
            if decl.required && !decl.allow_blank && text.trim().is_empty() {
                return Err(ValidationError::required(decl.name));
            }
            Ok(FieldValue::Text(text))
        }
        InputKind::Integer => match value {
            FieldValue::Integer(i) => Ok(FieldValue::Integer(i)),
            FieldValue::Number(f) if f.is_finite() && f.fract() == 0.0 => {
                Ok(FieldValue::Integer(f as i64))
            }
            FieldValue::Text(s) => s
                .trim()
                .parse::<i64>()
                .map(FieldValue::Integer)
                .map_err(|_| invalid("must be a whole number")),
            _ => Err(invalid("must be a whole number")),
        },
        InputKind::Number => match value {
            FieldValue::Integer(i) => Ok(FieldValue::Number(i as f64)),
            FieldValue::Number(f) if f.is_finite() => Ok(FieldValue::Number(f)),
            FieldValue::Text(s) => match s.trim().parse::<f64>() {
                Ok(f) if f.is_finite() => Ok(FieldValue::Number(f)),
                _ => Err(invalid("must be a number")),
            },
            _ => Err(invalid("must be a number")),
        },
        InputKind::Choice(allowed) => {
            let text = value.to_string();
            let needle = text.trim();
            allowed
                .iter()
                .find(|candidate| candidate.eq_ignore_ascii_case(needle))
                .map(|canonical| FieldValue::Text((*canonical).to_string()))
                .ok_or_else(|| invalid(&format!("must be one of {}", allowed.join(", "))))
        }
    }
}

fn to_json(name: &str, value: FieldValue) -> Result<Value, ValidationError> {
    Ok(match value {
        FieldValue::Bool(b) => Value::Bool(b),
        FieldValue::Integer(i) => Value::from(i),
        FieldValue::Number(f) => Number::from_f64(f)
            .map(Value::Number)
            .ok_or_else(|| ValidationError::new("must be a finite number").with_field(name))?,
        FieldValue::Text(s) => Value::String(s),
    })
}
