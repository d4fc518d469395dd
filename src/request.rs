use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::kind::{ContextType, WorkflowKind};
use crate::reports::ReportSchema;

/// Primitive value of a structured input field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    Integer(i64),
    Number(f64),
    Text(String),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Bool(v) => write!(f, "{v}"),
            FieldValue::Integer(v) => write!(f, "{v}"),
            FieldValue::Number(v) => write!(f, "{v}"),
            FieldValue::Text(v) => f.write_str(v),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(value)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        FieldValue::Integer(value.into())
    }
}

impl From<u32> for FieldValue {
    fn from(value: u32) -> Self {
        FieldValue::Integer(value.into())
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Number(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

/// File attached to a submission.
#[derive(Clone, PartialEq, Eq)]
pub struct Attachment {
    pub field_name: String,
    pub bytes: Vec<u8>,
    pub filename: String,
    pub content_type: String,
}

impl Attachment {
    /// Create an attachment, guessing the content type from the filename.
    pub fn new(field_name: impl Into<String>, bytes: Vec<u8>, filename: impl Into<String>) -> Self {
        let filename = filename.into();
        let content_type = mime_guess::from_path(&filename)
            .first_or_octet_stream()
            .essence_str()
            .to_string();
        Self {
            field_name: field_name.into(),
            bytes,
            filename,
            content_type,
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }
}

impl fmt::Debug for Attachment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attachment")
            .field("field_name", &self.field_name)
            .field("filename", &self.filename)
            .field("content_type", &self.content_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Input for one submission of a workflow.
///
/// Values are kept as the user entered them; coercion and validation happen
/// when the request is packaged for transport.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowRequest {
    pub kind: WorkflowKind,
    pub text_fields: BTreeMap<String, String>,
    pub structured_fields: BTreeMap<String, FieldValue>,
    pub attachments: Vec<Attachment>,
}

impl WorkflowRequest {
    pub fn new(kind: WorkflowKind) -> Self {
        Self {
            kind,
            text_fields: BTreeMap::new(),
            structured_fields: BTreeMap::new(),
            attachments: Vec::new(),
        }
    }

    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.text_fields.insert(name.into(), value.into());
        self
    }

    pub fn field(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.structured_fields.insert(name.into(), value.into());
        self
    }

    pub fn attach(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    pub fn with_image(self, bytes: Vec<u8>, filename: impl Into<String>) -> Self {
        self.attach(Attachment::new("image", bytes, filename))
    }

    pub fn with_document(self, bytes: Vec<u8>, filename: impl Into<String>) -> Self {
        self.attach(Attachment::new("document", bytes, filename))
    }

    pub fn safety_monitor(text: impl Into<String>) -> Self {
        Self::new(WorkflowKind::SafetyMonitor).text("text", text)
    }

    pub fn crack_detection(text: impl Into<String>) -> Self {
        Self::new(WorkflowKind::CrackDetection).text("text", text)
    }

    pub fn real_estate_valuation(
        location: impl Into<String>,
        area: impl Into<FieldValue>,
        property_type: impl Into<String>,
        building_age: impl Into<FieldValue>,
        amenities: impl Into<String>,
    ) -> Self {
        Self::new(WorkflowKind::RealEstateValuation)
            .text("location", location)
            .field("area", area)
            .text("property_type", property_type)
            .field("building_age", building_age)
            .text("amenities", amenities)
    }

    pub fn project_planner(description: impl Into<String>) -> Self {
        Self::new(WorkflowKind::ProjectPlanner).text("description", description)
    }

    pub fn knowledge_assistant(text: impl Into<String>, context_type: ContextType) -> Self {
        Self::new(WorkflowKind::KnowledgeAssistant)
            .text("text", text)
            .text("context_type", context_type.as_str())
    }

    pub fn chatbot(query: impl Into<String>) -> Self {
        Self::new(WorkflowKind::Chatbot).text("query", query)
    }

    pub fn site_assistant(
        activity: impl Into<String>,
        labour_count: impl Into<FieldValue>,
        site_condition: impl Into<String>,
    ) -> Self {
        Self::new(WorkflowKind::SiteAssistant)
            .text("activity", activity)
            .field("labour_count", labour_count)
            .text("site_condition", site_condition)
    }

    pub fn weather_advisor(activity: impl Into<String>, weather: impl Into<String>) -> Self {
        Self::new(WorkflowKind::WeatherAdvisor)
            .text("activity", activity)
            .text("weather", weather)
    }

    /// Raw value of a field, whichever map it was put in.
    pub fn value(&self, name: &str) -> Option<FieldValue> {
        self.structured_fields.get(name).cloned().or_else(|| {
            self.text_fields
                .get(name)
                .map(|v| FieldValue::Text(v.clone()))
        })
    }

    /// Knowledge mode requested, if this is a knowledge assistant request.
    pub fn context_type(&self) -> Option<ContextType> {
        if self.kind != WorkflowKind::KnowledgeAssistant {
            return None;
        }
        let raw = self.value("context_type")?.to_string();
        raw.parse().ok()
    }

    /// Shape the response to this request is normalized against.
    pub fn response_schema(&self) -> ReportSchema {
        ReportSchema::for_kind(self.kind, self.context_type().unwrap_or_default())
    }
}
