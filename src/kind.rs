//! Catalogue of the analysis workflows offered by the service.
//!
//! Each [`WorkflowKind`] knows its endpoint, how its request body must be
//! encoded, which input fields it takes and the user-facing texts shown when
//! the workflow fails.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::ValidationError;

/// One independent submit-and-report workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WorkflowKind {
    SafetyMonitor,
    CrackDetection,
    RealEstateValuation,
    ProjectPlanner,
    KnowledgeAssistant,
    Chatbot,
    SiteAssistant,
    WeatherAdvisor,
}

/// How a workflow endpoint expects its request body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyEncoding {
    /// `multipart/form-data`; the endpoint reads form fields and optional files.
    Multipart,
    /// `application/json`; the endpoint never takes files.
    Json,
}

/// Primitive kind an input field is coerced to before transmission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Text,
    Integer,
    Number,
    /// Text restricted to a fixed set of values.
    Choice(&'static [&'static str]),
}

/// Declared input field of a workflow request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputField {
    pub name: &'static str,
    pub kind: InputKind,
    pub required: bool,
    /// Whether an empty (whitespace-only) value is accepted for a required field.
    pub allow_blank: bool,
}

impl InputField {
    const fn text(name: &'static str) -> Self {
        Self {
            name,
            kind: InputKind::Text,
            required: true,
            allow_blank: false,
        }
    }

    const fn blank_ok(mut self) -> Self {
        self.allow_blank = true;
        self
    }

    const fn integer(name: &'static str) -> Self {
        Self {
            name,
            kind: InputKind::Integer,
            required: true,
            allow_blank: false,
        }
    }

    const fn number(name: &'static str) -> Self {
        Self {
            name,
            kind: InputKind::Number,
            required: true,
            allow_blank: false,
        }
    }

    const fn choice(name: &'static str, allowed: &'static [&'static str]) -> Self {
        Self {
            name,
            kind: InputKind::Choice(allowed),
            required: true,
            allow_blank: false,
        }
    }
}

/// Values accepted for the knowledge assistant's `context_type` field.
pub const CONTEXT_TYPES: &[&str] = &["safety", "technique", "document"];

const SAFETY_FIELDS: &[InputField] = &[InputField::text("text")];
const CRACK_FIELDS: &[InputField] = &[InputField::text("text")];
const VALUATION_FIELDS: &[InputField] = &[
    InputField::text("location"),
    InputField::number("area"),
    InputField::text("property_type"),
    InputField::integer("building_age"),
    InputField::text("amenities"),
];
const PLANNER_FIELDS: &[InputField] = &[InputField::text("description").blank_ok()];
const KNOWLEDGE_FIELDS: &[InputField] = &[
    InputField::text("text"),
    InputField::choice("context_type", CONTEXT_TYPES),
];
const CHATBOT_FIELDS: &[InputField] = &[InputField::text("query")];
const SITE_FIELDS: &[InputField] = &[
    InputField::text("activity"),
    InputField::integer("labour_count"),
    InputField::text("site_condition"),
];
const WEATHER_FIELDS: &[InputField] = &[InputField::text("activity"), InputField::text("weather")];

impl WorkflowKind {
    pub const ALL: [WorkflowKind; 8] = [
        WorkflowKind::SafetyMonitor,
        WorkflowKind::CrackDetection,
        WorkflowKind::RealEstateValuation,
        WorkflowKind::ProjectPlanner,
        WorkflowKind::KnowledgeAssistant,
        WorkflowKind::Chatbot,
        WorkflowKind::SiteAssistant,
        WorkflowKind::WeatherAdvisor,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowKind::SafetyMonitor => "safety-monitor",
            WorkflowKind::CrackDetection => "crack-detection",
            WorkflowKind::RealEstateValuation => "real-estate-valuation",
            WorkflowKind::ProjectPlanner => "project-planner",
            WorkflowKind::KnowledgeAssistant => "knowledge-assistant",
            WorkflowKind::Chatbot => "chatbot",
            WorkflowKind::SiteAssistant => "site-assistant",
            WorkflowKind::WeatherAdvisor => "weather-advisor",
        }
    }

    /// Endpoint path relative to the service origin.
    pub fn path(&self) -> String {
        format!("/api/{}", self.as_str())
    }

    pub fn encoding(&self) -> BodyEncoding {
        match self {
            WorkflowKind::SafetyMonitor
            | WorkflowKind::CrackDetection
            | WorkflowKind::RealEstateValuation
            | WorkflowKind::KnowledgeAssistant => BodyEncoding::Multipart,
            WorkflowKind::ProjectPlanner
            | WorkflowKind::Chatbot
            | WorkflowKind::SiteAssistant
            | WorkflowKind::WeatherAdvisor => BodyEncoding::Json,
        }
    }

    pub fn input_fields(&self) -> &'static [InputField] {
        match self {
            WorkflowKind::SafetyMonitor => SAFETY_FIELDS,
            WorkflowKind::CrackDetection => CRACK_FIELDS,
            WorkflowKind::RealEstateValuation => VALUATION_FIELDS,
            WorkflowKind::ProjectPlanner => PLANNER_FIELDS,
            WorkflowKind::KnowledgeAssistant => KNOWLEDGE_FIELDS,
            WorkflowKind::Chatbot => CHATBOT_FIELDS,
            WorkflowKind::SiteAssistant => SITE_FIELDS,
            WorkflowKind::WeatherAdvisor => WEATHER_FIELDS,
        }
    }

    pub fn input_field(&self, name: &str) -> Option<&'static InputField> {
        self.input_fields().iter().find(|f| f.name == name)
    }

    /// Attachment field names the endpoint accepts.
    pub fn attachment_fields(&self) -> &'static [&'static str] {
        match self {
            WorkflowKind::SafetyMonitor => &["image", "document"],
            WorkflowKind::CrackDetection | WorkflowKind::RealEstateValuation => &["image"],
            WorkflowKind::KnowledgeAssistant => &["document"],
            _ => &[],
        }
    }

    /// Human-readable workflow title.
    pub fn title(&self) -> &'static str {
        match self {
            WorkflowKind::SafetyMonitor => "Site Safety Monitor",
            WorkflowKind::CrackDetection => "Structural Crack Diagnosis",
            WorkflowKind::RealEstateValuation => "Real Estate Estimator",
            WorkflowKind::ProjectPlanner => "Project Planner",
            WorkflowKind::KnowledgeAssistant => "Knowledge Assistant",
            WorkflowKind::Chatbot => "Construction Chatbot",
            WorkflowKind::SiteAssistant => "Daily Site Assistant",
            WorkflowKind::WeatherAdvisor => "Weather Advisor",
        }
    }

    /// Message shown when a submission fails.
    pub fn failure_message(&self) -> &'static str {
        match self {
            WorkflowKind::SafetyMonitor => "Safety analysis failed. Please retry.",
            WorkflowKind::CrackDetection => "Crack diagnosis failed. Please retry.",
            WorkflowKind::RealEstateValuation => "Valuation failed. Please retry.",
            WorkflowKind::ProjectPlanner => "Plan generation failed. Please retry.",
            WorkflowKind::KnowledgeAssistant => "Knowledge lookup failed. Please retry.",
            WorkflowKind::Chatbot => "Sorry, I encountered an error. Please try again.",
            WorkflowKind::SiteAssistant => "Failed to generate plan. Please retry.",
            WorkflowKind::WeatherAdvisor => "Weather advisory failed. Please retry.",
        }
    }

    /// Static text shown by the render boundary after a render defect.
    pub fn fallback_message(&self) -> String {
        format!("{} failed. Please retry.", self.title())
    }
}

impl fmt::Display for WorkflowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkflowKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase().replace('_', "-");
        WorkflowKind::ALL
            .into_iter()
            .find(|k| k.as_str() == needle)
            .ok_or_else(|| ValidationError::new(format!("unknown workflow: {s}")))
    }
}

/// Knowledge assistant answer mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContextType {
    #[default]
    Safety,
    Technique,
    Document,
}

impl ContextType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContextType::Safety => "safety",
            ContextType::Technique => "technique",
            ContextType::Document => "document",
        }
    }
}

impl fmt::Display for ContextType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContextType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "safety" => Ok(ContextType::Safety),
            "technique" => Ok(ContextType::Technique),
            "document" | "doc_gen" | "doc-gen" => Ok(ContextType::Document),
            _ => Err(ValidationError::new(format!(
                "must be one of {}",
                CONTEXT_TYPES.join(", ")
            ))
            .with_field("context_type")),
        }
    }
}
