//! Typed reports returned by each workflow, and the shape table they are
//! normalized against.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::kind::{ContextType, WorkflowKind};
use crate::normalize::{self, FieldShape, Shape, ShapeKind};

/// A report type with a declared wire shape.
pub trait Report: DeserializeOwned + Serialize + Default {
    fn shape() -> &'static Shape;

    /// Normalize untrusted JSON into this report. Never fails.
    fn from_raw(raw: &Value) -> Self {
        let normalized = normalize::normalize(raw, Self::shape());
        match serde_json::from_value(normalized) {
            Ok(report) => report,
            Err(_err) => {
                #[cfg(feature = "tracing")]
                tracing::error!(error = %_err, "normalized report did not decode; using defaults");
                Self::default()
            }
        }
    }
}

// ============================================================================
// Safety monitor
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    /// Sentinel for a missing or unrecognized risk level.
    #[default]
    Error,
}

impl RiskLevel {
    pub fn is_known(&self) -> bool {
        !matches!(self, RiskLevel::Error)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SafetyReport {
    pub hazards: Vec<String>,
    pub risk_level: RiskLevel,
    pub missing_ppe: Vec<String>,
    pub osha_standards: Vec<String>,
    pub corrective_actions: Vec<String>,
    pub recommendations: Vec<String>,
}

static SAFETY_SHAPE: Shape = Shape::new(&[
    FieldShape::new("hazards", ShapeKind::TextList),
    FieldShape::aliased(
        "risk_level",
        &["riskLevel"],
        ShapeKind::Choice {
            allowed: &["Low", "Medium", "High"],
            default: "Error",
        },
    ),
    FieldShape::aliased("missing_ppe", &["ppe"], ShapeKind::TextList),
    FieldShape::new("osha_standards", ShapeKind::TextList),
    FieldShape::aliased("corrective_actions", &["actions"], ShapeKind::TextList),
    FieldShape::aliased(
        "recommendations",
        &["safety_recommendations"],
        ShapeKind::TextList,
    ),
]);

impl Report for SafetyReport {
    fn shape() -> &'static Shape {
        &SAFETY_SHAPE
    }
}

// ============================================================================
// Crack detection
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CrackReport {
    pub crack_type: String,
    pub cause: String,
    pub severity: String,
    pub structural_risk: String,
    pub repair_method: String,
    pub material_recommendation: String,
    pub prevention_advice: String,
}

static CRACK_SHAPE: Shape = Shape::new(&[
    FieldShape::new("crack_type", ShapeKind::Text),
    FieldShape::new("cause", ShapeKind::Text),
    FieldShape::new("severity", ShapeKind::Text),
    FieldShape::new("structural_risk", ShapeKind::Text),
    FieldShape::new("repair_method", ShapeKind::Text),
    FieldShape::new("material_recommendation", ShapeKind::Text),
    FieldShape::aliased("prevention_advice", &["prevention"], ShapeKind::Text),
]);

impl Report for CrackReport {
    fn shape() -> &'static Shape {
        &CRACK_SHAPE
    }
}

// ============================================================================
// Real estate valuation
// ============================================================================

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ValuationReport {
    pub market_value: f64,
    pub price_per_sqft: f64,
    pub rent_estimate: f64,
    pub roi: f64,
    pub appreciation: f64,
}

static VALUATION_SHAPE: Shape = Shape::new(&[
    FieldShape::aliased("market_value", &["market_value_range"], ShapeKind::Number),
    FieldShape::new("price_per_sqft", ShapeKind::Number),
    FieldShape::new("rent_estimate", ShapeKind::Number),
    FieldShape::aliased("roi", &["roi_percentage"], ShapeKind::Number),
    FieldShape::aliased(
        "appreciation",
        &["appreciation_forecast"],
        ShapeKind::Number,
    ),
]);

impl Report for ValuationReport {
    fn shape() -> &'static Shape {
        &VALUATION_SHAPE
    }
}

// ============================================================================
// Project planner
// ============================================================================

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MaterialEstimate {
    pub cement_bags: f64,
    pub sand_tons: f64,
    pub aggregate_tons: f64,
    pub steel_kg: f64,
    pub concrete_volume_m3: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CostEstimate {
    pub total_cost: f64,
    pub material_cost: f64,
    pub labour_cost: f64,
    pub finishing_cost: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WeekPlan {
    pub week: i64,
    pub tasks: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProjectPlan {
    pub materials: MaterialEstimate,
    pub cost_estimation: CostEstimate,
    pub task_schedule: Vec<WeekPlan>,
}

static MATERIALS_SHAPE: Shape = Shape::new(&[
    FieldShape::new("cement_bags", ShapeKind::Number),
    FieldShape::new("sand_tons", ShapeKind::Number),
    FieldShape::new("aggregate_tons", ShapeKind::Number),
    FieldShape::new("steel_kg", ShapeKind::Number),
    FieldShape::new("concrete_volume_m3", ShapeKind::Number),
]);

static COST_SHAPE: Shape = Shape::new(&[
    FieldShape::new("total_cost", ShapeKind::Number),
    FieldShape::new("material_cost", ShapeKind::Number),
    FieldShape::new("labour_cost", ShapeKind::Number),
    FieldShape::new("finishing_cost", ShapeKind::Number),
]);

static WEEK_SHAPE: Shape = Shape::new(&[
    FieldShape::new("week", ShapeKind::Integer),
    FieldShape::new("tasks", ShapeKind::TextList),
]);

static PLANNER_SHAPE: Shape = Shape::new(&[
    FieldShape::new("materials", ShapeKind::Record(&MATERIALS_SHAPE)),
    FieldShape::aliased(
        "cost_estimation",
        &["costEstimation"],
        ShapeKind::Record(&COST_SHAPE),
    ),
    FieldShape::aliased(
        "task_schedule",
        &["taskSchedule"],
        ShapeKind::RecordList(&WEEK_SHAPE),
    ),
]);

impl Report for ProjectPlan {
    fn shape() -> &'static Shape {
        &PLANNER_SHAPE
    }
}

// ============================================================================
// Knowledge assistant
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SafetyProcedure {
    pub procedure: Vec<String>,
    pub ppe_required: Vec<String>,
}

static SAFETY_PROCEDURE_SHAPE: Shape = Shape::new(&[
    FieldShape::aliased("procedure", &["steps"], ShapeKind::TextList),
    FieldShape::aliased("ppe_required", &["ppe_list"], ShapeKind::TextList),
]);

impl Report for SafetyProcedure {
    fn shape() -> &'static Shape {
        &SAFETY_PROCEDURE_SHAPE
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TechniqueBrief {
    pub definition: String,
    pub comparison: String,
    pub steps: Vec<String>,
    pub best_practices: Vec<String>,
}

static TECHNIQUE_SHAPE: Shape = Shape::new(&[
    FieldShape::new("definition", ShapeKind::Text),
    FieldShape::new("comparison", ShapeKind::Text),
    FieldShape::new("steps", ShapeKind::TextList),
    FieldShape::aliased("best_practices", &["pros_cons"], ShapeKind::TextList),
]);

impl Report for TechniqueBrief {
    fn shape() -> &'static Shape {
        &TECHNIQUE_SHAPE
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GeneratedDocument {
    pub document_title: String,
    pub content: Vec<String>,
}

static DOCUMENT_SHAPE: Shape = Shape::new(&[
    FieldShape::aliased("document_title", &["title"], ShapeKind::Text),
    FieldShape::aliased("content", &["document_content"], ShapeKind::TextList),
]);

impl Report for GeneratedDocument {
    fn shape() -> &'static Shape {
        &DOCUMENT_SHAPE
    }
}

/// Knowledge assistant answer, one variant per [`ContextType`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum KnowledgeReport {
    Safety(SafetyProcedure),
    Technique(TechniqueBrief),
    Document(GeneratedDocument),
}

impl KnowledgeReport {
    pub fn context_type(&self) -> ContextType {
        match self {
            KnowledgeReport::Safety(_) => ContextType::Safety,
            KnowledgeReport::Technique(_) => ContextType::Technique,
            KnowledgeReport::Document(_) => ContextType::Document,
        }
    }
}

// ============================================================================
// Chatbot
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelatedDomain {
    Safety,
    Planning,
    Valuation,
    Materials,
    #[default]
    General,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ChatReply {
    pub reply: String,
    pub related_domain: RelatedDomain,
    pub action_suggestions: Vec<String>,
}

static CHAT_SHAPE: Shape = Shape::new(&[
    FieldShape::new("reply", ShapeKind::Text),
    FieldShape::new(
        "related_domain",
        ShapeKind::Choice {
            allowed: &["safety", "planning", "valuation", "materials", "general"],
            default: "general",
        },
    ),
    FieldShape::aliased("action_suggestions", &["suggestions"], ShapeKind::TextList),
]);

impl Report for ChatReply {
    fn shape() -> &'static Shape {
        &CHAT_SHAPE
    }
}

// ============================================================================
// Daily site assistant
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DailySitePlan {
    pub tasks_today: Vec<String>,
    pub materials_required: Vec<String>,
    pub safety_checks: Vec<String>,
    pub risk_alerts: Vec<String>,
}

static SITE_SHAPE: Shape = Shape::new(&[
    FieldShape::new("tasks_today", ShapeKind::TextList),
    FieldShape::new("materials_required", ShapeKind::TextList),
    FieldShape::new("safety_checks", ShapeKind::TextList),
    FieldShape::new("risk_alerts", ShapeKind::TextList),
]);

impl Report for DailySitePlan {
    fn shape() -> &'static Shape {
        &SITE_SHAPE
    }
}

// ============================================================================
// Weather advisor
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GoNoGo {
    #[serde(rename = "GO")]
    Go,
    #[serde(rename = "NO-GO")]
    NoGo,
    #[serde(rename = "PROCEED WITH CAUTION")]
    ProceedWithCaution,
    #[default]
    #[serde(rename = "UNKNOWN")]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WeatherAdvice {
    pub go_no_go: GoNoGo,
    pub weather_risks: Vec<String>,
    pub precautions: Vec<String>,
    pub recommendation: String,
}

static WEATHER_SHAPE: Shape = Shape::new(&[
    FieldShape::aliased(
        "go_no_go",
        &["decision"],
        ShapeKind::Choice {
            allowed: &["GO", "NO-GO", "PROCEED WITH CAUTION"],
            default: "UNKNOWN",
        },
    ),
    FieldShape::aliased("weather_risks", &["risks"], ShapeKind::TextList),
    FieldShape::new("precautions", ShapeKind::TextList),
    FieldShape::new("recommendation", ShapeKind::Text),
]);

impl Report for WeatherAdvice {
    fn shape() -> &'static Shape {
        &WEATHER_SHAPE
    }
}

// ============================================================================
// Dispatch
// ============================================================================

/// Which report shape a response is normalized against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReportSchema {
    Safety,
    Crack,
    Valuation,
    Planner,
    KnowledgeSafety,
    KnowledgeTechnique,
    KnowledgeDocument,
    Chat,
    DailySite,
    Weather,
}

impl ReportSchema {
    pub fn for_kind(kind: WorkflowKind, context: ContextType) -> Self {
        match kind {
            WorkflowKind::SafetyMonitor => ReportSchema::Safety,
            WorkflowKind::CrackDetection => ReportSchema::Crack,
            WorkflowKind::RealEstateValuation => ReportSchema::Valuation,
            WorkflowKind::ProjectPlanner => ReportSchema::Planner,
            WorkflowKind::KnowledgeAssistant => match context {
                ContextType::Safety => ReportSchema::KnowledgeSafety,
                ContextType::Technique => ReportSchema::KnowledgeTechnique,
                ContextType::Document => ReportSchema::KnowledgeDocument,
            },
            WorkflowKind::Chatbot => ReportSchema::Chat,
            WorkflowKind::SiteAssistant => ReportSchema::DailySite,
            WorkflowKind::WeatherAdvisor => ReportSchema::Weather,
        }
    }

    pub fn shape(&self) -> &'static Shape {
        match self {
            ReportSchema::Safety => SafetyReport::shape(),
            ReportSchema::Crack => CrackReport::shape(),
            ReportSchema::Valuation => ValuationReport::shape(),
            ReportSchema::Planner => ProjectPlan::shape(),
            ReportSchema::KnowledgeSafety => SafetyProcedure::shape(),
            ReportSchema::KnowledgeTechnique => TechniqueBrief::shape(),
            ReportSchema::KnowledgeDocument => GeneratedDocument::shape(),
            ReportSchema::Chat => ChatReply::shape(),
            ReportSchema::DailySite => DailySitePlan::shape(),
            ReportSchema::Weather => WeatherAdvice::shape(),
        }
    }

    /// Normalize untrusted JSON into the matching report. Never fails.
    pub fn normalize(&self, raw: &Value) -> WorkflowResponse {
        match self {
            ReportSchema::Safety => WorkflowResponse::Safety(SafetyReport::from_raw(raw)),
            ReportSchema::Crack => WorkflowResponse::Crack(CrackReport::from_raw(raw)),
            ReportSchema::Valuation => {
                WorkflowResponse::Valuation(ValuationReport::from_raw(raw))
            }
            ReportSchema::Planner => WorkflowResponse::Planner(ProjectPlan::from_raw(raw)),
            ReportSchema::KnowledgeSafety => WorkflowResponse::Knowledge(KnowledgeReport::Safety(
                SafetyProcedure::from_raw(raw),
            )),
            ReportSchema::KnowledgeTechnique => WorkflowResponse::Knowledge(
                KnowledgeReport::Technique(TechniqueBrief::from_raw(raw)),
            ),
            ReportSchema::KnowledgeDocument => WorkflowResponse::Knowledge(
                KnowledgeReport::Document(GeneratedDocument::from_raw(raw)),
            ),
            ReportSchema::Chat => WorkflowResponse::Chat(ChatReply::from_raw(raw)),
            ReportSchema::DailySite => WorkflowResponse::DailySite(DailySitePlan::from_raw(raw)),
            ReportSchema::Weather => WorkflowResponse::Weather(WeatherAdvice::from_raw(raw)),
        }
    }

    /// Zero-valued report for this schema.
    pub fn empty(&self) -> WorkflowResponse {
        self.normalize(&Value::Null)
    }
}

/// Normalized report for one workflow submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "workflow", content = "report", rename_all = "kebab-case")]
pub enum WorkflowResponse {
    Safety(SafetyReport),
    Crack(CrackReport),
    Valuation(ValuationReport),
    Planner(ProjectPlan),
    Knowledge(KnowledgeReport),
    Chat(ChatReply),
    DailySite(DailySitePlan),
    Weather(WeatherAdvice),
}

impl WorkflowResponse {
    pub fn kind(&self) -> WorkflowKind {
        match self {
            WorkflowResponse::Safety(_) => WorkflowKind::SafetyMonitor,
            WorkflowResponse::Crack(_) => WorkflowKind::CrackDetection,
            WorkflowResponse::Valuation(_) => WorkflowKind::RealEstateValuation,
            WorkflowResponse::Planner(_) => WorkflowKind::ProjectPlanner,
            WorkflowResponse::Knowledge(_) => WorkflowKind::KnowledgeAssistant,
            WorkflowResponse::Chat(_) => WorkflowKind::Chatbot,
            WorkflowResponse::DailySite(_) => WorkflowKind::SiteAssistant,
            WorkflowResponse::Weather(_) => WorkflowKind::WeatherAdvisor,
        }
    }

    pub fn schema(&self) -> ReportSchema {
        let context = match self {
            WorkflowResponse::Knowledge(report) => report.context_type(),
            _ => ContextType::default(),
        };
        ReportSchema::for_kind(self.kind(), context)
    }

    /// Report body as JSON in its wire shape.
    pub fn to_value(&self) -> Value {
        let encoded = match self {
            WorkflowResponse::Safety(r) => serde_json::to_value(r),
            WorkflowResponse::Crack(r) => serde_json::to_value(r),
            WorkflowResponse::Valuation(r) => serde_json::to_value(r),
            WorkflowResponse::Planner(r) => serde_json::to_value(r),
            WorkflowResponse::Knowledge(KnowledgeReport::Safety(r)) => serde_json::to_value(r),
            WorkflowResponse::Knowledge(KnowledgeReport::Technique(r)) => serde_json::to_value(r),
            WorkflowResponse::Knowledge(KnowledgeReport::Document(r)) => serde_json::to_value(r),
            WorkflowResponse::Chat(r) => serde_json::to_value(r),
            WorkflowResponse::DailySite(r) => serde_json::to_value(r),
            WorkflowResponse::Weather(r) => serde_json::to_value(r),
        };
        encoded.unwrap_or(Value::Null)
    }

    /// Whether the report satisfies its declared shape.
    pub fn conforms(&self) -> bool {
        normalize::conforms(&self.to_value(), self.schema().shape())
    }

    pub fn as_safety(&self) -> Option<&SafetyReport> {
        match self {
            WorkflowResponse::Safety(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_planner(&self) -> Option<&ProjectPlan> {
        match self {
            WorkflowResponse::Planner(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_chat(&self) -> Option<&ChatReply> {
        match self {
            WorkflowResponse::Chat(r) => Some(r),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn safety_missing_lists_become_empty() {
        let raw = json!({"hazards": ["fall risk"], "risk_level": "High"});
        let report = SafetyReport::from_raw(&raw);
        assert_eq!(report.hazards, vec!["fall risk".to_string()]);
        assert_eq!(report.risk_level, RiskLevel::High);
        assert!(report.missing_ppe.is_empty());
        assert!(report.osha_standards.is_empty());
        assert!(report.corrective_actions.is_empty());
    }

    #[test]
    fn safety_accepts_camel_case_and_short_aliases() {
        let raw = json!({"riskLevel": "medium", "ppe": ["helmet"], "actions": ["tie off"]});
        let report = SafetyReport::from_raw(&raw);
        assert_eq!(report.risk_level, RiskLevel::Medium);
        assert_eq!(report.missing_ppe, vec!["helmet".to_string()]);
        assert_eq!(report.corrective_actions, vec!["tie off".to_string()]);
    }

    #[test]
    fn planner_keeps_week_with_bad_tasks() {
        let raw = json!({"task_schedule": [{"week": 1, "tasks": "not-an-array"}]});
        let plan = ProjectPlan::from_raw(&raw);
        assert_eq!(
            plan.task_schedule,
            vec![WeekPlan {
                week: 1,
                tasks: vec![]
            }]
        );
        assert_eq!(plan.materials, MaterialEstimate::default());
    }

    #[test]
    fn valuation_string_amounts_default_to_zero() {
        let raw = json!({"market_value": "₹ 85 lakh", "price_per_sqft": 7100, "roi": 3.4});
        let report = ValuationReport::from_raw(&raw);
        assert_eq!(report.market_value, 0.0);
        assert_eq!(report.price_per_sqft, 7100.0);
        assert_eq!(report.roi, 3.4);
    }

    #[test]
    fn weather_decision_is_canonicalized() {
        let raw = json!({"go_no_go": "no go", "precautions": ["cover rebar"]});
        let advice = WeatherAdvice::from_raw(&raw);
        assert_eq!(advice.go_no_go, GoNoGo::NoGo);
        let unknown = WeatherAdvice::from_raw(&json!({"go_no_go": "maybe"}));
        assert_eq!(unknown.go_no_go, GoNoGo::Unknown);
    }

    #[test]
    fn every_schema_empty_report_conforms() {
        let schemas = [
            ReportSchema::Safety,
            ReportSchema::Crack,
            ReportSchema::Valuation,
            ReportSchema::Planner,
            ReportSchema::KnowledgeSafety,
            ReportSchema::KnowledgeTechnique,
            ReportSchema::KnowledgeDocument,
            ReportSchema::Chat,
            ReportSchema::DailySite,
            ReportSchema::Weather,
        ];
        for schema in schemas {
            let report = schema.empty();
            assert_eq!(report.schema(), schema);
            assert!(report.conforms(), "{schema:?}");
        }
        let technique = ReportSchema::KnowledgeTechnique.empty().to_value();
        assert_eq!(technique["comparison"], "");
    }

    #[test]
    fn technique_brief_keeps_comparison() {
        let raw = json!({
            "definition": "Shuttering holds wet concrete",
            "comparison": "Centering supports slabs; shuttering forms vertical faces",
            "pros_cons": ["reusable"]
        });
        let report = ReportSchema::KnowledgeTechnique.normalize(&raw);
        assert!(report.conforms());
        let WorkflowResponse::Knowledge(KnowledgeReport::Technique(brief)) = report else {
            panic!("expected technique brief");
        };
        assert_eq!(
            brief.comparison,
            "Centering supports slabs; shuttering forms vertical faces"
        );
        assert_eq!(brief.best_practices, vec!["reusable".to_string()]);
        assert!(brief.steps.is_empty());

        let empty = TechniqueBrief::from_raw(&json!({"comparison": ["not", "text"]}));
        assert_eq!(empty.comparison, "");
    }

    #[test]
    fn knowledge_mode_selects_variant() {
        let raw = json!({"document_content": ["Work order #1"], "title": "Work order"});
        let report = ReportSchema::KnowledgeDocument.normalize(&raw);
        let WorkflowResponse::Knowledge(KnowledgeReport::Document(doc)) = report else {
            panic!("expected document report");
        };
        assert_eq!(doc.document_title, "Work order");
        assert_eq!(doc.content, vec!["Work order #1".to_string()]);
    }
}
