//! Render containment across a mounted workflow page.

use std::sync::Arc;

use constructai::{
    fixtures, Error, MachineOptions, MockConfig, MockTransport, Phase, Rendered, ViewModel,
    WorkflowKind, WorkflowPage, WorkflowRequest,
};

fn first_week_tasks(view: &ViewModel) -> Result<String, Error> {
    let plan = view
        .report()
        .and_then(|r| r.as_planner())
        .ok_or_else(|| Error::Render("no plan to show".into()))?;
    Ok(plan.task_schedule[0].tasks.join(", "))
}

#[tokio::test]
async fn defect_trips_once_until_remount() {
    let transport = Arc::new(MockTransport::new(
        MockConfig::default()
            .with_response(serde_json::json!({"task_schedule": []}))
            .with_response(fixtures::project_plan()),
    ));
    let mut page = WorkflowPage::mount(
        WorkflowKind::ProjectPlanner,
        transport.clone(),
        MachineOptions::default(),
    );
    page.machine()
        .submit(WorkflowRequest::project_planner("duplex"))
        .await
        .unwrap();

    // Indexing an empty schedule panics inside the render.
    let first = page.render(first_week_tasks);
    assert_eq!(
        first,
        Rendered::Fallback("Project Planner failed. Please retry.".into())
    );
    assert!(page.boundary().is_tripped());

    // A good report does not clear a tripped boundary.
    page.machine()
        .submit(WorkflowRequest::project_planner("duplex"))
        .await
        .unwrap();
    assert!(page.render(first_week_tasks).is_fallback());

    page.remount();
    assert_eq!(page.render(|v| Ok(v.phase())), Rendered::View(Phase::Idle));
    assert_eq!(transport.call_count(), 2);
}

#[tokio::test]
async fn transport_errors_are_not_render_defects() {
    let transport = Arc::new(MockTransport::new(
        MockConfig::default().with_error(constructai::TransportError::timeout("slow").into()),
    ));
    let page = WorkflowPage::mount(
        WorkflowKind::KnowledgeAssistant,
        transport,
        MachineOptions::default(),
    );
    page.machine()
        .submit(WorkflowRequest::knowledge_assistant(
            "Working at height",
            constructai::ContextType::Safety,
        ))
        .await
        .unwrap();

    let rendered = page.render(|view| Ok(view.message().map(str::to_string)));
    assert_eq!(
        rendered,
        Rendered::View(Some("Knowledge lookup failed. Please retry.".to_string()))
    );
    assert!(!page.boundary().is_tripped());
}
