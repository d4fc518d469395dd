//! A mounted workflow: one state machine plus the render boundary around it.

use std::sync::Arc;

use crate::{
    boundary::{RenderBoundary, Rendered},
    errors::Error,
    kind::WorkflowKind,
    machine::{MachineOptions, WorkflowMachine},
    transport::Transport,
    view::ViewModel,
};

pub struct WorkflowPage<T: Transport + 'static> {
    transport: Arc<T>,
    options: MachineOptions,
    machine: WorkflowMachine<T>,
    boundary: RenderBoundary,
}

impl<T: Transport + 'static> WorkflowPage<T> {
    pub fn mount(kind: WorkflowKind, transport: Arc<T>, options: MachineOptions) -> Self {
        let machine = WorkflowMachine::from_shared(kind, transport.clone(), options.clone());
        Self {
            transport,
            options,
            machine,
            boundary: RenderBoundary::new(kind),
        }
    }

    pub fn kind(&self) -> WorkflowKind {
        self.machine.kind()
    }

    pub fn machine(&self) -> &WorkflowMachine<T> {
        &self.machine
    }

    pub fn boundary(&self) -> &RenderBoundary {
        &self.boundary
    }

    /// Render the current view through the boundary.
    pub fn render<V, F>(&self, render: F) -> Rendered<V>
    where
        F: FnOnce(&ViewModel) -> Result<V, Error>,
    {
        let view = self.machine.view();
        self.boundary.render(|| render(&view))
    }

    /// Replace the instance with a fresh one: state back to idle, boundary
    /// re-armed, and any call still in flight discarded when it settles.
    pub fn remount(&mut self) {
        self.machine.unmount();
        self.machine =
            WorkflowMachine::from_shared(self.kind(), self.transport.clone(), self.options.clone());
        self.boundary.reset();
    }
}

impl<T: Transport + 'static> Drop for WorkflowPage<T> {
    fn drop(&mut self) {
        self.machine.unmount();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{fixtures, MockConfig, MockTransport};
    use crate::request::WorkflowRequest;
    use crate::view::Phase;

    #[tokio::test]
    async fn renders_view_and_recovers_after_remount() {
        let transport = Arc::new(MockTransport::new(
            MockConfig::default().with_response(fixtures::weather_advice()),
        ));
        let mut page = WorkflowPage::mount(
            WorkflowKind::WeatherAdvisor,
            transport,
            MachineOptions::default(),
        );
        page.machine()
            .submit(WorkflowRequest::weather_advisor("roof sheeting", "gusty"))
            .await
            .unwrap();

        let tripped: Rendered<()> = page.render(|_| Err(Error::Render("bad badge colour".into())));
        assert_eq!(
            tripped,
            Rendered::Fallback("Weather Advisor failed. Please retry.".into())
        );

        page.remount();
        let phase = page.render(|view| Ok(view.phase()));
        assert_eq!(phase, Rendered::View(Phase::Idle));
    }
}
