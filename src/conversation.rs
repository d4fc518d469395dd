//! Chat history on top of a chatbot workflow.

use std::sync::{Mutex, MutexGuard};

use serde::Serialize;

use crate::{
    errors::{Result, ValidationError},
    http::RequestOptions,
    kind::WorkflowKind,
    machine::{Outcome, WorkflowMachine},
    request::WorkflowRequest,
    transport::Transport,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    User,
    Ai,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub speaker: Speaker,
    pub text: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<String>,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::User,
            text: text.into(),
            suggestions: Vec::new(),
        }
    }

    pub fn ai(text: impl Into<String>, suggestions: Vec<String>) -> Self {
        Self {
            speaker: Speaker::Ai,
            text: text.into(),
            suggestions,
        }
    }
}

/// A running conversation with the construction chatbot.
///
/// A question shows up in the history once its submission is admitted. If the
/// call is discarded or abandoned before it settles, the question is taken
/// back out; otherwise the reply (or the chatbot's failure text) follows it.
pub struct Conversation<T: Transport + 'static> {
    machine: WorkflowMachine<T>,
    history: Mutex<Vec<ChatMessage>>,
}

impl<T: Transport + 'static> Conversation<T> {
    pub fn new(transport: T) -> Self {
        Self {
            machine: WorkflowMachine::new(WorkflowKind::Chatbot, transport),
            history: Mutex::new(Vec::new()),
        }
    }

    /// Wrap an existing chatbot instance.
    pub fn from_machine(machine: WorkflowMachine<T>) -> Result<Self, ValidationError> {
        if machine.kind() != WorkflowKind::Chatbot {
            return Err(ValidationError::new(format!(
                "conversations run on the chatbot workflow, not {}",
                machine.kind()
            ))
            .with_field("kind"));
        }
        Ok(Self {
            machine,
            history: Mutex::new(Vec::new()),
        })
    }

    pub fn machine(&self) -> &WorkflowMachine<T> {
        &self.machine
    }

    pub fn history(&self) -> Vec<ChatMessage> {
        lock(&self.history).clone()
    }

    pub fn is_waiting(&self) -> bool {
        self.machine.is_in_flight()
    }

    /// Ask a question and wait for the answer.
    ///
    /// Returns `Ok(None)` when the question was ignored because another one is
    /// still being answered, or when the instance was unmounted before the
    /// answer arrived. Blank questions are a validation error.
    pub async fn ask(&self, query: impl Into<String>) -> Result<Option<ChatMessage>> {
        let query = query.into();
        let Some(pending) = self
            .machine
            .admit(WorkflowRequest::chatbot(query.clone()), RequestOptions::default())?
        else {
            return Ok(None);
        };
        let question = Question::ask(&self.history, ChatMessage::user(query));

        let answer = match pending.settle().await {
            Outcome::Success(report) => {
                let reply = report.as_chat().cloned().unwrap_or_default();
                ChatMessage::ai(reply.reply, reply.action_suggestions)
            }
            Outcome::Failed(info) => ChatMessage::ai(info.message, Vec::new()),
            Outcome::Discarded => return Ok(None),
        };
        question.answer(answer.clone());
        Ok(Some(answer))
    }

    pub fn clear(&self) {
        lock(&self.history).clear();
    }
}

fn lock(history: &Mutex<Vec<ChatMessage>>) -> MutexGuard<'_, Vec<ChatMessage>> {
    history
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// A question in the history still waiting for its answer. Dropping it
/// unanswered takes the question back out.
struct Question<'a> {
    history: &'a Mutex<Vec<ChatMessage>>,
    index: usize,
    message: ChatMessage,
    answered: bool,
}

impl<'a> Question<'a> {
    fn ask(history: &'a Mutex<Vec<ChatMessage>>, message: ChatMessage) -> Self {
        let mut entries = lock(history);
        entries.push(message.clone());
        Self {
            history,
            index: entries.len() - 1,
            message,
            answered: false,
        }
    }

    fn answer(mut self, reply: ChatMessage) {
        lock(self.history).push(reply);
        self.answered = true;
    }
}

impl Drop for Question<'_> {
    fn drop(&mut self) {
        if self.answered {
            return;
        }
        let mut entries = lock(self.history);
        // The history may have been cleared while waiting.
        if entries.get(self.index) == Some(&self.message) {
            entries.remove(self.index);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::TransportError;
    use crate::mock::{fixtures, MockConfig, MockTransport};
    use std::time::Duration;

    #[tokio::test]
    async fn records_question_and_reply() {
        let chat = Conversation::new(MockTransport::new(
            MockConfig::default().with_response(fixtures::chat_reply()),
        ));
        let answer = chat.ask("How long should a slab cure?").await.unwrap().unwrap();
        assert_eq!(answer.text, "Cure the slab for at least 7 days.");

        let history = chat.history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0], ChatMessage::user("How long should a slab cure?"));
        assert_eq!(history[1].suggestions.len(), 2);
    }

    #[tokio::test]
    async fn failure_appends_apology() {
        let chat = Conversation::new(MockTransport::new(
            MockConfig::default().with_error(TransportError::connect("refused").into()),
        ));
        let answer = chat.ask("Rebar spacing?").await.unwrap().unwrap();
        assert_eq!(answer.speaker, Speaker::Ai);
        assert_eq!(answer.text, "Sorry, I encountered an error. Please try again.");
        assert_eq!(chat.history().len(), 2);
    }

    #[tokio::test]
    async fn blank_question_is_rejected_without_history() {
        let transport = MockTransport::default();
        let chat = Conversation::new(transport.clone());
        assert!(chat.ask("   ").await.unwrap_err().is_validation());
        assert!(chat.history().is_empty());
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn second_question_while_waiting_adds_one_exchange() {
        let transport = MockTransport::new(
            MockConfig::default()
                .with_response(fixtures::chat_reply())
                .held(),
        );
        let chat = Conversation::new(transport.clone());

        let (first, second) = tokio::join!(chat.ask("first"), async {
            let second = chat.ask("second").await;
            transport.release(1);
            second
        });

        assert!(first.unwrap().is_some());
        assert!(second.unwrap().is_none());
        assert_eq!(transport.call_count(), 1);
        let history = chat.history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0], ChatMessage::user("first"));
        assert_eq!(history[1].speaker, Speaker::Ai);
    }

    #[tokio::test]
    async fn discarded_answer_takes_question_back() {
        let transport = MockTransport::new(
            MockConfig::default()
                .with_response(fixtures::chat_reply())
                .held(),
        );
        let chat = Conversation::new(transport.clone());

        let (answer, ()) = tokio::join!(chat.ask("first"), async {
            assert_eq!(chat.history(), vec![ChatMessage::user("first")]);
            chat.machine().unmount();
            transport.release(1);
        });

        assert!(answer.unwrap().is_none());
        assert!(chat.history().is_empty());
    }

    #[tokio::test]
    async fn abandoned_question_is_removed() {
        let transport = MockTransport::new(MockConfig::default().held());
        let chat = Conversation::new(transport.clone());

        let timed_out = tokio::time::timeout(Duration::from_millis(20), chat.ask("abandoned"))
            .await
            .is_err();

        assert!(timed_out);
        assert!(chat.history().is_empty());
        assert!(!chat.is_waiting());
        assert_eq!(transport.call_count(), 1);
    }

    #[tokio::test]
    async fn from_machine_rejects_other_workflows() {
        let machine = WorkflowMachine::new(WorkflowKind::WeatherAdvisor, MockTransport::default());
        let err = Conversation::from_machine(machine).err().expect("not a chatbot");
        assert_eq!(err.field.as_deref(), Some("kind"));

        let chatbot = WorkflowMachine::new(WorkflowKind::Chatbot, MockTransport::default());
        assert!(Conversation::from_machine(chatbot).is_ok());
    }
}
