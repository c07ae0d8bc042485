//! Chat session: one conversation history driven through an [`LlmService`].
//!
//! Request lifecycle:
//!
//! ```text
//! Idle ──push ephemeral──▶ Generating ──ok──▶ commit(query, response) ──▶ Idle
//!                     └──▶ Streaming  ──end─▶ commit(query, buffer)   ──▶ Idle
//!                          (either)   ──err / drop──▶ strip ephemeral ──▶ Idle
//! ```
//!
//! Every method that issues a request takes `&mut self`, so a session never
//! has two requests in flight. Whatever happens to a request (error, early
//! drop of a [`ReplyStream`], cancellation of the future) the history is
//! left with only complete user/model pairs.

use anyhow::Result;
use futures_util::StreamExt;
use tracing::debug;

use crate::history::{ConversationHistory, RequestPreamble, DEFAULT_RULE};
use crate::llm::{DeltaStream, GenerationRequest, LlmService};
use crate::EngineError;

#[derive(Debug, Clone)]
pub struct ChatSession {
    history: ConversationHistory,
    rule: String,
    model: String,
}

impl ChatSession {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            history: ConversationHistory::new(),
            rule: DEFAULT_RULE.to_string(),
            model: model.into(),
        }
    }

    pub fn with_rule(mut self, rule: impl Into<String>) -> Self {
        self.rule = rule.into();
        self
    }

    pub fn with_history(mut self, history: ConversationHistory) -> Self {
        self.history = history;
        self.history.strip_ephemeral();
        self
    }

    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn rule(&self) -> &str {
        &self.rule
    }

    /// Forget every persisted turn.
    pub fn clear(&mut self) {
        self.history.clear();
    }

    /// Send `query` and wait for the whole response.
    pub async fn ask(
        &mut self,
        llm: &dyn LlmService,
        query: &str,
        context: &str,
        prompt: Option<&str>,
    ) -> Result<String> {
        let preamble = RequestPreamble {
            rule: &self.rule,
            context,
            prompt,
        };
        let mut pending = PendingRequest::begin(&mut self.history, &preamble);
        let working = pending.history.working_turns();
        let request = GenerationRequest {
            query,
            history: &working,
            model: &self.model,
        };
        debug!(
            platform = llm.platform(),
            model = %self.model,
            turns = working.len(),
            "sending generation request"
        );

        match llm.generate(&request).await {
            Ok(response) => {
                pending.commit(query, &response);
                Ok(response)
            }
            Err(e) => {
                pending.rollback();
                Err(generation_error(e))
            }
        }
    }

    /// Send `query` and return a stream of response deltas.
    ///
    /// The query/response pair is committed when the stream is exhausted.
    pub async fn ask_stream(
        &mut self,
        llm: &dyn LlmService,
        query: &str,
        context: &str,
        prompt: Option<&str>,
    ) -> Result<ReplyStream<'_>> {
        let preamble = RequestPreamble {
            rule: &self.rule,
            context,
            prompt,
        };
        let mut pending = PendingRequest::begin(&mut self.history, &preamble);
        let working = pending.history.working_turns();
        let request = GenerationRequest {
            query,
            history: &working,
            model: &self.model,
        };
        debug!(
            platform = llm.platform(),
            model = %self.model,
            turns = working.len(),
            "opening generation stream"
        );

        match llm.generate_stream(&request).await {
            Ok(deltas) => Ok(ReplyStream {
                pending,
                query: query.to_string(),
                deltas,
                buffer: String::new(),
                finished: false,
            }),
            Err(e) => {
                pending.rollback();
                Err(generation_error(e))
            }
        }
    }
}

fn generation_error(e: anyhow::Error) -> anyhow::Error {
    if e.downcast_ref::<EngineError>().is_some() {
        e
    } else {
        e.context(EngineError::generation("LLM service request failed"))
    }
}

/// Ephemeral entries of an in-flight request; stripped on drop unless settled.
struct PendingRequest<'h> {
    history: &'h mut ConversationHistory,
    settled: bool,
}

impl<'h> PendingRequest<'h> {
    fn begin(history: &'h mut ConversationHistory, preamble: &RequestPreamble<'_>) -> Self {
        history.push_ephemeral(preamble);
        Self {
            history,
            settled: false,
        }
    }

    fn commit(&mut self, query: &str, response: &str) {
        self.history.commit(query, response);
        self.settled = true;
    }

    fn rollback(&mut self) {
        self.history.strip_ephemeral();
        self.settled = true;
    }
}

impl Drop for PendingRequest<'_> {
    fn drop(&mut self) {
        if !self.settled {
            debug!("request abandoned; discarding ephemeral history entries");
            self.history.strip_ephemeral();
        }
    }
}

/// Streaming response bound to its session.
///
/// Pull deltas with [`next_delta`](ReplyStream::next_delta). Dropping the
/// stream before it ends cancels the request and leaves history unchanged.
pub struct ReplyStream<'s> {
    pending: PendingRequest<'s>,
    query: String,
    deltas: DeltaStream,
    buffer: String,
    finished: bool,
}

impl ReplyStream<'_> {
    /// Next text delta; `None` once the response is complete (and committed)
    /// or after an error has been returned.
    pub async fn next_delta(&mut self) -> Option<Result<String>> {
        if self.finished {
            return None;
        }
        match self.deltas.next().await {
            Some(Ok(delta)) => {
                self.buffer.push_str(&delta);
                Some(Ok(delta))
            }
            Some(Err(e)) => {
                self.finished = true;
                self.pending.rollback();
                Some(Err(generation_error(e)))
            }
            None => {
                self.finished = true;
                self.pending.commit(&self.query, &self.buffer);
                None
            }
        }
    }

    /// Text received so far.
    pub fn response(&self) -> &str {
        &self.buffer
    }

    /// Drain the stream, returning the full response.
    pub async fn collect(mut self) -> Result<String> {
        while let Some(delta) = self.next_delta().await {
            delta?;
        }
        Ok(std::mem::take(&mut self.buffer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;
    use async_trait::async_trait;
    use futures_util::stream;
    use std::sync::Mutex;

    /// Replies with a fixed script and records what it was sent.
    struct ScriptedLlm {
        reply: Vec<&'static str>,
        fail: bool,
        fail_mid_stream: bool,
        seen: Mutex<Vec<Vec<String>>>,
    }

    impl ScriptedLlm {
        fn new(reply: Vec<&'static str>) -> Self {
            Self {
                reply,
                fail: false,
                fail_mid_stream: false,
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl LlmService for ScriptedLlm {
        fn platform(&self) -> &str {
            "scripted"
        }

        async fn generate(&self, request: &GenerationRequest<'_>) -> Result<String> {
            self.seen
                .lock()
                .unwrap()
                .push(request.history.iter().map(|t| t.text()).collect());
            if self.fail {
                anyhow::bail!("401 unauthorized");
            }
            Ok(self.reply.concat())
        }

        async fn generate_stream(&self, request: &GenerationRequest<'_>) -> Result<DeltaStream> {
            self.seen
                .lock()
                .unwrap()
                .push(request.history.iter().map(|t| t.text()).collect());
            if self.fail {
                anyhow::bail!("connection refused");
            }
            let mut items: Vec<Result<String>> =
                self.reply.iter().map(|s| Ok(s.to_string())).collect();
            if self.fail_mid_stream {
                items.push(Err(anyhow::anyhow!("stream reset")));
            }
            Ok(Box::pin(stream::iter(items)))
        }
    }

    #[tokio::test]
    async fn test_ask_commits_pair_only() {
        let llm = ScriptedLlm::new(vec!["answer"]);
        let mut session = ChatSession::new("m");
        let reply = session.ask(&llm, "question", "CONTEXT", Some("P")).await.unwrap();
        assert_eq!(reply, "answer");

        let h = session.history();
        assert_eq!(h.len(), 2);
        assert!(h.is_well_formed());
        for t in h.turns() {
            let text = t.text();
            assert_ne!(text, DEFAULT_RULE);
            assert_ne!(text, "CONTEXT");
            assert_ne!(text, "prompt: P");
        }

        let seen = llm.seen.lock().unwrap();
        assert_eq!(seen[0], vec![DEFAULT_RULE, "CONTEXT", "prompt: P"]);
    }

    #[tokio::test]
    async fn test_second_request_sees_previous_pair() {
        let llm = ScriptedLlm::new(vec!["a"]);
        let mut session = ChatSession::new("m");
        session.ask(&llm, "q1", "c1", None).await.unwrap();
        session.ask(&llm, "q2", "c2", None).await.unwrap();
        let seen = llm.seen.lock().unwrap();
        assert_eq!(seen[1], vec![DEFAULT_RULE, "c2", "q1", "a"]);
        assert_eq!(session.history().len(), 4);
    }

    #[tokio::test]
    async fn test_failed_generation_rolls_back() {
        let mut llm = ScriptedLlm::new(vec![]);
        let mut session = ChatSession::new("m");
        session.ask(&llm, "q1", "c", None).await.unwrap();
        llm.fail = true;
        let err = session.ask(&llm, "q2", "c", None).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<EngineError>(),
            Some(EngineError::Generation(_))
        ));
        assert_eq!(session.history().len(), 2);
        assert!(!session.history().has_ephemeral());
    }

    #[tokio::test]
    async fn test_stream_accumulates_and_commits() {
        let llm = ScriptedLlm::new(vec!["Hel", "lo ", "there"]);
        let mut session = ChatSession::new("m");
        let mut stream = session.ask_stream(&llm, "hi", "ctx", None).await.unwrap();
        let mut deltas = Vec::new();
        while let Some(d) = stream.next_delta().await {
            deltas.push(d.unwrap());
        }
        assert_eq!(deltas, vec!["Hel", "lo ", "there"]);
        assert_eq!(stream.response(), "Hello there");
        drop(stream);

        let turns: Vec<_> = session.history().turns().cloned().collect();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].role, Role::User);
        assert_eq!(turns[1].text(), "Hello there");
    }

    #[tokio::test]
    async fn test_stream_dropped_early_leaves_history_unchanged() {
        let llm = ScriptedLlm::new(vec!["a", "b", "c"]);
        let mut session = ChatSession::new("m");
        session.ask(&llm, "q0", "", None).await.unwrap();
        {
            let mut stream = session.ask_stream(&llm, "q1", "ctx", None).await.unwrap();
            let first = stream.next_delta().await.unwrap().unwrap();
            assert_eq!(first, "a");
        }
        assert_eq!(session.history().len(), 2);
        assert!(!session.history().has_ephemeral());
    }

    #[tokio::test]
    async fn test_stream_error_rolls_back() {
        let mut llm = ScriptedLlm::new(vec!["partial"]);
        llm.fail_mid_stream = true;
        let mut session = ChatSession::new("m");
        let stream = session.ask_stream(&llm, "q", "ctx", None).await.unwrap();
        assert!(stream.collect().await.is_err());
        assert!(session.history().is_empty());
    }

    #[tokio::test]
    async fn test_stream_open_failure_rolls_back() {
        let mut llm = ScriptedLlm::new(vec![]);
        llm.fail = true;
        let mut session = ChatSession::new("m");
        assert!(session.ask_stream(&llm, "q", "ctx", None).await.is_err());
        assert!(session.history().is_empty());
    }

    #[tokio::test]
    async fn test_collect_returns_full_text() {
        let llm = ScriptedLlm::new(vec!["x", "y"]);
        let mut session = ChatSession::new("m");
        let stream = session.ask_stream(&llm, "q", "", None).await.unwrap();
        assert_eq!(stream.collect().await.unwrap(), "xy");
        assert_eq!(session.history().len(), 2);
    }
}
