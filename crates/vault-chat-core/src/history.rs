//! Conversation history with ephemeral per-request entries.
//!
//! Each request temporarily injects a rule message, the assembled context,
//! and optionally a prompt marker ahead of the persisted turns. Those entries
//! are tagged ephemeral and removed by tag once the request ends, so the
//! persisted history only ever holds user/model pairs. Removal never compares
//! text: a user turn that happens to equal the rule text survives.

use serde::{Deserialize, Serialize};

use crate::models::{ConversationTurn, Role};

/// Instructions sent ahead of every request.
pub const DEFAULT_RULE: &str = "\
# Rules
1. Document references:
   - When you reference a document, give its wiki link (e.g. [[path/to/document]]).
   - Always use wiki-style links and only link documents that were provided.
   - Include a section reference when applicable (e.g. [[path/to/document#Section]]).
2. Context awareness:
   - \"Current Opened Document\" is the document the user is viewing.
   - \"Selected Text\" is the text the user has highlighted.
3. Response guidelines:
   - Answer in the language of the question.
   - Keep markdown formatting and structure the answer clearly.
---
Please process the following query based on these guidelines.";

/// Text of the prompt-marker entry for a selected prompt.
pub fn prompt_marker(prompt: &str) -> String {
    format!("prompt: {}", prompt)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub turn: ConversationTurn,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub ephemeral: bool,
}

/// Ephemeral material injected for one request.
#[derive(Debug, Clone, Copy)]
pub struct RequestPreamble<'a> {
    pub rule: &'a str,
    pub context: &'a str,
    pub prompt: Option<&'a str>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationHistory {
    entries: Vec<HistoryEntry>,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Persisted turns only.
    pub fn turns(&self) -> impl Iterator<Item = &ConversationTurn> {
        self.entries
            .iter()
            .filter(|e| !e.ephemeral)
            .map(|e| &e.turn)
    }

    /// Every entry, ephemeral ones included, in request order.
    pub fn working_turns(&self) -> Vec<ConversationTurn> {
        self.entries.iter().map(|e| e.turn.clone()).collect()
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn has_ephemeral(&self) -> bool {
        self.entries.iter().any(|e| e.ephemeral)
    }

    /// Inject the request preamble ahead of the persisted turns.
    ///
    /// The context entry is skipped when the context is empty.
    pub fn push_ephemeral(&mut self, preamble: &RequestPreamble<'_>) {
        let mut injected = vec![ConversationTurn::user(preamble.rule)];
        if !preamble.context.is_empty() {
            injected.push(ConversationTurn::user(preamble.context));
        }
        if let Some(prompt) = preamble.prompt.filter(|p| !p.is_empty()) {
            injected.push(ConversationTurn::user(prompt_marker(prompt)));
        }
        let injected = injected.into_iter().map(|turn| HistoryEntry {
            turn,
            ephemeral: true,
        });
        self.entries.splice(0..0, injected);
    }

    /// Remove every ephemeral entry.
    pub fn strip_ephemeral(&mut self) {
        self.entries.retain(|e| !e.ephemeral);
    }

    /// End a request: strip ephemeral entries and append the query/response pair.
    pub fn commit(&mut self, query: &str, response: &str) {
        self.strip_ephemeral();
        self.entries.push(HistoryEntry {
            turn: ConversationTurn::user(query),
            ephemeral: false,
        });
        self.entries.push(HistoryEntry {
            turn: ConversationTurn::model(response),
            ephemeral: false,
        });
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// True when persisted turns strictly alternate user/model, starting with user.
    pub fn is_well_formed(&self) -> bool {
        let turns: Vec<_> = self.turns().collect();
        turns.len() % 2 == 0
            && turns.chunks(2).all(|pair| {
                pair[0].role == Role::User && pair[1].role == Role::Model
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn preamble<'a>(context: &'a str, prompt: Option<&'a str>) -> RequestPreamble<'a> {
        RequestPreamble {
            rule: DEFAULT_RULE,
            context,
            prompt,
        }
    }

    #[test]
    fn test_ephemeral_precede_persisted() {
        let mut h = ConversationHistory::new();
        h.commit("q1", "a1");
        h.push_ephemeral(&preamble("ctx", Some("summarize")));
        let working = h.working_turns();
        assert_eq!(working.len(), 5);
        assert_eq!(working[0].text(), DEFAULT_RULE);
        assert_eq!(working[1].text(), "ctx");
        assert_eq!(working[2].text(), "prompt: summarize");
        assert_eq!(working[3].text(), "q1");
        assert_eq!(h.turns().count(), 2);
    }

    #[test]
    fn test_commit_strips_and_appends_pair() {
        let mut h = ConversationHistory::new();
        h.commit("q1", "a1");
        let before = h.len();
        h.push_ephemeral(&preamble("ctx", None));
        h.commit("q2", "a2");
        assert_eq!(h.len(), before + 2);
        assert!(!h.has_ephemeral());
        assert!(h.is_well_formed());
        let last: Vec<String> = h.turns().map(|t| t.text()).collect();
        assert_eq!(last, vec!["q1", "a1", "q2", "a2"]);
    }

    #[test]
    fn test_strip_by_tag_not_text() {
        let mut h = ConversationHistory::new();
        // A legitimate user turn identical to injected text must survive.
        h.commit(DEFAULT_RULE, "ok");
        h.commit("ctx", "fine");
        h.push_ephemeral(&preamble("ctx", None));
        h.strip_ephemeral();
        let texts: Vec<String> = h.turns().map(|t| t.text()).collect();
        assert_eq!(texts, vec![DEFAULT_RULE, "ok", "ctx", "fine"]);
    }

    #[test]
    fn test_empty_context_and_prompt_skipped() {
        let mut h = ConversationHistory::new();
        h.push_ephemeral(&preamble("", Some("")));
        assert_eq!(h.len(), 1);
    }

    #[test]
    fn test_clear() {
        let mut h = ConversationHistory::new();
        h.commit("q", "a");
        h.clear();
        assert!(h.is_empty());
    }

    #[test]
    fn test_serde_omits_ephemeral_flag_when_false() {
        let mut h = ConversationHistory::new();
        h.commit("q", "a");
        let json = serde_json::to_string(&h).unwrap();
        assert!(!json.contains("ephemeral"));
        assert!(json.contains("\"role\":\"user\""));
        let back: ConversationHistory = serde_json::from_str(&json).unwrap();
        assert_eq!(back, h);
    }
}
