use std::collections::HashMap;
use std::sync::Arc;

use lousa_domain::{
    estimate_tokens, ChatMessage, ChatRequest, ChatRole, ConversationId, ConversationStore,
    Error, MemoryConfig, Message, ProviderService,
};
use tracing::debug;

const SUMMARY_PROMPT: &str = "Resuma a conversa a seguir em no máximo 200 palavras, \
preservando fatos, nomes, definições e decisões importantes. Responda apenas com o resumo.";

/// Stop words dropped during entity extraction (English and Portuguese
/// function words of four characters or more).
const STOP_WORDS: &[&str] = &[
    "about", "after", "again", "been", "before", "being", "could", "does", "each", "from",
    "have", "here", "into", "just", "like", "more", "most", "only", "other", "over", "same",
    "should", "some", "such", "than", "that", "their", "them", "then", "there", "these",
    "they", "this", "those", "very", "were", "what", "when", "where", "which", "while",
    "will", "with", "would", "your",
    "ainda", "algum", "alguma", "antes", "aquela", "aquele", "assim", "cada", "como", "depois",
    "desde", "dessa", "desse", "desta", "deste", "elas", "eles", "entre", "essa", "esse",
    "esta", "está", "estão", "este", "isso", "isto", "mais", "mesmo", "muito", "nessa",
    "nesse", "nesta", "neste", "onde", "outra", "outro", "para", "pela", "pelo", "porque",
    "qual", "quando", "quem", "seja", "sendo", "será", "seus", "suas", "também",
    "tinha", "todo", "toda", "todos", "todas", "você", "vocês",
];

/// Heuristic classification of an extracted entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Document,
    Concept,
    Topic,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entity {
    pub word: String,
    pub count: usize,
    pub kind: EntityKind,
}

/// Which strategy produced the memory context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryMode {
    Buffer,
    Hybrid,
}

/// LLM-ready conversation context, bounded by the token budget.
#[derive(Debug, Clone)]
pub struct MemoryContext {
    pub messages: Vec<ChatMessage>,
    pub mode: MemoryMode,
    pub entities: Vec<Entity>,
}

impl MemoryContext {
    pub fn empty() -> Self {
        Self { messages: Vec::new(), mode: MemoryMode::Buffer, entities: Vec::new() }
    }

    pub fn token_count_approx(&self) -> u32 {
        self.messages.iter().map(|m| m.token_count_approx()).sum()
    }
}

/// Builds bounded conversation context with a hybrid buffer+summary strategy
/// and entity hints.
pub struct MemoryManager {
    conversations: Arc<dyn ConversationStore>,
    provider: Arc<dyn ProviderService>,
    config: MemoryConfig,
}

impl MemoryManager {
    pub fn new(
        conversations: Arc<dyn ConversationStore>,
        provider: Arc<dyn ProviderService>,
        config: MemoryConfig,
    ) -> Self {
        Self { conversations, provider, config }
    }

    /// Produces the message list for one conversation. Summary generation
    /// failures silently fall back to buffer memory.
    pub async fn build(&self, conversation_id: &ConversationId) -> anyhow::Result<MemoryContext> {
        let messages = self.conversations.messages(conversation_id).await?;
        if messages.is_empty() {
            return Ok(MemoryContext::empty());
        }

        let total_tokens: u32 = messages.iter().map(|m| estimate_tokens(&m.content)).sum();
        let entities = extract_entities(&messages, self.config.entity_threshold);

        let summary_pool = messages
            .len()
            .saturating_sub(self.config.max_messages);
        let fits_buffer = messages.len() <= self.config.summary_threshold
            && total_tokens <= self.config.max_tokens;

        if fits_buffer || summary_pool == 0 {
            return Ok(self.buffer(&messages, &entities));
        }

        let (older, recent) = messages.split_at(summary_pool);
        match self.summarize(older).await {
            Ok(summary) => Ok(self.hybrid(&summary, recent, &entities)),
            Err(e) => {
                debug!(error = %e, "Summary generation failed, falling back to buffer memory");
                Ok(self.buffer(&messages, &entities))
            }
        }
    }

    fn buffer(&self, messages: &[Message], entities: &[Entity]) -> MemoryContext {
        let note = entity_note(entities);
        let note_tokens = note.as_ref().map(|n| n.token_count_approx()).unwrap_or(0);
        let budget = self.config.max_tokens.saturating_sub(note_tokens);

        let mut out = Vec::new();
        out.extend(note);
        out.extend(fit_suffix(messages, budget));
        MemoryContext { messages: out, mode: MemoryMode::Buffer, entities: entities.to_vec() }
    }

    fn hybrid(&self, summary: &str, recent: &[Message], entities: &[Entity]) -> MemoryContext {
        let summary_message =
            ChatMessage::system(format!("Previous conversation summary: {summary}"));
        let note = entity_note(entities);

        let used = summary_message.token_count_approx()
            + note.as_ref().map(|n| n.token_count_approx()).unwrap_or(0);
        let budget = self.config.max_tokens.saturating_sub(used);

        let mut out = vec![summary_message];
        out.extend(note);
        out.extend(fit_suffix(recent, budget));
        MemoryContext { messages: out, mode: MemoryMode::Hybrid, entities: entities.to_vec() }
    }

    async fn summarize(&self, older: &[Message]) -> anyhow::Result<String> {
        let transcript = older
            .iter()
            .map(|m| format!("{}: {}", m.role, m.content))
            .collect::<Vec<_>>()
            .join("\n");

        let request = ChatRequest::new(vec![
            ChatMessage::system(SUMMARY_PROMPT),
            ChatMessage::user(transcript),
        ])
        .max_tokens(300u32);

        let completion = self.provider.chat(request).await?;
        if completion.is_empty() {
            anyhow::bail!(Error::ModelReturnedEmpty);
        }
        Ok(completion.content.trim().to_string())
    }
}

/// Trailing suffix of `messages` whose estimated tokens fit in `budget`,
/// preserving order.
fn fit_suffix(messages: &[Message], budget: u32) -> Vec<ChatMessage> {
    let mut taken = Vec::new();
    let mut used = 0u32;
    for message in messages.iter().rev() {
        let tokens = estimate_tokens(&message.content);
        if used + tokens > budget {
            break;
        }
        used += tokens;
        taken.push(ChatMessage {
            role: ChatRole::from(message.role),
            content: message.content.clone(),
        });
    }
    taken.reverse();
    taken
}

fn entity_note(entities: &[Entity]) -> Option<ChatMessage> {
    if entities.is_empty() {
        return None;
    }
    let words: Vec<&str> = entities.iter().take(5).map(|e| e.word.as_str()).collect();
    Some(ChatMessage::system(format!(
        "Key topics in this conversation: {}",
        words.join(", ")
    )))
}

/// Frequency-based entity extraction over the lowercased message contents.
pub fn extract_entities(messages: &[Message], threshold: usize) -> Vec<Entity> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for message in messages {
        let lowered = message.content.to_lowercase();
        for token in lowered.split(|c: char| !c.is_alphanumeric()) {
            if token.chars().count() < 4 {
                continue;
            }
            if token.chars().all(|c| c.is_numeric()) {
                continue;
            }
            if STOP_WORDS.contains(&token) {
                continue;
            }
            *counts.entry(token.to_string()).or_default() += 1;
        }
    }

    let mut entities: Vec<Entity> = counts
        .into_iter()
        .filter(|(_, count)| *count >= threshold.max(1))
        .map(|(word, count)| Entity { kind: classify(&word), word, count })
        .collect();
    entities.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.word.cmp(&b.word)));
    entities
}

fn classify(word: &str) -> EntityKind {
    if word.contains("doc") || word.contains("pdf") || word.contains("arquivo") {
        EntityKind::Document
    } else if word.ends_with("ção") || word.ends_with("mento") || word.contains("conceito") {
        EntityKind::Concept
    } else {
        EntityKind::Topic
    }
}

#[cfg(test)]
mod tests {
    use lousa_domain::{Conversation, ProjectId};
    use pretty_assertions::assert_eq;

    use super::*;

    fn message(role_user: bool, content: &str) -> Message {
        let id = ConversationId::generate();
        if role_user {
            Message::user(id, content)
        } else {
            Message::assistant(id, content, Default::default())
        }
    }

    #[test]
    fn entities_require_threshold_frequency() {
        let fixture = vec![
            message(true, "fotossíntese é importante"),
            message(false, "a fotossíntese converte luz"),
            message(true, "luz aparece uma vez aqui não, duas"),
        ];

        let actual = extract_entities(&fixture, 2);
        let words: Vec<&str> = actual.iter().map(|e| e.word.as_str()).collect();
        assert!(words.contains(&"fotossíntese"));
        assert!(!words.contains(&"importante"));
    }

    #[test]
    fn entity_classification_is_heuristic() {
        let fixture = vec![
            message(true, "o arquivo arquivo chegou"),
            message(true, "educação educação plena"),
            message(true, "brasil brasil colonial"),
        ];

        let actual = extract_entities(&fixture, 2);
        let kinds: Vec<(String, EntityKind)> =
            actual.into_iter().map(|e| (e.word, e.kind)).collect();
        assert!(kinds.contains(&("arquivo".to_string(), EntityKind::Document)));
        assert!(kinds.contains(&("educação".to_string(), EntityKind::Concept)));
        assert!(kinds.contains(&("brasil".to_string(), EntityKind::Topic)));
    }

    #[test]
    fn stop_words_and_short_tokens_are_dropped() {
        let fixture = vec![
            message(true, "para para para 1234 1234 oi oi oi"),
        ];

        let actual = extract_entities(&fixture, 2);
        assert_eq!(actual, vec![]);
    }

    #[test]
    fn fit_suffix_respects_budget_and_order() {
        let fixture: Vec<Message> = (0..6)
            .map(|i| message(i % 2 == 0, &format!("mensagem numero {i} com conteudo")))
            .collect();
        // each message is 30 chars -> 8 tokens

        let actual = fit_suffix(&fixture, 20);
        let contents: Vec<&str> = actual.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(
            contents,
            vec![
                "mensagem numero 4 com conteudo",
                "mensagem numero 5 com conteudo"
            ]
        );
    }

    mod manager {
        use std::sync::Arc;

        use async_trait::async_trait;
        use lousa_domain::{
            ChatCompletion, ChatDelta, ConversationStore, ResultStream, Usage,
        };
        use lousa_infra::InMemoryConversationStore;
        use pretty_assertions::assert_eq;

        use super::*;

        struct FixedProvider {
            summary: anyhow::Result<String>,
        }

        impl FixedProvider {
            fn ok(summary: &str) -> Self {
                Self { summary: Ok(summary.to_string()) }
            }

            fn failing() -> Self {
                Self { summary: Err(anyhow::anyhow!("model down")) }
            }
        }

        #[async_trait]
        impl ProviderService for FixedProvider {
            async fn chat(&self, _request: ChatRequest) -> anyhow::Result<ChatCompletion> {
                match &self.summary {
                    Ok(content) => Ok(ChatCompletion::new(content.clone(), Usage::default())),
                    Err(e) => Err(anyhow::anyhow!("{e}")),
                }
            }

            async fn chat_stream(
                &self,
                _request: ChatRequest,
            ) -> ResultStream<ChatDelta, anyhow::Error> {
                Err(anyhow::anyhow!("not streamed in tests"))
            }

            async fn embed_batch(&self, texts: Vec<String>) -> anyhow::Result<Vec<Vec<f32>>> {
                Ok(texts.iter().map(|_| vec![0.0]).collect())
            }

            async fn embed_query(&self, _text: &str) -> anyhow::Result<Vec<f32>> {
                Ok(vec![0.0])
            }

            fn embedding_dimension(&self) -> u64 {
                1
            }
        }

        async fn conversation_with(
            store: &InMemoryConversationStore,
            count: usize,
            content: &str,
        ) -> ConversationId {
            let conversation = Conversation::new(ProjectId::generate());
            let id = conversation.id;
            store.create(conversation).await.unwrap();
            for i in 0..count {
                let message = if i % 2 == 0 {
                    Message::user(id, content)
                } else {
                    Message::assistant(id, content, Default::default())
                };
                store.append_message(message).await.unwrap();
            }
            id
        }

        #[tokio::test]
        async fn small_conversations_use_buffer_memory() {
            let store = Arc::new(InMemoryConversationStore::new());
            let id = conversation_with(&store, 4, "pergunta curta").await;
            let manager = MemoryManager::new(
                store,
                Arc::new(FixedProvider::ok("resumo")),
                MemoryConfig::default(),
            );

            let actual = manager.build(&id).await.unwrap();
            assert_eq!(actual.mode, MemoryMode::Buffer);
            assert_eq!(
                actual
                    .messages
                    .iter()
                    .filter(|m| m.role == ChatRole::System)
                    .count(),
                1 // only the entity note
            );
        }

        #[tokio::test]
        async fn long_conversations_use_hybrid_memory() {
            let store = Arc::new(InMemoryConversationStore::new());
            let id = conversation_with(&store, 25, &"fotossíntese e clorofila ".repeat(8)).await;
            let manager = MemoryManager::new(
                store,
                Arc::new(FixedProvider::ok("os alunos discutiram fotossíntese")),
                MemoryConfig::default(),
            );

            let actual = manager.build(&id).await.unwrap();
            assert_eq!(actual.mode, MemoryMode::Hybrid);
            assert!(actual.messages[0]
                .content
                .starts_with("Previous conversation summary:"));
            assert!(actual.token_count_approx() <= MemoryConfig::default().max_tokens);
        }

        #[tokio::test]
        async fn summary_failure_falls_back_to_buffer() {
            let store = Arc::new(InMemoryConversationStore::new());
            let id = conversation_with(&store, 25, &"história do brasil ".repeat(10)).await;
            let manager = MemoryManager::new(
                store,
                Arc::new(FixedProvider::failing()),
                MemoryConfig::default(),
            );

            let actual = manager.build(&id).await.unwrap();
            assert_eq!(actual.mode, MemoryMode::Buffer);
            assert!(actual.token_count_approx() <= MemoryConfig::default().max_tokens);
        }

        #[tokio::test]
        async fn empty_conversation_yields_empty_context() {
            let store = Arc::new(InMemoryConversationStore::new());
            let conversation = Conversation::new(ProjectId::generate());
            let id = conversation.id;
            store.create(conversation).await.unwrap();
            let manager = MemoryManager::new(
                store,
                Arc::new(FixedProvider::ok("resumo")),
                MemoryConfig::default(),
            );

            let actual = manager.build(&id).await.unwrap();
            assert_eq!(actual.messages.len(), 0);
        }
    }
}
