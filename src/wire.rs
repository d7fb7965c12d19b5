//! OpenAI-compatible wire shapes
//!
//! Response types for the client-facing contract. Every provider's output is
//! normalized into these shapes before leaving the gateway.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Chat message as it appears in responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: Option<String>,
}

/// Non-streaming chat completion choice. `logprobs` is always serialized
/// (null) to match the wire contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatChoice {
    pub message: ChatMessage,
    pub finish_reason: Option<String>,
    pub index: u32,
    pub logprobs: Option<Value>,
}

/// Non-streaming chat completion document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletion {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub model: String,
    pub choices: Vec<ChatChoice>,
}

impl ChatCompletion {
    /// Wrap raw assistant text in a complete `chat.completion` document.
    pub fn from_text(model: &str, content: String) -> Self {
        Self {
            id: completion_id(),
            object: "chat.completion".to_string(),
            created: chrono::Utc::now().timestamp(),
            model: model.to_string(),
            choices: vec![ChatChoice {
                message: ChatMessage {
                    role: "assistant".to_string(),
                    content: Some(content),
                },
                finish_reason: Some("stop".to_string()),
                index: 0,
                logprobs: None,
            }],
        }
    }
}

/// Delta payload inside a streaming chunk.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChunkDelta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

/// Streaming chat completion choice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamChoice {
    pub index: u32,
    pub delta: ChunkDelta,
    pub finish_reason: Option<String>,
}

/// One `chat.completion.chunk` SSE event payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamChunk {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub model: String,
    pub choices: Vec<StreamChoice>,
}

impl StreamChunk {
    /// Content delta chunk with consistent stream metadata.
    pub fn delta(id: &str, created: i64, model: &str, content: String) -> Self {
        Self {
            id: id.to_string(),
            object: "chat.completion.chunk".to_string(),
            created,
            model: model.to_string(),
            choices: vec![StreamChoice {
                index: 0,
                delta: ChunkDelta {
                    role: Some("assistant".to_string()),
                    content: Some(content),
                },
                finish_reason: None,
            }],
        }
    }
}

/// One embedding row in an OpenAI-shaped embeddings response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingRow {
    pub object: String,
    pub index: u32,
    pub embedding: Vec<f64>,
}

/// OpenAI-shaped embeddings response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingList {
    pub object: String,
    pub model: String,
    pub data: Vec<EmbeddingRow>,
}

impl EmbeddingList {
    /// Normalize raw vectors into the OpenAI list shape.
    pub fn from_vectors(model: &str, vectors: Vec<Vec<f64>>) -> Self {
        Self {
            object: "list".to_string(),
            model: model.to_string(),
            data: vectors
                .into_iter()
                .enumerate()
                .map(|(index, embedding)| EmbeddingRow {
                    object: "embedding".to_string(),
                    index: index as u32,
                    embedding,
                })
                .collect(),
        }
    }
}

/// Fresh completion id in the `chatcmpl-` namespace.
pub fn completion_id() -> String {
    format!("chatcmpl-{}", Uuid::new_v4().simple())
}
