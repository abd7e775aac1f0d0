//! Providers with their own wire format.
//!
//! OpenAI-compatible endpoints (OpenAI, Groq, custom gateways) share
//! [`crate::llm::OpenAiCompatibleClient`].

pub mod gemini;
pub mod ollama;

pub use gemini::GeminiProvider;
pub use ollama::OllamaProvider;

pub use super::client::LlmProvider;
