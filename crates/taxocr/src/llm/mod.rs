//! Generative extraction: prompt selection, the model transport, output
//! repair and the retrying per-page extractor.

pub mod client;
pub mod extractor;
pub mod prompts;
pub mod repair;

pub use client::{AzureChatModel, GenerativeModel, ModelRequest, ScriptedModel};
pub use extractor::{ExtractorConfig, GenerativeExtractor, PageInput};
pub use prompts::{Prompt, PromptGroup};
pub use repair::parse_model_output;
