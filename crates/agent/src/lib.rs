//! Agent layer - prompt assembly and delegation to the external agent runtime
//!
//! This crate owns everything between a validated request and the model call:
//! - Builds deterministic prompts from structured inputs (`prompts`)
//! - Short-circuits common support questions with canned answers (`quick_response`)
//! - Loads the support knowledge base handed to the support agent (`knowledge`)
//! - Dispatches prompts to the agent backend and shapes the results (`runtime`)
//!
//! # Key Types
//!
//! - `AgentClient` - Capability trait for the external agent runtime
//! - `AgentRuntime` - Trip planner team, support bot and recommender operations
//! - `QuickResponseMatcher` - Ordered keyword table for canned answers
//!
//! The model never sees anything except the prompt built here; reasoning,
//! retrieval and memory all happen on the other side of `AgentClient`.

pub mod knowledge;
pub mod llm;
pub mod openai;
pub mod prompts;
pub mod quick_response;
pub mod roles;
pub mod runtime;

pub use knowledge::KnowledgeBase;
pub use llm::{AgentClient, AgentError, AgentOutput, AgentRequest, ResponseFormat};
pub use openai::OpenAiAgentClient;
pub use quick_response::{QuickResponseMatcher, QuickResponseRule};
pub use roles::AgentRole;
pub use runtime::AgentRuntime;
