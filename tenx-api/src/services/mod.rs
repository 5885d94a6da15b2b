//! Import pipeline services
//!
//! Download ([`github_client`]) → extraction ([`archive`]) → analysis
//! ([`repo_analyzer`]) → card drafts ([`card_generator`], optionally
//! reworded through [`llm_client`]) → storage, driven by
//! [`import_orchestrator`].

pub mod archive;
pub mod card_generator;
pub mod github_client;
pub mod import_orchestrator;
pub mod llm_client;
pub mod repo_analyzer;

pub use github_client::{GithubClient, GithubRepo};
pub use import_orchestrator::ImportOrchestrator;
pub use llm_client::LlmClient;
