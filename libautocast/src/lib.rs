//! Autocast - an autonomous marketing agent for software projects
//!
//! Each cycle generates content, renders images, publishes to Twitter,
//! LinkedIn and Instagram, discovers leads and engages one of them.

pub mod config;
pub mod credentials;
pub mod error;
pub mod gemini;
pub mod generation;
pub mod leads;
pub mod logging;
pub mod oauth;
pub mod orchestrator;
pub mod platforms;
pub mod publisher;
pub mod scheduler;
pub mod service;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use config::Config;
pub use credentials::CredentialManager;
pub use error::{AutocastError, PlatformError, Result};
pub use orchestrator::CycleOrchestrator;
pub use publisher::PlatformPublisher;
pub use service::{AccountService, AutocastService};
pub use store::{Database, MemoryStore, RecordStore};
pub use types::{
    ContentItem, ContentStatus, ContentType, CycleResult, Lead, LeadStatus, Platform, Project,
    SocialAccount,
};
