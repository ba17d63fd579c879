//! Content and image generation interfaces
//!
//! The cycle only sees these traits. [`crate::gemini::GeminiClient`] is the
//! production implementation; the scripted generators at the bottom of this
//! module drive tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

use crate::error::{AutocastError, Result};
use crate::types::{ContentType, ConversationEntry, Project};

/// One post proposed by the content generator
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedPost {
    #[serde(rename = "type")]
    pub content_type: ContentType,
    pub caption: String,
    #[serde(default)]
    pub hashtags: Vec<String>,
    /// Platform name as the generator wrote it; may be unsupported
    #[serde(default)]
    pub platform: String,
    #[serde(default)]
    pub image_prompt: Option<String>,
}

/// An AI-fabricated persona with the reply we would send them
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SimulatedLead {
    pub name: String,
    pub platform: String,
    #[serde(default)]
    pub profile_url: String,
    #[serde(default)]
    pub pain_point: String,
    #[serde(default)]
    pub suggested_reply: String,
}

#[async_trait]
pub trait ContentGenerator: Send + Sync {
    /// Propose new posts, avoiding themes in `existing_captions` and writing
    /// translations for the project's target languages
    async fn generate(&self, project: &Project, existing_captions: &[String]) -> Result<Vec<GeneratedPost>>;

    /// Search phrases for people describing the problem the project solves
    async fn suggest_keywords(&self, project: &Project) -> Result<Vec<String>>;

    async fn draft_reply(
        &self,
        project: &Project,
        lead_name: &str,
        pain_point: &str,
        history: &[ConversationEntry],
    ) -> Result<String>;

    async fn simulate_leads(&self, project: &Project) -> Result<Vec<SimulatedLead>>;
}

#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Render an image for a content item and return its URL or site path
    async fn render(
        &self,
        prompt: &str,
        content_id: &str,
        logo: Option<&str>,
        content_type: ContentType,
    ) -> Result<String>;
}

/// Canned content generator with call counters
#[derive(Debug, Clone, Default)]
pub struct ScriptedGenerator {
    pub posts: Vec<GeneratedPost>,
    pub generate_error: Option<String>,
    pub keywords: Vec<String>,
    pub keywords_error: Option<String>,
    /// `None` makes `draft_reply` fail
    pub reply: Option<String>,
    pub simulated: Vec<SimulatedLead>,
    pub simulate_error: Option<String>,
    pub generate_calls: Arc<Mutex<usize>>,
    pub draft_calls: Arc<Mutex<usize>>,
    /// Captions passed to each `generate` call
    pub seen_captions: Arc<Mutex<Vec<Vec<String>>>>,
}

impl ScriptedGenerator {
    pub fn generate_call_count(&self) -> usize {
        *self.generate_calls.lock().unwrap()
    }

    pub fn draft_call_count(&self) -> usize {
        *self.draft_calls.lock().unwrap()
    }
}

fn scripted<T: Clone>(value: &T, error: &Option<String>) -> Result<T> {
    match error {
        Some(message) => Err(AutocastError::Upstream(message.clone())),
        None => Ok(value.clone()),
    }
}

#[async_trait]
impl ContentGenerator for ScriptedGenerator {
    async fn generate(&self, _project: &Project, existing_captions: &[String]) -> Result<Vec<GeneratedPost>> {
        *self.generate_calls.lock().unwrap() += 1;
        self.seen_captions
            .lock()
            .unwrap()
            .push(existing_captions.to_vec());
        scripted(&self.posts, &self.generate_error)
    }

    async fn suggest_keywords(&self, _project: &Project) -> Result<Vec<String>> {
        scripted(&self.keywords, &self.keywords_error)
    }

    async fn draft_reply(
        &self,
        _project: &Project,
        _lead_name: &str,
        _pain_point: &str,
        _history: &[ConversationEntry],
    ) -> Result<String> {
        *self.draft_calls.lock().unwrap() += 1;
        self.reply
            .clone()
            .ok_or_else(|| AutocastError::Upstream("reply drafting unavailable".to_string()))
    }

    async fn simulate_leads(&self, _project: &Project) -> Result<Vec<SimulatedLead>> {
        scripted(&self.simulated, &self.simulate_error)
    }
}

/// Image generator that "renders" `/generated/{id}.png` without touching disk
#[derive(Debug, Clone, Default)]
pub struct ScriptedImages {
    /// Content ids whose render fails
    pub fail_for: Vec<String>,
    pub fail_all: bool,
    /// (content id, prompt) per call, in call order
    pub calls: Arc<Mutex<Vec<(String, String)>>>,
}

impl ScriptedImages {
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImageGenerator for ScriptedImages {
    async fn render(
        &self,
        prompt: &str,
        content_id: &str,
        _logo: Option<&str>,
        _content_type: ContentType,
    ) -> Result<String> {
        self.calls
            .lock()
            .unwrap()
            .push((content_id.to_string(), prompt.to_string()));

        if self.fail_all || self.fail_for.iter().any(|id| id == content_id) {
            return Err(AutocastError::Upstream("image model returned no image".to_string()));
        }
        Ok(format!("/generated/{}.png", content_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_post_parses_generator_json() {
        let post: GeneratedPost = serde_json::from_str(
            r#"{
                "type": "meme",
                "caption": "When the build passes",
                "hashtags": ["rust"],
                "platform": "Reddit",
                "imagePrompt": "a crab celebrating"
            }"#,
        )
        .unwrap();
        assert_eq!(post.content_type, ContentType::Meme);
        assert_eq!(post.platform, "Reddit");
        assert_eq!(post.image_prompt.as_deref(), Some("a crab celebrating"));
    }

    #[test]
    fn test_generated_post_optional_fields_default() {
        let post: GeneratedPost =
            serde_json::from_str(r#"{"type": "brand", "caption": "Builders build"}"#).unwrap();
        assert!(post.hashtags.is_empty());
        assert!(post.platform.is_empty());
        assert!(post.image_prompt.is_none());
    }

    #[tokio::test]
    async fn test_scripted_images_fail_for_selected_ids() {
        let images = ScriptedImages {
            fail_for: vec!["bad".to_string()],
            ..Default::default()
        };

        assert_eq!(
            images.render("p", "good", None, ContentType::Meme).await.unwrap(),
            "/generated/good.png"
        );
        assert!(images.render("p", "bad", None, ContentType::Meme).await.is_err());
        assert_eq!(images.calls().len(), 2);
    }
}
