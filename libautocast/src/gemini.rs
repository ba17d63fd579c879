//! Gemini REST client implementing both generators
//!
//! Text goes through `models/{model}:generateContent`. Images use the image
//! model with `responseModalities = ["TEXT", "IMAGE"]`; the returned inline
//! PNG is written to `{public_dir}/generated/{content_id}.png` and served as
//! `/generated/{content_id}.png`.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::{AutocastError, ConfigError, Result};
use crate::generation::{ContentGenerator, GeneratedPost, ImageGenerator, SimulatedLead};
use crate::types::{ContentType, ConversationEntry, MessageRole, Project};

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_modalities: Vec<&'static str>,
}

#[derive(Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    role: String,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Deserialize)]
struct PostsEnvelope {
    #[serde(default)]
    posts: Vec<GeneratedPost>,
}

#[derive(Deserialize)]
struct KeywordsEnvelope {
    #[serde(default)]
    keywords: Vec<String>,
}

#[derive(Deserialize)]
struct LeadsEnvelope {
    #[serde(default)]
    leads: Vec<SimulatedLead>,
}

pub struct GeminiClient {
    http: reqwest::Client,
    api_key: SecretString,
    model: String,
    image_model: String,
    api_base: String,
    public_dir: PathBuf,
}

impl GeminiClient {
    pub fn new(http: reqwest::Client, api_key: SecretString, public_dir: PathBuf) -> Self {
        let defaults = crate::config::GeminiConfig::default();
        Self {
            http,
            api_key,
            model: defaults.model,
            image_model: defaults.image_model,
            api_base: DEFAULT_API_BASE.to_string(),
            public_dir,
        }
    }

    /// Build from `[gemini]`; fails when no API key is configured
    pub fn from_config(http: reqwest::Client, config: &Config) -> Result<Self> {
        let gemini = config.gemini.as_ref();
        let api_key = gemini
            .and_then(|g| g.api_key.as_ref())
            .map(|k| SecretString::from(k.expose_secret().to_string()))
            .ok_or_else(|| ConfigError::MissingField("gemini.api_key".to_string()))?;

        let mut client = Self::new(http, api_key, config.publishing.public_dir_path());
        if let Some(g) = gemini {
            client.model = g.model.clone();
            client.image_model = g.image_model.clone();
            if let Some(base) = &g.api_base {
                client.api_base = base.trim_end_matches('/').to_string();
            }
        }
        Ok(client)
    }

    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into().trim_end_matches('/').to_string();
        self
    }

    async fn call(&self, model: &str, request: &GenerateRequest) -> Result<Vec<Part>> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.api_base, model
        );
        let response = self
            .http
            .post(&url)
            .query(&[("key", self.api_key.expose_secret())])
            .json(request)
            .send()
            .await
            .map_err(|e| AutocastError::Upstream(format!("Gemini request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AutocastError::Upstream(format!(
                "Gemini API returned {}: {}",
                status.as_u16(),
                body
            )));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| AutocastError::Upstream(format!("Gemini response unreadable: {}", e)))?;

        Ok(parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts)
            .unwrap_or_default())
    }

    /// Send a single-turn prompt and return the concatenated text parts
    pub async fn generate_text(&self, prompt: &str) -> Result<String> {
        let request = GenerateRequest {
            contents: vec![user_turn(vec![text_part(prompt)])],
            generation_config: None,
        };
        let parts = self.call(&self.model, &request).await?;
        let text: String = parts.into_iter().filter_map(|p| p.text).collect();
        if text.trim().is_empty() {
            return Err(AutocastError::Upstream("Gemini returned no text".to_string()));
        }
        Ok(text)
    }

    async fn generate_json<T: DeserializeOwned>(&self, prompt: &str) -> Result<T> {
        let text = self.generate_text(prompt).await?;
        extract_json(&text)
    }
}

fn user_turn(parts: Vec<Part>) -> Content {
    Content {
        role: "user".to_string(),
        parts,
    }
}

fn text_part(text: &str) -> Part {
    Part {
        text: Some(text.to_string()),
        inline_data: None,
    }
}

/// Parse the span from the first `{` to the last `}`; tolerates code fences
/// and chatter around the object
pub fn extract_json<T: DeserializeOwned>(text: &str) -> Result<T> {
    let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) else {
        return Err(AutocastError::Upstream(
            "Gemini response contained no JSON object".to_string(),
        ));
    };
    if end < start {
        return Err(AutocastError::Upstream(
            "Gemini response contained no JSON object".to_string(),
        ));
    }
    serde_json::from_str(&text[start..=end])
        .map_err(|e| AutocastError::Upstream(format!("Gemini returned malformed JSON: {}", e)))
}

fn content_prompt(project: &Project, existing_captions: &[String]) -> String {
    let languages = if project.target_languages.is_empty() {
        String::new()
    } else {
        format!(
            "\n- Write each caption in English first, then translations into: {}. Keep every translation in the same \"caption\" field, each on its own labelled paragraph.",
            project.target_languages.join(", ")
        )
    };

    format!(
        r#"You are a social media marketer for tech startups. Write 6 posts for this project.

Project: {name}
Vision: {vision}
Repository: {repo}

Rules:
- Exactly 6 posts: 2 memes, 2 feature highlights, 2 brand/vision posts
- Do not repeat themes from these existing posts: {existing}{languages}
- Memes should be genuinely funny; features should name concrete capabilities; brand posts should tell the story
- Include relevant hashtags without the # sign
- Assign each post one platform from: Twitter, LinkedIn, Instagram

Respond with raw JSON only:
{{"posts": [{{"type": "meme", "caption": "...", "hashtags": ["..."], "platform": "Twitter", "imagePrompt": "..."}}]}}"#,
        name = project.name,
        vision = project.vision,
        repo = project.repo_url,
        existing = existing_captions.join(", "),
        languages = languages,
    )
}

fn keywords_prompt(project: &Project) -> String {
    format!(
        r#"Project: {}
Vision: {}

Give 5 short search phrases that find people on social media describing the problem this project solves. Prefer pain points, competitor complaints and industry hashtags. Do not include the project name.

Respond in JSON: {{"keywords": ["..."]}}"#,
        project.name, project.vision
    )
}

fn reply_prompt(project: &Project, lead_name: &str, pain_point: &str, history: &[ConversationEntry]) -> String {
    let history_text = if history.is_empty() {
        "No previous messages".to_string()
    } else {
        history
            .iter()
            .map(|entry| {
                let role = match entry.role {
                    MessageRole::Ai => "ai",
                    MessageRole::Lead => "lead",
                };
                format!("{}: {}", role, entry.message)
            })
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!(
        r#"You represent {name}, whose vision is "{vision}".
Write a natural reply to {lead} whose pain point is: "{pain}"

Previous conversation:
{history}

Keep it to 2-3 sentences, reference their problem, suggest a next step or ask a question, and do not sound like sales copy. If the conversation is ongoing, do not open with a greeting.

Respond with only the reply text."#,
        name = project.name,
        vision = project.vision,
        lead = lead_name,
        pain = pain_point,
        history = history_text,
    )
}

fn audience_prompt(project: &Project) -> String {
    format!(
        r#"Project: {}
What it does: {}

Imagine 8 realistic people across Twitter, LinkedIn and Instagram who would benefit from this project. For each give a name, platform, plausible profile URL, the pain point the project solves for them, and a reply under 280 characters that validates their problem before mentioning a solution. No emoji spam, no "we built this tool" openers.

Respond with raw JSON only:
{{"leads": [{{"name": "...", "platform": "Twitter", "profileUrl": "...", "painPoint": "...", "suggestedReply": "..."}}]}}"#,
        project.name, project.vision
    )
}

fn image_prompt(prompt: &str, content_type: ContentType, with_logo: bool) -> String {
    let style = match content_type {
        ContentType::Meme => "Bold meme-style illustration with strong contrast and room for a punchline.",
        ContentType::Feature => "Clean product showcase with a modern interface feel and soft gradients.",
        ContentType::Brand => "Cinematic, inspirational key art with warm lighting.",
    };
    let logo = if with_logo {
        " Incorporate the attached logo tastefully."
    } else {
        ""
    };
    format!("{} {} Square 1:1 social media image, no text overlays.{}", prompt, style, logo)
}

/// Split a `data:{mime};base64,{data}` URL
fn parse_data_url(url: &str) -> Option<InlineData> {
    let rest = url.strip_prefix("data:")?;
    let (mime_type, data) = rest.split_once(";base64,")?;
    Some(InlineData {
        mime_type: mime_type.to_string(),
        data: data.to_string(),
    })
}

fn valid_content_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

#[async_trait]
impl ContentGenerator for GeminiClient {
    async fn generate(&self, project: &Project, existing_captions: &[String]) -> Result<Vec<GeneratedPost>> {
        let envelope: PostsEnvelope = self
            .generate_json(&content_prompt(project, existing_captions))
            .await?;
        info!("Gemini proposed {} posts for {}", envelope.posts.len(), project.name);
        Ok(envelope.posts)
    }

    async fn suggest_keywords(&self, project: &Project) -> Result<Vec<String>> {
        let envelope: KeywordsEnvelope = self.generate_json(&keywords_prompt(project)).await?;
        Ok(envelope
            .keywords
            .into_iter()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .collect())
    }

    async fn draft_reply(
        &self,
        project: &Project,
        lead_name: &str,
        pain_point: &str,
        history: &[ConversationEntry],
    ) -> Result<String> {
        let text = self
            .generate_text(&reply_prompt(project, lead_name, pain_point, history))
            .await?;
        Ok(text.trim().to_string())
    }

    async fn simulate_leads(&self, project: &Project) -> Result<Vec<SimulatedLead>> {
        let envelope: LeadsEnvelope = self.generate_json(&audience_prompt(project)).await?;
        Ok(envelope.leads)
    }
}

#[async_trait]
impl ImageGenerator for GeminiClient {
    async fn render(
        &self,
        prompt: &str,
        content_id: &str,
        logo: Option<&str>,
        content_type: ContentType,
    ) -> Result<String> {
        if !valid_content_id(content_id) {
            return Err(AutocastError::InvalidInput(format!(
                "Content id not usable as a file name: {}",
                content_id
            )));
        }

        let logo_part = logo.and_then(parse_data_url);
        let mut parts = vec![text_part(&image_prompt(prompt, content_type, logo_part.is_some()))];
        if let Some(inline) = logo_part {
            parts.push(Part {
                text: None,
                inline_data: Some(inline),
            });
        }

        let request = GenerateRequest {
            contents: vec![user_turn(parts)],
            generation_config: Some(GenerationConfig {
                response_modalities: vec!["TEXT", "IMAGE"],
            }),
        };

        let image = self
            .call(&self.image_model, &request)
            .await?
            .into_iter()
            .find_map(|p| p.inline_data)
            .ok_or_else(|| AutocastError::Upstream("Gemini returned no image".to_string()))?;

        let bytes = STANDARD
            .decode(image.data.as_bytes())
            .map_err(|e| AutocastError::Upstream(format!("Gemini image was not valid base64: {}", e)))?;

        let dir = self.public_dir.join("generated");
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| AutocastError::Upstream(format!("Cannot create {}: {}", dir.display(), e)))?;
        let path = dir.join(format!("{}.png", content_id));
        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|e| AutocastError::Upstream(format!("Cannot write {}: {}", path.display(), e)))?;

        debug!("Wrote {} bytes to {}", bytes.len(), path.display());
        Ok(format!("/generated/{}.png", content_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NewProject;
    use serde_json::json;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn project() -> Project {
        NewProject {
            name: "Orbit".to_string(),
            vision: "Ship marketing on autopilot".to_string(),
            repo_url: "https://github.com/orbit/orbit".to_string(),
            target_languages: vec!["Spanish".to_string()],
            ..Default::default()
        }
        .into_project()
    }

    fn client(server: &MockServer, public_dir: PathBuf) -> GeminiClient {
        GeminiClient::new(
            reqwest::Client::new(),
            SecretString::from("test-key".to_string()),
            public_dir,
        )
        .with_api_base(server.uri())
    }

    fn text_response(text: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{"content": {"role": "model", "parts": [{"text": text}]}}]
        }))
    }

    #[test]
    fn test_extract_json_strips_code_fence() {
        let text = "```json\n{\"keywords\": [\"manual posting\"]}\n```";
        let parsed: KeywordsEnvelope = extract_json(text).unwrap();
        assert_eq!(parsed.keywords, vec!["manual posting"]);
    }

    #[test]
    fn test_extract_json_without_object_fails() {
        let result: Result<KeywordsEnvelope> = extract_json("no json here");
        assert!(matches!(result, Err(AutocastError::Upstream(_))));
    }

    #[test]
    fn test_content_prompt_mentions_languages_and_existing() {
        let prompt = content_prompt(&project(), &["First post".to_string()]);
        assert!(prompt.contains("Spanish"));
        assert!(prompt.contains("First post"));
    }

    #[test]
    fn test_parse_data_url() {
        let inline = parse_data_url("data:image/png;base64,AAAA").unwrap();
        assert_eq!(inline.mime_type, "image/png");
        assert_eq!(inline.data, "AAAA");
        assert!(parse_data_url("https://example.com/logo.png").is_none());
    }

    #[tokio::test]
    async fn test_generate_parses_posts() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-2.0-flash:generateContent"))
            .and(query_param("key", "test-key"))
            .respond_with(text_response(
                r#"Here you go: {"posts": [{"type": "feature", "caption": "Autopilot", "hashtags": ["ai"], "platform": "LinkedIn", "imagePrompt": "a rocket"}]}"#,
            ))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let posts = client(&server, dir.path().to_path_buf())
            .generate(&project(), &[])
            .await
            .unwrap();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].content_type, ContentType::Feature);
        assert_eq!(posts[0].platform, "LinkedIn");
    }

    #[tokio::test]
    async fn test_api_error_is_upstream() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("quota exceeded"))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let err = client(&server, dir.path().to_path_buf())
            .suggest_keywords(&project())
            .await
            .unwrap_err();
        match err {
            AutocastError::Upstream(message) => {
                assert!(message.contains("429"));
                assert!(message.contains("quota exceeded"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_render_writes_png_under_public_dir() {
        let server = MockServer::start().await;
        let png = STANDARD.encode(b"\x89PNG fake");
        Mock::given(method("POST"))
            .and(path(
                "/v1beta/models/gemini-2.0-flash-preview-image-generation:generateContent",
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{"content": {"parts": [
                    {"text": "Here is your image"},
                    {"inlineData": {"mimeType": "image/png", "data": png}}
                ]}}]
            })))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let url = client(&server, dir.path().to_path_buf())
            .render("a rocket", "c-1", None, ContentType::Brand)
            .await
            .unwrap();

        assert_eq!(url, "/generated/c-1.png");
        let written = std::fs::read(dir.path().join("generated").join("c-1.png")).unwrap();
        assert_eq!(written, b"\x89PNG fake");
    }

    #[tokio::test]
    async fn test_render_rejects_path_like_ids() {
        let server = MockServer::start().await;
        let dir = TempDir::new().unwrap();
        let err = client(&server, dir.path().to_path_buf())
            .render("p", "../escape", None, ContentType::Meme)
            .await
            .unwrap_err();
        assert!(matches!(err, AutocastError::InvalidInput(_)));
    }
}
