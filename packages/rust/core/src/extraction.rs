//! Model-backed extraction of a company record from website text.
//!
//! [`ChatExtractor`] talks to an OpenAI-compatible chat-completions endpoint
//! (or an Azure OpenAI deployment) and answers the model's sector tool calls
//! from a [`TaxonomyQueries`] implementation.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, info, instrument, warn};

use firmscope_shared::{FirmScopeError, LlmConfig, Result};
use firmscope_taxonomy::TaxonomyQueries;

use crate::prompt::{DEFAULT_REQUIREMENTS, system_prompt, user_prompt};

const SEARCH_TOOL: &str = "search_sectors_by_keywords";
const RECOMMEND_TOOL: &str = "get_sector_recommendations_for_company";

/// Model calls can be slow when tool rounds are involved.
const CHAT_TIMEOUT: Duration = Duration::from_secs(180);

/// Turns combined website text into raw (unparsed) record text.
#[async_trait]
pub trait Extractor: Send + Sync {
    async fn extract(&self, website_text: &str) -> Result<String>;
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// Connection settings for the chat-completions endpoint.
#[derive(Debug, Clone)]
pub struct ChatSettings {
    pub endpoint: String,
    pub model: String,
    pub api_key: String,
    /// Azure API version; selects deployment routing and `api-key` auth.
    pub api_version: Option<String>,
    pub temperature: f32,
    pub max_tool_rounds: usize,
}

impl ChatSettings {
    /// Build settings from config, reading the API key from the environment.
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        Ok(Self {
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            api_key: config.api_key()?,
            api_version: config.api_version.clone(),
            temperature: config.temperature,
            max_tool_rounds: config.max_tool_rounds,
        })
    }

    fn completions_url(&self) -> String {
        let base = self.endpoint.trim_end_matches('/');
        match &self.api_version {
            Some(version) => format!(
                "{base}/openai/deployments/{}/chat/completions?api-version={version}",
                self.model
            ),
            None => format!("{base}/chat/completions"),
        }
    }
}

/// Load requirements from an optional file; blank or absent means the default.
pub fn load_requirements(path: Option<&str>) -> Result<String> {
    let text = match path {
        Some(p) if !p.trim().is_empty() => {
            std::fs::read_to_string(p).map_err(|e| FirmScopeError::io(p, e))?
        }
        _ => String::new(),
    };

    if text.trim().is_empty() {
        if path.is_some() {
            warn!("requirements file is empty, using default requirements");
        }
        Ok(DEFAULT_REQUIREMENTS.to_string())
    } else {
        Ok(text)
    }
}

// ---------------------------------------------------------------------------
// Chat extractor
// ---------------------------------------------------------------------------

/// Extractor backed by a chat-completions model with sector tools.
pub struct ChatExtractor {
    client: Client,
    settings: ChatSettings,
    system_prompt: String,
    tools: Arc<dyn TaxonomyQueries>,
}

impl ChatExtractor {
    pub fn new(
        settings: ChatSettings,
        requirements: &str,
        tools: Arc<dyn TaxonomyQueries>,
    ) -> Result<Self> {
        let requirements = if requirements.trim().is_empty() {
            DEFAULT_REQUIREMENTS
        } else {
            requirements
        };
        let client = Client::builder()
            .timeout(CHAT_TIMEOUT)
            .build()
            .map_err(|e| FirmScopeError::Extraction(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            system_prompt: system_prompt(requirements),
            settings,
            tools,
        })
    }

    /// Build from `[llm]` config: API key from the environment, requirements
    /// from `requirements_file` when set.
    pub fn from_config(config: &LlmConfig, tools: Arc<dyn TaxonomyQueries>) -> Result<Self> {
        let settings = ChatSettings::from_config(config)?;
        let requirements = load_requirements(config.requirements_file.as_deref())?;
        Self::new(settings, &requirements, tools)
    }

    async fn complete(&self, messages: &[Value], allow_tools: bool) -> Result<AssistantMessage> {
        let body = json!({
            "model": self.settings.model,
            "temperature": self.settings.temperature,
            "messages": messages,
            "tools": tool_definitions(),
            "tool_choice": if allow_tools { "auto" } else { "none" },
        });

        let request = self.client.post(self.settings.completions_url()).json(&body);
        let request = if self.settings.api_version.is_some() {
            request.header("api-key", &self.settings.api_key)
        } else {
            request.bearer_auth(&self.settings.api_key)
        };

        let resp = request
            .send()
            .await
            .map_err(|e| FirmScopeError::Extraction(format!("chat request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(FirmScopeError::Extraction(format!(
                "chat endpoint returned {status}: {text}"
            )));
        }

        let parsed: ChatResponse = resp
            .json()
            .await
            .map_err(|e| FirmScopeError::Extraction(format!("invalid chat response: {e}")))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message)
            .ok_or_else(|| FirmScopeError::Extraction("chat response had no choices".into()))
    }
}

#[async_trait]
impl Extractor for ChatExtractor {
    #[instrument(skip_all, fields(model = %self.settings.model, chars = website_text.len()))]
    async fn extract(&self, website_text: &str) -> Result<String> {
        let mut messages = vec![
            json!({"role": "system", "content": self.system_prompt}),
            json!({"role": "user", "content": user_prompt(website_text)}),
        ];

        let max_rounds = self.settings.max_tool_rounds;
        for round in 0..=max_rounds {
            let message = self.complete(&messages, round < max_rounds).await?;
            let calls = message.tool_calls.unwrap_or_default();

            if calls.is_empty() || round == max_rounds {
                let content = message.content.unwrap_or_default();
                info!(round, chars = content.len(), "extraction complete");
                return Ok(content);
            }

            debug!(round, calls = calls.len(), "answering tool calls");
            messages.push(json!({
                "role": "assistant",
                "content": message.content,
                "tool_calls": calls,
            }));
            for call in &calls {
                let output =
                    dispatch_tool(self.tools.as_ref(), &call.function.name, &call.function.arguments);
                messages.push(json!({
                    "role": "tool",
                    "tool_call_id": call.id,
                    "content": output,
                }));
            }
        }

        // The final round always disables tools and returns above.
        Err(FirmScopeError::Extraction("tool round limit exceeded".into()))
    }
}

// ---------------------------------------------------------------------------
// Tools
// ---------------------------------------------------------------------------

fn tool_definitions() -> Value {
    json!([
        {
            "type": "function",
            "function": {
                "name": SEARCH_TOOL,
                "description": "Search the valid industries, sub-industries and solution areas by keywords.",
                "parameters": {
                    "type": "object",
                    "properties": {
                        "keywords": {
                            "type": "string",
                            "description": "Keywords such as 'fintech', 'healthcare' or 'AI'."
                        }
                    },
                    "required": ["keywords"]
                }
            }
        },
        {
            "type": "function",
            "function": {
                "name": RECOMMEND_TOOL,
                "description": "Recommend valid sectors for a company from its description and technologies.",
                "parameters": {
                    "type": "object",
                    "properties": {
                        "company_description": {
                            "type": "string",
                            "description": "Free-text description of the company."
                        },
                        "technologies": {
                            "type": "string",
                            "description": "Optional comma-separated list of technologies."
                        }
                    },
                    "required": ["company_description"]
                }
            }
        }
    ])
}

/// Run one tool call and return its JSON-encoded output.
pub fn dispatch_tool(tools: &dyn TaxonomyQueries, name: &str, arguments: &str) -> String {
    let args: Value = serde_json::from_str(arguments).unwrap_or(Value::Null);
    let text_arg = |key: &str| args.get(key).and_then(Value::as_str).unwrap_or("").to_string();

    match name {
        SEARCH_TOOL => to_json(&tools.search_by_keywords(&text_arg("keywords"))),
        RECOMMEND_TOOL => {
            let technologies = technologies_arg(args.get("technologies"));
            to_json(&tools.recommend_for_description(&text_arg("company_description"), &technologies))
        }
        other => {
            warn!(tool = other, "model called an unknown tool");
            json!({"error": format!("unknown tool '{other}'")}).to_string()
        }
    }
}

/// Accept either a comma-separated string or an array of strings.
fn technologies_arg(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::String(s)) => s
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect(),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

fn to_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|e| json!({"error": e.to_string()}).to_string())
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ToolCall>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ToolCall {
    id: String,
    #[serde(rename = "type", default = "function_kind")]
    kind: String,
    function: FunctionCall,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FunctionCall {
    name: String,
    #[serde(default)]
    arguments: String,
}

fn function_kind() -> String {
    "function".into()
}
