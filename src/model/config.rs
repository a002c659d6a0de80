//! Environment-driven configuration for providers and storage paths

use std::path::PathBuf;

const ENV_LLM_METHOD: &str = "LLM_METHOD";
const ENV_OPENAI_API_KEY: &str = "OPENAI_API_KEY";
const ENV_BEDROCK_BASE_URL: &str = "BEDROCK_BASE_URL";
const ENV_BEDROCK_API_KEY: &str = "BEDROCK_API_KEY";
const ENV_BEDROCK_MODEL: &str = "BEDROCK_MODEL";
const ENV_COMPLETION_MODEL: &str = "COMPLETION_MODEL";
const ENV_EMBEDDING_MODEL: &str = "EMBEDDING_MODEL";
const ENV_STORAGE_DIR: &str = "STORAGE_DIR";
const ENV_INDEX_DIR: &str = "INDEX_DIR";
const ENV_SERVICES_PATH: &str = "SERVICES_PATH";

const DEFAULT_COMPLETION_MODEL: &str = "gpt-4o";
const DEFAULT_BEDROCK_MODEL: &str = "claude-3.7-sonnet";
const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-large";
const DEFAULT_STORAGE_DIR: &str = "storage";
const DEFAULT_INDEX_DIR: &str = "index";
const DEFAULT_SERVICES_PATH: &str = "files/microservices.json";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} not set for method {1}")]
    MissingCredential(&'static str, LlmMethod),

    #[error("unsupported LLM method: {0}")]
    UnsupportedMethod(String),
}

/// Which completion backend the pipeline talks to.
///
/// Both speak the OpenAI chat-completions wire format; Bedrock goes through
/// an OpenAI-compatible gateway addressed by `BEDROCK_BASE_URL`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmMethod {
    OpenAi,
    Bedrock,
}

impl std::fmt::Display for LlmMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LlmMethod::OpenAi => f.write_str("OPENAI"),
            LlmMethod::Bedrock => f.write_str("BEDROCK"),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub method: LlmMethod,
    pub api_key: String,
    /// Custom gateway base URL (Bedrock method only)
    pub base_url: Option<String>,
    pub completion_model: String,
    pub embedding_model: String,
    /// Root directory of the per-assessment artifact store
    pub storage_dir: PathBuf,
    /// Root directory under which vector collections are persisted
    pub index_dir: PathBuf,
    /// Path to the microservice list produced by the architecture analysis
    pub services_path: PathBuf,
}

impl Config {
    /// Load configuration from the environment.
    ///
    /// The credential for the selected method is required; everything else
    /// falls back to a default.
    pub fn from_env() -> Result<Self, ConfigError> {
        let method = match std::env::var(ENV_LLM_METHOD) {
            Ok(m) if m.eq_ignore_ascii_case("bedrock") => LlmMethod::Bedrock,
            Ok(m) if m.eq_ignore_ascii_case("openai") => LlmMethod::OpenAi,
            Ok(m) => return Err(ConfigError::UnsupportedMethod(m)),
            Err(_) => LlmMethod::OpenAi,
        };

        let (api_key, base_url, completion_model) = match method {
            LlmMethod::OpenAi => {
                let key = std::env::var(ENV_OPENAI_API_KEY)
                    .map_err(|_| ConfigError::MissingCredential(ENV_OPENAI_API_KEY, method))?;
                let model = std::env::var(ENV_COMPLETION_MODEL)
                    .unwrap_or_else(|_| DEFAULT_COMPLETION_MODEL.to_string());
                (key, None, model)
            }
            LlmMethod::Bedrock => {
                let key = std::env::var(ENV_BEDROCK_API_KEY)
                    .map_err(|_| ConfigError::MissingCredential(ENV_BEDROCK_API_KEY, method))?;
                let base_url = std::env::var(ENV_BEDROCK_BASE_URL)
                    .map_err(|_| ConfigError::MissingCredential(ENV_BEDROCK_BASE_URL, method))?;
                let model = std::env::var(ENV_BEDROCK_MODEL)
                    .unwrap_or_else(|_| DEFAULT_BEDROCK_MODEL.to_string());
                (key, Some(base_url), model)
            }
        };

        let embedding_model = std::env::var(ENV_EMBEDDING_MODEL)
            .unwrap_or_else(|_| DEFAULT_EMBEDDING_MODEL.to_string());

        tracing::info!(method = %method, model = %completion_model, "Loaded pipeline configuration");

        Ok(Self {
            method,
            api_key,
            base_url,
            completion_model,
            embedding_model,
            storage_dir: env_path(ENV_STORAGE_DIR, DEFAULT_STORAGE_DIR),
            index_dir: env_path(ENV_INDEX_DIR, DEFAULT_INDEX_DIR),
            services_path: env_path(ENV_SERVICES_PATH, DEFAULT_SERVICES_PATH),
        })
    }
}

fn env_path(var: &str, default: &str) -> PathBuf {
    std::env::var(var)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(default))
}
