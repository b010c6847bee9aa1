//! Configuration file support

use anyhow::Context;
use papyrus_ai::{Model, Provider};
use papyrus_arxiv::tools::expand_home;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Dotenv file read from the working directory, if present
pub const DOTENV_PATH: &str = "configs/.env";

/// Configuration for papyrus
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Chat model served by the provider
    pub model: String,
    /// Provider (ollama, openai, groq, openrouter, custom)
    pub provider: String,
    /// Override for the provider's chat-completions base URL
    pub base_url: Option<String>,
    /// API key (alternative to the provider's environment variable)
    pub api_key: Option<String>,
    pub temperature: f32,
    /// Default number of papers per search, as suggested to the model
    pub max_results: usize,
    pub papers_dir: PathBuf,
    pub checkpoints_dir: PathBuf,
    /// System prompt template; `{output_dir}` and `{max_results}` are filled in
    pub prompt_file: Option<PathBuf>,
    pub log_dir: PathBuf,
    pub arxiv_endpoint: String,
    /// Node steps allowed per run before giving up
    pub recursion_limit: u32,
    /// Listen address for `papyrus serve`
    pub http_addr: String,
}

impl Default for Config {
    fn default() -> Self {
        let data = Self::data_dir();
        Self {
            model: "qwen3:8b".to_string(),
            provider: "ollama".to_string(),
            base_url: None,
            api_key: None,
            temperature: 0.1,
            max_results: 5,
            papers_dir: data.join("papers"),
            checkpoints_dir: data.join("checkpoints"),
            prompt_file: None,
            log_dir: data.join("logs"),
            arxiv_endpoint: papyrus_arxiv::DEFAULT_ENDPOINT.to_string(),
            recursion_limit: 10,
            http_addr: "127.0.0.1:8000".to_string(),
        }
    }
}

impl Config {
    /// Get the config directory
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("papyrus")
    }

    /// Default home for papers, checkpoints and logs
    pub fn data_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("papyrus")
    }

    /// Get the config file path
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("PAPYRUS_CONFIG_PATH") {
            return PathBuf::from(path);
        }
        Self::config_dir().join("config.toml")
    }

    /// Load every layer: defaults, the TOML file, `configs/.env`, then the
    /// process environment. An explicit `path` replaces the usual lookup.
    pub fn load(path: Option<&Path>) -> Self {
        let path = path.map(Path::to_path_buf).unwrap_or_else(Self::config_path);
        let mut config = Self::from_file(&path);

        // Variables already set in the environment win over the file.
        match dotenv::from_filename(DOTENV_PATH) {
            Ok(_) => tracing::debug!(path = DOTENV_PATH, "loaded dotenv file"),
            Err(dotenv::Error::Io(_)) => {}
            Err(e) => eprintln!("Warning: Failed to parse {}: {}", DOTENV_PATH, e),
        }
        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    /// Load config from file, falling back to defaults
    pub fn from_file(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match fs::read_to_string(path) {
            Ok(content) => match toml::from_str::<Self>(&content) {
                Ok(config) => config.with_expanded_paths(),
                Err(e) => {
                    eprintln!("Warning: Failed to parse config file: {}", e);
                    Self::default()
                }
            },
            Err(e) => {
                eprintln!("Warning: Failed to read config file: {}", e);
                Self::default()
            }
        }
    }

    /// Resolve a leading `~` in the path fields
    fn with_expanded_paths(mut self) -> Self {
        let expand = |p: &Path| expand_home(&p.to_string_lossy());
        self.papers_dir = expand(&self.papers_dir);
        self.checkpoints_dir = expand(&self.checkpoints_dir);
        self.log_dir = expand(&self.log_dir);
        self.prompt_file = self.prompt_file.as_deref().map(expand);
        self
    }

    /// Overlay values from environment variables. Unparseable numbers are
    /// ignored with a warning.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("CHAT_MODEL_NAME") {
            self.model = v;
        }
        if let Some(v) = get("PAPYRUS_PROVIDER") {
            self.provider = v;
        }
        if let Some(v) = get("PAPYRUS_BASE_URL") {
            self.base_url = Some(v);
        }
        if let Some(v) = get("MAX_RESULTS") {
            match v.trim().parse() {
                Ok(n) => self.max_results = n,
                Err(_) => eprintln!("Warning: ignoring MAX_RESULTS={}", v),
            }
        }
        if let Some(v) = get("PAPERS_DIR") {
            self.papers_dir = expand_home(&v);
        }
        if let Some(v) = get("CHECKPOINTS_DIR") {
            self.checkpoints_dir = expand_home(&v);
        }
        if let Some(v) = get("ARXIV_PROMPT_PATH") {
            self.prompt_file = Some(expand_home(&v));
        }
        if let Some(v) = get("PAPYRUS_LOG_DIR") {
            self.log_dir = expand_home(&v);
        }
        if let Some(v) = get("ARXIV_API_ENDPOINT") {
            self.arxiv_endpoint = v;
        }
        if let Some(v) = get("PAPYRUS_HTTP_ADDR") {
            self.http_addr = v;
        }
    }

    /// The chat model this config points at
    pub fn chat_model(&self) -> Model {
        let model = Model::new(Provider::parse(&self.provider), &self.model);
        match self.base_url.as_deref().map(str::trim).filter(|u| !u.is_empty()) {
            Some(url) => model.with_base_url(url),
            None => model,
        }
    }

    /// Write the example config if no file exists yet
    pub fn init(path: Option<&Path>) -> anyhow::Result<PathBuf> {
        let path = path.map(Path::to_path_buf).unwrap_or_else(Self::config_path);
        if path.exists() {
            return Ok(path);
        }
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
        }
        fs::write(&path, example_config())
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(path)
    }
}

/// Generate example config content
pub fn example_config() -> &'static str {
    r#"# papyrus configuration file
# Place at ~/.config/papyrus/config.toml (Linux) or point PAPYRUS_CONFIG_PATH at it.
# Every key can also come from configs/.env or the environment.

# Chat model (CHAT_MODEL_NAME)
model = "qwen3:8b"

# Provider: ollama, openai, groq, openrouter, custom (PAPYRUS_PROVIDER)
provider = "ollama"

# Chat-completions base URL override (PAPYRUS_BASE_URL)
# base_url = "http://localhost:11434/v1"

# API key; OPENAI_API_KEY / GROQ_API_KEY / OPENROUTER_API_KEY also work
# api_key = "sk-..."

temperature = 0.1

# Papers per search suggested to the model (MAX_RESULTS)
max_results = 5

# Where PDFs are stored, one sub-directory per category (PAPERS_DIR)
# papers_dir = "~/papers"

# Conversation checkpoints, one JSONL file per thread (CHECKPOINTS_DIR)
# checkpoints_dir = "~/.local/share/papyrus/checkpoints"

# System prompt template (ARXIV_PROMPT_PATH)
# prompt_file = "prompts/arxiv.txt"

# Daily-rotated papyrus.log files (PAPYRUS_LOG_DIR)
# log_dir = "~/.local/share/papyrus/logs"

# arXiv Atom API (ARXIV_API_ENDPOINT)
arxiv_endpoint = "https://export.arxiv.org/api/query"

recursion_limit = 10

# Listen address for `papyrus serve` (PAPYRUS_HTTP_ADDR)
http_addr = "127.0.0.1:8000"
"#
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.provider, "ollama");
        assert_eq!(cfg.max_results, 5);
        assert_eq!(cfg.recursion_limit, 10);
        assert_eq!(cfg.http_addr, "127.0.0.1:8000");
        assert!(cfg.papers_dir.ends_with("papyrus/papers"));
        assert_eq!(cfg.chat_model().base_url, "http://localhost:11434/v1");
    }

    #[test]
    fn test_env_overrides_file_values() {
        let mut cfg: Config = toml::from_str("model = \"llama3\"\nmax_results = 8\n").unwrap();
        assert_eq!(cfg.model, "llama3");
        assert_eq!(cfg.provider, "ollama");

        cfg.apply_env(env(&[
            ("CHAT_MODEL_NAME", "qwen3:14b"),
            ("PAPERS_DIR", "/srv/papers"),
            ("PAPYRUS_PROVIDER", "groq"),
            ("ARXIV_API_ENDPOINT", "http://127.0.0.1:9/api/query"),
        ]));
        assert_eq!(cfg.model, "qwen3:14b");
        assert_eq!(cfg.max_results, 8);
        assert_eq!(cfg.papers_dir, PathBuf::from("/srv/papers"));
        assert_eq!(cfg.chat_model().provider, Provider::Groq);
        assert_eq!(cfg.arxiv_endpoint, "http://127.0.0.1:9/api/query");
    }

    #[test]
    fn test_bad_numbers_and_blank_values_ignored() {
        let mut cfg = Config::default();
        cfg.apply_env(env(&[("MAX_RESULTS", "lots"), ("CHAT_MODEL_NAME", "  ")]));
        assert_eq!(cfg.max_results, 5);
        assert_eq!(cfg.model, "qwen3:8b");
    }

    #[test]
    fn test_base_url_override() {
        let cfg = Config {
            provider: "custom".into(),
            base_url: Some("http://gpu-box:8000/v1/".into()),
            ..Config::default()
        };
        let model = cfg.chat_model();
        assert_eq!(model.provider, Provider::Custom);
        assert_eq!(model.base_url, "http://gpu-box:8000/v1");
    }

    #[test]
    fn test_init_writes_parseable_example() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        assert_eq!(Config::init(Some(&path)).unwrap(), path);

        let cfg = Config::from_file(&path);
        assert_eq!(cfg.model, "qwen3:8b");
        assert_eq!(cfg.arxiv_endpoint, papyrus_arxiv::DEFAULT_ENDPOINT);

        // An existing file is left alone.
        fs::write(&path, "model = \"kept\"\n").unwrap();
        Config::init(Some(&path)).unwrap();
        assert_eq!(Config::from_file(&path).model, "kept");
    }

    #[test]
    fn test_file_paths_expand_home() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "papers_dir = \"~/papers\"\nlog_dir = \"~/logs\"\nprompt_file = \"~/prompt.txt\"\ncheckpoints_dir = \"/srv/threads\"\n",
        )
        .unwrap();
        let home = dirs::home_dir().unwrap();

        let cfg = Config::from_file(&path);
        assert_eq!(cfg.papers_dir, home.join("papers"));
        assert_eq!(cfg.log_dir, home.join("logs"));
        assert_eq!(cfg.prompt_file, Some(home.join("prompt.txt")));
        assert_eq!(cfg.checkpoints_dir, PathBuf::from("/srv/threads"));
    }

    #[test]
    fn test_unparseable_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "model = [").unwrap();
        assert_eq!(Config::from_file(&path), Config::default());
    }
}
