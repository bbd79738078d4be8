//! Configuration management for grounded.
//!
//! Configuration is merged from, in increasing precedence:
//! - built-in defaults
//! - the YAML config file (`.grounded/config.yaml` or `--config`)
//! - environment variables (`GROUNDED_*`)
//! - command-line flags
//!
//! Every section of the YAML file is optional, and so is every key within a
//! section.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the workspace root (contains .grounded/)
    pub workspace: PathBuf,

    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// Log level override
    pub log_level: Option<String>,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,

    /// Timeout applied to every outbound service call, in seconds
    pub timeout_secs: u64,

    /// Optional YAML prompt definition replacing the built-in template
    pub prompt_file: Option<PathBuf>,

    pub vector_db: VectorDbSettings,
    pub embedding: EmbeddingSettings,
    pub llm: LlmSettings,
    pub retrieval: RetrievalSettings,
    pub segmentation: SegmentationSettings,
    pub ingest: IngestSettings,
}

/// Vector database connection and collection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct VectorDbSettings {
    /// Database URI: a local directory or an object-store URI.
    /// Relative paths are resolved against the workspace.
    pub url: String,

    /// Collection (table) name
    pub collection: String,

    /// Distance metric: "cosine", "dot" or "euclidean"
    pub distance: String,

    /// Credential passed to the store as `api_key`
    pub api_key: Option<String>,

    /// Extra storage options forwarded to the database connection
    pub storage_options: BTreeMap<String, String>,
}

impl Default for VectorDbSettings {
    fn default() -> Self {
        Self {
            url: ".grounded/vectors".to_string(),
            collection: "rag_poc".to_string(),
            distance: "cosine".to_string(),
            api_key: None,
            storage_options: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EmbeddingSettings {
    /// Backend name: "ollama" or "hashing"
    pub provider: String,
    pub endpoint: String,
    pub model: String,
    pub dimensions: usize,
    pub batch_size: usize,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            endpoint: "http://localhost:11434".to_string(),
            model: "e5-base-v2".to_string(),
            dimensions: 768,
            batch_size: 32,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LlmSettings {
    pub provider: String,
    pub endpoint: String,
    pub model: String,
    pub temperature: Option<f32>,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            endpoint: "http://localhost:11434".to_string(),
            model: "mistral".to_string(),
            temperature: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetrievalSettings {
    pub k: usize,
    pub fetch_k: usize,
    pub diversity_lambda: f32,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            k: 4,
            fetch_k: 20,
            diversity_lambda: 0.5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SegmentationSettings {
    pub target_words: usize,
    pub overlap_ratio: f32,

    /// Breakpoint strategy: "percentile", "standard_deviation" or "interquartile"
    pub breakpoint: String,

    /// Strategy parameter; the strategy's own default when unset
    pub breakpoint_amount: Option<f32>,
}

impl Default for SegmentationSettings {
    fn default() -> Self {
        Self {
            target_words: 300,
            overlap_ratio: 0.2,
            breakpoint: "percentile".to_string(),
            breakpoint_amount: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct IngestSettings {
    /// Corpus source locations: URLs or local paths
    pub sources: Vec<String>,
    pub upsert_batch_size: usize,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            sources: Vec::new(),
            upsert_batch_size: 64,
        }
    }
}

/// Full configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ConfigFile {
    workspace: Option<WorkspaceConfig>,
    logging: Option<LoggingConfig>,
    timeout_secs: Option<u64>,
    prompt_file: Option<PathBuf>,
    vector_db: Option<VectorDbSettings>,
    embedding: Option<EmbeddingSettings>,
    llm: Option<LlmSettings>,
    retrieval: Option<RetrievalSettings>,
    segmentation: Option<SegmentationSettings>,
    ingest: Option<IngestSettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WorkspaceConfig {
    path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoggingConfig {
    level: Option<String>,
    color: Option<bool>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_file: None,
            log_level: None,
            verbose: false,
            no_color: false,
            timeout_secs: 30,
            prompt_file: None,
            vector_db: VectorDbSettings::default(),
            embedding: EmbeddingSettings::default(),
            llm: LlmSettings::default(),
            retrieval: RetrievalSettings::default(),
            segmentation: SegmentationSettings::default(),
            ingest: IngestSettings::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, the config file and the environment.
    ///
    /// Environment variables:
    /// - `GROUNDED_WORKSPACE`, `GROUNDED_CONFIG`
    /// - `GROUNDED_VECTOR_DB_URL`, `GROUNDED_VECTOR_DB_API_KEY`, `GROUNDED_COLLECTION`
    /// - `GROUNDED_EMBEDDING_MODEL`, `GROUNDED_EMBEDDING_DIMENSIONS`
    /// - `GROUNDED_MODEL`, `GROUNDED_LLM_ENDPOINT`
    /// - `GROUNDED_DOC_URLS`: comma-separated corpus sources
    /// - `RUST_LOG`, `NO_COLOR`
    pub fn load() -> AppResult<Self> {
        let workspace = std::env::var("GROUNDED_WORKSPACE").ok().map(PathBuf::from);
        let config_file = std::env::var("GROUNDED_CONFIG").ok().map(PathBuf::from);
        Self::load_from(workspace, config_file)
    }

    /// Like [`AppConfig::load`], with the workspace and config file given
    /// explicitly. Either may be `None` to fall back to the defaults.
    pub fn load_from(workspace: Option<PathBuf>, config_file: Option<PathBuf>) -> AppResult<Self> {
        let mut config = Self::default();

        if let Some(workspace) = workspace {
            config.workspace = workspace;
        }
        config.config_file = config_file;

        if !config.workspace.exists() {
            return Err(AppError::Config(format!(
                "Workspace directory does not exist: {:?}",
                config.workspace
            )));
        }

        let config_path = match config.config_file {
            Some(ref cf) => cf.clone(),
            None => config.grounded_dir().join("config.yaml"),
        };

        if config_path.exists() {
            config.merge_yaml(&config_path)?;
        } else if config.config_file.is_some() {
            return Err(AppError::Config(format!(
                "Config file not found: {:?}",
                config_path
            )));
        }

        config.apply_env(|key| std::env::var(key).ok())?;

        Ok(config)
    }

    /// Merge a YAML configuration file into this config.
    fn merge_yaml(&mut self, path: &Path) -> AppResult<()> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        // An empty file deserializes to unit, not to a struct.
        if contents.trim().is_empty() {
            return Ok(());
        }

        let config_file: ConfigFile = serde_yaml::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;

        if let Some(ws) = config_file.workspace {
            if let Some(path) = ws.path {
                self.workspace = PathBuf::from(path);
            }
        }

        if let Some(logging) = config_file.logging {
            if let Some(level) = logging.level {
                self.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                self.no_color = !color;
            }
        }

        if let Some(timeout) = config_file.timeout_secs {
            self.timeout_secs = timeout;
        }
        if let Some(prompt_file) = config_file.prompt_file {
            self.prompt_file = Some(prompt_file);
        }
        if let Some(vector_db) = config_file.vector_db {
            self.vector_db = vector_db;
        }
        if let Some(embedding) = config_file.embedding {
            self.embedding = embedding;
        }
        if let Some(llm) = config_file.llm {
            self.llm = llm;
        }
        if let Some(retrieval) = config_file.retrieval {
            self.retrieval = retrieval;
        }
        if let Some(segmentation) = config_file.segmentation {
            self.segmentation = segmentation;
        }
        if let Some(ingest) = config_file.ingest {
            self.ingest = ingest;
        }

        Ok(())
    }

    /// Apply environment overrides read through `lookup`.
    fn apply_env<F>(&mut self, lookup: F) -> AppResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("GROUNDED_VECTOR_DB_URL") {
            self.vector_db.url = url;
        }
        if let Some(key) = lookup("GROUNDED_VECTOR_DB_API_KEY").filter(|k| !k.is_empty()) {
            self.vector_db.api_key = Some(key);
        }
        if let Some(collection) = lookup("GROUNDED_COLLECTION") {
            self.vector_db.collection = collection;
        }
        if let Some(model) = lookup("GROUNDED_EMBEDDING_MODEL") {
            self.embedding.model = model;
        }
        if let Some(dims) = lookup("GROUNDED_EMBEDDING_DIMENSIONS") {
            self.embedding.dimensions = dims.parse().map_err(|_| {
                AppError::Config(format!("GROUNDED_EMBEDDING_DIMENSIONS is not a number: {}", dims))
            })?;
        }
        if let Some(model) = lookup("GROUNDED_MODEL") {
            self.llm.model = model;
        }
        if let Some(endpoint) = lookup("GROUNDED_LLM_ENDPOINT") {
            self.llm.endpoint = endpoint;
        }
        if let Some(urls) = lookup("GROUNDED_DOC_URLS") {
            self.ingest.sources = split_sources(&urls);
        }
        if let Some(level) = lookup("RUST_LOG") {
            self.log_level = Some(level);
        }
        if lookup("NO_COLOR").is_some() {
            self.no_color = true;
        }

        Ok(())
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// CLI flags take precedence over environment variables and the config file.
    #[allow(clippy::too_many_arguments)]
    pub fn with_overrides(
        mut self,
        workspace: Option<PathBuf>,
        config_file: Option<PathBuf>,
        model: Option<String>,
        collection: Option<String>,
        log_level: Option<String>,
        verbose: bool,
        no_color: bool,
    ) -> Self {
        if let Some(workspace) = workspace {
            self.workspace = workspace;
        }

        if let Some(config_file) = config_file {
            self.config_file = Some(config_file);
        }

        if let Some(model) = model {
            self.llm.model = model;
        }

        if let Some(collection) = collection {
            self.vector_db.collection = collection;
        }

        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if verbose {
            self.verbose = true;
            // Verbose mode implies debug logging
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        self
    }

    /// Get the path to the .grounded directory.
    pub fn grounded_dir(&self) -> PathBuf {
        self.workspace.join(".grounded")
    }

    /// Ensure the .grounded directory exists.
    pub fn ensure_grounded_dir(&self) -> AppResult<()> {
        let dir = self.grounded_dir();
        if !dir.exists() {
            std::fs::create_dir_all(&dir).map_err(|e| {
                AppError::Config(format!("Failed to create .grounded directory: {}", e))
            })?;
        }
        Ok(())
    }

    /// Vector database URI with relative local paths resolved against the workspace.
    pub fn vector_db_uri(&self) -> String {
        let url = &self.vector_db.url;
        if url.contains("://") || Path::new(url).is_absolute() {
            url.clone()
        } else {
            self.workspace.join(url).to_string_lossy().into_owned()
        }
    }

    /// Validate value ranges.
    pub fn validate(&self) -> AppResult<()> {
        let known_distances = ["cosine", "dot", "euclidean"];
        if !known_distances.contains(&self.vector_db.distance.as_str()) {
            return Err(AppError::Config(format!(
                "Unknown distance metric: {}. Supported: {}",
                self.vector_db.distance,
                known_distances.join(", ")
            )));
        }

        if self.vector_db.collection.trim().is_empty() {
            return Err(AppError::Config("Collection name must not be empty".into()));
        }

        if self.embedding.dimensions == 0 {
            return Err(AppError::Config("Embedding dimensions must be positive".into()));
        }

        if self.embedding.batch_size == 0 || self.ingest.upsert_batch_size == 0 {
            return Err(AppError::Config("Batch sizes must be positive".into()));
        }

        if self.retrieval.k == 0 {
            return Err(AppError::Config("Retrieval k must be positive".into()));
        }

        if !(0.0..=1.0).contains(&self.retrieval.diversity_lambda) {
            return Err(AppError::Config(format!(
                "diversity_lambda must be within [0, 1], got {}",
                self.retrieval.diversity_lambda
            )));
        }

        if self.segmentation.target_words == 0 {
            return Err(AppError::Config("target_words must be positive".into()));
        }

        if !(0.0..1.0).contains(&self.segmentation.overlap_ratio) {
            return Err(AppError::Config(format!(
                "overlap_ratio must be within [0, 1), got {}",
                self.segmentation.overlap_ratio
            )));
        }

        if self.timeout_secs == 0 {
            return Err(AppError::Config("timeout_secs must be positive".into()));
        }

        Ok(())
    }
}

/// Split a comma-separated source list, dropping blanks.
pub fn split_sources(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
