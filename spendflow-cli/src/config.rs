use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use spendflow_llm::{BatchOptions, ProviderConfig, ProviderKind};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub llm: LlmSection,
    pub batch: BatchSection,
    pub categories: CategoriesSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSection {
    pub provider: String,
    pub model: String,
    /// Used by ollama / lmstudio / custom; ignored for hosted providers
    pub base_url: Option<String>,
    pub temperature: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSection {
    pub batch_size: usize,
    pub max_parallel: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoriesSection {
    pub parent_tags: Vec<String>,
}

/// The parent-tag enumeration transactions are categorized into. Callers
/// can replace it in config.toml; the pipeline never derives categories.
pub const DEFAULT_PARENT_TAGS: [&str; 14] = [
    "Food & Dining",
    "Food Delivery",
    "Transportation",
    "Shopping",
    "Entertainment & Recreation",
    "Housing",
    "Bills & Utilities",
    "Health & Wellness",
    "Education",
    "Finance & Fees",
    "Business & Work",
    "Insurance",
    "Personal Care",
    "Travel",
];

impl Default for Config {
    fn default() -> Self {
        Self {
            llm: LlmSection {
                provider: "openai".to_string(),
                model: "gpt-4o-mini".to_string(),
                base_url: None,
                temperature: 0.2,
            },
            batch: BatchSection {
                batch_size: 30,
                max_parallel: 3,
            },
            categories: CategoriesSection {
                parent_tags: DEFAULT_PARENT_TAGS.iter().map(|s| s.to_string()).collect(),
            },
        }
    }
}

impl Config {
    /// Translate the [llm] section into a provider config. API keys come
    /// from the environment only; the config file never holds credentials.
    pub fn provider_config(&self) -> Result<ProviderConfig> {
        let kind = ProviderKind::parse(&self.llm.provider)?;
        let mut config = ProviderConfig::new(kind, self.llm.model.clone());
        config.temperature = self.llm.temperature;
        config.base_url = self.llm.base_url.clone();
        config.api_key = match kind {
            ProviderKind::OpenAi => std::env::var("OPENAI_API_KEY").ok(),
            ProviderKind::Anthropic => std::env::var("ANTHROPIC_API_KEY").ok(),
            ProviderKind::Custom => std::env::var("CUSTOM_LLM_API_KEY").ok(),
            ProviderKind::Ollama | ProviderKind::LmStudio => None,
        };
        Ok(config)
    }

    pub fn batch_options(&self) -> BatchOptions {
        BatchOptions {
            batch_size: self.batch.batch_size,
            max_parallel: self.batch.max_parallel,
            ..BatchOptions::default()
        }
    }
}

fn spendflow_home() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME is not set")?;
    Ok(PathBuf::from(home).join(".spendflow"))
}

pub fn ensure_spendflow_home() -> Result<PathBuf> {
    let dir = spendflow_home()?;
    fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
    Ok(dir)
}

pub fn config_path() -> Result<PathBuf> {
    Ok(ensure_spendflow_home()?.join("config.toml"))
}

pub fn load_config() -> Result<Config> {
    let p = config_path()?;
    if !p.exists() {
        return Ok(Config::default());
    }
    let s = fs::read_to_string(&p).with_context(|| format!("read {}", p.display()))?;
    Ok(toml::from_str(&s).context("parse config.toml")?)
}

pub fn save_config(cfg: &Config) -> Result<()> {
    let p = config_path()?;
    let s = toml::to_string_pretty(cfg).context("serialize config")?;
    fs::write(&p, s).with_context(|| format!("write {}", p.display()))?;
    Ok(())
}

pub fn init_config() -> Result<()> {
    let p = config_path()?;
    if p.exists() {
        println!("Config already exists: {}", p.display());
        return Ok(());
    }
    save_config(&Config::default())?;
    println!("Wrote {}", p.display());
    Ok(())
}
