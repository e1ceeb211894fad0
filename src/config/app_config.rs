use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;

use crate::domain::ingestion::{
    BoundaryKind, ChunkingParams, ChunkingStrategy, ImportanceTable, StrategySelection,
    validate_concurrency, validate_unit_size,
};
use crate::domain::DomainError;
use crate::infrastructure::ingestion::{ReferenceExtractor, TieBreak};

/// Application configuration
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub logging: LoggingConfig,
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Chunking and indexing options
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    pub target_chunk_size: usize,
    pub max_chunk_size: usize,
    pub chunk_overlap: usize,
    pub min_chunk_size: usize,
    pub strategy: StrategySelection,
    pub change_ratio_threshold: f64,
    pub worker_pool_size: usize,
    /// Defaults to `worker_pool_size`
    pub batch_concurrency: Option<usize>,
    pub large_document_unit_size: usize,
    pub semantic_lookahead: usize,
    pub window_adjust_limit: usize,
    /// Regex for free-text references; capture group 1 is the target
    pub see_also_pattern: Option<String>,
    /// Per boundary kind weight overrides
    pub importance: HashMap<BoundaryKind, f32>,
    pub call_timeout_secs: u64,
    pub reference_tie_break: TieBreak,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            target_chunk_size: 1000,
            max_chunk_size: 2000,
            chunk_overlap: 200,
            min_chunk_size: 50,
            strategy: StrategySelection::Auto,
            change_ratio_threshold: 0.5,
            worker_pool_size: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            batch_concurrency: None,
            large_document_unit_size: 50_000,
            semantic_lookahead: 10,
            window_adjust_limit: 200,
            see_also_pattern: None,
            importance: HashMap::new(),
            call_timeout_secs: 30,
            reference_tie_break: TieBreak::default(),
        }
    }
}

/// Report a runtime validation failure as a configuration error on `field`
fn field_error(field: &'static str) -> impl Fn(DomainError) -> DomainError {
    move |e| match e {
        DomainError::Validation { message } => {
            DomainError::configuration(format!("{}: {}", field, message))
        }
        other => other,
    }
}

impl PipelineConfig {
    /// Reject option combinations the pipeline cannot honour
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.target_chunk_size == 0 || self.max_chunk_size == 0 {
            return Err(DomainError::configuration("chunk sizes must be greater than 0"));
        }

        if self.target_chunk_size > self.max_chunk_size {
            return Err(DomainError::configuration(
                "target_chunk_size must not exceed max_chunk_size",
            ));
        }

        if self.chunk_overlap >= self.target_chunk_size {
            return Err(DomainError::configuration(
                "chunk_overlap must be less than target_chunk_size",
            ));
        }

        if self.min_chunk_size > self.target_chunk_size {
            return Err(DomainError::configuration(
                "min_chunk_size must not exceed target_chunk_size",
            ));
        }

        if !(0.0..=1.0).contains(&self.change_ratio_threshold) {
            return Err(DomainError::configuration(format!(
                "change_ratio_threshold must be within [0, 1], got {}",
                self.change_ratio_threshold
            )));
        }

        validate_concurrency(self.worker_pool_size).map_err(field_error("worker_pool_size"))?;
        if let Some(concurrency) = self.batch_concurrency {
            validate_concurrency(concurrency).map_err(field_error("batch_concurrency"))?;
        }

        validate_unit_size(self.large_document_unit_size)
            .map_err(field_error("large_document_unit_size"))?;

        if self.semantic_lookahead == 0 {
            return Err(DomainError::configuration(
                "semantic_lookahead must be greater than 0",
            ));
        }

        if self.call_timeout_secs == 0 {
            return Err(DomainError::configuration("call_timeout_secs must be greater than 0"));
        }

        self.importance_table()?;
        self.reference_extractor()?;

        Ok(())
    }

    /// Base chunking parameters before adaptive selection
    pub fn chunking_params(&self) -> ChunkingParams {
        let strategy = self
            .strategy
            .forced()
            .unwrap_or(ChunkingStrategy::Semantic);

        ChunkingParams::new(self.target_chunk_size, self.chunk_overlap, strategy)
            .with_max_size(self.max_chunk_size)
            .with_min_chunk_size(self.min_chunk_size)
            .with_lookahead(self.semantic_lookahead)
    }

    pub fn importance_table(&self) -> Result<ImportanceTable, DomainError> {
        ImportanceTable::with_overrides(&self.importance)
    }

    pub fn reference_extractor(&self) -> Result<ReferenceExtractor, DomainError> {
        match &self.see_also_pattern {
            Some(pattern) => ReferenceExtractor::with_see_also_pattern(pattern),
            None => Ok(ReferenceExtractor::default()),
        }
    }

    pub fn effective_batch_concurrency(&self) -> usize {
        self.batch_concurrency.unwrap_or(self.worker_pool_size)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.effective_batch_concurrency(), config.worker_pool_size);
        assert_eq!(config.call_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_chunking_params_follow_config() {
        let config = PipelineConfig {
            target_chunk_size: 800,
            max_chunk_size: 1200,
            chunk_overlap: 100,
            strategy: StrategySelection::Hierarchical,
            ..PipelineConfig::default()
        };

        let params = config.chunking_params();
        assert_eq!(params.target_size, 800);
        assert_eq!(params.max_size, 1200);
        assert_eq!(params.overlap, 100);
        assert_eq!(params.strategy, ChunkingStrategy::Hierarchical);
        assert_eq!(params.lookahead, 10);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let overlap = PipelineConfig {
            chunk_overlap: 1000,
            ..PipelineConfig::default()
        };
        assert!(overlap.validate().is_err());

        let threshold = PipelineConfig {
            change_ratio_threshold: 1.5,
            ..PipelineConfig::default()
        };
        assert!(threshold.validate().is_err());

        let target = PipelineConfig {
            target_chunk_size: 3000,
            ..PipelineConfig::default()
        };
        assert!(target.validate().is_err());

        let weights = PipelineConfig {
            importance: HashMap::from([(BoundaryKind::Heading, 2.0)]),
            ..PipelineConfig::default()
        };
        assert!(weights.validate().is_err());

        let pattern = PipelineConfig {
            see_also_pattern: Some("see (".to_string()),
            ..PipelineConfig::default()
        };
        assert!(pattern.validate().is_err());
    }

    #[test]
    fn test_validate_uses_runtime_limits() {
        let unit = PipelineConfig {
            large_document_unit_size: 50,
            ..PipelineConfig::default()
        };
        let err = unit.validate().unwrap_err();
        assert!(matches!(err, DomainError::Configuration { .. }));
        assert!(err.to_string().contains("large_document_unit_size"));

        let smallest = PipelineConfig {
            large_document_unit_size: 100,
            ..PipelineConfig::default()
        };
        assert!(smallest.validate().is_ok());

        let workers = PipelineConfig {
            worker_pool_size: 0,
            ..PipelineConfig::default()
        };
        assert!(workers.validate().is_err());

        let batch = PipelineConfig {
            batch_concurrency: Some(2048),
            ..PipelineConfig::default()
        };
        let err = batch.validate().unwrap_err();
        assert!(err.to_string().contains("batch_concurrency"));
    }

    #[test]
    fn test_deserialize_partial_config() {
        let config: AppConfig = serde_json::from_str(
            r#"{
                "logging": {"format": "json"},
                "pipeline": {
                    "target_chunk_size": 500,
                    "strategy": "fixed_size",
                    "importance": {"heading": 0.9}
                }
            }"#,
        )
        .unwrap();

        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.pipeline.target_chunk_size, 500);
        assert_eq!(config.pipeline.max_chunk_size, 2000);
        assert_eq!(config.pipeline.strategy, StrategySelection::FixedSize);
        assert_eq!(
            config.pipeline.importance.get(&BoundaryKind::Heading),
            Some(&0.9)
        );
    }
}
