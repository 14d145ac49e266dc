use stockcast_application::config::{Config, ProviderKind};
use stockcast_application::loader::HistoricalDataLoader;
use stockcast_application::AppError;
use stockcast_domain::repositories::artifacts::{ArtifactReader, ArtifactWriter};
use stockcast_domain::repositories::cache::PriceCache;
use stockcast_domain::repositories::market_data::MarketDataProvider;
use stockcast_infrastructure::artifacts::{FilesystemArtifactReader, FilesystemArtifactWriter};
use stockcast_infrastructure::market_data::{CsvDirectoryProvider, YahooChartProvider, YahooConfig};
use stockcast_infrastructure::persistence::CacheManager;
use std::path::Path;

pub struct EngineDeps {
    pub provider: Box<dyn MarketDataProvider>,
    pub cache: Option<CacheManager>,
    pub artifacts: Box<dyn ArtifactWriter>,
    pub refresh: bool,
}

impl EngineDeps {
    pub fn loader(&self) -> HistoricalDataLoader<'_> {
        let cache = self.cache.as_ref().map(|cache| cache as &dyn PriceCache);
        HistoricalDataLoader::new(self.provider.as_ref(), cache).with_refresh(self.refresh)
    }
}

pub fn build_engine_deps(config: &Config) -> Result<EngineDeps, AppError> {
    Ok(EngineDeps {
        provider: build_provider(config)?,
        cache: open_cache_soft(config),
        artifacts: Box::new(FilesystemArtifactWriter::new()),
        refresh: config.data.refresh,
    })
}

pub fn build_reader() -> Box<dyn ArtifactReader> {
    Box::new(FilesystemArtifactReader::new())
}

fn build_provider(config: &Config) -> Result<Box<dyn MarketDataProvider>, AppError> {
    match config.data.provider {
        ProviderKind::Yahoo => {
            let mut yahoo = YahooConfig {
                timeout_ms: config.data.timeout_ms,
                retries: config.data.retries,
                ..YahooConfig::default()
            };
            if let Some(base_url) = config.data.base_url.as_deref().filter(|u| !u.trim().is_empty()) {
                yahoo.base_url = base_url.to_string();
            }
            Ok(Box::new(YahooChartProvider::new(yahoo)?))
        }
        ProviderKind::Csv => {
            let dir = config
                .data
                .csv_dir
                .as_deref()
                .ok_or_else(|| AppError::config("data.csv_dir is required when data.provider = \"csv\""))?;
            Ok(Box::new(CsvDirectoryProvider::new(dir)))
        }
    }
}

/// Opens the configured cache, erroring when it is disabled or unusable.
pub fn open_cache(config: &Config) -> Result<CacheManager, AppError> {
    if !config.cache.enabled {
        return Err(AppError::config("cache.enabled = false"));
    }
    Ok(CacheManager::open(Path::new(&config.cache.path))?)
}

/// Open failures are logged; the run continues uncached.
fn open_cache_soft(config: &Config) -> Option<CacheManager> {
    if !config.cache.enabled {
        return None;
    }
    match CacheManager::open(Path::new(&config.cache.path)) {
        Ok(cache) => Some(cache),
        Err(err) => {
            tracing::warn!(path = %config.cache.path, error = %err, "cache unavailable; continuing without it");
            None
        }
    }
}
