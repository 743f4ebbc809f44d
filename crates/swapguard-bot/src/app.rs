//! Application wiring.

use crate::config::AppConfig;
use crate::error::AppResult;
use std::sync::Arc;
use swapguard_core::{DynEventSink, DynOrderPlacer, PipelineResult};
use swapguard_executor::{
    DynRequestSigner, EntryDecision, OrderSubmissionPipeline, PaperOrderPlacer, RestOrderPlacer,
};
use swapguard_registry::{
    DynInstrumentSource, InstrumentCache, MetaClient, StaticInstrumentTable,
};
use swapguard_telemetry::TracingEventSink;
use swapguard_transport::ConnectivityManager;
use tracing::info;

/// Main application state.
pub struct Application {
    config: AppConfig,
    cache: Arc<InstrumentCache>,
    pipeline: OrderSubmissionPipeline,
}

impl Application {
    /// Paper-trading application: orders are accepted locally, instrument
    /// metadata still comes from the configured source.
    pub fn new(config: AppConfig) -> AppResult<Self> {
        info!("Order placement: paper");
        let source = Self::instrument_source(&config)?;
        Self::with_components(
            config,
            source,
            Arc::new(PaperOrderPlacer::new()),
            Arc::new(TracingEventSink::new()),
        )
    }

    /// Live application placing orders on `exchange.rest_url`, authenticated
    /// by `signer`.
    ///
    /// With `pipeline.detect_position_mode` set, the account's position mode
    /// replaces the configured one before any order is sent.
    pub async fn live(config: AppConfig, signer: DynRequestSigner) -> AppResult<Self> {
        info!(rest_url = %config.exchange.rest_url, "Order placement: live");
        let source = Self::instrument_source(&config)?;
        let mut placer = RestOrderPlacer::new(config.exchange.rest_url.clone(), &config.transport)?
            .with_trade_mode(config.pipeline.trade_mode)
            .with_position_mode(config.pipeline.position_mode)
            .with_signer(signer);
        if config.pipeline.detect_position_mode {
            placer = placer.with_detected_position_mode().await;
        }
        Self::with_components(
            config,
            source,
            Arc::new(placer),
            Arc::new(TracingEventSink::new()),
        )
    }

    /// Assemble from explicit collaborators.
    pub fn with_components(
        config: AppConfig,
        source: DynInstrumentSource,
        placer: DynOrderPlacer,
        events: DynEventSink,
    ) -> AppResult<Self> {
        config.validate()?;

        let cache = Arc::new(InstrumentCache::new(
            source,
            config.cache_config()?,
            events.clone(),
        ));
        let connectivity = Arc::new(ConnectivityManager::new(
            placer,
            &config.transport,
            events.clone(),
        )?);
        let pipeline = OrderSubmissionPipeline::new(
            cache.clone(),
            connectivity,
            events,
            config.pipeline_config(),
        );

        info!(
            proxy = config.transport.proxy().unwrap_or("direct"),
            timeout_secs = config.transport.timeout_secs,
            max_attempts = config.transport.max_attempts,
            "Application initialized"
        );

        Ok(Self {
            config,
            cache,
            pipeline,
        })
    }

    /// Instrument source selected by configuration: REST when
    /// `registry.rest_url` is set, the static table otherwise.
    pub fn instrument_source(config: &AppConfig) -> AppResult<DynInstrumentSource> {
        match config.registry.rest_url.as_deref() {
            Some(rest_url) => {
                info!(%rest_url, "Instrument metadata: REST");
                Ok(Arc::new(MetaClient::new(rest_url, &config.transport)?))
            }
            None => {
                info!(
                    instruments = config.registry.instruments.len(),
                    "Instrument metadata: static table"
                );
                Ok(Arc::new(StaticInstrumentTable::from_definitions(
                    &config.registry.instruments,
                )?))
            }
        }
    }

    /// Run one trading decision to completion.
    pub async fn run_decision(&self, decision: &EntryDecision) -> PipelineResult {
        self.pipeline.enter_position(decision).await
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<InstrumentCache> {
        &self.cache
    }

    pub fn pipeline(&self) -> &OrderSubmissionPipeline {
        &self.pipeline
    }
}
