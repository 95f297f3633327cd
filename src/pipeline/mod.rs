use crate::config::{ETLConfig, GradePolicy, ReferentialMode};
use crate::error::{ETLError, LoadError, Result, ValidationError};
use crate::events::LoggingEventEmitter;
use crate::load::{Loader, StepOutcome};
use crate::schema::{Catalog, TableName};
use crate::traits::{EventEmitter, Extractor, Store};
use crate::transform::{self, IntegrityReport, QualityReport};
use crate::types::{Dataset, PipelineEvent, PipelineState, RunReport, TableStats};
use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// Pipeline ETL de registros acadêmicos com suporte a eventos e estado
pub struct Pipeline<E, S> {
    extractor: E,
    store: S,
    catalog: Catalog,
    config: ETLConfig,
    metrics: Arc<Mutex<PipelineMetrics>>,
    state: Arc<Mutex<PipelineState>>,
    event_emitter: Arc<dyn EventEmitter>,
    pipeline_id: String,
}

/// Métricas acumuladas entre execuções
#[derive(Debug, Clone, Default)]
pub struct PipelineMetrics {
    pub executions: Vec<PipelineExecution>,
    pub total_rows_loaded: usize,
    pub total_rows_removed: usize,
    pub total_execution_time_ms: u64,
    pub success_rate: f64,
}

/// Informações de uma execução do pipeline
#[derive(Debug, Clone)]
pub struct PipelineExecution {
    pub timestamp: SystemTime,
    pub succeeded: bool,
    pub error_code: Option<&'static str>,
    pub rows_extracted: usize,
    pub rows_loaded: usize,
    pub execution_time_ms: u64,
}

/// Contagens acumuladas durante uma execução
#[derive(Default)]
struct RunContext {
    tables: BTreeMap<TableName, TableStats>,
    integrity: IntegrityReport,
    quality: QualityReport,
}

impl RunContext {
    fn stats(&mut self, table: TableName) -> &mut TableStats {
        self.tables.entry(table).or_default()
    }
}

impl Pipeline<(), ()> {
    /// Cria um novo builder de pipeline
    pub fn builder() -> PipelineBuilder<(), ()> {
        PipelineBuilder::new()
    }

    /// Cria um builder com configuração personalizada
    pub fn with_config(config: ETLConfig) -> PipelineBuilder<(), ()> {
        PipelineBuilder::with_config(config)
    }
}

impl<E, S> Pipeline<E, S>
where
    E: Extractor,
    S: Store,
{
    /// Retorna o ID do pipeline
    pub fn pipeline_id(&self) -> &str {
        &self.pipeline_id
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Retorna o estado atual do pipeline
    pub fn current_state(&self) -> PipelineState {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Altera o estado do pipeline e emite evento
    async fn set_state(&self, new_state: PipelineState) -> Result<()> {
        let old_state = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::replace(&mut *state, new_state.clone())
        };

        self.event_emitter
            .emit(PipelineEvent::StateChanged {
                pipeline_id: self.pipeline_id.clone(),
                old_state,
                new_state,
                timestamp: SystemTime::now(),
            })
            .await
    }

    async fn table_processed(
        &self,
        table: TableName,
        stage: PipelineState,
        rows_in: usize,
        rows_out: usize,
    ) -> Result<()> {
        self.event_emitter
            .emit(PipelineEvent::TableProcessed {
                pipeline_id: self.pipeline_id.clone(),
                table,
                stage,
                rows_in,
                rows_out,
                timestamp: SystemTime::now(),
            })
            .await
    }

    /// Executa extração, validação, deduplicação, reparo e carga.
    ///
    /// Falhas de fonte ou de validação abortam antes de qualquer escrita.
    /// Uma falha de carga desfaz a transação e retorna `LoadError`.
    pub async fn execute(&self) -> Result<RunReport> {
        let start_time = Instant::now();

        self.event_emitter
            .emit(PipelineEvent::Started {
                pipeline_id: self.pipeline_id.clone(),
                timestamp: SystemTime::now(),
            })
            .await?;

        tracing::info!(
            pipeline_id = %self.pipeline_id,
            source = %self.extractor.describe(),
            "Iniciando execução do pipeline"
        );

        match self.run(start_time).await {
            Ok(report) => {
                self.set_state(PipelineState::Completed).await?;
                self.event_emitter
                    .emit(PipelineEvent::Completed {
                        pipeline_id: self.pipeline_id.clone(),
                        rows_extracted: report.rows_extracted(),
                        rows_loaded: report.rows_loaded(),
                        execution_time_ms: report.execution_time_ms,
                        timestamp: SystemTime::now(),
                    })
                    .await?;
                self.record_execution(Ok(&report), start_time);

                tracing::info!(
                    rows_extracted = report.rows_extracted(),
                    rows_loaded = report.rows_loaded(),
                    rows_removed = report.rows_removed(),
                    execution_time_ms = report.execution_time_ms,
                    "Pipeline executado com sucesso"
                );
                Ok(report)
            }
            Err(e) => {
                self.fail(&e).await;
                self.record_execution(Err(&e), start_time);
                Err(e)
            }
        }
    }

    /// Libera a conexão do store
    pub async fn close(&self) -> Result<()> {
        self.store.close().await
    }

    async fn run(&self, start_time: Instant) -> Result<RunReport> {
        let mut ctx = RunContext::default();

        self.set_state(PipelineState::Extracting).await?;
        let mut dataset = self.extract_all(&mut ctx).await?;

        self.set_state(PipelineState::Validating).await?;
        self.validate_all(&mut dataset, &mut ctx).await?;

        self.set_state(PipelineState::Deduplicating).await?;
        self.deduplicate_all(&mut dataset, &mut ctx).await?;

        self.set_state(PipelineState::Repairing).await?;
        self.repair_references(&mut dataset, &mut ctx).await?;

        self.set_state(PipelineState::Loading).await?;
        let load = Loader::new(self.catalog.clone())
            .load(&self.store, &dataset)
            .await?;

        if !load.success() {
            let error = match load.first_failure() {
                Some(step) => LoadError::TableFailed {
                    table: step.table,
                    reason: match &step.outcome {
                        StepOutcome::Failed(reason) => reason.clone(),
                        _ => String::new(),
                    },
                },
                None => LoadError::Database(
                    load.transaction_error
                        .clone()
                        .unwrap_or_else(|| "transação não confirmada".to_string()),
                ),
            };
            return Err(error.into());
        }

        for &table in self.catalog.load_order() {
            ctx.stats(table).loaded = load.rows_loaded(table) as usize;
        }

        Ok(RunReport {
            pipeline_id: self.pipeline_id.clone(),
            tables: ctx.tables,
            integrity: ctx.integrity,
            quality: ctx.quality,
            load,
            execution_time_ms: start_time.elapsed().as_millis() as u64,
        })
    }

    /// Lê todas as tabelas antes de qualquer transformação
    async fn extract_all(&self, ctx: &mut RunContext) -> Result<Dataset> {
        let mut dataset = Dataset::new();

        for schema in self.catalog.schemas() {
            let table = self.extractor.extract(schema).await?;
            tracing::info!(table = %schema.name, rows = table.len(), "Tabela extraída");
            ctx.stats(schema.name).extracted = table.len();
            dataset.insert(table);
        }

        Ok(dataset)
    }

    async fn validate_all(&self, dataset: &mut Dataset, ctx: &mut RunContext) -> Result<()> {
        let grade_policy: GradePolicy = self.config.validation.grade_policy;

        for schema in self.catalog.schemas() {
            let Some(table) = dataset.get_mut(schema.name) else {
                continue;
            };

            transform::validate_columns(table, schema)?;
            transform::validate_required(table, schema)?;
            transform::coerce_types(table, schema)?;
            let outcome = transform::apply_domain_rules(table, schema, grade_policy)?;

            let rows = table.len();
            let stats = ctx.stats(schema.name);
            stats.validated = rows;
            stats.clamped = outcome.clamped;

            tracing::info!(table = %schema.name, rows = rows, clamped = outcome.clamped, "Tabela validada");
            self.table_processed(schema.name, PipelineState::Validating, rows, rows)
                .await?;
        }

        ctx.quality = transform::audit(dataset);
        Ok(())
    }

    async fn deduplicate_all(&self, dataset: &mut Dataset, ctx: &mut RunContext) -> Result<()> {
        for schema in self.catalog.schemas() {
            let Some(table) = dataset.get_mut(schema.name) else {
                continue;
            };

            let rows_in = table.len();
            let removed = transform::deduplicate(table, &schema.natural_key);
            ctx.stats(schema.name).duplicates_removed = removed;

            if removed > 0 {
                tracing::info!(table = %schema.name, removed = removed, "Duplicatas removidas");
            }
            self.table_processed(schema.name, PipelineState::Deduplicating, rows_in, rows_in - removed)
                .await?;
        }

        Ok(())
    }

    async fn repair_references(&self, dataset: &mut Dataset, ctx: &mut RunContext) -> Result<()> {
        let before = dataset.row_counts();
        let report = transform::repair(dataset, &self.catalog)?;

        for &table in self.catalog.load_order() {
            let removed = report.removed_for(table);
            ctx.stats(table).orphans_removed = removed;
            let rows_in = before.get(&table).copied().unwrap_or(0);
            self.table_processed(table, PipelineState::Repairing, rows_in, rows_in - removed)
                .await?;
        }

        if !report.is_clean() {
            match self.config.validation.referential_mode {
                ReferentialMode::Strict => {
                    return Err(ValidationError::ReferentialIntegrity {
                        removed: report.total_removed(),
                        details: report.summary(),
                    }
                    .into());
                }
                ReferentialMode::Lenient => {
                    tracing::warn!(
                        removed = report.total_removed(),
                        details = %report.summary(),
                        "Referências inválidas removidas; seguindo para a carga"
                    );
                }
            }
        }

        ctx.integrity = report;
        Ok(())
    }

    async fn fail(&self, error: &ETLError) {
        let message = error.to_string();
        tracing::error!(code = error.error_code(), error = %message, "Pipeline falhou");

        if let Err(e) = self.set_state(PipelineState::Failed(message.clone())).await {
            tracing::warn!(error = %e, "Falha ao emitir mudança de estado");
        }
        let event = PipelineEvent::Error {
            pipeline_id: self.pipeline_id.clone(),
            error: message,
            timestamp: SystemTime::now(),
        };
        if let Err(e) = self.event_emitter.emit(event).await {
            tracing::warn!(error = %e, "Falha ao emitir evento de erro");
        }
    }

    /// Obtém métricas do pipeline
    pub async fn get_metrics(&self) -> PipelineMetrics {
        self.metrics.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Reseta métricas do pipeline
    pub async fn reset_metrics(&self) {
        *self.metrics.lock().unwrap_or_else(PoisonError::into_inner) = PipelineMetrics::default();
    }

    /// Registra uma execução nas métricas
    fn record_execution(&self, outcome: std::result::Result<&RunReport, &ETLError>, start_time: Instant) {
        let mut metrics = self.metrics.lock().unwrap_or_else(PoisonError::into_inner);

        let execution = match outcome {
            Ok(report) => {
                metrics.total_rows_loaded += report.rows_loaded();
                metrics.total_rows_removed += report.rows_removed();
                PipelineExecution {
                    timestamp: SystemTime::now(),
                    succeeded: true,
                    error_code: None,
                    rows_extracted: report.rows_extracted(),
                    rows_loaded: report.rows_loaded(),
                    execution_time_ms: report.execution_time_ms,
                }
            }
            Err(error) => PipelineExecution {
                timestamp: SystemTime::now(),
                succeeded: false,
                error_code: Some(error.error_code()),
                rows_extracted: 0,
                rows_loaded: 0,
                execution_time_ms: start_time.elapsed().as_millis() as u64,
            },
        };

        metrics.total_execution_time_ms += execution.execution_time_ms;
        metrics.executions.push(execution);

        let succeeded = metrics.executions.iter().filter(|e| e.succeeded).count();
        metrics.success_rate = succeeded as f64 / metrics.executions.len() as f64;
    }
}

/// Builder para criação de pipelines
pub struct PipelineBuilder<E, S> {
    extractor: E,
    store: S,
    catalog: Option<Catalog>,
    config: ETLConfig,
    event_emitter: Option<Arc<dyn EventEmitter>>,
    _phantom: PhantomData<(E, S)>,
}

impl PipelineBuilder<(), ()> {
    /// Cria um novo builder
    pub fn new() -> Self {
        Self::with_config(ETLConfig::default())
    }

    /// Cria um builder com configuração personalizada
    pub fn with_config(config: ETLConfig) -> Self {
        Self {
            extractor: (),
            store: (),
            catalog: None,
            config,
            event_emitter: None,
            _phantom: PhantomData,
        }
    }
}

impl<E, S> PipelineBuilder<E, S> {
    /// Define o extrator
    pub fn extract<NewE: Extractor>(self, extractor: NewE) -> PipelineBuilder<NewE, S> {
        PipelineBuilder {
            extractor,
            store: self.store,
            catalog: self.catalog,
            config: self.config,
            event_emitter: self.event_emitter,
            _phantom: PhantomData,
        }
    }

    /// Define o destino
    pub fn store<NewS: Store>(self, store: NewS) -> PipelineBuilder<E, NewS> {
        PipelineBuilder {
            extractor: self.extractor,
            store,
            catalog: self.catalog,
            config: self.config,
            event_emitter: self.event_emitter,
            _phantom: PhantomData,
        }
    }

    /// Define o catálogo de tabelas (padrão: o catálogo acadêmico)
    pub fn catalog(mut self, catalog: Catalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Define a configuração
    pub fn config(mut self, config: ETLConfig) -> Self {
        self.config = config;
        self
    }

    /// Define o event emitter
    pub fn event_emitter<EventEmitterType: EventEmitter + 'static>(mut self, emitter: EventEmitterType) -> Self {
        self.event_emitter = Some(Arc::new(emitter));
        self
    }

    /// Aborta a execução quando o reparo referencial remover linhas
    pub fn strict_references(mut self, strict: bool) -> Self {
        self.config.validation.referential_mode = if strict {
            ReferentialMode::Strict
        } else {
            ReferentialMode::Lenient
        };
        self
    }

    /// Define o tratamento de notas fora do intervalo
    pub fn grade_policy(mut self, policy: GradePolicy) -> Self {
        self.config.validation.grade_policy = policy;
        self
    }
}

impl<E, S> PipelineBuilder<E, S>
where
    E: Extractor,
    S: Store,
{
    /// Constrói o pipeline
    pub fn build(self) -> Pipeline<E, S> {
        let started_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();

        Pipeline {
            extractor: self.extractor,
            store: self.store,
            catalog: self.catalog.unwrap_or_default(),
            config: self.config,
            metrics: Arc::new(Mutex::new(PipelineMetrics::default())),
            state: Arc::new(Mutex::new(PipelineState::default())),
            event_emitter: self
                .event_emitter
                .unwrap_or_else(|| Arc::new(LoggingEventEmitter::default())),
            pipeline_id: format!("pipeline-{}-{}", std::process::id(), started_ms),
        }
    }
}

/// Implementação de Default para PipelineBuilder
impl Default for PipelineBuilder<(), ()> {
    fn default() -> Self {
        Self::new()
    }
}
