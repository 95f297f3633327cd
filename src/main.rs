//! acadetl - executa o pipeline de registros acadêmicos uma vez

use acadetl::config::{ETLConfig, ETLConfigBuilder, GradePolicy, LogFormat};
use acadetl::error::ETLError;
use acadetl::extract::CsvExtractor;
use acadetl::load::MemoryStore;
use acadetl::logging::init_tracing;
use acadetl::schema::Catalog;
use acadetl::traits::Store;
use acadetl::types::RunReport;
use acadetl::Pipeline;
use anyhow::Context;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use tracing::{info, warn};

const EXIT_OK: i32 = 0;
const EXIT_VALIDATION: i32 = 1;
const EXIT_LOAD: i32 = 2;
const EXIT_CONFIG: i32 = 3;

#[derive(Parser, Debug)]
#[command(
    name = "acadetl",
    version,
    about = "Carrega CSVs de registros acadêmicos no PostgreSQL",
    long_about = "Lê students, courses, enrollments, grades e attendance de um diretório,\n\
                  valida, deduplica, remove referências órfãs em cascata e substitui\n\
                  o conteúdo das tabelas em uma única transação."
)]
struct Cli {
    /// Arquivo de configuração (TOML, YAML ou JSON)
    #[arg(long, value_name = "FILE", env = "ACADETL_CONFIG")]
    config: Option<PathBuf>,

    /// Diretório com os arquivos <tabela>.csv
    #[arg(long = "data-dir", value_name = "DIR")]
    data_dir: Option<PathBuf>,

    /// URL de conexão; substitui host/porta/nome/usuário/senha
    #[arg(long = "database-url", value_name = "URL")]
    database_url: Option<String>,

    /// Aborta antes da carga se alguma linha órfã for removida
    #[arg(long)]
    strict: bool,

    /// Tratamento de notas fora de [0, 100]
    #[arg(long = "grade-policy", value_enum)]
    grade_policy: Option<GradePolicyArg>,

    /// Executa todos os estágios contra um store em memória
    #[arg(long = "dry-run")]
    dry_run: bool,

    /// Imprime o relatório em JSON no stdout
    #[arg(long)]
    json: bool,

    /// Formato dos logs (emitidos no stderr)
    #[arg(long = "log-format", value_enum)]
    log_format: Option<LogFormatArg>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum GradePolicyArg {
    Clamp,
    Reject,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormatArg {
    Pretty,
    Compact,
    Json,
}

impl From<GradePolicyArg> for GradePolicy {
    fn from(arg: GradePolicyArg) -> Self {
        match arg {
            GradePolicyArg::Clamp => GradePolicy::Clamp,
            GradePolicyArg::Reject => GradePolicy::Reject,
        }
    }
}

impl From<LogFormatArg> for LogFormat {
    fn from(arg: LogFormatArg) -> Self {
        match arg {
            LogFormatArg::Pretty => LogFormat::Pretty,
            LogFormatArg::Compact => LogFormat::Compact,
            LogFormatArg::Json => LogFormat::Json,
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match resolve_config(&cli) {
        Ok(config) => config,
        Err(error) => {
            eprintln!("erro: {error:#}");
            std::process::exit(EXIT_CONFIG);
        }
    };

    if let Err(error) = init_tracing(&config.observability) {
        eprintln!("erro: {error}");
        std::process::exit(EXIT_CONFIG);
    }

    let exit_code = if cli.dry_run {
        info!("Modo de simulação: nada será gravado no banco");
        run(&cli, &config, MemoryStore::new().with_catalog(Catalog::academic())).await
    } else {
        run_against_database(&cli, &config).await
    };

    std::process::exit(exit_code);
}

/// Padrões < arquivo < ambiente < flags
fn resolve_config(cli: &Cli) -> anyhow::Result<ETLConfig> {
    let base = match &cli.config {
        Some(path) => ETLConfig::from_file(path)
            .with_context(|| format!("falha ao ler {}", path.display()))?,
        None => ETLConfig::default(),
    };

    let mut builder = ETLConfigBuilder::from_config(base)
        .with_env()
        .context("variáveis de ambiente inválidas")?;

    if let Some(dir) = &cli.data_dir {
        builder = builder.data_dir(dir.clone());
    }
    if let Some(url) = &cli.database_url {
        builder = builder.database_url(url.clone());
    }
    if cli.strict {
        builder = builder.strict_references(true);
    }
    if let Some(policy) = cli.grade_policy {
        builder = builder.grade_policy(policy.into());
    }
    if let Some(format) = cli.log_format {
        builder = builder.log_format(format.into());
    }

    builder.build().context("configuração inválida")
}

#[cfg(feature = "database")]
async fn run_against_database(cli: &Cli, config: &ETLConfig) -> i32 {
    match acadetl::load::PgStore::connect_lazy(&config.database) {
        Ok(store) => run(cli, config, store).await,
        Err(error) => {
            print_failure(&error, cli.json);
            exit_code(&error)
        }
    }
}

#[cfg(not(feature = "database"))]
async fn run_against_database(_cli: &Cli, _config: &ETLConfig) -> i32 {
    eprintln!("erro: binário compilado sem a feature `database`; use --dry-run");
    EXIT_CONFIG
}

async fn run<S: Store>(cli: &Cli, config: &ETLConfig, store: S) -> i32 {
    let delimiter = match config.source.delimiter_byte() {
        Ok(delimiter) => delimiter,
        Err(error) => {
            print_failure(&error, cli.json);
            return exit_code(&error);
        }
    };
    let extractor = CsvExtractor::new(&config.source.data_dir).with_delimiter(delimiter);

    let pipeline = Pipeline::with_config(config.clone())
        .extract(extractor)
        .store(store)
        .build();

    let outcome = pipeline.execute().await;
    if let Err(error) = pipeline.close().await {
        warn!(error = %error, "Falha ao encerrar a conexão");
    }

    match outcome {
        Ok(report) => {
            print_report(&report, cli.json);
            EXIT_OK
        }
        Err(error) => {
            print_failure(&error, cli.json);
            exit_code(&error)
        }
    }
}

fn exit_code(error: &ETLError) -> i32 {
    match error {
        ETLError::Config(_) => EXIT_CONFIG,
        ETLError::Load(_) => EXIT_LOAD,
        _ => EXIT_VALIDATION,
    }
}

fn print_report(report: &RunReport, json: bool) {
    if json {
        match serde_json::to_string_pretty(report) {
            Ok(body) => println!("{body}"),
            Err(error) => eprintln!("erro: {error}"),
        }
        return;
    }

    println!("==== ETL concluído com sucesso ====");
    println!(
        "{:<12} {:>10} {:>10} {:>10} {:>10} {:>10}",
        "tabela", "extraídas", "ajustadas", "duplicadas", "órfãs", "carregadas"
    );
    for (table, stats) in &report.tables {
        println!(
            "{:<12} {:>10} {:>10} {:>10} {:>10} {:>10}",
            table.as_str(),
            stats.extracted,
            stats.clamped,
            stats.duplicates_removed,
            stats.orphans_removed,
            stats.loaded
        );
    }
    if !report.quality.is_empty() {
        println!("avisos de qualidade: {}", report.quality.total());
    }
    println!(
        "{} linhas carregadas, {} removidas, em {} ms",
        report.rows_loaded(),
        report.rows_removed(),
        report.execution_time_ms
    );
}

fn print_failure(error: &ETLError, json: bool) {
    if json {
        let body = serde_json::json!({
            "success": false,
            "code": error.error_code(),
            "error": error.to_string(),
        });
        println!("{body}");
        return;
    }

    eprintln!("==== ETL falhou ====");
    eprintln!("[{}] {}", error.error_code(), error);
    if error.is_validation_failure() {
        eprintln!("nenhuma alteração foi gravada no banco");
    } else if error.is_load_failure() {
        eprintln!("a transação foi desfeita; o conteúdo anterior foi mantido");
    }
}
