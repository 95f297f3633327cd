//! # acadetl - Pipeline ETL de registros acadêmicos
//!
//! Lê cinco arquivos CSV (alunos, disciplinas, matrículas, notas e frequência),
//! valida colunas, nulos e domínios, remove duplicatas, repara a integridade
//! referencial em cascata e substitui o conteúdo do banco em uma única transação.
//!
//! ## Exemplo Rápido
//!
//! ```rust,no_run
//! use acadetl::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let pipeline = Pipeline::builder()
//!         .extract(CsvExtractor::new("data"))
//!         .store(MemoryStore::new())
//!         .build();
//!
//!     let report = pipeline.execute().await?;
//!     println!("{} linhas carregadas", report.rows_loaded());
//!     Ok(())
//! }
//! ```
//!
//! ## Arquitetura
//!
//! ### Catálogo
//! As tabelas, suas colunas, chaves naturais, chaves estrangeiras e regras de
//! domínio ficam em [`schema::Catalog`]. A ordem de carga é derivada do grafo
//! de dependências.
//!
//! ### Extractors
//! Leem cada tabela como texto bruto: [`extract::CsvExtractor`] lê um diretório
//! de CSVs e [`extract::MemoryExtractor`] serve tabelas montadas em memória.
//!
//! ### Transformações
//! Funções puras sobre [`types::Table`]: validação de colunas, tipagem, regras de
//! domínio, deduplicação, reparo referencial e auditoria de qualidade.
//!
//! ### Stores
//! Destinos transacionais: [`load::PgStore`] (PostgreSQL, feature `database`)
//! e [`load::MemoryStore`].

pub mod config;
pub mod error;
pub mod events;
pub mod extract;
pub mod load;
pub mod logging;
pub mod pipeline;
pub mod schema;
pub mod traits;
pub mod transform;
pub mod types;

// Re-exports para facilitar o uso
pub use config::ETLConfig;
pub use error::{ETLError, Result};
pub use events::{InMemoryEventEmitter, LoggingEventEmitter};
pub use pipeline::Pipeline;
pub use schema::{Catalog, TableName};
pub use traits::*;
pub use types::{DataRow, DataValue, PipelineEvent, PipelineState, RunReport};

/// Prelude com imports mais comuns
pub mod prelude {
    pub use crate::config::{ETLConfig, ETLConfigBuilder, GradePolicy, LogFormat, ReferentialMode};
    pub use crate::error::{ETLError, Result};
    pub use crate::events::{InMemoryEventEmitter, LoggingEventEmitter};
    pub use crate::pipeline::{Pipeline, PipelineBuilder, PipelineMetrics};
    pub use crate::schema::{Catalog, TableName, TableSchema};
    pub use crate::traits::{EventEmitter, Extractor, Store, StoreTransaction};
    pub use crate::types::{DataRow, DataValue, Dataset, PipelineEvent, PipelineState, RunReport, Table};

    // Extractors
    pub use crate::extract::{CsvExtractor, MemoryExtractor};

    // Stores
    pub use crate::load::{LoadReport, Loader, MemoryStore};

    #[cfg(feature = "database")]
    pub use crate::load::PgStore;
}

/// Informações sobre a versão da biblioteca
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Informações sobre a biblioteca
pub fn about() -> &'static str {
    env!("CARGO_PKG_DESCRIPTION")
}
