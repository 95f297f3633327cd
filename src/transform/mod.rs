//! Estágios de transformação: colunas, domínio, deduplicação, integridade e auditoria

pub mod columns;
pub mod dedup;
pub mod domain;
pub mod integrity;
pub mod quality;

pub use columns::{coerce_types, validate_columns, validate_required};
pub use dedup::deduplicate;
pub use domain::{apply_domain_rules, normalize_academic_year, DomainOutcome};
pub use integrity::{repair, IntegrityReport, OrphanRemoval};
pub use quality::{audit, QualityFinding, QualityReport};
