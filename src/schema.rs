//! Catálogo de tabelas acadêmicas
//!
//! Cada tabela declara suas colunas, colunas obrigatórias, chave natural,
//! chaves estrangeiras e regras de domínio. A ordem de carga é derivada de um
//! grafo de dependências, não de uma lista fixa.

use petgraph::algo::{tarjan_scc, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Dfs;
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use crate::error::SchemaError;

/// Tabelas conhecidas pelo pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableName {
    Students,
    Courses,
    Enrollments,
    Grades,
    Attendance,
}

impl TableName {
    pub const ALL: [TableName; 5] = [
        TableName::Students,
        TableName::Courses,
        TableName::Enrollments,
        TableName::Grades,
        TableName::Attendance,
    ];

    /// Nome da tabela no banco e do arquivo de origem
    pub fn as_str(&self) -> &'static str {
        match self {
            TableName::Students => "students",
            TableName::Courses => "courses",
            TableName::Enrollments => "enrollments",
            TableName::Grades => "grades",
            TableName::Attendance => "attendance",
        }
    }
}

impl std::fmt::Display for TableName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tipo lógico de uma coluna
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Integer,
    Text,
    Date,
    Timestamp,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDef {
    pub name: &'static str,
    pub column_type: ColumnType,
    pub required: bool,
}

impl ColumnDef {
    pub fn required(name: &'static str, column_type: ColumnType) -> Self {
        Self { name, column_type, required: true }
    }

    pub fn optional(name: &'static str, column_type: ColumnType) -> Self {
        Self { name, column_type, required: false }
    }
}

/// Coluna que referencia o identificador de outra tabela
#[derive(Debug, Clone, PartialEq)]
pub struct ForeignKey {
    pub column: &'static str,
    pub parent: TableName,
}

/// Restrições de domínio aplicadas após a tipagem
#[derive(Debug, Clone, PartialEq)]
pub enum DomainRule {
    /// Valor deve pertencer a um conjunto fechado, opcionalmente após minúsculas
    Categorical {
        column: &'static str,
        allowed: &'static [&'static str],
        lowercase: bool,
    },
    /// Ano letivo normalizado para "AAAA-AAAA"
    AcademicYear { column: &'static str },
    /// Intervalo inteiro fechado; tratamento conforme a política de notas
    Range {
        column: &'static str,
        min: i64,
        max: i64,
    },
}

impl DomainRule {
    pub fn column(&self) -> &'static str {
        match self {
            DomainRule::Categorical { column, .. }
            | DomainRule::AcademicYear { column }
            | DomainRule::Range { column, .. } => *column,
        }
    }
}

/// Definição completa de uma tabela
#[derive(Debug, Clone, PartialEq)]
pub struct TableSchema {
    pub name: TableName,
    pub columns: Vec<ColumnDef>,
    pub id_column: &'static str,
    pub natural_key: Vec<&'static str>,
    pub foreign_keys: Vec<ForeignKey>,
    pub rules: Vec<DomainRule>,
}

impl TableSchema {
    pub fn new(name: TableName, id_column: &'static str, columns: Vec<ColumnDef>) -> Self {
        Self {
            name,
            columns,
            id_column,
            natural_key: Vec::new(),
            foreign_keys: Vec::new(),
            rules: Vec::new(),
        }
    }

    pub fn natural_key(mut self, columns: &[&'static str]) -> Self {
        self.natural_key = columns.to_vec();
        self
    }

    pub fn references(mut self, column: &'static str, parent: TableName) -> Self {
        self.foreign_keys.push(ForeignKey { column, parent });
        self
    }

    pub fn rule(mut self, rule: DomainRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn column_names(&self) -> Vec<&'static str> {
        self.columns.iter().map(|c| c.name).collect()
    }

    pub fn required_columns(&self) -> Vec<&'static str> {
        self.columns.iter().filter(|c| c.required).map(|c| c.name).collect()
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }
}

pub const STUDENT_STATUS: &[&str] = &["active", "inactive", "graduated"];
pub const COURSE_STATUS: &[&str] = &["active", "inactive"];
pub const ENROLLMENT_TERMS: &[&str] = &["1", "2"];
pub const GRADE_TYPES: &[&str] = &["test", "assignment", "exam"];
pub const ATTENDANCE_STATUS: &[&str] = &["present", "absent", "late"];
pub const GRADE_MIN: i64 = 0;
pub const GRADE_MAX: i64 = 100;

/// Catálogo de tabelas com ordem topológica pré-calculada
#[derive(Debug, Clone)]
pub struct Catalog {
    schemas: HashMap<TableName, TableSchema>,
    graph: DiGraph<TableName, &'static str>,
    order: Vec<TableName>,
}

impl Catalog {
    /// Constrói o catálogo e valida o grafo de dependências
    pub fn new(schemas: Vec<TableSchema>) -> Result<Self, SchemaError> {
        let mut graph = DiGraph::new();
        let mut nodes: HashMap<TableName, NodeIndex> = HashMap::new();

        for schema in &schemas {
            if nodes.contains_key(&schema.name) {
                return Err(SchemaError::Duplicate(schema.name));
            }
            nodes.insert(schema.name, graph.add_node(schema.name));
        }

        // Aresta vai do pai para o filho: a ordem topológica carrega pais primeiro
        for schema in &schemas {
            for fk in &schema.foreign_keys {
                let parent = *nodes.get(&fk.parent).ok_or(SchemaError::UnknownParent {
                    table: schema.name,
                    parent: fk.parent,
                })?;
                graph.add_edge(parent, nodes[&schema.name], fk.column);
            }
        }

        if let Err(cycle) = toposort(&graph, None) {
            return Err(SchemaError::Cycle(cycle_members(&graph, cycle.node_id())));
        }

        let order = stable_topological_order(&graph);
        let schemas = schemas.into_iter().map(|s| (s.name, s)).collect();

        Ok(Self { schemas, graph, order })
    }

    /// As cinco tabelas do sistema de registros acadêmicos
    pub fn academic() -> Self {
        use ColumnType::*;

        let students = TableSchema::new(TableName::Students, "student_id", vec![
            ColumnDef::required("student_id", Integer),
            ColumnDef::required("student_number", Integer),
            ColumnDef::required("first_name", Text),
            ColumnDef::required("last_name", Text),
            ColumnDef::optional("date_of_birth", Date),
            ColumnDef::optional("email", Text),
            ColumnDef::required("status", Text),
        ])
        .natural_key(&["student_number"])
        .rule(DomainRule::Categorical { column: "status", allowed: STUDENT_STATUS, lowercase: true });

        let courses = TableSchema::new(TableName::Courses, "course_id", vec![
            ColumnDef::required("course_id", Integer),
            ColumnDef::required("course_code", Text),
            ColumnDef::required("course_name", Text),
            ColumnDef::optional("credits", Integer),
            ColumnDef::required("status", Text),
        ])
        .natural_key(&["course_code"])
        .rule(DomainRule::Categorical { column: "status", allowed: COURSE_STATUS, lowercase: true });

        let enrollments = TableSchema::new(TableName::Enrollments, "enrollment_id", vec![
            ColumnDef::required("enrollment_id", Integer),
            ColumnDef::required("student_id", Integer),
            ColumnDef::required("course_id", Integer),
            ColumnDef::optional("academic_year", Text),
            ColumnDef::required("term", Text),
            ColumnDef::optional("enrollment_date", Date),
        ])
        .natural_key(&["student_id", "course_id", "academic_year", "term"])
        .references("student_id", TableName::Students)
        .references("course_id", TableName::Courses)
        .rule(DomainRule::Categorical { column: "term", allowed: ENROLLMENT_TERMS, lowercase: false })
        .rule(DomainRule::AcademicYear { column: "academic_year" });

        let grades = TableSchema::new(TableName::Grades, "grades_id", vec![
            ColumnDef::required("grades_id", Integer),
            ColumnDef::required("enrollment_id", Integer),
            ColumnDef::required("grade_type", Text),
            ColumnDef::required("grade_value", Integer),
            ColumnDef::optional("grade_date", Date),
        ])
        .references("enrollment_id", TableName::Enrollments)
        .rule(DomainRule::Categorical { column: "grade_type", allowed: GRADE_TYPES, lowercase: true })
        .rule(DomainRule::Range { column: "grade_value", min: GRADE_MIN, max: GRADE_MAX });

        let attendance = TableSchema::new(TableName::Attendance, "attendance_id", vec![
            ColumnDef::required("attendance_id", Integer),
            ColumnDef::required("enrollment_id", Integer),
            ColumnDef::optional("attendance_date", Timestamp),
            ColumnDef::required("status", Text),
        ])
        .references("enrollment_id", TableName::Enrollments)
        .rule(DomainRule::Categorical { column: "status", allowed: ATTENDANCE_STATUS, lowercase: true });

        // As definições acima são estáticas e acíclicas
        match Catalog::new(vec![students, courses, enrollments, grades, attendance]) {
            Ok(catalog) => catalog,
            Err(e) => unreachable!("catálogo acadêmico inválido: {}", e),
        }
    }

    pub fn schema(&self, name: TableName) -> Result<&TableSchema, SchemaError> {
        self.schemas.get(&name).ok_or(SchemaError::UnknownTable(name))
    }

    /// Pais antes de filhos; empates seguem a ordem de declaração
    pub fn load_order(&self) -> &[TableName] {
        &self.order
    }

    /// Filhos antes de pais
    pub fn drop_order(&self) -> Vec<TableName> {
        self.order.iter().rev().copied().collect()
    }

    /// Esquemas na ordem de carga
    pub fn schemas(&self) -> impl Iterator<Item = &TableSchema> {
        self.order.iter().filter_map(|name| self.schemas.get(name))
    }

    /// Todas as tabelas que dependem, direta ou indiretamente, de `name`
    pub fn descendants(&self, name: TableName) -> Vec<TableName> {
        let Some(start) = self.graph.node_indices().find(|&idx| self.graph[idx] == name) else {
            return Vec::new();
        };

        let mut found = BTreeSet::new();
        let mut dfs = Dfs::new(&self.graph, start);
        while let Some(idx) = dfs.next(&self.graph) {
            if idx != start {
                found.insert(self.graph[idx]);
            }
        }
        found.into_iter().collect()
    }

    /// Tabelas que referenciam diretamente `name`
    pub fn children(&self, name: TableName) -> Vec<TableName> {
        self.graph
            .node_indices()
            .find(|&idx| self.graph[idx] == name)
            .map(|idx| {
                self.graph
                    .neighbors_directed(idx, Direction::Outgoing)
                    .map(|child| self.graph[child])
                    .collect::<BTreeSet<_>>()
                    .into_iter()
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::academic()
    }
}

/// Algoritmo de Kahn sobre um grafo acíclico, escolhendo sempre o menor índice pronto.
///
/// `toposort` do petgraph não preserva a ordem de declaração nos empates.
fn stable_topological_order(graph: &DiGraph<TableName, &'static str>) -> Vec<TableName> {
    let mut in_degree: HashMap<NodeIndex, usize> = graph
        .node_indices()
        .map(|idx| (idx, graph.neighbors_directed(idx, Direction::Incoming).count()))
        .collect();

    let mut ready: BTreeSet<NodeIndex> = in_degree
        .iter()
        .filter(|(_, degree)| **degree == 0)
        .map(|(idx, _)| *idx)
        .collect();

    let mut order = Vec::with_capacity(graph.node_count());
    while let Some(idx) = ready.pop_first() {
        order.push(graph[idx]);
        for child in graph.neighbors_directed(idx, Direction::Outgoing) {
            if let Some(degree) = in_degree.get_mut(&child) {
                *degree -= 1;
                if *degree == 0 {
                    ready.insert(child);
                }
            }
        }
    }

    order
}

/// Tabelas do componente fortemente conexo que contém `node`
fn cycle_members(graph: &DiGraph<TableName, &'static str>, node: NodeIndex) -> String {
    let members: BTreeSet<String> = tarjan_scc(graph)
        .into_iter()
        .find(|component| component.contains(&node))
        .unwrap_or_else(|| vec![node])
        .into_iter()
        .map(|idx| graph[idx].to_string())
        .collect();

    members.into_iter().collect::<Vec<_>>().join(" -> ")
}
