use acadetl::config::GradePolicy;
use acadetl::prelude::*;
use acadetl::transform::{apply_domain_rules, coerce_types, deduplicate, repair};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::fmt::Write as _;
use std::path::Path;
use tempfile::TempDir;

const STUDENTS: usize = 1000;
const COURSES: usize = 50;

/// Gera CSVs com algumas duplicatas, órfãs e notas fora do intervalo
fn generate_sources(dir: &Path) {
    let mut students = String::from("student_id,student_number,first_name,last_name,date_of_birth,email,status\n");
    for i in 0..STUDENTS {
        // uma a cada cem matrículas se repete
        let number = 200000 + if i % 100 == 99 { i - 1 } else { i };
        writeln!(students, "{},{},Nome{},Sobrenome{},2000-01-01,aluno{}@uni.edu,Active", i, number, i, i, i).unwrap();
    }

    let mut courses = String::from("course_id,course_code,course_name,credits,status\n");
    for i in 0..COURSES {
        writeln!(courses, "{},C{:03},Disciplina {},4,active", i, i, i).unwrap();
    }

    let mut enrollments = String::from("enrollment_id,student_id,course_id,academic_year,term,enrollment_date\n");
    let mut grades = String::from("grades_id,enrollment_id,grade_type,grade_value,grade_date\n");
    let mut attendance = String::from("attendance_id,enrollment_id,attendance_date,status\n");
    for i in 0..STUDENTS * 3 {
        // disciplina inexistente a cada duzentas matrículas
        let course = if i % 200 == 0 { COURSES + 1 } else { i % COURSES };
        writeln!(enrollments, "{},{},{},2024,{},2024-02-01", i, i % STUDENTS, course, 1 + i % 2).unwrap();
        writeln!(grades, "{},{},exam,{},2024-06-01", i, i, (i % 120) as i64 - 5).unwrap();
        writeln!(attendance, "{},{},2024-03-01 08:00:00,present", i, i).unwrap();
    }

    std::fs::write(dir.join("students.csv"), students).unwrap();
    std::fs::write(dir.join("courses.csv"), courses).unwrap();
    std::fs::write(dir.join("enrollments.csv"), enrollments).unwrap();
    std::fs::write(dir.join("grades.csv"), grades).unwrap();
    std::fs::write(dir.join("attendance.csv"), attendance).unwrap();
}

async fn extract_all(extractor: &CsvExtractor, catalog: &Catalog) -> Dataset {
    let mut dataset = Dataset::new();
    for schema in catalog.schemas() {
        dataset.insert(extractor.extract(schema).await.unwrap());
    }
    dataset
}

fn benchmark_csv_extraction(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let dir = TempDir::new().unwrap();
    generate_sources(dir.path());
    let extractor = CsvExtractor::new(dir.path());
    let catalog = Catalog::academic();

    c.bench_function("csv_extract_academic_dataset", |b| {
        b.iter(|| {
            runtime.block_on(async {
                black_box(extract_all(&extractor, &catalog).await);
            });
        })
    });
}

fn benchmark_transform_stages(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let dir = TempDir::new().unwrap();
    generate_sources(dir.path());
    let catalog = Catalog::academic();
    let raw = runtime.block_on(extract_all(&CsvExtractor::new(dir.path()), &catalog));

    c.bench_function("validate_dedup_repair", |b| {
        b.iter(|| {
            let mut dataset = raw.clone();
            for schema in catalog.schemas() {
                if let Some(table) = dataset.get_mut(schema.name) {
                    coerce_types(table, schema).unwrap();
                    apply_domain_rules(table, schema, GradePolicy::Clamp).unwrap();
                    deduplicate(table, &schema.natural_key);
                }
            }
            black_box(repair(&mut dataset, &catalog).unwrap());
        })
    });
}

fn benchmark_pipeline_end_to_end(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let dir = TempDir::new().unwrap();
    generate_sources(dir.path());

    c.bench_function("pipeline_memory_store", |b| {
        b.iter(|| {
            runtime.block_on(async {
                let pipeline = Pipeline::builder()
                    .extract(CsvExtractor::new(dir.path()))
                    .store(MemoryStore::new())
                    .event_emitter(InMemoryEventEmitter::new())
                    .build();

                black_box(pipeline.execute().await.unwrap());
            });
        })
    });
}

criterion_group!(
    benches,
    benchmark_csv_extraction,
    benchmark_transform_stages,
    benchmark_pipeline_end_to_end
);
criterion_main!(benches);
