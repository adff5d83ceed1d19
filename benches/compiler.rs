use criterion::{criterion_group, criterion_main, Criterion};

use std::fs;

use abstracta::compiler::{compile, CompileOptions};

pub fn benchmark_compiler(c: &mut Criterion) {
    const DIR: &str = "./benches/scripts";
    for dir in fs::read_dir(DIR).expect("could not list dir") {
        let path = dir.expect("could not read dir entry").path();
        if path.extension().is_some_and(|ext| ext == "abs") {
            let input = &fs::read_to_string(&path).expect("could not read file contents");
            let options = CompileOptions::default();
            c.bench_function(
                &format!("compile {}", path.file_name().unwrap().to_str().unwrap()),
                |b| b.iter(|| compile(input, &options).unwrap()),
            );
        }
    }
}

criterion_group!(compiler, benchmark_compiler);
criterion_main!(compiler);
