use std::{
    fs,
    io::{stdout, Write},
    path::Path,
};

use abstracta::{
    compiler::CompileOptions,
    executor::RunOptions,
    value::Value,
    Context,
};

/// Expectations written as comments at the top of a script.
#[derive(Debug, Default)]
struct Expectations {
    inputs: Vec<String>,
    output: Vec<String>,
    result: Option<String>,
    error: Option<String>,
}

impl Expectations {
    fn parse(input: &str) -> Self {
        let mut expectations = Expectations::default();
        for line in input.lines().map(str::trim) {
            let Some(comment) = line.strip_prefix("//") else {
                continue;
            };
            let Some((key, value)) = comment.trim().split_once(':') else {
                continue;
            };
            let value = value.trim().to_owned();
            match key {
                "input" => expectations.inputs.push(value),
                "expect" => expectations.output.push(value),
                "result" => expectations.result = Some(value),
                "error" => expectations.error = Some(value),
                _ => (),
            }
        }
        expectations
    }
}

fn run_script(path: &Path, input: &str, optimize: bool) {
    let expectations = Expectations::parse(input);
    let context = Context::with_options(
        CompileOptions {
            optimize,
            ..CompileOptions::default()
        },
        RunOptions {
            inputs: expectations.inputs.clone(),
            ..RunOptions::default()
        },
    );
    let mut output = Vec::new();
    let result = context.eval(input, &mut output);
    let name = path.display();

    match (result, &expectations.error) {
        (Ok(value), None) => {
            if let Some(expected) = &expectations.result {
                assert_eq!(&value.to_string(), expected, "{name} (optimize: {optimize})");
            } else {
                assert_eq!(value, Value::Unit, "{name} (optimize: {optimize})");
            }
        }
        (Err(err), Some(expected)) => {
            let message = err.to_string();
            assert!(
                message.contains(expected.as_str()),
                "{name} (optimize: {optimize}): expected error {expected:?}, found {message:?}"
            );
        }
        (Ok(value), Some(expected)) => {
            panic!("{name} (optimize: {optimize}): expected error {expected:?}, finished with {value}")
        }
        (Err(err), None) => panic!("{name} (optimize: {optimize}): error encountered running: {err}"),
    }
    let output = String::from_utf8(output).expect("output is not utf-8");
    assert_eq!(
        output.lines().collect::<Vec<_>>(),
        expectations.output,
        "{name} (optimize: {optimize})"
    );
}

#[test]
fn test_scripts() {
    const DIR: &str = "./tests/scripts";
    let _ = writeln!(stdout(), "running all test scripts in {:?}", DIR);
    for dir in fs::read_dir(DIR).expect("could not list dir") {
        let path = dir.expect("could not read dir entry").path();
        if path.extension().is_some_and(|ext| ext == "abs") {
            let input = fs::read_to_string(&path).expect("could not read file contents");
            let _ = writeln!(stdout(), "running {:?}", path.file_name().unwrap());
            run_script(&path, &input, true);
            run_script(&path, &input, false);
        } else {
            let _ = writeln!(stdout(), "skipping file {:?}", path);
        }
    }
}
