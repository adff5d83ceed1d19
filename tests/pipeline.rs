use std::fs;

use abstracta::{
    compiler::{
        self,
        code::AbstractedProgram,
        diagnostic::Stage,
        optimizer::{self, Pass},
        CompileOptions,
    },
    errors::{Error, RuntimeErrorKind},
    executor::{Interpreter, RunOptions, Step},
    value::Value,
    Context,
};

const PROGRAMS: &[&str] = &[
    "1 + 2 * 3",
    "let y = 1; y = 2; return y;",
    "let a = 2; let b = a * 3 + a * 3; b - 1",
    "fn fact(n: int) -> int { if n <= 1 { return 1; } return n * fact(n - 1); } fact(10)",
    "let xs = [1, 2, 3]; xs[0] = xs[1] + xs[2]; xs",
    "let s = \"ab\"; let t = s + s; if len(t) == 4 && t[3] == \"b\" { print(t); } t",
    "let i = 0; let n = 0; while i < 100 { i = i + 1; if i % 3 == 0 { continue; } n = n + i; } n",
    "let k = 3; let f = fn(x: int) -> int { x * k }; f(f(2))",
    "fn pick(b: bool) -> float { if b { return 1.5; } else { return 2 as float; } } pick(false) + pick(true)",
];

fn eval(input: &str, optimize: bool) -> (Result<Value, Error>, String) {
    let context = Context::with_options(
        CompileOptions {
            optimize,
            ..CompileOptions::default()
        },
        RunOptions::default(),
    );
    let mut output = Vec::new();
    let result = context.eval(input, &mut output);
    (result, String::from_utf8(output).unwrap())
}

fn scripts() -> Vec<String> {
    fs::read_dir("./tests/scripts")
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "abs"))
        .map(|path| fs::read_to_string(path).unwrap())
        .collect()
}

#[test]
fn precedence_and_folding() {
    assert_eq!(eval("1 + 2 * 3", true).0.unwrap(), Value::Int(7));
    let program = compiler::compile("1 + 2 * 3", &CompileOptions::default())
        .unwrap()
        .program;
    assert_eq!(program.consts.len(), 1);
    assert_eq!(
        compiler::emit("1 + 2 * 3", compiler::EmitStage::Optimizer, &CompileOptions::default()).unwrap(),
        "7\n"
    );
}

#[test]
fn multi_char_operators_with_default_options() {
    for (input, expected) in [
        ("1 <= 2", Value::Bool(true)),
        ("3 >= 4", Value::Bool(false)),
        ("2 ** 3", Value::Int(8)),
        ("2 ** 3 ** 2 <= 512", Value::Bool(true)),
    ] {
        let program = compiler::compile(input, &CompileOptions::default())
            .unwrap()
            .program;
        assert_eq!(
            Context::new().execute(&program, &mut Vec::new()).unwrap(),
            expected,
            "{input}"
        );
        assert_eq!(eval(input, false).0.unwrap(), expected, "{input}");
    }
}

#[test]
fn undefined_reference_halts_before_codegen() {
    let diagnostics = compiler::compile("x + 1", &CompileOptions::default()).unwrap_err();
    let diagnostic = diagnostics.iter().next().unwrap();
    assert_eq!(diagnostic.stage, Stage::Semantic);
    assert!(diagnostic.message.contains("undefined reference to `x`"));
    let span = diagnostic.span.unwrap();
    assert_eq!((span.start.lineno, span.start.column), (1, 1));
}

#[test]
fn division_by_zero_is_a_runtime_fault() {
    let program = compiler::compile("1 / 0", &CompileOptions::default())
        .unwrap()
        .program;
    let mut interpreter = Interpreter::new(&program, RunOptions::default(), Vec::new()).unwrap();
    let error = interpreter.run().unwrap_err();
    assert_eq!(error.kind, RuntimeErrorKind::DivisionByZero);
    assert_eq!(error.function, 0);
    assert_eq!(program.functions[0].code[error.pc].to_string(), "Div");
}

#[test]
fn dead_store_is_removed() {
    assert_eq!(
        compiler::emit(
            "let y = 1; y = 2; return y;",
            compiler::EmitStage::Optimizer,
            &CompileOptions::default()
        )
        .unwrap(),
        "let y = 2;\nreturn y;\n"
    );
    assert_eq!(eval("let y = 1; y = 2; return y;", true).0.unwrap(), Value::Int(2));
}

#[test]
fn parsed_nodes_match_arity() {
    for input in PROGRAMS.iter().copied().map(str::to_owned).chain(scripts()) {
        let Ok(ast) = compiler::parse_source(&input, &CompileOptions::default()) else {
            continue;
        };
        for id in ast.reachable() {
            let kind = ast.kind(id);
            assert!(kind.arity().accepts(kind.children().len()), "{kind:?} in {input}");
        }
    }
}

#[test]
fn optimizer_reaches_a_fixed_point() {
    for input in PROGRAMS.iter().copied().map(str::to_owned).chain(scripts()) {
        let Ok((mut ast, mut semantic)) = compiler::optimize_source(&input, &CompileOptions::default()) else {
            continue;
        };
        let optimized = ast.to_string();
        for pass in Pass::ALL {
            assert!(
                !optimizer::run_pass(pass, &mut ast, &mut semantic).unwrap(),
                "{pass} changed {input}"
            );
        }
        assert_eq!(optimizer::optimize(&mut ast, &mut semantic).unwrap(), 1);
        assert_eq!(ast.to_string(), optimized);
        for id in ast.reachable() {
            let kind = ast.kind(id);
            assert!(kind.arity().accepts(kind.children().len()), "{kind:?} in {input}");
        }
    }
}

#[test]
fn optimization_preserves_results() {
    for input in PROGRAMS {
        let (optimized, optimized_output) = eval(input, true);
        let (plain, plain_output) = eval(input, false);
        assert_eq!(optimized.unwrap(), plain.unwrap(), "{input}");
        assert_eq!(optimized_output, plain_output, "{input}");
    }
    assert_eq!(eval(PROGRAMS[3], true).0.unwrap(), Value::Int(3_628_800));
    assert_eq!(eval(PROGRAMS[6], true).0.unwrap(), Value::Int(3367));
    assert_eq!(eval(PROGRAMS[7], true).0.unwrap(), Value::Int(18));
    assert_eq!(eval(PROGRAMS[8], true).0.unwrap(), Value::Float(3.5));
}

#[test]
fn programs_round_trip_through_json() {
    for input in PROGRAMS {
        for optimize in [true, false] {
            let options = CompileOptions {
                optimize,
                ..CompileOptions::default()
            };
            let program = compiler::compile(input, &options).unwrap().program;
            let json = program.to_json().unwrap();
            let loaded = AbstractedProgram::from_json(&json).unwrap();
            assert_eq!(loaded, program, "{input}");
            assert_eq!(loaded.to_json().unwrap(), json, "{input}");

            let context = Context::new();
            let mut first = Vec::new();
            let mut second = Vec::new();
            assert_eq!(
                context.execute(&program, &mut first).unwrap(),
                context.execute(&loaded, &mut second).unwrap()
            );
            assert_eq!(first, second);
        }
    }
}

#[test]
fn float_constants_round_trip_exactly() {
    let input = "0.1 + 0.2";
    let options = CompileOptions {
        optimize: false,
        ..CompileOptions::default()
    };
    let program = compiler::compile(input, &options).unwrap().program;
    let loaded = AbstractedProgram::from_json(&program.to_json().unwrap()).unwrap();
    assert_eq!(
        Context::new().execute(&loaded, &mut Vec::new()).unwrap(),
        Value::Float(0.1 + 0.2)
    );
}

#[test]
fn stepping_matches_running() {
    let program = compiler::compile(PROGRAMS[3], &CompileOptions::default())
        .unwrap()
        .program;
    let mut interpreter = Interpreter::new(&program, RunOptions::default(), Vec::new()).unwrap();
    let mut steps = 0;
    let value = loop {
        steps += 1;
        if let Step::Finished(value) = interpreter.step().unwrap() {
            break value;
        }
    };
    assert_eq!(value, Value::Int(3_628_800));
    assert_eq!(interpreter.steps(), steps);

    let mut again = Interpreter::new(&program, RunOptions::default(), Vec::new()).unwrap();
    assert_eq!(again.run().unwrap(), value);
    assert_eq!(again.steps(), steps);
}

#[test]
fn budget_stops_infinite_loops() {
    let program = compiler::compile("let i = 0; while true { i = i + 1; }", &CompileOptions::default())
        .unwrap()
        .program;
    let options = RunOptions {
        max_steps: Some(1000),
        ..RunOptions::default()
    };
    let mut interpreter = Interpreter::new(&program, options, Vec::new()).unwrap();
    assert_eq!(
        interpreter.run().unwrap_err().kind,
        RuntimeErrorKind::BudgetExceeded
    );
}

#[test]
fn effects_before_a_fault_are_kept() {
    let (result, output) = eval("print(1); print(2); let z = 0; print(3 / z);", true);
    assert!(matches!(result, Err(Error::Runtime(error)) if error.kind == RuntimeErrorKind::DivisionByZero));
    assert_eq!(output, "1\n2\n");
}
