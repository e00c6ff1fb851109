//! Lowering Integration Tests
//!
//! Drives the public API end to end: programs arrive as JSON the way an
//! external parser would hand them over, are compiled through a
//! `SourceUnit`, and the resulting stream is checked with the verifier and
//! the disassembler.

use spacey_compiler::ast::build::*;
use spacey_compiler::ast::{Expression, Program, Statement};
use spacey_compiler::compiler::verify::analyze;
use spacey_compiler::{CompileError, CompilerConfig, Disassembler, OpCode, SourceUnit};

/// `x = 1; while (x) { x = 0; }`
const WHILE_PROGRAM: &str = r#"{
  "body": [
    {"Expression": {"expression": {"Assignment": {
      "operator": "Assign",
      "left": {"Identifier": {"name": "x"}},
      "right": {"Literal": {"Integer": 1}}
    }}}},
    {"While": {
      "test": {"Identifier": {"name": "x"}},
      "body": {"Block": {"body": [
        {"Expression": {"expression": {"Assignment": {
          "operator": "Assign",
          "left": {"Identifier": {"name": "x"}},
          "right": {"Literal": {"Integer": 0}}
        }}}}
      ]}}
    }}
  ]
}"#;

fn parse(json: &str) -> Program {
    serde_json::from_str(json).expect("Program JSON should deserialize")
}

fn chunk_opcodes(unit: &SourceUnit, start: u32) -> Vec<OpCode> {
    Disassembler::chunk(unit.bytecode().unwrap(), start)
        .lines()
        .map(|line| {
            *OpCode::ALL
                .iter()
                .find(|op| op.mnemonic() == line.mnemonic)
                .unwrap()
        })
        .collect()
}

#[test]
fn test_compile_program_from_json() {
    let mut unit = SourceUnit::new(parse(WHILE_PROGRAM));
    let start = unit.compile_script().unwrap();

    assert_eq!(
        chunk_opcodes(&unit, start),
        vec![
            OpCode::IdentRef,
            OpCode::Int,
            OpCode::Assign,
            OpCode::Pop,
            OpCode::Undefined,
            OpCode::Ident,
            OpCode::JmpZ,
            OpCode::Pop,
            OpCode::IdentRef,
            OpCode::Int,
            OpCode::Assign,
            OpCode::Jmp,
            OpCode::Ret,
        ]
    );

    let report = analyze(unit.bytecode().unwrap(), start).unwrap();
    assert_eq!(report.return_depth, Some(1));
}

#[test]
fn test_listing_shows_resolved_targets() {
    let mut unit = SourceUnit::new(parse(WHILE_PROGRAM));
    let start = unit.compile_script().unwrap();

    let listing = Disassembler::chunk(unit.bytecode().unwrap(), start).to_string();
    let lines: Vec<_> = listing.lines().collect();
    assert_eq!(lines.len(), 13);
    assert_eq!(lines[0], "0000  ident_ref     x 2");
    assert_eq!(lines[6], "0006  jmp_z         @12");
    assert_eq!(lines[11], "0011  jmp           @5");
    assert_eq!(lines[12], "0012  ret");
}

#[test]
fn test_ast_json_round_trip() {
    let original = program(vec![
        var(vec![("o", Some(object(vec![])))]),
        for_in(
            spacey_compiler::ast::ForInLeft::Expression(ident("k")),
            ident("o"),
            try_(
                block(vec![expr_stmt(call(member(ident("log"), "write"), vec![ident("k")]))]),
                Some(("e", block(vec![]))),
                None,
            ),
        ),
        labeled("done", empty()),
    ]);

    let json = serde_json::to_string(&original).unwrap();
    let decoded: Program = serde_json::from_str(&json).unwrap();
    assert_eq!(decoded, original);

    let mut first = SourceUnit::new(original);
    let mut second = SourceUnit::new(decoded);
    let a = first.compile_script().unwrap();
    let b = second.compile_script().unwrap();
    assert_eq!(
        Disassembler::chunk(first.bytecode().unwrap(), a).to_string(),
        Disassembler::chunk(second.bytecode().unwrap(), b).to_string()
    );
}

#[test]
fn test_fallback_statement_in_listing() {
    let mut unit = SourceUnit::new(program(vec![
        expr_stmt(ident("a")),
        while_(ident("c"), block(vec![return_(Some(int(1)))])),
    ]));
    let start = unit.compile_script().unwrap();

    let listing = Disassembler::chunk(unit.bytecode().unwrap(), start).to_string();
    assert_eq!(listing, "0000  ident         a\n0001  pop\n0002  tree          <while>\n0003  ret\n");
}

#[test]
fn test_config_disables_fallback() {
    let config = CompilerConfig::from_toml_str("allow_fallback = false").unwrap();
    let mut unit = SourceUnit::with_config(program(vec![labeled("l", empty())]), config);

    let err = unit.compile_script().unwrap_err();
    assert_eq!(err, CompileError::NotImplemented);
    assert_eq!(err.to_string(), "construct cannot be compiled to bytecode here");
}

#[test]
fn test_config_caps_code_size() {
    let config = CompilerConfig::from_toml_str("max_code_len = 2").unwrap();
    let body = (0..4).map(|i| expr_stmt(int(i))).collect();
    let mut unit = SourceUnit::with_config(program(body), config);

    assert_eq!(unit.compile_script(), Err(CompileError::OutOfMemory));
}

#[test]
fn test_config_rejects_unknown_types() {
    assert!(CompilerConfig::from_toml_str("allow_fallback = \"yes\"").is_err());
}

#[test]
fn test_function_bodies_share_the_unit() {
    let program = program(vec![
        var(vec![("f", Some(function(None, &["n"], vec![expr_stmt(ident("n"))])))]),
        expr_stmt(call(ident("f"), vec![int(1)])),
    ]);
    let func = match program.body[0].as_ref() {
        Statement::VariableDeclaration(decl) => match &decl.declarations[0].init {
            Some(Expression::Function(func)) => func.clone(),
            other => panic!("unexpected initializer {other:?}"),
        },
        other => panic!("unexpected statement {other:?}"),
    };

    let mut unit = SourceUnit::new(program);
    let script = unit.compile_script().unwrap();
    let body = unit.compile_function_body(&func).unwrap();
    let eval = unit.compile_expression(&ident("f")).unwrap();

    assert_eq!(script, 0);
    assert!(body > script);
    assert!(eval > body);
    assert_eq!(chunk_opcodes(&unit, body), vec![OpCode::Ident, OpCode::Ret]);

    let code = unit.bytecode().unwrap();
    for start in [script, body, eval] {
        assert_eq!(analyze(code, start).unwrap().return_depth, Some(1));
    }
}
