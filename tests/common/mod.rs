// Shared helpers for the integration tests.
#![allow(dead_code)]

use sable::ast::fep::FepModule;
use sable::ast::SExpr;
use sable::config::CompilerConfig;
use sable::engine;
use sable::modules::host::MemoryHost;
use sable::SableError;

pub fn read(text: &str) -> SExpr {
    let mut data = engine::read_program(text, "test").unwrap();
    assert_eq!(data.len(), 1, "expected exactly one datum in {:?}", text);
    data.remove(0)
}

pub fn compile(text: &str) -> Result<FepModule, SableError> {
    engine::compile_source(text, &MemoryHost::default())
}

pub fn compile_with(text: &str, config: CompilerConfig) -> Result<FepModule, SableError> {
    engine::compile_source(text, &MemoryHost::new(config))
}

/// Compile and print the fully-expanded module.
pub fn fep(text: &str) -> String {
    compile(text).unwrap().to_sexpr().to_string()
}

/// Compile, instantiate and print each top-level value.
pub fn run(text: &str) -> Vec<String> {
    let host = MemoryHost::default();
    let (_, values) = engine::compile_and_instantiate(text, "test", None, &host).unwrap();
    values.iter().map(ToString::to_string).collect()
}
