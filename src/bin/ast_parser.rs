//! Debug smoke-test harness for the parsing engine.
//!
//! Not a CLI: takes one positional file path, runs it through
//! [`ast_core_engine::Engine::process_file`], and prints the resulting
//! `FileResult` as JSON. Useful for poking at a single file by hand
//! without writing a test.

use std::env;
use std::process;

use ast_core_engine::config::EngineConfig;
use ast_core_engine::Engine;

#[tokio::main]
async fn main() {
    let mut args = env::args();
    let _binary = args.next();
    let Some(path) = args.next() else {
        eprintln!("usage: ast-parser <file>");
        process::exit(2);
    };

    if let Err(err) = ast_core_engine::logging::init() {
        eprintln!("failed to initialize logging: {err}");
    }

    let engine = Engine::new(EngineConfig::default());
    match engine.process_file(&path).await {
        Ok(result) => match serde_json::to_string_pretty(&result) {
            Ok(json) => println!("{json}"),
            Err(err) => {
                eprintln!("failed to serialize result: {err}");
                process::exit(1);
            }
        },
        Err(err) => {
            eprintln!("failed to process {path}: {err}");
            process::exit(1);
        }
    }
}
