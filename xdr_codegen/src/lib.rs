// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

pub mod ast;
pub mod codegen;
pub mod parser;
pub mod scanner;
pub mod symbol_table;
pub mod validate;

pub use parser::Parser;
pub use scanner::Scanner;

use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub enum XdrError {
    UndefinedName(String),
    UnsupportedOptional(String),
    Io(std::io::Error),
}

impl fmt::Display for XdrError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UndefinedName(name) => write!(f, "undefined name: {name}"),
            Self::UnsupportedOptional(name) => write!(
                f,
                "{name} is used as an optional pointer but is not a valid self-referential type"
            ),
            Self::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl std::error::Error for XdrError {}

impl From<std::io::Error> for XdrError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

pub type Result<T> = std::result::Result<T, XdrError>;

/// Drives the scanner, parser, validator, and code generator over a set of `.x` schema files from
/// a `build.rs` script, writing one generated module per input file to `$OUT_DIR`.
pub struct Compiler {
    files: Vec<PathBuf>,
    params: codegen::Params,
}

impl Compiler {
    pub fn new() -> Self {
        Compiler {
            files: Vec::new(),
            params: codegen::Params::default(),
        }
    }

    /// Add a `.x` schema file to compile. The generated module takes its name from the file stem,
    /// e.g. `input/rpc_prot.x` generates `pub mod rpc_prot { ... }` in `$OUT_DIR/rpc_prot.rs`.
    pub fn file(mut self, path: impl AsRef<Path>) -> Self {
        self.files.push(path.as_ref().to_path_buf());
        self
    }

    /// Also emit non-allocating (`no_std`-friendly) serialization routines alongside the
    /// allocating ones.
    pub fn no_alloc(mut self, no_alloc: bool) -> Self {
        self.params.no_alloc = no_alloc;
        self
    }

    pub fn run(self) -> Result<()> {
        let out_dir = std::env::var("OUT_DIR").expect("OUT_DIR not set; run from build.rs");

        for file in &self.files {
            println!("cargo:rerun-if-changed={}", file.display());

            let module_name = file
                .file_stem()
                .and_then(|s| s.to_str())
                .expect("schema file must have a UTF-8 stem")
                .to_string();

            let source = std::fs::read_to_string(file)?;

            let mut parser = Parser::new(Scanner::new(&source));
            let schema = parser.parse()?;
            let validated = validate::ValidatedSchema::validate(schema)?;

            let generated = codegen::codegen(&validated, &module_name, &self.params);

            let out_path = Path::new(&out_dir).join(format!("{module_name}.rs"));
            std::fs::write(out_path, generated)?;
        }

        Ok(())
    }
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}
