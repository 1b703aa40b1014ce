//! Disasm command - print expression bytecode one instruction per line

use anyhow::{Context, Result};
use std::path::PathBuf;
use tickvm_runtime::disassemble;

/// Where the bytecode comes from
#[derive(Debug)]
pub enum Input {
    File(PathBuf),
    Hex(String),
}

pub fn run(input: Input) -> Result<()> {
    let code = match input {
        Input::File(path) => std::fs::read(&path)
            .with_context(|| format!("Failed to read file: {}", path.display()))?,
        Input::Hex(text) => super::parse_hex(&text)?,
    };
    tracing::debug!(bytes = code.len(), "disassembling");
    print!("{}", disassemble(&code));
    Ok(())
}
