//! Save command - inspect save-state files

use anyhow::{Context, Result};
use std::path::Path;
use tickvm_runtime::savestate::{self, SaveData};

pub fn inspect(path: &Path, json: bool) -> Result<()> {
    let data = savestate::read_file(path)
        .with_context(|| format!("Failed to read save file: {}", path.display()))?
        .with_context(|| format!("Save file not found: {}", path.display()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&data)?);
        return Ok(());
    }

    println!("kind: {:?}", data.kind());
    println!("entries: {}", data.len());
    match &data {
        SaveData::Map(map) => {
            for (key, value) in map {
                println!("  {} = {}", key, value);
            }
        }
        SaveData::IntVars(values) => {
            for (i, v) in values.iter().enumerate() {
                println!("  [{}] {}", i, v);
            }
        }
        SaveData::FloatVars(values) => {
            for (i, v) in values.iter().enumerate() {
                println!("  [{}] {}", i, v);
            }
        }
    }
    Ok(())
}
