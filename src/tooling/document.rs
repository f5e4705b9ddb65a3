use std::fs;
use std::io::{self, Read};
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use serde_json::Value;

/// Reads an order document from `path` (`-` reads stdin). YAML is used for
/// `.yaml`/`.yml` files, JSON otherwise.
pub fn load_document(path: &Path) -> Result<Value> {
    if path == Path::new("-") {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .context("unable to read document from stdin")?;
        return parse_document(&buffer, false);
    }
    let text = fs::read_to_string(path)
        .with_context(|| format!("unable to read document: {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    parse_document(&text, ext == "yaml" || ext == "yml")
        .with_context(|| format!("invalid document: {}", path.display()))
}

pub fn parse_document(text: &str, yaml: bool) -> Result<Value> {
    let value: Value = if yaml {
        serde_yaml::from_str(text)?
    } else {
        serde_json::from_str(text)?
    };
    if !value.is_object() {
        return Err(anyhow!("document root must be an object"));
    }
    Ok(value)
}
