//! Ingest command implementation.

use docfeed_core::{Header, StoreConfig};
use serde_json::Value;
use std::path::Path;

/// Runs the ingest command.
pub fn run(path: &Path, file: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let payloads = parse_batch(&super::read_input(file)?)?;
    let store = super::open_store(path, StoreConfig::default())?;
    let headers = store.upsert_batch(payloads)?;
    println!("{}", summarize(&headers));
    Ok(())
}

/// Accepts a bare array or an upload body `{"docs": [...]}`.
pub fn parse_batch(text: &str) -> Result<Vec<Value>, Box<dyn std::error::Error>> {
    match serde_json::from_str::<Value>(text)? {
        Value::Array(docs) => Ok(docs),
        Value::Object(mut body) => match body.remove("docs") {
            Some(Value::Array(docs)) => Ok(docs),
            _ => Err("expected a \"docs\" array".into()),
        },
        _ => Err("expected an array of documents".into()),
    }
}

fn summarize(headers: &[Header]) -> String {
    match (headers.first(), headers.last()) {
        (Some(first), Some(last)) => format!(
            "Ingested {} document(s), revisions {}..={}",
            headers.len(),
            first.rev.as_u64(),
            last.rev.as_u64()
        ),
        _ => String::from("Nothing to ingest"),
    }
}
