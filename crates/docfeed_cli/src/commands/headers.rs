//! Headers command implementation.

use docfeed_core::{DocumentStore, Header, Revision, StoreConfig};
use std::path::Path;

/// Runs the headers command.
pub fn run(
    path: &Path,
    from: Option<u64>,
    since: Option<f64>,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = super::open_store(path, StoreConfig::default())?;
    let headers = select(&store, from, since);

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&headers)?);
        }
        _ => {
            print_text_output(&headers);
        }
    }

    Ok(())
}

fn select(store: &DocumentStore, from: Option<u64>, since: Option<f64>) -> Vec<Header> {
    match (from, since) {
        (Some(rev), _) => store.get_headers(Some(Revision::new(rev))),
        (None, Some(ts)) => match store.first_revision_since(ts) {
            Some(first) => store.get_headers(first.prev()),
            None => Vec::new(),
        },
        (None, None) => store.get_headers(None),
    }
}

fn print_text_output(headers: &[Header]) {
    println!(
        "{:>8}  {:<36}  {:<18}  {:<20}  {:<12}  {:>8}",
        "REV", "ID", "TIMESTAMP", "TYPE", "HOST", "RUN"
    );
    for h in headers {
        println!(
            "{:>8}  {:<36}  {:<18.3}  {:<20}  {:<12}  {:>8}",
            h.rev.as_u64(),
            h.id,
            h.timestamp,
            h.kind.as_deref().unwrap_or("-"),
            h.hostname.as_deref().unwrap_or("-"),
            h.run.map_or_else(|| "-".to_string(), |r| r.to_string()),
        );
    }
    println!("{} header(s)", headers.len());
}
