//! Replay command implementation.

use docfeed_core::StoreConfig;
use docfeed_server::{ServerConfig, SyncServer};
use std::path::Path;
use std::sync::Arc;

/// Runs the replay command, printing the reply body.
pub fn run(path: &Path, file: &Path, max_headers: usize) -> Result<(), Box<dyn std::error::Error>> {
    let body = super::read_input(file)?;
    let store = super::open_store(path, StoreConfig::default())?;
    let config = ServerConfig::default().with_max_headers_per_message(max_headers);
    let server = SyncServer::new(config, Arc::new(store))?;

    let reply = server.handle_sync_proxy(&body, "cli")?;
    println!("{reply}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replays_recorded_messages() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("conversation.json");
        std::fs::write(
            &input,
            r#"{"messages": ["{\"event\":\"sync_request\",\"known_rev\":null}"]}"#,
        )
        .unwrap();

        run(dir.path(), &input, 10).unwrap();
        assert!(run(dir.path(), &dir.path().join("missing.json"), 10).is_err());
    }
}
