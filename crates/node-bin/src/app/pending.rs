//! Inspection of records waiting in the persistence store.

use itinerary_types::PersistedRecord;
use node_config_and_utils::{Config, Paths};
use persistence_store::PersistenceStore;

/// Print one line per persisted record, oldest first.
pub async fn list_pending(config: &Config, paths: &Paths) -> Result<(), Box<dyn std::error::Error>> {
    let dir = config.persist_dir(paths);
    if !dir.exists() {
        println!("No persisted records ({} does not exist)", dir.display());
        return Ok(());
    }

    let store = PersistenceStore::open(&dir).await?;
    let keys = store.list().await?;
    if keys.is_empty() {
        println!("No persisted records in {}", dir.display());
        return Ok(());
    }

    for key in &keys {
        match store.read(key).await {
            Ok(PersistedRecord::Message(pending)) => println!(
                "{}  message   -> {}/{} (interchange {})",
                key, pending.node, pending.service, pending.message.interchange_id
            ),
            Ok(PersistedRecord::Tracking(record)) => println!(
                "{}  tracking  {} {} (interchange {})",
                key, record.last_activity, record.state, record.interchange_id
            ),
            Err(e) => println!("{}  unreadable: {}", key, e),
        }
    }
    println!("{} record(s) in {}", keys.len(), dir.display());
    Ok(())
}
