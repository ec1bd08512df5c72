//! Backup command implementation - renames a log to its backup name

use anyhow::Result;
use logwarden_logs::Registry;
use std::path::Path;

use crate::output::{print_info_json, print_success_json};

pub fn execute(registry: &Registry, file: &Path, once: bool) -> Result<()> {
    let log = registry.get(file)?;

    let backed_up = if once {
        log.backup_once()?
    } else {
        log.backup()?
    };

    if backed_up {
        print_success_json(
            &format!(
                "Backed up {} to {}",
                log.absolute_path().display(),
                log.backup_path().display()
            ),
            Some(serde_json::json!({
                "path": log.absolute_path(),
                "backup": log.backup_path(),
            })),
        );
    } else {
        print_info_json(&format!(
            "Nothing to back up: {} does not exist",
            log.absolute_path().display()
        ));
    }
    Ok(())
}
