//! Move command implementation - renames one log onto another

use anyhow::{bail, Result};
use logwarden_logs::Registry;
use std::path::Path;

use crate::output::print_success_json;

pub fn execute(registry: &Registry, source: &Path, target: &Path) -> Result<()> {
    let source = registry.get(source)?;
    let target = registry.get(target)?;

    if !source.move_to(&target)? {
        bail!("{} does not exist", source.absolute_path().display());
    }

    print_success_json(
        &format!(
            "Moved {} to {}",
            source.absolute_path().display(),
            target.absolute_path().display()
        ),
        Some(serde_json::json!({
            "source": source.absolute_path(),
            "target": target.absolute_path(),
            "backup": target.backup_path().exists().then(|| target.backup_path()),
        })),
    );
    Ok(())
}
