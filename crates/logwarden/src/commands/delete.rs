//! Delete command implementation

use anyhow::Result;
use logwarden_logs::Registry;
use std::path::Path;

use crate::output::{print_info_json, print_success_json};

pub fn execute(registry: &Registry, file: &Path) -> Result<()> {
    let log = registry.get(file)?;

    if log.delete()? {
        print_success_json::<()>(&format!("Deleted {}", log.absolute_path().display()), None);
    } else {
        print_info_json(&format!("{} does not exist", log.absolute_path().display()));
    }
    Ok(())
}
