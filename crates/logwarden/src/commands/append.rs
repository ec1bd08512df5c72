//! Append command implementation - writes lines through the shared writer

use anyhow::{bail, Result};
use logwarden_logs::Registry;
use std::path::Path;

use crate::output::print_success_json;

pub fn execute(registry: &Registry, file: &Path, lines: &[String]) -> Result<()> {
    let log = registry.get(file)?;

    let write_id = log.open_writer()?;
    let result = lines
        .iter()
        .try_for_each(|line| {
            log.write(line, write_id)?;
            log.new_line(write_id)
        })
        .and_then(|()| log.flush(write_id));
    let closed = log.close_writer(write_id);
    result?;

    if !closed {
        bail!("Failed to close {}", log.absolute_path().display());
    }

    print_success_json::<()>(
        &format!(
            "Appended {} line(s) to {}",
            lines.len(),
            log.absolute_path().display()
        ),
        None,
    );
    Ok(())
}
