//! Cat command implementation - prints a log through a pooled reader

use anyhow::{bail, Result};
use logwarden_logs::Registry;
use regex::Regex;

use crate::cli::CatArgs;
use crate::output::print_logs;

pub fn execute(registry: &Registry, args: CatArgs) -> Result<()> {
    // Compile grep pattern if provided
    let grep_regex = if let Some(pattern) = &args.grep {
        Some(Regex::new(pattern).map_err(|e| anyhow::anyhow!("Invalid regex pattern: {}", e))?)
    } else {
        None
    };

    let log = registry.get(&args.file)?;
    if !log.exists() {
        bail!("{} does not exist", log.absolute_path().display());
    }

    let read_id = log.open_reader()?;
    let mut lines = Vec::new();
    let result = loop {
        match log.read_line(read_id) {
            Ok(Some(line)) => lines.push(line),
            Ok(None) => break Ok(()),
            Err(e) => break Err(e),
        }
    };
    log.close_reader(read_id);
    result?;

    if let Some(ref regex) = grep_regex {
        lines.retain(|line| regex.is_match(line));
    }
    print_logs(&lines);
    Ok(())
}
