//! Props command implementation - reads and updates a key=value file
//!
//! The file is loaded under the write lock through the input stream and
//! replaced through the output stream.

use anyhow::{bail, Result};
use logwarden_logs::{LogFile, Properties, Registry};
use std::collections::BTreeMap;

use crate::cli::PropsArgs;
use crate::output::{is_json_mode, print_success_json};

pub fn execute(registry: &Registry, args: PropsArgs) -> Result<()> {
    let log = registry.get(&args.file)?;
    let mut props = load(&log)?;

    if args.set.is_empty() && args.unset.is_empty() {
        print_properties(&props)?;
        return Ok(());
    }

    for assignment in &args.set {
        let Some((key, value)) = assignment.split_once('=') else {
            bail!("Expected KEY=VALUE, got {:?}", assignment);
        };
        props.set(key.trim(), value);
    }
    for key in &args.unset {
        props.remove(key);
    }

    store(&log, &props)?;
    print_success_json::<()>(
        &format!(
            "Saved {} propert{} to {}",
            props.len(),
            if props.len() == 1 { "y" } else { "ies" },
            log.absolute_path().display()
        ),
        None,
    );
    Ok(())
}

fn load(log: &LogFile) -> Result<Properties> {
    if !log.exists() {
        return Ok(Properties::new());
    }
    let id = log.open_input_stream()?;
    let loaded = log.load(id);
    log.close_input_stream(id);
    Ok(loaded?)
}

fn store(log: &LogFile, props: &Properties) -> Result<()> {
    let id = log.open_output_stream()?;
    let stored = log.store(props, id);
    let closed = log.close_output_stream(id);
    stored?;
    if !closed {
        bail!("Failed to close {}", log.absolute_path().display());
    }
    Ok(())
}

fn print_properties(props: &Properties) -> Result<()> {
    if is_json_mode() {
        let map: BTreeMap<&str, &str> = props
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
            .collect();
        println!("{}", serde_json::to_string_pretty(&map)?);
    } else {
        for (key, value) in props.iter() {
            println!("{}={}", key, value);
        }
    }
    Ok(())
}
