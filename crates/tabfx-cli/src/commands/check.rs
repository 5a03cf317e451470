//! Validation of parameter snapshots and engine configs.

use std::path::PathBuf;

use anyhow::Context;
use clap::Args;

use tabfx_config::{EngineConfig, ParamId, ParameterSnapshot};

#[derive(Args)]
pub struct CheckArgs {
    /// File to check
    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// Treat the file as an engine config instead of a parameter snapshot
    #[arg(long)]
    engine: bool,
}

pub fn run(args: CheckArgs) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(&args.file)
        .with_context(|| format!("failed to read {}", args.file.display()))?;

    if args.engine {
        let config = EngineConfig::from_toml(&text)?;
        println!(
            "{}: valid engine config ({} Hz, block {}, up to {} sessions)",
            args.file.display(),
            config.sample_rate,
            config.block_size,
            config.max_sessions
        );
        return Ok(());
    }

    let is_json = args
        .file
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    // Parsed without clamping so out-of-range fields can be reported.
    let raw: ParameterSnapshot = if is_json {
        serde_json::from_str(&text)?
    } else {
        toml::from_str(&text)?
    };

    let changes = clamp_report(&raw);
    if changes.is_empty() {
        println!("{}: valid", args.file.display());
    } else {
        println!(
            "{}: {} value(s) outside their domain will be adjusted on load:",
            args.file.display(),
            changes.len()
        );
        for line in &changes {
            println!("  {line}");
        }
    }
    Ok(())
}

// One line per field that loading would change.
fn clamp_report(raw: &ParameterSnapshot) -> Vec<String> {
    let mut fixed = raw.clone();
    fixed.clamp_all();
    ParamId::all()
        .filter_map(|id| {
            let (before, after) = (raw.get(id)?, fixed.get(id)?);
            // NaN never equals itself, so it is always reported.
            (before != after).then(|| format!("{id}: {before} -> {after}"))
        })
        .collect()
}
