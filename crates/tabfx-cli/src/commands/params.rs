//! Parameter listing.

use clap::Args;

use tabfx_config::{ParamId, ParamKind, ParameterSnapshot};

#[derive(Args)]
pub struct ParamsArgs {
    /// Print the default snapshot as JSON instead of the table
    #[arg(long)]
    json: bool,
}

pub fn run(args: ParamsArgs) -> anyhow::Result<()> {
    if args.json {
        println!("{}", ParameterSnapshot::default().to_json()?);
        return Ok(());
    }

    println!("Session Parameters\n");
    println!("  {:<24} {:<8} {:<20} {:>10}", "NAME", "KIND", "DOMAIN", "DEFAULT");
    for id in ParamId::all() {
        println!("  {}", describe(id));
    }
    println!("\nEffects (off by default): pitch, chorus, convolver");
    Ok(())
}

fn describe(id: ParamId) -> String {
    match id.kind() {
        ParamKind::Float { min, max, default } => {
            let domain = if max.is_finite() {
                format!("[{min}, {max}]")
            } else {
                format!("[{min}, inf)")
            };
            format!("{:<24} {:<8} {:<20} {:>10}", id.to_string(), "float", domain, default)
        }
        ParamKind::Bool { default } => {
            format!("{:<24} {:<8} {:<20} {:>10}", id.to_string(), "bool", "", default)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn describe_shows_domain_and_default() {
        let line = describe(ParamId::CompressorRatio);
        assert!(line.starts_with("compressor.ratio"));
        assert!(line.contains("[1, 20]"));
        assert!(line.trim_end().ends_with('1'));

        assert!(describe(ParamId::Volume).contains("[0, inf)"));

        let line = describe(ParamId::Mono);
        assert!(line.contains("bool"));
        assert!(line.trim_end().ends_with("false"));
    }
}
