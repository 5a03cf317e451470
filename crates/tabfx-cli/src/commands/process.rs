//! Offline rendering of a WAV file through a session.

use std::path::PathBuf;

use anyhow::Context;
use clap::Args;

use tabfx_config::{EngineConfig, ParamId, ParamValue, ParameterSnapshot};
use tabfx_core::linear_to_db;
use tabfx_effects::semitones_to_offset;
use tabfx_engine::SessionManager;

use crate::wav::{StereoAudio, WavSpec, read_stereo, write_stereo};

#[derive(Args)]
pub struct ProcessArgs {
    /// Input WAV file
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// Output WAV file (always stereo)
    #[arg(value_name = "OUTPUT")]
    output: PathBuf,

    /// Parameter snapshot (TOML, or JSON with a .json extension)
    #[arg(long, value_name = "FILE")]
    params: Option<PathBuf>,

    /// Engine config (TOML); the sample rate always follows the input file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Output volume, linear
    #[arg(long)]
    volume: Option<f32>,

    /// Balance from -1 (left) to 1 (right)
    #[arg(long, allow_hyphen_values = true)]
    pan: Option<f32>,

    /// Downmix to mono
    #[arg(long)]
    mono: bool,

    /// Swap left and right
    #[arg(long)]
    invert: bool,

    /// Pitch shift in semitones; enables the pitch effect
    #[arg(long, allow_hyphen_values = true)]
    pitch_semitones: Option<f32>,

    /// EQ band gain (e.g. "0=6" boosts the 32 Hz band by 6 dB)
    #[arg(long, value_parser = parse_band_gain)]
    eq: Vec<(usize, f32)>,

    /// Enable the chorus
    #[arg(long)]
    chorus: bool,

    /// Enable the convolver
    #[arg(long)]
    convolver: bool,

    /// Processing block size
    #[arg(long, default_value = "128")]
    block_size: usize,

    /// Output bit depth (16, 24, or 32)
    #[arg(long, default_value = "32")]
    bit_depth: u16,
}

fn parse_band_gain(s: &str) -> Result<(usize, f32), String> {
    let (band, gain) = s
        .split_once('=')
        .ok_or_else(|| format!("invalid EQ setting '{s}' (expected BAND=DB)"))?;
    let band = band
        .trim()
        .parse()
        .map_err(|_| format!("invalid EQ band '{band}'"))?;
    let gain = gain
        .trim()
        .parse()
        .map_err(|_| format!("invalid EQ gain '{gain}'"))?;
    Ok((band, gain))
}

// Command-line overrides on top of the snapshot.
fn apply_overrides(args: &ProcessArgs, snapshot: &mut ParameterSnapshot) -> anyhow::Result<()> {
    let mut overrides = Vec::new();
    if let Some(volume) = args.volume {
        overrides.push((ParamId::Volume, ParamValue::Float(volume)));
    }
    if let Some(pan) = args.pan {
        overrides.push((ParamId::Pan, ParamValue::Float(pan)));
    }
    if args.mono {
        overrides.push((ParamId::Mono, ParamValue::Bool(true)));
    }
    if args.invert {
        overrides.push((ParamId::Invert, ParamValue::Bool(true)));
    }
    if let Some(semitones) = args.pitch_semitones {
        overrides.push((
            ParamId::PitchOffset,
            ParamValue::Float(semitones_to_offset(semitones)),
        ));
        snapshot.effects.pitch = semitones != 0.0;
    }
    for &(band, gain) in &args.eq {
        overrides.push((ParamId::EqGain(band), ParamValue::Float(gain)));
    }
    snapshot.effects.chorus |= args.chorus;
    snapshot.effects.convolver |= args.convolver;

    for (id, value) in overrides {
        let checked = snapshot
            .set(id, value)
            .with_context(|| format!("invalid value for {id}"))?;
        if checked.clamped {
            tracing::warn!(param = %id, requested = %value, used = %checked.value, "value clamped");
        }
    }
    Ok(())
}

pub fn run(args: ProcessArgs) -> anyhow::Result<()> {
    println!("Reading {}...", args.input.display());
    let (input, spec) = read_stereo(&args.input)
        .with_context(|| format!("failed to read {}", args.input.display()))?;
    println!(
        "  {} frames, {} ch, {} Hz, {:.2}s",
        input.len(),
        spec.channels,
        spec.sample_rate,
        input.len() as f32 / spec.sample_rate as f32
    );

    let mut snapshot = match &args.params {
        Some(path) => ParameterSnapshot::load(path)
            .with_context(|| format!("failed to load parameters from {}", path.display()))?,
        None => ParameterSnapshot::default(),
    };
    apply_overrides(&args, &mut snapshot)?;

    let mut config = match &args.config {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("failed to load engine config from {}", path.display()))?,
        None => EngineConfig::default(),
    };
    config.sample_rate = spec.sample_rate;
    config.block_size = args.block_size;
    config.max_sessions = 1;

    let manager = SessionManager::new(config)?;
    let (id, mut renderer) = manager.create_detached()?;
    manager.load_parameters(id, &snapshot)?;

    let effects = snapshot.effects;
    println!(
        "Processing (block {}, pitch {}, chorus {}, convolver {})...",
        args.block_size, effects.pitch, effects.chorus, effects.convolver
    );

    let mut output = StereoAudio {
        left: vec![0.0; input.len()],
        right: vec![0.0; input.len()],
    };
    let block = renderer.block_size();
    let mut start = 0;
    while start < input.len() {
        let end = (start + block).min(input.len());
        renderer.render(
            &input.left[start..end],
            &input.right[start..end],
            &mut output.left[start..end],
            &mut output.right[start..end],
        );
        start = end;
    }

    let faults = renderer.fault_count();
    manager.close_session(id)?;
    if faults > 0 {
        println!("  {faults} block(s) silenced after node faults");
    }

    println!("\nStats:");
    print_stats("Input: ", &input);
    print_stats("Output:", &output);

    let out_spec = WavSpec {
        channels: 2,
        sample_rate: spec.sample_rate,
        bits_per_sample: args.bit_depth,
    };
    println!("\nWriting {}...", args.output.display());
    write_stereo(&args.output, &output, out_spec)
        .with_context(|| format!("failed to write {}", args.output.display()))?;
    println!("Done!");

    Ok(())
}

fn print_stats(label: &str, audio: &StereoAudio) {
    let rms = |x: &[f32]| {
        if x.is_empty() {
            return 0.0;
        }
        (x.iter().map(|s| s * s).sum::<f32>() / x.len() as f32).sqrt()
    };
    let peak = |x: &[f32]| x.iter().map(|s| s.abs()).fold(0.0, f32::max);
    println!(
        "  {label} L RMS {:.1} dB, Peak {:.1} dB | R RMS {:.1} dB, Peak {:.1} dB",
        linear_to_db(rms(&audio.left)),
        linear_to_db(peak(&audio.left)),
        linear_to_db(rms(&audio.right)),
        linear_to_db(peak(&audio.right)),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Wrapper {
        #[command(flatten)]
        args: ProcessArgs,
    }

    fn parse(extra: &[&str]) -> ProcessArgs {
        let mut argv = vec!["tabfx", "in.wav", "out.wav"];
        argv.extend_from_slice(extra);
        Wrapper::parse_from(argv).args
    }

    #[test]
    fn parse_band_gain_accepts_negative_gain() {
        assert_eq!(parse_band_gain("3=-4.5"), Ok((3, -4.5)));
        assert!(parse_band_gain("3").is_err());
        assert!(parse_band_gain("x=1").is_err());
    }

    #[test]
    fn overrides_land_in_snapshot() {
        let args = parse(&["--pan", "-0.5", "--mono", "--eq", "9=3", "--pitch-semitones", "-12"]);
        let mut snapshot = ParameterSnapshot::default();
        apply_overrides(&args, &mut snapshot).unwrap();

        assert_eq!(snapshot.pan, -0.5);
        assert!(snapshot.mono);
        assert_eq!(snapshot.eq_gains[9], 3.0);
        assert_eq!(snapshot.pitch_offset, -1.0);
        assert!(snapshot.effects.pitch);
        assert!(!snapshot.effects.chorus);
    }

    #[test]
    fn overrides_clamp_and_reject() {
        let args = parse(&["--volume", "10", "--pan", "3"]);
        let mut snapshot = ParameterSnapshot::default();
        apply_overrides(&args, &mut snapshot).unwrap();
        assert_eq!(snapshot.volume, 10.0);
        assert_eq!(snapshot.pan, 1.0);

        let args = parse(&["--eq", "12=1"]);
        assert!(apply_overrides(&args, &mut snapshot).is_err());
    }
}
