use clap::Parser;
use std::fs;
use std::path::PathBuf;
use std::process;

use hapticscore::{ConversionParameters, ConvertError};

/// Compile a dynamics-annotated MusicXML score into a haptic actuation schedule.
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// MusicXML score (partwise)
    input: PathBuf,

    /// YAML file with bpm, dynamics curve, role/port mapping and trill interval
    #[clap(short = 'c', long)]
    config: Option<PathBuf>,

    /// Override the tempo in quarter notes per minute
    #[clap(short = 'b', long)]
    bpm: Option<u32>,

    /// Write the schedule JSON here instead of stdout
    #[clap(short = 'o', long)]
    output: Option<PathBuf>,

    /// Pretty-print the JSON
    #[clap(short = 'p', long)]
    pretty: bool,

    /// List the score's parts and exit
    #[clap(long)]
    parts: bool,

    /// Log pipeline details to stderr
    #[clap(short = 'v', long)]
    verbose: bool,
}

fn main() {
    let args = Args::parse();

    let default_filter = if args.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter)).init();

    let source = match fs::read_to_string(&args.input) {
        Ok(content) => content,
        Err(e) => {
            eprintln!("Error reading file '{}': {}", args.input.display(), e);
            process::exit(1);
        }
    };

    if args.parts {
        match hapticscore::parse_musicxml(&source) {
            Ok(score) => {
                for (id, name) in score.part_names() {
                    println!("{}\t{}", id, name);
                }
                return;
            }
            Err(e) => fail(e),
        }
    }

    let mut params = match &args.config {
        Some(path) => ConversionParameters::from_path(path).unwrap_or_else(|e| fail(e)),
        None => ConversionParameters::default(),
    };
    if args.bpm.is_some() {
        params.bpm = args.bpm;
    }

    let schedule = hapticscore::convert(&source, &params).unwrap_or_else(|e| fail(e));
    let json = if args.pretty {
        schedule.to_json_pretty()
    } else {
        schedule.to_json()
    }
    .unwrap_or_else(|e| fail(e));

    match &args.output {
        Some(path) => {
            if let Err(e) = fs::write(path, &json) {
                eprintln!("Error writing to '{}': {}", path.display(), e);
                process::exit(1);
            }
            eprintln!(
                "Wrote {} ticks for {} roles to {}",
                schedule.time.len(),
                schedule.instructions.len(),
                path.display()
            );
        }
        None => println!("{}", json),
    }
}

fn fail(error: ConvertError) -> ! {
    for diagnostic in error.diagnostics() {
        eprintln!("Error: {}", diagnostic.message);
        for location in diagnostic.locations {
            let mut line = format!("  part {}", location.part);
            if let Some(measure) = location.measure {
                line.push_str(&format!(", measure {}", measure));
            }
            if let Some(note) = location.note {
                line.push_str(&format!(", note {}", note + 1));
            }
            if let Some(port) = location.port {
                line.push_str(&format!(", port {}", port));
            }
            eprintln!("{}", line);
        }
    }
    process::exit(1);
}
