use clap::Parser;
use kicad_extract::error::ExtractError;
use kicad_extract::parsers::serialize::to_canonical;
use kicad_extract::{detect_kind, extract_bytes, parse_tree, DocumentKind, ExtractOptions};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "kicad-extract",
    about = "Extract KiCad schematics and boards to JSON"
)]
struct Cli {
    /// Input file (.kicad_sch or .kicad_pcb)
    input: PathBuf,

    /// Output file (stdout if not specified)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Override auto-detected document kind (sch, pcb)
    #[arg(short, long)]
    format: Option<String>,

    /// Pretty-print JSON output
    #[arg(long)]
    pretty: bool,

    /// Print the canonical S-expression text instead of JSON
    #[arg(long)]
    tree: bool,

    /// Fail on malformed input instead of recovering
    #[arg(long)]
    strict: bool,
}

fn parse_format(s: &str) -> Result<DocumentKind, String> {
    match s.to_lowercase().as_str() {
        "sch" | "schematic" | "kicad_sch" => Ok(DocumentKind::Schematic),
        "pcb" | "board" | "kicad_pcb" => Ok(DocumentKind::Board),
        _ => Err(format!("Unknown format: {s}. Use: sch, pcb")),
    }
}

fn run(cli: &Cli) -> Result<String, ExtractError> {
    let opts = ExtractOptions { strict: cli.strict };
    let data = std::fs::read(&cli.input)?;

    if cli.tree {
        let nodes = parse_tree(&String::from_utf8_lossy(&data), &opts)?;
        return Ok(to_canonical(&nodes));
    }

    let kind = match &cli.format {
        Some(name) => Some(parse_format(name).map_err(ExtractError::UnsupportedFormat)?),
        // Unknown extensions fall through to root-tag detection.
        None => detect_kind(&cli.input),
    };
    let document = extract_bytes(&data, kind, &opts)?;
    let json = if cli.pretty {
        serde_json::to_string_pretty(&document)?
    } else {
        serde_json::to_string(&document)?
    };
    Ok(json)
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let output = match run(&cli) {
        Ok(output) => output,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    if let Some(output_path) = &cli.output {
        if let Err(e) = std::fs::write(output_path, &output) {
            eprintln!("Error writing {}: {e}", output_path.display());
            std::process::exit(1);
        }
        eprintln!("Written to {}", output_path.display());
    } else {
        println!("{output}");
    }
}
