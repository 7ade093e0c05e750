use anyhow::{Context, Result};
use clap::Parser;
use llvm2wasm::{translate, TranslateOptions};
use log::{info, LevelFilter};
use std::fs;
use std::path::PathBuf;

/// Translate LLVM bitcode into WebAssembly text.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Input bitcode file (.bc)
    input: PathBuf,

    /// Output file; stdout when omitted
    #[arg(long, short)]
    output: Option<PathBuf>,

    /// Export a defined function by name (repeatable)
    #[arg(long = "export", value_name = "NAME")]
    exports: Vec<String>,

    /// Export every named function that has a body
    #[arg(long)]
    export_all: bool,

    /// Module name used for imported functions
    #[arg(long, default_value = "external")]
    import_module: String,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_logging(verbose: u8) {
    let mut builder = env_logger::Builder::from_default_env();
    match verbose {
        0 => {}
        1 => {
            builder.filter_level(LevelFilter::Debug);
        }
        _ => {
            builder.filter_level(LevelFilter::Trace);
        }
    }
    builder.init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    info!("translating {}", cli.input.display());

    let bytes =
        fs::read(&cli.input).with_context(|| format!("failed to read {}", cli.input.display()))?;

    let options = TranslateOptions {
        import_module: cli.import_module,
        exports: cli.exports,
        export_all: cli.export_all,
    };

    let wast = translate(&bytes, &options)
        .with_context(|| format!("translation of {} failed", cli.input.display()))?;

    if let Some(output_path) = cli.output {
        fs::write(&output_path, &wast)
            .with_context(|| format!("failed to write {}", output_path.display()))?;
        info!("wrote {}", output_path.display());
    } else {
        print!("{}", wast);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_defaults() {
        let cli = Cli::parse_from(["llvm2wasm", "input.bc"]);
        assert_eq!(cli.input, PathBuf::from("input.bc"));
        assert!(cli.output.is_none());
        assert!(cli.exports.is_empty());
        assert!(!cli.export_all);
        assert_eq!(cli.import_module, "external");
        assert_eq!(cli.verbose, 0);
    }

    #[test]
    fn cli_collects_exports_and_verbosity() {
        let cli = Cli::parse_from([
            "llvm2wasm",
            "in.bc",
            "--export",
            "main",
            "--export",
            "add",
            "-vv",
            "-o",
            "out.wast",
        ]);
        assert_eq!(cli.exports, vec!["main".to_string(), "add".to_string()]);
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.output, Some(PathBuf::from("out.wast")));
    }
}
