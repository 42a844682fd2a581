mod dictionary;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use kanakanji_core::{
    ComposingText, ConvertRequestOptions, DicdataStore, EngineConfig, InputStyle, InputStyleManager,
    KanaKanjiConverter,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "kanakanji", about = "Dictionary and conversion utilities")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build a system dictionary directory from `ruby,word,lcid,rcid,mid,value` CSV files
    Build {
        #[arg(long, num_args = 1.., required = true)]
        inputs: Vec<PathBuf>,
        #[arg(long, default_value = "dictionary")]
        out: PathBuf,
    },
    /// Build `user.fst` (or `user_shortcuts.fst`) against an existing system dictionary
    UserDict {
        #[arg(long, num_args = 1.., required = true)]
        inputs: Vec<PathBuf>,
        #[arg(long)]
        dictionary: PathBuf,
        #[arg(long)]
        out: PathBuf,
        #[arg(long)]
        shortcuts: bool,
    },
    /// Convert a line of input and print the candidates as JSON
    Convert {
        input: String,
        /// TOML engine configuration
        #[arg(long)]
        config: Option<PathBuf>,
        /// Overrides the configured dictionary directory
        #[arg(long)]
        dictionary: Option<PathBuf>,
        /// Treat the input as romaji keystrokes
        #[arg(long)]
        roman: bool,
    },
    /// Validate a custom input table
    CheckTable { path: PathBuf },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    match Args::parse().command {
        Command::Build { inputs, out } => {
            let count = dictionary::build_system(&inputs, &out)?;
            println!("Wrote {} entries to {}", count, out.display());
        }
        Command::UserDict {
            inputs,
            dictionary,
            out,
            shortcuts,
        } => {
            let count = dictionary::build_user(&inputs, &dictionary, &out, shortcuts)?;
            println!("Wrote {} user entries to {}", count, out.display());
        }
        Command::Convert {
            input,
            config,
            dictionary,
            roman,
        } => convert(&input, config, dictionary, roman)?,
        Command::CheckTable { path } => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("reading {}", path.display()))?;
            if let Err(errors) = InputStyleManager::check_format(&content) {
                for e in &errors {
                    eprintln!("{}: {}", path.display(), e);
                }
                bail!("{} problem(s) in {}", errors.len(), path.display());
            }
            println!("{}: ok", path.display());
        }
    }
    Ok(())
}

fn convert(input: &str, config: Option<PathBuf>, dictionary: Option<PathBuf>, roman: bool) -> Result<()> {
    let mut config = match config {
        Some(path) => EngineConfig::load_toml(&path)
            .map_err(|e| anyhow::anyhow!("loading {}: {}", path.display(), e))?,
        None => EngineConfig::default(),
    };
    if let Some(dir) = dictionary {
        config.dictionary_dir = dir;
    }
    if !config.dictionary_dir.is_dir() {
        bail!("dictionary directory {} not found", config.dictionary_dir.display());
    }
    let store = Arc::new(DicdataStore::from_config(&config));
    let mut converter = KanaKanjiConverter::new(store);
    let options = ConvertRequestOptions::from_config(&config);

    let style = if roman { InputStyle::Roman2Kana } else { InputStyle::Direct };
    let mut text = ComposingText::new();
    text.insert_at_cursor_position(input, style);
    tracing::debug!("converting {:?} ({} keystrokes)", text.convert_target(), text.input().len());

    let result = converter.request_candidates(&text, &options);
    let candidates = |list: &[kanakanji_core::Candidate]| -> Vec<serde_json::Value> {
        list.iter()
            .map(|c| serde_json::json!({ "text": c.text, "ruby": c.ruby(), "value": c.value }))
            .collect()
    };
    let out = serde_json::json!({
        "convert_target": text.convert_target(),
        "main": candidates(&result.main_results),
        "first_clause": candidates(&result.first_clause_results),
        "prediction": candidates(&result.prediction_results),
    });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}
