use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use likeness_core::{CosineMatcher, Embedding, MatchResult, Matcher, MismatchPolicy};
use likeness_engine::{Config, Gallery};
use likeness_store::JsonFileStore;
use serde::Deserialize;

#[derive(Parser)]
#[command(name = "likeness", about = "Face embedding enrollment and identification")]
struct Cli {
    /// TOML config file (LIKENESS_* variables still override it)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Enroll a face embedding under a name
    Enroll {
        /// Person's name; enrolling a name again adds another record
        #[arg(short, long)]
        name: String,
        /// JSON file holding the embedding
        #[arg(short, long)]
        embedding: PathBuf,
    },
    /// Identify a face embedding against the gallery
    Identify {
        /// JSON file holding the query embedding
        #[arg(short, long)]
        embedding: PathBuf,
        /// Acceptance threshold, overriding the config
        #[arg(short, long, allow_negative_numbers = true)]
        threshold: Option<f32>,
        /// Skip gallery records of a different dimension instead of failing
        #[arg(long)]
        skip_mismatched: bool,
    },
    /// List enrolled faces
    List {
        /// Only show records with this name
        #[arg(short, long)]
        name: Option<String>,
    },
    /// Remove an enrolled face by record ID
    Remove {
        /// Record ID to remove
        id: String,
    },
    /// Remove every enrolled face
    Clear,
    /// Print the effective configuration
    Config,
}

/// Embedding file contents: a bare array or `{ "values": [...], ... }`.
#[derive(Deserialize)]
#[serde(untagged)]
enum EmbeddingFile {
    Bare(Vec<f32>),
    Full(Embedding),
}

impl From<EmbeddingFile> for Embedding {
    fn from(file: EmbeddingFile) -> Self {
        match file {
            EmbeddingFile::Bare(values) => Embedding::new(values),
            EmbeddingFile::Full(embedding) => embedding,
        }
    }
}

fn parse_embedding(text: &str) -> Result<Embedding> {
    let file: EmbeddingFile =
        serde_json::from_str(text).context("expected a JSON array or {\"values\": [...]}")?;
    Ok(Embedding::from(file))
}

fn read_embedding(path: &Path) -> Result<Embedding> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading embedding {}", path.display()))?;
    parse_embedding(&text).with_context(|| format!("parsing embedding {}", path.display()))
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    let config = match path {
        Some(path) => Config::load(path)?,
        None => Config::from_env()?,
    };
    Ok(config)
}

fn open_gallery(config: &Config) -> Result<Gallery> {
    Gallery::open(JsonFileStore::new(&config.store_path), config.expected_dimension)
        .with_context(|| format!("opening gallery {}", config.store_path.display()))
}

fn format_score(result: &MatchResult) -> String {
    if result.has_score() {
        format!("{:.1}%", result.score * 100.0)
    } else {
        "n/a".to_string()
    }
}

fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    tracing::debug!(
        store = %config.store_path.display(),
        threshold = config.similarity_threshold,
        policy = ?config.mismatch_policy,
        "config loaded"
    );

    match cli.command {
        Commands::Enroll { name, embedding } => {
            let embedding = read_embedding(&embedding)?;
            let gallery = open_gallery(&config)?;
            let record = gallery.enroll(&name, embedding)?;
            println!("Enrolled {} ({} dims) as {}", record.name, record.embedding.len(), record.id);
        }
        Commands::Identify {
            embedding,
            threshold,
            skip_mismatched,
        } => {
            let query = read_embedding(&embedding)?;
            let gallery = open_gallery(&config)?;
            let policy = if skip_mismatched {
                MismatchPolicy::Skip
            } else {
                config.mismatch_policy
            };
            let threshold = threshold.unwrap_or(config.similarity_threshold);

            let result = CosineMatcher::new(policy).compare(&query, &gallery.snapshot(), threshold)?;
            if result.skipped > 0 {
                println!("Skipped {} record(s) with a different dimension", result.skipped);
            }
            match &result.name {
                Some(name) if result.accepted => {
                    println!("Match: {name} (similarity {})", format_score(&result));
                }
                _ => {
                    println!("No match (best similarity {})", format_score(&result));
                    return Ok(ExitCode::FAILURE);
                }
            }
        }
        Commands::List { name } => {
            let gallery = open_gallery(&config)?;
            let records = match name {
                Some(name) => gallery.records_named(&name),
                None => gallery.snapshot().to_vec(),
            };
            if records.is_empty() {
                println!("No faces enrolled");
            }
            for r in records {
                println!(
                    "{}  {:<20} {:>4} dims  {}",
                    r.id,
                    r.name,
                    r.embedding.len(),
                    r.created_at.to_rfc3339()
                );
            }
        }
        Commands::Remove { id } => {
            let gallery = open_gallery(&config)?;
            if gallery.remove(&id)? {
                println!("Removed {id}");
            } else {
                println!("No record with ID {id}");
                return Ok(ExitCode::FAILURE);
            }
        }
        Commands::Clear => {
            let gallery = open_gallery(&config)?;
            let removed = gallery.clear()?;
            println!("Removed {removed} record(s)");
        }
        Commands::Config => {
            print!("{}", toml::to_string_pretty(&config)?);
        }
    }

    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_bare_array() {
        let e = parse_embedding("[0.25, -1, 3.5]").unwrap();
        assert_eq!(e.values, vec![0.25, -1.0, 3.5]);
        assert!(e.model_version.is_none());
    }

    #[test]
    fn test_parse_object_with_model_version() {
        let e = parse_embedding(r#"{"values": [1, 2], "model_version": "ghostfacenet"}"#).unwrap();
        assert_eq!(e.values, vec![1.0, 2.0]);
        assert_eq!(e.model_version.as_deref(), Some("ghostfacenet"));
    }

    #[test]
    fn test_parse_rejects_other_shapes() {
        assert!(parse_embedding(r#"{"embedding": [1, 2]}"#).is_err());
        assert!(parse_embedding("\"face\"").is_err());
    }

    #[test]
    fn test_identify_accepts_negative_threshold() {
        let cli = Cli::try_parse_from([
            "likeness",
            "identify",
            "--embedding",
            "q.json",
            "--threshold",
            "-0.2",
        ])
        .unwrap();
        let Commands::Identify { threshold, .. } = cli.command else {
            panic!("expected identify");
        };
        assert_eq!(threshold, Some(-0.2));
    }

    #[test]
    fn test_format_score() {
        let mut result = MatchResult::no_match();
        assert_eq!(format_score(&result), "n/a");
        result.score = 0.912;
        assert_eq!(format_score(&result), "91.2%");
    }

    #[test]
    fn test_out_of_range_values_rejected_by_gallery_and_matcher() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            store_path: dir.path().join("gallery.json"),
            ..Config::default()
        };
        // Too large for f32, so it parses as infinity.
        let overflow = parse_embedding("[1e39, 0]").unwrap();
        assert!(overflow.values[0].is_infinite());

        let gallery = open_gallery(&config).unwrap();
        assert!(gallery.enroll("Alice", overflow.clone()).is_err());
        gallery.enroll("Alice", parse_embedding("[1, 0]").unwrap()).unwrap();
        drop(gallery);

        let gallery = open_gallery(&config).unwrap();
        assert_eq!(gallery.len(), 1);
        assert!(config
            .matcher()
            .compare(&overflow, &gallery.snapshot(), config.similarity_threshold)
            .is_err());
    }

    #[test]
    fn test_enroll_and_identify_against_file_gallery() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            store_path: dir.path().join("gallery.json"),
            ..Config::default()
        };

        let gallery = open_gallery(&config).unwrap();
        gallery
            .enroll("Alice", parse_embedding("[1, 0, 0]").unwrap())
            .unwrap();
        drop(gallery);

        let query = parse_embedding("[0.9, 0.1, 0]").unwrap();
        let result = config
            .matcher()
            .compare(&query, &open_gallery(&config).unwrap().snapshot(), config.similarity_threshold)
            .unwrap();
        assert!(result.accepted);
        assert_eq!(result.name.as_deref(), Some("Alice"));
    }
}
