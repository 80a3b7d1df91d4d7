use anyhow::Result;
use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use compass::config::OutputFormat;
use compass::runner::index_project;
use compass::utils::cache::FileCache;
use compass::{CompassConfig, run};
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliOutputFormat {
    Text,
    Json,
}

impl From<CliOutputFormat> for OutputFormat {
    fn from(f: CliOutputFormat) -> Self {
        match f {
            CliOutputFormat::Text => OutputFormat::Text,
            CliOutputFormat::Json => OutputFormat::Json,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Ranked symbol maps of Python repositories",
    long_about = None,
    after_help = r#"Examples:
  compass map . --max-tokens 2048
  compass deps app/models.py --reverse
  compass rank --top 10
  compass find UserService"#
)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Verbose output (progress and debug logs)
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Options shared by every command that scans a project.
#[derive(ClapArgs, Debug, Default)]
struct ScanArgs {
    /// Add ignore pattern (glob)
    #[arg(long)]
    ignore: Vec<String>,

    /// Extra import root, e.g. "src" (repeatable)
    #[arg(long = "source-root")]
    source_roots: Vec<String>,

    /// Maximum file size in bytes (skip larger files)
    #[arg(long)]
    max_size: Option<u64>,

    /// Worker threads for extraction
    #[arg(long)]
    threads: Option<usize>,

    /// Ignore and do not update the on-disk cache
    #[arg(long)]
    no_cache: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the ranked symbol map
    Map {
        /// Project directory
        path: Option<PathBuf>,

        /// Output format
        #[arg(short, long, value_enum)]
        format: Option<CliOutputFormat>,

        /// Token budget for the map
        #[arg(long)]
        max_tokens: Option<usize>,

        /// Maximum number of files in the map
        #[arg(long)]
        max_files: Option<usize>,

        /// Maximum number of symbols listed per file
        #[arg(long)]
        max_symbols: Option<usize>,

        /// Output file path
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        scan: ScanArgs,
    },
    /// Index the project and print per-file outcomes as JSON
    Index {
        path: Option<PathBuf>,

        #[command(flatten)]
        scan: ScanArgs,
    },
    /// List the project files a file imports (or, with --reverse, is imported by)
    Deps {
        file: String,

        #[arg(long)]
        root: Option<PathBuf>,

        #[arg(long)]
        reverse: bool,

        #[command(flatten)]
        scan: ScanArgs,
    },
    /// Print files by importance
    Rank {
        path: Option<PathBuf>,

        #[arg(long)]
        top: Option<usize>,

        #[command(flatten)]
        scan: ScanArgs,
    },
    /// Look up symbols in the cache
    Find {
        name: String,

        #[arg(long)]
        root: Option<PathBuf>,

        /// Case-insensitive substring match instead of an exact name
        #[arg(long)]
        search: bool,
    },
    /// Show cache statistics
    Stats {
        #[arg(long)]
        root: Option<PathBuf>,

        /// Also list every cached file with its symbol count
        #[arg(long)]
        files: bool,
    },
    /// Remove every cached record
    Clear {
        #[arg(long)]
        root: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    // 1. Load from file or default
    let mut config = CompassConfig::load_from_file().unwrap_or_default();
    if args.verbose {
        config.verbose = true;
    }

    // 2. Override with CLI args, then dispatch
    match args.command {
        Command::Map {
            path,
            format,
            max_tokens,
            max_files,
            max_symbols,
            output,
            scan,
        } => {
            apply_scan_args(&mut config, path, scan);
            if let Some(f) = format {
                config.output.output_format = f.into();
            }
            if max_tokens.is_some() {
                config.output.max_tokens = max_tokens;
            }
            if max_files.is_some() {
                config.output.max_files = max_files;
            }
            if max_symbols.is_some() {
                config.output.max_symbols_per_file = max_symbols;
            }
            if output.is_some() {
                config.output.output = output;
            }
            config.validate()?;
            run(config)?;
        }
        Command::Index { path, scan } => {
            apply_scan_args(&mut config, path, scan);
            config.validate()?;
            let report = index_project(&config, None)?;
            let summary = serde_json::json!({
                "summary": report.summary(),
                "outcomes": report.outcomes,
                "iterations": report.ranking.iterations,
                "converged": report.ranking.converged,
            });
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Command::Deps {
            file,
            root,
            reverse,
            scan,
        } => {
            apply_scan_args(&mut config, root, scan);
            config.validate()?;
            let key = file_key(&config.scan.path, &file);
            let report = index_project(&config, None)?;
            if !report.graph.has_node(&key) {
                anyhow::bail!("{} is not an indexed Python file", key);
            }
            let related = if reverse {
                report.graph.dependents(&key)
            } else {
                report.graph.dependencies(&key)
            };
            for path in related {
                println!("{}", path);
            }
        }
        Command::Rank { path, top, scan } => {
            apply_scan_args(&mut config, path, scan);
            config.validate()?;
            let report = index_project(&config, None)?;
            let ordered = report.ranking.ordered();
            let limit = top.unwrap_or(ordered.len());
            for (path, score) in ordered.into_iter().take(limit) {
                println!("{:.6}  {}", score, path);
            }
        }
        Command::Find { name, root, search } => {
            let cache = open_cache(&mut config, root)?;
            let hits = if search {
                cache.search_symbols(&name)
            } else {
                cache.find_symbol(&name)
            };
            if hits.is_empty() {
                eprintln!("No symbols matching {:?}", name);
            }
            for hit in hits {
                println!(
                    "{}:{}  {}",
                    hit.path, hit.symbol.line_start, hit.symbol.signature
                );
            }
        }
        Command::Stats { root, files } => {
            let cache = open_cache(&mut config, root)?;
            println!("{}", serde_json::to_string_pretty(&cache.stats())?);
            if files {
                for file in cache.all() {
                    println!("{:>4}  {}", file.symbols.len(), file.path);
                }
            }
        }
        Command::Clear { root } => {
            let cache = open_cache(&mut config, root)?;
            let removed = cache.len();
            cache.clear();
            cache.save()?;
            println!("Removed {} cached files", removed);
        }
    }

    Ok(())
}

fn apply_scan_args(config: &mut CompassConfig, path: Option<PathBuf>, scan: ScanArgs) {
    if let Some(p) = path {
        config.scan.path = p;
    }
    if !scan.ignore.is_empty() {
        // CLI ignores ADD to config ignores
        config.scan.ignore_patterns.extend(scan.ignore);
    }
    if !scan.source_roots.is_empty() {
        config.scan.source_roots.extend(scan.source_roots);
    }
    if let Some(s) = scan.max_size {
        config.scan.max_file_size = Some(s);
    }
    if let Some(t) = scan.threads {
        config.scan.threads = Some(t);
    }
    if scan.no_cache {
        config.cache.use_cache = false;
    }
}

fn open_cache(config: &mut CompassConfig, root: Option<PathBuf>) -> Result<FileCache> {
    if let Some(r) = root {
        config.scan.path = r;
    }
    config.validate()?;
    Ok(FileCache::load(&config.cache_dir()))
}

/// Project-relative key for a file given on the command line.
fn file_key(root: &Path, file: &str) -> String {
    let candidate = Path::new(file);
    let resolved = match (root.canonicalize(), candidate.canonicalize()) {
        (Ok(root), Ok(path)) => compass::fs::relative_key(&root, &path),
        _ => None,
    };
    resolved.unwrap_or_else(|| {
        file.replace('\\', "/")
            .trim_start_matches("./")
            .to_string()
    })
}
