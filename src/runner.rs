use crate::config::CompassConfig;
use crate::core::scanner::notify;
use crate::core::{
    DiscoveredFile, Extraction, FileOutcome, ScanEvent, SourceFile, content_hash, discover_files,
};
use crate::format::{MapLimits, RepoMap};
use crate::utils::analysis::{
    DependencyGraph, ModuleResolver, PageRank, PythonExtractor, Ranking, build_dependency_graph,
};
use crate::utils::cache::FileCache;
use anyhow::{Context, Result};
use crossbeam_channel::Sender;
use rayon::prelude::*;
use serde::Serialize;
use std::path::PathBuf;

/// Knobs for the graph and ranking stages.
#[derive(Debug, Clone, Default)]
pub struct AnalysisOptions {
    pub ranking: PageRank,
    /// Extra import roots, e.g. "src"
    pub source_roots: Vec<String>,
}

impl AnalysisOptions {
    pub fn from_config(config: &CompassConfig) -> Self {
        Self {
            ranking: config.ranking,
            source_roots: config.scan.source_roots.clone(),
        }
    }
}

/// Everything one batch run produces.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IndexReport {
    /// One record per file, ordered by path. Failed files are present
    /// with no symbols and no imports.
    pub files: Vec<SourceFile>,
    /// Per-file status, same order as `files`
    pub outcomes: Vec<FileOutcome>,
    pub graph: DependencyGraph,
    pub ranking: Ranking,
}

impl IndexReport {
    pub fn file(&self, path: &str) -> Option<&SourceFile> {
        self.files
            .binary_search_by(|f| f.path.as_str().cmp(path))
            .ok()
            .map(|i| &self.files[i])
    }

    pub fn failed(&self) -> impl Iterator<Item = &FileOutcome> {
        self.outcomes.iter().filter(|o| o.is_failed())
    }

    pub fn failed_count(&self) -> usize {
        self.failed().count()
    }

    pub fn cached_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, FileOutcome::Cached { .. }))
            .count()
    }

    pub fn summary(&self) -> String {
        format!(
            "Indexed {} files ({} cached, {} failed), {} import edges",
            self.files.len(),
            self.cached_count(),
            self.failed_count(),
            self.graph.edge_count()
        )
    }
}

/// Runs the full pipeline over in-memory `(path, source)` pairs.
pub fn analyze_sources<P, S>(sources: &[(P, S)], options: &AnalysisOptions) -> Result<IndexReport>
where
    P: AsRef<str> + Sync,
    S: AsRef<str> + Sync,
{
    let extractor = PythonExtractor::new()?;
    let records: Vec<(SourceFile, FileOutcome)> = sources
        .par_iter()
        .map(|(path, source)| outcome(extractor.extract(path.as_ref(), source.as_ref())))
        .collect();
    Ok(assemble(records, options))
}

/// Indexes the project at `config.scan.path`, reusing cached records whose
/// content hash still matches.
pub fn index_project(
    config: &CompassConfig,
    tx: Option<Sender<ScanEvent>>,
) -> Result<IndexReport> {
    let (root, discovered) = discover_files(config, &tx)?;

    let cache = if config.cache.use_cache {
        FileCache::load(&config.cache_dir())
    } else {
        FileCache::in_memory()
    };
    let extractor = PythonExtractor::new()?;

    let extract_all = || -> Vec<(SourceFile, FileOutcome)> {
        discovered
            .par_iter()
            .map(|file| process_file(file, &extractor, &cache, &tx))
            .collect()
    };

    let records = match config.scan.threads {
        Some(threads) => rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .context("Failed to build extraction thread pool")?
            .install(extract_all),
        None => extract_all(),
    };

    if config.cache.use_cache {
        let keep: Vec<String> = discovered.iter().map(|f| f.path.clone()).collect();
        let stale = cache.retain_paths(&keep);
        if stale > 0 {
            tracing::debug!(stale, "dropped cache records for deleted files");
        }
        if let Err(e) = cache.save() {
            tracing::warn!("Failed to save cache: {:#}", e);
        }
    }

    let report = assemble(records, &AnalysisOptions::from_config(config));
    tracing::info!(root = %root.display(), "{}", report.summary());
    Ok(report)
}

fn process_file(
    file: &DiscoveredFile,
    extractor: &PythonExtractor,
    cache: &FileCache,
    tx: &Option<Sender<ScanEvent>>,
) -> (SourceFile, FileOutcome) {
    let bytes = match std::fs::read(&file.absolute) {
        Ok(bytes) => bytes,
        Err(e) => {
            let error = format!("read failed: {}", e);
            notify(tx, ScanEvent::FileFailed(file.absolute.clone(), error.clone()));
            return (
                SourceFile::empty(file.path.as_str(), b""),
                FileOutcome::Failed {
                    path: file.path.clone(),
                    error,
                },
            );
        }
    };

    let hash = content_hash(&bytes);
    if cache.is_cached(&file.path, &hash)
        && let Some(cached) = cache.get(&file.path)
    {
        notify(tx, ScanEvent::FileProcessed(file.absolute.clone()));
        return (
            cached,
            FileOutcome::Cached {
                path: file.path.clone(),
            },
        );
    }

    let extraction = extractor.extract_bytes(&file.path, &bytes);
    match &extraction {
        Extraction::Parsed(parsed) => {
            cache.store(parsed.clone());
            notify(tx, ScanEvent::FileProcessed(file.absolute.clone()));
        }
        Extraction::Failed { error, .. } => {
            cache.remove(&file.path);
            notify(tx, ScanEvent::FileFailed(file.absolute.clone(), error.to_string()));
        }
    }
    outcome(extraction)
}

fn outcome(extraction: Extraction) -> (SourceFile, FileOutcome) {
    match extraction {
        Extraction::Parsed(file) => {
            let path = file.path.clone();
            (file, FileOutcome::Extracted { path })
        }
        Extraction::Failed { file, error } => {
            tracing::debug!(path = %file.path, %error, "extraction failed");
            let failed = FileOutcome::Failed {
                path: file.path.clone(),
                error: error.to_string(),
            };
            (file, failed)
        }
    }
}

/// Barrier stage: every extraction is done, so the resolver sees the
/// whole file set before any edge is drawn.
fn assemble(mut records: Vec<(SourceFile, FileOutcome)>, options: &AnalysisOptions) -> IndexReport {
    records.sort_by(|(a, _), (b, _)| a.path.cmp(&b.path));
    records.dedup_by(|(later, _), (earlier, _)| {
        let duplicate = later.path == earlier.path;
        if duplicate {
            tracing::warn!(path = %later.path, "duplicate path, keeping the first record");
        }
        duplicate
    });

    let (files, outcomes): (Vec<SourceFile>, Vec<FileOutcome>) = records.into_iter().unzip();
    let resolver = ModuleResolver::from_files(&files, &options.source_roots);
    let graph = build_dependency_graph(&files, &resolver);
    let ranking = options.ranking.rank(&graph);

    IndexReport {
        files,
        outcomes,
        graph,
        ranking,
    }
}

/// Main entry point for compass in CLI mode.
///
/// Indexing runs on a background thread while progress events are consumed
/// here and printed to stderr if `verbose` is enabled. The rendered map goes
/// to the configured output file, or stdout. A failure is returned once,
/// after the worker has finished; it is never reported as an event.
pub fn run(config: CompassConfig) -> Result<()> {
    let (tx, rx) = crossbeam_channel::unbounded();

    let config_clone = config.clone();
    let handle = std::thread::spawn(move || map_project(&config_clone, Some(tx)));

    for event in rx {
        match event {
            ScanEvent::StartScanning => {
                if config.verbose {
                    eprintln!("Scanning started...")
                }
            }
            ScanEvent::FilesFound(n) => {
                if config.verbose {
                    eprintln!("Found {} Python files.", n)
                }
            }
            ScanEvent::FileProcessed(p) => {
                if config.verbose {
                    eprintln!("Processed: {:?}", p)
                }
            }
            ScanEvent::FileFailed(p, reason) => {
                if config.verbose {
                    eprintln!("Skipped: {:?} ({})", p, reason)
                }
            }
            ScanEvent::Complete(msg) => {
                if config.verbose {
                    eprintln!("{}", msg)
                }
            }
        }
    }

    match handle.join() {
        Ok(result) => result,
        Err(_) => anyhow::bail!("indexing thread panicked"),
    }
}

fn map_project(config: &CompassConfig, tx: Option<Sender<ScanEvent>>) -> Result<()> {
    let report = index_project(config, tx.clone())?;
    let map = RepoMap::build(&report, &MapLimits::from_config(config));
    let rendered = map.render(config.output.output_format)?;

    let destination = write_output(config.output.output.as_ref(), &rendered)?;
    notify(
        &tx,
        ScanEvent::Complete(format!(
            "{}; map of {} files, {} tokens{}",
            report.summary(),
            map.files.len(),
            map.token_count,
            destination
                .map(|p| format!(" written to {}", p.display()))
                .unwrap_or_default()
        )),
    );
    Ok(())
}

fn write_output(output: Option<&PathBuf>, rendered: &str) -> Result<Option<PathBuf>> {
    match output {
        Some(path) => {
            std::fs::write(path, rendered)
                .with_context(|| format!("Failed to write output {}", path.display()))?;
            Ok(Some(path.clone()))
        }
        None => {
            print!("{}", rendered);
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analyze_sources_orders_and_links() -> Result<()> {
        let sources = vec![
            ("b.py", "import a\n"),
            ("a.py", "def f():\n    pass\n"),
            ("broken.py", "def broken(\n"),
        ];
        let report = analyze_sources(&sources, &AnalysisOptions::default())?;

        let paths: Vec<&str> = report.files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["a.py", "b.py", "broken.py"]);
        assert_eq!(report.graph.dependencies("b.py"), vec!["a.py"]);
        assert_eq!(report.failed_count(), 1);
        assert!(report.file("broken.py").is_some_and(|f| f.symbols.is_empty()));
        assert_eq!(report.ranking.len(), 3);
        Ok(())
    }

    #[test]
    fn test_duplicate_paths_keep_one_record() -> Result<()> {
        let sources = vec![("a.py", "def first():\n    pass\n"), ("a.py", "x = 1\n")];
        let report = analyze_sources(&sources, &AnalysisOptions::default())?;
        assert_eq!(report.files.len(), 1);
        assert_eq!(report.outcomes.len(), 1);
        assert_eq!(report.graph.node_count(), 1);
        Ok(())
    }

    #[test]
    fn test_run_returns_failure_without_error_event() {
        let temp = tempfile::TempDir::new().unwrap();
        std::fs::write(temp.path().join("a.py"), "def a():\n    pass\n").unwrap();

        let mut config = CompassConfig::default();
        config.scan.path = temp.path().to_path_buf();
        config.cache.use_cache = false;
        config.output.output = Some(temp.path().join("missing").join("map.txt"));

        let err = run(config.clone()).unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to write output"));

        // The worker's channel carries progress only; the failure comes
        // back from the join, once.
        let (tx, rx) = crossbeam_channel::unbounded();
        assert!(map_project(&config, Some(tx)).is_err());
        let events: Vec<ScanEvent> = rx.try_iter().collect();
        assert!(matches!(events.first(), Some(ScanEvent::StartScanning)));
        assert!(
            !events
                .iter()
                .any(|e| matches!(e, ScanEvent::Complete(_)))
        );
    }

    #[test]
    fn test_empty_input() -> Result<()> {
        let sources: Vec<(&str, &str)> = Vec::new();
        let report = analyze_sources(&sources, &AnalysisOptions::default())?;
        assert!(report.files.is_empty());
        assert!(report.ranking.is_empty());
        Ok(())
    }
}
