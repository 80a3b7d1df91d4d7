use compass::config::{OutputFormat, ScanConfig};
use compass::{
    AnalysisOptions, CompassConfig, Extraction, FileOutcome, PythonExtractor, analyze_sources,
    index_project, run,
};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write(root: &Path, rel: &str, content: &str) -> anyhow::Result<()> {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, content)?;
    Ok(())
}

fn config_for(root: &Path) -> CompassConfig {
    CompassConfig {
        scan: ScanConfig {
            path: root.to_path_buf(),
            ..ScanConfig::default()
        },
        ..CompassConfig::default()
    }
}

#[test]
fn test_relative_imports_in_a_package() -> anyhow::Result<()> {
    let sources = vec![
        ("app/__init__.py", ""),
        (
            "app/main.py",
            "from . import utils\nfrom .utils import helper\n\ndef run():\n    helper()\n",
        ),
        ("app/utils.py", "def helper(): pass\n"),
    ];
    let report = analyze_sources(&sources, &AnalysisOptions::default())?;

    assert_eq!(report.graph.dependencies("app/main.py"), vec!["app/utils.py"]);
    assert_eq!(report.graph.edge_count(), 1);

    let utils = report.ranking.score("app/utils.py").unwrap();
    for path in ["app/__init__.py", "app/main.py"] {
        assert!(report.graph.dependents(path).is_empty());
        assert!(utils > report.ranking.score(path).unwrap());
    }
    Ok(())
}

#[test]
fn test_import_cycle_ranks_evenly() -> anyhow::Result<()> {
    let sources = vec![
        ("a.py", "import b\n"),
        ("b.py", "import c\n"),
        ("c.py", "import a\n"),
    ];
    let report = analyze_sources(&sources, &AnalysisOptions::default())?;

    assert_eq!(report.graph.edge_count(), 3);
    assert!(report.ranking.converged);
    assert!(report.ranking.iterations <= 100);
    for score in report.ranking.scores.values() {
        assert!(*score > 0.0);
        assert!((score - 1.0 / 3.0).abs() < 1e-6);
    }
    Ok(())
}

#[test]
fn test_external_imports_add_no_edges() -> anyhow::Result<()> {
    let sources = vec![
        ("model.py", "from numpy import array\nimport os\n\ndef build():\n    pass\n"),
        ("other.py", "def other():\n    pass\n"),
    ];
    let report = analyze_sources(&sources, &AnalysisOptions::default())?;

    let model = report.file("model.py").unwrap();
    assert_eq!(model.imports.len(), 2);
    assert_eq!(model.imports[0].raw_module, "numpy");
    assert!(model.imports[0].imported_names.contains("array"));
    assert_eq!(report.graph.edge_count(), 0);
    assert_eq!(report.graph.node_count(), 2);
    Ok(())
}

#[test]
fn test_broken_file_does_not_stop_the_batch() -> anyhow::Result<()> {
    let extractor = PythonExtractor::new()?;
    let broken = extractor.extract("broken.py", "def broken(\n");
    assert!(matches!(broken, Extraction::Failed { .. }));
    assert!(broken.file().symbols.is_empty());

    let sources = vec![
        ("broken.py", "def broken(\n"),
        ("good.py", "import broken\n\ndef fine():\n    pass\n"),
    ];
    let report = analyze_sources(&sources, &AnalysisOptions::default())?;

    assert_eq!(report.files.len(), 2);
    assert_eq!(report.failed_count(), 1);
    assert!(matches!(
        report.outcomes[0],
        FileOutcome::Failed { ref path, .. } if path == "broken.py"
    ));
    assert_eq!(report.file("good.py").unwrap().symbols.len(), 1);
    // The broken file still exists, so importing it is still an edge.
    assert_eq!(report.graph.dependencies("good.py"), vec!["broken.py"]);
    Ok(())
}

const SAMPLE_MODULE: &str = r#""""Order handling."""
from __future__ import annotations

import os
from typing import Dict, List, Optional

from .models import Order, Customer  # café


@dataclass
class OrderService(BaseService):
    def __init__(self, repo: Repository, limit: int = 10) -> None:
        self.repo = repo

    async def find(self, ids: List[int]) -> Dict[str, Optional[Order]]:
        if not ids:
            return {}
        return {str(i): self.repo.get(i) for i in ids}


def total(orders: List[Order], *, tax: float = 0.2) -> float:
    return sum(o.amount for o in orders) * (1 + tax)
"#;

fn assert_consistent(name: &str, result: &Extraction) {
    let file = result.file();
    if result.is_parsed() {
        for symbol in &file.symbols {
            assert!(symbol.line_end >= symbol.line_start, "{name}: bad span");
            assert!(!symbol.signature.is_empty(), "{name}: empty signature");
        }
    } else {
        assert!(file.symbols.is_empty(), "{name}: failed but has symbols");
        assert!(file.imports.is_empty(), "{name}: failed but has imports");
    }
}

#[test]
fn test_truncated_and_garbled_inputs_never_panic() -> anyhow::Result<()> {
    let extractor = PythonExtractor::new()?;
    let bytes = SAMPLE_MODULE.as_bytes();

    let full = extractor.extract_bytes("sample.py", bytes);
    assert!(full.is_parsed());
    assert_eq!(full.file().symbols.len(), 4);

    // Every byte prefix, including cuts inside the multi-byte character.
    for end in 0..bytes.len() {
        let result = extractor.extract_bytes("prefix.py", &bytes[..end]);
        assert_consistent(&format!("prefix {end}"), &result);
    }

    // One byte at a time replaced by a character that unbalances the source.
    for (i, garble) in (0..bytes.len()).zip([b'(', b':', b'"', b'\t', b'@'].into_iter().cycle()) {
        let mut garbled = bytes.to_vec();
        garbled[i] = garble;
        let result = extractor.extract_bytes("garbled.py", &garbled);
        assert_consistent(&format!("garble {i}"), &result);
    }
    Ok(())
}

#[test]
fn test_deeply_nested_inputs() -> anyhow::Result<()> {
    let extractor = PythonExtractor::new()?;

    let parens = format!("x = {}1{}\n", "(".repeat(500), ")".repeat(500));
    let result = extractor.extract("parens.py", &parens);
    assert!(result.is_parsed());
    assert!(result.file().symbols.is_empty());

    let mut nested = String::new();
    for level in 0..40 {
        nested.push_str(&"    ".repeat(level));
        nested.push_str("if True:\n");
    }
    nested.push_str(&"    ".repeat(40));
    nested.push_str("def deep():\n");
    nested.push_str(&"    ".repeat(41));
    nested.push_str("pass\n");
    let result = extractor.extract("nested.py", &nested);
    assert!(result.is_parsed());
    let symbols = &result.file().symbols;
    assert_eq!(symbols.len(), 1);
    assert_eq!(symbols[0].name, "deep");
    assert_eq!(symbols[0].line_start, 41);
    Ok(())
}

#[test]
fn test_from_package_import_links_package_and_submodule() -> anyhow::Result<()> {
    let sources = vec![
        ("x/__init__.py", ""),
        ("x/a.py", "from x import b\n"),
        ("x/b.py", "def b():\n    pass\n"),
    ];
    let report = analyze_sources(&sources, &AnalysisOptions::default())?;
    assert_eq!(
        report.graph.dependencies("x/a.py"),
        vec!["x/__init__.py", "x/b.py"]
    );
    Ok(())
}

#[test]
fn test_index_is_deterministic() -> anyhow::Result<()> {
    let temp = TempDir::new()?;
    let root = temp.path();
    write(root, "pkg/__init__.py", "from .core import Engine\n")?;
    write(root, "pkg/core.py", "class Engine:\n    def run(self):\n        pass\n")?;
    write(root, "pkg/cli.py", "from pkg.core import Engine\nimport pkg\n")?;
    write(root, "tools/lint.py", "import pkg.cli\n")?;

    let mut config = config_for(root);
    config.cache.use_cache = false;

    let first = index_project(&config, None)?;
    let second = index_project(&config, None)?;
    assert_eq!(first.graph, second.graph);
    assert_eq!(first.ranking, second.ranking);
    assert!((first.ranking.total() - 1.0).abs() < 1e-6);
    assert_eq!(first.ranking.ordered()[0].0, "pkg/core.py");
    Ok(())
}

#[test]
fn test_cache_reuse_across_runs() -> anyhow::Result<()> {
    let temp = TempDir::new()?;
    let root = temp.path();
    write(root, "a.py", "import b\n\ndef a():\n    pass\n")?;
    write(root, "b.py", "def b():\n    pass\n")?;

    let config = config_for(root);
    let first = index_project(&config, None)?;
    assert_eq!(first.cached_count(), 0);
    assert!(root.join(".compass").join("index.json").exists());

    write(root, "b.py", "def b_changed():\n    pass\n")?;
    let second = index_project(&config, None)?;
    assert!(matches!(second.outcomes[0], FileOutcome::Cached { .. }));
    assert!(matches!(second.outcomes[1], FileOutcome::Extracted { .. }));
    assert_eq!(second.file("b.py").unwrap().symbols[0].name, "b_changed");
    assert_eq!(first.graph, second.graph);
    Ok(())
}

#[test]
fn test_end_to_end_map() -> anyhow::Result<()> {
    let temp = TempDir::new()?;
    let root = temp.path();
    write(root, "app/__init__.py", "")?;
    write(
        root,
        "app/models.py",
        "class User:\n    def save(self) -> None:\n        pass\n",
    )?;
    write(root, "app/views.py", "from .models import User\n\ndef index(request):\n    pass\n")?;
    write(root, "broken.py", "def broken(\n")?;
    write(root, "venv/lib.py", "def hidden():\n    pass\n")?;

    let output_path = root.join("map.txt");
    let mut config = config_for(root);
    config.output.output = Some(output_path.clone());
    config.verbose = true;
    run(config.clone())?;

    let content = fs::read_to_string(&output_path)?;
    assert!(content.starts_with("app/models.py (importance: "));
    assert!(content.contains("⋮..."));
    assert!(content.contains("│class User:"));
    assert!(content.contains("│ def save(self) -> None:"));
    assert!(content.contains("│def index(request):"));
    assert!(!content.contains("hidden"));
    assert!(!content.contains("broken"));

    let json_path = root.join("map.json");
    config.output.output = Some(json_path.clone());
    config.output.output_format = OutputFormat::Json;
    run(config)?;

    let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(&json_path)?)?;
    assert_eq!(json["files"][0], "app/models.py");
    assert_eq!(json["failed"][0]["path"], "broken.py");
    assert!(json["token_count"].as_u64().unwrap() > 0);
    Ok(())
}
