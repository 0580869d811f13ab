//! The concept catalog: which concepts exist, their prerequisites and which
//! concepts each level requires.
//!
//! Catalogs are loaded once from TOML and never mutated afterwards; the
//! engine shares them behind an `Arc`.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::config::ConfigWarning;
use crate::model::ConceptId;

/// Read-only view of the concept registry.
pub trait ConceptCatalog: Send + Sync {
    /// Whether attempts on this concept are accepted.
    fn contains(&self, concept: &str) -> bool;

    /// Concepts that must be mastered before advancing to `level`.
    fn required_concepts(&self, level: u32) -> BTreeSet<ConceptId>;

    /// Direct prerequisites of a concept.
    fn prerequisites(&self, concept: &str) -> Vec<ConceptId>;

    /// Terms a relevant justification for this concept should mention.
    fn key_terms(&self, _concept: &str) -> Vec<String> {
        Vec::new()
    }

    /// Display name, if the catalog has one.
    fn name(&self, _concept: &str) -> Option<String> {
        None
    }
}

/// A concept entry in the catalog file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConceptDef {
    pub id: ConceptId,
    #[serde(default)]
    pub name: Option<String>,
    /// Level this concept belongs to.
    #[serde(default = "default_level")]
    pub level: u32,
    #[serde(default)]
    pub prerequisites: Vec<ConceptId>,
    #[serde(default)]
    pub key_terms: Vec<String>,
}

fn default_level() -> u32 {
    1
}

/// Explicit required-concept list for a level.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LevelDef {
    pub level: u32,
    #[serde(default)]
    pub required_concepts: Vec<ConceptId>,
}

/// On-disk catalog layout.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogFile {
    #[serde(default)]
    pub concepts: Vec<ConceptDef>,
    #[serde(default)]
    pub levels: Vec<LevelDef>,
}

/// Immutable in-memory catalog.
///
/// A level's required concepts come from its `[[levels]]` entry when one
/// exists, otherwise from every concept declared at that level.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    concepts: BTreeMap<ConceptId, ConceptDef>,
    levels: BTreeMap<u32, BTreeSet<ConceptId>>,
    open: bool,
}

impl StaticCatalog {
    pub fn from_file(file: CatalogFile) -> Self {
        let concepts = file
            .concepts
            .into_iter()
            .map(|c| (c.id.clone(), c))
            .collect();
        let levels = file
            .levels
            .into_iter()
            .map(|l| (l.level, l.required_concepts.into_iter().collect()))
            .collect();
        Self {
            concepts,
            levels,
            open: false,
        }
    }

    /// A catalog with no entries that accepts any concept id.
    pub fn open() -> Self {
        Self {
            open: true,
            ..Default::default()
        }
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn len(&self) -> usize {
        self.concepts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.concepts.is_empty()
    }

    pub fn concepts(&self) -> impl Iterator<Item = &ConceptDef> {
        self.concepts.values()
    }

    pub fn get(&self, concept: &str) -> Option<&ConceptDef> {
        self.concepts.get(concept)
    }
}

impl ConceptCatalog for StaticCatalog {
    fn contains(&self, concept: &str) -> bool {
        self.open || self.concepts.contains_key(concept)
    }

    fn required_concepts(&self, level: u32) -> BTreeSet<ConceptId> {
        match self.levels.get(&level) {
            Some(required) => required.clone(),
            None => self
                .concepts
                .values()
                .filter(|c| c.level == level)
                .map(|c| c.id.clone())
                .collect(),
        }
    }

    fn prerequisites(&self, concept: &str) -> Vec<ConceptId> {
        self.concepts
            .get(concept)
            .map(|c| c.prerequisites.clone())
            .unwrap_or_default()
    }

    fn key_terms(&self, concept: &str) -> Vec<String> {
        self.concepts
            .get(concept)
            .map(|c| c.key_terms.clone())
            .unwrap_or_default()
    }

    fn name(&self, concept: &str) -> Option<String> {
        self.concepts.get(concept).and_then(|c| c.name.clone())
    }
}

/// Parse a catalog from a TOML string.
pub fn parse_catalog_str(content: &str, source_path: &Path) -> Result<CatalogFile> {
    toml::from_str::<CatalogFile>(content)
        .with_context(|| format!("failed to parse catalog: {}", source_path.display()))
}

/// Load a catalog file from disk.
pub fn load_catalog(path: &Path) -> Result<StaticCatalog> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read catalog: {}", path.display()))?;
    let file = parse_catalog_str(&content, path)?;
    let warnings = validate_catalog(&file);
    for w in &warnings {
        tracing::warn!(field = %w.field, "catalog: {}", w.message);
    }
    Ok(StaticCatalog::from_file(file))
}

/// Check a catalog for structural problems.
pub fn validate_catalog(file: &CatalogFile) -> Vec<ConfigWarning> {
    let mut warnings = Vec::new();

    let mut ids = BTreeSet::new();
    for concept in &file.concepts {
        if !ids.insert(concept.id.as_str()) {
            warnings.push(ConfigWarning::new(
                format!("concepts.{}", concept.id),
                "duplicate concept id",
            ));
        }
    }

    for concept in &file.concepts {
        for prereq in &concept.prerequisites {
            if !ids.contains(prereq.as_str()) {
                warnings.push(ConfigWarning::new(
                    format!("concepts.{}.prerequisites", concept.id),
                    format!("unknown prerequisite '{prereq}'"),
                ));
            }
        }
    }

    for level in &file.levels {
        for concept in &level.required_concepts {
            if !ids.contains(concept.as_str()) {
                warnings.push(ConfigWarning::new(
                    format!("levels.{}", level.level),
                    format!("unknown required concept '{concept}'"),
                ));
            }
        }
    }

    if let Some(cycle) = find_cycle(file) {
        warnings.push(ConfigWarning::new(
            "concepts",
            format!("prerequisite cycle: {}", cycle.join(" -> ")),
        ));
    }

    warnings
}

#[derive(Clone, Copy, PartialEq)]
enum Mark {
    Visiting,
    Done,
}

/// First prerequisite cycle found, as a path that starts and ends on the same id.
fn find_cycle(file: &CatalogFile) -> Option<Vec<String>> {
    // Duplicate ids merge their edges.
    let mut graph: HashMap<&str, Vec<&str>> = HashMap::new();
    for c in &file.concepts {
        graph
            .entry(c.id.as_str())
            .or_default()
            .extend(c.prerequisites.iter().map(String::as_str));
    }

    fn visit<'a>(
        node: &'a str,
        graph: &HashMap<&'a str, Vec<&'a str>>,
        marks: &mut HashMap<&'a str, Mark>,
        path: &mut Vec<&'a str>,
    ) -> Option<Vec<String>> {
        match marks.get(node) {
            Some(Mark::Done) => return None,
            Some(Mark::Visiting) => {
                let start = path.iter().position(|&n| n == node).unwrap_or(0);
                let mut cycle: Vec<String> = path[start..].iter().map(|s| s.to_string()).collect();
                cycle.push(node.to_string());
                return Some(cycle);
            }
            None => {}
        }
        marks.insert(node, Mark::Visiting);
        path.push(node);
        for &next in graph.get(node).into_iter().flatten() {
            if let Some(cycle) = visit(next, graph, marks, path) {
                return Some(cycle);
            }
        }
        path.pop();
        marks.insert(node, Mark::Done);
        None
    }

    let mut marks = HashMap::new();
    let mut roots: Vec<&str> = graph.keys().copied().collect();
    roots.sort_unstable();
    for root in roots {
        let mut path = Vec::new();
        if let Some(cycle) = visit(root, &graph, &mut marks, &mut path) {
            return Some(cycle);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    const CATALOG: &str = r#"
[[concepts]]
id = "fractions"
name = "Fractions"
level = 1
key_terms = ["numerator", "denominator"]

[[concepts]]
id = "ratios"
level = 2
prerequisites = ["fractions"]

[[concepts]]
id = "percentages"
level = 2
prerequisites = ["fractions"]

[[concepts]]
id = "proportions"
level = 3
prerequisites = ["ratios"]

[[levels]]
level = 3
required_concepts = ["ratios", "proportions"]
"#;

    fn catalog() -> StaticCatalog {
        StaticCatalog::from_file(parse_catalog_str(CATALOG, &PathBuf::from("test.toml")).unwrap())
    }

    #[test]
    fn required_concepts_from_levels_or_declarations() {
        let c = catalog();
        let level2: Vec<_> = c.required_concepts(2).into_iter().collect();
        assert_eq!(level2, vec!["percentages", "ratios"]);
        let level3: Vec<_> = c.required_concepts(3).into_iter().collect();
        assert_eq!(level3, vec!["proportions", "ratios"]);
        assert!(c.required_concepts(9).is_empty());
    }

    #[test]
    fn lookups() {
        let c = catalog();
        assert!(c.contains("ratios"));
        assert!(!c.contains("calculus"));
        assert_eq!(c.prerequisites("proportions"), vec!["ratios"]);
        assert_eq!(c.key_terms("fractions"), vec!["numerator", "denominator"]);
        assert_eq!(c.name("fractions").as_deref(), Some("Fractions"));
        assert_eq!(c.name("ratios"), None);
    }

    #[test]
    fn open_catalog_accepts_anything() {
        let c = StaticCatalog::open();
        assert!(c.contains("anything"));
        assert!(c.required_concepts(2).is_empty());
    }

    #[test]
    fn valid_catalog_has_no_warnings() {
        let file = parse_catalog_str(CATALOG, &PathBuf::from("test.toml")).unwrap();
        assert!(validate_catalog(&file).is_empty());
    }

    #[test]
    fn validation_reports_problems() {
        let toml_str = r#"
[[concepts]]
id = "a"
prerequisites = ["b"]

[[concepts]]
id = "b"
prerequisites = ["a", "ghost"]

[[concepts]]
id = "a"

[[levels]]
level = 2
required_concepts = ["missing"]
"#;
        let file = parse_catalog_str(toml_str, &PathBuf::from("bad.toml")).unwrap();
        let warnings = validate_catalog(&file);
        let messages: Vec<_> = warnings.iter().map(|w| w.message.as_str()).collect();
        assert!(messages.contains(&"duplicate concept id"));
        assert!(messages.iter().any(|m| m.contains("unknown prerequisite 'ghost'")));
        assert!(messages.iter().any(|m| m.contains("unknown required concept 'missing'")));
        assert!(messages.iter().any(|m| m.starts_with("prerequisite cycle")));
    }

    #[test]
    fn load_catalog_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.toml");
        std::fs::write(&path, CATALOG).unwrap();
        let c = load_catalog(&path).unwrap();
        assert_eq!(c.len(), 4);
        assert!(load_catalog(&dir.path().join("missing.toml")).is_err());
    }
}
