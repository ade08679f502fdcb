//! Template Registry - Read-only store of target catalog templates
//!
//! Templates are JSON files in a directory, loaded once at startup and never
//! written by the service.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::api::logs::{log_success, log_warning};
use crate::error::RegistryResult;
use crate::models::Template;

/// Directory where templates are stored (relative to current dir)
pub const DEFAULT_TEMPLATES_DIR: &str = "templates";

/// Lookup of templates by key.
///
/// Implementations are immutable once built so one instance can serve
/// concurrent requests.
pub trait TemplateStore: Send + Sync {
    /// All templates, sorted by key.
    fn list(&self) -> Vec<&Template>;

    /// Template by key.
    fn get(&self, key: &str) -> Option<&Template>;
}

/// Templates loaded from `*.json` files of one directory.
#[derive(Debug, Clone, Default)]
pub struct TemplateRegistry {
    /// Directory templates were loaded from
    templates_dir: PathBuf,
    /// Loaded templates (key -> template)
    templates: BTreeMap<String, Template>,
}

impl TemplateRegistry {
    /// Load the default directory.
    pub fn new() -> Self {
        Self::with_dir(DEFAULT_TEMPLATES_DIR)
    }

    /// Load every template of `dir`.
    ///
    /// A missing directory gives an empty registry; unreadable or invalid
    /// files are skipped with a warning.
    pub fn with_dir(dir: impl AsRef<Path>) -> Self {
        let mut registry = Self {
            templates_dir: PathBuf::from(dir.as_ref()),
            templates: BTreeMap::new(),
        };
        registry.load_all();
        registry
    }

    fn load_all(&mut self) {
        if !self.templates_dir.exists() {
            log_warning(format!(
                "Templates directory not found: {}",
                self.templates_dir.display()
            ));
            return;
        }

        let entries = match fs::read_dir(&self.templates_dir) {
            Ok(e) => e,
            Err(e) => {
                log_warning(format!("Cannot read {}: {}", self.templates_dir.display(), e));
                return;
            }
        };

        let mut paths: Vec<PathBuf> = entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|e| e == "json"))
            .collect();
        paths.sort();

        for path in paths {
            match load_template(&path) {
                Ok(template) => {
                    if self.templates.contains_key(&template.template_key) {
                        log_warning(format!(
                            "Template key '{}' in {} replaces an earlier file",
                            template.template_key,
                            path.display()
                        ));
                    }
                    self.templates.insert(template.template_key.clone(), template);
                }
                Err(e) => log_warning(format!("Skipping template {}: {}", path.display(), e)),
            }
        }

        log_success(format!(
            "Loaded {} template(s) from {}",
            self.templates.len(),
            self.templates_dir.display()
        ));
    }

    /// Build a registry from templates already in memory.
    pub fn from_templates(templates: impl IntoIterator<Item = Template>) -> Self {
        Self {
            templates_dir: PathBuf::new(),
            templates: templates
                .into_iter()
                .map(|t| (t.template_key.clone(), t))
                .collect(),
        }
    }

    pub fn templates_dir(&self) -> &Path {
        &self.templates_dir
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

impl TemplateStore for TemplateRegistry {
    fn list(&self) -> Vec<&Template> {
        self.templates.values().collect()
    }

    fn get(&self, key: &str) -> Option<&Template> {
        self.templates.get(key)
    }
}

/// Read and deserialize one template file.
pub fn load_template(path: &Path) -> RegistryResult<Template> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}
