//! Building a registry from configuration and spec search paths.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Result};

use crate::core::registry::{RegistryBuilder, SpecRegistry};
use crate::util::config::{global_config_path, load_config, project_config_path, Config};
use crate::util::diagnostic::suggestions;

/// Options shared by every command that needs loaded specs.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Extra spec directories, searched in the default domain
    pub spec_paths: Vec<PathBuf>,

    /// Directory whose `.specforge/config.toml` is read
    pub project_root: PathBuf,

    /// Skip the global config file
    pub ignore_global_config: bool,
}

/// Merge global config, project config and command-line spec paths.
pub fn resolve_config(opts: &LoadOptions) -> Config {
    let global = match (opts.ignore_global_config, global_config_path()) {
        (false, Some(path)) => path,
        _ => PathBuf::new(),
    };
    let mut config = load_config(&global, &project_config_path(&opts.project_root));
    for path in &opts.spec_paths {
        config.add_search_path(absolute(&opts.project_root, path));
    }
    config
}

fn absolute(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

/// Discover, register and freeze every spec the configuration points at.
pub fn load_registry(config: &Config) -> Result<Arc<SpecRegistry>> {
    if config.search_paths.is_empty() {
        bail!("no spec search paths configured\n{}", suggestions::NO_SEARCH_PATH);
    }
    for search in &config.search_paths {
        if !search.path.exists() {
            tracing::warn!("spec search path {} does not exist", search.path.display());
        }
    }

    let builder = RegistryBuilder::from_config(config);
    builder.register_search_paths(&config.search_paths);
    let registry = builder.freeze();
    tracing::info!(
        "loaded {} specs in {} domains",
        registry.len(),
        registry.domains().len()
    );
    Ok(Arc::new(registry))
}

/// [`resolve_config`] followed by [`load_registry`].
pub fn load(opts: &LoadOptions) -> Result<(Config, Arc<SpecRegistry>)> {
    let config = resolve_config(opts);
    let registry = load_registry(&config)?;
    Ok((config, registry))
}
