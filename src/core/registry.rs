//! The spec registry.
//!
//! Specs are registered into a [`RegistryBuilder`], from many threads at
//! once, then frozen into a read-only [`SpecRegistry`]. `BasedOn` references
//! are resolved while freezing; specs are parsed lazily on first lookup.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use miette::Diagnostic as MietteDiagnostic;
use rayon::prelude::*;
use thiserror::Error;

use crate::core::macros::MacroNamespace;
use crate::core::parser::{LocalizedStrings, SpecParser};
use crate::core::plist::{PropertyListDict, PropertyListItem};
use crate::core::proxy::{LoadState, ProxyId, SpecProxy};
use crate::core::spec::{Spec, SpecClass, SpecHeader, SpecType};
use crate::util::config::{Config, SearchPath};
use crate::util::diagnostic::Location;
use crate::util::fs::find_spec_files;
use crate::util::{Diagnostic, Diagnostics};

/// Specs declared once but registered into several domains.
///
/// The listed domains replace the declared one; they are not added to it.
const DOMAIN_REMAPS: &[(&str, &[&str])] = &[
    (
        ":com.apple.build-system.external",
        &["", "macosx", "embedded", "embedded-shared", "embedded-simulator"],
    ),
    (
        "darwin:com.apple.product-type.application",
        &[
            "macosx",
            "embedded",
            "embedded-shared",
            "embedded-simulator",
            "iphoneos-shared",
            "watchos-shared",
        ],
    ),
    (
        "darwin:com.apple.product-type.application.watchapp2-container",
        DARWIN_EMBEDDED,
    ),
    ("darwin:com.apple.product-type.application.messages", DARWIN_EMBEDDED),
    (
        "darwin:com.apple.product-type.application.on-demand-install-capable",
        DARWIN_EMBEDDED,
    ),
    (
        "appletvos-shared:com.apple.product-type.application.cpsdkapp",
        &["appletvos", "appletvsimulator"],
    ),
    (
        "appletvos-shared:com.apple.product-type.tv-app-extension",
        &["appletvos", "appletvsimulator"],
    ),
    (
        "appletvos-shared:com.apple.product-type.tv-broadcast-extension",
        &["appletvos", "appletvsimulator"],
    ),
    (
        "watchos-shared:com.apple.product-type.application.watchapp2",
        &["watchos", "watchsimulator"],
    ),
    (
        "watchos-shared:com.apple.product-type.app-extension.base",
        &["watchos", "watchsimulator"],
    ),
    (
        "watchos-shared:com.apple.product-type.watchkit2-extension",
        &["watchos", "watchsimulator"],
    ),
    (
        "watchos-shared:com.apple.product-type.clockface-extension",
        &["watchos", "watchsimulator"],
    ),
    (
        "watchos-shared:com.apple.product-type.app-extension.intents-service",
        &["watchos", "watchsimulator"],
    ),
];

const DARWIN_EMBEDDED: &[&str] = &[
    "macosx",
    "embedded",
    "embedded-shared",
    "embedded-simulator",
    "iphoneos-shared",
    "iphoneos",
    "iphonesimulator",
    "watchos-shared",
    "watchos",
    "watchsimulator",
];

fn static_remap(specifier: &str) -> Option<Vec<String>> {
    DOMAIN_REMAPS
        .iter()
        .find(|(key, _)| *key == specifier)
        .map(|(_, domains)| domains.iter().map(|d| d.to_string()).collect())
}

/// Errors from typed spec lookups.
#[derive(Debug, Clone, PartialEq, Eq, Error, MietteDiagnostic)]
pub enum SpecLoadingError {
    #[error("spec '{domain}:{identifier}' not found")]
    #[diagnostic(
        code(specforge::spec::not_found),
        help("run `specforge list` to see the loaded specs")
    )]
    NotFound { identifier: String, domain: String },

    #[error("spec '{domain}:{identifier}' is a {actual} spec, expected a {expected}")]
    #[diagnostic(code(specforge::spec::wrong_type))]
    WrongType {
        identifier: String,
        domain: String,
        expected: &'static str,
        actual: SpecType,
    },
}

/// Identifier -> proxy, per domain.
type DomainTables = BTreeMap<String, HashMap<String, ProxyId>>;

/// Complete, ordered list of domains searched for lookups in `domain`.
///
/// The domain itself, then its inclusions depth-first, then the default
/// domain.
fn domain_search_list(inclusions: &BTreeMap<String, Vec<String>>, domain: &str) -> Vec<String> {
    fn visit(inclusions: &BTreeMap<String, Vec<String>>, domain: &str, result: &mut Vec<String>) {
        if result.iter().any(|d| d == domain) {
            return;
        }
        result.push(domain.to_string());
        if let Some(included) = inclusions.get(domain) {
            for domain in included {
                visit(inclusions, domain, result);
            }
        }
    }

    if domain.is_empty() {
        return vec![String::new()];
    }
    let mut result = Vec::new();
    visit(inclusions, domain, &mut result);
    visit(inclusions, "", &mut result);
    result
}

fn lookup_in(
    tables: &DomainTables,
    inclusions: &BTreeMap<String, Vec<String>>,
    identifier: &str,
    domain: &str,
) -> Option<ProxyId> {
    domain_search_list(inclusions, domain)
        .iter()
        .find_map(|domain| tables.get(domain)?.get(identifier).copied())
}

#[derive(Debug, Default)]
struct Tables {
    proxies: Vec<SpecProxy>,
    domains: DomainTables,
    diagnostics: Diagnostics,
}

impl Tables {
    fn register(&mut self, mut proxy: SpecProxy) -> Option<ProxyId> {
        let table = self.domains.entry(proxy.domain.clone()).or_default();
        if let Some(existing) = table.get(&proxy.identifier) {
            let message = format!(
                "spec {} already registered from {}",
                proxy.specifier_string(),
                self.proxies[*existing].path.display()
            );
            self.diagnostics
                .push(Diagnostic::error(message).with_location(Location::file(&proxy.path)));
            return None;
        }

        let id = self.proxies.len();
        proxy.id = id;
        table.insert(proxy.identifier.clone(), id);
        self.proxies.push(proxy);
        Some(id)
    }
}

/// The write phase of a registry.
pub struct RegistryBuilder {
    namespace: Arc<MacroNamespace>,
    domain_inclusions: BTreeMap<String, Vec<String>>,
    domain_remaps: BTreeMap<String, Vec<String>>,
    builtins: Vec<Spec>,
    tables: Mutex<Tables>,
}

impl Default for RegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RegistryBuilder {
    pub fn new() -> Self {
        RegistryBuilder {
            namespace: Arc::new(MacroNamespace::with_builtins()),
            domain_inclusions: BTreeMap::new(),
            domain_remaps: BTreeMap::new(),
            builtins: Vec::new(),
            tables: Mutex::new(Tables::default()),
        }
    }

    /// A builder using the domain tables of `config`.
    pub fn from_config(config: &Config) -> Self {
        Self::new()
            .with_domain_inclusions(config.domain_inclusions.clone())
            .with_domain_remaps(config.domain_remaps.clone())
    }

    pub fn with_domain_inclusions(mut self, inclusions: BTreeMap<String, Vec<String>>) -> Self {
        self.domain_inclusions = inclusions;
        self
    }

    /// Remaps keyed by `domain:identifier`, consulted before the built-in table.
    pub fn with_domain_remaps(mut self, remaps: BTreeMap<String, Vec<String>>) -> Self {
        self.domain_remaps = remaps;
        self
    }

    pub fn namespace(&self) -> &Arc<MacroNamespace> {
        &self.namespace
    }

    /// Register every spec found under the given search paths.
    ///
    /// Files are decoded in parallel; this returns once all of them are
    /// registered.
    pub fn register_search_paths(&self, search_paths: &[SearchPath]) {
        let files: Vec<(PathBuf, &str)> = search_paths
            .iter()
            .flat_map(|search| {
                let files = if search.path.is_file() {
                    vec![search.path.clone()]
                } else {
                    find_spec_files(&search.path)
                };
                files
                    .into_iter()
                    .map(move |file| (file, search.domain.as_str()))
            })
            .filter(|(file, _)| {
                !file
                    .file_name()
                    .and_then(|name| name.to_str())
                    .is_some_and(|name| name.starts_with('.'))
            })
            .collect();

        tracing::debug!("registering {} spec files", files.len());
        files
            .par_iter()
            .for_each(|(file, domain)| self.register_file(file, domain));
    }

    /// Register the records of one spec file.
    pub fn register_file(&self, path: &Path, domain: &str) {
        let item = match PropertyListItem::from_path(path) {
            Ok(item) => item,
            Err(e) => {
                tracing::debug!("{:#}", e);
                self.lock()
                    .diagnostics
                    .push(Diagnostic::error("unable to load spec data").with_location(Location::file(path)));
                return;
            }
        };

        match &item {
            PropertyListItem::Array(items) => items
                .par_iter()
                .for_each(|record| self.register_data(path, record, domain)),
            record => self.register_data(path, record, domain),
        }
    }

    /// Register one decoded record as if read from `path`.
    pub fn register_data(&self, path: &Path, data: &PropertyListItem, domain: &str) {
        let mut errors = Vec::new();
        let proxies = self.decode_record(path, data, domain, &mut errors);

        let mut tables = self.lock();
        tables.diagnostics.extend(
            errors
                .into_iter()
                .map(|message| Diagnostic::error(message).with_location(Location::file(path))),
        );
        for proxy in proxies {
            tracing::trace!("registering spec {}", proxy);
            tables.register(proxy);
        }
    }

    /// Install a spec constructed in code into the default domain.
    pub fn register_builtin(&mut self, spec: Spec) {
        self.builtins.push(spec);
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn decode_record(
        &self,
        path: &Path,
        data: &PropertyListItem,
        domain: &str,
        errors: &mut Vec<String>,
    ) -> Vec<SpecProxy> {
        let PropertyListItem::Dict(items) = data else {
            errors.push(format!("unexpected specification data in {}", path.display()));
            return Vec::new();
        };

        match self.record_identity(items, domain) {
            Ok(identity) => {
                let localized = find_localized_strings(
                    path,
                    items.get("Name").and_then(PropertyListItem::as_str),
                    &identity.identifier,
                    errors,
                )
                .map(Arc::new);
                let data = Arc::new(items.clone());

                let specifier = format!("{}:{}", identity.domain, identity.identifier);
                let domains = self
                    .domain_remaps
                    .get(&specifier)
                    .cloned()
                    .or_else(|| static_remap(&specifier))
                    .unwrap_or_else(|| vec![identity.domain.clone()]);

                domains
                    .into_iter()
                    .map(|domain| {
                        let mut proxy = SpecProxy::new(
                            identity.identifier.clone(),
                            domain,
                            path,
                            identity.ty,
                            Arc::clone(&data),
                        );
                        proxy.class = identity.class;
                        proxy.based_on = identity.based_on.clone();
                        proxy.localized = localized.clone();
                        proxy
                    })
                    .collect()
            }
            Err(message) => {
                errors.push(message);
                Vec::new()
            }
        }
    }

    fn record_identity(&self, items: &PropertyListDict, domain: &str) -> Result<RecordIdentity, String> {
        let identifier = match items.get("Identifier") {
            None => return Err("missing 'Identifier' field".to_string()),
            Some(PropertyListItem::String(identifier)) => identifier.clone(),
            Some(_) => return Err("invalid 'Identifier' field".to_string()),
        };

        let ty = match items.get("Type") {
            None => return Err("missing 'Type' field".to_string()),
            Some(PropertyListItem::String(name)) => SpecType::from_name(name)
                .ok_or_else(|| format!("unknown spec 'Type': '{}'", name))?,
            Some(_) => return Err("invalid 'Type' field".to_string()),
        };

        let domain = match items.get("Domain").or_else(|| items.get("_Domain")) {
            None => domain.to_string(),
            Some(PropertyListItem::String(domain)) => domain.clone(),
            Some(_) => return Err("invalid 'Domain' field".to_string()),
        };

        let class = match items.get("Class") {
            None => SpecClass::for_identifier(&identifier),
            Some(PropertyListItem::String(name)) => {
                let class = SpecClass::from_name(name)
                    .ok_or_else(|| format!("unknown spec 'Class': '{}'", name))?;
                if !ty.is_tool() {
                    return Err(format!(
                        "spec 'Class': '{}' is not valid for spec 'Type': '{}'",
                        name, ty
                    ));
                }
                Some(class)
            }
            Some(_) => return Err("invalid 'Class' field".to_string()),
        };

        let based_on = match items.get("BasedOn") {
            None => None,
            Some(PropertyListItem::String(based_on)) => Some(based_on.clone()),
            Some(_) => return Err("invalid 'BasedOn' field".to_string()),
        };

        Ok(RecordIdentity {
            identifier,
            ty,
            domain,
            class,
            based_on,
        })
    }

    /// Resolve every `BasedOn` reference and produce the read-only registry.
    ///
    /// Specs whose base is missing or of another type are dropped.
    pub fn freeze(self) -> SpecRegistry {
        let mut tables = self.tables.into_inner().unwrap_or_else(PoisonError::into_inner);

        let mut ids: Vec<ProxyId> = tables
            .domains
            .values()
            .flat_map(|table| table.values().copied())
            .collect();
        ids.sort_by(|a, b| {
            let (a, b) = (&tables.proxies[*a], &tables.proxies[*b]);
            (&a.domain, &a.identifier).cmp(&(&b.domain, &b.identifier))
        });

        let mut resolver = BaseResolver {
            proxies: &tables.proxies,
            domains: &tables.domains,
            inclusions: &self.domain_inclusions,
            outcome: vec![None; tables.proxies.len()],
            bases: vec![None; tables.proxies.len()],
            visiting: HashSet::new(),
            errors: Vec::new(),
        };
        for id in &ids {
            resolver.resolve(*id);
        }
        let BaseResolver {
            outcome,
            bases,
            errors,
            ..
        } = resolver;

        tables.diagnostics.extend(errors);
        for id in ids {
            if outcome[id] == Some(false) {
                let proxy = &tables.proxies[id];
                tracing::debug!("dropping spec {} with unresolved base", proxy);
                if let Some(table) = tables.domains.get_mut(&proxy.domain) {
                    table.remove(&proxy.identifier);
                }
            } else {
                tables.proxies[id].base = bases[id];
            }
        }

        let mut builtins = Vec::new();
        for spec in self.builtins {
            let mut proxy = SpecProxy::new(
                spec.identifier.clone(),
                "",
                spec.path.clone(),
                spec.ty,
                Arc::default(),
            );
            proxy.class = spec.class;
            if let Some(id) = tables.register(proxy) {
                builtins.push((id, spec));
            }
        }

        let mut states = vec![LoadState::NotLoaded; tables.proxies.len()];
        for (id, spec) in builtins {
            install_builtin(&mut states, id, spec);
        }

        tracing::info!(
            "loaded {} spec records in {} domains",
            tables.domains.values().map(HashMap::len).sum::<usize>(),
            tables.domains.len()
        );

        SpecRegistry {
            namespace: self.namespace,
            proxies: tables.proxies,
            domains: tables.domains,
            domain_inclusions: self.domain_inclusions,
            states: states.into_iter().map(Mutex::new).collect(),
            diagnostics: Mutex::new(tables.diagnostics),
            subregistry_cache: Mutex::new(HashMap::new()),
        }
    }
}

struct RecordIdentity {
    identifier: String,
    ty: SpecType,
    domain: String,
    class: Option<SpecClass>,
    based_on: Option<String>,
}

fn install_builtin(states: &mut [LoadState], id: ProxyId, spec: Spec) {
    match states[id] {
        LoadState::NotLoaded => states[id] = LoadState::Loaded(Arc::new(spec)),
        _ => panic!("builtin spec '{}' loaded twice", spec.identifier),
    }
}

/// Resolves `BasedOn` references once per proxy.
struct BaseResolver<'a> {
    proxies: &'a [SpecProxy],
    domains: &'a DomainTables,
    inclusions: &'a BTreeMap<String, Vec<String>>,
    outcome: Vec<Option<bool>>,
    bases: Vec<Option<ProxyId>>,
    visiting: HashSet<ProxyId>,
    errors: Vec<Diagnostic>,
}

impl BaseResolver<'_> {
    fn resolve(&mut self, id: ProxyId) -> bool {
        if let Some(done) = self.outcome[id] {
            return done;
        }
        let ok = self.resolve_uncached(id);
        self.outcome[id] = Some(ok);
        ok
    }

    fn resolve_uncached(&mut self, id: ProxyId) -> bool {
        let proxies = self.proxies;
        let proxy = &proxies[id];
        let Some((domain, identifier)) = proxy.base_reference() else {
            return true;
        };

        let Some(base_id) = lookup_in(self.domains, self.inclusions, &identifier, &domain) else {
            self.error(
                proxy,
                format!(
                    "missing base spec '{}:{}' for spec '{}:{}'",
                    domain, identifier, proxy.domain, proxy.identifier
                ),
            );
            return false;
        };

        let base = &proxies[base_id];
        if base.ty != proxy.ty {
            self.error(
                proxy,
                format!(
                    "incompatible base spec '{}:{}' for spec '{}:{}', type: '{}' (expected: '{}')",
                    domain, identifier, proxy.domain, proxy.identifier, base.ty, proxy.ty
                ),
            );
            return false;
        }

        // Cycles are left for loading to report.
        if base_id != id && !self.visiting.contains(&base_id) {
            self.visiting.insert(id);
            let ok = self.resolve(base_id);
            self.visiting.remove(&id);
            if !ok {
                return false;
            }
        }

        self.bases[id] = Some(base_id);
        true
    }

    fn error(&mut self, proxy: &SpecProxy, message: String) {
        self.errors
            .push(Diagnostic::error(message).with_location(Location::file(&proxy.path)));
    }
}

/// Look for the `.strings` table of a spec next to its file.
fn find_localized_strings(
    path: &Path,
    name: Option<&str>,
    identifier: &str,
    errors: &mut Vec<String>,
) -> Option<LocalizedStrings> {
    let parent = path.parent().unwrap_or_else(|| Path::new(""));
    let candidates = name
        .into_iter()
        .chain(std::iter::once(identifier))
        .flat_map(|stem| {
            let file = format!("{}.strings", stem);
            [
                parent.join(&file),
                parent.join("en.lproj").join(&file),
                parent.join("English.lproj").join(&file),
            ]
        });

    for candidate in candidates {
        if !candidate.is_file() {
            continue;
        }
        let Ok(item) = PropertyListItem::from_path(&candidate) else {
            continue;
        };
        let PropertyListItem::Dict(items) = item else {
            errors.push("unexpected `.strings` file content".to_string());
            return None;
        };

        let mut strings = LocalizedStrings::new();
        for (key, value) in items {
            match value {
                PropertyListItem::String(value) => {
                    strings.insert(key, value.replace('\r', ""));
                }
                _ => errors.push(format!("unexpected value for key '{}' in `.strings` file", key)),
            }
        }
        return Some(strings);
    }
    None
}

type SubregistryKey = (&'static str, String, bool);

/// A frozen registry. Lookups are read-only; loading is lazy and memoized.
pub struct SpecRegistry {
    namespace: Arc<MacroNamespace>,
    proxies: Vec<SpecProxy>,
    domains: DomainTables,
    domain_inclusions: BTreeMap<String, Vec<String>>,
    /// One lock per proxy, held for the whole of its load, so concurrent
    /// loads of one spec coalesce while unrelated loads run in parallel.
    states: Vec<Mutex<LoadState>>,
    diagnostics: Mutex<Diagnostics>,
    subregistry_cache: Mutex<HashMap<SubregistryKey, Arc<[ProxyId]>>>,
}

impl std::fmt::Debug for SpecRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpecRegistry")
            .field("specs", &self.len())
            .field("domains", &self.domains.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl SpecRegistry {
    /// The namespace macros declared by specs live in.
    pub fn namespace(&self) -> &Arc<MacroNamespace> {
        &self.namespace
    }

    /// Number of registered (identifier, domain) pairs.
    pub fn len(&self) -> usize {
        self.domains.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The registered domains, sorted.
    pub fn domains(&self) -> Vec<&str> {
        self.domains.keys().map(String::as_str).collect()
    }

    pub fn domain_search_list(&self, domain: &str) -> Vec<String> {
        domain_search_list(&self.domain_inclusions, domain)
    }

    /// Every registered proxy, sorted by identifier then domain.
    pub fn proxies(&self) -> Vec<&SpecProxy> {
        let mut proxies: Vec<&SpecProxy> = self
            .domains
            .values()
            .flat_map(|table| table.values().map(|id| &self.proxies[*id]))
            .collect();
        proxies.sort_by(|a, b| (&a.identifier, &a.domain).cmp(&(&b.identifier, &b.domain)));
        proxies
    }

    pub fn lookup_proxy(&self, identifier: &str, domain: &str) -> Option<&SpecProxy> {
        lookup_in(&self.domains, &self.domain_inclusions, identifier, domain).map(|id| &self.proxies[id])
    }

    /// The base a proxy resolved to while freezing.
    pub fn base_proxy(&self, proxy: &SpecProxy) -> Option<&SpecProxy> {
        proxy.base.map(|id| &self.proxies[id])
    }

    /// All proxies sharing `ty`'s subregistry visible from `domain`.
    ///
    /// With `include_inherited`, a spec in a more specific domain hides one
    /// with the same identifier in a domain searched later.
    pub fn find_proxies_in_subregistry(
        &self,
        ty: SpecType,
        domain: &str,
        include_inherited: bool,
    ) -> Vec<&SpecProxy> {
        let key = (ty.subregistry(), domain.to_string(), include_inherited);
        let cached = self
            .subregistry_cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
            .cloned();

        let ids = match cached {
            Some(ids) => ids,
            None => {
                let ids: Arc<[ProxyId]> = self.search_subregistry(ty, domain, include_inherited).into();
                self.subregistry_cache
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .insert(key, Arc::clone(&ids));
                ids
            }
        };
        ids.iter().map(|id| &self.proxies[*id]).collect()
    }

    fn search_subregistry(&self, ty: SpecType, domain: &str, include_inherited: bool) -> Vec<ProxyId> {
        let search = if include_inherited {
            self.domain_search_list(domain)
        } else {
            vec![domain.to_string()]
        };

        let mut found: HashMap<&str, ProxyId> = HashMap::new();
        for domain in &search {
            let Some(table) = self.domains.get(domain) else {
                continue;
            };
            for (identifier, id) in table {
                if found.contains_key(identifier.as_str()) {
                    continue;
                }
                if self.proxies[*id].ty.subregistry() == ty.subregistry() {
                    found.insert(identifier, *id);
                }
            }
        }

        let mut ids: Vec<ProxyId> = found.into_values().collect();
        ids.sort_by(|a, b| {
            let (a, b) = (&self.proxies[*a], &self.proxies[*b]);
            (&a.identifier, &a.domain).cmp(&(&b.identifier, &b.domain))
        });
        ids
    }

    /// Load every spec of `ty` visible from `domain`; failures are skipped.
    pub fn find_specs(&self, ty: SpecType, domain: &str, include_inherited: bool) -> Vec<Arc<Spec>> {
        self.find_proxies_in_subregistry(ty, domain, include_inherited)
            .into_iter()
            .filter_map(|proxy| self.load(proxy))
            .filter(|spec| spec.ty == ty)
            .collect()
    }

    pub fn get_spec(&self, identifier: &str, domain: &str) -> Option<Arc<Spec>> {
        self.lookup_proxy(identifier, domain)
            .and_then(|proxy| self.load(proxy))
    }

    pub fn get_tool(&self, identifier: &str, domain: &str) -> Result<Arc<Spec>, SpecLoadingError> {
        self.get_typed(identifier, domain, "command-line tool", |spec| spec.as_tool().is_some())
    }

    pub fn get_file_type(&self, identifier: &str, domain: &str) -> Result<Arc<Spec>, SpecLoadingError> {
        self.get_typed(identifier, domain, "file type", |spec| spec.as_file_type().is_some())
    }

    pub fn get_build_system(&self, identifier: &str, domain: &str) -> Result<Arc<Spec>, SpecLoadingError> {
        self.get_typed(identifier, domain, "build system", |spec| {
            spec.as_build_system().is_some()
        })
    }

    fn get_typed(
        &self,
        identifier: &str,
        domain: &str,
        expected: &'static str,
        is_expected: impl Fn(&Spec) -> bool,
    ) -> Result<Arc<Spec>, SpecLoadingError> {
        let spec = self
            .get_spec(identifier, domain)
            .ok_or_else(|| SpecLoadingError::NotFound {
                identifier: identifier.to_string(),
                domain: domain.to_string(),
            })?;
        if !is_expected(&spec) {
            return Err(SpecLoadingError::WrongType {
                identifier: identifier.to_string(),
                domain: domain.to_string(),
                expected,
                actual: spec.ty,
            });
        }
        Ok(spec)
    }

    /// The file type matching a file name by extension or exact name.
    pub fn lookup_file_type_by_name(&self, file_name: &str, domain: &str) -> Option<Arc<Spec>> {
        self.find_specs(SpecType::FileType, domain, true)
            .into_iter()
            .find(|spec| {
                spec.as_file_type()
                    .is_some_and(|file_type| file_type.matches_file_name(file_name))
            })
    }

    /// Load a spec, parsing it and its bases on first use.
    ///
    /// Returns `None` if the spec or one of its bases failed to load; the
    /// reasons are recorded in [`SpecRegistry::diagnostics`].
    pub fn load(&self, proxy: &SpecProxy) -> Option<Arc<Spec>> {
        self.load_proxy(proxy.id).ok()
    }

    /// The errors that made a proxy fail to load, if it did.
    pub fn load_errors(&self, proxy: &SpecProxy) -> Vec<Diagnostic> {
        self.state(proxy.id).diagnostics().to_vec()
    }

    fn state(&self, id: ProxyId) -> MutexGuard<'_, LoadState> {
        self.states[id].lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether following `BasedOn` from `id` leads back to `id`.
    fn is_on_cycle(&self, id: ProxyId) -> bool {
        std::iter::successors(self.proxies[id].base, |&b| self.proxies[b].base)
            .take(self.proxies.len())
            .any(|b| b == id)
    }

    /// Locks are taken along the base chain only. A proxy on a cycle is
    /// failed without touching the other members' locks, so two threads
    /// entering one cycle from different ends cannot deadlock.
    fn load_proxy(&self, id: ProxyId) -> Result<Arc<Spec>, Vec<Diagnostic>> {
        let proxy = &self.proxies[id];
        let mut state = self.state(id);
        match &*state {
            LoadState::Loaded(spec) => return Ok(Arc::clone(spec)),
            LoadState::Error(errors) => return Err(errors.clone()),
            LoadState::Loading => {
                // Only left behind by a load that panicked
                let diagnostic = Diagnostic::error(format!("loading {} was interrupted", proxy.specifier_string()))
                    .with_location(Location::file(&proxy.path));
                *state = LoadState::Error(vec![diagnostic.clone()]);
                self.emit(diagnostic.clone());
                return Err(vec![diagnostic]);
            }
            LoadState::NotLoaded => {}
        }
        *state = LoadState::Loading;

        let fail_on_base = |state: &mut LoadState, children: Vec<Diagnostic>| {
            let diagnostic = Diagnostic::error(format!(
                "unable to load {} due to errors loading base spec",
                proxy.specifier_string()
            ))
            .with_location(Location::file(&proxy.path))
            .with_children(children);
            *state = LoadState::Error(vec![diagnostic.clone()]);
            self.emit(diagnostic.clone());
            vec![diagnostic]
        };

        if self.is_on_cycle(id) {
            let cycle = Diagnostic::error(format!(
                "encountered cyclic dependency while loading {}",
                proxy.specifier_string()
            ))
            .with_location(Location::file(&proxy.path));
            self.emit(cycle.clone());
            return Err(fail_on_base(&mut *state, vec![cycle]));
        }

        let base = match proxy.base {
            Some(base_id) => match self.load_proxy(base_id) {
                Ok(base) => Some(base),
                Err(children) => return Err(fail_on_base(&mut *state, children)),
            },
            None => None,
        };

        // The base loaded, so this chain is acyclic.
        let chain: Vec<&SpecProxy> = std::iter::successors(proxy.base.map(|b| &self.proxies[b]), |p| {
            p.base.map(|b| &self.proxies[b])
        })
        .take(self.proxies.len())
        .collect();

        let mut parser = SpecParser::new(&proxy.identifier, &proxy.data, &self.namespace);
        for base_proxy in chain.iter().copied() {
            parser = parser.with_base(&base_proxy.data);
        }
        for table in std::iter::once(proxy)
            .chain(chain.iter().copied())
            .filter_map(|p| p.localized.as_deref())
        {
            parser = parser.with_localized(table);
        }

        let class = proxy
            .class
            .or_else(|| base.as_ref().and_then(|base| base.class))
            .or_else(|| proxy.ty.default_class());
        let header = SpecHeader {
            identifier: proxy.identifier.clone(),
            domain: proxy.domain.clone(),
            ty: proxy.ty,
            class,
            path: proxy.path.clone(),
            localized: proxy.localized.clone(),
        };
        let spec = Spec::parse(&mut parser, header, base);

        let mut errors = Vec::new();
        for diagnostic in parser.complete() {
            let forwarded = Diagnostic {
                message: format!("{} (while parsing '{}')", diagnostic.message, proxy.identifier),
                location: Some(Location::file(&proxy.path)),
                ..diagnostic
            };
            if forwarded.is_error() {
                errors.push(forwarded.clone());
            }
            self.emit(forwarded);
        }

        if !errors.is_empty() {
            tracing::warn!("unable to load spec {} ({} errors)", proxy, errors.len());
            *state = LoadState::Error(errors.clone());
            return Err(errors);
        }

        tracing::debug!("loaded spec {}", proxy);
        let spec = Arc::new(spec);
        *state = LoadState::Loaded(Arc::clone(&spec));
        Ok(spec)
    }

    fn emit(&self, diagnostic: Diagnostic) {
        self.diagnostics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(diagnostic);
    }

    /// Everything reported so far by registration, freezing and loading.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.diagnostics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    /// Report specs whose unqualified `BasedOn` resolves, from some domain,
    /// to a spec in a domain the spec's own domain does not include.
    ///
    /// Returns whether anything was reported.
    pub fn validate_spec_domain_inversion(&self, mut report: impl FnMut(String)) -> bool {
        let mut domains = BTreeSet::new();
        let mut identifiers = BTreeSet::new();
        for proxy in self.proxies() {
            domains.insert(proxy.domain.as_str());
            identifiers.insert(proxy.identifier.as_str());
        }

        let mut had_errors = false;
        for identifier in &identifiers {
            for domain in &domains {
                let Some(proxy) = self.lookup_proxy(identifier, domain) else {
                    continue;
                };
                let Some(based_on) = proxy.based_on.as_deref() else {
                    continue;
                };
                if matches!(based_on.split_once(':'), Some((_, rhs)) if !rhs.is_empty()) {
                    continue;
                }

                let Some(base) = self.lookup_proxy(based_on, domain) else {
                    report(format!(
                        "error: missing spec: {} based on: '{}'",
                        proxy.specifier_string(),
                        based_on
                    ));
                    had_errors = true;
                    continue;
                };

                if proxy.domain != base.domain
                    && !self.domain_search_list(&proxy.domain).contains(&base.domain)
                {
                    report(format!(
                        "error: spec: when searching the domain '{}', {} is based on: '{}' which resolves to {} which is not in an included domain",
                        domain,
                        proxy.specifier_string(),
                        based_on,
                        base.specifier_string()
                    ));
                    had_errors = true;
                }
            }
        }
        had_errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::file_type::FileTypeSpec;
    use crate::core::spec::SpecKind;
    use tempfile::TempDir;

    fn record(json: &str) -> PropertyListItem {
        PropertyListItem::from_json_str(json).unwrap()
    }

    fn build(records: &[(&str, &str)]) -> SpecRegistry {
        build_with(RegistryBuilder::new(), records)
    }

    fn build_with(builder: RegistryBuilder, records: &[(&str, &str)]) -> SpecRegistry {
        for (domain, json) in records {
            builder.register_data(Path::new("/specs/test.xcspec"), &record(json), domain);
        }
        builder.freeze()
    }

    fn messages(registry: &SpecRegistry) -> Vec<String> {
        registry.diagnostics().into_iter().map(|d| d.message).collect()
    }

    #[test]
    fn test_duplicate_registration() {
        let registry = build(&[
            ("", r#"{"Identifier": "text", "Type": "FileType"}"#),
            ("", r#"{"Identifier": "text", "Type": "FileType"}"#),
        ]);
        assert_eq!(registry.len(), 1);
        assert_eq!(
            messages(&registry),
            vec!["spec ':text' already registered from /specs/test.xcspec"]
        );
    }

    #[test]
    fn test_record_identity_errors() {
        let registry = build(&[
            ("", r#"{"Type": "FileType"}"#),
            ("", r#"{"Identifier": 3, "Type": "FileType"}"#),
            ("", r#"{"Identifier": "a"}"#),
            ("", r#"{"Identifier": "b", "Type": "Widget"}"#),
            ("", r#"{"Identifier": "c", "Type": "Tool", "Class": "Bogus"}"#),
            ("", r#"{"Identifier": "d", "Type": "FileType", "Class": "CommandLineTool"}"#),
            ("", r#"["not", "a", "dict"]"#),
        ]);
        assert!(registry.is_empty());
        let messages = messages(&registry);
        assert_eq!(messages[0], "missing 'Identifier' field");
        assert_eq!(messages[1], "invalid 'Identifier' field");
        assert_eq!(messages[2], "missing 'Type' field");
        assert_eq!(messages[3], "unknown spec 'Type': 'Widget'");
        assert_eq!(messages[4], "unknown spec 'Class': 'Bogus'");
        assert_eq!(
            messages[5],
            "spec 'Class': 'CommandLineTool' is not valid for spec 'Type': 'FileType'"
        );
        assert_eq!(messages[6], "unexpected specification data in /specs/test.xcspec");
    }

    #[test]
    fn test_missing_base_drops_spec() {
        let registry = build(&[
            ("", r#"{"Identifier": "c", "Type": "FileType", "BasedOn": "nope"}"#),
            ("", r#"{"Identifier": "d", "Type": "FileType", "BasedOn": "c"}"#),
        ]);
        assert!(registry.lookup_proxy("c", "").is_none());
        assert!(registry.lookup_proxy("d", "").is_none());
        assert_eq!(
            messages(&registry),
            vec!["missing base spec ':nope' for spec ':c'"]
        );
    }

    #[test]
    fn test_incompatible_base_type() {
        let registry = build(&[
            ("", r#"{"Identifier": "text", "Type": "FileType"}"#),
            ("", r#"{"Identifier": "cc", "Type": "Compiler", "BasedOn": "text"}"#),
        ]);
        assert!(registry.get_spec("cc", "").is_none());
        assert_eq!(
            messages(&registry),
            vec!["incompatible base spec ':text' for spec ':cc', type: 'FileType' (expected: 'Compiler')"]
        );
    }

    #[test]
    fn test_cyclic_bases_terminate() {
        let registry = build(&[
            ("", r#"{"Identifier": "a", "Type": "FileType", "BasedOn": "b"}"#),
            ("", r#"{"Identifier": "b", "Type": "FileType", "BasedOn": "a"}"#),
            ("", r#"{"Identifier": "self", "Type": "FileType", "BasedOn": "self"}"#),
        ]);
        assert!(registry.get_spec("a", "").is_none());
        assert!(registry.get_spec("self", "").is_none());
        let messages = messages(&registry);
        assert!(messages.contains(&"encountered cyclic dependency while loading ':a'".to_string()));
        assert!(messages.contains(&"unable to load ':a' due to errors loading base spec".to_string()));
        assert!(messages.contains(&"encountered cyclic dependency while loading ':self'".to_string()));

        let errors = registry.load_errors(registry.lookup_proxy("a", "").unwrap());
        assert_eq!(errors.len(), 1);
        assert!(!errors[0].children.is_empty());
    }

    #[test]
    fn test_concurrent_loads_across_a_cycle() {
        let registry = build(&[
            ("", r#"{"Identifier": "a", "Type": "FileType", "BasedOn": "b"}"#),
            ("", r#"{"Identifier": "b", "Type": "FileType", "BasedOn": "a"}"#),
            ("", r#"{"Identifier": "c", "Type": "FileType", "BasedOn": "a"}"#),
            ("", r#"{"Identifier": "text", "Type": "FileType"}"#),
            ("", r#"{"Identifier": "source", "Type": "FileType", "BasedOn": "text"}"#),
        ]);
        let loaded: Vec<bool> = std::thread::scope(|s| {
            let handles: Vec<_> = ["a", "b", "c", "source", "b", "a"]
                .into_iter()
                .map(|identifier| {
                    let registry = &registry;
                    s.spawn(move || registry.get_spec(identifier, "").is_some())
                })
                .collect();
            handles.into_iter().map(|handle| handle.join().unwrap()).collect()
        });
        assert_eq!(loaded, [false, false, false, true, false, false]);

        let messages = messages(&registry);
        assert!(messages.contains(&"encountered cyclic dependency while loading ':b'".to_string()));
        assert!(messages.contains(&"unable to load ':c' due to errors loading base spec".to_string()));
        let errors = registry.load_errors(registry.lookup_proxy("c", "").unwrap());
        assert_eq!(errors[0].children[0].message, "unable to load ':a' due to errors loading base spec");
    }

    #[test]
    fn test_parse_errors_are_forwarded_and_discard_spec() {
        let registry = build(&[(
            "",
            r#"{"Identifier": "text", "Type": "FileType", "Extensions": 3, "Typo": 1}"#,
        )]);
        assert!(registry.get_spec("text", "").is_none());
        let diagnostics = registry.diagnostics();
        assert_eq!(
            diagnostics[0].message,
            "unexpected item: 3 while parsing key Extensions (expected array of strings) (while parsing 'text')"
        );
        assert_eq!(
            diagnostics[0].location,
            Some(Location::file("/specs/test.xcspec"))
        );
        assert_eq!(diagnostics[1].message, "unused key 'Typo' (while parsing 'text')");
        assert!(!diagnostics[1].is_error());
    }

    #[test]
    fn test_domain_search_and_shadowing() {
        let inclusions: BTreeMap<String, Vec<String>> =
            [("macosx".to_string(), vec!["darwin".to_string()])].into();
        let registry = build_with(
            RegistryBuilder::new().with_domain_inclusions(inclusions),
            &[
                ("", r#"{"Identifier": "text", "Type": "FileType"}"#),
                ("", r#"{"Identifier": "c", "Type": "FileType", "BasedOn": "text"}"#),
                ("darwin", r#"{"Identifier": "c", "Type": "FileType", "BasedOn": "default:text"}"#),
                ("linux", r#"{"Identifier": "elf", "Type": "FileType"}"#),
            ],
        );

        assert_eq!(registry.domain_search_list("macosx"), ["macosx", "darwin", ""]);
        assert_eq!(registry.domain_search_list(""), [""]);
        assert_eq!(registry.lookup_proxy("c", "macosx").unwrap().domain, "darwin");
        assert_eq!(registry.lookup_proxy("c", "linux").unwrap().domain, "");

        let found: Vec<String> = registry
            .find_proxies_in_subregistry(SpecType::FileType, "macosx", true)
            .iter()
            .map(|p| p.to_string())
            .collect();
        assert_eq!(found, ["darwin:c", ":text"]);

        let own: Vec<String> = registry
            .find_proxies_in_subregistry(SpecType::FileType, "linux", false)
            .iter()
            .map(|p| p.to_string())
            .collect();
        assert_eq!(own, ["linux:elf"]);
        assert_eq!(registry.domains(), ["", "darwin", "linux"]);
    }

    #[test]
    fn test_remaps_replace_declared_domain() {
        let remaps: BTreeMap<String, Vec<String>> =
            [("shared:tool".to_string(), vec!["a".to_string(), "b".to_string()])].into();
        let registry = build_with(
            RegistryBuilder::new().with_domain_remaps(remaps),
            &[
                ("shared", r#"{"Identifier": "tool", "Type": "FileType"}"#),
                ("", r#"{"Identifier": "com.apple.build-system.external", "Type": "BuildSystem"}"#),
            ],
        );
        assert!(registry.lookup_proxy("tool", "shared").is_none());
        assert_eq!(registry.lookup_proxy("tool", "a").unwrap().domain, "a");
        assert_eq!(registry.lookup_proxy("tool", "b").unwrap().domain, "b");
        assert_eq!(
            registry
                .lookup_proxy("com.apple.build-system.external", "embedded")
                .unwrap()
                .domain,
            "embedded"
        );
    }

    #[test]
    fn test_typed_lookups() {
        let registry = build(&[
            ("", r#"{"Identifier": "text", "Type": "FileType", "Extensions": ["txt"]}"#),
            ("", r#"{"Identifier": "bs", "Type": "BuildSystem"}"#),
        ]);
        assert!(registry.get_file_type("text", "").is_ok());
        assert!(registry.get_build_system("bs", "").is_ok());
        assert_eq!(
            registry.get_tool("text", "").unwrap_err(),
            SpecLoadingError::WrongType {
                identifier: "text".to_string(),
                domain: String::new(),
                expected: "command-line tool",
                actual: SpecType::FileType,
            }
        );
        assert_eq!(
            registry.get_tool("missing", "x").unwrap_err().to_string(),
            "spec 'x:missing' not found"
        );
        assert_eq!(
            registry
                .lookup_file_type_by_name("notes.TXT", "")
                .map(|spec| spec.identifier.clone()),
            Some("text".to_string())
        );
        assert!(registry.lookup_file_type_by_name("notes.md", "").is_none());
    }

    #[test]
    fn test_builtin_specs() {
        let mut builder = RegistryBuilder::new();
        builder.register_builtin(Spec::builtin(
            "builtin.text",
            SpecType::FileType,
            SpecKind::FileType(FileTypeSpec::default()),
        ));
        let registry = build_with(
            builder,
            &[("", r#"{"Identifier": "c", "Type": "FileType", "BasedOn": "text"}"#)],
        );
        let spec = registry.get_spec("builtin.text", "macosx").unwrap();
        assert_eq!(spec.path(), Path::new("<builtin>"));
    }

    #[test]
    #[should_panic(expected = "loaded twice")]
    fn test_builtin_installed_twice_panics() {
        let mut states = vec![LoadState::NotLoaded];
        let spec = || {
            Spec::builtin(
                "x",
                SpecType::FileType,
                SpecKind::FileType(FileTypeSpec::default()),
            )
        };
        install_builtin(&mut states, 0, spec());
        install_builtin(&mut states, 0, spec());
    }

    #[test]
    fn test_domain_inversion_validation() {
        let inclusions: BTreeMap<String, Vec<String>> =
            [("device".to_string(), vec![])].into();
        let registry = build_with(
            RegistryBuilder::new().with_domain_inclusions(inclusions),
            &[
                ("", r#"{"Identifier": "base", "Type": "FileType"}"#),
                ("device", r#"{"Identifier": "base", "Type": "FileType"}"#),
                ("", r#"{"Identifier": "child", "Type": "FileType", "BasedOn": "base"}"#),
            ],
        );

        let mut reports = Vec::new();
        assert!(registry.validate_spec_domain_inversion(|message| reports.push(message)));
        assert_eq!(
            reports,
            vec!["error: spec: when searching the domain 'device', ':child' is based on: 'base' which resolves to 'device:base' which is not in an included domain"]
        );
    }

    #[test]
    fn test_register_search_paths_and_localized_strings() {
        let tmp = TempDir::new().unwrap();
        let lproj = tmp.path().join("en.lproj");
        std::fs::create_dir_all(&lproj).unwrap();
        std::fs::write(
            tmp.path().join("types.xcspec"),
            r#"[{"Identifier": "text", "Type": "FileType", "Name": "Text"},
                {"Identifier": "c", "Type": "FileType", "BasedOn": "text"}]"#,
        )
        .unwrap();
        std::fs::write(tmp.path().join("broken.xcspec"), "{ nope").unwrap();
        std::fs::write(tmp.path().join(".hidden.xcspec"), "{ nope").unwrap();
        std::fs::write(lproj.join("Text.strings"), "{\"greeting\": \"hi\\r\\n\"}").unwrap();

        let builder = RegistryBuilder::new();
        builder.register_search_paths(&[SearchPath::new(tmp.path(), "")]);
        let registry = builder.freeze();

        assert_eq!(registry.len(), 2);
        let c = registry.get_spec("c", "").unwrap();
        assert_eq!(c.localized_string("greeting"), Some("hi\n"));
        assert_eq!(messages(&registry), vec!["unable to load spec data"]);
    }
}
