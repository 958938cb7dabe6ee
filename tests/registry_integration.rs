//! Library-level tests: specs loaded from disk, resolved across domains and
//! used to construct tasks.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use specforge::builder::{CollectingDelegate, CommandBuildContext};
use specforge::builder::context::RegistryProducer;
use specforge::core::macros::MacroScope;
use specforge::core::SpecType;
use specforge::util::config::{Config, SearchPath};
use specforge::{RegistryBuilder, SpecRegistry};
use tempfile::TempDir;

fn write(root: &Path, relative: &str, contents: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

fn search_path(path: &Path, domain: &str) -> SearchPath {
    SearchPath {
        path: path.to_path_buf(),
        domain: domain.to_string(),
    }
}

fn load(config: &Config) -> SpecRegistry {
    let builder = RegistryBuilder::from_config(config);
    builder.register_search_paths(&config.search_paths);
    builder.freeze()
}

/// Two domains: `darwin` holds a compiler, `iphoneos` includes `darwin`
/// and refines the compiler.
fn platform_fixture() -> (TempDir, Config) {
    let tmp = TempDir::new().unwrap();
    write(
        tmp.path(),
        "darwin/Compilers.xcspec",
        r#"[
            {
                "Identifier": "org.test.cc",
                "Type": "Compiler",
                "Name": "Test Compiler",
                "CommandLine": "/usr/bin/cc [options] -c [input] -o [output]",
                "RuleName": "CompileC [output] [input]",
                "Outputs": ["$(OBJECT_FILE_DIR)/$(InputFileBase).o"],
                "Options": [
                    {"Name": "OPTIMIZATION", "Type": "Enumeration", "Values": ["0", "s"], "DefaultValue": "0", "CommandLineArgs": ["-O$(value)"]},
                    {"Name": "WARNINGS", "Type": "Boolean", "DefaultValue": "NO", "CommandLineFlag": "-Wall"}
                ]
            },
            {"Identifier": "public.c", "Type": "FileType", "Extensions": ["c"]}
        ]"#,
    );
    write(
        tmp.path(),
        "iphoneos/Compilers.xcspec",
        r#"[
            {
                "Identifier": "org.test.cc.ios",
                "Type": "Compiler",
                "BasedOn": "darwin:org.test.cc",
                "Options": [
                    {"Name": "TARGET", "Type": "String", "DefaultValue": "arm64-apple-ios", "CommandLineArgs": ["-target", "$(value)"]}
                ]
            }
        ]"#,
    );

    let config = Config {
        search_paths: vec![
            search_path(&tmp.path().join("darwin"), "darwin"),
            search_path(&tmp.path().join("iphoneos"), "iphoneos"),
        ],
        domain_inclusions: BTreeMap::from([("iphoneos".to_string(), vec!["darwin".to_string()])]),
        ..Default::default()
    };
    (tmp, config)
}

#[test]
fn test_included_domains_are_searched() {
    let (_tmp, config) = platform_fixture();
    let registry = load(&config);

    assert_eq!(registry.len(), 3);
    assert_eq!(registry.domain_search_list("iphoneos"), ["iphoneos", "darwin", ""]);

    assert!(registry.get_tool("org.test.cc", "iphoneos").is_ok());
    assert!(registry.get_tool("org.test.cc", "").is_err());
    assert!(registry.lookup_proxy("org.test.cc.ios", "darwin").is_none());

    let compilers = registry.find_specs(SpecType::Compiler, "iphoneos", true);
    let mut identifiers: Vec<&str> = compilers.iter().map(|spec| spec.identifier.as_str()).collect();
    identifiers.sort_unstable();
    assert_eq!(identifiers, ["org.test.cc", "org.test.cc.ios"]);
}

#[test]
fn test_derived_tool_inherits_options_and_templates() {
    let (_tmp, config) = platform_fixture();
    let registry = load(&config);

    let spec = registry.get_tool("org.test.cc.ios", "iphoneos").unwrap();
    let chain: Vec<String> = spec.base_chain().map(|s| s.specifier()).collect();
    assert_eq!(chain, ["iphoneos:org.test.cc.ios", "darwin:org.test.cc"]);

    let options = spec.property_domain().unwrap();
    let names: Vec<&str> = options
        .flattened_ordered_options()
        .iter()
        .map(|option| option.name.as_str())
        .collect();
    assert_eq!(names, ["OPTIMIZATION", "WARNINGS", "TARGET"]);
    assert_eq!(options.options.len(), 1);
}

#[test]
fn test_construct_task_from_loaded_specs() {
    let (tmp, config) = platform_fixture();
    let registry = Arc::new(load(&config));
    let spec = registry.get_tool("org.test.cc.ios", "iphoneos").unwrap();
    let tool = spec.as_tool().unwrap();

    let producer = RegistryProducer::new(registry.clone(), "iphoneos").with_working_directory(tmp.path());
    let scope = MacroScope::new()
        .with("OBJECT_FILE_DIR", "/build/obj")
        .with("OPTIMIZATION", "s")
        .with("WARNINGS", "YES");
    let cbc = CommandBuildContext::new(&producer, &scope)
        .with_inputs(vec![producer.file_to_build(tmp.path().join("main.c"))]);

    let mut delegate = CollectingDelegate::new();
    tool.construct_tasks(&cbc, &mut delegate);

    assert!(!delegate.diagnostics.has_errors());
    assert_eq!(delegate.tasks.len(), 1);
    let task = &delegate.tasks[0];
    let input = tmp.path().join("main.c").display().to_string();
    assert_eq!(
        task.command_line,
        [
            "/usr/bin/cc",
            "-Os",
            "-Wall",
            "-target",
            "arm64-apple-ios",
            "-c",
            input.as_str(),
            "-o",
            "/build/obj/main.o",
        ]
    );
    assert_eq!(task.rule_info, ["CompileC", "/build/obj/main.o", input.as_str()]);
    assert_eq!(task.tool_identifier, "org.test.cc.ios");
}

#[test]
fn test_localized_option_names() {
    let tmp = TempDir::new().unwrap();
    write(
        tmp.path(),
        "specs/Echo.xcspec",
        r#"{
            "Identifier": "org.test.echo",
            "Type": "Tool",
            "Name": "Echo",
            "CommandLine": "/bin/echo [options]",
            "RuleName": "Echo",
            "Options": [
                {"Name": "VERBOSE", "Type": "Boolean", "CommandLineFlag": "-v"},
                {"Name": "QUIET", "Type": "Boolean", "DisplayName": "Be Quiet", "CommandLineFlag": "-q"}
            ]
        }"#,
    );
    write(
        tmp.path(),
        "specs/en.lproj/Echo.strings",
        r#"{
            "[VERBOSE]-name": "Verbose Output",
            "[VERBOSE]-description": "Print every step.",
            "[QUIET]-name": "Silent"
        }"#,
    );

    let config = Config {
        search_paths: vec![search_path(&tmp.path().join("specs"), "")],
        ..Default::default()
    };
    let registry = load(&config);
    assert!(registry.diagnostics().iter().all(|d| !d.is_error()));

    let spec = registry.get_tool("org.test.echo", "").unwrap();
    let options = spec.property_domain().unwrap();

    let verbose = options.option("VERBOSE").unwrap();
    assert_eq!(verbose.display_name, "Verbose Output");
    assert_eq!(verbose.description.as_deref(), Some("Print every step."));
    // An explicit DisplayName wins over the strings file
    assert_eq!(options.option("QUIET").unwrap().display_name, "Be Quiet");
}

#[test]
fn test_domain_inversion_is_reported() {
    let tmp = TempDir::new().unwrap();
    write(
        tmp.path(),
        "common/Tools.xcspec",
        r#"[
            {"Identifier": "org.test.base", "Type": "Tool", "CommandLine": "/bin/true", "RuleName": "Base"},
            {"Identifier": "org.test.derived", "Type": "Tool", "BasedOn": "org.test.base"}
        ]"#,
    );
    write(
        tmp.path(),
        "device/Tools.xcspec",
        r#"{"Identifier": "org.test.base", "Type": "Tool", "CommandLine": "/bin/false", "RuleName": "Device"}"#,
    );

    let config = Config {
        search_paths: vec![
            search_path(&tmp.path().join("common"), ""),
            search_path(&tmp.path().join("device"), "device"),
        ],
        ..Default::default()
    };
    let registry = load(&config);

    // From `device`, the default-domain spec's bare base resolves into `device`
    let mut messages = Vec::new();
    assert!(registry.validate_spec_domain_inversion(|message| messages.push(message)));
    assert_eq!(messages.len(), 1);
    assert!(messages[0].contains("when searching the domain 'device'"));
    assert!(messages[0].contains("':org.test.derived'"));
    assert!(messages[0].contains("resolves to 'device:org.test.base'"));
}

#[test]
fn test_concurrent_loads_share_one_spec() {
    let (_tmp, config) = platform_fixture();
    let registry = load(&config);
    let proxy = registry.lookup_proxy("org.test.cc.ios", "iphoneos").unwrap();

    let loaded: Vec<_> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..8)
            .map(|_| s.spawn(|| registry.load(proxy).unwrap()))
            .collect();
        handles.into_iter().map(|handle| handle.join().unwrap()).collect()
    });

    assert!(loaded.windows(2).all(|pair| Arc::ptr_eq(&pair[0], &pair[1])));
    let base = registry.get_spec("org.test.cc", "darwin").unwrap();
    assert!(Arc::ptr_eq(loaded[0].base.as_ref().unwrap(), &base));
}
