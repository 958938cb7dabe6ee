//! Input and output variables visible while constructing one task.

use std::cell::RefCell;
use std::path::{Path, PathBuf};

use crate::builder::context::{CommandBuildContext, FileToBuild};
use crate::core::macros::{builtin, MacroLookup, MacroString, MacroStringList, MacroValue};
use crate::util::diagnostic::{Diagnostic, Diagnostics};
use crate::util::fs::relative_subpath;

/// Build directories `OutputRelativePath` is expressed against, most
/// specific first.
const OUTPUT_ROOTS: &[&str] = &[
    "TARGET_BUILD_DIR",
    "CONFIGURATION_BUILD_DIR",
    "BUILT_PRODUCTS_DIR",
    "SYMROOT",
    "OBJROOT",
    "DERIVED_DATA_DIR",
];

/// Resolves the variables a tool's templates use to talk about the task at
/// hand: `InputFileName`, `OutputPath`, resource directories and so on.
///
/// Uses of an input variable in a task without inputs (or an output variable
/// without outputs) resolve to the empty string and are reported once.
pub struct ToolLookup<'a> {
    identifier: &'a str,
    cbc: &'a CommandBuildContext<'a>,
    evaluated_output: Option<PathBuf>,
    warnings: RefCell<Diagnostics>,
}

impl<'a> ToolLookup<'a> {
    pub fn new(identifier: &'a str, cbc: &'a CommandBuildContext<'a>) -> Self {
        ToolLookup {
            identifier,
            cbc,
            evaluated_output: None,
            warnings: RefCell::new(Diagnostics::new()),
        }
    }

    /// Bind `OutputPath` to the first evaluated output.
    pub fn with_output(mut self, output: Option<PathBuf>) -> Self {
        self.evaluated_output = output;
        self
    }

    /// Warnings recorded so far.
    pub fn take_warnings(&self) -> Vec<Diagnostic> {
        std::mem::take(&mut *self.warnings.borrow_mut()).into_vec()
    }

    fn warn_once(&self, message: String) {
        let mut warnings = self.warnings.borrow_mut();
        if !warnings.iter().any(|warning| warning.message == message) {
            warnings.push(Diagnostic::warning(message));
        }
    }

    fn input(&self, name: &str) -> Option<&FileToBuild> {
        let input = self.cbc.inputs.first();
        if input.is_none() {
            self.warn_once(format!(
                "Unexpected use of {} in a task with no inputs in spec {}.",
                name, self.identifier
            ));
        }
        input
    }

    fn output(&self, name: &str) -> Option<PathBuf> {
        let output = self
            .evaluated_output
            .clone()
            .or_else(|| self.cbc.outputs.first().cloned());
        if output.is_none() {
            self.warn_once(format!(
                "Unexpected use of {} in a task with no outputs in spec {}.",
                name, self.identifier
            ));
        }
        output
    }

    fn input_string(&self, name: &str, f: impl FnOnce(&FileToBuild) -> String) -> MacroValue {
        MacroValue::literal(self.input(name).map(f).unwrap_or_default())
    }

    /// `$(ROOT)/relative` for the first build root containing `output`.
    fn output_relative_path(&self, output: &Path) -> String {
        for root in OUTPUT_ROOTS {
            let value = self.cbc.scope.lookup_string(root, &Default::default());
            let Some(relative) = relative_subpath(output, Path::new(&value)) else {
                continue;
            };
            return if relative.as_os_str().is_empty() {
                format!("$({})", root)
            } else {
                format!("$({})/{}", root, relative.display())
            };
        }
        output.display().to_string()
    }
}

fn display(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn file_base(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

impl MacroLookup for ToolLookup<'_> {
    fn lookup(&self, name: &str) -> Option<MacroValue> {
        let value = match name {
            "DERIVED_FILE_DIR" => {
                MacroValue::String(MacroString::reference(builtin::DERIVED_SOURCES_DIR))
            }
            "InputFile" | "InputFilePath" | "InputPath" => {
                self.input_string(name, |input| display(input.path()))
            }
            "InputFileDir" => self.input_string(name, |input| {
                input.path().parent().map(display).unwrap_or_default()
            }),
            "InputFileName" => self.input_string(name, |input| file_name(input.path())),
            "InputFileBase" => self.input_string(name, |input| file_base(input.path())),
            "InputFileRegionPathComponent" => {
                self.input_string(name, FileToBuild::region_path_component)
            }
            "InputFileRelativePath" => {
                let cwd = self.cbc.producer.default_working_directory();
                self.input_string(name, |input| {
                    relative_subpath(input.path(), &cwd)
                        .map(|relative| display(&relative))
                        .unwrap_or_else(|| display(input.path()))
                })
            }
            "InputFileSuffix" => self.input_string(name, |input| {
                input
                    .path()
                    .extension()
                    .map(|ext| format!(".{}", ext.to_string_lossy()))
                    .unwrap_or_default()
            }),
            "InputFileTextEncoding" => MacroValue::literal(""),
            "OutputFileBase" => {
                MacroValue::literal(self.output(name).map(|o| file_base(&o)).unwrap_or_default())
            }
            builtin::OUTPUT_PATH | "OutputFile" => {
                MacroValue::literal(self.output(name).map(|o| display(&o)).unwrap_or_default())
            }
            "OutputRelativePath" => MacroValue::literal(
                self.output(name)
                    .map(|o| self.output_relative_path(&o))
                    .unwrap_or_default(),
            ),
            "ProductResourcesDir" => {
                MacroValue::literal(self.cbc.resources_dir.as_deref().map(display)?)
            }
            "TempResourcesDir" => {
                MacroValue::literal(self.cbc.tmp_resources_dir.as_deref().map(display)?)
            }
            "UnlocalizedProductResourcesDir" => {
                MacroValue::literal(self.cbc.unlocalized_resources_dir.as_deref().map(display)?)
            }
            "build_file_compiler_flags" => MacroValue::List(
                self.cbc
                    .inputs
                    .first()
                    .and_then(|input| input.additional_args.clone())
                    .unwrap_or_else(MacroStringList::default),
            ),
            _ => return None,
        };
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::context::CommandProducer;
    use crate::core::macros::{LookupChain, MacroScope};
    use crate::core::spec::Spec;
    use std::sync::Arc;

    struct Producer;

    impl CommandProducer for Producer {
        fn lookup_file_type(&self, _identifier: &str) -> Option<Arc<Spec>> {
            None
        }

        fn default_working_directory(&self) -> PathBuf {
            PathBuf::from("/src")
        }
    }

    fn evaluate(scope: &MacroScope, lookup: &ToolLookup<'_>, text: &str) -> String {
        let chain = LookupChain::new().then(lookup);
        scope.evaluate_string(&MacroString::parse(text).unwrap(), &chain)
    }

    #[test]
    fn test_input_variables() {
        let scope = MacroScope::new();
        let cbc = CommandBuildContext::new(&Producer, &scope)
            .with_inputs(vec![FileToBuild::new("/src/ui/View.xib").with_region("en")]);
        let lookup = ToolLookup::new("t", &cbc);

        assert_eq!(evaluate(&scope, &lookup, "$(InputFileName)"), "View.xib");
        assert_eq!(evaluate(&scope, &lookup, "$(InputFileBase)"), "View");
        assert_eq!(evaluate(&scope, &lookup, "$(InputFileSuffix)"), ".xib");
        assert_eq!(evaluate(&scope, &lookup, "$(InputFileDir)"), "/src/ui");
        assert_eq!(evaluate(&scope, &lookup, "$(InputFileRelativePath)"), "ui/View.xib");
        assert_eq!(evaluate(&scope, &lookup, "$(InputFileRegionPathComponent)"), "en.lproj/");
        assert!(lookup.take_warnings().is_empty());
    }

    #[test]
    fn test_output_variables() {
        let scope = MacroScope::new().with("TARGET_BUILD_DIR", "/build/Debug");
        let cbc = CommandBuildContext::new(&Producer, &scope);
        let lookup = ToolLookup::new("t", &cbc).with_output(Some(PathBuf::from("/build/Debug/a/b.o")));

        assert_eq!(evaluate(&scope, &lookup, "$(OutputPath)"), "/build/Debug/a/b.o");
        assert_eq!(evaluate(&scope, &lookup, "$(OutputFileBase)"), "b");
        assert_eq!(evaluate(&scope, &lookup, "$(OutputRelativePath)"), "$(TARGET_BUILD_DIR)/a/b.o");
    }

    #[test]
    fn test_missing_input_warns_once() {
        let scope = MacroScope::new();
        let cbc = CommandBuildContext::new(&Producer, &scope);
        let lookup = ToolLookup::new("org.test.tool", &cbc);

        assert_eq!(evaluate(&scope, &lookup, "$(InputFileName) $(InputFileName)"), " ");
        assert_eq!(evaluate(&scope, &lookup, "$(OutputPath)"), "");
        let warnings: Vec<String> = lookup.take_warnings().into_iter().map(|w| w.message).collect();
        assert_eq!(
            warnings,
            [
                "Unexpected use of InputFileName in a task with no inputs in spec org.test.tool.",
                "Unexpected use of OutputPath in a task with no outputs in spec org.test.tool.",
            ]
        );
    }

    #[test]
    fn test_unknown_names_fall_through() {
        let scope = MacroScope::new().with("OTHER", "x");
        let cbc = CommandBuildContext::new(&Producer, &scope);
        let lookup = ToolLookup::new("t", &cbc);
        assert_eq!(evaluate(&scope, &lookup, "$(OTHER)"), "x");
        assert!(lookup.lookup("ProductResourcesDir").is_none());
    }
}
