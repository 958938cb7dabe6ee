//! File type specs.

use std::path::Path;

use crate::core::parser::SpecParser;

/// A file type; conformance between types follows the `BasedOn` chain.
#[derive(Debug, Clone, Default)]
pub struct FileTypeSpec {
    /// Lowercased, without the leading dot.
    pub extensions: Vec<String>,
    /// Exact file names, such as `Makefile`.
    pub file_names: Vec<String>,
    pub is_text_file: bool,
    pub is_folder: bool,
    pub language: Option<String>,
}

impl FileTypeSpec {
    pub fn parse(parser: &mut SpecParser<'_>) -> FileTypeSpec {
        let extensions = parser
            .parse_own_string_list("Extensions")
            .unwrap_or_default()
            .into_iter()
            .map(|ext| ext.trim_start_matches('.').to_ascii_lowercase())
            .collect();
        let file_names = parser.parse_own_string_list("Filenames").unwrap_or_default();

        FileTypeSpec {
            extensions,
            file_names,
            is_text_file: parser.parse_bool("IsTextFile").unwrap_or(false),
            is_folder: parser.parse_bool("IsFolder").unwrap_or(false),
            language: parser.parse_string("Language"),
        }
    }

    /// Whether a file called `file_name` is of this type.
    pub fn matches_file_name(&self, file_name: &str) -> bool {
        if self.file_names.iter().any(|name| name == file_name) {
            return true;
        }
        Path::new(file_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                let ext = ext.to_ascii_lowercase();
                self.extensions.iter().any(|candidate| *candidate == ext)
            })
    }
}
