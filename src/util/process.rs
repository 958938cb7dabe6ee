//! Subprocess execution and executable lookup.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use anyhow::{bail, Context, Result};

/// Builder for subprocess execution.
#[derive(Debug, Clone)]
pub struct ProcessBuilder {
    program: PathBuf,
    args: Vec<String>,
}

impl ProcessBuilder {
    /// Create a new process builder for the given program.
    pub fn new(program: impl AsRef<Path>) -> Self {
        ProcessBuilder {
            program: program.as_ref().to_path_buf(),
            args: Vec::new(),
        }
    }

    /// Build from an argv vector; the first element is the program.
    pub fn from_argv(argv: &[String]) -> Result<Self> {
        let Some((program, args)) = argv.split_first() else {
            bail!("cannot execute an empty command line");
        };
        Ok(Self::new(program).args(args))
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_string_lossy().into_owned());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args.extend(
            args.into_iter()
                .map(|s| s.as_ref().to_string_lossy().into_owned()),
        );
        self
    }

    fn build_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        cmd
    }

    /// Execute the command and wait for completion.
    pub fn exec(&self) -> Result<Output> {
        let mut cmd = self.build_command();
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        cmd.output()
            .with_context(|| format!("failed to spawn `{}`", self.program.display()))
    }

    /// Execute and require success.
    pub fn exec_and_check(&self) -> Result<Output> {
        let output = self.exec()?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "`{}` failed with exit code {:?}\n{}",
                self.display_command(),
                output.status.code(),
                stderr
            );
        }
        Ok(output)
    }

    /// Execute, require success, and return stdout as text.
    pub fn exec_stdout(&self) -> Result<String> {
        let output = self.exec_and_check()?;
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Display the command for error messages.
    pub fn display_command(&self) -> String {
        let mut parts = vec![self.program.display().to_string()];
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }
}

/// Find an executable in PATH.
pub fn find_executable(name: &str) -> Option<PathBuf> {
    which::which(name).ok()
}

/// Resolve `name` against an explicit search path, then `PATH`.
///
/// Absolute and relative paths containing a separator are returned as-is.
pub fn resolve_executable(name: &str, search_paths: &[PathBuf]) -> PathBuf {
    let candidate = Path::new(name);
    if candidate.is_absolute() || candidate.components().count() > 1 {
        return candidate.to_path_buf();
    }

    if !search_paths.is_empty() {
        if let Ok(found) = which::which_in(name, std::env::join_paths(search_paths).ok(), ".") {
            return found;
        }
    }

    find_executable(name).unwrap_or_else(|| candidate.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(unix)]
    fn test_process_builder() {
        let output = ProcessBuilder::new("echo").arg("hello").exec().unwrap();
        assert!(output.status.success());
        assert!(String::from_utf8_lossy(&output.stdout).contains("hello"));
    }

    #[test]
    fn test_display_command() {
        let pb = ProcessBuilder::new("clang").args(["-c", "-o", "x.o", "x.c"]);
        assert_eq!(pb.display_command(), "clang -c -o x.o x.c");
    }

    #[test]
    fn test_from_argv() {
        let pb = ProcessBuilder::from_argv(&["tool".into(), "--version".into()]).unwrap();
        assert_eq!(pb.display_command(), "tool --version");
        assert!(ProcessBuilder::from_argv(&[]).is_err());
    }

    #[test]
    fn test_resolve_executable_keeps_paths() {
        assert_eq!(
            resolve_executable("/usr/bin/tool", &[]),
            PathBuf::from("/usr/bin/tool")
        );
        assert_eq!(
            resolve_executable("definitely-not-a-real-tool-xyz", &[]),
            PathBuf::from("definitely-not-a-real-tool-xyz")
        );
    }
}
