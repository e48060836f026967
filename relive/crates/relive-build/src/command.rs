//! Compile command assembly.
//!
//! Arguments are laid out in a fixed order of concerns:
//!
//! ```text
//! <compiler> [optimization] [module flags] [-I..] [-L..] -o <artifact>
//!            [compile options] [link options] <sources..> [-l..]
//! ```

use std::collections::BTreeSet;
use std::ffi::{OsStr, OsString};
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::config::{Optimization, ProjectConfig};

/// A fully assembled compiler invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileCommand {
    program: PathBuf,
    args: Vec<OsString>,
    output: PathBuf,
}

impl CompileCommand {
    pub fn assemble(
        config: &ProjectConfig,
        output: &Path,
        sources: &BTreeSet<PathBuf>,
        libraries: &BTreeSet<String>,
    ) -> Self {
        let flags = config.flag_style.flags();
        let mut args: Vec<OsString> = Vec::new();

        match config.optimization {
            Optimization::Debug => args.extend(flags.debug.iter().map(OsString::from)),
            Optimization::Perf => args.extend(flags.perf.iter().map(OsString::from)),
            Optimization::Default => {},
        }
        args.extend(flags.module.iter().map(OsString::from));

        for dir in &config.include_dirs {
            args.push(prefixed(&flags.include_dir, dir.as_os_str()));
        }
        for dir in &config.library_dirs {
            args.push(prefixed(&flags.library_dir, dir.as_os_str()));
        }

        args.push(OsString::from(&flags.output));
        args.push(output.as_os_str().to_os_string());

        args.extend(config.compile_options.iter().map(OsString::from));
        args.extend(config.link_options.iter().map(OsString::from));
        args.extend(sources.iter().map(|source| source.as_os_str().to_os_string()));
        for library in libraries {
            args.push(prefixed(&flags.library, OsStr::new(library)));
        }

        Self {
            program: config.compiler.clone(),
            args,
            output: output.to_path_buf(),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn args(&self) -> &[OsString] {
        &self.args
    }

    /// The artifact path the compiler was told to write.
    pub fn output(&self) -> &Path {
        &self.output
    }

    pub fn to_command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        command
    }
}

impl fmt::Display for CompileCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {}", arg.to_string_lossy())?;
        }
        Ok(())
    }
}

fn prefixed(prefix: &str, value: &OsStr) -> OsString {
    let mut arg = OsString::from(prefix);
    arg.push(value);
    arg
}
