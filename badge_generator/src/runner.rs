//! Subprocess execution seam.
//!
//! Every external tool the generator talks to (`nim`, `testament`, `lcov`,
//! `genhtml`, `date`, compiled test binaries) goes through [`CommandRunner`],
//! so the parsing and aggregation logic can be exercised against scripted
//! output instead of a real Nim toolchain.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::debug;

use crate::error::{BadgeError, BadgeResult};

/// A program invocation: executable, arguments and working directory.
///
/// Arguments are passed verbatim, no shell is involved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    program: String,
    args: Vec<String>,
    cwd: Option<PathBuf>,
}

impl ToolCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
        }
    }

    pub fn arg(mut self, arg: impl AsRef<str>) -> Self {
        self.args.push(arg.as_ref().to_string());
        self
    }

    pub fn path_arg(self, path: &Path) -> Self {
        let arg = path.display().to_string();
        self.arg(arg)
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_string()));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn arguments(&self) -> &[String] {
        &self.args
    }

    pub fn working_dir(&self) -> Option<&Path> {
        self.cwd.as_deref()
    }
}

impl fmt::Display for ToolCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Exit code and captured streams of a finished process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `-1` when the process was terminated by a signal.
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == 0
    }

    /// Stdout followed by stderr.
    pub fn combined(&self) -> String {
        let mut text = String::with_capacity(self.stdout.len() + self.stderr.len() + 1);
        text.push_str(&self.stdout);
        if !self.stdout.is_empty() && !self.stdout.ends_with('\n') && !self.stderr.is_empty() {
            text.push('\n');
        }
        text.push_str(&self.stderr);
        text
    }
}

pub trait CommandRunner {
    /// Run the command to completion. An `Err` means the process could not
    /// be started at all; a non-zero exit is reported through the output.
    fn run(&self, command: &ToolCommand) -> BadgeResult<CommandOutput>;

    /// Resolve a program on `PATH`.
    fn locate(&self, program: &str) -> Option<PathBuf>;

    fn is_available(&self, program: &str) -> bool {
        self.locate(program).is_some()
    }
}

/// Runs commands as real blocking subprocesses.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, command: &ToolCommand) -> BadgeResult<CommandOutput> {
        debug!(command = %command, "Running external command");

        let mut cmd = Command::new(command.program());
        cmd.args(command.arguments());
        if let Some(dir) = command.working_dir() {
            cmd.current_dir(dir);
        }

        let output = cmd
            .output()
            .map_err(|err| BadgeError::spawn(command.program(), err))?;

        Ok(CommandOutput {
            code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    fn locate(&self, program: &str) -> Option<PathBuf> {
        which::which(program).ok()
    }
}

#[cfg(test)]
pub(crate) mod scripted {
    use std::cell::RefCell;
    use std::collections::HashSet;
    use std::io;
    use std::path::PathBuf;

    use super::*;

    struct Rule {
        prefix: String,
        output: CommandOutput,
        creates: Option<PathBuf>,
        executable: bool,
    }

    /// Answers commands from a list of prefix rules and records every call.
    /// Unmatched commands fail to spawn, like a missing executable.
    #[derive(Default)]
    pub(crate) struct ScriptedRunner {
        rules: Vec<Rule>,
        available: HashSet<String>,
        calls: RefCell<Vec<String>>,
    }

    impl ScriptedRunner {
        pub(crate) fn new() -> Self {
            Self::default()
        }

        pub(crate) fn with_tool(mut self, program: &str) -> Self {
            self.available.insert(program.to_string());
            self
        }

        pub(crate) fn on(mut self, prefix: &str, code: i32, stdout: &str, stderr: &str) -> Self {
            self.rules.push(Rule {
                prefix: prefix.to_string(),
                output: CommandOutput {
                    code,
                    stdout: stdout.to_string(),
                    stderr: stderr.to_string(),
                },
                creates: None,
                executable: false,
            });
            self
        }

        pub(crate) fn on_creating(mut self, prefix: &str, code: i32, creates: PathBuf) -> Self {
            self.rules.push(Rule {
                prefix: prefix.to_string(),
                output: CommandOutput {
                    code,
                    ..CommandOutput::default()
                },
                creates: Some(creates),
                executable: false,
            });
            self
        }

        /// Like [`Self::on_creating`], but the file is marked executable, as
        /// a compiler output would be.
        pub(crate) fn on_building(mut self, prefix: &str, code: i32, binary: PathBuf) -> Self {
            self = self.on_creating(prefix, code, binary);
            if let Some(rule) = self.rules.last_mut() {
                rule.executable = true;
            }
            self
        }

        pub(crate) fn calls(&self) -> Vec<String> {
            self.calls.borrow().clone()
        }

        pub(crate) fn called(&self, prefix: &str) -> bool {
            self.calls.borrow().iter().any(|c| c.starts_with(prefix))
        }
    }

    impl CommandRunner for ScriptedRunner {
        fn run(&self, command: &ToolCommand) -> BadgeResult<CommandOutput> {
            let line = command.to_string();
            self.calls.borrow_mut().push(line.clone());

            let Some(rule) = self.rules.iter().find(|r| line.starts_with(&r.prefix)) else {
                return Err(BadgeError::spawn(
                    command.program(),
                    io::Error::from(io::ErrorKind::NotFound),
                ));
            };
            if let Some(path) = &rule.creates {
                std::fs::write(path, "TN:\n").map_err(|e| BadgeError::io(path, e))?;
                #[cfg(unix)]
                if rule.executable {
                    use std::os::unix::fs::PermissionsExt;
                    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
                        .map_err(|e| BadgeError::io(path, e))?;
                }
            }
            Ok(rule.output.clone())
        }

        fn locate(&self, program: &str) -> Option<PathBuf> {
            self.available
                .contains(program)
                .then(|| PathBuf::from("/usr/bin").join(program))
        }
    }
}
