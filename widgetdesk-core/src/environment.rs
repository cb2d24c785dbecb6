// widgetdesk-core/src/environment.rs
//! Isolated per-widget dependency environments.
//!
//! Each widget gets `<root>/<widget>/` with `bin/`, `lib/` and an
//! `environment.json` state file. The state file is what marks an
//! environment as provisioned; it also records every specifier that was
//! installed successfully so later activations skip them.

use crate::config::InstallerConfig;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tracing::{debug, info, warn};

pub const STATE_FILE: &str = "environment.json";
pub const ENV_VAR: &str = "WIDGETDESK_ENV";

#[derive(Debug, thiserror::Error)]
pub enum EnvironmentError {
    #[error("IO error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Corrupt environment state {path:?}: {source}")]
    State {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("Invalid widget name for an environment: {0:?}")]
    InvalidName(String),
    #[error("Environment for '{0}' has not been provisioned")]
    NotProvisioned(String),
    #[error("Failed to launch {program:?}: {source}")]
    Spawn {
        program: PathBuf,
        source: std::io::Error,
    },
    #[error("Installing '{spec}' for '{widget}' failed (exit code {status:?}): {stderr}")]
    InstallFailed {
        widget: String,
        spec: String,
        status: Option<i32>,
        stderr: String,
    },
}

/// On-disk state of one environment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentState {
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub installed: Vec<String>,
}

/// Handle to a provisioned environment directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Environment {
    pub name: String,
    pub root: PathBuf,
}

impl Environment {
    pub fn bin_dir(&self) -> PathBuf {
        self.root.join("bin")
    }

    pub fn lib_dir(&self) -> PathBuf {
        self.root.join("lib")
    }

    /// `<env>/bin/<program>` when present, otherwise `program` from `PATH`
    pub fn resolve(&self, program: &str) -> PathBuf {
        let local = self
            .bin_dir()
            .join(format!("{}{}", program, std::env::consts::EXE_SUFFIX));
        if local.is_file() {
            local
        } else {
            PathBuf::from(program)
        }
    }

    /// `PATH` with the environment's `bin/` in front
    fn search_path(&self) -> std::ffi::OsString {
        let mut dirs = vec![self.bin_dir()];
        if let Some(path) = std::env::var_os("PATH") {
            dirs.extend(std::env::split_paths(&path));
        }
        std::env::join_paths(dirs).unwrap_or_else(|_| self.bin_dir().into_os_string())
    }

    fn state_path(&self) -> PathBuf {
        self.root.join(STATE_FILE)
    }
}

/// Installs one dependency specifier into an environment
pub trait PackageInstaller: Send + Sync {
    fn install(&self, env: &Environment, spec: &str) -> Result<(), EnvironmentError>;
}

/// Runs the configured package manager as a subprocess
#[derive(Debug, Clone)]
pub struct CommandInstaller {
    program: String,
    args: Vec<String>,
}

impl CommandInstaller {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    pub fn from_config(config: &InstallerConfig) -> Self {
        Self::new(config.program.clone(), config.args.clone())
    }

    fn resolve_program(&self, env: &Environment) -> PathBuf {
        env.resolve(&self.program)
    }

    fn command(&self, env: &Environment, spec: &str) -> Command {
        let root = env.root.to_string_lossy();
        let mut command = Command::new(self.resolve_program(env));
        command
            .args(
                self.args
                    .iter()
                    .map(|arg| arg.replace("{spec}", spec).replace("{env}", &root)),
            )
            .current_dir(&env.root)
            .env(ENV_VAR, &env.root)
            .env("PATH", env.search_path());
        command
    }
}

impl PackageInstaller for CommandInstaller {
    fn install(&self, env: &Environment, spec: &str) -> Result<(), EnvironmentError> {
        let program = self.resolve_program(env);
        debug!(widget = %env.name, spec, program = %program.display(), "running installer");

        let output = self
            .command(env, spec)
            .output()
            .map_err(|source| EnvironmentError::Spawn {
                program: program.clone(),
                source,
            })?;

        if output.status.success() {
            return Ok(());
        }

        Err(EnvironmentError::InstallFailed {
            widget: env.name.clone(),
            spec: spec.to_string(),
            status: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

/// What `install_dependencies` did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallReport {
    pub installed: Vec<String>,
    pub skipped: Vec<String>,
}

pub struct EnvironmentProvisioner {
    root: PathBuf,
    runtime: String,
    installer: Box<dyn PackageInstaller>,
}

impl EnvironmentProvisioner {
    pub fn new(
        root: impl Into<PathBuf>,
        runtime: impl Into<String>,
        installer: Box<dyn PackageInstaller>,
    ) -> Self {
        Self {
            root: root.into(),
            runtime: runtime.into(),
            installer,
        }
    }

    pub fn from_config(root: impl Into<PathBuf>, config: &InstallerConfig) -> Self {
        Self::new(
            root,
            config.runtime.clone(),
            Box::new(CommandInstaller::from_config(config)),
        )
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn environment(&self, name: &str) -> Result<Environment, EnvironmentError> {
        validate_name(name)?;
        Ok(Environment {
            name: name.to_string(),
            root: self.root.join(name),
        })
    }

    pub fn is_provisioned(&self, name: &str) -> bool {
        self.environment(name)
            .map(|env| env.state_path().is_file())
            .unwrap_or(false)
    }

    /// Create the environment unless it already exists; returns its path
    pub fn ensure_environment(&self, name: &str) -> Result<PathBuf, EnvironmentError> {
        let env = self.environment(name)?;
        if env.state_path().is_file() {
            return Ok(env.root);
        }

        for dir in [env.bin_dir(), env.lib_dir()] {
            std::fs::create_dir_all(&dir).map_err(|source| EnvironmentError::Io {
                path: dir.clone(),
                source,
            })?;
        }

        write_state(
            &env,
            &EnvironmentState {
                created_at: Utc::now(),
                installed: Vec::new(),
            },
        )?;

        info!(widget = name, path = %env.root.display(), "environment created");
        Ok(env.root)
    }

    /// Ensure the environment, then install each specifier in order.
    ///
    /// Stops at the first failure. Specifiers installed before the failure
    /// stay recorded and are skipped next time.
    pub fn install_dependencies(
        &self,
        name: &str,
        deps: &[String],
    ) -> Result<InstallReport, EnvironmentError> {
        self.ensure_environment(name)?;
        let env = self.environment(name)?;
        let mut state = read_state(&env)?;
        let mut report = InstallReport::default();

        for spec in deps {
            if state.installed.iter().any(|s| s == spec) {
                report.skipped.push(spec.clone());
                continue;
            }

            if let Err(e) = self.installer.install(&env, spec) {
                warn!(widget = name, spec = %spec, error = %e, "dependency install failed");
                return Err(e);
            }

            info!(widget = name, spec = %spec, "dependency installed");
            state.installed.push(spec.clone());
            write_state(&env, &state)?;
            report.installed.push(spec.clone());
        }

        Ok(report)
    }

    /// Specifiers recorded as installed
    pub fn installed(&self, name: &str) -> Result<Vec<String>, EnvironmentError> {
        let env = self.environment(name)?;
        if !env.state_path().is_file() {
            return Err(EnvironmentError::NotProvisioned(name.to_string()));
        }
        Ok(read_state(&env)?.installed)
    }

    pub fn runtime_executable(&self, name: &str) -> Result<PathBuf, EnvironmentError> {
        let env = self.environment(name)?;
        if !env.state_path().is_file() {
            return Err(EnvironmentError::NotProvisioned(name.to_string()));
        }
        Ok(env.resolve(&self.runtime))
    }

    /// Run the environment's runtime with `args`, capturing its output
    pub fn run_in_environment(
        &self,
        name: &str,
        args: &[String],
    ) -> Result<Output, EnvironmentError> {
        let program = self.runtime_executable(name)?;
        let env = self.environment(name)?;

        Command::new(&program)
            .args(args)
            .current_dir(&env.root)
            .env(ENV_VAR, &env.root)
            .env("PATH", env.search_path())
            .output()
            .map_err(|source| EnvironmentError::Spawn { program, source })
    }
}

fn validate_name(name: &str) -> Result<(), EnvironmentError> {
    let bad = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\'])
        || Path::new(name).is_absolute();
    if bad {
        return Err(EnvironmentError::InvalidName(name.to_string()));
    }
    Ok(())
}

fn read_state(env: &Environment) -> Result<EnvironmentState, EnvironmentError> {
    let path = env.state_path();
    let content = std::fs::read_to_string(&path).map_err(|source| EnvironmentError::Io {
        path: path.clone(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| EnvironmentError::State { path, source })
}

fn write_state(env: &Environment, state: &EnvironmentState) -> Result<(), EnvironmentError> {
    let path = env.state_path();
    let content = serde_json::to_string_pretty(state).map_err(|source| EnvironmentError::State {
        path: path.clone(),
        source,
    })?;
    std::fs::write(&path, content).map_err(|source| EnvironmentError::Io { path, source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Recorder {
        calls: Arc<Mutex<Vec<String>>>,
        fail_on: Option<String>,
    }

    impl PackageInstaller for Recorder {
        fn install(&self, env: &Environment, spec: &str) -> Result<(), EnvironmentError> {
            self.calls.lock().unwrap().push(spec.to_string());
            if self.fail_on.as_deref() == Some(spec) {
                return Err(EnvironmentError::InstallFailed {
                    widget: env.name.clone(),
                    spec: spec.to_string(),
                    status: Some(1),
                    stderr: "no such package".to_string(),
                });
            }
            Ok(())
        }
    }

    fn provisioner(root: &Path, recorder: &Recorder) -> EnvironmentProvisioner {
        EnvironmentProvisioner::new(root, "python", Box::new(recorder.clone()))
    }

    fn specs(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_ensure_environment_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = Recorder::default();
        let envs = provisioner(dir.path(), &recorder);

        let path = envs.ensure_environment("clock").unwrap();
        assert!(path.join("bin").is_dir());
        assert!(path.join("lib").is_dir());
        let first = std::fs::read_to_string(path.join(STATE_FILE)).unwrap();

        assert_eq!(envs.ensure_environment("clock").unwrap(), path);
        let second = std::fs::read_to_string(path.join(STATE_FILE)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_install_in_order_and_skip_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = Recorder::default();
        let envs = provisioner(dir.path(), &recorder);

        let report = envs
            .install_dependencies("todo", &specs(&["a==1", "b>=2"]))
            .unwrap();
        assert_eq!(report.installed, specs(&["a==1", "b>=2"]));

        let report = envs
            .install_dependencies("todo", &specs(&["a==1", "c"]))
            .unwrap();
        assert_eq!(report.skipped, specs(&["a==1"]));
        assert_eq!(report.installed, specs(&["c"]));

        assert_eq!(*recorder.calls.lock().unwrap(), specs(&["a==1", "b>=2", "c"]));
        assert_eq!(envs.installed("todo").unwrap(), specs(&["a==1", "b>=2", "c"]));
    }

    #[test]
    fn test_failed_install_keeps_partial_progress() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = Recorder {
            fail_on: Some("broken".to_string()),
            ..Recorder::default()
        };
        let envs = provisioner(dir.path(), &recorder);

        let err = envs
            .install_dependencies("chat", &specs(&["ok", "broken", "never"]))
            .unwrap_err();
        assert!(matches!(err, EnvironmentError::InstallFailed { ref spec, .. } if spec == "broken"));
        assert_eq!(envs.installed("chat").unwrap(), specs(&["ok"]));
        assert_eq!(*recorder.calls.lock().unwrap(), specs(&["ok", "broken"]));
    }

    #[test]
    fn test_runtime_requires_provisioning() {
        let dir = tempfile::tempdir().unwrap();
        let envs = provisioner(dir.path(), &Recorder::default());

        assert!(matches!(
            envs.runtime_executable("clock"),
            Err(EnvironmentError::NotProvisioned(_))
        ));

        let root = envs.ensure_environment("clock").unwrap();
        assert_eq!(
            envs.runtime_executable("clock").unwrap(),
            PathBuf::from("python")
        );

        let local = root
            .join("bin")
            .join(format!("python{}", std::env::consts::EXE_SUFFIX));
        std::fs::write(&local, "").unwrap();
        assert_eq!(envs.runtime_executable("clock").unwrap(), local);
    }

    #[cfg(unix)]
    #[test]
    fn test_default_installer_targets_the_environment() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let envs = EnvironmentProvisioner::from_config(dir.path(), &InstallerConfig::default());
        let root = envs.ensure_environment("clock").unwrap();

        // Stand-in package manager that records its argv
        let pip = root.join("bin").join("pip");
        std::fs::write(&pip, "#!/bin/sh\necho \"$@\" >> \"$WIDGETDESK_ENV/argv.txt\"\n").unwrap();
        std::fs::set_permissions(&pip, std::fs::Permissions::from_mode(0o755)).unwrap();

        envs.install_dependencies("clock", &specs(&["requests==2.28.1"]))
            .unwrap();

        let argv = std::fs::read_to_string(root.join("argv.txt")).unwrap();
        assert_eq!(
            argv.trim(),
            format!("install --prefix {} requests==2.28.1", root.display())
        );
    }

    #[test]
    fn test_rejects_path_like_names() {
        let dir = tempfile::tempdir().unwrap();
        let envs = provisioner(dir.path(), &Recorder::default());

        for name in ["", "..", "../escape", "a/b", "a\\b"] {
            assert!(matches!(
                envs.ensure_environment(name),
                Err(EnvironmentError::InvalidName(_))
            ));
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_command_installer_runs_in_environment() {
        let dir = tempfile::tempdir().unwrap();
        let installer = CommandInstaller::new(
            "sh",
            specs(&["-c", "echo \"$0\" > installed.txt", "{spec}"]),
        );
        let envs = EnvironmentProvisioner::new(dir.path(), "python", Box::new(installer));

        envs.install_dependencies("clock", &specs(&["requests==2.28.1"]))
            .unwrap();

        let written = std::fs::read_to_string(dir.path().join("clock").join("installed.txt")).unwrap();
        assert_eq!(written.trim(), "requests==2.28.1");
    }

    #[cfg(unix)]
    #[test]
    fn test_command_installer_nonzero_exit_fails() {
        let dir = tempfile::tempdir().unwrap();
        let installer = CommandInstaller::new("sh", specs(&["-c", "echo nope >&2; exit 3"]));
        let envs = EnvironmentProvisioner::new(dir.path(), "python", Box::new(installer));

        let err = envs
            .install_dependencies("clock", &specs(&["requests"]))
            .unwrap_err();
        match err {
            EnvironmentError::InstallFailed { status, stderr, .. } => {
                assert_eq!(status, Some(3));
                assert_eq!(stderr, "nope");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_run_in_environment_uses_env_runtime() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let recorder = Recorder::default();
        let envs = EnvironmentProvisioner::new(dir.path(), "runtime", Box::new(recorder));

        assert!(matches!(
            envs.run_in_environment("clock", &[]),
            Err(EnvironmentError::NotProvisioned(_))
        ));

        let root = envs.ensure_environment("clock").unwrap();
        let script = root.join("bin").join("runtime");
        std::fs::write(&script, "#!/bin/sh\necho \"$1 $WIDGETDESK_ENV\"\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let output = envs
            .run_in_environment("clock", &specs(&["hello"]))
            .unwrap();
        assert!(output.status.success());
        let stdout = String::from_utf8_lossy(&output.stdout);
        assert_eq!(stdout.trim(), format!("hello {}", root.display()));
    }
}
