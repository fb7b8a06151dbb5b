// src/service/unit.rs
//
// install | remove | start | stop | status via systemd.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::core::ServiceError;

pub const DEFAULT_UNIT_DIR: &str = "/etc/systemd/system";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CtlOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

pub trait SystemCtl {
    /// Runs `systemctl <args>`; `Err` only if it could not be run at all.
    fn run(&self, args: &[&str]) -> Result<CtlOutput, ServiceError>;
}

pub struct Systemd;

impl SystemCtl for Systemd {
    fn run(&self, args: &[&str]) -> Result<CtlOutput, ServiceError> {
        let output = Command::new("systemctl")
            .args(args)
            .output()
            .map_err(|e| ServiceError::io(format!("running systemctl {}", args.join(" ")), e))?;

        Ok(CtlOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).trim().to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct UnitSpec {
    pub name: String,
    pub description: String,
    pub exec: PathBuf,
    pub config: PathBuf,
}

pub fn render_unit(spec: &UnitSpec) -> String {
    format!(
        "[Unit]\n\
         Description={description}\n\
         After=local-fs.target\n\
         \n\
         [Service]\n\
         Type=simple\n\
         ExecStart={exec} --config {config} run\n\
         Restart=on-failure\n\
         RestartSec=5\n\
         \n\
         [Install]\n\
         WantedBy=multi-user.target\n",
        description = spec.description,
        exec = quote(&spec.exec),
        config = quote(&spec.config),
    )
}

fn quote(path: &Path) -> String {
    let s = path.display().to_string();
    if s.chars().any(char::is_whitespace) {
        format!("\"{}\"", s)
    } else {
        s
    }
}

pub struct ServiceManager<C: SystemCtl> {
    ctl: C,
    unit_dir: PathBuf,
    spec: UnitSpec,
}

impl<C: SystemCtl> ServiceManager<C> {
    pub fn new(ctl: C, unit_dir: impl Into<PathBuf>, spec: UnitSpec) -> Self {
        Self {
            ctl,
            unit_dir: unit_dir.into(),
            spec,
        }
    }

    pub fn unit_path(&self) -> PathBuf {
        self.unit_dir.join(format!("{}.service", self.spec.name))
    }

    pub fn is_installed(&self) -> bool {
        self.unit_path().exists()
    }

    pub fn install(&self) -> Result<String, ServiceError> {
        let path = self.unit_path();
        if path.exists() {
            return Err(ServiceError::AlreadyInstalled {
                name: self.spec.name.clone(),
                path,
            });
        }

        fs::write(&path, render_unit(&self.spec))
            .map_err(|e| ServiceError::io(format!("writing {}", path.display()), e))?;
        self.systemctl(&["daemon-reload"])?;
        self.systemctl(&["enable", &self.spec.name])?;

        Ok(format!("Install {}:\t\t\t[  OK  ]", self.spec.description))
    }

    pub fn remove(&self) -> Result<String, ServiceError> {
        self.require_installed()?;

        self.systemctl(&["disable", &self.spec.name])?;
        let path = self.unit_path();
        fs::remove_file(&path)
            .map_err(|e| ServiceError::io(format!("removing {}", path.display()), e))?;
        self.systemctl(&["daemon-reload"])?;

        Ok(format!("Removing {}:\t\t\t[  OK  ]", self.spec.description))
    }

    pub fn start(&self) -> Result<String, ServiceError> {
        self.require_installed()?;
        self.systemctl(&["start", &self.spec.name])?;
        Ok(format!("Starting {}:\t\t\t[  OK  ]", self.spec.description))
    }

    pub fn stop(&self) -> Result<String, ServiceError> {
        self.require_installed()?;
        self.systemctl(&["stop", &self.spec.name])?;
        Ok(format!("Stopping {}:\t\t\t[  OK  ]", self.spec.description))
    }

    pub fn status(&self) -> Result<String, ServiceError> {
        if !self.is_installed() {
            return Ok(format!("{}: not installed", self.spec.name));
        }
        // is-active exits non-zero for inactive units; stdout carries the state
        let out = self.ctl.run(&["is-active", &self.spec.name])?;
        let state = if out.stdout.is_empty() {
            "unknown"
        } else {
            out.stdout.as_str()
        };
        Ok(format!("{}: {}", self.spec.name, state))
    }

    fn require_installed(&self) -> Result<(), ServiceError> {
        if self.is_installed() {
            Ok(())
        } else {
            Err(ServiceError::NotInstalled {
                name: self.spec.name.clone(),
            })
        }
    }

    fn systemctl(&self, args: &[&str]) -> Result<String, ServiceError> {
        let out = self.ctl.run(args)?;
        if out.success {
            return Ok(out.stdout);
        }
        let message = if out.stderr.is_empty() {
            out.stdout
        } else {
            out.stderr
        };
        Err(ServiceError::SystemCtl {
            args: args.join(" "),
            message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::mocks::RecordingSystemCtl;

    fn spec() -> UnitSpec {
        UnitSpec {
            name: "tracecap".into(),
            description: "Trace pipe capture service".into(),
            exec: PathBuf::from("/usr/local/bin/tracecap"),
            config: PathBuf::from("/etc/tracecap/tracecap.toml"),
        }
    }

    #[test]
    fn renders_exec_start() {
        let unit = render_unit(&spec());

        assert!(unit.contains("Description=Trace pipe capture service\n"));
        assert!(
            unit.contains(
                "ExecStart=/usr/local/bin/tracecap --config /etc/tracecap/tracecap.toml run\n"
            )
        );
        assert!(unit.contains("WantedBy=multi-user.target"));
    }

    #[test]
    fn quotes_paths_with_spaces() {
        let mut spec = spec();
        spec.config = PathBuf::from("/etc/trace cap/tracecap.toml");

        assert!(render_unit(&spec).contains("--config \"/etc/trace cap/tracecap.toml\""));
    }

    #[test]
    fn install_then_remove() {
        let dir = tempfile::tempdir().unwrap();
        let ctl = RecordingSystemCtl::new("inactive");
        let manager = ServiceManager::new(ctl.clone(), dir.path(), spec());

        assert_eq!(manager.status().unwrap(), "tracecap: not installed");

        manager.install().unwrap();
        assert!(manager.unit_path().exists());
        assert!(matches!(
            manager.install(),
            Err(ServiceError::AlreadyInstalled { .. })
        ));

        manager.start().unwrap();
        ctl.set_active_state("active");
        assert_eq!(manager.status().unwrap(), "tracecap: active");

        manager.stop().unwrap();
        manager.remove().unwrap();
        assert!(!manager.unit_path().exists());

        let calls: Vec<String> = ctl.calls().iter().map(|c| c.join(" ")).collect();
        assert_eq!(
            calls,
            vec![
                "daemon-reload",
                "enable tracecap",
                "start tracecap",
                "is-active tracecap",
                "stop tracecap",
                "disable tracecap",
                "daemon-reload",
            ]
        );
    }

    #[test]
    fn commands_require_installation() {
        let dir = tempfile::tempdir().unwrap();
        let manager = ServiceManager::new(RecordingSystemCtl::new("inactive"), dir.path(), spec());

        assert!(matches!(manager.start(), Err(ServiceError::NotInstalled { .. })));
        assert!(matches!(manager.stop(), Err(ServiceError::NotInstalled { .. })));
        assert!(matches!(manager.remove(), Err(ServiceError::NotInstalled { .. })));
    }

    #[test]
    fn failed_systemctl_surfaces_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let ctl = RecordingSystemCtl::new("inactive");
        ctl.fail_next("Unit tracecap.service not found.");
        let manager = ServiceManager::new(ctl, dir.path(), spec());

        let err = manager.install().unwrap_err();
        assert!(err.to_string().contains("daemon-reload"));
        assert!(err.to_string().contains("not found"));
    }
}
