use regex::Regex;
use serde::Serialize;
use std::{
    io,
    path::{Path, PathBuf},
    process::{Command, Output, Stdio},
};
use thiserror::Error;
use tracing::{debug, info};

use crate::request::RenderParams;

const MINIMUM_PYTHON_MAJOR_VERSION: u32 = 3;
const MINIMUM_PYTHON_MINOR_VERSION: u32 = 7;

const RENDER_SCRIPT: &str = "\
import json, sys
from lucidsonicdreams import LucidSonicDream
job = json.loads(sys.argv[1])
LucidSonicDream(song=job['song'], style=job['style']).hallucinate(**job['params'])
";

const LIST_STYLES_SCRIPT: &str = "\
from lucidsonicdreams import show_styles
show_styles()
";

#[derive(Debug, Error)]
pub enum DreamerError {
    #[error("`{0}` command not found. Please ensure it is installed and in your PATH.")]
    CommandNotFound(String),
    #[error("Failed to run `{0}`: {1}")]
    CommandFailed(String, String),
    #[error("Could not parse the Python version from `{0}`")]
    VersionParseError(String),
    #[error(transparent)]
    Regex(#[from] regex::Error),
    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),
    #[error("Invalid path (not UTF-8): {}", .0.display())]
    InvalidPath(PathBuf),
}

/// Builds a dreamer for one song and style.
pub trait Collaborator {
    type Dreamer: Dreamer;

    fn construct(&self, song: &Path, style: &str) -> Result<Self::Dreamer, DreamerError>;
}

/// Renders the video described by `params`, blocking until it is written.
pub trait Dreamer {
    fn hallucinate(&mut self, params: &RenderParams) -> Result<(), DreamerError>;
}

/// Runs the lucidsonicdreams Python package in a child interpreter.
#[derive(Debug, Clone)]
pub struct PythonBridge {
    pub interpreter: String,
    pub debug: bool,
}

#[derive(Debug)]
pub struct PythonDreamer {
    interpreter: String,
    song: PathBuf,
    style: String,
    debug: bool,
}

#[derive(Serialize)]
struct RenderJob<'a> {
    song: &'a str,
    style: &'a str,
    params: &'a RenderParams,
}

#[derive(Debug, PartialEq)]
pub struct PythonVersionInfo {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
    pub is_compatible: bool,
}

#[derive(Debug)]
pub struct PythonCheckResult {
    pub python_available: bool,
    pub python_version: Option<PythonVersionInfo>,
    pub lucidsonicdreams_available: bool,
    pub error: Option<String>,
}

impl PythonBridge {
    pub fn new(interpreter: impl Into<String>, debug: bool) -> Self {
        Self {
            interpreter: interpreter.into(),
            debug,
        }
    }

    /// Captures the output of `show_styles()`.
    pub fn list_styles(&self) -> Result<String, DreamerError> {
        let output = self.output(&["-c", LIST_STYLES_SCRIPT])?;
        if !output.status.success() {
            return Err(DreamerError::CommandFailed(
                "show_styles()".to_string(),
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    pub fn check_installation(&self) -> PythonCheckResult {
        let mut result = PythonCheckResult {
            python_available: false,
            python_version: None,
            lucidsonicdreams_available: false,
            error: None,
        };

        match self.output(&["--version"]) {
            Ok(output) if output.status.success() => {
                result.python_available = true;
                // Python 2 printed its version on stderr
                let text = format!(
                    "{}{}",
                    String::from_utf8_lossy(&output.stdout),
                    String::from_utf8_lossy(&output.stderr)
                );
                match parse_python_version(&text) {
                    Ok(info) => result.python_version = Some(info),
                    Err(e) => result.error = Some(e.to_string()),
                }
            }
            Ok(output) => {
                result.error = Some(format!(
                    "`{} --version` exited with {}",
                    self.interpreter, output.status
                ));
            }
            Err(e) => result.error = Some(e.to_string()),
        }

        if result.python_available {
            result.lucidsonicdreams_available = self
                .output(&["-c", "import lucidsonicdreams"])
                .map(|output| output.status.success())
                .unwrap_or(false);
        }

        result
    }

    fn output(&self, args: &[&str]) -> Result<Output, DreamerError> {
        Command::new(&self.interpreter)
            .args(args)
            .output()
            .map_err(|e| spawn_error(&self.interpreter, e))
    }
}

impl Collaborator for PythonBridge {
    type Dreamer = PythonDreamer;

    fn construct(&self, song: &Path, style: &str) -> Result<PythonDreamer, DreamerError> {
        check_dependency(&self.interpreter)?;
        info!("prepared dreamer for {} with style '{}'", song.display(), style);
        Ok(PythonDreamer {
            interpreter: self.interpreter.clone(),
            song: song.to_path_buf(),
            style: style.to_string(),
            debug: self.debug,
        })
    }
}

impl PythonDreamer {
    fn payload(&self, params: &RenderParams) -> Result<String, DreamerError> {
        let job = RenderJob {
            song: self
                .song
                .to_str()
                .ok_or_else(|| DreamerError::InvalidPath(self.song.clone()))?,
            style: &self.style,
            params,
        };
        Ok(serde_json::to_string(&job)?)
    }
}

impl Dreamer for PythonDreamer {
    fn hallucinate(&mut self, params: &RenderParams) -> Result<(), DreamerError> {
        let payload = self.payload(params)?;
        debug!("render payload: {}", payload);

        let mut command = Command::new(&self.interpreter);
        command.args(["-c", RENDER_SCRIPT, payload.as_str()]);

        if self.debug {
            let status = command
                .status()
                .map_err(|e| spawn_error(&self.interpreter, e))?;
            if !status.success() {
                return Err(DreamerError::CommandFailed(
                    "hallucinate".to_string(),
                    format!("renderer exited with {}", status),
                ));
            }
            return Ok(());
        }

        let output = command
            .stdout(Stdio::null())
            .output()
            .map_err(|e| spawn_error(&self.interpreter, e))?;
        if !output.status.success() {
            return Err(DreamerError::CommandFailed(
                "hallucinate".to_string(),
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
        Ok(())
    }
}

pub fn check_dependency(cmd: &str) -> Result<(), DreamerError> {
    match Command::new(cmd)
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
    {
        Ok(_) => Ok(()),
        Err(e) => Err(spawn_error(cmd, e)),
    }
}

fn spawn_error(cmd: &str, e: io::Error) -> DreamerError {
    if e.kind() == io::ErrorKind::NotFound {
        DreamerError::CommandNotFound(cmd.to_string())
    } else {
        DreamerError::CommandFailed(cmd.to_string(), e.to_string())
    }
}

pub fn parse_python_version(text: &str) -> Result<PythonVersionInfo, DreamerError> {
    let re = Regex::new(r"Python (\d+)\.(\d+)(?:\.(\d+))?")?;
    let caps = re
        .captures(text)
        .ok_or_else(|| DreamerError::VersionParseError(text.trim().to_string()))?;
    let number = |i: usize| -> u32 {
        caps.get(i)
            .and_then(|m| m.as_str().parse().ok())
            .unwrap_or(0)
    };
    let (major, minor, patch) = (number(1), number(2), number(3));

    Ok(PythonVersionInfo {
        major,
        minor,
        patch,
        is_compatible: (major, minor)
            >= (MINIMUM_PYTHON_MAJOR_VERSION, MINIMUM_PYTHON_MINOR_VERSION),
    })
}
