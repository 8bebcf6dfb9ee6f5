//! LastPass CLI (`lpass`) client.
//!
//! Shells out to an already logged-in `lpass` binary.  Session setup is the
//! caller's job; this client only builds arguments, pipes templates on
//! stdin and parses `--json` output.

use std::io::Write;
use std::process::{Command, Stdio};

use tracing::debug;

use super::{ClientError, EntryQuery, RawEntry, VaultClient, WriteTarget};
use crate::config::Settings;

/// Keeps `lpass` from popping a pinentry dialog in non-interactive runs.
const DISABLE_PINENTRY_ENV: &str = "LPASS_DISABLE_PINENTRY";

/// Client that runs the `lpass` binary.
#[derive(Debug, Clone)]
pub struct LpassCli {
    binary: String,
}

impl Default for LpassCli {
    fn default() -> Self {
        Self::new("lpass")
    }
}

impl LpassCli {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.lpass_binary.clone())
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }

    fn read_args(query: &EntryQuery) -> Vec<String> {
        let mut args = vec![
            "show".to_string(),
            "--sync=auto".to_string(),
            "--json".to_string(),
            "-x".to_string(),
        ];
        match query {
            EntryQuery::Id(id) => args.push(id.clone()),
            // fixed-string match; callers filter for the exact name
            EntryQuery::Name(name) => {
                args.push("-F".to_string());
                args.push(name.clone());
            }
        }
        args
    }

    fn write_args(target: &WriteTarget) -> Vec<String> {
        let mut args = match target {
            WriteTarget::Create { name, .. } => vec!["add".to_string(), name.clone()],
            WriteTarget::Update { id } => vec!["edit".to_string(), id.clone()],
        };
        args.push("--non-interactive".to_string());
        args.push("--sync=now".to_string());
        if let WriteTarget::Create {
            note_type: Some(flag),
            ..
        } = target
        {
            args.push(format!("--note-type={flag}"));
        }
        args
    }

    fn delete_args(id: &str) -> Vec<String> {
        vec!["rm".to_string(), id.to_string(), "--sync=now".to_string()]
    }

    /// Run `lpass` with `args`, optionally feeding `stdin`, and return stdout.
    fn run(&self, args: &[String], stdin: Option<&str>) -> Result<String, ClientError> {
        let command = args.first().map_or("", String::as_str);
        debug!(binary = %self.binary, command, "running lpass");

        let mut child = Command::new(&self.binary)
            .args(args)
            .env(DISABLE_PINENTRY_ENV, "1")
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| ClientError::new(format!("failed to run {}: {e}", self.binary)))?;

        if let (Some(input), Some(mut pipe)) = (stdin, child.stdin.take()) {
            if let Err(e) = pipe.write_all(input.as_bytes()) {
                drop(pipe);
                // reap the child before reporting
                let _ = child.kill();
                let _ = child.wait();
                return Err(ClientError::new(format!(
                    "failed to write to {}: {e}",
                    self.binary
                )));
            }
        }

        let output = child
            .wait_with_output()
            .map_err(|e| ClientError::new(format!("failed to wait for {}: {e}", self.binary)))?;

        if output.status.success() {
            String::from_utf8(output.stdout)
                .map_err(|e| ClientError::new(format!("non-UTF8 output from {}: {e}", self.binary)))
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let message = match stderr.trim() {
                "" => format!("{} exited with {}", self.binary, output.status),
                text => text.to_string(),
            };
            Err(ClientError::new(message))
        }
    }
}

/// Parse `lpass show --json` output.
fn parse_entries(json: &str) -> Result<Vec<RawEntry>, ClientError> {
    if json.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(json)
        .map_err(|e| ClientError::new(format!("malformed response from lpass: {e}")))
}

impl VaultClient for LpassCli {
    fn read(&self, query: &EntryQuery) -> Result<Vec<RawEntry>, ClientError> {
        let stdout = self.run(&Self::read_args(query), None)?;
        parse_entries(&stdout)
    }

    fn write(&self, target: &WriteTarget, template: &str) -> Result<(), ClientError> {
        self.run(&Self::write_args(target), Some(template))
            .map(|_| ())
    }

    fn delete(&self, id: &str) -> Result<(), ClientError> {
        self.run(&Self::delete_args(id), None).map(|_| ())
    }

    fn sync(&self) -> Result<(), ClientError> {
        self.run(&["sync".to_string()], None).map(|_| ())
    }
}
