// Local MCP Gateway - Container CLI Collaborator
// Copyright 2026 Joseph Stone - All Rights Reserved
//
// nerdctl locally, or over ssh on a named host from config.yaml.
// Arguments are passed through as-is; the gateway applies no policy to them.

use crate::config::Config;
use crate::error::{GatewayError, GatewayResult};
use crate::exec::{self, ProcessOutput};
use crate::providers::ContainerProvider;
use std::time::Duration;

pub struct Nerdctl<'a> {
    config: &'a Config,
    timeout: Duration,
}

impl<'a> Nerdctl<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self { config, timeout: config.tool_timeout() }
    }

    /// Build the ssh argv for a named host
    pub fn remote_command(&self, host: &str, args: &[String]) -> GatewayResult<Vec<String>> {
        let entry = self
            .config
            .ssh
            .hosts
            .get(host)
            .ok_or_else(|| GatewayError::invalid_params(format!("Unknown ssh host: {}", host)))?;
        let target = entry
            .target
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| GatewayError::invalid_params(format!("Missing ssh.hosts.{}.target in config.yaml", host)))?;

        let mut argv = vec![target.to_string(), "--".to_string(), remote_quote(&entry.nerdctl_path)?];
        for arg in args {
            argv.push(remote_quote(arg)?);
        }
        Ok(argv)
    }
}

impl ContainerProvider for Nerdctl<'_> {
    fn run_local(&self, args: &[String]) -> GatewayResult<String> {
        let configured = &self.config.nerdctl.local_path;
        let program = exec::locate(configured).ok_or_else(|| {
            GatewayError::collaborator(format!(
                "nerdctl not found in PATH (configured as {}). Install nerdctl or update config.",
                configured
            ))
        })?;
        log::info!("nerdctl {}", args.join(" "));
        let output = exec::run(&program.to_string_lossy(), args, None, self.timeout)?;
        finish(output, "nerdctl")
    }

    fn run_remote(&self, host: &str, args: &[String]) -> GatewayResult<String> {
        let argv = self.remote_command(host, args)?;
        if exec::locate("ssh").is_none() {
            return Err(GatewayError::collaborator("ssh not found in PATH"));
        }
        log::info!("nerdctl on {}: {}", host, args.join(" "));
        let output = exec::run("ssh", &argv, None, self.timeout)?;
        finish(output, "ssh nerdctl")
    }
}

fn finish(output: ProcessOutput, label: &str) -> GatewayResult<String> {
    let text = output.combined();
    if !output.success() {
        if text.is_empty() {
            return Err(GatewayError::collaborator(format!("{} failed ({})", label, output.code())));
        }
        return Err(GatewayError::collaborator(text));
    }
    if text.is_empty() {
        Ok("(ok)".to_string())
    } else {
        Ok(text)
    }
}

/// Quote an argument for the remote login shell.
/// Plain words pass through untouched; NUL bytes cannot be quoted at all.
pub fn remote_quote(arg: &str) -> GatewayResult<String> {
    shlex::try_quote(arg)
        .map(|quoted| quoted.into_owned())
        .map_err(|e| GatewayError::invalid_params(format!("cannot quote argument {:?} for ssh: {}", arg, e)))
}

// ============================================================================
// TESTS
// ============================================================================
