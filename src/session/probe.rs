use super::ProcessProbe;
use anyhow::{bail, Context, Result};
use std::process::{Command, Output, Stdio};

/// [`ProcessProbe`] that asks `pgrep -f`. Exit 0 means a match, 1 means none,
/// anything else is an error.
#[derive(Debug, Clone, Default)]
pub struct PgrepProbe;

impl PgrepProbe {
    fn pgrep(args: &[&str]) -> Result<Option<String>> {
        let Output { status, stdout, .. } = Command::new("pgrep")
            .args(args)
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output()
            .context("failed to run pgrep")?;
        match status.code() {
            Some(0) => Ok(Some(String::from_utf8_lossy(&stdout).to_string())),
            Some(1) => Ok(None),
            _ => bail!("pgrep {} failed ({status})", shell_words::join(args)),
        }
    }
}

impl ProcessProbe for PgrepProbe {
    fn is_running(&self, signature: &str) -> Result<bool> {
        Ok(Self::pgrep(&["-f", signature])?.is_some())
    }

    fn child_matching(&self, parent: u32, pattern: &str) -> Result<Option<u32>> {
        let parent = parent.to_string();
        let Some(listing) = Self::pgrep(&["-P", &parent, "-f", pattern])? else {
            return Ok(None);
        };
        Ok(listing
            .lines()
            .find_map(|line| line.trim().parse::<u32>().ok()))
    }
}
