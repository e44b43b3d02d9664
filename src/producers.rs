//! Ready-made producers for the command-line front-end.
//!
//! Both are best-effort: a failure is logged from inside the worker and
//! turns into an empty payload.

use crate::pool::Producer;
use std::process::{Command, Stdio};
use std::time::Duration;

/// Default timeout for a single HTTP fetch.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Runs a shell command and yields its standard output.
#[derive(Debug, Clone)]
pub struct ShellCommand {
    command: String,
}

impl ShellCommand {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    pub fn command(&self) -> &str {
        &self.command
    }
}

impl Producer for ShellCommand {
    fn produce(&mut self) -> Option<Vec<u8>> {
        let output = Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .stdin(Stdio::null())
            .stderr(Stdio::inherit())
            .output();

        match output {
            Ok(output) => {
                if !output.status.success() {
                    tracing::warn!(
                        command = %self.command,
                        status = %output.status,
                        "Command exited unsuccessfully, keeping its output"
                    );
                }
                Some(output.stdout)
            }
            Err(e) => {
                tracing::warn!(command = %self.command, error = %e, "Failed to run command");
                None
            }
        }
    }
}

/// Fetches a URL with a blocking HTTP client and yields the response body.
///
/// The client is built inside the worker, after the fork, so no runtime
/// threads are inherited from the coordinator.
#[derive(Debug, Clone)]
pub struct HttpFetch {
    url: String,
    timeout: Duration,
}

impl HttpFetch {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn fetch(&self) -> reqwest::Result<Vec<u8>> {
        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .build()?;
        let response = client.get(&self.url).send()?;
        let status = response.status();
        if !status.is_success() {
            tracing::debug!(url = %self.url, %status, "Non-success status, keeping body");
        }
        Ok(response.bytes()?.to_vec())
    }
}

impl Producer for HttpFetch {
    fn produce(&mut self) -> Option<Vec<u8>> {
        match self.fetch() {
            Ok(body) => Some(body),
            Err(e) => {
                tracing::warn!(url = %self.url, error = %e, "Fetch failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shell_command_captures_stdout() {
        let mut producer = ShellCommand::new("printf 'hello world'");
        assert_eq!(producer.produce(), Some(b"hello world".to_vec()));
    }

    #[test]
    fn test_shell_command_keeps_output_of_failing_command() {
        let mut producer = ShellCommand::new("echo partial; exit 3");
        assert_eq!(producer.produce(), Some(b"partial\n".to_vec()));
    }

    #[test]
    fn test_http_fetch_unreachable_is_none() {
        // Port 9 (discard) is closed on any sane test machine.
        let mut producer =
            HttpFetch::new("http://127.0.0.1:9/").with_timeout(Duration::from_secs(2));
        assert_eq!(producer.produce(), None);
    }

    #[test]
    fn test_http_fetch_defaults() {
        let producer = HttpFetch::new("https://example.com/");
        assert_eq!(producer.url(), "https://example.com/");
        assert_eq!(producer.timeout, DEFAULT_FETCH_TIMEOUT);
    }
}
