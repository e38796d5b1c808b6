//! External aggregation process strategy
//!
//! Runs a configured program with the date appended as its last argument and
//! reads a JSON array of `{latitude, longitude, tavg}` from stdout. Stderr is
//! diagnostic only: each line is logged and never treated as a failure.

use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::process::{Child, ChildStderr, Command};

use super::{RawBatch, RetrievalStrategy, TemperatureError, TemperatureQuery};

pub struct ExternalProcess {
    program: String,
    args: Vec<String>,
    timeout: Duration,
    max_output_bytes: usize,
}

/// Outcome of draining stdout and waiting for exit
enum Captured {
    Exited(ExitStatus, Vec<u8>),
    /// Stdout exceeded the byte cap; the child is still running
    Overflow,
}

impl ExternalProcess {
    pub fn new(
        program: String,
        args: Vec<String>,
        timeout: Duration,
        max_output_bytes: usize,
    ) -> Self {
        Self {
            program,
            args,
            timeout,
            max_output_bytes,
        }
    }

    async fn capture<R>(&self, child: &mut Child, stdout: R) -> std::io::Result<Captured>
    where
        R: AsyncRead + Unpin,
    {
        let cap = u64::try_from(self.max_output_bytes).unwrap_or(u64::MAX);
        let mut output = Vec::new();
        stdout
            .take(cap.saturating_add(1))
            .read_to_end(&mut output)
            .await?;
        if output.len() > self.max_output_bytes {
            return Ok(Captured::Overflow);
        }

        let status = child.wait().await?;
        Ok(Captured::Exited(status, output))
    }
}

#[async_trait]
impl RetrievalStrategy for ExternalProcess {
    fn name(&self) -> &'static str {
        "process"
    }

    async fn fetch(&self, query: &TemperatureQuery) -> Result<RawBatch, TemperatureError> {
        let date_arg = query.date.to_string();
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .arg(&date_arg)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                TemperatureError::UpstreamUnavailable(format!(
                    "failed to start {}: {e}",
                    self.program
                ))
            })?;

        let Some(stdout) = child.stdout.take() else {
            return Err(TemperatureError::UpstreamUnavailable(
                "aggregation process has no stdout".to_string(),
            ));
        };
        // Detached: grandchildren may keep stderr open after the child is killed
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(log_diagnostics(stderr));
        }

        let capture = self.capture(&mut child, stdout);
        let outcome = tokio::time::timeout(self.timeout, capture).await;

        match outcome {
            Err(_) => {
                terminate(&mut child).await;
                Err(TemperatureError::UpstreamUnavailable(format!(
                    "aggregation process timed out after {}s",
                    self.timeout.as_secs_f64()
                )))
            }
            Ok(Err(e)) => {
                terminate(&mut child).await;
                Err(TemperatureError::UpstreamUnavailable(format!(
                    "failed to read aggregation output: {e}"
                )))
            }
            Ok(Ok(Captured::Overflow)) => {
                terminate(&mut child).await;
                Err(TemperatureError::MalformedUpstreamResponse(format!(
                    "aggregation output exceeded {} bytes",
                    self.max_output_bytes
                )))
            }
            Ok(Ok(Captured::Exited(status, _))) if !status.success() => {
                Err(TemperatureError::UpstreamUnavailable(format!(
                    "aggregation process exited with {status}"
                )))
            }
            Ok(Ok(Captured::Exited(_, output))) => parse_output(&output),
        }
    }
}

fn parse_output(output: &[u8]) -> Result<RawBatch, TemperatureError> {
    match serde_json::from_slice::<Value>(output) {
        Ok(Value::Array(records)) => {
            tracing::debug!(records = records.len(), "Aggregation process returned");
            Ok(RawBatch::station(records))
        }
        Ok(_) => Err(TemperatureError::MalformedUpstreamResponse(
            "aggregation output is not a JSON array".to_string(),
        )),
        Err(e) => Err(TemperatureError::MalformedUpstreamResponse(format!(
            "aggregation output is not valid JSON: {e}"
        ))),
    }
}

async fn terminate(child: &mut Child) {
    if let Err(e) = child.kill().await {
        tracing::warn!(error = %e, "Failed to kill aggregation process");
    }
}

async fn log_diagnostics(stderr: ChildStderr) {
    let mut lines = BufReader::new(stderr).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => tracing::debug!(target: "geotemp_api::aggregation", "{line}"),
            Ok(None) => break,
            Err(e) => {
                tracing::debug!(error = %e, "Stopped reading aggregation diagnostics");
                break;
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::temperature::DateSpec;
    use geotemp_shared::BoundingBox;

    fn shell(script: &str, timeout: Duration, cap: usize) -> ExternalProcess {
        // `sh -c script sh <date>` exposes the date as $1
        ExternalProcess::new(
            "sh".to_string(),
            vec!["-c".to_string(), script.to_string(), "sh".to_string()],
            timeout,
            cap,
        )
    }

    fn query(raw: &str) -> TemperatureQuery {
        let date = DateSpec::parse(raw).unwrap();
        TemperatureQuery::new(date, BoundingBox::WEST_VIRGINIA)
    }

    #[tokio::test]
    async fn test_reads_array_and_tolerates_stderr() {
        let stdout = r#"[{"latitude":38.35,"longitude":-81.63,"tavg":75.5}]"#;
        let script = format!(r#"echo "searching for $1" >&2; echo '{stdout}'"#);
        let process = shell(&script, Duration::from_secs(5), 1024);
        let batch = process.fetch(&query("2022-06-01")).await.unwrap();
        assert_eq!(batch.records.len(), 1);
        assert_eq!(batch.records[0]["tavg"], 75.5);
    }

    #[tokio::test]
    async fn test_date_passed_as_last_argument() {
        let process = shell(
            r#"printf '[{"latitude":38.0,"longitude":-80.0,"tavg":60,"date":"%s"}]' "$1""#,
            Duration::from_secs(5),
            1024,
        );
        let batch = process.fetch(&query("2022-06")).await.unwrap();
        assert_eq!(batch.records[0]["date"], "2022-06");
    }

    #[tokio::test]
    async fn test_non_zero_exit_is_unavailable() {
        let process = shell("echo '[]'; exit 3", Duration::from_secs(5), 1024);
        let err = process.fetch(&query("2022-06-01")).await.unwrap_err();
        assert!(matches!(err, TemperatureError::UpstreamUnavailable(_)));
    }

    #[tokio::test]
    async fn test_unparsable_output_is_malformed() {
        let process = shell(
            "echo 'Traceback (most recent call last)'",
            Duration::from_secs(5),
            1024,
        );
        let err = process.fetch(&query("2022-06-01")).await.unwrap_err();
        assert!(matches!(
            err,
            TemperatureError::MalformedUpstreamResponse(_)
        ));

        let process = shell(r#"echo '{"latitude":1}'"#, Duration::from_secs(5), 1024);
        let err = process.fetch(&query("2022-06-01")).await.unwrap_err();
        assert!(matches!(
            err,
            TemperatureError::MalformedUpstreamResponse(_)
        ));
    }

    #[tokio::test]
    async fn test_output_over_cap_is_rejected() {
        let process = shell(
            "while true; do echo '[1,2,3,4,5,6,7,8,9]'; done",
            Duration::from_secs(5),
            256,
        );
        let err = process.fetch(&query("2022-06-01")).await.unwrap_err();
        assert!(matches!(
            err,
            TemperatureError::MalformedUpstreamResponse(_)
        ));
    }

    #[tokio::test]
    async fn test_timeout_is_unavailable() {
        let process = shell("sleep 10; echo '[]'", Duration::from_millis(200), 1024);
        let started = std::time::Instant::now();
        let err = process.fetch(&query("2022-06-01")).await.unwrap_err();
        assert!(matches!(err, TemperatureError::UpstreamUnavailable(_)));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_missing_program_is_unavailable() {
        let process = ExternalProcess::new(
            "/nonexistent/aggregate-temperatures".to_string(),
            vec![],
            Duration::from_secs(1),
            1024,
        );
        let err = process.fetch(&query("2022-06-01")).await.unwrap_err();
        assert!(matches!(err, TemperatureError::UpstreamUnavailable(_)));
    }
}
