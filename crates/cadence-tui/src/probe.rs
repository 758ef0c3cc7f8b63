/// ffprobe-backed `DurationProbe`.
///
/// Runs `ffprobe -v quiet -print_format json -show_format <url>` per source
/// and reads `format.duration`. The binary is resolved once at construction.
use std::path::PathBuf;
use std::process::Stdio;

use cadence_core::catalog::{DurationProbe, ProbeError};
use serde::Deserialize;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    /// ffprobe prints this as a decimal string.
    duration: Option<String>,
}

pub struct FfprobeDuration {
    binary: Option<PathBuf>,
}

impl Default for FfprobeDuration {
    fn default() -> Self {
        Self::new()
    }
}

impl FfprobeDuration {
    pub fn new() -> Self {
        let binary = cadence_core::platform::find_ffprobe_binary();
        match &binary {
            Some(p) => debug!("probe: using ffprobe at {}", p.display()),
            None => tracing::warn!("probe: ffprobe not found; every track will be dropped"),
        }
        Self { binary }
    }
}

impl DurationProbe for FfprobeDuration {
    async fn probe(&self, source: &str) -> Result<f64, ProbeError> {
        let binary = self
            .binary
            .as_ref()
            .ok_or_else(|| ProbeError::Unavailable("ffprobe not found".into()))?;

        let output = tokio::process::Command::new(binary)
            .args(["-v", "quiet", "-print_format", "json", "-show_format"])
            .arg(source)
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| ProbeError::Unavailable(e.to_string()))?;

        if !output.status.success() {
            return Err(ProbeError::Failed(format!(
                "ffprobe exited with {}",
                output.status
            )));
        }
        parse_duration(&output.stdout)
    }
}

fn parse_duration(stdout: &[u8]) -> Result<f64, ProbeError> {
    let parsed: ProbeOutput =
        serde_json::from_slice(stdout).map_err(|e| ProbeError::Failed(e.to_string()))?;
    let secs = parsed
        .format
        .and_then(|f| f.duration)
        .and_then(|d| d.trim().parse::<f64>().ok())
        .ok_or(ProbeError::InvalidDuration)?;
    if !secs.is_finite() || secs < 0.0 {
        return Err(ProbeError::InvalidDuration);
    }
    Ok(secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration() {
        let out = br#"{"format":{"filename":"x.mp3","duration":"185.432000","bit_rate":"128000"}}"#;
        assert_eq!(parse_duration(out).unwrap(), 185.432);
    }

    #[test]
    fn test_missing_duration_is_invalid() {
        assert!(matches!(
            parse_duration(br#"{"format":{}}"#),
            Err(ProbeError::InvalidDuration)
        ));
        assert!(matches!(
            parse_duration(br#"{"format":{"duration":"N/A"}}"#),
            Err(ProbeError::InvalidDuration)
        ));
        assert!(matches!(parse_duration(b"{}"), Err(ProbeError::InvalidDuration)));
    }

    #[test]
    fn test_default_resolves_like_new() {
        assert_eq!(FfprobeDuration::default().binary, FfprobeDuration::new().binary);
    }

    #[test]
    fn test_garbage_output_fails() {
        assert!(matches!(parse_duration(b""), Err(ProbeError::Failed(_))));
    }

    #[tokio::test]
    async fn test_missing_binary_is_unavailable() {
        let probe = FfprobeDuration { binary: None };
        assert!(matches!(
            probe.probe("https://cdn.test/a.mp3").await,
            Err(ProbeError::Unavailable(_))
        ));
    }
}
