//! Turns the session's displayed result into terminal output and files.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;
use astro_portal_core::{ApiError, Artifact, ArtifactKind, OperationResult, Payload, Placement};
use serde_json::Value;

/// Where document bytes go.
pub struct Output<'a> {
    pub out_dir: &'a Path,
    pub out_file: Option<&'a Path>,
}

impl Output<'_> {
    fn target_for(&self, artifact: &Artifact) -> PathBuf {
        match self.out_file {
            Some(path) => path.to_path_buf(),
            None => self.out_dir.join(artifact.suggested_file_name()),
        }
    }
}

/// Writes `result` to `w`. Artifacts are saved to disk; their bytes are
/// never printed.
pub fn render(w: &mut impl Write, result: &OperationResult, output: &Output<'_>) -> anyhow::Result<()> {
    match result {
        Ok(payload) => render_payload(w, payload, output),
        Err(err) => render_error(w, err),
    }
}

fn render_payload(w: &mut impl Write, payload: &Payload, output: &Output<'_>) -> anyhow::Result<()> {
    match payload {
        Payload::Users(users) => {
            writeln!(w, "{}", serde_json::to_string_pretty(users)?)?;
            writeln!(w, "Found {} user(s)", users.len())?;
        }
        Payload::User(user) => writeln!(w, "{}", serde_json::to_string_pretty(user)?)?,
        Payload::Placements(set) => writeln!(w, "{}", serde_json::to_string_pretty(set)?)?,
        Payload::BigThree(big) => {
            writeln!(w, "{}", serde_json::to_string_pretty(big)?)?;
            for (name, placement) in big.entries() {
                writeln!(w, "{name}: {}", describe(placement))?;
            }
        }
        Payload::Health(health) => {
            let status = health.get("status").and_then(Value::as_str).unwrap_or("unknown");
            writeln!(w, "Backend status: {status}")?;
            writeln!(w, "{}", serde_json::to_string_pretty(health)?)?;
        }
        Payload::Artifact(artifact) => {
            let path = output.target_for(artifact);
            fs::write(&path, &artifact.bytes)
                .with_context(|| format!("writing {}", path.display()))?;
            let what = match artifact.kind {
                ArtifactKind::Booklet => "booklet".to_string(),
                ArtifactKind::Calendar { year } => format!("{year} calendar"),
            };
            writeln!(
                w,
                "Saved {what} ({} bytes, {}) to {}",
                artifact.bytes.len(),
                artifact.content_type,
                path.display()
            )?;
        }
    }
    Ok(())
}

fn describe(placement: &Placement) -> String {
    match placement.degree {
        Some(degree) => format!("{} {degree:.2}°", placement.sign),
        None => placement.sign.clone(),
    }
}

fn render_error(w: &mut impl Write, err: &ApiError) -> anyhow::Result<()> {
    match err.status() {
        Some(status) => writeln!(w, "Error {status}: {err}")?,
        None => writeln!(w, "Error: {err}")?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use astro_portal_core::{BigThree, PlacementSet, UserId};
    use serde_json::Map;

    fn placement(sign: &str, degree: Option<f64>) -> Placement {
        Placement {
            sign: sign.to_string(),
            degree,
            extra: Map::new(),
        }
    }

    fn rendered(result: &OperationResult, dir: &Path) -> String {
        let mut out = Vec::new();
        let output = Output {
            out_dir: dir,
            out_file: None,
        };
        render(&mut out, result, &output).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn http_error_shows_status_and_message() {
        let err = ApiError::Http {
            status: 404,
            message: "not found".to_string(),
        };
        let text = rendered(&Err(err), Path::new("."));
        assert_eq!(text, "Error 404: not found\n");
    }

    #[test]
    fn unsupported_has_no_status() {
        let err = ApiError::Unsupported {
            reason: "generate_calendar requires a year".to_string(),
        };
        let text = rendered(&Err(err), Path::new("."));
        assert_eq!(text, "Error: unsupported request: generate_calendar requires a year\n");
    }

    #[test]
    fn big_three_prints_summary_lines() {
        let set: PlacementSet = [
            ("Sun".to_string(), placement("Leo", Some(12.5))),
            ("Moon".to_string(), placement("Pisces", None)),
            ("Ascendant".to_string(), placement("Libra", Some(3.0))),
        ]
        .into_iter()
        .collect();
        let big = BigThree::from_placements(set).unwrap();
        let text = rendered(&Ok(Payload::BigThree(big)), Path::new("."));
        assert!(text.contains("Sun: Leo 12.50°"));
        assert!(text.contains("Moon: Pisces\n"));
        assert!(text.contains("Ascendant: Libra 3.00°"));
    }

    #[test]
    fn artifact_is_written_byte_for_byte() {
        let dir = tempfile::tempdir().unwrap();
        let bytes = vec![0x25, 0x50, 0x44, 0x46, 0xE2, 0xE3, 0x00, 0xFF];
        let artifact = Artifact {
            kind: ArtifactKind::Calendar { year: 2026 },
            user_id: UserId::Int(7),
            content_type: "application/pdf".to_string(),
            bytes: bytes.clone(),
        };
        let text = rendered(&Ok(Payload::Artifact(artifact)), dir.path());
        let path = dir.path().join("calendar_7_2026.pdf");
        assert_eq!(std::fs::read(&path).unwrap(), bytes);
        assert!(text.starts_with("Saved 2026 calendar (8 bytes, application/pdf)"));
    }
}
