//! Geometry conversion tool
//!
//! Layers are converted out of process by an `ogr2ogr`-style command. The
//! command line is a template; `{input}`, `{output}` and `{layer}` are
//! replaced by the intermediate path, the output directory and the layer
//! name. Standard output and standard error are captured and reported as
//! diagnostics when the conversion fails.

use std::path::Path;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::config::ConverterConfig;
use crate::error::{Result, ToolError};

/// Converts one intermediate into a named layer
#[async_trait]
pub trait ConversionTool: Send + Sync {
    /// Convert `input` into layer `layer` inside `output_dir`
    ///
    /// # Arguments
    /// * `input` - Intermediate file
    /// * `output_dir` - Directory receiving the layer's files
    /// * `layer` - Layer name, used as the output file stem
    async fn convert(&self, input: &Path, output_dir: &Path, layer: &str) -> Result<()>;
}

/// [`ConversionTool`] running an external command
#[derive(Debug, Clone)]
pub struct CommandTool {
    program: String,
    args: Vec<String>,
}

impl CommandTool {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    pub fn from_config(config: &ConverterConfig) -> Self {
        Self::new(config.program.clone(), config.args.clone())
    }

    /// Expand the argument template for one conversion
    pub fn arguments(&self, input: &Path, output_dir: &Path, layer: &str) -> Vec<String> {
        let input = input.to_string_lossy();
        let output = output_dir.to_string_lossy();
        self.args
            .iter()
            .map(|arg| {
                arg.replace("{input}", &input)
                    .replace("{output}", &output)
                    .replace("{layer}", layer)
            })
            .collect()
    }
}

#[async_trait]
impl ConversionTool for CommandTool {
    async fn convert(&self, input: &Path, output_dir: &Path, layer: &str) -> Result<()> {
        let args = self.arguments(input, output_dir, layer);
        debug!("Running {} {}", self.program, args.join(" "));

        let output = Command::new(&self.program)
            .args(&args)
            .output()
            .await
            .map_err(|e| ToolError::SpawnFailed {
                layer: layer.to_string(),
                message: e.to_string(),
            })?;

        let diagnostics = diagnostics(&output.stderr, &output.stdout);
        if !output.status.success() {
            return Err(ToolError::Failed {
                layer: layer.to_string(),
                status: output.status.code(),
                diagnostics,
            }
            .into());
        }

        if !has_layer_output(output_dir, layer).await? {
            return Err(ToolError::MissingOutput {
                layer: layer.to_string(),
                diagnostics,
            }
            .into());
        }

        debug!("Converted layer {}", layer);
        Ok(())
    }
}

fn diagnostics(stderr: &[u8], stdout: &[u8]) -> String {
    let stderr = String::from_utf8_lossy(stderr);
    let stdout = String::from_utf8_lossy(stdout);
    [stderr.trim(), stdout.trim()]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Whether any file in `dir` is named after `layer`
async fn has_layer_output(dir: &Path, layer: &str) -> Result<bool> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e.into()),
    };

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.file_stem().is_some_and(|stem| stem == layer) {
            return Ok(true);
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholders_substituted() {
        let tool = CommandTool::from_config(&ConverterConfig::default());
        let args = tool.arguments(
            Path::new("/tmp/w/points.geojson"),
            Path::new("/tmp/w/out"),
            "parcels_points",
        );
        assert_eq!(
            args,
            vec![
                "-s_srs",
                "EPSG:4326",
                "-t_srs",
                "EPSG:4326",
                "-f",
                "ESRI Shapefile",
                "/tmp/w/out/parcels_points.shp",
                "/tmp/w/points.geojson",
            ]
        );
    }

    #[test]
    fn test_diagnostics_join_streams() {
        assert_eq!(diagnostics(b"ERROR 1: bad\n", b""), "ERROR 1: bad");
        assert_eq!(diagnostics(b"warn\n", b"done\n"), "warn\ndone");
        assert_eq!(diagnostics(b"", b""), "");
    }

    #[tokio::test]
    async fn test_missing_program_fails_to_spawn() {
        let dir = tempfile::tempdir().unwrap();
        let tool = CommandTool::new("survey-export-no-such-tool", vec![]);
        let err = tool
            .convert(Path::new("in.geojson"), dir.path(), "export_points")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "ExternalToolError");
        assert!(err.to_string().contains("export_points"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_nonzero_exit_carries_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let tool = CommandTool::new(
            "sh",
            vec!["-c".into(), "echo 'ERROR 4: cannot open {input}' >&2; exit 1".into()],
        );
        let err = tool
            .convert(Path::new("layer.geojson"), dir.path(), "export_points")
            .await
            .unwrap_err();
        let text = err.to_string();
        assert!(text.contains("exited with 1"));
        assert!(text.contains("ERROR 4: cannot open layer.geojson"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_success_without_output_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let tool = CommandTool::new("sh", vec!["-c".into(), "exit 0".into()]);
        let err = tool
            .convert(Path::new("layer.geojson"), dir.path(), "export_lines")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("produced no output"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_success_with_output() {
        let dir = tempfile::tempdir().unwrap();
        let tool = CommandTool::new(
            "sh",
            vec!["-c".into(), "touch {output}/{layer}.shp {output}/{layer}.dbf".into()],
        );
        tool.convert(Path::new("layer.geojson"), dir.path(), "export_points")
            .await
            .unwrap();
        assert!(dir.path().join("export_points.dbf").exists());
    }
}
