//! Document conversion through an external converter (pandoc).
//!
//! Text formats are piped through stdin with their front matter removed so
//! the metadata block never shows up in the page body. Binary formats are
//! handed to the converter by path.

use crate::content::front_matter;
use anyhow::{Context, Result, bail};
use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
    process::{Command, Stdio},
};

/// Directory, relative to the produced page, that embedded media lands in.
pub const MEDIA_DIR: &str = "_assets";

/// Turns one source document into an HTML fragment.
pub trait Converter: Send + Sync {
    /// Convert `input` into `<output_dir>/<base_name>.html` and return the
    /// produced path.
    fn convert(&self, input: &Path, output_dir: &Path, base_name: &str) -> Result<PathBuf>;
}

/// Converter backed by the `pandoc` command line.
#[derive(Debug, Clone)]
pub struct Pandoc {
    command: Vec<String>,
}

impl Pandoc {
    /// `command` is the program followed by any leading arguments.
    pub fn new(command: &[String]) -> Self {
        Self {
            command: command.to_vec(),
        }
    }

    /// Reader format for text sources; `None` means pass by path.
    fn text_format(input: &Path) -> Option<&'static str> {
        let ext = input.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "md" | "markdown" => Some("gfm"),
            "txt" => Some("markdown"),
            _ => None,
        }
    }
}

impl Converter for Pandoc {
    fn convert(&self, input: &Path, output_dir: &Path, base_name: &str) -> Result<PathBuf> {
        let Some((program, leading)) = self.command.split_first() else {
            bail!("converter command is empty");
        };

        let file_name = format!("{base_name}.html");
        let output = output_dir.join(&file_name);

        let mut cmd = Command::new(program);
        cmd.args(leading).current_dir(output_dir);

        let stdin = match Self::text_format(input) {
            Some(format) => {
                let content = fs::read_to_string(input)
                    .with_context(|| format!("Failed to read {}", input.display()))?;
                let resources = input.parent().unwrap_or(Path::new("."));
                cmd.arg("-f").arg(format).arg("--resource-path").arg(resources);
                Some(front_matter::strip(&content).to_owned())
            }
            None => {
                cmd.arg(input);
                None
            }
        };

        cmd.arg("-o")
            .arg(&file_name)
            .args(["-t", "html"])
            .arg(format!("--extract-media={MEDIA_DIR}"))
            .stdin(if stdin.is_some() { Stdio::piped() } else { Stdio::null() })
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        let mut child = cmd
            .spawn()
            .with_context(|| format!("Failed to run `{program}`"))?;

        if let Some(body) = stdin
            && let Some(mut pipe) = child.stdin.take()
        {
            pipe.write_all(body.as_bytes())
                .with_context(|| format!("Failed to feed {} to `{program}`", input.display()))?;
        }

        let result = child.wait_with_output()?;
        if !result.status.success() {
            bail!(
                "`{program}` failed on {} ({}):\n{}",
                input.display(),
                result.status,
                String::from_utf8_lossy(&result.stderr).trim()
            );
        }

        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_formats() {
        assert_eq!(Pandoc::text_format(Path::new("a.md")), Some("gfm"));
        assert_eq!(Pandoc::text_format(Path::new("a.MARKDOWN")), Some("gfm"));
        assert_eq!(Pandoc::text_format(Path::new("a.txt")), Some("markdown"));
        assert_eq!(Pandoc::text_format(Path::new("a.docx")), None);
        assert_eq!(Pandoc::text_format(Path::new("README")), None);
    }

    #[test]
    fn test_empty_command() {
        let dir = tempfile::tempdir().unwrap();
        let err = Pandoc::new(&[])
            .convert(&dir.path().join("a.md"), dir.path(), "a")
            .unwrap_err();
        assert!(err.to_string().contains("empty"));
    }

    #[test]
    fn test_missing_program() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("a.docx");
        fs::write(&input, b"not really").unwrap();

        let pandoc = Pandoc::new(&["spot-no-such-converter".to_string()]);
        assert!(pandoc.convert(&input, dir.path(), "a").is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_failure_reports_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("a.docx");
        fs::write(&input, b"x").unwrap();

        let pandoc = Pandoc::new(&["sh".into(), "-c".into(), "echo boom >&2; exit 3".into()]);
        let err = pandoc.convert(&input, dir.path(), "a").unwrap_err();
        assert!(err.to_string().contains("boom"));
    }

    #[cfg(unix)]
    #[test]
    fn test_stdin_has_no_front_matter() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("post.md");
        fs::write(&input, "---\ntitle: Hidden\n---\n# Body\n").unwrap();

        // `sh -c script arg0 args..`: copy stdin into the `-o` target
        let script = r#"while [ "$1" != "-o" ]; do shift; done; cat > "$2""#;
        let pandoc = Pandoc::new(&["sh".into(), "-c".into(), script.into(), "sh".into()]);

        let output = pandoc.convert(&input, dir.path(), "post").unwrap();
        assert_eq!(output, dir.path().join("post.html"));
        assert_eq!(fs::read_to_string(&output).unwrap(), "# Body\n");
    }
}
