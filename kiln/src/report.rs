//! Picking the errors out of a build tool's stderr.
//!
//! Font tools log freely to stderr; only some lines mean the build went wrong.

use std::fmt::Display;

/// Prefixes the final error kiln reports before exiting.
pub const ERROR_PREFIX: &str = "kiln: Error:";

const MARKERS: [&str; 2] = [ERROR_PREFIX, "fontmake: Error:"];

/// The line kiln writes to stderr when a build fails.
pub fn error_line(err: &impl Display) -> String {
    format!("{ERROR_PREFIX} {err}")
}

/// Lines that start with `ERROR:` or carry a tool's `<name>: Error:` prefix.
pub fn error_lines(stderr: &str) -> Vec<&str> {
    stderr
        .lines()
        .map(str::trim_end)
        .filter(|line| line.starts_with("ERROR:") || MARKERS.iter().any(|m| line.contains(m)))
        .collect()
}

/// The error lines of `stderr` joined up, or None if it holds only noise.
pub fn error_report(stderr: &str) -> Option<String> {
    let lines = error_lines(stderr);
    (!lines.is_empty()).then(|| lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use crate::Error;

    use super::{error_line, error_lines, error_report};

    const STDERR: &str = "\
INFO:fontmake.font_project:Building master TTFs
WARNING:ufo2ft:glyph 'a' has no unicode
ERROR: glyph 'b' is not interpolatable
fontmake: Error: In 'Test.glyphs' -> 'master_ttf/Test-Regular.ttf': bad things
  traceback noise mentioning ERROR: somewhere inside
";

    #[test]
    fn only_error_lines() {
        assert_eq!(
            vec![
                "ERROR: glyph 'b' is not interpolatable",
                "fontmake: Error: In 'Test.glyphs' -> 'master_ttf/Test-Regular.ttf': bad things",
            ],
            error_lines(STDERR)
        );
    }

    #[test]
    fn noise_is_no_report() {
        assert_eq!(None, error_report("INFO: fine\nWARNING: careful\n"));
        assert_eq!(None, error_report(""));
    }

    #[test]
    fn our_own_failures_are_picked_up() {
        let err = Error::FontsFailed {
            failed: vec!["Test-VF".to_string()],
            total: 3,
        };
        let stderr = format!("1: ThreadId(2): INFO: Building 3 fonts\n{}\n", error_line(&err));
        assert_eq!(
            Some("kiln: Error: 1 of 3 fonts failed: Test-VF".to_string()),
            error_report(&stderr)
        );
    }
}
