use std::fs;
use std::io;
use std::path::Path;

use crate::library::LOCALIZATION_LANGUAGE;

const LANGUAGE_KEY: &str = "g_language";
const DEFAULT_LINE_ENDING: &str = "\r\n";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PatchOutcome {
    Created,
    Replaced,
    Appended,
    Unchanged,
}

pub fn required_line() -> String {
    format!("{LANGUAGE_KEY} = {LOCALIZATION_LANGUAGE}")
}

/// Make sure `path` selects the translated language. Other lines are kept
/// byte for byte, whatever their encoding.
pub fn patch_user_cfg(path: &Path) -> io::Result<PatchOutcome> {
    let required = required_line();
    if !path.exists() {
        fs::write(path, format!("{required}{DEFAULT_LINE_ENDING}"))?;
        return Ok(PatchOutcome::Created);
    }

    let content = fs::read(path)?;
    let (patched, outcome) = patch_content(&content, &required);
    fs::write(path, patched)?;
    Ok(outcome)
}

/// Rewrite `content` so it carries `required`, keeping its line endings.
pub fn patch_content(content: &[u8], required: &str) -> (Vec<u8>, PatchOutcome) {
    let line_ending: &[u8] = if content.windows(2).any(|pair| pair == b"\r\n") {
        b"\r\n"
    } else if content.contains(&b'\n') {
        b"\n"
    } else {
        DEFAULT_LINE_ENDING.as_bytes()
    };
    let trailing_newline = content.ends_with(b"\n");

    let body = content
        .strip_suffix(b"\n")
        .map(|rest| rest.strip_suffix(b"\r").unwrap_or(rest))
        .unwrap_or(content);
    let mut lines: Vec<&[u8]> = if content.is_empty() {
        Vec::new()
    } else {
        body.split(|&byte| byte == b'\n')
            .map(|line| line.strip_suffix(b"\r").unwrap_or(line))
            .collect()
    };

    let required = required.as_bytes();
    let outcome = match lines
        .iter()
        .position(|line| line.trim_ascii_start().starts_with(LANGUAGE_KEY.as_bytes()))
    {
        Some(index) if lines[index].trim_ascii() == required => PatchOutcome::Unchanged,
        Some(index) => {
            lines[index] = required;
            PatchOutcome::Replaced
        }
        None => {
            lines.push(required);
            PatchOutcome::Appended
        }
    };

    let mut patched = lines.join(line_ending);
    if trailing_newline {
        patched.extend_from_slice(line_ending);
    }
    (patched, outcome)
}

#[cfg(test)]
mod tests {
    use super::*;

    const REQUIRED: &str = "g_language = french_(france)";

    fn patch(content: &str) -> (String, PatchOutcome) {
        let (patched, outcome) = patch_content(content.as_bytes(), REQUIRED);
        (String::from_utf8(patched).expect("utf-8"), outcome)
    }

    #[test]
    fn creates_a_single_line_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("user.cfg");

        assert_eq!(patch_user_cfg(&path).expect("patch"), PatchOutcome::Created);
        let content = fs::read_to_string(&path).expect("read");
        assert_eq!(content.lines().collect::<Vec<_>>(), vec![REQUIRED]);
    }

    #[test]
    fn replaces_existing_language_line_in_place() {
        let (patched, outcome) = patch("r_fps=60\r\n  g_language = english\r\nsys_spec=4\r\n");

        assert_eq!(outcome, PatchOutcome::Replaced);
        assert_eq!(patched, format!("r_fps=60\r\n{REQUIRED}\r\nsys_spec=4\r\n"));
    }

    #[test]
    fn appends_exactly_one_line() {
        let (patched, outcome) = patch("r_fps=60\nsys_spec=4\n");

        assert_eq!(outcome, PatchOutcome::Appended);
        assert_eq!(patched, format!("r_fps=60\nsys_spec=4\n{REQUIRED}\n"));
        assert_eq!(patched.lines().filter(|l| l.contains("g_language")).count(), 1);
    }

    #[test]
    fn empty_file_gets_only_the_required_line() {
        let (patched, outcome) = patch("");
        assert_eq!(outcome, PatchOutcome::Appended);
        assert_eq!(patched, REQUIRED);
    }

    #[test]
    fn patching_is_idempotent() {
        for original in ["", "a=1", "a=1\r\nb=2\r\n", "g_language=german\n", "x\n\n"] {
            let (once, _) = patch(original);
            let (twice, outcome) = patch(&once);
            assert_eq!(once, twice, "input {original:?}");
            assert_eq!(outcome, PatchOutcome::Unchanged);
        }
    }

    #[test]
    fn patching_a_file_twice_leaves_it_unchanged() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("user.cfg");
        fs::write(&path, "r_fps=60\n").expect("seed");

        assert_eq!(patch_user_cfg(&path).expect("first"), PatchOutcome::Appended);
        let first = fs::read(&path).expect("read");
        assert_eq!(patch_user_cfg(&path).expect("second"), PatchOutcome::Unchanged);
        assert_eq!(fs::read(&path).expect("read"), first);
    }

    #[test]
    fn non_utf8_lines_survive_verbatim() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("user.cfg");
        let original: &[u8] = b"r_fps=60\r\nprofile=\xe9t\xe9\xff\r\n";
        fs::write(&path, original).expect("seed");

        assert_eq!(patch_user_cfg(&path).expect("patch"), PatchOutcome::Appended);
        let mut expected = original.to_vec();
        expected.extend_from_slice(REQUIRED.as_bytes());
        expected.extend_from_slice(b"\r\n");
        assert_eq!(fs::read(&path).expect("read"), expected);
    }
}
