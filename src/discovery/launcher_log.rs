use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use crate::util::normalize_path_text;

const CHANGE_LIBRARY_MARKER: &str = "CHANGE_LIBRARY_FOLDER";
/// The new folder is printed this many lines after the marker.
const PATH_LINE_OFFSET: usize = 3;

pub fn launcher_log_file(roaming_app_data: &Path) -> PathBuf {
    roaming_app_data
        .join("rsilauncher")
        .join("logs")
        .join("log.log")
}

/// Most recent library folder change recorded in the launcher log.
pub fn library_folder_from_log(log_file: &Path) -> Option<PathBuf> {
    let file = File::open(log_file).ok()?;
    let lines = BufReader::new(file)
        .split(b'\n')
        .map_while(Result::ok)
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned());
    scrape_library_folder(lines)
}

pub fn scrape_library_folder<I>(lines: I) -> Option<PathBuf>
where
    I: IntoIterator<Item = String>,
{
    let mut marker_at = None;
    let mut found = None;

    for (index, line) in lines.into_iter().enumerate() {
        if line.contains(CHANGE_LIBRARY_MARKER) {
            marker_at = Some(index);
        } else if marker_at.is_some_and(|marker| index == marker + PATH_LINE_OFFSET) {
            let path = normalize_path_text(line.trim_end_matches('\r'));
            if !path.is_empty() {
                found = Some(PathBuf::from(path));
            }
        }
    }

    found
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    fn lines(text: &str) -> Vec<String> {
        text.lines().map(str::to_owned).collect()
    }

    #[test]
    fn takes_the_last_recorded_change() {
        let log = lines(
            r#"[info] boot
[info] CHANGE_LIBRARY_FOLDER
{
  "libraryFolder":
  "C:\\Old\\Library"
}
[info] CHANGE_LIBRARY_FOLDER
{
  "libraryFolder":
  "D:\\Games\\Roberts Space Industries"
}"#,
        );

        assert_eq!(
            scrape_library_folder(log),
            Some(PathBuf::from(r"D:\Games\Roberts Space Industries"))
        );
    }

    #[test]
    fn truncated_log_after_marker_keeps_earlier_value() {
        let log = lines(
            r#"CHANGE_LIBRARY_FOLDER
a
b
"E:\\RSI"
CHANGE_LIBRARY_FOLDER
a"#,
        );
        assert_eq!(scrape_library_folder(log), Some(PathBuf::from(r"E:\RSI")));
    }

    #[test]
    fn no_marker_means_not_found() {
        assert!(scrape_library_folder(lines("hello\nworld")).is_none());
    }

    #[test]
    fn reads_log_file_from_disk() {
        let roaming = tempfile::tempdir().expect("tempdir");
        let path = launcher_log_file(roaming.path());
        fs::create_dir_all(path.parent().expect("parent")).expect("log dir");
        fs::write(&path, "CHANGE_LIBRARY_FOLDER\r\n{\r\nx\r\n  \"F:\\\\SC\"  \r\n").expect("write");

        assert_eq!(library_folder_from_log(&path), Some(PathBuf::from(r"F:\SC")));
        assert!(library_folder_from_log(&roaming.path().join("missing.log")).is_none());
    }
}
