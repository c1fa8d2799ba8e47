use std::fs;
use std::path::{Path, PathBuf};

use log::debug;

use crate::util::normalize_path_text;

/// Keys the launcher's web view has been seen storing the library folder under.
const LIBRARY_FOLDER_KEYS: [&[u8]; 2] = [b"library-folder", b"_file://\x00\x01library-folder"];
const LOCK_FILE: &str = "LOCK";

pub fn local_storage_dir(roaming_app_data: &Path) -> PathBuf {
    roaming_app_data
        .join("rsilauncher")
        .join("Local Storage")
        .join("leveldb")
}

/// Library folder recorded in the launcher's Local Storage database.
///
/// The database is copied to a temporary directory first so the launcher's
/// own files are never touched. An empty or absent value means the launcher
/// still uses its default folder.
pub fn library_folder_from_local_storage(
    roaming_app_data: &Path,
    default_library: &Path,
) -> Option<PathBuf> {
    let db_dir = local_storage_dir(roaming_app_data);
    if !db_dir.is_dir() {
        return None;
    }

    let raw = match read_library_value(&db_dir) {
        Ok(raw) => raw,
        Err(err) => {
            debug!("discovery: local storage unreadable: {err}");
            return None;
        }
    };

    let value = raw
        .map(|bytes| normalize_path_text(&decode_storage_value(&bytes)))
        .unwrap_or_default();
    if value.is_empty() {
        Some(default_library.to_path_buf())
    } else {
        Some(PathBuf::from(value))
    }
}

fn read_library_value(db_dir: &Path) -> Result<Option<Vec<u8>>, String> {
    let snapshot = tempfile::tempdir().map_err(|e| format!("failed to create snapshot dir: {e}"))?;
    let entries = fs::read_dir(db_dir).map_err(|e| format!("failed to list database: {e}"))?;
    for entry in entries {
        let entry = entry.map_err(|e| format!("failed to list database: {e}"))?;
        let is_file = entry.file_type().is_ok_and(|kind| kind.is_file());
        if !is_file || entry.file_name() == LOCK_FILE {
            continue;
        }
        fs::copy(entry.path(), snapshot.path().join(entry.file_name()))
            .map_err(|e| format!("failed to snapshot {}: {e}", entry.path().display()))?;
    }

    let mut options = rusty_leveldb::Options::default();
    options.create_if_missing = false;
    let mut db = rusty_leveldb::DB::open(snapshot.path(), options)
        .map_err(|e| format!("failed to open database: {e:?}"))?;

    Ok(LIBRARY_FOLDER_KEYS
        .iter()
        .find_map(|key| db.get(key).map(|value| value.to_vec())))
}

/// Chromium prefixes Local Storage strings with an encoding byte:
/// `0x00` for UTF-16LE, `0x01` for Latin-1.
pub fn decode_storage_value(raw: &[u8]) -> String {
    match raw.split_first() {
        Some((0, rest)) => {
            let units: Vec<u16> = rest
                .chunks_exact(2)
                .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
                .collect();
            String::from_utf16_lossy(&units)
        }
        Some((1, rest)) => rest.iter().map(|&byte| char::from(byte)).collect(),
        _ => String::from_utf8_lossy(raw).into_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_database(roaming: &Path, value: &[u8]) {
        let dir = local_storage_dir(roaming);
        fs::create_dir_all(&dir).expect("db dir");
        let mut options = rusty_leveldb::Options::default();
        options.create_if_missing = true;
        let mut db = rusty_leveldb::DB::open(&dir, options).expect("open db");
        db.put(b"library-folder", value).expect("put");
        db.flush().expect("flush");
    }

    #[test]
    fn decodes_chromium_prefixes() {
        assert_eq!(decode_storage_value(b"\x01C:\\Games"), r"C:\Games");
        assert_eq!(decode_storage_value(b"\x00D\x00:\x00"), "D:");
        assert_eq!(decode_storage_value(b"E:\\RSI"), r"E:\RSI");
        assert_eq!(decode_storage_value(b""), "");
    }

    #[test]
    fn missing_database_is_not_found() {
        let roaming = tempfile::tempdir().expect("tempdir");
        assert!(library_folder_from_local_storage(roaming.path(), Path::new("default")).is_none());
    }

    #[test]
    fn reads_library_folder_from_snapshot() {
        let roaming = tempfile::tempdir().expect("tempdir");
        let mut value = vec![1u8];
        value.extend_from_slice(br"D:\\Games\\RSI");
        write_database(roaming.path(), &value);

        let found = library_folder_from_local_storage(roaming.path(), Path::new("default"));
        assert_eq!(found, Some(PathBuf::from(r"D:\Games\RSI")));
    }

    #[test]
    fn empty_value_means_default_folder() {
        let roaming = tempfile::tempdir().expect("tempdir");
        write_database(roaming.path(), b"\x01");

        let found = library_folder_from_local_storage(roaming.path(), Path::new("default"));
        assert_eq!(found, Some(PathBuf::from("default")));
    }
}
