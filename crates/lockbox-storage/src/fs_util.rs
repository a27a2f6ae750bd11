use std::{
    fs::{self, File},
    io::{self, Read, Write},
    path::Path,
};

use lockbox_core::VaultError;
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;

/// Write `bytes` to `path` through a temp file in the same directory and an atomic
/// rename, so readers see either the old contents or the new ones.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), VaultError> {
    let parent = path.parent().ok_or_else(|| VaultError::Storage {
        reason: "invalid storage path".to_string(),
    })?;
    fs::create_dir_all(parent).map_err(VaultError::storage)?;

    let mut tmp = NamedTempFile::new_in(parent).map_err(VaultError::storage)?;
    tmp.write_all(bytes).map_err(VaultError::storage)?;
    tmp.flush().map_err(VaultError::storage)?;
    tmp.persist(path).map_err(|e| VaultError::storage(e.error))?;
    Ok(())
}

/// Read a whole file; `Ok(None)` when it does not exist.
pub(crate) fn read_if_exists(path: &Path) -> Result<Option<Vec<u8>>, VaultError> {
    let mut file = match File::open(path) {
        Ok(file) => file,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(VaultError::storage(err)),
    };

    let mut buf = Vec::new();
    file.read_to_end(&mut buf).map_err(VaultError::storage)?;
    Ok(Some(buf))
}

/// Remove a file, treating absence as success.
pub(crate) fn remove_if_exists(path: &Path) -> Result<(), VaultError> {
    match fs::remove_file(path) {
        Ok(_) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(VaultError::storage(err)),
    }
}

/// File name for an arbitrary identifier: lowercase hex SHA-256, so every id maps to a
/// fixed-length name that is stable on case-insensitive filesystems.
pub(crate) fn file_name_for(id: &str) -> String {
    hex::encode(Sha256::digest(id.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_names_are_fixed_length_lowercase_hex() {
        let long = "x".repeat(1000);
        for id in ["token", "", "../../etc/passwd", "a/b\\c", "ключ", " ", long.as_str()] {
            let name = file_name_for(id);
            assert_eq!(name.len(), 64, "id {id:?}");
            assert!(name
                .chars()
                .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
        }
    }

    #[test]
    fn ids_differing_only_in_case_get_distinct_names() {
        assert_ne!(file_name_for("Token"), file_name_for("token"));
        assert_ne!(
            file_name_for("Token").to_lowercase(),
            file_name_for("token").to_lowercase()
        );
    }

    #[test]
    fn atomic_write_replaces_contents() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("file");
        write_atomic(&path, b"first").expect("write");
        write_atomic(&path, b"second").expect("overwrite");
        assert_eq!(read_if_exists(&path).expect("read"), Some(b"second".to_vec()));
    }

    #[test]
    fn missing_file_reads_as_none_and_removes_cleanly() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("absent");
        assert_eq!(read_if_exists(&path).expect("read"), None);
        remove_if_exists(&path).expect("remove missing");
    }
}
