//! On-disk workspace: the per-user root directory holding the key-derivation
//! configuration and all safe files.
//!
//! Layout:
//! - `workspace.json`: KDF salt and master-key verifier, hex-encoded. Written
//!   exactly once at first initialization and never changed thereafter.
//! - `<name>.safe`: one encrypted envelope per safe.
//!
//! The root directory is created with owner-only access, and every file is
//! written via a temp-file-then-rename sequence so a crash mid-write never
//! leaves a half-written file behind.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Result, SafeholdError};
use crate::kdf::{SALT_LEN, VERIFIER_LEN};

/// Workspace configuration file name
pub const CONFIG_FILE_NAME: &str = "workspace.json";

/// File extension for safe files
pub const SAFE_FILE_EXTENSION: &str = "safe";

/// Current configuration format version
const CONFIG_VERSION: u32 = 1;

/// Configuration persisted in `workspace.json`.
///
/// The salt and verifier are not secret but are integrity-critical: losing
/// them makes every safe in the workspace undecryptable.
#[derive(Debug, Serialize, Deserialize)]
struct WorkspaceConfig {
    version: u32,
    #[serde(with = "hex")]
    kdf_salt: [u8; SALT_LEN],
    #[serde(with = "hex")]
    verifier: [u8; VERIFIER_LEN],
}

/// An initialized on-disk workspace.
#[derive(Debug)]
pub struct Workspace {
    root: PathBuf,
    kdf_salt: [u8; SALT_LEN],
    verifier: [u8; VERIFIER_LEN],
}

impl Workspace {
    /// Check whether a workspace has been initialized at `root`.
    ///
    /// This is a fast check that does not require a passphrase.
    pub fn exists(root: &Path) -> bool {
        root.join(CONFIG_FILE_NAME).is_file()
    }

    /// Create a fresh workspace at `root` with the given salt and verifier.
    ///
    /// The root directory is created with owner-only permissions. Fails if
    /// the path exists but is not a directory, or if a configuration file is
    /// already present.
    pub fn create(
        root: &Path,
        kdf_salt: [u8; SALT_LEN],
        verifier: [u8; VERIFIER_LEN],
    ) -> Result<Workspace> {
        if root.exists() && !root.is_dir() {
            return Err(SafeholdError::Workspace(format!(
                "workspace root {:?} exists but is not a directory",
                root
            )));
        }
        if Self::exists(root) {
            return Err(SafeholdError::Workspace(format!(
                "workspace at {:?} is already initialized",
                root
            )));
        }

        fs::create_dir_all(root)?;

        // Owner-only access on the workspace root
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = fs::metadata(root)?.permissions();
            perms.set_mode(0o700);
            fs::set_permissions(root, perms)?;
        }

        let config = WorkspaceConfig {
            version: CONFIG_VERSION,
            kdf_salt,
            verifier,
        };
        let content = serde_json::to_string_pretty(&config).map_err(|e| {
            SafeholdError::Workspace(format!("Failed to serialize workspace config: {}", e))
        })?;

        write_file_atomic(&root.join(CONFIG_FILE_NAME), content.as_bytes())?;

        info!("Created workspace at {:?}", root);
        Ok(Workspace {
            root: root.to_path_buf(),
            kdf_salt,
            verifier,
        })
    }

    /// Load an existing workspace from `root`.
    pub fn load(root: &Path) -> Result<Workspace> {
        let config_path = root.join(CONFIG_FILE_NAME);

        let content = fs::read_to_string(&config_path).map_err(|e| {
            SafeholdError::Workspace(format!("Failed to read workspace config: {}", e))
        })?;

        let config: WorkspaceConfig = serde_json::from_str(&content).map_err(|e| {
            SafeholdError::Workspace(format!("Failed to parse workspace config: {}", e))
        })?;

        if config.version != CONFIG_VERSION {
            return Err(SafeholdError::Workspace(format!(
                "Unsupported workspace config version: {}",
                config.version
            )));
        }

        debug!("Loaded workspace at {:?}", root);
        Ok(Workspace {
            root: root.to_path_buf(),
            kdf_salt: config.kdf_salt,
            verifier: config.verifier,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn salt(&self) -> &[u8; SALT_LEN] {
        &self.kdf_salt
    }

    pub fn verifier(&self) -> &[u8; VERIFIER_LEN] {
        &self.verifier
    }

    /// Path of the file backing the safe named `name`.
    pub fn safe_path(&self, name: &str) -> PathBuf {
        self.root
            .join(format!("{}.{}", name, SAFE_FILE_EXTENSION))
    }

    /// Names of all safes persisted in this workspace, sorted.
    pub fn list_safes(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();

        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(SAFE_FILE_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                names.push(stem.to_string());
            }
        }

        names.sort();
        Ok(names)
    }
}

/// Write `bytes` to `path` atomically.
///
/// The data goes to a sibling temp file first, is synced to disk, then the
/// temp file is renamed over the target. A crash at any point leaves either
/// the old file or the complete new one, never a mix.
pub(crate) fn write_file_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let tmp_path = tmp_sibling(path);

    let mut file = fs::File::create(&tmp_path)?;
    file.write_all(bytes)?;
    file.sync_all()?;

    // Set restrictive permissions before the file becomes visible under
    // its final name
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = file.metadata()?.permissions();
        perms.set_mode(0o600);
        fs::set_permissions(&tmp_path, perms)?;
    }
    drop(file);

    fs::rename(&tmp_path, path)?;
    Ok(())
}

fn tmp_sibling(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("workspace");

        let created = Workspace::create(&root, [3u8; SALT_LEN], [4u8; VERIFIER_LEN]).unwrap();
        assert!(Workspace::exists(&root));

        let loaded = Workspace::load(&root).unwrap();
        assert_eq!(loaded.salt(), created.salt());
        assert_eq!(loaded.verifier(), created.verifier());
    }

    #[test]
    fn test_create_rejects_non_directory_root() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("occupied");
        fs::write(&root, b"a plain file").unwrap();

        let err = Workspace::create(&root, [0u8; SALT_LEN], [0u8; VERIFIER_LEN]).unwrap_err();
        assert!(matches!(err, SafeholdError::Workspace(_)));
    }

    #[test]
    fn test_create_rejects_initialized_root() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("workspace");

        Workspace::create(&root, [1u8; SALT_LEN], [1u8; VERIFIER_LEN]).unwrap();
        let err = Workspace::create(&root, [2u8; SALT_LEN], [2u8; VERIFIER_LEN]).unwrap_err();
        assert!(matches!(err, SafeholdError::Workspace(_)));

        // The original configuration is untouched
        let loaded = Workspace::load(&root).unwrap();
        assert_eq!(loaded.salt(), &[1u8; SALT_LEN]);
    }

    #[test]
    fn test_list_safes_only_sees_safe_files() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("workspace");
        let ws = Workspace::create(&root, [0u8; SALT_LEN], [0u8; VERIFIER_LEN]).unwrap();

        fs::write(ws.safe_path("mail"), b"x").unwrap();
        fs::write(ws.safe_path("bank"), b"x").unwrap();
        fs::write(root.join("notes.txt"), b"x").unwrap();

        assert_eq!(ws.list_safes().unwrap(), vec!["bank", "mail"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_owner_only_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("workspace");
        Workspace::create(&root, [0u8; SALT_LEN], [0u8; VERIFIER_LEN]).unwrap();

        let dir_mode = fs::metadata(&root).unwrap().permissions().mode() & 0o777;
        assert_eq!(dir_mode, 0o700);

        let config_mode = fs::metadata(root.join(CONFIG_FILE_NAME))
            .unwrap()
            .permissions()
            .mode()
            & 0o777;
        assert_eq!(config_mode, 0o600);
    }
}
