//! Request-scoped kubeconfig files.

use std::{io::Write, path::Path};

use indexmap::IndexMap;
use tempfile::NamedTempFile;

pub const KUBECONFIG_ENV: &str = "KUBECONFIG";

/// A kubeconfig written to a private temporary file.
///
/// The file is created with owner-only permissions and removed on drop.
#[derive(Debug)]
pub struct PersistedKubeconfig {
    file: NamedTempFile,
}

impl PersistedKubeconfig {
    pub fn persist(content: &[u8]) -> std::io::Result<Self> {
        let mut file = tempfile::Builder::new()
            .prefix("kubeconfig-")
            .suffix(".yaml")
            .tempfile()?;
        file.write_all(content)?;
        file.flush()?;
        Ok(Self { file })
    }

    /// Persist `content` when present.
    pub fn persist_optional(content: Option<&[u8]>) -> std::io::Result<Option<Self>> {
        content.map(Self::persist).transpose()
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Environment exporting this file as `KUBECONFIG`.
    pub fn env(&self) -> IndexMap<String, String> {
        IndexMap::from([(KUBECONFIG_ENV.to_string(), self.path().display().to_string())])
    }
}

/// Environment for an optional kubeconfig; empty without one.
pub fn kube_env(kubeconfig: Option<&PersistedKubeconfig>) -> IndexMap<String, String> {
    kubeconfig.map(PersistedKubeconfig::env).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_lives_as_long_as_the_handle() {
        let kubeconfig = PersistedKubeconfig::persist(b"apiVersion: v1\n").unwrap();
        let path = kubeconfig.path().to_path_buf();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "apiVersion: v1\n");
        assert_eq!(kubeconfig.env()[KUBECONFIG_ENV], path.display().to_string());
        drop(kubeconfig);
        assert!(!path.exists());
    }

    #[cfg(unix)]
    #[test]
    fn file_is_private() {
        use std::os::unix::fs::PermissionsExt;
        let kubeconfig = PersistedKubeconfig::persist(b"token: secret").unwrap();
        let mode = std::fs::metadata(kubeconfig.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o077, 0);
    }

    #[test]
    fn absent_kubeconfig_has_no_env() {
        assert!(PersistedKubeconfig::persist_optional(None).unwrap().is_none());
        assert!(kube_env(None).is_empty());
    }
}
