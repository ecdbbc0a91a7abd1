use std::path::PathBuf;

use dirs_next::home_dir;

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &str) -> PathBuf {
    let p = path.trim();
    if p == "~" {
        return home_dir().unwrap_or_else(|| PathBuf::from("~"));
    }
    if let Some(rest) = p.strip_prefix("~/") {
        return home_dir().unwrap_or_else(|| PathBuf::from("~")).join(rest);
    }
    PathBuf::from(p)
}

/// True when `name` is a single path component that cannot escape its directory.
///
/// Used to allow-list resource identifiers before they are joined onto a
/// scripts directory.
pub fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0'])
        && !name.chars().any(char::is_whitespace)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expands_home_prefix() {
        let home = home_dir().unwrap_or_else(|| PathBuf::from("~"));
        assert_eq!(expand_tilde("~/scripts"), home.join("scripts"));
        assert_eq!(expand_tilde("/scripts"), PathBuf::from("/scripts"));
    }

    #[test]
    fn plain_file_names_only() {
        assert!(is_plain_file_name("backup-job"));
        assert!(is_plain_file_name("update.sh"));
        assert!(!is_plain_file_name("../etc/passwd"));
        assert!(!is_plain_file_name(".."));
        assert!(!is_plain_file_name("a b"));
        assert!(!is_plain_file_name(""));
    }
}
