//! Candidate directory discovery
//!
//! Builds the ordered list of directories the supervisor should watch:
//! configured paths first, then the usual game save and install locations.

use crate::config::SystemConfig;
use std::path::{Component, Path, PathBuf};

const GAME_DIR: &str = "Dustforce";
const USER_DIR: &str = "user";

/// Lexically normalize a path
///
/// Drops `.` components and trailing separators. The filesystem is never
/// consulted, so the path does not need to exist.
pub fn normalize(path: &Path) -> PathBuf {
    let normalized: PathBuf = path
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect();

    if normalized.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        normalized
    }
}

/// `<root>/Steam/steamapps/common/Dustforce/user`
fn steam_user_dir(steam_root: &Path) -> PathBuf {
    steam_root
        .join("steamapps")
        .join("common")
        .join(GAME_DIR)
        .join(USER_DIR)
}

/// Platform-default directories where the game keeps its stats files
#[cfg(windows)]
pub fn default_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    // %APPDATA%\Dustforce\user
    if let Some(roaming) = dirs::data_dir() {
        candidates.push(roaming.join(GAME_DIR).join(USER_DIR));
    }

    let program_files_x86 = std::env::var_os("ProgramFiles(x86)").map(PathBuf::from);
    let program_files = std::env::var_os("ProgramFiles").map(PathBuf::from);

    if let Some(x86) = &program_files_x86 {
        candidates.push(steam_user_dir(&x86.join("Steam")));
    }
    if let Some(native) = program_files {
        if program_files_x86.as_ref() != Some(&native) {
            candidates.push(steam_user_dir(&native.join("Steam")));
        }
    }

    candidates
}

/// Platform-default directories where the game keeps its stats files
#[cfg(not(windows))]
pub fn default_candidates() -> Vec<PathBuf> {
    let Some(home) = dirs::home_dir() else {
        return Vec::new();
    };

    vec![
        steam_user_dir(&home.join(".local/share/Steam")),
        steam_user_dir(&home.join(".steam/steam")),
    ]
}

/// Ordered, deduplicated candidate list for a configuration
pub fn candidate_paths(config: &SystemConfig) -> Vec<PathBuf> {
    let defaults = if config.include_default_paths {
        default_candidates()
    } else {
        Vec::new()
    };

    dedup(config.paths.iter().cloned().chain(defaults))
}

fn dedup(paths: impl IntoIterator<Item = PathBuf>) -> Vec<PathBuf> {
    let mut out: Vec<PathBuf> = Vec::new();
    for path in paths {
        let path = normalize(&path);
        if !out.contains(&path) {
            out.push(path);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_drops_curdir_and_trailing_separator() {
        assert_eq!(normalize(Path::new("/games/./dust/")), PathBuf::from("/games/dust"));
        assert_eq!(normalize(Path::new("./user")), PathBuf::from("user"));
        assert_eq!(normalize(Path::new(".")), PathBuf::from("."));
    }

    #[test]
    fn test_normalize_keeps_parent_components() {
        // `..` is not resolved lexically; symlinks could make that wrong
        assert_eq!(normalize(Path::new("/a/b/../c")), PathBuf::from("/a/b/../c"));
    }

    #[test]
    fn test_steam_user_dir_layout() {
        let dir = steam_user_dir(Path::new("/steam"));
        assert!(dir.ends_with("steamapps/common/Dustforce/user"));
    }

    #[test]
    fn test_config_paths_come_first() {
        let config = SystemConfig {
            paths: vec![PathBuf::from("/games/custom")],
            ..SystemConfig::default()
        };

        let candidates = candidate_paths(&config);
        assert_eq!(candidates[0], PathBuf::from("/games/custom"));
        assert_eq!(candidates.len(), 1 + default_candidates().len());
    }

    #[test]
    fn test_defaults_can_be_disabled() {
        let config = SystemConfig {
            paths: vec![PathBuf::from("/games/custom")],
            include_default_paths: false,
            ..SystemConfig::default()
        };

        assert_eq!(candidate_paths(&config), vec![PathBuf::from("/games/custom")]);
    }

    #[test]
    fn test_duplicates_are_removed() {
        let config = SystemConfig {
            paths: vec![
                PathBuf::from("/games/custom"),
                PathBuf::from("/games/custom/"),
                PathBuf::from("/games/./custom"),
            ],
            include_default_paths: false,
            ..SystemConfig::default()
        };

        assert_eq!(candidate_paths(&config), vec![PathBuf::from("/games/custom")]);
    }

    #[test]
    fn test_config_path_equal_to_default_is_kept_once() {
        let Some(first_default) = default_candidates().into_iter().next() else {
            return;
        };
        let config = SystemConfig {
            paths: vec![first_default.clone()],
            ..SystemConfig::default()
        };

        let candidates = candidate_paths(&config);
        assert_eq!(candidates.iter().filter(|p| **p == first_default).count(), 1);
    }
}
