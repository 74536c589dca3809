// SPDX-FileCopyrightText: 2026 Waynebot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Filesystem and network bounds for tool execution.
//!
//! Path checks are lexical: `path` is joined onto the active directory,
//! `.` and `..` are resolved without touching the filesystem, and the result
//! relative to the cleaned active directory must not climb out with `..`.

use std::path::{Component, Path, PathBuf};

use waynebot_core::WaynebotError;

/// Hosts `http_fetch` refuses by default.
pub fn default_blocked_hosts() -> Vec<String> {
    ["localhost", "127.0.0.1", "0.0.0.0", "169.254.169.254", "::1"]
        .into_iter()
        .map(String::from)
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sandbox {
    /// Fallback directory when a call carries no project directory.
    pub base_dir: PathBuf,
    /// Command base names `shell_exec` may run.
    pub allowed_commands: Vec<String>,
    pub blocked_hosts: Vec<String>,
}

impl Sandbox {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            allowed_commands: Vec::new(),
            blocked_hosts: default_blocked_hosts(),
        }
    }

    pub fn is_command_allowed(&self, command: &str) -> bool {
        self.allowed_commands.iter().any(|c| c == command)
    }

    pub fn is_host_blocked(&self, host: &str) -> bool {
        self.blocked_hosts.iter().any(|h| h == host)
    }
}

/// Lexically normalize a path the way `filepath.Clean` style cleaning does:
/// drop `.`, fold `name/..`, and keep leading `..` on relative paths.
pub fn clean_path(path: &Path) -> PathBuf {
    let mut out: Vec<Component<'_>> = Vec::new();
    for comp in path.components() {
        match comp {
            Component::CurDir => {}
            Component::ParentDir => match out.last() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(comp),
            },
            other => out.push(other),
        }
    }
    if out.is_empty() {
        return PathBuf::from(".");
    }
    out.iter().collect()
}

/// Resolve `path` under `base`, rejecting anything that escapes it.
///
/// Absolute inputs are treated as relative to `base`.
pub fn secure_path(base: &Path, path: &str) -> Result<PathBuf, WaynebotError> {
    let relative: PathBuf = Path::new(path)
        .components()
        .filter(|c| !matches!(c, Component::RootDir | Component::Prefix(_)))
        .collect();
    let base = clean_path(base);
    let cleaned = clean_path(&base.join(relative));
    let inside = if base == Path::new(".") {
        // Relative to the working directory: anything not starting with `..`.
        !matches!(
            cleaned.components().next(),
            Some(Component::ParentDir | Component::RootDir | Component::Prefix(_))
        )
    } else {
        cleaned.starts_with(&base)
    };
    if inside {
        Ok(cleaned)
    } else {
        Err(WaynebotError::Tool(format!("path escapes sandbox: {path:?}")))
    }
}

/// Cap `s` at `cap` bytes (on a char boundary) and append `marker` when cut.
pub fn truncate_with_marker(s: &str, cap: usize, marker: &str) -> String {
    if s.len() <= cap {
        return s.to_string();
    }
    let mut end = cap;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}{marker}", &s[..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_folds_dots() {
        assert_eq!(clean_path(Path::new("/a/./b/../c")), PathBuf::from("/a/c"));
        assert_eq!(clean_path(Path::new("a/../../x")), PathBuf::from("../x"));
        assert_eq!(clean_path(Path::new("/..")), PathBuf::from("/"));
        assert_eq!(clean_path(Path::new("a/..")), PathBuf::from("."));
    }

    #[test]
    fn secure_path_accepts_inside() {
        let base = Path::new("/sandbox");
        assert_eq!(
            secure_path(base, "notes/a.txt").unwrap(),
            PathBuf::from("/sandbox/notes/a.txt")
        );
        assert_eq!(
            secure_path(base, "x/../y.txt").unwrap(),
            PathBuf::from("/sandbox/y.txt")
        );
        assert_eq!(
            secure_path(base, "../sandbox/z").unwrap(),
            PathBuf::from("/sandbox/z")
        );
        assert_eq!(
            secure_path(base, "/etc/passwd").unwrap(),
            PathBuf::from("/sandbox/etc/passwd")
        );
    }

    #[test]
    fn secure_path_under_current_dir() {
        let base = Path::new(".");
        assert_eq!(secure_path(base, "a.txt").unwrap(), PathBuf::from("a.txt"));
        assert_eq!(
            secure_path(base, "./notes/../b.md").unwrap(),
            PathBuf::from("b.md")
        );
        assert_eq!(
            secure_path(Path::new("./work/"), "c.txt").unwrap(),
            PathBuf::from("work/c.txt")
        );
        for bad in ["..", "../x", "a/../../x"] {
            assert!(secure_path(base, bad).is_err(), "{bad}");
        }
    }

    #[test]
    fn secure_path_rejects_escape() {
        let base = Path::new("/sandbox");
        for bad in ["..", "../etc/passwd", "a/../../b", "../sandbox-other/x"] {
            let err = secure_path(base, bad).unwrap_err();
            assert!(err.to_string().contains("escapes sandbox"), "{bad}");
        }
    }

    #[test]
    fn allow_and_block_lists() {
        let mut sb = Sandbox::new("/tmp/x");
        sb.allowed_commands = vec!["ls".into()];
        assert!(sb.is_command_allowed("ls"));
        assert!(!sb.is_command_allowed("rm"));
        assert!(sb.is_host_blocked("169.254.169.254"));
        assert!(!sb.is_host_blocked("example.com"));
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_with_marker("abc", 3, "!"), "abc");
        assert_eq!(truncate_with_marker("abcd", 3, "!"), "abc!");
        assert_eq!(truncate_with_marker("aé", 2, "!"), "a!");
    }
}
