//! Entry selection and output path resolution for extraction.

use std::path::{Component, Path, PathBuf};

use anyhow::{Result, bail};

use crate::archive::basename;

/// unzip-style include/exclude filter.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    /// Requested names; empty selects everything.
    pub files: Vec<String>,
    /// Patterns to skip, matched as substring or glob.
    pub exclude: Vec<String>,
}

impl Selection {
    pub fn new(files: Vec<String>, exclude: Vec<String>) -> Self {
        Self { files, exclude }
    }

    /// Whether the entry called `name` should be extracted. Directories
    /// never are; they are created on demand for the files inside them.
    pub fn matches(&self, name: &str) -> bool {
        if name.ends_with('/') {
            return false;
        }

        let requested = self.files.is_empty()
            || self.files.iter().any(|f| {
                if has_glob_chars(f) {
                    glob_match(f, name)
                } else {
                    name == f.as_str() || basename(name) == f.as_str()
                }
            });

        requested
            && !self
                .exclude
                .iter()
                .any(|x| name.contains(x.as_str()) || glob_match(x, name))
    }
}

pub fn has_glob_chars(pattern: &str) -> bool {
    pattern.contains(['*', '?'])
}

/// Glob match supporting `*` (any run, including `/`) and `?` (one character).
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();

    let (mut p, mut t) = (0, 0);
    // Position of the last `*` seen and the text index it is currently absorbing up to.
    let mut star: Option<(usize, usize)> = None;

    while t < text.len() {
        match pattern.get(p) {
            Some('*') => {
                star = Some((p, t));
                p += 1;
            }
            Some('?') => {
                p += 1;
                t += 1;
            }
            Some(c) if *c == text[t] => {
                p += 1;
                t += 1;
            }
            _ => match star {
                Some((sp, st)) => {
                    p = sp + 1;
                    t = st + 1;
                    star = Some((sp, st + 1));
                }
                None => return false,
            },
        }
    }

    pattern[p..].iter().all(|c| *c == '*')
}

/// Where the entry called `name` lands on disk.
///
/// Entry names that would escape the destination (absolute paths or `..`
/// components) are rejected.
pub fn output_path(name: &str, extract_dir: Option<&Path>, junk_paths: bool) -> Result<PathBuf> {
    let relative = if junk_paths {
        PathBuf::from(basename(name))
    } else {
        PathBuf::from(name)
    };

    let escapes = relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if escapes || relative.as_os_str().is_empty() {
        bail!("refusing to extract {}: unsafe path", name);
    }

    Ok(match extract_dir {
        Some(dir) => dir.join(relative),
        None => relative,
    })
}
