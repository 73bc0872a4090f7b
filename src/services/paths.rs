//! Lexical path helpers shared by the glob strategies and the asset resolver.

use camino::{Utf8Component, Utf8Path, Utf8PathBuf};

/// Resolve `path` against `base` into an absolute, forward-slash path.
///
/// Absolute inputs ignore `base`. `.` and `..` are folded lexically, without touching the file
/// system, so glob metacharacters survive untouched.
pub fn resolve_path(base: &str, path: &str) -> String {
    let candidate = Utf8Path::new(path);
    let joined = if candidate.is_absolute() || has_prefix(candidate) {
        candidate.to_path_buf()
    } else {
        absolute_base(base).join(candidate)
    };

    to_forward_slashes(normalize(&joined).as_str())
}

pub fn to_forward_slashes(path: &str) -> String {
    path.replace('\\', "/")
}

/// Drop the `\\?\` prefix Windows adds to canonicalized paths.
pub fn strip_verbatim(path: &str) -> &str {
    match path.strip_prefix(r"\\?\") {
        Some(rest) if !rest.starts_with("UNC") => rest,
        _ => path,
    }
}

/// Real path of `path` with forward slashes, or `path` itself when it cannot be resolved.
pub async fn real_path(path: &str) -> String {
    match tokio::fs::canonicalize(path).await {
        Ok(real) => match real.to_str() {
            Some(real) => to_forward_slashes(strip_verbatim(real)),
            None => path.to_string(),
        },
        Err(_) => path.to_string(),
    }
}

fn absolute_base(base: &str) -> Utf8PathBuf {
    let base = Utf8Path::new(base);
    if base.is_absolute() {
        return base.to_path_buf();
    }

    std::env::current_dir()
        .ok()
        .and_then(|cwd| Utf8PathBuf::from_path_buf(cwd).ok())
        .map(|cwd| cwd.join(base))
        .unwrap_or_else(|| base.to_path_buf())
}

fn has_prefix(path: &Utf8Path) -> bool {
    matches!(path.components().next(), Some(Utf8Component::Prefix(_)))
}

fn normalize(path: &Utf8Path) -> Utf8PathBuf {
    let mut parts: Vec<Utf8Component<'_>> = Vec::new();

    for component in path.components() {
        match component {
            Utf8Component::CurDir => {}
            Utf8Component::ParentDir => match parts.last() {
                Some(Utf8Component::Normal(_)) => {
                    parts.pop();
                }
                Some(Utf8Component::RootDir) | Some(Utf8Component::Prefix(_)) => {}
                _ => parts.push(component),
            },
            other => parts.push(other),
        }
    }

    parts.iter().map(|c| c.as_str()).collect()
}
