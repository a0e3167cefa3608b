use anyhow::{bail, Context, Result};
use std::collections::VecDeque;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tracing::warn;

/// Canonicalize a workspace root with fallback to the original path if
/// canonicalization fails.
pub fn canonicalize_workspace(workspace_root: &Path) -> PathBuf {
    std::fs::canonicalize(workspace_root).unwrap_or_else(|error| {
        warn!(
            path = %workspace_root.display(),
            %error,
            "Failed to canonicalize workspace root; falling back to provided path"
        );
        workspace_root.to_path_buf()
    })
}

/// Links followed before resolution gives up, matching the usual `ELOOP` limit.
const MAX_SYMLINK_HOPS: usize = 40;

/// Canonicalize a path that may not exist yet.
///
/// Components are resolved one at a time. Every symlink met on the way is
/// followed, including dangling ones, so a link is never mistaken for a
/// not-yet-created name. Once a component is missing, the rest of the path
/// is appended lexically.
pub fn canonicalize_allow_missing(path: &Path) -> Result<PathBuf> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .context("Failed to read current directory")?
            .join(path)
    };

    let mut pending: VecDeque<PathBuf> = absolute
        .components()
        .map(|component| PathBuf::from(component.as_os_str()))
        .collect();
    let mut resolved = PathBuf::new();
    let mut hops = 0;

    while let Some(next) = pending.pop_front() {
        let mut components = next.components();
        let Some(component) = components.next() else {
            continue;
        };
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                resolved.pop();
            }
            Component::Prefix(_) | Component::RootDir => resolved.push(component.as_os_str()),
            Component::Normal(part) => {
                let candidate = resolved.join(part);
                match candidate.symlink_metadata() {
                    Ok(metadata) if metadata.file_type().is_symlink() => {
                        hops += 1;
                        if hops > MAX_SYMLINK_HOPS {
                            bail!("Too many levels of symbolic links at {}", candidate.display());
                        }
                        let target = std::fs::read_link(&candidate).with_context(|| {
                            format!("Failed to read symlink {}", candidate.display())
                        })?;
                        for piece in target.components().rev() {
                            pending.push_front(PathBuf::from(piece.as_os_str()));
                        }
                    }
                    Ok(_) => resolved = candidate,
                    Err(err) if err.kind() == ErrorKind::NotFound => resolved = candidate,
                    Err(err) => {
                        return Err(err).with_context(|| {
                            format!("Failed to inspect path {}", candidate.display())
                        });
                    }
                }
            }
        }
    }

    Ok(resolved)
}
