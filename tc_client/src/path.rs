// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

//! Splits a TC path into the LOOKUP components a compound needs to chase from the root
//! filehandle to the target, the way the planner wires `PUTROOTFH, LOOKUP, LOOKUP, ...` ops.

use crate::error::Error;

/// Split `path` (always resolved relative to the server's root filehandle; this client has no
/// notion of a current working directory) into its non-empty components, rejecting paths too
/// deep for `max_dir_depth` and paths containing a NUL byte (which cannot be carried as an XDR
/// string without silent truncation).
pub fn components<'a>(path: &'a str, max_dir_depth: usize) -> Result<Vec<&'a str>, Error> {
    if path.contains('\0') {
        return Err(Error::InvalidPath);
    }

    let parts: Vec<&str> = path.split('/').filter(|c| !c.is_empty()).collect();
    if parts.len() > max_dir_depth {
        return Err(Error::InvalidPath);
    }

    Ok(parts)
}

/// Split `path` into its parent's components and the final element, for operations (OPEN,
/// CREATE, REMOVE, RENAME) that need to look up a containing directory and then act on one name
/// within it.
pub fn split_parent(path: &str, max_dir_depth: usize) -> Result<(Vec<&str>, &str), Error> {
    let mut parts = components(path, max_dir_depth)?;
    let Some(last) = parts.pop() else {
        return Err(Error::InvalidPath);
    };
    Ok((parts, last))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_simple_path() {
        assert_eq!(components("/a/b/c", 64).unwrap(), vec!["a", "b", "c"]);
    }

    #[test]
    fn collapses_repeated_slashes() {
        assert_eq!(components("/a//b/", 64).unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn rejects_too_deep_paths() {
        assert!(components("/a/b/c", 2).is_err());
    }

    #[test]
    fn rejects_embedded_nul() {
        assert!(components("/a/\0/c", 64).is_err());
    }

    #[test]
    fn splits_parent_and_leaf() {
        let (parent, leaf) = split_parent("/a/b/c", 64).unwrap();
        assert_eq!(parent, vec!["a", "b"]);
        assert_eq!(leaf, "c");
    }

    #[test]
    fn root_path_has_no_parent() {
        let (parent, leaf) = split_parent("/file", 64).unwrap();
        assert!(parent.is_empty());
        assert_eq!(leaf, "file");
    }
}
