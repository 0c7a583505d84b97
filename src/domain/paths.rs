//! File naming conventions shared by all pipeline steps.
//!
//! A file name has the shape `<corename>[#tag…][.ext]`, where the corename is
//! a DOI quoted with [`quote_doi`], e.g. `10.1038%2Fnature08227#scnlp_v3.5.1.xml`.

use crate::utils::error::Result;
use std::path::{Path, PathBuf};

/// Options for [`derive_path`]. `None` keeps the old component.
#[derive(Debug, Clone, Default)]
pub struct Derive<'a> {
    pub new_dir: Option<&'a Path>,
    pub new_corename: Option<&'a str>,
    pub new_ext: Option<&'a str>,
    pub remove_tags: &'a [&'a str],
    pub append_tags: &'a [&'a str],
}

impl<'a> Derive<'a> {
    pub fn dir(mut self, dir: &'a Path) -> Self {
        self.new_dir = Some(dir);
        self
    }

    pub fn ext(mut self, ext: &'a str) -> Self {
        self.new_ext = Some(ext);
        self
    }

    pub fn append(mut self, tags: &'a [&'a str]) -> Self {
        self.append_tags = tags;
        self
    }

    pub fn remove(mut self, tags: &'a [&'a str]) -> Self {
        self.remove_tags = tags;
        self
    }
}

/// Derive a new path from an old one by swapping directory, corename,
/// extension and `#` tags.
///
/// An empty `new_ext` removes the extension; an extension without a leading
/// dot gets one.
pub fn derive_path(path: impl AsRef<Path>, opts: Derive<'_>) -> PathBuf {
    let path = path.as_ref();
    let old_dir = path.parent().unwrap_or_else(|| Path::new(""));
    let basename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let (stem, old_ext) = split_ext(&basename);

    let new_ext = match opts.new_ext {
        None => old_ext.to_string(),
        Some("") => String::new(),
        Some(ext) if ext.starts_with('.') => ext.to_string(),
        Some(ext) => format!(".{}", ext),
    };

    let mut parts = stem.split('#');
    let old_corename = parts.next().unwrap_or_default();
    let corename = opts.new_corename.unwrap_or(old_corename);

    let mut tags: Vec<&str> = parts.filter(|t| !opts.remove_tags.contains(t)).collect();
    tags.extend_from_slice(opts.append_tags);

    let mut name = corename.to_string();
    for tag in tags {
        name.push('#');
        name.push_str(tag);
    }
    name.push_str(&new_ext);

    opts.new_dir.unwrap_or(old_dir).join(name)
}

/// 分離最後一個副檔名；開頭的點不算副檔名 (.bashrc 沒有副檔名)
fn split_ext(basename: &str) -> (&str, &str) {
    match basename.rfind('.') {
        Some(idx) if idx > 0 && !basename[..idx].chars().all(|c| c == '.') => {
            (&basename[..idx], &basename[idx..])
        }
        _ => (basename, ""),
    }
}

/// Quote a DOI so it can be used as a file name (`quote_plus` semantics).
pub fn quote_doi(doi: &str) -> String {
    urlencoding::encode(doi).replace("%20", "+")
}

/// Reverse of [`quote_doi`].
pub fn unquote_doi(quoted: &str) -> String {
    let spaced = quoted.replace('+', " ");
    match urlencoding::decode(&spaced) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => spaced,
    }
}

/// DOI of a file: the basename up to the first `#` or the extension,
/// unquoted.
pub fn get_doi(path: impl AsRef<Path>) -> String {
    let basename = path
        .as_ref()
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let (stem, _) = split_ext(&basename);
    let encoded = stem.split('#').next().unwrap_or_default();
    unquote_doi(encoded)
}

/// Sentence id as used for graph nodes: `<doi>/<treeNumber>`.
pub fn sentence_id(doi: &str, tree_number: usize) -> String {
    format!("{}/{}", doi, tree_number)
}

/// Files directly under `dir` with the given extension (without dot), sorted
/// by name. `None` lists every regular file.
pub fn list_files(dir: impl AsRef<Path>, ext: Option<&str>) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for entry in std::fs::read_dir(dir.as_ref())? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let matches = match ext {
            None => true,
            Some(ext) => path.extension().and_then(|e| e.to_str()) == Some(ext),
        };
        if matches {
            files.push(path);
        }
    }

    files.sort();
    Ok(files)
}

/// Expand an input specification: a directory (files with `ext`), a single
/// file, or a comma-separated list of files.
pub fn expand_input(input: &str, ext: &str) -> Result<Vec<PathBuf>> {
    let path = Path::new(input);
    if path.is_dir() {
        return list_files(path, Some(ext));
    }

    Ok(input
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_path_new_dir_and_ext() {
        let derived = derive_path(
            "/data/scnlp/10.1038%2Fnature08227#scnlp_v3.5.1.xml",
            Derive::default().dir(Path::new("/data/trees")).ext("parse"),
        );
        assert_eq!(
            derived,
            PathBuf::from("/data/trees/10.1038%2Fnature08227#scnlp_v3.5.1.parse")
        );
    }

    #[test]
    fn test_derive_path_tags() {
        let derived = derive_path(
            "a/doc#scnlp_v3.5.1#vars.json",
            Derive::default().remove(&["vars"]).append(&["rels"]),
        );
        assert_eq!(derived, PathBuf::from("a/doc#scnlp_v3.5.1#rels.json"));
    }

    #[test]
    fn test_derive_path_empty_ext_removes_extension() {
        let derived = derive_path("doc#x.parse", Derive::default().ext(""));
        assert_eq!(derived, PathBuf::from("doc#x"));
    }

    #[test]
    fn test_get_doi_unquotes() {
        assert_eq!(
            get_doi("/txt/10.1038%2Fnature08227#abs.txt"),
            "10.1038/nature08227"
        );
        assert_eq!(get_doi("10.1038%2F16898.txt"), "10.1038/16898");
    }

    #[test]
    fn test_quote_doi_roundtrip_special_chars() {
        let doi = "10.1002/(SICI)1097 x";
        let quoted = quote_doi(doi);
        assert!(!quoted.contains('/'));
        assert!(quoted.ends_with("+x"));
        assert_eq!(unquote_doi(&quoted), doi);
    }

    #[test]
    fn test_sentence_id() {
        assert_eq!(sentence_id("10.1/x", 3), "10.1/x/3");
    }
}
