// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Normalized resource addresses.
//!
//! A [`Locator`] is the absolute, normalized form of a path or URL handed to
//! the asset manager. Two locators are equal iff their normalized forms are
//! equal, and normalization is idempotent: parsing a locator's normalized
//! string yields the same locator again.
//!
//! Normalization rules:
//! - surrounding whitespace is trimmed and `\` becomes `/`,
//! - scheme and host are lowercased, the `#fragment` is dropped,
//! - repeated `/` collapse, `.` segments vanish, `..` pops a segment
//!   (clamped at the root),
//! - scheme-less paths become rooted (`textures/a.png` -> `/textures/a.png`),
//! - `data:` URIs are kept verbatim apart from the scheme.

use crate::error::LocatorError;
use std::{cmp::Ordering, fmt, hash::Hash};

/// A normalized resource address (absolute path, URL or `data:` URI).
#[derive(Clone)]
pub struct Locator {
    raw: String,
    normalized: String,
    origin_end: usize,
    path_end: usize,
    extension: String,
    data_uri: bool,
}

impl Locator {
    /// Parses and normalizes a locator string.
    ///
    /// # Errors
    /// Returns [`LocatorError::Empty`] for blank input and
    /// [`LocatorError::MissingHost`] for URLs without an authority.
    pub fn parse(raw: impl AsRef<str>) -> Result<Self, LocatorError> {
        let raw = raw.as_ref();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(LocatorError::Empty);
        }

        if is_data_uri(trimmed) {
            let normalized = format!("data:{}", &trimmed[5..]);
            let extension = data_uri_media_type(&normalized);
            return Ok(Self {
                raw: raw.to_string(),
                origin_end: 0,
                path_end: 0,
                extension,
                data_uri: true,
                normalized,
            });
        }

        let unified = trimmed.replace('\\', "/");
        let without_fragment = match unified.find('#') {
            Some(index) => &unified[..index],
            None => unified.as_str(),
        };
        let (body, query) = match without_fragment.find('?') {
            Some(index) => (
                &without_fragment[..index],
                Some(&without_fragment[index + 1..]),
            ),
            None => (without_fragment, None),
        };

        let (origin, path) = match split_scheme(body) {
            Some((scheme, rest)) => {
                let (authority, path) = match rest.find('/') {
                    Some(index) => (&rest[..index], &rest[index..]),
                    None => (rest, ""),
                };
                let scheme = scheme.to_ascii_lowercase();
                if authority.is_empty() && scheme != "file" {
                    return Err(LocatorError::MissingHost(raw.to_string()));
                }
                (
                    format!("{scheme}://{}", authority.to_ascii_lowercase()),
                    path,
                )
            }
            None => (String::new(), body),
        };

        let mut normalized = origin;
        let origin_end = normalized.len();
        normalized.push_str(&normalize_path(path));
        let path_end = normalized.len();
        if let Some(query) = query.filter(|q| !q.is_empty()) {
            normalized.push('?');
            normalized.push_str(query);
        }
        let extension = extension_of(&normalized[origin_end..path_end]);

        Ok(Self {
            raw: raw.to_string(),
            normalized,
            origin_end,
            path_end,
            extension,
            data_uri: false,
        })
    }

    /// The string this locator was parsed from.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// The normalized form, used for equality and cache keys.
    pub fn as_str(&self) -> &str {
        &self.normalized
    }

    /// Returns `true` for inline `data:` URIs.
    pub fn is_data_uri(&self) -> bool {
        self.data_uri
    }

    /// The lowercase scheme (`http`, `file`, `data`), if any.
    pub fn scheme(&self) -> Option<&str> {
        if self.data_uri {
            return Some("data");
        }
        self.normalized[..self.origin_end]
            .find("://")
            .map(|index| &self.normalized[..index])
    }

    /// `scheme://authority` for URLs, empty for plain paths.
    pub fn origin(&self) -> &str {
        &self.normalized[..self.origin_end]
    }

    /// The rooted path component, without origin and query.
    pub fn path(&self) -> &str {
        &self.normalized[self.origin_end..self.path_end]
    }

    /// The query string without the leading `?`.
    pub fn query(&self) -> Option<&str> {
        if self.data_uri || self.path_end == self.normalized.len() {
            return None;
        }
        Some(&self.normalized[self.path_end + 1..])
    }

    /// Everything up to and including the last `/` of the path.
    ///
    /// `http://host/models/ship.obj` has directory `http://host/models/`.
    /// `data:` URIs have no directory.
    pub fn directory(&self) -> &str {
        if self.data_uri {
            return "";
        }
        let slash = self.path().rfind('/').unwrap_or(0);
        &self.normalized[..self.origin_end + slash + 1]
    }

    /// The last path segment (`ship.obj`), empty for directories.
    pub fn file_name(&self) -> &str {
        if self.data_uri {
            return "";
        }
        let path = self.path();
        let slash = path.rfind('/').map_or(0, |index| index + 1);
        &path[slash..]
    }

    /// The lowercase extension including the dot (`.obj`), or the media type
    /// for `data:` URIs (`image/png`). Empty when there is none.
    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Resolves `reference` against this locator.
    ///
    /// Absolute URLs and `data:` URIs are taken as they are, `/rooted`
    /// references keep this locator's origin, anything else is relative to
    /// [`directory`](Self::directory).
    ///
    /// # Errors
    /// Returns a [`LocatorError`] if the merged string cannot be parsed.
    pub fn merge(&self, reference: &str) -> Result<Locator, LocatorError> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Err(LocatorError::Empty);
        }
        if is_data_uri(reference) || split_scheme(reference).is_some() {
            return Locator::parse(reference);
        }
        let unified = reference.replace('\\', "/");
        if unified.starts_with('/') {
            Locator::parse(format!("{}{}", self.origin(), unified))
        } else {
            Locator::parse(format!("{}{}", self.directory(), unified))
        }
    }
}

impl PartialEq for Locator {
    fn eq(&self, other: &Self) -> bool {
        self.normalized == other.normalized
    }
}

impl Eq for Locator {}

impl Hash for Locator {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.normalized.hash(state);
    }
}

impl PartialOrd for Locator {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Locator {
    fn cmp(&self, other: &Self) -> Ordering {
        self.normalized.cmp(&other.normalized)
    }
}

impl fmt::Debug for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Locator({})", self.normalized)
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.data_uri && self.normalized.len() > 48 {
            // Inline payloads can be megabytes long.
            write!(f, "{}...", truncate(&self.normalized, 48))
        } else {
            f.write_str(&self.normalized)
        }
    }
}

impl std::str::FromStr for Locator {
    type Err = LocatorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Locator::parse(s)
    }
}

fn is_data_uri(s: &str) -> bool {
    s.get(..5)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("data:"))
}

/// Splits `scheme://rest`, returning `None` when `s` has no valid scheme.
fn split_scheme(s: &str) -> Option<(&str, &str)> {
    let index = s.find("://")?;
    let scheme = &s[..index];
    let mut chars = scheme.chars();
    let first = chars.next()?;
    if !first.is_ascii_alphabetic()
        || !chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
    {
        return None;
    }
    Some((scheme, &s[index + 3..]))
}

fn normalize_path(path: &str) -> String {
    let last = path.rsplit('/').next().unwrap_or("");
    let is_directory = path.ends_with('/') || last == "." || last == "..";

    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }

    let mut normalized = String::with_capacity(path.len() + 1);
    normalized.push('/');
    normalized.push_str(&segments.join("/"));
    if is_directory && !segments.is_empty() {
        normalized.push('/');
    }
    normalized
}

fn extension_of(path: &str) -> String {
    let file = path.rsplit('/').next().unwrap_or("");
    match file.rfind('.') {
        Some(index) if index > 0 => file[index..].to_ascii_lowercase(),
        _ => String::new(),
    }
}

fn data_uri_media_type(uri: &str) -> String {
    let header = &uri[5..];
    let end = header.find([';', ',']).unwrap_or(header.len());
    let media_type = header[..end].trim().to_ascii_lowercase();
    if media_type.is_empty() {
        "text/plain".to_string()
    } else {
        media_type
    }
}

fn truncate(s: &str, max: usize) -> &str {
    let mut end = max.min(s.len());
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalize(s: &str) -> String {
        Locator::parse(s).unwrap().as_str().to_string()
    }

    #[test]
    fn test_relative_paths_become_rooted() {
        assert_eq!(normalize("textures/a.png"), "/textures/a.png");
        assert_eq!(normalize("./textures/./a.png"), "/textures/a.png");
    }

    #[test]
    fn test_dot_segments_and_separators() {
        assert_eq!(normalize("/a//b/../c.obj"), "/a/c.obj");
        assert_eq!(normalize("\\assets\\ship.obj"), "/assets/ship.obj");
        assert_eq!(normalize("/../../x.txt"), "/x.txt");
        assert_eq!(normalize("/a/b/.."), "/a/");
    }

    #[test]
    fn test_urls_keep_origin_and_lowercase_it() {
        assert_eq!(
            normalize("HTTP://Example.com:3000/Foo/../Bar.PNG?v=2#frag"),
            "http://example.com:3000/Bar.PNG?v=2"
        );
        assert_eq!(normalize("http://example.com"), "http://example.com/");
        assert_eq!(normalize("file:///tmp/a.txt"), "file:///tmp/a.txt");
    }

    #[test]
    fn test_invalid_locators() {
        assert_eq!(Locator::parse("   ").unwrap_err(), LocatorError::Empty);
        assert!(matches!(
            Locator::parse("http:///nohost"),
            Err(LocatorError::MissingHost(_))
        ));
    }

    #[test]
    fn test_normalization_is_idempotent() {
        let samples = [
            "a.obj",
            "/a/b/c/",
            "/a/./b/../../c",
            "..",
            "/",
            "x/y/z/..",
            "\\\\server\\share\\file.TXT",
            "http://Host/a/../b/?q=1",
            "https://host",
            "file:///C:/models/ship.glb",
            "models/ship.obj#part",
            "data:text/plain;base64,aGVsbG8=",
            "DATA:,hello",
            "  spaced/path.png  ",
            "/weird/.hidden",
            "/q?",
        ];
        for sample in samples {
            let once = Locator::parse(sample).unwrap();
            let twice = Locator::parse(once.as_str()).unwrap();
            assert_eq!(once, twice, "normalization of {sample:?} is not idempotent");
            assert_eq!(once.extension(), twice.extension());
        }
    }

    #[test]
    fn test_directory_file_name_extension() {
        let locator = Locator::parse("/example/path/file.EXT").unwrap();
        assert_eq!(locator.directory(), "/example/path/");
        assert_eq!(locator.file_name(), "file.EXT");
        assert_eq!(locator.extension(), ".ext");

        let url = Locator::parse("http://example.com/example/path/file.ext?x=1").unwrap();
        assert_eq!(url.directory(), "http://example.com/example/path/");
        assert_eq!(url.path(), "/example/path/file.ext");
        assert_eq!(url.query(), Some("x=1"));
        assert_eq!(url.scheme(), Some("http"));

        assert_eq!(Locator::parse("example/path").unwrap().extension(), "");
        assert_eq!(Locator::parse("/a/.hidden").unwrap().extension(), "");
    }

    #[test]
    fn test_data_uri_extension_is_media_type() {
        let locator = Locator::parse("data:Image/PNG;base64,iVBORw0KGgo=").unwrap();
        assert!(locator.is_data_uri());
        assert_eq!(locator.extension(), "image/png");
        assert_eq!(locator.directory(), "");
        assert_eq!(
            Locator::parse("data:,hello").unwrap().extension(),
            "text/plain"
        );
    }

    #[test]
    fn test_merge() {
        let base = Locator::parse("http://example.com/foo/bar/").unwrap();
        assert_eq!(
            base.merge("./../file.ext").unwrap().as_str(),
            "http://example.com/foo/file.ext"
        );
        assert_eq!(
            base.merge("file.ext").unwrap().as_str(),
            "http://example.com/foo/bar/file.ext"
        );
        assert_eq!(
            base.merge("/file.ext").unwrap().as_str(),
            "http://example.com/file.ext"
        );
        let other = Locator::parse("http://example.com:3000").unwrap();
        assert_eq!(
            other.merge("http://foo.com:3000/file.ext").unwrap().as_str(),
            "http://foo.com:3000/file.ext"
        );
    }

    #[test]
    fn test_merge_against_file_locator_uses_its_directory() {
        let model = Locator::parse("/models/ship/ship.obj").unwrap();
        assert_eq!(
            model.merge("ship.mtl").unwrap().as_str(),
            "/models/ship/ship.mtl"
        );
        assert_eq!(
            model.merge("../textures/hull.png").unwrap().as_str(),
            "/models/textures/hull.png"
        );
        assert!(model.merge("data:,inline").unwrap().is_data_uri());
    }

    #[test]
    fn test_equality_uses_normalized_form() {
        let a = Locator::parse("models/../ship.obj").unwrap();
        let b = Locator::parse("/ship.obj").unwrap();
        assert_eq!(a, b);
        assert_ne!(a.raw(), b.raw());
    }
}
