use regex::Regex;
use semver::{BuildMetadata, Version};
use std::cmp::Ordering;
use std::fmt;
use std::sync::LazyLock;

/// Version keys searched for in a host binary's version resource, in order
const VERSION_KEYS: [&str; 2] = ["ProductVersion", "FileVersion"];

static FILE_NAME_VERSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+(?:\.\d+){1,3})").expect("literal version pattern"));

/// Version of a mounted runtime package.
///
/// Ordered semantically when the string parses; strings that do not parse
/// compare lexicographically and sort before every parsable version.
#[derive(Debug, Clone)]
pub struct RuntimeVersion {
    raw: String,
    semantic: Option<Version>,
}

impl RuntimeVersion {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim().to_string();
        let semantic = lenient_semver(&raw);
        Self { raw, semantic }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn semantic(&self) -> Option<&Version> {
        self.semantic.as_ref()
    }

    pub fn major_minor(&self) -> Option<(u64, u64)> {
        self.semantic.as_ref().map(|v| (v.major, v.minor))
    }
}

impl fmt::Display for RuntimeVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl Ord for RuntimeVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        match (&self.semantic, &other.semantic) {
            (Some(a), Some(b)) => a.cmp(b).then_with(|| self.raw.cmp(&other.raw)),
            (None, None) => self.raw.cmp(&other.raw),
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
        }
    }
}

impl PartialOrd for RuntimeVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for RuntimeVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for RuntimeVersion {}

/// Accepts `v` prefixes, two-part versions and four-part file versions
/// (`1.2.3.4` keeps the revision as build metadata).
fn lenient_semver(raw: &str) -> Option<Version> {
    let trimmed = raw.trim_start_matches(['v', 'V']);
    if let Ok(version) = Version::parse(trimmed) {
        return Some(version);
    }

    let parts = trimmed
        .split('.')
        .map(|part| part.trim().parse::<u64>().ok())
        .collect::<Option<Vec<u64>>>()?;

    match parts.as_slice() {
        [major] => Some(Version::new(*major, 0, 0)),
        [major, minor] => Some(Version::new(*major, *minor, 0)),
        [major, minor, patch] => Some(Version::new(*major, *minor, *patch)),
        [major, minor, patch, revision] => {
            let mut version = Version::new(*major, *minor, *patch);
            version.build = BuildMetadata::new(&revision.to_string()).ok()?;
            Some(version)
        }
        _ => None,
    }
}

/// Version embedded in a package file name such as `render-host_1.0.5.img`
pub fn version_from_file_name(stem: &str) -> Option<String> {
    FILE_NAME_VERSION
        .captures_iter(stem)
        .last()
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Read `ProductVersion`, then `FileVersion`, from the UTF-16 version
/// resource strings of an executable image.
pub fn read_embedded_version(image: &[u8]) -> Option<String> {
    VERSION_KEYS
        .iter()
        .find_map(|key| version_string_after(image, key))
}

fn version_string_after(image: &[u8], key: &str) -> Option<String> {
    let needle: Vec<u8> = key
        .encode_utf16()
        .chain(std::iter::once(0))
        .flat_map(u16::to_le_bytes)
        .collect();

    let start = image
        .windows(needle.len())
        .position(|window| window == needle.as_slice())?
        + needle.len();

    let units: Vec<u16> = image[start..]
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .skip_while(|unit| *unit == 0)
        .take_while(|unit| *unit != 0)
        .take(64)
        .collect();

    let value = String::from_utf16(&units).ok()?;
    // Resource compilers sometimes emit "1, 0, 5, 0"
    let value = value.replace(", ", ".").replace(',', ".");
    let value = value.trim();

    let well_formed = !value.is_empty()
        && value.chars().next().is_some_and(|c| c.is_ascii_digit())
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '+'));
    well_formed.then(|| value.to_string())
}

#[cfg(test)]
pub(crate) fn version_resource(key: &str, value: &str) -> Vec<u8> {
    let mut bytes = b"MZ\x90\x00 header padding".to_vec();
    for unit in key.encode_utf16().chain([0, 0]) {
        bytes.extend_from_slice(&unit.to_le_bytes());
    }
    for unit in value.encode_utf16().chain([0]) {
        bytes.extend_from_slice(&unit.to_le_bytes());
    }
    bytes.extend_from_slice(b"trailing");
    bytes
}
