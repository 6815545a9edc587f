//! A byte-level scanner for a handful of named Int/Long fields inside
//! decompressed Minecraft NBT data.
//!
//! This deliberately does not parse a full tag tree: it scans for the exact
//! `[tag][0x00][name_len_be16][name_bytes]` preamble of a named tag and
//! reads the value that immediately follows. This is a best-effort
//! shortcut for the handful of fields region-file tooling actually needs
//! (`InhabitedTime`, `xPos`, `zPos`); it is undefined behaviour to
//! use it for a field name that could legitimately occur as the *payload*
//! of some other tag (see the module-level warning on [`fast_get_property`]).

use byteorder::{BigEndian, ByteOrder};

/// Which NBT tag and integer width a field lookup expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Tag 0x03 (`TAG_Int`), 4 big-endian bytes.
    Int32Be,
    /// Tag 0x04 (`TAG_Long`), 8 big-endian bytes.
    Int64Be,
}

impl Strategy {
    fn tag(self) -> u8 {
        match self {
            Strategy::Int32Be => 0x03,
            Strategy::Int64Be => 0x04,
        }
    }

    fn width(self) -> usize {
        match self {
            Strategy::Int32Be => 4,
            Strategy::Int64Be => 8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// No tag matching `[tag][0x00][len][name]` was found in the blob.
    NotFound(String),
    /// The tag's preamble matched but there weren't enough trailing bytes
    /// to read the value.
    Truncated(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::NotFound(name) => write!(f, "NBT field '{name}' was not found"),
            Error::Truncated(name) => {
                write!(f, "NBT field '{name}' was truncated before its value")
            }
        }
    }
}

impl std::error::Error for Error {}

/// Scan `blob` for a named Int or Long tag and return its value.
///
/// `name` is matched case-sensitively, as ASCII bytes. The scan is linear
/// in `blob.len()` and matches the first occurrence of the full preamble
/// `tag, 0x00, name.len() as u16 (BE), name`; ties go to whichever
/// occurrence comes first.
///
/// # Undefined behaviour
///
/// This is a substring-based shortcut: it has no notion of tag nesting, so
/// it will happily match a preamble that appears inside some unrelated
/// tag's string or byte-array payload. Only call this with field names
/// from the known Minecraft chunk schema (`InhabitedTime`, `xPos`,
/// `zPos`) that are not expected to collide with arbitrary tag payloads.
pub fn fast_get_property(blob: &[u8], name: &[u8], strategy: Strategy) -> Result<i64> {
    let needle_len = 3 + name.len();
    if blob.len() < needle_len + strategy.width() {
        return Err(Error::NotFound(String::from_utf8_lossy(name).into_owned()));
    }

    let tag = strategy.tag();
    let name_len = name.len() as u16;
    let name_len_be = name_len.to_be_bytes();

    let mut i = 0usize;
    let last_start = blob.len() - needle_len;
    while i <= last_start {
        if blob[i] == tag
            && blob[i + 1] == name_len_be[0]
            && blob[i + 2] == name_len_be[1]
            && &blob[i + 3..i + 3 + name.len()] == name
        {
            let value_start = i + needle_len;
            let value_end = value_start + strategy.width();
            if value_end > blob.len() {
                return Err(Error::Truncated(String::from_utf8_lossy(name).into_owned()));
            }
            let value = &blob[value_start..value_end];
            return Ok(match strategy {
                Strategy::Int32Be => BigEndian::read_i32(value) as i64,
                Strategy::Int64Be => BigEndian::read_i64(value),
            });
        }
        i += 1;
    }

    Err(Error::NotFound(String::from_utf8_lossy(name).into_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int_tag(name: &str, value: i32) -> Vec<u8> {
        let mut buf = vec![0x03];
        buf.extend_from_slice(&(name.len() as u16).to_be_bytes());
        buf.extend_from_slice(name.as_bytes());
        buf.extend_from_slice(&value.to_be_bytes());
        buf
    }

    fn long_tag(name: &str, value: i64) -> Vec<u8> {
        let mut buf = vec![0x04];
        buf.extend_from_slice(&(name.len() as u16).to_be_bytes());
        buf.extend_from_slice(name.as_bytes());
        buf.extend_from_slice(&value.to_be_bytes());
        buf
    }

    #[test]
    fn finds_int_field() {
        let blob = int_tag("xPos", 10);
        assert_eq!(
            fast_get_property(&blob, b"xPos", Strategy::Int32Be).unwrap(),
            10
        );
    }

    #[test]
    fn finds_negative_int_field() {
        let blob = int_tag("zPos", -3);
        assert_eq!(
            fast_get_property(&blob, b"zPos", Strategy::Int32Be).unwrap(),
            -3
        );
    }

    #[test]
    fn finds_long_field() {
        let blob = long_tag("InhabitedTime", 2400);
        assert_eq!(
            fast_get_property(&blob, b"InhabitedTime", Strategy::Int64Be).unwrap(),
            2400
        );
    }

    #[test]
    fn first_occurrence_wins() {
        let mut blob = long_tag("InhabitedTime", 1);
        blob.extend(long_tag("InhabitedTime", 2));
        assert_eq!(
            fast_get_property(&blob, b"InhabitedTime", Strategy::Int64Be).unwrap(),
            1
        );
    }

    #[test]
    fn missing_field_is_not_found() {
        let blob = int_tag("xPos", 1);
        assert_eq!(
            fast_get_property(&blob, b"yPos", Strategy::Int32Be),
            Err(Error::NotFound("yPos".to_string()))
        );
    }

    #[test]
    fn does_not_match_wrong_tag_type() {
        // Same name, but stored as a Long when we look for an Int.
        let blob = long_tag("xPos", 7);
        assert_eq!(
            fast_get_property(&blob, b"xPos", Strategy::Int32Be),
            Err(Error::NotFound("xPos".to_string()))
        );
    }

    #[test]
    fn requires_exact_preamble_not_just_substring() {
        // "Pos" appears inside "xPos" but isn't preceded by a valid tag+len header.
        let blob = int_tag("xPos", 1);
        assert_eq!(
            fast_get_property(&blob, b"Pos", Strategy::Int32Be),
            Err(Error::NotFound("Pos".to_string()))
        );
    }
}
