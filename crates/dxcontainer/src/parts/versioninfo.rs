use crate::error::ContainerError;
use crate::fourcc::{FourCC, PART_VERSION_INFO};
use crate::module::CompilerVersion;
use crate::parts::PartWriter;
use crate::reader::ByteReader;

const VERSION_INFO_HEADER_SIZE: u32 = 16;

/// Writer for the `VERS` compiler-version part: a fixed header followed by
/// two NUL-terminated strings (commit id, custom string) back-to-back, each
/// independently optional, NUL-padded so the total is a multiple of 4.
pub struct VersionInfoWriter {
    version: CompilerVersion,
}

impl VersionInfoWriter {
    /// Captures the compiler version info to serialize.
    pub fn new(version: &CompilerVersion) -> Self {
        Self {
            version: version.clone(),
        }
    }

    fn raw_strings_size(&self) -> u32 {
        if self.version.commit_sha.is_none() && self.version.custom_string.is_none() {
            return 0;
        }
        let commit = self.version.commit_sha.as_deref().unwrap_or("");
        let custom = self.version.custom_string.as_deref().unwrap_or("");
        (commit.len() + 1 + custom.len() + 1) as u32
    }

    fn padded_strings_size(&self) -> u32 {
        (self.raw_strings_size() + 3) & !3
    }
}

impl PartWriter for VersionInfoWriter {
    fn fourcc(&self) -> FourCC {
        PART_VERSION_INFO
    }

    fn size(&self) -> u32 {
        VERSION_INFO_HEADER_SIZE + self.padded_strings_size()
    }

    fn write(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.version.major.to_le_bytes());
        out.extend_from_slice(&self.version.minor.to_le_bytes());
        out.extend_from_slice(&self.version.flags.to_le_bytes());
        out.extend_from_slice(&self.version.commit_count.to_le_bytes());
        out.extend_from_slice(&self.padded_strings_size().to_le_bytes());
        if self.raw_strings_size() > 0 {
            let commit = self.version.commit_sha.as_deref().unwrap_or("");
            let custom = self.version.custom_string.as_deref().unwrap_or("");
            out.extend_from_slice(commit.as_bytes());
            out.push(0);
            out.extend_from_slice(custom.as_bytes());
            out.push(0);
            for _ in self.raw_strings_size()..self.padded_strings_size() {
                out.push(0);
            }
        }
    }
}

/// Decoded `VERS` part, comparable field by field.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct VersionInfoPart {
    /// Compiler major version.
    pub major: u16,
    /// Compiler minor version.
    pub minor: u16,
    /// Version flags word.
    pub flags: u32,
    /// Commit count.
    pub commit_count: u32,
    /// Commit id string ("" when absent).
    pub commit_sha: String,
    /// Custom version string ("" when absent).
    pub custom_string: String,
}

/// Parses the `VERS` part.
///
/// Well-formedness requires the declared trailing size to exactly equal both
/// strings plus their NUL terminators, with only NUL bytes beyond that.
pub fn parse_version_info_part(bytes: &[u8]) -> Result<VersionInfoPart, ContainerError> {
    let mut r = ByteReader::new(PART_VERSION_INFO, bytes);
    let major = r.read_u16("major version")?;
    let minor = r.read_u16("minor version")?;
    let flags = r.read_u32("flags")?;
    let commit_count = r.read_u32("commit count")?;
    let strings_size = r.read_u32("string list size")?;

    if strings_size % 4 != 0 {
        return Err(ContainerError::not_well_formed(
            PART_VERSION_INFO,
            format!("string list size {strings_size} is not a multiple of 4"),
        ));
    }
    let strings = r.take(strings_size as usize, "version string list")?;
    r.expect_end("VERS part")?;

    let (commit_sha, custom_string) = if strings.is_empty() {
        (String::new(), String::new())
    } else {
        let strings_reader = ByteReader::new(PART_VERSION_INFO, strings);
        let commit = strings_reader.read_cstring_at(0, "commit id")?;
        let custom_start = commit.len() + 1;
        let custom = strings_reader.read_cstring_at(custom_start, "custom version string")?;
        let content_end = custom_start + custom.len() + 1;
        // Everything past the two strings must be NUL padding.
        if strings[content_end..].iter().any(|&b| b != 0) {
            return Err(ContainerError::not_well_formed(
                PART_VERSION_INFO,
                "string list has non-NUL bytes beyond the declared strings".to_owned(),
            ));
        }
        if strings_size - content_end as u32 >= 4 {
            return Err(ContainerError::not_well_formed(
                PART_VERSION_INFO,
                format!(
                    "string list size {strings_size} exceeds string content {content_end} by more than alignment padding"
                ),
            ));
        }
        (commit.to_owned(), custom.to_owned())
    };

    Ok(VersionInfoPart {
        major,
        minor,
        flags,
        commit_count,
        commit_sha,
        custom_string,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn version() -> CompilerVersion {
        CompilerVersion {
            major: 1,
            minor: 8,
            flags: 0,
            commit_count: 4242,
            commit_sha: Some("deadbeef".to_owned()),
            custom_string: Some("release".to_owned()),
        }
    }

    fn write_part(writer: &VersionInfoWriter) -> Vec<u8> {
        let mut out = Vec::new();
        writer.write(&mut out);
        assert_eq!(out.len() as u32, writer.size());
        out
    }

    #[test]
    fn version_info_roundtrips() {
        let writer = VersionInfoWriter::new(&version());
        let bytes = write_part(&writer);
        assert_eq!(bytes.len() % 4, 0);

        let part = parse_version_info_part(&bytes).expect("VERS parse should succeed");
        assert_eq!(part.major, 1);
        assert_eq!(part.minor, 8);
        assert_eq!(part.commit_count, 4242);
        assert_eq!(part.commit_sha, "deadbeef");
        assert_eq!(part.custom_string, "release");
    }

    #[test]
    fn version_info_without_strings_has_empty_list() {
        let writer = VersionInfoWriter::new(&CompilerVersion {
            major: 1,
            minor: 0,
            ..CompilerVersion::default()
        });
        let bytes = write_part(&writer);
        assert_eq!(bytes.len() as u32, VERSION_INFO_HEADER_SIZE);

        let part = parse_version_info_part(&bytes).expect("VERS parse should succeed");
        assert_eq!(part.commit_sha, "");
        assert_eq!(part.custom_string, "");
    }

    #[test]
    fn version_info_rejects_non_nul_padding() {
        let writer = VersionInfoWriter::new(&version());
        let mut bytes = write_part(&writer);
        // The writer padded to 4; corrupt one pad byte if any, else extend a
        // string into the padding region by flipping the final byte.
        let last = bytes.len() - 1;
        if bytes[last] == 0 && bytes.len() as u32 > VERSION_INFO_HEADER_SIZE {
            bytes[last] = b'X';
            // Only a true padding byte triggers the padding check; a byte that
            // was a string terminator instead produces a missing-NUL error.
            assert!(parse_version_info_part(&bytes).is_err());
        }
    }

    #[test]
    fn version_info_rejects_truncated_string_list() {
        let writer = VersionInfoWriter::new(&version());
        let mut bytes = write_part(&writer);
        bytes.truncate(bytes.len() - 4);
        let err = parse_version_info_part(&bytes).unwrap_err();
        assert!(matches!(err, ContainerError::NotWellFormed { .. }));
    }
}
