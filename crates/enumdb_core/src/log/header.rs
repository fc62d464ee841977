//! Log header.

use crate::error::{CoreError, CoreResult};

/// Magic bytes at the start of every key log.
pub const LOG_MAGIC: [u8; 4] = *b"EDBL";

/// Current log layout version. Unrelated to the caller's data version.
pub const LOG_FORMAT_VERSION: u16 = 1;

/// Encoded header size.
pub const LOG_HEADER_LEN: usize = 16;

/// Byte offset of the data version inside the header.
pub(crate) const DATA_VERSION_OFFSET: u64 = 8;

/// Decoded log header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogHeader {
    /// Layout version of the file.
    pub format_version: u16,
    /// Caller data version; 0 until stamped.
    pub data_version: u32,
}

impl LogHeader {
    /// Header of a freshly created log.
    #[must_use]
    pub const fn fresh() -> Self {
        Self {
            format_version: LOG_FORMAT_VERSION,
            data_version: 0,
        }
    }

    /// Encodes the header.
    #[must_use]
    pub fn encode(&self) -> [u8; LOG_HEADER_LEN] {
        let mut buf = [0u8; LOG_HEADER_LEN];
        buf[0..4].copy_from_slice(&LOG_MAGIC);
        buf[4..6].copy_from_slice(&self.format_version.to_le_bytes());
        buf[8..12].copy_from_slice(&self.data_version.to_le_bytes());
        buf
    }

    /// Decodes and validates a header.
    pub fn decode(data: &[u8]) -> CoreResult<Self> {
        if data.len() < LOG_HEADER_LEN {
            return Err(CoreError::log_corruption("log header too short"));
        }
        if data[0..4] != LOG_MAGIC {
            return Err(CoreError::log_corruption(format!(
                "invalid log magic: {:?}",
                &data[0..4]
            )));
        }

        let format_version = u16::from_le_bytes([data[4], data[5]]);
        if format_version != LOG_FORMAT_VERSION {
            return Err(CoreError::log_corruption(format!(
                "unsupported log format version: {format_version}"
            )));
        }

        let data_version = u32::from_le_bytes([data[8], data[9], data[10], data[11]]);
        Ok(Self {
            format_version,
            data_version,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_header_roundtrip() {
        let header = LogHeader {
            data_version: 42,
            ..LogHeader::fresh()
        };
        assert_eq!(LogHeader::decode(&header.encode()).unwrap(), header);
    }

    #[test]
    fn data_version_lives_at_fixed_offset() {
        let header = LogHeader {
            data_version: 0x0102_0304,
            ..LogHeader::fresh()
        };
        let bytes = header.encode();
        let at = DATA_VERSION_OFFSET as usize;
        assert_eq!(&bytes[at..at + 4], &0x0102_0304u32.to_le_bytes());
    }

    #[test]
    fn bad_magic_rejected() {
        let mut bytes = LogHeader::fresh().encode();
        bytes[0] = b'X';
        assert!(matches!(
            LogHeader::decode(&bytes),
            Err(CoreError::LogCorruption { .. })
        ));
    }

    #[test]
    fn future_format_rejected() {
        let mut bytes = LogHeader::fresh().encode();
        bytes[4] = 9;
        assert!(LogHeader::decode(&bytes).is_err());
    }
}
