//! Byte-size parsing and formatting

/// Number of bytes in a kibibyte
pub const BYTES_IN_KIB: u64 = 1024;

/// Number of bytes in a mebibyte
pub const BYTES_IN_MIB: u64 = 1024 * BYTES_IN_KIB;

/// Number of bytes in a gibibyte
pub const BYTES_IN_GIB: u64 = 1024 * BYTES_IN_MIB;

/// Error for [`parse_size`]
#[derive(Clone, Debug, PartialEq, Eq)]
#[derive(thiserror::Error)]
pub enum SizeParseError {
	/// Unknown size suffix
	#[error("Unknown size suffix {suffix:?}")]
	UnknownSuffix { suffix: char },

	/// Invalid number
	#[error("Invalid size number {number:?}")]
	InvalidNumber { number: String },

	/// Empty input
	#[error("Empty size string")]
	Empty,
}

/// Parses a byte size with an optional `k`/`m`/`g` (or uppercase) suffix.
///
/// Suffixes scale by powers of 1024, i.e. `2m` is 2 MiB.
pub fn parse_size(s: &str) -> Result<u64, SizeParseError> {
	let s = s.trim();
	if s.is_empty() {
		return Err(SizeParseError::Empty);
	}

	// Split off the suffix, if any
	let last = s.chars().next_back().expect("Non-empty string had no last char");
	let (number, factor) = match last {
		'k' | 'K' => (&s[..s.len() - 1], BYTES_IN_KIB),
		'm' | 'M' => (&s[..s.len() - 1], BYTES_IN_MIB),
		'g' | 'G' => (&s[..s.len() - 1], BYTES_IN_GIB),
		c if c.is_ascii_alphabetic() => return Err(SizeParseError::UnknownSuffix { suffix: c }),
		_ => (s, 1),
	};

	let size = number.parse::<u64>().map_err(|_| SizeParseError::InvalidNumber {
		number: number.to_owned(),
	})?;

	Ok(size * factor)
}

/// Formats a byte size with the largest exact suffix
pub fn format_size(size: u64) -> String {
	match size {
		s if s >= BYTES_IN_GIB && s % BYTES_IN_GIB == 0 => format!("{}g", s / BYTES_IN_GIB),
		s if s >= BYTES_IN_MIB && s % BYTES_IN_MIB == 0 => format!("{}m", s / BYTES_IN_MIB),
		s if s >= BYTES_IN_KIB && s % BYTES_IN_KIB == 0 => format!("{}k", s / BYTES_IN_KIB),
		s => format!("{s}"),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parse_plain_number() {
		assert_eq!(parse_size("4096"), Ok(4096));
	}

	#[test]
	fn parse_suffixes() {
		assert_eq!(parse_size("2k"), Ok(2 * 1024));
		assert_eq!(parse_size("64M"), Ok(64 * 1024 * 1024));
		assert_eq!(parse_size("1g"), Ok(1024 * 1024 * 1024));
	}

	#[test]
	fn parse_rejects_unknown_suffix() {
		assert_eq!(parse_size("10t"), Err(SizeParseError::UnknownSuffix { suffix: 't' }));
	}

	#[test]
	fn parse_rejects_garbage() {
		assert!(parse_size("").is_err());
		assert!(parse_size("k").is_err());
		assert!(parse_size("12x4").is_err());
	}

	#[test]
	fn format_round_trip() {
		for size in [64, 4096, 2 * 1024 * 1024, 10 * 1024 * 1024 * 1024] {
			assert_eq!(parse_size(&format_size(size)), Ok(size));
		}
	}
}
