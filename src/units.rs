//! Size rendering for `pwdu`
//!
//! Three modes matching du conventions: raw bytes, block counts rounded
//! up to the block size, and a binary-prefixed human form.

use humansize::{format_size, FormatSizeOptions, BINARY};

/// How sizes are printed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeFormat {
    /// Raw byte count
    Bytes,

    /// Ceiling division by a block size (1 KiB and 1 MiB in the CLI)
    Blocks(u64),

    /// Human readable with binary prefixes
    Human,
}

/// Render `bytes` in the requested format.
pub fn display_size(bytes: u64, format: SizeFormat) -> String {
    match format {
        SizeFormat::Bytes => bytes.to_string(),
        SizeFormat::Blocks(block) => {
            let blocks = if bytes == 0 { 0 } else { (bytes - 1) / block + 1 };
            blocks.to_string()
        }
        SizeFormat::Human => {
            let options = FormatSizeOptions::from(BINARY)
                .decimal_places(1)
                .space_after_value(false);
            format_size(bytes, options)
        }
    }
}
