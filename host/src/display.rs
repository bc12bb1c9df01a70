//! Hex dump formatting.

const BYTES_PER_LINE: usize = 16;

/// Offset, hex bytes and printable characters, sixteen bytes per line with
/// an extra gap after the eighth.
pub fn hexdump(data: &[u8], prefix: &str) -> Vec<String> {
    data.chunks(BYTES_PER_LINE)
        .enumerate()
        .map(|(line, chunk)| {
            let mut out = format!("{}{:04x}: ", prefix, line * BYTES_PER_LINE);
            for i in 0..BYTES_PER_LINE {
                if i == BYTES_PER_LINE / 2 {
                    out.push(' ');
                }
                match chunk.get(i) {
                    Some(byte) => out.push_str(&format!("{:02X} ", byte)),
                    None => out.push_str("   "),
                }
            }
            out.push(' ');
            for i in 0..BYTES_PER_LINE {
                if i == BYTES_PER_LINE / 2 {
                    out.push(' ');
                }
                match chunk.get(i) {
                    Some(&byte) if byte.is_ascii_graphic() || byte == b' ' => out.push(byte as char),
                    Some(_) => out.push('.'),
                    None => out.push(' '),
                }
            }
            out
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_line_is_padded() {
        let lines = hexdump(b"{\"a\":1}\n", "    ");
        assert_eq!(lines.len(), 1);
        assert_eq!(
            lines[0],
            format!(
                "    0000: 7B 22 61 22 3A 31 7D 0A {}  {{\"a\":1}}.{}",
                "   ".repeat(8),
                " ".repeat(9)
            )
        );
    }

    #[test]
    fn test_multiple_lines_and_offsets() {
        let data: Vec<u8> = (0u8..20).collect();
        let lines = hexdump(&data, "");
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("0000: 00 01 02 03 04 05 06 07  08 09"));
        assert!(lines[1].starts_with("0010: 10 11 12 13 "));
        assert!(lines[1].trim_end().ends_with(" ...."));
    }

    #[test]
    fn test_empty_input() {
        assert!(hexdump(&[], "").is_empty());
    }
}
