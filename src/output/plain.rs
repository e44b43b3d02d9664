//! Plain text output for payloads.

use std::io::{self, Write};

/// Write each payload followed by a newline.
pub fn write_plain<W: Write>(out: &mut W, payloads: &[Vec<u8>]) -> io::Result<()> {
    for payload in payloads {
        out.write_all(payload)?;
        out.write_all(b"\n")?;
    }
    out.flush()
}

/// Write the byte length of each payload, one per line.
pub fn write_lengths<W: Write>(out: &mut W, payloads: &[Vec<u8>]) -> io::Result<()> {
    for payload in payloads {
        writeln!(out, "{}", payload.len())?;
    }
    out.flush()
}

/// Print payloads to stdout. A closed pipe is not an error.
pub fn print_plain(payloads: &[Vec<u8>]) {
    let _ = write_plain(&mut io::stdout().lock(), payloads);
}

/// Print payload lengths to stdout.
pub fn print_lengths(payloads: &[Vec<u8>]) {
    let _ = write_lengths(&mut io::stdout().lock(), payloads);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_plain_separates_payloads() {
        let mut out = Vec::new();
        write_plain(&mut out, &[b"a".to_vec(), b"bb".to_vec()]).unwrap();
        assert_eq!(out, b"a\nbb\n");
    }

    #[test]
    fn test_write_plain_empty_payload_is_blank_line() {
        let mut out = Vec::new();
        write_plain(&mut out, &[Vec::new()]).unwrap();
        assert_eq!(out, b"\n");
    }

    #[test]
    fn test_write_lengths() {
        let mut out = Vec::new();
        write_lengths(&mut out, &[b"abc".to_vec(), Vec::new()]).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "3\n0\n");
    }

    #[test]
    fn test_write_nothing() {
        let mut out = Vec::new();
        write_plain(&mut out, &[]).unwrap();
        write_lengths(&mut out, &[]).unwrap();
        assert!(out.is_empty());
    }
}
