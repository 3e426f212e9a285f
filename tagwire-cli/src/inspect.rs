//! Schema-less dump of the fields in a message.

use tagwire::{read_tag, read_value, ByteCursor, DecodeError, RawValue};

/// Maximum number of bytes of a length-delimited value to show.
const MAX_PREVIEW_BYTES: usize = 32;

/// Describe each top-level field in `buf`, one line per field.
///
/// The wire format does not say whether a length-delimited value is a
/// string, bytes or an embedded message, so these are shown as text if they
/// are valid UTF-8 and as hex otherwise.
pub fn inspect(buf: &[u8]) -> Result<Vec<String>, DecodeError> {
    let mut cursor = ByteCursor::new(buf);
    let mut lines = Vec::new();

    while !cursor.is_empty() {
        let offset = cursor.offset();
        let tag = read_tag(&mut cursor)?;
        let value = read_value(&mut cursor, tag.wire_type)?;
        lines.push(format!(
            "{:>6}  field {:<4} {:<16} {}",
            offset,
            tag.number,
            tag.wire_type.to_string(),
            format_value(&value)
        ));
    }

    Ok(lines)
}

fn format_value(value: &RawValue) -> String {
    match value {
        RawValue::Varint(x) => x.to_string(),
        RawValue::Fixed32(x) => format!("{} (float {})", x, f32::from_bits(*x)),
        RawValue::Fixed64(x) => format!("{} (double {})", x, f64::from_bits(*x)),
        RawValue::Bytes(bytes) => {
            let preview = &bytes[..bytes.len().min(MAX_PREVIEW_BYTES)];
            match preview_text(preview, preview.len() < bytes.len()) {
                Some(text) if !text.chars().any(|c| c.is_control()) => {
                    let ellipsis = if text.len() < bytes.len() { "..." } else { "" };
                    format!("[{} bytes] {:?}{}", bytes.len(), text, ellipsis)
                }
                _ => {
                    let ellipsis = if preview.len() < bytes.len() { "..." } else { "" };
                    let hex: Vec<String> = preview.iter().map(|b| format!("{:02x}", b)).collect();
                    format!("[{} bytes] {}{}", bytes.len(), hex.join(" "), ellipsis)
                }
            }
        }
    }
}

/// Interpret a preview of a value as text, if it is valid UTF-8.
///
/// If the preview was cut from a longer value it may end partway through a
/// character, in which case the incomplete character is dropped.
fn preview_text(preview: &[u8], cut: bool) -> Option<&str> {
    match std::str::from_utf8(preview) {
        Ok(text) => Some(text),
        Err(err) if cut && err.error_len().is_none() => {
            std::str::from_utf8(&preview[..err.valid_up_to()]).ok()
        }
        Err(_) => None,
    }
}
