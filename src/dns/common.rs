use bitstream_io::{BitRead, BitReader, BitWrite, BitWriter, Endianness};

use super::{
    ParseError,
    constants::{MAX_LABEL_LENGTH, MAX_NAME_LENGTH, MAX_POINTER_JUMPS},
};

pub trait PacketComponent {
    fn write<E: Endianness>(
        &self,
        writer: &mut BitWriter<&mut Vec<u8>, E>,
    ) -> Result<(), ParseError>;

    /// Reads the component at the reader's position. `packet` is the whole
    /// message, needed to resolve compression pointers.
    fn read<E: Endianness>(
        &mut self,
        reader: &mut BitReader<&[u8], E>,
        packet: &[u8],
    ) -> Result<(), ParseError>;

    fn read_labels<E: Endianness>(
        &self,
        reader: &mut BitReader<&[u8], E>,
        packet: &[u8],
    ) -> Result<Vec<String>, ParseError> {
        let mut labels = Vec::new();
        loop {
            let label_len = reader.read_var::<u8>(8)?;
            match label_len & 0xC0 {
                0x00 => {
                    if label_len == 0 {
                        break;
                    }
                    let mut buf = vec![0; label_len as usize];
                    reader.read_bytes(&mut buf)?;
                    labels.push(decode_label(buf)?);
                }
                0xC0 => {
                    let low = reader.read_var::<u8>(8)?;
                    let offset = (((label_len & 0x3F) as usize) << 8) | low as usize;
                    follow_pointer(packet, offset, &mut labels)?;
                    break;
                }
                _ => return Err(ParseError::InvalidLabel),
            }
        }

        check_name_length(&labels)?;
        Ok(labels)
    }

    fn write_labels<E: Endianness>(
        &self,
        writer: &mut BitWriter<&mut Vec<u8>, E>,
        labels: &[String],
    ) -> Result<(), ParseError> {
        check_name_length(labels)?;
        for label in labels {
            if label.is_empty() || label.len() > MAX_LABEL_LENGTH {
                return Err(ParseError::InvalidLabel);
            }
            writer.write_var::<u8>(8, label.len() as u8)?;
            writer.write_bytes(label.as_bytes())?;
        }
        writer.write_var::<u8>(8, 0)?;

        Ok(())
    }
}

/// Resolves a compressed name suffix starting at `offset` in the raw message.
fn follow_pointer(
    packet: &[u8],
    mut offset: usize,
    labels: &mut Vec<String>,
) -> Result<(), ParseError> {
    let mut jumps = 1;
    loop {
        let label_len = *packet.get(offset).ok_or(ParseError::InvalidLabel)?;
        match label_len & 0xC0 {
            0x00 => {
                if label_len == 0 {
                    return Ok(());
                }
                let start = offset + 1;
                let end = start + label_len as usize;
                let bytes = packet.get(start..end).ok_or(ParseError::InvalidLabel)?;
                labels.push(decode_label(bytes.to_vec())?);
                offset = end;
            }
            0xC0 => {
                jumps += 1;
                if jumps > MAX_POINTER_JUMPS {
                    return Err(ParseError::InvalidLabel);
                }
                let low = *packet.get(offset + 1).ok_or(ParseError::InvalidLabel)?;
                offset = (((label_len & 0x3F) as usize) << 8) | low as usize;
            }
            _ => return Err(ParseError::InvalidLabel),
        }
    }
}

fn decode_label(buf: Vec<u8>) -> Result<String, ParseError> {
    String::from_utf8(buf).map_err(|_| ParseError::InvalidLabel)
}

fn check_name_length(labels: &[String]) -> Result<(), ParseError> {
    // Each label costs its length byte, plus the terminating root byte.
    let wire_len: usize = labels.iter().map(|l| l.len() + 1).sum::<usize>() + 1;
    if wire_len > MAX_NAME_LENGTH {
        return Err(ParseError::NameTooLong);
    }
    Ok(())
}

/// Splits a presentation-format name into labels, dropping the root.
pub fn labels_from_name(name: &str) -> Vec<String> {
    name.trim_end_matches('.')
        .split('.')
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

/// Joins labels into an absolute presentation-format name.
pub fn name_from_labels(labels: &[String]) -> String {
    if labels.is_empty() {
        return ".".to_string();
    }
    let mut name = labels.join(".");
    name.push('.');
    name
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_label_conversion() {
        let labels = labels_from_name("www.example.com.");
        assert_eq!(labels, vec!["www", "example", "com"]);
        assert_eq!(labels_from_name("www.example.com"), labels);
        assert_eq!(name_from_labels(&labels), "www.example.com.");
        assert_eq!(name_from_labels(&[]), ".");
    }

    #[test]
    fn test_follow_pointer_loop_is_rejected() {
        // A pointer at offset 0 pointing to itself.
        let packet = [0xC0, 0x00];
        let mut labels = Vec::new();
        assert!(follow_pointer(&packet, 0, &mut labels).is_err());
    }
}
