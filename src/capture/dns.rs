//! Minimal DNS message decoding: just enough to summarise the first question
//! or answer of a message.

const HEADER_LEN: usize = 12;
const MAX_NAME_LEN: usize = 255;
const MAX_POINTER_JUMPS: usize = 16;

/// A question or resource record, reduced to its owner name and type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsEntry {
    pub name: String,
    pub record_type: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DnsMessage {
    pub question: Option<DnsEntry>,
    pub answer: Option<DnsEntry>,
}

/// Decode a DNS message. `None` when the bytes are not a well-formed message
/// as far as the sections we look at go.
pub fn parse(payload: &[u8]) -> Option<DnsMessage> {
    if payload.len() < HEADER_LEN {
        return None;
    }

    let question_count = u16::from_be_bytes([payload[4], payload[5]]);
    let answer_count = u16::from_be_bytes([payload[6], payload[7]]);

    let mut message = DnsMessage::default();

    if question_count > 0 {
        let (name, next) = read_name(payload, HEADER_LEN)?;
        let record_type = read_u16(payload, next)?;
        // class
        read_u16(payload, next + 2)?;
        message.question = Some(DnsEntry { name, record_type });
        return Some(message);
    }

    if answer_count > 0 {
        let (name, next) = read_name(payload, HEADER_LEN)?;
        let record_type = read_u16(payload, next)?;
        // class, ttl, rdlength
        let rdlength = read_u16(payload, next + 8)? as usize;
        if next + 10 + rdlength > payload.len() {
            return None;
        }
        message.answer = Some(DnsEntry { name, record_type });
    }

    Some(message)
}

fn read_u16(data: &[u8], offset: usize) -> Option<u16> {
    let bytes = data.get(offset..offset + 2)?;
    Some(u16::from_be_bytes([bytes[0], bytes[1]]))
}

/// Read a possibly compressed name starting at `offset`. Returns the dotted
/// name and the offset just past the name in the original position.
fn read_name(data: &[u8], offset: usize) -> Option<(String, usize)> {
    let mut labels: Vec<String> = Vec::new();
    let mut total_len = 0usize;
    let mut pos = offset;
    let mut resume_at = None;
    let mut jumps = 0;

    loop {
        let len = *data.get(pos)? as usize;

        match len & 0xC0 {
            0x00 => {
                if len == 0 {
                    pos += 1;
                    break;
                }
                let label = data.get(pos + 1..pos + 1 + len)?;
                total_len += len + 1;
                if total_len > MAX_NAME_LEN {
                    return None;
                }
                labels.push(String::from_utf8_lossy(label).into_owned());
                pos += 1 + len;
            }
            0xC0 => {
                let low = *data.get(pos + 1)? as usize;
                jumps += 1;
                if jumps > MAX_POINTER_JUMPS {
                    return None;
                }
                if resume_at.is_none() {
                    resume_at = Some(pos + 2);
                }
                pos = ((len & 0x3F) << 8) | low;
            }
            // 0x40 and 0x80 label types are obsolete/reserved
            _ => return None,
        }
    }

    Some((labels.join("."), resume_at.unwrap_or(pos)))
}

/// Mnemonic of a resource record type
pub fn type_name(record_type: u16) -> &'static str {
    match record_type {
        1 => "A",
        2 => "NS",
        3 => "MD",
        4 => "MF",
        5 => "CNAME",
        6 => "SOA",
        7 => "MB",
        8 => "MG",
        9 => "MR",
        10 => "NULL",
        11 => "WKS",
        12 => "PTR",
        13 => "HINFO",
        14 => "MINFO",
        15 => "MX",
        16 => "TXT",
        28 => "AAAA",
        33 => "SRV",
        41 => "OPT",
        64 => "SVCB",
        65 => "HTTPS",
        255 => "ANY",
        256 => "URI",
        _ => "Unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::testing::{dns_answer_only, dns_query};

    #[test]
    fn test_parse_question() {
        let msg = parse(&dns_query("example.com", 28)).unwrap();
        assert_eq!(
            msg.question,
            Some(DnsEntry {
                name: "example.com".into(),
                record_type: 28
            })
        );
        assert!(msg.answer.is_none());
    }

    #[test]
    fn test_parse_answer_without_question() {
        let msg = parse(&dns_answer_only("example.org", 1)).unwrap();
        assert!(msg.question.is_none());
        assert_eq!(msg.answer.unwrap().name, "example.org");
    }

    #[test]
    fn test_compressed_name() {
        // Pointer at offset 12 targets the name stored at offset 14.
        let mut msg = vec![0; 12];
        msg.extend_from_slice(&[0xC0, 14]);
        msg.extend_from_slice(&[3, b'f', b'o', b'o', 3, b'c', b'o', b'm', 0]);
        assert_eq!(read_name(&msg, 12).unwrap(), ("foo.com".to_string(), 14));
        assert_eq!(read_name(&msg, 14).unwrap(), ("foo.com".to_string(), 23));
    }

    #[test]
    fn test_pointer_loop_is_rejected() {
        let mut msg = vec![0; 12];
        msg.extend_from_slice(&[0xC0, 12]);
        assert!(read_name(&msg, 12).is_none());
    }

    #[test]
    fn test_truncated_messages() {
        assert!(parse(&[0; 11]).is_none());
        let full = dns_query("example.com", 1);
        assert!(parse(&full[..full.len() - 3]).is_none());
    }

    #[test]
    fn test_type_names() {
        assert_eq!(type_name(1), "A");
        assert_eq!(type_name(28), "AAAA");
        assert_eq!(type_name(65), "HTTPS");
        assert_eq!(type_name(9999), "Unknown");
    }
}
