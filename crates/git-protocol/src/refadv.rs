//! Ref advertisement line format: `<oid> <refname>[\0<capabilities>]`, one
//! pkt-line per ref, terminated by a flush packet. Peeled annotated tags get
//! a second line `"<peeled-id> <refName>^{}"` immediately after the tag's
//! own line.

use bstr::BString;
use git_hash::ObjectId;

use crate::capability::Capabilities;
use crate::pktline::{PktLine, PktLineReader, PktLineWriter};
use crate::ProtocolError;

/// A single advertised ref, with an optional peeled id for annotated tags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvertisedRef {
    pub id: ObjectId,
    pub name: BString,
    pub peeled: Option<ObjectId>,
}

impl AdvertisedRef {
    pub fn new(id: ObjectId, name: impl Into<BString>) -> Self {
        Self { id, name: name.into(), peeled: None }
    }

    pub fn with_peeled(mut self, peeled: ObjectId) -> Self {
        self.peeled = Some(peeled);
        self
    }
}

/// Write a full ref advertisement: capabilities are attached to the first
/// line after a NUL byte, every other line is a plain `<oid> <name>`, and
/// an entry with a peeled id gets a following `<peeled-id> <name>^{}` line.
/// Terminated with a flush packet.
pub fn write_ref_advertisement<W: std::io::Write>(
    writer: &mut PktLineWriter<W>,
    refs: &[AdvertisedRef],
    capabilities: &[String],
) -> Result<(), ProtocolError> {
    for (i, r) in refs.iter().enumerate() {
        let name = String::from_utf8_lossy(&r.name);
        if i == 0 && !capabilities.is_empty() {
            let caps = capabilities.join(" ");
            writer.write_line(format!("{} {}\0{}\n", r.id, name, caps).as_bytes())?;
        } else {
            writer.write_text(&format!("{} {}", r.id, name))?;
        }
        if let Some(peeled) = r.peeled {
            writer.write_text(&format!("{} {}^{{}}", peeled, name))?;
        }
    }
    writer.write_flush()
}

/// Parse a ref advertisement previously written by [`write_ref_advertisement`]
/// (or any v1-shaped advertisement). Returns the refs in wire order along
/// with the capabilities carried on the first line; a `"<id> <name>^{}"`
/// line attaches its id as the peeled value of the immediately preceding
/// entry.
pub fn read_ref_advertisement<R: std::io::Read>(
    reader: &mut PktLineReader<R>,
) -> Result<(Vec<AdvertisedRef>, Capabilities), ProtocolError> {
    let mut refs: Vec<AdvertisedRef> = Vec::new();
    let mut capabilities = Capabilities::default();
    let mut first_line = true;

    loop {
        match reader.read_pkt()? {
            PktLine::Flush | PktLine::Delimiter | PktLine::ResponseEnd => break,
            PktLine::Data(data) => {
                let line = strip_newline(&data);
                if line.is_empty() || line.starts_with(b"#") {
                    continue;
                }

                let line = if first_line {
                    first_line = false;
                    if let Some(nul_pos) = line.iter().position(|&b| b == 0) {
                        let caps_str = String::from_utf8_lossy(&line[nul_pos + 1..]);
                        capabilities = Capabilities::parse_v1(&caps_str);
                        &line[..nul_pos]
                    } else {
                        line
                    }
                } else {
                    line
                };

                parse_ref_line(line, &mut refs)?;
            }
        }
    }

    Ok((refs, capabilities))
}

fn parse_ref_line(line: &[u8], refs: &mut Vec<AdvertisedRef>) -> Result<(), ProtocolError> {
    let space_pos = line.iter().position(|&b| b == b' ').ok_or_else(|| {
        ProtocolError::Protocol(format!("invalid ref line (no space): {}", String::from_utf8_lossy(line)))
    })?;

    let oid_hex = &line[..space_pos];
    let rest = &line[space_pos + 1..];

    let oid_str = std::str::from_utf8(oid_hex).map_err(|_| ProtocolError::Protocol("invalid UTF-8 in OID".into()))?;
    let oid = ObjectId::from_hex(oid_str)
        .map_err(|e| ProtocolError::Protocol(format!("invalid OID in ref advertisement: {}", e)))?;

    if let Some(name) = rest.strip_suffix(b"^{}") {
        let prev = refs.last_mut().ok_or_else(|| {
            ProtocolError::Protocol("peeled line with no preceding ref".into())
        })?;
        if prev.name.as_slice() != name {
            return Err(ProtocolError::Protocol("peeled line does not match preceding ref".into()));
        }
        prev.peeled = Some(oid);
    } else {
        refs.push(AdvertisedRef::new(oid, BString::from(rest)));
    }
    Ok(())
}

fn strip_newline(data: &[u8]) -> &[u8] {
    if data.last() == Some(&b'\n') {
        &data[..data.len() - 1]
    } else {
        data
    }
}
