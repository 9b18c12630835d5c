//! Frame extraction: turns raw request bodies and stream chunks into complete event documents.

use crate::error::Error;
use once_cell::sync::Lazy;
use regex::Regex;

static BOUNDARY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)boundary\s*=\s*(?:"([^"]+)"|([^;\s]+))"#).unwrap());

static FILENAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)filename\s*=\s*(?:"([^"]*)"|([^;\s]+))"#).unwrap());

/// Start of an ISAPI alert document
pub const ISAPI_EVENT_START: &[u8] = b"<EventNotificationAlert";
/// End of an ISAPI alert document
pub const ISAPI_EVENT_END: &[u8] = b"</EventNotificationAlert>";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Xml,
    Json,
}

impl MediaKind {
    /// A document whose first non-whitespace byte is `{` is JSON, anything else XML
    pub fn sniff(bytes: &[u8]) -> MediaKind {
        match bytes.iter().find(|b| !b.is_ascii_whitespace()) {
            Some(b'{') => MediaKind::Json,
            _ => MediaKind::Xml,
        }
    }

    fn from_content_type(content_type: &str) -> Option<MediaKind> {
        let content_type = content_type.to_ascii_lowercase();
        if content_type.contains("json") {
            Some(MediaKind::Json)
        } else if content_type.contains("xml") {
            Some(MediaKind::Xml)
        } else {
            None
        }
    }
}

/// How the sender declared the body
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Envelope {
    None,
    Xml,
    Json,
    Multipart { boundary: String },
}

impl Envelope {
    pub fn from_content_type(content_type: &str) -> Envelope {
        let lowered = content_type.trim().to_ascii_lowercase();

        if lowered.starts_with("multipart/") {
            if let Some(caps) = BOUNDARY_RE.captures(content_type) {
                if let Some(boundary) = caps.get(1).or_else(|| caps.get(2)) {
                    return Envelope::Multipart {
                        boundary: boundary.as_str().to_string(),
                    };
                }
            }
        }

        match MediaKind::from_content_type(&lowered) {
            Some(MediaKind::Json) => Envelope::Json,
            Some(MediaKind::Xml) => Envelope::Xml,
            None => Envelope::None,
        }
    }
}

/// One complete event document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub media: MediaKind,
    pub bytes: Vec<u8>,
}

impl Frame {
    pub fn new(bytes: Vec<u8>, media: Option<MediaKind>) -> Self {
        let media = media.unwrap_or_else(|| MediaKind::sniff(&bytes));
        Self { media, bytes }
    }
}

/// Binary part that travelled alongside the document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub content_type: String,
    pub filename: Option<String>,
    pub bytes: Vec<u8>,
}

impl Attachment {
    /// File extension for storing this attachment
    pub fn extension(&self) -> String {
        let subtype = self
            .content_type
            .split(';')
            .next()
            .and_then(|mime| mime.trim().split_once('/'))
            .map(|(_, subtype)| subtype.trim().to_ascii_lowercase());

        match subtype.as_deref() {
            Some("jpeg") | Some("jpg") | Some("pjpeg") => return "jpg".to_string(),
            Some(sub) if !sub.is_empty() && sub.chars().all(|c| c.is_ascii_alphanumeric()) => {
                return sub.to_string()
            }
            _ => {}
        }

        self.filename
            .as_deref()
            .and_then(|name| name.rsplit_once('.'))
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
            .unwrap_or_else(|| "bin".to_string())
    }
}

/// Result of taking apart one inbound body
#[derive(Debug, Clone)]
pub struct Extracted {
    pub document: Frame,
    pub attachments: Vec<Attachment>,
    /// Non-fatal oddities worth logging
    pub warnings: Vec<String>,
}

/// Split a single request body according to its envelope
pub fn extract(body: &[u8], envelope: &Envelope) -> Result<Extracted, Error> {
    if body.iter().all(|b| b.is_ascii_whitespace()) {
        return Err(Error::Parse("empty body".to_string()));
    }

    let media = match envelope {
        Envelope::Multipart { boundary } => return split_multipart(body, boundary),
        Envelope::Xml => Some(MediaKind::Xml),
        Envelope::Json => Some(MediaKind::Json),
        Envelope::None => None,
    };

    Ok(Extracted {
        document: Frame::new(body.to_vec(), media),
        attachments: Vec::new(),
        warnings: Vec::new(),
    })
}

struct Part<'a> {
    content_type: Option<String>,
    filename: Option<String>,
    body: &'a [u8],
}

impl Part<'_> {
    fn is_document(&self) -> bool {
        let by_type = self.content_type.as_deref().map_or(false, |ct| {
            let ct = ct.to_ascii_lowercase();
            ct.contains("xml") || ct.contains("json") || ct.starts_with("text/")
        });
        let by_name = self.filename.as_deref().map_or(false, |name| {
            let name = name.to_ascii_lowercase();
            name.ends_with(".xml") || name.ends_with(".json")
        });
        by_type || by_name
    }

    fn is_image(&self) -> bool {
        self.content_type
            .as_deref()
            .map_or(false, |ct| ct.trim().to_ascii_lowercase().starts_with("image/"))
    }
}

/// Split a multipart body on `boundary` into its document and image attachments
pub fn split_multipart(body: &[u8], boundary: &str) -> Result<Extracted, Error> {
    if boundary.is_empty() {
        return Err(Error::Parse("multipart body without boundary".to_string()));
    }

    let delimiter = [b"--", boundary.as_bytes()].concat();
    let mut parts = Vec::new();
    let mut cursor = match find(body, &delimiter) {
        Some(pos) => pos + delimiter.len(),
        None => {
            return Err(Error::Parse(format!(
                "boundary '{}' not found in multipart body",
                boundary
            )))
        }
    };

    loop {
        let rest = &body[cursor..];
        if rest.starts_with(b"--") {
            break;
        }
        let (segment, next) = match find(rest, &delimiter) {
            Some(pos) => (&rest[..pos], Some(cursor + pos + delimiter.len())),
            None => (rest, None),
        };

        if let Some(part) = parse_part(segment) {
            parts.push(part);
        }

        match next {
            Some(next) => cursor = next,
            None => break,
        }
    }

    if parts.is_empty() {
        return Err(Error::Parse("multipart body contains no parts".to_string()));
    }

    let mut warnings = Vec::new();
    let document_index = match parts.iter().position(Part::is_document) {
        Some(index) => index,
        None => {
            warnings.push(format!(
                "no document part among {} multipart parts, using the first part",
                parts.len()
            ));
            0
        }
    };

    let document = &parts[document_index];
    let media = document
        .content_type
        .as_deref()
        .and_then(MediaKind::from_content_type);
    let frame = Frame::new(document.body.to_vec(), media);

    let attachments = parts
        .iter()
        .enumerate()
        .filter(|(index, part)| *index != document_index && part.is_image())
        .map(|(_, part)| Attachment {
            content_type: part.content_type.clone().unwrap_or_default(),
            filename: part.filename.clone(),
            bytes: part.body.to_vec(),
        })
        .collect();

    Ok(Extracted {
        document: frame,
        attachments,
        warnings,
    })
}

fn parse_part(segment: &[u8]) -> Option<Part<'_>> {
    let segment = strip_leading_newline(segment);
    let segment = strip_trailing_newline(segment);
    if segment.iter().all(|b| b.is_ascii_whitespace()) {
        return None;
    }

    let (header_block, body) = match find(segment, b"\r\n\r\n") {
        Some(pos) => (&segment[..pos], &segment[pos + 4..]),
        None => match find(segment, b"\n\n") {
            Some(pos) => (&segment[..pos], &segment[pos + 2..]),
            None => (&segment[..0], segment),
        },
    };

    let mut content_type = None;
    let mut filename = None;
    for line in String::from_utf8_lossy(header_block).lines() {
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        match name.trim().to_ascii_lowercase().as_str() {
            "content-type" => content_type = Some(value.to_string()),
            "content-disposition" => {
                filename = FILENAME_RE
                    .captures(value)
                    .and_then(|caps| caps.get(1).or_else(|| caps.get(2)))
                    .map(|m| m.as_str().to_string())
                    .filter(|name| !name.is_empty());
            }
            _ => {}
        }
    }

    Some(Part {
        content_type,
        filename,
        body,
    })
}

fn strip_leading_newline(bytes: &[u8]) -> &[u8] {
    bytes
        .strip_prefix(b"\r\n")
        .or_else(|| bytes.strip_prefix(b"\n"))
        .unwrap_or(bytes)
}

fn strip_trailing_newline(bytes: &[u8]) -> &[u8] {
    bytes
        .strip_suffix(b"\r\n")
        .or_else(|| bytes.strip_suffix(b"\n"))
        .unwrap_or(bytes)
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn rfind(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).rposition(|w| w == needle)
}

/// Continuation buffer for one streaming connection.
///
/// Bytes are appended as they arrive; every complete start..end marker pair is sliced out as a
/// [`Frame`]. Anything in front of a start marker (multipart boundaries, headers, truncated
/// fragments) is discarded, which is also how the buffer resynchronizes after garbage.
#[derive(Debug)]
pub struct StreamBuffer {
    buffer: Vec<u8>,
    start: Vec<u8>,
    end: Vec<u8>,
    max_len: usize,
}

impl StreamBuffer {
    pub fn new(start: &[u8], end: &[u8], max_len: usize) -> Self {
        Self {
            buffer: Vec::new(),
            start: start.to_vec(),
            end: end.to_vec(),
            max_len,
        }
    }

    /// Buffer for ISAPI `EventNotificationAlert` streams
    pub fn isapi(max_len: usize) -> Self {
        Self::new(ISAPI_EVENT_START, ISAPI_EVENT_END, max_len)
    }

    /// Append a chunk and return every document it completed, in order
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Frame> {
        self.buffer.extend_from_slice(chunk);
        let mut frames = Vec::new();

        loop {
            let Some(start) = find(&self.buffer, &self.start) else {
                // a start marker may be split across chunks
                let keep = self.start.len() - 1;
                if self.buffer.len() > keep {
                    let cut = self.buffer.len() - keep;
                    self.buffer.drain(..cut);
                }
                break;
            };

            match find(&self.buffer[start..], &self.end) {
                Some(relative_end) => {
                    let end_marker = start + relative_end;
                    let end = end_marker + self.end.len();
                    // a truncated document followed by a fresh one: keep the fresh one
                    let start = rfind(&self.buffer[..end_marker], &self.start).unwrap_or(start);
                    frames.push(Frame {
                        media: MediaKind::Xml,
                        bytes: self.buffer[start..end].to_vec(),
                    });
                    self.buffer.drain(..end);
                }
                None => {
                    if start > 0 {
                        self.buffer.drain(..start);
                    }
                    if self.buffer.len() > self.max_len {
                        self.buffer.clear();
                    }
                    break;
                }
            }
        }

        frames
    }

    /// Bytes currently waiting for a complete document
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}
