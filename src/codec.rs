//! Binary encoding of the reference color table.
//!
//! The table is a 16-byte header followed by variable-length records:
//!
//! ```text
//! header:  "DULX" | version u32 LE | count u32 LE | reserved u32 LE (0)
//! record:  r g b | lrv u16 LE | id u32 LE | name_len u8 | name
//!          | code_len u8 | code | light_text u8 (0/1)
//! ```
//!
//! Decoding is lazy: [`Records`] parses one record per `next()` straight out
//! of the byte buffer, so a table far larger than working memory can be
//! scanned from a memory map. Damaged records are skipped with a warning and
//! the scan carries on.

use crate::error::ColorSenseError;
use crate::record::{ColorRecord, ColorSource, Lrv, LrvValue, Rgb};

use log::{debug, info, trace, warn};
use memmap2::Mmap;
use std::fmt;
use std::fs::File;
use std::path::Path;

/// File signature.
pub const MAGIC: [u8; 4] = *b"DULX";
/// The only layout version this crate reads and writes.
pub const VERSION: u32 = 1;
/// Size of the fixed header.
pub const HEADER_LEN: usize = 16;
/// Longest name or code that fits a one-byte length prefix.
pub const MAX_STRING_LEN: usize = 255;
/// Smallest possible record: both strings empty.
pub const MIN_RECORD_LEN: usize = 12;
/// Largest possible record: both strings at full length.
pub const MAX_RECORD_LEN: usize = MIN_RECORD_LEN + 2 * MAX_STRING_LEN;

/// Records checked ahead of a candidate offset when resynchronising.
const RESYNC_LOOKAHEAD: u32 = 8;

// =============================================================================
// Header
// =============================================================================

/// Decoded file header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Layout version.
    pub version: u32,
    /// Declared number of records.
    pub count: u32,
    /// Reserved word, written as 0.
    pub reserved: u32,
}

impl Header {
    fn new(count: u32) -> Self {
        Self {
            version: VERSION,
            count,
            reserved: 0,
        }
    }

    fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&MAGIC);
        out.extend_from_slice(&self.version.to_le_bytes());
        out.extend_from_slice(&self.count.to_le_bytes());
        out.extend_from_slice(&self.reserved.to_le_bytes());
    }

    /// Parse and validate the header of `bytes`.
    ///
    /// # Errors
    /// [`ColorSenseError::Format`] on a short buffer, wrong magic, an
    /// unsupported version, or a count that cannot fit in the buffer.
    pub fn parse(bytes: &[u8]) -> Result<Self, ColorSenseError> {
        if bytes.len() < HEADER_LEN {
            return Err(ColorSenseError::format(format!(
                "buffer is {} bytes, header needs {}",
                bytes.len(),
                HEADER_LEN
            )));
        }
        if bytes[0..4] != MAGIC {
            return Err(ColorSenseError::format(format!(
                "bad magic {:02X?} (expected \"DULX\")",
                &bytes[0..4]
            )));
        }

        let word = |at: usize| u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]]);
        let header = Self {
            version: word(4),
            count: word(8),
            reserved: word(12),
        };

        if header.version != VERSION {
            return Err(ColorSenseError::format(format!(
                "unsupported version {} (expected {})",
                header.version, VERSION
            )));
        }
        if header.reserved != 0 {
            warn!("reserved header word is {:#010X}, expected 0", header.reserved);
        }

        let body = (bytes.len() - HEADER_LEN) as u64;
        let needed = u64::from(header.count) * MIN_RECORD_LEN as u64;
        if needed > body {
            return Err(ColorSenseError::format(format!(
                "header declares {} records (at least {} bytes) but only {} bytes follow",
                header.count, needed, body
            )));
        }

        Ok(header)
    }
}

// =============================================================================
// Encoding
// =============================================================================

/// A non-fatal problem found while encoding.
#[derive(Debug, Clone, PartialEq)]
pub enum EncodeWarning {
    /// A name was cut to fit its length prefix.
    NameTruncated {
        /// Record position.
        index: usize,
        /// Encoded length before truncation.
        original_len: usize,
        /// Encoded length written.
        kept_len: usize,
    },
    /// A code was cut to fit its length prefix.
    CodeTruncated {
        /// Record position.
        index: usize,
        /// Encoded length before truncation.
        original_len: usize,
        /// Encoded length written.
        kept_len: usize,
    },
    /// An LRV outside `[0, 655.35]` was clamped.
    LrvClamped {
        /// Record position.
        index: usize,
        /// Value found in the source.
        value: f64,
        /// Value written.
        stored: Lrv,
    },
    /// An LRV string could not be read as a number and was written as 0.
    LrvUnreadable {
        /// Record position.
        index: usize,
        /// Text found in the source.
        raw: String,
    },
}

impl fmt::Display for EncodeWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncodeWarning::NameTruncated {
                index,
                original_len,
                kept_len,
            } => write!(f, "record {index}: name truncated from {original_len} to {kept_len} bytes"),
            EncodeWarning::CodeTruncated {
                index,
                original_len,
                kept_len,
            } => write!(f, "record {index}: code truncated from {original_len} to {kept_len} bytes"),
            EncodeWarning::LrvClamped { index, value, stored } => {
                write!(f, "record {index}: LRV {value} clamped to {stored}")
            }
            EncodeWarning::LrvUnreadable { index, raw } => {
                write!(f, "record {index}: LRV {raw:?} is not a number, stored as 0.00")
            }
        }
    }
}

/// Output of an encode: the binary table plus any warnings raised.
#[derive(Debug, Clone, PartialEq)]
pub struct Encoded {
    /// The complete binary table.
    pub bytes: Vec<u8>,
    /// Non-fatal problems, in record order.
    pub warnings: Vec<EncodeWarning>,
}

/// Longest prefix of `s` that is at most `max` bytes and ends on a char boundary.
pub fn truncate_utf8(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

#[derive(Clone, Copy)]
enum StringField {
    Name,
    Code,
}

fn write_string(out: &mut Vec<u8>, value: &str, index: usize, field: StringField, warnings: &mut Vec<EncodeWarning>) {
    let kept = truncate_utf8(value, MAX_STRING_LEN);
    if kept.len() < value.len() {
        let (original_len, kept_len) = (value.len(), kept.len());
        let warning = match field {
            StringField::Name => EncodeWarning::NameTruncated {
                index,
                original_len,
                kept_len,
            },
            StringField::Code => EncodeWarning::CodeTruncated {
                index,
                original_len,
                kept_len,
            },
        };
        warn!("{}", warning);
        warnings.push(warning);
    }
    out.push(kept.len() as u8);
    out.extend_from_slice(kept.as_bytes());
}

/// Encode records into the binary table layout, in order.
///
/// Overlong names and codes are truncated on a character boundary and
/// reported in [`Encoded::warnings`].
///
/// # Errors
/// [`ColorSenseError::Validation`] if there are more records than the
/// header count can express.
pub fn encode(records: &[ColorRecord]) -> Result<Encoded, ColorSenseError> {
    let count = u32::try_from(records.len()).map_err(|_| ColorSenseError::Validation {
        index: u32::MAX as usize,
        reason: format!("{} records exceed the u32 header count", records.len()),
    })?;

    let mut bytes = Vec::with_capacity(HEADER_LEN + records.len() * (MIN_RECORD_LEN + 16));
    let mut warnings = Vec::new();
    Header::new(count).write_to(&mut bytes);

    for (index, record) in records.iter().enumerate() {
        bytes.extend_from_slice(&record.rgb.channels());
        bytes.extend_from_slice(&record.lrv.0.to_le_bytes());
        bytes.extend_from_slice(&record.id.to_le_bytes());
        write_string(&mut bytes, &record.name, index, StringField::Name, &mut warnings);
        write_string(&mut bytes, &record.code, index, StringField::Code, &mut warnings);
        bytes.push(u8::from(record.light_text));
    }

    debug!("encoded {} records into {} bytes", count, bytes.len());
    Ok(Encoded { bytes, warnings })
}

/// Validate one authoring entry and convert it to a record.
///
/// # Errors
/// [`ColorSenseError::Validation`] if any channel is outside `[0, 255]`.
pub fn record_from_source(
    index: usize,
    source: &ColorSource,
    warnings: &mut Vec<EncodeWarning>,
) -> Result<ColorRecord, ColorSenseError> {
    let channel = |v: i64| u8::try_from(v).ok();
    let (Some(r), Some(g), Some(b)) = (channel(source.r), channel(source.g), channel(source.b)) else {
        return Err(ColorSenseError::Validation {
            index,
            reason: format!(
                "RGB ({}, {}, {}) outside 0-255",
                source.r, source.g, source.b
            ),
        });
    };

    let lrv = match source.lrv.as_percent() {
        Some(percent) => {
            let (lrv, clamped) = Lrv::from_percent(percent);
            if clamped {
                let warning = EncodeWarning::LrvClamped {
                    index,
                    value: percent,
                    stored: lrv,
                };
                warn!("{}", warning);
                warnings.push(warning);
            }
            lrv
        }
        None => {
            let raw = match &source.lrv {
                LrvValue::Text(s) => s.clone(),
                LrvValue::Number(n) => n.to_string(),
            };
            let warning = EncodeWarning::LrvUnreadable { index, raw };
            warn!("{}", warning);
            warnings.push(warning);
            Lrv(0)
        }
    };

    Ok(ColorRecord {
        name: source.name.trim().to_string(),
        code: source.code.trim().to_string(),
        rgb: Rgb::new(r, g, b),
        lrv,
        id: source.id,
        light_text: source.light_text,
    })
}

/// Validate authoring entries and encode them.
///
/// # Errors
/// [`ColorSenseError::Validation`] on the first entry with an
/// out-of-range channel; nothing is encoded in that case.
pub fn encode_sources(sources: &[ColorSource]) -> Result<Encoded, ColorSenseError> {
    let mut warnings = Vec::new();
    let records = sources
        .iter()
        .enumerate()
        .map(|(index, source)| record_from_source(index, source, &mut warnings))
        .collect::<Result<Vec<_>, _>>()?;

    let mut encoded = encode(&records)?;
    warnings.append(&mut encoded.warnings);
    encoded.warnings = warnings;
    Ok(encoded)
}

// =============================================================================
// Decoding
// =============================================================================

/// Why a single record could not be read.
#[derive(Debug)]
enum RecordFault {
    /// A field runs past the end of the buffer; the record's extent is unknown.
    Overrun { field: &'static str },
    /// The record's extent is known but its content is unusable.
    Invalid { end: usize, reason: String },
}

struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn take(&mut self, len: usize, field: &'static str) -> Result<&'a [u8], RecordFault> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.data.len())
            .ok_or(RecordFault::Overrun { field })?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u8(&mut self, field: &'static str) -> Result<u8, RecordFault> {
        Ok(self.take(1, field)?[0])
    }

    fn u16_le(&mut self, field: &'static str) -> Result<u16, RecordFault> {
        let b = self.take(2, field)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn u32_le(&mut self, field: &'static str) -> Result<u32, RecordFault> {
        let b = self.take(4, field)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn prefixed(&mut self, field: &'static str) -> Result<&'a [u8], RecordFault> {
        let len = self.u8(field)?;
        self.take(usize::from(len), field)
    }
}

fn parse_record(data: &[u8], start: usize) -> Result<(ColorRecord, usize), RecordFault> {
    let mut cursor = Cursor { data, pos: start };
    let rgb = cursor.take(3, "rgb")?;
    let rgb = Rgb::new(rgb[0], rgb[1], rgb[2]);
    let lrv = Lrv(cursor.u16_le("lrv")?);
    let id = cursor.u32_le("id")?;
    let name = cursor.prefixed("name")?;
    let code = cursor.prefixed("code")?;
    let flag = cursor.u8("light_text")?;
    let end = cursor.pos;

    let text = |bytes: &[u8], what: &str| {
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|e| RecordFault::Invalid {
                end,
                reason: format!("{what} is not valid UTF-8 ({e})"),
            })
    };
    let name = text(name, "name")?;
    let code = text(code, "code")?;
    let light_text = match flag {
        0 => false,
        1 => true,
        other => {
            return Err(RecordFault::Invalid {
                end,
                reason: format!("light text flag is {other}, expected 0 or 1"),
            });
        }
    };

    Ok((
        ColorRecord {
            name,
            code,
            rgb,
            lrv,
            id,
            light_text,
        },
        end,
    ))
}

/// Lazy iterator over the records of a binary table.
///
/// Yields owned records one at a time; nothing beyond the current record
/// is held in memory. Malformed records are skipped (see [`Records::skipped`]).
#[derive(Debug, Clone)]
pub struct Records<'a> {
    data: &'a [u8],
    pos: usize,
    remaining: u32,
    ordinal: u32,
    skipped: u32,
    done: bool,
}

impl<'a> Records<'a> {
    fn new(data: &'a [u8], header: Header) -> Self {
        Self {
            data,
            pos: HEADER_LEN,
            remaining: header.count,
            ordinal: 0,
            skipped: 0,
            done: false,
        }
    }

    /// Number of declared records skipped so far.
    pub fn skipped(&self) -> u32 {
        self.skipped
    }

    /// Whether the next `remaining` records parse cleanly from `start`.
    fn tail_parses(&self, start: usize) -> bool {
        let check = self.remaining.min(RESYNC_LOOKAHEAD);
        let mut pos = start;
        for _ in 0..check {
            match parse_record(self.data, pos) {
                Ok((_, end)) => pos = end,
                Err(_) => return false,
            }
        }
        // A short tail must account for every remaining byte.
        self.remaining > RESYNC_LOOKAHEAD || pos == self.data.len()
    }

    /// Whether the next `remaining` records at least frame from `start`.
    ///
    /// Looser than [`Records::tail_parses`]: records with bad content still
    /// count as aligned, as long as no more than half of them are bad.
    fn tail_frames(&self, start: usize) -> bool {
        let check = self.remaining.min(RESYNC_LOOKAHEAD);
        let mut pos = start;
        let mut clean = 0;
        for _ in 0..check {
            match parse_record(self.data, pos) {
                Ok((_, end)) => {
                    clean += 1;
                    pos = end;
                }
                Err(RecordFault::Invalid { end, .. }) => pos = end,
                Err(RecordFault::Overrun { .. }) => return false,
            }
        }
        if self.remaining <= RESYNC_LOOKAHEAD && pos != self.data.len() {
            return false;
        }
        2 * clean >= check
    }

    /// Find where the record after a damaged one starts.
    fn resync(&self, damaged_at: usize) -> Option<usize> {
        let first = damaged_at + MIN_RECORD_LEN;
        let last = (damaged_at + MAX_RECORD_LEN).min(self.data.len());
        (first..=last).find(|&candidate| self.tail_parses(candidate))
    }

    fn finish(&mut self) {
        if self.done {
            return;
        }
        self.done = true;
        if self.pos < self.data.len() {
            warn!(
                "ignoring {} trailing bytes after the last record",
                self.data.len() - self.pos
            );
        }
        if self.skipped > 0 {
            info!("decode finished with {} damaged records skipped", self.skipped);
        }
    }
}

impl Iterator for Records<'_> {
    type Item = ColorRecord;

    fn next(&mut self) -> Option<ColorRecord> {
        while self.remaining > 0 {
            let ordinal = self.ordinal;
            self.ordinal += 1;
            self.remaining -= 1;

            match parse_record(self.data, self.pos) {
                Ok((record, end)) => {
                    trace!("record {} at offset {}: {}", ordinal, self.pos, record.name);
                    self.pos = end;
                    return Some(record);
                }
                Err(RecordFault::Invalid { end, reason }) => {
                    warn!("skipping record {} at offset {}: {}", ordinal, self.pos, reason);
                    self.skipped += 1;
                    // The length prefixes that gave `end` may be the damage.
                    if self.remaining == 0 || self.tail_frames(end) {
                        self.pos = end;
                    } else if let Some(next) = self.resync(self.pos) {
                        debug!(
                            "length prefixes of record {} misaligned, resynchronised at offset {} instead of {}",
                            ordinal, next, end
                        );
                        self.pos = next;
                    } else {
                        self.pos = end;
                    }
                }
                Err(RecordFault::Overrun { field }) => {
                    warn!(
                        "skipping record {} at offset {}: {} runs past end of buffer",
                        ordinal, self.pos, field
                    );
                    self.skipped += 1;
                    if self.remaining == 0 {
                        self.pos = self.data.len();
                        break;
                    }
                    match self.resync(self.pos) {
                        Some(next) => {
                            debug!("resynchronised at offset {} after damaged record {}", next, ordinal);
                            self.pos = next;
                        }
                        None => {
                            warn!(
                                "no parsable record after offset {}; {} records unreadable",
                                self.pos, self.remaining
                            );
                            self.skipped += self.remaining;
                            self.remaining = 0;
                            self.done = true;
                        }
                    }
                }
            }
        }
        self.finish();
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.remaining as usize))
    }
}

/// Validate the header of `bytes` and return a lazy record iterator.
///
/// # Errors
/// [`ColorSenseError::Format`] if the header is unusable.
pub fn decode(bytes: &[u8]) -> Result<Records<'_>, ColorSenseError> {
    let header = Header::parse(bytes)?;
    Ok(Records::new(bytes, header))
}

/// A validated binary table over any byte storage.
///
/// The header is checked once on construction; [`Database::records`] can be
/// called any number of times, each call starting a fresh scan.
///
/// # Example
///
/// ```
/// use colorsense_core::{encode, ColorRecord, Database, Lrv, Rgb};
///
/// let encoded = encode(&[ColorRecord::new("Vivid White", "W01", Rgb::new(247, 248, 244), Lrv(9120), 1)])?;
/// let db = Database::new(encoded.bytes)?;
/// assert_eq!(db.records().count(), 1);
/// assert_eq!(db.records().next().unwrap().name, "Vivid White");
/// # Ok::<(), colorsense_core::ColorSenseError>(())
/// ```
#[derive(Debug)]
pub struct Database<B = Vec<u8>> {
    bytes: B,
    header: Header,
}

impl<B: AsRef<[u8]>> Database<B> {
    /// Wrap `bytes` after validating the header.
    ///
    /// # Errors
    /// [`ColorSenseError::Format`] if the header is unusable.
    pub fn new(bytes: B) -> Result<Self, ColorSenseError> {
        let header = Header::parse(bytes.as_ref())?;
        Ok(Self { bytes, header })
    }

    /// The decoded header.
    pub fn header(&self) -> Header {
        self.header
    }

    /// Number of records the header declares.
    pub fn declared_len(&self) -> usize {
        self.header.count as usize
    }

    /// Size of the underlying buffer.
    pub fn byte_len(&self) -> usize {
        self.bytes.as_ref().len()
    }

    /// Start a new scan over the records.
    pub fn records(&self) -> Records<'_> {
        Records::new(self.bytes.as_ref(), self.header)
    }
}

impl Database<Mmap> {
    /// Memory-map a table from disk.
    ///
    /// # Errors
    /// [`ColorSenseError::Io`] if the file cannot be opened or mapped,
    /// [`ColorSenseError::Format`] if the header is unusable.
    pub fn open_file(path: impl AsRef<Path>) -> Result<Self, ColorSenseError> {
        let path = path.as_ref();
        let file = File::open(path)?;
        // Safety: the map is read-only and the table files are written once
        // by the authoring tools, never modified while a reader has them open.
        let map = unsafe { Mmap::map(&file)? };
        let db = Self::new(map)?;
        info!(
            "opened {} ({} records declared, {} bytes)",
            path.display(),
            db.declared_len(),
            db.byte_len()
        );
        Ok(db)
    }
}
