// PSPP - a program for statistical analysis.
// Copyright (C) 2025 Free Software Foundation, Inc.
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later
// version.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE.  See the GNU General Public License for more
// details.
//
// You should have received a copy of the GNU General Public License along with
// this program.  If not, see <http://www.gnu.org/licenses/>.

//! A small, self-contained ZIP reader and writer.
//!
//! The SPSS viewer format (`.spv`) is a ZIP archive of an XML structure
//! member plus one light-binary member per pivot table, and the encrypted
//! file wrapper in [crate::crypto] can wrap a `.spv`.  Both only ever need a
//! handful of members, stored or deflated, so this module implements just
//! enough of [APPNOTE.TXT](https://pkware.cachefly.net/webdocs/casestudies/APPNOTE.TXT)
//! to read and write that: no zip64, no multi-disk archives, no general
//! encryption.
//!
//! [ZipWriter] always defers each member's CRC-32 and sizes into a data
//! descriptor that follows the compressed data, rather than seeking back to
//! patch the local file header in place.  That is a valid, if slightly
//! larger, form of the format (APPNOTE §4.3.9.3) and it means the writer
//! works identically whether its sink is a seekable file or a pipe such as
//! stdout.

use std::io::{self, Error, ErrorKind, Read, Seek, SeekFrom, Write};

use flate2::{bufread::DeflateDecoder, write::DeflateEncoder, Compression};

const LOCAL_FILE_HEADER_SIG: u32 = 0x0403_4b50;
const DATA_DESCRIPTOR_SIG: u32 = 0x0807_4b50;
const CENTRAL_DIR_HEADER_SIG: u32 = 0x0201_4b50;
const EOCD_SIG: u32 = 0x0605_4b50;

/// Bit 3 of the general-purpose flag field: sizes and CRC-32 follow the
/// compressed data in a data descriptor instead of appearing in the local
/// file header.
const FLAG_DEFERRED_CRC: u16 = 0x0008;

/// Compression method stored in a member's headers.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Method {
    Stored,
    Deflate,
}

impl Method {
    fn code(self) -> u16 {
        match self {
            Method::Stored => 0,
            Method::Deflate => 8,
        }
    }

    fn from_code(code: u16) -> io::Result<Self> {
        match code {
            0 => Ok(Method::Stored),
            8 => Ok(Method::Deflate),
            other => Err(invalid_data(format!(
                "unsupported ZIP compression method {other}"
            ))),
        }
    }
}

/// Per-member options for [ZipWriter::start_file].
#[derive(Copy, Clone, Debug)]
pub struct FileOptions {
    pub method: Method,
}

impl Default for FileOptions {
    fn default() -> Self {
        Self {
            method: Method::Deflate,
        }
    }
}

fn invalid_data(message: impl Into<String>) -> Error {
    Error::new(ErrorKind::InvalidData, message.into())
}

/// Computes the CRC-32 (IEEE 802.3, reflected, as used by ZIP and gzip) over
/// `data`.
pub fn crc32(data: &[u8]) -> u32 {
    crc32_update(0, data)
}

/// Continues a CRC-32 computation started with a prior call that returned
/// `crc`.  `crc32(data)` is equivalent to `crc32_update(0, data)`.
pub fn crc32_update(crc: u32, data: &[u8]) -> u32 {
    let mut crc = !crc;
    for &byte in data {
        crc = CRC_TABLE[((crc ^ byte as u32) & 0xff) as usize] ^ (crc >> 8);
    }
    !crc
}

static CRC_TABLE: [u32; 256] = build_crc_table();

const fn build_crc_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut n = 0;
    while n < 256 {
        let mut c = n as u32;
        let mut k = 0;
        while k < 8 {
            c = if c & 1 != 0 {
                0xedb8_8320 ^ (c >> 1)
            } else {
                c >> 1
            };
            k += 1;
        }
        table[n] = c;
        n += 1;
    }
    table
}

struct PendingEntry {
    name: String,
    method: Method,
    local_header_offset: u64,
    crc32: u32,
    compressed_size: u64,
    uncompressed_size: u64,
}

enum Writing<W: Write> {
    Stored {
        out: W,
        crc: u32,
        size: u64,
    },
    Deflate {
        encoder: DeflateEncoder<CountingWriter<W>>,
        crc: u32,
        size: u64,
    },
    None,
}

/// Wraps a [Write] and counts the bytes passed through it.  Used downstream
/// of the deflate encoder to recover the compressed size, since the CRC-32
/// and uncompressed size must instead be accumulated over the bytes fed
/// *into* the encoder.
struct CountingWriter<W: Write> {
    inner: W,
    size: u64,
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.size += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Streams ZIP members to an underlying [Write].  Each call to [start_file]
/// finalizes the previous member (if any); [finish] finalizes the last one
/// and appends the central directory and end-of-central-directory record.
pub struct ZipWriter<W: Write> {
    sink: Writing<W>,
    entries: Vec<PendingEntry>,
    offset: u64,
}

impl<W: Write> ZipWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            sink: Writing::Stored {
                out: writer,
                crc: 0,
                size: 0,
            },
            entries: Vec::new(),
            offset: 0,
        }
    }

    /// Finishes the current member (if any) and starts a new one named
    /// `name`.
    pub fn start_file(&mut self, name: &str, options: FileOptions) -> io::Result<()> {
        let mut writer = self.finish_current()?;

        let local_header_offset = self.offset;
        self.offset += write_local_file_header(&mut writer, name, options.method)?;

        self.entries.push(PendingEntry {
            name: name.to_string(),
            method: options.method,
            local_header_offset,
            crc32: 0,
            compressed_size: 0,
            uncompressed_size: 0,
        });

        self.sink = match options.method {
            Method::Stored => Writing::Stored {
                out: writer,
                crc: 0,
                size: 0,
            },
            Method::Deflate => Writing::Deflate {
                encoder: DeflateEncoder::new(
                    CountingWriter {
                        inner: writer,
                        size: 0,
                    },
                    Compression::default(),
                ),
                crc: 0,
                size: 0,
            },
        };
        Ok(())
    }

    /// Returns the current member's underlying writer, finalizing it: writes
    /// its data descriptor and records its final sizes and CRC.  A no-op,
    /// returning the sink verbatim, before the first [start_file](Self::start_file).
    fn finish_current(&mut self) -> io::Result<W> {
        match std::mem::replace(&mut self.sink, Writing::None) {
            Writing::None => unreachable!("replaced immediately below"),
            Writing::Stored { out, crc, size } => {
                let mut out = out;
                if let Some(entry) = self.entries.last_mut() {
                    entry.crc32 = crc;
                    entry.compressed_size = size;
                    entry.uncompressed_size = size;
                    self.offset += write_data_descriptor(&mut out, crc, size, size)?;
                }
                self.sink = Writing::None;
                Ok(out)
            }
            Writing::Deflate { encoder, crc, size } => {
                // `crc`/`size` were accumulated over the uncompressed bytes
                // fed to the encoder (see `Write for ZipWriter`); the
                // compressed size is how many bytes the encoder emitted
                // downstream, tracked by the `CountingWriter` it wraps.
                let CountingWriter {
                    inner: mut sink,
                    size: compressed_size,
                } = encoder.finish()?;
                if let Some(entry) = self.entries.last_mut() {
                    entry.crc32 = crc;
                    entry.uncompressed_size = size;
                    entry.compressed_size = compressed_size;
                    self.offset +=
                        write_data_descriptor(&mut sink, crc, compressed_size, size)?;
                }
                self.sink = Writing::None;
                Ok(sink)
            }
        }
    }

    /// Finalizes the archive: closes out the last member and writes the
    /// central directory and end-of-central-directory record.
    pub fn finish(mut self) -> io::Result<W> {
        let mut writer = self.finish_current()?;
        let central_dir_offset = self.offset;

        for entry in &self.entries {
            self.offset += write_central_dir_header(&mut writer, entry)?;
        }
        let central_dir_size = self.offset - central_dir_offset;

        write_eocd(
            &mut writer,
            self.entries.len() as u16,
            central_dir_size,
            central_dir_offset,
        )?;
        Ok(writer)
    }
}

impl<W: Write> Write for ZipWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match &mut self.sink {
            Writing::Stored { out, crc, size } => {
                let n = out.write(buf)?;
                *crc = crc32_update(*crc, &buf[..n]);
                *size += n as u64;
                Ok(n)
            }
            Writing::Deflate { encoder, crc, size } => {
                let n = encoder.write(buf)?;
                *crc = crc32_update(*crc, &buf[..n]);
                *size += n as u64;
                Ok(n)
            }
            Writing::None => Err(invalid_data("ZipWriter::write called before start_file")),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match &mut self.sink {
            Writing::Stored { out, .. } => out.flush(),
            Writing::Deflate { encoder, .. } => encoder.flush(),
            Writing::None => Ok(()),
        }
    }
}

fn write_local_file_header<W: Write>(w: &mut W, name: &str, method: Method) -> io::Result<u64> {
    let name_bytes = name.as_bytes();
    let mut header = Vec::with_capacity(30 + name_bytes.len());
    header.extend_from_slice(&LOCAL_FILE_HEADER_SIG.to_le_bytes());
    header.extend_from_slice(&20u16.to_le_bytes()); // version needed to extract
    header.extend_from_slice(&FLAG_DEFERRED_CRC.to_le_bytes());
    header.extend_from_slice(&method.code().to_le_bytes());
    header.extend_from_slice(&0u16.to_le_bytes()); // mod time
    header.extend_from_slice(&0u16.to_le_bytes()); // mod date
    header.extend_from_slice(&0u32.to_le_bytes()); // crc-32 (deferred)
    header.extend_from_slice(&0u32.to_le_bytes()); // compressed size (deferred)
    header.extend_from_slice(&0u32.to_le_bytes()); // uncompressed size (deferred)
    header.extend_from_slice(&(name_bytes.len() as u16).to_le_bytes());
    header.extend_from_slice(&0u16.to_le_bytes()); // extra field length
    header.extend_from_slice(name_bytes);
    w.write_all(&header)?;
    Ok(header.len() as u64)
}

fn write_data_descriptor<W: Write>(
    w: &mut W,
    crc: u32,
    compressed_size: u64,
    uncompressed_size: u64,
) -> io::Result<u64> {
    let mut buf = Vec::with_capacity(16);
    buf.extend_from_slice(&DATA_DESCRIPTOR_SIG.to_le_bytes());
    buf.extend_from_slice(&crc.to_le_bytes());
    buf.extend_from_slice(&(compressed_size as u32).to_le_bytes());
    buf.extend_from_slice(&(uncompressed_size as u32).to_le_bytes());
    w.write_all(&buf)?;
    Ok(buf.len() as u64)
}

fn write_central_dir_header<W: Write>(w: &mut W, entry: &PendingEntry) -> io::Result<u64> {
    let name_bytes = entry.name.as_bytes();
    let mut header = Vec::with_capacity(46 + name_bytes.len());
    header.extend_from_slice(&CENTRAL_DIR_HEADER_SIG.to_le_bytes());
    header.extend_from_slice(&20u16.to_le_bytes()); // version made by
    header.extend_from_slice(&20u16.to_le_bytes()); // version needed
    header.extend_from_slice(&FLAG_DEFERRED_CRC.to_le_bytes());
    header.extend_from_slice(&entry.method.code().to_le_bytes());
    header.extend_from_slice(&0u16.to_le_bytes()); // mod time
    header.extend_from_slice(&0u16.to_le_bytes()); // mod date
    header.extend_from_slice(&entry.crc32.to_le_bytes());
    header.extend_from_slice(&(entry.compressed_size as u32).to_le_bytes());
    header.extend_from_slice(&(entry.uncompressed_size as u32).to_le_bytes());
    header.extend_from_slice(&(name_bytes.len() as u16).to_le_bytes());
    header.extend_from_slice(&0u16.to_le_bytes()); // extra field length
    header.extend_from_slice(&0u16.to_le_bytes()); // comment length
    header.extend_from_slice(&0u16.to_le_bytes()); // disk number start
    header.extend_from_slice(&0u16.to_le_bytes()); // internal attributes
    header.extend_from_slice(&0u32.to_le_bytes()); // external attributes
    header.extend_from_slice(&(entry.local_header_offset as u32).to_le_bytes());
    header.extend_from_slice(name_bytes);
    w.write_all(&header)?;
    Ok(header.len() as u64)
}

fn write_eocd<W: Write>(
    w: &mut W,
    entry_count: u16,
    central_dir_size: u64,
    central_dir_offset: u64,
) -> io::Result<()> {
    let mut buf = Vec::with_capacity(22);
    buf.extend_from_slice(&EOCD_SIG.to_le_bytes());
    buf.extend_from_slice(&0u16.to_le_bytes()); // disk number
    buf.extend_from_slice(&0u16.to_le_bytes()); // disk with central dir
    buf.extend_from_slice(&entry_count.to_le_bytes());
    buf.extend_from_slice(&entry_count.to_le_bytes());
    buf.extend_from_slice(&(central_dir_size as u32).to_le_bytes());
    buf.extend_from_slice(&(central_dir_offset as u32).to_le_bytes());
    buf.extend_from_slice(&0u16.to_le_bytes()); // comment length
    w.write_all(&buf)
}

/// One member's directory metadata, as recorded in the central directory.
#[derive(Clone, Debug)]
struct CentralDirEntry {
    name: String,
    method: Method,
    crc32: u32,
    compressed_size: u64,
    uncompressed_size: u64,
    local_header_offset: u64,
}

/// A lazily-accessed ZIP archive: the central directory is parsed up front,
/// but member data is only read (and CRC-checked) when requested via
/// [by_name](Self::by_name).
pub struct ZipArchive<R> {
    reader: R,
    entries: Vec<CentralDirEntry>,
}

impl<R: Read + Seek> ZipArchive<R> {
    pub fn new(mut reader: R) -> io::Result<Self> {
        let (central_dir_offset, entry_count) = find_eocd(&mut reader)?;
        reader.seek(SeekFrom::Start(central_dir_offset))?;
        let mut entries = Vec::with_capacity(entry_count as usize);
        for _ in 0..entry_count {
            entries.push(read_central_dir_entry(&mut reader)?);
        }
        Ok(Self { reader, entries })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|entry| entry.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Reads and fully decompresses the member named `name`, verifying its
    /// CRC-32 against the value recorded in the central directory.  Returns
    /// a distinguishable [ErrorKind::InvalidData] "integrity" error on
    /// mismatch.
    pub fn read(&mut self, name: &str) -> io::Result<Vec<u8>> {
        let entry = self
            .entries
            .iter()
            .find(|entry| entry.name == name)
            .ok_or_else(|| Error::new(ErrorKind::NotFound, format!("no such member: {name}")))?
            .clone();

        self.reader
            .seek(SeekFrom::Start(entry.local_header_offset))?;
        let data_offset = skip_local_file_header(&mut self.reader)?;
        self.reader
            .seek(SeekFrom::Start(entry.local_header_offset + data_offset))?;

        let mut compressed = vec![0; entry.compressed_size as usize];
        self.reader.read_exact(&mut compressed)?;

        let data = match entry.method {
            Method::Stored => compressed,
            Method::Deflate => {
                let mut decoder = DeflateDecoder::new(compressed.as_slice());
                let mut data = Vec::with_capacity(entry.uncompressed_size as usize);
                decoder.read_to_end(&mut data)?;
                data
            }
        };

        if crc32(&data) != entry.crc32 {
            return Err(invalid_data(format!(
                "member {name} failed CRC-32 integrity check"
            )));
        }
        Ok(data)
    }
}

/// Scans backward from the end of the stream for the end-of-central-directory
/// record, as ZIP readers must (a trailing archive comment of unknown length
/// means the record cannot be found by scanning forward).  Returns the
/// central directory's offset and entry count.
fn find_eocd<R: Read + Seek>(reader: &mut R) -> io::Result<(u64, u16)> {
    let file_len = reader.seek(SeekFrom::End(0))?;
    let search_len = file_len.min(22 + 0xffff);
    let start = file_len - search_len;
    reader.seek(SeekFrom::Start(start))?;
    let mut buf = vec![0; search_len as usize];
    reader.read_exact(&mut buf)?;

    for i in (0..=buf.len().saturating_sub(22)).rev() {
        if buf[i..i + 4] == EOCD_SIG.to_le_bytes() {
            let central_dir_size = u32::from_le_bytes(buf[i + 12..i + 16].try_into().unwrap());
            let central_dir_offset = u32::from_le_bytes(buf[i + 16..i + 20].try_into().unwrap());
            let entry_count = u16::from_le_bytes(buf[i + 10..i + 12].try_into().unwrap());
            let _ = central_dir_size;
            return Ok((central_dir_offset as u64, entry_count));
        }
    }
    Err(invalid_data(
        "end-of-central-directory record not found: not a ZIP archive",
    ))
}

fn read_central_dir_entry<R: Read>(r: &mut R) -> io::Result<CentralDirEntry> {
    let mut fixed = [0u8; 46];
    r.read_exact(&mut fixed)?;
    if u32::from_le_bytes(fixed[0..4].try_into().unwrap()) != CENTRAL_DIR_HEADER_SIG {
        return Err(invalid_data("bad central directory header signature"));
    }
    let method = Method::from_code(u16::from_le_bytes(fixed[10..12].try_into().unwrap()))?;
    let crc32 = u32::from_le_bytes(fixed[16..20].try_into().unwrap());
    let compressed_size = u32::from_le_bytes(fixed[20..24].try_into().unwrap()) as u64;
    let uncompressed_size = u32::from_le_bytes(fixed[24..28].try_into().unwrap()) as u64;
    let name_len = u16::from_le_bytes(fixed[28..30].try_into().unwrap()) as usize;
    let extra_len = u16::from_le_bytes(fixed[30..32].try_into().unwrap()) as usize;
    let comment_len = u16::from_le_bytes(fixed[32..34].try_into().unwrap()) as usize;
    let local_header_offset = u32::from_le_bytes(fixed[42..46].try_into().unwrap()) as u64;

    let mut name = vec![0; name_len];
    r.read_exact(&mut name)?;
    let mut rest = vec![0; extra_len + comment_len];
    r.read_exact(&mut rest)?;

    Ok(CentralDirEntry {
        name: String::from_utf8(name).map_err(|_| invalid_data("non-UTF-8 member name"))?,
        method,
        crc32,
        compressed_size,
        uncompressed_size,
        local_header_offset,
    })
}

/// Reads past a local file header (whose name/extra field lengths can differ
/// from the central directory's, though PSPP never writes them that way)
/// and returns the header's total length.
fn skip_local_file_header<R: Read>(r: &mut R) -> io::Result<u64> {
    let mut fixed = [0u8; 30];
    r.read_exact(&mut fixed)?;
    if u32::from_le_bytes(fixed[0..4].try_into().unwrap()) != LOCAL_FILE_HEADER_SIG {
        return Err(invalid_data("bad local file header signature"));
    }
    let name_len = u16::from_le_bytes(fixed[26..28].try_into().unwrap()) as u64;
    let extra_len = u16::from_le_bytes(fixed[28..30].try_into().unwrap()) as u64;
    Ok(30 + name_len + extra_len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn crc32_matches_known_vector() {
        assert_eq!(crc32(b"123456789"), 0xcbf4_3926);
    }

    #[test]
    fn round_trips_stored_and_deflated_members() {
        let mut buf = Vec::new();
        {
            let mut writer = ZipWriter::new(Cursor::new(&mut buf));
            writer
                .start_file(
                    "META-INF/MANIFEST.MF",
                    FileOptions {
                        method: Method::Stored,
                    },
                )
                .unwrap();
            writer.write_all(b"allowPivoting=true").unwrap();
            writer
                .start_file(
                    "data.bin",
                    FileOptions {
                        method: Method::Deflate,
                    },
                )
                .unwrap();
            writer.write_all(&[0u8; 4096]).unwrap();
            writer.write_all(b"tail").unwrap();
            writer.finish().unwrap();
        }

        let mut archive = ZipArchive::new(Cursor::new(&buf)).unwrap();
        assert_eq!(archive.len(), 2);
        assert_eq!(
            archive.read("META-INF/MANIFEST.MF").unwrap(),
            b"allowPivoting=true"
        );
        let mut expected = vec![0u8; 4096];
        expected.extend_from_slice(b"tail");
        assert_eq!(archive.read("data.bin").unwrap(), expected);
    }

    #[test]
    fn rejects_corrupted_member() {
        let mut buf = Vec::new();
        {
            let mut writer = ZipWriter::new(Cursor::new(&mut buf));
            writer
                .start_file("x", FileOptions::default())
                .unwrap();
            writer.write_all(b"hello world").unwrap();
            writer.finish().unwrap();
        }
        // Flip a bit in the compressed data region, well past all headers.
        let flip_at = buf.len() - 8;
        buf[flip_at] ^= 0xff;

        let mut archive = ZipArchive::new(Cursor::new(&buf)).unwrap();
        match archive.read("x") {
            Err(e) if e.kind() == ErrorKind::InvalidData => {}
            other => panic!("expected an integrity error, got {other:?}"),
        }
    }

    #[test]
    fn every_member_flagged_for_data_descriptor_on_non_seekable_sink() {
        // A plain Vec<u8> is Write but not Seek, modeling a pipe.
        struct NotSeekable(Vec<u8>);
        impl Write for NotSeekable {
            fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
                self.0.write(buf)
            }
            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        let mut writer = ZipWriter::new(NotSeekable(Vec::new()));
        for name in ["a", "b", "c"] {
            writer.start_file(name, FileOptions::default()).unwrap();
            writer.write_all(name.as_bytes()).unwrap();
        }
        let NotSeekable(buf) = writer.finish().unwrap();

        // Every local file header must carry the deferred-CRC flag bit.
        let mut pos = 0;
        let mut seen = 0;
        while pos + 4 <= buf.len() {
            if buf[pos..pos + 4] == LOCAL_FILE_HEADER_SIG.to_le_bytes() {
                let flags = u16::from_le_bytes(buf[pos + 6..pos + 8].try_into().unwrap());
                assert_eq!(flags & FLAG_DEFERRED_CRC, FLAG_DEFERRED_CRC);
                seen += 1;
            }
            pos += 1;
        }
        assert_eq!(seen, 3);

        let mut archive = ZipArchive::new(Cursor::new(&buf)).unwrap();
        assert_eq!(archive.len(), 3);
        for name in ["a", "b", "c"] {
            assert_eq!(archive.read(name).unwrap(), name.as_bytes());
        }
    }
}
