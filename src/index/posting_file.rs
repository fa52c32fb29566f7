//! On-disk posting file of one index in one segment.
//!
//! Layout (little-endian, via [`StructWriter`]):
//!
//! ```text
//! magic u32 | version u8 | key kind u8 | resolution u8
//! { 1u8 | key | varint count | (varint doc delta, varint frequency)* }*
//! 0u8
//! crc32 u32
//! ```
//!
//! Terms are length-prefixed UTF-8, cells are u64. Lists appear in strictly
//! ascending key order; the first doc id of a list is stored as-is, later
//! ones as the positive gap to their predecessor.

use crate::error::{Result, SegmergeError};
use crate::index::posting::{KeyKind, Posting, PostingKey, PostingList};
use crate::storage::{Storage, StorageInput, StorageOutput, StructReader, StructWriter};
use crate::DocId;

const MAGIC: u32 = 0x5347_504C;
const VERSION: u8 = 1;

const LIST_MARKER: u8 = 1;
const END_MARKER: u8 = 0;

/// What a posting file holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PostingFileHeader {
    pub key_kind: KeyKind,
    /// Geohash step of cell keys; 0 for terms.
    pub resolution: u8,
}

impl PostingFileHeader {
    pub fn text() -> Self {
        PostingFileHeader {
            key_kind: KeyKind::Term,
            resolution: 0,
        }
    }

    pub fn spatial(resolution: u8) -> Self {
        PostingFileHeader {
            key_kind: KeyKind::Cell,
            resolution,
        }
    }
}

/// Streams posting lists into a new file.
pub struct PostingFileWriter {
    writer: StructWriter<Box<dyn StorageOutput>>,
    header: PostingFileHeader,
    last_key: Option<PostingKey>,
    list_count: u64,
    posting_count: u64,
}

impl PostingFileWriter {
    pub fn create(storage: &dyn Storage, name: &str, header: PostingFileHeader) -> Result<Self> {
        let mut writer = StructWriter::new(storage.create_output(name)?);
        writer.write_u32(MAGIC)?;
        writer.write_u8(VERSION)?;
        writer.write_u8(header.key_kind.to_byte())?;
        writer.write_u8(header.resolution)?;

        Ok(PostingFileWriter {
            writer,
            header,
            last_key: None,
            list_count: 0,
            posting_count: 0,
        })
    }

    /// Append the next list. Keys must strictly increase, doc ids must
    /// strictly increase within the list, and the list must not be empty.
    pub fn write_list(&mut self, list: &PostingList) -> Result<()> {
        if list.key.kind() != self.header.key_kind {
            return Err(SegmergeError::index(format!(
                "{:?} key {} written to a {:?} posting file",
                list.key.kind(),
                list.key,
                self.header.key_kind
            )));
        }
        if self.last_key.as_ref().is_some_and(|last| *last >= list.key) {
            return Err(SegmergeError::index(format!(
                "posting key {} written out of order",
                list.key
            )));
        }
        if list.is_empty() || !list.is_strictly_ascending() {
            return Err(SegmergeError::index(format!(
                "posting list for {} is empty or not ascending",
                list.key
            )));
        }

        self.writer.write_u8(LIST_MARKER)?;
        match &list.key {
            PostingKey::Term(term) => self.writer.write_string(term)?,
            PostingKey::Cell(cell) => self.writer.write_u64(*cell)?,
        }
        self.writer.write_varint(list.len() as u64)?;

        let mut previous: Option<DocId> = None;
        for posting in &list.postings {
            let delta = match previous {
                Some(prev) => posting.doc_id - prev,
                None => posting.doc_id,
            };
            self.writer.write_varint(delta as u64)?;
            self.writer.write_varint(posting.frequency as u64)?;
            previous = Some(posting.doc_id);
        }

        self.list_count += 1;
        self.posting_count += list.len() as u64;
        self.last_key = Some(list.key.clone());
        Ok(())
    }

    pub fn list_count(&self) -> u64 {
        self.list_count
    }

    pub fn posting_count(&self) -> u64 {
        self.posting_count
    }

    /// Write the end marker and checksum and close the file.
    pub fn finish(mut self) -> Result<()> {
        self.writer.write_u8(END_MARKER)?;
        self.writer.close()
    }
}

/// Reads posting lists of a file one at a time, in key order.
pub struct PostingFileReader {
    reader: StructReader<Box<dyn StorageInput>>,
    name: String,
    header: PostingFileHeader,
    last_key: Option<PostingKey>,
    finished: bool,
}

impl PostingFileReader {
    pub fn open(storage: &dyn Storage, name: &str) -> Result<Self> {
        let mut reader = StructReader::new(storage.open_input(name)?)?;

        let magic = reader.read_u32()?;
        if magic != MAGIC {
            return Err(SegmergeError::corrupt(format!(
                "{name}: bad magic {magic:#010x}"
            )));
        }
        let version = reader.read_u8()?;
        if version != VERSION {
            return Err(SegmergeError::corrupt(format!(
                "{name}: unsupported version {version}"
            )));
        }
        let kind = reader.read_u8()?;
        let key_kind = KeyKind::from_byte(kind)
            .ok_or_else(|| SegmergeError::corrupt(format!("{name}: unknown key kind {kind}")))?;
        let resolution = reader.read_u8()?;

        Ok(PostingFileReader {
            reader,
            name: name.to_string(),
            header: PostingFileHeader {
                key_kind,
                resolution,
            },
            last_key: None,
            finished: false,
        })
    }

    pub fn header(&self) -> PostingFileHeader {
        self.header
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Next list, or `None` once the end marker is reached and the checksum
    /// verified.
    pub fn next_list(&mut self) -> Result<Option<PostingList>> {
        if self.finished {
            return Ok(None);
        }

        match self.reader.read_u8()? {
            LIST_MARKER => {}
            END_MARKER => {
                self.finished = true;
                if !self.reader.is_eof() {
                    return Err(self.corrupt("trailing bytes after end marker"));
                }
                if !self.reader.verify_checksum()? {
                    return Err(self.corrupt("checksum mismatch"));
                }
                return Ok(None);
            }
            other => return Err(self.corrupt(&format!("unknown marker {other}"))),
        }

        let key = match self.header.key_kind {
            KeyKind::Term => PostingKey::Term(self.reader.read_string()?),
            KeyKind::Cell => PostingKey::Cell(self.reader.read_u64()?),
        };
        if self.last_key.as_ref().is_some_and(|last| *last >= key) {
            return Err(self.corrupt(&format!("key {key} out of order")));
        }

        let count = self.reader.read_varint()?;
        // Every posting takes at least two bytes.
        if count == 0 || count > self.reader.remaining() / 2 {
            return Err(self.corrupt(&format!("implausible posting count {count} for {key}")));
        }

        let mut list = PostingList::new(key);
        list.postings.reserve(count as usize);
        let mut doc_id: u64 = 0;
        for i in 0..count {
            let delta = self.reader.read_varint()?;
            if i > 0 && delta == 0 {
                return Err(self.corrupt(&format!("repeated doc id in list {}", list.key)));
            }
            doc_id += delta;
            let doc = DocId::try_from(doc_id)
                .map_err(|_| self.corrupt(&format!("doc id {doc_id} out of range")))?;
            let frequency = u32::try_from(self.reader.read_varint()?)
                .map_err(|_| self.corrupt("frequency out of range"))?;
            list.postings.push(Posting::with_frequency(doc, frequency));
        }

        self.last_key = Some(list.key.clone());
        Ok(Some(list))
    }

    /// Read every remaining list.
    pub fn read_all(&mut self) -> Result<Vec<PostingList>> {
        let mut lists = Vec::new();
        while let Some(list) = self.next_list()? {
            lists.push(list);
        }
        Ok(lists)
    }

    fn corrupt(&self, detail: &str) -> SegmergeError {
        SegmergeError::corrupt(format!("{}: {detail}", self.name))
    }
}

/// Write `lists` (already in key order) as a complete file.
pub fn write_posting_file(
    storage: &dyn Storage,
    name: &str,
    header: PostingFileHeader,
    lists: &[PostingList],
) -> Result<()> {
    let mut writer = PostingFileWriter::create(storage, name, header)?;
    for list in lists {
        writer.write_list(list)?;
    }
    writer.finish()
}
