//! Postings and posting lists keyed by term or spatial cell.

use std::cmp::Ordering;
use std::fmt;

use crate::DocId;

/// A single posting in a posting list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Posting {
    /// Document ID.
    pub doc_id: DocId,
    /// Occurrences of the key in the document.
    pub frequency: u32,
}

impl Posting {
    /// Create a posting with frequency 1.
    pub fn new(doc_id: DocId) -> Self {
        Posting {
            doc_id,
            frequency: 1,
        }
    }

    /// Create a posting with frequency.
    pub fn with_frequency(doc_id: DocId, frequency: u32) -> Self {
        Posting { doc_id, frequency }
    }
}

/// What posting lists are keyed by in one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    Term,
    Cell,
}

impl KeyKind {
    pub(crate) fn to_byte(self) -> u8 {
        match self {
            KeyKind::Term => 0,
            KeyKind::Cell => 1,
        }
    }

    pub(crate) fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(KeyKind::Term),
            1 => Some(KeyKind::Cell),
            _ => None,
        }
    }
}

/// Posting list key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PostingKey {
    Term(String),
    /// Geohash cell at the file's resolution.
    Cell(u64),
}

impl PostingKey {
    pub fn kind(&self) -> KeyKind {
        match self {
            PostingKey::Term(_) => KeyKind::Term,
            PostingKey::Cell(_) => KeyKind::Cell,
        }
    }
}

impl From<&str> for PostingKey {
    fn from(term: &str) -> Self {
        PostingKey::Term(term.to_string())
    }
}

impl fmt::Display for PostingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PostingKey::Term(term) => write!(f, "{term}"),
            PostingKey::Cell(cell) => write!(f, "cell:{cell:#x}"),
        }
    }
}

impl Ord for PostingKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (PostingKey::Term(a), PostingKey::Term(b)) => a.as_bytes().cmp(b.as_bytes()),
            (PostingKey::Cell(a), PostingKey::Cell(b)) => a.cmp(b),
            (PostingKey::Term(_), PostingKey::Cell(_)) => Ordering::Less,
            (PostingKey::Cell(_), PostingKey::Term(_)) => Ordering::Greater,
        }
    }
}

impl PartialOrd for PostingKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A posting list for one key, doc ids strictly ascending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostingList {
    pub key: PostingKey,
    pub postings: Vec<Posting>,
}

impl PostingList {
    /// Create a new empty posting list.
    pub fn new(key: PostingKey) -> Self {
        PostingList {
            key,
            postings: Vec::new(),
        }
    }

    /// Build from postings in any order, folding repeated doc ids by
    /// summing their frequencies.
    pub fn from_unsorted(key: PostingKey, mut postings: Vec<Posting>) -> Self {
        postings.sort_unstable_by_key(|p| p.doc_id);
        postings.dedup_by(|next, kept| {
            if next.doc_id == kept.doc_id {
                kept.frequency = kept.frequency.saturating_add(next.frequency);
                true
            } else {
                false
            }
        });
        PostingList { key, postings }
    }

    /// Append a posting; doc ids must arrive ascending.
    pub fn add_posting(&mut self, posting: Posting) {
        debug_assert!(
            self.postings
                .last()
                .is_none_or(|last| last.doc_id < posting.doc_id)
        );
        self.postings.push(posting);
    }

    /// Get the number of documents containing this key.
    pub fn len(&self) -> usize {
        self.postings.len()
    }

    /// Check if the posting list is empty.
    pub fn is_empty(&self) -> bool {
        self.postings.is_empty()
    }

    pub fn doc_ids(&self) -> Vec<DocId> {
        self.postings.iter().map(|p| p.doc_id).collect()
    }

    pub fn is_strictly_ascending(&self) -> bool {
        self.postings.windows(2).all(|w| w[0].doc_id < w[1].doc_id)
    }
}
