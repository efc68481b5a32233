use std::fmt;

/// Opaque archive record identifier as returned by the listing call.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identifier(String);

impl Identifier {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Identifier {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for Identifier {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// An ordered group of identifiers fetched together in one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    index: usize,
    ids: Vec<Identifier>,
}

impl Batch {
    pub fn new(index: usize, ids: Vec<Identifier>) -> Self {
        Self { index, ids }
    }

    /// Position of this batch in the original chunking order.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn ids(&self) -> &[Identifier] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Comma-joined form used by the fetch endpoint.
    pub fn joined(&self) -> String {
        self.ids
            .iter()
            .map(Identifier::as_str)
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Splits identifiers into consecutive batches of `size`, keeping input order.
///
/// Every batch but the last holds exactly `size` identifiers. An empty input
/// produces no batches at all, so no worker is ever started for nothing.
/// A `size` of zero is treated as one.
pub fn chunk_ids(ids: &[Identifier], size: usize) -> Vec<Batch> {
    let size = size.max(1);
    ids.chunks(size)
        .enumerate()
        .map(|(index, chunk)| Batch::new(index, chunk.to_vec()))
        .collect()
}
