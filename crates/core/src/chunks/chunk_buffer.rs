//! Reassembly of chunked position pushes.

use std::collections::{BTreeMap, HashMap};

use log::{debug, warn};

/// Chunks received so far for one portfolio.
#[derive(Debug, Clone)]
struct ChunkBufferEntry<T> {
    expected_chunk_count: usize,
    chunks: BTreeMap<i64, Vec<T>>,
}

impl<T> ChunkBufferEntry<T> {
    fn new(expected_chunk_count: usize) -> Self {
        Self {
            expected_chunk_count,
            chunks: BTreeMap::new(),
        }
    }
}

/// Collapses multi-part pushes into one ordered list per portfolio.
///
/// Chunks may arrive in any order; ordering is enforced when the set is
/// complete by concatenating indices `1..=chunk_count`. An index outside
/// that range still counts towards completeness but is never emitted.
#[derive(Debug)]
pub struct ChunkBuffer<T> {
    entries: HashMap<String, ChunkBufferEntry<T>>,
}

impl<T> Default for ChunkBuffer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ChunkBuffer<T> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Stores one chunk and returns the complete list once every chunk of
    /// the set has arrived.
    ///
    /// A missing, non-positive or single chunk count takes the single-shot
    /// path: any buffered set for the portfolio is discarded and `items`
    /// is returned as is.
    pub fn ingest(
        &mut self,
        portfolio_uuid: &str,
        chunk_index: Option<i64>,
        chunk_count: Option<i64>,
        items: Vec<T>,
    ) -> Option<Vec<T>> {
        let expected = match chunk_count {
            Some(count) if count > 1 => count as usize,
            _ => {
                if self.entries.remove(portfolio_uuid).is_some() {
                    debug!(
                        "Single-shot push for portfolio {} replaced a partial chunk set",
                        portfolio_uuid
                    );
                }
                return Some(items);
            }
        };

        let index = match chunk_index {
            Some(index) if index >= 1 => index,
            other => {
                warn!(
                    "Ignoring chunk with invalid index {:?} for portfolio {}",
                    other, portfolio_uuid
                );
                return None;
            }
        };

        let entry = self
            .entries
            .entry(portfolio_uuid.to_string())
            .or_insert_with(|| ChunkBufferEntry::new(expected));

        if entry.expected_chunk_count != expected {
            debug!(
                "Chunk count for portfolio {} changed from {} to {}, discarding {} buffered chunk(s)",
                portfolio_uuid,
                entry.expected_chunk_count,
                expected,
                entry.chunks.len()
            );
            *entry = ChunkBufferEntry::new(expected);
        }

        entry.chunks.insert(index, items);

        if entry.chunks.len() < entry.expected_chunk_count {
            debug!(
                "Buffered chunk {}/{} for portfolio {} ({} received)",
                index,
                expected,
                portfolio_uuid,
                entry.chunks.len()
            );
            return None;
        }

        let mut entry = self.entries.remove(portfolio_uuid)?;
        let mut complete = Vec::new();
        for position in 1..=entry.expected_chunk_count as i64 {
            if let Some(chunk) = entry.chunks.remove(&position) {
                complete.extend(chunk);
            }
        }
        debug!(
            "Reassembled {} chunk(s) for portfolio {} into {} item(s)",
            expected,
            portfolio_uuid,
            complete.len()
        );
        Some(complete)
    }

    /// Drops any partial set for the portfolio. Returns true if one existed.
    pub fn discard(&mut self, portfolio_uuid: &str) -> bool {
        self.entries.remove(portfolio_uuid).is_some()
    }

    /// Portfolios with an incomplete chunk set, with `(received, expected)`.
    pub fn pending_portfolios(&self) -> Vec<(String, usize, usize)> {
        let mut pending: Vec<(String, usize, usize)> = self
            .entries
            .iter()
            .map(|(uuid, entry)| (uuid.clone(), entry.chunks.len(), entry.expected_chunk_count))
            .collect();
        pending.sort();
        pending
    }

    pub fn is_pending(&self, portfolio_uuid: &str) -> bool {
        self.entries.contains_key(portfolio_uuid)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
