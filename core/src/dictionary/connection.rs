//! Connection costs between class ids and the semantic matrix.
//!
//! `cb/{lcid}.binary` holds one row of the connection matrix as
//! little-endian `(i32, f32)` pairs. The first pair is `(-1, default)`
//! and fills the row; the rest override single columns. Rows are loaded on
//! first use and memoized in an LRU cache, including rows that failed to
//! load.
use crate::word_class::{mid, CID_COUNT, MID_COUNT};
use lru::LruCache;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Cost used when a row or column is unavailable.
pub const CONNECTION_FALLBACK: f32 = -25.0;

type Row = Option<Arc<Vec<f32>>>;

pub struct ConnectionTable {
    dir: PathBuf,
    rows: Mutex<LruCache<usize, Row>>,
    mm: Vec<f32>,
    cache_hits: AtomicUsize,
    cache_misses: AtomicUsize,
}

impl ConnectionTable {
    /// `dir` is the dictionary root; `cache_capacity` is the number of rows
    /// kept in memory.
    pub fn new<P: AsRef<Path>>(dir: P, cache_capacity: usize) -> Self {
        let dir = dir.as_ref().to_path_buf();
        let mm = load_mm(&dir.join("mm.binary"));
        let capacity = NonZeroUsize::new(cache_capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            dir,
            rows: Mutex::new(LruCache::new(capacity)),
            mm,
            cache_hits: AtomicUsize::new(0),
            cache_misses: AtomicUsize::new(0),
        }
    }

    /// Row of connection costs for a left word ending in `former`.
    pub fn row(&self, former: usize) -> Row {
        if let Ok(mut rows) = self.rows.lock() {
            if let Some(row) = rows.get(&former) {
                self.cache_hits.fetch_add(1, Ordering::Relaxed);
                return row.clone();
            }
        }
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
        let row = self.load_row(former).map(Arc::new);
        if let Ok(mut rows) = self.rows.lock() {
            rows.put(former, row.clone());
        }
        row
    }

    /// Connection cost of `former` (right class id) followed by `latter`
    /// (left class id).
    pub fn cc_value(&self, former: usize, latter: usize) -> f32 {
        self.row(former)
            .and_then(|row| row.get(latter).copied())
            .unwrap_or(CONNECTION_FALLBACK)
    }

    /// Semantic connection of two meaning ids. Zero when either is the
    /// sentinel meaning id.
    pub fn mm_value(&self, former: usize, latter: usize) -> f32 {
        if former == mid::EOS || latter == mid::EOS {
            return 0.0;
        }
        self.mm
            .get(former * MID_COUNT + latter)
            .copied()
            .unwrap_or(0.0)
    }

    /// (hits, misses) of the row cache.
    pub fn cache_stats(&self) -> (usize, usize) {
        (
            self.cache_hits.load(Ordering::Relaxed),
            self.cache_misses.load(Ordering::Relaxed),
        )
    }

    fn load_row(&self, former: usize) -> Option<Vec<f32>> {
        let path = self.dir.join("cb").join(format!("{former}.binary"));
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!("connection row {} unavailable: {}", path.display(), e);
                return None;
            }
        };
        parse_row(&bytes)
    }
}

fn parse_row(bytes: &[u8]) -> Option<Vec<f32>> {
    let mut pairs = bytes.chunks_exact(8).map(|chunk| {
        let mut k = [0u8; 4];
        let mut v = [0u8; 4];
        k.copy_from_slice(&chunk[..4]);
        v.copy_from_slice(&chunk[4..]);
        (i32::from_le_bytes(k), f32::from_le_bytes(v))
    });
    let (first_key, default) = pairs.next()?;
    if first_key != -1 {
        tracing::warn!("connection row does not start with a default entry");
    }
    let mut line = vec![default; CID_COUNT];
    for (k, v) in pairs {
        if let Some(slot) = usize::try_from(k).ok().and_then(|k| line.get_mut(k)) {
            *slot = v;
        }
    }
    Some(line)
}

fn load_mm(path: &Path) -> Vec<f32> {
    match std::fs::read(path) {
        Ok(bytes) => bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect(),
        Err(e) => {
            tracing::warn!("{} unavailable, using a zero matrix: {}", path.display(), e);
            vec![0.0; MID_COUNT * MID_COUNT]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dictionary_builder::DictionaryBuilder;

    #[test]
    fn rows_fill_default_and_overrides() {
        let dir = std::env::temp_dir().join("kanakanji_connection_test");
        let _ = std::fs::remove_dir_all(&dir);
        DictionaryBuilder::write_connection_row(&dir, 3, -7.0, &[(10, -1.5)]).expect("row");
        let table = ConnectionTable::new(&dir, 4);
        assert_eq!(table.cc_value(3, 10), -1.5);
        assert_eq!(table.cc_value(3, 11), -7.0);
        // missing row
        assert_eq!(table.cc_value(4, 10), CONNECTION_FALLBACK);
        // out of range column
        assert_eq!(table.cc_value(3, CID_COUNT + 5), CONNECTION_FALLBACK);
        let (hits, misses) = table.cache_stats();
        assert_eq!((hits, misses), (2, 2));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_mm_is_zero() {
        let table = ConnectionTable::new(std::env::temp_dir().join("kanakanji_no_such_dir"), 2);
        assert_eq!(table.mm_value(1, 2), 0.0);
        assert_eq!(table.mm_value(mid::EOS, 2), 0.0);
    }
}
