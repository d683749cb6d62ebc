//! Cutting job input into line-aligned, size-bounded map units.

use std::path::Path;

use bytes::Bytes;
use serde::Serialize;
use tracing::debug;

use common::ihash;

use crate::error::{CoordinatorError, Result};
use crate::store::ChunkStore;

/// One input source of a job.
#[derive(Debug, Clone)]
pub struct InputFile {
    /// Name the input was submitted under, e.g. the uploaded file name.
    pub name: String,

    /// Raw contents.
    pub data: Bytes,
}

impl InputFile {
    pub fn new(name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
        }
    }

    /// Read an input from the local file system. The file name becomes
    /// the input name.
    pub async fn read_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = tokio::fs::read(path).await.map_err(|e| {
            CoordinatorError::Io(anyhow::Error::new(e).context(format!("failed to read {}", path.display())))
        })?;
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self::new(name, data))
    }
}

/// Reference to a chunk materialised in a [`ChunkStore`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ChunkRef {
    /// Key of the chunk in the store.
    pub key: String,

    /// Name of the input the chunk was cut from.
    pub source: String,

    /// Size of the chunk in bytes.
    pub len: usize,
}

/// Split `input` into consecutive line-aligned segments of at most
/// `max_bytes` bytes each.
///
/// A line is everything up to and including a `\n`, or the unterminated
/// remainder at the end of the input. A line longer than `max_bytes` is
/// never split and forms a segment of its own. The segments, concatenated
/// in order, are exactly `input`. The returned [`Bytes`] share `input`'s
/// buffer.
pub fn split_lines(input: &Bytes, max_bytes: usize) -> Vec<Bytes> {
    let mut segments = Vec::new();
    let mut start = 0;
    let mut end = 0;

    while end < input.len() {
        let line_end = match input[end..].iter().position(|&b| b == b'\n') {
            Some(offset) => end + offset + 1,
            None => input.len(),
        };

        if end > start && line_end - start > max_bytes {
            segments.push(input.slice(start..end));
            start = end;
        }
        end = line_end;
    }

    if end > start {
        segments.push(input.slice(start..end));
    }

    segments
}

/// Writes the chunks of a job's inputs into a store.
///
/// Chunk keys are `<generation>-<hash of input name>_<n>.txt`, with `n`
/// counting up from 1 across every input of the job so that two inputs with
/// the same name do not overwrite each other. The job generation keeps the
/// keys of consecutive jobs apart.
pub struct Chunker<'a, S> {
    store: &'a S,
    max_bytes: usize,
    generation: u64,
    next_index: usize,
    written: Vec<String>,
}

impl<'a, S: ChunkStore> Chunker<'a, S> {
    pub fn new(store: &'a S, max_bytes: usize, generation: u64) -> Result<Self> {
        if max_bytes == 0 {
            return Err(CoordinatorError::InvalidChunkSize);
        }
        Ok(Self {
            store,
            max_bytes,
            generation,
            next_index: 1,
            written: Vec::new(),
        })
    }

    /// Split one input and store its chunks, returning them in order.
    pub async fn chunk(&mut self, input: &InputFile) -> Result<Vec<ChunkRef>> {
        let prefix = format!("{:x}-{:08x}", self.generation, ihash(input.name.as_bytes()));
        let mut chunks = Vec::new();

        for segment in split_lines(&input.data, self.max_bytes) {
            let key = format!("{}_{}.txt", prefix, self.next_index);
            self.next_index += 1;

            let len = segment.len();
            self.store
                .put_chunk(&key, segment)
                .await
                .map_err(CoordinatorError::Io)?;
            self.written.push(key.clone());

            chunks.push(ChunkRef {
                key,
                source: input.name.clone(),
                len,
            });
        }

        debug!("input `{}` cut into {} chunks", input.name, chunks.len());
        Ok(chunks)
    }

    /// Keys of every chunk written so far.
    pub fn written(&self) -> &[String] {
        &self.written
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn check_segments(input: &str, max_bytes: usize) -> Vec<Bytes> {
        let input = Bytes::from(input.to_string());
        let segments = split_lines(&input, max_bytes);

        let joined: Vec<u8> = segments.iter().flat_map(|s| s.iter().copied()).collect();
        assert_eq!(joined, input.to_vec(), "segments must reproduce the input");

        for (i, segment) in segments.iter().enumerate() {
            assert!(!segment.is_empty());
            let is_last = i == segments.len() - 1;
            if !is_last {
                assert_eq!(segment.last(), Some(&b'\n'), "segments end on a line boundary");
            }
            if segment.len() > max_bytes {
                let lines = segment.split_inclusive(|&b| b == b'\n').count();
                assert_eq!(lines, 1, "only a single over-long line may exceed the bound");
            }
        }

        segments
    }

    #[test]
    fn small_input_is_one_segment() {
        let segments = check_segments("the cat sat on the mat", 500);
        assert_eq!(segments, vec![Bytes::from("the cat sat on the mat")]);
    }

    #[test]
    fn empty_input_has_no_segments() {
        assert!(check_segments("", 10).is_empty());
    }

    #[test]
    fn lines_are_packed_up_to_the_bound() {
        let segments = check_segments("aa\nbb\ncc\ndd\n", 6);
        assert_eq!(
            segments,
            vec![Bytes::from("aa\nbb\n"), Bytes::from("cc\ndd\n")]
        );
    }

    #[test]
    fn over_long_line_is_kept_whole() {
        let segments = check_segments("a\nthis line is long\nb\n", 4);
        assert_eq!(
            segments,
            vec![
                Bytes::from("a\n"),
                Bytes::from("this line is long\n"),
                Bytes::from("b\n"),
            ]
        );
    }

    #[test]
    fn unterminated_last_line() {
        let segments = check_segments("one\ntwo\nthree", 8);
        assert_eq!(segments, vec![Bytes::from("one\ntwo\n"), Bytes::from("three")]);
    }

    #[test]
    fn lossless_over_many_shapes() {
        let inputs = [
            "\n\n\n",
            "x",
            "word\n",
            "the quick brown fox\njumps over\nthe lazy dog\n\nand again\n",
            "no newline at all but quite long indeed",
            "a\nbb\nccc\ndddd\neeeee\nffffff\n",
        ];
        for input in inputs {
            for max_bytes in 1..=24 {
                check_segments(input, max_bytes);
            }
        }
    }

    #[test]
    fn zero_chunk_size_is_rejected() {
        let store = MemoryStore::new();
        assert!(matches!(
            Chunker::new(&store, 0, 1),
            Err(CoordinatorError::InvalidChunkSize)
        ));
    }

    #[tokio::test]
    async fn chunks_are_materialised_with_unique_keys() {
        let store = MemoryStore::new();
        let mut chunker = Chunker::new(&store, 4, 26).unwrap();

        let first = chunker.chunk(&InputFile::new("in.txt", "ab\ncd\n")).await.unwrap();
        let second = chunker.chunk(&InputFile::new("in.txt", "ef\n")).await.unwrap();

        let prefix = format!("1a-{:08x}", ihash(b"in.txt"));
        let keys: Vec<_> = first.iter().chain(&second).map(|c| c.key.clone()).collect();
        assert_eq!(
            keys,
            vec![
                format!("{prefix}_1.txt"),
                format!("{prefix}_2.txt"),
                format!("{prefix}_3.txt"),
            ]
        );
        assert_eq!(chunker.written(), keys.as_slice());
        assert_eq!(store.len(), 3);
        assert_eq!(store.get_chunk(&keys[1]).await.unwrap(), Bytes::from("cd\n"));
        assert_eq!(first[0].source, "in.txt");
        assert_eq!(first[0].len, 3);
    }

    #[tokio::test]
    async fn generations_do_not_share_keys() {
        let store = MemoryStore::new();
        let input = InputFile::new("in.txt", "ab\n");

        let first = Chunker::new(&store, 10, 1).unwrap().chunk(&input).await.unwrap();
        let second = Chunker::new(&store, 10, 2).unwrap().chunk(&input).await.unwrap();

        assert_ne!(first[0].key, second[0].key);
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn missing_input_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = InputFile::read_from_path(dir.path().join("nope.txt")).await;
        assert!(matches!(result, Err(CoordinatorError::Io(_))));
    }

    #[tokio::test]
    async fn input_file_takes_its_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("words.txt");
        std::fs::write(&path, "the cat\n").unwrap();

        let input = InputFile::read_from_path(&path).await.unwrap();
        assert_eq!(input.name, "words.txt");
        assert_eq!(input.data, Bytes::from("the cat\n"));
    }
}
