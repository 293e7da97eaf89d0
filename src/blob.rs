//! Content of the blobs stored remotely
//!
//! A blob holds either a single bucket (a fraction of an oversized bucket) or
//! a run of buckets (a whole level or a fraction of it). The shape is decided
//! once, when the fetched bytes are decoded.

use serde::{Deserialize, Serialize};

use crate::base::{Bucket, DocId, Len};
use crate::error::{Error, Result};
use crate::location::Location;
use crate::utils::buffer::{estimate_size, to_spaced_vec};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(untagged)]
pub enum BlobContent {
    /// A sequence of document IDs
    Bucket(Bucket),
    /// A sequence of buckets
    Level(Vec<Bucket>),
}

impl BlobContent {
    /// Decodes fetched bytes
    ///
    /// Content whose first element is a document ID (or that is empty) is a
    /// bucket, otherwise it is a sequence of buckets.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        serde_json::from_slice(data).map_err(|e| Error::MalformedBlob(e.to_string()))
    }

    /// Encodes the content as it is uploaded
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        to_spaced_vec(self)
    }

    /// Size of the encoded content in bytes
    pub fn encoded_size(&self) -> Result<usize> {
        estimate_size(self)
    }

    /// The bucket a location points into
    pub fn bucket(&self, bucket_index: Option<usize>) -> Result<&[DocId]> {
        match (self, bucket_index) {
            (BlobContent::Bucket(bucket), _) => Ok(bucket),
            (BlobContent::Level(buckets), Some(b)) => buckets
                .get(b)
                .map(|bucket| bucket.as_slice())
                .ok_or_else(|| {
                    Error::MalformedBlob(format!(
                        "bucket {} requested from a blob of {} buckets",
                        b,
                        buckets.len()
                    ))
                }),
            (BlobContent::Level(_), None) => Err(Error::MalformedBlob(
                "a blob of buckets was fetched for a location without bucket index".to_string(),
            )),
        }
    }

    /// Extracts the chunk a remote location points to
    ///
    /// The chunk must lie within the bucket.
    pub fn chunk(&self, location: &Location) -> Result<&[DocId]> {
        let bucket = self.bucket(location.bucket_index())?;
        let range = location.range();
        if range.end > bucket.len() {
            return Err(Error::MalformedBlob(format!(
                "chunk {}..{} requested from a bucket of {} identifiers",
                range.start,
                range.end,
                bucket.len()
            )));
        }
        Ok(&bucket[range])
    }
}

impl Len for BlobContent {
    /// Number of document IDs or buckets
    fn len(&self) -> usize {
        match self {
            BlobContent::Bucket(bucket) => bucket.len(),
            BlobContent::Level(buckets) => buckets.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bucket(ids: &[&str]) -> Bucket {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_decode_shape() {
        let content = BlobContent::from_bytes(br#"["a", "b"]"#).unwrap();
        assert_eq!(content, BlobContent::Bucket(bucket(&["a", "b"])));

        let content = BlobContent::from_bytes(br#"[[], ["a"]]"#).unwrap();
        assert_eq!(
            content,
            BlobContent::Level(vec![bucket(&[]), bucket(&["a"])])
        );

        assert!(matches!(
            BlobContent::from_bytes(b"{\"a\": 1}"),
            Err(Error::MalformedBlob(_))
        ));
    }

    #[test]
    fn test_chunk() {
        let level = BlobContent::Level(vec![bucket(&["a"]), bucket(&["b", "c", "d"])]);
        let location = Location::remote("r", Some(1), 1, 2);
        assert_eq!(level.chunk(&location).unwrap(), &bucket(&["c", "d"])[..]);

        let location = Location::remote("r", Some(5), 0, 1);
        assert!(level.chunk(&location).is_err());

        // A bucket blob ignores the bucket index
        let content = BlobContent::Bucket(bucket(&["x", "y"]));
        let location = Location::remote("r", None, 1, 1);
        assert_eq!(content.chunk(&location).unwrap(), &bucket(&["y"])[..]);
    }

    #[test]
    fn test_chunk_past_bucket_end() {
        let content = BlobContent::Bucket(bucket(&["x", "y"]));

        let location = Location::remote("r", None, 1, 2);
        assert!(matches!(
            content.chunk(&location),
            Err(Error::MalformedBlob(_))
        ));

        let location = Location::remote("r", None, 5, 0);
        assert!(matches!(
            content.chunk(&location),
            Err(Error::MalformedBlob(_))
        ));

        let location = Location::remote("r", None, 2, 0);
        assert!(content.chunk(&location).unwrap().is_empty());

        let level = BlobContent::Level(vec![bucket(&["a"]), bucket(&["b", "c"])]);
        let location = Location::remote("r", Some(0), 0, 2);
        assert!(matches!(
            level.chunk(&location),
            Err(Error::MalformedBlob(_))
        ));
    }

    #[test]
    fn test_bytes() {
        let level = BlobContent::Level(vec![bucket(&["a"]), bucket(&[])]);
        let data = level.to_bytes().unwrap();
        assert_eq!(data, br#"[["a"], []]"#.to_vec());
        assert_eq!(level.encoded_size().unwrap(), data.len());
        assert_eq!(BlobContent::from_bytes(&data).unwrap(), level);
    }
}
