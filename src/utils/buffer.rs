//! Byte-level helpers for the blob encoding
//!
//! Blobs are JSON arrays whose elements are separated by `", "`. The same
//! formatter is used to write blobs and to measure them, so a size measured
//! while splitting is the size of the uploaded bytes.

use std::io::{self, Write};

use serde::Serialize;
use serde_json::ser::{Formatter, Serializer};

use crate::error::Result;

/// JSON formatter separating array elements and object entries with a space
#[derive(Clone, Copy, Default)]
pub struct SpacedFormatter;

impl Formatter for SpacedFormatter {
    fn begin_array_value<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_key<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_value<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        writer.write_all(b": ")
    }
}

/// A writer that only records how many bytes went through it
#[derive(Default)]
pub struct CountingBuffer {
    size: usize,
}

impl CountingBuffer {
    pub fn new() -> Self {
        Self { size: 0 }
    }

    pub fn size(&self) -> usize {
        self.size
    }
}

impl Write for CountingBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.size += buf.len();
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Writes a value with the blob encoding
pub fn write_spaced<W: Write, T: Serialize + ?Sized>(writer: W, value: &T) -> Result<()> {
    let mut serializer = Serializer::with_formatter(writer, SpacedFormatter);
    value.serialize(&mut serializer)?;
    Ok(())
}

/// Encodes a value with the blob encoding
pub fn to_spaced_vec<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    let mut data = Vec::new();
    write_spaced(&mut data, value)?;
    Ok(data)
}

/// Size in bytes of the blob encoding of a value, without materializing it
pub fn estimate_size<T: Serialize + ?Sized>(value: &T) -> Result<usize> {
    let mut counter = CountingBuffer::new();
    write_spaced(&mut counter, value)?;
    Ok(counter.size())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    const EVENT_ID: &str = "$A0TaO8FhcLKym6An3fSnA_rU1P9oODG5JxNjLomITVE";

    fn ids(n: usize) -> Vec<String> {
        vec![EVENT_ID.to_string(); n]
    }

    #[test]
    fn test_estimate_size() {
        let empty: Vec<Vec<String>> = vec![Vec::new(); 13];
        assert_eq!(estimate_size(&empty).unwrap(), 52);

        let mut singleton = vec![ids(1)];
        singleton.extend(vec![Vec::new(); 9]);
        assert_eq!(estimate_size(&singleton).unwrap(), 86);

        assert_eq!(estimate_size(&vec![ids(2); 5]).unwrap(), 490);
        assert_eq!(estimate_size(&ids(0)).unwrap(), 2);
        assert_eq!(estimate_size(&ids(1)).unwrap(), 48);
        assert_eq!(estimate_size(&ids(7)).unwrap(), 336);
    }

    #[test]
    fn test_estimate_size_error() {
        // Maps whose keys are not strings cannot be encoded
        let mut map = std::collections::BTreeMap::new();
        map.insert((0, 1), ids(1));

        assert!(matches!(estimate_size(&map), Err(Error::Serialization(_))));
        assert!(matches!(to_spaced_vec(&map), Err(Error::Serialization(_))));
    }

    #[test]
    fn test_estimate_matches_encoding() {
        let level = vec![ids(3), ids(0), ids(1)];
        let data = to_spaced_vec(&level).unwrap();
        assert_eq!(data.len(), estimate_size(&level).unwrap());
        assert!(data.starts_with(b"[[\"$A0Ta"));

        let small = vec![vec!["a".to_string(), "b".to_string()], vec![]];
        assert_eq!(to_spaced_vec(&small).unwrap(), b"[[\"a\", \"b\"], []]".to_vec());
    }
}
