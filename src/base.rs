use std::collections::{BTreeMap, BTreeSet};
use std::{fs::File, path::Path};

use log::info;

use crate::error::{Error, Result};
use crate::index::EncryptedIndex;
use crate::location::{Location, SerializedLocation};

pub type DocId = String;
pub type Keyword = String;
pub type BlobReference = String;
pub type LevelIndex = u32;

/// An ordered run of document IDs, filled during distribution
pub type Bucket = Vec<DocId>;

/// Document ID => normalized keywords of the document
pub type Corpus = BTreeMap<DocId, BTreeSet<Keyword>>;

/// Keyword => documents containing it
pub type InvertedIndex = BTreeMap<Keyword, BTreeSet<DocId>>;

/// Level index => buckets of the level
pub type Datastore = BTreeMap<LevelIndex, Vec<Bucket>>;

/// Keyword => locations of the chunks of its posting list
pub type LookupTable = BTreeMap<Keyword, Vec<Location>>;

pub const INDEX_CBOR: &str = "index.cbor";

/// Marks object that have a length
pub trait Len {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Loads an index saved with [save_index] from a folder
pub fn load_index(path: &Path) -> Result<EncryptedIndex> {
    let info_path = path.join(INDEX_CBOR);
    let info_file = File::options().read(true).open(info_path)?;

    let index: EncryptedIndex = ciborium::de::from_reader(info_file)?;
    info!(
        "Loaded index from {} ({} levels, {} keywords)",
        path.display(),
        index.levels().len(),
        index.lookup_table().len()
    );
    Ok(index)
}

/// Saves a whole index (datastore and lookup table) into a folder
pub fn save_index(index: &EncryptedIndex, path: &Path) -> Result<()> {
    let info_path = path.join(INDEX_CBOR);

    let info_file = File::options()
        .write(true)
        .truncate(true)
        .create(true)
        .open(info_path)?;

    ciborium::ser::into_writer(index, info_file)?;
    info!("Saved index into {}", path.display());

    Ok(())
}

/// Fails unless every location of the lookup tables points to a blob
pub fn ensure_remote(lookup_tables: &[LookupTable]) -> Result<()> {
    let local = lookup_tables
        .iter()
        .flat_map(|lookup_table| lookup_table.values().flatten())
        .any(|location| !location.is_remote());

    if local {
        return Err(Error::RemoteLocationExpected);
    }
    Ok(())
}

/// Serializes a lookup table into JSON
pub fn lookup_table_to_json(lookup_table: &LookupTable) -> Result<String> {
    Ok(serde_json::to_string(lookup_table)?)
}

/// Deserializes a lookup table from JSON, validating every location
pub fn lookup_table_from_json(json: &str) -> Result<LookupTable> {
    let raw: BTreeMap<Keyword, Vec<SerializedLocation>> = serde_json::from_str(json)?;
    raw.into_iter()
        .map(|(keyword, locations)| {
            let locations = locations
                .into_iter()
                .map(Location::try_from)
                .collect::<Result<Vec<_>>>()?;
            Ok((keyword, locations))
        })
        .collect()
}
