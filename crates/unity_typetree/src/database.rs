//! Persisted table of learned type schemas.
//!
//! Serialized files produced by release builds usually omit their type schemas. The database
//! maps `(class identifier, engine version)` pairs to trees learned from files that do embed
//! them, with approximate version matching when no exact pair is stored. It is advisory: lookup
//! misses and hash mismatches warn, they never fail a decode.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};
use tracing::{instrument, warn};

use crate::endian::{Endianness, ReadEndianExt, WriteEndianExt};
use crate::error::{Error, Result};
use crate::tree::{TypeNode, TypeTree};
use crate::version::UnityVersion;

/// Format tag of the persisted layout. Not forward compatible: a file with a different tag is
/// rejected on load.
pub const DATABASE_FORMAT_VERSION: u32 = 1;

const PERSIST_ENDIAN: Endianness = Endianness::Little;

/// One `(tree, class, version)` association.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct DatabaseEntry {
    tree: usize,
    class_id: i32,
    version: usize,
}

/// In-memory type database with a flat persisted form.
///
/// Trees and version strings are stored deduplicated; entries are index triples into those
/// tables. Deduplication is by structural equality of the whole tree.
#[derive(Debug, Default)]
pub struct TypeDatabase {
    trees: Vec<TypeTree>,
    versions: Vec<UnityVersion>,
    entries: Vec<DatabaseEntry>,
}

impl TypeDatabase {
    pub fn new() -> Self {
        TypeDatabase::default()
    }

    /// Number of `(class, version)` associations.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up a tree for `class_id` under `version`.
    ///
    /// With `exact` set, only an exact `(class, version)` pair matches. Otherwise matching falls
    /// back through three tiers: an entry whose major and minor version both match (first such
    /// entry wins, returned immediately), then an entry with a matching major version, then any
    /// entry for the class at all. The two fallback tiers keep the most recently seen candidate
    /// and are reported with a warning. No match is not an error.
    pub fn lookup(&self, class_id: i32, version: &UnityVersion, exact: bool) -> Option<&TypeTree> {
        if let Some(entry) = self
            .entries
            .iter()
            .find(|entry| entry.class_id == class_id && self.versions[entry.version] == *version)
        {
            return Some(&self.trees[entry.tree]);
        }

        if exact {
            return None;
        }

        let mut major_match: Option<&DatabaseEntry> = None;
        let mut any_match: Option<&DatabaseEntry> = None;

        for entry in self.entries.iter().filter(|e| e.class_id == class_id) {
            let candidate = &self.versions[entry.version];
            if candidate.major == version.major && candidate.minor == version.minor {
                return Some(&self.trees[entry.tree]);
            }
            if candidate.major == version.major {
                major_match = Some(entry);
            } else {
                any_match = Some(entry);
            }
        }

        if let Some(entry) = major_match {
            warn!(
                class_id,
                wanted = %version,
                using = %self.versions[entry.version],
                "imprecise type database match"
            );
            return Some(&self.trees[entry.tree]);
        }

        if let Some(entry) = any_match {
            warn!(
                class_id,
                wanted = %version,
                using = %self.versions[entry.version],
                "bad type database match, no entry shares the major version"
            );
            return Some(&self.trees[entry.tree]);
        }

        None
    }

    /// Record a schema observed in a file that embeds one.
    ///
    /// Returns whether a new `(class, version)` association was inserted. When an approximate
    /// match already exists, its structural hash is compared against the observed tree and a
    /// mismatch is logged; the database keeps its existing entry in that case only if the exact
    /// pair is already present.
    #[instrument(skip(self, tree), fields(%version))]
    pub fn learn(&mut self, class_id: i32, version: &UnityVersion, tree: &TypeTree) -> bool {
        if let Some(existing) = self.lookup(class_id, version, false) {
            if existing.structural_hash() != tree.structural_hash() {
                warn!(class_id, "schema hash differs from stored entry");
            }
        }

        let exists = self
            .entries
            .iter()
            .any(|entry| entry.class_id == class_id && self.versions[entry.version] == *version);
        if exists {
            return false;
        }

        let tree_index = match self.trees.iter().position(|candidate| candidate == tree) {
            Some(index) => index,
            None => {
                self.trees.push(tree.clone());
                self.trees.len() - 1
            }
        };
        let version_index = match self.versions.iter().position(|candidate| candidate == version) {
            Some(index) => index,
            None => {
                self.versions.push(version.clone());
                self.versions.len() - 1
            }
        };

        self.entries.push(DatabaseEntry {
            tree: tree_index,
            class_id,
            version: version_index,
        });
        true
    }

    /// Load the flat persisted table.
    #[instrument(skip(reader), err)]
    pub fn load<R: Read>(reader: &mut R) -> Result<TypeDatabase> {
        let tag = reader.read_u32::<LittleEndian>()?;
        if tag != DATABASE_FORMAT_VERSION {
            return Err(Error::DatabaseVersion(tag));
        }

        let tree_count = reader.read_u32::<LittleEndian>()?;
        let trees = (0..tree_count)
            .map(|_| read_tree(reader))
            .collect::<Result<Vec<_>>>()?;

        let version_count = reader.read_u32::<LittleEndian>()?;
        let versions = (0..version_count)
            .map(|_| reader.read_cstring()?.parse())
            .collect::<Result<Vec<_>>>()?;

        let entry_count = reader.read_u32::<LittleEndian>()?;
        let entries = (0..entry_count)
            .map(|_| {
                let tree = reader.read_u32::<LittleEndian>()? as usize;
                let class_id = reader.read_i32::<LittleEndian>()?;
                let version = reader.read_u32::<LittleEndian>()? as usize;

                if tree >= trees.len() || version >= versions.len() {
                    return Err(Error::Malformed(
                        "type database entry indexes out of range".into(),
                    ));
                }
                Ok(DatabaseEntry {
                    tree,
                    class_id,
                    version,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(TypeDatabase {
            trees,
            versions,
            entries,
        })
    }

    /// Save the flat persisted table.
    #[instrument(skip(self, writer), err)]
    pub fn save<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u32::<LittleEndian>(DATABASE_FORMAT_VERSION)?;

        writer.write_u32::<LittleEndian>(self.trees.len() as u32)?;
        for tree in &self.trees {
            write_tree(writer, tree)?;
        }

        writer.write_u32::<LittleEndian>(self.versions.len() as u32)?;
        for version in &self.versions {
            writer.write_cstring(&version.to_string())?;
        }

        writer.write_u32::<LittleEndian>(self.entries.len() as u32)?;
        for entry in &self.entries {
            writer.write_u32::<LittleEndian>(entry.tree as u32)?;
            writer.write_i32::<LittleEndian>(entry.class_id)?;
            writer.write_u32::<LittleEndian>(entry.version as u32)?;
        }

        Ok(())
    }
}

fn read_tree<R: Read>(reader: &mut R) -> Result<TypeTree> {
    let node_count = reader.read_u32::<LittleEndian>()?;

    let records = (0..node_count)
        .map(|_| {
            let level = reader.read_u8()?;
            let mut node = TypeNode::new(reader.read_cstring()?, reader.read_cstring()?, 0);
            node.size = reader.read_i32_endian(PERSIST_ENDIAN)?;
            node.index = reader.read_u32_endian(PERSIST_ENDIAN)?;
            node.is_array = reader.read_u8()? != 0;
            node.version = reader.read_i32_endian(PERSIST_ENDIAN)?;
            node.meta_flags = reader.read_u32_endian(PERSIST_ENDIAN)?;
            Ok((level, node))
        })
        .collect::<Result<Vec<_>>>()?;

    TypeTree::from_level_records(records)
}

fn write_tree<W: Write>(writer: &mut W, tree: &TypeTree) -> Result<()> {
    let records = tree.level_records();
    writer.write_u32::<LittleEndian>(records.len() as u32)?;

    for (level, node) in records {
        writer.write_u8(level)?;
        writer.write_cstring(&node.type_name)?;
        writer.write_cstring(&node.field_name)?;
        writer.write_i32_endian(node.size, PERSIST_ENDIAN)?;
        writer.write_u32_endian(node.index, PERSIST_ENDIAN)?;
        writer.write_u8(node.is_array as u8)?;
        writer.write_i32_endian(node.version, PERSIST_ENDIAN)?;
        writer.write_u32_endian(node.meta_flags, PERSIST_ENDIAN)?;
    }

    Ok(())
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;
    use std::io::Cursor;
    use tracing_test::traced_test;

    use super::TypeDatabase;
    use crate::error::Result;
    use crate::tree::{TypeNode, TypeTree};
    use crate::version::UnityVersion;

    fn leaf_tree(type_name: &str) -> TypeTree {
        let mut tree = TypeTree::new();
        let root = tree.push_child(None, TypeNode::new("ClassC", "Base", -1));
        tree.push_child(Some(root), TypeNode::new(type_name, "m_Value", 4));
        tree
    }

    fn seeded() -> TypeDatabase {
        let mut database = TypeDatabase::new();
        assert!(database.learn(42, &"1.2.0".parse().unwrap(), &leaf_tree("int")));
        assert!(database.learn(42, &"1.3.0".parse().unwrap(), &leaf_tree("float")));
        database
    }

    #[test]
    fn exact_lookup_needs_exact_pair() {
        let database = seeded();
        let present: UnityVersion = "1.2.0".parse().unwrap();
        let missing: UnityVersion = "1.2.5".parse().unwrap();

        assert!(database.lookup(42, &present, true).is_some());
        assert!(database.lookup(42, &missing, true).is_none());
        assert!(database.lookup(7, &present, true).is_none());
    }

    #[traced_test]
    #[test]
    fn major_minor_tier_dominates() {
        let database = seeded();
        let wanted: UnityVersion = "1.2.5".parse().unwrap();

        let tree = database.lookup(42, &wanted, false).unwrap();
        assert_eq!(tree, &leaf_tree("int"));
    }

    #[traced_test]
    #[test]
    fn major_tier_keeps_most_recent_candidate() {
        let database = seeded();
        let wanted: UnityVersion = "1.4.0".parse().unwrap();

        // both stored minors differ; the later entry wins, never 1.2.0
        let tree = database.lookup(42, &wanted, false).unwrap();
        assert_eq!(tree, &leaf_tree("float"));
    }

    #[traced_test]
    #[test]
    fn any_tier_is_last_resort() {
        let database = seeded();
        let wanted: UnityVersion = "2.0.0".parse().unwrap();

        let tree = database.lookup(42, &wanted, false).unwrap();
        assert_eq!(tree, &leaf_tree("float"));
    }

    #[test]
    fn unknown_class_has_no_match() {
        let database = seeded();
        assert!(database
            .lookup(99, &"1.2.0".parse().unwrap(), false)
            .is_none());
    }

    #[traced_test]
    #[test]
    fn learn_deduplicates_trees_and_versions() {
        let mut database = TypeDatabase::new();
        let version: UnityVersion = "5.3.5f1".parse().unwrap();

        assert!(database.learn(1, &version, &leaf_tree("int")));
        assert!(database.learn(2, &version, &leaf_tree("int")));
        assert!(!database.learn(1, &version, &leaf_tree("int")));

        assert_eq!(database.len(), 2);
        assert_eq!(database.trees.len(), 1);
        assert_eq!(database.versions.len(), 1);
    }

    #[traced_test]
    #[test]
    fn save_load_round_trip() -> Result<()> {
        let database = seeded();

        let mut buffer = Vec::new();
        database.save(&mut buffer)?;
        let loaded = TypeDatabase::load(&mut Cursor::new(buffer))?;

        assert_eq!(loaded.len(), database.len());
        let version: UnityVersion = "1.2.0".parse().unwrap();
        assert_eq!(
            loaded.lookup(42, &version, true),
            database.lookup(42, &version, true)
        );
        Ok(())
    }

    #[test]
    fn load_rejects_unknown_tag() {
        let mut buffer = Vec::new();
        buffer.extend_from_slice(&99u32.to_le_bytes());
        assert!(TypeDatabase::load(&mut Cursor::new(buffer)).is_err());
    }
}
