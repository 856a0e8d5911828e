//! Types for reading serialized files
//!

use binrw::BinRead;
use byteorder::ReadBytesExt;
use indexmap::IndexMap;
use std::cell::OnceCell;
use std::collections::HashMap;
use std::io::{Read, Seek, SeekFrom};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use unity_typetree::endian::{align4, ReadEndianExt};
use unity_typetree::{
    read_type_forest, Endianness, TypeDatabase, TypeForest, TypeTree, TypeTreeContext,
    UnityVersion,
};

use crate::error::{Error, Result};
use crate::object::{FieldNode, ObjectCodec};
use crate::types::{
    DataBlock, EndianTag, FileIdentifier, ObjectIdRecord, ObjectInfo, SerializedBlocks,
    SerializedHeader,
};

/// One decoded object: its index row, its raw bytes and (when resolvable) its type tree.
///
/// The field tree is decoded lazily on first request and memoized. Records keep their raw bytes
/// even when no schema could be attached, so a type database can supply one later.
pub struct ObjectRecord {
    info: ObjectInfo,
    data: Vec<u8>,
    tree: Option<Arc<TypeTree>>,
    endianness: Endianness,
    format_version: u32,
    field_tree: OnceCell<FieldNode>,
}

impl ObjectRecord {
    /// Stable object identity within the file.
    pub fn path_id(&self) -> i64 {
        self.info.path_id
    }

    /// Numeric class identifier.
    pub fn class_id(&self) -> i16 {
        self.info.class_id
    }

    /// Type identifier linking into the schema forest.
    pub fn type_id(&self) -> i32 {
        self.info.type_id
    }

    /// The full object index row.
    pub fn info(&self) -> &ObjectInfo {
        &self.info
    }

    /// The raw serialized bytes of the object.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// The schema attached to this object, if one was resolvable.
    pub fn type_tree(&self) -> Option<&TypeTree> {
        self.tree.as_deref()
    }

    pub fn has_type_tree(&self) -> bool {
        self.tree.is_some()
    }

    /// Attach a schema resolved outside the file, e.g. from a type database. Keeps an already
    /// attached schema.
    pub fn attach_type_tree(&mut self, tree: Arc<TypeTree>) {
        if self.tree.is_none() {
            self.tree = Some(tree);
        }
    }

    /// Decode the object's field tree. Lazy and memoized; fails with
    /// [`Error::MissingSchema`] when no schema is attached.
    pub fn field_tree(&self) -> Result<&FieldNode> {
        if let Some(decoded) = self.field_tree.get() {
            return Ok(decoded);
        }

        let tree = self.tree.as_deref().ok_or(Error::MissingSchema)?;
        let codec = ObjectCodec::new(self.endianness, self.format_version);
        let decoded = codec.deserialize(&self.data, tree)?;
        Ok(self.field_tree.get_or_init(|| decoded))
    }
}

/// A decoded serialized file: header, schema forest, object index and raw object data.
pub struct SerializedFile {
    header: SerializedHeader,
    types: TypeForest,
    objects: IndexMap<i64, ObjectRecord>,
    object_ids: Vec<ObjectIdRecord>,
    externals: Vec<FileIdentifier>,
    blocks: SerializedBlocks,
}

impl SerializedFile {
    /// An empty file shell for building a new serialized file in memory.
    pub fn new(version: u32, endianness: Endianness) -> SerializedFile {
        let endian_tag = (version >= 9).then(|| EndianTag {
            big_endian: matches!(endianness, Endianness::Big) as u8,
            reserved: [0; 3],
        });

        SerializedFile {
            header: SerializedHeader {
                metadata_size: 0,
                file_size: 0,
                version,
                data_offset: 0,
                endian_tag,
            },
            types: TypeForest::default(),
            objects: IndexMap::new(),
            object_ids: Vec::new(),
            externals: Vec::new(),
            blocks: SerializedBlocks::default(),
        }
    }

    /// Decode a serialized file from `reader`, which must be positioned at its first byte.
    #[instrument(skip_all, err)]
    pub fn read<R: Read + Seek>(reader: &mut R, context: &TypeTreeContext) -> Result<SerializedFile> {
        let base = reader.stream_position()?;
        let header = SerializedHeader::read(reader)?;
        let header_end = reader.stream_position()?;

        let version = header.version;
        let endian = header.endianness();

        // version < 9 keeps the metadata at the tail, found by walking back from the file end
        let metadata_start = if version < 9 {
            base + u64::from(header.file_size) - u64::from(header.metadata_size)
        } else {
            header_end
        };
        reader.seek(SeekFrom::Start(metadata_start))?;

        let type_tree_start = reader.stream_position()?;
        let types = read_type_forest(reader, version, endian, context)?;
        let type_tree_end = reader.stream_position()?;

        let infos = read_object_infos(reader, version, endian, base)?;
        let object_info_end = reader.stream_position()?;

        let object_ids = if version > 10 {
            read_object_ids(reader, version, endian, base)?
        } else {
            Vec::new()
        };
        let object_ids_end = reader.stream_position()?;

        let externals = read_externals(reader, version, endian)?;
        let externals_end = reader.stream_position()?;

        let trees: HashMap<i32, Arc<TypeTree>> = types
            .classes
            .iter()
            .filter_map(|class| {
                class
                    .tree
                    .as_ref()
                    .map(|tree| (class.class_id, Arc::new(tree.clone())))
            })
            .collect();

        let data_offset = base + u64::from(header.data_offset);
        let mut data_span: Option<(u64, u64)> = None;
        let mut objects = IndexMap::with_capacity(infos.len());
        for info in infos {
            reader.seek(SeekFrom::Start(data_offset + info.offset))?;
            let mut data = vec![0u8; info.length as usize];
            reader.read_exact(&mut data)?;

            let tree = trees.get(&info.type_id).cloned();
            if tree.is_none() {
                // resolution is deferred to the type database
                debug!(
                    path_id = info.path_id,
                    type_id = info.type_id,
                    "object type has no embedded schema"
                );
            }

            data_span = match data_span {
                None => Some((info.offset, info.offset + info.length)),
                Some((start, end)) => {
                    Some((start.min(info.offset), end.max(info.offset + info.length)))
                }
            };

            let record = ObjectRecord {
                info,
                data,
                tree,
                endianness: endian,
                format_version: version,
                field_tree: OnceCell::new(),
            };
            if objects.insert(record.path_id(), record).is_some() {
                warn!(path_id = info.path_id, "duplicate path id in object index");
            }
        }

        let (data_start, data_end) = data_span.unwrap_or((0, 0));
        let blocks = SerializedBlocks {
            header: DataBlock::new(0, header_end - base),
            type_tree: DataBlock::new(type_tree_start - base, type_tree_end - type_tree_start),
            object_info: DataBlock::new(type_tree_end - base, object_info_end - type_tree_end),
            object_ids: DataBlock::new(object_info_end - base, object_ids_end - object_info_end),
            externals: DataBlock::new(object_ids_end - base, externals_end - object_ids_end),
            object_data: DataBlock::new(
                u64::from(header.data_offset) + data_start,
                data_end - data_start,
            ),
        };

        Ok(SerializedFile {
            header,
            types,
            objects,
            object_ids,
            externals,
            blocks,
        })
    }

    /// The decoded header.
    pub fn header(&self) -> &SerializedHeader {
        &self.header
    }

    /// Endianness of the file body.
    pub fn endianness(&self) -> Endianness {
        self.header.endianness()
    }

    /// The decoded schema forest.
    pub fn types(&self) -> &TypeForest {
        &self.types
    }

    /// Replace the schema forest; object schemas are re-attached on the next
    /// [`SerializedFile::add_object`].
    pub fn set_types(&mut self, types: TypeForest) {
        self.types = types;
    }

    /// Engine version parsed from the schema forest, if one is recorded.
    pub fn engine_version(&self) -> Option<UnityVersion> {
        self.types
            .engine_version
            .as_deref()
            .and_then(|version| version.parse().ok())
    }

    /// The decoded object records, in index order.
    pub fn object_records(&self) -> impl Iterator<Item = &ObjectRecord> {
        self.objects.values()
    }

    /// Number of objects in the file.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Find an object by path ID.
    pub fn object(&self, path_id: i64) -> Option<&ObjectRecord> {
        self.objects.get(&path_id)
    }

    /// The object-id table (format version > 10).
    pub fn object_ids(&self) -> &[ObjectIdRecord] {
        &self.object_ids
    }

    /// The recorded external file references.
    pub fn externals(&self) -> &[FileIdentifier] {
        &self.externals
    }

    /// Byte ranges of the file's sections, for diagnostics.
    pub fn blocks(&self) -> &SerializedBlocks {
        &self.blocks
    }

    /// Append an object, attaching the matching embedded schema when one exists.
    pub fn add_object(&mut self, info: ObjectInfo, data: Vec<u8>) {
        let tree = self
            .types
            .tree_for(info.type_id)
            .map(|tree| Arc::new(tree.clone()));

        let record = ObjectRecord {
            info,
            data,
            tree,
            endianness: self.endianness(),
            format_version: self.header.version,
            field_tree: OnceCell::new(),
        };
        self.objects.insert(record.path_id(), record);
    }

    /// Append an external file reference.
    pub fn push_external(&mut self, external: FileIdentifier) {
        self.externals.push(external);
    }

    /// Append an object-id table row.
    pub fn push_object_id(&mut self, record: ObjectIdRecord) {
        self.object_ids.push(record);
    }

    /// Attach database schemas to objects the file left unresolved.
    ///
    /// Returns the number of objects resolved. Objects that stay unresolved are kept; they fail
    /// individually when their field tree is requested.
    #[instrument(skip_all)]
    pub fn resolve_types(&mut self, database: &TypeDatabase) -> usize {
        let Some(version) = self.engine_version() else {
            return 0;
        };

        let mut resolved = 0;
        for record in self.objects.values_mut() {
            if record.has_type_tree() {
                continue;
            }
            match database.lookup(i32::from(record.class_id()), &version, false) {
                Some(tree) => {
                    record.attach_type_tree(Arc::new(tree.clone()));
                    resolved += 1;
                }
                None => warn!(
                    path_id = record.path_id(),
                    class_id = record.class_id(),
                    "no schema for object in type database"
                ),
            }
        }
        resolved
    }

    /// Teach the type database every schema this file embeds.
    ///
    /// Returns the number of new associations inserted.
    pub fn learn_types(&self, database: &mut TypeDatabase) -> usize {
        let Some(version) = self.engine_version() else {
            return 0;
        };

        let mut inserted = 0;
        for class in &self.types.classes {
            if let Some(tree) = &class.tree {
                if database.learn(class.class_id, &version, tree) {
                    inserted += 1;
                }
            }
        }
        inserted
    }

    /// Decode every object that has a resolvable schema, skipping (with a warning) the ones
    /// that fail instead of aborting the file.
    pub fn decoded_objects(&self) -> impl Iterator<Item = (&ObjectRecord, &FieldNode)> {
        self.objects.values().filter_map(|record| {
            match record.field_tree() {
                Ok(tree) => Some((record, tree)),
                Err(error) => {
                    warn!(path_id = record.path_id(), %error, "skipping undecodable object");
                    None
                }
            }
        })
    }
}

fn align_reader<R: Read + Seek>(reader: &mut R, base: u64) -> Result<()> {
    let position = reader.stream_position()? - base;
    let aligned = align4(position);
    if aligned != position {
        reader.seek(SeekFrom::Start(base + aligned))?;
    }
    Ok(())
}

fn read_object_infos<R: Read + Seek>(
    reader: &mut R,
    version: u32,
    endian: Endianness,
    base: u64,
) -> Result<Vec<ObjectInfo>> {
    let count = reader.read_u32_endian(endian)?;

    let mut infos = Vec::with_capacity(count as usize);
    for _ in 0..count {
        if version >= 14 {
            align_reader(reader, base)?;
        }

        let path_id = if version >= 14 {
            reader.read_i64_endian(endian)?
        } else {
            i64::from(reader.read_i32_endian(endian)?)
        };

        let mut info = ObjectInfo {
            path_id,
            offset: u64::from(reader.read_u32_endian(endian)?),
            length: u64::from(reader.read_u32_endian(endian)?),
            type_id: reader.read_i32_endian(endian)?,
            class_id: reader.read_i16_endian(endian)?,
            ..ObjectInfo::default()
        };

        if version <= 13 {
            info.is_destroyed = reader.read_i16_endian(endian)?;
        } else {
            info.script_type_index = reader.read_i16_endian(endian)?;
            if version >= 15 {
                info.stripped = reader.read_u8()? != 0;
            }
        }

        infos.push(info);
    }

    Ok(infos)
}

fn read_object_ids<R: Read + Seek>(
    reader: &mut R,
    version: u32,
    endian: Endianness,
    base: u64,
) -> Result<Vec<ObjectIdRecord>> {
    let count = reader.read_u32_endian(endian)?;

    (0..count)
        .map(|_| {
            let serialized_file_index = reader.read_i32_endian(endian)?;
            let path_id = if version < 14 {
                i64::from(reader.read_i32_endian(endian)?)
            } else {
                align_reader(reader, base)?;
                reader.read_i64_endian(endian)?
            };

            Ok(ObjectIdRecord {
                serialized_file_index,
                path_id,
            })
        })
        .collect()
}

fn read_externals<R: Read + Seek>(
    reader: &mut R,
    version: u32,
    endian: Endianness,
) -> Result<Vec<FileIdentifier>> {
    let count = reader.read_u32_endian(endian)?;

    (0..count)
        .map(|_| {
            let mut external = FileIdentifier::default();
            if version >= 7 {
                external.asset_path = reader.read_cstring()?;
                reader.read_exact(&mut external.guid)?;
                external.kind = reader.read_i32_endian(endian)?;
            }
            external.file_path = reader.read_cstring()?;
            Ok(external)
        })
        .collect()
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;
    use std::io::Cursor;
    use tracing_test::traced_test;
    use unity_typetree::{Endianness, TypeTreeContext};

    use crate::error::Result;
    use crate::read::SerializedFile;
    use crate::types::DataBlock;

    fn push_cstr(buffer: &mut Vec<u8>, value: &str) {
        buffer.extend_from_slice(value.as_bytes());
        buffer.push(0);
    }

    fn push_u32(buffer: &mut Vec<u8>, value: u32) {
        buffer.extend_from_slice(&value.to_be_bytes());
    }

    fn push_i32(buffer: &mut Vec<u8>, value: i32) {
        buffer.extend_from_slice(&value.to_be_bytes());
    }

    /// Hand-assemble a minimal version 5 file: big-endian throughout, object data between the
    /// header and the trailing metadata.
    fn version_5_file() -> Vec<u8> {
        // type forest, revision V1
        let mut metadata = Vec::new();
        push_u32(&mut metadata, 1); // class count
        push_i32(&mut metadata, 1); // class id
        push_cstr(&mut metadata, "ClassX");
        push_cstr(&mut metadata, "Base");
        push_i32(&mut metadata, -1); // size
        push_u32(&mut metadata, 0); // index
        push_u32(&mut metadata, 0); // is array
        push_i32(&mut metadata, 1); // version
        push_u32(&mut metadata, 0); // meta flags
        push_u32(&mut metadata, 1); // children
        push_cstr(&mut metadata, "int");
        push_cstr(&mut metadata, "m_X");
        push_i32(&mut metadata, 4);
        push_u32(&mut metadata, 0);
        push_u32(&mut metadata, 0);
        push_i32(&mut metadata, 1);
        push_u32(&mut metadata, 0);
        push_u32(&mut metadata, 0);

        // object index, revision V1
        push_u32(&mut metadata, 1); // object count
        push_i32(&mut metadata, 1); // path id
        push_u32(&mut metadata, 0); // offset
        push_u32(&mut metadata, 4); // length
        push_i32(&mut metadata, 1); // type id
        metadata.extend_from_slice(&1i16.to_be_bytes()); // class id
        metadata.extend_from_slice(&0i16.to_be_bytes()); // is destroyed

        // externals, revision V1
        push_u32(&mut metadata, 1);
        push_cstr(&mut metadata, "library.assets");

        let object_data = 42i32.to_be_bytes();

        let mut file = Vec::new();
        push_u32(&mut file, metadata.len() as u32); // metadata size
        push_u32(&mut file, (16 + object_data.len() + metadata.len()) as u32); // file size
        push_u32(&mut file, 5); // version
        push_u32(&mut file, 16); // data offset
        file.extend_from_slice(&object_data);
        file.extend_from_slice(&metadata);
        file
    }

    #[traced_test]
    #[test]
    fn read_version_5_file() -> Result<()> {
        let context = TypeTreeContext::new();
        let file = SerializedFile::read(&mut Cursor::new(version_5_file()), &context)?;

        assert_eq!(file.header().version, 5);
        assert_eq!(file.endianness(), Endianness::Big);
        assert_eq!(file.len(), 1);

        let record = file.object(1).expect("object with path id 1");
        assert_eq!(record.class_id(), 1);
        assert!(record.has_type_tree());
        assert_eq!(record.data(), &42i32.to_be_bytes()[..]);

        let fields = record.field_tree()?;
        assert_eq!(fields.child("m_X").unwrap().as_i64(), Some(42));

        assert_eq!(file.externals().len(), 1);
        assert_eq!(file.externals()[0].file_path, "library.assets");
        assert!(file.object_ids().is_empty());
        Ok(())
    }

    #[traced_test]
    #[test]
    fn version_5_blocks_cover_their_sections() -> Result<()> {
        let bytes = version_5_file();
        let total = bytes.len() as u64;

        let context = TypeTreeContext::new();
        let file = SerializedFile::read(&mut Cursor::new(bytes), &context)?;
        let blocks = file.blocks();

        assert_eq!(blocks.header, DataBlock::new(0, 16));
        assert_eq!(blocks.object_data, DataBlock::new(16, 4));
        assert_eq!(blocks.type_tree.offset, 20);

        let whole = DataBlock::new(0, total);
        for block in [
            blocks.header,
            blocks.type_tree,
            blocks.object_info,
            blocks.object_ids,
            blocks.externals,
            blocks.object_data,
        ] {
            assert!(whole.contains(&block));
        }

        // metadata sections are contiguous and non-overlapping
        assert_eq!(blocks.object_info.offset, blocks.type_tree.end());
        assert_eq!(blocks.object_ids.offset, blocks.object_info.end());
        assert_eq!(blocks.externals.offset, blocks.object_ids.end());
        assert_eq!(blocks.externals.end(), total);
        Ok(())
    }

    #[traced_test]
    #[test]
    fn unresolvable_type_is_retained_without_schema() -> Result<()> {
        let mut bytes = version_5_file();
        // point the object at a type id with no embedded schema; the type id sits before the
        // two i16 fields and the 19-byte externals section
        let info_type_id = bytes.len() - 19 - 2 - 2 - 4;
        bytes[info_type_id..info_type_id + 4].copy_from_slice(&9i32.to_be_bytes());

        let context = TypeTreeContext::new();
        let file = SerializedFile::read(&mut Cursor::new(bytes), &context)?;

        let record = file.object(1).unwrap();
        assert!(!record.has_type_tree());
        assert!(record.field_tree().is_err());
        assert_eq!(file.decoded_objects().count(), 0);
        Ok(())
    }
}
