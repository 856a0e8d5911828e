//! Types for writing serialized files
//!

use binrw::BinWrite;
use byteorder::WriteBytesExt;
use std::io::{Cursor, Seek, Write};
use tracing::instrument;

use unity_typetree::endian::WriteEndianExt;
use unity_typetree::{write_type_forest, Endianness, TypeTreeContext};

use crate::error::Result;
use crate::object::align_writer;
use crate::read::SerializedFile;
use crate::types::{FileIdentifier, ObjectIdRecord, ObjectInfo, SerializedHeader};

impl SerializedFile {
    /// Encode the file with the same version-driven branching as the reader, recomputing every
    /// block boundary, the metadata size, the file size and the data offset.
    ///
    /// Object data entries are laid out 8-byte aligned; from format version 9 on the data block
    /// itself starts at a 16-byte-aligned offset.
    #[instrument(skip_all, err)]
    pub fn write<W: Write + Seek>(&self, writer: &mut W, context: &TypeTreeContext) -> Result<()> {
        let version = self.header().version;
        let endian = self.endianness();

        let mut data: Vec<u8> = Vec::new();
        let mut layout = Vec::with_capacity(self.len());
        for record in self.object_records() {
            let offset = (data.len() as u64 + 7) & !7;
            data.resize(offset as usize, 0);
            data.extend_from_slice(record.data());
            layout.push((*record.info(), offset, record.data().len() as u64));
        }

        let mut metadata = Cursor::new(Vec::new());
        write_type_forest(&mut metadata, self.types(), version, endian, context)?;
        write_object_infos(&mut metadata, version, endian, &layout)?;
        if version > 10 {
            write_object_ids(&mut metadata, version, endian, self.object_ids())?;
        }
        write_externals(&mut metadata, version, endian, self.externals())?;
        let metadata = metadata.into_inner();

        let header_len: u64 = if version >= 9 { 20 } else { 16 };
        let (data_offset, file_size) = if version >= 9 {
            let offset = (header_len + metadata.len() as u64 + 15) & !15;
            (offset, offset + data.len() as u64)
        } else {
            (
                header_len,
                header_len + data.len() as u64 + metadata.len() as u64,
            )
        };

        let header = SerializedHeader {
            metadata_size: metadata.len() as u32,
            file_size: file_size as u32,
            version,
            data_offset: data_offset as u32,
            endian_tag: self.header().endian_tag,
        };
        header.write(writer)?;

        if version >= 9 {
            writer.write_all(&metadata)?;
            for _ in (header_len + metadata.len() as u64)..data_offset {
                writer.write_u8(0)?;
            }
            writer.write_all(&data)?;
        } else {
            writer.write_all(&data)?;
            writer.write_all(&metadata)?;
        }

        Ok(())
    }
}

fn write_object_infos(
    cursor: &mut Cursor<Vec<u8>>,
    version: u32,
    endian: Endianness,
    layout: &[(ObjectInfo, u64, u64)],
) -> Result<()> {
    cursor.write_u32_endian(layout.len() as u32, endian)?;

    for (info, offset, length) in layout {
        if version >= 14 {
            align_writer(cursor);
            cursor.write_i64_endian(info.path_id, endian)?;
        } else {
            cursor.write_i32_endian(info.path_id as i32, endian)?;
        }

        cursor.write_u32_endian(*offset as u32, endian)?;
        cursor.write_u32_endian(*length as u32, endian)?;
        cursor.write_i32_endian(info.type_id, endian)?;
        cursor.write_i16_endian(info.class_id, endian)?;

        if version <= 13 {
            cursor.write_i16_endian(info.is_destroyed, endian)?;
        } else {
            cursor.write_i16_endian(info.script_type_index, endian)?;
            if version >= 15 {
                cursor.write_u8(info.stripped as u8)?;
            }
        }
    }

    Ok(())
}

fn write_object_ids(
    cursor: &mut Cursor<Vec<u8>>,
    version: u32,
    endian: Endianness,
    records: &[ObjectIdRecord],
) -> Result<()> {
    cursor.write_u32_endian(records.len() as u32, endian)?;

    for record in records {
        cursor.write_i32_endian(record.serialized_file_index, endian)?;
        if version < 14 {
            cursor.write_i32_endian(record.path_id as i32, endian)?;
        } else {
            align_writer(cursor);
            cursor.write_i64_endian(record.path_id, endian)?;
        }
    }

    Ok(())
}

fn write_externals(
    cursor: &mut Cursor<Vec<u8>>,
    version: u32,
    endian: Endianness,
    externals: &[FileIdentifier],
) -> Result<()> {
    cursor.write_u32_endian(externals.len() as u32, endian)?;

    for external in externals {
        if version >= 7 {
            cursor.write_cstring(&external.asset_path)?;
            cursor.write_all(&external.guid)?;
            cursor.write_i32_endian(external.kind, endian)?;
        }
        cursor.write_cstring(&external.file_path)?;
    }

    Ok(())
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;
    use std::io::Cursor;
    use tracing_test::traced_test;

    use unity_typetree::{
        ClassSchema, Endianness, TypeForest, TypeNode, TypeTree, TypeTreeContext,
    };

    use crate::error::Result;
    use crate::read::SerializedFile;
    use crate::types::{FileIdentifier, ObjectIdRecord, ObjectInfo};

    fn class_x_tree() -> TypeTree {
        let mut tree = TypeTree::new();
        let root = tree.push_child(None, TypeNode::new("ClassX", "Base", -1));
        tree.push_child(Some(root), TypeNode::new("int", "m_X", 4));
        tree.push_child(Some(root), TypeNode::new("int", "m_Y", 4));
        tree
    }

    fn sample_file(version: u32, endianness: Endianness) -> SerializedFile {
        let mut file = SerializedFile::new(version, endianness);

        file.set_types(TypeForest {
            engine_version: Some("5.3.5f1".into()),
            attributes: Some(0),
            embedded: true,
            classes: vec![ClassSchema {
                class_id: 1,
                script_hash: None,
                type_hash: Some([0; 16]),
                tree: Some(class_x_tree()),
            }],
        });

        let mut object_data = Vec::new();
        for value in [42i32, -7] {
            match endianness {
                Endianness::Big => object_data.extend_from_slice(&value.to_be_bytes()),
                Endianness::Little => object_data.extend_from_slice(&value.to_le_bytes()),
            }
        }

        let mut info = ObjectInfo {
            path_id: 1,
            type_id: 1,
            class_id: 1,
            ..ObjectInfo::default()
        };
        if version >= 14 {
            info.script_type_index = -1;
        }
        if version >= 15 {
            info.stripped = true;
        }
        file.add_object(info, object_data);

        file.push_external(FileIdentifier {
            asset_path: String::new(),
            guid: if version >= 7 { [7; 16] } else { [0; 16] },
            kind: 0,
            file_path: "sharedassets0.assets".into(),
        });

        if version > 10 {
            file.push_object_id(ObjectIdRecord {
                serialized_file_index: 0,
                path_id: 1,
            });
        }

        file
    }

    fn round_trip(version: u32, endianness: Endianness) -> Result<(Vec<u8>, SerializedFile)> {
        let context = TypeTreeContext::new();
        let original = sample_file(version, endianness);

        let mut buffer = Cursor::new(Vec::new());
        original.write(&mut buffer, &context)?;
        let bytes = buffer.into_inner();

        let decoded = SerializedFile::read(&mut Cursor::new(bytes.clone()), &context)?;
        Ok((bytes, decoded))
    }

    fn assert_object_decodes(file: &SerializedFile) -> Result<()> {
        let record = file.object(1).expect("object with path id 1");
        let fields = record.field_tree()?;
        assert_eq!(fields.child("m_X").unwrap().as_i64(), Some(42));
        assert_eq!(fields.child("m_Y").unwrap().as_i64(), Some(-7));
        Ok(())
    }

    #[traced_test]
    #[test]
    fn version_5_round_trip() -> Result<()> {
        let (bytes, decoded) = round_trip(5, Endianness::Big)?;

        assert_eq!(decoded.header().version, 5);
        assert_eq!(decoded.header().file_size as usize, bytes.len());
        assert_eq!(decoded.header().data_offset, 16);
        assert_eq!(decoded.endianness(), Endianness::Big);
        assert_eq!(decoded.externals().len(), 1);
        assert_eq!(decoded.externals()[0].file_path, "sharedassets0.assets");
        assert!(decoded.object_ids().is_empty());
        assert_object_decodes(&decoded)
    }

    #[traced_test]
    #[test]
    fn version_9_round_trip_keeps_revision_metadata() -> Result<()> {
        let (bytes, decoded) = round_trip(9, Endianness::Little)?;

        assert_eq!(decoded.header().file_size as usize, bytes.len());
        assert!(decoded.header().endian_tag.is_some());
        assert_eq!(decoded.endianness(), Endianness::Little);
        // data block is 16-byte aligned from version 9 on
        assert_eq!(decoded.header().data_offset % 16, 0);

        assert_eq!(decoded.types().engine_version.as_deref(), Some("5.3.5f1"));
        assert_eq!(decoded.types().attributes, Some(0));
        assert_eq!(decoded.externals()[0].guid, [7; 16]);
        assert_object_decodes(&decoded)
    }

    #[traced_test]
    #[test]
    fn version_14_round_trip_uses_flat_schemas_and_object_ids() -> Result<()> {
        let (_, decoded) = round_trip(14, Endianness::Little)?;

        assert_eq!(decoded.header().data_offset % 16, 0);
        assert_eq!(decoded.types().classes.len(), 1);
        assert_eq!(decoded.types().classes[0].type_hash, Some([0; 16]));
        assert_eq!(
            decoded.types().classes[0].tree.as_ref().map(|t| t.len()),
            Some(3)
        );

        assert_eq!(decoded.object_ids().len(), 1);
        assert_eq!(decoded.object_ids()[0].path_id, 1);

        let record = file_record(&decoded);
        assert_eq!(record.info().script_type_index, -1);
        assert!(!record.info().stripped);
        assert_object_decodes(&decoded)
    }

    #[traced_test]
    #[test]
    fn version_17_round_trip_keeps_stripped_flag() -> Result<()> {
        let (_, decoded) = round_trip(17, Endianness::Little)?;

        let record = file_record(&decoded);
        assert_eq!(record.info().script_type_index, -1);
        assert!(record.info().stripped);
        assert_object_decodes(&decoded)
    }

    #[traced_test]
    #[test]
    fn big_endian_body_survives_version_9_round_trip() -> Result<()> {
        let (_, decoded) = round_trip(9, Endianness::Big)?;

        assert_eq!(decoded.endianness(), Endianness::Big);
        assert_object_decodes(&decoded)
    }

    fn file_record(file: &SerializedFile) -> &crate::read::ObjectRecord {
        file.object(1).expect("object with path id 1")
    }
}
