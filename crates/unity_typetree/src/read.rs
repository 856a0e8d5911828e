//! Decoding the three type schema wire revisions.

use byteorder::ReadBytesExt;
use std::io::Read;
use tracing::instrument;

use crate::endian::{Endianness, ReadEndianExt};
use crate::error::Result;
use crate::strings::{resolve_string, TypeTreeContext};
use crate::tree::{ClassSchema, NodeId, TypeForest, TypeNode, TypeTree};

/// Decode the type schema section of a serialized file's metadata.
///
/// `format_version` is the container's format version and selects the wire revision: V1 for
/// versions up to 6, V2 for 7 through 13, V3 from 14 on.
#[instrument(skip(reader, context), err)]
pub fn read_type_forest<R: Read>(
    reader: &mut R,
    format_version: u32,
    endian: Endianness,
    context: &TypeTreeContext,
) -> Result<TypeForest> {
    if format_version >= 14 {
        read_forest_v3(reader, endian, context)
    } else if format_version >= 7 {
        read_forest_v2(reader, endian)
    } else {
        read_forest_v1(reader, endian)
    }
}

fn read_node_recursive<R: Read>(
    reader: &mut R,
    endian: Endianness,
    tree: &mut TypeTree,
    parent: Option<NodeId>,
) -> Result<NodeId> {
    let type_name = reader.read_cstring()?;
    let field_name = reader.read_cstring()?;

    let mut node = TypeNode::new(type_name, field_name, reader.read_i32_endian(endian)?);
    node.index = reader.read_u32_endian(endian)?;
    node.is_array = reader.read_u32_endian(endian)? != 0;
    node.version = reader.read_i32_endian(endian)?;
    node.meta_flags = reader.read_u32_endian(endian)?;

    let id = tree.push_child(parent, node);

    let children = reader.read_u32_endian(endian)?;
    for _ in 0..children {
        read_node_recursive(reader, endian, tree, Some(id))?;
    }

    Ok(id)
}

fn read_classes_recursive<R: Read>(reader: &mut R, endian: Endianness) -> Result<Vec<ClassSchema>> {
    let count = reader.read_u32_endian(endian)?;

    (0..count)
        .map(|_| {
            let class_id = reader.read_i32_endian(endian)?;
            let mut tree = TypeTree::new();
            read_node_recursive(reader, endian, &mut tree, None)?;

            Ok(ClassSchema {
                class_id,
                script_hash: None,
                type_hash: None,
                tree: Some(tree),
            })
        })
        .collect()
}

fn read_forest_v1<R: Read>(reader: &mut R, endian: Endianness) -> Result<TypeForest> {
    Ok(TypeForest {
        classes: read_classes_recursive(reader, endian)?,
        ..TypeForest::default()
    })
}

fn read_forest_v2<R: Read>(reader: &mut R, endian: Endianness) -> Result<TypeForest> {
    let engine_version = reader.read_cstring()?;
    let attributes = reader.read_u32_endian(endian)?;
    let classes = read_classes_recursive(reader, endian)?;

    // trailing padding word
    let _ = reader.read_u32_endian(endian)?;

    Ok(TypeForest {
        engine_version: Some(engine_version),
        attributes: Some(attributes),
        embedded: true,
        classes,
    })
}

fn read_forest_v3<R: Read>(
    reader: &mut R,
    endian: Endianness,
    context: &TypeTreeContext,
) -> Result<TypeForest> {
    let engine_version = reader.read_cstring()?;
    let attributes = reader.read_u32_endian(endian)?;
    let embedded = reader.read_u8()? != 0;
    let count = reader.read_u32_endian(endian)?;

    let mut classes = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let class_id = reader.read_i32_endian(endian)?;

        let script_hash = if class_id < 0 {
            let mut hash = [0u8; 16];
            reader.read_exact(&mut hash)?;
            Some(hash)
        } else {
            None
        };

        let mut type_hash = [0u8; 16];
        reader.read_exact(&mut type_hash)?;

        let tree = if embedded {
            Some(read_tree_blob(reader, endian, context)?)
        } else {
            None
        };

        classes.push(ClassSchema {
            class_id,
            script_hash,
            type_hash: Some(type_hash),
            tree,
        });
    }

    Ok(TypeForest {
        engine_version: Some(engine_version),
        attributes: Some(attributes),
        embedded,
        classes,
    })
}

struct RawRecord {
    version: u16,
    level: u8,
    is_array: bool,
    type_offset: u32,
    name_offset: u32,
    size: i32,
    index: u32,
    meta_flags: u32,
}

fn read_tree_blob<R: Read>(
    reader: &mut R,
    endian: Endianness,
    context: &TypeTreeContext,
) -> Result<TypeTree> {
    let field_count = reader.read_u32_endian(endian)?;

    let records = (0..field_count)
        .map(|_| {
            Ok(RawRecord {
                version: reader.read_u16_endian(endian)?,
                level: reader.read_u8()?,
                is_array: reader.read_u8()? != 0,
                type_offset: reader.read_u32_endian(endian)?,
                name_offset: reader.read_u32_endian(endian)?,
                size: reader.read_i32_endian(endian)?,
                index: reader.read_u32_endian(endian)?,
                meta_flags: reader.read_u32_endian(endian)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let table_length = reader.read_u32_endian(endian)?;
    let mut table = vec![0u8; table_length as usize];
    reader.read_exact(&mut table)?;

    let common = context.common_strings();
    TypeTree::from_level_records_fallible(records.into_iter().map(|record| {
        let mut node = TypeNode::new(
            resolve_string(record.type_offset, &table, common)?,
            resolve_string(record.name_offset, &table, common)?,
            record.size,
        );
        node.index = record.index;
        node.is_array = record.is_array;
        node.version = i32::from(record.version);
        node.meta_flags = record.meta_flags;
        Ok((record.level, node))
    }))
}

impl TypeTree {
    /// Variant of [`TypeTree::from_level_records`] over fallible records.
    fn from_level_records_fallible<I>(records: I) -> Result<TypeTree>
    where
        I: IntoIterator<Item = Result<(u8, TypeNode)>>,
    {
        let collected = records.into_iter().collect::<Result<Vec<_>>>()?;
        TypeTree::from_level_records(collected)
    }
}
