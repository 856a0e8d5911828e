//! Encoding the three type schema wire revisions.

use byteorder::WriteBytesExt;
use std::io::Write;
use tracing::instrument;

use crate::endian::{Endianness, WriteEndianExt};
use crate::error::{Error, Result};
use crate::strings::{intern_string, LocalStringTable, TypeTreeContext};
use crate::tree::{ClassSchema, NodeId, TypeForest, TypeTree};

/// Encode the type schema section of a serialized file's metadata.
///
/// The inverse of [`crate::read::read_type_forest`], with the same revision selection by
/// `format_version`.
#[instrument(skip(writer, forest, context), err)]
pub fn write_type_forest<W: Write>(
    writer: &mut W,
    forest: &TypeForest,
    format_version: u32,
    endian: Endianness,
    context: &TypeTreeContext,
) -> Result<()> {
    if format_version >= 14 {
        write_forest_v3(writer, forest, endian, context)
    } else if format_version >= 7 {
        write_forest_v2(writer, forest, endian)
    } else {
        write_classes_recursive(writer, forest, endian)
    }
}

fn embedded_tree(class: &ClassSchema) -> Result<&TypeTree> {
    class
        .tree
        .as_ref()
        .filter(|tree| !tree.is_empty())
        .ok_or_else(|| {
            Error::Malformed(format!(
                "class {} has no embedded tree to encode",
                class.class_id
            ))
        })
}

fn write_node_recursive<W: Write>(
    writer: &mut W,
    endian: Endianness,
    tree: &TypeTree,
    id: NodeId,
) -> Result<()> {
    let node = tree.node(id);
    writer.write_cstring(&node.type_name)?;
    writer.write_cstring(&node.field_name)?;
    writer.write_i32_endian(node.size, endian)?;
    writer.write_u32_endian(node.index, endian)?;
    writer.write_u32_endian(node.is_array as u32, endian)?;
    writer.write_i32_endian(node.version, endian)?;
    writer.write_u32_endian(node.meta_flags, endian)?;
    writer.write_u32_endian(node.children.len() as u32, endian)?;

    for &child in &node.children {
        write_node_recursive(writer, endian, tree, child)?;
    }

    Ok(())
}

fn write_classes_recursive<W: Write>(
    writer: &mut W,
    forest: &TypeForest,
    endian: Endianness,
) -> Result<()> {
    writer.write_u32_endian(forest.classes.len() as u32, endian)?;

    for class in &forest.classes {
        writer.write_i32_endian(class.class_id, endian)?;
        let tree = embedded_tree(class)?;
        write_node_recursive(writer, endian, tree, tree.root().expect("non-empty tree"))?;
    }

    Ok(())
}

fn write_forest_v2<W: Write>(
    writer: &mut W,
    forest: &TypeForest,
    endian: Endianness,
) -> Result<()> {
    writer.write_cstring(forest.engine_version.as_deref().unwrap_or_default())?;
    writer.write_u32_endian(forest.attributes.unwrap_or_default(), endian)?;
    write_classes_recursive(writer, forest, endian)?;

    // trailing padding word
    writer.write_u32_endian(0, endian)?;

    Ok(())
}

fn write_forest_v3<W: Write>(
    writer: &mut W,
    forest: &TypeForest,
    endian: Endianness,
    context: &TypeTreeContext,
) -> Result<()> {
    writer.write_cstring(forest.engine_version.as_deref().unwrap_or_default())?;
    writer.write_u32_endian(forest.attributes.unwrap_or_default(), endian)?;
    writer.write_u8(forest.embedded as u8)?;
    writer.write_u32_endian(forest.classes.len() as u32, endian)?;

    for class in &forest.classes {
        writer.write_i32_endian(class.class_id, endian)?;

        if class.class_id < 0 {
            writer.write_all(&class.script_hash.unwrap_or_default())?;
        }
        writer.write_all(&class.type_hash.unwrap_or_default())?;

        if forest.embedded {
            write_tree_blob(writer, embedded_tree(class)?, endian, context)?;
        }
    }

    Ok(())
}

fn write_tree_blob<W: Write>(
    writer: &mut W,
    tree: &TypeTree,
    endian: Endianness,
    context: &TypeTreeContext,
) -> Result<()> {
    let common = context.common_strings();
    let mut local = LocalStringTable::new();

    let records: Vec<_> = tree
        .level_records()
        .into_iter()
        .map(|(level, node)| {
            let type_offset = intern_string(&node.type_name, &mut local, common);
            let name_offset = intern_string(&node.field_name, &mut local, common);
            (level, type_offset, name_offset, node)
        })
        .collect();

    writer.write_u32_endian(records.len() as u32, endian)?;
    for (level, type_offset, name_offset, node) in records {
        writer.write_u16_endian(node.version as u16, endian)?;
        writer.write_u8(level)?;
        writer.write_u8(node.is_array as u8)?;
        writer.write_u32_endian(type_offset, endian)?;
        writer.write_u32_endian(name_offset, endian)?;
        writer.write_i32_endian(node.size, endian)?;
        writer.write_u32_endian(node.index, endian)?;
        writer.write_u32_endian(node.meta_flags, endian)?;
    }

    let table = local.into_bytes();
    writer.write_u32_endian(table.len() as u32, endian)?;
    writer.write_all(&table)?;

    Ok(())
}
