//! The generic, schema-driven object codec.
//!
//! Decoding is a recursive descent keyed purely by the type tree, not by any static type: the
//! tree shape discovered at runtime decides every read. The strict post-condition is that a
//! decode consumes its buffer exactly; a remainder means the schema did not match the data.

use std::io::{Cursor, Read, Write};

use byteorder::{ReadBytesExt, WriteBytesExt};
use tracing::instrument;
use unity_typetree::endian::{align4, ReadEndianExt, WriteEndianExt};
use unity_typetree::tree::NodeId;
use unity_typetree::{Endianness, TypeTree};

use crate::error::{Error, Result};

/// A decoded field value.
///
/// Primitive variants correspond one to one with the closed set of schema type names; the
/// container variants mirror the three array encodings plus composite fields.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Bool(bool),
    SInt8(i8),
    UInt8(u8),
    SInt16(i16),
    UInt16(u16),
    SInt32(i32),
    UInt32(u32),
    SInt64(i64),
    UInt64(u64),
    Float(f32),
    Double(f64),
    /// Contiguous byte/char array
    Buffer(Vec<u8>),
    /// Byte/char array whose content lives in an external resource stream. `data` is the
    /// materialized content, or zero filled when no side buffer was supplied.
    ResourceBuffer { offset: u32, data: Vec<u8> },
    /// A `string` node: UTF-8 view over the raw character array
    Text { raw: Vec<u8>, text: String },
    /// Composite: named sub-fields in declaration order
    Fields(Vec<FieldNode>),
    /// Array of composite elements
    List(Vec<FieldNode>),
    /// Array of non-byte primitives
    ScalarList(Vec<FieldValue>),
}

/// A decoded field, shape-isomorphic to the schema node it was produced from.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldNode {
    /// Type name from the schema node
    pub type_name: String,
    /// Field name from the schema node
    pub name: String,
    /// Whether 4-byte alignment padding follows this field's value
    pub align: bool,
    /// The decoded value
    pub value: FieldValue,
}

impl FieldNode {
    /// Find a direct sub-field by name.
    pub fn child(&self, name: &str) -> Option<&FieldNode> {
        match &self.value {
            FieldValue::Fields(children) => children.iter().find(|child| child.name == name),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self.value {
            FieldValue::Bool(value) => Some(value),
            _ => None,
        }
    }

    /// The value as a signed integer, for any integer width.
    pub fn as_i64(&self) -> Option<i64> {
        match self.value {
            FieldValue::SInt8(value) => Some(value.into()),
            FieldValue::UInt8(value) => Some(value.into()),
            FieldValue::SInt16(value) => Some(value.into()),
            FieldValue::UInt16(value) => Some(value.into()),
            FieldValue::SInt32(value) => Some(value.into()),
            FieldValue::UInt32(value) => Some(value.into()),
            FieldValue::SInt64(value) => Some(value),
            FieldValue::UInt64(value) => i64::try_from(value).ok(),
            _ => None,
        }
    }

    /// The value as an unsigned integer, for any non-negative integer.
    pub fn as_u64(&self) -> Option<u64> {
        self.as_i64().and_then(|value| u64::try_from(value).ok())
    }

    pub fn as_f32(&self) -> Option<f32> {
        match self.value {
            FieldValue::Float(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self.value {
            FieldValue::Float(value) => Some(value.into()),
            FieldValue::Double(value) => Some(value),
            _ => None,
        }
    }

    /// The decoded text of a `string` node.
    pub fn as_str(&self) -> Option<&str> {
        match &self.value {
            FieldValue::Text { text, .. } => Some(text),
            _ => None,
        }
    }

    /// The raw bytes of a byte/char array or `string` node.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match &self.value {
            FieldValue::Buffer(data) => Some(data),
            FieldValue::ResourceBuffer { data, .. } => Some(data),
            FieldValue::Text { raw, .. } => Some(raw),
            _ => None,
        }
    }

    /// The elements of a composite array.
    pub fn as_list(&self) -> Option<&[FieldNode]> {
        match &self.value {
            FieldValue::List(items) => Some(items),
            _ => None,
        }
    }
}

/// Schema-driven deserializer/serializer for one container configuration.
///
/// `format_version` is the containing file's format version; primitive arrays are 4-aligned
/// after their data from version 6 on. `resources` is the optional side-loaded stream backing
/// externally streamed payloads.
pub struct ObjectCodec<'a> {
    endianness: Endianness,
    format_version: u32,
    resources: Option<&'a [u8]>,
}

impl<'a> ObjectCodec<'a> {
    pub fn new(endianness: Endianness, format_version: u32) -> Self {
        ObjectCodec {
            endianness,
            format_version,
            resources: None,
        }
    }

    /// Attach a side-loaded resource stream for externally streamed array payloads.
    pub fn with_resources(mut self, resources: &'a [u8]) -> Self {
        self.resources = Some(resources);
        self
    }

    fn align_arrays(&self) -> bool {
        self.format_version > 5
    }

    /// Decode `data` against `tree`.
    ///
    /// Fails unless the walk consumes the buffer exactly; a remainder signals a schema
    /// mismatch or an unrecognized trailing structure.
    #[instrument(skip_all, fields(size = data.len()), err)]
    pub fn deserialize(&self, data: &[u8], tree: &TypeTree) -> Result<FieldNode> {
        let root = tree.root().ok_or(Error::MissingSchema)?;

        let mut cursor = Cursor::new(data);
        let decoded = self.read_node(&mut cursor, tree, root)?;

        let remaining = data.len() as i64 - cursor.position() as i64;
        if remaining != 0 {
            return Err(Error::TrailingBytes(remaining.unsigned_abs()));
        }

        Ok(decoded)
    }

    /// Encode a field tree back to raw object bytes; the exact inverse of
    /// [`ObjectCodec::deserialize`].
    ///
    /// Resource-backed buffers cannot be re-encoded and fail explicitly.
    #[instrument(skip_all, err)]
    pub fn serialize(&self, root: &FieldNode) -> Result<Vec<u8>> {
        let mut buffer = Cursor::new(Vec::new());
        self.write_node(&mut buffer, root)?;
        Ok(buffer.into_inner())
    }

    fn read_node(
        &self,
        cursor: &mut Cursor<&[u8]>,
        tree: &TypeTree,
        id: NodeId,
    ) -> Result<FieldNode> {
        let node = tree.node(id);

        let mut decoded = if is_array_node(tree, id) {
            self.read_array(cursor, tree, id)?
        } else if node.is_leaf() {
            FieldNode {
                type_name: node.type_name.clone(),
                name: node.field_name.clone(),
                align: node.force_align(),
                value: self.read_primitive(cursor, &node.type_name)?,
            }
        } else {
            let children = tree
                .children(id)
                .iter()
                .map(|&child| self.read_node(cursor, tree, child))
                .collect::<Result<Vec<_>>>()?;

            FieldNode {
                type_name: node.type_name.clone(),
                name: node.field_name.clone(),
                align: node.force_align(),
                value: FieldValue::Fields(children),
            }
        };

        if node.type_name == "string" {
            collapse_string(&mut decoded);
        }

        if node.force_align() {
            align_cursor(cursor);
        }

        Ok(decoded)
    }

    fn read_array(
        &self,
        cursor: &mut Cursor<&[u8]>,
        tree: &TypeTree,
        id: NodeId,
    ) -> Result<FieldNode> {
        let node = tree.node(id);
        let data_id = tree.find_child(id, "data").ok_or_else(|| {
            Error::Malformed(format!(
                "array node {:?} has no data child",
                node.field_name
            ))
        })?;
        tree.find_child(id, "size").ok_or_else(|| {
            Error::Malformed(format!(
                "array node {:?} has no size child",
                node.field_name
            ))
        })?;

        // the size sibling is always a 4-byte count, read before any data element
        let count = cursor.read_i32_endian(self.endianness)?;
        let count = usize::try_from(count)
            .map_err(|_| Error::Malformed(format!("negative array size {count}")))?;

        let data_node = tree.node(data_id);
        let value = if !data_node.children.is_empty() {
            let items = (0..count)
                .map(|_| self.read_node(cursor, tree, data_id))
                .collect::<Result<Vec<_>>>()?;
            FieldValue::List(items)
        } else if is_byte_type(&data_node.type_name) {
            let value = self.read_byte_array(cursor, count)?;
            if self.align_arrays() {
                align_cursor(cursor);
            }
            value
        } else {
            let items = (0..count)
                .map(|_| self.read_primitive(cursor, &data_node.type_name))
                .collect::<Result<Vec<_>>>()?;
            if self.align_arrays() {
                align_cursor(cursor);
            }
            FieldValue::ScalarList(items)
        };

        Ok(FieldNode {
            type_name: node.type_name.clone(),
            name: node.field_name.clone(),
            align: node.force_align(),
            value,
        })
    }

    /// Bulk read of a byte/char array.
    ///
    /// When the declared size exceeds the remaining bytes and exactly 4 bytes remain, those 4
    /// bytes are an offset into the side-loaded resource stream rather than literal content.
    /// The keying on the exact byte count is a preserved quirk of the wire format, not a
    /// general mechanism.
    fn read_byte_array(&self, cursor: &mut Cursor<&[u8]>, count: usize) -> Result<FieldValue> {
        let remaining = cursor.get_ref().len() as u64 - cursor.position();
        if count as u64 > remaining && remaining == 4 {
            let offset = cursor.read_u32_endian(self.endianness)?;
            let data = match self.resources {
                Some(resources) => resources
                    .get(offset as usize..offset as usize + count)
                    .ok_or_else(|| {
                        Error::Malformed(format!(
                            "resource offset {offset} with length {count} is out of range"
                        ))
                    })?
                    .to_vec(),
                None => vec![0; count],
            };
            return Ok(FieldValue::ResourceBuffer { offset, data });
        }

        let mut data = vec![0u8; count];
        cursor.read_exact(&mut data)?;
        Ok(FieldValue::Buffer(data))
    }

    fn read_primitive(&self, cursor: &mut Cursor<&[u8]>, type_name: &str) -> Result<FieldValue> {
        let endian = self.endianness;
        Ok(match type_name {
            "bool" => FieldValue::Bool(cursor.read_u8()? != 0),
            "SInt8" => FieldValue::SInt8(cursor.read_i8()?),
            "UInt8" | "char" => FieldValue::UInt8(cursor.read_u8()?),
            "SInt16" | "short" => FieldValue::SInt16(cursor.read_i16_endian(endian)?),
            "UInt16" | "unsigned short" => FieldValue::UInt16(cursor.read_u16_endian(endian)?),
            "SInt32" | "int" => FieldValue::SInt32(cursor.read_i32_endian(endian)?),
            "UInt32" | "unsigned int" => FieldValue::UInt32(cursor.read_u32_endian(endian)?),
            "SInt64" | "long long" | "long" => FieldValue::SInt64(cursor.read_i64_endian(endian)?),
            "UInt64" | "unsigned long long" => FieldValue::UInt64(cursor.read_u64_endian(endian)?),
            "float" => FieldValue::Float(cursor.read_f32_endian(endian)?),
            "double" => FieldValue::Double(cursor.read_f64_endian(endian)?),
            unknown => return Err(Error::UnknownPrimitive(unknown.to_owned())),
        })
    }

    fn write_node(&self, cursor: &mut Cursor<Vec<u8>>, node: &FieldNode) -> Result<()> {
        let endian = self.endianness;
        match &node.value {
            FieldValue::Bool(value) => cursor.write_u8(*value as u8)?,
            FieldValue::SInt8(value) => cursor.write_i8(*value)?,
            FieldValue::UInt8(value) => cursor.write_u8(*value)?,
            FieldValue::SInt16(value) => cursor.write_i16_endian(*value, endian)?,
            FieldValue::UInt16(value) => cursor.write_u16_endian(*value, endian)?,
            FieldValue::SInt32(value) => cursor.write_i32_endian(*value, endian)?,
            FieldValue::UInt32(value) => cursor.write_u32_endian(*value, endian)?,
            FieldValue::SInt64(value) => cursor.write_i64_endian(*value, endian)?,
            FieldValue::UInt64(value) => cursor.write_u64_endian(*value, endian)?,
            FieldValue::Float(value) => cursor.write_f32_endian(*value, endian)?,
            FieldValue::Double(value) => cursor.write_f64_endian(*value, endian)?,
            FieldValue::Buffer(data) => {
                cursor.write_i32_endian(data.len() as i32, endian)?;
                cursor.write_all(data)?;
                if self.align_arrays() {
                    align_writer(cursor);
                }
            }
            FieldValue::ResourceBuffer { .. } => {
                return Err(Error::UnsupportedSerialize {
                    field: node.name.clone(),
                    reason: "content lives in an external resource stream".into(),
                });
            }
            FieldValue::Text { raw, .. } => {
                cursor.write_i32_endian(raw.len() as i32, endian)?;
                cursor.write_all(raw)?;
                if self.align_arrays() {
                    align_writer(cursor);
                }
            }
            FieldValue::Fields(children) => {
                for child in children {
                    self.write_node(cursor, child)?;
                }
            }
            FieldValue::List(items) => {
                cursor.write_i32_endian(items.len() as i32, endian)?;
                for item in items {
                    self.write_node(cursor, item)?;
                }
            }
            FieldValue::ScalarList(items) => {
                cursor.write_i32_endian(items.len() as i32, endian)?;
                for item in items {
                    self.write_scalar(cursor, node, item)?;
                }
                if self.align_arrays() {
                    align_writer(cursor);
                }
            }
        }

        if node.align {
            align_writer(cursor);
        }

        Ok(())
    }

    fn write_scalar(
        &self,
        cursor: &mut Cursor<Vec<u8>>,
        parent: &FieldNode,
        value: &FieldValue,
    ) -> Result<()> {
        let endian = self.endianness;
        match value {
            FieldValue::Bool(value) => cursor.write_u8(*value as u8)?,
            FieldValue::SInt8(value) => cursor.write_i8(*value)?,
            FieldValue::UInt8(value) => cursor.write_u8(*value)?,
            FieldValue::SInt16(value) => cursor.write_i16_endian(*value, endian)?,
            FieldValue::UInt16(value) => cursor.write_u16_endian(*value, endian)?,
            FieldValue::SInt32(value) => cursor.write_i32_endian(*value, endian)?,
            FieldValue::UInt32(value) => cursor.write_u32_endian(*value, endian)?,
            FieldValue::SInt64(value) => cursor.write_i64_endian(*value, endian)?,
            FieldValue::UInt64(value) => cursor.write_u64_endian(*value, endian)?,
            FieldValue::Float(value) => cursor.write_f32_endian(*value, endian)?,
            FieldValue::Double(value) => cursor.write_f64_endian(*value, endian)?,
            _ => {
                return Err(Error::UnsupportedSerialize {
                    field: parent.name.clone(),
                    reason: "scalar array holds a non-primitive element".into(),
                });
            }
        }
        Ok(())
    }
}

/// Whether the schema node is an array container.
fn is_array_node(tree: &TypeTree, id: NodeId) -> bool {
    let node = tree.node(id);
    node.is_array
        || ((node.type_name == "Array" || node.type_name == "TypelessData")
            && !node.children.is_empty())
}

fn is_byte_type(type_name: &str) -> bool {
    matches!(type_name, "UInt8" | "SInt8" | "char" | "bool")
}

/// Replace a decoded `string` node's array-of-char child with UTF-8 text.
///
/// The raw bytes are kept so the node re-serializes byte-for-byte.
fn collapse_string(node: &mut FieldNode) {
    let FieldValue::Fields(children) = &mut node.value else {
        return;
    };
    let [array] = children.as_mut_slice() else {
        return;
    };
    if array.align {
        return;
    }
    let FieldValue::Buffer(raw) = std::mem::replace(&mut array.value, FieldValue::Bool(false))
    else {
        return;
    };

    let text = String::from_utf8_lossy(&raw).into_owned();
    node.value = FieldValue::Text { raw, text };
}

fn align_cursor(cursor: &mut Cursor<&[u8]>) {
    cursor.set_position(align4(cursor.position()));
}

pub(crate) fn align_writer(cursor: &mut Cursor<Vec<u8>>) {
    let target = align4(cursor.get_ref().len() as u64);
    while (cursor.get_ref().len() as u64) < target {
        cursor.get_mut().push(0);
    }
    cursor.set_position(target);
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;
    use tracing_test::traced_test;
    use unity_typetree::{Endianness, TypeNode, TypeTree};

    use super::{FieldValue, ObjectCodec};
    use crate::error::{Error, Result};

    fn codec() -> ObjectCodec<'static> {
        ObjectCodec::new(Endianness::Little, 15)
    }

    fn byte_array_tree() -> TypeTree {
        let mut tree = TypeTree::new();
        let mut array = TypeNode::new("TypelessData", "m_Payload", -1);
        array.is_array = true;
        let root = tree.push_child(None, array);
        tree.push_child(Some(root), TypeNode::new("SInt32", "size", 4));
        tree.push_child(Some(root), TypeNode::new("UInt8", "data", 1));
        tree
    }

    fn int_vector_tree() -> TypeTree {
        let mut tree = TypeTree::new();
        let root = tree.push_child(None, TypeNode::new("vector", "m_Values", -1));
        let mut array = TypeNode::new("Array", "Array", -1);
        array.is_array = true;
        let array = tree.push_child(Some(root), array);
        tree.push_child(Some(array), TypeNode::new("SInt32", "size", 4));
        tree.push_child(Some(array), TypeNode::new("SInt32", "data", 4));
        tree
    }

    fn string_tree() -> TypeTree {
        let mut tree = TypeTree::new();
        let root = tree.push_child(None, TypeNode::new("MonoScript", "Base", -1));

        let mut name = TypeNode::new("string", "m_Name", -1);
        name.meta_flags = TypeNode::FORCE_ALIGN;
        let name = tree.push_child(Some(root), name);
        let mut array = TypeNode::new("Array", "Array", -1);
        array.is_array = true;
        let array = tree.push_child(Some(name), array);
        tree.push_child(Some(array), TypeNode::new("SInt32", "size", 4));
        tree.push_child(Some(array), TypeNode::new("char", "data", 1));

        tree.push_child(Some(root), TypeNode::new("SInt32", "m_ExecutionOrder", 4));
        tree
    }

    #[traced_test]
    #[test]
    fn byte_array_consumes_size_data_and_padding() -> Result<()> {
        // size 5, five bytes of data, three bytes of alignment padding
        let data = [5, 0, 0, 0, 1, 2, 3, 4, 5, 0, 0, 0];

        let decoded = codec().deserialize(&data, &byte_array_tree())?;
        assert_eq!(decoded.as_bytes(), Some(&[1u8, 2, 3, 4, 5][..]));
        Ok(())
    }

    #[traced_test]
    #[test]
    fn byte_array_without_padding_below_version_6() -> Result<()> {
        let data = [5, 0, 0, 0, 1, 2, 3, 4, 5];

        let codec = ObjectCodec::new(Endianness::Little, 5);
        let decoded = codec.deserialize(&data, &byte_array_tree())?;
        assert_eq!(decoded.as_bytes(), Some(&[1u8, 2, 3, 4, 5][..]));
        Ok(())
    }

    #[traced_test]
    #[test]
    fn trailing_bytes_are_fatal() {
        let data = [5, 0, 0, 0, 1, 2, 3, 4, 5, 0, 0, 0, 9];

        let result = codec().deserialize(&data, &byte_array_tree());
        assert!(matches!(result, Err(Error::TrailingBytes(1))));
    }

    #[traced_test]
    #[test]
    fn scalar_array_reads_elementwise() -> Result<()> {
        let mut data = Vec::new();
        data.extend_from_slice(&3i32.to_le_bytes());
        for value in [10i32, 20, 30] {
            data.extend_from_slice(&value.to_le_bytes());
        }

        let decoded = codec().deserialize(&data, &int_vector_tree())?;
        let array = decoded.child("Array").unwrap();
        assert_eq!(
            array.value,
            FieldValue::ScalarList(vec![
                FieldValue::SInt32(10),
                FieldValue::SInt32(20),
                FieldValue::SInt32(30),
            ])
        );
        Ok(())
    }

    #[traced_test]
    #[test]
    fn string_collapses_to_text_and_aligns() -> Result<()> {
        let mut data = Vec::new();
        data.extend_from_slice(&5i32.to_le_bytes());
        data.extend_from_slice(b"Hello");
        data.extend_from_slice(&[0, 0, 0]); // padding to 4
        data.extend_from_slice(&7i32.to_le_bytes());

        let decoded = codec().deserialize(&data, &string_tree())?;

        let name = decoded.child("m_Name").unwrap();
        assert_eq!(name.as_str(), Some("Hello"));
        assert_eq!(name.as_bytes(), Some(&b"Hello"[..]));
        assert_eq!(decoded.child("m_ExecutionOrder").unwrap().as_i64(), Some(7));
        Ok(())
    }

    #[traced_test]
    #[test]
    fn unknown_primitive_is_fatal() {
        let mut tree = TypeTree::new();
        tree.push_child(None, TypeNode::new("quaternion16", "m_Rot", 4));

        let result = codec().deserialize(&[0, 0, 0, 0], &tree);
        assert!(matches!(result, Err(Error::UnknownPrimitive(_))));
    }

    #[traced_test]
    #[test]
    fn resource_offset_quirk_is_exact_remainder_keyed() -> Result<()> {
        // declared size 16, but exactly 4 bytes remain: they are an offset into the side
        // buffer. A known fragility: 4 genuinely-literal trailing bytes would be
        // indistinguishable from an offset.
        let mut data = Vec::new();
        data.extend_from_slice(&16i32.to_le_bytes());
        data.extend_from_slice(&8u32.to_le_bytes());

        let resources: Vec<u8> = (0u8..32).collect();
        let codec = ObjectCodec::new(Endianness::Little, 15).with_resources(&resources);

        let decoded = codec.deserialize(&data, &byte_array_tree())?;
        assert_eq!(decoded.as_bytes(), Some(&resources[8..24]));
        Ok(())
    }

    #[traced_test]
    #[test]
    fn resource_offset_without_side_buffer_synthesizes_zeroes() -> Result<()> {
        let mut data = Vec::new();
        data.extend_from_slice(&16i32.to_le_bytes());
        data.extend_from_slice(&8u32.to_le_bytes());

        let decoded = codec().deserialize(&data, &byte_array_tree())?;
        assert_eq!(decoded.as_bytes(), Some(&[0u8; 16][..]));
        Ok(())
    }

    #[traced_test]
    #[test]
    fn resource_backed_buffers_refuse_serialization() -> Result<()> {
        let mut data = Vec::new();
        data.extend_from_slice(&16i32.to_le_bytes());
        data.extend_from_slice(&8u32.to_le_bytes());

        let decoded = codec().deserialize(&data, &byte_array_tree())?;
        let result = codec().serialize(&decoded);
        assert!(matches!(result, Err(Error::UnsupportedSerialize { .. })));
        Ok(())
    }

    #[traced_test]
    #[test]
    fn serialize_inverts_deserialize() -> Result<()> {
        let mut data = Vec::new();
        data.extend_from_slice(&5i32.to_le_bytes());
        data.extend_from_slice(b"Hello");
        data.extend_from_slice(&[0, 0, 0]);
        data.extend_from_slice(&7i32.to_le_bytes());

        let decoded = codec().deserialize(&data, &string_tree())?;
        assert_eq!(codec().serialize(&decoded)?, data);
        Ok(())
    }

    #[traced_test]
    #[test]
    fn serialize_inverts_big_endian_scalars() -> Result<()> {
        let mut data = Vec::new();
        data.extend_from_slice(&2i32.to_be_bytes());
        data.extend_from_slice(&300i32.to_be_bytes());
        data.extend_from_slice(&(-7i32).to_be_bytes());

        let codec = ObjectCodec::new(Endianness::Big, 3);
        let decoded = codec.deserialize(&data, &int_vector_tree())?;
        assert_eq!(codec.serialize(&decoded)?, data);
        Ok(())
    }

    #[traced_test]
    #[test]
    fn nested_composite_arrays_decode_by_count() -> Result<()> {
        // map-like: Array of pairs of (int, int)
        let mut tree = TypeTree::new();
        let root = tree.push_child(None, TypeNode::new("map", "m_Entries", -1));
        let mut array = TypeNode::new("Array", "Array", -1);
        array.is_array = true;
        let array = tree.push_child(Some(root), array);
        tree.push_child(Some(array), TypeNode::new("SInt32", "size", 4));
        let pair = tree.push_child(Some(array), TypeNode::new("pair", "data", -1));
        tree.push_child(Some(pair), TypeNode::new("SInt32", "first", 4));
        tree.push_child(Some(pair), TypeNode::new("SInt32", "second", 4));

        let mut data = Vec::new();
        data.extend_from_slice(&2i32.to_le_bytes());
        for value in [1i32, 2, 3, 4] {
            data.extend_from_slice(&value.to_le_bytes());
        }

        let decoded = codec().deserialize(&data, &tree)?;
        let pairs = decoded.child("Array").unwrap().as_list().unwrap();
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].child("first").unwrap().as_i64(), Some(1));
        assert_eq!(pairs[1].child("second").unwrap().as_i64(), Some(4));

        assert_eq!(codec().serialize(&decoded)?, data);
        Ok(())
    }
}
