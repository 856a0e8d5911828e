//! The packed string tables used by the V3 type tree encoding.
//!
//! Each class blob carries a local table of null-terminated strings; offsets with the high bit
//! set instead index a shared table of well-known field and type names that ships with the
//! engine. The shared table is bundled with this crate and materialized lazily inside a
//! caller-owned [`TypeTreeContext`].

use std::cell::OnceCell;
use std::collections::HashMap;

use crate::error::{Error, Result};

/// Offsets with this bit set index the shared table.
pub const COMMON_OFFSET_FLAG: u32 = 0x8000_0000;

/// The shared table of well-known names, in its canonical packing order. Offsets are derived
/// from this order, so it must not be rearranged.
const COMMON_STRINGS: &[&str] = &[
    "AABB",
    "AnimationClip",
    "AnimationCurve",
    "AnimationState",
    "Array",
    "Base",
    "BitField",
    "bitset",
    "bool",
    "char",
    "ColorRGBA",
    "Component",
    "data",
    "deque",
    "double",
    "dynamic_array",
    "FastPropertyName",
    "first",
    "float",
    "Font",
    "GameObject",
    "Generic Mono",
    "GradientNEW",
    "GUID",
    "GUIStyle",
    "int",
    "list",
    "long long",
    "map",
    "Matrix4x4f",
    "MdFour",
    "MonoBehaviour",
    "MonoScript",
    "m_Bits",
    "m_Component",
    "m_Data",
    "m_EditorClassIdentifier",
    "m_EditorHideFlags",
    "m_Enabled",
    "m_ExtensionPtr",
    "m_GameObject",
    "m_Index",
    "m_IsArray",
    "m_IsStatic",
    "m_MetaFlag",
    "m_Name",
    "m_ObjectHideFlags",
    "m_PrefabInternal",
    "m_PrefabParentObject",
    "m_Script",
    "m_StaticEditorFlags",
    "m_Type",
    "m_Version",
    "Object",
    "pair",
    "PPtr<Component>",
    "PPtr<GameObject>",
    "PPtr<Material>",
    "PPtr<MonoBehaviour>",
    "PPtr<MonoScript>",
    "PPtr<Object>",
    "PPtr<Prefab>",
    "PPtr<Sprite>",
    "PPtr<TextAsset>",
    "PPtr<Texture>",
    "PPtr<Texture2D>",
    "PPtr<Transform>",
    "Prefab",
    "Quaternionf",
    "Rectf",
    "RectInt",
    "RectOffset",
    "second",
    "set",
    "short",
    "size",
    "SInt16",
    "SInt32",
    "SInt64",
    "SInt8",
    "staticvector",
    "string",
    "TextAsset",
    "TextMesh",
    "Texture",
    "Texture2D",
    "Transform",
    "TypelessData",
    "UInt16",
    "UInt32",
    "UInt64",
    "UInt8",
    "unsigned int",
    "unsigned long long",
    "unsigned short",
    "vector",
    "Vector2f",
    "Vector3f",
    "Vector4f",
    "m_ScriptingClassIdentifier",
    "Gradient",
    "Type*",
    "int2_storage",
    "int3_storage",
    "BoundsInt",
    "m_CorrespondingSourceObject",
    "m_PrefabInstance",
    "m_PrefabAsset",
    "FileSize",
    "Hash128",
];

/// The materialized shared table, indexed both ways.
#[derive(Debug)]
pub struct CommonStrings {
    by_offset: HashMap<u32, &'static str>,
    by_name: HashMap<&'static str, u32>,
}

impl CommonStrings {
    fn build() -> Self {
        let mut by_offset = HashMap::with_capacity(COMMON_STRINGS.len());
        let mut by_name = HashMap::with_capacity(COMMON_STRINGS.len());

        let mut offset = 0u32;
        for &name in COMMON_STRINGS {
            by_offset.insert(offset, name);
            by_name.insert(name, offset);
            offset += name.len() as u32 + 1;
        }

        CommonStrings { by_offset, by_name }
    }

    /// Resolve a shared-table offset (without the high bit).
    pub fn get(&self, offset: u32) -> Option<&'static str> {
        self.by_offset.get(&offset).copied()
    }

    /// Shared-table offset of `name`, if it is a well-known string.
    pub fn offset_of(&self, name: &str) -> Option<u32> {
        self.by_name.get(name).copied()
    }
}

/// Caller-owned decode context.
///
/// Holds the lazily built shared string table. One context can be reused across any number of
/// decode calls; construction is free until the first V3 schema is decoded.
#[derive(Debug, Default)]
pub struct TypeTreeContext {
    common: OnceCell<CommonStrings>,
}

impl TypeTreeContext {
    pub fn new() -> Self {
        TypeTreeContext::default()
    }

    /// The shared string table, built on first use.
    pub fn common_strings(&self) -> &CommonStrings {
        self.common.get_or_init(CommonStrings::build)
    }
}

/// Resolve a V3 record's string offset against the local table or the shared table.
pub fn resolve_string(offset: u32, local: &[u8], common: &CommonStrings) -> Result<String> {
    if offset & COMMON_OFFSET_FLAG != 0 {
        return common
            .get(offset & !COMMON_OFFSET_FLAG)
            .map(str::to_owned)
            .ok_or(Error::StringTableOffset(offset));
    }

    let start = offset as usize;
    if start >= local.len() {
        return Err(Error::StringTableOffset(offset));
    }
    let end = local[start..]
        .iter()
        .position(|&b| b == 0)
        .map_or(local.len(), |nul| start + nul);
    Ok(String::from_utf8_lossy(&local[start..end]).into_owned())
}

/// Builder for a class's local string table.
///
/// Strings are packed back to back with null terminators; interning the same string twice
/// returns the original offset.
#[derive(Debug, Default)]
pub struct LocalStringTable {
    bytes: Vec<u8>,
    offsets: HashMap<String, u32>,
}

impl LocalStringTable {
    pub fn new() -> Self {
        LocalStringTable::default()
    }

    /// Offset of `name`, appending it to the table on first use.
    pub fn intern(&mut self, name: &str) -> u32 {
        if let Some(&offset) = self.offsets.get(name) {
            return offset;
        }
        let offset = self.bytes.len() as u32;
        self.bytes.extend_from_slice(name.as_bytes());
        self.bytes.push(0);
        self.offsets.insert(name.to_owned(), offset);
        offset
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// Offset for `name` when writing a V3 record: shared table first, local table otherwise.
pub fn intern_string(name: &str, local: &mut LocalStringTable, common: &CommonStrings) -> u32 {
    match common.offset_of(name) {
        Some(offset) => offset | COMMON_OFFSET_FLAG,
        None => local.intern(name),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn local_offsets_are_cumulative() {
        let mut table = LocalStringTable::new();
        assert_eq!(table.intern("Base"), 0);
        // one byte for the terminator
        assert_eq!(table.intern("m_X"), "Base".len() as u32 + 1);
        assert_eq!(table.intern("Base"), 0);
        assert_eq!(table.into_bytes(), b"Base\0m_X\0");
    }

    #[test]
    fn common_table_round_trips_known_names() {
        let context = TypeTreeContext::new();
        let common = context.common_strings();

        for name in ["Array", "m_Name", "string", "TypelessData", "data", "size"] {
            let offset = common.offset_of(name).unwrap();
            assert_eq!(common.get(offset), Some(name));
        }
    }

    #[test]
    fn resolve_prefers_table_selected_by_high_bit() {
        let context = TypeTreeContext::new();
        let common = context.common_strings();
        let local = b"m_Custom\0".to_vec();

        let array_offset = common.offset_of("Array").unwrap() | COMMON_OFFSET_FLAG;
        assert_eq!(resolve_string(array_offset, &local, common).unwrap(), "Array");
        assert_eq!(resolve_string(0, &local, common).unwrap(), "m_Custom");
    }

    #[test]
    fn unresolvable_offset_is_fatal() {
        let context = TypeTreeContext::new();
        let common = context.common_strings();

        assert!(resolve_string(0x7FFF_0000, b"", common).is_err());
        assert!(resolve_string(0xFFFF_0000, b"", common).is_err());
    }
}
