//! End-to-end flow over the container layers: bundle entry -> serialized file -> field trees,
//! including the type database fallback for files that omit their schemas.

use std::io::{Cursor, Read, Write};

use pretty_assertions::assert_eq;
use tracing_test::traced_test;

use unity_assets::{error::Result, SerializedFile};
use unity_bundle::write::BundleWriterOptions;
use unity_bundle::{BundleArchive, BundleSignature, BundleWriter};
use unity_typetree::{
    ClassSchema, Endianness, TypeDatabase, TypeForest, TypeNode, TypeTree, TypeTreeContext,
};

fn transform_tree() -> TypeTree {
    let mut tree = TypeTree::new();
    let root = tree.push_child(None, TypeNode::new("Transform", "Base", -1));
    tree.push_child(Some(root), TypeNode::new("float", "m_X", 4));
    tree.push_child(Some(root), TypeNode::new("float", "m_Y", 4));
    tree.push_child(Some(root), TypeNode::new("float", "m_Z", 4));
    tree
}

fn serialized_bytes(embed_schema: bool) -> Vec<u8> {
    let mut file = SerializedFile::new(15, Endianness::Little);

    file.set_types(TypeForest {
        engine_version: Some("5.3.5f1".into()),
        attributes: Some(0),
        embedded: embed_schema,
        classes: vec![ClassSchema {
            class_id: 4,
            script_hash: None,
            type_hash: Some([0; 16]),
            tree: embed_schema.then(transform_tree),
        }],
    });

    let mut data = Vec::new();
    for value in [1.0f32, 2.0, 3.0] {
        data.extend_from_slice(&value.to_le_bytes());
    }
    file.add_object(
        unity_assets::types::ObjectInfo {
            path_id: 1,
            type_id: 4,
            class_id: 4,
            ..Default::default()
        },
        data,
    );

    let context = TypeTreeContext::new();
    let mut buffer = Cursor::new(Vec::new());
    file.write(&mut buffer, &context).unwrap();
    buffer.into_inner()
}

#[traced_test]
#[test]
fn bundle_entry_decodes_to_field_trees() -> Result<()> {
    let asset = serialized_bytes(true);

    let mut writer = BundleWriter::new(
        Cursor::new(Vec::new()),
        BundleWriterOptions::builder()
            .signature(BundleSignature::UnityWeb)
            .unity_version("5.x.x".into())
            .unity_revision("5.3.5f1".into())
            .build(),
    );
    writer.start_file("sharedassets0.assets")?;
    writer.write_all(&asset)?;
    let bundle = writer.finish()?.into_inner();

    let mut archive = BundleArchive::new(Cursor::new(bundle))?;
    let mut entry_bytes = Vec::new();
    archive
        .by_name("sharedassets0.assets")?
        .read_to_end(&mut entry_bytes)?;
    assert_eq!(entry_bytes, asset);

    let context = TypeTreeContext::new();
    let file = SerializedFile::read(&mut Cursor::new(entry_bytes), &context)?;

    let (record, fields) = file.decoded_objects().next().expect("decodable object");
    assert_eq!(record.path_id(), 1);
    assert_eq!(fields.child("m_X").unwrap().as_f32(), Some(1.0));
    assert_eq!(fields.child("m_Z").unwrap().as_f32(), Some(3.0));
    Ok(())
}

#[traced_test]
#[test]
fn type_database_supplies_omitted_schemas() -> Result<()> {
    let context = TypeTreeContext::new();

    // learn schemas from a file that embeds them
    let teaching = SerializedFile::read(&mut Cursor::new(serialized_bytes(true)), &context)?;
    let mut database = TypeDatabase::new();
    assert_eq!(teaching.learn_types(&mut database), 1);

    // a stripped file carries objects but no schemas
    let mut stripped = SerializedFile::read(&mut Cursor::new(serialized_bytes(false)), &context)?;
    let record = stripped.object(1).unwrap();
    assert!(!record.has_type_tree());
    assert!(record.field_tree().is_err());

    assert_eq!(stripped.resolve_types(&database), 1);

    let fields = stripped.object(1).unwrap().field_tree()?;
    assert_eq!(fields.child("m_Y").unwrap().as_f32(), Some(2.0));
    Ok(())
}
