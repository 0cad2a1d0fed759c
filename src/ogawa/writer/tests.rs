use super::*;
use crate::core::{ArchiveReader, MetaData, TimeSampling};
use crate::ogawa::format::{FROZEN_FLAG, FROZEN_OFFSET, HEADER_SIZE, OGAWA_MAGIC};
use crate::ogawa::OgawaArchiveReader;
use crate::util::{DataType, Dimensions, Error, ErrorKind, Result};
use std::fs::File;
use std::io::Read;
use tempfile::NamedTempFile;

fn reopen(writer: OgawaArchiveWriter) -> Result<OgawaArchiveReader> {
    OgawaArchiveReader::from_bytes("test", writer.into_bytes()?)
}

#[test]
fn test_write_empty_archive() -> Result<()> {
    let temp = NamedTempFile::new()?;
    let writer = OgawaArchiveWriter::create(temp.path(), WriteOptions::default())?;
    writer.close()?;

    let mut file = File::open(temp.path())?;
    let mut header = [0u8; HEADER_SIZE];
    file.read_exact(&mut header)?;
    assert_eq!(&header[0..5], OGAWA_MAGIC);
    assert_eq!(header[FROZEN_OFFSET], FROZEN_FLAG);

    let reader = OgawaArchiveReader::open(temp.path())?;
    assert_eq!(reader.top()?.num_children(), 0);
    assert_eq!(reader.num_time_samplings(), 1);
    Ok(())
}

#[test]
fn test_archive_metadata() -> Result<()> {
    let writer = OgawaArchiveWriter::in_memory(
        WriteOptions::default()
            .with_application("unit test")
            .with_description("empty"),
    )?;
    writer.set_archive_metadata("user", "value")?;
    let reader = reopen(writer)?;

    let md = reader.archive_metadata();
    assert_eq!(md.get(APPLICATION_KEY), Some("unit test"));
    assert_eq!(md.get(DESCRIPTION_KEY), Some("empty"));
    assert_eq!(md.get("user"), Some("value"));
    assert_eq!(md.get(ALEMBIC_VERSION_KEY), Some(library_version_string()));
    Ok(())
}

#[test]
fn test_hierarchy_and_properties() -> Result<()> {
    let writer = OgawaArchiveWriter::in_memory(WriteOptions::default())?;
    let ts = writer.add_time_sampling(TimeSampling::uniform(1.0 / 24.0, 0.0))?;
    let top = writer.top();
    let geo = top.create_child("geo", MetaData::new().with("schema", "Group_v1"))?;
    let mesh = geo.create_child("mesh", MetaData::new())?;
    assert_eq!(mesh.full_name(), "/geo/mesh");

    let props = mesh.properties()?;
    let count = props.create_scalar("count", DataType::INT32, ts)?;
    for v in [3i32, 3, 4] {
        count.set(v)?;
    }
    let points = props.create_array("P", DataType::VEC3F, ts)?;
    points.set_vec(&[0.0f32, 0.0, 0.0, 1.0, 0.0, 0.0])?;
    points.set_vec(&[0.0f32, 1.0, 0.0])?;
    let user = props.create_compound("user", MetaData::new())?;
    user.create_scalar("label", DataType::STRING, 0)?.set_string("hello")?;

    let reader = reopen(writer)?;
    let top = reader.top()?;
    let geo = top.child_by_name("geo")?;
    assert_eq!(geo.meta_data().schema(), Some("Group_v1"));
    let mesh = geo.child_by_name("mesh")?;
    assert_eq!(mesh.full_name(), "/geo/mesh");

    let props = mesh.properties()?;
    assert_eq!(props.num_properties(), 3);
    let count = props.scalar("count")?;
    assert_eq!(count.num_samples(), 3);
    assert_eq!(count.get::<i32>(1usize)?, 3);
    assert_eq!(count.get::<i32>(2usize)?, 4);
    assert_eq!(count.time_sampling().sample_time(2), 2.0 / 24.0);

    let points = props.array("P")?;
    assert_eq!(points.sample_dimensions(0)?, Dimensions::d1(2));
    assert_eq!(points.get_vec::<f32>(1usize)?, vec![0.0, 1.0, 0.0]);

    let label = props.compound("user")?.scalar("label")?;
    assert_eq!(label.get_string(0usize)?, "hello");
    assert_eq!(reader.max_num_samples_for_time_sampling(ts as usize), Some(3));
    Ok(())
}

#[test]
fn test_constant_property() -> Result<()> {
    let writer = OgawaArchiveWriter::in_memory(WriteOptions::default())?;
    let props = writer.top().create_child("a", MetaData::new())?.properties()?;
    let value = props.create_scalar("v", DataType::FLOAT64, 0)?;
    value.set(2.5f64)?;
    value.set_from_previous()?;
    value.set(2.5f64)?;

    let reader = reopen(writer)?;
    let value = reader.top()?.child(0)?.properties()?.scalar("v")?;
    assert!(value.is_constant());
    assert_eq!(value.num_samples(), 3);
    assert_eq!(value.get::<f64>(2usize)?, 2.5);
    Ok(())
}

#[test]
fn test_finalized_object_rejects_writes() -> Result<()> {
    let writer = OgawaArchiveWriter::in_memory(WriteOptions::default())?;
    let a = writer.top().create_child("a", MetaData::new())?;
    let props = a.properties()?;
    let v = props.create_scalar("v", DataType::INT32, 0)?;
    v.set(1i32)?;
    a.finalize()?;
    assert!(a.is_finalized());

    let err = v.set(2i32).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::OrderViolation);
    assert!(matches!(a.create_child("b", MetaData::new()), Err(Error::Frozen(_))));
    assert!(props.create_scalar("w", DataType::INT32, 0).is_err());

    // the rest of the tree is still open
    writer.top().create_child("b", MetaData::new())?;
    let reader = reopen(writer)?;
    assert_eq!(reader.top()?.num_children(), 2);
    Ok(())
}

#[test]
fn test_bad_arguments() -> Result<()> {
    let writer = OgawaArchiveWriter::in_memory(WriteOptions::default())?;
    let top = writer.top();
    top.create_child("a", MetaData::new())?;
    assert!(matches!(top.create_child("a", MetaData::new()), Err(Error::DuplicateName(_))));

    let props = top.create_child("b", MetaData::new())?.properties()?;
    assert!(matches!(
        props.create_scalar("v", DataType::INT32, 7),
        Err(Error::TimeSamplingOutOfBounds { .. })
    ));
    let v = props.create_scalar("v", DataType::INT32, 0)?;
    assert!(matches!(v.set_sample(&[0; 3]), Err(Error::BufferSize { .. })));
    assert!(matches!(v.set(1.0f32), Err(Error::TypeMismatch { .. })));
    assert!(v.set_from_previous().is_err());
    Ok(())
}

#[test]
fn test_dedup_shares_blobs() -> Result<()> {
    let writer = OgawaArchiveWriter::in_memory(WriteOptions::default())?;
    let top = writer.top();
    for name in ["a", "b"] {
        let props = top.create_child(name, MetaData::new())?.properties()?;
        props.create_array("P", DataType::FLOAT32, 0)?.set_vec(&[1.0f32, 2.0, 3.0])?;
    }
    assert_eq!(writer.num_stored_samples(), 1);

    let plain = OgawaArchiveWriter::in_memory(WriteOptions::default().with_dedup(false))?;
    let top = plain.top();
    for name in ["a", "b"] {
        let props = top.create_child(name, MetaData::new())?.properties()?;
        props.create_array("P", DataType::FLOAT32, 0)?.set_vec(&[1.0f32, 2.0, 3.0])?;
    }
    assert_eq!(plain.num_stored_samples(), 0);
    let shared = writer.into_bytes()?;
    let unshared = plain.into_bytes()?;
    assert!(shared.len() < unshared.len());
    Ok(())
}

#[test]
fn test_handles_outlive_close() -> Result<()> {
    let writer = OgawaArchiveWriter::in_memory(WriteOptions::default())?;
    let a = writer.top().create_child("a", MetaData::new())?;
    writer.close()?;
    assert!(matches!(a.create_child("b", MetaData::new()), Err(Error::Frozen(_))));
    assert!(a.finalize().is_err());
    Ok(())
}
