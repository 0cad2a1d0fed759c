//! Several archives read as one tree.

use std::sync::Arc;

use alembic_core::abc::{IArchive, OArchive, OObject, WriteOptions};
use alembic_core::core::{ArchiveReader, CompoundPropertyReader, MetaData, ObjectReader};
use alembic_core::layer::{set_prune, set_replace, LayeredArchiveReader};
use alembic_core::ogawa::{OgawaArchiveReader, ReadOptions};
use alembic_core::util::{DataType, Result};
use tempfile::NamedTempFile;

fn build(name: &str, fill: impl FnOnce(&OArchive) -> Result<()>) -> Result<Arc<dyn ArchiveReader>> {
    let writer = OArchive::in_memory(WriteOptions::default().with_application(name))?;
    fill(&writer)?;
    Ok(Arc::new(OgawaArchiveReader::from_bytes(name, writer.into_bytes()?)?))
}

fn int_prop(object: &OObject, name: &str, value: i32) -> Result<()> {
    object
        .properties()?
        .create_scalar(name, DataType::INT32, 0)?
        .set(value)
}

fn child_names(archive: &IArchive, path: &str) -> Result<Vec<String>> {
    archive
        .find_object(path)?
        .getChildren()
        .map(|c| c.map(|c| c.getName().to_string()))
        .collect()
}

fn flagged(set: fn(&mut MetaData, bool)) -> MetaData {
    let mut md = MetaData::new();
    set(&mut md, true);
    md
}

#[test]
fn test_objects_and_properties_merge_by_name() -> Result<()> {
    let high = build("high", |w| {
        let geo = w.top().create_child("geo", MetaData::new())?;
        int_prop(&geo, "shared", 1)?;
        geo.create_child("one", MetaData::new())?;
        Ok(())
    })?;
    let low = build("low", |w| {
        let geo = w.top().create_child("geo", MetaData::new())?;
        int_prop(&geo, "shared", 2)?;
        int_prop(&geo, "extra", 3)?;
        geo.create_child("two", MetaData::new())?;
        w.top().create_child("other", MetaData::new())?;
        Ok(())
    })?;

    let archive = IArchive::layered(vec![high, low])?;
    assert_eq!(archive.getName(), "high + low");
    assert_eq!(archive.app_name(), Some("high"));
    assert_eq!(child_names(&archive, "/")?, vec!["geo", "other"]);
    assert_eq!(child_names(&archive, "/geo")?, vec!["one", "two"]);
    assert_eq!(archive.find_object("/geo/two")?.getFullName(), "/geo/two");

    let props = archive.find_object("/geo")?.getProperties()?;
    assert_eq!(props.property_names(), vec!["shared", "extra"]);
    assert_eq!(props.scalar("shared")?.get::<i32>(0)?, 1);
    assert_eq!(props.scalar("extra")?.get::<i32>(0)?, 3);
    Ok(())
}

#[test]
fn test_prune_hides_lower_layers() -> Result<()> {
    let high = build("high", |w| {
        w.top().create_child("geo", flagged(set_prune))?;
        Ok(())
    })?;
    let low = build("low", |w| {
        let geo = w.top().create_child("geo", MetaData::new())?;
        int_prop(&geo, "hidden", 7)?;
        geo.create_child("shape", MetaData::new())?;
        Ok(())
    })?;

    let archive = IArchive::layered(vec![high, low])?;
    let geo = archive.find_object("/geo")?;
    assert_eq!(geo.getNumChildren(), 0);
    assert!(!geo.getProperties()?.has_property("hidden"));
    assert!(!archive.has_object("/geo/shape"));
    Ok(())
}

#[test]
fn test_replace_limits_names_to_the_replacing_layer() -> Result<()> {
    let high = build("high", |w| {
        let geo = w.top().create_child("geo", flagged(set_replace))?;
        geo.create_child("keep", MetaData::new())?;
        Ok(())
    })?;
    let low = build("low", |w| {
        let geo = w.top().create_child("geo", MetaData::new())?;
        int_prop(&geo, "dropped", 1)?;
        let keep = geo.create_child("keep", MetaData::new())?;
        int_prop(&keep, "lower", 5)?;
        keep.create_child("leaf", MetaData::new())?;
        geo.create_child("drop", MetaData::new())?;
        Ok(())
    })?;

    let archive = IArchive::layered(vec![high, low])?;
    assert_eq!(child_names(&archive, "/geo")?, vec!["keep"]);
    assert!(!archive.find_object("/geo")?.getProperties()?.has_property("dropped"));
    assert!(!archive.has_object("/geo/drop"));

    // Children of the replacing layer still merge with the lower layer.
    assert_eq!(child_names(&archive, "/geo/keep")?, vec!["leaf"]);
    let keep = archive.find_object("/geo/keep")?.getProperties()?;
    assert_eq!(keep.scalar("lower")?.get::<i32>(0)?, 5);
    Ok(())
}

#[test]
fn test_replace_and_prune_differ_below_the_flag() -> Result<()> {
    let lower = || {
        build("low", |w| {
            let geo = w.top().create_child("geo", MetaData::new())?;
            let keep = geo.create_child("keep", MetaData::new())?;
            int_prop(&keep, "lower", 9)?;
            keep.create_child("leaf", MetaData::new())?;
            Ok(())
        })
    };
    let upper = |flag: fn(&mut MetaData, bool)| {
        build("high", move |w| {
            let geo = w.top().create_child("geo", flagged(flag))?;
            let keep = geo.create_child("keep", MetaData::new())?;
            int_prop(&keep, "upper", 1)?;
            Ok(())
        })
    };

    let replaced = IArchive::layered(vec![upper(set_replace)?, lower()?])?;
    let keep = replaced.find_object("/geo/keep")?;
    assert_eq!(keep.getNumChildren(), 1);
    assert_eq!(keep.getProperties()?.property_names(), vec!["upper", "lower"]);

    let pruned = IArchive::layered(vec![upper(set_prune)?, lower()?])?;
    let keep = pruned.find_object("/geo/keep")?;
    assert_eq!(keep.getNumChildren(), 0);
    assert_eq!(keep.getProperties()?.property_names(), vec!["upper"]);
    Ok(())
}

#[test]
fn test_layer_order_decides_priority() -> Result<()> {
    let make = |name: &str, value: i32| {
        build(name, |w| int_prop(&w.top().create_child("a", MetaData::new())?, "v", value))
    };
    let forward = LayeredArchiveReader::new(vec![make("x", 1)?, make("y", 2)?])?;
    let backward = LayeredArchiveReader::new(vec![make("y", 2)?, make("x", 1)?])?;
    assert_eq!(forward.layers().len(), 2);

    for (reader, expected) in [(forward, 1), (backward, 2)] {
        let a = reader.top()?.child_by_name("a")?;
        assert_eq!(a.properties()?.scalar("v")?.get::<i32>(0)?, expected);
    }
    Ok(())
}

#[test]
fn test_open_layered_files() -> Result<()> {
    let high = NamedTempFile::new()?;
    let low = NamedTempFile::new()?;
    for (file, child) in [(&high, "a"), (&low, "b")] {
        let writer = OArchive::create(file.path(), WriteOptions::default())?;
        writer.top().create_child(child, MetaData::new())?;
        writer.close()?;
    }

    let archive = IArchive::open_layered(&[high.path(), low.path()], &ReadOptions::default())?;
    assert_eq!(child_names(&archive, "/")?, vec!["a", "b"]);
    assert!(IArchive::layered(Vec::new()).is_err());
    Ok(())
}
