//! Decoded array samples shared between properties.

use std::sync::Arc;

use alembic_core::abc::{IArchive, OArchive, WriteOptions};
use alembic_core::core::{MetaData, Slab};
use alembic_core::ogawa::OgawaArchiveReader;
use alembic_core::util::{DataType, Result};

fn write_twins(dedup: bool) -> Result<Vec<u8>> {
    let writer = OArchive::in_memory(WriteOptions::default().with_dedup(dedup))?;
    let props = writer.top().create_child("mesh", MetaData::new())?.properties()?;
    let values: Vec<i32> = (0..64).collect();
    props.create_array("a", DataType::INT32, 0)?.set_vec(&values)?;
    props.create_array("b", DataType::INT32, 0)?.set_vec(&values)?;
    props.create_array("c", DataType::INT32, 0)?.set_vec(&[1i32, 2])?;
    writer.into_bytes()
}

#[test]
fn test_deduplicated_samples_share_one_slab() -> Result<()> {
    let reader = Arc::new(OgawaArchiveReader::from_bytes("twins", write_twins(true)?)?);
    let archive = IArchive::from_reader(reader.clone());
    let props = archive.find_object("/mesh")?.getProperties()?;
    let (a, b, c) = (props.array("a")?, props.array("b")?, props.array("c")?);

    let first = a.get_sample(0)?;
    let reads = reader.read_count();
    let again = a.get_sample(0)?;
    assert_eq!(reader.read_count(), reads);
    assert!(Slab::ptr_eq(&first, &again));

    let twin = b.get_sample(0)?;
    assert!(Slab::ptr_eq(&first, &twin));
    assert_eq!(twin.holders(), 3);
    assert!(!Slab::ptr_eq(&first, &c.get_sample(0)?));

    reader.cache().release(first);
    reader.cache().release(again);
    assert_eq!(twin.to_vec::<i32>()?.len(), 64);
    assert_eq!(twin.dims().num_points(), Some(64));
    assert_eq!(reader.cache().len(), 1);

    drop(twin);
    assert!(reader.cache().is_empty());
    let reads = reader.read_count();
    let fresh = a.get_sample(0)?;
    assert!(reader.read_count() > reads);
    assert_eq!(fresh.to_vec::<i32>()?[63], 63);
    Ok(())
}

#[test]
fn test_separate_blobs_do_not_share() -> Result<()> {
    let reader = OgawaArchiveReader::from_bytes("copies", write_twins(false)?)?;
    let archive = IArchive::from_reader(Arc::new(reader));
    let props = archive.find_object("/mesh")?.getProperties()?;

    let a = props.array("a")?.get_sample(0)?;
    let b = props.array("b")?.get_sample(0)?;
    assert!(!Slab::ptr_eq(&a, &b));
    assert_eq!(a.bytes(), b.bytes());
    assert_eq!(props.array("a")?.get_key(0)?, props.array("b")?.get_key(0)?);
    Ok(())
}
