//! abcstore - inspect and verify archives.

use std::env;
use std::process;

use alembic_core::abc::{IArchive, ICompoundProperty, IObject};
use alembic_core::core::{
    ArrayPropertyReader, PropertyReader, SampledPropertyReader, ScalarPropertyReader,
};
use alembic_core::ogawa::ReadOptions;
use alembic_core::util::Result;
use rayon::prelude::*;
use tracing_subscriber::EnvFilter;

fn main() {
    let args: Vec<String> = env::args().collect();

    // Global flags
    let mut level = "warn";
    let mut json = false;
    let mut filtered_args: Vec<&str> = Vec::new();
    for arg in &args[1..] {
        match arg.as_str() {
            "-v" | "--verbose" => level = "debug",
            "-vv" | "--trace" => level = "trace",
            "-q" | "--quiet" => level = "error",
            "--json" => json = true,
            _ => filtered_args.push(arg),
        }
    }
    init_logging(level);

    let Some((&command, rest)) = filtered_args.split_first() else {
        print_usage(&args[0]);
        return;
    };

    let result = match (command, rest) {
        ("info" | "i", [file]) => cmd_info(file),
        ("tree" | "t", [file]) => open(file).and_then(|a| cmd_tree(&a, json)),
        ("meta" | "m", [file]) => cmd_meta(file, "/"),
        ("meta" | "m", [file, path]) => cmd_meta(file, path),
        ("verify", [file]) => cmd_verify(file),
        ("layer" | "l", files) if !files.is_empty() => {
            IArchive::open_layered(files, &ReadOptions::default()).and_then(|a| cmd_tree(&a, json))
        }
        ("help" | "h" | "-h" | "--help", _) => {
            print_usage(&args[0]);
            Ok(())
        }
        _ => {
            eprintln!("Unknown command or missing arguments: {}", filtered_args.join(" "));
            print_usage(&args[0]);
            process::exit(2);
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

/// `RUST_LOG` wins over the `-v`/`-q` flags.
fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_usage(prog: &str) {
    println!("abcstore - inspect archives");
    println!();
    println!("Usage: {prog} [options] <command> <file.abc>...");
    println!();
    println!("Commands:");
    println!("  i, info <file>          Archive summary");
    println!("  t, tree <file>          Object and property hierarchy");
    println!("  m, meta <file> [path]   Metadata of the archive or an object");
    println!("  verify <file>           Read every sample of every property");
    println!("  l, layer <files...>     Hierarchy of files layered in priority order");
    println!("  h, help                 Show this help");
    println!();
    println!("Options:");
    println!("  -v, --verbose  Debug output");
    println!("  -vv, --trace   Trace output (very verbose)");
    println!("  -q, --quiet    Errors only");
    println!("  --json         JSON output for tree and layer");
}

fn open(path: &str) -> Result<IArchive> {
    IArchive::open(path)
}

#[derive(Default)]
struct Counts {
    objects: usize,
    properties: usize,
    samples: usize,
}

fn count(object: &IObject, counts: &mut Counts) -> Result<()> {
    counts.objects += 1;
    count_properties(&object.getProperties()?, counts)?;
    for child in object.getChildren() {
        count(&child?, counts)?;
    }
    Ok(())
}

fn count_properties(compound: &ICompoundProperty, counts: &mut Counts) -> Result<()> {
    for i in 0..compound.getNumProperties() {
        counts.properties += 1;
        match compound.property(i)? {
            PropertyReader::Compound(c) => count_properties(&ICompoundProperty::new(c), counts)?,
            PropertyReader::Scalar(s) => counts.samples += s.num_samples(),
            PropertyReader::Array(a) => counts.samples += a.num_samples(),
        }
    }
    Ok(())
}

fn cmd_info(path: &str) -> Result<()> {
    let archive = open(path)?;
    let mut counts = Counts::default();
    count(&archive.getTop()?, &mut counts)?;

    println!("Archive:        {}", archive.getName());
    println!("Version:        {}", archive.getArchiveVersion());
    if let Some(app) = archive.app_name() {
        println!("Application:    {app}");
    }
    if let Some(desc) = archive.user_description() {
        println!("Description:    {desc}");
    }
    println!("Objects:        {}", counts.objects);
    println!("Properties:     {}", counts.properties);
    println!("Samples:        {}", counts.samples);
    println!("Time samplings: {}", archive.getNumTimeSamplings());
    for i in 0..archive.getNumTimeSamplings() {
        let ts = archive.getTimeSampling(i)?;
        let max = archive
            .max_num_samples_for_time_sampling(i)
            .map_or_else(|| "?".to_string(), |n| n.to_string());
        println!(
            "  [{i}] {:?} per cycle {} times {:?} max samples {max}",
            ts.kind(),
            ts.time_per_cycle(),
            ts.stored_times()
        );
    }
    Ok(())
}

fn cmd_tree(archive: &IArchive, json: bool) -> Result<()> {
    let top = archive.getTop()?;
    if json {
        let value = serde_json::json!({
            "archive": archive.getName(),
            "top": object_json(&top)?,
        });
        println!("{}", serde_json::to_string_pretty(&value).unwrap_or_default());
    } else {
        println!("Archive: {}", archive.getName());
        print_object(&top, 0)?;
    }
    Ok(())
}

fn print_object(object: &IObject, depth: usize) -> Result<()> {
    let indent = "  ".repeat(depth);
    let name = if object.isRoot() { "/" } else { object.getName() };
    match object.getMetaData().schema() {
        Some(schema) => println!("{indent}{name} [{schema}]"),
        None => println!("{indent}{name}"),
    }
    print_properties(&object.getProperties()?, depth + 1)?;
    for child in object.getChildren() {
        print_object(&child?, depth + 1)?;
    }
    Ok(())
}

fn print_properties(compound: &ICompoundProperty, depth: usize) -> Result<()> {
    let indent = "  ".repeat(depth);
    for i in 0..compound.getNumProperties() {
        let header = compound.property_header(i)?;
        match compound.property(i)? {
            PropertyReader::Compound(c) => {
                println!("{indent}.{} {{}}", header.name);
                print_properties(&ICompoundProperty::new(c), depth + 1)?;
            }
            PropertyReader::Scalar(s) => println!(
                "{indent}.{} {} x{}",
                header.name,
                header.data_type,
                s.num_samples()
            ),
            PropertyReader::Array(a) => println!(
                "{indent}.{} {}[] x{}",
                header.name,
                header.data_type,
                a.num_samples()
            ),
        }
    }
    Ok(())
}

fn object_json(object: &IObject) -> Result<serde_json::Value> {
    let children = object
        .getChildren()
        .map(|c| object_json(&c?))
        .collect::<Result<Vec<_>>>()?;
    Ok(serde_json::json!({
        "name": object.getName(),
        "path": object.getFullName(),
        "metadata": object.getMetaData().serialize(),
        "properties": properties_json(&object.getProperties()?)?,
        "children": children,
    }))
}

fn properties_json(compound: &ICompoundProperty) -> Result<Vec<serde_json::Value>> {
    let mut out = Vec::new();
    for i in 0..compound.getNumProperties() {
        let header = compound.property_header(i)?;
        let mut value = serde_json::json!({
            "name": header.name,
            "kind": header.property_type.name(),
        });
        match compound.property(i)? {
            PropertyReader::Compound(c) => {
                value["properties"] = properties_json(&ICompoundProperty::new(c))?.into();
            }
            PropertyReader::Scalar(s) => {
                value["type"] = header.data_type.to_string().into();
                value["samples"] = s.num_samples().into();
            }
            PropertyReader::Array(a) => {
                value["type"] = header.data_type.to_string().into();
                value["samples"] = a.num_samples().into();
            }
        }
        out.push(value);
    }
    Ok(out)
}

fn cmd_meta(path: &str, object_path: &str) -> Result<()> {
    let archive = open(path)?;
    let md = if object_path == "/" {
        archive.archive_metadata().clone()
    } else {
        archive.find_object(object_path)?.getMetaData().clone()
    };
    for (key, value) in md.iter() {
        println!("{key} = {value}");
    }
    Ok(())
}

fn collect_sampled(compound: &ICompoundProperty, out: &mut Vec<PropertyReader>) -> Result<()> {
    for i in 0..compound.getNumProperties() {
        match compound.property(i)? {
            PropertyReader::Compound(c) => collect_sampled(&ICompoundProperty::new(c), out)?,
            other => out.push(other),
        }
    }
    Ok(())
}

fn collect_object(object: &IObject, out: &mut Vec<PropertyReader>) -> Result<()> {
    collect_sampled(&object.getProperties()?, out)?;
    for child in object.getChildren() {
        collect_object(&child?, out)?;
    }
    Ok(())
}

/// Read every stored sample, one property per task.
fn verify_property(property: &PropertyReader) -> Result<usize> {
    match property {
        PropertyReader::Scalar(s) => {
            for i in 0..s.num_samples() {
                s.read_sample_vec(i)?;
            }
            Ok(s.num_samples())
        }
        PropertyReader::Array(a) => {
            for i in 0..a.num_samples() {
                a.sample(i)?;
            }
            Ok(a.num_samples())
        }
        PropertyReader::Compound(_) => Ok(0),
    }
}

fn cmd_verify(path: &str) -> Result<()> {
    let archive = open(path)?;
    let mut properties = Vec::new();
    collect_object(&archive.getTop()?, &mut properties)?;

    let results: Vec<(String, Result<usize>)> = properties
        .par_iter()
        .map(|p| (p.header().name.clone(), verify_property(p)))
        .collect();

    let mut samples = 0;
    let mut failures = 0;
    for (name, result) in results {
        match result {
            Ok(n) => samples += n,
            Err(e) => {
                failures += 1;
                eprintln!("  {name}: {e}");
            }
        }
    }
    println!(
        "{}: {} properties, {samples} samples, {failures} failures",
        archive.getName(),
        properties.len()
    );
    if failures > 0 {
        process::exit(1);
    }
    Ok(())
}
