use std::env;
use std::fs;
use std::path::PathBuf;

use datamask_config::load_config;
use datamask_core::Record;
use datamask_engine::{
    DescriptorRegistry, EngineOptions, GeneratorRegistry, MemoryRecordSource, MetadataProvider,
    Orchestrator, OverrideRegistry, SourceHandle,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = env::args().skip(1);
    let config_path = PathBuf::from(args.next().ok_or("usage: dry_run <config> <snapshot-dir>")?);
    let snapshot_dir = PathBuf::from(args.next().ok_or("missing snapshot dir")?);

    let config = load_config(&config_path)?;
    let source = config.sources.first().ok_or("config has no sources")?;
    let registry = DescriptorRegistry::from_source(source);

    let mut records = MemoryRecordSource::new();
    for entity in registry.list_entities() {
        let path = snapshot_dir.join(format!("{}.json", entity.table));
        if path.exists() {
            let rows: Vec<Record> = serde_json::from_str(&fs::read_to_string(path)?)?;
            records.insert_table(entity.table, rows);
        }
    }

    let options = EngineOptions {
        dry_run: true,
        ..EngineOptions::from_config(&config)
    };
    let orchestrator = Orchestrator::new(
        GeneratorRegistry::with_builtins(),
        OverrideRegistry::new(),
        options,
    );
    let mut sources = [SourceHandle::new(source.id.clone(), &registry, &mut records)];
    let outcome = orchestrator.run(&mut sources);

    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}
