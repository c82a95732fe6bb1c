use datamask_engine::GeneratorRegistry;

fn main() {
    let registry = GeneratorRegistry::with_builtins();
    for id in registry.ids() {
        println!("{id}");
    }
}
