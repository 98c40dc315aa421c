use std::path::Path;

use ferrule_core::FerrulePaths;
use ferrule_store::discovery;

pub fn execute(root: &Path) -> anyhow::Result<()> {
    let paths = FerrulePaths::discover(root);
    match discovery::read(&paths)? {
        Some(record) => {
            println!("Server advertised for {}", root.display());
            println!("  ide:      {}", record.ide);
            println!("  endpoint: {}", record.endpoint);
            println!("  version:  {}", record.version);
            println!("  actions:  {}", record.supported_actions.join(", "));
        }
        None => println!("No server running for {}", root.display()),
    }
    Ok(())
}
