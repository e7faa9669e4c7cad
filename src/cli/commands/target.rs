//! Target extraction command.

use tilesolver::target::extract_target;

pub fn cmd_target(text: &str) -> anyhow::Result<()> {
    match extract_target(text) {
        Some(target) => {
            println!("{}", target);
            Ok(())
        }
        None => anyhow::bail!("No target number found in {:?}", text),
    }
}
