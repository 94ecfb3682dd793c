use crate::cli::utils::print_json;
use crate::cli::{app_state, OutputFormat};

pub async fn handle(path: String, output_format: OutputFormat) -> anyhow::Result<()> {
    let state = app_state()?;
    let lineage = state.lineage.chain(&path).await?;

    match output_format {
        OutputFormat::Json => print_json(&lineage)?,
        OutputFormat::Text => {
            for (depth, node) in lineage.chain.iter().enumerate() {
                let how = node.relation.map(|r| format!(" ({})", r)).unwrap_or_default();
                println!("{}{} [{}]{}", "  ".repeat(depth), node.path, node.stage, how);
            }
            if lineage.truncated {
                println!("(walk stopped early: hop limit or cycle)");
            }
            if !lineage.children.is_empty() {
                println!("derived:");
                for child in &lineage.children {
                    println!("  {} [{}]", child.path, child.stage);
                }
            }
        }
    }

    Ok(())
}
