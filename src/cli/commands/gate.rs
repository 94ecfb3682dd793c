use clap::Subcommand;
use serde_json::json;

use crate::auth::Role;
use crate::cli::utils::print_json;
use crate::cli::OutputFormat;
use crate::middleware::gate::matching_rule;
use crate::middleware::{decide, RULES};

#[derive(Subcommand)]
pub enum GateCommands {
    #[command(about = "Show which rule covers a path and what a caller would get")]
    Check {
        #[arg(help = "Request path, e.g. /dashboard/billing")]
        path: String,

        #[arg(long, help = "Caller role; omit for an anonymous caller")]
        role: Option<Role>,
    },

    #[command(about = "List the prefix → role table")]
    Rules,
}

pub fn handle(cmd: GateCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        GateCommands::Check { path, role } => {
            let rule = matching_rule(&path);
            let decision = decide(&path, role);

            match output_format {
                OutputFormat::Json => print_json(&json!({
                    "path": path,
                    "rule": rule.map(|r| json!({ "prefix": r.prefix, "role": r.role })),
                    "role": role,
                    "decision": decision,
                }))?,
                OutputFormat::Text => {
                    match rule {
                        Some(r) => println!("{} matches {} (requires {})", path, r.prefix, r.role),
                        None => println!("{} is public", path),
                    }
                    let who = role.map(|r| r.to_string()).unwrap_or_else(|| "anonymous".to_string());
                    println!("{}: {}", who, decision);
                }
            }
            Ok(())
        }
        GateCommands::Rules => {
            match output_format {
                OutputFormat::Json => {
                    let rules: Vec<_> = RULES
                        .iter()
                        .map(|r| json!({ "prefix": r.prefix, "role": r.role }))
                        .collect();
                    print_json(&json!({ "rules": rules }))?
                }
                OutputFormat::Text => {
                    for r in RULES {
                        println!("{:<24} {}", r.prefix, r.role);
                    }
                }
            }
            Ok(())
        }
    }
}
