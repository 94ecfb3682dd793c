use clap::Subcommand;
use serde_json::json;

use crate::auth::Role;
use crate::cli::utils::*;
use crate::cli::{app_state, OutputFormat};

#[derive(Subcommand)]
pub enum UserCommands {
    #[command(about = "List dashboard users")]
    List,

    #[command(about = "Set a user's role")]
    Role {
        #[arg(help = "Firebase uid")]
        uid: String,

        #[arg(help = "viewer, editor or admin")]
        role: Role,
    },

    #[command(about = "Disable a user (or re-enable with --enable)")]
    Disable {
        #[arg(help = "Firebase uid")]
        uid: String,

        #[arg(long, help = "Re-enable instead of disabling")]
        enable: bool,
    },
}

pub async fn handle(cmd: UserCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    let state = app_state()?;

    match cmd {
        UserCommands::List => {
            let users = state.users.list().await?;
            if users.is_empty() {
                return output_empty_collection(&output_format, "users", "No users have signed in yet");
            }

            match output_format {
                OutputFormat::Json => print_json(&json!({ "users": users }))?,
                OutputFormat::Text => {
                    println!("{:<30} {:<32} {:<8} {:<9} {}", "UID", "EMAIL", "ROLE", "DISABLED", "LAST LOGIN");
                    println!("{}", "-".repeat(100));
                    for user in &users {
                        let last_login = user
                            .last_login_at
                            .map(|at| at.format("%Y-%m-%d %H:%M").to_string())
                            .unwrap_or_else(|| "-".to_string());
                        println!(
                            "{:<30} {:<32} {:<8} {:<9} {}",
                            user.uid,
                            user.email.as_deref().unwrap_or("-"),
                            user.role,
                            user.disabled,
                            last_login
                        );
                    }
                }
            }
            Ok(())
        }
        UserCommands::Role { uid, role } => {
            let user = state
                .users
                .set_role(&uid, role)
                .await?
                .ok_or_else(|| anyhow::anyhow!("user '{}' not found", uid))?;
            output_success(
                &output_format,
                &format!("{} is now {}", user.uid, user.role),
                Some(json!({ "user": user })),
            )
        }
        UserCommands::Disable { uid, enable } => {
            let user = state
                .users
                .set_disabled(&uid, !enable)
                .await?
                .ok_or_else(|| anyhow::anyhow!("user '{}' not found", uid))?;
            let verb = if user.disabled { "disabled" } else { "enabled" };
            output_success(
                &output_format,
                &format!("{} {}", user.uid, verb),
                Some(json!({ "user": user })),
            )
        }
    }
}
