//! Operator commands against the CareLink database: inspecting residents and users,
//! repairing family links and ownership of family accounts.

use std::io::{self, Write};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context};
use api::config::Settings;
use api::db::{self, PgStore};
use clap::{Parser, Subcommand};
use store::{CareStore, Role, User, UserChanges};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "carelink-admin")]
#[command(about = "Maintenance commands for the CareLink database")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List residents with their linked family members
    Residents,
    /// List users, optionally of one role
    Users {
        /// family, facility_staff or system_admin
        #[arg(long)]
        role: Option<Role>,
    },
    /// Link a family member to residents
    Link {
        /// Email of the family member
        #[arg(long)]
        user: String,
        #[arg(required = true)]
        residents: Vec<Uuid>,
    },
    /// Remove a family link
    Unlink {
        #[arg(long)]
        user: String,
        resident: Uuid,
    },
    /// Report whether a user is linked to a resident
    Check {
        #[arg(long)]
        user: String,
        resident: Uuid,
    },
    /// Record `creator` as the account creator of the given users
    CreatedBy {
        #[arg(long)]
        creator: String,
        #[arg(required = true)]
        users: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = Settings::new().context("Failed to load settings")?;
    let pool = db::get_pool(&settings.database)
        .await
        .context("Failed to connect to database")?;
    let store: Arc<dyn CareStore> = Arc::new(PgStore::new(pool.clone()));

    let mut out = io::stdout().lock();
    run(store.as_ref(), cli.command, &mut out).await
}

async fn user_by_email(store: &dyn CareStore, email: &str) -> anyhow::Result<User> {
    store
        .user_by_email(&email.trim().to_lowercase())
        .await?
        .ok_or_else(|| anyhow!("No user with email {email}"))
}

async fn run(store: &dyn CareStore, command: Command, out: &mut impl Write) -> anyhow::Result<()> {
    match command {
        Command::Residents => {
            let residents = store.list_residents().await?;
            for resident in &residents {
                let family = store.family_of_resident(resident.id).await?;
                let names: Vec<String> = family
                    .iter()
                    .map(|u| format!("{} <{}>", u.name, u.email))
                    .collect();
                writeln!(
                    out,
                    "{}  {}  room {}  family: {}",
                    resident.id,
                    resident.name,
                    resident.room.as_deref().unwrap_or("-"),
                    if names.is_empty() { "none".to_string() } else { names.join(", ") }
                )?;
            }
            writeln!(out, "{} resident(s)", residents.len())?;
        }
        Command::Users { role } => {
            let users = store.list_users(role).await?;
            for user in &users {
                let creator = match user.created_by {
                    Some(id) => store
                        .user_by_id(id)
                        .await?
                        .map_or_else(|| id.to_string(), |u| u.email),
                    None => "-".to_string(),
                };
                writeln!(
                    out,
                    "{}  {}  <{}>  {}  created by {creator}",
                    user.id, user.name, user.email, user.role
                )?;
            }
            writeln!(out, "{} user(s)", users.len())?;
        }
        Command::Link { user, residents } => {
            let user = user_by_email(store, &user).await?;
            if user.role != Role::Family {
                bail!("{} is {}, not a family member", user.email, user.role);
            }
            for id in residents {
                let Some(resident) = store.resident_by_id(id).await? else {
                    tracing::warn!("Resident {id} not found, skipping");
                    continue;
                };
                if store.is_family_member(id, user.id).await? {
                    writeln!(out, "{} already linked to {}", user.email, resident.name)?;
                    continue;
                }
                store.link_family(id, user.id).await?;
                writeln!(out, "Linked {} to {}", user.email, resident.name)?;
            }
        }
        Command::Unlink { user, resident } => {
            let user = user_by_email(store, &user).await?;
            if store.unlink_family(resident, user.id).await? {
                writeln!(out, "Unlinked {} from {resident}", user.email)?;
            } else {
                bail!("{} is not linked to {resident}", user.email);
            }
        }
        Command::Check { user, resident } => {
            let user = user_by_email(store, &user).await?;
            let linked = store.is_family_member(resident, user.id).await?;
            writeln!(
                out,
                "{} is {}linked to {resident}",
                user.email,
                if linked { "" } else { "not " }
            )?;
        }
        Command::CreatedBy { creator, users } => {
            let creator = user_by_email(store, &creator).await?;
            for email in users {
                let Some(user) = store.user_by_email(&email.trim().to_lowercase()).await? else {
                    tracing::warn!("User {email} not found, skipping");
                    continue;
                };
                store
                    .update_user(
                        user.id,
                        UserChanges {
                            created_by: Some(creator.id),
                            ..Default::default()
                        },
                    )
                    .await?;
                writeln!(out, "{} created by {}", user.email, creator.email)?;
            }
        }
    }
    Ok(())
}
