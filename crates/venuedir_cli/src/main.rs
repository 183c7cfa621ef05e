//! Operator CLI for the venue directory.
//!
//! # Responsibility
//! - Map subcommands onto `VenueDirectoryService` operations.
//! - Print plain-text results and exit non-zero on failure.

mod cli;
mod settings;

use clap::Parser;
use cli::{Cli, Commands};
use log::info;
use settings::Overrides;
use std::process::ExitCode;
use venuedir_core::db::open_db_with_config;
use venuedir_core::{
    default_log_level, init_logging, Venue, VenueDirectoryService, VenueListQuery,
    VenueProperties,
};

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Some(log_dir) = cli.log_dir.as_deref() {
        let level = cli.log_level.as_deref().unwrap_or(default_log_level());
        if let Err(err) = init_logging(level, log_dir) {
            eprintln!("error: {err}");
            return ExitCode::FAILURE;
        }
    }

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let overrides = Overrides {
        case_insensitive: cli.case_insensitive,
        lock_timeout_ms: cli.lock_timeout_ms,
        lock_retries: cli.lock_retries,
        no_verify: cli.no_verify,
    };
    let config = settings::resolve(cli.config.as_deref(), &overrides)?;
    let conn = open_db_with_config(&cli.db, &config)?;
    let directory = VenueDirectoryService::new(&conn, config);
    info!(
        "event=cli_command module=cli status=start command={} lock_retries={} verify_invariants={}",
        command_name(&cli.command),
        directory.config().lock_retries,
        directory.config().verify_invariants
    );

    match cli.command {
        Commands::Assign {
            event,
            venue,
            timezone,
            city,
        } => {
            let seed = VenueProperties {
                timezone,
                city,
                ..VenueProperties::default()
            };
            match directory.assign_by_name(event, &venue, &seed)? {
                Some(venue) => print_venue(&venue),
                None => println!("event {event} has no venue"),
            }
        }
        Commands::Link { event, venue_id } => match directory.assign_by_id(event, venue_id)? {
            Some(venue) => print_venue(&venue),
            None => println!("event {event} has no venue"),
        },
        Commands::Create {
            name,
            city,
            timezone,
        } => {
            let properties = VenueProperties {
                name: Some(name),
                city,
                timezone,
                ..VenueProperties::default()
            };
            print_venue(&directory.create_venue(&properties)?);
        }
        Commands::Rename { venue_id, name } => {
            let venue = directory.update_venue(venue_id, &VenueProperties::named(name))?;
            print_venue(&venue);
        }
        Commands::Delete { venue_id } => {
            let detached = directory.delete_venue(venue_id)?;
            println!("deleted {venue_id}; detached {} events", detached.len());
            for event_id in detached {
                println!("  {event_id}");
            }
        }
        Commands::Show { venue_id } => match directory.get_venue(venue_id)? {
            Some(venue) => {
                print_venue(&venue);
                for event_id in directory.events_for_venue(venue_id)? {
                    println!("  event {event_id}");
                }
            }
            None => println!("venue {venue_id} not found"),
        },
        Commands::Event { event } => match directory.venue_for_event(event)? {
            Some(venue) => print_venue(&venue),
            None => println!("event {event} has no venue"),
        },
        Commands::List { limit, offset } => {
            let venues = directory.list_venues(&VenueListQuery { limit, offset })?;
            for venue in &venues {
                print_venue(venue);
            }
            println!("{} venues", venues.len());
        }
        Commands::Audit => {
            let report = directory.audit()?;
            println!(
                "checked {} venues and {} events",
                report.venues_checked, report.events_checked
            );
            if !report.is_clean() {
                for violation in &report.violations {
                    println!("  {violation}");
                }
                return Err(format!("{} violations found", report.violations.len()).into());
            }
            println!("ok");
        }
    }
    Ok(())
}

fn print_venue(venue: &Venue) {
    let address = venue.address_line();
    if address.is_empty() {
        println!("{}  {}  events={}", venue.id, venue.name, venue.event_count);
    } else {
        println!(
            "{}  {}  events={}  {}",
            venue.id, venue.name, venue.event_count, address
        );
    }
}

fn command_name(command: &Commands) -> &'static str {
    match command {
        Commands::Assign { .. } => "assign",
        Commands::Link { .. } => "link",
        Commands::Create { .. } => "create",
        Commands::Rename { .. } => "rename",
        Commands::Delete { .. } => "delete",
        Commands::Show { .. } => "show",
        Commands::Event { .. } => "event",
        Commands::List { .. } => "list",
        Commands::Audit => "audit",
    }
}
