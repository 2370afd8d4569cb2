//! # Seed Data Generator
//!
//! Populates a database with demo vehicles and cards for local testing of
//! the fare endpoint.
//!
//! ## Usage
//! ```bash
//! # 50 cards (default)
//! cargo run -p farelink-db --bin seed
//!
//! # Custom amount and database path
//! cargo run -p farelink-db --bin seed -- --cards 200 --db ./data/farelink.db
//! ```
//!
//! ## Generated Data
//! - One vehicle per operator fleet entry below, all active except the
//!   last, which is in maintenance
//! - Cards with UIDs in a mix of reader formats (plain, colon-separated,
//!   lowercase, zero-padded) and balances between 0 and 5,000
//! - Every tenth card is blocked

use std::env;

use farelink_core::{Money, TransportType, VehicleStatus};
use farelink_db::{Database, DbConfig, NewCard, NewVehicle};

/// Demo fleet: (number, route, transport type, status)
const FLEET: &[(&str, &str, TransportType, VehicleStatus)] = &[
    ("T 101 DLA", "Kivukoni - Mwenge", TransportType::Bus, VehicleStatus::Active),
    ("T 202 DLB", "Kariakoo - Ubungo", TransportType::Bus, VehicleStatus::Active),
    ("T 303 DLC", "Posta - Mbezi", TransportType::Bus, VehicleStatus::Active),
    ("MV KILIMANJARO", "Dar es Salaam - Zanzibar", TransportType::Ship, VehicleStatus::Active),
    ("5H-FLA", "Dar es Salaam - Arusha", TransportType::Plane, VehicleStatus::Active),
    ("T 404 DLD", "Depot", TransportType::Bus, VehicleStatus::Maintenance),
];

/// Formats a 5-byte UID the way different readers report it.
fn format_uid(bytes: [u8; 5], style: usize) -> String {
    let hex: Vec<String> = bytes.iter().map(|b| format!("{b:02X}")).collect();
    match style % 4 {
        0 => hex.concat(),
        1 => hex.join(":"),
        2 => hex.concat().to_lowercase(),
        _ => format!("{}0000", hex.concat()),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut card_count: usize = 50;
    let mut db_path = String::from("./data/farelink.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-c" | "--cards" => {
                if i + 1 < args.len() {
                    card_count = args[i + 1].parse().unwrap_or(50);
                    i += 1;
                }
            }
            "-d" | "--db" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "-h" | "--help" => {
                println!("Farelink Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --cards <N>    Number of cards to generate (default: 50)");
                println!("  -d, --db <PATH>    Database file path (default: ./data/farelink.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("Farelink Seed Data Generator");
    println!("============================");
    println!("Database: {}", db_path);
    println!("Cards:    {}", card_count);
    println!();

    if let Some(parent) = std::path::Path::new(&db_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let db = Database::new(DbConfig::new(&db_path)).await?;
    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let existing = db.cards().count().await?;
    if existing > 0 {
        println!("⚠ Database already has {} cards", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    for (number, route, transport_type, status) in FLEET {
        let vehicle = db
            .vehicles()
            .insert(&NewVehicle {
                number: number.to_string(),
                route_name: Some(route.to_string()),
                transport_type: *transport_type,
                status: *status,
                owner_id: None,
            })
            .await?;
        println!("  vehicle #{:<3} {:<16} {}", vehicle.id, vehicle.number, vehicle.status);
    }

    println!();
    println!("Generating cards...");

    let mut generated = 0;
    for n in 0..card_count {
        let seq = n as u32;
        let bytes = [
            0x04,
            (seq >> 16) as u8,
            (seq >> 8) as u8,
            seq as u8,
            0xA0 | (n % 16) as u8,
        ];

        let mut card = NewCard::active(
            format_uid(bytes, n),
            Money::from_units(((n * 137) % 5001) as i64),
        );
        if n % 10 == 9 {
            card.status = farelink_core::CardStatus::Blocked;
        }

        if let Err(e) = db.cards().register(&card).await {
            eprintln!("Failed to insert {}: {}", card.uid, e);
            continue;
        }
        generated += 1;
    }

    println!("✓ Generated {} cards", generated);
    println!();
    println!("✓ Seed complete!");

    db.close().await;
    Ok(())
}
