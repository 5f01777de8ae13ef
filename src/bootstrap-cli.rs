//! Creates the empty profile of a newly registered account.
//! Invoked by the hosting platform's account-creation trigger.

use clap::{Arg, ArgAction, ArgMatches, Command};
use rocket::serde::json::serde_json;

use wyr_backend::{
    bootstrap::create_profile,
    config::connect_store,
    model::{store::Coll, user::User},
};

const PROGRAM_NAME: &str = "profile-bootstrap";

const ABOUT_TEXT: &str = "Create the empty profile of a newly registered user.

Creating a profile that already exists leaves it untouched.

EXIT CODES:
     0: The profile exists.
     1: Could not reach the database.
     2: Could not create the profile.";

const USER_ID: &str = "USER_ID";
const DB_URI: &str = "db-uri";
const DB_NAME: &str = "db-name";

/// Construct the CLI configuration.
fn cli() -> Command {
    // Make the build dirty when the toml changes.
    include_str!("../Cargo.toml");

    clap::command!(PROGRAM_NAME)
        .about(ABOUT_TEXT)
        .arg(
            Arg::new(USER_ID)
                .help("The identity provider's ID for the new user")
                .action(ArgAction::Set)
                .required(true),
        )
        .arg(
            Arg::new(DB_URI)
                .long(DB_URI)
                .help("MongoDB connection string, or `memory` for a dry run")
                .env("WYR_DB_URI")
                .action(ArgAction::Set)
                .required(true),
        )
        .arg(
            Arg::new(DB_NAME)
                .long(DB_NAME)
                .help("Name of the database holding the profiles")
                .env("WYR_DB_NAME")
                .action(ArgAction::Set)
                .default_value("would-you-rather"),
        )
}

/// Errors that this program may produce.
#[derive(Debug)]
enum Error {
    /// Failed to connect to the database.
    Connect(String),
    /// The store refused the profile.
    Create(String),
}

impl From<Error> for u8 {
    fn from(err: Error) -> Self {
        match err {
            Error::Connect(_) => 1,
            Error::Create(_) => 2,
        }
    }
}

async fn bootstrap(args: &ArgMatches) -> Result<User, Error> {
    // All three have a value: the first two are required and the last has a default.
    let user_id = args.get_one::<String>(USER_ID).map_or("", String::as_str);
    let db_uri = args.get_one::<String>(DB_URI).map_or("", String::as_str);
    let db_name = args.get_one::<String>(DB_NAME).map_or("", String::as_str);

    let store = connect_store(db_uri, db_name)
        .await
        .map_err(|e| Error::Connect(e.to_string()))?;
    create_profile(&Coll::new(store), user_id)
        .await
        .map_err(|e| Error::Create(e.to_string()))
}

async fn run(args: &ArgMatches) -> u8 {
    match bootstrap(args).await {
        Ok(user) => {
            match serde_json::to_string_pretty(&user) {
                Ok(json) => println!("{json}"),
                Err(_) => println!("{}", user.id),
            }
            0
        }
        Err(err) => {
            match &err {
                Error::Connect(msg) => eprintln!("Failed to connect to database: {msg}"),
                Error::Create(msg) => eprintln!("Failed to create profile: {msg}"),
            }
            err.into()
        }
    }
}

#[rocket::main]
async fn main() {
    // Logging is optional here; the trigger runtime captures stderr anyway.
    if log4rs::init_file("log4rs.yaml", log4rs_dynamic_filters::default_deserializers()).is_err() {
        eprintln!("No usable log4rs.yaml, logging disabled");
    }

    let args = cli().get_matches();
    let exit_code = run(&args).await;
    std::process::exit(exit_code.into())
}
