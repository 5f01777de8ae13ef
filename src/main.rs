use log::{error, info, LevelFilter};
use thiserror::Error;

/// Errors that stop the server from starting or keep it from running.
#[derive(Debug, Error)]
enum Error {
    #[error("Failed to initialise logging: {0}")]
    Logging(String),
    #[error(transparent)]
    Rocket(#[from] rocket::Error),
}

fn init_logging() -> Result<(), Error> {
    log4rs::init_file("log4rs.yaml", log4rs_dynamic_filters::default_deserializers())
        .map_err(|e| Error::Logging(e.to_string()))
}

async fn serve() -> Result<(), Error> {
    let rocket = wyr_backend::build().ignite().await?;
    info!(
        "Services connected for profile `{}`",
        rocket.figment().profile()
    );
    // Rocket's own logging only matters until it's up.
    log4rs_dynamic_filters::DynamicLevelFilter::set("rocket", LevelFilter::Off);
    rocket.launch().await?;
    Ok(())
}

#[rocket::main]
async fn main() {
    if let Err(err) = init_logging() {
        eprintln!("{err}");
        std::process::exit(1)
    }

    if let Err(err) = serve().await {
        error!("{err}");
        error!("Critical failure, shutting down");
        std::process::exit(1)
    }
}
