use std::io;

use actix_web::{web, App, HttpServer};
use clap::Parser;
use dotenv::dotenv;
use log::{error, info};
use sqlx::mysql::MySqlPoolOptions;
use sqlx::MySqlPool;

mod auth;
mod cli;
mod config;
mod import;
mod models;
mod routes;

use cli::{Cli, Command};
use config::Config;

fn io_error(message: impl std::fmt::Display) -> io::Error {
    io::Error::new(io::ErrorKind::Other, message.to_string())
}

async fn connect(config: &Config) -> io::Result<MySqlPool> {
    let pool = MySqlPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await
        .map_err(|e| io_error(format!("Failed to create pool: {}", e)))?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(|e| io_error(format!("Failed to run migrations: {}", e)))?;

    Ok(pool)
}

async fn serve(pool: MySqlPool, config: Config) -> io::Result<()> {
    let server_address = config.server_address.clone();
    info!("Server running at http://{}", server_address);

    let pool = web::Data::new(pool);
    let config = web::Data::new(config);
    HttpServer::new(move || {
        App::new()
            .app_data(pool.clone())
            .app_data(config.clone())
            .configure(routes::routes::configure_all)
    })
    .bind(server_address)?
    .run()
    .await
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = Config::from_env().map_err(io_error)?;
    let pool = connect(&config).await?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(pool, config).await,
        Command::Import(args) => match cli::run_import(&pool, &config, &args).await {
            Ok(0) => Ok(()),
            Ok(failed) => {
                error!("{} municipality import(s) failed", failed);
                std::process::exit(1);
            }
            Err(e) => Err(io_error(e)),
        },
        Command::Check { file } => cli::run_check(&pool, &file).await.map_err(io_error),
        Command::PopulateTags { municipality_id } => {
            cli::run_populate_tags(&pool, municipality_id).await.map_err(io_error)
        }
    }
}
