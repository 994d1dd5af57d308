mod cli;
mod demo;
mod infra;
mod routes;
mod server;

use analytics_registration::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}
