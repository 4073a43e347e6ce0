use clap::Parser;
use festivals_api::{Config, Error, Server, api, logging, store};

#[tokio::main]
async fn main() -> Result<(), Error> {
    let config = Config::parse();
    logging::init(config.log_format)?;

    let source = store::from_config(&config)?;
    let app = api::app(config.cors(), source);

    Server::bind(config.addr()).serve(app).await
}
