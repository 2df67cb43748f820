use axum::Router;
use envconfig::Envconfig;
use eyre::Result;

use gateway_api::config::Config;
use gateway_api::router;
use odoo_rpc::XmlRpcConnector;

async fn listen(app: Router, bind: String) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;

    axum::serve(listener, app).await?;

    Ok(())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let config = Config::init_from_env().expect("failed to load configuration from env");

    let connector = XmlRpcConnector::new(config.rpc_timeout());
    let app = router::router(connector, config.export_prometheus);

    match listen(app, config.bind()).await {
        Ok(_) => {}
        Err(e) => tracing::error!("failed to start gateway-api http server, {}", e),
    }
}
