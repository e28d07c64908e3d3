use std::env;

use actix_request_identifier::{IdReuse, RequestIdentifier};
use actix_web::web::Data;

use tracing_actix_web::TracingLogger;
use tracing_bunyan_formatter::{BunyanFormattingLayer, JsonStorageLayer};
use tracing_subscriber::filter::filter_fn;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Registry;

use crate::database::connect::{create_db_connection_pool, run_migrations};
use crate::routes::{
    add_balance_handler, balance_handler, cancel_order_handler, check_balance_handler, create_order_handler,
    order_handler, pay_handler, quote_order_handler, transactions_handler,
};

mod database;
mod requests;
mod responses;
mod routes;
mod schema;

#[actix_web::main]
async fn main() {
    dotenvy::dotenv().ok();

    // setup tracing and use bunyan formatter
    let formatting_layer = BunyanFormattingLayer::new("parcelpay".into(), std::io::stdout);
    let subscriber = Registry::default()
        .with(filter_fn(|metadata| *metadata.level() <= tracing::Level::INFO))
        .with(JsonStorageLayer)
        .with(formatting_layer);
    tracing::subscriber::set_global_default(subscriber).unwrap();

    let db = create_db_connection_pool();
    run_migrations(&db);

    let server = actix_web::HttpServer::new(move || {
        let db = db.clone();

        actix_web::App::new()
            .wrap(RequestIdentifier::with_uuid().use_incoming_id(IdReuse::UseIncoming))
            .wrap(TracingLogger::default())
            .app_data(Data::new(db.clone()))
            .service(balance_handler)
            .service(check_balance_handler)
            .service(add_balance_handler)
            .service(transactions_handler)
            .service(create_order_handler)
            .service(quote_order_handler)
            .service(cancel_order_handler)
            .service(order_handler)
            .service(pay_handler)
    });

    server
        .bind(env::var("BIND_ADDRESS").unwrap())
        .unwrap()
        .run()
        .await
        .unwrap();
}
