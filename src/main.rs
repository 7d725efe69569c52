use log::{error, info};
use std::convert::Infallible;
use std::net::TcpListener;
use std::path::Path;
use std::sync::Arc;
use warp::Filter;

use photowall::config::Config;
use photowall::file_scanner::restore_from_directory;
use photowall::import_stage::Importer;
use photowall::resize_stage::Resizer;
use photowall::stage::Stage;
use photowall::store_stage::Store;
use photowall::wall::Photowall;
use photowall::warp_handlers;
use photowall::warp_helpers::{cors, handle_rejection, with_config, with_wall};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let config = Arc::new(Config::from_env()?);
    let port = config.port;

    info!("Starting Photowall server on Port {}", port);
    info!("Storage directory: {}", config.storage_path);
    info!(
        "Resize bounds: {}x{}, allowed extensions: {:?}",
        config.max_width, config.max_height, config.allowed_extensions
    );

    if !is_port_available(port) {
        error!(
            "Port {} is already in use. Please stop any existing Photowall instances or use a different port.",
            port
        );
        return Err(format!("Port {} is already in use", port).into());
    }

    std::fs::create_dir_all(&config.storage_path)?;

    let wall = Photowall::new(config.max_in_flight);

    // Re-validate whatever already sits in the storage directory before
    // the production pipeline is installed.
    wall.set_stages(vec![Arc::new(Importer) as Arc<dyn Stage>]);
    restore_from_directory(
        &wall,
        Path::new(&config.storage_path),
        &config.allowed_extensions,
    )
    .await;

    wall.set_stages(vec![
        Arc::new(Resizer::new(config.max_width, config.max_height)) as Arc<dyn Stage>,
        Arc::new(Store::new(&config.storage_path)),
    ]);

    let routes = build_api_routes(wall.clone(), config.clone())
        .or(build_image_routes(&config.storage_path))
        .or(build_health_routes())
        .or(build_static_routes())
        .with(cors())
        .with(warp::log("photowall"))
        .recover(handle_rejection);

    let addr: std::net::IpAddr = config.host.parse()?;
    info!(
        "Server started successfully, listening on http://{}:{}",
        config.host, port
    );

    warp::serve(routes)
        .bind((addr, port))
        .await
        .graceful(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .run()
        .await;

    Ok(())
}

fn is_port_available(port: u16) -> bool {
    TcpListener::bind(("0.0.0.0", port)).is_ok()
}

fn build_api_routes(
    wall: Photowall,
    config: Arc<Config>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    let api_wall = warp::path("api")
        .and(warp::path("wall"))
        .and(warp::path::end())
        .and(warp::get())
        .and(with_wall(wall.clone()))
        .and_then(warp_handlers::wall_photos);

    let api_upload = warp::path("api")
        .and(warp::path("upload"))
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::multipart::form().max_length(config.max_upload_bytes()))
        .and(with_wall(wall))
        .and(with_config(config))
        .and_then(warp_handlers::upload_photo);

    api_wall.or(api_upload)
}

fn build_image_routes(
    storage_path: &str,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::path("imgs").and(warp::fs::dir(storage_path.to_string()))
}

fn build_health_routes() -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone
{
    warp::path("health")
        .and(warp::get())
        .and_then(warp_handlers::health_check)
}

fn build_static_routes() -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone
{
    let static_index = warp::path::end().and(warp::get()).and_then(|| async {
        Ok::<_, Infallible>(warp::reply::html(include_str!("../static/index.html")))
    });

    let static_css_main = warp::path("css")
        .and(warp::path("main.css"))
        .and(warp::path::end())
        .and(warp::get())
        .and_then(|| async {
            Ok::<_, Infallible>(warp::reply::with_header(
                include_str!("../static/css/main.css"),
                "content-type",
                "text/css",
            ))
        });

    let static_js_app = warp::path("js")
        .and(warp::path("app.js"))
        .and(warp::path::end())
        .and(warp::get())
        .and_then(|| async {
            Ok::<_, Infallible>(warp::reply::with_header(
                include_str!("../static/js/app.js"),
                "content-type",
                "application/javascript",
            ))
        });

    static_css_main.or(static_js_app).or(static_index)
}
