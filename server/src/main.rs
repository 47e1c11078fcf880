use server::services::room;
use server::{routes, state};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let port: u16 = std::env::var("PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()
        .expect("invalid PORT");

    let state = state::AppState::new();

    // Reap connections whose sockets died without a close frame.
    let _sweep = room::spawn_stale_sweep(state.clone());

    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .expect("failed to bind");

    tracing::info!(%port, "cosketch relay listening");
    axum::serve(listener, app).await.expect("server failed");
}
