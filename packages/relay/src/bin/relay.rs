//! WebSocket relay server.
//!
//! One task per connection; inbound JSON frames go through the shared
//! [`RelayRouter`], outbound messages fan out over per-connection mpsc
//! channels. `cargo run -p folio-relay -- --port 3000`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{info, warn};

use folio_relay::{ConnId, RelayMessage, RelayRouter};

struct ServerState {
    router: Mutex<RelayRouter>,
    senders: Mutex<HashMap<ConnId, mpsc::UnboundedSender<RelayMessage>>>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    // Parse arguments
    let args: Vec<String> = std::env::args().collect();
    let mut port: u16 = 3000;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--port" | "-p" => {
                if i + 1 < args.len() {
                    port = args[i + 1].parse().expect("Invalid port number");
                    i += 2;
                } else {
                    eprintln!("--port requires a value");
                    std::process::exit(1);
                }
            }
            other => {
                eprintln!("Unknown argument: {other}");
                std::process::exit(1);
            }
        }
    }

    let state = Arc::new(ServerState {
        router: Mutex::new(RelayRouter::new()),
        senders: Mutex::new(HashMap::new()),
    });

    let app = Router::new()
        .route("/ws", get(ws_handler))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    info!("Relay listening on port {port}");
    axum::serve(listener, app).await?;

    Ok(())
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<ServerState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_connection(socket, state))
}

async fn handle_connection(socket: WebSocket, state: Arc<ServerState>) {
    info!("New connection established");

    let conn = state.router.lock().unwrap().connect();
    let (tx, mut rx) = mpsc::unbounded_channel::<RelayMessage>();
    state.senders.lock().unwrap().insert(conn, tx);

    let (mut sink, mut stream) = socket.split();

    // Writer half: drain the outbound queue into the socket.
    let writer = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            let text = match serde_json::to_string(&message) {
                Ok(text) => text,
                Err(e) => {
                    warn!("Failed to encode outbound message: {e}");
                    continue;
                }
            };
            if sink.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    // Reader half: route every inbound frame.
    while let Some(Ok(frame)) = stream.next().await {
        let Message::Text(text) = frame else {
            continue;
        };
        let message: RelayMessage = match serde_json::from_str(&text) {
            Ok(message) => message,
            Err(e) => {
                warn!("Dropping undecodable frame: {e}");
                continue;
            }
        };

        let outputs = state.router.lock().unwrap().handle(conn, message);
        let senders = state.senders.lock().unwrap();
        for (target, out) in outputs {
            if let Some(sender) = senders.get(&target) {
                // Ignore send errors (recipient may have disconnected)
                let _ = sender.send(out);
            }
        }
    }

    state.router.lock().unwrap().disconnect(conn);
    state.senders.lock().unwrap().remove(&conn);
    writer.abort();
    info!("Connection closed");
}
