use std::time::{Duration, SystemTime, UNIX_EPOCH};

use canvas::consts::{DEFAULT_FILL, DEFAULT_STROKE};
use canvas::geom::Point;
use canvas::shape::{Shape, ShapeKind};
use canvas::tool::ToolKind;
use clap::{Args, Parser, Subcommand};
use client::net;
use client::session::{CanvasSession, LeaveOutcome, SessionConfig, SessionError};
use tokio::time::timeout;
use uuid::Uuid;
use wire::{ClientMessage, ServerMessage, WireUser};

const JOIN_WAIT: Duration = Duration::from_secs(5);
const PONG_WAIT: Duration = Duration::from_secs(5);

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("connect failed: {0}")]
    Connect(#[from] net::NetError),
    #[error("session failed: {0}")]
    Session(#[from] SessionError),
    #[error("server channel closed")]
    Closed,
    #[error("timed out waiting for the server")]
    Timeout,
}

#[derive(Parser, Debug)]
#[command(name = "cosketch", about = "cosketch canvas CLI")]
struct Cli {
    #[arg(long, env = "COSKETCH_WS_URL", default_value = "http://127.0.0.1:3000")]
    url: String,

    /// Stable identity across invocations; random per run when omitted.
    #[arg(long, env = "COSKETCH_USER_ID")]
    user_id: Option<String>,

    #[arg(long, default_value = "cli")]
    name: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Round-trip a heartbeat and print the latency.
    Ping,
    /// Join a canvas, print its shapes and roster, and leave.
    Snapshot { canvas_id: String },
    /// Draw one shape on a canvas.
    Draw(DrawArgs),
    /// Join a canvas and tail its traffic until interrupted.
    Watch { canvas_id: String },
}

#[derive(Args, Debug)]
struct DrawArgs {
    canvas_id: String,

    #[arg(long)]
    stroke: Option<String>,

    #[arg(long)]
    fill: Option<String>,

    #[command(subcommand)]
    shape: DrawShape,
}

#[derive(Subcommand, Debug)]
enum DrawShape {
    Line {
        #[arg(long, value_parser = parse_point)]
        from: Point,
        #[arg(long, value_parser = parse_point)]
        to: Point,
    },
    Circle {
        #[arg(long, value_parser = parse_point)]
        center: Point,
        #[arg(long)]
        radius: f64,
    },
    Rect {
        #[arg(long, value_parser = parse_point)]
        from: Point,
        #[arg(long, value_parser = parse_point)]
        to: Point,
    },
    Triangle {
        #[arg(long, value_parser = parse_point)]
        a: Point,
        #[arg(long, value_parser = parse_point)]
        b: Point,
        #[arg(long, value_parser = parse_point)]
        c: Point,
    },
}

/// Parse `x,y` into a point.
fn parse_point(raw: &str) -> Result<Point, String> {
    let (x, y) = raw.split_once(',').ok_or_else(|| format!("`{raw}` is not x,y"))?;
    let x: f64 = x.trim().parse().map_err(|_| format!("`{x}` is not a number"))?;
    let y: f64 = y.trim().parse().map_err(|_| format!("`{y}` is not a number"))?;
    Ok(Point::new(x, y))
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let user_id =
        cli.user_id.clone().unwrap_or_else(|| format!("cli-{}", Uuid::new_v4()));

    match cli.command {
        Command::Ping => run_ping(&cli, &user_id).await,
        Command::Snapshot { ref canvas_id } => run_snapshot(&cli, &user_id, canvas_id).await,
        Command::Draw(ref args) => run_draw(&cli, &user_id, args).await,
        Command::Watch { ref canvas_id } => run_watch(&cli, &user_id, canvas_id).await,
    }
}

async fn open_session(cli: &Cli, user_id: &str, canvas_id: &str) -> Result<CanvasSession, CliError> {
    let transport = net::connect(&cli.url, user_id, &cli.name).await?;
    let mut session =
        CanvasSession::new(SessionConfig::new(canvas_id, user_id), transport.tx, transport.rx);
    timeout(JOIN_WAIT, session.join()).await.map_err(|_| CliError::Timeout)??;
    Ok(session)
}

async fn close_session(mut session: CanvasSession) {
    if session.leave().await != LeaveOutcome::Acked {
        eprintln!("leave unacknowledged; exiting anyway");
    }
}

// ===== ping =====

async fn run_ping(cli: &Cli, user_id: &str) -> Result<(), CliError> {
    let mut transport = net::connect(&cli.url, user_id, &cli.name).await?;
    let sent_at = std::time::Instant::now();
    let ts = now_ms();
    transport
        .tx
        .send(ClientMessage::Ping { ts: Some(ts) })
        .await
        .map_err(|_| CliError::Closed)?;

    let wait = async {
        loop {
            match transport.rx.recv().await {
                Some(ServerMessage::Pong { ts: echoed }) if echoed == Some(ts) => {
                    return Ok(sent_at.elapsed());
                }
                Some(_) => {}
                None => return Err(CliError::Closed),
            }
        }
    };
    let elapsed = timeout(PONG_WAIT, wait).await.map_err(|_| CliError::Timeout)??;
    println!("pong in {}ms", elapsed.as_millis());
    Ok(())
}

// ===== snapshot =====

async fn run_snapshot(cli: &Cli, user_id: &str, canvas_id: &str) -> Result<(), CliError> {
    let session = open_session(cli, user_id, canvas_id).await?;

    println!("canvas {canvas_id}");
    println!("color  {}", session.user_color().unwrap_or("?"));
    println!("shapes ({}):", session.store().len());
    for shape in session.store().ordered_shapes() {
        println!("  {}", describe_shape(shape));
    }
    println!("users ({}):", session.roster().len());
    for user in session.roster().iter() {
        println!("  {}", describe_user(user));
    }

    close_session(session).await;
    Ok(())
}

// ===== draw =====

async fn run_draw(cli: &Cli, user_id: &str, args: &DrawArgs) -> Result<(), CliError> {
    let mut session = open_session(cli, user_id, &args.canvas_id).await?;

    if args.stroke.is_some() || args.fill.is_some() {
        session.set_style(
            args.stroke.as_deref().unwrap_or(DEFAULT_STROKE),
            args.fill.as_deref().unwrap_or(DEFAULT_FILL),
        );
    }

    match args.shape {
        DrawShape::Line { from, to } => {
            session.set_tool(ToolKind::Line);
            session.pointer_down(from);
            session.pointer_up(to);
        }
        DrawShape::Circle { center, radius } => {
            session.set_tool(ToolKind::Circle);
            session.pointer_down(center);
            session.pointer_up(Point::new(center.x + radius, center.y));
        }
        DrawShape::Rect { from, to } => {
            session.set_tool(ToolKind::Rect);
            session.pointer_down(from);
            session.pointer_up(to);
        }
        DrawShape::Triangle { a, b, c } => {
            session.set_tool(ToolKind::Triangle);
            for corner in [a, b, c] {
                session.pointer_down(corner);
                session.pointer_up(corner);
            }
        }
    }

    let drawn: Vec<String> =
        session.store().ordered_shapes().iter().map(|s| describe_shape(s)).collect();
    // The leave ack orders after the broadcast, so the shape is durable
    // once it resolves.
    close_session(session).await;
    for line in drawn {
        println!("drew {line}");
    }
    Ok(())
}

// ===== watch =====

async fn run_watch(cli: &Cli, user_id: &str, canvas_id: &str) -> Result<(), CliError> {
    let mut session = open_session(cli, user_id, canvas_id).await?;
    println!(
        "watching {canvas_id} ({} shapes, {} users); ctrl-c to stop",
        session.store().len(),
        session.roster().len()
    );

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            msg = session.recv() => {
                let Some(msg) = msg else {
                    eprintln!("server channel closed");
                    break;
                };
                println!("{}", describe_message(&msg));
                session.apply_message(msg);
            }
        }
    }

    close_session(session).await;
    Ok(())
}

// ===== formatting =====

fn describe_shape(shape: &Shape) -> String {
    let geometry = match shape.kind {
        ShapeKind::Line { a, b } => format!("line ({},{})..({},{})", a.x, a.y, b.x, b.y),
        ShapeKind::Circle { center, radius } => {
            format!("circle ({},{}) r={radius}", center.x, center.y)
        }
        ShapeKind::Triangle { a, b, c } => {
            format!("triangle ({},{}) ({},{}) ({},{})", a.x, a.y, b.x, b.y, c.x, c.y)
        }
        ShapeKind::Rect { origin, width, height } => {
            format!("rect ({},{}) {width}x{height}", origin.x, origin.y)
        }
    };
    format!("#{} {geometry} z={}", shape.id, shape.z_index)
}

fn describe_user(user: &WireUser) -> String {
    format!("{} {} ({})", user.user_id, user.user_color, user.display_name)
}

fn describe_message(msg: &ServerMessage) -> String {
    match msg {
        ServerMessage::ShapeAdd { shape, .. } => format!("shape_add {}", describe_shape(shape)),
        ServerMessage::ShapeUpdate { shape, .. } => {
            format!("shape_update {}", describe_shape(shape))
        }
        ServerMessage::ShapeRemove { shape_id, .. } => format!("shape_remove #{shape_id}"),
        ServerMessage::Selection { user_id, shape_ids, .. } => {
            let ids: Vec<String> = shape_ids.iter().map(|id| format!("#{id}")).collect();
            format!("selection {user_id} [{}]", ids.join(" "))
        }
        ServerMessage::Users { users, .. } => format!("users ({})", users.len()),
        ServerMessage::UserJoined { user } => format!("user_joined {}", describe_user(user)),
        ServerMessage::UserLeft { user } => format!("user_left {}", user.user_id),
        ServerMessage::Joined { canvas_id, .. } => format!("joined {canvas_id}"),
        ServerMessage::Left => "left".to_owned(),
        ServerMessage::Pong { ts: Some(ts) } => format!("pong ts={ts}"),
        ServerMessage::Pong { ts: None } => "pong".to_owned(),
    }
}

fn now_ms() -> u64 {
    let Ok(duration) = SystemTime::now().duration_since(UNIX_EPOCH) else {
        return 0;
    };
    u64::try_from(duration.as_millis()).unwrap_or(0)
}
