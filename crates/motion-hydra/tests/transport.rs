//! Connection and driver behavior against an in-process fake
//! controller.

use anyhow::Result;
use motion_axis::{Axis, AxisDefaults};
use motion_core::{AxisSpi, MotionError, MoveStatus, TomlStore};
use motion_hydra::{HydraAxis, HydraConnection};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;

// =============================================================================
// Fake controller
// =============================================================================

#[derive(Default)]
struct AxisState {
    position: f64,
    aux: f64,
    speed: f64,
    accel: f64,
    enabled: bool,
    initialized: bool,
}

#[derive(Clone, Copy, Default)]
struct ControllerOpts {
    /// Drop the connection after this many served exchanges.
    drop_after: Option<usize>,
    /// Delay the first response of each connection.
    delay_first: Option<Duration>,
}

type State = Arc<Mutex<HashMap<u32, AxisState>>>;

/// Bind a fake controller on an ephemeral port. Axis state persists
/// across reconnects.
async fn spawn_controller(opts: ControllerOpts) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    let state: State = Arc::new(Mutex::new(HashMap::new()));
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            serve(stream, state.clone(), opts).await;
        }
    });
    addr
}

async fn serve(stream: tokio::net::TcpStream, state: State, opts: ControllerOpts) {
    let (r, mut w) = stream.into_split();
    let mut lines = BufReader::new(r).lines();
    let mut served = 0usize;
    while let Ok(Some(line)) = lines.next_line().await {
        if served == 0 {
            if let Some(delay) = opts.delay_first {
                tokio::time::sleep(delay).await;
            }
        }
        let resp = respond(&state, &line);
        if w.write_all(resp.as_bytes()).await.is_err() {
            return;
        }
        served += 1;
        if opts.drop_after == Some(served) {
            return;
        }
    }
}

fn respond(state: &State, line: &str) -> String {
    let mut parts = line.split_whitespace();
    let axis: u32 = parts.next().unwrap().parse().unwrap();
    let verb = parts.next().unwrap();
    let arg: Option<f64> = parts.next().and_then(|s| s.parse().ok());

    let mut map = state.lock();
    let st = map.entry(axis).or_default();
    match verb {
        "npos?" => format!("{}\n", st.position),
        "setnpos" | "nmove" => {
            st.position = arg.unwrap();
            "ok\n".to_string()
        }
        "rmove" => {
            st.position += arg.unwrap();
            "ok\n".to_string()
        }
        "auxpos?" => format!("{}\n", st.aux),
        "setauxpos" => {
            st.aux = arg.unwrap();
            "ok\n".to_string()
        }
        "nvel?" => format!("{}\n", st.speed),
        "setnvel" => {
            st.speed = arg.unwrap();
            "ok\n".to_string()
        }
        "nacc?" => format!("{}\n", st.accel),
        "setnacc" => {
            st.accel = arg.unwrap();
            "ok\n".to_string()
        }
        "home" => {
            st.position = 0.0;
            "ok\n".to_string()
        }
        "index" | "seeklower" | "seekupper" | "nstop" | "nabort" => "ok\n".to_string(),
        "enable" => {
            st.enabled = arg == Some(1.0);
            "ok\n".to_string()
        }
        "init" => {
            st.initialized = arg == Some(1.0);
            "ok\n".to_string()
        }
        "status?" => {
            // Instant mechanics: never moving, always ready.
            let mut bits = 0x08;
            if st.enabled {
                bits |= 0x02;
            }
            if st.initialized {
                bits |= 0x04;
            }
            format!("{bits}\n")
        }
        "switch?" => "0 0 0\n".to_string(),
        _ => "err unknown verb\n".to_string(),
    }
}

// =============================================================================
// Connection behavior
// =============================================================================

#[tokio::test]
async fn test_basic_exchange() -> Result<()> {
    let addr = spawn_controller(ControllerOpts::default()).await;
    let conn = HydraConnection::connect(addr).await?;

    let resp = conn
        .send_and_receive("1 setnpos 42\n", Duration::from_secs(1))
        .await?;
    assert_eq!(resp, "ok");
    let resp = conn
        .send_and_receive("1 npos?\n", Duration::from_secs(1))
        .await?;
    assert_eq!(resp, "42");

    conn.close().await?;
    Ok(())
}

#[tokio::test]
async fn test_reconnects_after_controller_drop() -> Result<()> {
    let addr = spawn_controller(ControllerOpts {
        drop_after: Some(1),
        ..Default::default()
    })
    .await;
    let conn = HydraConnection::connect(addr).await?;

    // First exchange succeeds, then the controller drops the link.
    let resp = conn
        .send_and_receive("1 setnpos 7\n", Duration::from_secs(1))
        .await?;
    assert_eq!(resp, "ok");

    // The supervisor redials in the background; exchanges fail fast
    // until the link is back, then succeed against preserved state.
    let mut got = None;
    for _ in 0..50 {
        match conn
            .send_and_receive("1 npos?\n", Duration::from_millis(200))
            .await
        {
            Ok(resp) => {
                got = Some(resp);
                break;
            }
            Err(_) => tokio::time::sleep(Duration::from_millis(50)).await,
        }
    }
    assert_eq!(got.as_deref(), Some("7"));

    conn.close().await?;
    Ok(())
}

#[tokio::test]
async fn test_timed_out_response_does_not_poison_the_next_exchange() -> Result<()> {
    let addr = spawn_controller(ControllerOpts {
        delay_first: Some(Duration::from_millis(300)),
        ..Default::default()
    })
    .await;
    let conn = HydraConnection::connect(addr).await?;

    // The first response outlives its deadline.
    let err = conn
        .send_and_receive("1 npos?\n", Duration::from_millis(50))
        .await
        .unwrap_err();
    assert!(matches!(err, MotionError::Timeout(_)));

    // Let the late response land, then run a fresh exchange: the stale
    // line must be discarded, not paired with the new request.
    tokio::time::sleep(Duration::from_millis(400)).await;
    let resp = conn
        .send_and_receive("1 setnpos 99\n", Duration::from_secs(1))
        .await?;
    assert_eq!(resp, "ok");
    let resp = conn
        .send_and_receive("1 npos?\n", Duration::from_secs(1))
        .await?;
    assert_eq!(resp, "99");

    conn.close().await?;
    Ok(())
}

#[tokio::test]
async fn test_closed_connection_refuses_sends() -> Result<()> {
    let addr = spawn_controller(ControllerOpts::default()).await;
    let conn = HydraConnection::connect(addr).await?;
    conn.close().await?;
    conn.close().await?; // idempotent

    assert!(matches!(
        conn.send("1 npos?\n").await,
        Err(MotionError::Disconnected)
    ));
    Ok(())
}

// =============================================================================
// Driver over the fake controller
// =============================================================================

#[tokio::test]
async fn test_axis_primitives_over_the_wire() -> Result<()> {
    let addr = spawn_controller(ControllerOpts::default()).await;
    let conn = Arc::new(HydraConnection::connect(addr).await?);
    let spi = HydraAxis::new(conn.clone(), 1);

    spi.set_speed_raw(5000.0).await?;
    assert_eq!(spi.speed_raw().await?, 5000.0);

    spi.move_absolute_raw(1500.0).await?;
    assert_eq!(spi.position_raw().await?, 1500.0);
    spi.move_relative_raw(-500.0).await?;
    assert_eq!(spi.position_raw().await?, 1000.0);

    assert!(!spi.is_enabled().await?);
    spi.enable().await?;
    assert!(spi.is_enabled().await?);

    spi.find_home(2000.0).await?;
    assert_eq!(spi.position_raw().await?, 0.0);
    assert!(spi.is_stopped().await?);

    let switches = spi.switches().await?;
    assert!(!switches.at_lower_limit);

    conn.close().await?;
    Ok(())
}

#[tokio::test]
async fn test_axes_on_one_controller_are_independent() -> Result<()> {
    let addr = spawn_controller(ControllerOpts::default()).await;
    let conn = Arc::new(HydraConnection::connect(addr).await?);
    let a = HydraAxis::new(conn.clone(), 1);
    let b = HydraAxis::new(conn.clone(), 2);

    a.move_absolute_raw(100.0).await?;
    b.move_absolute_raw(-100.0).await?;
    assert_eq!(a.position_raw().await?, 100.0);
    assert_eq!(b.position_raw().await?, -100.0);

    conn.close().await?;
    Ok(())
}

#[tokio::test]
async fn test_engine_drives_the_wire_in_cooked_units() -> Result<()> {
    let addr = spawn_controller(ControllerOpts::default()).await;
    let conn = Arc::new(HydraConnection::connect(addr).await?);
    let spi = Arc::new(HydraAxis::new(conn.clone(), 1));
    let store = Arc::new(TomlStore::in_memory());

    let axis = Axis::new(
        "x",
        spi.clone() as Arc<dyn AxisSpi>,
        store,
        "hydra",
        AxisDefaults {
            scale: 100.0,
            ..Default::default()
        },
    )?;

    let cmd = axis.move_absolute(10.0).await?;
    assert_eq!(cmd.wait().await?, MoveStatus::Ok);
    assert_eq!(spi.position_raw().await?, 1000.0);
    assert_eq!(axis.position().await?, 10.0);

    axis.disconnect().await?;
    Ok(())
}

// =============================================================================
// Shared registry
// =============================================================================

#[tokio::test]
async fn test_shared_connection_is_reused_and_refcounted() -> Result<()> {
    let addr = spawn_controller(ControllerOpts::default()).await;

    let a = HydraAxis::connect_shared(&addr, 1).await?;
    let b = HydraAxis::connect_shared(&addr, 2).await?;
    assert_eq!(motion_hydra::shared::attached(&addr).await, 2);

    a.move_absolute_raw(5.0).await?;
    assert_eq!(b.position_raw().await?, 0.0);

    a.shutdown().await?;
    assert_eq!(motion_hydra::shared::attached(&addr).await, 1);
    // The survivor still works.
    b.move_absolute_raw(8.0).await?;

    b.shutdown().await?;
    assert_eq!(motion_hydra::shared::attached(&addr).await, 0);
    Ok(())
}
