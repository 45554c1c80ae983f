//! Network scaffolding tests over the plain-socket daemon
//!
//! Run with: cargo test --test net_test

use outpost::context::ProcessContext;
use outpost::daemon::{Daemon, PlainSocketConfig, PlainSocketDaemon};
use outpost::filter::{CommandFilter, LintText, PinAndShortcuts, ResultFilter};
use outpost::net::ServerError;
use outpost::processor::CommandProcessor;
use outpost::toolbox::{FeatureSet, RunShell};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpStream, UdpSocket};
use tokio::task::JoinHandle;

const PASSWORD: &str = "testpin";

fn sane_processor(ctx: Arc<ProcessContext>) -> CommandProcessor {
    let mut features = FeatureSet::new();
    features.install(Box::new(RunShell::default())).unwrap();
    let pin = PinAndShortcuts {
        pin: PASSWORD.to_string(),
        shortcuts: Default::default(),
    };
    let lint = LintText {
        trim_spaces: true,
        compress_to_single_line: true,
        max_length: 120,
        ..LintText::default()
    };
    CommandProcessor::new(
        ctx,
        features,
        vec![CommandFilter::PinAndShortcuts(pin)],
        vec![
            ResultFilter::ResetCombinedText,
            ResultFilter::LintText(lint),
            ResultFilter::SayEmptyOutput,
        ],
        0,
    )
}

struct Harness {
    daemon: Arc<PlainSocketDaemon>,
    serving: JoinHandle<Result<(), ServerError>>,
    ctx: Arc<ProcessContext>,
    tcp_port: u16,
    udp_port: u16,
}

async fn start_daemon(per_ip_limit: u64) -> Harness {
    let ctx = ProcessContext::new();
    let processor = Arc::new(sane_processor(ctx.clone()));
    let config = PlainSocketConfig {
        listen_address: "127.0.0.1".to_string(),
        tcp_port: Some(0),
        udp_port: Some(0),
        per_ip_limit,
        cmd_timeout_sec: 10,
    };
    let mut daemon = PlainSocketDaemon::new(ctx.clone(), processor, config);
    daemon.initialise().unwrap();
    let daemon = Arc::new(daemon);
    let server = daemon.clone();
    let serving = tokio::spawn(async move { server.start_and_block().await });

    let mut tcp_port = 0;
    let mut udp_port = 0;
    for _ in 0..200 {
        tcp_port = daemon.tcp_server().unwrap().local_port();
        udp_port = daemon.udp_server().unwrap().local_port();
        if tcp_port != 0 && udp_port != 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(tcp_port != 0 && udp_port != 0, "daemon never bound its ports");
    Harness {
        daemon,
        serving,
        ctx,
        tcp_port,
        udp_port,
    }
}

async fn converse_tcp(port: u16, line: &str) -> String {
    let stream = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
    let (reader, mut writer) = stream.into_split();
    writer.write_all(line.as_bytes()).await.unwrap();
    writer.write_all(b"\n").await.unwrap();
    let mut reply = String::new();
    BufReader::new(reader).read_line(&mut reply).await.unwrap();
    reply.trim_end().to_string()
}

#[tokio::test]
async fn tcp_round_trip_through_the_pipeline() {
    let harness = start_daemon(100).await;
    let reply = converse_tcp(harness.tcp_port, &format!("{PASSWORD}.secho hello")).await;
    assert_eq!(reply, "hello");
    harness.daemon.stop();
    assert!(harness.serving.await.unwrap().is_ok());
}

#[tokio::test]
async fn multiple_commands_per_connection() {
    let harness = start_daemon(100).await;
    let stream = TcpStream::connect(("127.0.0.1", harness.tcp_port))
        .await
        .unwrap();
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();
    for word in ["one", "two", "three"] {
        writer
            .write_all(format!("{PASSWORD}.secho {word}\n").as_bytes())
            .await
            .unwrap();
        let reply = lines.next_line().await.unwrap().unwrap();
        assert_eq!(reply, word);
    }
    harness.daemon.stop();
}

#[tokio::test]
async fn bad_password_looks_like_any_other_rejection() {
    let harness = start_daemon(100).await;
    let denied = converse_tcp(harness.tcp_port, "wrongpin.secho hello").await;
    let unknown = converse_tcp(harness.tcp_port, &format!("{PASSWORD}.zz hello")).await;
    assert!(!denied.contains("hello"));
    assert!(!unknown.contains("hello"));
    harness.daemon.stop();
}

#[tokio::test]
async fn udp_round_trip_through_the_pipeline() {
    let harness = start_daemon(100).await;
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    socket
        .send_to(
            format!("{PASSWORD}.secho over datagram").as_bytes(),
            ("127.0.0.1", harness.udp_port),
        )
        .await
        .unwrap();
    let mut buf = [0u8; 1024];
    let (len, _) = tokio::time::timeout(Duration::from_secs(10), socket.recv_from(&mut buf))
        .await
        .expect("no UDP reply")
        .unwrap();
    assert_eq!(String::from_utf8_lossy(&buf[..len]).trim_end(), "over datagram");
    harness.daemon.stop();
}

#[tokio::test]
async fn accept_loop_honours_emergency_lock_down() {
    let harness = start_daemon(100).await;
    harness.ctx.trigger_emergency_lock_down();
    // The next accepted connection makes the loop notice the flag.
    let _ = TcpStream::connect(("127.0.0.1", harness.tcp_port)).await;
    let outcome = tokio::time::timeout(Duration::from_secs(5), harness.serving)
        .await
        .expect("daemon did not exit")
        .unwrap();
    assert!(matches!(outcome, Err(ServerError::EmergencyLockDown)));
}

#[tokio::test]
async fn starting_twice_is_refused() {
    let harness = start_daemon(100).await;
    let second = harness.daemon.tcp_server().unwrap().start_and_block().await;
    assert!(matches!(second, Err(ServerError::AlreadyStarted)));
    harness.daemon.stop();
}

#[tokio::test]
async fn per_ip_rate_limit_cuts_off_chatty_clients() {
    let harness = start_daemon(3).await;
    let stream = TcpStream::connect(("127.0.0.1", harness.tcp_port))
        .await
        .unwrap();
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();
    let mut answered = 0;
    for _ in 0..10 {
        if writer
            .write_all(format!("{PASSWORD}.secho hi\n").as_bytes())
            .await
            .is_err()
        {
            break;
        }
        match lines.next_line().await {
            Ok(Some(_)) => answered += 1,
            _ => break,
        }
    }
    assert!(answered < 10, "the per-IP limit never closed the conversation");
    harness.daemon.stop();
}

#[tokio::test]
async fn handlers_can_consume_extra_rate_limit_tokens() {
    let harness = start_daemon(2).await;
    let ip = "127.0.0.1".parse().unwrap();
    let server = harness.daemon.tcp_server().unwrap();
    assert!(server.add_and_check_rate_limit(ip));
    assert!(server.add_and_check_rate_limit(ip));
    assert!(!server.add_and_check_rate_limit(ip));
    harness.daemon.stop();
}

#[tokio::test]
async fn stop_is_idempotent() {
    let harness = start_daemon(100).await;
    harness.daemon.stop();
    harness.daemon.stop();
    assert!(harness.serving.await.unwrap().is_ok());
    harness.daemon.stop();
}
