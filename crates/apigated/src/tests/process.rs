//! End-to-end runs of the daemon over a Unix socket.

use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use rstest::rstest;
use serde_json::{Value, json};

use super::support::{HealthEvent, ManualShutdown, RecordingHealthReporter, TestConfigLoader};
use crate::process::run_daemon_with;

fn connect(path: &Path) -> UnixStream {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        match UnixStream::connect(path) {
            Ok(stream) => return stream,
            Err(_) if Instant::now() < deadline => thread::sleep(Duration::from_millis(20)),
            Err(error) => panic!("daemon never listened on {}: {error}", path.display()),
        }
    }
}

#[rstest]
fn daemon_serves_batches_until_shutdown() {
    let loader = Arc::new(TestConfigLoader::new());
    let socket = loader.socket_path();
    let reporter = Arc::new(RecordingHealthReporter::default());
    let (trigger, shutdown) = ManualShutdown::new();

    let daemon_loader = Arc::clone(&loader);
    let daemon_reporter = Arc::clone(&reporter);
    let daemon = thread::spawn(move || {
        run_daemon_with(daemon_loader.as_ref(), daemon_reporter, &shutdown)
    });

    let stream = connect(Path::new(&socket));
    stream
        .set_read_timeout(Some(Duration::from_secs(5)))
        .expect("read timeout");
    let mut writer = stream.try_clone().expect("clone stream");
    let batch = json!([
        {"jsonrpc": "2.0", "method": "apiinfo.version", "id": 1},
        {"jsonrpc": "2.0", "method": "user.login", "params": {"username": "Admin", "password": "zabbix"}},
        {"jsonrpc": "2.0", "method": "host.get", "id": 2},
    ]);
    writeln!(writer, "{batch}").expect("write batch");

    let mut line = String::new();
    BufReader::new(stream)
        .read_line(&mut line)
        .expect("read response");
    let reply: Value = serde_json::from_str(&line).expect("response is JSON");
    let responses = reply.as_array().expect("batch reply");
    assert_eq!(responses.len(), 2);
    assert_eq!(responses[0]["result"], crate::API_VERSION);
    assert_eq!(responses[1]["error"]["code"], -32602);
    assert_eq!(responses[1]["error"]["data"], "Not authorized.");

    trigger.send(()).expect("trigger shutdown");
    daemon
        .join()
        .expect("daemon thread")
        .expect("daemon exits cleanly");
    assert!(!Path::new(&socket).exists(), "socket removed on shutdown");
    assert!(
        reporter
            .events()
            .contains(&HealthEvent::ListenerReady(format!("unix://{socket}")))
    );
}
