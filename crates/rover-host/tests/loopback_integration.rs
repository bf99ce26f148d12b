//! End-to-end test over a real loopback TCP connection.
//!
//! A fake device connects to the host, streams sensor frames, and reads back
//! the 3-byte commands the scripted controller produces.  The host side is
//! wired the same way `main.rs` wires it.

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use rover_core::{ChecksumMode, ParseError, ParserConfig, PoolQueue, XorChecksum};
use rover_host::application::mock_controller::MOCK_SCRIPT;
use rover_host::application::session::HostSession;
use rover_host::infrastructure::transport::DeviceListener;

struct Host {
    addr: SocketAddr,
    /// Asks the host to stop without waiting for the device to disconnect.
    stop: Arc<AtomicBool>,
    handle: thread::JoinHandle<(u64, u64)>,
}

/// Starts a host on an ephemeral port.  The returned thread yields
/// `(frames delivered, commands sent)` once the device disconnects or
/// `stop` is set.
fn start_host(protocol: ParserConfig, inbound_max: usize) -> Host {
    let listener = DeviceListener::bind("127.0.0.1:0".parse().unwrap()).expect("bind");
    let addr = listener.local_addr().unwrap();
    let stop = Arc::new(AtomicBool::new(false));
    let stop_requested = Arc::clone(&stop);

    let handle = thread::spawn(move || {
        let halves = listener.accept().expect("accept").into_halves().expect("split");
        let session = HostSession::start(
            halves.reader,
            halves.writer,
            &protocol,
            Arc::new(PoolQueue::new("inbound", inbound_max)),
            Arc::new(PoolQueue::new("outbound", 4)),
        )
        .unwrap();

        while !session.is_device_closed() && !stop_requested.load(Ordering::Relaxed) {
            thread::sleep(Duration::from_millis(10));
        }
        let device_closed = session.is_device_closed();
        if device_closed {
            // Let the controller answer the last frame before stopping.
            thread::sleep(Duration::from_millis(200));
        }
        let summary = session.stop(|| halves.shutdown.shutdown()).unwrap();
        if device_closed {
            assert!(matches!(summary.inbound.stopped_by, ParseError::EndOfStream));
        }
        (summary.inbound.delivered, summary.outbound.sent)
    });

    Host { addr, stop, handle }
}

fn read_commands(device: &mut TcpStream, count: usize) -> Vec<[u8; 3]> {
    device
        .set_read_timeout(Some(Duration::from_secs(5)))
        .unwrap();
    (0..count)
        .map(|_| {
            let mut frame = [0u8; 3];
            device.read_exact(&mut frame).expect("command frame");
            frame
        })
        .collect()
}

#[test]
fn test_each_sensor_frame_produces_one_command_frame() {
    // Arrange
    let host = start_host(ParserConfig::default(), 4);
    let mut device = TcpStream::connect(host.addr).expect("connect");

    // Act – six frames, one of them with an escaped value
    for i in 0..5 {
        write!(device, "$PRSO10{i},{i}\r\n").unwrap();
    }
    device.write_all(b"$PRSO400,&I\x00\x2A\r\n").unwrap();
    let commands = read_commands(&mut device, 6);
    device.shutdown(std::net::Shutdown::Write).unwrap();
    let (delivered, sent) = host.handle.join().expect("host panicked");

    // Assert – the script cycles, each frame is target, value, 0x00
    let expected: Vec<[u8; 3]> = MOCK_SCRIPT
        .iter()
        .cycle()
        .take(6)
        .map(|&(target, value)| [target as u8, value as u8, 0x00])
        .collect();
    assert_eq!(commands, expected);
    assert_eq!(delivered, 6);
    assert_eq!(sent, 6);
}

#[test]
fn test_frames_split_across_writes_are_reassembled() {
    let host = start_host(ParserConfig::default(), 4);
    let mut device = TcpStream::connect(host.addr).unwrap();
    device.set_nodelay(true).unwrap();

    for piece in [&b"$PRSO3"[..], b"03,2", b"54*31\r", b"\n$PRSO200,1\r\n"] {
        device.write_all(piece).unwrap();
        thread::sleep(Duration::from_millis(20));
    }
    let commands = read_commands(&mut device, 2);
    device.shutdown(std::net::Shutdown::Write).unwrap();
    let (delivered, _) = host.handle.join().unwrap();

    assert_eq!(commands, vec![[0x01, 0x80, 0x00], [0x02, 0xFF, 0x00]]);
    assert_eq!(delivered, 2);
}

#[test]
fn test_xor_mode_drops_corrupt_frames_without_answering() {
    // Arrange
    let host = start_host(
        ParserConfig {
            checksum: ChecksumMode::Xor,
            ..ParserConfig::default()
        },
        4,
    );
    let mut device = TcpStream::connect(host.addr).unwrap();
    let good = format!("$PRSO100,7*{:02X}\r\n", XorChecksum::compute(b"PRSO100,7"));

    // Act
    device.write_all(b"$PRSO100,7*00\r\n").unwrap();
    device.write_all(good.as_bytes()).unwrap();
    let commands = read_commands(&mut device, 1);
    device.shutdown(std::net::Shutdown::Write).unwrap();
    let (delivered, sent) = host.handle.join().unwrap();

    // Assert
    assert_eq!(commands, vec![[0x01, 0x80, 0x00]]);
    assert_eq!(delivered, 1);
    assert_eq!(sent, 1);
}

#[test]
fn test_stop_while_device_streams_into_small_inbound_pool() {
    // Arrange – the device never pauses, so the reader buffer still holds
    // far more frames than the two-message pool when the host stops
    let host = start_host(ParserConfig::default(), 2);
    let mut device = TcpStream::connect(host.addr).unwrap();
    device
        .set_write_timeout(Some(Duration::from_secs(1)))
        .unwrap();
    let streamer = thread::spawn(move || {
        while device.write_all(b"$PRSO100,1\r\n").is_ok() {}
    });
    thread::sleep(Duration::from_millis(100));

    // Act
    host.stop.store(true, Ordering::Relaxed);
    let (tx, rx) = mpsc::channel();
    let handle = host.handle;
    thread::spawn(move || {
        let _ = tx.send(handle.join());
    });
    let (delivered, _) = rx
        .recv_timeout(Duration::from_secs(5))
        .expect("host did not stop with a full inbound pool")
        .expect("host panicked");

    // Assert
    assert!(delivered > 0);
    streamer.join().unwrap();
}
