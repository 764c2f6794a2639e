use bytes::Bytes;
use quickcheck_macros::quickcheck;
use std::io::{self, Read, Write};
use wire_capture::{CapturingReader, CapturingWriter, ChunkBuffer, DRAIN_SENTINEL};

fn concat(buf: &ChunkBuffer) -> Vec<u8> {
    let (first, last) = buf.snapshot();
    first.iter().chain(last.iter()).flat_map(|c| c.iter().copied()).collect()
}

// Read `r` to its end using successive read sizes drawn from `sizes`.
fn read_in_sizes<R: Read>(mut r: R, sizes: &[u8]) -> io::Result<Vec<u8>> {
    let mut out = Vec::new();
    for size in sizes.iter().cycle() {
        let mut buf = vec![0; *size as usize % 17 + 1];
        match r.read(&mut buf)? {
            0 => break,
            n => out.extend_from_slice(&buf[..n]),
        }
    }
    Ok(out)
}

#[quickcheck]
fn reads_are_transparent(data: Vec<u8>, sizes: Vec<u8>) -> bool {
    let sizes = if sizes.is_empty() { vec![0] } else { sizes };

    let direct = read_in_sizes(&data[..], &sizes).unwrap();

    let mut r = CapturingReader::with_capture_last(&data[..], usize::MAX);
    let captured = read_in_sizes(&mut r, &sizes).unwrap();

    direct == data && captured == data && concat(r.capture()) == data
}

#[quickcheck]
fn writes_are_transparent(chunks: Vec<Vec<u8>>) -> bool {
    let mut w = CapturingWriter::with_capacity(Vec::new(), 2, usize::MAX);
    for chunk in &chunks {
        w.write_all(chunk).unwrap();
    }
    let expect: Vec<u8> = chunks.concat();

    *w.get_ref() == expect
        && concat(w.capture()) == expect
        && w.capture().len() == chunks.iter().filter(|c| !c.is_empty()).count()
}

#[test]
fn test_end_of_stream_read_is_not_captured() {
    let mut r = CapturingReader::with_capacity(&b"xy"[..], 1, 1);
    let mut buf = [0u8; 4];

    assert_eq!(r.read(&mut buf).unwrap(), 2);
    let before = r.capture().snapshot().0.to_vec();

    for _ in 0..3 {
        assert_eq!(r.read(&mut buf).unwrap(), 0);
    }
    assert_eq!(r.capture().first(), &before[..]);
    assert!(r.capture().last().is_empty());
}

#[test]
fn test_capture_rest_of_stream_evicts() {
    let inner = io::Cursor::new(b"xyz12345".to_vec());
    let mut r = CapturingReader::with_capture_last(inner, 3);

    for _ in 0..3 {
        let mut one = [0u8; 1];
        r.read_exact(&mut one).unwrap();
    }
    r.capture_rest_of_stream();

    assert_eq!(
        r.capture().last(),
        &[
            Bytes::from("z"),
            Bytes::from_static(&DRAIN_SENTINEL),
            Bytes::from("12345"),
        ]
    );
    assert_eq!(r.capture().dropped(), 2);
}

#[test]
fn test_dump_of_any_buffer_state() {
    let dir = tempfile::tempdir().unwrap();
    let cause = io::Error::new(io::ErrorKind::Other, "remote side failed");

    // Empty, first-only, last-only, and both windows full.
    for (first, last, writes) in [(4, 4, 0), (4, 0, 9), (0, 4, 9), (2, 2, 9)] {
        let mut w = CapturingWriter::with_capacity(io::sink(), first, last)
            .with_dump_dir(dir.path());
        for i in 0..writes {
            w.write_all(format!("chunk-{i}").as_bytes()).unwrap();
        }
        let path = w.dump(&cause).expect("dump is written");
        let content = std::fs::read_to_string(path).unwrap();

        let chunks = content.lines().filter(|l| l.starts_with("--- chunk")).count();
        assert_eq!(chunks, w.capture().len());
    }

    let w = CapturingWriter::new(io::sink()).with_dump_dir(dir.path().join("missing"));
    assert_eq!(w.dump(&cause), None);
}

#[test]
fn test_nested_decorators() {
    let inner = CapturingReader::with_capture_last(&b"nested"[..], 8);
    let mut outer = CapturingReader::with_capture_last(inner, 8);

    let mut out = String::new();
    outer.read_to_string(&mut out).unwrap();

    assert_eq!(out, "nested");
    assert_eq!(concat(outer.capture()), b"nested");
    assert_eq!(concat(outer.get_ref().capture()), b"nested");
}

#[tokio::test]
async fn test_async_duplex_round_trip() {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let (client, server) = tokio::io::duplex(4);
    let mut w = CapturingWriter::with_capacity(client, 1, 64);
    let mut r = CapturingReader::with_capacity(server, 1, 64);

    let send = async move {
        w.write_all(b"handshake").await.unwrap();
        w.write_all(b" and then some payload").await.unwrap();
        w.shutdown().await.unwrap();
        w
    };
    let recv = async move {
        let mut out = Vec::new();
        r.read_to_end(&mut out).await.unwrap();
        (r, out)
    };
    let (w, (r, out)) = tokio::join!(send, recv);

    let expect = b"handshake and then some payload";
    assert_eq!(out, expect);
    assert_eq!(concat(w.capture()), expect);
    assert_eq!(concat(r.capture()), expect);

    // The duplex buffer accepts four bytes at a time.
    assert_eq!(w.capture().first(), &[Bytes::from("hand")]);
    assert!(w.capture().last().iter().all(|c| c.len() <= 4));
}

#[tokio::test]
async fn test_capture_rest_of_async_stream() {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let (mut client, server) = tokio::io::duplex(64);
    let mut r = CapturingReader::with_capture_last(server, 3);

    client.write_all(b"xy").await.unwrap();
    let mut two = [0u8; 2];
    r.read_exact(&mut two).await.unwrap();

    // Five bytes arrive which the application hasn't read.
    client.write_all(b"12345").await.unwrap();
    r.capture_rest_of_async_stream();

    assert_eq!(
        r.capture().last(),
        &[
            Bytes::from("xy"),
            Bytes::from_static(&DRAIN_SENTINEL),
            Bytes::from("12345"),
        ]
    );

    // Nothing was pending, and the drain returned rather than waiting.
    r.capture_rest_of_async_stream();
    assert_eq!(
        r.capture().last(),
        &[
            Bytes::from_static(&DRAIN_SENTINEL),
            Bytes::from("12345"),
            Bytes::from_static(&DRAIN_SENTINEL),
        ]
    );
    drop(client);
}

#[tokio::test]
async fn test_async_end_of_stream_is_not_captured() {
    use tokio::io::AsyncReadExt;

    let mut r = CapturingReader::new(tokio::io::empty());
    let mut buf = [0u8; 8];

    assert_eq!(r.read(&mut buf).await.unwrap(), 0);
    assert!(r.capture().is_empty());
}
