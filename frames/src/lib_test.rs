use super::*;

use tokio::io::{AsyncWriteExt, duplex};

async fn encode(payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    write_frame(&mut out, payload).await.expect("write to vec");
    out
}

#[tokio::test]
async fn write_frame_prefixes_big_endian_length() {
    let bytes = encode(b"hello").await;
    assert_eq!(&bytes[..4], &[0, 0, 0, 5]);
    assert_eq!(&bytes[4..], b"hello");
}

#[tokio::test]
async fn empty_payload_round_trips() {
    let bytes = encode(b"").await;
    assert_eq!(bytes, vec![0, 0, 0, 0]);

    let mut reader = bytes.as_slice();
    let payload = read_frame(&mut reader).await.expect("read");
    assert_eq!(payload, Some(Vec::new()));
}

#[tokio::test]
async fn arbitrary_bytes_round_trip() {
    let original: Vec<u8> = (0..=255u8).cycle().take(70_000).collect();
    let bytes = encode(&original).await;

    let mut reader = bytes.as_slice();
    let payload = read_frame(&mut reader).await.expect("read").expect("frame");
    assert_eq!(payload, original);
}

#[tokio::test]
async fn consecutive_frames_read_in_order() {
    let mut bytes = encode(b"first").await;
    bytes.extend(encode(b"").await);
    bytes.extend(encode(b"third").await);

    let mut reader = bytes.as_slice();
    assert_eq!(read_frame(&mut reader).await.expect("1"), Some(b"first".to_vec()));
    assert_eq!(read_frame(&mut reader).await.expect("2"), Some(Vec::new()));
    assert_eq!(read_frame(&mut reader).await.expect("3"), Some(b"third".to_vec()));
    assert_eq!(read_frame(&mut reader).await.expect("eos"), None);
}

#[tokio::test]
async fn one_byte_reads_yield_the_full_payload() {
    // A 1-byte duplex buffer forces every underlying read to return one byte.
    let (mut client, mut server) = duplex(1);
    let original: Vec<u8> = b"GET_CHUNK video 500000 7 \x00\xff".to_vec();
    let sent = original.clone();

    let writer = tokio::spawn(async move {
        write_frame(&mut client, &sent).await.expect("write");
        client.shutdown().await.expect("shutdown");
    });

    let payload = read_frame(&mut server).await.expect("read").expect("frame");
    assert_eq!(payload, original);
    assert_eq!(read_frame(&mut server).await.expect("eos"), None);
    writer.await.expect("writer task");
}

#[tokio::test]
async fn clean_close_is_end_of_stream() {
    let mut reader: &[u8] = &[];
    assert_eq!(read_frame(&mut reader).await.expect("eos"), None);
}

#[tokio::test]
async fn partial_header_is_a_framing_error() {
    let mut reader: &[u8] = &[0, 0];
    let err = read_frame(&mut reader).await.expect_err("short header");
    assert!(matches!(err, FrameError::TruncatedHeader { received: 2 }));
    assert_eq!(err.error_code(), "E_FRAME_TRUNCATED");
}

#[test]
fn error_codes_are_reachable_through_the_trait_object() {
    let errors: Vec<Box<dyn ErrorCode>> = vec![
        Box::new(FrameError::TooLarge { len: 0 }),
        Box::new(FrameError::ExceedsLimit { len: 2, limit: 1 }),
        Box::new(RequestError::Empty),
        Box::new(RequestError::InvalidVideoId("../x".into())),
    ];
    let codes: Vec<&str> = errors.iter().map(|e| e.error_code()).collect();
    assert_eq!(codes, ["E_FRAME_TOO_LARGE", "E_FRAME_LIMIT", "E_REQ_EMPTY", "E_REQ_VIDEO_ID"]);
}

#[tokio::test]
async fn early_close_inside_payload_is_a_framing_error() {
    let mut reader: &[u8] = &[0, 0, 0, 10, b'a', b'b', b'c'];
    let err = read_frame(&mut reader).await.expect_err("short payload");
    assert!(matches!(err, FrameError::TruncatedPayload { expected: 10, received: 3 }));
}

#[tokio::test]
async fn declared_length_above_limit_is_rejected() {
    let mut reader: &[u8] = &[0x7f, 0xff, 0xff, 0xff];
    let err = read_frame_with_limit(&mut reader, 1024)
        .await
        .expect_err("over limit");
    assert!(matches!(err, FrameError::ExceedsLimit { len: 0x7fff_ffff, limit: 1024 }));
}

#[tokio::test]
async fn write_to_closed_stream_fails() {
    let (client, mut server) = duplex(64);
    drop(client);
    let err = write_frame(&mut server, b"late").await.expect_err("peer gone");
    assert!(matches!(err, FrameError::Io(_)));
}

#[test]
fn parses_manifest_request() {
    let req = Request::parse("GET_MANIFEST bbb").expect("parse");
    assert_eq!(req, Request::GetManifest { video_id: "bbb".into() });
    assert_eq!(req.video_id(), "bbb");
}

#[test]
fn parses_chunk_request_with_padded_index() {
    let req = Request::parse("GET_CHUNK bbb 500000 00007").expect("parse");
    assert_eq!(
        req,
        Request::GetChunk { video_id: "bbb".into(), bitrate: 500_000, chunk_index: 7 }
    );
}

#[test]
fn display_renders_wire_text() {
    let req = Request::GetChunk { video_id: "bbb".into(), bitrate: 300_000, chunk_index: 12 };
    assert_eq!(req.to_string(), "GET_CHUNK bbb 300000 12");
    assert_eq!(Request::parse(&req.to_string()).expect("parse"), req);

    let req = Request::GetManifest { video_id: "bbb".into() };
    assert_eq!(req.to_string(), "GET_MANIFEST bbb");
}

#[test]
fn commands_are_case_sensitive_exact_tokens() {
    assert_eq!(
        Request::parse("get_manifest bbb"),
        Err(RequestError::UnknownCommand("get_manifest".into()))
    );
    assert_eq!(
        Request::parse("GET_MANIFESTX bbb"),
        Err(RequestError::UnknownCommand("GET_MANIFESTX".into()))
    );
}

#[test]
fn rejects_malformed_requests() {
    assert_eq!(Request::parse("   "), Err(RequestError::Empty));
    assert!(matches!(
        Request::parse("GET_CHUNK bbb 500000"),
        Err(RequestError::WrongArity { expected: 3, got: 2, .. })
    ));
    assert!(matches!(
        Request::parse("GET_MANIFEST"),
        Err(RequestError::WrongArity { expected: 1, got: 0, .. })
    ));
    assert_eq!(
        Request::parse("GET_CHUNK bbb fast 1"),
        Err(RequestError::InvalidNumber("fast".into()))
    );
    assert_eq!(
        Request::parse("GET_CHUNK bbb 500000 -1"),
        Err(RequestError::InvalidNumber("-1".into()))
    );
}

#[test]
fn from_payload_rejects_non_utf8() {
    assert_eq!(Request::from_payload(&[0xff, 0xfe]), Err(RequestError::NotUtf8));
    assert_eq!(
        Request::from_payload(b"GET_MANIFEST bbb"),
        Ok(Request::GetManifest { video_id: "bbb".into() })
    );
}

#[test]
fn rejects_path_like_video_ids() {
    for id in ["../etc", "a/b", "a\\b", ".."] {
        let line = format!("GET_MANIFEST {id}");
        assert_eq!(Request::parse(&line), Err(RequestError::InvalidVideoId(id.into())), "{id}");
    }
}

#[test]
fn pads_index_to_five_digits() {
    assert_eq!(padded_index(0), "00000");
    assert_eq!(padded_index(7), "00007");
    assert_eq!(padded_index(123_456), "123456");
}

#[test]
fn miss_marker_is_detected_by_content() {
    assert!(is_chunk_miss(b"Chunk not found"));
    assert!(!is_chunk_miss(b"Chunk not found\n"));
    assert!(!is_chunk_miss(&[0, 1, 2]));
}
