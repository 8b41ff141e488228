use super::*;

use crate::store::MemoryStore;

fn store() -> MemoryStore {
    MemoryStore::new()
        .with_manifest("bbb", "<MPD><Representation bandwidth=\"500000\"/></MPD>")
        .with_chunk("bbb", 500_000, 7, vec![0xde, 0xad, 0xbe, 0xef])
}

#[tokio::test]
async fn present_chunk_returns_exact_bytes() {
    let reply = dispatch(&store(), b"GET_CHUNK bbb 500000 00007").await.expect("dispatch");
    assert_eq!(reply, Reply::Chunk(vec![0xde, 0xad, 0xbe, 0xef]));
    assert_eq!(reply.into_payload(), vec![0xde, 0xad, 0xbe, 0xef]);
}

#[tokio::test]
async fn unpadded_index_resolves_to_the_same_chunk() {
    let reply = dispatch(&store(), b"GET_CHUNK bbb 500000 7").await.expect("dispatch");
    assert_eq!(reply.kind(), "chunk");
}

#[tokio::test]
async fn missing_chunk_returns_miss_text() {
    let reply = dispatch(&store(), b"GET_CHUNK bbb 500000 00008").await.expect("dispatch");
    assert_eq!(reply, Reply::ChunkMiss);
    assert_eq!(reply.into_payload(), b"Chunk not found".to_vec());
}

#[tokio::test]
async fn out_of_range_index_is_a_miss_not_a_fault() {
    let reply = dispatch(&store(), b"GET_CHUNK bbb 500000 99999999").await.expect("dispatch");
    assert_eq!(reply, Reply::ChunkMiss);
}

#[tokio::test]
async fn manifest_is_returned_raw() {
    let reply = dispatch(&store(), b"GET_MANIFEST bbb").await.expect("dispatch");
    assert_eq!(
        reply.into_payload(),
        b"<MPD><Representation bandwidth=\"500000\"/></MPD>".to_vec()
    );
}

#[tokio::test]
async fn missing_manifest_returns_miss_text() {
    let reply = dispatch(&store(), b"GET_MANIFEST nope").await.expect("dispatch");
    assert_eq!(reply, Reply::ManifestMiss);
    assert_eq!(reply.into_payload(), b"Manifest not found".to_vec());
}

#[tokio::test]
async fn unrecognized_command_returns_invalid_request() {
    let reply = dispatch(&store(), b"DELETE_CHUNK bbb 500000 7").await.expect("dispatch");
    assert!(matches!(reply, Reply::Invalid(RequestError::UnknownCommand(_))));
    assert_eq!(reply.into_payload(), b"Invalid request".to_vec());
}

#[tokio::test]
async fn malformed_payloads_return_invalid_request() {
    for payload in [
        &b"GET_CHUNK bbb"[..],
        &b""[..],
        &b"\xff\xfe"[..],
        &b"GET_MANIFEST ../secret"[..],
    ] {
        let reply = dispatch(&store(), payload).await.expect("dispatch");
        assert_eq!(reply.kind(), "invalid", "{payload:?}");
    }
}
